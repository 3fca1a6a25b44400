// src/config.rs

use std::env;
use std::fmt;
use std::time::Duration;

use dotenvy::dotenv;

use crate::services::{feed::FeedOptions, session::RetryPolicy};

/// Points credited for every individually-correct answer.
pub const POINTS_PER_CORRECT: i32 = 10;

/// Highest placement grade the grader will assign.
pub const MAX_GRADE: i32 = 12;

/// Share of the feed reserved for social posts.
pub const DEFAULT_SOCIAL_RATIO: f64 = 0.6;

pub const DEFAULT_SAFE_WORDS: &[&str] = &[
    "learn", "fun", "school", "math", "science", "read", "book", "art", "music", "game", "play",
    "friend", "help", "share", "story", "animal", "nature", "space", "history", "project",
];

pub const DEFAULT_BLOCKED_WORDS: &[&str] = &["badword", "hate", "violence"];

/// Configuration failure raised at startup.
#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { var: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(var) => write!(f, "{} must be set", var),
            ConfigError::Invalid { var, reason } => write!(f, "{} is invalid: {}", var, reason),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string of the hosted data store.
    pub database_url: String,
    /// Secret the data store uses to verify minted credentials.
    pub store_jwt_secret: String,
    pub clerk_publishable_key: String,
    /// PEM public key for verifying identity-provider session tokens.
    pub clerk_jwt_key: String,
    pub rust_log: String,
    pub bind_addr: String,
    pub store_token_ttl: u64,
    pub retry: RetryPolicy,
    pub feed: FeedOptions,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |var: &'static str| {
            lookup(var)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(var))
        };

        let database_url = required("DATABASE_URL")?;
        let store_jwt_secret = required("SUPABASE_JWT_SECRET")?;
        let clerk_publishable_key = required("CLERK_PUBLISHABLE_KEY")?;
        let clerk_jwt_key = required("CLERK_JWT_KEY")?;

        if !clerk_publishable_key.starts_with("pk_") {
            return Err(ConfigError::Invalid {
                var: "CLERK_PUBLISHABLE_KEY",
                reason: "expected a pk_test_ or pk_live_ key".to_string(),
            });
        }

        let rust_log = lookup("RUST_LOG").unwrap_or_else(|| "info".to_string());
        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string());

        let store_token_ttl = parse_or(&lookup, "STORE_TOKEN_TTL_SECS", 3600u64)?;

        let retry = RetryPolicy {
            settle_delay: Duration::from_millis(parse_or(&lookup, "MINT_SETTLE_MS", 0u64)?),
            max_attempts: parse_or(&lookup, "MINT_MAX_ATTEMPTS", 3u32)?,
            backoff: Duration::from_millis(parse_or(&lookup, "MINT_BACKOFF_MS", 1000u64)?),
        };
        if retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                var: "MINT_MAX_ATTEMPTS",
                reason: "must be at least 1".to_string(),
            });
        }

        let social_ratio = parse_or(&lookup, "FEED_SOCIAL_RATIO", DEFAULT_SOCIAL_RATIO)?;
        if !(social_ratio > 0.0 && social_ratio <= 1.0) {
            return Err(ConfigError::Invalid {
                var: "FEED_SOCIAL_RATIO",
                reason: format!("{} is outside (0, 1]", social_ratio),
            });
        }

        let feed = FeedOptions {
            social_ratio,
            safe_words: word_list(lookup("FEED_SAFE_WORDS"), DEFAULT_SAFE_WORDS),
            blocked_words: word_list(lookup("FEED_BLOCKED_WORDS"), DEFAULT_BLOCKED_WORDS),
            static_lessons: parse_or(&lookup, "FEED_STATIC_LESSONS", true)?,
        };

        Ok(Self {
            database_url,
            store_jwt_secret,
            clerk_publishable_key,
            clerk_jwt_key,
            rust_log,
            bind_addr,
            store_token_ttl,
            retry,
            feed,
        })
    }
}

fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match lookup(var) {
        Some(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn word_list(raw: Option<String>, default: &[&str]) -> Vec<String> {
    match raw {
        Some(list) => list
            .split(',')
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect(),
        None => default.iter().map(|w| w.to_string()).collect(),
    }
}
