//! Content store port and its adapters.
//!
//! Every call carries the caller's `StoreCredential`. Writes are only
//! accepted for rows owned by the credential's subject. Calls are
//! independent; nothing groups several writes into one transaction.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::{
    error::AppError,
    models::{
        content::ContentItem,
        learner::{Learner, Settings},
        progress::{GameScore, LearnerStats, NewProgress},
        quiz::QuizResult,
    },
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Capacity of the feed change channel.
pub const FEED_CHANNEL_CAPACITY: usize = 64;

/// Access token for the data store, scoped to one learner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCredential {
    pub token: String,
    pub subject: String,
    /// Unix timestamp.
    pub expires_at: i64,
}

impl StoreCredential {
    /// A non-expiring, unsigned credential for in-process stores.
    pub fn for_subject(subject: &str) -> Self {
        Self {
            token: format!("local:{}", subject),
            subject: subject.to_string(),
            expires_at: i64::MAX,
        }
    }

    pub fn is_expired(&self) -> bool {
        chrono::Utc::now().timestamp() >= self.expires_at
    }

    pub fn ensure_valid(&self) -> Result<(), AppError> {
        if self.is_expired() {
            return Err(AppError::AuthError(
                "Data store credential expired".to_string(),
            ));
        }
        Ok(())
    }

    /// Row-level check: the credential may only touch its own learner's rows.
    pub fn authorize(&self, learner_id: &str) -> Result<(), AppError> {
        self.ensure_valid()?;
        if self.subject != learner_id {
            return Err(AppError::Forbidden(
                "Credential does not grant access to this learner".to_string(),
            ));
        }
        Ok(())
    }
}

/// Notification that the feed collection changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedChange {
    pub operation: String,
    pub item_id: Option<i64>,
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn fetch_learner(
        &self,
        cred: &StoreCredential,
        learner_id: &str,
    ) -> Result<Option<Learner>, AppError>;

    /// Fails with `Conflict` if the learner already exists.
    async fn insert_learner(&self, cred: &StoreCredential, learner: &Learner)
    -> Result<(), AppError>;

    /// Writes the settings columns only. Grade and profile fields are left alone.
    async fn update_settings(
        &self,
        cred: &StoreCredential,
        learner_id: &str,
        settings: &Settings,
    ) -> Result<(), AppError>;

    async fn update_grade(
        &self,
        cred: &StoreCredential,
        learner_id: &str,
        grade: i32,
    ) -> Result<(), AppError>;

    async fn list_content(&self, cred: &StoreCredential) -> Result<Vec<ContentItem>, AppError>;

    async fn fetch_content(
        &self,
        cred: &StoreCredential,
        item_id: i64,
    ) -> Result<Option<ContentItem>, AppError>;

    async fn insert_progress(
        &self,
        cred: &StoreCredential,
        progress: &NewProgress,
    ) -> Result<(), AppError>;

    async fn learner_stats(
        &self,
        cred: &StoreCredential,
        learner_id: &str,
    ) -> Result<LearnerStats, AppError>;

    async fn insert_quiz_result(
        &self,
        cred: &StoreCredential,
        result: &QuizResult,
    ) -> Result<(), AppError>;

    async fn insert_score(&self, cred: &StoreCredential, score: &GameScore)
    -> Result<(), AppError>;

    async fn last_score(
        &self,
        cred: &StoreCredential,
        learner_id: &str,
    ) -> Result<Option<GameScore>, AppError>;

    /// Subscribes to change notifications for the feed collection.
    fn subscribe_feed(&self) -> broadcast::Receiver<FeedChange>;
}
