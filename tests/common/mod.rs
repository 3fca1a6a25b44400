// tests/common/mod.rs

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use edugrok::{
    config::Config,
    error::AppError,
    identity::{Identity, IdentityBridge, IdentityProbe},
    models::{
        content::{AnswerFormat, ContentItem, ExpectedAnswer},
        learner::Theme,
    },
    routes,
    services::{feed::FeedOptions, grading::Quiz, session::RetryPolicy, session::TokioClock},
    state::AppState,
    store::{MemoryStore, StoreCredential},
};

/// Session token the scripted bridge reports as still loading.
pub const LOADING_TOKEN: &str = "loading";

/// Learner ids with this prefix never get a store credential.
pub const NO_MINT_PREFIX: &str = "nomint_";

/// Identity bridge driven by the token text: `token-<id>` signs in as `<id>`.
pub struct ScriptedBridge;

#[async_trait]
impl IdentityBridge for ScriptedBridge {
    async fn current_user(&self, session_token: &str) -> Result<IdentityProbe, AppError> {
        if session_token == LOADING_TOKEN {
            return Ok(IdentityProbe::loading());
        }
        match session_token.strip_prefix("token-") {
            Some(id) => {
                let mut identity = Identity::new(id);
                identity.theme = Some(Theme::Dark);
                Ok(IdentityProbe::signed_in(identity))
            }
            None => Ok(IdentityProbe::signed_out()),
        }
    }

    async fn mint_store_credential(
        &self,
        identity: &Identity,
    ) -> Result<Option<StoreCredential>, AppError> {
        if identity.id.starts_with(NO_MINT_PREFIX) {
            return Ok(None);
        }
        Ok(Some(StoreCredential::for_subject(&identity.id)))
    }
}

pub struct TestApp {
    pub address: String,
    pub store: Arc<MemoryStore>,
    pub client: reqwest::Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Creates a completed profile and returns the learner's session token.
    pub async fn learner(&self, age: i32, grade: i32, framework: &str) -> String {
        let token = new_token();
        let response = self
            .client
            .post(self.url("/api/profile/setup"))
            .bearer_auth(&token)
            .json(&serde_json::json!({
                "name": "Ada",
                "age": age,
                "grade": grade,
                "framework": framework,
                "terms_accepted": true
            }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 201);
        token
    }
}

/// A session token for a fresh, unique learner id.
pub fn new_token() -> String {
    format!("token-user_{}", &uuid::Uuid::new_v4().simple().to_string()[..12])
}

pub fn learner_id(token: &str) -> &str {
    token.trim_start_matches("token-")
}

fn test_config() -> Config {
    Config {
        database_url: "postgres://unused".to_string(),
        store_jwt_secret: "test_secret_for_integration_tests".to_string(),
        clerk_publishable_key: "pk_test_ZXhhbXBsZS1hcHAtMTIuY2xlcmsuYWNjb3VudHMuZGV2JA".to_string(),
        clerk_jwt_key: String::new(),
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        store_token_ttl: 600,
        retry: RetryPolicy {
            max_attempts: 2,
            ..RetryPolicy::immediate()
        },
        feed: FeedOptions::default(),
    }
}

/// Content covering every filter branch of the feed composer.
pub fn seed_feed(store: &MemoryStore) {
    let items = vec![
        ContentItem::Social {
            id: 1,
            age_group: "9-12".to_string(),
            author: Some("user_friend".to_string()),
            body: "We learned about <b>space</b> today!".to_string(),
        },
        ContentItem::Social {
            id: 2,
            age_group: "9-12".to_string(),
            author: None,
            body: "Buy cheap stuff now".to_string(),
        },
        ContentItem::Social {
            id: 3,
            age_group: "9-12".to_string(),
            author: None,
            body: "Math is fun, I hate waiting".to_string(),
        },
        ContentItem::Educational {
            id: 10,
            age_group: "9-12".to_string(),
            subject: "Math".to_string(),
            standard: "CCSS.MATH.4.NF".to_string(),
            grade: 4,
            question: "1/4 + 1/4 = ?".to_string(),
            format: AnswerFormat::MultipleChoice,
            options: vec!["1/2".to_string(), "2/8".to_string()],
            answer: ExpectedAnswer::Exact("1/2".to_string()),
        },
        ContentItem::Educational {
            id: 11,
            age_group: "9-12".to_string(),
            subject: "Math".to_string(),
            standard: "CCSS.MATH.9.A".to_string(),
            grade: 9,
            question: "Solve x^2 = 9".to_string(),
            format: AnswerFormat::MultipleChoice,
            options: vec!["3".to_string(), "-3 and 3".to_string()],
            answer: ExpectedAnswer::Exact("-3 and 3".to_string()),
        },
        ContentItem::Educational {
            id: 12,
            age_group: "6-8".to_string(),
            subject: "English".to_string(),
            standard: "CCSS.ELA.K.RF".to_string(),
            grade: 0,
            question: "Spell the animal that says moo".to_string(),
            format: AnswerFormat::FillInWord,
            options: vec![],
            answer: ExpectedAnswer::Word("Cow".to_string()),
        },
        ContentItem::Game {
            id: 20,
            age_group: "9-12".to_string(),
            name: "Space Invaders".to_string(),
            link: "https://edugrok.app/games/space-invaders".to_string(),
        },
    ];
    for item in items {
        store.seed_content(item).expect("Failed to seed content");
    }
}

/// Spawns the app on a random port over an in-memory store.
pub async fn spawn_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    seed_feed(&store);

    let state = AppState {
        store: store.clone(),
        identity: Arc::new(ScriptedBridge),
        clock: Arc::new(TokioClock),
        config: test_config(),
        quiz: Arc::new(Quiz::placement()),
    };

    let app = routes::create_router(state);

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        store,
        client: reqwest::Client::new(),
    }
}

/// Polls until `check` passes; background writes land shortly after the
/// response.
pub async fn eventually<F>(mut check: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..50 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not met within 1s");
}
