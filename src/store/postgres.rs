//! Postgres adapter for the hosted data store.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool, postgres::PgListener, types::Json};
use tokio::{sync::broadcast, task::JoinHandle};

use super::{ContentStore, FEED_CHANNEL_CAPACITY, FeedChange, StoreCredential};
use crate::{
    error::AppError,
    models::{
        content::{ContentItem, ContentRow},
        learner::{Framework, Learner, Schedule, Settings, Theme},
        progress::{GameScore, LearnerStats, NewProgress},
        quiz::QuizResult,
    },
    utils::jwt::verify_store_token,
};

/// Postgres NOTIFY channel raised by the `content_items` trigger.
pub const FEED_CHANNEL: &str = "feed_changes";

const CONTENT_COLUMNS: &str = r#"
    id, kind, age_group, author_id, body, subject, standard, grade,
    question, format, options, correct_answer, word, game_name, link
"#;

/// Represents the 'users' table in the database.
#[derive(Debug, FromRow)]
struct LearnerRow {
    id: String,
    name: String,
    age: i32,
    grade: i32,
    framework: String,
    theme: String,
    parent_email: Option<String>,
    offline_mode: bool,
    schedule: Json<Schedule>,
}

impl TryFrom<LearnerRow> for Learner {
    type Error = AppError;

    fn try_from(row: LearnerRow) -> Result<Self, Self::Error> {
        Ok(Learner {
            framework: row
                .framework
                .parse::<Framework>()
                .map_err(AppError::InternalServerError)?,
            theme: row
                .theme
                .parse::<Theme>()
                .map_err(AppError::InternalServerError)?,
            id: row.id,
            name: row.name,
            age: row.age,
            grade: row.grade,
            parent_email: row.parent_email,
            offline_mode: row.offline_mode,
            schedule: row.schedule.0,
        })
    }
}

#[derive(Debug, FromRow)]
struct ScoreRow {
    user_id: String,
    game: String,
    score: i32,
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    jwt_secret: String,
    feed_tx: broadcast::Sender<FeedChange>,
}

impl PgStore {
    pub fn new(pool: PgPool, jwt_secret: impl Into<String>) -> Self {
        let (feed_tx, _) = broadcast::channel(FEED_CHANNEL_CAPACITY);
        Self {
            pool,
            jwt_secret: jwt_secret.into(),
            feed_tx,
        }
    }

    /// Verifies the credential the way the hosted store would before
    /// running a query on its behalf.
    fn verify(&self, cred: &StoreCredential) -> Result<(), AppError> {
        cred.ensure_valid()?;
        let claims = verify_store_token(&cred.token, &self.jwt_secret)?;
        if claims.sub != cred.subject {
            return Err(AppError::AuthError(
                "Credential subject mismatch".to_string(),
            ));
        }
        Ok(())
    }

    fn verify_owner(&self, cred: &StoreCredential, learner_id: &str) -> Result<(), AppError> {
        self.verify(cred)?;
        cred.authorize(learner_id)
    }

    /// Forwards `NOTIFY feed_changes` into the subscriber channel.
    pub async fn spawn_feed_listener(&self) -> Result<JoinHandle<()>, AppError> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(FEED_CHANNEL).await?;
        let tx = self.feed_tx.clone();

        tracing::info!("Listening for feed changes on '{}'", FEED_CHANNEL);

        Ok(tokio::spawn(async move {
            loop {
                match listener.recv().await {
                    Ok(notification) => {
                        match serde_json::from_str::<FeedChange>(notification.payload()) {
                            Ok(change) => {
                                // no receivers is fine
                                let _ = tx.send(change);
                            }
                            Err(e) => {
                                tracing::warn!("Malformed feed notification: {}", e);
                            }
                        }
                    }
                    Err(e) => {
                        // PgListener reconnects on the next recv
                        tracing::error!("Feed listener error: {:?}", e);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }))
    }
}

#[async_trait]
impl ContentStore for PgStore {
    async fn fetch_learner(
        &self,
        cred: &StoreCredential,
        learner_id: &str,
    ) -> Result<Option<Learner>, AppError> {
        self.verify_owner(cred, learner_id)?;

        let row = sqlx::query_as::<_, LearnerRow>(
            r#"
            SELECT id, name, age, grade, framework, theme, parent_email, offline_mode, schedule
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(learner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch learner: {:?}", e);
            AppError::from(e)
        })?;

        row.map(Learner::try_from).transpose()
    }

    async fn insert_learner(
        &self,
        cred: &StoreCredential,
        learner: &Learner,
    ) -> Result<(), AppError> {
        self.verify_owner(cred, &learner.id)?;

        sqlx::query(
            r#"
            INSERT INTO users (id, name, age, grade, framework, theme, parent_email, offline_mode, schedule)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&learner.id)
        .bind(&learner.name)
        .bind(learner.age)
        .bind(learner.grade)
        .bind(learner.framework.as_str())
        .bind(learner.theme.as_str())
        .bind(&learner.parent_email)
        .bind(learner.offline_mode)
        .bind(Json(&learner.schedule))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e {
                if db.is_unique_violation() {
                    return AppError::Conflict("Profile already exists".to_string());
                }
            }
            tracing::error!("Failed to insert learner: {:?}", e);
            AppError::from(e)
        })?;

        Ok(())
    }

    async fn update_settings(
        &self,
        cred: &StoreCredential,
        learner_id: &str,
        settings: &Settings,
    ) -> Result<(), AppError> {
        self.verify_owner(cred, learner_id)?;

        let result = sqlx::query(
            "UPDATE users SET theme = $2, offline_mode = $3, schedule = $4 WHERE id = $1",
        )
        .bind(learner_id)
        .bind(settings.theme.as_str())
        .bind(settings.offline_mode)
        .bind(Json(&settings.schedule))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update settings: {:?}", e);
            AppError::from(e)
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Learner not found".to_string()));
        }
        Ok(())
    }

    async fn update_grade(
        &self,
        cred: &StoreCredential,
        learner_id: &str,
        grade: i32,
    ) -> Result<(), AppError> {
        self.verify_owner(cred, learner_id)?;

        let result = sqlx::query("UPDATE users SET grade = $2 WHERE id = $1")
            .bind(learner_id)
            .bind(grade)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to update grade: {:?}", e);
                AppError::from(e)
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Learner not found".to_string()));
        }
        Ok(())
    }

    async fn list_content(&self, cred: &StoreCredential) -> Result<Vec<ContentItem>, AppError> {
        self.verify(cred)?;

        let rows = sqlx::query_as::<_, ContentRow>(&format!(
            "SELECT {} FROM content_items ORDER BY id",
            CONTENT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list content: {:?}", e);
            AppError::from(e)
        })?;

        // one malformed row must not take the whole feed down
        Ok(rows
            .into_iter()
            .filter_map(|row| match ContentItem::try_from(row) {
                Ok(item) => Some(item),
                Err(e) => {
                    tracing::warn!("Skipping content row: {}", e);
                    None
                }
            })
            .collect())
    }

    async fn fetch_content(
        &self,
        cred: &StoreCredential,
        item_id: i64,
    ) -> Result<Option<ContentItem>, AppError> {
        self.verify(cred)?;

        let row = sqlx::query_as::<_, ContentRow>(&format!(
            "SELECT {} FROM content_items WHERE id = $1",
            CONTENT_COLUMNS
        ))
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ContentItem::try_from).transpose()
    }

    async fn insert_progress(
        &self,
        cred: &StoreCredential,
        progress: &NewProgress,
    ) -> Result<(), AppError> {
        self.verify_owner(cred, &progress.learner_id)?;

        sqlx::query(
            r#"
            INSERT INTO progress (user_id, item_kind, item_ref, is_correct, points)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&progress.learner_id)
        .bind(progress.target.kind())
        .bind(progress.target.reference())
        .bind(progress.correct)
        .bind(progress.points)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn learner_stats(
        &self,
        cred: &StoreCredential,
        learner_id: &str,
    ) -> Result<LearnerStats, AppError> {
        self.verify_owner(cred, learner_id)?;

        let (points, progress_count) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT COALESCE(SUM(points), 0)::BIGINT, COUNT(*)
            FROM progress
            WHERE user_id = $1
            "#,
        )
        .bind(learner_id)
        .fetch_one(&self.pool)
        .await?;

        let games_played =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM scores WHERE user_id = $1")
                .bind(learner_id)
                .fetch_one(&self.pool)
                .await?;

        let last_score = self.last_score(cred, learner_id).await?.map(|s| s.score);

        Ok(LearnerStats {
            points,
            progress_count,
            games_played,
            last_score,
        })
    }

    async fn insert_quiz_result(
        &self,
        cred: &StoreCredential,
        result: &QuizResult,
    ) -> Result<(), AppError> {
        self.verify_owner(cred, &result.learner_id)?;

        sqlx::query("INSERT INTO quiz_results (user_id, score, grade) VALUES ($1, $2, $3)")
            .bind(&result.learner_id)
            .bind(result.score)
            .bind(result.grade)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn insert_score(&self, cred: &StoreCredential, score: &GameScore) -> Result<(), AppError> {
        self.verify_owner(cred, &score.learner_id)?;

        sqlx::query("INSERT INTO scores (user_id, game, score) VALUES ($1, $2, $3)")
            .bind(&score.learner_id)
            .bind(&score.game)
            .bind(score.score)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn last_score(
        &self,
        cred: &StoreCredential,
        learner_id: &str,
    ) -> Result<Option<GameScore>, AppError> {
        self.verify_owner(cred, learner_id)?;

        let row = sqlx::query_as::<_, ScoreRow>(
            r#"
            SELECT user_id, game, score
            FROM scores
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(learner_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| GameScore {
            learner_id: r.user_id,
            game: r.game,
            score: r.score,
        }))
    }

    fn subscribe_feed(&self) -> broadcast::Receiver<FeedChange> {
        self.feed_tx.subscribe()
    }
}
