//! In-process content store for tests and local demos.

use std::collections::HashMap;
use std::sync::{
    Mutex, MutexGuard,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{ContentStore, FEED_CHANNEL_CAPACITY, FeedChange, StoreCredential};
use crate::{
    error::AppError,
    models::{
        content::ContentItem,
        learner::{Learner, Settings},
        progress::{GameScore, LearnerStats, NewProgress},
        quiz::QuizResult,
    },
};

#[derive(Default)]
struct Tables {
    learners: HashMap<String, Learner>,
    content: Vec<ContentItem>,
    progress: Vec<NewProgress>,
    quiz_results: Vec<QuizResult>,
    scores: Vec<GameScore>,
}

pub struct MemoryStore {
    tables: Mutex<Tables>,
    feed_tx: broadcast::Sender<FeedChange>,
    fail_writes: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (feed_tx, _) = broadcast::channel(FEED_CHANNEL_CAPACITY);
        Self {
            tables: Mutex::new(Tables::default()),
            feed_tx,
            fail_writes: AtomicBool::new(false),
        }
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, AppError> {
        self.tables
            .lock()
            .map_err(|_| AppError::InternalServerError("memory store poisoned".to_string()))
    }

    fn check_writable(&self) -> Result<(), AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::InternalServerError(
                "memory store rejected the write".to_string(),
            ));
        }
        Ok(())
    }

    /// Makes every subsequent write fail, to exercise degraded paths.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Adds content the way an administrator would, and notifies subscribers.
    pub fn seed_content(&self, item: ContentItem) -> Result<(), AppError> {
        let item_id = item.id();
        self.tables()?.content.push(item);
        // no receivers is fine
        let _ = self.feed_tx.send(FeedChange {
            operation: "INSERT".to_string(),
            item_id: Some(item_id),
        });
        Ok(())
    }

    pub fn progress_for(&self, learner_id: &str) -> Vec<NewProgress> {
        self.tables()
            .map(|t| {
                t.progress
                    .iter()
                    .filter(|p| p.learner_id == learner_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn quiz_results_for(&self, learner_id: &str) -> Vec<QuizResult> {
        self.tables()
            .map(|t| {
                t.quiz_results
                    .iter()
                    .filter(|r| r.learner_id == learner_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn fetch_learner(
        &self,
        cred: &StoreCredential,
        learner_id: &str,
    ) -> Result<Option<Learner>, AppError> {
        cred.authorize(learner_id)?;
        Ok(self.tables()?.learners.get(learner_id).cloned())
    }

    async fn insert_learner(
        &self,
        cred: &StoreCredential,
        learner: &Learner,
    ) -> Result<(), AppError> {
        cred.authorize(&learner.id)?;
        self.check_writable()?;
        let mut tables = self.tables()?;
        if tables.learners.contains_key(&learner.id) {
            return Err(AppError::Conflict("Profile already exists".to_string()));
        }
        tables.learners.insert(learner.id.clone(), learner.clone());
        Ok(())
    }

    async fn update_settings(
        &self,
        cred: &StoreCredential,
        learner_id: &str,
        settings: &Settings,
    ) -> Result<(), AppError> {
        cred.authorize(learner_id)?;
        self.check_writable()?;
        let mut tables = self.tables()?;
        match tables.learners.get_mut(learner_id) {
            Some(existing) => {
                existing.theme = settings.theme;
                existing.offline_mode = settings.offline_mode;
                existing.schedule = settings.schedule.clone();
                Ok(())
            }
            None => Err(AppError::NotFound("Learner not found".to_string())),
        }
    }

    async fn update_grade(
        &self,
        cred: &StoreCredential,
        learner_id: &str,
        grade: i32,
    ) -> Result<(), AppError> {
        cred.authorize(learner_id)?;
        self.check_writable()?;
        let mut tables = self.tables()?;
        let learner = tables
            .learners
            .get_mut(learner_id)
            .ok_or(AppError::NotFound("Learner not found".to_string()))?;
        learner.grade = grade;
        Ok(())
    }

    async fn list_content(&self, cred: &StoreCredential) -> Result<Vec<ContentItem>, AppError> {
        cred.ensure_valid()?;
        Ok(self.tables()?.content.clone())
    }

    async fn fetch_content(
        &self,
        cred: &StoreCredential,
        item_id: i64,
    ) -> Result<Option<ContentItem>, AppError> {
        cred.ensure_valid()?;
        Ok(self
            .tables()?
            .content
            .iter()
            .find(|i| i.id() == item_id)
            .cloned())
    }

    async fn insert_progress(
        &self,
        cred: &StoreCredential,
        progress: &NewProgress,
    ) -> Result<(), AppError> {
        cred.authorize(&progress.learner_id)?;
        self.check_writable()?;
        self.tables()?.progress.push(progress.clone());
        Ok(())
    }

    async fn learner_stats(
        &self,
        cred: &StoreCredential,
        learner_id: &str,
    ) -> Result<LearnerStats, AppError> {
        cred.authorize(learner_id)?;
        let tables = self.tables()?;
        let progress: Vec<&NewProgress> = tables
            .progress
            .iter()
            .filter(|p| p.learner_id == learner_id)
            .collect();
        let scores: Vec<&GameScore> = tables
            .scores
            .iter()
            .filter(|s| s.learner_id == learner_id)
            .collect();

        Ok(LearnerStats {
            points: progress.iter().map(|p| p.points as i64).sum(),
            progress_count: progress.len() as i64,
            games_played: scores.len() as i64,
            last_score: scores.last().map(|s| s.score),
        })
    }

    async fn insert_quiz_result(
        &self,
        cred: &StoreCredential,
        result: &QuizResult,
    ) -> Result<(), AppError> {
        cred.authorize(&result.learner_id)?;
        self.check_writable()?;
        self.tables()?.quiz_results.push(result.clone());
        Ok(())
    }

    async fn insert_score(&self, cred: &StoreCredential, score: &GameScore) -> Result<(), AppError> {
        cred.authorize(&score.learner_id)?;
        self.check_writable()?;
        self.tables()?.scores.push(score.clone());
        Ok(())
    }

    async fn last_score(
        &self,
        cred: &StoreCredential,
        learner_id: &str,
    ) -> Result<Option<GameScore>, AppError> {
        cred.authorize(learner_id)?;
        Ok(self
            .tables()?
            .scores
            .iter()
            .rev()
            .find(|s| s.learner_id == learner_id)
            .cloned())
    }

    fn subscribe_feed(&self) -> broadcast::Receiver<FeedChange> {
        self.feed_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        learner::{Framework, Schedule, Theme},
        progress::ProgressTarget,
    };

    fn learner(id: &str) -> Learner {
        Learner {
            id: id.to_string(),
            name: "Ada".to_string(),
            age: 10,
            grade: 4,
            framework: Framework::Cambridge,
            theme: Theme::Dark,
            parent_email: None,
            offline_mode: false,
            schedule: Schedule::default(),
        }
    }

    #[tokio::test]
    async fn test_insert_then_conflict() {
        let store = MemoryStore::new();
        let cred = StoreCredential::for_subject("user_1");
        store.insert_learner(&cred, &learner("user_1")).await.unwrap();
        assert!(matches!(
            store.insert_learner(&cred, &learner("user_1")).await,
            Err(AppError::Conflict(_))
        ));
        let fetched = store.fetch_learner(&cred, "user_1").await.unwrap().unwrap();
        assert_eq!(fetched.framework, Framework::Cambridge);
    }

    #[tokio::test]
    async fn test_cannot_write_for_another_learner() {
        let store = MemoryStore::new();
        let cred = StoreCredential::for_subject("user_1");
        assert!(matches!(
            store.insert_learner(&cred, &learner("user_2")).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_progress_is_append_only_and_summed() {
        let store = MemoryStore::new();
        let cred = StoreCredential::for_subject("user_1");
        let record = NewProgress::correct_answer("user_1", ProgressTarget::Quiz(0));
        store.insert_progress(&cred, &record).await.unwrap();
        store.insert_progress(&cred, &record).await.unwrap();
        store
            .insert_score(
                &cred,
                &GameScore {
                    learner_id: "user_1".to_string(),
                    game: "Space Invaders".to_string(),
                    score: 40,
                },
            )
            .await
            .unwrap();

        let stats = store.learner_stats(&cred, "user_1").await.unwrap();
        assert_eq!(stats.points, 20);
        assert_eq!(stats.progress_count, 2);
        assert_eq!(stats.games_played, 1);
        assert_eq!(stats.last_score, Some(40));
    }

    #[tokio::test]
    async fn test_seed_notifies_subscribers() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe_feed();
        store
            .seed_content(ContentItem::Social {
                id: 5,
                age_group: "6-8".to_string(),
                author: None,
                body: "fun".to_string(),
            })
            .unwrap();
        let change = rx.recv().await.unwrap();
        assert_eq!(change.item_id, Some(5));
    }

    #[tokio::test]
    async fn test_failed_writes_leave_state_untouched() {
        let store = MemoryStore::new();
        let cred = StoreCredential::for_subject("user_1");
        store.insert_learner(&cred, &learner("user_1")).await.unwrap();
        store.set_fail_writes(true);
        assert!(store.update_grade(&cred, "user_1", 9).await.is_err());
        store.set_fail_writes(false);
        let fetched = store.fetch_learner(&cred, "user_1").await.unwrap().unwrap();
        assert_eq!(fetched.grade, 4);
    }

    #[tokio::test]
    async fn test_settings_write_keeps_newer_grade() {
        let store = MemoryStore::new();
        let cred = StoreCredential::for_subject("user_1");
        store.insert_learner(&cred, &learner("user_1")).await.unwrap();

        // a settings request loaded its copy before the quiz regraded
        let stale = store.fetch_learner(&cred, "user_1").await.unwrap().unwrap();
        store.update_grade(&cred, "user_1", 11).await.unwrap();

        let mut settings = Settings::from(&stale);
        settings.offline_mode = true;
        store.update_settings(&cred, "user_1", &settings).await.unwrap();

        let fetched = store.fetch_learner(&cred, "user_1").await.unwrap().unwrap();
        assert_eq!(fetched.grade, 11);
        assert!(fetched.offline_mode);
        assert_eq!(fetched.theme, Theme::Dark);
    }

    #[tokio::test]
    async fn test_settings_for_missing_learner() {
        let store = MemoryStore::new();
        let cred = StoreCredential::for_subject("user_1");
        let settings = Settings::from(&learner("user_1"));
        assert!(matches!(
            store.update_settings(&cred, "user_1", &settings).await,
            Err(AppError::NotFound(_))
        ));
    }
}
