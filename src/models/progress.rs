// src/models/progress.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::config::POINTS_PER_CORRECT;

/// What a progress record was earned on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "ref", rename_all = "snake_case")]
pub enum ProgressTarget {
    /// A content item from the feed, by item id.
    Content(i64),
    /// A placement-quiz question, by index.
    Quiz(usize),
}

impl ProgressTarget {
    pub fn kind(&self) -> &'static str {
        match self {
            ProgressTarget::Content(_) => "content",
            ProgressTarget::Quiz(_) => "quiz",
        }
    }

    pub fn reference(&self) -> i64 {
        match self {
            ProgressTarget::Content(id) => *id,
            ProgressTarget::Quiz(index) => *index as i64,
        }
    }
}

/// An append-only progress entry. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewProgress {
    pub learner_id: String,
    pub target: ProgressTarget,
    pub correct: bool,
    pub points: i32,
}

impl NewProgress {
    pub fn correct_answer(learner_id: &str, target: ProgressTarget) -> Self {
        Self {
            learner_id: learner_id.to_string(),
            target,
            correct: true,
            points: POINTS_PER_CORRECT,
        }
    }
}

/// Aggregates shown on the profile and dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LearnerStats {
    pub points: i64,
    pub progress_count: i64,
    pub games_played: i64,
    pub last_score: Option<i32>,
}

/// DTO for recording a finished game.
#[derive(Debug, Deserialize, Validate)]
pub struct GameScoreRequest {
    #[validate(length(min = 1, max = 50))]
    pub game: String,
    #[validate(range(min = 0, max = 1_000_000))]
    pub score: i32,
}

/// Represents the 'scores' table in the database.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameScore {
    pub learner_id: String,
    pub game: String,
    pub score: i32,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub age: i32,
    pub grade: i32,
    pub learn_coins: i64,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub learner: crate::models::learner::Learner,
    pub age_group: &'static str,
    pub score: Option<i32>,
    pub points: i64,
    pub lessons: i64,
    pub games: i64,
}
