// src/models/quiz.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::content::{AnswerFormat, ExpectedAnswer};

/// One question of the placement quiz. Lives in memory only.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizItem {
    pub question: String,
    pub options: Vec<String>,
    pub format: AnswerFormat,
    pub answer: ExpectedAnswer,
    pub subject: String,
    /// Share of the total score, in [0, 1].
    pub weight: f64,
}

/// DTO for sending a quiz question to the client (excludes the answer).
#[derive(Debug, Serialize)]
pub struct PublicQuizItem {
    pub index: usize,
    pub question: String,
    pub options: Vec<String>,
    pub format: AnswerFormat,
    pub subject: String,
}

/// DTO for checking a single answer.
#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub index: usize,
    pub answer: String,
}

#[derive(Debug, Serialize)]
pub struct AnswerFeedback {
    pub index: usize,
    pub correct: bool,
    pub feedback: &'static str,
}

impl AnswerFeedback {
    pub fn new(index: usize, correct: bool) -> Self {
        Self {
            index,
            correct,
            feedback: Self::message(correct),
        }
    }

    pub fn message(correct: bool) -> &'static str {
        if correct { "Correct!" } else { "Try again!" }
    }
}

/// DTO for submitting the whole quiz.
///
/// Key: question index, value: the learner's answer.
#[derive(Debug, Deserialize)]
pub struct SubmitQuizRequest {
    pub answers: BTreeMap<usize, String>,
}

#[derive(Debug, Serialize)]
pub struct SubmitQuizResponse {
    pub score: f64,
    pub grade: i32,
    pub correct_count: usize,
    pub total_questions: usize,
    /// False when the grade could not be written back to the store.
    pub persisted: bool,
}

/// Represents the 'quiz_results' table in the database.
#[derive(Debug, Clone, Serialize)]
pub struct QuizResult {
    pub learner_id: String,
    pub score: f64,
    pub grade: i32,
}
