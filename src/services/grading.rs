//! Placement quiz grading.

use std::collections::BTreeMap;

use crate::{
    config::MAX_GRADE,
    error::AppError,
    models::{
        content::{AnswerFormat, ExpectedAnswer},
        quiz::{PublicQuizItem, QuizItem},
    },
};

const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Absorbs float noise such as 0.99999999 in a perfect score.
const GRADE_EPSILON: f64 = 1e-9;

/// A validated, ordered quiz whose weights sum to 1.0.
#[derive(Debug, Clone)]
pub struct Quiz {
    items: Vec<QuizItem>,
}

impl Quiz {
    pub fn new(items: Vec<QuizItem>) -> Result<Self, AppError> {
        if items.is_empty() {
            return Err(AppError::BadRequest("Quiz has no questions".to_string()));
        }
        if let Some(item) = items.iter().find(|i| !(0.0..=1.0).contains(&i.weight)) {
            return Err(AppError::BadRequest(format!(
                "Weight {} of '{}' is outside [0, 1]",
                item.weight, item.question
            )));
        }
        let total: f64 = items.iter().map(|i| i.weight).sum();
        if (total - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(AppError::BadRequest(format!(
                "Quiz weights sum to {}, expected 1.0",
                total
            )));
        }
        Ok(Self { items })
    }

    /// The built-in three-question placement quiz.
    pub fn placement() -> Self {
        let items = vec![
            QuizItem {
                question: "What is 1 + 1?".to_string(),
                options: vec!["1".to_string(), "2".to_string(), "3".to_string()],
                format: AnswerFormat::MultipleChoice,
                answer: ExpectedAnswer::Exact("2".to_string()),
                subject: "Math".to_string(),
                weight: 0.4,
            },
            QuizItem {
                question: "Spell 'Cat'".to_string(),
                options: Vec::new(),
                format: AnswerFormat::FillInWord,
                answer: ExpectedAnswer::Word("Cat".to_string()),
                subject: "English".to_string(),
                weight: 0.3,
            },
            QuizItem {
                question: "What is the largest planet?".to_string(),
                options: vec![
                    "Earth".to_string(),
                    "Jupiter".to_string(),
                    "Mars".to_string(),
                ],
                format: AnswerFormat::MultipleChoice,
                answer: ExpectedAnswer::Exact("Jupiter".to_string()),
                subject: "Science".to_string(),
                weight: 0.3,
            },
        ];
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&QuizItem, AppError> {
        self.items
            .get(index)
            .ok_or_else(|| AppError::BadRequest(format!("Question {} does not exist", index)))
    }

    pub fn public_items(&self) -> Vec<PublicQuizItem> {
        self.items
            .iter()
            .enumerate()
            .map(|(index, q)| PublicQuizItem {
                index,
                question: q.question.clone(),
                options: q.options.clone(),
                format: q.format,
                subject: q.subject.clone(),
            })
            .collect()
    }

    /// Checks one answer. Errors if the index is out of range.
    pub fn check(&self, index: usize, answer: &str) -> Result<bool, AppError> {
        Ok(is_correct(self.get(index)?, answer))
    }

    /// Sum of weights over answered, correct questions.
    /// Answers for unknown indices are ignored.
    pub fn weighted_score(&self, answers: &BTreeMap<usize, String>) -> f64 {
        answers
            .iter()
            .filter_map(|(i, ans)| self.items.get(*i).map(|item| (item, ans)))
            .filter(|(item, ans)| is_correct(item, ans))
            .map(|(item, _)| item.weight)
            .sum()
    }

    pub fn correct_count(&self, answers: &BTreeMap<usize, String>) -> usize {
        answers
            .iter()
            .filter(|(i, ans)| self.items.get(**i).is_some_and(|item| is_correct(item, ans)))
            .count()
    }

    /// Grades a full submission. Every question must have an answer.
    pub fn grade(&self, age: i32, answers: &BTreeMap<usize, String>) -> Result<Placement, AppError> {
        let missing: Vec<usize> = (0..self.items.len())
            .filter(|i| !answers.contains_key(i))
            .collect();
        if !missing.is_empty() {
            return Err(AppError::BadRequest(format!(
                "All questions must be answered (missing {:?})",
                missing
            )));
        }

        let score = self.weighted_score(answers);
        Ok(Placement {
            score,
            grade: placement_grade(age, score),
            correct_count: self.correct_count(answers),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub score: f64,
    pub grade: i32,
    pub correct_count: usize,
}

pub fn is_correct(item: &QuizItem, answer: &str) -> bool {
    item.answer.matches(answer)
}

/// `floor(age * 0.5 + score * 6)`, clamped to `0..=MAX_GRADE`.
pub fn placement_grade(age: i32, score: f64) -> i32 {
    let raw = (age as f64 * 0.5 + score * 6.0 + GRADE_EPSILON).floor();
    (raw as i32).clamp(0, MAX_GRADE)
}
