// src/models/content.rs

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use url::Url;

use crate::error::AppError;

/// Answer format of an educational item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerFormat {
    MultipleChoice,
    FillInWord,
    OrderedDrag,
}

impl AnswerFormat {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw {
            "multiple_choice" => Ok(AnswerFormat::MultipleChoice),
            "fill_in_word" => Ok(AnswerFormat::FillInWord),
            "ordered_drag" => Ok(AnswerFormat::OrderedDrag),
            other => Err(AppError::InternalServerError(format!(
                "unknown answer format '{}'",
                other
            ))),
        }
    }
}

/// How a submitted answer is checked.
///
/// `Exact` compares byte-for-byte against the "correct" value, `Word`
/// compares case-insensitively against the "word" value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedAnswer {
    Exact(String),
    Word(String),
}

impl ExpectedAnswer {
    pub fn matches(&self, answer: &str) -> bool {
        match self {
            ExpectedAnswer::Exact(correct) => answer == correct,
            ExpectedAnswer::Word(word) => answer.to_lowercase() == word.to_lowercase(),
        }
    }

    /// Builds the answer from the two nullable storage columns.
    /// Exactly one of them must be populated.
    pub fn from_fields(correct: Option<String>, word: Option<String>) -> Result<Self, AppError> {
        match (correct, word) {
            (Some(correct), None) => Ok(ExpectedAnswer::Exact(correct)),
            (None, Some(word)) => Ok(ExpectedAnswer::Word(word)),
            (Some(_), Some(_)) => Err(AppError::InternalServerError(
                "answer has both correct and word set".to_string(),
            )),
            (None, None) => Err(AppError::InternalServerError(
                "answer has neither correct nor word set".to_string(),
            )),
        }
    }
}

/// A piece of feed content. Created outside this service; read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentItem {
    Social {
        id: i64,
        age_group: String,
        author: Option<String>,
        body: String,
    },
    Educational {
        id: i64,
        age_group: String,
        subject: String,
        standard: String,
        /// Minimum learner grade the item is shown to.
        grade: i32,
        question: String,
        format: AnswerFormat,
        options: Vec<String>,
        #[serde(skip_serializing)]
        answer: ExpectedAnswer,
    },
    Game {
        id: i64,
        age_group: String,
        name: String,
        link: String,
    },
}

impl ContentItem {
    pub fn id(&self) -> i64 {
        match self {
            ContentItem::Social { id, .. }
            | ContentItem::Educational { id, .. }
            | ContentItem::Game { id, .. } => *id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ContentItem::Social { .. } => "social",
            ContentItem::Educational { .. } => "educational",
            ContentItem::Game { .. } => "game",
        }
    }
}

/// Represents the 'content_items' table in the database.
/// One wide row per item; the `kind` column selects which columns are meaningful.
#[derive(Debug, Clone, FromRow)]
pub struct ContentRow {
    pub id: i64,
    pub kind: String,
    pub age_group: String,
    pub author_id: Option<String>,
    pub body: Option<String>,
    pub subject: Option<String>,
    pub standard: Option<String>,
    pub grade: Option<i32>,
    pub question: Option<String>,
    pub format: Option<String>,
    pub options: Option<Json<Vec<String>>>,
    pub correct_answer: Option<String>,
    pub word: Option<String>,
    pub game_name: Option<String>,
    pub link: Option<String>,
}

fn required<T>(value: Option<T>, id: i64, column: &str) -> Result<T, AppError> {
    value.ok_or_else(|| {
        AppError::InternalServerError(format!("content item {} is missing {}", id, column))
    })
}

impl TryFrom<ContentRow> for ContentItem {
    type Error = AppError;

    fn try_from(row: ContentRow) -> Result<Self, Self::Error> {
        let id = row.id;
        match row.kind.as_str() {
            "social" => Ok(ContentItem::Social {
                id,
                age_group: row.age_group,
                author: row.author_id,
                body: required(row.body, id, "body")?,
            }),
            "educational" => Ok(ContentItem::Educational {
                id,
                age_group: row.age_group,
                subject: required(row.subject, id, "subject")?,
                standard: row.standard.unwrap_or_default(),
                grade: required(row.grade, id, "grade")?,
                question: required(row.question, id, "question")?,
                format: AnswerFormat::parse(&required(row.format, id, "format")?)?,
                options: row.options.map(|o| o.0).unwrap_or_default(),
                answer: ExpectedAnswer::from_fields(row.correct_answer, row.word)?,
            }),
            "game" => {
                let link = required(row.link, id, "link")?;
                if Url::parse(&link).is_err() {
                    return Err(AppError::InternalServerError(format!(
                        "content item {} has an invalid link",
                        id
                    )));
                }
                Ok(ContentItem::Game {
                    id,
                    age_group: row.age_group,
                    name: required(row.game_name, id, "game_name")?,
                    link,
                })
            }
            other => Err(AppError::InternalServerError(format!(
                "content item {} has unknown kind '{}'",
                id, other
            ))),
        }
    }
}

/// DTO for answering an educational item from the feed.
#[derive(Debug, Deserialize)]
pub struct ItemAnswerRequest {
    pub answer: String,
}
