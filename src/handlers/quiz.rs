// src/handlers/quiz.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};

use super::spawn_progress_write;
use crate::{
    error::AppError,
    models::{
        learner::Learner,
        progress::{NewProgress, ProgressTarget},
        quiz::{AnswerFeedback, AnswerRequest, QuizResult, SubmitQuizRequest, SubmitQuizResponse},
    },
    state::AppState,
    utils::jwt::Session,
};

/// Returns the placement quiz without answers.
pub async fn get_quiz(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.quiz.public_items()))
}

/// Checks a single answer and gives immediate feedback.
///
/// A correct answer is credited in the background; the response never waits
/// on the store.
pub async fn answer_question(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Extension(learner): Extension<Learner>,
    Json(payload): Json<AnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let correct = state.quiz.check(payload.index, &payload.answer)?;

    if correct {
        spawn_progress_write(
            &state,
            &session,
            NewProgress::correct_answer(&learner.id, ProgressTarget::Quiz(payload.index)),
        );
    }

    Ok(Json(AnswerFeedback::new(payload.index, correct)))
}

/// Grades the whole quiz and writes the placement back.
///
/// Logic:
/// 1. Reject unless every question is answered.
/// 2. Compute the weighted score and placement grade.
/// 3. Update the learner's grade and append the result. The two writes are
///    independent; `persisted` reports whether both landed.
pub async fn submit_quiz(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Extension(learner): Extension<Learner>,
    Json(payload): Json<SubmitQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let placement = state.quiz.grade(learner.age, &payload.answers)?;

    let mut persisted = true;

    if let Err(e) = state
        .store
        .update_grade(&session.credential, &learner.id, placement.grade)
        .await
    {
        tracing::error!("Failed to update grade for {}: {:?}", learner.id, e);
        persisted = false;
    }

    let result = QuizResult {
        learner_id: learner.id.clone(),
        score: placement.score,
        grade: placement.grade,
    };
    if let Err(e) = state
        .store
        .insert_quiz_result(&session.credential, &result)
        .await
    {
        tracing::error!("Failed to record quiz result for {}: {:?}", learner.id, e);
        persisted = false;
    }

    tracing::info!(
        "Learner {} placed at grade {} (score {:.2})",
        learner.id,
        placement.grade,
        placement.score
    );

    Ok(Json(SubmitQuizResponse {
        score: placement.score,
        grade: placement.grade,
        correct_count: placement.correct_count,
        total_questions: state.quiz.len(),
        persisted,
    }))
}
