use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        learner::Learner,
        progress::{GameScore, GameScoreRequest},
    },
    state::AppState,
    utils::jwt::Session,
};

/// Last recorded game score, or `null` before the first game.
pub async fn get_last_score(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Extension(learner): Extension<Learner>,
) -> Result<impl IntoResponse, AppError> {
    let last = state
        .store
        .last_score(&session.credential, &learner.id)
        .await?;

    Ok(Json(json!({ "last_score": last })))
}

pub async fn record_score(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Extension(learner): Extension<Learner>,
    Json(payload): Json<GameScoreRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let score = GameScore {
        learner_id: learner.id,
        game: payload.game.trim().to_string(),
        score: payload.score,
    };
    state.store.insert_score(&session.credential, &score).await?;

    Ok((StatusCode::CREATED, Json(score)))
}
