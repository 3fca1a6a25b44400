use axum::{Extension, Json, extract::State, response::IntoResponse};

use crate::{
    error::AppError,
    models::{learner::Learner, progress::DashboardResponse},
    state::AppState,
    utils::jwt::Session,
};

/// LearnCoins are the sum of points over all progress records.
pub async fn get_dashboard(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Extension(learner): Extension<Learner>,
) -> Result<impl IntoResponse, AppError> {
    let stats = state
        .store
        .learner_stats(&session.credential, &learner.id)
        .await?;

    Ok(Json(DashboardResponse {
        age: learner.age,
        grade: learner.grade,
        learn_coins: stats.points,
    }))
}
