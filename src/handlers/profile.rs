use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use validator::Validate;

use crate::{
    config::MAX_GRADE,
    error::AppError,
    models::{
        learner::{Learner, ProfileSetupRequest, Schedule},
        progress::ProfileResponse,
    },
    state::AppState,
    utils::jwt::Session,
};

/// Grade assigned when neither the request nor identity metadata carry one.
const DEFAULT_GRADE: i32 = 1;

/// Creates the learner profile for the signed-in user.
///
/// Requires the parent to accept the terms. The starting grade comes from the
/// request, then from identity metadata.
pub async fn setup_profile(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(payload): Json<ProfileSetupRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    if !payload.terms_accepted {
        return Err(AppError::BadRequest(
            "Terms of service must be accepted".to_string(),
        ));
    }

    let identity = &session.identity;
    let grade = payload
        .grade
        .or(identity.grade)
        .unwrap_or(DEFAULT_GRADE)
        .clamp(0, MAX_GRADE);

    let learner = Learner {
        id: identity.id.clone(),
        name: payload.name.trim().to_string(),
        age: payload.age,
        grade,
        framework: payload.framework,
        theme: identity.theme.unwrap_or_default(),
        parent_email: payload.parent_email,
        offline_mode: false,
        schedule: Schedule::default(),
    };

    state
        .store
        .insert_learner(&session.credential, &learner)
        .await?;

    tracing::info!("Profile created for learner {}", learner.id);

    Ok((StatusCode::CREATED, Json(learner)))
}

/// Profile with points, lesson count and the last game score.
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Extension(learner): Extension<Learner>,
) -> Result<impl IntoResponse, AppError> {
    let stats = state
        .store
        .learner_stats(&session.credential, &learner.id)
        .await?;

    Ok(Json(ProfileResponse {
        age_group: learner.age_group(),
        learner,
        score: stats.last_score,
        points: stats.points,
        lessons: stats.progress_count,
        games: stats.games_played,
    }))
}
