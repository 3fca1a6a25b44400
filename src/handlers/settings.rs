use axum::{Extension, Json, extract::State, response::IntoResponse};
use validator::Validate;

use crate::{
    error::AppError,
    models::learner::{Learner, Settings, SettingsUpdate},
    state::AppState,
    utils::jwt::Session,
};

pub async fn get_settings(Extension(learner): Extension<Learner>) -> impl IntoResponse {
    Json(Settings::from(&learner))
}

/// Applies a partial settings update. Selecting all seven days overrides the
/// individual day list.
pub async fn update_settings(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Extension(learner): Extension<Learner>,
    Json(payload): Json<SettingsUpdate>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let mut settings = Settings::from(&learner);
    payload.apply(&mut settings);

    state
        .store
        .update_settings(&session.credential, &learner.id, &settings)
        .await?;

    Ok(Json(settings))
}
