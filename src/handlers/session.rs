use axum::{Extension, Json, extract::State, response::IntoResponse};
use serde::Serialize;

use crate::{error::AppError, identity::Identity, state::AppState, utils::jwt::Session};

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub is_loaded: bool,
    pub is_signed_in: bool,
    pub identity: Identity,
    /// False until the learner has finished profile setup.
    pub profile_complete: bool,
}

/// Sign-in probe. Tells the client whether to route to setup or the feed.
pub async fn get_session(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, AppError> {
    let learner = state
        .store
        .fetch_learner(&session.credential, &session.identity.id)
        .await?;

    Ok(Json(SessionResponse {
        is_loaded: true,
        is_signed_in: true,
        identity: session.identity,
        profile_complete: learner.is_some(),
    }))
}
