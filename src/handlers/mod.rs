// src/handlers/mod.rs

pub mod dashboard;
pub mod feed;
pub mod game;
pub mod pages;
pub mod profile;
pub mod quiz;
pub mod session;
pub mod settings;

use crate::{error::AppError, models::progress::NewProgress, state::AppState, utils::jwt::Session};

/// Records progress without holding up the response.
///
/// A failed write is logged and otherwise dropped.
pub(crate) fn spawn_progress_write(state: &AppState, session: &Session, progress: NewProgress) {
    let store = state.store.clone();
    let credential = session.credential.clone();
    tokio::spawn(async move {
        if let Err(e) = store.insert_progress(&credential, &progress).await {
            tracing::error!(
                "Failed to record progress for {}: {:?}",
                progress.learner_id,
                e
            );
        }
    });
}

/// Maps a missing resource to 404.
pub(crate) fn found<T>(value: Option<T>, what: &str) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::NotFound(format!("{} not found", what)))
}
