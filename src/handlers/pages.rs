use axum::{Json, response::IntoResponse};
use serde_json::json;

/// Landing page data for signed-out visitors.
pub async fn home() -> impl IntoResponse {
    Json(json!({
        "name": "EduGrok",
        "tagline": "Learning feeds for homeschoolers",
        "sign_in_required": true,
    }))
}

pub async fn terms() -> impl IntoResponse {
    Json(json!({
        "title": "Terms of Service",
        "sections": [
            "EduGrok is intended for learners under parental supervision.",
            "A parent or guardian must accept these terms during profile setup.",
            "Social posts are filtered, but parents remain responsible for supervision.",
            "Progress, quiz results and game scores are stored with the data provider.",
        ],
    }))
}
