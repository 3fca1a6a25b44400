// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{dashboard, feed, game, pages, profile, quiz, session, settings},
    state::AppState,
    utils::jwt::{auth_middleware, profile_middleware},
};

/// Assembles the main application router.
///
/// * Open routes: home and terms.
/// * Signed-in routes: session probe and profile setup.
/// * Learner routes: everything that needs a completed profile.
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let public_routes = Router::new()
        .route("/", get(pages::home))
        .route("/terms", get(pages::terms));

    let signed_in_routes = Router::new()
        .route("/session", get(session::get_session))
        .route("/profile/setup", post(profile::setup_profile))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let learner_routes = Router::new()
        .route("/profile", get(profile::get_profile))
        .route("/feed", get(feed::get_feed))
        .route("/feed/ws", get(feed::feed_ws))
        .route("/feed/items/{id}/answer", post(feed::answer_item))
        .route("/quiz", get(quiz::get_quiz))
        .route("/quiz/answer", post(quiz::answer_question))
        .route("/quiz/submit", post(quiz::submit_quiz))
        .route(
            "/game/score",
            get(game::get_last_score).post(game::record_score),
        )
        .route(
            "/settings",
            get(settings::get_settings).put(settings::update_settings),
        )
        .route("/dashboard", get(dashboard::get_dashboard))
        // Auth first, then the profile gate
        .layer(middleware::from_fn_with_state(
            state.clone(),
            profile_middleware,
        ))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let api = Router::new()
        .merge(public_routes)
        .merge(signed_in_routes)
        .merge(learner_routes);

    Router::new()
        .nest("/api", api)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
