// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppError, identity::Identity, services::session::establish_session, state::AppState,
    store::StoreCredential,
};

/// Audience and role the data store expects on minted credentials.
pub const STORE_AUDIENCE: &str = "authenticated";

/// Claims of a data-store credential.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StoreClaims {
    /// Subject - the learner id issued by the identity provider.
    pub sub: String,
    pub role: String,
    pub aud: String,
    pub iat: usize,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

/// The authenticated flow attached to a request by `auth_middleware`.
#[derive(Debug, Clone)]
pub struct Session {
    pub identity: Identity,
    pub credential: StoreCredential,
}

fn now_secs() -> Result<usize, AppError> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .as_secs() as usize)
}

/// Signs a data-store credential for `subject`.
///
/// Arguments:
/// * `subject`: Learner id.
/// * `secret`: The data store's JWT secret.
pub fn sign_store_token(
    subject: &str,
    secret: &str,
    expiration_seconds: u64,
) -> Result<StoreCredential, AppError> {
    let issued_at = now_secs()?;
    let expiration = issued_at + expiration_seconds as usize;

    let claims = StoreClaims {
        sub: subject.to_owned(),
        role: STORE_AUDIENCE.to_owned(),
        aud: STORE_AUDIENCE.to_owned(),
        iat: issued_at,
        exp: expiration,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok(StoreCredential {
        token,
        subject: subject.to_owned(),
        expires_at: expiration as i64,
    })
}

/// Verifies and decodes a data-store credential.
pub fn verify_store_token(token: &str, secret: &str) -> Result<StoreClaims, AppError> {
    let mut validation = Validation::default();
    validation.set_audience(&[STORE_AUDIENCE]);

    let token_data = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|_| AppError::AuthError("Invalid data store credential".to_string()))?;

    Ok(token_data.claims)
}

/// Reads the session token from `Authorization: Bearer` or, for websocket
/// upgrades, from the `token` query parameter.
fn session_token(req: &Request<Body>) -> Option<String> {
    let from_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_owned);

    from_header.or_else(|| {
        req.uri().query().and_then(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == "token")
                .map(|(_, value)| value.into_owned())
        })
    })
}

/// Axum Middleware: Authentication.
///
/// Probes the identity provider with the session token, then mints the
/// data-store credential before the handler runs. Injects `Session` into the
/// request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = session_token(&req).ok_or(AppError::AuthError("Please sign in".to_string()))?;

    let identity = state
        .identity
        .current_user(&token)
        .await?
        .require_identity()?;

    let credential = establish_session(
        state.identity.as_ref(),
        &identity,
        &state.config.retry,
        state.clock.as_ref(),
    )
    .await?;

    req.extensions_mut().insert(Session {
        identity,
        credential,
    });
    Ok(next.run(req).await)
}

/// Axum Middleware: Profile gate.
///
/// Must be used AFTER `auth_middleware`. Loads the learner profile and
/// injects it; learners without a profile get 403 until setup is done.
pub async fn profile_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let session = req
        .extensions()
        .get::<Session>()
        .cloned()
        .ok_or(AppError::AuthError("Please sign in".to_string()))?;

    let learner = state
        .store
        .fetch_learner(&session.credential, &session.identity.id)
        .await?
        .ok_or(AppError::Forbidden("Profile setup required".to_string()))?;

    req.extensions_mut().insert(learner);
    Ok(next.run(req).await)
}
