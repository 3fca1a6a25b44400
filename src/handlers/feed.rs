use axum::{
    Extension, Json,
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast;

use super::{found, spawn_progress_write};
use crate::{
    error::AppError,
    models::{
        content::{ContentItem, ItemAnswerRequest},
        learner::Learner,
        progress::{NewProgress, ProgressTarget},
        quiz::AnswerFeedback,
    },
    services::{
        feed::{ComposedFeed, StaticLesson, compose},
        session::establish_session,
    },
    state::AppState,
    store::FeedChange,
    utils::jwt::Session,
};

/// Fetches all content and composes it for `learner`.
async fn load_feed(
    state: &AppState,
    session: &Session,
    learner: &Learner,
) -> Result<ComposedFeed, AppError> {
    let items = state.store.list_content(&session.credential).await?;
    Ok(compose(
        learner,
        items,
        &state.config.feed,
        &mut rand::thread_rng(),
    ))
}

/// Returns the composed feed for the current learner.
pub async fn get_feed(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Extension(learner): Extension<Learner>,
) -> Result<impl IntoResponse, AppError> {
    let feed = load_feed(&state, &session, &learner).await?;
    Ok(Json(feed))
}

/// Checks an answer to an educational feed item.
///
/// A correct answer credits progress in the background.
pub async fn answer_item(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Extension(learner): Extension<Learner>,
    Path(item_id): Path<i64>,
    Json(payload): Json<ItemAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let item = found(
        state
            .store
            .fetch_content(&session.credential, item_id)
            .await?,
        "Item",
    )?;

    let correct = match &item {
        ContentItem::Educational { grade, .. } if *grade > learner.grade => {
            return Err(AppError::Forbidden(
                "Item is above the learner's grade".to_string(),
            ));
        }
        ContentItem::Educational { answer, .. } => answer.matches(&payload.answer),
        _ => {
            return Err(AppError::BadRequest(
                "Only educational items can be answered".to_string(),
            ));
        }
    };

    if correct {
        spawn_progress_write(
            &state,
            &session,
            NewProgress::correct_answer(&learner.id, ProgressTarget::Content(item_id)),
        );
    }

    Ok(Json(ItemAnswerResponse {
        item_id,
        correct,
        feedback: AnswerFeedback::message(correct),
    }))
}

#[derive(Debug, Serialize)]
pub struct ItemAnswerResponse {
    pub item_id: i64,
    pub correct: bool,
    pub feedback: &'static str,
}

/// Server-to-client message on the feed socket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum FeedMessage<'a> {
    /// Full recomposed feed, sent on connect and after each change.
    Feed {
        items: &'a [ContentItem],
        lessons: &'a [StaticLesson],
    },
    Error {
        message: &'a str,
    },
}

/// WebSocket upgrade handler for live feed updates.
pub async fn feed_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Extension(learner): Extension<Learner>,
) -> Response {
    ws.on_upgrade(move |socket| handle_feed_socket(socket, state, session, learner))
}

async fn handle_feed_socket(
    socket: WebSocket,
    state: AppState,
    mut session: Session,
    learner: Learner,
) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before the first load so no change slips in between
    let mut changes = state.store.subscribe_feed();

    if let Err(e) = push_feed(&mut sender, &state, &mut session, &learner).await {
        tracing::warn!("Feed socket closed on initial send: {}", e);
        return;
    }

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!("Feed socket read error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }

            result = changes.recv() => {
                match result {
                    Ok(FeedChange { operation, item_id }) => {
                        tracing::debug!("Feed change {} on {:?}", operation, item_id);
                        if let Err(e) = push_feed(&mut sender, &state, &mut session, &learner).await {
                            tracing::warn!("Feed socket send failed: {}", e);
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("Feed subscriber lagged by {} changes", n);
                    }
                }
            }
        }
    }
}

/// Recomposes the feed and sends it. Store errors are reported to the client
/// without closing the socket; only send failures end the connection.
async fn push_feed<S>(
    sender: &mut S,
    state: &AppState,
    session: &mut Session,
    learner: &Learner,
) -> Result<(), String>
where
    S: SinkExt<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    if session.credential.is_expired() {
        match establish_session(
            state.identity.as_ref(),
            &session.identity,
            &state.config.retry,
            state.clock.as_ref(),
        )
        .await
        {
            Ok(credential) => session.credential = credential,
            Err(e) => {
                tracing::warn!("Could not refresh credential for feed socket: {}", e);
                return send_json(
                    sender,
                    &FeedMessage::Error {
                        message: "Failed to authenticate with data store",
                    },
                )
                .await;
            }
        }
    }

    match load_feed(state, session, learner).await {
        Ok(feed) => {
            send_json(
                sender,
                &FeedMessage::Feed {
                    items: &feed.items,
                    lessons: &feed.lessons,
                },
            )
            .await
        }
        Err(e) => {
            tracing::error!("Failed to recompose feed: {}", e);
            send_json(
                sender,
                &FeedMessage::Error {
                    message: "Failed to load feed",
                },
            )
            .await
        }
    }
}

async fn send_json<S, T>(sender: &mut S, msg: &T) -> Result<(), String>
where
    S: SinkExt<Message> + Unpin,
    S::Error: std::fmt::Display,
    T: Serialize,
{
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sender
        .send(Message::Text(json.into()))
        .await
        .map_err(|e| e.to_string())
}
