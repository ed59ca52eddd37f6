use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;
use futures_util::{SinkExt, StreamExt};
use session_store::{Session, SessionStoreError};
use tracing::{debug, warn};

use crate::error::AppError;
use crate::state::AppState;

/// Cookie the client presents at connection-establishment time.
pub const SESSION_COOKIE: &str = "session_token";

/// `GET /notifications` — authenticate the session token, then upgrade.
///
/// A missing or unknown token rejects the connection before the upgrade
/// happens; an unreachable session store is not an auth failure and maps to
/// 503 instead.
pub async fn notifications_ws(
    State(state): State<AppState>,
    jar: CookieJar,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        return AppError::Unauthorized.into_response();
    };
    let token = cookie.value().to_string();

    match state.sessions.session_exists(&token).await {
        Ok(session) => ws.on_upgrade(move |socket| handle_socket(state, session, token, socket)),
        Err(SessionStoreError::SessionNotFound | SessionStoreError::EmptyToken) => {
            AppError::Unauthorized.into_response()
        }
        Err(err) => {
            warn!(error = %err, "session validation failed");
            AppError::SessionStore(err).into_response()
        }
    }
}

/// Pump loop for one authorized connection.
///
/// Multiplexes the outbound queue, inbound client frames and the process
/// shutdown signal. The endpoint is push-only: inbound frames other than
/// close are ignored.
async fn handle_socket(state: AppState, session: Session, token: String, socket: WebSocket) {
    let (id, mut queue) = state.registry.register(&token).await;
    debug!(user_id = session.user_id, "websocket connected");

    let (mut sender, mut receiver) = socket.split();
    let mut shutdown = state.shutdown.clone();

    loop {
        tokio::select! {
            outbound = queue.recv() => match outbound {
                Some(payload) => {
                    if sender.send(Message::Text(payload)).await.is_err() {
                        break;
                    }
                }
                // Queue closed: this registration was superseded by a newer
                // connection for the same token. Close the socket actively
                // instead of lingering until the client disconnects.
                None => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            },
            inbound = receiver.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    debug!(user_id = session.user_id, error = %err, "websocket read failed");
                    break;
                }
            },
            _ = shutdown.changed() => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
        }
    }

    if state.registry.deregister(&token, id).await {
        debug!(user_id = session.user_id, "websocket disconnected");
    }
}
