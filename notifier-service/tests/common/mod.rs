use async_trait::async_trait;
use chrono::Utc;
use event_schema::NotifyMessage;
use notifier_service::{
    config::Config, fanout, routes, state::AppState, websocket::ConnectionRegistry,
};
use session_store::{Session, SessionDirectory, SessionStoreError};
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, RwLock};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// In-memory stand-in for the Redis session registry.
///
/// Mirrors the production store's two indices — token map plus per-user
/// token set — including the staleness window: deleting a token does not
/// prune it from its user's set.
#[derive(Default)]
pub struct MemorySessions {
    sessions: RwLock<HashMap<String, Session>>,
    user_tokens: RwLock<HashMap<i64, Vec<String>>>,
}

impl MemorySessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn login(&self, token: &str, user_id: i64) {
        self.add(Session {
            token: token.to_string(),
            user_id,
            expires_at: Utc::now() + chrono::Duration::hours(1),
        })
        .await
        .unwrap();
    }
}

#[async_trait]
impl SessionDirectory for MemorySessions {
    async fn add(&self, session: Session) -> session_store::Result<()> {
        if session.token.is_empty() {
            return Err(SessionStoreError::EmptyToken);
        }
        let mut user_tokens = self.user_tokens.write().await;
        let tokens = user_tokens.entry(session.user_id).or_default();
        if !tokens.contains(&session.token) {
            tokens.push(session.token.clone());
        }
        drop(user_tokens);
        self.sessions
            .write()
            .await
            .insert(session.token.clone(), session);
        Ok(())
    }

    async fn delete_by_token(&self, token: &str) -> session_store::Result<()> {
        // Only the token mapping goes away; the user's token set keeps the
        // stale entry, exactly like the production store.
        self.sessions.write().await.remove(token);
        Ok(())
    }

    async fn session_exists(&self, token: &str) -> session_store::Result<Session> {
        self.sessions
            .read()
            .await
            .get(token)
            .filter(|session| session.expires_at > Utc::now())
            .cloned()
            .ok_or(SessionStoreError::SessionNotFound)
    }

    async fn get_tokens_by_user_id(&self, user_id: i64) -> session_store::Result<Vec<String>> {
        Ok(self
            .user_tokens
            .read()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// A notifier service wired up on an ephemeral port, with the broker
/// replaced by direct access to the fanout dispatch channel.
pub struct TestApp {
    pub addr: SocketAddr,
    pub state: AppState,
    pub dispatch: mpsc::Sender<NotifyMessage>,
    pub shutdown: watch::Sender<bool>,
}

impl TestApp {
    pub fn ws_url(&self) -> String {
        format!("ws://{}/notifications", self.addr)
    }
}

pub async fn spawn_app(sessions: Arc<dyn SessionDirectory>) -> TestApp {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let registry = ConnectionRegistry::new(8);
    let (dispatch_tx, dispatch_rx) = mpsc::channel(64);

    tokio::spawn(fanout::run(
        dispatch_rx,
        registry.clone(),
        shutdown_rx.clone(),
    ));

    let state = AppState {
        registry,
        sessions,
        config: Arc::new(Config::test_defaults()),
        shutdown: shutdown_rx,
    };
    let app = routes::build_router().with_state(state.clone());

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        addr,
        state,
        dispatch: dispatch_tx,
        shutdown: shutdown_tx,
    }
}

/// Open a WebSocket connection presenting `token` as the session cookie.
pub async fn connect(url: &str, token: &str) -> WsClient {
    let mut request = url.into_client_request().unwrap();
    request.headers_mut().insert(
        "Cookie",
        format!("session_token={token}").parse().unwrap(),
    );
    let (stream, _) = connect_async(request).await.unwrap();
    stream
}

/// Poll `condition` until it holds, or fail the test after two seconds.
pub async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..100 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not met within 2s");
}

/// Receive the next text frame and parse it as JSON.
pub async fn recv_json(stream: &mut WsClient) -> serde_json::Value {
    use futures_util::StreamExt;

    let frame = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("timed out waiting for websocket frame")
        .expect("websocket closed unexpectedly")
        .expect("websocket read failed");
    let text = frame.into_text().expect("expected a text frame");
    serde_json::from_str(text.as_str()).expect("frame is not valid JSON")
}

/// Assert that nothing further arrives on the connection for a short while.
pub async fn assert_silent(stream: &mut WsClient) {
    use futures_util::StreamExt;

    let extra = tokio::time::timeout(Duration::from_millis(200), stream.next()).await;
    assert!(extra.is_err(), "unexpected extra frame: {:?}", extra);
}
