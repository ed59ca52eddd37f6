//! Redis-backed session registry.
//!
//! Maps each session token to its owning user and keeps a per-user index of
//! the tokens currently valid for that user, so the notification pipeline
//! can resolve "trip member" into "live session tokens". Both mappings are
//! TTL-bound to the session expiry set at login.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// Shared Redis connection manager guarded by a Tokio mutex.
pub type SharedConnectionManager = Arc<Mutex<ConnectionManager>>;

/// Open a shared connection manager for the given Redis URL.
pub async fn connect(redis_url: &str) -> Result<SharedConnectionManager, SessionStoreError> {
    let client = Client::open(redis_url)?;
    let manager = ConnectionManager::new(client).await?;
    Ok(Arc::new(Mutex::new(manager)))
}

pub type Result<T, E = SessionStoreError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session token is empty")]
    EmptyToken,

    #[error("session is already expired")]
    InvalidExpiry,

    #[error("session not found")]
    SessionNotFound,

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// A logged-in user's session: the opaque token handed to the client plus
/// its owner and expiry. A user may hold several concurrently (multi-device).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
}

/// Storage seam for session lookups.
///
/// The composer resolves recipients through it and the notifier gateway
/// authenticates connections against it; tests substitute an in-memory
/// implementation.
#[async_trait]
pub trait SessionDirectory: Send + Sync {
    async fn add(&self, session: Session) -> Result<()>;

    async fn delete_by_token(&self, token: &str) -> Result<()>;

    /// Resolves a token to its session, or `SessionNotFound`.
    async fn session_exists(&self, token: &str) -> Result<Session>;

    /// All tokens currently indexed for the user. An unknown user is not an
    /// error; it simply has no tokens.
    async fn get_tokens_by_user_id(&self, user_id: i64) -> Result<Vec<String>>;
}

fn session_key(token: &str) -> String {
    format!("session:{token}")
}

fn user_sessions_key(user_id: i64) -> String {
    format!("user_sessions:{user_id}")
}

/// Remaining lifetime of the session in whole seconds, validated.
fn ttl_for(session: &Session) -> Result<u64> {
    if session.token.is_empty() {
        return Err(SessionStoreError::EmptyToken);
    }
    let ttl = (session.expires_at - Utc::now()).num_seconds();
    if ttl <= 0 {
        return Err(SessionStoreError::InvalidExpiry);
    }
    Ok(ttl as u64)
}

#[derive(Clone)]
pub struct RedisSessionStore {
    conn: SharedConnectionManager,
}

impl RedisSessionStore {
    pub fn new(conn: SharedConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl SessionDirectory for RedisSessionStore {
    async fn add(&self, session: Session) -> Result<()> {
        let ttl = ttl_for(&session)?;
        let token_key = session_key(&session.token);
        let set_key = user_sessions_key(session.user_id);

        // The token mapping and the user index must expire together; the set
        // TTL is refreshed to the newest session's lifetime on every add.
        let mut conn = self.conn.lock().await;
        redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(&token_key)
            .arg(session.user_id)
            .arg("EX")
            .arg(ttl)
            .ignore()
            .cmd("SADD")
            .arg(&set_key)
            .arg(&session.token)
            .ignore()
            .cmd("EXPIRE")
            .arg(&set_key)
            .arg(ttl)
            .ignore()
            .query_async::<_, ()>(&mut *conn)
            .await?;
        Ok(())
    }

    async fn delete_by_token(&self, token: &str) -> Result<()> {
        if token.is_empty() {
            return Err(SessionStoreError::EmptyToken);
        }
        // The token stays in its user's set until the set TTL lapses; the
        // fanout path treats dead tokens as not-connected, so the stale
        // entry costs one no-op lookup at most.
        let mut conn = self.conn.lock().await;
        conn.del::<_, ()>(session_key(token)).await?;
        Ok(())
    }

    async fn session_exists(&self, token: &str) -> Result<Session> {
        if token.is_empty() {
            return Err(SessionStoreError::EmptyToken);
        }
        let key = session_key(token);

        let mut conn = self.conn.lock().await;
        let (user_id, ttl): (Option<i64>, i64) = redis::pipe()
            .atomic()
            .cmd("GET")
            .arg(&key)
            .cmd("TTL")
            .arg(&key)
            .query_async(&mut *conn)
            .await?;

        match user_id {
            Some(user_id) => Ok(Session {
                token: token.to_string(),
                user_id,
                expires_at: Utc::now() + Duration::seconds(ttl.max(0)),
            }),
            None => Err(SessionStoreError::SessionNotFound),
        }
    }

    async fn get_tokens_by_user_id(&self, user_id: i64) -> Result<Vec<String>> {
        let mut conn = self.conn.lock().await;
        let tokens: Vec<String> = conn.smembers(user_sessions_key(user_id)).await?;
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_expiring_in(secs: i64) -> Session {
        Session {
            token: "tokA1".to_string(),
            user_id: 1,
            expires_at: Utc::now() + Duration::seconds(secs),
        }
    }

    #[test]
    fn key_formats() {
        assert_eq!(session_key("tokA1"), "session:tokA1");
        assert_eq!(user_sessions_key(42), "user_sessions:42");
    }

    #[test]
    fn ttl_for_live_session() {
        let ttl = ttl_for(&session_expiring_in(3600)).unwrap();
        // One second of slack for the clock read between construction and
        // validation.
        assert!((3599..=3600).contains(&ttl));
    }

    #[test]
    fn ttl_rejects_empty_token() {
        let mut session = session_expiring_in(3600);
        session.token = String::new();
        assert!(matches!(
            ttl_for(&session),
            Err(SessionStoreError::EmptyToken)
        ));
    }

    #[test]
    fn ttl_rejects_expired_session() {
        assert!(matches!(
            ttl_for(&session_expiring_in(-5)),
            Err(SessionStoreError::InvalidExpiry)
        ));
    }
}
