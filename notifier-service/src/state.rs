use crate::{config::Config, websocket::ConnectionRegistry};
use session_store::SessionDirectory;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Clone)]
pub struct AppState {
    pub registry: ConnectionRegistry,
    pub sessions: Arc<dyn SessionDirectory>,
    pub config: Arc<Config>,
    /// Flips to `true` when the process is shutting down; every pump loop
    /// watches it.
    pub shutdown: watch::Receiver<bool>,
}
