pub mod config;
pub mod consumer;
pub mod error;
pub mod fanout;
pub mod logging;
pub mod metrics;
pub mod routes;
pub mod state;
pub mod websocket;

pub use state::AppState;
pub use websocket::ConnectionRegistry;
