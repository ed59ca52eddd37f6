use anyhow::Context;
use notifier_service::{
    config::Config, consumer::NotifyConsumer, fanout, logging, routes, state::AppState,
    websocket::ConnectionRegistry,
};
use session_store::{RedisSessionStore, SessionDirectory};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();

    let config = Config::from_env().context("failed to load configuration")?;
    info!(port = config.port, "starting notifier service");

    let redis = session_store::connect(&config.redis_url)
        .await
        .context("failed to connect to redis")?;
    let sessions: Arc<dyn SessionDirectory> = Arc::new(RedisSessionStore::new(redis));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let registry = ConnectionRegistry::new(config.queue_capacity);
    let (dispatch_tx, dispatch_rx) = mpsc::channel(1024);

    let consumer = NotifyConsumer::new(&config.kafka).context("failed to create kafka consumer")?;
    tokio::spawn({
        let shutdown = shutdown_rx.clone();
        async move {
            if let Err(err) = consumer.run(dispatch_tx, shutdown).await {
                error!(error = %err, "kafka consumer terminated");
            }
        }
    });
    tokio::spawn(fanout::run(
        dispatch_rx,
        registry.clone(),
        shutdown_rx.clone(),
    ));

    let state = AppState {
        registry,
        sessions,
        config: Arc::new(config.clone()),
        shutdown: shutdown_rx,
    };
    let app = routes::build_router().with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await
        .context("http server error")?;

    Ok(())
}
