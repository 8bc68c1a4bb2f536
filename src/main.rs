use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use studyroom::config::Config;
use studyroom::engine::Engine;
use studyroom::http::{AppState, TokenKeys, create_router};
use studyroom::notify::{Fanout, LogNotifier, Notifier, NotifyHub};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load()?;
    studyroom::observability::init(config.metrics_port)?;

    std::fs::create_dir_all(&config.data_dir)?;

    let hub = Arc::new(NotifyHub::new());
    let notifier: Arc<dyn Notifier> = Arc::new(Fanout::new(vec![
        Arc::new(LogNotifier) as Arc<dyn Notifier>,
        hub.clone(),
    ]));
    let engine = Arc::new(Engine::new(config.wal_path(), notifier, config.policy)?);

    if let Some(username) = &config.admin_username {
        let admin = engine.ensure_admin(username).await?;
        info!(user_id = %admin.id, username = %admin.username, "bootstrap admin ready");
    }
    if config.seed_rooms {
        let seeded = engine.seed_rooms().await?;
        if seeded > 0 {
            info!(rooms = seeded, "seeded default rooms");
        }
    }

    tokio::spawn(studyroom::compactor::run_compactor(
        engine.clone(),
        config.compact_threshold,
    ));

    let tokens = TokenKeys::new(config.jwt_secret.as_bytes(), config.token_ttl_secs);
    let app = create_router(AppState::new(engine, hub, tokens));
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;
    info!("studyroom listening on {addr}");
    info!("  data_dir: {}", config.data_dir.display());
    info!(
        "  hours: {:02}:00-{:02}:00, slot {}m, rounding {}",
        config.policy.hours.day_start_hour,
        config.policy.hours.day_end_hour,
        config.policy.slot_duration,
        config.policy.rounding
    );
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("studyroom stopped");
    Ok(())
}

/// Resolve on ctrl-c or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to register SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received, draining requests");
}
