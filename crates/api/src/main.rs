use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use ksu_bridge_core::{HostRuntime, LocalHost};
use ksu_bridge_events::EventBus;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ksu_bridge_api::config::ServerConfig;
use ksu_bridge_api::presentation::PresentationRouter;
use ksu_bridge_api::router::build_app_router;
use ksu_bridge_api::state::AppState;
use ksu_bridge_api::ws;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "ksu_bridge_api=debug,ksu_bridge_core=debug,ksu_bridge_events=info,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    });
    tracing::info!(
        host = %config.host,
        port = config.port,
        shell = %config.host_runtime.shell,
        auth = config.api_token.is_some(),
        "Loaded server configuration"
    );

    if !config.webui_dir.is_dir() {
        tracing::warn!(
            webui_dir = %config.webui_dir.display(),
            "Web UI directory not found, serving the API only"
        );
    }

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());

    // --- Host runtime ---
    let host: Arc<dyn HostRuntime> = Arc::new(LocalHost::new(
        config.host_runtime.clone(),
        Arc::clone(&event_bus),
    ));

    // --- WebSocket manager ---
    let ws_manager = Arc::new(ws::WsManager::new());
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&ws_manager));

    // Spawn presentation router (pushes bus events to WebSocket clients).
    let presentation_router = PresentationRouter::new(Arc::clone(&ws_manager));
    let router_handle = tokio::spawn(presentation_router.run(event_bus.subscribe()));

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        host,
        ws_manager: Arc::clone(&ws_manager),
        event_bus: Arc::clone(&event_bus),
    };

    let app = build_app_router(state, &config).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to build application router");
        std::process::exit(1);
    });

    // --- Start server ---
    let ip: IpAddr = config.host.parse().unwrap_or_else(|e| {
        tracing::error!(host = %config.host, error = %e, "Invalid HOST address");
        std::process::exit(1);
    });
    let addr = SocketAddr::new(ip, config.port);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(%addr, error = %e, "Failed to bind to address");
            std::process::exit(1);
        });
    tracing::info!(%addr, "Starting server");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
    }

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // The state clones inside the router are gone once `serve` returns, so
    // dropping ours closes the broadcast channel and stops the router task.
    drop(event_bus);
    let _ = tokio::time::timeout(Duration::from_secs(5), router_handle).await;
    tracing::info!("Presentation router shut down");

    let ws_count = ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    ws_manager.shutdown_all().await;

    heartbeat_handle.abort();
    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the bridge shuts
/// down cleanly whether stopped interactively or by a service manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
