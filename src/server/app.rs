//! Server lifecycle
//!
//! Owns the shared state holders, builds the Axum router, binds the
//! listener, runs the watcher, and drives graceful shutdown.

use crate::config::{spawn_config_watcher, ConfigStore};
use crate::error::{Error, Result};
use crate::history::RequestHistory;
use crate::observer::ObserverHub;
use crate::server::{capture, control, dispatch, ws};
use crate::stats::StatsRegistry;
use axum::middleware;
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// In-flight requests get this long to finish after shutdown is requested.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ConfigStore>,
    pub stats: Arc<StatsRegistry>,
    pub history: Arc<RequestHistory>,
    pub observers: Arc<ObserverHub>,
}

pub struct FaultServer {
    state: AppState,
    shutdown_tx: broadcast::Sender<()>,
    started: AtomicBool,
}

impl FaultServer {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        let observers = Arc::new(ObserverHub::new());
        let store = Arc::new(ConfigStore::new(config_path.into(), observers.clone()));

        let state = AppState {
            store,
            stats: Arc::new(StatsRegistry::new()),
            history: Arc::new(RequestHistory::new()),
            observers,
        };

        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            state,
            shutdown_tx,
            started: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    fn build_router(&self) -> Router {
        let state = self.state.clone();

        Router::new()
            .route(
                "/config",
                get(control::get_config)
                    .put(control::put_config)
                    .post(control::post_config)
                    .delete(control::delete_config),
            )
            .route("/stats", get(control::get_stats))
            .route("/requestlog", get(control::get_requestlog))
            .route("/ws", get(ws::ws_handler))
            .fallback(dispatch::dispatch)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(CorsLayer::permissive()),
            )
            // Outermost so it observes the final status written to the client.
            .layer(middleware::from_fn_with_state(
                state.clone(),
                capture::capture_request,
            ))
            .with_state(state)
    }

    /// Load the configuration, bind the listener, start the watcher, and
    /// serve until `stop()`. Starting twice is an error.
    pub async fn run(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(Error::Server("server already started".to_string()));
        }

        let config = self.state.store.load().await?;

        let addr = format!("{}:{}", config.server.host, config.server.port)
            .parse::<SocketAddr>()
            .map_err(|e| Error::invalid_config("server.host", e.to_string()))?;

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Server(format!("failed to bind {}: {}", addr, e)))?;

        info!("Faultline listening on {}", addr);

        // A watcher failure disables hot reload but never blocks startup.
        match spawn_config_watcher(
            self.state.store.clone(),
            config.server.clone(),
            self.shutdown_tx.subscribe(),
        ) {
            Ok(_handle) => {},
            Err(e) => error!("hot reload disabled: {}", e),
        }

        let router = self.build_router();

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let graceful = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("shutting down, draining in-flight requests");
        });

        let mut force_rx = self.shutdown_tx.subscribe();
        let forced = async move {
            let _ = force_rx.recv().await;
            tokio::time::sleep(SHUTDOWN_GRACE).await;
        };

        tokio::select! {
            result = graceful => {
                result.map_err(|e| Error::Server(format!("server error: {}", e)))?;
            },
            _ = forced => {
                warn!("grace period elapsed, closing listener");
            },
        }

        self.state.observers.shutdown();
        info!("server stopped");
        Ok(())
    }

    /// Trigger graceful shutdown.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(());
    }
}
