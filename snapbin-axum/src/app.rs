use std::future::Future;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::{TcpListener, ToSocketAddrs};
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::require_auth;
use crate::handlers;
use crate::SnapState;

pub struct SnapApp {
    pub state: SnapState,
    pub router: Router<()>,
}

impl Clone for SnapApp {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            router: self.router.clone(),
        }
    }
}

impl SnapApp {
    pub fn new(state: SnapState) -> Self {
        let router = build_router(state.clone());
        Self { state, router }
    }

    /// Serve until ctrl-c.
    pub async fn listen<A>(self, addr: A) -> anyhow::Result<()>
    where
        A: ToSocketAddrs,
    {
        self.listen_with_shutdown(addr, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
    }

    /// Serve until `signal` resolves, then drain in-flight requests and any
    /// pending cache population.
    pub async fn listen_with_shutdown<A, F>(self, addr: A, signal: F) -> anyhow::Result<()>
    where
        A: ToSocketAddrs,
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "snapbin listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                signal.await;
                info!("HTTP server shutting down");
            })
            .await?;

        info!(pending = self.state.tasks.pending(), "waiting for background tasks");
        self.state.tasks.shutdown().await;
        Ok(())
    }
}

/// All routes, statically built once at start-up.
pub fn build_router(state: SnapState) -> Router<()> {
    let protected = Router::new()
        .route("/upload", post(handlers::upload))
        .route("/delete", get(handlers::delete))
        .route("/files/list", get(handlers::list))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let public = Router::new()
        .route("/file/", get(handlers::missing_id).head(handlers::missing_id))
        .route("/file/{*key}", get(handlers::get_file).head(handlers::get_file))
        .route("/upload/{id}", get(handlers::legacy_upload))
        .route("/health", get(handlers::health));

    public
        .merge(protected)
        .fallback(handlers::not_found)
        .method_not_allowed_fallback(handlers::not_found)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
}

pub fn snapbin(state: SnapState) -> SnapApp {
    SnapApp::new(state)
}
