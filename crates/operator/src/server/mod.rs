mod routes;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{Error, Result};

/// Health and metrics endpoint of the operator.
#[derive(Debug, Default, Clone)]
pub struct Server;

impl Server {
    pub fn new() -> Self {
        Self
    }

    pub fn build_router(self) -> Router {
        Router::new()
            .route("/health", get(routes::health))
            .route("/metrics", get(routes::metrics))
            .layer(TraceLayer::new_for_http())
    }

    pub async fn start(self, addr: &str) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        info!("Serving health and metrics on {}", addr);
        axum::serve(listener, self.build_router())
            .await
            .map_err(|e| Error::Internal(format!("server error: {}", e)))
    }
}
