mod routes;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::{config::Config, toolset::ToolsetManager, Result};

/// Status server over the resolved toolset registry.
pub struct Server {
    manager: Arc<RwLock<ToolsetManager>>,
}

impl Server {
    pub fn new(_config: &Config, manager: Arc<RwLock<ToolsetManager>>) -> Self {
        Self { manager }
    }

    pub fn build_router(self) -> Router {
        Router::new()
            .route("/health", get(routes::health))
            .route("/toolsets", get(routes::list_toolsets))
            .route("/toolsets/{name}", get(routes::get_toolset))
            .route("/refresh", post(routes::refresh))
            .route("/metrics", get(routes::metrics))
            .layer(TraceLayer::new_for_http())
            .with_state(self.manager)
    }

    pub async fn start(self, addr: &str) -> Result<()> {
        let app = self.build_router();
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;
        Ok(())
    }
}
