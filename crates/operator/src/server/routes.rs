use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::error;

use crate::toolset::ToolsetManager;

type ManagerState = State<Arc<RwLock<ToolsetManager>>>;

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

pub async fn list_toolsets(State(manager): ManagerState) -> Json<serde_json::Value> {
    let manager = manager.read().await;
    Json(json!({ "toolsets": manager.summaries() }))
}

pub async fn get_toolset(
    State(manager): ManagerState,
    Path(name): Path<String>,
) -> Response {
    let manager = manager.read().await;
    match manager.registry().get(&name) {
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Toolset not found" })),
        )
            .into_response(),
        Some(toolset) => {
            let tools: Vec<&str> = toolset.tools.iter().map(|t| t.name.as_str()).collect();
            Json(json!({
                "summary": toolset.summary(),
                "description": toolset.description,
                "config": toolset.config,
                "tools": tools,
            }))
            .into_response()
        }
    }
}

pub async fn refresh(State(manager): ManagerState) -> Response {
    let mut manager = manager.write().await;
    match manager.resolve(true).await {
        Ok(()) => Json(json!({
            "status": "refreshed",
            "toolsets": manager.registry().len(),
        }))
        .into_response(),
        Err(e) => {
            error!("toolset refresh failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

pub async fn metrics() -> String {
    crate::metrics::gather_metrics()
}
