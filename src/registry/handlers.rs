use super::service::NodeRegistry;
use super::types::{NodeId, WorkerNode};

use axum::response::{IntoResponse, Response};
use axum::{Extension, Json, extract::Path, http::StatusCode};
use std::sync::Arc;

pub async fn handle_register_node(
    Extension(registry): Extension<Arc<NodeRegistry>>,
    Json(node): Json<WorkerNode>,
) -> Response {
    let node_id = node.id.clone();

    match registry.register(node) {
        Ok(true) => match registry.get_node(&node_id) {
            Some(registered) => (StatusCode::OK, Json(registered)).into_response(),
            // Unregistered again between the two calls
            None => (
                StatusCode::NOT_FOUND,
                format!("Node with id {} unknown", node_id),
            )
                .into_response(),
        },
        Ok(false) => {
            tracing::info!("Node with ID {} already registered", node_id);
            (
                StatusCode::NOT_ACCEPTABLE,
                format!("Node with id {} already registered", node_id),
            )
                .into_response()
        }
        Err(e) => {
            tracing::info!("Registration of node {} refused: {}", node_id, e);
            (StatusCode::NOT_ACCEPTABLE, e.to_string()).into_response()
        }
    }
}

pub async fn handle_unregister_node(
    Extension(registry): Extension<Arc<NodeRegistry>>,
    Path(id): Path<String>,
) -> (StatusCode, String) {
    let node_id = NodeId(id);

    match registry.unregister(&node_id) {
        Some(_) => (StatusCode::OK, format!("Node {} unregistered", node_id)),
        None => (
            StatusCode::NOT_FOUND,
            format!("Node with id {} unknown", node_id),
        ),
    }
}

pub async fn handle_number_of_nodes(
    Extension(registry): Extension<Arc<NodeRegistry>>,
) -> Json<usize> {
    Json(registry.node_count())
}

pub async fn handle_node_list(
    Extension(registry): Extension<Arc<NodeRegistry>>,
) -> Json<Vec<WorkerNode>> {
    Json(registry.list_nodes())
}

pub async fn handle_active_domain(
    Extension(registry): Extension<Arc<NodeRegistry>>,
) -> Json<Option<String>> {
    Json(registry.active_domain().map(|domain| domain.0))
}
