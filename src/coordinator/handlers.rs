use super::protocol::MSG_ACCEPTED;
use super::service::Coordinator;
use crate::results::types::ComputationRequest;

use axum::{Extension, Json, http::StatusCode};
use std::sync::Arc;

pub async fn handle_start_computation(
    Extension(coordinator): Extension<Arc<Coordinator>>,
    Json(request): Json<ComputationRequest>,
) -> (StatusCode, String) {
    let domain = request.domain.clone();

    match coordinator.start_computation(request).await {
        Ok(()) => {
            tracing::info!("Computation for domain {} submitted", domain);
            (StatusCode::OK, MSG_ACCEPTED.to_string())
        }
        Err(e) => {
            if e.status_code().is_server_error() {
                tracing::error!("Computation for domain {} rejected: {}", domain, e);
            } else {
                tracing::info!("Computation for domain {} rejected: {}", domain, e);
            }
            (e.status_code(), e.to_string())
        }
    }
}
