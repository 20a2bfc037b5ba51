use super::protocol::MSG_NOT_DONE;
use super::store::RequestProtocolStore;
use super::types::{ComputationResult, ComputationStatus};
use crate::error::CoordinatorError;
use crate::registry::types::DomainType;

use axum::response::{IntoResponse, Response};
use axum::{Extension, Json, extract::Path, http::StatusCode};
use std::sync::Arc;

pub async fn handle_status(
    Extension(store): Extension<Arc<RequestProtocolStore>>,
    Path(domain): Path<String>,
) -> Json<ComputationStatus> {
    let domain = DomainType::new(domain);
    tracing::debug!("Checking status for domain {}", domain);

    Json(store.status(&domain))
}

pub async fn handle_result(
    Extension(store): Extension<Arc<RequestProtocolStore>>,
    Path(domain): Path<String>,
) -> Response {
    let domain = DomainType::new(domain);

    match store.fetch_and_clear_result(&domain).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(CoordinatorError::NotDone(_)) => {
            let status = store.status(&domain).status;
            (
                StatusCode::NOT_ACCEPTABLE,
                Json(ComputationResult::error(status, MSG_NOT_DONE)),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("Collecting results of domain {} failed: {}", domain, e);
            (e.status_code(), e.to_string()).into_response()
        }
    }
}
