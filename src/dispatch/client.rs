use super::protocol::{
    ENDPOINT_ACCUMULATE_RESULTS, ENDPOINT_PING, ENDPOINT_PREPARE_AND_PACKAGE,
    ENDPOINT_RUN_COMPUTATION, ENDPOINT_VALIDATE_DATA,
};
use crate::error::{CoordinatorError, Result};
use crate::queue::types::{UnitResult, WorkUnit};
use crate::results::types::{ComputationRequest, ComputationResult, Payload, ResultsProtocol};

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// HTTP client for the worker node contract.
///
/// Every call is a single attempt bounded by the configured timeout; retrying
/// is left to the callers, which decide between re-enqueueing and failing the
/// client request.
#[derive(Clone)]
pub struct WorkerClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl WorkerClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            timeout,
        }
    }

    /// Returns the validation errors reported by the worker. Empty means valid.
    pub async fn validate_data(&self, base: &str, payload: &Payload) -> Result<Vec<String>> {
        self.post_json(url(base, ENDPOINT_VALIDATE_DATA), payload).await
    }

    pub async fn prepare_and_package(
        &self,
        base: &str,
        request: &ComputationRequest,
    ) -> Result<Vec<WorkUnit>> {
        self.post_json(url(base, ENDPOINT_PREPARE_AND_PACKAGE), request).await
    }

    pub async fn run_computation(&self, base: &str, unit: &WorkUnit) -> Result<UnitResult> {
        self.post_json(url(base, ENDPOINT_RUN_COMPUTATION), unit).await
    }

    pub async fn accumulate_results(
        &self,
        base: &str,
        protocol: &ResultsProtocol,
    ) -> Result<ComputationResult> {
        self.post_json(url(base, ENDPOINT_ACCUMULATE_RESULTS), protocol).await
    }

    pub async fn ping(&self, base: &str) -> Result<()> {
        let url = url(base, ENDPOINT_PING);
        let response = self.http.get(&url).timeout(self.timeout).send().await?;

        if !response.status().is_success() {
            return Err(CoordinatorError::WorkerStatus {
                url,
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }

    async fn post_json<T: Serialize, R: DeserializeOwned>(
        &self,
        url: String,
        payload: &T,
    ) -> Result<R> {
        tracing::debug!("POST {}", url);

        let response = self
            .http
            .post(&url)
            .json(payload)
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CoordinatorError::WorkerStatus {
                url,
                status: response.status().as_u16(),
            });
        }

        Ok(response.json().await?)
    }
}

fn url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}
