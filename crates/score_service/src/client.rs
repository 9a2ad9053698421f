//! Scoring client with a bounded per-call timeout
//!
//! `ScoreClient` is the narrow interface the batch worker talks to. The
//! in-process implementation wraps the local service; a timeout or transport
//! failure surfaces as an error the worker treats as failed-but-skippable,
//! never as a batch abort.

use crate::errors::{Result, ServiceError};
use crate::service::ScoringService;
use crate::types::{ScoringRequest, ScoringResponse};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Narrow async interface to the scoring endpoint
#[async_trait]
pub trait ScoreClient: Send + Sync {
    async fn score(&self, request: ScoringRequest) -> Result<ScoringResponse>;
}

/// In-process client over the local scoring service
pub struct EngineClient {
    service: Arc<ScoringService>,
    timeout: Duration,
}

impl EngineClient {
    pub fn new(service: Arc<ScoringService>, timeout: Duration) -> Self {
        Self { service, timeout }
    }
}

#[async_trait]
impl ScoreClient for EngineClient {
    async fn score(&self, request: ScoringRequest) -> Result<ScoringResponse> {
        let service = Arc::clone(&self.service);
        let call = async move { service.score(&request) };

        match tokio::time::timeout(self.timeout, call).await {
            Ok(response) => Ok(response),
            Err(_) => Err(ServiceError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}
