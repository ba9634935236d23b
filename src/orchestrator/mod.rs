//! Orchestrator control-plane client.
//!
//! Lookups report a missing app/group as [`GatewayError::NotFound`](crate::core::GatewayError::NotFound), which
//! callers treat as "does not exist". Every other failure (transport, timeout,
//! unexpected status) is [`GatewayError::Upstream`](crate::core::GatewayError::Upstream) and is never confused with
//! not-found.

pub mod client;

use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;

use crate::{
    core::GatewayResult,
    engine::OutboundRequest,
    model::{App, Group},
};

pub use client::HttpOrchestrator;

#[async_trait]
pub trait OrchestratorClient: Send + Sync {
    /// Fetches the app stored under the fully-qualified `id` (leading slash).
    async fn get_app(&self, id: &str) -> GatewayResult<App>;

    /// Fetches the group stored under the fully-qualified `id` (leading slash).
    async fn get_group(&self, id: &str) -> GatewayResult<Group>;

    /// Lists apps, restricted to those under `namespace` when one is given.
    async fn list_apps(&self, namespace: Option<&str>) -> GatewayResult<Vec<App>>;

    /// Sends a joined request. Never retried by the client.
    async fn forward(&self, request: &OutboundRequest) -> GatewayResult<UpstreamResponse>;
}

/// What the orchestrator answered to a forwarded request.
#[derive(Clone, Debug, PartialEq)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("application/json"))
    }
}
