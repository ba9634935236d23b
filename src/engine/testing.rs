//! In-memory orchestrator used by engine and service tests.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use serde_json::Value;

use crate::{
    core::{GatewayError, GatewayResult},
    engine::OutboundRequest,
    model::{App, Group},
    orchestrator::{OrchestratorClient, UpstreamResponse},
};

#[derive(Default)]
pub struct FakeOrchestrator {
    apps: Vec<App>,
    groups: HashMap<String, Group>,
    failing: HashSet<String>,
    delays: HashMap<String, u64>,
    response: Option<UpstreamResponse>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    pub queried: Mutex<Vec<String>>,
    pub forwarded: Mutex<Vec<OutboundRequest>>,
}

impl FakeOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_app(mut self, app: Value) -> Self {
        self.apps.push(App::from_value(app).unwrap());
        self
    }

    pub fn with_group(mut self, id: &str, group: Value) -> Self {
        self.groups
            .insert(id.to_string(), serde_json::from_value(group).unwrap());
        self
    }

    /// Lookups of `id` fail with a non-404 upstream error.
    pub fn failing(mut self, id: &str) -> Self {
        self.failing.insert(id.to_string());
        self
    }

    pub fn delayed(mut self, id: &str, millis: u64) -> Self {
        self.delays.insert(id.to_string(), millis);
        self
    }

    pub fn responding(mut self, status: StatusCode, body: Value) -> Self {
        self.response = Some(UpstreamResponse {
            status,
            content_type: Some("application/json".to_string()),
            body: Bytes::from(body.to_string()),
        });
        self
    }

    /// Forward responses carry no content type.
    pub fn untyped(mut self) -> Self {
        if let Some(response) = self.response.as_mut() {
            response.content_type = None;
        }
        self
    }

    /// Most lookups ever outstanding at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn queried(&self) -> Vec<String> {
        self.queried.lock().unwrap().clone()
    }

    pub fn forwarded(&self) -> Vec<OutboundRequest> {
        self.forwarded.lock().unwrap().clone()
    }

    async fn lookup(&self, id: &str) -> GatewayResult<()> {
        self.queried.lock().unwrap().push(id.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(millis) = self.delays.get(id) {
            tokio::time::sleep(Duration::from_millis(*millis)).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.failing.contains(id) {
            return Err(GatewayError::Upstream(format!("{id}: connection reset")));
        }
        Ok(())
    }
}

#[async_trait]
impl OrchestratorClient for FakeOrchestrator {
    async fn get_app(&self, id: &str) -> GatewayResult<App> {
        self.lookup(id).await?;
        self.apps
            .iter()
            .find(|app| app.id() == Some(id))
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))
    }

    async fn get_group(&self, id: &str) -> GatewayResult<Group> {
        self.lookup(id).await?;
        self.groups
            .get(id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))
    }

    async fn list_apps(&self, namespace: Option<&str>) -> GatewayResult<Vec<App>> {
        let key = namespace.map_or_else(|| "*".to_string(), |ns| format!("/{ns}/*"));
        self.lookup(&key).await?;
        let prefix = namespace.map(|ns| format!("/{ns}/"));
        Ok(self
            .apps
            .iter()
            .filter(|app| match &prefix {
                Some(prefix) => app.id().is_some_and(|id| id.starts_with(prefix.as_str())),
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn forward(&self, request: &OutboundRequest) -> GatewayResult<UpstreamResponse> {
        self.forwarded.lock().unwrap().push(request.clone());
        Ok(self.response.clone().unwrap_or(UpstreamResponse {
            status: StatusCode::OK,
            content_type: Some("application/json".to_string()),
            body: Bytes::from_static(b"{}"),
        }))
    }
}
