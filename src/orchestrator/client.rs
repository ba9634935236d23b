use std::time::Duration;

use async_trait::async_trait;
use http::{header, StatusCode};
use serde::Deserialize;

use crate::{
    config,
    core::{GatewayError, GatewayResult},
    engine::OutboundRequest,
    metrics::record_upstream_call,
    model::{App, Group},
};

use super::{OrchestratorClient, UpstreamResponse};

#[derive(Deserialize)]
struct AppEnvelope {
    app: App,
}

#[derive(Deserialize)]
struct AppsEnvelope {
    #[serde(default)]
    apps: Vec<App>,
}

/// Orchestrator client speaking the Marathon v2 REST API.
///
/// Lookup ids carry their leading slash, so `/dev/foo` is fetched from
/// `/v2/apps//dev/foo`.
#[derive(Clone)]
pub struct HttpOrchestrator {
    base_url: String,
    auth_header: Option<String>,
    client: reqwest::Client,
}

impl HttpOrchestrator {
    pub fn new(config: &config::Orchestrator) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()
            .map_err(|e| GatewayError::Configuration(format!("orchestrator client: {e}")))?;

        Ok(Self {
            base_url: config.address.trim_end_matches('/').to_string(),
            auth_header: config.auth_header.clone(),
            client,
        })
    }

    fn request(&self, method: reqwest::Method, path_and_query: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path_and_query);
        let builder = self.client.request(method, url);
        match &self.auth_header {
            Some(value) => builder.header(header::AUTHORIZATION, value),
            None => builder,
        }
    }

    /// GETs `path_and_query`, mapping 404 to not-found and every other
    /// failure to an upstream error.
    async fn lookup(&self, call: &str, path_and_query: &str) -> GatewayResult<reqwest::Response> {
        let result = self.request(reqwest::Method::GET, path_and_query).send().await;
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                record_upstream_call(call, "error");
                return Err(transport_error(path_and_query, e));
            }
        };

        match response.status() {
            StatusCode::NOT_FOUND => {
                record_upstream_call(call, "not_found");
                Err(GatewayError::NotFound(path_and_query.to_string()))
            }
            status if status.is_success() => {
                record_upstream_call(call, "ok");
                Ok(response)
            }
            status => {
                record_upstream_call(call, "error");
                Err(GatewayError::Upstream(format!(
                    "{path_and_query} answered {status}"
                )))
            }
        }
    }
}

fn transport_error(path: &str, e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Upstream(format!("{path} timed out"))
    } else {
        GatewayError::Upstream(format!("{path}: {e}"))
    }
}

async fn decode<T: serde::de::DeserializeOwned>(
    path: &str,
    response: reqwest::Response,
) -> GatewayResult<T> {
    response
        .json()
        .await
        .map_err(|e| GatewayError::Upstream(format!("{path} returned an unreadable body: {e}")))
}

#[async_trait]
impl OrchestratorClient for HttpOrchestrator {
    async fn get_app(&self, id: &str) -> GatewayResult<App> {
        let path = format!("/v2/apps/{id}");
        log::debug!("looking up app {id}");
        let response = self.lookup("get_app", &path).await?;
        let envelope: AppEnvelope = decode(&path, response).await?;
        Ok(envelope.app)
    }

    async fn get_group(&self, id: &str) -> GatewayResult<Group> {
        let path = format!("/v2/groups/{id}?embed=group.groups&embed=group.apps");
        log::debug!("looking up group {id}");
        let response = self.lookup("get_group", &path).await?;
        decode(&path, response).await
    }

    async fn list_apps(&self, namespace: Option<&str>) -> GatewayResult<Vec<App>> {
        let path = match namespace {
            Some(ns) => format!("/v2/apps?id=/{ns}/"),
            None => "/v2/apps".to_string(),
        };
        let response = self.lookup("list_apps", &path).await?;
        let envelope: AppsEnvelope = decode(&path, response).await?;

        // `?id=` is a substring match upstream.
        let Some(ns) = namespace else {
            return Ok(envelope.apps);
        };
        let prefix = format!("/{ns}/");
        Ok(envelope
            .apps
            .into_iter()
            .filter(|app| app.id().is_some_and(|id| id.starts_with(&prefix)))
            .collect())
    }

    async fn forward(&self, request: &OutboundRequest) -> GatewayResult<UpstreamResponse> {
        let path = request.path_and_query();
        log::debug!("forwarding {} {path}", request.method);

        let mut builder = self.request(request.method.clone(), &path);
        if let Some(content_type) = &request.content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                record_upstream_call("forward", "error");
                return Err(transport_error(&path, e));
            }
        };
        record_upstream_call("forward", "ok");

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(&path, e))?;

        Ok(UpstreamResponse {
            status,
            content_type,
            body,
        })
    }
}
