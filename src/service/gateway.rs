use std::{collections::HashSet, sync::Arc, time::Instant};

use async_trait::async_trait;
use bytes::Bytes;
use http::{header, Response, StatusCode};
use pingora::{apps::http_app::ServeHttp, protocols::http::ServerSession};

use crate::{
    auth::{Authenticator, ACCOUNT_QUERY},
    core::GatewayResult,
    engine::{join, join::scoped_group, rewrite_body, ClientRequest, Splitter, Target},
    filter::{FilterContext, FilterPipeline},
    metrics,
    orchestrator::{OrchestratorClient, UpstreamResponse},
    utils::{
        request::{get_req_header_value, read_request_body, remove_query},
        response::ResponseBuilder,
    },
};

/// The client-facing app: authenticate, split, filter, join, forward, and
/// filter the answer on its way back.
pub struct GatewayHttpApp {
    client: Arc<dyn OrchestratorClient>,
    splitter: Splitter,
    filters: FilterPipeline,
    auth: Option<Authenticator>,
}

impl GatewayHttpApp {
    pub fn new(
        client: Arc<dyn OrchestratorClient>,
        concurrency: usize,
        filters: FilterPipeline,
        auth: Option<Authenticator>,
    ) -> Self {
        Self {
            splitter: Splitter::new(client.clone(), concurrency),
            client,
            filters,
            auth,
        }
    }

    /// Handles one request end to end. Without an identity layer every
    /// request is anonymous.
    pub async fn process(
        &self,
        authorization: Option<&str>,
        mut request: ClientRequest,
    ) -> Response<Vec<u8>> {
        let started = Instant::now();
        let target = request.target();

        if let Some(auth) = &self.auth {
            match auth.authenticate(authorization, request.query.as_deref()) {
                Ok(user) => request.user = Some(user),
                Err(e) => {
                    log::info!("{} {} rejected: {e}", request.method, request.path);
                    return self.finish(&target, ResponseBuilder::from_error(&e), started);
                }
            }
        }
        request.query = request
            .query
            .as_deref()
            .and_then(|q| remove_query(q, ACCOUNT_QUERY));

        let response = match self.dispatch(&request, &target).await {
            Ok(upstream) => ResponseBuilder::from_upstream(upstream),
            Err(e) => {
                log::warn!("{} {} failed: {e}", request.method, request.path);
                ResponseBuilder::from_error(&e)
            }
        };
        self.finish(&target, response, started)
    }

    async fn dispatch(&self, request: &ClientRequest, target: &Target) -> GatewayResult<UpstreamResponse> {
        if *target == Target::Passthrough {
            return self.client.forward(&request.passthrough()).await;
        }

        let ctx = FilterContext::new(request);
        let pairs = self.splitter.split_all(request).await?;
        log::debug!(
            "{} {} split into {} pairs",
            request.method,
            request.path,
            pairs.len()
        );

        // a namespaced read-all only ever shows what split listed
        let allowed = match (target, request.account(), request.has_body()) {
            (Target::Apps, Some(_), false) => Some(
                pairs
                    .iter()
                    .filter_map(|p| p.current.id().map(str::to_string))
                    .collect::<HashSet<_>>(),
            ),
            _ => None,
        };

        let pairs = self.filters.run_request(&ctx, pairs)?;
        let outbound = if pairs.is_empty() {
            scoped_group(request).unwrap_or_else(|| request.passthrough())
        } else {
            join(request, &pairs)?
        };

        let mut upstream = self.client.forward(&outbound).await?;
        // withholding must not depend on the upstream labelling its body
        if upstream.status.is_success() && (upstream.is_json() || allowed.is_some()) {
            let mut hooks = self.filters.response_hooks(&ctx, allowed);
            upstream.body = rewrite_body(&upstream.body, &mut hooks)?;
        }
        Ok(upstream)
    }

    fn finish(&self, target: &Target, response: Response<Vec<u8>>, started: Instant) -> Response<Vec<u8>> {
        metrics::record_request(target.kind(), response.status().as_u16(), started);
        response
    }
}

#[async_trait]
impl ServeHttp for GatewayHttpApp {
    async fn response(&self, http_session: &mut ServerSession) -> Response<Vec<u8>> {
        let (method, path, query, content_type, authorization) = {
            let req_header = http_session.req_header();
            (
                req_header.method.clone(),
                req_header.uri.path().to_string(),
                req_header.uri.query().map(str::to_string),
                get_req_header_value(req_header, header::CONTENT_TYPE.as_str()).map(str::to_string),
                get_req_header_value(req_header, header::AUTHORIZATION.as_str()).map(str::to_string),
            )
        };

        let body: Bytes = match read_request_body(http_session).await {
            Ok(body) => body,
            Err(e) => {
                log::warn!("failed to read request body: {e}");
                return ResponseBuilder::error_http(StatusCode::BAD_REQUEST, "Unreadable request body");
            }
        };

        let request = ClientRequest {
            method,
            path,
            query,
            content_type,
            body,
            user: None,
        };
        self.process(authorization.as_deref(), request).await
    }
}
