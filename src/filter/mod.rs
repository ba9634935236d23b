pub mod audit;
pub mod namespace;

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};

use http::Method;
use once_cell::sync::Lazy;
use pingora::OkOrErr;
use pingora_error::{ErrorType::ReadError, Result};
use serde_yaml::Value as YamlValue;

use crate::{
    core::{GatewayError, GatewayResult},
    engine::{namespace as ns, ClientRequest, ResponseHooks, Target},
    model::{operation_kinds, Account, App, AppPair, OperationKind, User},
};

/// Factory building a filter from its YAML configuration.
pub type FilterCreateFn = fn(YamlValue) -> Result<Arc<dyn Filter>>;

/// A filter sees every pair between split and join, and every app in the
/// orchestrator's response.
///
/// Filters never change what an app *is*: the id a filter returns must
/// name the same app it was given, modulo the caller's namespace.
pub trait Filter: Send + Sync {
    fn name(&self) -> &str;

    /// Higher priorities run first.
    fn priority(&self) -> i32;

    /// Log target the filter writes under; its level is adjustable at
    /// runtime through the settings endpoint.
    fn log_target(&self) -> &'static str;

    /// Returns the desired app to send upstream.
    fn request(&self, _ctx: &FilterContext, desired: App, _current: &App) -> GatewayResult<App> {
        Ok(desired)
    }

    /// Returns the app to hand back to the client.
    fn response(&self, _ctx: &FilterContext, app: App) -> GatewayResult<App> {
        Ok(app)
    }

    fn response_group_id(&self, _ctx: &FilterContext, id: String) -> GatewayResult<String> {
        Ok(id)
    }
}

/// Per-request facts filters may act on.
pub struct FilterContext<'a> {
    request: &'a ClientRequest,
    action: Option<String>,
}

impl<'a> FilterContext<'a> {
    pub fn new(request: &'a ClientRequest) -> Self {
        let action = match request.target() {
            Target::App { action, .. } => action,
            _ => None,
        };
        Self { request, action }
    }

    pub fn user(&self) -> Option<&User> {
        self.request.user.as_ref()
    }

    pub fn account(&self) -> Option<&Account> {
        self.request.account()
    }

    pub fn method(&self) -> &Method {
        &self.request.method
    }

    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    pub fn kinds(&self, pair: &AppPair) -> Vec<OperationKind> {
        operation_kinds(&self.request.method, self.action(), pair)
    }
}

static FILTER_BUILDER_REGISTRY: Lazy<HashMap<&'static str, FilterCreateFn>> = Lazy::new(|| {
    let arr: Vec<(&str, FilterCreateFn)> = vec![
        (namespace::FILTER_NAME, namespace::create_namespace_filter), // 1000
        (audit::FILTER_NAME, audit::create_audit_filter),             // 100
    ];
    arr.into_iter().collect()
});

/// Builds a filter by name. Unknown names are a configuration error.
pub fn build_filter(name: &str, cfg: YamlValue) -> Result<Arc<dyn Filter>> {
    let builder = FILTER_BUILDER_REGISTRY
        .get(name)
        .or_err(ReadError, "Unknown filter type")?;
    builder(cfg)
}

/// The configured filters, in execution order.
#[derive(Default, Clone)]
pub struct FilterPipeline {
    filters: Vec<Arc<dyn Filter>>,
}

impl FilterPipeline {
    pub fn new(mut filters: Vec<Arc<dyn Filter>>) -> Self {
        filters.sort_by_key(|f| -f.priority());
        Self { filters }
    }

    pub fn from_config(cfg: &BTreeMap<String, YamlValue>) -> Result<Self> {
        let filters = cfg
            .iter()
            .map(|(name, value)| build_filter(name, value.clone()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(filters))
    }

    /// (name, log target) of every filter, in execution order.
    pub fn log_targets(&self) -> Vec<(String, &'static str)> {
        self.filters
            .iter()
            .map(|f| (f.name().to_string(), f.log_target()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Runs every filter once over every pair, pairs in order. The output
    /// has one pair per input pair; a filter that renames an app fails the
    /// request.
    pub fn run_request(&self, ctx: &FilterContext, pairs: Vec<AppPair>) -> GatewayResult<Vec<AppPair>> {
        pairs
            .into_iter()
            .map(|pair| {
                let AppPair { mut desired, current } = pair;
                for filter in &self.filters {
                    let before = local_id(ctx.account(), &desired);
                    desired = filter.request(ctx, desired, &current)?;
                    let after = local_id(ctx.account(), &desired);
                    if before.is_some() && before != after {
                        return Err(GatewayError::Internal(format!(
                            "filter {} renamed {} to {}",
                            filter.name(),
                            before.unwrap_or_default(),
                            after.unwrap_or_default()
                        )));
                    }
                }
                Ok(AppPair::new(desired, current))
            })
            .collect()
    }

    /// Response hooks running every filter's response side. When `allowed`
    /// is set, apps whose id is not in it are withheld from list bodies.
    pub fn response_hooks<'p>(
        &'p self,
        ctx: &'p FilterContext<'p>,
        allowed: Option<HashSet<String>>,
    ) -> PipelineResponse<'p> {
        PipelineResponse {
            pipeline: self,
            ctx,
            allowed,
        }
    }
}

fn local_id(account: Option<&Account>, app: &App) -> Option<String> {
    app.id()
        .map(|id| ns::strip(account, &format!("/{}", id.trim_start_matches('/'))))
}

pub struct PipelineResponse<'p> {
    pipeline: &'p FilterPipeline,
    ctx: &'p FilterContext<'p>,
    allowed: Option<HashSet<String>>,
}

impl ResponseHooks for PipelineResponse<'_> {
    fn app(&mut self, mut app: App) -> GatewayResult<Option<App>> {
        if let Some(allowed) = &self.allowed {
            if !app.id().is_some_and(|id| allowed.contains(id)) {
                log::debug!("withholding {:?} from response", app.id());
                return Ok(None);
            }
        }
        for filter in &self.pipeline.filters {
            app = filter.response(self.ctx, app)?;
        }
        Ok(Some(app))
    }

    fn group_id(&mut self, id: &str) -> GatewayResult<String> {
        let mut id = id.to_string();
        for filter in &self.pipeline.filters {
            id = filter.response_group_id(self.ctx, id)?;
        }
        Ok(id)
    }
}
