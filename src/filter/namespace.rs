use std::sync::Arc;

use pingora_error::Result;
use serde_yaml::Value as YamlValue;

use crate::{
    core::GatewayResult,
    engine::namespace::{is_qualified, qualify, strip},
    model::App,
};

use super::{Filter, FilterContext};

pub const FILTER_NAME: &str = "namespace";
const PRIORITY: i32 = 1000;
const LOG_TARGET: &str = "nsgate::filter::namespace";

pub fn create_namespace_filter(_cfg: YamlValue) -> Result<Arc<dyn Filter>> {
    Ok(Arc::new(NamespaceFilter))
}

/// Moves app ids into the caller's namespace on the way in and out of it
/// on the way back.
///
/// Updates to a legacy app keep its bare id so body and path agree; new
/// apps and migrated apps are always namespaced.
pub struct NamespaceFilter;

impl Filter for NamespaceFilter {
    fn name(&self) -> &str {
        FILTER_NAME
    }

    fn priority(&self) -> i32 {
        PRIORITY
    }

    fn log_target(&self) -> &'static str {
        LOG_TARGET
    }

    fn request(&self, ctx: &FilterContext, mut desired: App, current: &App) -> GatewayResult<App> {
        let Some(account) = ctx.account() else {
            return Ok(desired);
        };
        let Some(id) = desired.id() else {
            return Ok(desired);
        };

        let id = format!("/{}", id.trim_start_matches('/'));
        let legacy = current.id().is_some_and(|cur| !is_qualified(account, cur));
        if legacy || is_qualified(account, &id) {
            return Ok(desired);
        }

        let qualified = qualify(Some(account), &id);
        log::debug!(target: LOG_TARGET, "{id} -> {qualified}");
        desired.set_id(qualified);
        Ok(desired)
    }

    fn response(&self, ctx: &FilterContext, mut app: App) -> GatewayResult<App> {
        if let Some(id) = app.id() {
            let local = strip(ctx.account(), id);
            if local != id {
                app.set_id(local);
            }
        }
        Ok(app)
    }

    fn response_group_id(&self, ctx: &FilterContext, id: String) -> GatewayResult<String> {
        Ok(strip(ctx.account(), &id))
    }
}
