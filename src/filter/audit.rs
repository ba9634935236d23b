use std::sync::Arc;

use log::Level;
use pingora_error::{ErrorType::ReadError, OrErr, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Value as YamlValue;

use crate::{
    core::GatewayResult,
    model::{App, AppPair},
};

use super::{Filter, FilterContext};

pub const FILTER_NAME: &str = "audit";
const PRIORITY: i32 = 100;
const LOG_TARGET: &str = "nsgate::filter::audit";

pub fn create_audit_filter(cfg: YamlValue) -> Result<Arc<dyn Filter>> {
    let config: FilterConfig = if cfg.is_null() {
        FilterConfig::default()
    } else {
        serde_yaml::from_value(cfg).or_err_with(ReadError, || "Invalid audit filter config")?
    };
    let level = config
        .level
        .parse::<Level>()
        .or_err_with(ReadError, || format!("Invalid audit level {}", config.level))?;

    Ok(Arc::new(AuditFilter { level }))
}

#[derive(Debug, Serialize, Deserialize)]
struct FilterConfig {
    #[serde(default = "FilterConfig::default_level")]
    level: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

impl FilterConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

/// Records who did what to which app. Never changes a pair.
pub struct AuditFilter {
    level: Level,
}

impl AuditFilter {
    fn describe(ctx: &FilterContext, desired: &App, current: &App) -> String {
        let who = ctx.user().map_or("anonymous", |u| u.email.as_str());
        let account = ctx.account().map_or("-", |a| a.namespace.as_str());
        let pair = AppPair::new(desired.clone(), current.clone());
        let kinds: Vec<String> = ctx.kinds(&pair).iter().map(ToString::to_string).collect();
        let id = pair.id().unwrap_or("-");

        let mut line = format!(
            "user={who} account={account} method={} app={id} kinds={}",
            ctx.method(),
            kinds.join(",")
        );
        if let Some(desired) = desired.instances() {
            let current = current
                .instances()
                .map_or_else(|| "-".to_string(), |n| n.to_string());
            line.push_str(&format!(" instances={current}->{desired}"));
        }
        line
    }
}

impl Filter for AuditFilter {
    fn name(&self) -> &str {
        FILTER_NAME
    }

    fn priority(&self) -> i32 {
        PRIORITY
    }

    fn log_target(&self) -> &'static str {
        LOG_TARGET
    }

    fn request(&self, ctx: &FilterContext, desired: App, current: &App) -> GatewayResult<App> {
        log::log!(target: LOG_TARGET, self.level, "{}", Self::describe(ctx, &desired, current));
        Ok(desired)
    }
}
