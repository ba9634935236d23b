pub mod gateway;

use std::sync::Arc;

use pingora_error::{ErrorType::ReadError, OrErr, Result};

use crate::{
    auth::Authenticator,
    config::Config,
    filter::FilterPipeline,
    logging::LogLevels,
    orchestrator::HttpOrchestrator,
};

pub use gateway::GatewayHttpApp;

/// Builds the gateway app from configuration and registers one sub-logger
/// per configured filter.
pub fn build_gateway_app(config: &Config, levels: &LogLevels) -> Result<GatewayHttpApp> {
    let client = HttpOrchestrator::new(&config.orchestrator)
        .or_err(ReadError, "Invalid orchestrator config")?;

    let filters = FilterPipeline::from_config(&config.filters)?;
    for (name, target) in filters.log_targets() {
        levels.register(&name, target);
    }
    if filters.is_empty() {
        log::warn!("No filters configured, app ids will not be namespaced");
    }

    let auth = match &config.auth {
        Some(auth) => Some(Authenticator::from_config(auth).or_err(ReadError, "Invalid auth config")?),
        None => {
            log::warn!("No auth configured, every request is anonymous");
            None
        }
    };

    Ok(GatewayHttpApp::new(
        Arc::new(client),
        config.orchestrator.concurrency,
        filters,
        auth,
    ))
}
