use std::{collections::HashMap, error::Error};

use async_trait::async_trait;
use http::{Method, Response, StatusCode};
use matchit::{Match, Router};
use pingora::{
    apps::http_app::ServeHttp, protocols::http::ServerSession, services::listening::Service,
};
use serde::{Deserialize, Serialize};

use crate::{
    config::Admin,
    logging::{parse_level, LogLevels},
    metrics,
    utils::{
        request::read_request_body,
        response::{content_type, ResponseBuilder},
    },
};

#[async_trait]
trait Handler {
    async fn handle(
        &self,
        levels: &LogLevels,
        session: &mut ServerSession,
    ) -> Result<Response<Vec<u8>>, Box<dyn Error>>;
}

/// Operator endpoints: log levels and metrics.
pub struct AdminHttpApp {
    levels: LogLevels,
    router: Router<HashMap<Method, Box<dyn Handler + Send + Sync>>>,

    config: Admin,
}

impl AdminHttpApp {
    pub fn new(config: Admin, levels: LogLevels) -> Self {
        let mut this = Self {
            levels,
            router: Router::new(),
            config,
        };

        this.route("/settings", Method::GET, Box::new(SettingsGetHandler))
            .route("/settings", Method::POST, Box::new(SettingsPostHandler))
            .route("/metrics", Method::GET, Box::new(MetricsHandler));

        this
    }

    fn route(
        &mut self,
        path: &str,
        method: Method,
        handler: Box<dyn Handler + Send + Sync>,
    ) -> &mut Self {
        match self.router.at_mut(path) {
            Ok(routes) => {
                routes.value.insert(method, handler);
            }
            Err(_) => {
                let mut handlers = HashMap::new();
                handlers.insert(method, handler);
                if let Err(e) = self.router.insert(path, handlers) {
                    log::error!("Failed to register admin route {path}: {e}");
                }
            }
        }
        self
    }

    pub fn admin_http_service(config: &Admin, levels: LogLevels) -> Service<Self> {
        let app = Self::new(config.clone(), levels);
        let addr = app.config.address.to_string();
        let mut service = Service::new("Admin HTTP".to_string(), app);
        service.add_tcp(&addr);
        service
    }

    async fn dispatch(&self, http_session: &mut ServerSession) -> Response<Vec<u8>> {
        if validate_api_key(http_session, &self.config.api_key).is_err() {
            return ResponseBuilder::error_http(StatusCode::FORBIDDEN, "Must provide api key");
        }

        let (path, method) = {
            let req_header = http_session.req_header();
            (req_header.uri.path().to_string(), req_header.method.clone())
        };

        match self.router.at(&path) {
            Ok(Match { value, .. }) => match value.get(&method) {
                Some(handler) => match handler.handle(&self.levels, http_session).await {
                    Ok(resp) => resp,
                    Err(e) => ResponseBuilder::error_http(StatusCode::BAD_REQUEST, &e.to_string()),
                },
                None => ResponseBuilder::error_http(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed"),
            },
            Err(_) => ResponseBuilder::error_http(StatusCode::NOT_FOUND, "Not Found"),
        }
    }
}

#[async_trait]
impl ServeHttp for AdminHttpApp {
    async fn response(&self, http_session: &mut ServerSession) -> Response<Vec<u8>> {
        http_session.set_keepalive(None);
        self.dispatch(http_session).await
    }
}

/// Body of `POST /settings`. A missing `loglevel` resets the root to INFO.
#[derive(Debug, Serialize, Deserialize)]
struct SettingsUpdate {
    #[serde(default = "SettingsUpdate::default_loglevel")]
    loglevel: String,
    #[serde(default)]
    loggers: HashMap<String, String>,
}

impl SettingsUpdate {
    fn default_loglevel() -> String {
        "INFO".to_string()
    }
}

#[derive(Serialize)]
struct SettingsApplied {
    loglevel: String,
}

struct SettingsGetHandler;

#[async_trait]
impl Handler for SettingsGetHandler {
    async fn handle(
        &self,
        levels: &LogLevels,
        _http_session: &mut ServerSession,
    ) -> Result<Response<Vec<u8>>, Box<dyn Error>> {
        Ok(ResponseBuilder::success_json(&levels.snapshot()))
    }
}

struct SettingsPostHandler;

#[async_trait]
impl Handler for SettingsPostHandler {
    async fn handle(
        &self,
        levels: &LogLevels,
        http_session: &mut ServerSession,
    ) -> Result<Response<Vec<u8>>, Box<dyn Error>> {
        let body = read_request_body(http_session).await?;
        let update: SettingsUpdate = serde_json::from_slice(&body)?;
        apply_settings(levels, &update)?;
        Ok(ResponseBuilder::success_json(&SettingsApplied {
            loglevel: levels.root().to_string(),
        }))
    }
}

/// Applies `update` whole, or not at all when it names an unknown logger.
fn apply_settings(levels: &LogLevels, update: &SettingsUpdate) -> Result<(), Box<dyn Error>> {
    if let Some(missing) = update.loggers.keys().find(|name| levels.get(name).is_none()) {
        return Err(format!("no logger named {missing}").into());
    }

    levels.set_all(parse_level(&update.loglevel));
    for (name, level) in &update.loggers {
        levels.set(name, parse_level(level))?;
    }
    Ok(())
}

struct MetricsHandler;

#[async_trait]
impl Handler for MetricsHandler {
    async fn handle(
        &self,
        _levels: &LogLevels,
        _http_session: &mut ServerSession,
    ) -> Result<Response<Vec<u8>>, Box<dyn Error>> {
        Ok(ResponseBuilder::success_http(
            metrics::gather_text(),
            Some(content_type::TEXT_PLAIN),
        ))
    }
}

fn validate_api_key(http_session: &ServerSession, api_key: &str) -> Result<(), Box<dyn Error>> {
    match http_session.get_header("x-api-key") {
        Some(key) if key.to_str()? == api_key => Ok(()),
        _ => Err("Must provide api key".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::CORE_LOGGER;
    use log::LevelFilter;

    #[test]
    fn test_apply_root_level() {
        let levels = LogLevels::new(LevelFilter::Info);
        levels.register("namespace", "nsgate::filter::namespace");

        let update: SettingsUpdate = serde_json::from_str(r#"{"loglevel": "DEBUG"}"#).unwrap();
        apply_settings(&levels, &update).unwrap();
        assert_eq!(levels.root(), LevelFilter::Debug);
        assert_eq!(levels.get("namespace"), Some(LevelFilter::Debug));

        let update: SettingsUpdate = serde_json::from_str(r#"{"loglevel": "LOUD"}"#).unwrap();
        apply_settings(&levels, &update).unwrap();
        assert_eq!(levels.root(), LevelFilter::Info);
    }

    #[test]
    fn test_apply_single_logger() {
        let levels = LogLevels::new(LevelFilter::Info);
        levels.register("audit", "nsgate::filter::audit");

        let update: SettingsUpdate =
            serde_json::from_str(r#"{"loggers": {"audit": "warning"}}"#).unwrap();
        apply_settings(&levels, &update).unwrap();
        assert_eq!(levels.get("audit"), Some(LevelFilter::Warn));
        assert_eq!(levels.root(), LevelFilter::Info);

        let update: SettingsUpdate =
            serde_json::from_str(r#"{"loggers": {"missing": "debug"}}"#).unwrap();
        assert!(apply_settings(&levels, &update).is_err());
    }

    #[test]
    fn test_rejected_update_changes_nothing() {
        let levels = LogLevels::new(LevelFilter::Warn);
        levels.register("audit", "nsgate::filter::audit");
        let before = levels.snapshot();

        let update: SettingsUpdate = serde_json::from_str(
            r#"{"loglevel": "DEBUG", "loggers": {"audit": "trace", "missing": "debug"}}"#,
        )
        .unwrap();
        assert!(apply_settings(&levels, &update).is_err());
        assert_eq!(levels.snapshot(), before);
        assert_eq!(levels.root(), LevelFilter::Warn);
    }

    #[test]
    fn test_missing_loglevel_resets_root_to_info() {
        let levels = LogLevels::new(LevelFilter::Debug);
        levels.register("audit", "nsgate::filter::audit");

        let update: SettingsUpdate =
            serde_json::from_str(r#"{"loggers": {"audit": "trace"}}"#).unwrap();
        apply_settings(&levels, &update).unwrap();
        assert_eq!(levels.root(), LevelFilter::Info);
        assert_eq!(levels.get(CORE_LOGGER), Some(LevelFilter::Info));
        assert_eq!(levels.get("audit"), Some(LevelFilter::Trace));
    }

    #[test]
    fn test_routes_registered() {
        let app = AdminHttpApp::new(
            Admin {
                address: "127.0.0.1:9180".parse().unwrap(),
                api_key: "admin-key".to_string(),
            },
            LogLevels::new(LevelFilter::Info),
        );
        let settings = app.router.at("/settings").unwrap();
        assert!(settings.value.contains_key(&Method::GET));
        assert!(settings.value.contains_key(&Method::POST));
        assert!(app.router.at("/metrics").is_ok());
        assert!(app.router.at("/apisix").is_err());
    }
}
