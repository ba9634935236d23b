use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::net::SocketAddr;

use log::{debug, trace};
use pingora::server::configuration::{Opt, ServerConf};
use pingora_error::{Error, ErrorType::*, OrErr, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Value as YamlValue;
use validator::{Validate, ValidationError};

use crate::model::Account;

#[derive(Default, Debug, Serialize, Deserialize, Validate)]
pub struct Config {
    #[serde(default)]
    pub pingora: ServerConf,

    #[validate(length(min = 1))]
    #[validate(nested)]
    pub listeners: Vec<Listener>,

    #[validate(nested)]
    pub orchestrator: Orchestrator,

    #[validate(nested)]
    pub auth: Option<Auth>,

    /// Filter name to filter configuration.
    #[serde(default)]
    pub filters: BTreeMap<String, YamlValue>,

    #[validate(nested)]
    pub admin: Option<Admin>,

    #[validate(nested)]
    pub log: Option<Log>,
}

// Config file load and validation
impl Config {
    // Does not have to be async until we want runtime reload
    pub fn load_from_yaml<P>(path: P) -> Result<Self>
    where
        P: AsRef<std::path::Path> + std::fmt::Display,
    {
        let conf_str = fs::read_to_string(&path).or_err_with(ReadError, || {
            format!("Unable to read conf file from {path}")
        })?;
        debug!("Conf file read from {path}");
        Self::from_yaml(&conf_str)
    }

    // config file load entry point
    pub fn load_yaml_with_opt_override(opt: &Opt) -> Result<Self> {
        if let Some(path) = &opt.conf {
            let mut conf = Self::load_from_yaml(path)?;
            conf.merge_with_opt(opt);
            Ok(conf)
        } else {
            Error::e_explain(ReadError, "No path specified")
        }
    }

    pub fn from_yaml(conf_str: &str) -> Result<Self> {
        trace!("Read conf file: {conf_str}");
        let conf: Config = serde_yaml::from_str(conf_str).or_err_with(ReadError, || {
            format!("Unable to parse yaml conf {conf_str}")
        })?;

        trace!("Loaded conf: {conf:?}");

        // use validator to validate conf file
        conf.validate()
            .or_err_with(FileReadError, || "Conf file valid failed")?;

        Ok(conf)
    }

    pub fn merge_with_opt(&mut self, opt: &Opt) {
        if opt.daemon {
            self.pingora.daemon = true;
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
#[validate(schema(function = "Listener::validate_tls_for_offer_h2"))]
pub struct Listener {
    pub address: SocketAddr,
    pub tls: Option<Tls>,
    #[serde(default)]
    pub offer_h2: bool,
}

impl Listener {
    fn validate_tls_for_offer_h2(&self) -> Result<(), ValidationError> {
        if self.offer_h2 && self.tls.is_none() {
            Err(ValidationError::new("tls_required_for_h2"))
        } else {
            Ok(())
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tls {
    pub cert_path: String,
    pub key_path: String,
}

/// Where the orchestrator control plane lives and how hard to hit it.
#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct Orchestrator {
    #[validate(custom(function = "Orchestrator::validate_address"))]
    pub address: String,
    /// Per-call timeout in seconds.
    #[serde(default = "Orchestrator::default_timeout")]
    #[validate(range(min = 1))]
    pub timeout: u64,
    /// Upper bound on concurrent lookups issued for one request.
    #[serde(default = "Orchestrator::default_concurrency")]
    #[validate(range(min = 1))]
    pub concurrency: usize,
    /// Authorization header value sent with every upstream call.
    pub auth_header: Option<String>,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self {
            address: "http://127.0.0.1:8080".to_string(),
            timeout: Self::default_timeout(),
            concurrency: Self::default_concurrency(),
            auth_header: None,
        }
    }
}

impl Orchestrator {
    fn default_timeout() -> u64 {
        10
    }

    fn default_concurrency() -> usize {
        8
    }

    fn validate_address(address: &str) -> Result<(), ValidationError> {
        if address.starts_with("http://") || address.starts_with("https://") {
            Ok(())
        } else {
            Err(ValidationError::new("orchestrator_address_must_be_http"))
        }
    }
}

/// Identity layer settings. Without it every request is anonymous.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Validate)]
#[validate(schema(function = "Auth::validate_user_accounts"))]
pub struct Auth {
    #[validate(length(min = 1))]
    pub jwt_secret: String,
    #[serde(default)]
    pub base64_secret: bool,
    #[validate(nested)]
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub users: Vec<UserEntry>,
}

impl Auth {
    fn validate_user_accounts(&self) -> Result<(), ValidationError> {
        let known: HashSet<u64> = self.accounts.iter().map(|a| a.id).collect();
        for user in &self.users {
            if let Some(missing) = user.accounts.iter().find(|id| !known.contains(id)) {
                let mut err = ValidationError::new("unknown_account");
                err.add_param("account".into(), missing);
                return Err(err);
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserEntry {
    pub email: String,
    pub name: String,
    pub auth_key: Option<String>,
    /// Account ids, the first one is the default.
    #[serde(default)]
    pub accounts: Vec<u64>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct Admin {
    pub address: SocketAddr,
    #[validate(length(min = 1))]
    pub api_key: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct Log {
    pub path: Option<String>,
    #[serde(default = "Log::default_level")]
    pub level: String,
}

impl Log {
    fn default_level() -> String {
        "INFO".to_string()
    }
}
