use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

static NAMESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9_-]*$").unwrap());

/// A tenant. Its namespace is the path segment every app it owns lives under.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Account {
    pub id: u64,
    pub name: String,
    #[validate(custom(function = "validate_namespace"))]
    pub namespace: String,
    #[serde(default)]
    pub owner: String,
}

impl Account {
    pub fn new(id: u64, name: &str, namespace: &str, owner: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            namespace: namespace.to_string(),
            owner: owner.to_string(),
        }
    }
}

pub fn validate_namespace(namespace: &str) -> Result<(), ValidationError> {
    if NAMESPACE_RE.is_match(namespace) {
        Ok(())
    } else {
        let mut err = ValidationError::new("invalid_namespace");
        err.add_param("namespace".into(), &namespace.to_string());
        Err(err)
    }
}

/// The caller of a request, as established by the identity layer.
///
/// `current_account` is `None` for anonymous/internal calls; no namespacing
/// is applied to those.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub current_account: Option<Account>,
}

impl User {
    pub fn new(email: &str, name: &str) -> Self {
        Self {
            email: email.to_string(),
            name: name.to_string(),
            accounts: Vec::new(),
            current_account: None,
        }
    }

    pub fn with_account(mut self, account: Account) -> Self {
        self.current_account = Some(account);
        self
    }

    pub fn is_member_of(&self, account_id: u64) -> bool {
        self.accounts.iter().any(|a| a.id == account_id)
    }
}
