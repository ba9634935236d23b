use bytes::Bytes;
use http::Method;

use crate::model::{Account, User};

pub const APPS_PREFIX: &str = "/v2/apps";
pub const GROUPS_PREFIX: &str = "/v2/groups";

/// Segments of a single-app path that start an action on the app, possibly
/// followed by a sub-resource (`tasks/<task-id>`, `versions/<version>`).
const APP_ACTIONS: &[&str] = &["restart", "tasks", "versions"];

/// What an inbound path addresses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// One app by bare id (always with a single leading slash).
    App { id: String, action: Option<String> },
    /// The app collection: a list body, or read-all.
    Apps,
    /// A group subtree by bare id; the root group is `/`.
    Group { id: String },
    /// Anything else; forwarded untouched.
    Passthrough,
}

impl Target {
    pub fn parse(path: &str) -> Self {
        if let Some(rest) = strip_collection(path, APPS_PREFIX) {
            let rest = rest.trim_matches('/');
            if rest.is_empty() {
                return Target::Apps;
            }
            let segments: Vec<&str> = rest.split('/').collect();
            // the first segment always belongs to the id
            let action_at = segments
                .iter()
                .skip(1)
                .position(|s| APP_ACTIONS.contains(s))
                .map(|i| i + 1);
            return match action_at {
                Some(i) => Target::App {
                    id: bare_id(&segments[..i].join("/")),
                    action: Some(segments[i..].join("/")),
                },
                None => Target::App {
                    id: bare_id(rest),
                    action: None,
                },
            };
        }

        if let Some(rest) = strip_collection(path, GROUPS_PREFIX) {
            return Target::Group { id: bare_id(rest) };
        }

        Target::Passthrough
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Target::App { .. } => "app",
            Target::Apps => "apps",
            Target::Group { .. } => "group",
            Target::Passthrough => "passthrough",
        }
    }
}

/// `/v2/apps`, `/v2/apps/...` match `/v2/apps`; `/v2/appsx` does not.
fn strip_collection<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(prefix)?;
    (rest.is_empty() || rest.starts_with('/')).then_some(rest)
}

/// Collapses leading/trailing slashes: `//foo/` and `foo` both become `/foo`.
fn bare_id(raw: &str) -> String {
    format!("/{}", raw.trim_matches('/'))
}

/// An inbound client request with the caller attached by the identity layer.
#[derive(Clone, Debug)]
pub struct ClientRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub content_type: Option<String>,
    pub body: Bytes,
    pub user: Option<User>,
}

impl ClientRequest {
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            query: None,
            content_type: None,
            body: Bytes::new(),
            user: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self.content_type = Some("application/json".to_string());
        self
    }

    pub fn with_user(mut self, user: Option<User>) -> Self {
        self.user = user;
        self
    }

    pub fn with_query(mut self, query: Option<&str>) -> Self {
        self.query = query.map(str::to_string);
        self
    }

    pub fn target(&self) -> Target {
        Target::parse(&self.path)
    }

    /// The account requests are namespaced for, if any.
    pub fn account(&self) -> Option<&Account> {
        self.user.as_ref().and_then(|u| u.current_account.as_ref())
    }

    pub fn has_body(&self) -> bool {
        !self.body.iter().all(u8::is_ascii_whitespace)
    }

    /// Identity outbound request: same method, path, query and body bytes.
    pub fn passthrough(&self) -> OutboundRequest {
        OutboundRequest {
            method: self.method.clone(),
            path: self.path.clone(),
            query: self.query.clone(),
            content_type: self.content_type.clone(),
            body: self.body.clone(),
        }
    }
}

/// The request sent to the orchestrator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl OutboundRequest {
    pub fn path_and_query(&self) -> String {
        match &self.query {
            Some(q) if !q.is_empty() => format!("{}?{}", self.path, q),
            _ => self.path.clone(),
        }
    }
}
