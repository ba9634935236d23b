use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::{GatewayError, GatewayResult};

const ID_KEY: &str = "id";
const INSTANCES_KEY: &str = "instances";

/// An orchestrator app definition.
///
/// Only `id` and `instances` are interpreted; every other field is carried
/// verbatim, in its original key order. An app with no fields at all is the
/// empty sentinel: "does not exist yet" on the current side, "no desired
/// change" on the desired side.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct App {
    fields: Map<String, Value>,
}

impl App {
    /// The empty sentinel.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        let mut app = Self::empty();
        app.set_id(id);
        app
    }

    /// Builds an app from a JSON value, which must be an object.
    pub fn from_value(value: Value) -> GatewayResult<Self> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(GatewayError::MalformedBody(format!(
                "app definition must be a JSON object, got {other}"
            ))),
        }
    }

    /// Parses a request body; an empty body yields the empty sentinel.
    pub fn from_slice(body: &[u8]) -> GatewayResult<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::empty());
        }
        Self::from_value(serde_json::from_slice(body)?)
    }

    pub fn id(&self) -> Option<&str> {
        self.fields.get(ID_KEY).and_then(Value::as_str)
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.fields.insert(ID_KEY.to_string(), Value::String(id.into()));
    }

    pub fn instances(&self) -> Option<u64> {
        self.fields.get(INSTANCES_KEY).and_then(Value::as_u64)
    }

    pub fn set_instances(&mut self, instances: u64) {
        self.fields
            .insert(INSTANCES_KEY.to_string(), Value::from(instances));
    }

    /// Opaque orchestrator field lookup.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

impl From<Map<String, Value>> for App {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

/// The unit of work handed to filters: what the client asked for and what
/// the orchestrator currently runs under the same identifier.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AppPair {
    pub desired: App,
    pub current: App,
}

impl AppPair {
    pub fn new(desired: App, current: App) -> Self {
        Self { desired, current }
    }

    /// Identifier the pair is about, preferring the orchestrator's view.
    pub fn id(&self) -> Option<&str> {
        self.current.id().or_else(|| self.desired.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_body_is_sentinel() {
        assert!(App::from_slice(b"").unwrap().is_empty());
        assert!(App::from_slice(b"  \n").unwrap().is_empty());
        assert!(App::from_slice(b"{}").unwrap().is_empty());
        assert_eq!(App::empty().id(), None);
        assert_eq!(App::empty().instances(), None);
    }

    #[test]
    fn test_opaque_fields_keep_order() {
        let body = br#"{"cmd":"sleep 1","id":"/foo","cpus":0.1,"instances":2}"#;
        let app = App::from_slice(body).unwrap();
        assert_eq!(app.id(), Some("/foo"));
        assert_eq!(app.instances(), Some(2));
        assert_eq!(app.field("cpus"), Some(&json!(0.1)));
        assert_eq!(serde_json::to_vec(&app).unwrap(), body.to_vec());
    }

    #[test]
    fn test_set_id_keeps_position() {
        let mut app = App::from_value(json!({"id": "/foo", "mem": 128})).unwrap();
        app.set_id("/dev/foo");
        assert_eq!(
            serde_json::to_string(&app).unwrap(),
            r#"{"id":"/dev/foo","mem":128}"#
        );
    }

    #[test]
    fn test_non_object_is_malformed() {
        let err = App::from_slice(b"[1, 2]").unwrap_err();
        assert!(matches!(err, GatewayError::MalformedBody(_)));
        let err = App::from_slice(b"{not json").unwrap_err();
        assert!(matches!(err, GatewayError::MalformedBody(_)));
    }

    #[test]
    fn test_pair_id_prefers_current() {
        let pair = AppPair::new(App::with_id("/foo"), App::with_id("/dev/foo"));
        assert_eq!(pair.id(), Some("/dev/foo"));
        let creation = AppPair::new(App::with_id("/foo"), App::empty());
        assert_eq!(creation.id(), Some("/foo"));
    }
}
