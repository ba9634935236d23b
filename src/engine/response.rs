//! Response-side pairing.
//!
//! The orchestrator's answer is walked in place: every app it contains is
//! handed to the hooks in document order and written back where it was
//! found. Group trees are walked depth-first, pre-order, like
//! [`crate::model::Group::flatten`].

use bytes::Bytes;
use serde_json::{Map, Value};

use crate::{core::GatewayResult, model::App};

const APP_KEY: &str = "app";
const APPS_KEY: &str = "apps";
const GROUPS_KEY: &str = "groups";
const ID_KEY: &str = "id";

/// What response filtering does with each app and group id found in a body.
pub trait ResponseHooks {
    /// The app to put back, or `None` to withhold it from the client.
    fn app(&mut self, app: App) -> GatewayResult<Option<App>>;

    fn group_id(&mut self, id: &str) -> GatewayResult<String>;
}

/// Runs `hooks` over a JSON response body. Bodies that are not JSON, or
/// that come out unchanged, are returned as the original bytes.
pub fn rewrite_body(body: &Bytes, hooks: &mut impl ResponseHooks) -> GatewayResult<Bytes> {
    let Ok(original) = serde_json::from_slice::<Value>(body) else {
        return Ok(body.clone());
    };

    let mut value = original.clone();
    rewrite_value(&mut value, hooks)?;
    if value == original {
        return Ok(body.clone());
    }
    Ok(Bytes::from(serde_json::to_vec(&value)?))
}

fn rewrite_value(value: &mut Value, hooks: &mut impl ResponseHooks) -> GatewayResult<()> {
    match value {
        Value::Array(items) => rewrite_app_list(items, hooks),
        Value::Object(map) if is_group(map) => rewrite_group(map, hooks),
        Value::Object(map) => {
            if let Some(app) = map.get_mut(APP_KEY) {
                return rewrite_app(app, hooks);
            }
            if let Some(Value::Array(items)) = map.get_mut(APPS_KEY) {
                return rewrite_app_list(items, hooks);
            }
            if map.contains_key(ID_KEY) {
                return rewrite_app(value, hooks);
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn is_group(map: &Map<String, Value>) -> bool {
    map.contains_key(ID_KEY) && map.get(GROUPS_KEY).is_some_and(Value::is_array)
}

fn rewrite_group(map: &mut Map<String, Value>, hooks: &mut impl ResponseHooks) -> GatewayResult<()> {
    if let Some(Value::String(id)) = map.get_mut(ID_KEY) {
        *id = hooks.group_id(id)?;
    }
    if let Some(Value::Array(apps)) = map.get_mut(APPS_KEY) {
        rewrite_app_list(apps, hooks)?;
    }
    if let Some(Value::Array(groups)) = map.get_mut(GROUPS_KEY) {
        for group in groups.iter_mut() {
            if let Value::Object(child) = group {
                rewrite_group(child, hooks)?;
            }
        }
    }
    Ok(())
}

fn rewrite_app_list(items: &mut Vec<Value>, hooks: &mut impl ResponseHooks) -> GatewayResult<()> {
    let mut kept = Vec::with_capacity(items.len());
    for item in items.drain(..) {
        if !item.is_object() {
            kept.push(item);
            continue;
        }
        if let Some(app) = hooks.app(App::from_value(item)?)? {
            kept.push(app.into_value());
        }
    }
    *items = kept;
    Ok(())
}

/// A single app is never withheld; its hook result `None` leaves it as is.
fn rewrite_app(slot: &mut Value, hooks: &mut impl ResponseHooks) -> GatewayResult<()> {
    if !slot.is_object() {
        return Ok(());
    }
    let original = slot.take();
    let app = App::from_value(original.clone())?;
    *slot = match hooks.app(app)? {
        Some(app) => app.into_value(),
        None => original,
    };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Strips a `/dev` prefix and withholds anything under `/secret`.
    #[derive(Default)]
    struct StripDev {
        seen: Vec<String>,
    }

    impl ResponseHooks for StripDev {
        fn app(&mut self, mut app: App) -> GatewayResult<Option<App>> {
            let id = app.id().unwrap_or_default().to_string();
            self.seen.push(id.clone());
            if id.starts_with("/secret") {
                return Ok(None);
            }
            if let Some(local) = id.strip_prefix("/dev") {
                app.set_id(local);
            }
            Ok(Some(app))
        }

        fn group_id(&mut self, id: &str) -> GatewayResult<String> {
            self.seen.push(format!("group:{id}"));
            Ok(match id.strip_prefix("/dev") {
                Some("") => "/".to_string(),
                Some(local) => local.to_string(),
                None => id.to_string(),
            })
        }
    }

    fn rewrite(value: Value) -> (Value, Vec<String>) {
        let mut hooks = StripDev::default();
        let body = Bytes::from(value.to_string());
        let out = rewrite_body(&body, &mut hooks).unwrap();
        (serde_json::from_slice(&out).unwrap(), hooks.seen)
    }

    #[test]
    fn test_single_app_envelope() {
        let (out, seen) = rewrite(json!({"app": {"id": "/dev/foo", "instances": 2}}));
        assert_eq!(out, json!({"app": {"id": "/foo", "instances": 2}}));
        assert_eq!(seen, vec!["/dev/foo"]);
    }

    #[test]
    fn test_bare_app() {
        let (out, _) = rewrite(json!({"id": "/dev/foo", "cmd": "sleep 1"}));
        assert_eq!(out, json!({"id": "/foo", "cmd": "sleep 1"}));
    }

    #[test]
    fn test_app_list_withholds() {
        let (out, seen) = rewrite(json!({"apps": [
            {"id": "/dev/a"}, {"id": "/secret/b"}, {"id": "/dev/c"}
        ]}));
        assert_eq!(out, json!({"apps": [{"id": "/a"}, {"id": "/c"}]}));
        assert_eq!(seen, vec!["/dev/a", "/secret/b", "/dev/c"]);
    }

    #[test]
    fn test_group_tree_in_order() {
        let (out, seen) = rewrite(json!({
            "id": "/dev",
            "apps": [{"id": "/dev/a/app0"}],
            "groups": [
                {"id": "/dev/group-b", "apps": [{"id": "/dev/group-b/appb0"}], "groups": []}
            ],
            "version": "2017-01-01"
        }));
        assert_eq!(
            out,
            json!({
                "id": "/",
                "apps": [{"id": "/a/app0"}],
                "groups": [
                    {"id": "/group-b", "apps": [{"id": "/group-b/appb0"}], "groups": []}
                ],
                "version": "2017-01-01"
            })
        );
        assert_eq!(
            seen,
            vec!["group:/dev", "/dev/a/app0", "group:/dev/group-b", "/dev/group-b/appb0"]
        );
    }

    #[test]
    fn test_unchanged_body_keeps_bytes() {
        let body = Bytes::from("{ \"apps\" : [ {\"id\": \"/other\"} ] }");
        let out = rewrite_body(&body, &mut StripDev::default()).unwrap();
        assert_eq!(out, body);
    }

    #[test]
    fn test_non_json_and_deployments_untouched() {
        let body = Bytes::from("Service Unavailable");
        assert_eq!(rewrite_body(&body, &mut StripDev::default()).unwrap(), body);

        let body = Bytes::from(r#"{"deploymentId":"5ed4c0c5","version":"2017-01-01"}"#);
        let mut hooks = StripDev::default();
        assert_eq!(rewrite_body(&body, &mut hooks).unwrap(), body);
        assert!(hooks.seen.is_empty());
    }
}
