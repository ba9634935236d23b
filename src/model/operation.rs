use std::fmt;

use http::Method;

use super::AppPair;

/// Coarse classification of the inbound verb.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Read,
    Write,
}

impl Operation {
    pub fn from_method(method: &Method) -> Option<Self> {
        match *method {
            Method::GET | Method::HEAD => Some(Operation::Read),
            Method::POST | Method::PUT | Method::PATCH | Method::DELETE => Some(Operation::Write),
            _ => None,
        }
    }
}

/// Finer-grained kinds filters may act on. The core only computes them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Read,
    Write,
    ScaleUp,
    ScaleDown,
    Restart,
    Destroy,
    Suspend,
    Create,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match self {
            OperationKind::Read => "read",
            OperationKind::Write => "write",
            OperationKind::ScaleUp => "scale_up",
            OperationKind::ScaleDown => "scale_down",
            OperationKind::Restart => "restart",
            OperationKind::Destroy => "destroy",
            OperationKind::Suspend => "suspend",
            OperationKind::Create => "create",
        };
        write!(f, "{}", kind)
    }
}

/// Every kind that applies to `pair` under `method`. `action` is the
/// trailing action segment of a single-app path, if any.
pub fn operation_kinds(method: &Method, action: Option<&str>, pair: &AppPair) -> Vec<OperationKind> {
    let mut kinds = Vec::new();
    match Operation::from_method(method) {
        Some(Operation::Read) => {
            kinds.push(OperationKind::Read);
            return kinds;
        }
        Some(Operation::Write) => kinds.push(OperationKind::Write),
        None => return kinds,
    }

    if *method == Method::DELETE {
        kinds.push(OperationKind::Destroy);
        return kinds;
    }
    if action == Some("restart") {
        kinds.push(OperationKind::Restart);
        return kinds;
    }
    if pair.current.is_empty() {
        kinds.push(OperationKind::Create);
    }

    if let Some(desired) = pair.desired.instances() {
        if desired == 0 {
            kinds.push(OperationKind::Suspend);
        }
        let current = pair.current.instances().unwrap_or(0);
        if !pair.current.is_empty() && desired > current {
            kinds.push(OperationKind::ScaleUp);
        } else if desired < current {
            kinds.push(OperationKind::ScaleDown);
        }
    }
    kinds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::App;
    use serde_json::json;

    fn app(value: serde_json::Value) -> App {
        App::from_value(value).unwrap()
    }

    #[test]
    fn test_method_classification() {
        assert_eq!(Operation::from_method(&Method::GET), Some(Operation::Read));
        for m in [Method::POST, Method::PUT, Method::PATCH, Method::DELETE] {
            assert_eq!(Operation::from_method(&m), Some(Operation::Write));
        }
        assert_eq!(Operation::from_method(&Method::OPTIONS), None);
    }

    #[test]
    fn test_scale_kinds() {
        let pair = AppPair::new(
            app(json!({"instances": 10})),
            app(json!({"id": "/foo", "instances": 2})),
        );
        assert_eq!(
            operation_kinds(&Method::PUT, None, &pair),
            vec![OperationKind::Write, OperationKind::ScaleUp]
        );

        let pair = AppPair::new(
            app(json!({"instances": 0})),
            app(json!({"id": "/foo", "instances": 2})),
        );
        assert_eq!(
            operation_kinds(&Method::PUT, None, &pair),
            vec![
                OperationKind::Write,
                OperationKind::Suspend,
                OperationKind::ScaleDown
            ]
        );
    }

    #[test]
    fn test_create_restart_destroy() {
        let pair = AppPair::new(app(json!({"id": "/foo", "instances": 1})), App::empty());
        assert_eq!(
            operation_kinds(&Method::POST, None, &pair),
            vec![OperationKind::Write, OperationKind::Create]
        );

        let pair = AppPair::new(App::empty(), App::with_id("/foo"));
        assert_eq!(
            operation_kinds(&Method::POST, Some("restart"), &pair),
            vec![OperationKind::Write, OperationKind::Restart]
        );
        assert_eq!(
            operation_kinds(&Method::DELETE, None, &pair),
            vec![OperationKind::Write, OperationKind::Destroy]
        );
        assert_eq!(
            operation_kinds(&Method::GET, None, &pair),
            vec![OperationKind::Read]
        );
    }
}
