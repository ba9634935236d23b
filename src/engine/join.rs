//! Request recomposition, the inverse of [`super::split`].
//!
//! Paths produced here are client-style (`/v2/apps/dev/foo`); only lookups
//! made by the orchestrator client use the doubled-slash form.

use bytes::Bytes;
use serde_json::Value;

use crate::{
    core::GatewayResult,
    model::{Account, AppPair, Operation},
};

use super::{
    namespace,
    request::{ClientRequest, OutboundRequest, Target, APPS_PREFIX, GROUPS_PREFIX},
};

/// Builds the outbound request for `request` from its (possibly mutated)
/// pairs. Without an account, or without any pair, paths are left alone;
/// unmutated pairs reproduce the original body bytes.
pub fn join(request: &ClientRequest, pairs: &[AppPair]) -> GatewayResult<OutboundRequest> {
    if pairs.is_empty() {
        return Ok(request.passthrough());
    }

    let account = request.account();
    match request.target() {
        Target::App { id, action } => join_app(request, account, &id, action.as_deref(), &pairs[0]),
        Target::Apps if request.has_body() => join_bulk(request, pairs),
        Target::Apps | Target::Passthrough => Ok(request.passthrough()),
        Target::Group { id } => Ok(group_request(request, account, &id)),
    }
}

/// Group requests scoped to an account always address the namespaced group,
/// even when it flattened to nothing: passing `/v2/groups` through would
/// expose the orchestrator's real root.
pub fn scoped_group(request: &ClientRequest) -> Option<OutboundRequest> {
    match (request.target(), request.account()) {
        (Target::Group { id }, Some(account)) => Some(group_request(request, Some(account), &id)),
        _ => None,
    }
}

fn join_app(
    request: &ClientRequest,
    account: Option<&Account>,
    bare_id: &str,
    action: Option<&str>,
    pair: &AppPair,
) -> GatewayResult<OutboundRequest> {
    let mut outbound = request.passthrough();

    if account.is_some() {
        let path = match pair.current.id() {
            Some(current) => namespace::collection_path(APPS_PREFIX, current),
            None => namespace::collection_path(APPS_PREFIX, &namespace::qualify(account, bare_id)),
        };
        outbound.path = match action {
            Some(action) => format!("{path}/{action}"),
            None => path,
        };
    }

    // Bodyless requests stay bodyless, action bodies are not apps.
    if request.has_body() && action.is_none() {
        outbound.body = reuse_or_encode(&request.body, pair.desired.clone().into_value())?;
    }
    Ok(outbound)
}

fn join_bulk(request: &ClientRequest, pairs: &[AppPair]) -> GatewayResult<OutboundRequest> {
    let mut outbound = request.passthrough();
    let mut desired: Vec<Value> = pairs.iter().map(|p| p.desired.clone().into_value()).collect();

    let single_object = request.body.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'{');
    let value = if single_object && desired.len() == 1 {
        desired.remove(0)
    } else {
        Value::Array(desired)
    };
    outbound.body = reuse_or_encode(&request.body, value)?;
    Ok(outbound)
}

fn group_request(
    request: &ClientRequest,
    account: Option<&Account>,
    bare_id: &str,
) -> OutboundRequest {
    let mut outbound = request.passthrough();
    if account.is_some() {
        outbound.path =
            namespace::collection_path(GROUPS_PREFIX, &namespace::qualify(account, bare_id));
    }
    // Group writes are forwarded whole; only reads drop their body.
    if Operation::from_method(&request.method) == Some(Operation::Read) {
        outbound.body = Bytes::new();
        outbound.content_type = None;
    }
    outbound
}

/// The original bytes when `value` is what they already encode.
fn reuse_or_encode(original: &Bytes, value: Value) -> GatewayResult<Bytes> {
    match serde_json::from_slice::<Value>(original) {
        Ok(parsed) if parsed == value => Ok(original.clone()),
        _ => Ok(Bytes::from(serde_json::to_vec(&value)?)),
    }
}
