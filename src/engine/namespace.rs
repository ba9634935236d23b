//! Namespace resolution.
//!
//! Tenants share the orchestrator by living under `/<namespace>/...`. Apps
//! created before namespacing existed still live at their bare path, so
//! lookups try the namespaced ("migrated") form first and the bare ("legacy")
//! form second. Writes that create apps always use the namespaced form.

use crate::model::Account;

const ROOT: &str = "/";

/// Candidate lookup paths for `bare_id`, in the order they must be tried.
///
/// The root id has no legacy form: falling back to the orchestrator's real
/// root would expose every tenant.
pub fn resolve(account: Option<&Account>, bare_id: &str) -> Vec<String> {
    match account {
        None => vec![bare_id.to_string()],
        Some(_) if bare_id == ROOT => vec![qualify(account, bare_id)],
        Some(_) => vec![qualify(account, bare_id), bare_id.to_string()],
    }
}

/// The namespaced form of `bare_id`; unchanged without an account.
pub fn qualify(account: Option<&Account>, bare_id: &str) -> String {
    match account {
        Some(account) => format!("/{}{}", account.namespace, bare_id),
        None => bare_id.to_string(),
    }
}

/// Drops the caller's namespace from `full_id` for presentation. Ids outside
/// the caller's namespace are returned unchanged.
pub fn strip(account: Option<&Account>, full_id: &str) -> String {
    let Some(account) = account else {
        return full_id.to_string();
    };
    let rest = full_id
        .strip_prefix('/')
        .and_then(|id| id.strip_prefix(account.namespace.as_str()));
    match rest {
        Some("") => ROOT.to_string(),
        Some(local) if local.starts_with('/') => local.to_string(),
        _ => full_id.to_string(),
    }
}

/// Whether `full_id` lives under the caller's namespace.
pub fn is_qualified(account: &Account, full_id: &str) -> bool {
    strip(Some(account), full_id) != full_id
}

/// Joins a collection prefix and a fully-qualified id into a client-style
/// path: `/v2/groups` + `/dev/` is `/v2/groups/dev`.
pub fn collection_path(collection: &str, full_id: &str) -> String {
    let id = full_id.trim_matches('/');
    if id.is_empty() {
        collection.to_string()
    } else {
        format!("{collection}/{id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dev() -> Account {
        Account::new(4, "Dev", "dev", "company")
    }

    #[test]
    fn test_resolve_order() {
        let account = dev();
        assert_eq!(resolve(None, "/foo"), vec!["/foo"]);
        assert_eq!(resolve(Some(&account), "/foo"), vec!["/dev/foo", "/foo"]);
        assert_eq!(resolve(Some(&account), "/"), vec!["/dev/"]);
    }

    #[test]
    fn test_qualify() {
        let account = dev();
        assert_eq!(qualify(Some(&account), "/foo"), "/dev/foo");
        assert_eq!(qualify(Some(&account), "/a/b"), "/dev/a/b");
        assert_eq!(qualify(None, "/foo"), "/foo");
    }

    #[test]
    fn test_strip() {
        let account = dev();
        assert_eq!(strip(Some(&account), "/dev/foo"), "/foo");
        assert_eq!(strip(Some(&account), "/dev/a/b"), "/a/b");
        assert_eq!(strip(Some(&account), "/dev"), "/");
        assert_eq!(strip(Some(&account), "/dev/"), "/");
        assert_eq!(strip(Some(&account), "/foo"), "/foo");
        assert_eq!(strip(Some(&account), "/devops/foo"), "/devops/foo");
        assert_eq!(strip(None, "/dev/foo"), "/dev/foo");
        assert!(is_qualified(&account, "/dev/foo"));
        assert!(!is_qualified(&account, "/foo"));
    }

    #[test]
    fn test_collection_path() {
        assert_eq!(collection_path("/v2/groups", "/dev/"), "/v2/groups/dev");
        assert_eq!(
            collection_path("/v2/groups", "/dev/group-b"),
            "/v2/groups/dev/group-b"
        );
        assert_eq!(collection_path("/v2/groups", "/"), "/v2/groups");
        assert_eq!(collection_path("/v2/apps", "/dev/foo"), "/v2/apps/dev/foo");
    }
}
