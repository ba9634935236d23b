use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::App;

/// A subtree of the orchestrator's namespace.
///
/// A group built from an empty body is the empty sentinel and flattens to
/// nothing, same as a group with no apps at any depth.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub apps: Vec<App>,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Group {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.apps.is_empty() && self.groups.is_empty()
    }

    /// Identifiers of every app in the tree, depth-first pre-order: the
    /// group's own apps first, then each child group in turn.
    pub fn flatten(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        self.walk(&mut |app| {
            if let Some(id) = app.id() {
                ids.push(id);
            }
        });
        ids
    }

    /// Consumes the tree into its apps, in the same order as [`Group::flatten`].
    pub fn into_apps(self) -> Vec<App> {
        let mut apps = Vec::new();
        let mut stack = vec![self];
        // Children are pushed in reverse so they pop in their given order.
        while let Some(group) = stack.pop() {
            apps.extend(group.apps);
            stack.extend(group.groups.into_iter().rev());
        }
        apps
    }

    fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a App)) {
        self.apps.iter().for_each(&mut *visit);
        for group in &self.groups {
            group.walk(visit);
        }
    }
}
