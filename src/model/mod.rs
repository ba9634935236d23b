//! Per-request data model: apps, groups, tenants and operation kinds.

mod account;
mod app;
mod group;
mod operation;

pub use account::{validate_namespace, Account, User};
pub use app::{App, AppPair};
pub use group::Group;
pub use operation::{operation_kinds, Operation, OperationKind};
