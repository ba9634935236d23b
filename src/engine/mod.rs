//! The split/join engine.
//!
//! A client request addressing apps or groups is split into ordered
//! (desired, current) pairs, handed to filters, and joined back into the
//! single request the orchestrator receives.

pub mod join;
pub mod namespace;
pub mod request;
pub mod response;
pub mod split;

#[cfg(test)]
pub(crate) mod testing;

pub use join::join;
pub use request::{ClientRequest, OutboundRequest, Target};
pub use response::{rewrite_body, ResponseHooks};
pub use split::{PairStream, Splitter};
