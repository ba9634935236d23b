//! nsgate: a namespacing gateway in front of a Marathon-style orchestrator.
//!
//! Client requests addressing apps or groups are split into per-app pairs,
//! run through filters, joined back and forwarded with every id moved into
//! the caller's account namespace.

pub mod admin;
pub mod auth;
pub mod config;
pub mod core;
pub mod engine;
pub mod filter;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod orchestrator;
pub mod service;
pub(crate) mod utils;
