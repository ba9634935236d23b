//! Core types shared by every nsgate module.

pub mod error;

pub use error::{ErrorContext, GatewayError, GatewayResult};
