//! Error handling
//!
//! Defines error types and handling for the server and cleanup utility.

pub mod handlers;
pub mod types;

pub use types::*;
