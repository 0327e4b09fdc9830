//! HTTP server
//!
//! Binds the listener, serves requests through the path resolver and shuts
//! down gracefully.

pub mod core;
pub mod handler;
pub mod responses;

pub use core::{Server, bind_with_retry, shutdown_signal};
pub use handler::{SiteState, handle_request};
