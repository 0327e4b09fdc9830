//! Request path resolution
//!
//! Decodes, normalizes and policy-checks request paths against the server
//! root. Lexical helpers live in `normalize`, the pipeline in `resolver`.

pub mod normalize;
pub mod resolver;
pub mod results;

pub use resolver::{PathResolver, ResolverConfig, RoutingMode};
pub use results::{DenyReason, ResolvedTarget};
