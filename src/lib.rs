pub mod cleanup;
pub mod config;
pub mod error;
pub mod resolve;
pub mod server;
pub mod utils;

pub use cleanup::{LivenessScanner, OpenFileSet};
pub use resolve::{PathResolver, ResolvedTarget};
pub use server::Server;
