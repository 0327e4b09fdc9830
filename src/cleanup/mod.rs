//! Directory cleanup
//!
//! Removes files under a directory that no running process is using.

pub mod open_files;
pub mod scanner;
pub mod results;

pub use open_files::OpenFileSet;
pub use results::{CleanupReport, Disposition, FileDisposition};
pub use scanner::LivenessScanner;
