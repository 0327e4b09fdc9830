//! Logging utilities
//!
//! Provides logging setup and configuration.

use env_logger::{Env, Target};
use log::warn;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

/// Setup logging for the server. `RUST_LOG` overrides the `info` default.
///
/// With `log_file`, output is appended to that file. If it cannot be opened
/// the logger falls back to stderr and says so.
pub fn setup_logging(log_file: Option<&Path>) {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_secs().format_target(false);

    let failed = match log_file.map(open_log_file) {
        Some(Ok(file)) => {
            builder.target(Target::Pipe(Box::new(file)));
            None
        }
        Some(Err(e)) => Some(e),
        None => None,
    };

    builder.init();

    if let (Some(e), Some(path)) = (failed, log_file) {
        warn!("Cannot open log file {}: {}; logging to stderr", path.display(), e);
    }
}

fn open_log_file(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_log_file_is_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.log");
        std::fs::write(&path, "earlier\n").unwrap();

        let mut file = open_log_file(&path).unwrap();
        writeln!(file, "later").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "earlier\nlater\n");
    }

    #[test]
    fn test_log_file_in_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(open_log_file(&dir.path().join("absent").join("server.log")).is_err());
    }
}
