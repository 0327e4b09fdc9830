//! Error handlers
//!
//! Provides error reporting and exit status mapping for the binary.

use crate::error::types::{AppError, CleanupError, ServerError};
use log::error;

/// Log a fatal application error
pub fn handle_error(err: &AppError) {
    error!("{}", err);
}

/// Convert error to process exit status
pub fn exit_code(err: &AppError) -> i32 {
    match err {
        AppError::Config(_) => 78,
        AppError::Server(ServerError::PortsExhausted { .. }) => 69,
        AppError::Server(ServerError::Bind(..)) => 69,
        AppError::Server(_) => 70,
        AppError::Cleanup(CleanupError::DirectoryMissing(_)) => 66,
        AppError::Cleanup(CleanupError::NotADirectory(_)) => 66,
        AppError::Cleanup(CleanupError::Io(_)) => 74,
        AppError::Io(_) => 74,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_exit_codes_distinguish_failure_classes() {
        let missing = AppError::Cleanup(CleanupError::DirectoryMissing(PathBuf::from("/nope")));
        let ports = AppError::Server(ServerError::PortsExhausted {
            first: 8000,
            last: 8009,
        });
        let config = AppError::Config(config::ConfigError::Message("bad".into()));

        assert_eq!(exit_code(&missing), 66);
        assert_eq!(exit_code(&ports), 69);
        assert_eq!(exit_code(&config), 78);
    }

    #[test]
    fn test_display_includes_context() {
        let err = AppError::from(ServerError::PortsExhausted {
            first: 8000,
            last: 8009,
        });
        assert_eq!(
            err.to_string(),
            "Server error: No available port in range 8000-8009"
        );
    }
}
