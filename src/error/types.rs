//! Error types
//!
//! Defines domain-specific error types for the server and cleanup modules.
//! Per-request failures never appear here: the resolver folds them into a
//! `ResolvedTarget`.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

/// HTTP server startup and runtime errors
#[derive(Debug)]
pub enum ServerError {
    PortsExhausted { first: u16, last: u16 },
    Bind(SocketAddr, io::Error),
    InvalidAddress(String),
    Io(io::Error),
    Http(hyper::Error),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::PortsExhausted { first, last } => {
                write!(f, "No available port in range {}-{}", first, last)
            }
            ServerError::Bind(addr, e) => write!(f, "Failed to bind to {}: {}", addr, e),
            ServerError::InvalidAddress(a) => write!(f, "Invalid listen address: {}", a),
            ServerError::Io(e) => write!(f, "IO error: {}", e),
            ServerError::Http(e) => write!(f, "HTTP error: {}", e),
        }
    }
}

impl std::error::Error for ServerError {}

impl From<io::Error> for ServerError {
    fn from(error: io::Error) -> Self {
        ServerError::Io(error)
    }
}

impl From<hyper::Error> for ServerError {
    fn from(error: hyper::Error) -> Self {
        ServerError::Http(error)
    }
}

/// Directory cleanup errors. Only preconditions of the whole run end up here;
/// per-file failures are recorded in that file's disposition.
#[derive(Debug)]
pub enum CleanupError {
    DirectoryMissing(PathBuf),
    NotADirectory(PathBuf),
    Io(io::Error),
}

impl fmt::Display for CleanupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CleanupError::DirectoryMissing(p) => {
                write!(f, "Directory does not exist: {}", p.display())
            }
            CleanupError::NotADirectory(p) => write!(f, "Not a directory: {}", p.display()),
            CleanupError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for CleanupError {}

impl From<io::Error> for CleanupError {
    fn from(error: io::Error) -> Self {
        CleanupError::Io(error)
    }
}

/// Top-level error for the binary
#[derive(Debug)]
pub enum AppError {
    Config(config::ConfigError),
    Server(ServerError),
    Cleanup(CleanupError),
    Io(io::Error),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(e) => write!(f, "Configuration error: {}", e),
            AppError::Server(e) => write!(f, "Server error: {}", e),
            AppError::Cleanup(e) => write!(f, "Cleanup error: {}", e),
            AppError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for AppError {}

impl From<config::ConfigError> for AppError {
    fn from(error: config::ConfigError) -> Self {
        AppError::Config(error)
    }
}

impl From<ServerError> for AppError {
    fn from(error: ServerError) -> Self {
        AppError::Server(error)
    }
}

impl From<CleanupError> for AppError {
    fn from(error: CleanupError) -> Self {
        AppError::Cleanup(error)
    }
}

impl From<io::Error> for AppError {
    fn from(error: io::Error) -> Self {
        AppError::Io(error)
    }
}
