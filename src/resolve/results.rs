//! Resolver result types
//!
//! Defines the decision handed from the resolver to the HTTP layer.

use std::fmt;
use std::path::PathBuf;

/// Why a request path was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenyReason {
    /// The normalized path escapes the server root
    OutsideRoot,
    /// The extension is not in the allowed set
    DisallowedExtension,
    /// Undecodable path, missing file, or a directory
    NotFound,
}

impl DenyReason {
    /// Security violations are answered with 403 and audited
    pub fn is_security_violation(&self) -> bool {
        matches!(self, DenyReason::OutsideRoot | DenyReason::DisallowedExtension)
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::OutsideRoot => write!(f, "path outside server root"),
            DenyReason::DisallowedExtension => write!(f, "file extension not allowed"),
            DenyReason::NotFound => write!(f, "not found"),
        }
    }
}

/// Outcome of resolving one request path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedTarget {
    Allowed { path: PathBuf, extension: String },
    Denied { reason: DenyReason },
}

impl ResolvedTarget {
    pub fn denied(reason: DenyReason) -> Self {
        ResolvedTarget::Denied { reason }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, ResolvedTarget::Allowed { .. })
    }
}
