//! Cleanup result types
//!
//! Defines the per-file dispositions and the summary of a cleanup run.

use std::fmt;
use std::path::PathBuf;

/// What the scanner decided about one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Not open and the rename probe succeeded
    Removable,
    /// Reported open by a process, or the rename probe failed
    InUse,
    /// Something went wrong for this file only
    Error(String),
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disposition::Removable => write!(f, "removable"),
            Disposition::InUse => write!(f, "in use"),
            Disposition::Error(detail) => write!(f, "error: {}", detail),
        }
    }
}

/// Scan result for a single file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDisposition {
    pub path: PathBuf,
    pub in_open_set: bool,
    pub rename_probe_succeeded: bool,
    pub disposition: Disposition,
    /// Set once the file has actually been deleted
    pub removed: bool,
}

impl FileDisposition {
    pub fn in_use(path: PathBuf, in_open_set: bool) -> Self {
        Self {
            path,
            in_open_set,
            rename_probe_succeeded: false,
            disposition: Disposition::InUse,
            removed: false,
        }
    }

    pub fn removable(path: PathBuf) -> Self {
        Self {
            path,
            in_open_set: false,
            rename_probe_succeeded: true,
            disposition: Disposition::Removable,
            removed: false,
        }
    }

    pub fn error(path: PathBuf, detail: impl Into<String>) -> Self {
        Self {
            path,
            in_open_set: false,
            rename_probe_succeeded: false,
            disposition: Disposition::Error(detail.into()),
            removed: false,
        }
    }

    pub fn is_removable(&self) -> bool {
        self.disposition == Disposition::Removable
    }
}

/// Result of a full cleanup run
#[derive(Debug, Clone)]
pub struct CleanupReport {
    pub directory: PathBuf,
    pub dispositions: Vec<FileDisposition>,
    pub removed: usize,
    /// The run stopped early; files removed before that stay removed
    pub cancelled: bool,
}

impl CleanupReport {
    pub fn in_use_count(&self) -> usize {
        self.dispositions
            .iter()
            .filter(|d| d.disposition == Disposition::InUse)
            .count()
    }

    pub fn error_count(&self) -> usize {
        self.dispositions
            .iter()
            .filter(|d| matches!(d.disposition, Disposition::Error(_)))
            .count()
    }
}
