//! Liveness scan
//!
//! Classifies every file under a directory as removable or in use, and
//! removes the removable ones.
//!
//! A file is in use when a process reports it open, or when renaming it to a
//! sibling name and back fails. Both signals are best effort. Some platforms
//! let open files be renamed, and a process may open a file between the probe
//! and the deletion. Files removed in that window are lost; the scan makes no
//! stronger promise.

use log::{error, info, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use crate::cleanup::open_files::OpenFileSet;
use crate::cleanup::results::{CleanupReport, Disposition, FileDisposition};
use crate::error::CleanupError;
use crate::resolve::normalize::{is_within, normalize_lexically};

const REMOVE_RETRIES: u64 = 3;
const MAX_PROBE_NAMES: usize = 16;

static PROBE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Outcome of the rename-and-rename-back probe
#[derive(Debug)]
enum ProbeOutcome {
    Free,
    Busy(io::Error),
    /// Renamed away but could not be put back
    Stranded { temp: PathBuf, error: io::Error },
}

/// One-shot cleanup of a directory tree
#[derive(Debug, Clone)]
pub struct LivenessScanner {
    directory: PathBuf,
}

impl LivenessScanner {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Classify every file without deleting anything.
    pub fn scan(
        &self,
        open_files: &OpenFileSet,
        cancel: &CancellationToken,
    ) -> Result<Vec<FileDisposition>, CleanupError> {
        let base = self.prepare()?;
        let (files, mut dispositions) = collect_files(&base);

        for path in files {
            if cancel.is_cancelled() {
                info!("Scan of {} cancelled", base.display());
                break;
            }
            dispositions.push(classify(path, open_files));
        }

        Ok(dispositions)
    }

    /// Delete every removable file in `dispositions`, returning how many went.
    ///
    /// Paths outside the scanned directory are never deleted; their
    /// disposition becomes an error instead.
    pub fn apply_removals(&self, dispositions: &mut [FileDisposition]) -> usize {
        let base = match self.prepare() {
            Ok(base) => base,
            Err(e) => {
                error!("Cannot apply removals: {}", e);
                for d in dispositions.iter_mut().filter(|d| d.is_removable()) {
                    d.disposition = Disposition::Error(e.to_string());
                }
                return 0;
            }
        };

        dispositions
            .iter_mut()
            .filter(|d| d.is_removable() && !d.removed)
            .map(|d| remove_in_scope(&base, d))
            .filter(|removed| *removed)
            .count()
    }

    /// Probe and remove file by file, keeping the gap between the two short.
    pub fn clean(
        &self,
        open_files: &OpenFileSet,
        cancel: &CancellationToken,
    ) -> Result<CleanupReport, CleanupError> {
        self.clean_each(open_files, cancel, |_| {})
    }

    /// `clean`, calling `visit` with each path before the cancellation check.
    fn clean_each<F>(
        &self,
        open_files: &OpenFileSet,
        cancel: &CancellationToken,
        mut visit: F,
    ) -> Result<CleanupReport, CleanupError>
    where
        F: FnMut(&Path),
    {
        let base = self.prepare()?;
        info!("Starting cleanup of directory: {}", base.display());

        let (files, mut dispositions) = collect_files(&base);
        let mut removed = 0;
        let mut cancelled = false;

        for path in files {
            visit(&path);
            if cancel.is_cancelled() {
                warn!("Cleanup of {} cancelled", base.display());
                cancelled = true;
                break;
            }

            let mut disposition = classify(path, open_files);
            if disposition.is_removable() && remove_in_scope(&base, &mut disposition) {
                removed += 1;
            }
            dispositions.push(disposition);
        }

        info!("Cleanup finished. {} files were removed", removed);

        Ok(CleanupReport {
            directory: base,
            dispositions,
            removed,
            cancelled,
        })
    }

    /// The directory must exist before anything is touched.
    fn prepare(&self) -> Result<PathBuf, CleanupError> {
        let metadata = match fs::metadata(&self.directory) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CleanupError::DirectoryMissing(self.directory.clone()));
            }
            Err(e) => return Err(CleanupError::Io(e)),
        };

        if !metadata.is_dir() {
            return Err(CleanupError::NotADirectory(self.directory.clone()));
        }

        Ok(fs::canonicalize(&self.directory)?)
    }
}

/// Walk the tree up front, in name order, so probe renames cannot show up as
/// new entries. Unreadable entries become error dispositions.
fn collect_files(base: &Path) -> (Vec<PathBuf>, Vec<FileDisposition>) {
    let mut files = Vec::new();
    let mut errors = Vec::new();

    for entry in WalkDir::new(base)
        .follow_links(false)
        .min_depth(1)
        .sort_by_file_name()
    {
        match entry {
            Ok(entry) => {
                let file_type = entry.file_type();
                if file_type.is_dir() {
                    continue;
                }
                // Symlinked directories are neither walked nor removed
                if file_type.is_symlink() && entry.path().is_dir() {
                    continue;
                }
                files.push(normalize_lexically(entry.path()));
            }
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| base.to_path_buf());
                error!("Cannot read {}: {}", path.display(), e);
                errors.push(FileDisposition::error(path, e.to_string()));
            }
        }
    }

    (files, errors)
}

fn classify(path: PathBuf, open_files: &OpenFileSet) -> FileDisposition {
    if open_files.contains(&path) {
        info!("File in use: {}", path.display());
        return FileDisposition::in_use(path, true);
    }

    match rename_probe(&path) {
        ProbeOutcome::Free => FileDisposition::removable(path),
        ProbeOutcome::Busy(e) => {
            info!("File in use (rename probe): {} ({})", path.display(), e);
            FileDisposition::in_use(path, false)
        }
        ProbeOutcome::Stranded { temp, error } => {
            error!(
                "Probe could not restore {} from {}: {}",
                path.display(),
                temp.display(),
                error
            );
            let detail = format!("left at {} after probe: {}", temp.display(), error);
            FileDisposition::error(path, detail)
        }
    }
}

fn rename_probe(path: &Path) -> ProbeOutcome {
    let Some(temp) = probe_path(path) else {
        return ProbeOutcome::Busy(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "no free temporary name for probe",
        ));
    };

    if let Err(e) = fs::rename(path, &temp) {
        return ProbeOutcome::Busy(e);
    }

    match fs::rename(&temp, path) {
        Ok(()) => ProbeOutcome::Free,
        Err(error) => ProbeOutcome::Stranded { temp, error },
    }
}

/// A sibling name that does not exist yet. Renaming onto an existing file
/// would replace it.
fn probe_path(path: &Path) -> Option<PathBuf> {
    let parent = path.parent()?;
    let name = path.file_name()?.to_string_lossy();

    (0..MAX_PROBE_NAMES)
        .map(|_| {
            let n = PROBE_COUNTER.fetch_add(1, Ordering::Relaxed);
            parent.join(format!(".{}.{}.{}.probe", name, process::id(), n))
        })
        .find(|candidate| fs::symlink_metadata(candidate).is_err())
}

/// Remove one file if it lies inside `base`. Returns true when it was deleted.
fn remove_in_scope(base: &Path, disposition: &mut FileDisposition) -> bool {
    let path = normalize_lexically(&disposition.path);
    if !path.is_absolute() || path == base || !is_within(&path, base) {
        warn!(
            "Refusing to remove {}: outside {}",
            disposition.path.display(),
            base.display()
        );
        disposition.disposition = Disposition::Error("outside scanned directory".into());
        return false;
    }

    for attempt in 1..=REMOVE_RETRIES {
        match fs::remove_file(&path) {
            Ok(()) => {
                info!("Removed file: {}", path.display());
                disposition.removed = true;
                return true;
            }
            Err(e) if attempt < REMOVE_RETRIES && e.kind() == io::ErrorKind::PermissionDenied => {
                thread::sleep(Duration::from_millis(100 * attempt));
            }
            Err(e) => {
                error!("Failed to remove {}: {}", path.display(), e);
                disposition.disposition = Disposition::Error(e.to_string());
                return false;
            }
        }
    }

    false
}
