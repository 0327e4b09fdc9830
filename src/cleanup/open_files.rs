//! Open file snapshot
//!
//! Collects the files currently held open by running processes. This is the
//! cheap primary signal for the cleanup scan; the rename probe covers what it
//! misses.

use log::{debug, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::resolve::normalize::normalize_lexically;

/// Absolute paths reported open at snapshot time
#[derive(Debug, Clone, Default)]
pub struct OpenFileSet {
    paths: HashSet<PathBuf>,
}

impl OpenFileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from arbitrary paths. Relative paths are made absolute
    /// against the current directory; paths that cannot be are dropped.
    ///
    /// Each path is stored as given and under its resolved forms, so a file
    /// reached through a symlinked directory still matches the scan.
    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let paths = paths
            .into_iter()
            .filter_map(|p| std::path::absolute(p.as_ref()).ok())
            .flat_map(|p| path_forms(&normalize_lexically(&p)))
            .collect();
        Self { paths }
    }

    /// Snapshot the files open in every process we are allowed to inspect.
    pub fn from_processes() -> Self {
        #[cfg(target_os = "linux")]
        {
            Self::from_proc_root(Path::new("/proc"))
        }

        #[cfg(not(target_os = "linux"))]
        {
            warn!("Process file enumeration is not supported on this platform; relying on rename probe");
            Self::default()
        }
    }

    /// Read `<proc_root>/<pid>/fd/*` links. Processes that exit meanwhile or
    /// deny access are skipped.
    pub fn from_proc_root(proc_root: &Path) -> Self {
        let mut paths = HashSet::new();

        let entries = match std::fs::read_dir(proc_root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot read {}: {}", proc_root.display(), e);
                return Self { paths };
            }
        };

        let mut inspected = 0usize;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let is_pid = name
                .to_str()
                .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()));
            if !is_pid {
                continue;
            }

            let Ok(fds) = std::fs::read_dir(entry.path().join("fd")) else {
                continue;
            };
            inspected += 1;

            for fd in fds.flatten() {
                if let Some(target) = std::fs::read_link(fd.path()).ok().and_then(open_target) {
                    paths.insert(target);
                }
            }
        }

        debug!(
            "Collected {} open files from {} processes",
            paths.len(),
            inspected
        );
        Self { paths }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FromIterator<PathBuf> for OpenFileSet {
    fn from_iter<T: IntoIterator<Item = PathBuf>>(iter: T) -> Self {
        Self::from_paths(iter)
    }
}

/// The lexical path, the path with its parent resolved (a symlinked file
/// keeps its own name), and the fully resolved path.
fn path_forms(path: &Path) -> Vec<PathBuf> {
    let mut forms = vec![path.to_path_buf()];

    if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
        if let Ok(real_parent) = std::fs::canonicalize(parent) {
            forms.push(real_parent.join(name));
        }
    }
    if let Ok(real) = std::fs::canonicalize(path) {
        forms.push(real);
    }

    forms.dedup();
    forms
}

/// Keep only fd targets that name a file on disk. Sockets, pipes and
/// anonymous inodes have no leading `/`.
fn open_target(target: PathBuf) -> Option<PathBuf> {
    if !target.is_absolute() {
        return None;
    }
    if target.to_string_lossy().ends_with(" (deleted)") {
        return None;
    }
    Some(normalize_lexically(&target))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_paths_normalizes() {
        let set = OpenFileSet::from_paths(["/srv/public/./a/../b.txt"]);
        assert!(set.contains(Path::new("/srv/public/b.txt")));
        assert_eq!(set.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_from_paths_matches_through_symlinked_directory() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real");
        std::fs::create_dir(&real).unwrap();
        std::fs::write(real.join("held.log"), "busy").unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let set = OpenFileSet::from_paths([link.join("held.log")]);
        let resolved = std::fs::canonicalize(real.join("held.log")).unwrap();
        assert!(set.contains(&resolved));
        assert!(set.contains(&link.join("held.log")));
    }

    #[test]
    fn test_open_target_filters_non_files() {
        assert_eq!(open_target(PathBuf::from("socket:[1234]")), None);
        assert_eq!(open_target(PathBuf::from("pipe:[99]")), None);
        assert_eq!(open_target(PathBuf::from("/tmp/x (deleted)")), None);
        assert_eq!(
            open_target(PathBuf::from("/var/log/app.log")),
            Some(PathBuf::from("/var/log/app.log"))
        );
    }

    #[test]
    fn test_missing_proc_root_gives_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        let set = OpenFileSet::from_proc_root(&dir.path().join("no-proc"));
        assert!(set.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_fake_proc_root() {
        let proc_dir = tempfile::tempdir().unwrap();
        let fd_dir = proc_dir.path().join("42").join("fd");
        std::fs::create_dir_all(&fd_dir).unwrap();
        std::os::unix::fs::symlink("/srv/public/app.js", fd_dir.join("3")).unwrap();
        std::os::unix::fs::symlink("socket:[77]", fd_dir.join("4")).unwrap();
        std::fs::create_dir_all(proc_dir.path().join("self-not-a-pid").join("fd")).unwrap();

        let set = OpenFileSet::from_proc_root(proc_dir.path());
        assert_eq!(set.len(), 1);
        assert!(set.contains(Path::new("/srv/public/app.js")));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_snapshot_sees_our_own_open_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("held.log");
        let _held = std::fs::File::create(&path).unwrap();
        let canonical = std::fs::canonicalize(&path).unwrap();

        let set = OpenFileSet::from_processes();
        assert!(set.contains(&canonical));
    }
}
