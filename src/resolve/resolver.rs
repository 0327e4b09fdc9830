//! Request path resolution
//!
//! Turns a raw request path into a `ResolvedTarget`. Every input maps to a
//! target; nothing in here returns an error or panics on malformed paths.

use log::debug;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::resolve::normalize::{
    decode_request_path, extension_of, is_within, normalize_lexically, normalize_relative,
};
use crate::resolve::results::{DenyReason, ResolvedTarget};

/// How unknown paths are answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    /// Unknown paths are 404
    #[default]
    Static,
    /// Unknown paths get the default document so a client router can take over
    Spa,
}

/// Settings a resolver is built from
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub root: PathBuf,
    pub default_document: String,
    /// With or without the leading dot
    pub allowed_extensions: Vec<String>,
    pub case_sensitive_extensions: bool,
    pub routing_mode: RoutingMode,
    pub api_prefix: String,
}

/// Maps request paths onto files under a fixed root
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
    default_document: String,
    allowed_extensions: HashSet<String>,
    case_sensitive_extensions: bool,
    routing_mode: RoutingMode,
    api_prefix: String,
}

impl PathResolver {
    /// Build a resolver. The root is made absolute and normalized once here;
    /// it does not need to exist yet.
    pub fn new(config: ResolverConfig) -> io::Result<Self> {
        let root = normalize_lexically(&std::path::absolute(&config.root)?);

        let allowed_extensions = config
            .allowed_extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.'))
            .filter(|ext| !ext.is_empty())
            .map(|ext| {
                if config.case_sensitive_extensions {
                    ext.to_string()
                } else {
                    ext.to_ascii_lowercase()
                }
            })
            .collect();

        Ok(Self {
            root,
            default_document: config.default_document,
            allowed_extensions,
            case_sensitive_extensions: config.case_sensitive_extensions,
            routing_mode: config.routing_mode,
            api_prefix: config.api_prefix,
        })
    }

    /// Absolute, normalized server root
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn routing_mode(&self) -> RoutingMode {
        self.routing_mode
    }

    /// Resolve a raw (still percent-encoded) request path.
    pub fn resolve(&self, raw_path: &str) -> ResolvedTarget {
        let Some(decoded) = decode_request_path(raw_path) else {
            debug!("Undecodable request path: {:?}", raw_path);
            return ResolvedTarget::denied(DenyReason::NotFound);
        };

        if self.routing_mode == RoutingMode::Spa && decoded.starts_with(&self.api_prefix) {
            return self.locate(&self.default_document);
        }

        let decoded = if decoded == "/" {
            self.default_document.as_str()
        } else {
            decoded.as_str()
        };

        match self.locate(decoded) {
            ResolvedTarget::Denied {
                reason: DenyReason::NotFound,
            } if self.routing_mode == RoutingMode::Spa => self.locate(&self.default_document),
            target => target,
        }
    }

    /// Policy checks, then existence. No SPA fallback here.
    fn locate(&self, decoded: &str) -> ResolvedTarget {
        let (candidate, extension) = match self.check_policy(decoded) {
            Ok(found) => found,
            Err(reason) => return ResolvedTarget::denied(reason),
        };

        if !is_regular_file(&candidate) {
            return ResolvedTarget::denied(DenyReason::NotFound);
        }

        if let Err(reason) = self.check_canonical(&candidate) {
            return ResolvedTarget::denied(reason);
        }

        ResolvedTarget::Allowed {
            path: candidate,
            extension,
        }
    }

    /// Normalize, apply the extension policy and the lexical containment check.
    fn check_policy(&self, decoded: &str) -> Result<(PathBuf, String), DenyReason> {
        let segments = normalize_relative(decoded);
        let extension = extension_of(&segments);

        if !extension.is_empty() && !self.extension_allowed(&extension) {
            return Err(DenyReason::DisallowedExtension);
        }

        let mut joined = self.root.clone();
        joined.extend(&segments);
        let candidate = normalize_lexically(&joined);

        if !is_within(&candidate, &self.root) {
            return Err(DenyReason::OutsideRoot);
        }

        Ok((candidate, extension))
    }

    /// Symlinks inside the root must not lead outside it.
    fn check_canonical(&self, candidate: &Path) -> Result<(), DenyReason> {
        let real_candidate = fs::canonicalize(candidate).map_err(|_| DenyReason::NotFound)?;
        let real_root = fs::canonicalize(&self.root).map_err(|_| DenyReason::NotFound)?;

        if is_within(&real_candidate, &real_root) {
            Ok(())
        } else {
            Err(DenyReason::OutsideRoot)
        }
    }

    fn extension_allowed(&self, extension: &str) -> bool {
        if self.case_sensitive_extensions {
            self.allowed_extensions.contains(extension)
        } else {
            self.allowed_extensions
                .contains(&extension.to_ascii_lowercase())
        }
    }
}

fn is_regular_file(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use proptest::test_runner::TestRunner;
    use tempfile::TempDir;

    fn site() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("index.html"), "<h1>home</h1>").unwrap();
        fs::write(root.join("app.js"), "console.log(1)").unwrap();
        fs::write(root.join("secrets.env"), "TOKEN=1").unwrap();
        fs::write(root.join("LOGO.PNG"), b"\x89PNG").unwrap();
        fs::write(root.join("README"), "plain").unwrap();
        fs::create_dir(root.join("docs")).unwrap();
        fs::write(root.join("docs").join("guide.html"), "guide").unwrap();
        dir
    }

    fn config(root: &Path, mode: RoutingMode) -> ResolverConfig {
        ResolverConfig {
            root: root.to_path_buf(),
            default_document: "index.html".to_string(),
            allowed_extensions: vec![".html".into(), ".css".into(), "js".into(), "png".into()],
            case_sensitive_extensions: true,
            routing_mode: mode,
            api_prefix: "/api/".to_string(),
        }
    }

    fn resolver(root: &Path, mode: RoutingMode) -> PathResolver {
        PathResolver::new(config(root, mode)).unwrap()
    }

    fn denied(reason: DenyReason) -> ResolvedTarget {
        ResolvedTarget::denied(reason)
    }

    #[test]
    fn test_serves_existing_file() {
        let dir = site();
        let r = resolver(dir.path(), RoutingMode::Static);
        match r.resolve("/docs/guide.html") {
            ResolvedTarget::Allowed { path, extension } => {
                assert!(path.ends_with("docs/guide.html"));
                assert!(path.starts_with(r.root()));
                assert_eq!(extension, "html");
            }
            other => panic!("expected Allowed, got {:?}", other),
        }
    }

    #[test]
    fn test_root_request_matches_default_document() {
        let dir = site();
        let r = resolver(dir.path(), RoutingMode::Static);
        let root = r.resolve("/");
        assert!(root.is_allowed());
        assert_eq!(root, r.resolve("/index.html"));
    }

    #[test]
    fn test_traversal_never_allowed() {
        let dir = site();
        let r = resolver(&dir.path().join("docs"), RoutingMode::Static);
        for raw in [
            "/../../etc/passwd",
            "/%2e%2e/%2e%2e/etc/passwd",
            "/..%2f..%2fetc%2fpasswd",
            "/..\\..\\etc\\passwd",
            "/guide.html/../../index.html",
            "/%2E%2E/index.html",
        ] {
            assert_eq!(r.resolve(raw), denied(DenyReason::OutsideRoot), "{}", raw);
        }
    }

    #[test]
    fn test_dot_segments_inside_root_are_collapsed() {
        let dir = site();
        let r = resolver(dir.path(), RoutingMode::Static);
        assert_eq!(r.resolve("/docs/../index.html"), r.resolve("/index.html"));
        assert_eq!(r.resolve("/./docs/./guide.html"), r.resolve("/docs/guide.html"));
    }

    #[test]
    fn test_extra_slashes_stay_inside_root() {
        let dir = site();
        let r = resolver(dir.path(), RoutingMode::Static);
        assert_eq!(r.resolve("//etc/passwd"), denied(DenyReason::NotFound));
        assert_eq!(r.resolve("/%2F%2Fetc/passwd"), denied(DenyReason::NotFound));
    }

    #[test]
    fn test_disallowed_extension_even_if_present() {
        let dir = site();
        let r = resolver(dir.path(), RoutingMode::Static);
        assert!(dir.path().join("secrets.env").is_file());
        assert_eq!(r.resolve("/secrets.env"), denied(DenyReason::DisallowedExtension));
        assert_eq!(r.resolve("/../secrets.env"), denied(DenyReason::DisallowedExtension));
    }

    #[test]
    fn test_disallowed_extension_in_spa_mode_is_not_masked_by_fallback() {
        let dir = site();
        let r = resolver(dir.path(), RoutingMode::Spa);
        assert_eq!(r.resolve("/secrets.env"), denied(DenyReason::DisallowedExtension));
    }

    #[test]
    fn test_extensionless_file_is_served() {
        let dir = site();
        let r = resolver(dir.path(), RoutingMode::Static);
        match r.resolve("/README") {
            ResolvedTarget::Allowed { extension, .. } => assert_eq!(extension, ""),
            other => panic!("expected Allowed, got {:?}", other),
        }
    }

    #[test]
    fn test_extension_case_sensitive_by_default() {
        let dir = site();
        let r = resolver(dir.path(), RoutingMode::Static);
        assert_eq!(r.resolve("/LOGO.PNG"), denied(DenyReason::DisallowedExtension));
    }

    #[test]
    fn test_extension_case_insensitive_when_configured() {
        let dir = site();
        let mut cfg = config(dir.path(), RoutingMode::Static);
        cfg.case_sensitive_extensions = false;
        cfg.allowed_extensions = vec![".PNG".into()];
        let r = PathResolver::new(cfg).unwrap();
        match r.resolve("/LOGO.PNG") {
            ResolvedTarget::Allowed { extension, .. } => assert_eq!(extension, "PNG"),
            other => panic!("expected Allowed, got {:?}", other),
        }
        assert_eq!(r.resolve("/app.JS"), denied(DenyReason::DisallowedExtension));
    }

    #[test]
    fn test_missing_file_static_mode() {
        let dir = site();
        let r = resolver(dir.path(), RoutingMode::Static);
        assert_eq!(r.resolve("/nope.html"), denied(DenyReason::NotFound));
        assert_eq!(r.resolve("/dashboard/settings"), denied(DenyReason::NotFound));
    }

    #[test]
    fn test_directory_is_not_found() {
        let dir = site();
        let r = resolver(dir.path(), RoutingMode::Static);
        assert_eq!(r.resolve("/docs"), denied(DenyReason::NotFound));
        assert_eq!(r.resolve("/docs/"), denied(DenyReason::NotFound));
        assert_eq!(r.resolve("//"), denied(DenyReason::NotFound));
    }

    #[test]
    fn test_spa_fallback_serves_default_document() {
        let dir = site();
        let r = resolver(dir.path(), RoutingMode::Spa);
        let index = r.resolve("/index.html");
        assert!(index.is_allowed());
        assert_eq!(r.resolve("/dashboard/settings"), index);
        assert_eq!(r.resolve("/docs"), index);
        assert_eq!(r.resolve("/missing.css"), index);
        assert_ne!(r.resolve("/app.js"), index);
    }

    #[test]
    fn test_spa_fallback_without_default_document() {
        let dir = site();
        fs::remove_file(dir.path().join("index.html")).unwrap();
        let r = resolver(dir.path(), RoutingMode::Spa);
        assert_eq!(r.resolve("/dashboard"), denied(DenyReason::NotFound));
    }

    #[test]
    fn test_api_prefix_routes_to_default_document_in_spa_mode() {
        let dir = site();
        let spa = resolver(dir.path(), RoutingMode::Spa);
        assert_eq!(spa.resolve("/api/clients.php"), spa.resolve("/index.html"));
        assert_eq!(spa.resolve("/api/../../etc/passwd"), spa.resolve("/index.html"));

        let stat = resolver(dir.path(), RoutingMode::Static);
        assert_eq!(
            stat.resolve("/api/clients.php"),
            denied(DenyReason::DisallowedExtension)
        );
    }

    #[test]
    fn test_undecodable_paths_are_not_found() {
        let dir = site();
        let r = resolver(dir.path(), RoutingMode::Static);
        assert_eq!(r.resolve("/%ff%fe.html"), denied(DenyReason::NotFound));
        assert_eq!(r.resolve("/index.html%00"), denied(DenyReason::NotFound));

        // Undecodable input is not a missing route: no SPA fallback either
        let spa = resolver(dir.path(), RoutingMode::Spa);
        assert_eq!(spa.resolve("/%c3%28"), denied(DenyReason::NotFound));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let dir = site();
        let r = resolver(dir.path(), RoutingMode::Spa);
        for raw in ["/", "/app.js", "/../x", "/secrets.env", "/route/x", "/%ff"] {
            assert_eq!(r.resolve(raw), r.resolve(raw), "{}", raw);
        }
    }

    #[test]
    fn test_resolvers_with_different_roots_coexist() {
        let a = site();
        let b = tempfile::tempdir().unwrap();
        let ra = resolver(a.path(), RoutingMode::Static);
        let rb = resolver(b.path(), RoutingMode::Static);
        assert!(ra.resolve("/").is_allowed());
        assert_eq!(rb.resolve("/"), denied(DenyReason::NotFound));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_out_of_root_is_denied() {
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("private.html"), "secret").unwrap();
        let dir = site();
        std::os::unix::fs::symlink(
            outside.path().join("private.html"),
            dir.path().join("leak.html"),
        )
        .unwrap();

        let r = resolver(dir.path(), RoutingMode::Static);
        assert_eq!(r.resolve("/leak.html"), denied(DenyReason::OutsideRoot));
    }

    fn percent_encode_all(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("%{:02X}", b)).collect()
    }

    #[test]
    fn test_resolve_is_total_over_random_bytes() {
        let dir = site();
        let static_r = resolver(dir.path(), RoutingMode::Static);
        let spa_r = resolver(dir.path(), RoutingMode::Spa);
        let mut runner = TestRunner::new(ProptestConfig::with_cases(10_000));

        runner
            .run(&proptest::collection::vec(any::<u8>(), 0..64), |bytes| {
                let lossy = String::from_utf8_lossy(&bytes).into_owned();
                let encoded = percent_encode_all(&bytes);
                for raw in [lossy.as_str(), encoded.as_str()] {
                    for r in [&static_r, &spa_r] {
                        if let ResolvedTarget::Allowed { path, .. } = r.resolve(raw) {
                            prop_assert!(path.starts_with(r.root()));
                        }
                    }
                }
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_dot_dot_combinations_never_escape() {
        let dir = site();
        let r = resolver(&dir.path().join("docs"), RoutingMode::Static);
        let segment = prop::sample::select(vec![
            "..", ".", "%2e%2e", "%2E.", "docs", "guide.html", "index.html", "etc", "passwd",
            "%2f", "\\..", "",
        ]);
        let mut runner = TestRunner::new(ProptestConfig::with_cases(2_000));

        runner
            .run(&proptest::collection::vec(segment, 0..8), |segments| {
                let raw = format!("/{}", segments.join("/"));
                match r.resolve(&raw) {
                    ResolvedTarget::Allowed { path, .. } => {
                        prop_assert!(path.starts_with(r.root()), "{} -> {:?}", raw, path);
                    }
                    ResolvedTarget::Denied { .. } => {}
                }
                Ok(())
            })
            .unwrap();
    }
}
