//! Configuration management for the RAX static server
//!
//! Values come from built-in defaults, an optional TOML file and
//! `RAX_STATIC__*` environment variables, in increasing priority. Command-line
//! flags are applied on top by the binary.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::resolve::{ResolverConfig, RoutingMode};

/// Config file looked up when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "rax-static";

/// Extensions served when the configuration does not list any
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &[
    "html", "htm", "css", "js", "png", "jpg", "jpeg", "gif", "svg", "ico", "json", "txt",
];

/// Complete server configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    /// IP address the HTTP listener binds to
    pub bind_address: String,

    /// First port tried; the next `port_retries - 1` ports are tried when busy
    pub port: u16,
    pub port_retries: usize,

    /// Directory files are served from
    pub server_root: PathBuf,

    /// Served for `/` and, in SPA mode, for unknown routes
    pub default_document: String,

    /// Custom 404 body looked up in the server root
    pub not_found_page: String,

    pub allowed_extensions: Vec<String>,
    pub case_sensitive_extensions: bool,

    pub routing_mode: RoutingMode,

    /// In SPA mode, requests under this prefix get the default document
    pub api_prefix: String,

    /// Write a placeholder default document when the root has none
    pub create_default_index: bool,

    /// Append log output to this file instead of stderr
    pub log_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8000,
            port_retries: 10,
            server_root: PathBuf::from("./public"),
            default_document: "index.html".to_string(),
            not_found_page: "404.html".to_string(),
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            case_sensitive_extensions: true,
            routing_mode: RoutingMode::Static,
            api_prefix: "/api/".to_string(),
            create_default_index: true,
            log_file: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from an optional TOML file with environment overrides.
    ///
    /// An explicit `path` must exist; the default `rax-static.toml` is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let file_source = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = Config::builder()
            .add_source(file_source)
            .add_source(
                Environment::with_prefix("RAX_STATIC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: ServerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.server_root.as_os_str().is_empty() {
            return Err(config::ConfigError::Message(
                "server_root cannot be empty".into(),
            ));
        }

        if self.default_document.is_empty()
            || self.default_document.contains(['/', '\\'])
        {
            return Err(config::ConfigError::Message(
                "default_document must be a plain file name".into(),
            ));
        }

        if self.not_found_page.is_empty() || self.not_found_page.contains(['/', '\\']) {
            return Err(config::ConfigError::Message(
                "not_found_page must be a plain file name".into(),
            ));
        }

        if self.port_retries == 0 {
            return Err(config::ConfigError::Message(
                "port_retries must be greater than 0".into(),
            ));
        }

        if !self.api_prefix.starts_with('/') || self.api_prefix.len() < 2 {
            return Err(config::ConfigError::Message(
                "api_prefix must start with '/' and name a path".into(),
            ));
        }

        Ok(())
    }

    /// Build the resolver settings for this server
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            root: self.server_root.clone(),
            default_document: self.default_document.clone(),
            allowed_extensions: self.allowed_extensions.clone(),
            case_sensitive_extensions: self.case_sensitive_extensions,
            routing_mode: self.routing_mode,
            api_prefix: self.api_prefix.clone(),
        }
    }

    /// Ports tried at startup, in order
    pub fn candidate_ports(&self) -> Vec<u16> {
        if self.port == 0 {
            return vec![0];
        }
        (0..self.port_retries)
            .map_while(|i| u16::try_from(i).ok().and_then(|i| self.port.checked_add(i)))
            .collect()
    }

    /// Get server root as string
    pub fn server_root_str(&self) -> String {
        self.server_root.to_string_lossy().to_string()
    }
}
