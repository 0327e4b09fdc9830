use hyper::server::conn::{AddrIncoming, AddrStream};
use hyper::service::{make_service_fn, service_fn};
use log::{error, info, warn};
use std::convert::Infallible;
use std::future::Future;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::resolve::PathResolver;
use crate::server::handler::{SiteState, handle_request};
use crate::server::responses::default_index_page;
use crate::utils::network::display_urls;

pub struct Server {
    listener: TcpListener,
    state: Arc<SiteState>,
}

impl Server {
    /// Prepare the server root and bind the first free port.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        prepare_root(&config)?;

        let resolver = PathResolver::new(config.resolver_config())?;
        info!(
            "Server root directory: {} ({:?} mode)",
            resolver.root().display(),
            resolver.routing_mode()
        );

        let listener = bind_with_retry(&config.bind_address, &config.candidate_ports()).await?;
        let state = Arc::new(SiteState::new(resolver, &config.not_found_page));

        Ok(Self { listener, state })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until `shutdown` completes, then drain open connections.
    pub async fn run<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let addr = self.local_addr()?;
        for url in display_urls(addr) {
            info!("Server running at {}", url);
        }
        info!("Press Ctrl+C to stop the server.");

        let state = self.state;
        let make_svc = make_service_fn(move |conn: &AddrStream| {
            let peer = conn.remote_addr();
            let state = Arc::clone(&state);
            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    handle_request(req, Arc::clone(&state), peer)
                }))
            }
        });

        let incoming = AddrIncoming::from_listener(self.listener)?;
        let result = hyper::Server::builder(incoming)
            .serve(make_svc)
            .with_graceful_shutdown(shutdown)
            .await;

        match result {
            Ok(()) => {
                info!("Server stopped.");
                Ok(())
            }
            Err(e) => {
                error!("Server error: {}", e);
                Err(ServerError::Http(e))
            }
        }
    }
}

/// Bind `host` on the first port of `ports` that is not in use.
///
/// Only "address in use" moves on to the next port; any other bind failure
/// is returned immediately.
pub async fn bind_with_retry(host: &str, ports: &[u16]) -> Result<TcpListener, ServerError> {
    let ip: IpAddr = host
        .parse()
        .map_err(|_| ServerError::InvalidAddress(host.to_string()))?;

    for &port in ports {
        let addr = SocketAddr::new(ip, port);
        match TcpListener::bind(addr).await {
            Ok(listener) => {
                info!("Server bound to {}", addr);
                return Ok(listener);
            }
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                warn!("Port {} in use, trying next...", port);
            }
            Err(e) => return Err(ServerError::Bind(addr, e)),
        }
    }

    Err(ServerError::PortsExhausted {
        first: ports.first().copied().unwrap_or_default(),
        last: ports.last().copied().unwrap_or_default(),
    })
}

/// Create the root directory and a placeholder default document if missing.
fn prepare_root(config: &ServerConfig) -> io::Result<()> {
    let root = &config.server_root;
    if !root.exists() {
        std::fs::create_dir_all(root)?;
        info!("Created server root directory: {}", config.server_root_str());
    }

    let index_path = root.join(&config.default_document);
    if config.create_default_index && !index_path.exists() {
        let absolute = std::path::absolute(root).unwrap_or_else(|_| root.clone());
        std::fs::write(
            &index_path,
            default_index_page(&absolute, &config.allowed_extensions),
        )?;
        info!("Created default document: {}", index_path.display());
    }

    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C"),
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl+C");
    }

    info!("Server is shutting down...");
}
