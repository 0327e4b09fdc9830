use hyper::header::{CONTENT_LENGTH, HeaderValue};
use hyper::{Body, Method, Request, Response, StatusCode};
use log::{error, info, warn};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use crate::resolve::{DenyReason, PathResolver, ResolvedTarget};
use crate::server::responses;

/// Per-server state shared by every connection task
#[derive(Debug)]
pub struct SiteState {
    pub resolver: PathResolver,
    /// Custom 404 body, looked up on every miss
    pub not_found_page: PathBuf,
}

impl SiteState {
    pub fn new(resolver: PathResolver, not_found_page: &str) -> Self {
        let not_found_page = resolver.root().join(not_found_page);
        Self {
            resolver,
            not_found_page,
        }
    }
}

/// Handles one HTTP request.
///
/// - Only GET and HEAD are served; anything else gets 405.
/// - The URI path (query stripped) goes through the resolver.
/// - Every request produces one access log line.
pub async fn handle_request(
    req: Request<Body>,
    state: Arc<SiteState>,
    peer: SocketAddr,
) -> Result<Response<Body>, Infallible> {
    let method = req.method().clone();
    let raw_path = req.uri().path().to_string();

    let response = match method {
        Method::GET => serve(&state, &raw_path, peer, false).await,
        Method::HEAD => serve(&state, &raw_path, peer, true).await,
        _ => responses::method_not_allowed(),
    };

    info!(
        "{} - \"{} {}\" {}",
        peer,
        method,
        raw_path,
        response.status().as_u16()
    );
    Ok(response)
}

async fn serve(state: &SiteState, raw_path: &str, peer: SocketAddr, head_only: bool) -> Response<Body> {
    match state.resolver.resolve(raw_path) {
        ResolvedTarget::Allowed { path, extension } => {
            info!("File accessed: {} ({})", path.display(), extension);
            serve_file(&path, head_only).await
        }
        ResolvedTarget::Denied { reason } if reason.is_security_violation() => {
            warn!("Denied {} from {}: {}", raw_path, peer, reason);
            responses::forbidden(reason, head_only)
        }
        ResolvedTarget::Denied { reason } => not_found(state, reason, head_only).await,
    }
}

async fn serve_file(path: &Path, head_only: bool) -> Response<Body> {
    let file = match File::open(path).await {
        Ok(file) => file,
        Err(e) => {
            // Raced with a delete between resolve and open
            error!("Failed to open {}: {}", path.display(), e);
            return match e.kind() {
                std::io::ErrorKind::NotFound => responses::html(
                    StatusCode::NOT_FOUND,
                    responses::DEFAULT_NOT_FOUND_PAGE.as_bytes().to_vec(),
                    head_only,
                ),
                _ => responses::internal_error(),
            };
        }
    };

    let length = match file.metadata().await {
        Ok(metadata) => Some(metadata.len()),
        Err(e) => {
            warn!("Failed to stat {}: {}", path.display(), e);
            None
        }
    };

    let body = if head_only {
        Body::empty()
    } else {
        Body::wrap_stream(ReaderStream::new(file))
    };

    let mut response = responses::build(StatusCode::OK, responses::content_type_for(path), body);
    if let Some(length) = length {
        response
            .headers_mut()
            .insert(CONTENT_LENGTH, HeaderValue::from(length));
    }
    response
}

async fn not_found(state: &SiteState, reason: DenyReason, head_only: bool) -> Response<Body> {
    let body = match tokio::fs::read(&state.not_found_page).await {
        Ok(custom) => custom,
        Err(_) => responses::DEFAULT_NOT_FOUND_PAGE.as_bytes().to_vec(),
    };
    responses::html(responses::status_for(reason), body, head_only)
}
