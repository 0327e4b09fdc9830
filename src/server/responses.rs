//! HTTP response helpers
//!
//! Status mapping, built-in HTML bodies and content types.

use hyper::header::{ALLOW, CONTENT_LENGTH, CONTENT_TYPE, HeaderValue, X_CONTENT_TYPE_OPTIONS};
use hyper::{Body, Response, StatusCode};
use std::path::Path;

use crate::resolve::DenyReason;

pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Body used when the root has no custom 404 page
pub const DEFAULT_NOT_FOUND_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>404 - File not found</title>
    <style>
        body { font-family: Arial, sans-serif; text-align: center; padding: 50px; background: #f5f5f5; }
        h1 { color: #444; }
        p { color: #666; }
    </style>
</head>
<body>
    <h1>404 - File not found</h1>
    <p>The requested file does not exist on this server.</p>
    <p><a href="/">Back to the home page</a></p>
</body>
</html>
"#;

/// Map a denial to its HTTP status
pub fn status_for(reason: DenyReason) -> StatusCode {
    match reason {
        DenyReason::OutsideRoot | DenyReason::DisallowedExtension => StatusCode::FORBIDDEN,
        DenyReason::NotFound => StatusCode::NOT_FOUND,
    }
}

/// Content type guessed from the file extension
pub fn content_type_for(path: &Path) -> HeaderValue {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    HeaderValue::from_str(mime.as_ref())
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"))
}

/// Build a response with the headers every reply carries
pub fn build(status: StatusCode, content_type: HeaderValue, body: Body) -> Response<Body> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, content_type);
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    response
}

/// HTML response with an explicit length. `head_only` drops the body.
pub fn html(status: StatusCode, body: Vec<u8>, head_only: bool) -> Response<Body> {
    let length = body.len();
    let body = if head_only { Body::empty() } else { Body::from(body) };
    let mut response = build(status, HeaderValue::from_static(HTML_CONTENT_TYPE), body);
    response
        .headers_mut()
        .insert(CONTENT_LENGTH, HeaderValue::from(length));
    response
}

pub fn forbidden(reason: DenyReason, head_only: bool) -> Response<Body> {
    let page = format!(
        "<!DOCTYPE html>\n<html>\n<head><title>403 - Forbidden</title></head>\n<body>\n    <h1>403 - Forbidden</h1>\n    <p>Access denied: {}.</p>\n</body>\n</html>\n",
        reason
    );
    html(StatusCode::FORBIDDEN, page.into_bytes(), head_only)
}

pub fn method_not_allowed() -> Response<Body> {
    let mut response = build(
        StatusCode::METHOD_NOT_ALLOWED,
        HeaderValue::from_static("text/plain; charset=utf-8"),
        Body::from("405 Method Not Allowed\n"),
    );
    response
        .headers_mut()
        .insert(ALLOW, HeaderValue::from_static("GET, HEAD"));
    response
}

pub fn internal_error() -> Response<Body> {
    build(
        StatusCode::INTERNAL_SERVER_ERROR,
        HeaderValue::from_static("text/plain; charset=utf-8"),
        Body::from("500 Internal Server Error\n"),
    )
}

/// Placeholder default document written into an empty server root
pub fn default_index_page(root: &Path, allowed_extensions: &[String]) -> String {
    let extensions = allowed_extensions
        .iter()
        .map(|e| format!(".{}", e.trim_start_matches('.')))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Simple Web Server</title>
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; margin: 0; padding: 20px; background: #f5f5f5; }}
        .container {{ max-width: 800px; margin: 0 auto; background: white; padding: 20px; border-radius: 5px; box-shadow: 0 0 10px rgba(0,0,0,0.1); }}
        h1 {{ color: #333; text-align: center; }}
        footer {{ margin-top: 30px; text-align: center; color: #666; font-size: 0.9em; }}
    </style>
</head>
<body>
    <div class="container">
        <h1>Simple Web Server</h1>
        <p>Put your files in <code>{root}</code> to serve them.</p>
        <p>Allowed extensions: {extensions}</p>
    </div>
    <footer>Served by rax-static-server</footer>
</body>
</html>
"#,
        root = escape_html(&root.to_string_lossy()),
        extensions = escape_html(&extensions),
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
