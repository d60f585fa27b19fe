//! Development server.
//!
//! A small `tiny_http` file server over the build output directory:
//!
//! - `/styles.css` serves `docs/styles.css` when it exists
//! - `/guests` (no extension, no such file) serves `docs/guests/index.html`
//! - anything else that does not resolve to a file is a 404
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐
//! │   Main Thread   │     │  Watcher Thread  │
//! │  (HTTP Server)  │     │  (mtime polling) │
//! └────────┬────────┘     └────────┬─────────┘
//!          │                       │
//!          ▼                       ▼
//!    Serve files              Rebuild site
//!          └───────────┬───────────┘
//!                      ▼
//!             config.build.output
//! ```
//!
//! Requests are not synchronized with rebuilds; a request that lands while
//! the output is being regenerated may see a 404.

use crate::{config::SiteConfig, log, watch::watch_for_changes_blocking};
use anyhow::{Context, Result, anyhow};
use std::{
    borrow::Cow,
    fs,
    io::Cursor,
    net::{IpAddr, SocketAddr},
    path::{Path, PathBuf},
    sync::Arc,
};
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};

// ============================================================================
// Server Entry Point
// ============================================================================

/// Serve `config.build.output` until Ctrl+C, rebuilding on changes when
/// `config.serve.watch` is set.
pub fn serve_site(config: &'static SiteConfig) -> Result<()> {
    let interface: IpAddr = config
        .serve
        .interface
        .parse()
        .with_context(|| format!("Invalid interface `{}`", config.serve.interface))?;
    let addr = SocketAddr::new(interface, config.serve.port);

    let server = Server::http(addr).map_err(|e| anyhow!("Failed to bind {addr}: {e}"))?;
    let server = Arc::new(server);

    // Set up Ctrl+C handler for graceful shutdown
    let server_for_signal = Arc::clone(&server);
    ctrlc::set_handler(move || {
        log!("serve"; "shutting down...");
        server_for_signal.unblock();
    })
    .context("Failed to set Ctrl+C handler")?;

    log!("serve"; "http://{}", addr);

    if config.serve.watch {
        std::thread::spawn(move || watch_for_changes_blocking(config));
    }

    let root = &config.build.output;
    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, root) {
            log!("serve"; "request error: {e}");
        }
    }

    log!("serve"; "stopped");
    Ok(())
}

// ============================================================================
// Request Handling
// ============================================================================

/// Handle a single request and log one line for it.
fn handle_request(request: Request, root: &Path) -> Result<()> {
    let method = request.method().clone();
    let url = request.url().to_owned();

    let status = match method {
        Method::Get | Method::Head => match resolve(root, &url) {
            Some(path) => serve_file(request, &path)?,
            None => serve_status(request, 404, "404 Not Found")?,
        },
        _ => serve_status(request, 405, "405 Method Not Allowed")?,
    };

    log!("serve"; "{method} {url} {status}");
    Ok(())
}

/// Map a request URL to a file below `root`.
///
/// Query strings and fragments are ignored, `%xx` sequences decoded, and
/// `.`/`..` segments dropped so the result never leaves `root`. A path
/// without an extension that is not a file falls back to its `index.html`.
pub fn resolve(root: &Path, url: &str) -> Option<PathBuf> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let decoded = urlencoding::decode(path).map_or(Cow::Borrowed(path), |p| p);

    let mut local = root.to_path_buf();
    for segment in decoded.split(['/', '\\']) {
        match segment {
            "" | "." | ".." => {}
            segment => local.push(segment),
        }
    }

    if local.extension().is_none() && !local.is_file() {
        let index = local.join("index.html");
        if index.is_file() {
            return Some(index);
        }
    }

    if local.is_dir() {
        let index = local.join("index.html");
        return index.is_file().then_some(index);
    }

    local.is_file().then_some(local)
}

// ============================================================================
// Response Helpers
// ============================================================================

fn header(name: &str, value: &str) -> Result<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes())
        .map_err(|()| anyhow!("Invalid header {name}: {value}"))
}

/// Serve a file with appropriate content type. Returns the status code sent.
fn serve_file(request: Request, path: &Path) -> Result<u16> {
    // The file may vanish between resolving and reading while a rebuild runs.
    let Ok(content) = fs::read(path) else {
        return serve_status(request, 404, "404 Not Found");
    };

    let response = Response::from_data(content)
        .with_header(header("Content-Type", guess_content_type(path))?);
    request.respond(response)?;
    Ok(200)
}

/// Serve a plain-text status response.
fn serve_status(request: Request, code: u16, body: &str) -> Result<u16> {
    let response = Response::new(
        StatusCode(code),
        vec![header("Content-Type", "text/plain; charset=utf-8")?],
        Cursor::new(body.as_bytes().to_vec()),
        Some(body.len()),
        None,
    );
    request.respond(response)?;
    Ok(code)
}

// ============================================================================
// Content Type Detection
// ============================================================================

/// Guess MIME content type from file extension.
///
/// Returns `application/octet-stream` for unknown extensions.
fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        // Web content
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json" | "map") => "application/json; charset=utf-8",
        Some("webmanifest") => "application/manifest+json",
        Some("xml") => "application/xml; charset=utf-8",
        Some("txt") => "text/plain; charset=utf-8",

        // Images
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",
        Some("ico") => "image/x-icon",

        // Fonts
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",

        _ => "application/octet-stream",
    }
}
