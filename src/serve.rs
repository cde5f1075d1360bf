//! Preview server with live rebuild.
//!
//! Serves the destination directory over HTTP with `tiny_http`:
//!
//! - static files with a content type guessed from the extension
//! - `index.html` resolution for directories
//! - a bare directory listing when there is no index
//! - graceful shutdown on Ctrl+C
//!
//! ```text
//! ┌─────────────────┐   ┌──────────────────┐   ┌──────────────────┐
//! │   Main Thread   │   │  Watcher Thread  │   │   Build Worker   │
//! │  (HTTP Server)  │   │  (File Monitor)  │──▶│   (BuildQueue)   │
//! └────────┬────────┘   └──────────────────┘   └────────┬─────────┘
//!          │                                            │
//!          ▼                                            ▼
//!     reads _site/  ◀──────────────────────────── writes _site/
//! ```

use crate::{
    build::Builder,
    config::SiteConfig,
    log,
    queue::{BuildJob, BuildQueue},
    watch::watch_for_changes_blocking,
};
use anyhow::{Context, Result, anyhow};
use std::{
    borrow::Cow,
    fs,
    io::Cursor,
    net::{IpAddr, SocketAddr},
    path::{Path, PathBuf},
    sync::Arc,
    thread,
};
use tiny_http::{Header, Request, Response, Server, StatusCode};

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

/// Build the site, then serve it until Ctrl+C.
///
/// The initial build and all watch-triggered rebuilds run on one
/// [`BuildQueue`] worker.
pub fn serve_site(config: &SiteConfig, builder: Arc<Builder>) -> Result<()> {
    let queue = BuildQueue::spawn(Arc::clone(&builder))?;
    queue.submit(BuildJob::Full)?;

    let interface: IpAddr = config
        .serve
        .interface
        .parse()
        .with_context(|| format!("Invalid interface `{}`", config.serve.interface))?;
    let (server, addr) = try_bind_port(interface, config.serve.port, MAX_PORT_RETRIES)?;
    let server = Arc::new(server);

    let server_for_signal = Arc::clone(&server);
    ctrlc::set_handler(move || {
        log!("serve"; "shutting down...");
        server_for_signal.unblock();
    })
    .context("Failed to set Ctrl+C handler")?;

    log!("serve"; "http://{}", addr);

    let watching = config.serve.watch;
    if watching {
        let jobs = queue.sender();
        thread::spawn(move || {
            if let Err(err) = watch_for_changes_blocking(builder, jobs) {
                log!("watch"; "{err:#}");
            }
        });
    }

    let serve_root = config.destination.clone();
    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, &serve_root) {
            log!("serve"; "request error: {e}");
        }
    }

    // The watcher holds a sender for as long as the process lives.
    if !watching {
        queue.shutdown()?;
    }
    Ok(())
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(
    interface: IpAddr,
    base_port: u16,
    max_retries: u16,
) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;

    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok((server, addr));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow!(
        "Failed to bind after {} attempts (ports {}-{}): {}",
        max_retries,
        base_port,
        base_port.saturating_add(max_retries.saturating_sub(1)),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

/// What a request path maps to under the serve root.
#[derive(Debug, PartialEq, Eq)]
enum Resolved {
    File(PathBuf),
    Listing(String),
    NotFound,
}

/// Resolve a raw request URL.
///
/// Resolution order:
/// 1. Exact file match
/// 2. Directory with `index.html`
/// 3. Directory listing
/// 4. Not found
fn resolve(serve_root: &Path, url: &str) -> Resolved {
    let url_path = urlencoding::decode(url)
        .map(Cow::into_owned)
        .unwrap_or_default();

    // Strip query string (e.g., ?t=123456) before resolving path
    let path_without_query = url_path.split('?').next().unwrap_or(&url_path);
    let request_path = path_without_query.trim_matches('/');

    if request_path.split('/').any(|part| part == "..") {
        return Resolved::NotFound;
    }

    let local_path = serve_root.join(request_path);

    if local_path.is_file() {
        return Resolved::File(local_path);
    }

    if local_path.is_dir() {
        let index_path = local_path.join("index.html");
        if index_path.is_file() {
            return Resolved::File(index_path);
        }
        if let Ok(listing) = directory_listing(&local_path, request_path) {
            return Resolved::Listing(listing);
        }
    }

    Resolved::NotFound
}

fn handle_request(request: Request, serve_root: &Path) -> Result<()> {
    match resolve(serve_root, request.url()) {
        Resolved::File(path) => serve_file(request, &path),
        Resolved::Listing(html) => serve_html(request, html),
        Resolved::NotFound => serve_not_found(request),
    }
}

fn content_type(value: &str) -> Result<Header> {
    Header::from_bytes("Content-Type", value)
        .map_err(|_| anyhow!("invalid header value `{value}`"))
}

fn serve_file(request: Request, path: &Path) -> Result<()> {
    let content = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let response =
        Response::from_data(content).with_header(content_type(guess_content_type(path))?);
    request.respond(response)?;
    Ok(())
}

fn serve_html(request: Request, content: String) -> Result<()> {
    let response =
        Response::from_string(content).with_header(content_type("text/html; charset=utf-8")?);
    request.respond(response)?;
    Ok(())
}

fn serve_not_found(request: Request) -> Result<()> {
    const BODY: &str = "404 Not Found";
    let response = Response::new(
        StatusCode(404),
        vec![content_type("text/plain")?],
        Cursor::new(BODY),
        Some(BODY.len()),
        None,
    );
    request.respond(response)?;
    Ok(())
}

/// Guess MIME content type from file extension.
///
/// Returns `application/octet-stream` for unknown extensions.
fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        // Web content
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",

        // Images
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",

        // Fonts
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",

        // Documents
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain; charset=utf-8",
        Some("md") => "text/markdown; charset=utf-8",

        _ => "application/octet-stream",
    }
}

/// Bare HTML listing of a directory, hidden entries left out.
fn directory_listing(dir: &Path, request_path: &str) -> std::io::Result<String> {
    let mut names: Vec<(String, bool)> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            (name, is_dir)
        })
        .filter(|(name, _)| !name.starts_with('.'))
        .collect();
    names.sort();

    let prefix = if request_path.is_empty() {
        String::new()
    } else {
        format!("/{request_path}")
    };

    let mut items = Vec::with_capacity(names.len() + 1);
    if !request_path.is_empty() {
        let parent = Path::new(request_path)
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        items.push(format!(r#"<li><a href="/{parent}">..</a></li>"#));
    }
    for (name, is_dir) in names {
        let slash = if is_dir { "/" } else { "" };
        let name = escape_html(&name);
        items.push(format!(r#"<li><a href="{prefix}/{name}">{name}{slash}</a></li>"#));
    }

    let title = escape_html(&format!("/{request_path}"));
    Ok(format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n\
         <body>\n<h1>{title}</h1>\n<ul>\n{}\n</ul>\n</body>\n</html>\n",
        items.join("\n")
    ))
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
