//! Local static file host for the generated reports.
//!
//! `ServeDir` over the report's directory, `/` redirecting to the document,
//! one request in flight at a time, until Ctrl-C.

use anyhow::{Context, Result};
use axum::Router;
use axum::http::{StatusCode, header};
use axum::routing::get;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::future::IntoFuture;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// How long open connections get to finish once Ctrl-C arrives.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

pub struct HostConfig {
    /// Directory whose files are served.
    pub root: PathBuf,
    pub host: String,
    pub port: u16,
    /// Document path relative to `root`; `/` redirects here.
    pub document: String,
    pub open_browser: bool,
    pub banner: &'static str,
}

impl HostConfig {
    pub fn document_url_path(&self) -> String {
        let encoded: Vec<String> = self
            .document
            .split('/')
            .map(|seg| utf8_percent_encode(seg, PATH_SEGMENT).to_string())
            .collect();
        format!("/{}", encoded.join("/"))
    }

    pub fn url(&self) -> String {
        let host = match self.host.as_str() {
            "127.0.0.1" | "0.0.0.0" | "::" | "::1" => "localhost",
            other => other,
        };
        format!("http://{}:{}{}", host, self.port, self.document_url_path())
    }
}

/// Files under `root`, with `/` answering 302 to `document`. GET and HEAD
/// only; traversal outside `root` is a 404.
pub fn router(root: &Path, document: String) -> Router {
    Router::new()
        .route(
            "/",
            get(move || async move { (StatusCode::FOUND, [(header::LOCATION, document)]) }),
        )
        .fallback_service(ServeDir::new(root))
        .layer(GlobalConcurrencyLimitLayer::new(1))
        .layer(TraceLayer::new_for_http())
}

pub fn serve(cfg: HostConfig) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the server runtime")?;
    runtime.block_on(serve_until_interrupt(cfg))
}

async fn serve_until_interrupt(cfg: HostConfig) -> Result<()> {
    let addr = format!("{}:{}", cfg.host, cfg.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    let url = cfg.url();

    println!();
    println!("{}", "=".repeat(60));
    println!("{}", cfg.banner);
    println!("Open: {}", url);
    println!("Press Ctrl+C to stop");
    println!("{}", "=".repeat(60));
    println!();
    info!(root = %cfg.root.display(), %addr, "serving");

    if cfg.open_browser {
        if let Err(e) = webbrowser::open(&url) {
            warn!(error = %e, "could not open a browser; open the URL manually");
        }
    }

    let interrupted = Arc::new(Notify::new());
    let signal = {
        let interrupted = interrupted.clone();
        async move {
            wait_for_ctrl_c().await;
            interrupted.notify_one();
        }
    };
    let server = axum::serve(listener, router(&cfg.root, cfg.document_url_path()))
        .with_graceful_shutdown(signal)
        .into_future();

    tokio::select! {
        res = server => res.context("server failed")?,
        _ = async {
            interrupted.notified().await;
            tokio::time::sleep(SHUTDOWN_GRACE).await;
        } => warn!("connections still open after {}s, closing them", SHUTDOWN_GRACE.as_secs()),
    }

    println!("\nServer stopped.");
    info!(%addr, "listener closed");
    Ok(())
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C; serving until killed");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request};
    use tower::ServiceExt;

    fn config(host: &str, document: &str) -> HostConfig {
        HostConfig {
            root: PathBuf::from("."),
            host: host.to_string(),
            port: 8000,
            document: document.to_string(),
            open_browser: false,
            banner: "test",
        }
    }

    fn site(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("carbon-report-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(dir.join("sub")).unwrap();
        std::fs::write(dir.join("index.html"), "<p>hola</p>").unwrap();
        std::fs::write(dir.join("sub").join("index.html"), "sub").unwrap();
        dir
    }

    async fn send(dir: &Path, method: Method, uri: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let res = router(dir, "/index.html".to_string()).oneshot(req).await.unwrap();
        let status = res.status();
        let headers = res.headers().clone();
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap().to_vec();
        (status, headers, body)
    }

    #[test]
    fn url_points_at_document() {
        assert_eq!(config("127.0.0.1", "index.html").url(), "http://localhost:8000/index.html");
        assert_eq!(
            config("192.168.1.5", "reports/social cost.html").url(),
            "http://192.168.1.5:8000/reports/social%20cost.html"
        );
    }

    #[test]
    fn document_path_encodes_non_ascii_names() {
        assert_eq!(
            config("127.0.0.1", "logroño v2.html").document_url_path(),
            "/logro%C3%B1o%20v2.html"
        );
    }

    #[tokio::test]
    async fn root_redirects_to_document() {
        let dir = site("host-redirect");
        let (status, headers, _) = send(&dir, Method::GET, "/").await;
        assert_eq!(status, StatusCode::FOUND);
        assert_eq!(headers[header::LOCATION], "/index.html");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn serves_files_and_directory_index() {
        let dir = site("host-files");
        let (status, headers, body) = send(&dir, Method::GET, "/index.html").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"<p>hola</p>");
        assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/html"));

        let (status, _, body) = send(&dir, Method::GET, "/sub/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"sub");

        let (status, _, _) = send(&dir, Method::GET, "/missing.html").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn parent_segments_do_not_escape_root() {
        let dir = site("host-traversal");
        let (status, _, _) = send(&dir, Method::GET, "/../index.html").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _, _) = send(&dir, Method::GET, "/sub/%2e%2e/%2e%2e/index.html").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn head_has_no_body_and_post_is_rejected() {
        let dir = site("host-methods");
        let (status, _, body) = send(&dir, Method::HEAD, "/index.html").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());

        let (status, _, _) = send(&dir, Method::POST, "/index.html").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        let (status, _, _) = send(&dir, Method::POST, "/").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
