//! # HTTP server for poster pages
//!
//! Serves the poster at `/` so a headless browser can load it, wait for
//! `#poster-root[data-config-ready="true"]`, and screenshot it.
//!
//! ## Usage
//!
//! ```bash
//! md-poster serve --listen 127.0.0.1:3000
//! ```
//!
//! Then open `http://127.0.0.1:3000/?md=%23%20Hello` in a browser.
//!
//! ## Routes
//!
//! | Route | Response |
//! |-------|----------|
//! | `GET /` | Poster page for the `md` / `md_url` query |
//! | `GET /api/presentation` | Resolved presentation as JSON |
//! | `GET /api/health` | `{"status":"ok"}` |
//! | `GET /assets/poster.css` | Poster stylesheet |
//! | `GET /assets/poster.js` | Readiness and copy script |

use axum::{
    Json, Router,
    extract::{RawQuery, State},
    http::header,
    response::{Html, IntoResponse},
    routing::get,
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::RawConfig;
use crate::content::{FetchError, FetchPolicy, HttpFetcher, PosterQuery};
use crate::poster::{PosterApp, READY_DELAY};
use crate::presentation::ResolvedPresentation;
use crate::render;

/// Default request timeout for `md_url` fetches.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not build HTTP client: {0}")]
    Client(#[from] FetchError),
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub ready_delay: Duration,
    pub fetch_timeout: Duration,
    /// Let `md_url` reach loopback and private addresses.
    pub allow_private_fetch: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:3000".to_string(),
            ready_delay: READY_DELAY,
            fetch_timeout: FETCH_TIMEOUT,
            allow_private_fetch: false,
        }
    }
}

/// Build the router around an application instance.
pub fn router(app: Arc<PosterApp>) -> Router {
    Router::new()
        .route("/", get(poster_page))
        .route("/api/presentation", get(presentation))
        .route("/api/health", get(health))
        .route("/assets/poster.css", get(stylesheet))
        .route("/assets/poster.js", get(script))
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}

/// Start the HTTP server and run until it fails.
pub async fn serve(config: ServerConfig, poster_config: Option<RawConfig>) -> Result<(), ServeError> {
    let policy = FetchPolicy {
        allow_private: config.allow_private_fetch,
        ..FetchPolicy::default()
    };
    let fetcher = HttpFetcher::new(config.fetch_timeout, policy)?;
    let app = PosterApp::new(poster_config, Arc::new(fetcher)).with_ready_delay(config.ready_delay);
    let app = router(Arc::new(app));

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .map_err(|source| ServeError::Bind {
            addr: config.listen_addr.clone(),
            source,
        })?;
    info!(addr = %config.listen_addr, "Poster server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Mount a poster for this request and render it once its content settles.
///
/// The page is sent before the readiness delay elapses; the bundled script
/// marks it ready in the browser.
async fn poster_page(State(app): State<Arc<PosterApp>>, RawQuery(query): RawQuery) -> Html<String> {
    let query = PosterQuery::parse(query.as_deref());
    let mut poster = app.mount(&query);
    poster.settled().await;
    Html(render::render_page(&poster.snapshot()).into_string())
}

async fn presentation(State(app): State<Arc<PosterApp>>) -> Json<ResolvedPresentation> {
    Json(app.presentation())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn stylesheet() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/css; charset=utf-8")], render::CSS)
}

async fn script() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/javascript; charset=utf-8")], render::JS)
}
