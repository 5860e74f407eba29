//! HTTP transport server using Axum.
//!
//! Buffers every request, hands the raw exchange to the dispatch core and
//! writes the finalized response back. Adapter failures escaping the core
//! become `400 Bad Request`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use axum::{
    Router,
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, Method, StatusCode, Uri, Version, header},
    response::{IntoResponse, Json, Response},
    routing::get,
};
use bindery_protocol::{
    BinderyError, Connection, ErrorKind, HttpMethod, HttpRequest, HttpResponse,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use crate::connection::HttpConnection;

/// Trait implemented by the dispatch core to handle buffered exchanges.
/// The transport calls this once per HTTP request.
pub trait RequestHandler: Send + Sync + 'static {
    /// Handle a raw request and return the finalized response. Only adapter
    /// failures are expected to escape.
    fn handle_exchange(
        &self,
        request: HttpRequest,
        connection: &dyn Connection,
    ) -> impl std::future::Future<Output = Result<HttpResponse, BinderyError>> + Send;
}

/// Listener settings.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Listening port; 0 lets the OS choose
    pub port: u16,
    /// Interface address
    pub hostname: String,
    /// Maximum buffered request body size
    pub max_body_bytes: usize,
    /// Enable CORS
    pub enable_cors: bool,
    /// Enable verbose exchange logging
    pub verbose_logging: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            hostname: "127.0.0.1".into(),
            max_body_bytes: 2 * 1024 * 1024,
            enable_cors: false,
            verbose_logging: false,
        }
    }
}

/// State shared by every axum handler.
struct AppState<H: RequestHandler> {
    handler: Arc<H>,
    config: TransportConfig,
    /// Exchanges currently inside the handler
    in_flight: AtomicUsize,
    /// Exchanges answered since start
    served: AtomicU64,
    started_at: DateTime<Utc>,
}

/// The transport server — accepts HTTP requests and routes them to the core.
pub struct TransportServer {
    /// Signals the serve task to drain
    shutdown_tx: Option<mpsc::Sender<()>>,
    /// Serve task
    handle: Option<tokio::task::JoinHandle<()>>,
    /// Port the listener ended up on
    port: u16,
}

impl TransportServer {
    /// Bind the listener and serve `handler` until stopped.
    pub async fn start<H: RequestHandler>(
        config: TransportConfig,
        handler: H,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        Self::start_shared(config, Arc::new(handler)).await
    }

    /// Start the transport server with a handler shared with other owners.
    pub async fn start_shared<H: RequestHandler>(
        config: TransportConfig,
        handler: Arc<H>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);

        let app = router(&config, handler);

        let addr: SocketAddr = format!("{}:{}", config.hostname, config.port).parse()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let actual_port = listener.local_addr()?.port();

        info!("Bindery transport listening on http://{}:{}", config.hostname, actual_port);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await
                .ok();
        });

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
            port: actual_port,
        })
    }

    /// Port the listener is bound to.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Stop accepting connections and wait for in-flight exchanges.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        info!("Bindery transport server stopped");
    }
}

/// Build the Axum router without binding a socket.
pub fn router<H: RequestHandler>(config: &TransportConfig, handler: Arc<H>) -> Router {
    let state = Arc::new(AppState {
        handler,
        config: config.clone(),
        in_flight: AtomicUsize::new(0),
        served: AtomicU64::new(0),
        started_at: Utc::now(),
    });

    let app = Router::new()
        .route("/health", get(health_handler::<H>))
        .fallback(exchange_handler::<H>)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .with_state(state);

    if config.enable_cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Axum handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn health_handler<H: RequestHandler>(
    State(state): State<Arc<AppState<H>>>,
) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "inFlight": state.in_flight.load(Ordering::Relaxed),
        "served": state.served.load(Ordering::Relaxed),
        "startedAt": state.started_at.to_rfc3339(),
    }))
}

async fn exchange_handler<H: RequestHandler>(
    State(state): State<Arc<AppState<H>>>,
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let http1 = matches!(version, Version::HTTP_10 | Version::HTTP_11);
    let connection = HttpConnection::new(http1);
    let request = into_raw_request(&method, &uri, version, &headers, body);

    if state.config.verbose_logging {
        debug!("{} {} {} ({})", connection.id, request.method, request.target(), request.version);
    }

    state.in_flight.fetch_add(1, Ordering::Relaxed);
    let outcome = state.handler.handle_exchange(request, &connection).await;
    state.in_flight.fetch_sub(1, Ordering::Relaxed);
    state.served.fetch_add(1, Ordering::Relaxed);

    match outcome {
        Ok(response) => into_wire_response(response, &connection),
        Err(e) => {
            let status = match e.kind() {
                ErrorKind::AdapterFailure => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            warn!("Exchange {} rejected ({}): {e}", connection.id, e.kind());
            (status, e.to_string()).into_response()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn into_raw_request(
    method: &Method,
    uri: &Uri,
    version: Version,
    headers: &HeaderMap,
    body: Bytes,
) -> HttpRequest {
    let mut request = HttpRequest::new(HttpMethod::parse(method.as_str()), uri.path())
        .with_version(format!("{version:?}"))
        .with_body(body);
    request.query = uri.query().map(str::to_string);
    for (name, value) in headers {
        request
            .headers
            .append(name.as_str(), String::from_utf8_lossy(value.as_bytes()));
    }
    request
}

fn into_wire_response(response: HttpResponse, connection: &HttpConnection) -> Response {
    let (status, headers, body) = response.into_parts();

    let mut builder = axum::http::Response::builder().status(status.code());
    for (name, value) in headers.iter() {
        builder = builder.header(name, value);
    }
    if connection.http1 && connection.is_closed() {
        builder = builder.header(header::CONNECTION, "close");
    }

    match builder.body(Body::from(body)) {
        Ok(response) => response,
        Err(e) => {
            warn!("Exchange {} produced an unencodable response: {e}", connection.id);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
