//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all proxy handler
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bind server to listener and drain on shutdown
//! - Dispatch each request: landing page, WebSocket tunnel or HTTP forward
//! - Observability (metrics, correlation IDs)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::error::{ProxyError, StartupError};
use crate::http::forward::Forwarder;
use crate::http::landing;
use crate::http::request::{proxy_origin, request_id, X_REQUEST_ID};
use crate::http::response::into_client_response;
use crate::http::websocket::{is_upgrade_request, Tunneler};
use crate::observability::metrics;
use crate::rewrite::{ProxyOrigin, RewriteContext};
use crate::routing::{RouteTable, Target};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub forwarder: Forwarder,
    pub tunneler: Tunneler,
    pub public_origin: Option<ProxyOrigin>,
}

/// HTTP server for the proxy.
pub struct HttpServer {
    router: Router,
    routes: Arc<RouteTable>,
}

impl HttpServer {
    /// Create a new HTTP server from validated configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, StartupError> {
        let routes = Arc::new(RouteTable::from_config(&config)?);
        let public_origin = config
            .proxy
            .public_origin
            .as_deref()
            .map(|raw| {
                let target = Target::parse(raw).map_err(|e| StartupError::PublicOrigin(e.to_string()))?;
                Ok::<_, StartupError>(ProxyOrigin::new(target.scheme(), target.authority()))
            })
            .transpose()?;

        let state = AppState {
            routes: Arc::clone(&routes),
            forwarder: Forwarder::new(&config)?,
            tunneler: Tunneler::new(&config)?,
            public_origin,
        };

        let router = Self::build_router(&config, state);
        Ok(Self { router, routes })
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// A request that outlives `timeouts.request_secs` gets 502.
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(TimeoutLayer::with_status_code(
                        StatusCode::BAD_GATEWAY,
                        Duration::from_secs(config.timeouts.request_secs),
                    ))
                    .layer(PropagateRequestIdLayer::new(X_REQUEST_ID)),
            )
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            mode = ?self.routes.mode(),
            routes = self.routes.routes().count(),
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Main proxy handler.
/// Resolves the route, then serves the landing page, opens a tunnel, or
/// forwards and rewrites.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(request.headers()).to_string();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let Some(route) = state.routes.resolve(&path) else {
        tracing::debug!(request_id = %request_id, path = %path, "No route matched, serving landing page");
        metrics::record_request(&method, 200, "landing", start_time);
        return landing::response(&state.routes);
    };

    let proxy = proxy_origin(request.headers(), request.uri(), state.public_origin.as_ref());
    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        prefix = route.label(),
        target = %route.target(),
        "Proxying request"
    );

    let result = if is_upgrade_request(request.headers()) {
        state.tunneler.open(request, &route, peer.ip(), &proxy).await
    } else {
        state
            .forwarder
            .forward(request, &route, peer.ip(), &proxy)
            .await
            .map(|upstream| into_client_response(upstream, Arc::new(RewriteContext::new(&route, &proxy))))
    };

    let response = match result {
        Ok(response) => response,
        Err(e) => {
            log_failure(&e, &request_id, route.label());
            metrics::record_upstream_error(e.kind());
            e.into_response()
        }
    };

    tracing::debug!(
        request_id = %request_id,
        prefix = route.label(),
        status = response.status().as_u16(),
        "Upstream responded"
    );
    metrics::record_request(&method, response.status().as_u16(), route.label(), start_time);
    response
}

fn log_failure(error: &ProxyError, request_id: &str, prefix: &str) {
    match error {
        ProxyError::HandshakeRejected { status } => {
            tracing::warn!(request_id = %request_id, prefix, origin_status = %status, "WebSocket handshake rejected");
        }
        ProxyError::TunnelLimit | ProxyError::MalformedUpgrade(_) => {
            tracing::warn!(request_id = %request_id, prefix, error = %error, "WebSocket upgrade refused");
        }
        _ => {
            tracing::error!(request_id = %request_id, prefix, error = %error, "Upstream error");
        }
    }
}
