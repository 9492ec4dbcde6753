//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, timeout, body limit, CORS, caller identity)
//! - Bind server to listener
//! - Apply configuration reloads
//! - Cancel in-flight backend calls on shutdown

use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::{CancellationToken, DropGuard};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::gateway::{CallContext, GatewayClient};
use crate::http::handlers;
use crate::http::request::{make_span, propagate_request_id_layer, set_request_id_layer};
use crate::observability::metrics;
use crate::security::identity::{identity_middleware, Identity};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: GatewayClient,
    /// Cancelled when the server shuts down.
    pub shutdown: CancellationToken,
}

/// Call context for one request. Dropping it cancels the request's backend
/// call, so a vanished HTTP client abandons its work.
pub struct RequestScope {
    pub ctx: CallContext,
    _guard: DropGuard,
}

impl AppState {
    pub fn scope(&self, identity: Identity) -> RequestScope {
        let cancel = self.shutdown.child_token();
        RequestScope {
            _guard: cancel.clone().drop_guard(),
            ctx: CallContext::with_cancel(identity, cancel),
        }
    }
}

/// HTTP server for the chat gateway.
pub struct HttpServer {
    router: Router,
    config: Arc<ArcSwap<GatewayConfig>>,
    gateway: GatewayClient,
    shutdown: CancellationToken,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatewayConfig) -> Self {
        let shared = Arc::new(ArcSwap::from_pointee(config.clone()));
        let gateway = GatewayClient::new(shared.clone());
        let shutdown = CancellationToken::new();

        let state = AppState {
            gateway: gateway.clone(),
            shutdown: shutdown.clone(),
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config: shared,
            gateway,
            shutdown,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let router = Router::new()
            .route("/health", get(handlers::health))
            .route("/register", post(handlers::register))
            .route("/users", get(handlers::list_users))
            .route("/groups", get(handlers::list_groups).post(handlers::create_group))
            .route("/groups/{name}", delete(handlers::delete_group))
            .route("/private", post(handlers::send_private))
            .route("/private/{current_user}/{user}", get(handlers::private_history))
            .route("/group", post(handlers::send_group))
            .route("/group/{name}", get(handlers::group_history))
            .route_layer(middleware::from_fn(track_http))
            .layer(middleware::from_fn_with_state(
                config.security.max_body_size,
                identity_middleware,
            ))
            .with_state(state);

        let router = if config.security.cors_enabled {
            router.layer(CorsLayer::permissive())
        } else {
            router
        };

        router.layer(
            ServiceBuilder::new()
                .layer(set_request_id_layer())
                .layer(TraceLayer::new_for_http().make_span_with(make_span::<Body>))
                .layer(propagate_request_id_layer())
                .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
                // Innermost, so it wraps the router's own body type.
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    config.timeouts.request(),
                )),
        )
    }

    /// The backend client used by the handlers.
    pub fn gateway(&self) -> &GatewayClient {
        &self.gateway
    }

    /// Currently active configuration.
    pub fn config(&self) -> Arc<GatewayConfig> {
        self.config.load_full()
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires. Configurations received on `config_updates` replace
    /// the active one for subsequent backend calls.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let config = self.config.clone();
        tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                if config.load().listener.bind_address != new_config.listener.bind_address {
                    tracing::warn!(
                        bind_address = %new_config.listener.bind_address,
                        "Listener address change requires a restart"
                    );
                }
                tracing::info!(backend = %new_config.backend.address, "Configuration reloaded");
                config.store(Arc::new(new_config));
            }
        });

        let token = self.shutdown.clone();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, cancelling backend calls");
                token.cancel();
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Count responses per matched route.
async fn track_http(request: Request<Body>, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());

    let response = next.run(request).await;
    metrics::record_http(route, response.status().as_u16());
    response
}
