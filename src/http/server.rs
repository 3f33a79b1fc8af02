//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the subsystems from config (tokens, hashing, rotation, analysis)
//! - Create the Axum Router with public and authenticated routes
//! - Wire up middleware (request ID, tracing, metrics, CORS, timeouts, body limit)
//! - Serve on a listener until the shutdown handle fires

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::analysis::{AnalysisPipeline, ModelClient, PromptTemplate, TemplateError};
use crate::auth::{
    Authenticator, GoogleProvider, HashError, IdentityProvider, SecretHasher, SessionRotation,
    TokenService,
};
use crate::config::ServiceConfig;
use crate::http::middleware::authenticate_middleware;
use crate::http::request::{make_request_span, record_metrics, X_REQUEST_ID};
use crate::http::{auth, health, scan};
use crate::lifecycle::shutdown;
use crate::security::rate_limit::{
    rate_limit_middleware, RateLimiter, X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING,
    X_RATELIMIT_RESET,
};
use crate::store::Stores;

/// Errors raised while assembling the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid hashing parameters: {0}")]
    Hashing(#[from] HashError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("invalid frontend origin '{0}'")]
    Origin(String),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub tokens: TokenService,
    pub rotation: SessionRotation,
    pub provider: Arc<dyn IdentityProvider>,
    pub pipeline: Arc<AnalysisPipeline>,
}

/// HTTP server for the scan gateway.
pub struct HttpServer {
    router: Router,
    config: Arc<ServiceConfig>,
}

impl HttpServer {
    /// Create a server using the Google identity provider.
    pub fn new(config: ServiceConfig, stores: Stores) -> Result<Self, ServerError> {
        let provider = Arc::new(GoogleProvider::from_config(&config.oauth));
        Self::with_provider(config, stores, provider)
    }

    /// Create a server with an explicit identity provider.
    pub fn with_provider(
        config: ServiceConfig,
        stores: Stores,
        provider: Arc<dyn IdentityProvider>,
    ) -> Result<Self, ServerError> {
        let config = Arc::new(config);

        let tokens = TokenService::from_config(&config.auth);
        let hasher = SecretHasher::from_config(&config.auth)?;
        let rotation = SessionRotation::new(stores.credentials.clone(), hasher.clone());
        let authenticator = Arc::new(Authenticator::new(
            tokens.clone(),
            stores.credentials.clone(),
            hasher,
        ));
        let limiter = Arc::new(RateLimiter::from_config(
            stores.counters.clone(),
            &config.rate_limit,
        ));

        let template = match &config.analysis.prompt_template_path {
            Some(path) => PromptTemplate::load(Path::new(path))?,
            None => PromptTemplate::default(),
        };
        let pipeline = Arc::new(AnalysisPipeline::new(
            ModelClient::from_config(&config.analysis)?,
            template,
            config.analysis.max_snippet_bytes,
        ));

        let state = AppState {
            config: config.clone(),
            tokens,
            rotation,
            provider,
            pipeline,
        };

        let router = Self::build_router(&config, state, authenticator, limiter)?;
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(
        config: &ServiceConfig,
        state: AppState,
        authenticator: Arc<Authenticator>,
        limiter: Arc<RateLimiter>,
    ) -> Result<Router, ServerError> {
        let mut scan_routes = Router::new().route("/api/scan", post(scan::scan));
        if config.rate_limit.enabled {
            scan_routes = scan_routes
                .route_layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
        } else {
            tracing::warn!("Rate limiting disabled");
        }

        let authenticated = Router::new()
            .route("/api/auth/user", get(auth::current_user))
            .merge(scan_routes)
            .route_layer(middleware::from_fn_with_state(
                authenticator,
                authenticate_middleware,
            ));

        let router = Router::new()
            .route("/health", get(health::health))
            .route("/api/auth/google", get(auth::start_login))
            .route("/api/auth/google/callback", get(auth::finish_login))
            .merge(authenticated)
            .route_layer(middleware::from_fn(record_metrics))
            .with_state(state)
            .layer(DefaultBodyLimit::max(config.security.max_body_bytes))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
                    .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
                    .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
                    .layer(Self::cors_layer(config)?)
                    .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
            );

        Ok(router)
    }

    fn cors_layer(config: &ServiceConfig) -> Result<CorsLayer, ServerError> {
        let origin = config.oauth.frontend_url.trim_end_matches('/');
        let origin = HeaderValue::from_str(origin)
            .map_err(|_| ServerError::Origin(config.oauth.frontend_url.clone()))?;

        Ok(CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .expose_headers([
                X_RATELIMIT_LIMIT,
                X_RATELIMIT_REMAINING,
                X_RATELIMIT_RESET,
                header::RETRY_AFTER,
                X_REQUEST_ID,
            ]))
    }

    /// The assembled router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until the shutdown handle fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            rate_limit = self.config.rate_limit.max_requests,
            window_secs = self.config.rate_limit.window_secs,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown::wait_for(shutdown_rx))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}
