//! # relay: audio transcription relay
//!
//! `relay` is a small HTTP service that lets a browser upload an audio file and get back its
//! transcript without ever holding the speech-to-text credential. The upload is forwarded
//! unmodified to an OpenAI-compatible `/audio/transcriptions` endpoint (Groq by default) with a
//! bearer credential and fixed `model`, `language` and `response_format` fields taken from
//! configuration. The `text` field of the JSON answer is returned to the browser as plain text.
//!
//! ## Request Flow
//!
//! 1. `POST /api/transcribe` receives a `multipart/form-data` body with the file under `audio`.
//! 2. The handler buffers the file and hands it to the [`transcription::Transcriber`] in the
//!    shared [`AppState`].
//! 3. [`transcription::UpstreamTranscriber`] builds a new multipart request, sends it, and waits
//!    for the answer. Nothing is retried.
//! 4. A 2xx JSON answer with a string `text` becomes a `200 OK` response. Every other outcome is
//!    logged in full and reported to the client as a short `502` (see [`errors`]).
//!
//! Alongside the relay the router serves `/healthz`, the OpenAPI document at
//! `/api/openapi.json`, an API viewer at `/docs`, and optionally the upload page from
//! `static_dir`.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use relay::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = relay::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     relay::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     Application::new(config)?
//!         .serve(async {
//!             tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!         })
//!         .await
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod config;
pub mod errors;
mod openapi;
pub mod telemetry;
pub mod transcription;

#[cfg(test)]
pub mod test_utils;

use crate::config::CorsOrigin;
use crate::openapi::ApiDoc;
use crate::transcription::{Transcriber, UpstreamTranscriber};
use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
};
use bon::Builder;
pub use config::Config;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

/// Application state shared across all request handlers.
///
/// Everything in here is read-only after startup.
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .transcriber(Arc::new(UpstreamTranscriber::new(&upstream)?))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub transcriber: Arc<dyn Transcriber>,
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors = &config.cors;

    let allow_origin = if cors.allowed_origins.iter().any(|o| matches!(o, CorsOrigin::Wildcard)) {
        AllowOrigin::any()
    } else {
        let origins = cors
            .allowed_origins
            .iter()
            .filter_map(|origin| match origin {
                // Browsers send the bare origin, without path or trailing slash
                CorsOrigin::Url(url) => Some(url.origin().ascii_serialization().parse::<HeaderValue>()),
                CorsOrigin::Wildcard => None,
            })
            .collect::<Result<Vec<_>, _>>()?;
        AllowOrigin::list(origins)
    };

    let mut layer = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    if let Some(max_age) = cors.max_age {
        layer = layer.max_age(Duration::from_secs(max_age));
    }

    Ok(layer)
}

/// Build the application router.
///
/// - `POST /api/transcribe` with the configured upload limit (none by default)
/// - `GET /healthz`, `GET /api/openapi.json`, `GET /docs`
/// - static files from `static_dir` for every other path, when configured
/// - CORS and request tracing on everything
///
/// # Errors
///
/// Returns an error if a configured CORS origin is not a valid header value.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let body_limit = match state.config.limits.max_upload_size {
        Some(max) => DefaultBodyLimit::max(max),
        None => DefaultBodyLimit::disable(),
    };

    let mut router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route(
            "/api/transcribe",
            post(api::handlers::transcribe::transcribe).layer(body_limit),
        )
        .route("/api/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .with_state(state.clone())
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    if let Some(dir) = &state.config.static_dir {
        debug!("Serving static files from {}", dir.display());
        let index = ServeFile::new(dir.join("index.html"));
        router = router.fallback_service(ServeDir::new(dir).fallback(index));
    }

    let router = router.layer(
        ServiceBuilder::new()
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                    .on_request(DefaultOnRequest::new().level(Level::INFO))
                    .on_response(DefaultOnResponse::new().level(Level::INFO)),
            )
            .layer(create_cors_layer(&state.config)?),
    );

    Ok(router)
}

/// The relay server.
///
/// 1. **Create**: [`Application::new`] builds the upstream client and the router
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts handling requests
/// 3. **Shutdown**: when the shutdown future resolves, in-flight requests finish and telemetry
///    is flushed
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting relay with configuration: {:#?}", config);

        let transcriber: Arc<dyn Transcriber> = Arc::new(UpstreamTranscriber::new(&config.upstream)?);
        let state = AppState::builder().config(config.clone()).transcriber(transcriber).build();
        let router = build_router(&state)?;

        Ok(Self { router, config })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Relay listening on http://{}, forwarding to {}",
            bind_addr, self.config.upstream.url
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
