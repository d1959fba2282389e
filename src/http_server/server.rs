//! # HTTP Server
//!
//! Thin axum adapter: every request goes to one fallback handler that turns
//! it into a [`Request`], hands it to the [`Engine`] and renders the
//! reply: the envelope, or the raw body and headers a successful route set.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::config::HttpServerConfig;
use crate::core::{ApiError, Envelope, Request, Status};
use crate::route::Engine;

#[derive(Clone)]
struct AppState {
    engine: Arc<Engine>,
    timeout: Duration,
}

/// HTTP front end for an [`Engine`]
pub struct HttpServer {
    config: HttpServerConfig,
    router: Router,
}

impl HttpServer {
    pub fn new(engine: Arc<Engine>, config: HttpServerConfig) -> Self {
        let router = Self::build_router(engine, &config);
        Self { config, router }
    }

    fn build_router(engine: Arc<Engine>, config: &HttpServerConfig) -> Router {
        let cors = if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        let state = AppState {
            engine,
            timeout: config.request_timeout(),
        };

        Router::new()
            .fallback(dispatch)
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(cors)
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Serve until Ctrl-C
    pub async fn start(self) -> Result<(), std::io::Error> {
        let addr: SocketAddr = self.config.socket_addr().parse().map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid socket address {}: {}", self.config.socket_addr(), e),
            )
        })?;

        let listener = TcpListener::bind(addr).await?;
        tracing::info!(%addr, "listening");
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        tracing::info!("server stopped");
        Ok(())
    }
}

async fn dispatch(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = match Request::from_parts(method, &uri, headers, &body) {
        Ok(request) => request,
        Err(e) => return e.into_response(),
    };

    // Dropping the engine future on timeout drops the open transaction,
    // which rolls it back.
    match tokio::time::timeout(state.timeout, state.engine.respond(request)).await {
        Ok(reply) => reply.into_response(),
        Err(_) => {
            tracing::warn!(path = uri.path(), "request timed out");
            Envelope::error(&ApiError::with_status(
                Status::ServiceUnavailable,
                "request timeout",
            ))
            .into_response()
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_with_custom_port() {
        let engine = Arc::new(Engine::builder().build().unwrap());
        let server = HttpServer::new(engine, HttpServerConfig::with_port(9090));
        assert_eq!(server.socket_addr(), "0.0.0.0:9090");
        let _router = server.router();
    }
}
