//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router whose single fallback feeds the pipeline
//! - Wire up middleware (tracing)
//! - Serve with connect info (client identity) and graceful shutdown
//! - Own the background rate-limit sweeper

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::Response,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::http::pipeline::Pipeline;
use crate::security::rate_limit::run_sweeper;
use crate::upstream::{HyperClient, UpstreamClient};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    pipeline: Arc<Pipeline>,
    config: GatewayConfig,
}

impl HttpServer {
    /// Create a server that forwards over a pooled hyper client.
    pub fn new(config: GatewayConfig) -> Self {
        Self::with_client(config, Arc::new(HyperClient::new()))
    }

    /// Create a server over the given upstream client.
    pub fn with_client(config: GatewayConfig, client: Arc<dyn UpstreamClient>) -> Self {
        let pipeline = Arc::new(Pipeline::new(&config, client));
        let state = AppState {
            pipeline: pipeline.clone(),
        };

        let router = Self::build_router(state);
        Self {
            router,
            pipeline,
            config,
        }
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .fallback(gateway_handler)
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// The router, for driving the gateway without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.pipeline.routes().len(),
            "HTTP server starting"
        );

        let sweeper = tokio::spawn(run_sweeper(
            self.pipeline.rate_limiter(),
            Duration::from_secs(self.config.gateway.sweep_interval_secs),
            shutdown.resubscribe(),
        ));

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        let mut shutdown = shutdown;
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        // The sweeper may have subscribed after the signal was sent.
        sweeper.abort();
        let _ = sweeper.await;
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Every request, whatever its path or method, enters the pipeline here.
async fn gateway_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    state.pipeline.handle(peer, request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    use axum::body::to_bytes;
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::{header, Method, Response as HttpResponse, StatusCode};
    use futures_util::future::BoxFuture;
    use tower::ServiceExt;

    use crate::config::{RateLimitPolicy, RouteConfig};
    use crate::http::request::X_REQUEST_ID;
    use crate::upstream::UpstreamError;

    #[derive(Debug)]
    struct EchoClient;

    impl UpstreamClient for EchoClient {
        fn send(&self, request: Request<Body>) -> BoxFuture<'static, Result<HttpResponse<Body>, UpstreamError>> {
            let body = request.uri().to_string();
            Box::pin(async move { Ok(HttpResponse::new(Body::from(body))) })
        }
    }

    fn app(trust_forwarded_for: bool) -> Router {
        let mut config = GatewayConfig::default();
        config.gateway.trust_forwarded_for = trust_forwarded_for;
        config.gateway.rate_limit = Some(RateLimitPolicy::new(60_000, 1));
        config.routes = vec![RouteConfig::new("orders", "/orders", "http://127.0.0.1:8001")];

        let peer = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 1, 1, 1)), 5000);
        HttpServer::with_client(config, Arc::new(EchoClient))
            .router()
            .layer(MockConnectInfo(peer))
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_fallback_reaches_pipeline() {
        let response = app(false)
            .oneshot(
                Request::builder()
                    .method(Method::DELETE)
                    .uri("/orders/1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(&X_REQUEST_ID));
        let bytes = to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&bytes[..], b"http://127.0.0.1:8001/1");
    }

    #[tokio::test]
    async fn test_forwarded_clients_get_separate_windows() {
        let app = app(true);

        for client in ["203.0.113.1", "203.0.113.2"] {
            let request = Request::builder()
                .uri("/orders")
                .header("x-forwarded-for", client)
                .body(Body::empty())
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK, "first request from {}", client);
        }

        let request = Request::builder()
            .uri("/orders")
            .header("x-forwarded-for", "203.0.113.1")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(header::RETRY_AFTER));
    }

    #[tokio::test]
    async fn test_untrusted_forwarded_for_is_ignored() {
        let app = app(false);

        let first = Request::builder()
            .uri("/orders")
            .header("x-forwarded-for", "203.0.113.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(app.clone().oneshot(first).await.unwrap().status(), StatusCode::OK);

        let second = Request::builder()
            .uri("/orders")
            .header("x-forwarded-for", "203.0.113.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            app.clone().oneshot(second).await.unwrap().status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[tokio::test]
    async fn test_health_through_router() {
        let app = app(false);
        for _ in 0..3 {
            let response = app.clone().oneshot(get("/health")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }
}
