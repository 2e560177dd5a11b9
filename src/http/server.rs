//! HTTP server setup and configuration
//!
//! Builds the deployment workers and the router, binds the listener, and runs
//! until the shutdown signal fires. In-flight deployments are not awaited on
//! shutdown.

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, instrument};

use crate::{
    config::{parse_size_string, Config},
    deployment::Deployer,
    http::{
        handlers::*,
        middleware::{bearer_auth_middleware, trace_layer},
    },
    orchestration::OrchestrationClient,
    tasks::DeploymentDispatcher,
    types::{ConfigError, Error, Result},
};

/// Start the HTTP server with the given configuration
#[instrument(skip_all)]
pub async fn start_server(
    config: Config,
    client: Arc<dyn OrchestrationClient>,
    shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = parse_listen_address(&config.listen_address())?;
    let max_request_size = parse_size_string(&config.server.max_request_size)?;

    let deployer = Arc::new(Deployer::new(client, config.deploy.clone()));
    let (dispatcher, _workers) =
        DeploymentDispatcher::spawn(deployer, config.deploy.queue_capacity);

    let app_state = Arc::new(AppState {
        config: config.clone(),
        dispatcher,
    });

    let router = create_router(app_state, max_request_size);

    info!(
        listen_addr = %addr,
        max_request_size = %config.server.max_request_size,
        "Starting HTTP server"
    );

    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        error!(
            error = %e,
            addr = %addr,
            "Failed to bind to address"
        );
        Error::Io(e)
    })?;

    info!(
        local_addr = %listener.local_addr().unwrap_or(addr),
        "HTTP server listening"
    );

    let server = axum::serve(listener, router).with_graceful_shutdown(async {
        shutdown_signal.await;
        info!("Shutdown signal received, starting graceful shutdown");
    });

    if let Err(e) = server.await {
        error!(error = %e, "HTTP server error");
        return Err(Error::Io(e));
    }

    info!("HTTP server shutdown complete");
    Ok(())
}

/// Create the Axum router with all endpoints and middleware
///
/// Authentication runs only when `POST /deploy` matches, so a wrong method
/// on a known path falls through to the 404 handler like an unknown path.
/// The body limit sits inside authentication: unauthenticated callers get
/// 401 whatever the size of their body.
pub(crate) fn create_router(app_state: Arc<AppState>, max_request_size: usize) -> Router {
    let deploy = post(handle_deploy)
        .route_layer(
            ServiceBuilder::new()
                .layer(from_fn_with_state(app_state.clone(), bearer_auth_middleware))
                .layer(RequestBodyLimitLayer::new(max_request_size))
                .layer(DefaultBodyLimit::disable()),
        )
        .fallback(handle_not_found);
    let health = get(handle_health).fallback(handle_not_found);

    Router::new()
        .route("/deploy", deploy)
        .route("/health", health)
        .fallback(handle_not_found)
        .layer(trace_layer())
        .with_state(app_state)
}

/// Parse the listen address from configuration
fn parse_listen_address(listen: &str) -> Result<SocketAddr> {
    listen.parse().map_err(|e| {
        error!(
            listen_addr = %listen,
            error = %e,
            "Invalid listen address format"
        );
        Error::Config(ConfigError::Invalid {
            message: format!("Invalid listen address '{}': {}", listen, e),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::testing::{Call, RecordingClient};
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        response::Response,
    };
    use http_body_util::BodyExt;
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    const TOKEN: &str = "test-webhook-token";
    const VALID_BODY: &str = r#"{"action":"deploy","environment":"production","images":{"backend":"registry/backend:v7","frontend":"registry/frontend:v7"}}"#;

    fn test_router(client: &RecordingClient) -> Router {
        let mut config = Config::default();
        config.auth.token = crate::config::SecretToken::new(TOKEN.to_string());
        let deployer = Arc::new(Deployer::new(
            Arc::new(client.clone()),
            config.deploy.clone(),
        ));
        let (dispatcher, _) = DeploymentDispatcher::spawn(deployer, config.deploy.queue_capacity);
        create_router(Arc::new(AppState { config, dispatcher }), 1024 * 1024)
    }

    fn deploy_request(authorization: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/deploy")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn authorized(body: &str) -> Request<Body> {
        deploy_request(Some(&format!("Bearer {}", TOKEN)), body)
    }

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Give the workers a moment, then confirm nothing reached the client
    async fn assert_no_deployment(client: &RecordingClient) {
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(client.calls().is_empty(), "calls: {:?}", client.calls());
    }

    #[test]
    fn test_parse_listen_address() {
        assert!(parse_listen_address("127.0.0.1:8080").is_ok());
        assert!(parse_listen_address("0.0.0.0:9000").is_ok());
        assert!(parse_listen_address("[::1]:8080").is_ok());

        assert!(parse_listen_address("invalid").is_err());
        assert!(parse_listen_address("127.0.0.1").is_err());
        assert!(parse_listen_address("127.0.0.1:99999").is_err());
    }

    #[tokio::test]
    async fn test_health_ignores_auth() {
        let client = RecordingClient::new();
        let router = test_router(&client);

        for authorization in [None, Some("Bearer wrong")] {
            let mut builder = Request::builder().uri("/health");
            if let Some(value) = authorization {
                builder = builder.header(header::AUTHORIZATION, value);
            }
            let response = router
                .clone()
                .oneshot(builder.body(Body::empty()).unwrap())
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(
                body_json(response).await,
                serde_json::json!({"status": "healthy", "service": "volt-deployment-webhook"})
            );
        }
    }

    #[tokio::test]
    async fn test_deploy_without_token_is_unauthorized() {
        let client = RecordingClient::new();
        let router = test_router(&client);

        let response = router
            .oneshot(deploy_request(None, VALID_BODY))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_json(response).await["error"].is_string());
        assert_no_deployment(&client).await;
    }

    #[tokio::test]
    async fn test_deploy_with_wrong_token_is_unauthorized() {
        let client = RecordingClient::new();
        let router = test_router(&client);

        for authorization in ["Bearer not-the-token", "Token test-webhook-token", TOKEN] {
            let response = router
                .clone()
                .oneshot(deploy_request(Some(authorization), VALID_BODY))
                .await
                .unwrap();
            assert_eq!(
                response.status(),
                StatusCode::UNAUTHORIZED,
                "authorization: {}",
                authorization
            );
        }
        assert_no_deployment(&client).await;
    }

    #[tokio::test]
    async fn test_auth_is_checked_before_body() {
        let client = RecordingClient::new();
        let router = test_router(&client);

        let response = router
            .oneshot(deploy_request(Some("Bearer wrong"), "not json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_deploy_invalid_payloads() {
        let client = RecordingClient::new();
        let router = test_router(&client);

        let bodies = [
            // malformed JSON
            r#"{"action":"deploy","#,
            // missing environment
            r#"{"action":"deploy","images":{"backend":"b:1","frontend":"f:1"}}"#,
            // unknown environment
            r#"{"action":"deploy","environment":"dev","images":{"backend":"b:1","frontend":"f:1"}}"#,
            // missing images
            r#"{"action":"deploy","environment":"staging"}"#,
            // missing frontend image
            r#"{"action":"deploy","environment":"staging","images":{"backend":"b:1"}}"#,
            // empty backend image
            r#"{"action":"deploy","environment":"staging","images":{"backend":"","frontend":"f:1"}}"#,
        ];

        for body in bodies {
            let response = router.clone().oneshot(authorized(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
            assert!(body_json(response).await["error"].is_string());
        }
        assert_no_deployment(&client).await;
    }

    #[tokio::test]
    async fn test_deploy_responds_before_deployment_runs() {
        let (client, gate) = RecordingClient::gated();
        let router = test_router(&client);

        let response = router.oneshot(authorized(VALID_BODY)).await.unwrap();

        // The worker is still blocked on the first pull
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(DEPLOY_ID_HEADER));
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"status": "deployment started"})
        );
        assert!(client.calls().is_empty());

        gate.add_permits(2);
        let calls = client.wait_for_calls(5, Duration::from_secs(5)).await;
        assert_eq!(
            calls,
            vec![
                Call::Pull("registry/backend:v7".to_string()),
                Call::Pull("registry/frontend:v7".to_string()),
                Call::UpdateService {
                    service: "volt-prod_backend".to_string(),
                    image: "registry/backend:v7".to_string(),
                },
                Call::UpdateService {
                    service: "volt-prod_frontend".to_string(),
                    image: "registry/frontend:v7".to_string(),
                },
                Call::Prune,
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_routes_are_not_found() {
        let client = RecordingClient::new();
        let router = test_router(&client);

        let requests = [
            (Method::GET, "/"),
            (Method::GET, "/metrics"),
            (Method::POST, "/health"),
            (Method::GET, "/deploy"),
            (Method::PUT, "/deploy"),
        ];

        for (method, uri) in requests {
            let response = router
                .clone()
                .oneshot(
                    Request::builder()
                        .method(method.clone())
                        .uri(uri)
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(
                response.status(),
                StatusCode::NOT_FOUND,
                "{} {}",
                method,
                uri
            );
            assert_eq!(
                body_json(response).await,
                serde_json::json!({"error": "Not found"})
            );
        }
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let client = RecordingClient::new();
        let mut config = Config::default();
        config.auth.token = crate::config::SecretToken::new(TOKEN.to_string());
        let deployer = Arc::new(Deployer::new(
            Arc::new(client.clone()),
            config.deploy.clone(),
        ));
        let (dispatcher, _) = DeploymentDispatcher::spawn(deployer, 4);
        let router = create_router(Arc::new(AppState { config, dispatcher }), 64);

        let response = router
            .clone()
            .oneshot(authorized(VALID_BODY))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

        // Authentication is decided before the body size
        let oversized = "x".repeat(200);
        let mut request = deploy_request(None, &oversized);
        request
            .headers_mut()
            .insert(header::CONTENT_LENGTH, header::HeaderValue::from(200u64));
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let mut request = deploy_request(Some("Bearer wrong"), &oversized);
        request
            .headers_mut()
            .insert(header::CONTENT_LENGTH, header::HeaderValue::from(200u64));
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        assert_no_deployment(&client).await;
    }
}
