use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::api::{health_check, register};
use crate::config::WebConfig;

pub fn router() -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/register", post(register))
        .layer(TraceLayer::new_for_http())
}

/// Serve the registration endpoint until ctrl-c.
pub async fn run_server(web_config: &WebConfig) -> Result<(), std::io::Error> {
    let listen_addr: SocketAddr = web_config.listen.parse().map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("invalid listen address '{}': {}", web_config.listen, e),
        )
    })?;

    let listener = TcpListener::bind(listen_addr).await?;
    info!(addr = %listen_addr, "Web server listening");

    axum::serve(listener, router())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Web server shutting down gracefully");
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::generate;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_register(body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"OK");
    }

    #[tokio::test]
    async fn test_register_accepts_report() {
        let report = generate(1).remove(0);
        let response = router()
            .oneshot(post_register(serde_json::to_string(&report).unwrap()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["message"], "User registered successfully");
    }

    #[tokio::test]
    async fn test_register_rejects_incomplete_report() {
        let response = router()
            .oneshot(post_register(r#"{"username": "alice"}"#.to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("missing field"));
    }

    #[tokio::test]
    async fn test_register_rejects_malformed_json() {
        let response = router()
            .oneshot(post_register("{not json".to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());
    }
}
