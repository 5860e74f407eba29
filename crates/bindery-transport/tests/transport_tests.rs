//! Transport tests — exercise the Axum router in-process via `oneshot`.

use std::sync::Arc;

use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use bindery_protocol::{BinderyError, Connection, HttpRequest, HttpResponse, Status};
use bindery_transport::{RequestHandler, TransportConfig, router};
use serde_json::Value;
use tower::ServiceExt;

/// Echoes what the transport handed over and honours a few test switches.
struct StubHandler;

impl RequestHandler for StubHandler {
    async fn handle_exchange(
        &self,
        request: HttpRequest,
        connection: &dyn Connection,
    ) -> Result<HttpResponse, BinderyError> {
        match request.path.as_str() {
            "/reject" => Err(BinderyError::adapter("not for us")),
            "/explode" => Err(BinderyError::dispatch("boom")),
            "/close" => {
                connection.close();
                Ok(HttpResponse::ok())
            }
            _ => {
                let mut response = HttpResponse::new(Status::from_code(201));
                response.set_header("X-Method", request.method.as_str());
                response.set_header("X-Query", request.query.clone().unwrap_or_default());
                response.set_header(
                    "X-Content-Type",
                    request.content_type().unwrap_or_default(),
                );
                response
                    .write(&request.body)
                    .map_err(BinderyError::from)?;
                Ok(response)
            }
        }
    }
}

fn app() -> axum::Router {
    router(&TransportConfig::default(), Arc::new(StubHandler))
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn health_reports_counters() {
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["inFlight"], 0);
    assert_eq!(json["served"], 0);
    assert!(json["startedAt"].is_string());
}

#[tokio::test]
async fn exchange_is_buffered_and_forwarded() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/sum?a=1")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("b=2"))
        .unwrap();
    let response = app().oneshot(request).await.unwrap();

    assert_eq!(response.status().as_u16(), 201);
    assert_eq!(response.headers()["x-method"], "POST");
    assert_eq!(response.headers()["x-query"], "a=1");
    assert_eq!(
        response.headers()["x-content-type"],
        "application/x-www-form-urlencoded"
    );
    assert!(response.headers().get(header::CONNECTION).is_none());
    assert_eq!(body_text(response).await, "b=2");
}

#[tokio::test]
async fn adapter_failure_is_bad_request() {
    let response = app()
        .oneshot(Request::builder().uri("/reject").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, "not for us");
}

#[tokio::test]
async fn other_failures_are_internal_errors() {
    let response = app()
        .oneshot(Request::builder().uri("/explode").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn closed_connection_sends_connection_close() {
    let response = app()
        .oneshot(Request::builder().uri("/close").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONNECTION], "close");
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let config = TransportConfig {
        max_body_bytes: 8,
        ..TransportConfig::default()
    };
    let app = router(&config, Arc::new(StubHandler));
    let request = Request::builder()
        .method("POST")
        .uri("/api/echo")
        .body(Body::from("0123456789abcdef"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}
