//! Dispatcher tests — full pipeline from raw exchange to finalized response.

mod common;

use std::sync::Arc;
use std::time::Duration;

use bindery_protocol::{
    BinderyError, BoxError, Connection, DeploymentParams, ErrorKind, HttpMethod, HttpRequest,
    HttpResponse, ProcedureCall,
};
use bindery_server::{
    Bindlet, BindletScope, Dispatcher, DispatcherConfig, MethodOptions, MethodTable, Protocol,
    RequestEvent, RpcBindlet, TokenAuth,
};
use bindery_transport::HttpConnection;
use common::{LineCodec, body_text};
use serde_json::{Value, json};

const TOKEN: &str = "test-token";

fn methods() -> MethodTable {
    MethodTable::builder()
        .method("add", |call: ProcedureCall| async move {
            let mut total = 0i64;
            for (key, value) in call.parameters() {
                total += value
                    .parse::<i64>()
                    .map_err(|_| format!("{key} is not an integer"))?;
            }
            Ok::<Value, BoxError>(json!(total))
        })
        .method("fail", |_call: ProcedureCall| async move {
            Err::<Value, BoxError>("kaboom".into())
        })
        .method("slow", |_call: ProcedureCall| async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<Value, BoxError>(json!("finally"))
        })
        .method_with("secret", MethodOptions::default().secure(), |_call: ProcedureCall| async move {
            Ok::<Value, BoxError>(json!("42"))
        })
        .method_with("hidden", MethodOptions::default().unlisted(), |_call: ProcedureCall| async move {
            Ok::<Value, BoxError>(json!("peekaboo"))
        })
        .build()
}

/// Counts hits in the context store and greets with a registration parameter.
struct Greeter;

impl Bindlet for Greeter {
    fn name(&self) -> &str {
        "greeter"
    }

    async fn service(&self, event: &mut RequestEvent, scope: &BindletScope<'_>) -> Result<(), BinderyError> {
        assert!(event.handled());
        let hits = scope.context.objects().get_as::<u64>("hits").map_or(0, |n| *n) + 1;
        scope.context.objects().set("hits", hits);

        let greeting = scope.registration.parameter("greeting").unwrap_or_default();
        let text = format!("{greeting} {} #{hits}", scope.remainder.trim_start_matches('/'));
        scope.marshaler.write_result(&mut event.response, "greet", &json!(text));
        Ok(())
    }
}

/// Fails without writing anything.
struct Broken;

impl Bindlet for Broken {
    fn name(&self) -> &str {
        "broken"
    }

    async fn service(&self, _event: &mut RequestEvent, _scope: &BindletScope<'_>) -> Result<(), BinderyError> {
        Err(BinderyError::dispatch("bindlet gave up"))
    }
}

fn dispatcher(config: DispatcherConfig) -> Dispatcher {
    let mut dispatcher = Dispatcher::new(DeploymentParams::new(), config)
        .with_envelope_codec(Arc::new(LineCodec));

    let rpc = Arc::new(RpcBindlet::new("calc", methods()).with_auth(TokenAuth::new(TOKEN)));
    dispatcher.add_context("rest", "/rest/*", Protocol::Rest).register("/*", rpc.clone());
    dispatcher.add_context("json", "/json/*", Protocol::Json).register("/*", rpc.clone());
    dispatcher.add_context("soap", "/soap/*", Protocol::Soap).register("/*", rpc);

    let misc = dispatcher.add_context("misc", "/misc/*", Protocol::Rest);
    let greeter = misc.register("/hello/*", Greeter);
    greeter.set_parameter("greeting", "hello");
    misc.register("/broken", Broken);

    dispatcher.start();
    dispatcher
}

async fn send(dispatcher: &Dispatcher, request: HttpRequest) -> (HttpResponse, HttpConnection) {
    let conn = HttpConnection::new(true);
    let response = dispatcher.dispatch(request, &conn).await.unwrap();
    (response, conn)
}

fn get(target: &str) -> HttpRequest {
    HttpRequest::from_target(HttpMethod::Get, target)
}

fn json_post(path: &str, body: &'static str) -> HttpRequest {
    HttpRequest::post(path)
        .with_header("Content-Type", "application/json")
        .with_body(body)
}

// ─────────────────────────────────────────────────────────────────────────────
// Lifecycle and routing
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn not_running_is_service_unavailable() {
    let idle = Dispatcher::new(DeploymentParams::new(), DispatcherConfig::default());
    assert!(!idle.is_running());
    let (response, _) = send(&idle, get("/rest/add")).await;
    assert_eq!(response.status().code(), 503);

    let mut stopped = dispatcher(DispatcherConfig::default());
    stopped.shutdown();
    let (response, _) = send(&stopped, get("/rest/add")).await;
    assert_eq!(response.status().code(), 503);
}

#[tokio::test]
async fn unknown_context_is_not_found() {
    let d = dispatcher(DispatcherConfig::default());
    let (response, _) = send(&d, get("/nowhere/add")).await;
    assert_eq!(response.status().code(), 404);
}

#[tokio::test]
async fn unmatched_registration_is_not_found() {
    let d = dispatcher(DispatcherConfig::default());
    let (response, _) = send(&d, get("/misc/elsewhere")).await;
    assert_eq!(response.status().code(), 404);
    assert!(response.body().is_empty());
}

#[tokio::test]
async fn rejected_selection_escapes_as_adapter_failure() {
    let d = dispatcher(DispatcherConfig::default());
    let request = HttpRequest::post("/json/add")
        .with_header("Content-Type", "text/xml")
        .with_body("<a/>");
    let conn = HttpConnection::new(true);
    let err = d.dispatch(request, &conn).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AdapterFailure);
}

// ─────────────────────────────────────────────────────────────────────────────
// RPC over each protocol
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn rest_call_round_trip() {
    let d = dispatcher(DispatcherConfig::default());
    let (response, conn) = send(&d, get("/rest/add?a=1&b=2")).await;
    assert_eq!(response.status().code(), 200);
    assert_eq!(body_text(response.body()), "<add><url>3</url></add>");
    assert_eq!(response.header("Content-Type"), Some("text/xml"));
    assert!(response.is_closed());
    assert!(!conn.is_closed());
}

#[tokio::test]
async fn json_call_round_trip() {
    let d = dispatcher(DispatcherConfig::default());
    let (response, _) = send(&d, json_post("/json/add", r#"{"a":"2","b":5}"#)).await;
    assert_eq!(response.status().code(), 200);
    assert_eq!(body_text(response.body()), r#"{"result":"OK","return":7}"#);
}

#[tokio::test]
async fn soap_call_and_description() {
    let d = dispatcher(DispatcherConfig::default());
    let request = HttpRequest::post("/soap/Calc")
        .with_header("Content-Type", "text/xml")
        .with_body("add?a=4&b=4");
    let (response, _) = send(&d, request).await;
    assert_eq!(body_text(response.body()), "<Envelope><addResponse>8</addResponse></Envelope>");

    let (description, _) = send(&d, get("/soap/Calc?wsdl")).await;
    assert_eq!(description.status().code(), 200);
    assert_eq!(
        body_text(description.body()),
        "<definitions>add,fail,secret,slow</definitions>"
    );
}

#[tokio::test]
async fn unknown_method_is_error_envelope() {
    let d = dispatcher(DispatcherConfig::default());
    let (response, _) = send(&d, json_post("/json/nope", "{}")).await;
    assert_eq!(response.status().code(), 500);
    assert_eq!(
        body_text(response.body()),
        r#"{"result":"ERROR","message":"Method not found: nope"}"#
    );
}

#[tokio::test]
async fn handler_failure_reports_root_cause() {
    let d = dispatcher(DispatcherConfig::default());
    let (response, _) = send(&d, get("/rest/fail")).await;
    assert_eq!(response.status().code(), 500);
    assert_eq!(
        body_text(response.body()),
        "<error><message>kaboom</message></error>"
    );
}

#[tokio::test]
async fn unreadable_json_is_error_envelope() {
    let d = dispatcher(DispatcherConfig::default());
    let (response, _) = send(&d, json_post("/json/add", "{not json")).await;
    assert_eq!(response.status().code(), 500);
    assert!(body_text(response.body()).contains("Unreadable JSON body"));
}

#[tokio::test]
async fn unlisted_methods_remain_callable() {
    let d = dispatcher(DispatcherConfig::default());
    let (response, _) = send(&d, get("/rest/hidden")).await;
    assert_eq!(body_text(response.body()), "<hidden><url>peekaboo</url></hidden>");
}

// ─────────────────────────────────────────────────────────────────────────────
// Authentication
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn secure_method_requires_token() {
    let d = dispatcher(DispatcherConfig::default());

    let (denied, _) = send(&d, json_post("/json/secret", "{}")).await;
    assert_eq!(denied.status().code(), 500);
    assert_eq!(
        body_text(denied.body()),
        r#"{"result":"ERROR","message":"Authentication required for secret"}"#
    );

    let bearer = json_post("/json/secret", "{}").with_header("Authorization", format!("Bearer {TOKEN}"));
    let (allowed, _) = send(&d, bearer).await;
    assert_eq!(body_text(allowed.body()), r#"{"result":"OK","return":"42"}"#);

    let header = get("/rest/secret").with_header("X-Auth-Token", TOKEN);
    let (allowed, _) = send(&d, header).await;
    assert_eq!(body_text(allowed.body()), "<secret><url>42</url></secret>");

    let wrong = get("/rest/secret").with_header("X-Auth-Token", "guess");
    let (denied, _) = send(&d, wrong).await;
    assert_eq!(denied.status().code(), 500);
}

// ─────────────────────────────────────────────────────────────────────────────
// Bindlet failures and timeouts
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn bindlet_error_goes_through_error_path() {
    let d = dispatcher(DispatcherConfig::default());
    let request = get("/misc/broken").with_header("Connection", "close");
    let (response, conn) = send(&d, request).await;
    assert_eq!(response.status().code(), 500);
    assert_eq!(
        body_text(response.body()),
        "<error><message>bindlet gave up</message></error>"
    );
    assert!(conn.is_closed());
}

#[tokio::test]
async fn handler_timeout_triggers_error_path() {
    let d = dispatcher(DispatcherConfig {
        handler_timeout: Some(Duration::from_millis(20)),
        ..DispatcherConfig::default()
    });
    let (response, _) = send(&d, json_post("/json/slow", "{}")).await;
    assert_eq!(response.status().code(), 500);
    let body: Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body["result"], "ERROR");
    assert!(body["message"].as_str().unwrap().contains("timed out after 20 ms"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Scope: store, parameters, remainder
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn bindlet_scope_exposes_context_state() {
    let d = dispatcher(DispatcherConfig::default());

    let (first, _) = send(&d, get("/misc/hello/world")).await;
    assert_eq!(body_text(first.body()), "<greet><url>hello world #1</url></greet>");

    d.router()
        .context("misc")
        .unwrap()
        .registrations()
        .entries()[0]
        .set_parameter("greeting", "bonjour");

    let (second, _) = send(&d, get("/misc/hello/monde")).await;
    assert_eq!(body_text(second.body()), "<greet><url>bonjour monde #2</url></greet>");
}

#[tokio::test]
async fn http10_closes_connection() {
    let d = dispatcher(DispatcherConfig::default());
    let (response, conn) = send(&d, get("/rest/add?a=1").with_version("HTTP/1.0")).await;
    assert_eq!(response.status().code(), 200);
    assert!(conn.is_closed());
}

#[tokio::test]
async fn oversized_response_keeps_status_without_body() {
    let d = dispatcher(DispatcherConfig {
        max_response_bytes: Some(8),
        ..DispatcherConfig::default()
    });
    let (response, _) = send(&d, get("/rest/add?a=100&b=200")).await;
    assert_eq!(response.status().code(), 200);
    assert!(response.body().is_empty());
    assert!(response.is_closed());

    let (small, _) = send(&d, get("/rest/unknown")).await;
    assert_eq!(small.status().code(), 500);
    assert!(small.body().is_empty());
}
