//! Procedure-call extraction and charset resolution tests.

use bindery_protocol::params::{FORCED_ENCODING, LEGACY_METHOD_NAMES};
use bindery_protocol::{DeploymentParams, ErrorKind, HttpMethod, HttpRequest, ProcedureCall};
use bindery_server::call::{self, procedure_name};
use bindery_server::charset::{self, Charset};
use bindery_server::{SoapBody, TypedRequest};

fn rest(request: HttpRequest) -> TypedRequest {
    TypedRequest::Rest { http: request }
}

fn json(request: HttpRequest) -> TypedRequest {
    TypedRequest::Json {
        http: request,
        charset: Charset::Utf8,
    }
}

fn legacy() -> DeploymentParams {
    DeploymentParams::new().with(LEGACY_METHOD_NAMES, "true")
}

// ─────────────────────────────────────────────────────────────────────────────
// Procedure names
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn name_is_last_path_segment() {
    assert_eq!(procedure_name("/api/sum"), Some("sum"));
    assert_eq!(procedure_name("/api/sum?a=1"), Some("sum"));
    assert_eq!(procedure_name("/api/"), None);
    assert_eq!(procedure_name(""), None);
}

// ─────────────────────────────────────────────────────────────────────────────
// REST
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn rest_get_last_value_wins() {
    let request = HttpRequest::from_target(HttpMethod::Get, "/api/sum?a=1&a=2");
    let call = call::build(&rest(request), &DeploymentParams::new()).unwrap();
    assert_eq!(call, ProcedureCall::new("sum").with_param("a", "2"));
}

#[test]
fn rest_get_decodes_parameters() {
    let request = HttpRequest::from_target(HttpMethod::Get, "/api/echo?msg=hello%20world&x=a+b&=skipped");
    let call = call::build(&rest(request), &DeploymentParams::new()).unwrap();
    assert_eq!(call.param("msg"), Some("hello world"));
    assert_eq!(call.param("x"), Some("a b"));
    assert_eq!(call.parameters().len(), 2);
}

#[test]
fn rest_post_reads_form_body() {
    let request = HttpRequest::post("/api/sum")
        .with_query("ignored=1")
        .with_header("Content-Type", "application/x-www-form-urlencoded; charset=UTF-8")
        .with_body("a=3&b=4");
    let call = call::build(&rest(request), &DeploymentParams::new()).unwrap();
    assert_eq!(call.param("a"), Some("3"));
    assert_eq!(call.param("b"), Some("4"));
    assert_eq!(call.param("ignored"), None);
}

#[test]
fn rest_post_ignores_non_form_body() {
    let request = HttpRequest::post("/api/sum")
        .with_header("Content-Type", "application/json")
        .with_body("a=3");
    let call = call::build(&rest(request), &DeploymentParams::new()).unwrap();
    assert_eq!(call.name(), "sum");
    assert!(call.parameters().is_empty());
}

#[test]
fn rest_without_name_is_parse_failure() {
    let request = HttpRequest::from_target(HttpMethod::Get, "/api/?method=com.example.Calc.sum");
    let err = call::build(&rest(request), &DeploymentParams::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ParseFailure);
}

#[test]
fn rest_legacy_name_from_method_parameter() {
    let request = HttpRequest::from_target(HttpMethod::Get, "/api/?method=com.example.Calc.sum&a=1");
    let call = call::build(&rest(request), &legacy()).unwrap();
    assert_eq!(call.name(), "sum");
    assert_eq!(call.param("a"), Some("1"));
}

#[test]
fn rest_legacy_prefers_path_name() {
    let request = HttpRequest::from_target(HttpMethod::Get, "/api/echo?method=com.example.sum");
    let call = call::build(&rest(request), &legacy()).unwrap();
    assert_eq!(call.name(), "echo");
}

#[test]
fn rest_legacy_without_method_parameter_fails() {
    let request = HttpRequest::from_target(HttpMethod::Get, "/api/?a=1");
    let err = call::build(&rest(request), &legacy()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ParseFailure);
}

// ─────────────────────────────────────────────────────────────────────────────
// JSON
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn json_empty_object_has_no_parameters() {
    let request = HttpRequest::post("/json/ping").with_body("{}");
    let call = call::build(&json(request), &DeploymentParams::new()).unwrap();
    assert_eq!(call, ProcedureCall::new("ping"));
}

#[test]
fn json_blank_body_has_no_parameters() {
    let request = HttpRequest::post("/json/ping").with_body("  \n");
    let call = call::build(&json(request), &DeploymentParams::new()).unwrap();
    assert!(call.parameters().is_empty());
}

#[test]
fn json_values_are_flattened_to_text() {
    let body = r#"{"a":1,"b":"x","c":null,"d":{"k":true},"a":2}"#;
    let request = HttpRequest::post("/json/echo").with_body(body);
    let call = call::build(&json(request), &DeploymentParams::new()).unwrap();

    assert_eq!(call.param("a"), Some("2"));
    assert_eq!(call.param("b"), Some("x"));
    assert_eq!(call.param("c"), Some(""));
    assert_eq!(call.param("d"), Some(r#"{"k":true}"#));
    let keys: Vec<&str> = call.parameters().keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["a", "b", "c", "d"]);
}

#[test]
fn json_unreadable_bodies_are_parse_failures() {
    for body in ["{", "[1,2]", "{} trailing", "\"text\""] {
        let request = HttpRequest::post("/json/echo").with_body(body);
        let err = call::build(&json(request), &DeploymentParams::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseFailure, "body {body:?}");
        assert!(err.to_string().starts_with("Unreadable JSON body"));
    }
}

#[test]
fn json_without_name_is_parse_failure() {
    let request = HttpRequest::post("/json/").with_body("{}");
    let err = call::build(&json(request), &DeploymentParams::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ParseFailure);
}

#[test]
fn json_body_decoded_with_charset() {
    let mut body = b"{\"n\":\"".to_vec();
    body.push(0xE9);
    body.extend_from_slice(b"\"}");
    let request = TypedRequest::Json {
        http: HttpRequest::post("/json/echo").with_body(body),
        charset: Charset::Latin1,
    };
    let call = call::build(&request, &DeploymentParams::new()).unwrap();
    assert_eq!(call.param("n"), Some("é"));
}

// ─────────────────────────────────────────────────────────────────────────────
// SOAP
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn soap_call_comes_from_envelope() {
    let carried = ProcedureCall::new("sum").with_param("a", "1");
    let request = TypedRequest::Soap {
        http: HttpRequest::post("/soap/Calc"),
        body: SoapBody::Call(carried.clone()),
    };
    assert_eq!(call::build(&request, &DeploymentParams::new()).unwrap(), carried);
}

#[test]
fn soap_description_has_no_call() {
    let request = TypedRequest::Soap {
        http: HttpRequest::from_target(HttpMethod::Get, "/soap/Calc?wsdl"),
        body: SoapBody::Description,
    };
    let err = call::build(&request, &DeploymentParams::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ParseFailure);
}

// ─────────────────────────────────────────────────────────────────────────────
// Charsets
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn get_is_always_utf8() {
    let resolved = charset::resolve(&HttpMethod::Get, Some("ISO-8859-1"), Some("US-ASCII"));
    assert_eq!(resolved, Charset::Utf8);
}

#[test]
fn forced_encoding_overrides_declared() {
    let resolved = charset::resolve(&HttpMethod::Post, Some("UTF-8"), Some("iso-8859-1"));
    assert_eq!(resolved, Charset::Latin1);

    let declared = charset::resolve(&HttpMethod::Post, Some("us-ascii"), None);
    assert_eq!(declared, Charset::Ascii);
}

#[test]
fn unknown_encoding_falls_back_to_default() {
    let resolved = charset::resolve(&HttpMethod::Post, Some("klingon"), None);
    assert_eq!(resolved, Charset::Utf8);
    assert_eq!(charset::resolve(&HttpMethod::Post, None, None), Charset::default());
}

#[test]
fn ascii_decoding_replaces_high_bytes() {
    assert_eq!(Charset::Ascii.decode(b"a\xffb"), "a\u{FFFD}b");
    assert_eq!(Charset::Utf8.decode("héllo".as_bytes()), "héllo");
}

#[test]
fn forced_encoding_param_is_read() {
    let params = DeploymentParams::new().with(FORCED_ENCODING, "ISO-8859-1");
    let resolved = charset::resolve(&HttpMethod::Post, None, params.forced_encoding());
    assert_eq!(resolved.name(), "ISO-8859-1");
}
