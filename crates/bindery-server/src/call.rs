//! Procedure-call extraction for each wire format.
//!
//! REST reads `&`-joined `key=value` pairs from the query (GET) or a
//! form-encoded body (POST). JSON reads a flat object body. SOAP calls come
//! ready-made from the envelope codec. In every format a repeated key keeps
//! its last value.

use bindery_protocol::{BinderyError, DeploymentParams, HttpMethod, HttpRequest, ProcedureCall};
use indexmap::IndexMap;
use serde_json::Value;

use crate::charset::Charset;
use crate::message::{SoapBody, TypedRequest};

/// MIME type of form-encoded bodies.
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Parameter carrying the procedure name in legacy REST clients.
pub const LEGACY_METHOD_PARAM: &str = "method";

/// Build the call carried by `request`.
pub fn build(request: &TypedRequest, params: &DeploymentParams) -> Result<ProcedureCall, BinderyError> {
    match request {
        TypedRequest::Rest { http } => build_rest(http, params),
        TypedRequest::Json { http, charset } => build_json(http, *charset),
        TypedRequest::Soap { body: SoapBody::Call(call), .. } => Ok(call.clone()),
        TypedRequest::Soap { body: SoapBody::Description, .. } => Err(BinderyError::parse(
            "Service description requests carry no procedure call",
        )),
    }
}

/// Procedure name from a resource path: the text after the final `/` and
/// before any `?`. Empty names do not count.
pub fn procedure_name(resource_path: &str) -> Option<&str> {
    let path = resource_path.split('?').next().unwrap_or("");
    let name = path.rsplit('/').next().unwrap_or("");
    (!name.is_empty()).then_some(name)
}

/// Parse `&`-joined `key=value` pairs, percent-decoding both sides.
pub fn parse_form(input: &[u8], into: &mut IndexMap<String, String>) {
    for (key, value) in url::form_urlencoded::parse(input) {
        if key.is_empty() {
            continue;
        }
        into.insert(key.into_owned(), value.into_owned());
    }
}

pub fn build_rest(request: &HttpRequest, params: &DeploymentParams) -> Result<ProcedureCall, BinderyError> {
    let mut parameters = IndexMap::new();
    match request.method {
        HttpMethod::Get => {
            if let Some(query) = &request.query {
                parse_form(query.as_bytes(), &mut parameters);
            }
        }
        HttpMethod::Post => {
            if request.content_type().as_deref() == Some(FORM_URLENCODED) {
                parse_form(&request.body, &mut parameters);
            }
        }
        HttpMethod::Other(_) => {}
    }

    let name = match procedure_name(&request.path) {
        Some(name) => name.to_string(),
        None if params.legacy_method_names() => parameters
            .get(LEGACY_METHOD_PARAM)
            .and_then(|qualified| legacy_name(qualified))
            .ok_or_else(|| unresolved(&request.path))?,
        None => return Err(unresolved(&request.path)),
    };

    Ok(ProcedureCall::new(name).with_parameters(parameters))
}

pub fn build_json(request: &HttpRequest, charset: Charset) -> Result<ProcedureCall, BinderyError> {
    let name = procedure_name(&request.path).ok_or_else(|| unresolved(&request.path))?;

    let text = charset.decode(&request.body);
    if text.trim().is_empty() {
        return Ok(ProcedureCall::new(name));
    }

    // Duplicate keys overwrite in place, so the last occurrence wins.
    let fields: IndexMap<String, Value> = serde_json::from_str(&text)
        .map_err(|e| BinderyError::parse(format!("Unreadable JSON body: {e}")))?;

    let parameters = fields
        .into_iter()
        .map(|(key, value)| (key, flatten(value)))
        .collect();
    Ok(ProcedureCall::new(name).with_parameters(parameters))
}

fn legacy_name(qualified: &str) -> Option<String> {
    let name = qualified.rsplit('.').next().unwrap_or("");
    (!name.is_empty()).then(|| name.to_string())
}

fn unresolved(path: &str) -> BinderyError {
    BinderyError::parse(format!("No procedure name in request path {path:?}"))
}

/// Field value as parameter text. Non-string values keep their JSON text.
fn flatten(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
