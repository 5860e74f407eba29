//! Encoding of return values and failures into typed responses.
//!
//! Every write is best effort: encoding or I/O failures are logged and
//! swallowed, and the response is closed exactly once afterwards whatever
//! happened. A response that is closed or already carries bytes is never
//! written to again.

use std::sync::Arc;

use bindery_protocol::{BinderyError, Status, innermost_message};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::adapter::soap::EnvelopeCodec;
use crate::message::TypedResponse;

pub const TEXT_XML: &str = "text/xml";
pub const APPLICATION_JSON: &str = "application/json";

/// Protocol-specific encoding of call outcomes.
pub trait Marshaler: Send + Sync {
    /// Content type of every body this marshaler produces.
    fn content_type(&self) -> &str;

    fn encode_result(&self, name: &str, value: &Value) -> Result<Vec<u8>, BinderyError>;

    fn encode_failure(&self, message: &str) -> Result<Vec<u8>, BinderyError>;

    /// Service description listing `operations`. Only protocols that publish
    /// one override this.
    fn encode_description(&self, _operations: &[String]) -> Option<Result<Vec<u8>, BinderyError>> {
        None
    }

    /// Write a successful return value.
    fn write_result(&self, response: &mut TypedResponse, name: &str, value: &Value) {
        if writable(response) {
            let body = self.encode_result(name, value);
            write_body(response, self.content_type(), body);
        }
        finish(response);
    }

    /// Write a failure. The status is set before any body is attempted.
    fn write_failure(&self, response: &mut TypedResponse, error: &(dyn std::error::Error + 'static)) {
        response.set_status(Status::INTERNAL_SERVER_ERROR);
        if writable(response) {
            let message = innermost_message(error);
            let body = self.encode_failure(&message);
            write_body(response, self.content_type(), body);
        }
        finish(response);
    }

    /// Write the service description. Returns `false` when the protocol has
    /// none, leaving the response untouched.
    fn write_description(&self, response: &mut TypedResponse, operations: &[String]) -> bool {
        let Some(body) = self.encode_description(operations) else {
            return false;
        };
        if writable(response) {
            write_body(response, self.content_type(), body);
        }
        finish(response);
        true
    }
}

fn writable(response: &TypedResponse) -> bool {
    !response.is_closed() && response.bytes_written() == 0
}

fn write_body(response: &mut TypedResponse, content_type: &str, body: Result<Vec<u8>, BinderyError>) {
    let outcome = body.and_then(|bytes| {
        response.set_content_type(content_type);
        response.write(&bytes)?;
        response.set_content_length(bytes.len());
        Ok(())
    });
    if let Err(e) = outcome {
        warn!("Dropping {} response body: {e}", response.protocol());
    }
}

fn finish(response: &mut TypedResponse) {
    if !response.is_closed() {
        response.close();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// REST
// ─────────────────────────────────────────────────────────────────────────────

/// `<Name><url>VALUE</url></Name>` and `<error><message>MSG</message></error>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RestMarshaler;

impl Marshaler for RestMarshaler {
    fn content_type(&self) -> &str {
        TEXT_XML
    }

    fn encode_result(&self, name: &str, value: &Value) -> Result<Vec<u8>, BinderyError> {
        let tag = element_name(name);
        let text = match value {
            Value::String(s) => escape_xml(s),
            Value::Null => String::new(),
            other => escape_xml(&other.to_string()),
        };
        Ok(format!("<{tag}><url>{text}</url></{tag}>").into_bytes())
    }

    fn encode_failure(&self, message: &str) -> Result<Vec<u8>, BinderyError> {
        Ok(format!("<error><message>{}</message></error>", escape_xml(message)).into_bytes())
    }
}

/// Escape character data for inclusion in an XML element.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Coerce a procedure name into a usable XML element name.
fn element_name(name: &str) -> String {
    let mut tag: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') { c } else { '_' })
        .collect();
    if !tag.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        tag.insert(0, '_');
    }
    tag
}

// ─────────────────────────────────────────────────────────────────────────────
// JSON
// ─────────────────────────────────────────────────────────────────────────────

/// `{"result":"OK","return":VALUE}` and `{"result":"ERROR","message":MSG}`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonMarshaler;

#[derive(Serialize)]
struct JsonEnvelope<'a> {
    result: &'static str,
    #[serde(rename = "return", skip_serializing_if = "Option::is_none")]
    value: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
}

impl Marshaler for JsonMarshaler {
    fn content_type(&self) -> &str {
        APPLICATION_JSON
    }

    fn encode_result(&self, _name: &str, value: &Value) -> Result<Vec<u8>, BinderyError> {
        let envelope = JsonEnvelope { result: "OK", value: Some(value), message: None };
        serde_json::to_vec(&envelope).map_err(|e| BinderyError::from(std::io::Error::from(e)))
    }

    fn encode_failure(&self, message: &str) -> Result<Vec<u8>, BinderyError> {
        let envelope = JsonEnvelope { result: "ERROR", value: None, message: Some(message) };
        serde_json::to_vec(&envelope).map_err(|e| BinderyError::from(std::io::Error::from(e)))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SOAP
// ─────────────────────────────────────────────────────────────────────────────

/// Delegates envelope production to the configured codec.
#[derive(Clone)]
pub struct SoapMarshaler {
    codec: Arc<dyn EnvelopeCodec>,
}

impl SoapMarshaler {
    pub fn new(codec: Arc<dyn EnvelopeCodec>) -> Self {
        Self { codec }
    }
}

impl Marshaler for SoapMarshaler {
    fn content_type(&self) -> &str {
        TEXT_XML
    }

    fn encode_result(&self, name: &str, value: &Value) -> Result<Vec<u8>, BinderyError> {
        self.codec
            .marshal_result(name, value)
            .map_err(|e| BinderyError::dispatch_from("SOAP result encoding failed", e))
    }

    fn encode_failure(&self, message: &str) -> Result<Vec<u8>, BinderyError> {
        self.codec
            .marshal_fault(message)
            .map_err(|e| BinderyError::dispatch_from("SOAP fault encoding failed", e))
    }

    fn encode_description(&self, operations: &[String]) -> Option<Result<Vec<u8>, BinderyError>> {
        Some(
            self.codec
                .describe(operations)
                .map_err(|e| BinderyError::dispatch_from("Service description failed", e)),
        )
    }
}
