//! Test doubles shared by the server test suites.

#![allow(dead_code)]

use bindery_protocol::{BoxError, ProcedureCall};
use bindery_server::EnvelopeCodec;
use serde_json::Value;

/// Plain-text stand-in for a SOAP envelope: `name?k=v&k=v`.
pub struct LineCodec;

impl EnvelopeCodec for LineCodec {
    fn unmarshal(&self, envelope: &[u8]) -> Result<ProcedureCall, BoxError> {
        let text = std::str::from_utf8(envelope)?.trim();
        let (name, query) = text.split_once('?').unwrap_or((text, ""));
        if name.is_empty() {
            return Err("envelope names no operation".into());
        }
        let mut call = ProcedureCall::new(name);
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            call.insert(k, v);
        }
        Ok(call)
    }

    fn marshal_result(&self, name: &str, value: &Value) -> Result<Vec<u8>, BoxError> {
        Ok(format!("<Envelope><{name}Response>{value}</{name}Response></Envelope>").into_bytes())
    }

    fn marshal_fault(&self, message: &str) -> Result<Vec<u8>, BoxError> {
        Ok(format!("<Envelope><Fault>{message}</Fault></Envelope>").into_bytes())
    }

    fn describe(&self, operations: &[String]) -> Result<Vec<u8>, BoxError> {
        Ok(format!("<definitions>{}</definitions>", operations.join(",")).into_bytes())
    }
}

pub fn body_text(body: &[u8]) -> String {
    String::from_utf8_lossy(body).into_owned()
}
