//! SOAP adapter. Envelope parsing and production belong to an
//! [`EnvelopeCodec`] supplied by the deployment.

use std::sync::Arc;

use bindery_protocol::{
    BinderyError, BoxError, Connection, HttpRequest, HttpResponse, ProcedureCall,
};
use serde_json::Value;
use tracing::trace;

use super::{ProtocolAdapter, require_request, response_shell};
use crate::marshal::{Marshaler, SoapMarshaler};
use crate::message::{Protocol, RequestEvent, SoapBody, TypedRequest, TypedResponse};

/// Suffix of service description requests.
pub const DESCRIPTION_SUFFIX: &str = "?wsdl";

/// SOAP envelope (un)marshalling.
pub trait EnvelopeCodec: Send + Sync {
    /// Read the call carried by a request envelope.
    fn unmarshal(&self, envelope: &[u8]) -> Result<ProcedureCall, BoxError>;

    fn marshal_result(&self, name: &str, value: &Value) -> Result<Vec<u8>, BoxError>;

    fn marshal_fault(&self, message: &str) -> Result<Vec<u8>, BoxError>;

    /// Service description document advertising `operations`.
    fn describe(&self, operations: &[String]) -> Result<Vec<u8>, BoxError>;
}

/// Whether `request` asks for the service description, whatever its method.
pub fn is_description_request(request: &HttpRequest) -> bool {
    request.target().ends_with(DESCRIPTION_SUFFIX)
}

pub struct SoapAdapter {
    codec: Arc<dyn EnvelopeCodec>,
    marshaler: SoapMarshaler,
}

impl SoapAdapter {
    pub fn new(codec: Arc<dyn EnvelopeCodec>) -> Self {
        Self {
            marshaler: SoapMarshaler::new(codec.clone()),
            codec,
        }
    }
}

impl ProtocolAdapter for SoapAdapter {
    fn protocol(&self) -> Protocol {
        Protocol::Soap
    }

    fn accepts(&self, request: &HttpRequest) -> bool {
        is_description_request(request)
            || matches!(
                request.content_type().as_deref(),
                Some("text/xml") | Some("application/soap+xml")
            )
    }

    fn translate(
        &self,
        request: Option<HttpRequest>,
        response: Option<HttpResponse>,
        connection: &dyn Connection,
    ) -> Result<RequestEvent, BinderyError> {
        let http = require_request(request, Protocol::Soap)?;
        let body = if is_description_request(&http) {
            SoapBody::Description
        } else {
            let call = self
                .codec
                .unmarshal(&http.body)
                .map_err(|e| BinderyError::adapter(format!("Unreadable SOAP envelope: {e}")))?;
            SoapBody::Call(call)
        };
        trace!("{}: SOAP {} {}", connection.id(), http.method, http.target());
        Ok(RequestEvent::new(
            TypedRequest::Soap { http, body },
            TypedResponse::new(Protocol::Soap, response_shell(response)),
        ))
    }

    fn marshaler(&self) -> &dyn Marshaler {
        &self.marshaler
    }
}
