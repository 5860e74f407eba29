//! Flat-JSON RPC adapter.

use std::sync::Arc;

use bindery_protocol::{
    BinderyError, Connection, DeploymentParams, HttpMethod, HttpRequest, HttpResponse,
};
use tracing::trace;

use super::{ProtocolAdapter, require_request, response_shell};
use crate::charset;
use crate::marshal::{JsonMarshaler, Marshaler};
use crate::message::{Protocol, RequestEvent, TypedRequest, TypedResponse};

pub struct JsonAdapter {
    params: Arc<DeploymentParams>,
    marshaler: JsonMarshaler,
}

impl JsonAdapter {
    pub fn new(params: Arc<DeploymentParams>) -> Self {
        Self {
            params,
            marshaler: JsonMarshaler,
        }
    }
}

impl ProtocolAdapter for JsonAdapter {
    fn protocol(&self) -> Protocol {
        Protocol::Json
    }

    /// Any GET; POST with no content type or a JSON one.
    fn accepts(&self, request: &HttpRequest) -> bool {
        match request.method {
            HttpMethod::Get => true,
            HttpMethod::Post => matches!(
                request.content_type().as_deref(),
                None | Some("application/json") | Some("text/json")
            ),
            HttpMethod::Other(_) => false,
        }
    }

    fn translate(
        &self,
        request: Option<HttpRequest>,
        response: Option<HttpResponse>,
        connection: &dyn Connection,
    ) -> Result<RequestEvent, BinderyError> {
        let http = require_request(request, Protocol::Json)?;
        let charset = charset::resolve(
            &http.method,
            http.character_encoding().as_deref(),
            self.params.forced_encoding(),
        );
        trace!("{}: JSON {} {} ({})", connection.id(), http.method, http.target(), charset.name());
        Ok(RequestEvent::new(
            TypedRequest::Json { http, charset },
            TypedResponse::new(Protocol::Json, response_shell(response)),
        ))
    }

    fn marshaler(&self) -> &dyn Marshaler {
        &self.marshaler
    }
}
