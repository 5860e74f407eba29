//! Form-encoded REST adapter.

use bindery_protocol::{BinderyError, Connection, HttpMethod, HttpRequest, HttpResponse};
use tracing::trace;

use super::{ProtocolAdapter, require_request, response_shell};
use crate::marshal::{Marshaler, RestMarshaler};
use crate::message::{Protocol, RequestEvent, TypedRequest, TypedResponse};

#[derive(Debug, Default)]
pub struct RestAdapter {
    marshaler: RestMarshaler,
}

impl RestAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProtocolAdapter for RestAdapter {
    fn protocol(&self) -> Protocol {
        Protocol::Rest
    }

    fn accepts(&self, request: &HttpRequest) -> bool {
        matches!(request.method, HttpMethod::Get | HttpMethod::Post)
    }

    fn translate(
        &self,
        request: Option<HttpRequest>,
        response: Option<HttpResponse>,
        connection: &dyn Connection,
    ) -> Result<RequestEvent, BinderyError> {
        let http = require_request(request, Protocol::Rest)?;
        trace!("{}: REST {} {}", connection.id(), http.method, http.target());
        Ok(RequestEvent::new(
            TypedRequest::Rest { http },
            TypedResponse::new(Protocol::Rest, response_shell(response)),
        ))
    }

    fn marshaler(&self) -> &dyn Marshaler {
        &self.marshaler
    }
}
