//! Protocol adapters.
//!
//! An adapter turns a raw exchange into a [`RequestEvent`] for its protocol
//! and finalizes the exchange once dispatch is over. Finalization is shared
//! by all protocols and lives in the trait's provided methods; only the
//! selection predicate, translation and marshaler differ.

pub mod json;
pub mod rest;
pub mod soap;

use bindery_protocol::{
    BinderyError, Connection, HttpMethod, HttpRequest, HttpResponse, Status,
};
use tracing::debug;

use crate::marshal::Marshaler;
use crate::message::{Protocol, RequestEvent};

pub use json::JsonAdapter;
pub use rest::RestAdapter;
pub use soap::{EnvelopeCodec, SoapAdapter};

/// Translation and finalization for one wire protocol.
pub trait ProtocolAdapter: Send + Sync {
    fn protocol(&self) -> Protocol;

    /// Whether a raw request looks like this protocol. Consulted once per
    /// request, before [`ProtocolAdapter::translate`].
    fn accepts(&self, request: &HttpRequest) -> bool;

    /// Build the typed event for a raw exchange. A missing response is
    /// replaced by a `200 OK` shell.
    fn translate(
        &self,
        request: Option<HttpRequest>,
        response: Option<HttpResponse>,
        connection: &dyn Connection,
    ) -> Result<RequestEvent, BinderyError>;

    fn marshaler(&self) -> &dyn Marshaler;

    /// Finalize a dispatch that completed without error.
    fn on_success(&self, event: &mut RequestEvent, connection: &dyn Connection) {
        if !event.handled() {
            debug!("{} {}: no bindlet handled the request", connection.id(), event.request.resource_path());
            event.response.set_status(Status::NOT_FOUND);
        } else if !event.response.is_closed() {
            event.response.close();
        }
        close_unless_keep_alive(event, connection);
    }

    /// Finalize a failed dispatch. Never fails itself.
    fn on_error(&self, event: &mut RequestEvent, connection: &dyn Connection, error: &BinderyError) {
        debug!("{} {}: dispatch failed: {error}", connection.id(), event.request.resource_path());
        event.response.set_status(Status::INTERNAL_SERVER_ERROR);
        self.marshaler().write_failure(&mut event.response, error);
        close_unless_keep_alive(event, connection);
    }
}

/// Unwrap the raw request, rejecting absent requests and methods no
/// protocol here can carry.
pub(crate) fn require_request(
    request: Option<HttpRequest>,
    protocol: Protocol,
) -> Result<HttpRequest, BinderyError> {
    let request = request
        .ok_or_else(|| BinderyError::adapter(format!("No request to translate for {protocol}")))?;
    if let HttpMethod::Other(method) = &request.method {
        return Err(BinderyError::adapter(format!(
            "{protocol} adapter cannot carry {method} requests"
        )));
    }
    Ok(request)
}

pub(crate) fn response_shell(response: Option<HttpResponse>) -> HttpResponse {
    response.unwrap_or_else(HttpResponse::ok)
}

fn close_unless_keep_alive(event: &RequestEvent, connection: &dyn Connection) {
    if !event.request.keep_alive() {
        debug!("{}: closing connection after response", connection.id());
        connection.close();
    }
}
