//! Protocol-typed request/response pair and the per-request event.

use bindery_protocol::{
    BinderyError, HttpMethod, HttpRequest, HttpResponse, ProcedureCall, Status,
};

use crate::charset::Charset;

/// Wire protocols spoken by contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Rest,
    Json,
    Soap,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rest => "rest",
            Self::Json => "json",
            Self::Soap => "soap",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "rest" => Some(Self::Rest),
            "json" => Some(Self::Json),
            "soap" => Some(Self::Soap),
            _ => None,
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a SOAP request asks for once its envelope has been read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoapBody {
    /// A call unmarshalled from the envelope.
    Call(ProcedureCall),
    /// The `?wsdl` service description.
    Description,
}

/// A request after protocol translation.
#[derive(Debug, Clone)]
pub enum TypedRequest {
    Rest { http: HttpRequest },
    Json { http: HttpRequest, charset: Charset },
    Soap { http: HttpRequest, body: SoapBody },
}

impl TypedRequest {
    pub fn protocol(&self) -> Protocol {
        match self {
            Self::Rest { .. } => Protocol::Rest,
            Self::Json { .. } => Protocol::Json,
            Self::Soap { .. } => Protocol::Soap,
        }
    }

    pub fn http(&self) -> &HttpRequest {
        match self {
            Self::Rest { http } | Self::Json { http, .. } | Self::Soap { http, .. } => http,
        }
    }

    pub fn resource_path(&self) -> &str {
        &self.http().path
    }

    pub fn query_string(&self) -> Option<&str> {
        self.http().query.as_deref()
    }

    pub fn http_method(&self) -> &HttpMethod {
        &self.http().method
    }

    /// Effective character encoding of the body.
    pub fn character_encoding(&self) -> Option<String> {
        match self {
            Self::Json { charset, .. } => Some(charset.name().to_string()),
            other => other.http().character_encoding(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.http().header(name)
    }

    pub fn body(&self) -> &[u8] {
        &self.http().body
    }

    pub fn keep_alive(&self) -> bool {
        self.http().keep_alive()
    }

    pub fn is_description_request(&self) -> bool {
        matches!(self, Self::Soap { body: SoapBody::Description, .. })
    }
}

/// The response half of a translated exchange.
#[derive(Debug)]
pub struct TypedResponse {
    protocol: Protocol,
    http: HttpResponse,
}

impl TypedResponse {
    pub fn new(protocol: Protocol, http: HttpResponse) -> Self {
        Self { protocol, http }
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn status(&self) -> Status {
        self.http.status()
    }

    pub fn set_status(&mut self, status: Status) {
        self.http.set_status(status);
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.http.header(name)
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.http.set_header(name, value);
    }

    pub fn set_content_type(&mut self, content_type: &str) {
        self.http.set_header("Content-Type", content_type);
    }

    pub fn set_content_length(&mut self, length: usize) {
        self.http.set_header("Content-Length", length.to_string());
    }

    /// Set the `charset` parameter of the current content type.
    pub fn set_character_encoding(&mut self, charset: Charset) {
        let mime = self
            .http
            .header("content-type")
            .map(|v| bindery_protocol::http::split_content_type(v).0)
            .unwrap_or_else(|| "text/plain".to_string());
        self.http
            .set_header("Content-Type", format!("{mime}; charset={}", charset.name()));
    }

    pub fn write(&mut self, bytes: &[u8]) -> Result<(), BinderyError> {
        self.http.write(bytes).map_err(BinderyError::from)
    }

    pub fn bytes_written(&self) -> usize {
        self.http.bytes_written()
    }

    pub fn body(&self) -> &[u8] {
        self.http.body()
    }

    pub fn is_closed(&self) -> bool {
        self.http.is_closed()
    }

    pub fn close(&mut self) {
        self.http.close();
    }

    pub fn into_http(self) -> HttpResponse {
        self.http
    }
}

/// One translated exchange travelling through the dispatch pipeline.
#[derive(Debug)]
pub struct RequestEvent {
    pub request: TypedRequest,
    pub response: TypedResponse,
    handled: bool,
}

impl RequestEvent {
    pub fn new(request: TypedRequest, response: TypedResponse) -> Self {
        Self {
            request,
            response,
            handled: false,
        }
    }

    pub fn handled(&self) -> bool {
        self.handled
    }

    /// Record that a registration processed this event. There is no way back.
    pub fn mark_handled(&mut self) {
        self.handled = true;
    }

    pub fn into_response(self) -> HttpResponse {
        self.response.into_http()
    }
}
