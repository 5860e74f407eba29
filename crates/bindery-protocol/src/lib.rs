//! Bindery protocol types
//!
//! Types shared by the transport and the dispatch core: the raw buffered
//! HTTP exchange, the wire-independent procedure call, per-deployment
//! parameters and the pipeline's error model.

pub mod call;
pub mod error;
pub mod http;
pub mod params;

pub use call::ProcedureCall;
pub use error::{BinderyError, BoxError, ErrorKind, innermost_message};
pub use http::{Connection, Headers, HttpMethod, HttpRequest, HttpResponse, Status};
pub use params::DeploymentParams;
