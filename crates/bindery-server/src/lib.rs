//! Bindery Server — routes raw exchanges to bindlets.
//!
//! The dispatcher owns the context router and one adapter per protocol,
//! and provides the `RequestHandler` implementation for the transport layer.
//! Each exchange is translated into a protocol-typed event, routed to a
//! bindlet, and finalized by the adapter that translated it.

pub mod adapter;
pub mod bindlet;
pub mod call;
pub mod charset;
pub mod marshal;
pub mod message;
pub mod pattern;
pub mod router;
pub mod rpc;
pub mod server;
pub mod store;

pub use adapter::{EnvelopeCodec, JsonAdapter, ProtocolAdapter, RestAdapter, SoapAdapter};
pub use bindlet::{Bindlet, BindletScope};
pub use message::{Protocol, RequestEvent, SoapBody, TypedRequest, TypedResponse};
pub use router::{Context, ContextRouter, Registration, Resolution, RouteTable, Routed};
pub use rpc::{AuthStrategy, MethodOptions, MethodTable, RpcBindlet, TokenAuth};
pub use server::{Dispatcher, DispatcherConfig};
pub use store::SharedObjectStore;
