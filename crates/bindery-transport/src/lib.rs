//! Bindery Transport Layer
//!
//! Provides the HTTP listener in front of the dispatch core.
//! The transport layer handles:
//! - Buffering request bodies (bounded by `max_body_bytes`)
//! - Converting between Axum types and the raw exchange types
//! - Honouring connection-close decisions made by the core
//! - A `/health` endpoint
//!
//! The transport is decoupled from the dispatch core via the `RequestHandler` trait.

pub mod connection;
pub mod server;

pub use connection::HttpConnection;
pub use server::{RequestHandler, TransportConfig, TransportServer, router};
