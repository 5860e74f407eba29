//! Per-exchange connection state.

use std::sync::atomic::{AtomicBool, Ordering};

use bindery_protocol::Connection;

/// The connection an HTTP exchange arrived on, as seen by the dispatch core.
///
/// Closing it does not tear down the socket immediately: the transport
/// answers with `Connection: close` and hyper drops the connection after
/// the response has been flushed.
#[derive(Debug)]
pub struct HttpConnection {
    /// Unique exchange ID
    pub id: String,
    /// Whether the request arrived over HTTP/1.x (where `Connection` is legal)
    pub http1: bool,
    closed: AtomicBool,
}

impl HttpConnection {
    pub fn new(http1: bool) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            http1,
            closed: AtomicBool::new(false),
        }
    }
}

impl Connection for HttpConnection {
    fn id(&self) -> &str {
        &self.id
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
