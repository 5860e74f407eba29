//! Bindery error types and the failure kinds the dispatch pipeline distinguishes.

use thiserror::Error;

/// Error type returned by procedure handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The four failure kinds of the dispatch pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unresolvable procedure name or unreadable body.
    ParseFailure,
    /// Missing or unsuitable raw request during translation.
    AdapterFailure,
    /// A handler failed while executing.
    DispatchFailure,
    /// I/O failure while emitting a response body.
    WriteFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ParseFailure => "ParseFailure",
            Self::AdapterFailure => "AdapterFailure",
            Self::DispatchFailure => "DispatchFailure",
            Self::WriteFailure => "WriteFailure",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline error. `Display` yields the bare message so it can be placed
/// straight into an error envelope.
#[derive(Debug, Error)]
pub enum BinderyError {
    #[error("{0}")]
    Parse(String),

    #[error("{0}")]
    Adapter(String),

    #[error("{message}")]
    Dispatch {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("failed to write response body: {0}")]
    Write(#[from] std::io::Error),
}

impl BinderyError {
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    pub fn adapter(message: impl Into<String>) -> Self {
        Self::Adapter(message.into())
    }

    pub fn dispatch(message: impl Into<String>) -> Self {
        Self::Dispatch {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap a handler failure, keeping it reachable through `source()`.
    pub fn dispatch_from(message: impl Into<String>, source: BoxError) -> Self {
        Self::Dispatch {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn method_not_found(name: &str) -> Self {
        Self::dispatch(format!("Method not found: {name}"))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Parse(_) => ErrorKind::ParseFailure,
            Self::Adapter(_) => ErrorKind::AdapterFailure,
            Self::Dispatch { .. } => ErrorKind::DispatchFailure,
            Self::Write(_) => ErrorKind::WriteFailure,
        }
    }
}

/// Message of the innermost cause in `error`'s source chain that has a
/// non-empty message. Falls back to the outermost message, which may itself
/// be empty.
pub fn innermost_message(error: &(dyn std::error::Error + 'static)) -> String {
    let mut found = error.to_string();
    let mut current = error.source();
    while let Some(cause) = current {
        let message = cause.to_string();
        if !message.trim().is_empty() {
            found = message;
        }
        current = cause.source();
    }
    found
}
