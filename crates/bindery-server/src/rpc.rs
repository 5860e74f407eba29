//! Procedure-exposing bindlet backed by an explicit method table.
//!
//! The table is assembled at startup through [`MethodTableBuilder`]; each
//! entry records its handler and whether it requires authentication and is
//! advertised in the service description.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bindery_protocol::{BinderyError, BoxError, ProcedureCall};
use serde_json::Value;
use tracing::{debug, warn};

use crate::bindlet::{Bindlet, BindletScope};
use crate::call;
use crate::message::{RequestEvent, TypedRequest};

/// Future returned by procedure handlers.
pub type MethodFuture = Pin<Box<dyn Future<Output = Result<Value, BoxError>> + Send>>;

/// A procedure handler.
pub type MethodFn = Arc<dyn Fn(ProcedureCall) -> MethodFuture + Send + Sync>;

/// Exposure flags of a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodOptions {
    /// Callers must pass the bindlet's [`AuthStrategy`]
    pub requires_auth: bool,
    /// Listed in the service description
    pub exported: bool,
}

impl Default for MethodOptions {
    fn default() -> Self {
        Self {
            requires_auth: false,
            exported: true,
        }
    }
}

impl MethodOptions {
    pub fn secure(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    pub fn unlisted(mut self) -> Self {
        self.exported = false;
        self
    }
}

#[derive(Clone)]
pub struct MethodEntry {
    handler: MethodFn,
    pub options: MethodOptions,
}

/// Immutable name → method mapping.
#[derive(Clone, Default)]
pub struct MethodTable {
    methods: BTreeMap<String, MethodEntry>,
}

impl MethodTable {
    pub fn builder() -> MethodTableBuilder {
        MethodTableBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&MethodEntry> {
        self.methods.get(name)
    }

    /// Names of exported methods, sorted.
    pub fn exported(&self) -> Vec<String> {
        self.methods
            .iter()
            .filter(|(_, entry)| entry.options.exported)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

#[derive(Default)]
pub struct MethodTableBuilder {
    methods: BTreeMap<String, MethodEntry>,
}

impl MethodTableBuilder {
    /// Add a public, exported method.
    pub fn method<F, Fut>(self, name: &str, handler: F) -> Self
    where
        F: Fn(ProcedureCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
    {
        self.method_with(name, MethodOptions::default(), handler)
    }

    /// Add a method with explicit exposure flags. A later method with the
    /// same name replaces an earlier one.
    pub fn method_with<F, Fut>(mut self, name: &str, options: MethodOptions, handler: F) -> Self
    where
        F: Fn(ProcedureCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
    {
        let handler: MethodFn = Arc::new(move |call| -> MethodFuture { Box::pin(handler(call)) });
        if self
            .methods
            .insert(name.to_string(), MethodEntry { handler, options })
            .is_some()
        {
            warn!("Method {name} registered twice; keeping the later handler");
        }
        self
    }

    pub fn build(self) -> MethodTable {
        MethodTable {
            methods: self.methods,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authentication
// ─────────────────────────────────────────────────────────────────────────────

/// Predicate deciding whether a request may call secure methods.
pub trait AuthStrategy: Send + Sync {
    fn authenticate(&self, request: &TypedRequest) -> bool;
}

/// Rejects every request.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenyAll;

impl AuthStrategy for DenyAll {
    fn authenticate(&self, _request: &TypedRequest) -> bool {
        false
    }
}

/// Shared-secret authentication via `Authorization: Bearer <token>` or
/// `X-Auth-Token: <token>`.
#[derive(Debug, Clone)]
pub struct TokenAuth {
    token: String,
}

impl TokenAuth {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

impl AuthStrategy for TokenAuth {
    fn authenticate(&self, request: &TypedRequest) -> bool {
        let bearer = request
            .header("authorization")
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim);
        let header = request.header("x-auth-token").map(str::trim);
        bearer.or(header).is_some_and(|t| t == self.token)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RpcBindlet
// ─────────────────────────────────────────────────────────────────────────────

/// Builds a procedure call from the request, invokes the matching method
/// and marshals the outcome. Parse and dispatch failures are written as
/// error envelopes, never returned.
pub struct RpcBindlet {
    name: String,
    methods: MethodTable,
    auth: Arc<dyn AuthStrategy>,
}

impl RpcBindlet {
    /// A bindlet whose secure methods are unreachable until an
    /// [`AuthStrategy`] is supplied.
    pub fn new(name: impl Into<String>, methods: MethodTable) -> Self {
        Self {
            name: name.into(),
            methods,
            auth: Arc::new(DenyAll),
        }
    }

    pub fn with_auth(mut self, auth: impl AuthStrategy + 'static) -> Self {
        self.auth = Arc::new(auth);
        self
    }

    pub fn methods(&self) -> &MethodTable {
        &self.methods
    }

    /// Resolve and run the call carried by `request`.
    pub async fn invoke(&self, request: &TypedRequest, call: ProcedureCall) -> Result<Value, BinderyError> {
        let entry = self
            .methods
            .get(call.name())
            .ok_or_else(|| BinderyError::method_not_found(call.name()))?;

        if entry.options.requires_auth && !self.auth.authenticate(request) {
            return Err(BinderyError::dispatch(format!(
                "Authentication required for {}",
                call.name()
            )));
        }

        let name = call.name().to_string();
        (entry.handler)(call)
            .await
            .map_err(|e| BinderyError::dispatch_from(format!("{name} failed"), e))
    }
}

impl Bindlet for RpcBindlet {
    fn name(&self) -> &str {
        &self.name
    }

    async fn service(&self, event: &mut RequestEvent, scope: &BindletScope<'_>) -> Result<(), BinderyError> {
        if event.request.is_description_request() {
            let operations = self.methods.exported();
            if !scope.marshaler.write_description(&mut event.response, &operations) {
                scope
                    .marshaler
                    .write_failure(&mut event.response, &BinderyError::parse("No service description"));
            }
            return Ok(());
        }

        let call = match call::build(&event.request, scope.params) {
            Ok(call) => call,
            Err(e) => {
                debug!("{}: {e}", self.name);
                scope.marshaler.write_failure(&mut event.response, &e);
                return Ok(());
            }
        };

        let name = call.name().to_string();
        match self.invoke(&event.request, call).await {
            Ok(value) => scope.marshaler.write_result(&mut event.response, &name, &value),
            Err(e) => {
                debug!("{}: {name}: {e}", self.name);
                scope.marshaler.write_failure(&mut event.response, &e);
            }
        }
        Ok(())
    }
}
