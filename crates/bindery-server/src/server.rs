//! Dispatcher — drives one raw exchange through the pipeline:
//! route → adapt → invoke bindlet → finalize.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bindery_protocol::{
    BinderyError, Connection, DeploymentParams, HttpRequest, HttpResponse, Status,
};
use bindery_transport::RequestHandler;
use tracing::{debug, info, warn};

use crate::adapter::{EnvelopeCodec, JsonAdapter, ProtocolAdapter, RestAdapter, SoapAdapter};
use crate::bindlet::BindletScope;
use crate::message::{Protocol, RequestEvent};
use crate::router::{Context, ContextRouter, Resolution};

/// Dispatcher tunables.
#[derive(Debug, Clone, Default)]
pub struct DispatcherConfig {
    /// Upper bound on a single bindlet invocation
    pub handler_timeout: Option<Duration>,
    /// Cap on response bodies; writes beyond it are dropped
    pub max_response_bytes: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServerState {
    Uninitialized,
    Running,
    Shutdown,
}

/// The dispatch core — owns contexts and adapters and answers exchanges.
pub struct Dispatcher {
    router: ContextRouter,
    adapters: HashMap<Protocol, Arc<dyn ProtocolAdapter>>,
    params: Arc<DeploymentParams>,
    config: DispatcherConfig,
    state: ServerState,
}

impl Dispatcher {
    /// A dispatcher speaking REST and JSON. SOAP is enabled by
    /// [`Dispatcher::with_envelope_codec`].
    pub fn new(params: DeploymentParams, config: DispatcherConfig) -> Self {
        let params = Arc::new(params);
        let mut adapters: HashMap<Protocol, Arc<dyn ProtocolAdapter>> = HashMap::new();
        adapters.insert(Protocol::Rest, Arc::new(RestAdapter::new()));
        adapters.insert(Protocol::Json, Arc::new(JsonAdapter::new(params.clone())));

        Self {
            router: ContextRouter::new(),
            adapters,
            params,
            config,
            state: ServerState::Uninitialized,
        }
    }

    pub fn with_envelope_codec(mut self, codec: Arc<dyn EnvelopeCodec>) -> Self {
        self.adapters
            .insert(Protocol::Soap, Arc::new(SoapAdapter::new(codec)));
        self
    }

    /// Add a context. Contexts are matched in the order they were added.
    pub fn add_context(
        &self,
        name: impl Into<String>,
        pattern: impl Into<String>,
        protocol: Protocol,
    ) -> Arc<Context> {
        let context = Context::new(name, pattern, protocol);
        if !self.adapters.contains_key(&protocol) {
            warn!("Context {} speaks {protocol}, which has no adapter configured", context.name());
        }
        self.router.add_context(context)
    }

    pub fn router(&self) -> &ContextRouter {
        &self.router
    }

    pub fn params(&self) -> &DeploymentParams {
        &self.params
    }

    pub fn adapter(&self, protocol: Protocol) -> Option<&Arc<dyn ProtocolAdapter>> {
        self.adapters.get(&protocol)
    }

    /// Start accepting exchanges.
    pub fn start(&mut self) {
        self.state = ServerState::Running;
        info!(
            "Dispatcher running ({} contexts)",
            self.router.contexts().len()
        );
    }

    /// Stop accepting exchanges.
    pub fn shutdown(&mut self) {
        if self.state == ServerState::Shutdown {
            return;
        }
        self.state = ServerState::Shutdown;
        info!("Dispatcher shut down");
    }

    pub fn is_running(&self) -> bool {
        self.state == ServerState::Running
    }

    /// Run one exchange to completion. Only adapter failures escape.
    pub async fn dispatch(
        &self,
        request: HttpRequest,
        connection: &dyn Connection,
    ) -> Result<HttpResponse, BinderyError> {
        if self.state != ServerState::Running {
            debug!("{}: rejecting exchange, dispatcher not running", connection.id());
            return Ok(HttpResponse::new(Status::SERVICE_UNAVAILABLE));
        }

        let Some(resolution) = self.router.resolve(&request.path) else {
            debug!("{}: no context for {}", connection.id(), request.path);
            return Ok(HttpResponse::new(Status::NOT_FOUND));
        };

        let protocol = resolution.context.protocol();
        let adapter = self.adapters.get(&protocol).ok_or_else(|| {
            BinderyError::adapter(format!("No {protocol} adapter configured"))
        })?;

        if !adapter.accepts(&request) {
            return Err(BinderyError::adapter(format!(
                "Request to {} is not a {protocol} request",
                request.path
            )));
        }

        let shell = self
            .config
            .max_response_bytes
            .map(|limit| HttpResponse::ok().with_body_limit(limit));
        let mut event = adapter.translate(Some(request), shell, connection)?;

        match self.invoke(&resolution, &mut event, adapter.as_ref()).await {
            Ok(()) => adapter.on_success(&mut event, connection),
            Err(e) => {
                warn!("{}: {e}", connection.id());
                adapter.on_error(&mut event, connection, &e);
            }
        }

        Ok(event.into_response())
    }

    async fn invoke(
        &self,
        resolution: &Resolution,
        event: &mut RequestEvent,
        adapter: &dyn ProtocolAdapter,
    ) -> Result<(), BinderyError> {
        let Some(routed) = &resolution.registration else {
            return Ok(());
        };
        event.mark_handled();

        let registration = routed.entry.as_ref();
        let scope = BindletScope {
            context: &resolution.context,
            registration,
            marshaler: adapter.marshaler(),
            params: &self.params,
            remainder: &routed.remainder,
        };
        let service = registration.bindlet.service_dyn(event, &scope);

        match self.config.handler_timeout {
            Some(limit) => tokio::time::timeout(limit, service)
                .await
                .map_err(|_| {
                    BinderyError::dispatch(format!(
                        "{} timed out after {} ms",
                        registration.bindlet_name(),
                        limit.as_millis()
                    ))
                })?,
            None => service.await,
        }
    }
}

impl RequestHandler for Dispatcher {
    async fn handle_exchange(
        &self,
        request: HttpRequest,
        connection: &dyn Connection,
    ) -> Result<HttpResponse, BinderyError> {
        self.dispatch(request, connection).await
    }
}
