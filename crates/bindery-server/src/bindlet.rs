//! Bindlets — request handlers bound to a path pattern within a context.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bindery_protocol::{BinderyError, DeploymentParams};

use crate::marshal::Marshaler;
use crate::message::RequestEvent;
use crate::router::{Context, Registration};

/// Everything a bindlet may consult besides the event itself.
pub struct BindletScope<'a> {
    /// Context the request was routed into (owns the shared object store)
    pub context: &'a Context,
    /// Registration that matched (owns the per-bindlet parameters)
    pub registration: &'a Registration,
    /// Marshaler of the request's protocol
    pub marshaler: &'a dyn Marshaler,
    /// Deployment parameters
    pub params: &'a DeploymentParams,
    /// Path captured by the registration's wildcard
    pub remainder: &'a str,
}

/// Trait implemented by request handlers.
///
/// `service` is awaited once per routed request. Returning an error hands
/// the event to the adapter's error path; a bindlet that wants to report a
/// failure to the client in the protocol's own envelope should marshal it
/// and return `Ok`.
pub trait Bindlet: Send + Sync {
    fn name(&self) -> &str;

    fn service(
        &self,
        event: &mut RequestEvent,
        scope: &BindletScope<'_>,
    ) -> impl Future<Output = Result<(), BinderyError>> + Send;
}

impl<T: Bindlet> Bindlet for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn service(
        &self,
        event: &mut RequestEvent,
        scope: &BindletScope<'_>,
    ) -> impl Future<Output = Result<(), BinderyError>> + Send {
        (**self).service(event, scope)
    }
}

/// Object-safe wrapper for the Bindlet trait.
pub(crate) trait BindletDyn: Send + Sync {
    fn name_dyn(&self) -> &str;

    fn service_dyn<'a>(
        &'a self,
        event: &'a mut RequestEvent,
        scope: &'a BindletScope<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<(), BinderyError>> + Send + 'a>>;
}

impl<T: Bindlet> BindletDyn for T {
    fn name_dyn(&self) -> &str {
        self.name()
    }

    fn service_dyn<'a>(
        &'a self,
        event: &'a mut RequestEvent,
        scope: &'a BindletScope<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<(), BinderyError>> + Send + 'a>> {
        Box::pin(self.service(event, scope))
    }
}
