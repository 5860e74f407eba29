//! Two-stage request routing: path → context → registration.
//!
//! Both stages are ordered tables matched with the same path-template
//! algorithm; the first structural match wins. Lookups share a read lock,
//! registration takes the write lock briefly.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::bindlet::{Bindlet, BindletDyn};
use crate::message::Protocol;
use crate::pattern::{is_valid_template, match_path};
use crate::store::SharedObjectStore;

/// An entry that can be routed to by path template.
pub trait Routable {
    fn pattern(&self) -> &str;
}

/// Result of a successful lookup.
pub struct Routed<T> {
    pub entry: Arc<T>,
    /// Path captured by a trailing wildcard (empty on exact matches)
    pub remainder: String,
}

/// Ordered table of routable entries.
pub struct RouteTable<T> {
    entries: RwLock<Vec<Arc<T>>>,
}

impl<T: Routable> RouteTable<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Append an entry. Patterns are not deduplicated; a malformed pattern
    /// is kept but will never match.
    pub fn register(&self, entry: T) -> Arc<T> {
        if !is_valid_template(entry.pattern()) {
            warn!("Registered malformed path pattern {:?}; it will never match", entry.pattern());
        }
        let entry = Arc::new(entry);
        self.entries.write().push(entry.clone());
        entry
    }

    /// First entry, in insertion order, whose pattern matches `path`.
    pub fn route(&self, path: &str) -> Option<Routed<T>> {
        let entries = self.entries.read();
        entries.iter().find_map(|entry| {
            match_path(entry.pattern(), path).map(|remainder| Routed {
                entry: entry.clone(),
                remainder: remainder.to_string(),
            })
        })
    }

    pub fn patterns(&self) -> Vec<String> {
        self.entries.read().iter().map(|e| e.pattern().to_string()).collect()
    }

    pub fn entries(&self) -> Vec<Arc<T>> {
        self.entries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<T: Routable> Default for RouteTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Registration
// ─────────────────────────────────────────────────────────────────────────────

/// A bindlet bound to a pattern. The binding itself never changes; its
/// parameter values may be updated at any time.
pub struct Registration {
    pattern: String,
    pub(crate) bindlet: Arc<dyn BindletDyn>,
    parameters: RwLock<HashMap<String, String>>,
}

impl Registration {
    pub fn bindlet_name(&self) -> &str {
        self.bindlet.name_dyn()
    }

    pub fn parameter(&self, name: &str) -> Option<String> {
        self.parameters.read().get(name).cloned()
    }

    pub fn set_parameter(&self, name: impl Into<String>, value: impl Into<String>) {
        self.parameters.write().insert(name.into(), value.into());
    }

    pub fn parameters(&self) -> HashMap<String, String> {
        self.parameters.read().clone()
    }
}

impl Routable for Registration {
    fn pattern(&self) -> &str {
        &self.pattern
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Context
// ─────────────────────────────────────────────────────────────────────────────

/// A routing scope: bindlets sharing a path prefix, a protocol and an
/// object store.
pub struct Context {
    name: String,
    pattern: String,
    protocol: Protocol,
    registrations: RouteTable<Registration>,
    objects: SharedObjectStore,
}

impl Context {
    pub fn new(name: impl Into<String>, pattern: impl Into<String>, protocol: Protocol) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            protocol,
            registrations: RouteTable::new(),
            objects: SharedObjectStore::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn objects(&self) -> &SharedObjectStore {
        &self.objects
    }

    /// Bind `bindlet` to `pattern` (relative to the context prefix).
    pub fn register<B: Bindlet + 'static>(&self, pattern: impl Into<String>, bindlet: B) -> Arc<Registration> {
        self.register_with(pattern, bindlet, HashMap::new())
    }

    /// Bind `bindlet` with initial parameter values.
    pub fn register_with<B: Bindlet + 'static>(
        &self,
        pattern: impl Into<String>,
        bindlet: B,
        parameters: HashMap<String, String>,
    ) -> Arc<Registration> {
        let registration = Registration {
            pattern: pattern.into(),
            bindlet: Arc::new(bindlet),
            parameters: RwLock::new(parameters),
        };
        info!(
            "Context {}: binding {} to {}",
            self.name,
            registration.bindlet_name(),
            registration.pattern
        );
        self.registrations.register(registration)
    }

    /// Registration matching a context-relative path.
    pub fn route(&self, path: &str) -> Option<Routed<Registration>> {
        self.registrations.route(path)
    }

    pub fn registrations(&self) -> &RouteTable<Registration> {
        &self.registrations
    }
}

impl Routable for Context {
    fn pattern(&self) -> &str {
        &self.pattern
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ContextRouter
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of two-stage routing.
pub struct Resolution {
    pub context: Arc<Context>,
    /// Path relative to the context
    pub context_path: String,
    /// Matching registration, if any
    pub registration: Option<Routed<Registration>>,
}

#[derive(Default)]
pub struct ContextRouter {
    contexts: RouteTable<Context>,
}

impl ContextRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_context(&self, context: Context) -> Arc<Context> {
        info!("Adding {} context {} at {}", context.protocol, context.name, context.pattern);
        self.contexts.register(context)
    }

    pub fn context(&self, name: &str) -> Option<Arc<Context>> {
        self.contexts.entries().into_iter().find(|c| c.name == name)
    }

    pub fn contexts(&self) -> Vec<Arc<Context>> {
        self.contexts.entries()
    }

    /// Stage one: the context whose prefix matches `path`.
    pub fn route(&self, path: &str) -> Option<Routed<Context>> {
        self.contexts.route(path)
    }

    /// Both stages. `None` when no context matches; a context without a
    /// matching registration yields `registration: None`.
    pub fn resolve(&self, path: &str) -> Option<Resolution> {
        let Routed { entry: context, remainder } = self.route(path)?;
        let registration = context.route(&remainder);
        debug!(
            "Resolved {path} to context {} ({})",
            context.name,
            registration
                .as_ref()
                .map(|r| r.entry.bindlet_name())
                .unwrap_or("no bindlet")
        );
        Some(Resolution {
            context,
            context_path: remainder,
            registration,
        })
    }
}
