//! Transport abstraction: pluggable mediums carrying (channel, payload)
//! frames.
//!
//! A medium is addressed by an endpoint name of the form `scheme` or
//! `scheme://detail`. The registry maps schemes to factories and comes
//! seeded with the in-process [`loopback`] medium under the `inproc`
//! scheme. Custom mediums register a [`TransportFactory`] for their own
//! scheme.

pub mod loopback;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::frame::Frame;

/// Sending half of a transport endpoint.
///
/// Implementations must be callable concurrently from any task; frames
/// from one sender are never reordered relative to each other.
#[async_trait]
pub trait TransportSend: Send + Sync {
    /// Send one frame over the medium.
    async fn send(&self, frame: Frame) -> Result<()>;
}

/// Receiving half of a transport endpoint.
#[async_trait]
pub trait TransportRecv: Send {
    /// Receive the next pending frame.
    ///
    /// `timeout` of `Some(Duration::ZERO)` polls without blocking and
    /// `None` blocks until a frame arrives or the endpoint closes.
    /// Returns `Ok(None)` when no frame arrived within the timeout (the
    /// "again" status) and `Err(Error::Closed)` once the medium is gone.
    async fn recv(&mut self, timeout: Option<Duration>) -> Result<Option<Frame>>;
}

/// A connected transport endpoint: both halves plus the resolved name.
pub struct Endpoint {
    /// The endpoint name this connection resolved to.
    pub name: String,
    /// Sending half, shareable across tasks.
    pub send: Arc<dyn TransportSend>,
    /// Receiving half, exclusively owned.
    pub recv: Box<dyn TransportRecv>,
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint").field("name", &self.name).finish()
    }
}

/// Factory for one transport scheme.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    /// Connect a new endpoint for `endpoint` (the full name, scheme
    /// included).
    async fn connect(&self, endpoint: &str) -> Result<Endpoint>;
}

/// Registry of transport factories keyed by scheme.
///
/// The registry is the unit of sharing for in-process mediums: two bus
/// connections reach the same loopback hub only through the same
/// registry instance. Share it with `Arc::clone`.
pub struct TransportRegistry {
    factories: RwLock<HashMap<String, Arc<dyn TransportFactory>>>,
}

impl TransportRegistry {
    /// Create a registry seeded with the built-in `inproc` loopback.
    #[must_use]
    pub fn new() -> Self {
        let registry = Self {
            factories: RwLock::new(HashMap::new()),
        };
        registry.register("inproc", Arc::new(loopback::LoopbackFactory::new()));
        registry
    }

    /// Register a factory for a scheme, replacing any previous one.
    pub fn register(&self, scheme: impl Into<String>, factory: Arc<dyn TransportFactory>) {
        let mut factories = self
            .factories
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        factories.insert(scheme.into(), factory);
    }

    /// Connect to `endpoint`, resolving its scheme to a factory.
    pub async fn connect(&self, endpoint: &str) -> Result<Endpoint> {
        let scheme = scheme_of(endpoint);
        let factory = {
            let factories = self
                .factories
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            factories.get(scheme).cloned()
        };
        match factory {
            Some(factory) => factory.connect(endpoint).await,
            None => Err(Error::UnknownEndpoint(endpoint.to_string())),
        }
    }
}

impl Default for TransportRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The scheme portion of an endpoint name: everything before `://`, or
/// the whole name when no separator is present.
fn scheme_of(endpoint: &str) -> &str {
    match endpoint.split_once("://") {
        Some((scheme, _)) => scheme,
        None => endpoint,
    }
}
