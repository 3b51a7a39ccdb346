//! The bus facade: one transport endpoint plus its router and dispatch
//! engine.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::info;

use crate::config::BusConfig;
use crate::dispatch::{DispatchEngine, HandleStatus};
use crate::error::Result;
use crate::frame::{Envelope, Frame};
use crate::router::{Router, SubscriptionHandle};
use crate::transport::{TransportRegistry, TransportSend};

/// A connected pub/sub session.
///
/// Publishers hand (channel, payload) pairs to [`publish`](Bus::publish);
/// the dispatch engine pulls inbound frames off the transport and routes
/// them to matching subscriptions, either continuously in background mode
/// ([`start`](Bus::start)) or one frame at a time in manual mode
/// ([`handle`](Bus::handle)).
pub struct Bus {
    endpoint: String,
    send: Arc<dyn TransportSend>,
    router: Arc<Router>,
    engine: DispatchEngine,
}

impl Bus {
    /// Connect to the endpoint named by `config`, resolving through
    /// `registry`.
    ///
    /// An empty `config.endpoint` selects `config.default_endpoint`. A
    /// failed connect leaves nothing behind; the error is surfaced here
    /// and only here.
    pub async fn connect(registry: &TransportRegistry, config: BusConfig) -> Result<Self> {
        let endpoint = registry.connect(config.resolved_endpoint()).await?;
        info!(endpoint = %endpoint.name, "bus connected");
        let router = Arc::new(Router::new());
        let engine = DispatchEngine::new(
            endpoint.recv,
            Arc::clone(&router),
            config.queue_size,
            config.poll_interval,
        );
        Ok(Self {
            endpoint: endpoint.name,
            send: endpoint.send,
            router,
            engine,
        })
    }

    /// The endpoint name this bus resolved to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Publish one payload on `channel`.
    ///
    /// Publishes from one caller arrive in call order; no order is
    /// promised across distinct publishers.
    pub async fn publish(&self, channel: impl Into<String>, payload: impl Into<Bytes>) -> Result<()> {
        self.send
            .send(Frame {
                channel: channel.into(),
                payload: payload.into(),
            })
            .await
    }

    /// Register `callback` for every channel matching `pattern`.
    ///
    /// See [`Router`] for pattern semantics: literals match exactly,
    /// patterns containing `( ) | . * +` compile as anchored regexes.
    pub fn subscribe(
        &self,
        pattern: &str,
        callback: impl Fn(&Envelope) + Send + Sync + 'static,
    ) -> Result<SubscriptionHandle> {
        self.router.subscribe(pattern, callback)
    }

    /// Remove one subscription; others are unaffected.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<()> {
        self.router.unsubscribe(handle)
    }

    /// Enter continuous background dispatch.
    pub async fn start(&self) -> Result<()> {
        self.engine.start().await
    }

    /// Leave background dispatch. Buffered frames are discarded (an
    /// intentional flush-on-stop, not an error); after this returns no
    /// subscriber callback runs again.
    pub async fn stop(&self) -> Result<()> {
        self.engine.stop().await
    }

    /// Pull and route at most one frame on the calling task.
    ///
    /// `Some(Duration::ZERO)` polls without blocking; `None` waits until
    /// a frame arrives. Returns [`HandleStatus::Again`] when no frame was
    /// pending. Rejected while the background worker is active.
    pub async fn handle(&self, timeout: Option<Duration>) -> Result<HandleStatus> {
        self.engine.handle(timeout).await
    }

    /// Halt delivery, buffering inbound frames up to the configured
    /// queue size (oldest dropped on overflow).
    pub async fn pause(&self) -> Result<()> {
        self.engine.pause().await
    }

    /// Release buffered frames in receive order and resume live
    /// delivery.
    pub async fn resume(&self) -> Result<()> {
        self.engine.resume().await
    }

    /// Deliver buffered frames in receive order while staying paused.
    pub async fn flush(&self) -> Result<()> {
        self.engine.flush().await
    }

    /// Change the pause-buffer capacity.
    pub fn set_queue_size(&self, queue_size: usize) {
        self.engine.set_queue_size(queue_size);
    }

    /// Stop background dispatch if it is running, then release the
    /// endpoint. Dropping the bus releases the medium either way.
    pub async fn shutdown(self) -> Result<()> {
        if self.engine.is_running().await {
            self.engine.stop().await?;
        }
        info!(endpoint = %self.endpoint, "bus shut down");
        Ok(())
    }
}

impl std::fmt::Debug for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bus")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}
