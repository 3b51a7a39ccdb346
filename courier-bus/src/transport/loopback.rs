//! In-process loopback medium.
//!
//! Frames published on a hub are fanned out, in order and without loss,
//! to every endpoint attached to that hub within the process, including
//! the publishing endpoint itself. There is no socket and no copy of the
//! payload bytes. Intended for intra-process wiring and deterministic
//! tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::{Error, Result};
use crate::frame::Frame;

use super::{Endpoint, TransportFactory, TransportRecv, TransportSend};

/// Factory for `inproc` endpoints.
///
/// `inproc` and `inproc://<hub>` name hubs within this factory; every
/// connect to the same name joins the same hub.
pub struct LoopbackFactory {
    hubs: Mutex<HashMap<String, Arc<Hub>>>,
}

impl LoopbackFactory {
    /// Create a factory with no hubs yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            hubs: Mutex::new(HashMap::new()),
        }
    }

    fn hub(&self, name: &str) -> Arc<Hub> {
        let mut hubs = self.hubs.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(hubs.entry(name.to_string()).or_default())
    }
}

impl Default for LoopbackFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransportFactory for LoopbackFactory {
    async fn connect(&self, endpoint: &str) -> Result<Endpoint> {
        let hub = self.hub(endpoint);
        let (id, rx) = hub.attach();
        trace!(endpoint, id, "attached loopback endpoint");
        Ok(Endpoint {
            name: endpoint.to_string(),
            send: Arc::new(LoopbackSend {
                hub: Arc::clone(&hub),
            }),
            recv: Box::new(LoopbackRecv { hub, id, rx }),
        })
    }
}

/// One hub: the set of attached peers sharing a loopback name.
#[derive(Default)]
struct Hub {
    peers: Mutex<Vec<Peer>>,
    next_id: AtomicU64,
}

struct Peer {
    id: u64,
    tx: mpsc::UnboundedSender<Frame>,
}

impl Hub {
    fn attach(&self) -> (u64, mpsc::UnboundedReceiver<Frame>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let mut peers = self.peers.lock().unwrap_or_else(PoisonError::into_inner);
        peers.push(Peer { id, tx });
        (id, rx)
    }

    fn detach(&self, id: u64) {
        let mut peers = self.peers.lock().unwrap_or_else(PoisonError::into_inner);
        peers.retain(|peer| peer.id != id);
    }

    /// Deliver `frame` to every attached peer. Peers whose receiving half
    /// has gone away are pruned.
    fn broadcast(&self, frame: Frame) {
        let mut peers = self.peers.lock().unwrap_or_else(PoisonError::into_inner);
        peers.retain(|peer| peer.tx.send(frame.clone()).is_ok());
    }
}

struct LoopbackSend {
    hub: Arc<Hub>,
}

#[async_trait]
impl TransportSend for LoopbackSend {
    async fn send(&self, frame: Frame) -> Result<()> {
        self.hub.broadcast(frame);
        Ok(())
    }
}

struct LoopbackRecv {
    hub: Arc<Hub>,
    id: u64,
    rx: mpsc::UnboundedReceiver<Frame>,
}

#[async_trait]
impl TransportRecv for LoopbackRecv {
    async fn recv(&mut self, timeout: Option<Duration>) -> Result<Option<Frame>> {
        match timeout {
            Some(Duration::ZERO) => match self.rx.try_recv() {
                Ok(frame) => Ok(Some(frame)),
                Err(mpsc::error::TryRecvError::Empty) => Ok(None),
                Err(mpsc::error::TryRecvError::Disconnected) => Err(Error::Closed),
            },
            Some(wait) => match tokio::time::timeout(wait, self.rx.recv()).await {
                Ok(Some(frame)) => Ok(Some(frame)),
                Ok(None) => Err(Error::Closed),
                Err(_elapsed) => Ok(None),
            },
            None => match self.rx.recv().await {
                Some(frame) => Ok(Some(frame)),
                None => Err(Error::Closed),
            },
        }
    }
}

impl Drop for LoopbackRecv {
    fn drop(&mut self) {
        self.hub.detach(self.id);
    }
}
