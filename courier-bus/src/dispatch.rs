//! Dispatch engine: pulls frames off the transport and routes them.
//!
//! The engine runs in one of two modes. Background mode (`start`) spawns
//! a worker task that receives and routes continuously until `stop`.
//! Manual mode (`handle`) pulls and routes at most one frame on the
//! calling task. The modes are mutually exclusive: both paths go through
//! one async mutex over the receive half, and wrong-state operations are
//! rejected with [`Error::InvalidMode`] rather than left to incidental
//! thread safety. Concurrent `handle` calls serialize on that mutex.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::frame::{Envelope, Frame};
use crate::router::Router;
use crate::transport::TransportRecv;

/// Outcome of a manual `handle` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleStatus {
    /// One frame was received and routed.
    Handled,
    /// No frame arrived within the timeout; retry later.
    Again,
}

enum Command {
    Pause { ack: oneshot::Sender<()> },
    Resume { ack: oneshot::Sender<()> },
    Flush { ack: oneshot::Sender<()> },
}

struct Running {
    cancel: CancellationToken,
    ctrl: mpsc::UnboundedSender<Command>,
    worker: JoinHandle<Box<dyn TransportRecv>>,
    paused: bool,
}

struct State {
    /// Present while stopped; moves into the worker while running.
    recv: Option<Box<dyn TransportRecv>>,
    running: Option<Running>,
}

pub(crate) struct DispatchEngine {
    state: Mutex<State>,
    router: Arc<Router>,
    queue_size: Arc<AtomicUsize>,
    poll_interval: Duration,
}

impl DispatchEngine {
    pub(crate) fn new(
        recv: Box<dyn TransportRecv>,
        router: Arc<Router>,
        queue_size: usize,
        poll_interval: Duration,
    ) -> Self {
        Self {
            state: Mutex::new(State {
                recv: Some(recv),
                running: None,
            }),
            router,
            queue_size: Arc::new(AtomicUsize::new(queue_size)),
            poll_interval,
        }
    }

    /// Enter background mode: spawn the receive-and-route worker.
    pub(crate) async fn start(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.running.is_some() {
            return Err(Error::InvalidMode("start: already running"));
        }
        let recv = state
            .recv
            .take()
            .ok_or(Error::InvalidMode("start: receive half unavailable"))?;

        let cancel = CancellationToken::new();
        let (ctrl_tx, ctrl_rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(worker_loop(
            recv,
            Arc::clone(&self.router),
            Arc::clone(&self.queue_size),
            self.poll_interval,
            ctrl_rx,
            cancel.clone(),
        ));
        state.running = Some(Running {
            cancel,
            ctrl: ctrl_tx,
            worker,
            paused: false,
        });
        debug!("dispatch worker started");
        Ok(())
    }

    /// Leave background mode. Buffered-but-undelivered frames are
    /// discarded; once this returns, no callback runs again.
    pub(crate) async fn stop(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let Some(running) = state.running.take() else {
            return Err(Error::InvalidMode("stop: not running"));
        };
        running.cancel.cancel();
        match running.worker.await {
            Ok(recv) => {
                state.recv = Some(recv);
                debug!("dispatch worker stopped");
                Ok(())
            }
            Err(join_error) => {
                warn!(%join_error, "dispatch worker did not shut down cleanly");
                Err(Error::Transport(format!(
                    "dispatch worker failed: {join_error}"
                )))
            }
        }
    }

    /// Halt delivery while continuing to buffer inbound frames, up to the
    /// configured queue size.
    pub(crate) async fn pause(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let Some(running) = state.running.as_mut() else {
            return Err(Error::InvalidMode("pause: not running"));
        };
        if running.paused {
            return Err(Error::InvalidMode("pause: already paused"));
        }
        send_command(&running.ctrl, |ack| Command::Pause { ack }).await?;
        running.paused = true;
        Ok(())
    }

    /// Deliver buffered frames in receive order and return to live
    /// delivery.
    pub(crate) async fn resume(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let Some(running) = state.running.as_mut() else {
            return Err(Error::InvalidMode("resume: not running"));
        };
        if !running.paused {
            return Err(Error::InvalidMode("resume: not paused"));
        }
        send_command(&running.ctrl, |ack| Command::Resume { ack }).await?;
        running.paused = false;
        Ok(())
    }

    /// Deliver buffered frames in receive order without leaving the
    /// paused state.
    pub(crate) async fn flush(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let Some(running) = state.running.as_mut() else {
            return Err(Error::InvalidMode("flush: not running"));
        };
        if !running.paused {
            return Err(Error::InvalidMode("flush: not paused"));
        }
        send_command(&running.ctrl, |ack| Command::Flush { ack }).await
    }

    /// Manual mode: pull and route at most one frame.
    pub(crate) async fn handle(&self, timeout: Option<Duration>) -> Result<HandleStatus> {
        let mut state = self.state.lock().await;
        if state.running.is_some() {
            return Err(Error::InvalidMode("handle: background worker active"));
        }
        let recv = state
            .recv
            .as_mut()
            .ok_or(Error::InvalidMode("handle: receive half unavailable"))?;
        match recv.recv(timeout).await? {
            Some(frame) => {
                self.router.route(&Envelope::stamp(frame));
                Ok(HandleStatus::Handled)
            }
            None => Ok(HandleStatus::Again),
        }
    }

    /// Change the pause-buffer capacity, effective from the next
    /// buffering decision.
    pub(crate) fn set_queue_size(&self, queue_size: usize) {
        self.queue_size.store(queue_size, Ordering::Relaxed);
    }

    pub(crate) async fn is_running(&self) -> bool {
        self.state.lock().await.running.is_some()
    }
}

async fn send_command(
    ctrl: &mpsc::UnboundedSender<Command>,
    make: impl FnOnce(oneshot::Sender<()>) -> Command,
) -> Result<()> {
    let (ack_tx, ack_rx) = oneshot::channel();
    ctrl.send(make(ack_tx)).map_err(|_| Error::Closed)?;
    ack_rx.await.map_err(|_| Error::Closed)
}

async fn worker_loop(
    mut recv: Box<dyn TransportRecv>,
    router: Arc<Router>,
    queue_size: Arc<AtomicUsize>,
    poll_interval: Duration,
    mut ctrl: mpsc::UnboundedReceiver<Command>,
    cancel: CancellationToken,
) -> Box<dyn TransportRecv> {
    let mut paused = false;
    let mut buffer: VecDeque<Frame> = VecDeque::new();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            cmd = ctrl.recv() => match cmd {
                Some(Command::Pause { ack }) => {
                    paused = true;
                    let _ = ack.send(());
                }
                Some(Command::Resume { ack }) => {
                    drain_buffer(&mut buffer, &router);
                    paused = false;
                    let _ = ack.send(());
                }
                Some(Command::Flush { ack }) => {
                    drain_buffer(&mut buffer, &router);
                    let _ = ack.send(());
                }
                None => break,
            },
            result = recv.recv(Some(poll_interval)) => match result {
                Ok(Some(frame)) => {
                    if paused {
                        let capacity = queue_size.load(Ordering::Relaxed).max(1);
                        if buffer.len() >= capacity {
                            if let Some(dropped) = buffer.pop_front() {
                                warn!(
                                    channel = %dropped.channel,
                                    capacity,
                                    "pause buffer full; dropping oldest frame"
                                );
                            }
                        }
                        buffer.push_back(frame);
                    } else {
                        router.route(&Envelope::stamp(frame));
                    }
                }
                Ok(None) => {}
                Err(error) => {
                    warn!(%error, "transport receive failed; dispatch worker exiting");
                    break;
                }
            },
        }
    }

    if !buffer.is_empty() {
        debug!(
            discarded = buffer.len(),
            "discarding buffered frames on stop"
        );
    }
    recv
}

fn drain_buffer(buffer: &mut VecDeque<Frame>, router: &Router) {
    while let Some(frame) = buffer.pop_front() {
        router.route(&Envelope::stamp(frame));
    }
}
