//! Transport session: one connection, one receive loop, one writer.
//!
//! ```text
//!  caller ──request()──► [writer lock] assign seq ─► register ─► send_frame
//!     ▲                                                   │
//!     │ wait(timeout)                                     ▼
//!  Correlator ◄──resolve(seq)── receive loop ◄── next_frame ── socket
//!                                    │
//!                                    └─ Notify ─► EventRouter::publish
//! ```
//!
//! The sequence number is assigned while the writer lock is held, so
//! `client_seq` is strictly increasing in wire order as well as unique.
//! A write gets the request's own timeout; a write that fails or stalls
//! drops the sink under the lock, so queued callers see `NotConnected`.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use prost::Message;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::codec::{self, Envelope, MessageKind};
use crate::correlator::Correlator;
use crate::error::{Result, SessionError};
use crate::router::{EventRouter, Notification};
use crate::state::UserState;
use crate::transport::{Connector, FrameSink, FrameSource};

/// Gold gain above which a basic-info push is logged.
const LARGE_GOLD_GAIN: i64 = 10_000;

/// Upper bound on flushing the sink during shutdown.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Lifecycle of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Closed = 3,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Closed,
            _ => Self::Disconnected,
        }
    }
}

pub struct Session {
    state: AtomicU8,
    client_seq: AtomicI64,
    server_seq: AtomicI64,
    correlator: Correlator,
    writer: Mutex<Option<Box<dyn FrameSink>>>,
    router: Arc<EventRouter>,
    user: Arc<UserState>,
    disconnected: AtomicBool,
}

impl Session {
    pub fn new(router: Arc<EventRouter>, user: Arc<UserState>) -> Arc<Self> {
        Arc::new(Self {
            state: AtomicU8::new(SessionState::Disconnected as u8),
            client_seq: AtomicI64::new(0),
            server_seq: AtomicI64::new(0),
            correlator: Correlator::new(),
            writer: Mutex::new(None),
            router,
            user,
            disconnected: AtomicBool::new(false),
        })
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    pub fn router(&self) -> &Arc<EventRouter> {
        &self.router
    }

    pub fn user(&self) -> &Arc<UserState> {
        &self.user
    }

    /// Last `server_seq` seen on an inbound frame.
    pub fn server_seq(&self) -> i64 {
        self.server_seq.load(Ordering::SeqCst)
    }

    pub fn pending_count(&self) -> usize {
        self.correlator.len()
    }

    /// Opens the connection and starts the receive loop.
    ///
    /// A session connects at most once; there is no reconnection.
    pub async fn connect(self: &Arc<Self>, connector: &dyn Connector) -> Result<JoinHandle<()>> {
        self.state
            .compare_exchange(
                SessionState::Disconnected as u8,
                SessionState::Connecting as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .map_err(|_| SessionError::AlreadyStarted)?;

        let link = match connector.open().await {
            Ok(link) => link,
            Err(err) => {
                self.state
                    .store(SessionState::Disconnected as u8, Ordering::SeqCst);
                return Err(err);
            }
        };

        *self.writer.lock().await = Some(link.sink);
        self.state
            .store(SessionState::Connected as u8, Ordering::SeqCst);
        info!(target: "sprout::session", "connected");

        let session = self.clone();
        Ok(tokio::spawn(session.receive_loop(link.source)))
    }

    /// Sends one request and waits up to `timeout` for its response body.
    ///
    /// `timeout` bounds the write and the wait separately.
    pub async fn request(
        &self,
        service: &str,
        method: &str,
        body: Vec<u8>,
        timeout: Duration,
    ) -> Result<Bytes> {
        let (handle, written) = {
            let mut writer = self.writer.lock().await;
            if !self.is_connected() {
                return Err(SessionError::NotConnected);
            }
            let Some(sink) = writer.as_mut() else {
                return Err(SessionError::NotConnected);
            };

            let seq = self.client_seq.fetch_add(1, Ordering::SeqCst) + 1;
            let handle = self
                .correlator
                .register(seq, format!("{service}.{method}"))?;
            let frame = codec::encode_request(service, method, seq, self.server_seq(), body);
            trace!(target: "sprout::session", seq, service, method, "sending request");

            let written = match tokio::time::timeout(timeout, sink.send_frame(frame)).await {
                Ok(written) => written,
                Err(_) => Err(SessionError::Transport(format!(
                    "write stalled for {timeout:?}"
                ))),
            };
            if matches!(written, Err(SessionError::Transport(_))) {
                writer.take();
            }
            (handle, written)
        };

        if let Err(err) = written {
            self.correlator.cancel(handle.seq());
            warn!(target: "sprout::session", service, method, error = %err, "write failed");
            if matches!(err, SessionError::Transport(_)) {
                self.shutdown("write failure").await;
            }
            return Err(err);
        }

        self.correlator.wait(handle, timeout).await
    }

    /// Typed wrapper over [`request`](Self::request).
    pub async fn call<Req, Resp>(
        &self,
        service: &str,
        method: &str,
        request: &Req,
        timeout: Duration,
    ) -> Result<Resp>
    where
        Req: Message,
        Resp: Message + Default,
    {
        let body = self
            .request(service, method, request.encode_to_vec(), timeout)
            .await?;
        Resp::decode(body).map_err(|source| SessionError::Body {
            call: format!("{service}.{method}"),
            source,
        })
    }

    /// Fails every pending request with [`SessionError::Stalled`].
    pub fn abandon_pending(&self) -> usize {
        self.correlator.fail_all(|call| SessionError::Stalled {
            call: call.to_string(),
        })
    }

    /// Closes the session from the client side.
    pub async fn close(&self) {
        self.shutdown("closed by client").await;
    }

    async fn receive_loop(self: Arc<Self>, mut source: Box<dyn FrameSource>) {
        let reason = loop {
            match source.next_frame().await {
                Some(Ok(frame)) => {
                    if !self.handle_frame(&frame) {
                        break "kicked by server";
                    }
                }
                Some(Err(err)) => {
                    warn!(target: "sprout::session", error = %err, "read failed");
                    break "read failure";
                }
                None => break "closed by peer",
            }
            if self.state() == SessionState::Closed {
                break "closed";
            }
        };
        self.shutdown(reason).await;
    }

    /// Returns `false` when the loop must stop.
    fn handle_frame(&self, frame: &[u8]) -> bool {
        let envelope = match codec::decode(frame) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(target: "sprout::session", error = %err, len = frame.len(), "dropping undecodable frame");
                return true;
            }
        };

        if envelope.server_seq > 0 {
            self.server_seq.store(envelope.server_seq, Ordering::SeqCst);
        }

        match envelope.kind {
            MessageKind::Response => {
                self.handle_response(envelope);
                true
            }
            MessageKind::Notify => self.handle_notify(envelope),
            kind => {
                debug!(target: "sprout::session", ?kind, call = %envelope.call_name(), "dropping frame of unexpected kind");
                true
            }
        }
    }

    fn handle_response(&self, envelope: Envelope) {
        let seq = envelope.client_seq;
        let reply = if envelope.error_code != 0 {
            Err(SessionError::Protocol {
                service: envelope.service,
                method: envelope.method,
                code: envelope.error_code,
                message: envelope.error_message,
            })
        } else {
            Ok(envelope.body)
        };

        if !self.correlator.resolve(seq, reply) {
            debug!(target: "sprout::session", seq, "dropping response with no waiter");
        }
    }

    fn handle_notify(&self, envelope: Envelope) -> bool {
        if envelope.body.is_empty() {
            return true;
        }

        let event = match codec::decode_event(&envelope.body) {
            Ok(event) => event,
            Err(err) => {
                warn!(target: "sprout::session", error = %err, "dropping undecodable push");
                return true;
            }
        };

        let notification = match Notification::from_event(&event.message_type, event.body) {
            Ok(notification) => notification,
            Err(err) => {
                warn!(target: "sprout::session", message_type = %event.message_type, error = %err, "dropping undecodable push");
                return true;
            }
        };

        match &notification {
            Notification::Unknown { message_type } => {
                debug!(target: "sprout::session", %message_type, "ignoring unknown push");
                return true;
            }
            Notification::BasicChanged(basic) => {
                let delta = self.user.apply_basic(basic);
                if delta.leveled_up() {
                    info!(target: "sprout::session", from = delta.level_from, to = delta.level_to, "level up");
                }
                if delta.gold_gained > LARGE_GOLD_GAIN {
                    info!(target: "sprout::session", gained = delta.gold_gained, gold = self.user.gold(), "gold increased");
                }
            }
            Notification::Kicked { reason } => {
                warn!(target: "sprout::session", %reason, "kicked by server");
            }
            _ => {}
        }

        let kicked = matches!(notification, Notification::Kicked { .. });
        self.router.publish(notification);
        !kicked
    }

    /// Transitions to `Closed`. Runs once; later calls are no-ops.
    async fn shutdown(&self, reason: &str) {
        if self.disconnected.swap(true, Ordering::SeqCst) {
            return;
        }
        self.state
            .store(SessionState::Closed as u8, Ordering::SeqCst);

        let failed = self.correlator.fail_all(|_| SessionError::Closed);

        // A writer mid-send holds the lock until its own deadline; it drops
        // the sink itself.
        match self.writer.try_lock() {
            Ok(mut writer) => {
                if let Some(mut sink) = writer.take() {
                    match tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await {
                        Ok(Ok(())) => {}
                        Ok(Err(err)) => debug!(target: "sprout::session", error = %err, "close failed"),
                        Err(_) => debug!(target: "sprout::session", "close timed out"),
                    }
                }
            }
            Err(_) => debug!(target: "sprout::session", "writer busy during shutdown"),
        }

        info!(target: "sprout::session", reason, failed_pending = failed, "disconnected");
        self.router.publish(Notification::Disconnected);
    }
}
