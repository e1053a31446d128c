//! Request/response correlation keyed by client sequence number.
//!
//! Each outgoing request registers a one-shot slot under its `client_seq`.
//! The slot is removed from the map *before* a result is delivered, and
//! removal is atomic per key, so whichever of {response, timeout, abandon}
//! removes the entry first is the only one that ever reaches the caller.

use std::time::Duration;

use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::oneshot;

use crate::error::{Result, SessionError};

/// Outcome delivered to a waiting caller.
pub type Reply = Result<Bytes>;

struct Pending {
    call: String,
    tx: oneshot::Sender<Reply>,
}

/// Caller's side of a registered request.
#[derive(Debug)]
pub struct WaitHandle {
    seq: i64,
    call: String,
    rx: oneshot::Receiver<Reply>,
}

impl WaitHandle {
    pub fn seq(&self) -> i64 {
        self.seq
    }
}

/// Table of in-flight requests.
#[derive(Default)]
pub struct Correlator {
    pending: DashMap<i64, Pending>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `seq` and returns the handle the caller waits on.
    pub fn register(&self, seq: i64, call: impl Into<String>) -> Result<WaitHandle> {
        let call = call.into();
        let (tx, rx) = oneshot::channel();

        match self.pending.entry(seq) {
            Entry::Occupied(_) => Err(SessionError::DuplicateSequence(seq)),
            Entry::Vacant(slot) => {
                slot.insert(Pending {
                    call: call.clone(),
                    tx,
                });
                Ok(WaitHandle { seq, call, rx })
            }
        }
    }

    /// Delivers `reply` to the caller waiting on `seq`.
    ///
    /// Returns `false` when nobody is waiting any more (late response after
    /// a timeout, or an unknown sequence); the reply is dropped.
    pub fn resolve(&self, seq: i64, reply: Reply) -> bool {
        match self.pending.remove(&seq) {
            Some((_, pending)) => pending.tx.send(reply).is_ok(),
            None => false,
        }
    }

    /// Waits for the result of `handle` for at most `timeout`.
    ///
    /// On expiry the entry is removed so a later response becomes a no-op.
    /// If a response won the race against the timer, that response is
    /// returned instead of the timeout.
    pub async fn wait(&self, handle: WaitHandle, timeout: Duration) -> Reply {
        let WaitHandle { seq, call, mut rx } = handle;

        match tokio::time::timeout(timeout, &mut rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Err(SessionError::Closed),
            Err(_) => {
                if self.cancel(seq) {
                    return Err(SessionError::Timeout {
                        call,
                        after: timeout,
                    });
                }
                rx.try_recv().unwrap_or(Err(SessionError::Timeout {
                    call,
                    after: timeout,
                }))
            }
        }
    }

    /// Removes `seq` without delivering anything.
    pub fn cancel(&self, seq: i64) -> bool {
        self.pending.remove(&seq).is_some()
    }

    /// Resolves every pending request with the error built by `reason`.
    ///
    /// Returns the number of waiters that received the error.
    pub fn fail_all(&self, reason: impl Fn(&str) -> SessionError) -> usize {
        let seqs: Vec<i64> = self.pending.iter().map(|entry| *entry.key()).collect();
        let mut failed = 0;
        for seq in seqs {
            if let Some((_, pending)) = self.pending.remove(&seq) {
                let err = reason(&pending.call);
                if pending.tx.send(Err(err)).is_ok() {
                    failed += 1;
                }
            }
        }
        failed
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
