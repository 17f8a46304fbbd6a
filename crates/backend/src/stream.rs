// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded RunEvent streams with cooperative cancellation.
//!
//! The channel is bounded so a producer that outruns the consumer blocks
//! instead of growing memory without limit: backpressure during long
//! streaming deltas. Cancellation travels the other way: closing or
//! cancelling the stream tells the producing adapter to terminate its
//! subprocess.

use crate::run_event::RunEvent;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Bounded buffer between a backend adapter and the engine.
pub const STREAM_CAPACITY: usize = 256;

/// The consumer went away (dropped or cancelled the stream).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamClosed;

/// Create a linked sender/stream pair.
pub fn run_event_channel() -> (RunEventSender, RunEventStream) {
    let (tx, rx) = mpsc::channel(STREAM_CAPACITY);
    let cancel = CancellationToken::new();
    (
        RunEventSender { tx, cancel: cancel.clone() },
        RunEventStream { rx, cancel },
    )
}

/// Producer half, held by a backend adapter.
#[derive(Clone)]
pub struct RunEventSender {
    tx: mpsc::Sender<RunEvent>,
    cancel: CancellationToken,
}

impl RunEventSender {
    /// Send one event, blocking on backpressure.
    ///
    /// Returns `StreamClosed` once the consumer cancelled or dropped the
    /// stream; the adapter should stop producing and reap its process.
    pub async fn send(&self, event: RunEvent) -> Result<(), StreamClosed> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(StreamClosed),
            sent = self.tx.send(event) => sent.map_err(|_| StreamClosed),
        }
    }

    /// Token the adapter can watch to notice cancellation mid-wait.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Consumer half, held by the engine. Finite and non-restartable.
pub struct RunEventStream {
    rx: mpsc::Receiver<RunEvent>,
    cancel: CancellationToken,
}

impl RunEventStream {
    /// Next event; `None` when the producer is done (or gone).
    pub async fn next(&mut self) -> Option<RunEvent> {
        self.rx.recv().await
    }

    /// Signal the producer to stop and terminate its subprocess.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Drop for RunEventStream {
    fn drop(&mut self) {
        // An abandoned stream must not leave the producer blocked on a
        // full buffer with a live subprocess behind it.
        self.cancel.cancel();
    }
}

#[cfg(test)]
#[path = "stream_tests.rs"]
mod tests;
