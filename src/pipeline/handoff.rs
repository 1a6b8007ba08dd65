//! Consumer side of the request/feedback handoff.
//!
//! One atomic flag says "a consumer wants the next frame"; one bounded(1)
//! channel carries the frame back. At most one request may be outstanding
//! at any time - a second concurrent `fetch` is a programming error and is
//! rejected loudly instead of racing for the slot.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam::utils::CachePadded;
use thiserror::Error;
use tracing::error;

use crate::capture::Frame;

/// Fetch failures - either caller misuse or a stream that ended for good.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FetchError {
    /// A fetch was issued while another one was still in flight.
    #[error("a fetch is already in flight; at most one outstanding request is supported")]
    AlreadyRequested,

    /// The previous frame was produced but never picked up.
    #[error("the feedback slot still holds an unclaimed frame")]
    SlotOccupied,

    /// The sequence terminated (reconnect disabled or retry budget spent).
    #[error("the stream has ended; no more frames will be produced")]
    StreamEnded,
}

/// State shared between the capture worker and the fetch handle.
pub(crate) struct Shared {
    /// Request Signal: set by the consumer, cleared by the worker
    requested: AtomicBool,
    stats: CachePadded<Counters>,
}

#[derive(Default)]
struct Counters {
    discarded: AtomicU64,
    delivered: AtomicU64,
}

impl Shared {
    pub(crate) fn new() -> Self {
        Self {
            requested: AtomicBool::new(false),
            stats: CachePadded::new(Counters::default()),
        }
    }

    pub(crate) fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    pub(crate) fn clear_request(&self) {
        self.requested.store(false, Ordering::Release);
    }

    pub(crate) fn count_discarded(&self) {
        self.stats.discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn count_delivered(&self) {
        self.stats.delivered.fetch_add(1, Ordering::Relaxed);
    }
}

/// Counters for one non-blocking session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    /// Frames pulled and dropped while no consumer was waiting
    pub discarded: u64,
    /// Frames handed to a consumer
    pub delivered: u64,
    /// Recovery cycles the sequencer has gone through
    pub reconnects: u64,
}

/// Consumer handle for a non-blocking session.
///
/// `fetch` blocks until the background worker hands over a frame captured
/// strictly after the call was made. The handle is `Sync` so it can sit in
/// an `Arc`, but the protocol stays single-requester: overlapping calls
/// fail with [`FetchError::AlreadyRequested`].
pub struct FetchHandle {
    shared: Arc<Shared>,
    slot: flume::Receiver<Frame>,
    reconnects: Arc<AtomicU64>,
}

impl FetchHandle {
    pub(crate) fn new(
        shared: Arc<Shared>,
        slot: flume::Receiver<Frame>,
        reconnects: Arc<AtomicU64>,
    ) -> Self {
        Self {
            shared,
            slot,
            reconnects,
        }
    }

    /// Block until the next fresh frame arrives and return it.
    ///
    /// There is no timeout: while the worker rides out a reconnect storm
    /// this call simply waits. Callers needing bounded latency must wrap
    /// it themselves.
    pub fn fetch(&self) -> Result<Frame, FetchError> {
        if !self.slot.is_empty() {
            error!("fetch called while the feedback slot still holds a frame");
            return Err(FetchError::SlotOccupied);
        }
        if self.shared.requested.swap(true, Ordering::AcqRel) {
            error!("fetch called while another fetch is in flight");
            return Err(FetchError::AlreadyRequested);
        }

        match self.slot.recv() {
            Ok(frame) => Ok(frame),
            Err(_) => {
                // worker is gone; reset the flag so later calls see the
                // terminal state instead of a phantom in-flight request
                self.shared.clear_request();
                Err(FetchError::StreamEnded)
            }
        }
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            discarded: self.shared.stats.discarded.load(Ordering::Relaxed),
            delivered: self.shared.stats.delivered.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}
