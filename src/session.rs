//! Public entry points: one call per session flavor.

use std::io;
use std::sync::Arc;
use std::thread;

use tracing::info;

use crate::capture::{Frame, FrameSource};
use crate::pipeline::handoff::{FetchError, FetchHandle, Shared};
use crate::pipeline::sequencer::StreamSequencer;
use crate::pipeline::worker;
use crate::SessionConfig;

/// Start a non-blocking capture session.
///
/// Spawns the dedicated capture thread and returns the fetch handle for
/// it. The worker opens the stream lazily, keeps it warm, and reconnects
/// on its own; `FetchHandle::fetch` always hands back a frame captured
/// after the call was made. Exactly one logical consumer may fetch at a
/// time.
///
/// The worker thread winds down when the handle is dropped, or on its own
/// when the sequence terminates (reconnect disabled, or the retry budget
/// ran out).
pub fn run_nonblocking<S: FrameSource>(
    source: S,
    config: SessionConfig,
) -> io::Result<FetchHandle> {
    info!(endpoint = %config.endpoint, transport = ?config.transport, "starting non-blocking session");

    let frames = StreamSequencer::new(source, config.endpoint, config.transport, config.reconnect);
    let reconnects = frames.reconnect_counter();
    let shared = Arc::new(Shared::new());
    let (slot_tx, slot_rx) = flume::bounded(1);

    let worker_shared = Arc::clone(&shared);
    thread::Builder::new()
        .name("argus-capture".into())
        .spawn(move || worker::run(frames, worker_shared, slot_tx))?;

    Ok(FetchHandle::new(shared, slot_rx, reconnects))
}

/// Start a blocking capture session: no worker thread, no discarding.
///
/// Every `fetch` pulls the next frame straight off the stream on the
/// caller's thread. If the caller is slower than the stream, whatever the
/// source buffers internally piles up and latency grows without bound -
/// prefer [`run_nonblocking`] whenever freshness matters.
pub fn run_blocking<S: FrameSource>(source: S, config: SessionConfig) -> BlockingFetch<S> {
    info!(endpoint = %config.endpoint, transport = ?config.transport, "starting blocking session");

    BlockingFetch {
        frames: StreamSequencer::new(source, config.endpoint, config.transport, config.reconnect),
    }
}

/// Degenerate fetch path that bypasses the worker and the handoff.
pub struct BlockingFetch<S: FrameSource> {
    frames: StreamSequencer<S>,
}

impl<S: FrameSource> BlockingFetch<S> {
    /// Next frame in stream order, or [`FetchError::StreamEnded`] once the
    /// sequence has terminated.
    pub fn fetch(&mut self) -> Result<Frame, FetchError> {
        self.frames.next().ok_or(FetchError::StreamEnded)
    }

    /// Recovery cycles the underlying sequencer has gone through.
    pub fn reconnects(&self) -> u64 {
        self.frames.reconnects()
    }
}
