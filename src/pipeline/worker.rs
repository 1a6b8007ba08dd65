//! Background capture worker: latest-frame-wins production.
//!
//! The worker keeps pulling frames even when nobody is listening, so the
//! decode pipeline stays warm and no backlog builds up inside the source.
//! Frames pulled while idle are dropped on the floor; the first pull after
//! a request is observed is the one handed over.

use std::sync::Arc;

use tracing::debug;

use crate::capture::{Frame, FrameSource};
use crate::pipeline::handoff::Shared;
use crate::pipeline::sequencer::StreamSequencer;

pub(crate) fn run<S: FrameSource>(
    mut frames: StreamSequencer<S>,
    shared: Arc<Shared>,
    slot: flume::Sender<Frame>,
) {
    debug!("capture worker started");

    loop {
        // Discard until a consumer asks; stop if the session was torn down
        while !shared.is_requested() {
            if slot.is_disconnected() {
                debug!("all fetch handles dropped, capture worker exiting");
                return;
            }
            if frames.next().is_none() {
                debug!("sequence terminated, capture worker exiting");
                return;
            }
            shared.count_discarded();
        }

        // This pull happens strictly after the request was observed, so the
        // handed-over frame is always fresher than the request itself.
        match frames.next() {
            Some(frame) => {
                if slot.send(frame).is_err() {
                    debug!("consumer hung up mid-request, capture worker exiting");
                    return;
                }
                shared.count_delivered();
                shared.clear_request();
            }
            None => {
                debug!("sequence terminated mid-request, capture worker exiting");
                return;
            }
        }
    }
}
