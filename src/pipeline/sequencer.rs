//! Restartable infinite frame sequence with a reconnect policy.
//!
//! `StreamSequencer` owns the live stream handle and is the only place
//! that ever observes a source failure. Transient trouble (endpoint not
//! ready, read faults, faults while reopening) is absorbed by a fixed
//! interval retry loop; callers just see the next frame arrive late.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::{info, warn};

use crate::capture::{Frame, FrameSource, SourceStream, Transport};
use crate::ReconnectPolicy;

/// Lazy, effectively infinite sequence of frames from one endpoint.
///
/// The sequence never terminates voluntarily: with reconnect enabled it
/// retries forever on the policy's fixed interval, waiting for the camera
/// or network to come back. With reconnect disabled the very first
/// failure is terminal and every later pull returns `None`.
pub struct StreamSequencer<S: FrameSource> {
    source: S,
    endpoint: String,
    transport: Transport,
    policy: ReconnectPolicy,
    stream: Option<S::Stream>,
    terminated: bool,
    /// Consecutive recoveries since the last good frame
    retries: u32,
    reconnects: Arc<AtomicU64>,
}

impl<S: FrameSource> StreamSequencer<S> {
    pub fn new(
        source: S,
        endpoint: impl Into<String>,
        transport: Transport,
        policy: ReconnectPolicy,
    ) -> Self {
        Self {
            source,
            endpoint: endpoint.into(),
            transport,
            policy,
            stream: None,
            terminated: false,
            retries: 0,
            reconnects: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of recovery cycles performed so far.
    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    /// Shared handle to the recovery counter, for session stats.
    pub(crate) fn reconnect_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.reconnects)
    }

    /// Close the stream, then either back off for a retry or terminate
    /// the whole sequence, depending on the policy.
    fn recover(&mut self, cause: &str) {
        if let Some(mut stream) = self.stream.take() {
            stream.close();
        }

        if !self.policy.enabled {
            warn!(endpoint = %self.endpoint, cause, "stream failed, reconnect disabled, terminating");
            self.terminated = true;
            return;
        }

        if let Some(max) = self.policy.max_retries {
            if self.retries >= max {
                warn!(
                    endpoint = %self.endpoint,
                    cause,
                    retries = self.retries,
                    "retry budget exhausted, terminating"
                );
                self.terminated = true;
                return;
            }
        }

        self.retries += 1;
        self.reconnects.fetch_add(1, Ordering::Relaxed);
        warn!(
            endpoint = %self.endpoint,
            cause,
            backoff_ms = self.policy.backoff_ms,
            "stream not delivering, reconnecting after backoff"
        );
        thread::sleep(self.policy.backoff());
    }
}

impl<S: FrameSource> Iterator for StreamSequencer<S> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        while !self.terminated {
            if self.stream.is_none() {
                match self.source.open(&self.endpoint, self.transport) {
                    Ok(stream) => {
                        info!(endpoint = %self.endpoint, "stream opened");
                        self.stream = Some(stream);
                    }
                    Err(e) => {
                        self.recover(&format!("open failed: {e}"));
                        continue;
                    }
                }
            }

            let pulled = match self.stream.as_mut() {
                Some(stream) if !stream.is_ready() => Err("not ready".to_owned()),
                Some(stream) => match stream.read_frame() {
                    Ok(Some(frame)) => Ok(frame),
                    Ok(None) => Err("no frame available".to_owned()),
                    Err(e) => Err(format!("read fault: {e}")),
                },
                None => continue,
            };

            match pulled {
                Ok(frame) => {
                    self.retries = 0;
                    return Some(frame);
                }
                Err(cause) => self.recover(&cause),
            }
        }
        None
    }
}
