use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One decoded frame with zero-copy semantics
#[derive(Debug, Clone)]
pub struct Frame {
    /// Immutable pixel data - can be shared across threads without copying
    pub data: Bytes,

    /// Frame metadata
    pub meta: Arc<FrameMeta>,

    /// Capture timestamp for freshness and latency tracking
    pub captured_at: Instant,
}

impl Frame {
    /// Time elapsed since this frame was read off the stream.
    pub fn age(&self) -> Duration {
        self.captured_at.elapsed()
    }
}

/// Frame metadata
#[derive(Debug, Clone)]
pub struct FrameMeta {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

/// Decoded pixel formats we hand out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Rgb24,
    Bgr24,
    Nv12,
}
