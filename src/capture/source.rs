//! The video-capture collaborator boundary.
//!
//! Everything that actually talks to the network and decodes video lives
//! behind [`FrameSource`]. The pipeline only ever asks three questions:
//! can you open a stream, is it ready, and give me the next frame.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::frame::Frame;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// RTSP transport selection, fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Unordered, low-latency delivery. The usual choice for live viewing.
    #[default]
    Udp,
    /// Ordered, reliable delivery. Survives lossy networks at the cost of latency.
    Tcp,
}

/// Errors reported by a frame source implementation.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to initialize capture backend")]
    Init(#[source] BoxError),

    #[error("failed to open stream at {endpoint}")]
    Open {
        endpoint: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to read frame")]
    Read(#[source] BoxError),
}

impl SourceError {
    pub fn init(source: impl Into<BoxError>) -> Self {
        Self::Init(source.into())
    }

    pub fn open(endpoint: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Open {
            endpoint: endpoint.into(),
            source: source.into(),
        }
    }

    pub fn read(source: impl Into<BoxError>) -> Self {
        Self::Read(source.into())
    }
}

/// Opens live streams against an endpoint.
///
/// The sequencer holds on to the source so it can reopen the stream after
/// a failure; implementations should keep `open` cheap to call repeatedly.
pub trait FrameSource: Send + 'static {
    type Stream: SourceStream;

    fn open(&self, endpoint: &str, transport: Transport) -> Result<Self::Stream, SourceError>;
}

/// A live connection delivering decoded frames.
pub trait SourceStream: Send {
    /// True if a frame can currently be read.
    fn is_ready(&self) -> bool;

    /// Next decoded frame, `Ok(None)` when the stream has nothing to give
    /// right now.
    fn read_frame(&mut self) -> Result<Option<Frame>, SourceError>;

    /// Release the connection. Called before every reconnect `open`.
    fn close(&mut self);
}
