pub mod frame;
pub mod source;

#[cfg(feature = "gst-source")]
pub mod gst;

pub use frame::{Frame, FrameMeta, PixelFormat};
pub use source::{FrameSource, SourceError, SourceStream, Transport};

#[cfg(feature = "gst-source")]
pub use gst::GstSource;
