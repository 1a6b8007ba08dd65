//! GStreamer-backed RTSP frame source.
//!
//! Builds an `rtspsrc ! decodebin ! videoconvert ! appsink` pipeline per
//! stream and hands out decoded RGB frames. Transport selection maps onto
//! rtspsrc's `protocols` property instead of any process-wide state.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use tracing::{debug, info};

use crate::capture::frame::{Frame, FrameMeta, PixelFormat};
use crate::capture::source::{FrameSource, SourceError, SourceStream, Transport};

/// How long a single pull waits before reporting "no frame yet"
const PULL_TIMEOUT: gst::ClockTime = gst::ClockTime::from_mseconds(500);

/// Frame source backed by a GStreamer RTSP pipeline
pub struct GstSource;

impl GstSource {
    pub fn new() -> Result<Self, SourceError> {
        gst::init().map_err(SourceError::init)?;
        Ok(Self)
    }

    /// Build the pipeline string for an endpoint
    fn pipeline_string(endpoint: &str, transport: Transport) -> String {
        let protocols = match transport {
            Transport::Udp => "udp",
            Transport::Tcp => "tcp",
        };

        format!(
            "rtspsrc location={} protocols={} latency=0 name=source ! \
             decodebin ! \
             videoconvert ! \
             video/x-raw,format=RGB ! \
             queue max-size-buffers=2 max-size-time=0 max-size-bytes=0 ! \
             appsink name=appsink",
            endpoint, protocols
        )
    }
}

impl FrameSource for GstSource {
    type Stream = GstStream;

    fn open(&self, endpoint: &str, transport: Transport) -> Result<Self::Stream, SourceError> {
        let pipeline_str = Self::pipeline_string(endpoint, transport);
        info!("Pipeline: {}", pipeline_str);

        let pipeline = gst::parse::launch(&pipeline_str)
            .map_err(|e| SourceError::open(endpoint, e))?
            .downcast::<gst::Pipeline>()
            .map_err(|_| SourceError::open(endpoint, "parsed element is not a pipeline"))?;

        let appsink = pipeline
            .by_name("appsink")
            .ok_or_else(|| SourceError::open(endpoint, "appsink element not found"))?
            .downcast::<gst_app::AppSink>()
            .map_err(|_| SourceError::open(endpoint, "failed to cast to AppSink"))?;

        // Keep only the freshest buffers; stale video is worse than dropped video
        appsink.set_property("emit-signals", false);
        appsink.set_property("max-buffers", 3u32);
        appsink.set_property("drop", true);
        appsink.set_property("sync", false);

        pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| SourceError::open(endpoint, e))?;

        debug!("RTSP pipeline opened for {}", endpoint);

        Ok(GstStream {
            pipeline,
            appsink,
            sequence: 0,
        })
    }
}

/// A live RTSP connection delivering decoded RGB frames
pub struct GstStream {
    pipeline: gst::Pipeline,
    appsink: gst_app::AppSink,
    sequence: u64,
}

impl SourceStream for GstStream {
    fn is_ready(&self) -> bool {
        let (_, state, _) = self.pipeline.state(Some(gst::ClockTime::ZERO));
        state == gst::State::Playing && !self.appsink.is_eos()
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        let captured_at = Instant::now();

        let Some(sample) = self.appsink.try_pull_sample(PULL_TIMEOUT) else {
            if self.appsink.is_eos() {
                return Err(SourceError::read("stream signalled end of stream"));
            }
            return Ok(None);
        };

        let buffer = sample
            .buffer()
            .ok_or_else(|| SourceError::read("sample contains no buffer"))?;

        let map = buffer
            .map_readable()
            .map_err(|e| SourceError::read(e))?;
        let data = Bytes::copy_from_slice(map.as_slice());

        let caps = sample
            .caps()
            .ok_or_else(|| SourceError::read("sample has no caps"))?;
        let video_info =
            gst_video::VideoInfo::from_caps(caps).map_err(|e| SourceError::read(e))?;

        self.sequence += 1;

        let meta = Arc::new(FrameMeta {
            sequence: self.sequence,
            width: video_info.width(),
            height: video_info.height(),
            format: PixelFormat::Rgb24, // output is always RGB after conversion
        });

        Ok(Some(Frame {
            data,
            meta,
            captured_at,
        }))
    }

    fn close(&mut self) {
        debug!("Stopping RTSP pipeline");
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}

impl Drop for GstStream {
    fn drop(&mut self) {
        self.close();
    }
}
