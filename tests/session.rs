//! Cross-thread session behavior: freshness, single-requester protocol,
//! termination, and the blocking fallback path.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use argus::{
    run_blocking, run_nonblocking, FetchError, Frame, FrameMeta, FrameSource, PixelFormat,
    ReconnectPolicy, SessionConfig, SourceError, SourceStream, Transport,
};

#[derive(Clone, Copy)]
enum Step {
    NotReady,
    Fault,
}

/// Source that plays back a script of failures and then produces frames on
/// demand, at a configurable pace.
#[derive(Clone)]
struct TestSource {
    steps: Arc<Mutex<VecDeque<Step>>>,
    produced: Arc<AtomicU64>,
    read_delay: Duration,
    open_delay: Duration,
}

impl TestSource {
    fn on_demand() -> Self {
        Self::with_script([])
    }

    fn with_script(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: Arc::new(Mutex::new(steps.into_iter().collect())),
            produced: Arc::new(AtomicU64::new(0)),
            read_delay: Duration::ZERO,
            open_delay: Duration::ZERO,
        }
    }

    fn read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    fn open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    fn produced(&self) -> u64 {
        self.produced.load(Ordering::SeqCst)
    }
}

impl FrameSource for TestSource {
    type Stream = TestStream;

    fn open(&self, _endpoint: &str, _transport: Transport) -> Result<TestStream, SourceError> {
        thread::sleep(self.open_delay);
        Ok(TestStream {
            steps: Arc::clone(&self.steps),
            produced: Arc::clone(&self.produced),
            read_delay: self.read_delay,
        })
    }
}

struct TestStream {
    steps: Arc<Mutex<VecDeque<Step>>>,
    produced: Arc<AtomicU64>,
    read_delay: Duration,
}

impl SourceStream for TestStream {
    fn is_ready(&self) -> bool {
        true
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        thread::sleep(self.read_delay);
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::NotReady) => Ok(None),
            Some(Step::Fault) => Err(SourceError::read("injected fault")),
            None => {
                let sequence = self.produced.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(Some(Frame {
                    data: Bytes::from_static(&[0, 0, 0, 0]),
                    meta: Arc::new(FrameMeta {
                        sequence,
                        width: 2,
                        height: 2,
                        format: PixelFormat::Rgb24,
                    }),
                    captured_at: Instant::now(),
                }))
            }
        }
    }

    fn close(&mut self) {}
}

fn test_config() -> SessionConfig {
    let mut config = SessionConfig::new("rtsp://cam.test/stream");
    config.reconnect.backoff_ms = 5;
    config
}

#[test]
fn fetch_returns_a_frame_captured_after_the_request() {
    let source = TestSource::on_demand().read_delay(Duration::from_millis(2));
    let fetch = run_nonblocking(source, test_config()).unwrap();

    for _ in 0..3 {
        let requested_at = Instant::now();
        let frame = fetch.fetch().expect("fresh frame");
        assert!(
            frame.captured_at >= requested_at,
            "handed-over frame was captured before the request"
        );
    }
}

#[test]
fn worker_discards_frames_while_nobody_is_waiting() {
    let source = TestSource::on_demand().read_delay(Duration::from_millis(1));
    let fetch = run_nonblocking(source, test_config()).unwrap();

    // let the worker churn with no request outstanding
    thread::sleep(Duration::from_millis(50));

    let frame = fetch.fetch().expect("frame");
    let stats = fetch.stats();
    assert!(stats.discarded > 0, "idle frames should have been dropped");
    assert!(frame.meta.sequence > 1, "delivered frame must postdate the discarded ones");
    assert_eq!(stats.delivered, 1);
}

#[test]
fn overlapping_fetch_is_rejected_not_raced() {
    let source = TestSource::on_demand().read_delay(Duration::from_millis(150));
    let fetch = Arc::new(run_nonblocking(source, test_config()).unwrap());

    let (started_tx, started_rx) = std::sync::mpsc::channel();
    let first = {
        let fetch = Arc::clone(&fetch);
        thread::spawn(move || {
            started_tx.send(()).unwrap();
            fetch.fetch()
        })
    };

    // first fetch is surely in flight by now; reads take 150ms
    started_rx.recv().unwrap();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(fetch.fetch().unwrap_err(), FetchError::AlreadyRequested);

    let frame = first.join().unwrap().expect("in-flight fetch unaffected by the misuse");
    assert!(frame.meta.sequence >= 1);
    assert_eq!(fetch.stats().delivered, 1);
}

#[test]
fn session_recovers_through_transient_not_ready() {
    // endpoint needs two recovery cycles before the first good frame
    let source = TestSource::with_script([Step::NotReady, Step::NotReady])
        .open_delay(Duration::from_millis(20));
    let fetch = run_nonblocking(source, test_config()).unwrap();

    let frame = fetch.fetch().expect("a valid frame, not an error");
    // the request races the worker's very first pull: frame 1 if the
    // request landed first, frame 2 if that pull had already begun
    assert!(frame.meta.sequence <= 2);
    assert_eq!(fetch.stats().reconnects, 2);
}

#[test]
fn fetch_reports_stream_ended_when_reconnect_disabled() {
    let source = TestSource::with_script([Step::NotReady]);
    let mut config = test_config();
    config.reconnect = ReconnectPolicy::disabled();
    let fetch = run_nonblocking(source, config).unwrap();

    assert_eq!(fetch.fetch().unwrap_err(), FetchError::StreamEnded);
    // terminal state, not a stuck request
    assert_eq!(fetch.fetch().unwrap_err(), FetchError::StreamEnded);
}

#[test]
fn worker_winds_down_when_the_handle_is_dropped() {
    let source = TestSource::on_demand().read_delay(Duration::from_millis(1));
    let fetch = run_nonblocking(source.clone(), test_config()).unwrap();

    thread::sleep(Duration::from_millis(20));
    drop(fetch);

    thread::sleep(Duration::from_millis(50));
    let after_drop = source.produced();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(source.produced(), after_drop, "capture should stop with no consumers left");
}

#[test]
fn blocking_fetch_returns_frames_in_order() {
    let source = TestSource::on_demand();
    let mut fetch = run_blocking(source, test_config());

    let sequences: Vec<u64> = (0..5).map(|_| fetch.fetch().unwrap().meta.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3, 4, 5]);
}

#[test]
fn blocking_fetch_ends_when_reconnect_disabled() {
    let source = TestSource::with_script([Step::Fault]);
    let mut config = test_config();
    config.reconnect = ReconnectPolicy::disabled();
    let mut fetch = run_blocking(source, config);

    assert_eq!(fetch.fetch().unwrap_err(), FetchError::StreamEnded);
    assert_eq!(fetch.reconnects(), 0);
}

#[test]
fn stats_count_deliveries() {
    let source = TestSource::on_demand();
    let fetch = run_nonblocking(source, test_config()).unwrap();

    fetch.fetch().unwrap();
    fetch.fetch().unwrap();

    let stats = fetch.stats();
    assert_eq!(stats.delivered, 2);
    assert_eq!(stats.reconnects, 0);
}
