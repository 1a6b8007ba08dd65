pub mod handoff;
pub mod sequencer;
pub(crate) mod worker;

pub use handoff::{FetchError, FetchHandle, SessionStats};
pub use sequencer::StreamSequencer;
