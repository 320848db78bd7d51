//! Progress bookkeeping recorded by checkpoints.

use std::time::Instant;

/// State for tracking checkpoint progress.
///
/// Every call to [`Cx::checkpoint`](crate::cx::Cx::checkpoint) records here,
/// whether or not cancellation is observed. This makes it possible to tell
/// from a test (or a stalled-task report) that an operation actually reached a
/// cancellation point.
#[derive(Debug, Clone, Default)]
pub struct CheckpointState {
    /// The timestamp of the last checkpoint.
    pub last_checkpoint: Option<Instant>,
    /// The message from the last `checkpoint_with()` call.
    pub last_message: Option<String>,
    /// The total number of checkpoints recorded.
    pub checkpoint_count: u64,
}

impl CheckpointState {
    /// Creates a new checkpoint state with no recorded checkpoints.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a checkpoint without a message.
    pub fn record(&mut self) {
        self.last_checkpoint = Some(Instant::now());
        self.last_message = None;
        self.checkpoint_count += 1;
    }

    /// Records a checkpoint with a message.
    pub fn record_with_message(&mut self, message: String) {
        self.last_checkpoint = Some(Instant::now());
        self.last_message = Some(message);
        self.checkpoint_count += 1;
    }
}
