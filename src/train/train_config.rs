use serde::{Serialize, Deserialize};

/// Configuration for a `train_loop` run.
///
/// # Fields
/// - `epochs`    — total number of in-order passes over the training data
/// - `log_every` — emit an `info` event every this many epochs (every epoch is
///                 still reported at `debug` level); `0` disables the `info` events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub epochs: usize,
    #[serde(default)]
    pub log_every: usize,
}

impl TrainConfig {
    /// Logs roughly ten progress lines over the whole run.
    pub fn new(epochs: usize) -> Self {
        TrainConfig {
            epochs,
            log_every: (epochs / 10).max(1),
        }
    }

    pub fn with_log_every(mut self, log_every: usize) -> Self {
        self.log_every = log_every;
        self
    }
}
