//! Configuration types for stream sources

/// Buffer configuration for `BufferSource`
#[derive(Debug, Clone, PartialEq)]
pub struct BufferConfig {
    pub initial_capacity: usize,
    /// Pushes that would grow the buffer beyond this fail with
    /// `StreamError::BackpressureOverflow`
    pub max_capacity: Option<usize>,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 16,
            max_capacity: None,
        }
    }
}

impl BufferConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of slots allocated up front
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Bound the buffer
    pub fn max_capacity(mut self, capacity: usize) -> Self {
        self.max_capacity = Some(capacity);
        self
    }
}

/// Clock configuration for `TimeSource`
#[derive(Debug, Clone, PartialEq)]
pub struct ClockConfig {
    /// Seconds added to `now()` to estimate the first frame time when the
    /// scheduler exposes no current frame time
    pub frame_lookahead: f64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            frame_lookahead: 0.08,
        }
    }
}

impl ClockConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame_lookahead(mut self, seconds: f64) -> Self {
        self.frame_lookahead = seconds;
        self
    }
}
