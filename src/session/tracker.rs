//! Consecutive I/O failure counting.

/// Counts I/O failures since the last connect or disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureTracker {
    count: u32,
    max: u32,
}

impl FailureTracker {
    pub fn new(max: u32) -> Self {
        Self { count: 0, max }
    }

    /// Record one failure and return the new count.
    pub fn record(&mut self) -> u32 {
        self.count = self.count.saturating_add(1);
        self.count
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    /// True once the count is at or above the maximum. A maximum of zero
    /// behaves like one: at least one failure must have been seen.
    pub fn threshold_reached(&self) -> bool {
        self.count > 0 && self.count >= self.max
    }
}
