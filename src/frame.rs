//! Frame numbering.
//!
//! Batchers reset their per-frame staging state at the first `begin()` of a
//! new frame. They detect "new frame" by comparing the [`FrameIndex`] handed
//! to `begin()` with the one they saw last. The counter that produces those
//! indices is owned by the application (one per surface / render loop), so
//! unrelated render loops never share hidden state.

/// Monotonic frame number handed to `begin()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FrameIndex(pub u64);

impl FrameIndex {
    #[inline]
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Produces consecutive [`FrameIndex`] values.
#[derive(Debug, Default)]
pub struct FrameCounter {
    current: u64,
}

impl FrameCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The index of the frame currently being recorded.
    #[inline]
    #[must_use]
    pub fn current(&self) -> FrameIndex {
        FrameIndex(self.current)
    }

    /// Moves to the next frame and returns its index.
    pub fn advance(&mut self) -> FrameIndex {
        self.current += 1;
        FrameIndex(self.current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_is_monotonic() {
        let mut counter = FrameCounter::new();
        let first = counter.current();
        let second = counter.advance();
        assert!(second > first);
        assert_eq!(counter.current(), second);
        assert_eq!(counter.advance().get(), 2);
    }
}
