//! Byte-range accounting for a single stream.
//!
//! A [`RangeWindow`] tracks how much of the configured `start..=end` range
//! is still eligible to be read. Two cursors back it: an explicit position,
//! present only when `start` was configured, and a count of bytes actually
//! delivered. The explicit position advances optimistically when a read is
//! issued; the delivered count advances only when a read completes. Whichever
//! cursor is in use, the remaining budget is recomputed from it before every
//! read, so a bounded stream never requests bytes past `end`.

/// Remaining-range bookkeeping for one stream.
#[derive(Debug, Clone)]
pub(crate) struct RangeWindow {
    /// Inclusive upper bound, if the stream is bounded above.
    end: Option<u64>,
    /// Next explicit read position. `None` leaves positioning to the
    /// source's own cursor.
    pos: Option<u64>,
    /// Total bytes delivered so far.
    bytes_read: u64,
}

impl RangeWindow {
    pub(crate) fn new(start: Option<u64>, end: Option<u64>) -> Self {
        Self {
            end,
            pos: start,
            bytes_read: 0,
        }
    }

    /// Bytes still eligible to be read, or `None` when unbounded.
    pub(crate) fn remaining(&self) -> Option<u64> {
        let end = self.end?;
        let cursor = self.pos.unwrap_or(self.bytes_read);
        Some(end.saturating_add(1).saturating_sub(cursor))
    }

    /// Whether a bounded window has been fully consumed.
    pub(crate) fn is_exhausted(&self) -> bool {
        self.remaining() == Some(0)
    }

    /// Clips a requested read length to the remaining budget.
    pub(crate) fn clip(&self, len: usize) -> usize {
        match self.remaining() {
            Some(remaining) => {
                let remaining = usize::try_from(remaining).unwrap_or(usize::MAX);
                len.min(remaining)
            }
            None => len,
        }
    }

    /// Position for the next read. `None` means the source reads at its
    /// own cursor.
    pub(crate) fn position(&self) -> Option<u64> {
        self.pos
    }

    /// Advances the explicit position by an issued read's length.
    ///
    /// Called when the read is issued, not when it completes, so that
    /// positions are handed out in order even when reads overlap.
    pub(crate) fn advance(&mut self, len: usize) {
        if let Some(pos) = &mut self.pos {
            *pos = pos.saturating_add(len as u64);
        }
    }

    /// Records bytes actually delivered by a completed read.
    pub(crate) fn record(&mut self, len: usize) {
        self.bytes_read += len as u64;
    }

    /// Total bytes delivered so far.
    pub(crate) fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_window_never_clips() {
        let window = RangeWindow::new(None, None);
        assert_eq!(window.remaining(), None);
        assert!(!window.is_exhausted());
        assert_eq!(window.clip(usize::MAX), usize::MAX);
    }

    #[test]
    fn test_position_mode_budget() {
        // start=2, end=4 covers the three bytes 2, 3, 4
        let mut window = RangeWindow::new(Some(2), Some(4));
        assert_eq!(window.remaining(), Some(3));
        assert_eq!(window.clip(100), 3);
        assert_eq!(window.position(), Some(2));

        window.advance(3);
        window.record(3);
        assert_eq!(window.position(), Some(5));
        assert!(window.is_exhausted());
        assert_eq!(window.clip(100), 0);
    }

    #[test]
    fn test_count_mode_budget() {
        // end without start: budget tracks delivered bytes, positioning is
        // left to the source cursor
        let mut window = RangeWindow::new(None, Some(4));
        assert_eq!(window.position(), None);
        assert_eq!(window.remaining(), Some(5));

        window.advance(5);
        assert_eq!(window.position(), None, "advance is a no-op without start");
        assert_eq!(window.remaining(), Some(5), "budget moves on completion only");

        window.record(5);
        assert!(window.is_exhausted());
    }

    #[test]
    fn test_optimistic_advance_outruns_completion() {
        // The explicit position moves at issue time, so a second overlapping
        // read is positioned after the first even before it completes.
        let mut window = RangeWindow::new(Some(0), None);
        assert_eq!(window.position(), Some(0));
        window.advance(1024);
        assert_eq!(window.position(), Some(1024));
        assert_eq!(window.bytes_read(), 0);

        window.record(1000);
        assert_eq!(window.bytes_read(), 1000);
        assert_eq!(window.position(), Some(1024));
    }

    #[test]
    fn test_start_beyond_end_of_source_is_not_a_window_concern() {
        // The window happily positions past any real source; the read itself
        // reports end-of-data.
        let window = RangeWindow::new(Some(1_000_000), None);
        assert_eq!(window.remaining(), None);
        assert_eq!(window.clip(64), 64);
    }

    #[test]
    fn test_short_final_read_keeps_budget_exact() {
        let mut window = RangeWindow::new(None, Some(9));
        assert_eq!(window.clip(8), 8);
        window.record(8);
        assert_eq!(window.remaining(), Some(2));
        window.record(2);
        assert!(window.is_exhausted());
    }
}
