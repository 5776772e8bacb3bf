/// Fill state of one fixed-capacity region.
///
/// Units are region-specific (elements for arrays, bytes for the geometry heap).
///
/// Invariant: `in_memory <= current <= max`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct RegionState {
    /// Written since the last reset.
    pub current: u64,
    /// Already copied to the device buffer.
    pub in_memory: u64,
    pub max: u64,
}

impl RegionState {
    #[inline]
    pub const fn with_max(max: u64) -> Self {
        Self { current: 0, in_memory: 0, max }
    }

    #[inline]
    pub fn remaining(&self) -> u64 {
        self.max - self.current
    }

    /// `true` when `n` more units would overflow.
    #[inline]
    pub fn is_exhausted(&self, n: u64) -> bool {
        self.current + n > self.max
    }

    /// Range `[in_memory, current)` that still has to be uploaded.
    #[inline]
    pub fn pending(&self) -> std::ops::Range<u64> {
        self.in_memory..self.current
    }

    #[inline]
    pub fn advance(&mut self, n: u64) {
        debug_assert!(!self.is_exhausted(n), "region overflow: {self:?} + {n}");
        self.current += n;
    }

    #[inline]
    pub fn mark_flushed(&mut self) {
        self.in_memory = self.current;
    }

    /// Forces `[to, current)` to be uploaded again on the next flush.
    #[inline]
    pub fn rewind_in_memory(&mut self, to: u64) {
        self.in_memory = self.in_memory.min(to);
    }

    #[inline]
    pub fn reset(&mut self) {
        self.current = 0;
        self.in_memory = 0;
    }

    #[inline]
    pub fn holds_invariant(&self) -> bool {
        self.in_memory <= self.current && self.current <= self.max
    }
}

/// Snapshot of every region, in flush order.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct RegionStates {
    pub main_objects: RegionState,
    pub draw_objects: RegionState,
    pub geometry: RegionState,
    pub line_styles: RegionState,
}

impl RegionStates {
    pub fn all(&self) -> [RegionState; 4] {
        [self.main_objects, self.draw_objects, self.geometry, self.line_styles]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhaustion_is_strictly_greater_than_max() {
        let mut r = RegionState::with_max(4);
        r.advance(3);
        assert!(!r.is_exhausted(1));
        assert!(r.is_exhausted(2));
        assert_eq!(r.remaining(), 1);
    }

    #[test]
    fn flush_then_rewind_reuploads_tail() {
        let mut r = RegionState::with_max(8);
        r.advance(5);
        r.mark_flushed();
        assert!(r.pending().is_empty());

        r.rewind_in_memory(2);
        assert_eq!(r.pending(), 2..5);

        // Rewinding past the resident tail never moves in_memory forward.
        r.rewind_in_memory(4);
        assert_eq!(r.pending(), 2..5);
        assert!(r.holds_invariant());
    }

    #[test]
    fn reset_keeps_max() {
        let mut r = RegionState::with_max(8);
        r.advance(8);
        r.mark_flushed();
        r.reset();
        assert_eq!(r, RegionState::with_max(8));
    }
}
