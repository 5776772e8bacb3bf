use bytemuck::Pod;

use super::region::RegionState;

/// CPU mirror of a fixed-capacity array of GPU records.
#[derive(Debug)]
pub(crate) struct StagingArray<T: Pod> {
    items: Vec<T>,
    state: RegionState,
}

impl<T: Pod> StagingArray<T> {
    pub(crate) fn new(max: u32) -> Self {
        Self {
            items: Vec::with_capacity(max as usize),
            state: RegionState::with_max(max as u64),
        }
    }

    #[inline]
    pub(crate) fn state(&self) -> RegionState {
        self.state
    }

    #[inline]
    pub(crate) fn len(&self) -> u32 {
        self.items.len() as u32
    }

    #[inline]
    pub(crate) fn remaining(&self) -> u32 {
        self.state.remaining() as u32
    }

    #[inline]
    pub(crate) fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Appends `item`, or returns `None` when the region is full.
    pub(crate) fn try_push(&mut self, item: T) -> Option<u32> {
        if self.state.is_exhausted(1) {
            return None;
        }
        let idx = self.len();
        self.items.push(item);
        self.state.advance(1);
        Some(idx)
    }

    /// Caller must have checked `remaining()`.
    pub(crate) fn push(&mut self, item: T) {
        let pushed = self.try_push(item);
        debug_assert!(pushed.is_some(), "staging array overflow");
    }

    #[inline]
    pub(crate) fn get(&self, idx: u32) -> Option<&T> {
        self.items.get(idx as usize)
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, idx: u32) -> Option<&mut T> {
        self.items.get_mut(idx as usize)
    }

    /// Pending `(byte_offset, bytes)` delta, `None` when nothing changed.
    pub(crate) fn pending_upload(&self) -> Option<(u64, &[u8])> {
        let range = self.state.pending();
        if range.is_empty() {
            return None;
        }
        let items = &self.items[range.start as usize..range.end as usize];
        Some((range.start * size_of::<T>() as u64, bytemuck::cast_slice(items)))
    }

    #[inline]
    pub(crate) fn mark_flushed(&mut self) {
        self.state.mark_flushed();
    }

    #[inline]
    pub(crate) fn rewind_in_memory(&mut self, idx: u32) {
        self.state.rewind_in_memory(idx as u64);
    }

    pub(crate) fn reset(&mut self) {
        self.items.clear();
        self.state.reset();
    }
}

/// Append-only byte arena mirroring the geometry buffer.
///
/// Every write returns the absolute device address `base_address + offset`.
#[derive(Debug)]
pub(crate) struct GeometryArena {
    bytes: Vec<u8>,
    base_address: u64,
    state: RegionState,
}

impl GeometryArena {
    pub(crate) fn new(size: u64, base_address: u64) -> Self {
        Self {
            bytes: Vec::with_capacity(size as usize),
            base_address,
            state: RegionState::with_max(size),
        }
    }

    #[inline]
    pub(crate) fn state(&self) -> RegionState {
        self.state
    }

    #[inline]
    pub(crate) fn remaining_capacity(&self) -> u64 {
        self.state.remaining()
    }

    /// How many whole `stride`-byte entries still fit.
    #[inline]
    pub(crate) fn remaining_entries(&self, stride: u64) -> u64 {
        self.remaining_capacity() / stride
    }

    /// Address the next write will land at.
    #[inline]
    pub(crate) fn next_address(&self) -> u64 {
        self.base_address + self.state.current
    }

    #[inline]
    pub(crate) fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn write_bytes(&mut self, data: &[u8]) -> Option<u64> {
        if self.state.is_exhausted(data.len() as u64) {
            return None;
        }
        let address = self.next_address();
        self.bytes.extend_from_slice(data);
        self.state.advance(data.len() as u64);
        Some(address)
    }

    #[inline]
    pub(crate) fn write<T: Pod>(&mut self, items: &[T]) -> Option<u64> {
        self.write_bytes(bytemuck::cast_slice(items))
    }

    pub(crate) fn pending_upload(&self) -> Option<(u64, &[u8])> {
        let range = self.state.pending();
        if range.is_empty() {
            return None;
        }
        Some((range.start, &self.bytes[range.start as usize..range.end as usize]))
    }

    #[inline]
    pub(crate) fn mark_flushed(&mut self) {
        self.state.mark_flushed();
    }

    pub(crate) fn reset(&mut self) {
        self.bytes.clear();
        self.state.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{LinePointInfo, LINE_POINT_SIZE};

    // ── StagingArray ──────────────────────────────────────────────────────

    #[test]
    fn array_rejects_push_when_full() {
        let mut a = StagingArray::<u32>::new(2);
        assert_eq!(a.try_push(10), Some(0));
        assert_eq!(a.try_push(11), Some(1));
        assert_eq!(a.try_push(12), None);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn array_pending_upload_is_the_unflushed_tail() {
        let mut a = StagingArray::<u32>::new(8);
        a.push(1);
        a.push(2);
        a.mark_flushed();
        a.push(3);

        let (offset, bytes) = a.pending_upload().unwrap();
        assert_eq!(offset, 8);
        assert_eq!(bytes, bytemuck::bytes_of(&3u32));

        a.mark_flushed();
        assert!(a.pending_upload().is_none());
    }

    // ── GeometryArena ─────────────────────────────────────────────────────

    #[test]
    fn arena_addresses_are_base_plus_offset() {
        let mut g = GeometryArena::new(1024, 0x1000);
        let a = g.write(&[LinePointInfo::new(0.0, 0.0)]).unwrap();
        let b = g.write(&[LinePointInfo::new(1.0, 0.0)]).unwrap();
        assert_eq!(a, 0x1000);
        assert_eq!(b, 0x1000 + LINE_POINT_SIZE);
        assert_eq!(g.next_address(), 0x1000 + 2 * LINE_POINT_SIZE);
    }

    #[test]
    fn arena_refuses_partial_writes() {
        let mut g = GeometryArena::new(30, 0);
        assert!(g.write(&[LinePointInfo::default()]).is_some());
        assert!(g.write(&[LinePointInfo::default()]).is_none());
        assert_eq!(g.remaining_capacity(), 6);
        assert_eq!(g.remaining_entries(LINE_POINT_SIZE), 0);
    }

    #[test]
    fn arena_reset_restarts_at_base() {
        let mut g = GeometryArena::new(64, 0x40);
        g.write_bytes(&[1, 2, 3, 4]).unwrap();
        g.mark_flushed();
        g.reset();
        assert_eq!(g.next_address(), 0x40);
        assert!(g.pending_upload().is_none());
    }
}
