use crate::geometry::ClipProjectionData;

/// Push/pop stack of clip projections.
///
/// Entries are materialized into the geometry heap lazily, the first time a
/// main object needs the top entry. `addresses[i]` caches where entry `i`
/// lives for the current geometry epoch and is cleared whenever the heap resets.
#[derive(Debug, Default)]
pub(crate) struct ClipProjectionStack {
    pending: Vec<ClipProjectionData>,
    addresses: Vec<Option<u64>>,
}

impl ClipProjectionStack {
    pub(crate) fn push(&mut self, data: ClipProjectionData) {
        self.pending.push(data);
        self.addresses.push(None);
    }

    /// Popping an empty stack is a no-op.
    pub(crate) fn pop(&mut self) -> Option<ClipProjectionData> {
        self.addresses.pop();
        self.pending.pop()
    }

    #[inline]
    pub(crate) fn depth(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    pub(crate) fn top(&self) -> Option<&ClipProjectionData> {
        self.pending.last()
    }

    /// Cached address of the top entry, if it was materialized this epoch.
    #[inline]
    pub(crate) fn top_address(&self) -> Option<u64> {
        self.addresses.last().copied().flatten()
    }

    pub(crate) fn set_top_address(&mut self, address: u64) {
        if let Some(slot) = self.addresses.last_mut() {
            *slot = Some(address);
        }
    }

    /// Drops every cached address; called when the geometry heap resets.
    pub(crate) fn invalidate_addresses(&mut self) {
        self.addresses.iter_mut().for_each(|a| *a = None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_starts_unmaterialized() {
        let mut s = ClipProjectionStack::default();
        s.push(ClipProjectionData::default());
        assert_eq!(s.depth(), 1);
        assert_eq!(s.top_address(), None);
        s.set_top_address(0x80);
        assert_eq!(s.top_address(), Some(0x80));
    }

    #[test]
    fn pop_removes_entry_and_address() {
        let mut s = ClipProjectionStack::default();
        s.push(ClipProjectionData::default());
        s.set_top_address(0x10);
        s.push(ClipProjectionData::scale_translate(2.0, 2.0, 0.0, 0.0));
        s.pop();
        assert_eq!(s.depth(), 1);
        assert_eq!(s.top_address(), Some(0x10));
        s.pop();
        assert!(s.pop().is_none());
        assert_eq!(s.top_address(), None);
    }

    #[test]
    fn invalidate_clears_every_level() {
        let mut s = ClipProjectionStack::default();
        s.push(ClipProjectionData::default());
        s.set_top_address(0x10);
        s.push(ClipProjectionData::default());
        s.set_top_address(0x68);
        s.invalidate_addresses();
        assert_eq!(s.top_address(), None);
        s.pop();
        assert_eq!(s.top_address(), None);
    }
}
