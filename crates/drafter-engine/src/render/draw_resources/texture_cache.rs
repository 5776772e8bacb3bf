use std::num::NonZeroUsize;

use lru::LruCache;

use crate::geometry::INVALID_TEXTURE_IDX;

/// Content hash identifying an uploaded texture.
pub type TextureHash = u64;

/// Cache entry: texture-array slot + the submission that last sampled it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TextureReference {
    /// `INVALID_TEXTURE_IDX` until a slot is assigned.
    pub alloc_idx: u32,
    pub last_used_signal_value: u64,
}

/// Entry pushed out of the cache. Its slot may only be reused once the GPU
/// has signalled `last_used_signal_value`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EvictionRequest {
    pub hash: TextureHash,
    pub slot: u32,
    pub last_used_signal_value: u64,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TextureInsert {
    /// Already resident; no upload needed.
    Hit(TextureReference),
    /// New entry without a slot. The caller assigns one and queues the copy.
    Miss { evicted: Option<EvictionRequest> },
}

/// Bounded LRU mapping content hashes to texture-array slots.
pub struct TextureLruCache {
    entries: LruCache<TextureHash, TextureReference>,
}

impl TextureLruCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self { entries: LruCache::new(capacity) }
    }

    #[inline]
    pub fn contains(&self, hash: TextureHash) -> bool {
        self.entries.contains(&hash)
    }

    /// Looks up `hash`, marking it most-recently-used by `signal_value`.
    pub fn get(&mut self, hash: TextureHash, signal_value: u64) -> Option<TextureReference> {
        let entry = self.entries.get_mut(&hash)?;
        entry.last_used_signal_value = signal_value;
        Some(*entry)
    }

    /// Inserts `hash`, evicting the least-recently-used entry when full.
    pub fn insert(&mut self, hash: TextureHash, signal_value: u64) -> TextureInsert {
        if let Some(hit) = self.get(hash, signal_value) {
            return TextureInsert::Hit(hit);
        }

        let evicted = if self.entries.len() == self.entries.cap().get() {
            self.entries.pop_lru().map(|(hash, r)| EvictionRequest {
                hash,
                slot: r.alloc_idx,
                last_used_signal_value: r.last_used_signal_value,
            })
        } else {
            None
        };

        self.entries.put(
            hash,
            TextureReference {
                alloc_idx: INVALID_TEXTURE_IDX,
                last_used_signal_value: signal_value,
            },
        );
        TextureInsert::Miss { evicted }
    }

    /// Records the slot chosen for a freshly inserted entry. Does not touch recency.
    pub fn assign_slot(&mut self, hash: TextureHash, slot: u32) {
        if let Some(entry) = self.entries.peek_mut(&hash) {
            entry.alloc_idx = slot;
        }
    }
}

#[derive(Debug, Copy, Clone)]
struct DeferredFree {
    slot: u32,
    wait_value: u64,
}

/// Hands out texture-array layers, holding freed layers back until the GPU
/// has finished the last submission that could sample them.
#[derive(Debug)]
pub(crate) struct TextureSlotAllocator {
    capacity: u32,
    next_fresh: u32,
    free: Vec<u32>,
    deferred: Vec<DeferredFree>,
}

impl TextureSlotAllocator {
    pub(crate) fn new(capacity: u32) -> Self {
        Self {
            capacity,
            next_fresh: 0,
            free: Vec::new(),
            deferred: Vec::new(),
        }
    }

    pub(crate) fn allocate(&mut self, completed_signal_value: u64) -> Option<u32> {
        self.reclaim(completed_signal_value);
        if let Some(slot) = self.free.pop() {
            return Some(slot);
        }
        if self.next_fresh < self.capacity {
            let slot = self.next_fresh;
            self.next_fresh += 1;
            return Some(slot);
        }
        None
    }

    pub(crate) fn deferred_free(&mut self, slot: u32, wait_value: u64) {
        if slot == INVALID_TEXTURE_IDX {
            return;
        }
        self.deferred.push(DeferredFree { slot, wait_value });
    }

    /// Smallest signal value that would release a deferred slot.
    pub(crate) fn earliest_wait(&self) -> Option<u64> {
        self.deferred.iter().map(|d| d.wait_value).min()
    }

    fn reclaim(&mut self, completed_signal_value: u64) {
        let free = &mut self.free;
        self.deferred.retain(|d| {
            if d.wait_value <= completed_signal_value {
                free.push(d.slot);
                false
            } else {
                true
            }
        });
    }
}
