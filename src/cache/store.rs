//! Entry Store: fixed-capacity table of cache entries. Pure storage, no
//! policy — lookup, admission, and eviction decisions live in
//! `cache::engine`.

use std::time::Instant;

pub const MAX_ENTRIES: usize = 10;
pub const MAX_KEY_BYTES: usize = 2000;
pub const MAX_VALUE_BYTES: usize = 100 * 1024;

/// One slot's contents. A slot is "valid" exactly when `CacheTable` holds
/// `Some(CacheEntry)` for it — there is no separate `valid` flag, since
/// `Option` already encodes occupancy (see DESIGN.md).
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub request_bytes: Box<[u8]>,
    pub response_bytes: Box<[u8]>,
    pub host: Box<str>,
    pub uri: Box<str>,
    pub last_accessed: u64,
    pub cached_at: u64,
    pub max_age: u32,
}

impl CacheEntry {
    fn is_stale(&self, now_ms: u64) -> bool {
        if self.max_age == 0 {
            return false;
        }
        let age_ms = now_ms.saturating_sub(self.cached_at);
        age_ms > (self.max_age as u64) * 1000
    }
}

pub struct CacheTable {
    entries: [Option<CacheEntry>; MAX_ENTRIES],
    access_sequence: u64,
    start_time: Instant,
}

impl CacheTable {
    pub fn new() -> Self {
        Self {
            entries: std::array::from_fn(|_| None),
            access_sequence: 0,
            start_time: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Count of valid slots. Recomputed rather than tracked incrementally:
    /// with `MAX_ENTRIES == 10` this is effectively free, and it makes
    /// invariant 1 (`size == count of valid slots`) true by construction.
    pub fn size(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    pub fn is_full(&self) -> bool {
        self.size() >= MAX_ENTRIES
    }

    /// Reference to slot `i`'s contents, if valid.
    pub fn at(&self, i: usize) -> Option<&CacheEntry> {
        self.entries[i].as_ref()
    }

    fn is_stale_at(&self, i: usize, now_ms: u64) -> bool {
        self.entries[i].as_ref().is_some_and(|e| e.is_stale(now_ms))
    }

    /// Increments the global access sequence and stamps it onto slot `i`.
    /// Defined only when the slot is valid.
    pub fn touch(&mut self, i: usize) {
        if self.entries[i].is_some() {
            self.access_sequence += 1;
            let seq = self.access_sequence;
            self.entries[i].as_mut().unwrap().last_accessed = seq;
        }
    }

    /// Frees slot `i`'s owned buffers and marks it invalid. A no-op if the
    /// slot was already invalid.
    pub fn release(&mut self, i: usize) {
        self.entries[i] = None;
    }

    /// Places a fresh entry into slot `i`, independent of whatever was
    /// there before (the caller is responsible for having released it).
    pub fn occupy(&mut self, i: usize, entry: CacheEntry) {
        self.entries[i] = Some(entry);
    }

    /// Linear scan for an exact key match. Returns the slot index and
    /// whether the match is fresh or stale, without mutating anything —
    /// callers decide whether to `touch` a fresh hit.
    pub fn find_index(&self, key: &[u8], now_ms: u64) -> Option<(usize, bool)> {
        for i in 0..MAX_ENTRIES {
            if let Some(entry) = &self.entries[i] {
                if entry.request_bytes.as_ref() == key {
                    return Some((i, self.is_stale_at(i, now_ms)));
                }
            }
        }
        None
    }

    /// First slot with no valid entry, if any.
    pub fn first_invalid(&self) -> Option<usize> {
        (0..MAX_ENTRIES).find(|&i| self.entries[i].is_none())
    }

    /// Index of the valid slot with the smallest `last_accessed`. Ties
    /// cannot occur by invariant (`last_accessed` values are pairwise
    /// distinct across valid slots).
    pub fn lru_index(&self) -> Option<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|e| (i, e.last_accessed)))
            .min_by_key(|&(_, last_accessed)| last_accessed)
            .map(|(i, _)| i)
    }

    pub fn drain(&mut self) {
        for slot in &mut self.entries {
            *slot = None;
        }
    }
}

impl Default for CacheTable {
    fn default() -> Self {
        Self::new()
    }
}
