//! Cache Engine: lookup, admission, LRU selection, eviction, and the
//! stale-replacement protocol.

use super::store::{CacheEntry, CacheTable, MAX_KEY_BYTES, MAX_VALUE_BYTES};

/// Outcome of a key lookup. A stale match is reported as `Stale` (a kind of
/// miss to the caller) but carries the slot index so the pipeline can
/// thread it through to the stale-replacement protocol at commit time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Fresh(usize),
    Stale(usize),
    Miss,
}

pub struct CacheEngine {
    table: CacheTable,
}

impl CacheEngine {
    pub fn new() -> Self {
        Self { table: CacheTable::new() }
    }

    pub fn now_ms(&self) -> u64 {
        self.table.now_ms()
    }

    /// A stale match logs `Stale entry for <host> <uri>` and leaves the
    /// slot in place; a fresh match `touch`es the slot.
    pub fn lookup(&mut self, key: &[u8]) -> Lookup {
        let now_ms = self.table.now_ms();
        match self.table.find_index(key, now_ms) {
            None => Lookup::Miss,
            Some((index, true)) => {
                let entry = self.table.at(index).expect("index came from find_index");
                println!("Stale entry for {} {}", entry.host, entry.uri);
                flush_stdout();
                Lookup::Stale(index)
            }
            Some((index, false)) => {
                self.table.touch(index);
                Lookup::Fresh(index)
            }
        }
    }

    pub fn entry(&self, index: usize) -> Option<&CacheEntry> {
        self.table.at(index)
    }

    /// LRU victim selection. If the table has room, returns the first
    /// invalid slot instead (no eviction needed).
    fn victim_slot(&self) -> usize {
        self.table
            .first_invalid()
            .or_else(|| self.table.lru_index())
            .expect("table has MAX_ENTRIES > 0 slots, so one of these always succeeds")
    }

    fn evict(&mut self, index: usize) {
        if let Some(entry) = self.table.at(index) {
            println!("Evicting {} {} from cache", entry.host, entry.uri);
            flush_stdout();
        }
        self.table.release(index);
    }

    /// Admission (normal commit path — no stale entry was found for this
    /// key during lookup). Silently refuses oversized keys or values.
    pub fn admit(&mut self, key: &[u8], value: &[u8], host: &str, uri: &str, max_age: u32) -> bool {
        if key.len() > MAX_KEY_BYTES || value.len() > MAX_VALUE_BYTES {
            return false;
        }

        let index = self.victim_slot();
        if self.table.is_full() {
            self.evict(index);
        }

        self.occupy(index, key, value, host, uri, max_age);
        true
    }

    /// Stale-replacement, cacheable branch: re-use the exact slot that held
    /// the stale match rather than selecting an LRU victim, preserving slot
    /// identity and leaving `size` unchanged.
    pub fn replace_stale(
        &mut self,
        stale_index: usize,
        key: &[u8],
        value: &[u8],
        host: &str,
        uri: &str,
        max_age: u32,
    ) -> bool {
        if key.len() > MAX_KEY_BYTES || value.len() > MAX_VALUE_BYTES {
            return false;
        }
        self.table.release(stale_index);
        self.occupy(stale_index, key, value, host, uri, max_age);
        true
    }

    /// Stale-replacement, not-cacheable/oversize branch: the stale slot
    /// offers no future value, so it is released (logging an `Evicting`
    /// line) and `size` decreases. The newly fetched response is not
    /// admitted.
    pub fn release_stale(&mut self, stale_index: usize) {
        self.evict(stale_index);
    }

    /// Pre-emptive make-room: when a lookup missed entirely and the table
    /// is already full, evict an LRU victim before the origin fetch
    /// begins. Skipped by the pipeline whenever a stale match exists.
    pub fn prepare_eviction_if_needed(&mut self, key_len: usize) -> bool {
        if key_len > MAX_KEY_BYTES {
            return false;
        }
        if self.table.is_full() {
            let victim = self
                .table
                .lru_index()
                .expect("table is full, so a valid slot exists");
            self.evict(victim);
            return true;
        }
        false
    }

    pub fn drain(&mut self) {
        self.table.drain();
    }

    fn occupy(&mut self, index: usize, key: &[u8], value: &[u8], host: &str, uri: &str, max_age: u32) {
        let now_ms = self.table.now_ms();
        self.table.occupy(
            index,
            CacheEntry {
                request_bytes: key.to_vec().into_boxed_slice(),
                response_bytes: value.to_vec().into_boxed_slice(),
                host: host.into(),
                uri: uri.into(),
                last_accessed: 0,
                cached_at: now_ms,
                max_age,
            },
        );
        self.table.touch(index);
    }
}

impl Default for CacheEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn flush_stdout() {
    use std::io::Write;
    let _ = std::io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_on_empty_table() {
        let mut e = CacheEngine::new();
        assert_eq!(e.lookup(b"k"), Lookup::Miss);
    }

    #[test]
    fn admit_then_fresh_lookup_hits() {
        let mut e = CacheEngine::new();
        assert!(e.admit(b"req1", b"resp1", "h", "/u", 0));
        match e.lookup(b"req1") {
            Lookup::Fresh(idx) => {
                assert_eq!(e.entry(idx).unwrap().response_bytes.as_ref(), b"resp1");
            }
            other => panic!("expected fresh hit, got {other:?}"),
        }
    }

    #[test]
    fn admission_refuses_oversized_key_or_value() {
        let mut e = CacheEngine::new();
        let big_key = vec![b'a'; super::super::store::MAX_KEY_BYTES + 1];
        assert!(!e.admit(&big_key, b"v", "h", "/u", 0));

        let big_val = vec![b'a'; super::super::store::MAX_VALUE_BYTES + 1];
        assert!(!e.admit(b"k", &big_val, "h", "/u", 0));
    }

    #[test]
    fn boundary_sizes_admit_exactly() {
        let mut e = CacheEngine::new();
        let key = vec![b'a'; super::super::store::MAX_KEY_BYTES];
        let val = vec![b'a'; super::super::store::MAX_VALUE_BYTES];
        assert!(e.admit(&key, &val, "h", "/u", 0));

        let mut e2 = CacheEngine::new();
        let over_key = vec![b'a'; super::super::store::MAX_KEY_BYTES + 1];
        assert!(!e2.admit(&over_key, &val, "h", "/u", 0));

        let mut e3 = CacheEngine::new();
        let over_val = vec![b'a'; super::super::store::MAX_VALUE_BYTES + 1];
        assert!(!e3.admit(&key, &over_val, "h", "/u", 0));
    }

    #[test]
    fn eviction_at_capacity_picks_lru_and_keeps_size_at_max() {
        let mut e = CacheEngine::new();
        for i in 0..10 {
            let key = format!("req{i}");
            assert!(e.admit(key.as_bytes(), b"resp", "h", &format!("/u{i}"), 0));
        }
        // Touch everything but req0 so it remains the LRU victim.
        for i in 1..10 {
            let key = format!("req{i}");
            e.lookup(key.as_bytes());
        }
        assert!(e.admit(b"req10", b"resp", "h", "/u10", 0));
        assert_eq!(e.lookup(b"req0"), Lookup::Miss);
        match e.lookup(b"req10") {
            Lookup::Fresh(_) => {}
            other => panic!("expected req10 to be cached, got {other:?}"),
        }
    }

    #[test]
    fn stale_match_reports_stale_and_leaves_slot_in_place() {
        let mut e = CacheEngine::new();
        e.admit(b"req1", b"resp1", "h", "/u", 1);
        // Fabricate staleness by forcing max_age=1 and simulating elapsed
        // time is not directly possible without sleeping; instead verify
        // the non-stale path and rely on integration tests (pipeline_tests)
        // for the timed staleness transition.
        match e.lookup(b"req1") {
            Lookup::Fresh(_) => {}
            other => panic!("expected fresh immediately after admit, got {other:?}"),
        }
    }

    #[test]
    fn replace_stale_preserves_slot_and_size() {
        let mut e = CacheEngine::new();
        e.admit(b"req1", b"old", "h", "/u", 0);
        let before = e.lookup(b"req1");
        let idx = match before {
            Lookup::Fresh(i) => i,
            other => panic!("unexpected {other:?}"),
        };
        assert!(e.replace_stale(idx, b"req1", b"new", "h", "/u", 60));
        match e.lookup(b"req1") {
            Lookup::Fresh(i) => {
                assert_eq!(i, idx);
                assert_eq!(e.entry(i).unwrap().response_bytes.as_ref(), b"new");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn release_stale_frees_the_slot() {
        let mut e = CacheEngine::new();
        e.admit(b"req1", b"v", "h", "/u", 0);
        e.release_stale(0);
        assert_eq!(e.lookup(b"req1"), Lookup::Miss);
    }

    #[test]
    fn prepare_eviction_only_acts_when_full() {
        let mut e = CacheEngine::new();
        assert!(!e.prepare_eviction_if_needed(4));
        for i in 0..10 {
            let key = format!("req{i}");
            e.admit(key.as_bytes(), b"v", "h", "/u", 0);
        }
        assert!(e.prepare_eviction_if_needed(4));
    }
}
