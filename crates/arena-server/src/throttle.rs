//! Rate limiting of engine info lines.
//!
//! Engines can print thousands of `info` lines a second. The session keeps
//! only the newest line per MultiPV index and flushes them on its info ticker.

use std::collections::BTreeMap;

use arena_core::{SearchId, SearchInfo};

#[derive(Debug, Default)]
pub struct InfoThrottle {
    search: Option<SearchId>,
    latest: BTreeMap<u32, SearchInfo>,
}

impl InfoThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switches to a new current search, dropping anything buffered.
    pub fn reset(&mut self, search: Option<SearchId>) {
        self.search = search;
        self.latest.clear();
    }

    pub fn current(&self) -> Option<SearchId> {
        self.search
    }

    /// Buffers `info` when it belongs to the current search. Returns false for
    /// stale lines.
    pub fn offer(&mut self, search: SearchId, info: SearchInfo) -> bool {
        if self.search != Some(search) {
            return false;
        }
        self.latest.insert(info.multipv, info);
        true
    }

    /// Buffered lines in MultiPV order.
    pub fn flush(&mut self) -> Option<(SearchId, Vec<SearchInfo>)> {
        let search = self.search?;
        if self.latest.is_empty() {
            return None;
        }
        let lines = std::mem::take(&mut self.latest).into_values().collect();
        Some((search, lines))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(depth: u32, multipv: u32) -> SearchInfo {
        let mut info = SearchInfo::at_depth(depth);
        info.multipv = multipv;
        info
    }

    #[test]
    fn test_keeps_newest_per_line() {
        let mut t = InfoThrottle::new();
        t.reset(Some(SearchId(1)));
        for d in 1..=10 {
            assert!(t.offer(SearchId(1), info(d, 1)));
            assert!(t.offer(SearchId(1), info(d, 2)));
        }
        let (search, lines) = t.flush().unwrap();
        assert_eq!(search, SearchId(1));
        assert_eq!(lines.len(), 2);
        assert_eq!((lines[0].depth, lines[0].multipv), (10, 1));
        assert_eq!((lines[1].depth, lines[1].multipv), (10, 2));
        assert!(t.flush().is_none());
    }

    #[test]
    fn test_stale_search_is_dropped() {
        let mut t = InfoThrottle::new();
        t.reset(Some(SearchId(2)));
        assert!(!t.offer(SearchId(1), info(5, 1)));
        assert!(t.flush().is_none());
    }

    #[test]
    fn test_reset_discards_buffer() {
        let mut t = InfoThrottle::new();
        t.reset(Some(SearchId(1)));
        t.offer(SearchId(1), info(3, 1));
        t.reset(Some(SearchId(2)));
        assert!(t.flush().is_none());
        assert_eq!(t.current(), Some(SearchId(2)));

        t.reset(None);
        assert!(!t.offer(SearchId(2), info(1, 1)));
    }
}
