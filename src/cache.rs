//! Write-through cache of decoded pages and RowId→PageId lookups (§4.2).
//!
//! Grounded in the teacher's own page cache (`src/pager/mod.rs`, which wraps
//! `lru::LruCache<PageId, Page>`): two independent bounded LRUs, one per
//! cached shape. A limit of `0` installs an effectively unbounded cache.

use std::num::NonZeroUsize;

use lru::LruCache;

use crate::model::{PageId, RowId};

fn new_lru<K: std::hash::Hash + Eq, V>(limit: usize) -> LruCache<K, V> {
    match NonZeroUsize::new(limit) {
        Some(cap) => LruCache::new(cap),
        None => LruCache::unbounded(),
    }
}

/// Result of a keymap lookup: distinguishes "never queried" from "queried,
/// confirmed absent from the view" so callers don't re-hit storage for rows
/// that are known not to be present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMapLookup {
    /// The row lives on this page.
    Present(PageId),
    /// The row was looked up and confirmed not to be in the view.
    Absent,
}

/// Per-connection bounded cache fronting [`crate::store::PageStore`].
pub struct PageCache {
    pages: LruCache<PageId, Vec<RowId>>,
    key_map: LruCache<RowId, KeyMapLookup>,
    pages_full_sentinel: usize,
    key_map_full_sentinel: usize,
}

impl Clone for PageCache {
    // `lru::LruCache`'s own `Clone` impl reconstructs via `Self::new(self.cap())`,
    // which panics on an unbounded cache's sentinel capacity. Rebuild
    // through `new_lru` (which knows about the `0` = unbounded convention)
    // and replay entries instead, oldest first so LRU order survives.
    fn clone(&self) -> Self {
        let mut pages = new_lru(self.pages_full_sentinel);
        for (page_id, rows) in self.pages.iter().rev() {
            pages.put(page_id.clone(), rows.clone());
        }
        let mut key_map = new_lru(self.key_map_full_sentinel);
        for (row_id, lookup) in self.key_map.iter().rev() {
            key_map.put(row_id.clone(), lookup.clone());
        }
        Self {
            pages,
            key_map,
            pages_full_sentinel: self.pages_full_sentinel,
            key_map_full_sentinel: self.key_map_full_sentinel,
        }
    }
}

impl PageCache {
    /// Builds a cache bounded by `page_cache_limit` (decoded pages) and
    /// `key_map_cache_limit` (RowId→PageId lookups); `0` means unbounded.
    pub fn new(page_cache_limit: usize, key_map_cache_limit: usize) -> Self {
        Self {
            pages: new_lru(page_cache_limit),
            key_map: new_lru(key_map_cache_limit),
            pages_full_sentinel: page_cache_limit,
            key_map_full_sentinel: key_map_cache_limit,
        }
    }

    /// Returns a cached page's rows, if present.
    pub fn get_page(&mut self, page_id: &PageId) -> Option<&Vec<RowId>> {
        self.pages.get(page_id)
    }

    /// Inserts or overwrites a cached page's rows.
    pub fn put_page(&mut self, page_id: PageId, rows: Vec<RowId>) {
        self.pages.put(page_id, rows);
    }

    /// Evicts a page from the cache (its body changed or it was dropped).
    pub fn invalidate_page(&mut self, page_id: &PageId) {
        self.pages.pop(page_id);
    }

    /// Inserts a page's rows only if the cache is not already at capacity,
    /// so enumeration doesn't evict hotter entries (§4.2).
    pub fn put_page_if_not_full(&mut self, page_id: PageId, rows: Vec<RowId>) {
        if self.pages_full_sentinel != 0 && self.pages.len() >= self.pages_full_sentinel {
            return;
        }
        self.pages.put(page_id, rows);
    }

    /// Returns the cached keymap lookup for a row, if any.
    pub fn get_key_map(&mut self, row_id: &RowId) -> Option<&KeyMapLookup> {
        self.key_map.get(row_id)
    }

    /// Records a row's resolved page.
    pub fn put_key_map(&mut self, row_id: RowId, page_id: PageId) {
        self.key_map.put(row_id, KeyMapLookup::Present(page_id));
    }

    /// Records that a row was looked up and confirmed absent.
    pub fn put_key_map_absent(&mut self, row_id: RowId) {
        self.key_map.put(row_id, KeyMapLookup::Absent);
    }

    /// Same as [`PageCache::put_key_map`] but respects the fill-avoidance
    /// rule during enumeration.
    pub fn put_key_map_if_not_full(&mut self, row_id: RowId, page_id: PageId) {
        if self.key_map_full_sentinel != 0 && self.key_map.len() >= self.key_map_full_sentinel {
            return;
        }
        self.key_map.put(row_id, KeyMapLookup::Present(page_id));
    }

    /// Evicts a row's keymap entry (it left the view).
    pub fn invalidate_key_map(&mut self, row_id: &RowId) {
        self.key_map.pop(row_id);
    }

    /// Drops every cached entry (used by `clear()`).
    pub fn clear(&mut self) {
        self.pages.clear();
        self.key_map.clear();
    }
}
