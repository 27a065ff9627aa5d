//! The per-transaction dirty overlay (§5, §9 "mid-transaction dirty overlay
//! vs clean snapshot").
//!
//! A `ViewTransaction` starts as a clone of the view's shared
//! [`GroupIndex`]/[`PageCache`] and is mutated freely and sequentially,
//! never suspended, never shared across threads (§5). At commit, its
//! working copies are written through to [`PageStore`] and then swapped
//! into the view's shared state under the same lock the view uses for
//! reads; on abort the whole struct is simply dropped, touching no shared
//! state.

use std::collections::HashSet;

use rusqlite::Connection;

use crate::cache::{KeyMapLookup, PageCache};
use crate::changelog::ChangeLog;
use crate::group_index::GroupIndex;
use crate::model::{ChangeRecord, Group, PageId, RowId};
use crate::store::{PageMetaBody, PageStore};
use crate::view::SharedViewState;

/// Working state for one writer transaction against a registered view.
pub struct ViewTransaction<'v> {
    pub(crate) view_name: &'v str,
    pub(crate) shared: &'v parking_lot::Mutex<SharedViewState>,
    pub(crate) group_index: GroupIndex,
    pub(crate) cache: PageCache,
    pub(crate) dirty_pages: HashSet<PageId>,
    pub(crate) deleted_pages: HashSet<PageId>,
    pub(crate) dirty_keys: HashSet<RowId>,
    pub(crate) change_log: ChangeLog,
    pub(crate) mutated_groups: HashSet<Group>,
    pub(crate) last_insert_at_first: bool,
    pub(crate) last_insert_at_last: bool,
}

impl<'v> ViewTransaction<'v> {
    pub(crate) fn begin(view_name: &'v str, shared: &'v parking_lot::Mutex<SharedViewState>) -> Self {
        let guard = shared.lock();
        Self {
            view_name,
            shared,
            group_index: guard.group_index.clone(),
            cache: guard.cache.clone(),
            dirty_pages: HashSet::new(),
            deleted_pages: HashSet::new(),
            dirty_keys: HashSet::new(),
            change_log: ChangeLog::new(),
            mutated_groups: HashSet::new(),
            last_insert_at_first: false,
            last_insert_at_last: false,
        }
    }

    /// Records that `group` was mutated, for the mutation-during-iteration
    /// check (§5).
    pub(crate) fn mark_group_mutated(&mut self, group: &Group) {
        self.mutated_groups.insert(group.clone());
    }

    /// Resets the mutation tracker before a fresh enumeration (§5).
    pub fn reset_mutation_tracker(&mut self) {
        self.mutated_groups.clear();
    }

    pub(crate) fn mark_page_dirty(&mut self, page_id: &PageId) {
        self.dirty_pages.insert(page_id.clone());
        self.deleted_pages.remove(page_id);
    }

    pub(crate) fn mark_page_deleted(&mut self, page_id: &PageId) {
        self.dirty_pages.remove(page_id);
        self.deleted_pages.insert(page_id.clone());
        self.cache.invalidate_page(page_id);
    }

    pub(crate) fn mark_key_dirty(&mut self, row_id: &RowId) {
        self.dirty_keys.insert(row_id.clone());
    }

    pub(crate) fn push_change(&mut self, record: ChangeRecord) {
        self.change_log.push(record);
    }

    /// Flushes the overlay to `store`, then swaps the transaction's working
    /// `GroupIndex`/`PageCache` into shared state, returning the change log
    /// for observers. Matches §4.1's contract: every write here is part of
    /// whatever outer transaction `conn` belongs to: a failure propagates
    /// and the caller is expected to roll that outer transaction back,
    /// leaving shared state untouched (it's only swapped after all writes
    /// below succeed).
    pub fn commit(mut self, conn: &Connection) -> crate::error::Result<ChangeLog> {
        let store = PageStore::new(conn, self.view_name);

        crate::rebalancer::rebalance(&mut self, &store)?;

        for page_id in &self.deleted_pages {
            store.delete_page(page_id)?;
        }

        for page_id in &self.dirty_pages {
            let Some(group) = self.group_index.group_of(page_id).cloned() else {
                continue;
            };
            let Some(pages) = self.group_index.pages(&group) else {
                continue;
            };
            let Some(meta) = pages.iter().find(|m| &m.page_id == page_id) else {
                continue;
            };
            let rows = self.cache.get_page(page_id).cloned().unwrap_or_default();
            let body = PageMetaBody {
                group: meta.group.clone(),
                prev_page_id: meta.prev_page_id.clone(),
                count: meta.count,
            };
            store.write_page(page_id, &rows, &body)?;
        }

        for row_id in &self.dirty_keys {
            match self.cache.get_key_map(row_id) {
                Some(KeyMapLookup::Present(page_id)) => store.put_key_map(row_id, page_id)?,
                _ => store.delete_key_map(row_id)?,
            }
        }

        let mut guard = self.shared.lock();
        guard.group_index = self.group_index;
        guard.cache = self.cache;
        Ok(self.change_log)
    }

    /// Discards the overlay without touching shared state or storage.
    pub fn abort(self) {}
}
