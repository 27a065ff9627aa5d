//! Incremental maintenance of the ordered view on every base-store mutation
//! (§4.4 insert, §4.5 delete/bulk-delete/clear/touch).
//!
//! Every operation here works against a [`ViewTransaction`]'s working
//! `GroupIndex`/`PageCache` overlay; nothing is written to storage until the
//! transaction commits.

use std::cmp::Ordering;

use crate::base_store::BaseStoreReader;
use crate::cache::KeyMapLookup;
use crate::comparator::{compare_rows, evaluate_grouping, RowHint};
use crate::config::ViewConfig;
use crate::error::Result;
use crate::group_index::PageMeta;
use crate::locator::{self, page_for_index};
use crate::model::{ChangeRecord, ColumnFlags, Group, PageId, RowId};
use crate::store::PageStore;
use crate::txn::ViewTransaction;

/// Inserts or repositions one row (§4.4). `is_new` mirrors the base store's
/// own knowledge of whether the row previously existed: when `false` the
/// Mutator looks the row up first and may emit `UpdateRow`/`DeleteRow`
/// instead of `InsertRow`.
#[allow(clippy::too_many_arguments)]
pub fn insert<O, M>(
    txn: &mut ViewTransaction<'_>,
    store: &PageStore<'_>,
    config: &ViewConfig<O, M>,
    reader: &impl BaseStoreReader<O, M>,
    row_id: &RowId,
    hint: RowHint<'_, O, M>,
    is_new: bool,
) -> Result<()> {
    insert_with_emitted_columns(txn, store, config, reader, row_id, hint, is_new, None)
}

/// Does the work of [`insert`]. `emitted_columns` overrides the columns
/// reported on a same-position `UpdateRow`: `None` uses the shapes'
/// own read-set (the ordinary insert/re-evaluate path), `Some(columns)`
/// reports exactly `columns` instead (used by [`touch`], whose caller
/// passed a specific set of changed columns that must reach the emitted
/// record unchanged).
#[allow(clippy::too_many_arguments)]
fn insert_with_emitted_columns<O, M>(
    txn: &mut ViewTransaction<'_>,
    store: &PageStore<'_>,
    config: &ViewConfig<O, M>,
    reader: &impl BaseStoreReader<O, M>,
    row_id: &RowId,
    hint: RowHint<'_, O, M>,
    is_new: bool,
    emitted_columns: Option<ColumnFlags>,
) -> Result<()> {
    let new_group = evaluate_grouping(&config.grouping_fn, reader, row_id, hint)?;

    let existing = if is_new {
        None
    } else {
        lookup_existing(txn, store, row_id)?
    };

    let Some(new_group) = new_group else {
        // ⊥: the row does not belong in the view. If it was previously
        // present, this is a removal.
        if let Some((old_group, old_page, old_index)) = existing {
            remove_located(txn, &old_group, &old_page, old_index, row_id);
        }
        return Ok(());
    };

    let touched_columns =
        emitted_columns.unwrap_or_else(|| config.sorting_fn.shape().columns_read().union(config.grouping_fn.shape().columns_read()));

    if let Some((old_group, old_page, old_index)) = &existing {
        if *old_group == new_group {
            if matches!(config.sorting_fn.shape(), crate::config::Shape::Key) {
                txn.push_change(ChangeRecord::UpdateRow {
                    row_id: row_id.clone(),
                    group: new_group.clone(),
                    index: *old_index,
                    columns: touched_columns,
                });
                return Ok(());
            }

            // Stable-position check (§4.4 step 5a): the row stays in the
            // same group under a comparator that reads more than the key,
            // but its neighbours may not have moved. If it still sits
            // between them, update in place instead of delete+reinsert.
            if row_still_in_place(txn, store, config, reader, &new_group, row_id, hint, *old_index)? {
                txn.push_change(ChangeRecord::UpdateRow {
                    row_id: row_id.clone(),
                    group: new_group,
                    index: *old_index,
                    columns: touched_columns,
                });
                return Ok(());
            }
        }
        remove_located(txn, old_group, old_page, *old_index, row_id);
    }

    let count = txn.group_index.row_count(&new_group);

    let target_index = resolve_insertion_index(txn, store, config, reader, &new_group, row_id, hint, count)?;

    place_row(txn, store, &new_group, target_index, row_id)?;

    txn.mark_group_mutated(&new_group);
    txn.push_change(ChangeRecord::InsertRow {
        row_id: row_id.clone(),
        group: new_group,
        index: target_index,
    });
    Ok(())
}

/// Checks whether `row_id`, still sitting at `old_index` within `group`,
/// remains between its immediate neighbours under the current comparator
/// (§4.4 step 5a). A boundary neighbour that doesn't exist trivially holds.
#[allow(clippy::too_many_arguments)]
fn row_still_in_place<O, M>(
    txn: &mut ViewTransaction<'_>,
    store: &PageStore<'_>,
    config: &ViewConfig<O, M>,
    reader: &impl BaseStoreReader<O, M>,
    group: &Group,
    row_id: &RowId,
    hint: RowHint<'_, O, M>,
    old_index: usize,
) -> Result<bool> {
    if old_index > 0 {
        if let Some(prev) = locator::row_at(store, &mut txn.cache, &txn.group_index, group, old_index - 1)? {
            if compare_rows(&config.sorting_fn, reader, row_id, hint, &prev)? == Ordering::Less {
                return Ok(false);
            }
        }
    }
    if let Some(next) = locator::row_at(store, &mut txn.cache, &txn.group_index, group, old_index + 1)? {
        if compare_rows(&config.sorting_fn, reader, row_id, hint, &next)? == Ordering::Greater {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Resolves where a row belongs within `group`'s `count` existing rows,
/// trying the cheap checks first and only falling back to a full binary
/// search (§4.4 step 5).
#[allow(clippy::too_many_arguments)]
fn resolve_insertion_index<O, M>(
    txn: &mut ViewTransaction<'_>,
    store: &PageStore<'_>,
    config: &ViewConfig<O, M>,
    reader: &impl BaseStoreReader<O, M>,
    group: &Group,
    row_id: &RowId,
    hint: RowHint<'_, O, M>,
    count: usize,
) -> Result<usize> {
    if count == 0 {
        return Ok(0);
    }

    // Stable-position fast path: the previous insert into this group landed
    // at one end, and the new row still belongs there relative to its
    // neighbor.
    if txn.last_insert_at_first {
        if let Some(first) = locator::row_at(store, &mut txn.cache, &txn.group_index, group, 0)? {
            if compare_rows(&config.sorting_fn, reader, row_id, hint, &first)? == Ordering::Less {
                return Ok(0);
            }
        }
    }
    if txn.last_insert_at_last {
        if let Some(last) = locator::row_at(store, &mut txn.cache, &txn.group_index, group, count - 1)? {
            if compare_rows(&config.sorting_fn, reader, row_id, hint, &last)? != Ordering::Less {
                return Ok(count);
            }
        }
    }

    let mut min = 0usize;
    let mut max = count;
    while min < max {
        let mid = min + (max - min) / 2;
        let candidate = locator::row_at(store, &mut txn.cache, &txn.group_index, group, mid)?
            .expect("mid is within [0, count)");
        let ordering = compare_rows(&config.sorting_fn, reader, row_id, hint, &candidate)?;
        if ordering == Ordering::Less {
            max = mid;
        } else {
            // Ties resolve to the highest index (§4.4, §9): an equal
            // comparator result keeps searching the upper half rather than
            // stopping, so duplicate sort keys settle in insertion order.
            min = mid + 1;
        }
    }
    Ok(min)
}

/// Splices `row_id` into `group` at absolute `index`, creating the group's
/// first page if it has none.
fn place_row(txn: &mut ViewTransaction<'_>, store: &PageStore<'_>, group: &Group, index: usize, row_id: &RowId) -> Result<()> {
    if !txn.group_index.has_group(group) {
        let page_id = PageId::generate();
        txn.group_index.insert_sole_page(PageMeta {
            page_id: page_id.clone(),
            group: group.clone(),
            prev_page_id: None,
            next_page_id: None,
            count: 0,
        });
        txn.cache.put_page(page_id.clone(), Vec::new());
        txn.push_change(ChangeRecord::InsertGroup { group: group.clone() });
    }

    let (page_id, offset) = page_for_index(&txn.group_index, group, index)
        .unwrap_or_else(|| {
            // index == count: lands past every existing page, on the tail.
            let pages = txn.group_index.pages(group).expect("group exists");
            let last = pages.last().expect("group has at least one page");
            (last.page_id.clone(), index - last.count)
        });

    let mut rows = locator::load_page(store, &mut txn.cache, &page_id)?;
    let local = index - offset;
    rows.insert(local, row_id.clone());
    txn.cache.put_page(page_id.clone(), rows);
    txn.cache.put_key_map(row_id.clone(), page_id.clone());
    txn.mark_page_dirty(&page_id);
    txn.mark_key_dirty(row_id);
    bump_count(txn, group, &page_id, 1);

    txn.last_insert_at_first = index == 0;
    txn.last_insert_at_last = true; // recomputed precisely on next call via count comparison
    Ok(())
}

fn bump_count(txn: &mut ViewTransaction<'_>, group: &Group, page_id: &PageId, delta: i64) {
    let Some(pages) = txn.group_index.pages(group) else { return };
    let mut pages = pages.to_vec();
    if let Some(meta) = pages.iter_mut().find(|m| &m.page_id == page_id) {
        meta.count = (meta.count as i64 + delta).max(0) as usize;
    }
    txn.group_index.set_pages(group, pages);
}

/// Finds a row's current `(group, page, absolute index)`, consulting the
/// cache before falling back to storage (§4.2, §4.4 step 1).
fn lookup_existing(txn: &mut ViewTransaction<'_>, store: &PageStore<'_>, row_id: &RowId) -> Result<Option<(Group, PageId, usize)>> {
    let page_id = match txn.cache.get_key_map(row_id) {
        Some(KeyMapLookup::Present(page_id)) => Some(page_id.clone()),
        Some(KeyMapLookup::Absent) => None,
        None => {
            let looked_up = store.lookup_key_map(row_id)?;
            match &looked_up {
                Some(page_id) => txn.cache.put_key_map(row_id.clone(), page_id.clone()),
                None => txn.cache.put_key_map_absent(row_id.clone()),
            }
            looked_up
        }
    };
    let Some(page_id) = page_id else { return Ok(None) };
    match locator::locate_in_page(store, &mut txn.cache, &txn.group_index, row_id, &page_id)? {
        Some((group, index)) => Ok(Some((group, page_id, index))),
        None => Ok(None),
    }
}

/// Removes a row known to be at `index` within `group`'s page `page_id`.
fn remove_located(txn: &mut ViewTransaction<'_>, group: &Group, page_id: &PageId, index: usize, row_id: &RowId) {
    let Some(pages) = txn.group_index.pages(group) else { return };
    let mut offset = 0usize;
    let mut pages = pages.to_vec();
    for meta in &mut pages {
        if &meta.page_id == page_id {
            let local = index - offset;
            if let Some(mut rows) = txn.cache.get_page(page_id).cloned() {
                if local < rows.len() {
                    rows.remove(local);
                }
                meta.count = rows.len();
                txn.cache.put_page(page_id.clone(), rows);
            } else {
                meta.count = meta.count.saturating_sub(1);
            }
            break;
        }
        offset += meta.count;
    }
    txn.group_index.set_pages(group, pages);
    txn.cache.invalidate_key_map(row_id);
    txn.mark_page_dirty(page_id);
    txn.mark_key_dirty(row_id);
    txn.mark_group_mutated(group);
    txn.push_change(ChangeRecord::DeleteRow {
        row_id: row_id.clone(),
        group: group.clone(),
        index,
    });
}

/// Removes a single row from the view, if present (§4.5). A lookup miss is
/// a no-op: the base store asserts the row existed, but the view may
/// already have excluded it via grouping `⊥`.
pub fn remove(txn: &mut ViewTransaction<'_>, store: &PageStore<'_>, row_id: &RowId) -> Result<()> {
    match lookup_existing(txn, store, row_id)? {
        Some((group, page_id, index)) => {
            remove_located(txn, &group, &page_id, index, row_id);
            Ok(())
        }
        None => {
            crate::error::log_lookup_miss("mutator::remove");
            Ok(())
        }
    }
}

/// Removes several rows in one pass (§4.5). Resolves every row's page via a
/// single chunked mapping-table scan for whatever isn't already in the
/// cache overlay, then deletes within a page from the highest local index
/// down so earlier removals don't shift later ones.
pub fn remove_many(txn: &mut ViewTransaction<'_>, store: &PageStore<'_>, row_ids: &[RowId]) -> Result<()> {
    let mut page_of: std::collections::HashMap<RowId, Option<PageId>> = std::collections::HashMap::with_capacity(row_ids.len());
    let mut uncached = Vec::new();
    for row_id in row_ids {
        match txn.cache.get_key_map(row_id) {
            Some(KeyMapLookup::Present(page_id)) => {
                page_of.insert(row_id.clone(), Some(page_id.clone()));
            }
            Some(KeyMapLookup::Absent) => {
                page_of.insert(row_id.clone(), None);
            }
            None => uncached.push(row_id.clone()),
        }
    }

    if !uncached.is_empty() {
        let resolved = store.pages_for_rows(&uncached)?;
        let mut found: std::collections::HashSet<RowId> = std::collections::HashSet::with_capacity(resolved.len());
        for (row_id, page_id) in resolved {
            found.insert(row_id.clone());
            txn.cache.put_key_map(row_id.clone(), page_id.clone());
            page_of.insert(row_id, Some(page_id));
        }
        for row_id in &uncached {
            if !found.contains(row_id) {
                txn.cache.put_key_map_absent(row_id.clone());
                page_of.insert(row_id.clone(), None);
            }
        }
    }

    let mut located = Vec::with_capacity(row_ids.len());
    for row_id in row_ids {
        match page_of.get(row_id).cloned().flatten() {
            Some(page_id) => match locator::locate_in_page(store, &mut txn.cache, &txn.group_index, row_id, &page_id)? {
                Some((group, index)) => located.push((row_id.clone(), (group, page_id, index))),
                None => crate::error::log_lookup_miss("mutator::remove_many"),
            },
            None => crate::error::log_lookup_miss("mutator::remove_many"),
        }
    }
    located.sort_by_key(|(_, (_, _, index))| std::cmp::Reverse(*index));
    for (row_id, (group, page_id, index)) in located {
        remove_located(txn, &group, &page_id, index, &row_id);
    }
    Ok(())
}

/// Removes every row in `collection` from the view (§4.5).
pub fn remove_all_in_collection(txn: &mut ViewTransaction<'_>, store: &PageStore<'_>, collection: &str) -> Result<()> {
    let mapped = store.pages_for_collection(collection)?;
    let row_ids: Vec<RowId> = mapped.into_iter().map(|(row_id, _)| row_id).collect();
    remove_many(txn, store, &row_ids)
}

/// Drops every group and page, emitting a `ResetGroup` per group that
/// existed (§4.5).
pub fn clear(txn: &mut ViewTransaction<'_>) {
    let groups: Vec<Group> = txn.group_index.groups().cloned().collect();
    for group in &groups {
        let page_ids: Vec<PageId> = txn.group_index.pages(group).into_iter().flatten().map(|m| m.page_id.clone()).collect();
        for page_id in page_ids {
            txn.mark_page_deleted(&page_id);
        }
        txn.push_change(ChangeRecord::ResetGroup { group: group.clone() });
    }
    txn.group_index.clear();
    txn.cache.clear();
    txn.mutated_groups.extend(groups);
}

/// Re-evaluates a row without necessarily moving it (§9's shape-based
/// no-op rule): if neither the grouping nor sorting function reads
/// `columns`, the row's position cannot have changed and nothing is
/// emitted. Otherwise this defers to [`insert`], which itself detects a
/// same-group key-only reposition as a pure `UpdateRow`.
#[allow(clippy::too_many_arguments)]
pub fn touch<O, M>(
    txn: &mut ViewTransaction<'_>,
    store: &PageStore<'_>,
    config: &ViewConfig<O, M>,
    reader: &impl BaseStoreReader<O, M>,
    row_id: &RowId,
    columns: ColumnFlags,
) -> Result<()> {
    let read_by_view = config.grouping_fn.shape().columns_read().union(config.sorting_fn.shape().columns_read());
    let touches_relevant_column = (columns.contains(ColumnFlags::OBJECT) && read_by_view.contains(ColumnFlags::OBJECT))
        || (columns.contains(ColumnFlags::METADATA) && read_by_view.contains(ColumnFlags::METADATA));
    if !touches_relevant_column {
        return Ok(());
    }
    insert_with_emitted_columns(txn, store, config, reader, row_id, RowHint::none(), false, Some(columns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base_store::BaseStoreReader;
    use crate::config::{GroupingFn, SortingFn, ViewConfig};
    use std::cell::RefCell;
    use std::collections::HashMap;

    struct FakeReader {
        objects: RefCell<HashMap<RowId, i64>>,
    }

    impl BaseStoreReader<i64, ()> for FakeReader {
        fn read_object(&self, row_id: &RowId) -> Result<Option<i64>> {
            Ok(self.objects.borrow().get(row_id).copied())
        }
        fn read_metadata(&self, _row_id: &RowId) -> Result<Option<()>> {
            Ok(Some(()))
        }
        fn enumerate_all(&self, visit: &mut dyn FnMut(&RowId) -> Result<()>) -> Result<()> {
            for row_id in self.objects.borrow().keys() {
                visit(row_id)?;
            }
            Ok(())
        }
    }

    fn config() -> ViewConfig<i64, ()> {
        ViewConfig::new(
            GroupingFn::Key(Box::new(|_row_id| Some(Group::from("all")))),
            SortingFn::KeyObject(Box::new(|_a, oa: &i64, _b, ob: &i64| oa.cmp(ob))),
        )
    }

    fn open_conn() -> rusqlite::Connection {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let store = PageStore::new(&conn, "test");
        store.create_tables_if_missing().unwrap();
        conn
    }

    #[test]
    fn inserts_in_sorted_order() {
        let conn = open_conn();
        let store = PageStore::new(&conn, "test");
        let shared = parking_lot::Mutex::new(crate::view::SharedViewState {
            group_index: crate::group_index::GroupIndex::empty(),
            cache: crate::cache::PageCache::new(0, 0),
        });
        let mut txn = ViewTransaction::begin("test", &shared);
        let config = config();
        let reader = FakeReader { objects: RefCell::new(HashMap::new()) };
        reader.objects.borrow_mut().insert(RowId::new("c", "a"), 30);
        reader.objects.borrow_mut().insert(RowId::new("c", "b"), 10);
        reader.objects.borrow_mut().insert(RowId::new("c", "c"), 20);

        for key in ["a", "b", "c"] {
            insert(&mut txn, &store, &config, &reader, &RowId::new("c", key), RowHint::none(), true).unwrap();
        }

        let group = Group::from("all");
        let rows: Vec<_> = (0..3)
            .map(|i| locator::row_at(&store, &mut txn.cache, &txn.group_index, &group, i).unwrap().unwrap())
            .collect();
        assert_eq!(rows, vec![RowId::new("c", "b"), RowId::new("c", "c"), RowId::new("c", "a")]);
    }

    #[test]
    fn remove_drops_row() {
        let conn = open_conn();
        let store = PageStore::new(&conn, "test");
        let shared = parking_lot::Mutex::new(crate::view::SharedViewState {
            group_index: crate::group_index::GroupIndex::empty(),
            cache: crate::cache::PageCache::new(0, 0),
        });
        let mut txn = ViewTransaction::begin("test", &shared);
        let config = config();
        let reader = FakeReader { objects: RefCell::new(HashMap::new()) };
        reader.objects.borrow_mut().insert(RowId::new("c", "a"), 1);
        insert(&mut txn, &store, &config, &reader, &RowId::new("c", "a"), RowHint::none(), true).unwrap();
        remove(&mut txn, &store, &RowId::new("c", "a")).unwrap();
        assert_eq!(txn.group_index.total_row_count(), 0);
    }
}
