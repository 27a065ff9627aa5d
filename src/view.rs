//! Public API: registering a view, reading its ordered rows, and running
//! write transactions against it (§6).

use std::ops::Range;

use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::info;

use crate::base_store::{AfterWriteHooks, BaseStoreReader};
use crate::cache::PageCache;
use crate::comparator::RowHint;
use crate::config::ViewConfig;
use crate::error::{Result, ViewError};
use crate::group_index::GroupIndex;
use crate::model::{ChangeRecord, ColumnFlags, Group, RowId};
use crate::mutator;
use crate::populator;
use crate::store::PageStore;
use crate::txn::ViewTransaction;

/// The shared, committed state a registered view's readers and the next
/// writer transaction both start from.
pub struct SharedViewState {
    pub(crate) group_index: GroupIndex,
    pub(crate) cache: PageCache,
}

/// A registered ordered view over a base store's rows.
///
/// `O` is the base store's stored-object type, `M` its user-metadata type,
/// both opaque to this crate (§1 Non-goals: object/metadata serialization is
/// the base store's concern).
pub struct View<O, M> {
    view_name: String,
    config: ViewConfig<O, M>,
    shared: Mutex<SharedViewState>,
}

impl<O, M> View<O, M> {
    /// Registers the view against `conn`: creates its tables if missing,
    /// and either loads its persisted page chains or runs a full rebuild
    /// when there is none yet, the configured version doesn't match the
    /// persisted one, or the persisted chain is corrupt (§6, §4.7).
    pub fn register(conn: &Connection, view_name: impl Into<String>, config: ViewConfig<O, M>, reader: &impl BaseStoreReader<O, M>) -> Result<Self> {
        let view_name = view_name.into();
        let _span = tracing::info_span!("register", view = %view_name).entered();
        let store = PageStore::new(conn, &view_name);
        store.create_tables_if_missing()?;

        let persisted_version = store.read_version()?;
        let needs_rebuild = match persisted_version {
            None => true,
            Some(v) if v != config.version => {
                info!(persisted = v, configured = config.version, "view version changed, rebuilding");
                true
            }
            Some(_) => false,
        };

        let group_index = if needs_rebuild {
            GroupIndex::empty()
        } else {
            match GroupIndex::from_disk(store.load_all_page_metas()?) {
                Ok(index) => index,
                Err(ViewError::InvalidPageChain(group)) => {
                    info!(%group, "persisted page chain is invalid, rebuilding view");
                    store.clear_all()?;
                    GroupIndex::empty()
                }
                Err(e) => return Err(e),
            }
        };

        let view = Self {
            view_name,
            config,
            shared: Mutex::new(SharedViewState {
                group_index,
                cache: PageCache::new(0, 0),
            }),
        };

        if needs_rebuild {
            let mut txn = view.begin_write();
            populator::populate(&mut txn, &store, &view.config, reader)?;
            txn.commit(conn)?;
            store.write_version(view.config.version)?;
        }

        Ok(view)
    }

    /// Rebuilds the cache bounds from the configured limits (called once
    /// after [`register`](Self::register) picks up `object_cache_limit`/
    /// `metadata_cache_limit` from the config).
    pub fn apply_cache_limits(&mut self) {
        let mut guard = self.shared.lock();
        guard.cache = PageCache::new(self.config.object_cache_limit, self.config.metadata_cache_limit);
    }

    /// Starts a writer transaction against this view's current shared
    /// state (§5: one writer at a time, enforced by the shared lock taken
    /// for the duration of [`ViewTransaction::begin`]).
    pub fn begin_write(&self) -> ViewTransaction<'_> {
        ViewTransaction::begin(&self.view_name, &self.shared)
    }

    /// Runs `f` against a fresh write transaction and a [`PageStore`] bound
    /// to `conn`, committing on success and leaving shared state untouched
    /// on error.
    pub fn with_write<T>(
        &self,
        conn: &Connection,
        f: impl FnOnce(&mut ViewTransaction<'_>, &PageStore<'_>) -> Result<T>,
    ) -> Result<(T, Vec<ChangeRecord>)> {
        let store = PageStore::new(conn, &self.view_name);
        let mut txn = self.begin_write();
        let outcome = f(&mut txn, &store)?;
        let log = txn.commit(conn)?;
        Ok((outcome, log.into_records()))
    }

    /// Number of groups currently present.
    pub fn group_count(&self) -> usize {
        self.shared.lock().group_index.group_count()
    }

    /// Every group currently present.
    pub fn groups(&self) -> Vec<Group> {
        self.shared.lock().group_index.groups().cloned().collect()
    }

    /// Number of rows in `group`.
    pub fn row_count(&self, group: &Group) -> usize {
        self.shared.lock().group_index.row_count(group)
    }

    /// Total number of rows across every group.
    pub fn total_row_count(&self) -> usize {
        self.shared.lock().group_index.total_row_count()
    }

    /// The row at absolute `index` within `group`, if any.
    pub fn get(&self, conn: &Connection, group: &Group, index: usize) -> Result<Option<RowId>> {
        let store = PageStore::new(conn, &self.view_name);
        let mut guard = self.shared.lock();
        let SharedViewState { group_index, cache } = &mut *guard;
        crate::locator::row_at(&store, cache, group_index, group, index)
    }

    /// The first row in `group`.
    pub fn first(&self, conn: &Connection, group: &Group) -> Result<Option<RowId>> {
        self.get(conn, group, 0)
    }

    /// The last row in `group`.
    pub fn last(&self, conn: &Connection, group: &Group) -> Result<Option<RowId>> {
        let count = self.row_count(group);
        if count == 0 {
            return Ok(None);
        }
        self.get(conn, group, count - 1)
    }

    /// Finds `row_id`'s current `(group, absolute index)`, if it is in the
    /// view.
    pub fn locate(&self, conn: &Connection, row_id: &RowId) -> Result<Option<(Group, usize)>> {
        let store = PageStore::new(conn, &self.view_name);
        let mut guard = self.shared.lock();
        let SharedViewState { group_index, cache } = &mut *guard;
        let page_id = match cache.get_key_map(row_id) {
            Some(crate::cache::KeyMapLookup::Present(page_id)) => Some(page_id.clone()),
            Some(crate::cache::KeyMapLookup::Absent) => None,
            None => store.lookup_key_map(row_id)?,
        };
        let Some(page_id) = page_id else { return Ok(None) };
        crate::locator::locate_in_page(&store, cache, group_index, row_id, &page_id)
    }

    /// Enumerates `group`'s rows in `[range)` (the whole group if `None`),
    /// forward or `reverse`, calling `visit(row_id, index)` for each. Stops
    /// early if `visit` returns `false`. This is a point-in-time read that
    /// does not participate in a write transaction's mutation-during-
    /// iteration check; use [`ViewTransaction::enumerate`] when enumerating
    /// and mutating in the same transaction.
    pub fn enumerate(
        &self,
        conn: &Connection,
        group: &Group,
        range: Option<Range<usize>>,
        reverse: bool,
        mut visit: impl FnMut(&RowId, usize) -> bool,
    ) -> Result<()> {
        let store = PageStore::new(conn, &self.view_name);
        let mut guard = self.shared.lock();
        let SharedViewState { group_index, cache } = &mut *guard;
        let count = group_index.row_count(group);
        let range = range.unwrap_or(0..count);
        let indices: Box<dyn Iterator<Item = usize>> = if reverse {
            Box::new(range.rev())
        } else {
            Box::new(range)
        };
        for index in indices {
            if let Some(row_id) = crate::locator::row_at(&store, cache, group_index, group, index)? {
                if !visit(&row_id, index) {
                    break;
                }
            }
        }
        Ok(())
    }

    /// Re-evaluates `row_id` against the view without a base-store write,
    /// for callers that changed a column out of band (§4.5 `touch`).
    pub fn touch(&self, conn: &Connection, reader: &impl BaseStoreReader<O, M>, row_id: &RowId, columns: ColumnFlags) -> Result<Vec<ChangeRecord>> {
        let (_, log) = self.with_write(conn, |txn, store| mutator::touch(txn, store, &self.config, reader, row_id, columns))?;
        Ok(log)
    }

    /// Inserts or repositions a row directly, bypassing [`crate::hook::ViewHook`]
    /// (useful for tests and for base stores that call the Mutator directly
    /// instead of through the hook trait).
    pub fn upsert(&self, conn: &Connection, reader: &impl BaseStoreReader<O, M>, row_id: &RowId, hint: RowHint<'_, O, M>, is_new: bool) -> Result<Vec<ChangeRecord>> {
        let (_, log) = self.with_write(conn, |txn, store| mutator::insert(txn, store, &self.config, reader, row_id, hint, is_new))?;
        Ok(log)
    }

    /// Reacts to a base-store `set(rowId, object, metadata)`, through
    /// [`crate::hook::ViewHook`] exactly as a base store wired to this
    /// view's [`crate::base_store::AfterWriteHooks`] would (§6).
    pub fn set(&self, conn: &Connection, reader: &impl BaseStoreReader<O, M>, row_id: &RowId, object: &O, metadata: &M) -> Result<Vec<ChangeRecord>> {
        let (_, log) = self.with_write(conn, |txn, store| {
            let mut hook = crate::hook::ViewHook::new(txn, store, &self.config, reader);
            hook.after_set(row_id, object, metadata)
        })?;
        Ok(log)
    }

    /// Reacts to a base-store `setMetadata(rowId, metadata)` (§6).
    pub fn set_metadata(&self, conn: &Connection, reader: &impl BaseStoreReader<O, M>, row_id: &RowId, metadata: &M) -> Result<Vec<ChangeRecord>> {
        let (_, log) = self.with_write(conn, |txn, store| {
            let mut hook = crate::hook::ViewHook::new(txn, store, &self.config, reader);
            hook.after_set_metadata(row_id, metadata)
        })?;
        Ok(log)
    }

    /// Removes a row directly.
    pub fn remove(&self, conn: &Connection, row_id: &RowId) -> Result<Vec<ChangeRecord>> {
        let (_, log) = self.with_write(conn, |txn, store| mutator::remove(txn, store, row_id))?;
        Ok(log)
    }

    /// Removes several rows in one bulk call (§4.5 `removeMany`).
    pub fn remove_many(&self, conn: &Connection, row_ids: &[RowId]) -> Result<Vec<ChangeRecord>> {
        let (_, log) = self.with_write(conn, |txn, store| mutator::remove_many(txn, store, row_ids))?;
        Ok(log)
    }

    /// Removes every row in `collection` (§4.5).
    pub fn remove_all_in_collection(&self, conn: &Connection, collection: &str) -> Result<Vec<ChangeRecord>> {
        let (_, log) = self.with_write(conn, |txn, store| mutator::remove_all_in_collection(txn, store, collection))?;
        Ok(log)
    }

    /// Drops every group and page.
    pub fn clear(&self, conn: &Connection) -> Result<Vec<ChangeRecord>> {
        let (_, log) = self.with_write(conn, |txn, _store| {
            mutator::clear(txn);
            Ok(())
        })?;
        Ok(log)
    }
}

impl ViewTransaction<'_> {
    /// Enumerates `group`'s rows the same way [`View::enumerate`] does, but
    /// first checks whether `group` was mutated earlier in this same
    /// transaction (§5): a write that landed in `group` before this call
    /// invalidates the position arithmetic an in-progress scan depends on,
    /// so this returns [`ViewError::MutationDuringIteration`] instead of
    /// silently skipping or duplicating rows.
    pub fn enumerate(
        &mut self,
        store: &PageStore<'_>,
        group: &Group,
        range: Option<Range<usize>>,
        reverse: bool,
        mut visit: impl FnMut(&RowId, usize) -> bool,
    ) -> Result<()> {
        if self.mutated_groups.contains(group) {
            return Err(ViewError::MutationDuringIteration(group.clone()));
        }
        let count = self.group_index.row_count(group);
        let range = range.unwrap_or(0..count);
        let indices: Vec<usize> = if reverse { range.rev().collect() } else { range.collect() };
        for index in indices {
            if self.mutated_groups.contains(group) {
                return Err(ViewError::MutationDuringIteration(group.clone()));
            }
            let Some((page_id, offset)) = crate::locator::page_for_index(&self.group_index, group, index) else {
                continue;
            };
            let rows = crate::locator::load_page_for_enumeration(store, &mut self.cache, &page_id)?;
            let Some(row_id) = rows.get(index - offset).cloned() else {
                continue;
            };
            if !visit(&row_id, index) {
                break;
            }
        }
        Ok(())
    }
}
