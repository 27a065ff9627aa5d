//! Adapts the base store's after-write notifications into Mutator calls
//! (§6 "base-store hooks").
//!
//! `ViewHook` borrows the pieces a running [`ViewTransaction`] needs to
//! react to a write: the config (for the comparator harness) and a
//! [`BaseStoreReader`] to fetch whatever columns the grouping/sorting
//! functions require. It does not own the transaction or the connection;
//! the base store calls these from inside its own write, with the view's
//! transaction and SQL connection both already open.

use crate::base_store::{AfterWriteHooks, BaseStoreReader};
use crate::comparator::RowHint;
use crate::config::ViewConfig;
use crate::error::Result;
use crate::model::ColumnFlags;
use crate::model::RowId;
use crate::mutator;
use crate::store::PageStore;
use crate::txn::ViewTransaction;

/// Bundles a transaction, its backing store, config, and reader so the
/// base store has one call-site per write notification.
pub struct ViewHook<'t, 'v, 'c, 'r, O, M, R> {
    txn: &'t mut ViewTransaction<'v>,
    store: &'t PageStore<'c>,
    config: &'t ViewConfig<O, M>,
    reader: &'r R,
}

impl<'t, 'v, 'c, 'r, O, M, R> ViewHook<'t, 'v, 'c, 'r, O, M, R>
where
    R: BaseStoreReader<O, M>,
{
    /// Builds a hook wired to an already-open transaction, store, config,
    /// and reader.
    pub fn new(txn: &'t mut ViewTransaction<'v>, store: &'t PageStore<'c>, config: &'t ViewConfig<O, M>, reader: &'r R) -> Self {
        Self { txn, store, config, reader }
    }
}

impl<'t, 'v, 'c, 'r, O, M, R> AfterWriteHooks<O, M> for ViewHook<'t, 'v, 'c, 'r, O, M, R>
where
    R: BaseStoreReader<O, M>,
{
    fn after_set(&mut self, row_id: &RowId, object: &O, metadata: &M) -> Result<()> {
        mutator::insert(self.txn, self.store, self.config, self.reader, row_id, RowHint::both(object, metadata), false)
    }

    fn after_set_metadata(&mut self, row_id: &RowId, _metadata: &M) -> Result<()> {
        mutator::touch(self.txn, self.store, self.config, self.reader, row_id, ColumnFlags::METADATA)
    }

    fn after_remove(&mut self, row_id: &RowId) -> Result<()> {
        mutator::remove(self.txn, self.store, row_id)
    }

    fn after_remove_many(&mut self, row_ids: &[RowId]) -> Result<()> {
        mutator::remove_many(self.txn, self.store, row_ids)
    }

    fn after_remove_all_in_collection(&mut self, collection: &str) -> Result<()> {
        mutator::remove_all_in_collection(self.txn, self.store, collection)
    }

    fn after_remove_all(&mut self) -> Result<()> {
        mutator::clear(self.txn);
        Ok(())
    }
}
