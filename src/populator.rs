//! Full-rebuild path run when a view is registered with no persisted state,
//! or whose persisted version doesn't match (§4.7).
//!
//! Enumerates every row in the base store and runs it through the same
//! insert path incremental maintenance uses, with `is_new = true` since a
//! fresh rebuild never has to reconcile a prior position.

use crate::base_store::BaseStoreReader;
use crate::comparator::RowHint;
use crate::config::ViewConfig;
use crate::error::Result;
use crate::mutator;
use crate::store::PageStore;
use crate::txn::ViewTransaction;

/// Rebuilds a view from scratch by enumerating every row the base store
/// currently holds.
pub fn populate<O, M>(
    txn: &mut ViewTransaction<'_>,
    store: &PageStore<'_>,
    config: &ViewConfig<O, M>,
    reader: &impl BaseStoreReader<O, M>,
) -> Result<()> {
    reader.enumerate_all(&mut |row_id| mutator::insert(txn, store, config, reader, row_id, RowHint::none(), true))
}
