//! The boundary between this crate and the primary key/value store.
//!
//! The primary store's own transaction implementation, SQL statement
//! pooling, WAL handshake, and object/metadata serialisation format are all
//! out of scope (§1), external collaborators. This module only
//! defines the two capability traits the view needs from that collaborator:
//! reading a row's current object/metadata, and being told about writes
//! after they land.

use crate::error::Result;
use crate::model::RowId;

/// Read access to the base store's object/metadata columns, as needed by
/// the comparator harness (§4.4) and the Populator's enumerators (§4.7).
///
/// A concrete primary store implements this; this crate never constructs
/// object/metadata values itself.
pub trait BaseStoreReader<O, M> {
    /// Reads the row's currently stored object, if the row exists.
    fn read_object(&self, row_id: &RowId) -> Result<Option<O>>;

    /// Reads the row's currently stored user metadata, if the row exists.
    fn read_metadata(&self, row_id: &RowId) -> Result<Option<M>>;

    /// Enumerates every row currently in the base store (used by the
    /// Populator's full rebuild path, §4.7). Implementations may stream.
    fn enumerate_all(&self, visit: &mut dyn FnMut(&RowId) -> Result<()>) -> Result<()>;
}

/// Capabilities the base store invokes on this view after every write (§6).
///
/// The base store calls these from inside its own transaction, after the
/// write against its own tables but before that transaction commits, so
/// that a failure here aborts the whole outer transaction per §4.1's
/// contract.
pub trait AfterWriteHooks<O, M> {
    /// A row was inserted or overwritten with a new object and metadata.
    fn after_set(&mut self, row_id: &RowId, object: &O, metadata: &M) -> Result<()>;

    /// A row's metadata changed without its object changing.
    fn after_set_metadata(&mut self, row_id: &RowId, metadata: &M) -> Result<()>;

    /// A single row was removed.
    fn after_remove(&mut self, row_id: &RowId) -> Result<()>;

    /// Several rows were removed in one call.
    fn after_remove_many(&mut self, row_ids: &[RowId]) -> Result<()>;

    /// Every row in `collection` was removed.
    fn after_remove_all_in_collection(&mut self, collection: &str) -> Result<()>;

    /// Every row in the base store was removed.
    fn after_remove_all(&mut self) -> Result<()>;
}
