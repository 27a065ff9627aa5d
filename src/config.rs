//! Registration-time configuration: which columns the user's grouping and
//! sorting functions read, the functions themselves, and cache/versioning
//! knobs (§6).

use std::cmp::Ordering;

use crate::model::{ColumnFlags, Group, RowId};

/// Which of the base store's columns a grouping or sorting function reads.
///
/// Dictates lazy fetching in the comparator harness (§4.4) and which of the
/// four Populator enumerators gets used (§4.7): a single dispatch point
/// keyed on this tag, rather than four duplicated code paths (§9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Reads only the row's key.
    Key,
    /// Reads the row's key and its stored object.
    KeyObject,
    /// Reads the row's key and its user metadata.
    KeyMetadata,
    /// Reads the row's key, its stored object, and its user metadata.
    KeyObjectMetadata,
}

impl Shape {
    /// The columns this shape reads, as flags (used by `touch`'s no-op rule).
    pub fn columns_read(self) -> ColumnFlags {
        match self {
            Shape::Key => ColumnFlags::NONE,
            Shape::KeyObject => ColumnFlags::OBJECT,
            Shape::KeyMetadata => ColumnFlags::METADATA,
            Shape::KeyObjectMetadata => ColumnFlags::OBJECT.union(ColumnFlags::METADATA),
        }
    }
}

/// The user's grouping function, tagged with the [`Shape`] it was declared
/// with. Returns `None` ("⊥") to exclude a row from the view entirely.
pub enum GroupingFn<O, M> {
    /// Groups using only the row id.
    Key(Box<dyn Fn(&RowId) -> Option<Group> + Send + Sync>),
    /// Groups using the row id and its stored object.
    KeyObject(Box<dyn Fn(&RowId, &O) -> Option<Group> + Send + Sync>),
    /// Groups using the row id and its user metadata.
    KeyMetadata(Box<dyn Fn(&RowId, &M) -> Option<Group> + Send + Sync>),
    /// Groups using the row id, object, and user metadata.
    KeyObjectMetadata(Box<dyn Fn(&RowId, &O, &M) -> Option<Group> + Send + Sync>),
}

impl<O, M> GroupingFn<O, M> {
    /// The shape this function was declared with.
    pub fn shape(&self) -> Shape {
        match self {
            GroupingFn::Key(_) => Shape::Key,
            GroupingFn::KeyObject(_) => Shape::KeyObject,
            GroupingFn::KeyMetadata(_) => Shape::KeyMetadata,
            GroupingFn::KeyObjectMetadata(_) => Shape::KeyObjectMetadata,
        }
    }
}

/// The user's sorting function, tagged with the [`Shape`] it was declared
/// with. Takes two candidate rows and returns their relative order.
pub enum SortingFn<O, M> {
    /// Orders using only row ids.
    Key(Box<dyn Fn(&RowId, &RowId) -> Ordering + Send + Sync>),
    /// Orders using row ids and stored objects.
    KeyObject(Box<dyn Fn(&RowId, &O, &RowId, &O) -> Ordering + Send + Sync>),
    /// Orders using row ids and user metadata.
    KeyMetadata(Box<dyn Fn(&RowId, &M, &RowId, &M) -> Ordering + Send + Sync>),
    /// Orders using row ids, objects, and user metadata.
    KeyObjectMetadata(Box<dyn Fn(&RowId, &O, &M, &RowId, &O, &M) -> Ordering + Send + Sync>),
}

impl<O, M> SortingFn<O, M> {
    /// The shape this function was declared with.
    pub fn shape(&self) -> Shape {
        match self {
            SortingFn::Key(_) => Shape::Key,
            SortingFn::KeyObject(_) => Shape::KeyObject,
            SortingFn::KeyMetadata(_) => Shape::KeyMetadata,
            SortingFn::KeyObjectMetadata(_) => Shape::KeyObjectMetadata,
        }
    }
}

/// Registration-time configuration for an ordered view.
pub struct ViewConfig<O, M> {
    /// User grouping function.
    pub grouping_fn: GroupingFn<O, M>,
    /// User sorting function.
    pub sorting_fn: SortingFn<O, M>,
    /// Version; bumping this forces the Populator to rebuild on next open.
    pub version: i64,
    /// Bound on the decoded-page cache (named `objectCacheLimit` in the
    /// registration API); `0` means unbounded.
    pub object_cache_limit: usize,
    /// Bound on the RowId→PageId lookup cache (named `metadataCacheLimit`
    /// in the registration API); `0` means unbounded.
    pub metadata_cache_limit: usize,
}

impl<O, M> ViewConfig<O, M> {
    /// Starts building a configuration from the required grouping/sorting
    /// functions, with version `0` and unbounded caches.
    pub fn new(grouping_fn: GroupingFn<O, M>, sorting_fn: SortingFn<O, M>) -> Self {
        Self {
            grouping_fn,
            sorting_fn,
            version: 0,
            object_cache_limit: 0,
            metadata_cache_limit: 0,
        }
    }

    /// Sets the configured version.
    pub fn with_version(mut self, version: i64) -> Self {
        self.version = version;
        self
    }

    /// Sets the decoded-page cache bound.
    pub fn with_object_cache_limit(mut self, limit: usize) -> Self {
        self.object_cache_limit = limit;
        self
    }

    /// Sets the RowId→PageId lookup cache bound.
    pub fn with_metadata_cache_limit(mut self, limit: usize) -> Self {
        self.metadata_cache_limit = limit;
        self
    }
}
