//! Data model for the ordered-view extension.
//!
//! [`RowId`] and [`PageId`] identify rows and pages, [`Group`] labels a
//! partition of the base store, and [`ChangeRecord`] is the per-transaction
//! change-set handed to observers after commit.

use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Maximum number of rows a single page may hold after commit (§3, Invariant 4).
pub const MAX_PAGE_SIZE: usize = 50;

/// Identifies a row in the base store: a (collection, key) pair.
///
/// Collections and keys are arbitrary non-null strings; the pair is unique
/// across the base store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowId {
    /// Name of the collection the row lives in.
    pub collection: String,
    /// Key uniquely identifying the row within its collection.
    pub key: String,
}

impl RowId {
    /// Builds a new row identifier.
    pub fn new(collection: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.key)
    }
}

/// A label produced by the user's grouping function; rows under the same
/// group form one ordered sequence of pages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Group(pub String);

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Group {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Group {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Opaque, randomly generated identifier for a page. Unique for the
/// lifetime of the database; collisions are a fatal corruption that should
/// never occur (§9).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageId(pub String);

impl PageId {
    /// Generates a fresh page id from a 128-bit value drawn from the
    /// process-wide cryptographic RNG, formatted as a UUIDv4-shaped string.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        // Set the version (4) and variant (RFC 4122) bits so the string is
        // shaped like a real UUIDv4, even though nothing parses it back.
        bytes[6] = (bytes[6] & 0x0f) | 0x40;
        bytes[8] = (bytes[8] & 0x3f) | 0x80;
        let hex = hex::encode(bytes);
        Self(format!(
            "{}-{}-{}-{}-{}",
            &hex[0..8],
            &hex[8..12],
            &hex[12..16],
            &hex[16..20],
            &hex[20..32]
        ))
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bitset over the columns a [`ChangeRecord::UpdateRow`] touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ColumnFlags(u8);

impl ColumnFlags {
    /// The row's stored object changed.
    pub const OBJECT: ColumnFlags = ColumnFlags(1 << 0);
    /// The row's user metadata changed.
    pub const METADATA: ColumnFlags = ColumnFlags(1 << 1);
    /// Neither column changed (a pure position touch, which cannot happen
    /// via [`crate::view::View::touch`]: touch always names a column).
    pub const NONE: ColumnFlags = ColumnFlags(0);

    /// Unions two flag sets.
    pub fn union(self, other: ColumnFlags) -> ColumnFlags {
        ColumnFlags(self.0 | other.0)
    }

    /// True if `self` has every bit set in `other`.
    pub fn contains(self, other: ColumnFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if no bit is set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// A single entry in a transaction's change log (§3, §4.8).
///
/// `InsertGroup`/`DeleteGroup`/`ResetGroup` are section-level records;
/// `InsertRow`/`DeleteRow`/`UpdateRow` are row-level. The log is append-only
/// within a transaction; no coalescing happens until an observer folds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeRecord {
    /// A row was inserted at `index` within `group`.
    InsertRow {
        /// Row that was inserted.
        row_id: RowId,
        /// Group it was inserted into.
        group: Group,
        /// Absolute index within the group after insertion.
        index: usize,
    },
    /// A row was deleted from `index` within `group`.
    DeleteRow {
        /// Row that was deleted.
        row_id: RowId,
        /// Group it was removed from.
        group: Group,
        /// Absolute index the row held immediately before deletion.
        index: usize,
    },
    /// A row's object and/or metadata columns changed without moving it.
    UpdateRow {
        /// Row that was updated.
        row_id: RowId,
        /// Group the row belongs to.
        group: Group,
        /// Current absolute index of the row within the group.
        index: usize,
        /// Which columns changed.
        columns: ColumnFlags,
    },
    /// A group was created (its first row was inserted).
    InsertGroup {
        /// Group that was created.
        group: Group,
    },
    /// A group was deleted (its last page became empty at commit).
    DeleteGroup {
        /// Group that was deleted.
        group: Group,
    },
    /// A group's contents were wholesale reset (used by `clear()`).
    ResetGroup {
        /// Group that was reset.
        group: Group,
    },
}
