//! # pagedview
//!
//! A paged, ordered secondary-index extension over an embedded key/value
//! store. Rows are grouped by a user-supplied function and, within each
//! group, kept in an order maintained by a user-supplied comparator,
//! incrementally, on every base-store write, without re-sorting the whole
//! group.
//!
//! ## Quick start
//!
//! ```rust
//! use pagedview::{
//!     BaseStoreReader, ColumnFlags, Group, GroupingFn, RowId, SortingFn, View, ViewConfig,
//! };
//!
//! struct InMemoryStore;
//!
//! impl BaseStoreReader<i64, ()> for InMemoryStore {
//!     fn read_object(&self, _row_id: &RowId) -> pagedview::Result<Option<i64>> {
//!         Ok(Some(0))
//!     }
//!     fn read_metadata(&self, _row_id: &RowId) -> pagedview::Result<Option<()>> {
//!         Ok(Some(()))
//!     }
//!     fn enumerate_all(&self, _visit: &mut dyn FnMut(&RowId) -> pagedview::Result<()>) -> pagedview::Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! # fn main() -> pagedview::Result<()> {
//! let conn = rusqlite::Connection::open_in_memory()?;
//! let config = ViewConfig::new(
//!     GroupingFn::Key(Box::new(|_row_id| Some(Group::from("all")))),
//!     SortingFn::KeyObject(Box::new(|_a, oa: &i64, _b, ob: &i64| oa.cmp(ob))),
//! );
//! let view = View::register(&conn, "by_value", config, &InMemoryStore)?;
//! assert_eq!(view.total_row_count(), 0);
//! # let _ = ColumnFlags::NONE;
//! # Ok(())
//! # }
//! ```
//!
//! ## Out of scope (see the crate's design notes)
//!
//! The primary key/value store's own transaction implementation, SQL
//! statement pooling/WAL handshake, and object/metadata serialization
//! format are all external collaborators this crate only talks to through
//! [`BaseStoreReader`] and [`AfterWriteHooks`].

pub mod base_store;
pub mod cache;
pub mod changelog;
pub mod comparator;
pub mod config;
pub mod error;
pub mod group_index;
pub mod hook;
pub mod locator;
pub mod logging;
pub mod model;
pub mod mutator;
pub mod populator;
pub mod rebalancer;
pub mod store;
pub mod txn;
pub mod view;

pub use crate::base_store::{AfterWriteHooks, BaseStoreReader};
pub use crate::cache::PageCache;
pub use crate::comparator::RowHint;
pub use crate::config::{GroupingFn, Shape, SortingFn, ViewConfig};
pub use crate::error::{Result, ViewError};
pub use crate::group_index::GroupIndex;
pub use crate::hook::ViewHook;
pub use crate::model::{ChangeRecord, ColumnFlags, Group, PageId, RowId};
pub use crate::txn::ViewTransaction;
pub use crate::view::View;
