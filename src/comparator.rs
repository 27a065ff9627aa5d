//! Dispatches grouping/sorting calls to whichever of the four shapes the
//! user declared, fetching the base store's object/metadata lazily (§4.4,
//! §9 "runtime polymorphic comparator shapes").
//!
//! Both grouping and sorting share the same dispatch pattern: tag the
//! closure with its [`crate::config::Shape`] once at registration, then
//! match on that tag exactly once per call rather than threading four
//! parallel code paths through the rest of the crate.

use std::cmp::Ordering;

use crate::base_store::BaseStoreReader;
use crate::config::{GroupingFn, SortingFn};
use crate::error::Result;
use crate::model::{Group, RowId};

/// What the caller already has in hand for a row, so the harness can skip
/// re-reading columns it doesn't need to fetch (§4.4: "the rowId being
/// inserted already has its object/metadata in hand").
pub struct RowHint<'a, O, M> {
    pub object: Option<&'a O>,
    pub metadata: Option<&'a M>,
}

impl<'a, O, M> Clone for RowHint<'a, O, M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, O, M> Copy for RowHint<'a, O, M> {}

impl<'a, O, M> Default for RowHint<'a, O, M> {
    fn default() -> Self {
        Self { object: None, metadata: None }
    }
}

impl<'a, O, M> RowHint<'a, O, M> {
    /// No hint available; the harness will fetch whatever the shape needs.
    pub fn none() -> Self {
        Self { object: None, metadata: None }
    }

    /// Both columns already available.
    pub fn both(object: &'a O, metadata: &'a M) -> Self {
        Self { object: Some(object), metadata: Some(metadata) }
    }
}

/// Evaluates the user's grouping function for a row, fetching its object
/// and/or metadata from `reader` if the declared shape needs columns the
/// caller didn't already have in hand.
pub fn evaluate_grouping<O, M>(
    grouping_fn: &GroupingFn<O, M>,
    reader: &impl BaseStoreReader<O, M>,
    row_id: &RowId,
    hint: RowHint<'_, O, M>,
) -> Result<Option<Group>> {
    match grouping_fn {
        GroupingFn::Key(f) => Ok(f(row_id)),
        GroupingFn::KeyObject(f) => {
            let owned;
            let object = match hint.object {
                Some(o) => o,
                None => {
                    owned = reader.read_object(row_id)?;
                    match owned.as_ref() {
                        Some(o) => o,
                        None => return Ok(None),
                    }
                }
            };
            Ok(f(row_id, object))
        }
        GroupingFn::KeyMetadata(f) => {
            let owned;
            let metadata = match hint.metadata {
                Some(m) => m,
                None => {
                    owned = reader.read_metadata(row_id)?;
                    match owned.as_ref() {
                        Some(m) => m,
                        None => return Ok(None),
                    }
                }
            };
            Ok(f(row_id, metadata))
        }
        GroupingFn::KeyObjectMetadata(f) => {
            let owned_o;
            let object = match hint.object {
                Some(o) => o,
                None => {
                    owned_o = reader.read_object(row_id)?;
                    match owned_o.as_ref() {
                        Some(o) => o,
                        None => return Ok(None),
                    }
                }
            };
            let owned_m;
            let metadata = match hint.metadata {
                Some(m) => m,
                None => {
                    owned_m = reader.read_metadata(row_id)?;
                    match owned_m.as_ref() {
                        Some(m) => m,
                        None => return Ok(None),
                    }
                }
            };
            Ok(f(row_id, object, metadata))
        }
    }
}

/// Compares two rows with the user's sorting function, fetching whichever
/// of `row_b`'s columns the declared shape reads (`row_a` uses `hint_a` if
/// provided, falling back to a fetch otherwise).
pub fn compare_rows<O, M>(
    sorting_fn: &SortingFn<O, M>,
    reader: &impl BaseStoreReader<O, M>,
    row_a: &RowId,
    hint_a: RowHint<'_, O, M>,
    row_b: &RowId,
) -> Result<Ordering> {
    match sorting_fn {
        SortingFn::Key(f) => Ok(f(row_a, row_b)),
        SortingFn::KeyObject(f) => {
            let owned_a;
            let object_a = match hint_a.object {
                Some(o) => o,
                None => {
                    owned_a = reader.read_object(row_a)?.ok_or_else(missing_row_err(row_a))?;
                    &owned_a
                }
            };
            let owned_b = reader.read_object(row_b)?.ok_or_else(missing_row_err(row_b))?;
            Ok(f(row_a, object_a, row_b, &owned_b))
        }
        SortingFn::KeyMetadata(f) => {
            let owned_a;
            let metadata_a = match hint_a.metadata {
                Some(m) => m,
                None => {
                    owned_a = reader.read_metadata(row_a)?.ok_or_else(missing_row_err(row_a))?;
                    &owned_a
                }
            };
            let owned_b = reader.read_metadata(row_b)?.ok_or_else(missing_row_err(row_b))?;
            Ok(f(row_a, metadata_a, row_b, &owned_b))
        }
        SortingFn::KeyObjectMetadata(f) => {
            let owned_oa;
            let object_a = match hint_a.object {
                Some(o) => o,
                None => {
                    owned_oa = reader.read_object(row_a)?.ok_or_else(missing_row_err(row_a))?;
                    &owned_oa
                }
            };
            let owned_ma;
            let metadata_a = match hint_a.metadata {
                Some(m) => m,
                None => {
                    owned_ma = reader.read_metadata(row_a)?.ok_or_else(missing_row_err(row_a))?;
                    &owned_ma
                }
            };
            let owned_ob = reader.read_object(row_b)?.ok_or_else(missing_row_err(row_b))?;
            let owned_mb = reader.read_metadata(row_b)?.ok_or_else(missing_row_err(row_b))?;
            Ok(f(row_a, object_a, metadata_a, row_b, &owned_ob, &owned_mb))
        }
    }
}

fn missing_row_err(row_id: &RowId) -> impl FnOnce() -> crate::error::ViewError + '_ {
    move || {
        crate::error::ViewError::UserCallbackFault(format!(
            "comparator shape requires columns for {row_id} but the base store has none"
        ))
    }
}
