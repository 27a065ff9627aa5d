//! Translates between a row id and its `(group, absolute index)` position,
//! and back (§4.3 "Locator").
//!
//! All operations are O(pages_in_group): pages hold at most
//! [`crate::model::MAX_PAGE_SIZE`] rows, so groups stay shallow regardless
//! of how many rows they hold in total.

use crate::cache::PageCache;
use crate::error::Result;
use crate::group_index::GroupIndex;
use crate::model::{Group, PageId, RowId};
use crate::store::PageStore;

/// Loads a page's row-id contents, filling the cache on a miss. Always
/// fills (unlike [`load_page_for_enumeration`]) since callers outside
/// enumeration want the freshest view regardless of cache pressure.
pub(crate) fn load_page(store: &PageStore<'_>, cache: &mut PageCache, page_id: &PageId) -> Result<Vec<RowId>> {
    if let Some(rows) = cache.get_page(page_id) {
        return Ok(rows.clone());
    }
    let rows = store.read_page(page_id)?;
    cache.put_page(page_id.clone(), rows.clone());
    Ok(rows)
}

/// Same as [`load_page`] but respects the cache's fill-avoidance rule
/// during enumeration, so a long scan doesn't evict hotter pages.
pub(crate) fn load_page_for_enumeration(
    store: &PageStore<'_>,
    cache: &mut PageCache,
    page_id: &PageId,
) -> Result<Vec<RowId>> {
    if let Some(rows) = cache.get_page(page_id) {
        return Ok(rows.clone());
    }
    let rows = store.read_page(page_id)?;
    cache.put_page_if_not_full(page_id.clone(), rows.clone());
    Ok(rows)
}

/// Given the page a row lives on, returns `(group, absolute index)`.
pub fn locate_in_page(
    store: &PageStore<'_>,
    cache: &mut PageCache,
    group_index: &GroupIndex,
    row_id: &RowId,
    page_id: &PageId,
) -> Result<Option<(Group, usize)>> {
    let Some(group) = group_index.group_of(page_id).cloned() else {
        return Ok(None);
    };
    let Some(pages) = group_index.pages(&group) else {
        return Ok(None);
    };
    let mut offset = 0usize;
    for meta in pages {
        if &meta.page_id == page_id {
            let rows = load_page(store, cache, page_id)?;
            let local = rows.iter().position(|r| r == row_id);
            return Ok(local.map(|i| (group.clone(), offset + i)));
        }
        offset += meta.count;
    }
    Ok(None)
}

/// Resolves `(group, index)` to the row id at that absolute position.
pub fn row_at(
    store: &PageStore<'_>,
    cache: &mut PageCache,
    group_index: &GroupIndex,
    group: &Group,
    index: usize,
) -> Result<Option<RowId>> {
    let Some(pages) = group_index.pages(group) else {
        return Ok(None);
    };
    let mut offset = 0usize;
    for meta in pages {
        if index < offset + meta.count {
            let rows = load_page(store, cache, &meta.page_id)?;
            return Ok(rows.get(index - offset).cloned());
        }
        offset += meta.count;
    }
    Ok(None)
}

/// Finds which page holds absolute index `index` within `group`'s chain,
/// and that page's starting offset, without loading page bodies. Used by
/// the Mutator to target an insertion (§4.4 step 6).
pub fn page_for_index(group_index: &GroupIndex, group: &Group, index: usize) -> Option<(PageId, usize)> {
    let pages = group_index.pages(group)?;
    let mut offset = 0usize;
    for meta in pages {
        if index < offset + meta.count {
            return Some((meta.page_id.clone(), offset));
        }
        offset += meta.count;
    }
    None
}
