//! Commit-time oversize/empty-page rebalancing (§4.6).
//!
//! Runs in two passes over every group touched by the transaction, in
//! order: first split any page that grew past [`MAX_PAGE_SIZE`] (preferring
//! to hand overflow to a neighbor before allocating a new page), then drop
//! any page left with zero rows. Running split before drop means a page
//! that both overflowed and, elsewhere in the same transaction, lost all
//! its original rows still gets a chance to receive spillover before the
//! drop pass considers it.

use std::collections::HashSet;

use crate::group_index::PageMeta;
use crate::locator;
use crate::model::{ChangeRecord, Group, MAX_PAGE_SIZE, PageId};
use crate::store::PageStore;
use crate::txn::ViewTransaction;

/// Runs both rebalancing passes over every group the transaction touched.
pub fn rebalance(txn: &mut ViewTransaction<'_>, store: &PageStore<'_>) -> crate::error::Result<()> {
    let groups: Vec<Group> = txn.mutated_groups.iter().cloned().collect();
    for group in &groups {
        split_oversize_pages(txn, store, group)?;
    }
    for group in &groups {
        drop_empty_pages(txn, group);
    }
    Ok(())
}

/// Pass A: split any page in `group` holding more than `MAX_PAGE_SIZE` rows.
fn split_oversize_pages(txn: &mut ViewTransaction<'_>, store: &PageStore<'_>, group: &Group) -> crate::error::Result<()> {
    loop {
        let Some(pages) = txn.group_index.pages(group) else { return Ok(()) };
        let oversize = pages.iter().enumerate().find(|(_, m)| m.count > MAX_PAGE_SIZE);
        let Some((pos, meta)) = oversize.map(|(i, m)| (i, m.clone())) else {
            return Ok(());
        };

        let mut rows = locator::load_page(store, &mut txn.cache, &meta.page_id)?;
        let overflow: Vec<_> = rows.split_off(MAX_PAGE_SIZE);

        let mut pages = txn.group_index.pages(group).expect("checked above").to_vec();
        pages[pos].count = rows.len();
        txn.cache.put_page(meta.page_id.clone(), rows);
        txn.mark_page_dirty(&meta.page_id);

        // Prefer handing overflow to the next page if there's room, else
        // splice a brand new page right after this one.
        if let Some(next) = pages.get(pos + 1).cloned() {
            if next.count + overflow.len() <= MAX_PAGE_SIZE {
                let mut next_rows = locator::load_page(store, &mut txn.cache, &next.page_id)?;
                for row_id in &overflow {
                    txn.cache.put_key_map(row_id.clone(), next.page_id.clone());
                    txn.mark_key_dirty(row_id);
                }
                let mut combined = overflow;
                combined.append(&mut next_rows);
                pages[pos + 1].count = combined.len();
                txn.cache.put_page(next.page_id.clone(), combined);
                txn.mark_page_dirty(&next.page_id);
                txn.group_index.set_pages(group, pages);
                continue;
            }
        }

        let new_page_id = PageId::generate();
        let new_count = overflow.len();
        txn.cache.put_page(new_page_id.clone(), overflow.clone());
        for row_id in &overflow {
            txn.cache.put_key_map(row_id.clone(), new_page_id.clone());
            txn.mark_key_dirty(row_id);
        }
        txn.mark_page_dirty(&new_page_id);

        let next_of_new = pages.get(pos + 1).map(|m| m.page_id.clone());
        pages.insert(
            pos + 1,
            PageMeta {
                page_id: new_page_id.clone(),
                group: group.clone(),
                prev_page_id: Some(meta.page_id.clone()),
                next_page_id: next_of_new,
                count: new_count,
            },
        );
        pages[pos].next_page_id = Some(new_page_id);
        txn.group_index.set_pages(group, pages);
    }
}

/// Pass B: drop any page in `group` left with zero rows, emitting
/// `DeleteGroup` if the group has no pages left afterward.
fn drop_empty_pages(txn: &mut ViewTransaction<'_>, group: &Group) {
    let Some(pages) = txn.group_index.pages(group) else { return };
    let mut kept = Vec::with_capacity(pages.len());
    let mut dropped: HashSet<PageId> = HashSet::new();
    for meta in pages {
        if meta.count == 0 {
            dropped.insert(meta.page_id.clone());
        } else {
            kept.push(meta.clone());
        }
    }
    if dropped.is_empty() {
        return;
    }
    relink(&mut kept);
    for page_id in &dropped {
        txn.mark_page_deleted(page_id);
    }
    let became_empty = kept.is_empty();
    txn.group_index.set_pages(group, kept);
    if became_empty {
        txn.push_change(ChangeRecord::DeleteGroup { group: group.clone() });
    }
}

fn relink(pages: &mut [PageMeta]) {
    for i in 0..pages.len() {
        let prev = if i == 0 { None } else { Some(pages[i - 1].page_id.clone()) };
        let next = pages.get(i + 1).map(|m| m.page_id.clone());
        pages[i].prev_page_id = prev;
        pages[i].next_page_id = next;
    }
}
