//! In-memory per-group ordered sequence of page descriptors (§4.3).
//!
//! Per the re-architecture guidance in §9 ("cyclic pointer graphs"), pages
//! are modeled as values in a per-group ordered `Vec`, not as owning
//! references chained through `prev`/`next`: only `prev` is persisted,
//! `next` is derived once at load and kept in sync as the `Vec` is mutated.

use std::collections::HashMap;

use tracing::warn;

use crate::error::{Result, ViewError};
use crate::model::{Group, PageId};
use crate::store::PageMetaBody;

/// In-memory descriptor for one page: everything `GroupIndex` needs except
/// the page's row-id contents, which live in [`crate::cache::PageCache`] /
/// [`crate::store::PageStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMeta {
    /// This page's id.
    pub page_id: PageId,
    /// Group this page belongs to.
    pub group: Group,
    /// Previous page in the chain (persisted).
    pub prev_page_id: Option<PageId>,
    /// Next page in the chain (derived, never persisted).
    pub next_page_id: Option<PageId>,
    /// Number of rows currently on the page.
    pub count: usize,
}

/// Maintains, per group, the ordered sequence of page descriptors, plus the
/// reverse mapping from page id to its owning group (Invariant 6).
#[derive(Debug, Default, Clone)]
pub struct GroupIndex {
    groups: HashMap<Group, Vec<PageMeta>>,
    page_to_group: HashMap<PageId, Group>,
}

impl GroupIndex {
    /// An index with no groups, used when loading from disk fails (§4.3)
    /// or on first registration before the Populator runs.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Rebuilds the index from every persisted page meta. On any cycle or
    /// missing link, returns an error and the caller must treat the whole
    /// view as unusable until the Populator rebuilds it: a single bad
    /// group's chain does not get a partial, best-effort index.
    pub fn from_disk(records: Vec<(PageId, PageMetaBody)>) -> Result<Self> {
        let mut by_group: HashMap<Group, Vec<(PageId, PageMetaBody)>> = HashMap::new();
        for (page_id, body) in records {
            by_group.entry(body.group.clone()).or_default().push((page_id, body));
        }

        let mut index = Self::empty();
        for (group, entries) in by_group {
            let chain = Self::walk_chain(&group, entries)?;
            for meta in &chain {
                index.page_to_group.insert(meta.page_id.clone(), group.clone());
            }
            index.groups.insert(group, chain);
        }
        Ok(index)
    }

    fn walk_chain(group: &Group, entries: Vec<(PageId, PageMetaBody)>) -> Result<Vec<PageMeta>> {
        let total = entries.len();
        let mut by_id: HashMap<PageId, PageMetaBody> = HashMap::new();
        let mut by_prev: HashMap<Option<PageId>, PageId> = HashMap::new();
        for (page_id, body) in entries {
            if by_prev.insert(body.prev_page_id.clone(), page_id.clone()).is_some() {
                warn!(group = %group, "two pages in the same group share a prev pointer");
                return Err(ViewError::InvalidPageChain(group.clone()));
            }
            by_id.insert(page_id, body);
        }

        let mut chain = Vec::with_capacity(total);
        let mut cursor = by_prev.get(&None).cloned();
        while let Some(page_id) = cursor {
            let Some(body) = by_id.remove(&page_id) else {
                warn!(group = %group, "page chain references a page with no meta");
                return Err(ViewError::InvalidPageChain(group.clone()));
            };
            let next = by_prev.get(&Some(page_id.clone())).cloned();
            chain.push(PageMeta {
                page_id,
                group: body.group,
                prev_page_id: body.prev_page_id,
                next_page_id: next.clone(),
                count: body.count,
            });
            cursor = next;
        }

        if chain.len() != total {
            warn!(group = %group, visited = chain.len(), total, "page chain is broken or cyclic");
            return Err(ViewError::InvalidPageChain(group.clone()));
        }
        Ok(chain)
    }

    /// Returns the ordered page chain for a group, if it has any pages.
    pub fn pages(&self, group: &Group) -> Option<&[PageMeta]> {
        self.groups.get(group).map(|v| v.as_slice())
    }

    /// Returns the group a page belongs to.
    pub fn group_of(&self, page_id: &PageId) -> Option<&Group> {
        self.page_to_group.get(page_id)
    }

    /// True if the group currently has any pages.
    pub fn has_group(&self, group: &Group) -> bool {
        self.groups.contains_key(group)
    }

    /// Every group currently present, insertion order unspecified.
    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.keys()
    }

    /// Number of groups currently present.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Total row count for a group (sum of its pages' counts).
    pub fn row_count(&self, group: &Group) -> usize {
        self.groups
            .get(group)
            .map(|pages| pages.iter().map(|p| p.count).sum())
            .unwrap_or(0)
    }

    /// Total row count across every group.
    pub fn total_row_count(&self) -> usize {
        self.groups.values().flatten().map(|p| p.count).sum()
    }

    /// Creates a brand new single-page group holding just `page_id`.
    pub fn insert_sole_page(&mut self, meta: PageMeta) {
        self.page_to_group.insert(meta.page_id.clone(), meta.group.clone());
        self.groups.insert(meta.group.clone(), vec![meta]);
    }

    /// Replaces a group's whole page chain (used after mutation/rebalance).
    pub fn set_pages(&mut self, group: &Group, pages: Vec<PageMeta>) {
        for page_id in self.groups.get(group).into_iter().flatten().map(|p| &p.page_id) {
            self.page_to_group.remove(page_id);
        }
        for meta in &pages {
            self.page_to_group.insert(meta.page_id.clone(), group.clone());
        }
        if pages.is_empty() {
            self.groups.remove(group);
        } else {
            self.groups.insert(group.clone(), pages);
        }
    }

    /// Removes a group entirely (its page list became empty at commit).
    pub fn remove_group(&mut self, group: &Group) {
        if let Some(pages) = self.groups.remove(group) {
            for meta in pages {
                self.page_to_group.remove(&meta.page_id);
            }
        }
    }

    /// Drops every group (used by `clear()`).
    pub fn clear(&mut self) {
        self.groups.clear();
        self.page_to_group.clear();
    }
}
