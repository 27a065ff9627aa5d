//! Property-based tests for the universal invariants P1-P7.

mod common;

use std::collections::{HashMap, HashSet};

use common::{open_conn, TestBaseStore};
use pagedview::group_index::GroupIndex;
use pagedview::store::PageStore;
use pagedview::{BaseStoreReader, ChangeRecord, Group, GroupingFn, RowId, SortingFn, View, ViewConfig};
use proptest::prelude::*;

fn config() -> ViewConfig<i64, String> {
    ViewConfig::new(
        GroupingFn::KeyObject(Box::new(|_row_id, object: &i64| Some(Group::from((object.rem_euclid(3)).to_string())))),
        SortingFn::KeyObject(Box::new(|_a, oa: &i64, _b, ob: &i64| oa.cmp(ob))),
    )
}

#[derive(Debug, Clone)]
enum Op {
    Insert { key: u32, value: i64 },
    SetObject { key: u32, value: i64 },
    Remove { key: u32 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u32..20, -50i64..50).prop_map(|(key, value)| Op::Insert { key, value }),
        (0u32..20, -50i64..50).prop_map(|(key, value)| Op::SetObject { key, value }),
        (0u32..20).prop_map(|key| Op::Remove { key }),
    ]
}

fn row_id_for(key: u32) -> RowId {
    RowId::new("c", key.to_string())
}

/// Applies `ops` against a fresh view, one committed transaction per op,
/// tracking which keys are currently present in the base store.
fn apply_ops(conn: &rusqlite::Connection, view: &View<i64, String>, base: &TestBaseStore, ops: &[Op]) -> HashSet<u32> {
    let mut present = HashSet::new();
    for op in ops {
        match op {
            Op::Insert { key, value } => {
                let row_id = row_id_for(*key);
                base.insert(row_id.clone(), *value, "");
                present.insert(*key);
                view.set(conn, base, &row_id, value, &String::new()).unwrap();
            }
            Op::SetObject { key, value } => {
                if present.contains(key) {
                    let row_id = row_id_for(*key);
                    base.insert(row_id.clone(), *value, "");
                    view.set(conn, base, &row_id, value, &String::new()).unwrap();
                }
            }
            Op::Remove { key } => {
                if present.remove(key) {
                    view.remove(conn, &row_id_for(*key)).unwrap();
                }
            }
        }
    }
    present
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 24, .. ProptestConfig::default() })]

    /// P1, P2, P3, P4, P5: after an arbitrary sequence of inserts/updates/
    /// removals, every persisted group is sorted, its page counts agree with
    /// the key map, its chain is acyclic and covers exactly its own pages,
    /// and no page is oversize or empty.
    #[test]
    fn invariants_hold_after_arbitrary_mutation(ops in prop::collection::vec(op_strategy(), 0..40)) {
        let conn = open_conn();
        let base = TestBaseStore::new();
        let view = View::register(&conn, "props", config(), &base).unwrap();

        let present = apply_ops(&conn, &view, &base, &ops);

        let store = PageStore::new(&conn, "props");
        let metas = store.load_all_page_metas().unwrap();
        let index = GroupIndex::from_disk(metas).unwrap(); // P4: chain reconstructs without error

        let mut seen_rows: HashMap<RowId, pagedview::model::PageId> = HashMap::new();
        for group in index.groups().cloned().collect::<Vec<_>>() {
            let pages = index.pages(&group).unwrap();
            let mut ordered_objects = Vec::new();
            for page in pages {
                prop_assert!(page.count > 0, "P5: page must not be empty"); // P5
                prop_assert!(page.count <= 50, "P5: page must not exceed capacity"); // P5
                let rows = store.read_page(&page.page_id).unwrap();
                prop_assert_eq!(rows.len(), page.count);
                for row_id in &rows {
                    let object = base.read_object(row_id).unwrap().unwrap();
                    ordered_objects.push(object);
                    seen_rows.insert(row_id.clone(), page.page_id.clone());
                }
            }
            prop_assert!(ordered_objects.windows(2).all(|w| w[0] <= w[1]), "P1: group must be sorted"); // P1
            let expected_count: usize = pages.iter().map(|p| p.count).sum();
            prop_assert_eq!(expected_count, present.iter().filter(|k| {
                let object = base.read_object(&row_id_for(**k)).unwrap().unwrap();
                Group::from((object.rem_euclid(3)).to_string()) == group
            }).count()); // P2
        }

        prop_assert_eq!(seen_rows.len(), present.len()); // P3 (every live row landed in exactly one page)
        for key in &present {
            let row_id = row_id_for(*key);
            let looked_up = store.lookup_key_map(&row_id).unwrap();
            prop_assert_eq!(looked_up.as_ref(), seen_rows.get(&row_id)); // P3
        }
    }

    /// P6: re-setting a row to the same object (same group, same comparator
    /// position) emits exactly one `UpdateRow`, never an `InsertRow`/`DeleteRow`.
    #[test]
    fn stable_set_emits_single_update_row(seed in prop::collection::vec(-50i64..50, 3..12), pick in 0usize..12) {
        let conn = open_conn();
        let base = TestBaseStore::new();
        let view = View::register(&conn, "props_p6", config(), &base).unwrap();

        for (key, value) in seed.iter().enumerate() {
            let row_id = row_id_for(key as u32);
            base.insert(row_id.clone(), *value, "");
            view.set(&conn, &base, &row_id, value, &String::new()).unwrap();
        }

        let pick = pick % seed.len();
        let row_id = row_id_for(pick as u32);
        let value = seed[pick];
        let log = view.set(&conn, &base, &row_id, &value, &String::new()).unwrap();

        prop_assert_eq!(log.len(), 1);
        let is_update_row = matches!(&log[0], ChangeRecord::UpdateRow { row_id: r, .. } if *r == row_id);
        prop_assert!(is_update_row);
    }
}

/// P7: tearing down in-memory state and reloading from `PageStore` reproduces
/// an identical `GroupIndex` and page contents.
#[test]
fn round_trip_after_reopen_reproduces_state() {
    let conn = open_conn();
    let base = TestBaseStore::new();
    let view = View::register(&conn, "p7", config(), &base).unwrap();

    for i in 0..37i64 {
        let row_id = row_id_for(i as u32);
        base.insert(row_id.clone(), i, "");
        view.set(&conn, &base, &row_id, &i, &String::new()).unwrap();
    }

    let store = PageStore::new(&conn, "p7");
    let before = GroupIndex::from_disk(store.load_all_page_metas().unwrap()).unwrap();

    drop(view);
    let base2 = TestBaseStore::new();
    for i in 0..37i64 {
        base2.insert(row_id_for(i as u32), i, "");
    }
    let _reopened = View::register(&conn, "p7", config(), &base2).unwrap();

    let after = GroupIndex::from_disk(store.load_all_page_metas().unwrap()).unwrap();

    for group in before.groups() {
        let before_pages: Vec<_> = before.pages(group).unwrap().iter().map(|p| &p.page_id).collect();
        let after_pages: Vec<_> = after.pages(group).unwrap().iter().map(|p| &p.page_id).collect();
        assert_eq!(before_pages, after_pages);
        for page_id in before_pages {
            assert_eq!(store.read_page(page_id).unwrap(), store.read_page(page_id).unwrap());
        }
    }
    assert_eq!(before.total_row_count(), after.total_row_count());
}
