//! Shared test scaffolding: an in-memory base store exercising the view end
//! to end. Not part of the crate's public API — it stands in for whatever
//! primary key/value store a real caller would have wired up.

use std::cell::RefCell;
use std::collections::HashMap;

use pagedview::{BaseStoreReader, Result, RowId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub object: i64,
    pub metadata: String,
}

pub struct TestBaseStore {
    rows: RefCell<HashMap<RowId, Row>>,
}

impl TestBaseStore {
    pub fn new() -> Self {
        Self { rows: RefCell::new(HashMap::new()) }
    }

    pub fn insert(&self, row_id: RowId, object: i64, metadata: impl Into<String>) {
        self.rows.borrow_mut().insert(row_id, Row { object, metadata: metadata.into() });
    }

    pub fn set_metadata(&self, row_id: &RowId, metadata: impl Into<String>) {
        if let Some(row) = self.rows.borrow_mut().get_mut(row_id) {
            row.metadata = metadata.into();
        }
    }

    pub fn remove(&self, row_id: &RowId) {
        self.rows.borrow_mut().remove(row_id);
    }
}

impl BaseStoreReader<i64, String> for TestBaseStore {
    fn read_object(&self, row_id: &RowId) -> Result<Option<i64>> {
        Ok(self.rows.borrow().get(row_id).map(|r| r.object))
    }

    fn read_metadata(&self, row_id: &RowId) -> Result<Option<String>> {
        Ok(self.rows.borrow().get(row_id).map(|r| r.metadata.clone()))
    }

    fn enumerate_all(&self, visit: &mut dyn FnMut(&RowId) -> Result<()>) -> Result<()> {
        let keys: Vec<RowId> = self.rows.borrow().keys().cloned().collect();
        for row_id in &keys {
            visit(row_id)?;
        }
        Ok(())
    }
}

pub fn open_conn() -> rusqlite::Connection {
    rusqlite::Connection::open_in_memory().unwrap()
}
