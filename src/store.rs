//! Durable storage for the view: a mapping-table/page-table pair against an
//! embedded SQL engine (§4.1, §6).
//!
//! `PageStore` does no caching of its own, [`crate::cache::PageCache`]
//! sits in front of it, and performs no transaction management: writes
//! here are part of whatever outer transaction the caller (normally
//! [`crate::hook::ViewHook`], invoked from inside the base store's own
//! transaction) is running. A failed write here propagates and aborts that
//! outer transaction, matching the teacher's `sqlite_adapter.rs` idiom of
//! short-lived prepared statements bound once per call.

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{Group, PageId, RowId};

/// Maximum number of bound parameters used in a single chunked `IN`/`OR`
/// query against the mapping table, comfortably under SQLite's default
/// bound-parameter ceiling.
const LIMIT_VARIABLE_NUMBER: usize = 500;

/// Decoded body of a `<view>_page` row: an ordered sequence of row ids.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PageBody {
    rows: Vec<RowIdWire>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RowIdWire {
    collection: String,
    key: String,
}

impl From<&RowId> for RowIdWire {
    fn from(row: &RowId) -> Self {
        Self {
            collection: row.collection.clone(),
            key: row.key.clone(),
        }
    }
}

impl From<RowIdWire> for RowId {
    fn from(wire: RowIdWire) -> Self {
        RowId::new(wire.collection, wire.key)
    }
}

/// Decoded body of a `<view>_page` row's metadata column (§3): group,
/// persisted `prevPageId`, and row count. `nextPageId` is never persisted;
/// it is rebuilt at load time by [`crate::group_index::GroupIndex`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageMetaBody {
    /// Group this page belongs to.
    pub group: Group,
    /// Previous page in the group's chain, or `None` for the head page.
    pub prev_page_id: Option<PageId>,
    /// Number of rows currently stored in the page.
    pub count: usize,
}

/// Durable table pair for one registered view.
pub struct PageStore<'c> {
    conn: &'c Connection,
    key_table: String,
    page_table: String,
    info_table: String,
}

impl<'c> PageStore<'c> {
    /// Binds a `PageStore` to `view_name`'s tables on `conn`. Does not
    /// create the tables; call [`PageStore::create_tables_if_missing`]
    /// for that.
    pub fn new(conn: &'c Connection, view_name: &str) -> Self {
        Self {
            conn,
            key_table: format!("{view_name}_key"),
            page_table: format!("{view_name}_page"),
            info_table: format!("{view_name}_info"),
        }
    }

    /// Creates the view's tables if they do not already exist (§6).
    pub fn create_tables_if_missing(&self) -> Result<()> {
        self.conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {key}(
                collection TEXT NOT NULL,
                key TEXT NOT NULL,
                pageKey TEXT NOT NULL,
                PRIMARY KEY(collection, key)
            );
            CREATE INDEX IF NOT EXISTS {key}_page_idx ON {key}(pageKey);
            CREATE TABLE IF NOT EXISTS {page}(
                pageKey TEXT PRIMARY KEY,
                data BLOB,
                metadata BLOB
            );
            CREATE TABLE IF NOT EXISTS {info}(
                key TEXT PRIMARY KEY,
                value TEXT
            );",
            key = self.key_table,
            page = self.page_table,
            info = self.info_table,
        ))?;
        Ok(())
    }

    /// Reads the persisted view version, if the view has ever been
    /// registered on this connection before.
    pub fn read_version(&self) -> Result<Option<i64>> {
        let sql = format!("SELECT value FROM {} WHERE key = 'version'", self.info_table);
        let value: Option<String> = self
            .conn
            .query_row(&sql, [], |row| row.get(0))
            .optional()?;
        Ok(value.and_then(|v| v.parse().ok()))
    }

    /// Persists the view version.
    pub fn write_version(&self, version: i64) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (key, value) VALUES ('version', ?1)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            self.info_table
        );
        self.conn.execute(&sql, params![version.to_string()])?;
        Ok(())
    }

    /// Loads every persisted page meta, used once at transaction start to
    /// rebuild the in-memory `GroupIndex` (§4.1, §4.3).
    pub fn load_all_page_metas(&self) -> Result<Vec<(PageId, PageMetaBody)>> {
        let sql = format!("SELECT pageKey, metadata FROM {}", self.page_table);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            let page_key: String = row.get(0)?;
            let meta_blob: Vec<u8> = row.get(1)?;
            Ok((page_key, meta_blob))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (page_key, meta_blob) = row?;
            let meta: PageMetaBody = serde_json::from_slice(&meta_blob)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
            out.push((PageId(page_key), meta));
        }
        stmt.finalize()?;
        Ok(out)
    }

    /// Reads a page's row-id sequence.
    pub fn read_page(&self, page_id: &PageId) -> Result<Vec<RowId>> {
        let sql = format!("SELECT data FROM {} WHERE pageKey = ?1", self.page_table);
        let mut stmt = self.conn.prepare(&sql)?;
        let data: Vec<u8> = stmt.query_row(params![page_id.0], |row| row.get(0))?;
        stmt.finalize()?;
        let body: PageBody = serde_json::from_slice(&data)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
        Ok(body.rows.into_iter().map(RowId::from).collect())
    }

    /// Writes a page's row-id sequence and its meta together.
    pub fn write_page(&self, page_id: &PageId, rows: &[RowId], meta: &PageMetaBody) -> Result<()> {
        let body = PageBody {
            rows: rows.iter().map(RowIdWire::from).collect(),
        };
        let data = serde_json::to_vec(&body)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
        let meta_blob = serde_json::to_vec(meta)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
        let sql = format!(
            "INSERT INTO {page} (pageKey, data, metadata) VALUES (?1, ?2, ?3)
             ON CONFLICT(pageKey) DO UPDATE SET data = excluded.data, metadata = excluded.metadata",
            page = self.page_table
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        stmt.execute(params![page_id.0, data, meta_blob])?;
        Ok(())
    }

    /// Writes only a page's meta, leaving its row data untouched.
    pub fn write_meta(&self, page_id: &PageId, meta: &PageMetaBody) -> Result<()> {
        let meta_blob = serde_json::to_vec(meta)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
        let sql = format!("UPDATE {} SET metadata = ?2 WHERE pageKey = ?1", self.page_table);
        let mut stmt = self.conn.prepare_cached(&sql)?;
        stmt.execute(params![page_id.0, meta_blob])?;
        Ok(())
    }

    /// Deletes a page body+meta outright (used when it becomes empty).
    pub fn delete_page(&self, page_id: &PageId) -> Result<()> {
        let sql = format!("DELETE FROM {} WHERE pageKey = ?1", self.page_table);
        let mut stmt = self.conn.prepare_cached(&sql)?;
        stmt.execute(params![page_id.0])?;
        Ok(())
    }

    /// Records that `row_id` now lives on `page_id`.
    pub fn put_key_map(&self, row_id: &RowId, page_id: &PageId) -> Result<()> {
        let sql = format!(
            "INSERT INTO {key} (collection, key, pageKey) VALUES (?1, ?2, ?3)
             ON CONFLICT(collection, key) DO UPDATE SET pageKey = excluded.pageKey",
            key = self.key_table
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        stmt.execute(params![row_id.collection, row_id.key, page_id.0])?;
        Ok(())
    }

    /// Removes `row_id`'s mapping entirely.
    pub fn delete_key_map(&self, row_id: &RowId) -> Result<()> {
        let sql = format!(
            "DELETE FROM {} WHERE collection = ?1 AND key = ?2",
            self.key_table
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        stmt.execute(params![row_id.collection, row_id.key])?;
        Ok(())
    }

    /// Looks up the page a row currently lives on, if any.
    pub fn lookup_key_map(&self, row_id: &RowId) -> Result<Option<PageId>> {
        let sql = format!(
            "SELECT pageKey FROM {} WHERE collection = ?1 AND key = ?2",
            self.key_table
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let page_key: Option<String> = stmt
            .query_row(params![row_id.collection, row_id.key], |row| row.get(0))
            .optional()?;
        Ok(page_key.map(PageId))
    }

    /// Resolves `(row_id, page_id)` for a batch of rows via chunked `OR`
    /// queries against the mapping table (§4.5).
    pub fn pages_for_rows(&self, row_ids: &[RowId]) -> Result<Vec<(RowId, PageId)>> {
        let mut out = Vec::with_capacity(row_ids.len());
        for chunk in row_ids.chunks(LIMIT_VARIABLE_NUMBER / 2) {
            let predicate = chunk
                .iter()
                .map(|_| "(collection = ? AND key = ?)")
                .collect::<Vec<_>>()
                .join(" OR ");
            let sql = format!(
                "SELECT collection, key, pageKey FROM {} WHERE {predicate}",
                self.key_table
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let mut bound: Vec<&dyn rusqlite::ToSql> = Vec::with_capacity(chunk.len() * 2);
            for row in chunk {
                bound.push(&row.collection);
                bound.push(&row.key);
            }
            let rows = stmt.query_map(bound.as_slice(), |row| {
                let collection: String = row.get(0)?;
                let key: String = row.get(1)?;
                let page_key: String = row.get(2)?;
                Ok((RowId::new(collection, key), PageId(page_key)))
            })?;
            for row in rows {
                out.push(row?);
            }
            stmt.finalize()?;
        }
        Ok(out)
    }

    /// Resolves every `(row_id, page_id)` mapping for rows in `collection`.
    pub fn pages_for_collection(&self, collection: &str) -> Result<Vec<(RowId, PageId)>> {
        let sql = format!(
            "SELECT collection, key, pageKey FROM {} WHERE collection = ?1",
            self.key_table
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![collection], |row| {
            let collection: String = row.get(0)?;
            let key: String = row.get(1)?;
            let page_key: String = row.get(2)?;
            Ok((RowId::new(collection, key), PageId(page_key)))
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        stmt.finalize()?;
        Ok(out)
    }

    /// Truncates both tables (used by `clear()`).
    pub fn clear_all(&self) -> Result<()> {
        self.conn
            .execute(&format!("DELETE FROM {}", self.key_table), [])?;
        self.conn
            .execute(&format!("DELETE FROM {}", self.page_table), [])?;
        Ok(())
    }
}
