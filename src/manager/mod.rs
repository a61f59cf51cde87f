//! Database manager: registry of named tables and whole-table persistence.
//!
//! Each table is persisted as one `<name>.table` JSON document under the
//! database directory, holding the complete table value graph: records, the
//! record-identifier list, the id counter, and every index tree. Tree nodes
//! are stored as an id-addressed table with a tagged node variant, so parent
//! and leaf-chain links are plain integers that survive the round trip
//! without any relinking pass. Mutating calls persist the affected table
//! before returning; persistence failures surface to the caller and are
//! never retried.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::table::{RecordId, Table, TableError};
use crate::value::Value;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Table {0} already exists")]
    TableExists(String),

    #[error("Table {0} not found")]
    TableNotFound(String),

    #[error("Table error: {0}")]
    Table(#[from] TableError),

    #[error("Persistence failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("Persistence failure: {0}")]
    Encoding(#[from] serde_json::Error),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// File extension for persisted tables
const TABLE_EXT: &str = "table";

/// Summary of a table's shape, for the front end
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<String>,
    pub primary_key: String,
    pub indices: Vec<String>,
    pub record_count: usize,
}

pub struct DatabaseManager {
    db_dir: PathBuf,
    tables: HashMap<String, Table>,
}

impl DatabaseManager {
    /// Open a database directory, loading every persisted table
    pub fn new(db_dir: impl Into<PathBuf>) -> DatabaseResult<Self> {
        let mut manager = Self {
            db_dir: db_dir.into(),
            tables: HashMap::new(),
        };
        manager.load_all()?;
        Ok(manager)
    }

    /// Names of all registered tables, sorted
    pub fn get_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        names
    }

    fn table(&self, name: &str) -> DatabaseResult<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| DatabaseError::TableNotFound(name.to_string()))
    }

    fn table_mut(&mut self, name: &str) -> DatabaseResult<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| DatabaseError::TableNotFound(name.to_string()))
    }

    /// Create a table with an index on its primary key, and persist it
    pub fn create_table(
        &mut self,
        name: &str,
        columns: Vec<String>,
        primary_key: &str,
    ) -> DatabaseResult<&Table> {
        if self.tables.contains_key(name) {
            return Err(DatabaseError::TableExists(name.to_string()));
        }

        let table = Table::new(name, columns, primary_key)?;
        self.save_table(&table)?;
        Ok(self.tables.entry(name.to_string()).or_insert(table))
    }

    /// Drop a table and its persisted form
    pub fn drop_table(&mut self, name: &str) -> DatabaseResult<()> {
        if self.tables.remove(name).is_none() {
            return Err(DatabaseError::TableNotFound(name.to_string()));
        }

        let path = self.table_path(name);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Insert a record into a table
    pub fn insert(&mut self, table_name: &str, record: Vec<Value>) -> DatabaseResult<RecordId> {
        let rid = self.table_mut(table_name)?.insert(record)?;
        self.save_named(table_name)?;
        Ok(rid)
    }

    /// Select records: everything without a condition, a range when both
    /// bounds are given, an exact match otherwise
    pub fn select(
        &self,
        table_name: &str,
        condition_col: Option<&str>,
        condition_val: Option<&Value>,
        range_start: Option<&Value>,
        range_end: Option<&Value>,
    ) -> DatabaseResult<Vec<Vec<Value>>> {
        let table = self.table(table_name)?;

        match (condition_col, range_start, range_end) {
            (None, _, _) => Ok(table.select_all()),
            (Some(col), Some(start), Some(end)) => Ok(table.range_select(col, start, end)?),
            (Some(col), _, _) => match condition_val {
                Some(value) => Ok(table.select(col, value)?),
                None => Ok(Vec::new()),
            },
        }
    }

    /// Update matching records; returns the count updated
    pub fn update(
        &mut self,
        table_name: &str,
        condition_col: &str,
        condition_val: &Value,
        update_col: &str,
        update_val: &Value,
    ) -> DatabaseResult<usize> {
        let count =
            self.table_mut(table_name)?
                .update(condition_col, condition_val, update_col, update_val)?;
        self.save_named(table_name)?;
        Ok(count)
    }

    /// Delete matching records, or all records when no condition is given;
    /// returns the count deleted
    pub fn delete(
        &mut self,
        table_name: &str,
        condition_col: Option<&str>,
        condition_val: Option<&Value>,
    ) -> DatabaseResult<usize> {
        let table = self.table_mut(table_name)?;
        let count = match condition_col {
            None => table.delete_all()?,
            Some(col) => match condition_val {
                Some(value) => table.delete(col, value)?,
                None => 0,
            },
        };
        self.save_named(table_name)?;
        Ok(count)
    }

    /// Create an index on a column. Returns false if one already existed.
    pub fn create_index(&mut self, table_name: &str, column: &str) -> DatabaseResult<bool> {
        let created = self.table_mut(table_name)?.create_index(column)?;
        self.save_named(table_name)?;
        Ok(created)
    }

    pub fn get_table_info(&self, table_name: &str) -> DatabaseResult<TableInfo> {
        let table = self.table(table_name)?;
        Ok(TableInfo {
            name: table.name().to_string(),
            columns: table.columns().to_vec(),
            primary_key: table.primary_key().to_string(),
            indices: table.indexed_columns(),
            record_count: table.record_count(),
        })
    }

    fn table_path(&self, name: &str) -> PathBuf {
        self.db_dir.join(format!("{}.{}", name, TABLE_EXT))
    }

    fn save_table(&self, table: &Table) -> DatabaseResult<()> {
        fs::create_dir_all(&self.db_dir)?;
        let content = serde_json::to_string(table)?;
        fs::write(self.table_path(table.name()), content)?;
        Ok(())
    }

    fn save_named(&self, name: &str) -> DatabaseResult<()> {
        self.save_table(self.table(name)?)
    }

    /// Flush every table's current state to storage
    pub fn save_all(&self) -> DatabaseResult<()> {
        for table in self.tables.values() {
            self.save_table(table)?;
        }
        Ok(())
    }

    /// (Re)populate the registry from persisted tables
    pub fn load_all(&mut self) -> DatabaseResult<()> {
        self.tables.clear();

        if !self.db_dir.exists() {
            fs::create_dir_all(&self.db_dir)?;
            return Ok(());
        }

        for entry in fs::read_dir(&self.db_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(TABLE_EXT) {
                continue;
            }

            let content = fs::read_to_string(&path)?;
            let mut table: Table = serde_json::from_str(&content)?;
            table.rebuild_positions();
            self.tables.insert(table.name().to_string(), table);
        }
        Ok(())
    }
}
