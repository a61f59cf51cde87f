//! Table layer: the authoritative record store with stable record
//! identifiers and one B+ tree per indexed column.
//!
//! Records are positional tuples aligned to the column list. Every record
//! gets a monotonically increasing identifier at insertion; indices map
//! column values to posting lists of those identifiers, so positions may
//! shift on delete without invalidating any index. The primary-key column
//! is always indexed.

mod error;

pub use error::{TableError, TableResult};

use std::collections::HashMap;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::btree::{BPlusTree, DEFAULT_ORDER};
use crate::value::Value;

/// Stable identifier assigned to a record at insertion, never reused
pub type RecordId = u64;

/// Posting list stored under each index key: record ids in discovery order
pub type RowIds = Vec<RecordId>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    name: String,
    columns: Vec<String>,
    primary_key: String,
    records: Vec<Vec<Value>>,
    record_ids: Vec<RecordId>,
    next_record_id: RecordId,
    /// Column name -> index tree
    indices: HashMap<String, BPlusTree<RowIds>>,
    /// Order shared by every index tree of this table
    tree_order: usize,
    /// Record id -> current position, rebuilt after load
    #[serde(skip)]
    positions: AHashMap<RecordId, usize>,
}

impl Table {
    /// Create an empty table with an index on its primary key
    pub fn new(name: &str, columns: Vec<String>, primary_key: &str) -> TableResult<Self> {
        Self::with_order(name, columns, primary_key, DEFAULT_ORDER)
    }

    /// Create an empty table whose indices use the given tree order
    pub fn with_order(
        name: &str,
        columns: Vec<String>,
        primary_key: &str,
        order: usize,
    ) -> TableResult<Self> {
        if !columns.iter().any(|c| c == primary_key) {
            return Err(TableError::PrimaryKeyNotInColumns(primary_key.to_string()));
        }

        let mut table = Self {
            name: name.to_string(),
            columns,
            primary_key: primary_key.to_string(),
            records: Vec::new(),
            record_ids: Vec::new(),
            next_record_id: 0,
            indices: HashMap::new(),
            tree_order: order,
            positions: AHashMap::new(),
        };
        table.create_index(primary_key)?;
        Ok(table)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Names of indexed columns, sorted
    pub fn indexed_columns(&self) -> Vec<String> {
        let mut names: Vec<String> = self.indices.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_indexed(&self, column: &str) -> bool {
        self.indices.contains_key(column)
    }

    /// Read-only access to a column's index tree
    pub fn index(&self, column: &str) -> Option<&BPlusTree<RowIds>> {
        self.indices.get(column)
    }

    fn column_index(&self, column: &str) -> TableResult<usize> {
        self.columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| TableError::ColumnNotFound(column.to_string()))
    }

    /// Rebuild the id -> position cache after deserialization
    pub(crate) fn rebuild_positions(&mut self) {
        self.positions = self
            .record_ids
            .iter()
            .enumerate()
            .map(|(pos, &rid)| (rid, pos))
            .collect();
    }

    /// Point lookup: current position of a record id, if it still resolves
    fn position_of(&self, rid: RecordId) -> Option<usize> {
        self.positions.get(&rid).copied()
    }

    fn index_add(tree: &mut BPlusTree<RowIds>, key: &Value, rid: RecordId) -> TableResult<()> {
        match tree.find_mut(key) {
            Some(ids) => ids.push(rid),
            None => tree.insert(key.clone(), vec![rid])?,
        }
        Ok(())
    }

    fn index_remove(tree: &mut BPlusTree<RowIds>, key: &Value, rid: RecordId) -> TableResult<()> {
        let emptied = match tree.find_mut(key) {
            Some(ids) => {
                ids.retain(|&id| id != rid);
                ids.is_empty()
            }
            None => false,
        };
        if emptied {
            tree.delete(key)?;
        }
        Ok(())
    }

    /// Create an index on a column, backfilling it from existing records.
    /// Returns Ok(false) without touching anything if one already exists.
    pub fn create_index(&mut self, column: &str) -> TableResult<bool> {
        let col_idx = self.column_index(column)?;
        if self.indices.contains_key(column) {
            return Ok(false);
        }

        let mut tree = BPlusTree::new(self.tree_order)?;
        for (pos, record) in self.records.iter().enumerate() {
            Self::index_add(&mut tree, &record[col_idx], self.record_ids[pos])?;
        }
        self.indices.insert(column.to_string(), tree);
        Ok(true)
    }

    /// Insert a record, assigning it the next record identifier.
    ///
    /// Arity and primary-key uniqueness are validated before anything is
    /// mutated, so a failed insert leaves the table untouched.
    pub fn insert(&mut self, record: Vec<Value>) -> TableResult<RecordId> {
        if record.len() != self.columns.len() {
            return Err(TableError::ArityMismatch {
                expected: self.columns.len(),
                actual: record.len(),
            });
        }
        let record: Vec<Value> = record.into_iter().map(Value::normalized).collect();

        let pk_idx = self.column_index(self.primary_key.as_str())?;
        let pk_value = &record[pk_idx];
        let duplicate = match self.indices.get(&self.primary_key) {
            Some(tree) => tree.find(pk_value).is_some(),
            // The primary key is always indexed; scan defensively if not
            None => self.records.iter().any(|r| r[pk_idx] == *pk_value),
        };
        if duplicate {
            return Err(TableError::DuplicateKey(pk_value.clone()));
        }

        let rid = self.next_record_id;
        self.next_record_id += 1;
        let position = self.records.len();

        let columns = &self.columns;
        for (column, tree) in self.indices.iter_mut() {
            let idx = columns
                .iter()
                .position(|c| c == column)
                .ok_or_else(|| TableError::ColumnNotFound(column.clone()))?;
            Self::index_add(tree, &record[idx], rid)?;
        }

        self.records.push(record);
        self.record_ids.push(rid);
        self.positions.insert(rid, position);
        Ok(rid)
    }

    pub fn select_all(&self) -> Vec<Vec<Value>> {
        self.records.clone()
    }

    /// Record ids matching `column == value`, via the index when one exists
    fn matching_ids(&self, column: &str, value: &Value) -> TableResult<Vec<RecordId>> {
        let col_idx = self.column_index(column)?;
        let value = value.clone().normalized();

        if let Some(tree) = self.indices.get(column) {
            Ok(tree.find(&value).cloned().unwrap_or_default())
        } else {
            Ok(self
                .records
                .iter()
                .enumerate()
                .filter(|(_, record)| record[col_idx] == value)
                .map(|(pos, _)| self.record_ids[pos])
                .collect())
        }
    }

    /// Resolve ids to records, silently skipping any that no longer resolve
    fn resolve_ids(&self, ids: &[RecordId]) -> Vec<Vec<Value>> {
        ids.iter()
            .filter_map(|&rid| self.position_of(rid))
            .map(|pos| self.records[pos].clone())
            .collect()
    }

    /// Select records where `column == value`
    pub fn select(&self, column: &str, value: &Value) -> TableResult<Vec<Vec<Value>>> {
        let ids = self.matching_ids(column, value)?;
        Ok(self.resolve_ids(&ids))
    }

    /// Select records where `start <= column <= end`
    pub fn range_select(
        &self,
        column: &str,
        start: &Value,
        end: &Value,
    ) -> TableResult<Vec<Vec<Value>>> {
        let col_idx = self.column_index(column)?;
        let start = start.clone().normalized();
        let end = end.clone().normalized();

        if let Some(tree) = self.indices.get(column) {
            let ids: Vec<RecordId> = tree
                .range_search(&start, &end)
                .into_iter()
                .flat_map(|(_, ids)| ids)
                .collect();
            Ok(self.resolve_ids(&ids))
        } else {
            Ok(self
                .records
                .iter()
                .filter(|record| start <= record[col_idx] && record[col_idx] <= end)
                .cloned()
                .collect())
        }
    }

    /// Update `update_col` to `update_val` on every record matching the
    /// condition. Returns the number of records updated.
    pub fn update(
        &mut self,
        condition_col: &str,
        condition_val: &Value,
        update_col: &str,
        update_val: &Value,
    ) -> TableResult<usize> {
        self.column_index(condition_col)?;
        let update_idx = self.column_index(update_col)?;
        if update_col == self.primary_key {
            return Err(TableError::ImmutablePrimaryKey(update_col.to_string()));
        }

        let update_val = update_val.clone().normalized();
        let ids = self.matching_ids(condition_col, condition_val)?;

        let mut count = 0;
        for rid in ids {
            let Some(pos) = self.position_of(rid) else {
                continue;
            };

            let old_value = self.records[pos][update_idx].clone();
            self.records[pos][update_idx] = update_val.clone();

            // Move the record id from the old key's posting list to the new
            if let Some(tree) = self.indices.get_mut(update_col) {
                Self::index_remove(tree, &old_value, rid)?;
                Self::index_add(tree, &update_val, rid)?;
            }
            count += 1;
        }
        Ok(count)
    }

    /// Delete every record matching the condition. Returns the count deleted.
    pub fn delete(&mut self, condition_col: &str, condition_val: &Value) -> TableResult<usize> {
        let ids = self.matching_ids(condition_col, condition_val)?;

        let mut count = 0;
        for rid in ids {
            let Some(pos) = self.position_of(rid) else {
                continue;
            };

            // Unhook from every index before the record disappears
            let record = self.records[pos].clone();
            let columns = &self.columns;
            for (column, tree) in self.indices.iter_mut() {
                let idx = columns
                    .iter()
                    .position(|c| c == column)
                    .ok_or_else(|| TableError::ColumnNotFound(column.clone()))?;
                Self::index_remove(tree, &record[idx], rid)?;
            }

            self.records.remove(pos);
            self.record_ids.remove(pos);
            self.positions.remove(&rid);
            for (i, &id) in self.record_ids.iter().enumerate().skip(pos) {
                self.positions.insert(id, i);
            }
            count += 1;
        }
        Ok(count)
    }

    /// Delete all records, replacing every index with an empty tree of the
    /// same order. Returns the count deleted.
    pub fn delete_all(&mut self) -> TableResult<usize> {
        let count = self.records.len();
        self.records.clear();
        self.record_ids.clear();
        self.positions.clear();
        self.next_record_id = 0;

        let order = self.tree_order;
        for tree in self.indices.values_mut() {
            *tree = BPlusTree::new(order)?;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(i: i64) -> Value {
        Value::Int(i)
    }

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    fn people_table() -> Table {
        Table::with_order(
            "people",
            vec!["id".to_string(), "name".to_string(), "age".to_string()],
            "id",
            4,
        )
        .unwrap()
    }

    #[test]
    fn test_new_table_has_primary_key_index() {
        let table = people_table();
        assert_eq!(table.name(), "people");
        assert_eq!(table.primary_key(), "id");
        assert!(table.is_indexed("id"));
        assert!(!table.is_indexed("age"));
        assert_eq!(table.record_count(), 0);
    }

    #[test]
    fn test_primary_key_must_be_a_column() {
        let result = Table::new("t", vec!["a".to_string()], "b");
        assert!(matches!(result, Err(TableError::PrimaryKeyNotInColumns(_))));
    }

    #[test]
    fn test_insert_and_select() {
        let mut table = people_table();

        table.insert(vec![int(1), text("alice"), int(30)]).unwrap();
        table.insert(vec![int(2), text("bob"), int(40)]).unwrap();

        assert_eq!(table.record_count(), 2);
        let rows = table.select("id", &int(2)).unwrap();
        assert_eq!(rows, vec![vec![int(2), text("bob"), int(40)]]);
    }

    #[test]
    fn test_insert_arity_mismatch() {
        let mut table = people_table();

        let result = table.insert(vec![int(1), text("alice")]);
        assert!(matches!(
            result,
            Err(TableError::ArityMismatch {
                expected: 3,
                actual: 2
            })
        ));
        assert_eq!(table.record_count(), 0);
    }

    #[test]
    fn test_duplicate_primary_key_rejected() {
        let mut table = people_table();

        table.insert(vec![int(1), text("a"), int(30)]).unwrap();
        let result = table.insert(vec![int(1), text("b"), int(40)]);

        assert!(matches!(result, Err(TableError::DuplicateKey(_))));
        // The table still contains only the first record
        assert_eq!(table.record_count(), 1);
        assert_eq!(
            table.select("id", &int(1)).unwrap(),
            vec![vec![int(1), text("a"), int(30)]]
        );
    }

    #[test]
    fn test_duplicate_primary_key_across_representations() {
        let mut table = people_table();

        table.insert(vec![text("3"), text("a"), int(30)]).unwrap();
        // "3" was normalized to Int(3) at insertion
        let result = table.insert(vec![int(3), text("b"), int(40)]);
        assert!(matches!(result, Err(TableError::DuplicateKey(_))));
    }

    #[test]
    fn test_create_index_unknown_column() {
        let mut table = people_table();
        assert!(matches!(
            table.create_index("salary"),
            Err(TableError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn test_create_index_is_idempotent() {
        let mut table = people_table();
        assert!(table.create_index("age").unwrap());
        assert!(!table.create_index("age").unwrap());
    }

    #[test]
    fn test_create_index_backfills_existing_records() {
        let mut table = people_table();

        table.insert(vec![int(1), text("a"), int(30)]).unwrap();
        table.insert(vec![int(2), text("b"), int(40)]).unwrap();
        table.insert(vec![int(3), text("c"), int(30)]).unwrap();

        table.create_index("age").unwrap();

        // Ties resolve in discovery order
        let rows = table.select("age", &int(30)).unwrap();
        assert_eq!(
            rows,
            vec![
                vec![int(1), text("a"), int(30)],
                vec![int(3), text("c"), int(30)],
            ]
        );
    }

    #[test]
    fn test_select_unindexed_uses_normalized_comparison() {
        let mut table = people_table();

        table.insert(vec![int(1), text("a"), int(30)]).unwrap();

        // "30" normalizes to Int(30) in the scan path, no index on age
        let rows = table.select("age", &text("30")).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_select_unknown_column() {
        let table = people_table();
        assert!(matches!(
            table.select("salary", &int(1)),
            Err(TableError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn test_range_select_indexed_and_unindexed() {
        let mut table = people_table();

        for (id, age) in [(1, 25), (2, 35), (3, 45), (4, 30)] {
            table
                .insert(vec![int(id), text("p"), int(age)])
                .unwrap();
        }

        // Unindexed: linear scan in record order
        let rows = table.range_select("age", &int(28), &int(40)).unwrap();
        assert_eq!(rows.len(), 2);

        // Indexed: results come back in key order
        table.create_index("age").unwrap();
        let rows = table.range_select("age", &int(28), &int(40)).unwrap();
        let ages: Vec<Value> = rows.iter().map(|r| r[2].clone()).collect();
        assert_eq!(ages, vec![int(30), int(35)]);
    }

    #[test]
    fn test_update_rewrites_cell_and_index() {
        let mut table = people_table();
        table.create_index("age").unwrap();

        table.insert(vec![int(1), text("a"), int(30)]).unwrap();
        table.insert(vec![int(2), text("b"), int(40)]).unwrap();

        let count = table.update("id", &int(1), "age", &int(99)).unwrap();
        assert_eq!(count, 1);

        assert!(table.select("age", &int(30)).unwrap().is_empty());
        assert_eq!(
            table.select("age", &int(99)).unwrap(),
            vec![vec![int(1), text("a"), int(99)]]
        );
    }

    #[test]
    fn test_update_shared_index_key_keeps_other_records() {
        let mut table = people_table();
        table.create_index("age").unwrap();

        table.insert(vec![int(1), text("a"), int(30)]).unwrap();
        table.insert(vec![int(2), text("b"), int(30)]).unwrap();

        table.update("id", &int(1), "age", &int(31)).unwrap();

        // Only record 1 moved; record 2 is still findable under 30
        assert_eq!(
            table.select("age", &int(30)).unwrap(),
            vec![vec![int(2), text("b"), int(30)]]
        );
        assert_eq!(
            table.select("age", &int(31)).unwrap(),
            vec![vec![int(1), text("a"), int(31)]]
        );
    }

    #[test]
    fn test_update_condition_on_updated_column() {
        let mut table = people_table();
        table.create_index("age").unwrap();

        table.insert(vec![int(1), text("a"), int(30)]).unwrap();
        table.insert(vec![int(2), text("b"), int(30)]).unwrap();

        let count = table.update("age", &int(30), "age", &int(50)).unwrap();
        assert_eq!(count, 2);
        assert!(table.select("age", &int(30)).unwrap().is_empty());
        assert_eq!(table.select("age", &int(50)).unwrap().len(), 2);
    }

    #[test]
    fn test_update_primary_key_is_immutable() {
        let mut table = people_table();
        table.insert(vec![int(1), text("a"), int(30)]).unwrap();

        let result = table.update("age", &int(30), "id", &int(2));
        assert!(matches!(result, Err(TableError::ImmutablePrimaryKey(_))));
        assert_eq!(table.select("id", &int(1)).unwrap().len(), 1);
    }

    #[test]
    fn test_update_unknown_columns() {
        let mut table = people_table();
        assert!(matches!(
            table.update("salary", &int(1), "age", &int(2)),
            Err(TableError::ColumnNotFound(_))
        ));
        assert!(matches!(
            table.update("age", &int(1), "salary", &int(2)),
            Err(TableError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn test_delete_removes_record_from_every_index() {
        let mut table = people_table();
        table.create_index("age").unwrap();

        table.insert(vec![int(1), text("a"), int(30)]).unwrap();
        table.insert(vec![int(2), text("b"), int(30)]).unwrap();
        table.insert(vec![int(3), text("c"), int(40)]).unwrap();

        let count = table.delete("age", &int(30)).unwrap();
        assert_eq!(count, 2);
        assert_eq!(table.record_count(), 1);

        assert!(table.select("id", &int(1)).unwrap().is_empty());
        assert!(table.select("id", &int(2)).unwrap().is_empty());
        assert!(table.select("age", &int(30)).unwrap().is_empty());
        assert_eq!(table.select("id", &int(3)).unwrap().len(), 1);
    }

    #[test]
    fn test_record_ids_survive_position_shifts() {
        let mut table = people_table();
        table.create_index("age").unwrap();

        table.insert(vec![int(1), text("a"), int(30)]).unwrap();
        table.insert(vec![int(2), text("b"), int(40)]).unwrap();
        table.insert(vec![int(3), text("c"), int(50)]).unwrap();

        // Deleting the first record shifts positions of the others
        table.delete("id", &int(1)).unwrap();

        assert_eq!(
            table.select("age", &int(40)).unwrap(),
            vec![vec![int(2), text("b"), int(40)]]
        );
        assert_eq!(
            table.select("age", &int(50)).unwrap(),
            vec![vec![int(3), text("c"), int(50)]]
        );
    }

    #[test]
    fn test_identifiers_are_not_reused_after_delete() {
        let mut table = people_table();

        let first = table.insert(vec![int(1), text("a"), int(30)]).unwrap();
        table.delete("id", &int(1)).unwrap();
        let second = table.insert(vec![int(1), text("a2"), int(31)]).unwrap();

        assert!(second > first);
    }

    #[test]
    fn test_delete_all_resets_indices_with_same_order() {
        let mut table = people_table();
        table.create_index("age").unwrap();

        for id in 0..5 {
            table.insert(vec![int(id), text("p"), int(id * 10)]).unwrap();
        }

        let count = table.delete_all().unwrap();
        assert_eq!(count, 5);
        assert_eq!(table.record_count(), 0);
        assert!(table.is_indexed("id"));
        assert!(table.is_indexed("age"));

        let age_index = table.index("age").unwrap();
        assert!(age_index.is_empty());
        assert_eq!(age_index.order(), 4);

        // Table is fully usable afterwards
        table.insert(vec![int(1), text("x"), int(20)]).unwrap();
        assert_eq!(table.select("age", &int(20)).unwrap().len(), 1);
    }

    #[test]
    fn test_serde_round_trip_rebuilds_positions() {
        let mut table = people_table();
        table.create_index("age").unwrap();
        for id in 0..4 {
            table.insert(vec![int(id), text("p"), int(20 + id)]).unwrap();
        }
        table.delete("id", &int(0)).unwrap();

        let encoded = serde_json::to_string(&table).unwrap();
        let mut decoded: Table = serde_json::from_str(&encoded).unwrap();
        decoded.rebuild_positions();

        assert_eq!(decoded.record_count(), 3);
        assert_eq!(
            decoded.select("age", &int(22)).unwrap(),
            vec![vec![int(2), text("p"), int(22)]]
        );
        assert_eq!(decoded.indexed_columns(), vec!["age", "id"]);
    }
}
