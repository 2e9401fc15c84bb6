//! A root is the entire user-visible state of one database at one moment: a
//! named map of tables plus views, triggers, routines, the foreign-key
//! collection, and the collation. Roots are hashable chunks, so root
//! equality by hash implies data equality.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::db::StoreRef;
use crate::core::table::{Table, TableData};
use crate::error::{DoltError, Result};
use crate::model::schema::ForeignKey;
use crate::model::Hash;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct RootValue {
    pub tables: BTreeMap<String, Hash>,
    pub views: BTreeMap<String, String>,
    pub triggers: BTreeMap<String, String>,
    pub routines: BTreeMap<String, String>,
    pub foreign_keys: Vec<ForeignKey>,
    pub collation: String,
}

impl RootValue {
    pub fn empty() -> RootValue {
        RootValue {
            collation: "utf8mb4_0900_bin".to_string(),
            ..Default::default()
        }
    }

    pub fn read(store: &StoreRef, hash: &Hash) -> Result<RootValue> {
        Ok(serde_json::from_slice(&store.get(hash)?)?)
    }

    pub fn write(&self, store: &StoreRef) -> Result<Hash> {
        store.put(&serde_json::to_vec(self)?)
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    pub fn has_table(&self, name: impl AsRef<str>) -> bool {
        self.tables.contains_key(name.as_ref())
    }

    pub fn get_table(&self, store: &StoreRef, name: impl AsRef<str>) -> Result<Option<Table>> {
        let name = name.as_ref();
        let Some(hash) = self.tables.get(name) else {
            return Ok(None);
        };
        let data: TableData = serde_json::from_slice(&store.get(hash)?)?;
        Ok(Some(Table::load(store.clone(), name, data)?))
    }

    pub fn expect_table(&self, store: &StoreRef, name: impl AsRef<str>) -> Result<Table> {
        self.get_table(store, name.as_ref())?
            .ok_or_else(|| DoltError::table_not_found(name.as_ref()))
    }

    /// Replace one table entry and return the updated root (roots are values;
    /// the caller re-hashes by writing it)
    pub fn put_table(&mut self, store: &StoreRef, table: &Table) -> Result<()> {
        let hash = table.save(store)?;
        self.tables.insert(table.name.clone(), hash);
        Ok(())
    }

    pub fn remove_table(&mut self, name: impl AsRef<str>) -> Result<()> {
        let name = name.as_ref();
        if self.tables.remove(name).is_none() {
            return Err(DoltError::table_not_found(name));
        }
        self.foreign_keys
            .retain(|fk| fk.child_table != name && fk.parent_table != name);
        Ok(())
    }

    /// Table names whose contents differ between two roots, including tables
    /// present on only one side
    pub fn changed_tables(&self, other: &RootValue) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for (name, hash) in &self.tables {
            match other.tables.get(name) {
                Some(other_hash) if other_hash == hash => {}
                _ => names.push(name.clone()),
            }
        }
        for name in other.tables.keys() {
            if !self.tables.contains_key(name) {
                names.push(name.clone());
            }
        }
        names.sort();
        names.dedup();
        names
    }

    /// Foreign keys whose child side is the given table
    pub fn foreign_keys_for_child(&self, table: impl AsRef<str>) -> Vec<&ForeignKey> {
        let table = table.as_ref();
        self.foreign_keys
            .iter()
            .filter(|fk| fk.child_table == table)
            .collect()
    }

    /// Validate that every FK endpoint names existing tables and columns of
    /// matching types
    pub fn validate_foreign_keys(&self, store: &StoreRef) -> Result<()> {
        for fk in &self.foreign_keys {
            let child = self.expect_table(store, &fk.child_table)?;
            let parent = self.expect_table(store, &fk.parent_table)?;
            if fk.child_columns.len() != fk.parent_columns.len() {
                return Err(DoltError::InvalidArgument(format!(
                    "foreign key {} has mismatched column counts",
                    fk.name
                )));
            }
            for (child_col, parent_col) in fk.child_columns.iter().zip(&fk.parent_columns) {
                let cc = child.schema.get_column(child_col).ok_or_else(|| {
                    DoltError::NotFound(format!("column {child_col} in {}", fk.child_table))
                })?;
                let pc = parent.schema.get_column(parent_col).ok_or_else(|| {
                    DoltError::NotFound(format!("column {parent_col} in {}", fk.parent_table))
                })?;
                if cc.dtype != pc.dtype {
                    return Err(DoltError::InvalidArgument(format!(
                        "foreign key {}: type of {child_col} does not match {parent_col}",
                        fk.name
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::MemStore;
    use crate::model::schema::{Column, DataType, Schema};
    use std::sync::Arc;

    fn store() -> StoreRef {
        Arc::new(MemStore::new())
    }

    fn simple_schema() -> Schema {
        Schema::new(
            vec![
                Column::new("pk", DataType::Int32, 1, false),
                Column::new("c", DataType::Int32, 2, true),
            ],
            vec!["pk".to_string()],
        )
    }

    #[test]
    fn test_root_hash_equality_is_data_equality() {
        let s = store();
        let mut a = RootValue::empty();
        let mut b = RootValue::empty();
        let table = Table::create(s.clone(), "t", simple_schema()).unwrap();
        a.put_table(&s, &table).unwrap();
        b.put_table(&s, &table).unwrap();
        assert_eq!(a.write(&s).unwrap(), b.write(&s).unwrap());
        b.views.insert("v".to_string(), "SELECT 1".to_string());
        assert_ne!(a.write(&s).unwrap(), b.write(&s).unwrap());
    }

    #[test]
    fn test_round_trip() {
        let s = store();
        let mut root = RootValue::empty();
        let table = Table::create(s.clone(), "t", simple_schema()).unwrap();
        root.put_table(&s, &table).unwrap();
        let hash = root.write(&s).unwrap();
        let loaded = RootValue::read(&s, &hash).unwrap();
        assert_eq!(loaded, root);
        assert!(loaded.has_table("t"));
        let t = loaded.expect_table(&s, "t").unwrap();
        assert_eq!(t.schema.column_names(), vec!["pk", "c"]);
    }

    #[test]
    fn test_remove_missing_table_errors() {
        let mut root = RootValue::empty();
        assert!(matches!(
            root.remove_table("nope"),
            Err(DoltError::NotFound(_))
        ));
    }
}
