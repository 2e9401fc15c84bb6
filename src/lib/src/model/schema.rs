pub mod column;
pub mod data_type;
pub mod index_def;

pub use column::{Column, NullOrder};
pub use data_type::DataType;
pub use index_def::{CheckDef, ForeignKey, IndexDef};

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::{DoltError, Result};
use crate::model::Hash;
use crate::util::hasher;

/// Table options carried through DDL but opaque to the engine
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct TableOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub auto_increment_start: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Schema {
    pub columns: Vec<Column>,
    pub primary_key: Vec<String>,
    pub indexes: BTreeMap<String, IndexDef>,
    pub checks: Vec<CheckDef>,
    #[serde(default)]
    pub options: TableOptions,
}

impl Schema {
    pub fn new(columns: Vec<Column>, primary_key: Vec<String>) -> Schema {
        Schema {
            columns,
            primary_key,
            indexes: BTreeMap::new(),
            checks: vec![],
            options: TableOptions::default(),
        }
    }

    pub fn hash(&self) -> Hash {
        // Serialization is deterministic: struct field order plus BTreeMap
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        hasher::hash_buffer(&bytes)
    }

    pub fn is_keyless(&self) -> bool {
        self.primary_key.is_empty()
    }

    pub fn get_column(&self, name: impl AsRef<str>) -> Option<&Column> {
        let name = name.as_ref();
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn get_column_by_tag(&self, tag: u64) -> Option<&Column> {
        self.columns.iter().find(|c| c.tag == tag)
    }

    pub fn has_column(&self, name: impl AsRef<str>) -> bool {
        self.get_column(name).is_some()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.to_owned()).collect()
    }

    pub fn tags(&self) -> HashSet<u64> {
        self.columns.iter().map(|c| c.tag).collect()
    }

    /// Columns of the primary key in declared key order. Empty for keyless
    /// tables, which use a synthetic hash-of-row key instead.
    pub fn pk_columns(&self) -> Result<Vec<&Column>> {
        self.primary_key
            .iter()
            .map(|name| {
                self.get_column(name)
                    .ok_or_else(|| DoltError::NotFound(format!("primary key column {name}")))
            })
            .collect()
    }

    pub fn index_columns(&self, index: &IndexDef) -> Result<Vec<&Column>> {
        index
            .columns
            .iter()
            .map(|name| {
                self.get_column(name)
                    .ok_or_else(|| DoltError::NotFound(format!("index column {name}")))
            })
            .collect()
    }

    /// Compare schemas by tag, looking for columns added in `self`
    pub fn added_columns(&self, other: &Schema) -> Vec<&Column> {
        self.columns
            .iter()
            .filter(|c| other.get_column_by_tag(c.tag).is_none())
            .collect()
    }

    /// Compare schemas by tag, looking for columns removed in `self`
    pub fn removed_columns<'a>(&self, other: &'a Schema) -> Vec<&'a Column> {
        other
            .columns
            .iter()
            .filter(|c| self.get_column_by_tag(c.tag).is_none())
            .collect()
    }

    pub fn columns_to_string(&self) -> String {
        self.columns.iter().map(|c| c.name.to_owned()).join(",")
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let column_strs: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("{}:{}", c.name, c.dtype))
            .collect();
        write!(f, "{}", column_strs.join(", "))
    }
}

/// Allocate a fresh column tag by hashing (table, column, type) and probing
/// with a salt until the result collides with nothing in `used`. Tag 0 is
/// reserved for the engine (keyless tables store row cardinality under it).
pub fn allocate_tag(
    table: impl AsRef<str>,
    column: impl AsRef<str>,
    dtype: &DataType,
    used: &HashSet<u64>,
) -> u64 {
    let mut salt: u64 = 0;
    loop {
        let seed = format!("{}\0{}\0{}\0{}", table.as_ref(), column.as_ref(), dtype, salt);
        let tag = hasher::hash_u64(seed.as_bytes());
        if tag != 0 && !used.contains(&tag) {
            return tag;
        }
        salt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_column_schema() -> Schema {
        Schema::new(
            vec![
                Column::new("pk", DataType::Int32, 1, false),
                Column::new("c", DataType::Int32, 2, true),
            ],
            vec!["pk".to_string()],
        )
    }

    #[test]
    fn test_schema_hash_ignores_nothing() {
        let a = two_column_schema();
        let mut b = two_column_schema();
        assert_eq!(a.hash(), b.hash());
        b.columns[1].name = "renamed".to_string();
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_added_removed_columns_by_tag() {
        let a = two_column_schema();
        let mut b = a.clone();
        b.columns.push(Column::new("extra", DataType::Text, 3, true));
        assert_eq!(b.added_columns(&a).len(), 1);
        assert_eq!(b.added_columns(&a)[0].name, "extra");
        assert_eq!(a.added_columns(&b).len(), 0);
        assert_eq!(a.removed_columns(&b).len(), 1);
    }

    #[test]
    fn test_rename_is_not_add_remove() {
        let a = two_column_schema();
        let mut b = a.clone();
        b.columns[1].name = "renamed".to_string();
        assert!(b.added_columns(&a).is_empty());
        assert!(b.removed_columns(&a).is_empty());
    }

    #[test]
    fn test_allocate_tag_never_zero_and_never_reused() {
        let mut used = HashSet::new();
        for i in 0..64 {
            let tag = allocate_tag("t", format!("col{i}"), &DataType::Int32, &used);
            assert_ne!(tag, 0);
            assert!(!used.contains(&tag));
            used.insert(tag);
        }
        // Re-allocating the same column name with a different type probes to
        // a distinct tag once the original is recorded as used.
        let t1 = allocate_tag("t", "c", &DataType::Int32, &used);
        used.insert(t1);
        let t2 = allocate_tag("t", "c", &DataType::Int32, &used);
        assert_ne!(t1, t2);
    }
}
