//! A table bundles a schema with one primary prolly tree plus per-index
//! trees, an auto-increment counter, and the per-table conflict and
//! violation trees. Row writes go through the primary and every secondary
//! index together; the root is only re-hashed once the table is saved back
//! into it.

pub mod constraints;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::db::StoreRef;
use crate::core::prolly::{EditMap, ProllyTree};
use crate::core::value::{chunker, codec, Tuple, Value};
use crate::error::{DoltError, Result};
use crate::model::conflict::{ConflictEntry, ViolationEntry};
use crate::model::schema::{DataType, IndexDef, Schema};
use crate::model::Hash;
use crate::util::hasher;

/// Reserved tag carrying row cardinality in keyless tables
pub const CARDINALITY_TAG: u64 = 0;

/// The table object as serialized into its chunk
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TableData {
    pub schema: Hash,
    pub primary: Option<Hash>,
    pub indexes: BTreeMap<String, Option<Hash>>,
    pub auto_increment: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflicts: Option<Hash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violations: Option<Hash>,
}

#[derive(Clone)]
pub struct Table {
    pub name: String,
    pub schema: Schema,
    pub data: TableData,
    store: StoreRef,
}

impl Table {
    pub fn create(store: StoreRef, name: impl AsRef<str>, schema: Schema) -> Result<Table> {
        let schema_hash = store.put(&serde_json::to_vec(&schema)?)?;
        let indexes = schema
            .indexes
            .keys()
            .map(|name| (name.clone(), None))
            .collect();
        let auto_increment = schema.options.auto_increment_start;
        Ok(Table {
            name: name.as_ref().to_string(),
            schema,
            data: TableData {
                schema: schema_hash,
                primary: None,
                indexes,
                auto_increment,
                conflicts: None,
                violations: None,
            },
            store,
        })
    }

    pub fn load(store: StoreRef, name: impl AsRef<str>, data: TableData) -> Result<Table> {
        let schema: Schema = serde_json::from_slice(&store.get(&data.schema)?)?;
        Ok(Table {
            name: name.as_ref().to_string(),
            schema,
            data,
            store,
        })
    }

    /// Persist the table object, returning its chunk hash for the root map
    pub fn save(&self, store: &StoreRef) -> Result<Hash> {
        store.put(&serde_json::to_vec(&self.data)?)
    }

    pub fn store(&self) -> &StoreRef {
        &self.store
    }

    /// Swap in a new schema, re-hashing it. Row bytes are untouched: renames
    /// and reorders are schema-only operations.
    pub fn set_schema(&mut self, schema: Schema) -> Result<()> {
        self.data.schema = self.store.put(&serde_json::to_vec(&schema)?)?;
        for index_name in schema.indexes.keys() {
            self.data.indexes.entry(index_name.clone()).or_insert(None);
        }
        self.data
            .indexes
            .retain(|name, _| schema.indexes.contains_key(name));
        self.schema = schema;
        Ok(())
    }

    pub fn primary_tree(&self) -> ProllyTree {
        ProllyTree::load(self.store.clone(), self.data.primary)
    }

    pub fn index_tree(&self, index: impl AsRef<str>) -> Result<ProllyTree> {
        let root = self
            .data
            .indexes
            .get(index.as_ref())
            .ok_or_else(|| DoltError::NotFound(format!("index {}", index.as_ref())))?;
        Ok(ProllyTree::load(self.store.clone(), *root))
    }

    pub fn conflicts_tree(&self) -> ProllyTree {
        ProllyTree::load(self.store.clone(), self.data.conflicts)
    }

    pub fn violations_tree(&self) -> ProllyTree {
        ProllyTree::load(self.store.clone(), self.data.violations)
    }

    pub fn row_count(&self) -> Result<usize> {
        if self.schema.is_keyless() {
            let mut count = 0usize;
            for (_, value) in self.primary_tree().entries()? {
                let (_, cardinality) = decode_keyless_value(&value)?;
                count += cardinality as usize;
            }
            Ok(count)
        } else {
            self.primary_tree().count()
        }
    }

    /// Key bytes for a row: the encoded primary key, or for keyless tables
    /// the hash of the row's own encoding
    pub fn primary_key_bytes(&self, row: &Tuple) -> Result<Vec<u8>> {
        if self.schema.is_keyless() {
            let row = strip_cardinality(row);
            let bytes = codec::encode_tuple(&row)?;
            Ok(hasher::hash_buffer(&bytes).0.to_vec())
        } else {
            let mut fields = Vec::new();
            for col in self.schema.pk_columns()? {
                let value = row.get(col.tag).cloned().unwrap_or(Value::Null);
                fields.push((value, col.null_order));
            }
            codec::encode_key(&fields)
        }
    }

    /// Key bytes for a row given explicit primary key values in key order
    pub fn key_bytes_for(&self, pk_values: &[Value]) -> Result<Vec<u8>> {
        let pk_columns = self.schema.pk_columns()?;
        if pk_values.len() != pk_columns.len() {
            return Err(DoltError::InvalidArgument(format!(
                "expected {} primary key values, got {}",
                pk_columns.len(),
                pk_values.len()
            )));
        }
        let fields: Vec<(Value, _)> = pk_values
            .iter()
            .cloned()
            .zip(pk_columns.iter().map(|c| c.null_order))
            .collect();
        codec::encode_key(&fields)
    }

    fn index_key_bytes(&self, index: &IndexDef, row: &Tuple, pk_key: &[u8]) -> Result<Vec<u8>> {
        let mut fields = Vec::new();
        for col in self.schema.index_columns(index)? {
            let value = row.get(col.tag).cloned().unwrap_or(Value::Null);
            fields.push((value, col.null_order));
        }
        let mut key = codec::encode_key(&fields)?;
        if !index.unique {
            key.extend_from_slice(pk_key);
        }
        Ok(key)
    }

    pub fn get_row(&self, pk_values: &[Value]) -> Result<Option<Tuple>> {
        let key = self.key_bytes_for(pk_values)?;
        match self.primary_tree().get(&key)? {
            Some(bytes) => Ok(Some(self.fill_defaults(&codec::decode_tuple(&bytes)?))),
            None => Ok(None),
        }
    }

    /// Every row in primary key order, with its cardinality (always 1 for
    /// keyed tables)
    pub fn rows(&self) -> Result<Vec<(Tuple, u64)>> {
        let mut out = Vec::new();
        for (_, value) in self.primary_tree().entries()? {
            if self.schema.is_keyless() {
                let (row, cardinality) = decode_keyless_value(&value)?;
                out.push((self.fill_defaults(&row), cardinality));
            } else {
                out.push((self.fill_defaults(&codec::decode_tuple(&value)?), 1));
            }
        }
        Ok(out)
    }

    /// Values too large to inline into a row spill into balanced byte trees
    fn spill_row(&self, row: Tuple) -> Result<Tuple> {
        if row.fields().iter().all(|(_, v)| !chunker::needs_spill(v)) {
            return Ok(row);
        }
        let store = self.store.clone();
        let mut put = |bytes: &[u8]| store.put(bytes);
        let fields = row
            .fields()
            .iter()
            .map(|(tag, value)| Ok((*tag, chunker::spill_value(value.clone(), &mut put)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Tuple::from_fields(fields))
    }

    /// Insert a row, failing on a duplicate primary key
    pub fn insert_row(&mut self, row: Tuple) -> Result<()> {
        let row = self.spill_row(row)?;
        let row = self.assign_auto_increment(row)?;
        constraints::validate_row(&self.schema, &row)?;
        let key = self.primary_key_bytes(&row)?;
        if self.schema.is_keyless() {
            return self.bump_keyless(&key, &row, 1);
        }
        if self.primary_tree().has(&key)? {
            return Err(DoltError::AlreadyExists(format!(
                "duplicate primary key in table {}",
                self.name
            )));
        }
        constraints::check_unique_indexes(self, &row, &key)?;
        self.write_row(&key, None, Some(&row))
    }

    /// Upsert a row under its primary key
    pub fn put_row(&mut self, row: Tuple) -> Result<()> {
        let row = self.spill_row(row)?;
        let row = self.assign_auto_increment(row)?;
        constraints::validate_row(&self.schema, &row)?;
        let key = self.primary_key_bytes(&row)?;
        if self.schema.is_keyless() {
            return self.bump_keyless(&key, &row, 1);
        }
        constraints::check_unique_indexes(self, &row, &key)?;
        let old = self
            .primary_tree()
            .get(&key)?
            .map(|bytes| codec::decode_tuple(&bytes))
            .transpose()?;
        self.write_row(&key, old.as_ref(), Some(&row))
    }

    pub fn delete_row(&mut self, pk_values: &[Value]) -> Result<bool> {
        let key = self.key_bytes_for(pk_values)?;
        let Some(old_bytes) = self.primary_tree().get(&key)? else {
            return Ok(false);
        };
        let old = codec::decode_tuple(&old_bytes)?;
        self.write_row(&key, Some(&old), None)?;
        Ok(true)
    }

    /// Delete whatever row sits under raw primary-key bytes, maintaining
    /// every secondary index. Returns false when no row is present. Used by
    /// conflict resolution, which holds key bytes rather than key values.
    pub fn delete_row_by_key(&mut self, key: &[u8]) -> Result<bool> {
        let Some(old_bytes) = self.primary_tree().get(key)? else {
            return Ok(false);
        };
        let old = if self.schema.is_keyless() {
            decode_keyless_value(&old_bytes)?.0
        } else {
            codec::decode_tuple(&old_bytes)?
        };
        self.write_row(key, Some(&old), None)?;
        Ok(true)
    }

    /// Remove one occurrence of a keyless row
    pub fn delete_keyless_row(&mut self, row: &Tuple) -> Result<bool> {
        if !self.schema.is_keyless() {
            return Err(DoltError::InvalidArgument(format!(
                "table {} has a primary key",
                self.name
            )));
        }
        // Spill first so the row hash matches what insert stored
        let row = self.spill_row(row.clone())?;
        let key = self.primary_key_bytes(&row)?;
        if !self.primary_tree().has(&key)? {
            return Ok(false);
        }
        self.bump_keyless(&key, &row, -1)?;
        Ok(true)
    }

    fn bump_keyless(&mut self, key: &[u8], row: &Tuple, delta: i64) -> Result<()> {
        let tree = self.primary_tree();
        let current = match tree.get(key)? {
            Some(bytes) => decode_keyless_value(&bytes)?.1 as i64,
            None => 0,
        };
        let next = current + delta;
        let mut edits = EditMap::new();
        if next <= 0 {
            edits.insert(key.to_vec(), None);
        } else {
            let stored = encode_keyless_value(row, next as u64)?;
            edits.insert(key.to_vec(), Some(stored));
        }
        self.data.primary = tree.apply(&edits)?.root_hash();
        Ok(())
    }

    /// Apply one row transition through the primary and all index trees
    fn write_row(&mut self, key: &[u8], old: Option<&Tuple>, new: Option<&Tuple>) -> Result<()> {
        let mut edits = EditMap::new();
        match new {
            Some(row) => edits.insert(key.to_vec(), Some(codec::encode_tuple(row)?)),
            None => edits.insert(key.to_vec(), None),
        };
        self.data.primary = self.primary_tree().apply(&edits)?.root_hash();

        let index_defs: Vec<IndexDef> = self.schema.indexes.values().cloned().collect();
        for index in index_defs {
            let mut index_edits = EditMap::new();
            if let Some(old_row) = old {
                let old_key = self.index_key_bytes(&index, old_row, key)?;
                index_edits.insert(old_key, None);
            }
            if let Some(new_row) = new {
                let new_key = self.index_key_bytes(&index, new_row, key)?;
                index_edits.insert(new_key, Some(key.to_vec()));
            }
            let tree = self.index_tree(&index.name)?;
            self.data
                .indexes
                .insert(index.name.clone(), tree.apply(&index_edits)?.root_hash());
        }
        Ok(())
    }

    /// Rebuild every secondary index from the primary tree. Used after merge
    /// rewrites the primary wholesale.
    pub fn rebuild_indexes(&mut self) -> Result<()> {
        let index_defs: Vec<IndexDef> = self.schema.indexes.values().cloned().collect();
        let entries = self.primary_tree().entries()?;
        for index in index_defs {
            let mut pairs: Vec<(Vec<u8>, Vec<u8>)> = Vec::with_capacity(entries.len());
            for (pk_key, value) in &entries {
                let row = if self.schema.is_keyless() {
                    decode_keyless_value(value)?.0
                } else {
                    codec::decode_tuple(value)?
                };
                pairs.push((self.index_key_bytes(&index, &row, pk_key)?, pk_key.clone()));
            }
            pairs.sort_by(|a, b| a.0.cmp(&b.0));
            pairs.dedup_by(|a, b| a.0 == b.0);
            let tree = ProllyTree::from_sorted(self.store.clone(), pairs)?;
            self.data.indexes.insert(index.name.clone(), tree.root_hash());
        }
        Ok(())
    }

    /// Change a column's type. Widening is schema-only; anything else
    /// re-encodes every row and rebuilds the indexes.
    pub fn change_column_type(&mut self, column: &str, new_type: DataType) -> Result<()> {
        let col = self
            .schema
            .get_column(column)
            .ok_or_else(|| DoltError::NotFound(format!("column {column}")))?
            .clone();
        let mut schema = self.schema.clone();
        let entry = schema
            .columns
            .iter_mut()
            .find(|c| c.tag == col.tag)
            .ok_or_else(|| DoltError::Internal("column vanished during type change".to_string()))?;
        entry.dtype = new_type.clone();

        if col.dtype.widens_to(&new_type) {
            return self.set_schema(schema);
        }

        let tag = col.tag;
        let entries = self.primary_tree().entries()?;
        let mut rewritten: Vec<(Vec<u8>, Vec<u8>)> = Vec::with_capacity(entries.len());
        for (key, value_bytes) in entries {
            let mut row = codec::decode_tuple(&value_bytes)?;
            if let Some(value) = row.get(tag).cloned() {
                row.set(tag, convert_value(&value, &new_type)?);
            }
            rewritten.push((key, codec::encode_tuple(&row)?));
        }
        self.set_schema(schema)?;
        self.data.primary = ProllyTree::from_sorted(self.store.clone(), rewritten)?.root_hash();
        self.rebuild_indexes()
    }

    fn assign_auto_increment(&mut self, mut row: Tuple) -> Result<Tuple> {
        let Some(col) = self.schema.columns.iter().find(|c| c.auto_increment) else {
            return Ok(row);
        };
        let tag = col.tag;
        match row.get(tag) {
            None | Some(Value::Null) => {
                let next = self.data.auto_increment.max(1);
                row.set(tag, Value::Int(next as i64));
                self.data.auto_increment = next + 1;
            }
            Some(Value::Int(i)) if *i >= 0 => {
                self.data.auto_increment = self.data.auto_increment.max(*i as u64 + 1);
            }
            Some(Value::Uint(u)) => {
                self.data.auto_increment = self.data.auto_increment.max(*u + 1);
            }
            _ => {}
        }
        Ok(row)
    }

    /// Read-time defaulting: a column the row bytes do not carry produces its
    /// default (or NULL); retired tags in the bytes are ignored and spilled
    /// blobs are reassembled.
    pub fn fill_defaults(&self, row: &Tuple) -> Tuple {
        let get = |hash: &Hash| self.store.get(hash);
        let mut out = Tuple::new();
        for col in &self.schema.columns {
            match row.get(col.tag) {
                Some(value @ Value::BlobRef { .. }) => {
                    let loaded = chunker::unspill_value(value, &get).unwrap_or(value.clone());
                    // Spilled text comes back as bytes; the column type says
                    // which it was
                    let loaded = match (loaded, &col.dtype) {
                        (Value::Blob(bytes), crate::model::schema::DataType::Text) => {
                            String::from_utf8(bytes)
                                .map(Value::Text)
                                .unwrap_or(value.clone())
                        }
                        (loaded, _) => loaded,
                    };
                    out.set(col.tag, loaded);
                }
                Some(value) => out.set(col.tag, value.clone()),
                None => {
                    let value = col
                        .default
                        .as_deref()
                        .and_then(|d| Value::parse_literal(d).ok())
                        .unwrap_or(Value::Null);
                    out.set(col.tag, value);
                }
            }
        }
        if self.schema.is_keyless() {
            if let Some(card) = row.get(CARDINALITY_TAG) {
                out.set(CARDINALITY_TAG, card.clone());
            }
        }
        out
    }

    pub fn has_conflicts(&self) -> bool {
        self.data.conflicts.is_some()
    }

    pub fn has_violations(&self) -> bool {
        self.data.violations.is_some()
    }

    pub fn add_conflict(&mut self, key: &[u8], entry: &ConflictEntry) -> Result<()> {
        let tree = self.conflicts_tree();
        self.data.conflicts = tree.put(key.to_vec(), entry.encode()?)?.root_hash();
        Ok(())
    }

    pub fn list_conflicts(&self) -> Result<Vec<(Vec<u8>, ConflictEntry)>> {
        self.conflicts_tree()
            .entries()?
            .into_iter()
            .map(|(k, v)| Ok((k, ConflictEntry::decode(&v)?)))
            .collect()
    }

    pub fn clear_conflict(&mut self, key: &[u8]) -> Result<()> {
        let tree = self.conflicts_tree().delete(key)?;
        self.data.conflicts = tree.root_hash();
        Ok(())
    }

    pub fn clear_all_conflicts(&mut self) {
        self.data.conflicts = None;
    }

    pub fn add_violation(&mut self, key: &[u8], entry: &ViolationEntry) -> Result<()> {
        let tree = self.violations_tree();
        self.data.violations = tree.put(key.to_vec(), entry.encode()?)?.root_hash();
        Ok(())
    }

    pub fn list_violations(&self) -> Result<Vec<(Vec<u8>, ViolationEntry)>> {
        self.violations_tree()
            .entries()?
            .into_iter()
            .map(|(k, v)| Ok((k, ViolationEntry::decode(&v)?)))
            .collect()
    }

    pub fn clear_all_violations(&mut self) {
        self.data.violations = None;
    }
}

/// Casts applied by a rewriting type change
fn convert_value(value: &Value, target: &DataType) -> Result<Value> {
    let converted = match (value, target) {
        (Value::Null, _) => Value::Null,
        (Value::Int(i), DataType::Text) => Value::Text(i.to_string()),
        (Value::Uint(u), DataType::Text) => Value::Text(u.to_string()),
        (Value::Float(f), DataType::Text) => Value::Text(f.to_string()),
        (Value::Int(i), t) if t.is_integer() => Value::Int(*i),
        (Value::Uint(u), t) if t.is_integer() => Value::Uint(*u),
        (Value::Int(i), DataType::Float32 | DataType::Float64) => Value::Float(*i as f64),
        (Value::Text(s), t) if t.is_integer() => Value::Int(s.trim().parse().map_err(|_| {
            DoltError::InvalidArgument(format!("cannot convert {s:?} to {t}"))
        })?),
        (Value::Text(s), DataType::Float32 | DataType::Float64) => {
            Value::Float(s.trim().parse().map_err(|_| {
                DoltError::InvalidArgument(format!("cannot convert {s:?} to {target}"))
            })?)
        }
        (Value::Text(s), DataType::Blob) => Value::Blob(s.as_bytes().to_vec()),
        (other, t) => {
            return Err(DoltError::InvalidArgument(format!(
                "unsupported type change for value {other:?} -> {t}"
            )))
        }
    };
    Ok(converted)
}

fn strip_cardinality(row: &Tuple) -> Tuple {
    let mut row = row.clone();
    row.remove(CARDINALITY_TAG);
    row
}

fn encode_keyless_value(row: &Tuple, cardinality: u64) -> Result<Vec<u8>> {
    let mut stored = strip_cardinality(row);
    stored.set(CARDINALITY_TAG, Value::Uint(cardinality));
    codec::encode_tuple(&stored)
}

fn decode_keyless_value(bytes: &[u8]) -> Result<(Tuple, u64)> {
    let mut stored = codec::decode_tuple(bytes)?;
    let cardinality = match stored.remove(CARDINALITY_TAG) {
        Some(Value::Uint(card)) => card,
        _ => 1,
    };
    Ok((stored, cardinality))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::MemStore;
    use crate::model::schema::{Column, DataType};
    use std::sync::Arc;

    fn store() -> StoreRef {
        Arc::new(MemStore::new())
    }

    fn keyed_table(s: &StoreRef) -> Table {
        let schema = Schema::new(
            vec![
                Column::new("pk", DataType::Int32, 1, false),
                Column::new("c", DataType::Int32, 2, true),
            ],
            vec!["pk".to_string()],
        );
        Table::create(s.clone(), "t", schema).unwrap()
    }

    fn row(pk: i64, c: i64) -> Tuple {
        Tuple::from_fields(vec![(1, Value::Int(pk)), (2, Value::Int(c))])
    }

    #[test]
    fn test_insert_get_delete() {
        let s = store();
        let mut t = keyed_table(&s);
        t.insert_row(row(1, 10)).unwrap();
        t.insert_row(row(2, 20)).unwrap();
        let got = t.get_row(&[Value::Int(1)]).unwrap().unwrap();
        assert_eq!(got.get(2), Some(&Value::Int(10)));
        assert!(t.delete_row(&[Value::Int(1)]).unwrap());
        assert!(t.get_row(&[Value::Int(1)]).unwrap().is_none());
        assert!(!t.delete_row(&[Value::Int(1)]).unwrap());
    }

    #[test]
    fn test_duplicate_pk_rejected() {
        let s = store();
        let mut t = keyed_table(&s);
        t.insert_row(row(1, 10)).unwrap();
        assert!(matches!(
            t.insert_row(row(1, 99)),
            Err(DoltError::AlreadyExists(_))
        ));
        // put_row upserts instead
        t.put_row(row(1, 99)).unwrap();
        let got = t.get_row(&[Value::Int(1)]).unwrap().unwrap();
        assert_eq!(got.get(2), Some(&Value::Int(99)));
    }

    #[test]
    fn test_rename_keeps_row_bytes() {
        let s = store();
        let mut t = keyed_table(&s);
        t.insert_row(row(1, 10)).unwrap();
        let before = t.data.primary;

        let mut renamed = t.schema.clone();
        renamed.columns[1].name = "c_renamed".to_string();
        t.set_schema(renamed).unwrap();
        assert_eq!(t.data.primary, before);
        let got = t.get_row(&[Value::Int(1)]).unwrap().unwrap();
        assert_eq!(got.get(2), Some(&Value::Int(10)));
    }

    #[test]
    fn test_added_column_defaults_at_read() {
        let s = store();
        let mut t = keyed_table(&s);
        t.insert_row(row(1, 10)).unwrap();

        let mut widened = t.schema.clone();
        let mut extra = Column::new("d", DataType::Int32, 3, true);
        extra.default = Some("7".to_string());
        widened.columns.push(extra);
        t.set_schema(widened).unwrap();

        let got = t.get_row(&[Value::Int(1)]).unwrap().unwrap();
        assert_eq!(got.get(3), Some(&Value::Int(7)));
    }

    #[test]
    fn test_secondary_index_maintenance() {
        let s = store();
        let mut schema = Schema::new(
            vec![
                Column::new("pk", DataType::Int32, 1, false),
                Column::new("c", DataType::Int32, 2, true),
            ],
            vec!["pk".to_string()],
        );
        schema.indexes.insert(
            "c_idx".to_string(),
            IndexDef {
                name: "c_idx".to_string(),
                columns: vec!["c".to_string()],
                unique: false,
                spatial: false,
                comment: None,
            },
        );
        let mut t = Table::create(s.clone(), "t", schema).unwrap();
        t.insert_row(row(1, 10)).unwrap();
        t.insert_row(row(2, 20)).unwrap();
        assert_eq!(t.index_tree("c_idx").unwrap().count().unwrap(), 2);
        t.put_row(row(1, 30)).unwrap();
        assert_eq!(t.index_tree("c_idx").unwrap().count().unwrap(), 2);
        t.delete_row(&[Value::Int(2)]).unwrap();
        assert_eq!(t.index_tree("c_idx").unwrap().count().unwrap(), 1);
    }

    #[test]
    fn test_unique_index_rejects_duplicates() {
        let s = store();
        let mut schema = Schema::new(
            vec![
                Column::new("pk", DataType::Int32, 1, false),
                Column::new("c", DataType::Int32, 2, true),
            ],
            vec!["pk".to_string()],
        );
        schema.indexes.insert(
            "c_uniq".to_string(),
            IndexDef {
                name: "c_uniq".to_string(),
                columns: vec!["c".to_string()],
                unique: true,
                spatial: false,
                comment: None,
            },
        );
        let mut t = Table::create(s.clone(), "t", schema).unwrap();
        t.insert_row(row(1, 19)).unwrap();
        assert!(matches!(
            t.insert_row(row(2, 19)),
            Err(DoltError::ConstraintViolation(_))
        ));
        // NULLs never collide on a unique index
        t.insert_row(Tuple::from_fields(vec![(1, Value::Int(3)), (2, Value::Null)]))
            .unwrap();
        t.insert_row(Tuple::from_fields(vec![(1, Value::Int(4)), (2, Value::Null)]))
            .unwrap();
    }

    #[test]
    fn test_keyless_cardinality() {
        let s = store();
        let schema = Schema::new(
            vec![
                Column::new("a", DataType::Int32, 1, true),
                Column::new("b", DataType::Int32, 2, true),
            ],
            vec![],
        );
        let mut t = Table::create(s.clone(), "t", schema).unwrap();
        let r = Tuple::from_fields(vec![(1, Value::Int(1)), (2, Value::Int(2))]);
        t.insert_row(r.clone()).unwrap();
        t.insert_row(r.clone()).unwrap();
        assert_eq!(t.row_count().unwrap(), 2);
        assert_eq!(t.primary_tree().count().unwrap(), 1);
        assert!(t.delete_keyless_row(&r).unwrap());
        assert_eq!(t.row_count().unwrap(), 1);
        assert!(t.delete_keyless_row(&r).unwrap());
        assert_eq!(t.row_count().unwrap(), 0);
    }

    #[test]
    fn test_widening_type_change_keeps_row_bytes() {
        let s = store();
        let mut t = keyed_table(&s);
        t.insert_row(row(1, 10)).unwrap();
        let before = t.data.primary;
        t.change_column_type("c", DataType::Int64).unwrap();
        assert_eq!(t.data.primary, before);
        assert_eq!(t.schema.get_column("c").unwrap().dtype, DataType::Int64);
    }

    #[test]
    fn test_narrowing_type_change_rewrites_rows() {
        let s = store();
        let mut t = keyed_table(&s);
        t.insert_row(row(1, 10)).unwrap();
        let before = t.data.primary;
        t.change_column_type("c", DataType::Text).unwrap();
        assert_ne!(t.data.primary, before);
        let got = t.get_row(&[Value::Int(1)]).unwrap().unwrap();
        assert_eq!(got.get(2), Some(&Value::Text("10".to_string())));
    }

    #[test]
    fn test_large_text_spills_and_reads_back() {
        let s = store();
        let schema = Schema::new(
            vec![
                Column::new("pk", DataType::Int32, 1, false),
                Column::new("body", DataType::Text, 2, true),
            ],
            vec!["pk".to_string()],
        );
        let mut t = Table::create(s.clone(), "t", schema).unwrap();
        let big = "lorem ipsum ".repeat(2048);
        t.insert_row(Tuple::from_fields(vec![
            (1, Value::Int(1)),
            (2, Value::Text(big.clone())),
        ]))
        .unwrap();

        // The stored row carries a blob ref, not the full payload
        let (_, stored_bytes) = t.primary_tree().entries().unwrap().remove(0);
        assert!(stored_bytes.len() < big.len());

        let row = t.get_row(&[Value::Int(1)]).unwrap().unwrap();
        assert_eq!(row.get(2), Some(&Value::Text(big)));
    }

    #[test]
    fn test_auto_increment_assignment() {
        let s = store();
        let mut schema = Schema::new(
            vec![
                {
                    let mut c = Column::new("pk", DataType::Int64, 1, false);
                    c.auto_increment = true;
                    c
                },
                Column::new("c", DataType::Int32, 2, true),
            ],
            vec!["pk".to_string()],
        );
        schema.options.auto_increment_start = 1;
        let mut t = Table::create(s.clone(), "t", schema).unwrap();
        t.insert_row(Tuple::from_fields(vec![(2, Value::Int(10))])).unwrap();
        t.insert_row(Tuple::from_fields(vec![(2, Value::Int(20))])).unwrap();
        assert!(t.get_row(&[Value::Int(1)]).unwrap().is_some());
        assert!(t.get_row(&[Value::Int(2)]).unwrap().is_some());
        // Explicit value advances the counter past itself
        t.insert_row(Tuple::from_fields(vec![(1, Value::Int(10)), (2, Value::Int(30))]))
            .unwrap();
        t.insert_row(Tuple::from_fields(vec![(2, Value::Int(40))])).unwrap();
        assert!(t.get_row(&[Value::Int(11)]).unwrap().is_some());
    }
}
