//! Three-way merge of roots: schema merge per table, prolly row merge with
//! conflict recording, then constraint re-validation over everything the
//! merge touched. Conflicts and violations land in per-table trees and
//! never abort the merge; the caller decides whether the result may commit.

pub mod schema_merge;

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::core::db::StoreRef;
use crate::core::prolly::{self, DiffEvent, ProllyTree, Resolution};
use crate::core::root::RootValue;
use crate::core::table::{constraints, Table, CARDINALITY_TAG};
use crate::core::value::{codec, Value};
use crate::error::{DoltError, Result};
use crate::model::conflict::{ConflictEntry, ViolationEntry, ViolationKind};
use crate::util::cancel::CancelToken;

/// Auxiliary table name that carries view/trigger/routine conflicts
pub const SCHEMAS_TABLE: &str = "dolt_schemas";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeStrategy {
    FfOnly,
    NoFf,
    Squash,
    #[default]
    ThreeWay,
}

#[derive(Debug, Clone, Default)]
pub struct RootMergeStats {
    pub conflicted_tables: Vec<String>,
    pub violated_tables: Vec<String>,
    pub schema_conflicts: Vec<String>,
}

impl RootMergeStats {
    pub fn is_clean(&self) -> bool {
        self.conflicted_tables.is_empty()
            && self.violated_tables.is_empty()
            && self.schema_conflicts.is_empty()
    }
}

pub struct Merger {
    store: StoreRef,
    cancel: CancelToken,
}

impl Merger {
    pub fn new(store: StoreRef, cancel: CancelToken) -> Merger {
        Merger { store, cancel }
    }

    pub fn merge_roots(
        &self,
        base: &RootValue,
        ours: &RootValue,
        theirs: &RootValue,
    ) -> Result<(RootValue, RootMergeStats)> {
        let mut result = ours.clone();
        let mut stats = RootMergeStats::default();

        let mut names: BTreeSet<String> = base.tables.keys().cloned().collect();
        names.extend(ours.tables.keys().cloned());
        names.extend(theirs.tables.keys().cloned());

        // Rows first; constraint re-validation runs over the merged root
        let mut changed_rows: HashMap<String, Vec<DiffEvent>> = HashMap::new();
        for name in &names {
            self.cancel.check()?;
            self.merge_table(name, base, ours, theirs, &mut result, &mut stats, &mut changed_rows)?;
        }

        merge_named_map(
            &base.views,
            &mut result.views,
            &theirs.views,
            &mut stats,
        );
        merge_named_map(
            &base.triggers,
            &mut result.triggers,
            &theirs.triggers,
            &mut stats,
        );
        merge_named_map(
            &base.routines,
            &mut result.routines,
            &theirs.routines,
            &mut stats,
        );
        self.merge_foreign_keys(base, &mut result, theirs, &mut stats);

        self.revalidate_constraints(&mut result, &changed_rows, &mut stats)?;

        stats.conflicted_tables.sort();
        stats.conflicted_tables.dedup();
        stats.violated_tables.sort();
        stats.violated_tables.dedup();
        Ok((result, stats))
    }

    #[allow(clippy::too_many_arguments)]
    fn merge_table(
        &self,
        name: &str,
        base: &RootValue,
        ours: &RootValue,
        theirs: &RootValue,
        result: &mut RootValue,
        stats: &mut RootMergeStats,
        changed_rows: &mut HashMap<String, Vec<DiffEvent>>,
    ) -> Result<()> {
        let base_hash = base.tables.get(name);
        let ours_hash = ours.tables.get(name);
        let theirs_hash = theirs.tables.get(name);

        match (base_hash, ours_hash, theirs_hash) {
            (_, None, None) => Ok(()),
            // Added or kept only on our side
            (None, Some(_), None) => Ok(()),
            // Added only on their side
            (None, None, Some(_)) => {
                let table = theirs.expect_table(&self.store, name)?;
                result.put_table(&self.store, &table)?;
                Ok(())
            }
            // Dropped in theirs
            (Some(b), Some(o), None) => {
                if b == o {
                    result.remove_table(name)?;
                } else {
                    log::debug!("table {name} dropped in theirs but modified in ours");
                    stats.schema_conflicts.push(name.to_string());
                }
                Ok(())
            }
            // Dropped in ours
            (Some(b), None, Some(t)) => {
                if b != t {
                    log::debug!("table {name} dropped in ours but modified in theirs");
                    stats.schema_conflicts.push(name.to_string());
                }
                Ok(())
            }
            // Present on both sides
            (_, Some(o), Some(t)) => {
                if o == t {
                    return Ok(());
                }
                if base_hash == ours_hash {
                    // Only theirs moved: take their table wholesale
                    let theirs_table = theirs.expect_table(&self.store, name)?;
                    let base_table = base.get_table(&self.store, name)?;
                    let events = self.table_row_diff(base_table.as_ref(), &theirs_table)?;
                    changed_rows.insert(name.to_string(), events);
                    result.put_table(&self.store, &theirs_table)?;
                    return Ok(());
                }
                if base_hash == theirs_hash {
                    return Ok(());
                }
                self.merge_table_contents(name, base, ours, theirs, result, stats, changed_rows)
            }
        }
    }

    fn table_row_diff(&self, base: Option<&Table>, merged: &Table) -> Result<Vec<DiffEvent>> {
        let base_tree = base
            .map(|t| t.primary_tree())
            .unwrap_or_else(|| ProllyTree::empty(self.store.clone()));
        prolly::diff_trees(&base_tree, &merged.primary_tree(), &self.cancel)
    }

    #[allow(clippy::too_many_arguments)]
    fn merge_table_contents(
        &self,
        name: &str,
        base: &RootValue,
        ours: &RootValue,
        theirs: &RootValue,
        result: &mut RootValue,
        stats: &mut RootMergeStats,
        changed_rows: &mut HashMap<String, Vec<DiffEvent>>,
    ) -> Result<()> {
        let base_table = base.get_table(&self.store, name)?;
        let ours_table = ours.expect_table(&self.store, name)?;
        let theirs_table = theirs.expect_table(&self.store, name)?;

        let merged_schema = match schema_merge::merge_schemas(
            base_table.as_ref().map(|t| &t.schema),
            &ours_table.schema,
            &theirs_table.schema,
        ) {
            Ok(schema) => schema,
            Err(DoltError::SchemaConflict(reason)) => {
                log::debug!("schema conflict on {name}: {reason}");
                stats.schema_conflicts.push(name.to_string());
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let base_tree = base_table
            .as_ref()
            .map(|t| t.primary_tree())
            .unwrap_or_else(|| ProllyTree::empty(self.store.clone()));
        let keyless = merged_schema.is_keyless();

        let (merged_tree, collisions) = prolly::three_way_merge(
            &base_tree,
            &ours_table.primary_tree(),
            &theirs_table.primary_tree(),
            |collision| {
                if keyless {
                    merge_cardinalities(collision)
                } else {
                    Resolution::Record
                }
            },
            &self.cancel,
        )?;

        let mut merged_table = ours_table.clone();
        merged_table.set_schema(merged_schema)?;
        merged_table.data.primary = merged_tree.root_hash();
        merged_table.data.auto_increment = ours_table
            .data
            .auto_increment
            .max(theirs_table.data.auto_increment);
        merged_table.rebuild_indexes()?;

        if !collisions.is_empty() {
            for collision in &collisions {
                let entry = ConflictEntry {
                    base: decode_row(collision.base.as_deref())?,
                    ours: decode_row(collision.ours.as_deref())?,
                    theirs: decode_row(collision.theirs.as_deref())?,
                };
                merged_table.add_conflict(&collision.key, &entry)?;
            }
            stats.conflicted_tables.push(name.to_string());
        }

        let events = self.table_row_diff(base_table.as_ref(), &merged_table)?;
        changed_rows.insert(name.to_string(), events);
        result.put_table(&self.store, &merged_table)?;
        Ok(())
    }

    fn merge_foreign_keys(
        &self,
        base: &RootValue,
        result: &mut RootValue,
        theirs: &RootValue,
        stats: &mut RootMergeStats,
    ) {
        for fk in &theirs.foreign_keys {
            let in_ours = result.foreign_keys.iter().find(|f| f.name == fk.name);
            let in_base = base.foreign_keys.iter().find(|f| f.name == fk.name);
            match in_ours {
                Some(existing) if existing != fk => match in_base {
                    Some(b) if b == existing => {
                        let pos = result
                            .foreign_keys
                            .iter()
                            .position(|f| f.name == fk.name)
                            .unwrap();
                        result.foreign_keys[pos] = fk.clone();
                    }
                    Some(b) if b == fk => {}
                    _ => stats.schema_conflicts.push(format!("foreign key {}", fk.name)),
                },
                Some(_) => {}
                None => {
                    let dropped_by_ours = in_base.is_some();
                    if !dropped_by_ours {
                        result.foreign_keys.push(fk.clone());
                    }
                }
            }
        }
        // FKs deleted by theirs and untouched by ours go away
        result.foreign_keys.retain(|fk| {
            let in_theirs = theirs.foreign_keys.iter().any(|f| f == fk);
            let in_base = base.foreign_keys.iter().any(|f| f == fk);
            in_theirs || !in_base
        });
    }

    /// Re-validate NOT NULL, CHECK, UNIQUE, and FOREIGN KEY constraints over
    /// every added or changed row, recording failures per table
    fn revalidate_constraints(
        &self,
        result: &mut RootValue,
        changed_rows: &HashMap<String, Vec<DiffEvent>>,
        stats: &mut RootMergeStats,
    ) -> Result<()> {
        let changed_tables: HashSet<&String> = changed_rows.keys().collect();

        for (name, events) in changed_rows {
            let Some(mut table) = result.get_table(&self.store, name)? else {
                continue;
            };
            let mut violated = false;

            // Row-local constraints on added and changed rows
            for event in events {
                self.cancel.check()?;
                let Some(new_bytes) = event.new() else {
                    continue;
                };
                let row = codec::decode_tuple(new_bytes)?;
                if let Some(entry) = constraints::first_row_violation(&table.schema, &row)? {
                    table.add_violation(&event.key, &entry)?;
                    violated = true;
                }
            }

            // Unique constraints across the merged table: group primary rows
            // by each unique index key and flag groups larger than one
            let changed_keys: HashSet<&[u8]> =
                events.iter().map(|e| e.key.as_slice()).collect();
            for index in table.schema.indexes.values().cloned().collect::<Vec<_>>() {
                if !index.unique {
                    continue;
                }
                let mut groups: HashMap<Vec<u8>, Vec<Vec<u8>>> = HashMap::new();
                for (pk_key, value_bytes) in table.primary_tree().entries()? {
                    let row = codec::decode_tuple(&value_bytes)?;
                    let mut fields = Vec::new();
                    let mut any_null = false;
                    for col in table.schema.index_columns(&index)? {
                        let value = row.get(col.tag).cloned().unwrap_or(Value::Null);
                        any_null |= value.is_null();
                        fields.push((value, col.null_order));
                    }
                    if any_null {
                        continue;
                    }
                    groups
                        .entry(codec::encode_key(&fields)?)
                        .or_default()
                        .push(pk_key);
                }
                for (_, members) in groups {
                    if members.len() < 2 {
                        continue;
                    }
                    if !members.iter().any(|pk| changed_keys.contains(pk.as_slice())) {
                        continue;
                    }
                    for pk_key in members {
                        table.add_violation(
                            &pk_key,
                            &ViolationEntry {
                                kind: ViolationKind::Unique,
                                details: format!("duplicate key for unique index {}", index.name),
                            },
                        )?;
                        violated = true;
                    }
                }
            }

            if violated {
                stats.violated_tables.push(name.clone());
            }
            result.put_table(&self.store, &table)?;
        }

        // Foreign keys: re-check child rows whenever either endpoint changed
        let fks = result.foreign_keys.clone();
        for fk in fks {
            let relevant = changed_tables.contains(&fk.child_table)
                || changed_tables.contains(&fk.parent_table);
            if !relevant {
                continue;
            }
            let Some(mut child) = result.get_table(&self.store, &fk.child_table)? else {
                continue;
            };
            let mut violated = false;
            for (pk_key, value_bytes) in child.primary_tree().entries()? {
                self.cancel.check()?;
                let row = codec::decode_tuple(&value_bytes)?;
                if let Some(entry) =
                    constraints::check_foreign_key(result, &self.store, &fk, &child, &row)?
                {
                    child.add_violation(&pk_key, &entry)?;
                    violated = true;
                }
            }
            if violated {
                stats.violated_tables.push(fk.child_table.clone());
                result.put_table(&self.store, &child)?;
            }
        }
        Ok(())
    }
}

/// Keyless rows never conflict: concurrent edits to the same row hash are
/// cardinality changes, and cardinality deltas add.
fn merge_cardinalities(collision: &prolly::Collision) -> Resolution {
    let card = |bytes: &Option<Vec<u8>>| -> i64 {
        bytes
            .as_deref()
            .and_then(|b| codec::decode_tuple(b).ok())
            .and_then(|t| match t.get(CARDINALITY_TAG) {
                Some(Value::Uint(c)) => Some(*c as i64),
                _ => None,
            })
            .unwrap_or(0)
    };
    let base = card(&collision.base);
    let ours = card(&collision.ours);
    let theirs = card(&collision.theirs);
    let merged = base + (ours - base) + (theirs - base);
    if merged <= 0 {
        return Resolution::Value(None);
    }
    // Either side carries the row payload; prefer ours, fall back to theirs
    let source = collision
        .ours
        .as_deref()
        .or(collision.theirs.as_deref())
        .or(collision.base.as_deref());
    let Some(bytes) = source else {
        return Resolution::Value(None);
    };
    let Ok(mut tuple) = codec::decode_tuple(bytes) else {
        return Resolution::Value(None);
    };
    tuple.set(CARDINALITY_TAG, Value::Uint(merged as u64));
    match codec::encode_tuple(&tuple) {
        Ok(encoded) => Resolution::Value(Some(encoded)),
        Err(_) => Resolution::Record,
    }
}

fn decode_row(bytes: Option<&[u8]>) -> Result<Option<crate::core::value::Tuple>> {
    bytes.map(codec::decode_tuple).transpose()
}

/// Merge views/triggers/routines by name: same definition is trivial, a
/// one-sided change wins, and divergent definitions conflict on the
/// auxiliary schemas table.
fn merge_named_map(
    base: &std::collections::BTreeMap<String, String>,
    ours: &mut std::collections::BTreeMap<String, String>,
    theirs: &std::collections::BTreeMap<String, String>,
    stats: &mut RootMergeStats,
) {
    for (name, their_def) in theirs {
        match ours.get(name) {
            Some(our_def) if our_def == their_def => {}
            Some(our_def) => match base.get(name) {
                Some(base_def) if base_def == our_def => {
                    ours.insert(name.clone(), their_def.clone());
                }
                Some(base_def) if base_def == their_def => {}
                _ => {
                    log::debug!("definition conflict on {name}");
                    stats.conflicted_tables.push(SCHEMAS_TABLE.to_string());
                }
            },
            None => {
                let dropped_by_ours = base.contains_key(name);
                if !dropped_by_ours {
                    ours.insert(name.clone(), their_def.clone());
                }
            }
        }
    }
    // Deletions on their side: drop if ours left the definition untouched,
    // conflict if ours modified it
    let mut to_remove = Vec::new();
    for (name, def) in ours.iter() {
        if theirs.contains_key(name) {
            continue;
        }
        match base.get(name) {
            Some(base_def) if base_def == def => to_remove.push(name.clone()),
            Some(_) => {
                log::debug!("definition {name} deleted in theirs but modified in ours");
                stats.conflicted_tables.push(SCHEMAS_TABLE.to_string());
            }
            None => {}
        }
    }
    for name in to_remove {
        ours.remove(&name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::MemStore;
    use crate::core::value::Tuple;
    use crate::model::schema::{Column, DataType, IndexDef, Schema};
    use std::sync::Arc;

    fn store() -> StoreRef {
        Arc::new(MemStore::new())
    }

    fn schema() -> Schema {
        Schema::new(
            vec![
                Column::new("pk", DataType::Int32, 1, false),
                Column::new("c", DataType::Int32, 2, true),
            ],
            vec!["pk".to_string()],
        )
    }

    fn row(pk: i64, c: i64) -> Tuple {
        Tuple::from_fields(vec![(1, Value::Int(pk)), (2, Value::Int(c))])
    }

    fn root_with_rows(s: &StoreRef, rows: &[(i64, i64)]) -> RootValue {
        let mut table = Table::create(s.clone(), "t", schema()).unwrap();
        for (pk, c) in rows {
            table.insert_row(row(*pk, *c)).unwrap();
        }
        let mut root = RootValue::empty();
        root.put_table(s, &table).unwrap();
        root
    }

    fn update_row(s: &StoreRef, root: &RootValue, pk: i64, c: i64) -> RootValue {
        let mut root = root.clone();
        let mut table = root.expect_table(s, "t").unwrap();
        table.put_row(row(pk, c)).unwrap();
        root.put_table(s, &table).unwrap();
        root
    }

    #[test]
    fn test_disjoint_row_edits_merge_clean() {
        let s = store();
        let base = root_with_rows(&s, &[(1, 1), (2, 2)]);
        let ours = update_row(&s, &base, 1, 10);
        let theirs = update_row(&s, &base, 2, 20);

        let merger = Merger::new(s.clone(), CancelToken::new());
        let (merged, stats) = merger.merge_roots(&base, &ours, &theirs).unwrap();
        assert!(stats.is_clean());
        let t = merged.expect_table(&s, "t").unwrap();
        assert_eq!(
            t.get_row(&[Value::Int(1)]).unwrap().unwrap().get(2),
            Some(&Value::Int(10))
        );
        assert_eq!(
            t.get_row(&[Value::Int(2)]).unwrap().unwrap().get(2),
            Some(&Value::Int(20))
        );
    }

    #[test]
    fn test_row_conflict_recorded_with_all_three_versions() {
        let s = store();
        let base = root_with_rows(&s, &[(1, 1)]);
        let ours = update_row(&s, &base, 1, 2);
        let theirs = update_row(&s, &base, 1, 3);

        let merger = Merger::new(s.clone(), CancelToken::new());
        let (merged, stats) = merger.merge_roots(&base, &ours, &theirs).unwrap();
        assert_eq!(stats.conflicted_tables, vec!["t".to_string()]);

        let t = merged.expect_table(&s, "t").unwrap();
        let conflicts = t.list_conflicts().unwrap();
        assert_eq!(conflicts.len(), 1);
        let entry = &conflicts[0].1;
        assert_eq!(entry.base.as_ref().unwrap().get(2), Some(&Value::Int(1)));
        assert_eq!(entry.ours.as_ref().unwrap().get(2), Some(&Value::Int(2)));
        assert_eq!(entry.theirs.as_ref().unwrap().get(2), Some(&Value::Int(3)));
        // Ours stays in place until resolution
        assert_eq!(
            t.get_row(&[Value::Int(1)]).unwrap().unwrap().get(2),
            Some(&Value::Int(2))
        );
    }

    #[test]
    fn test_unique_violations_recorded_not_blocked() {
        let s = store();
        let mut base_schema = schema();
        base_schema.indexes.insert(
            "c_uniq".to_string(),
            IndexDef {
                name: "c_uniq".to_string(),
                columns: vec!["c".to_string()],
                unique: true,
                spatial: false,
                comment: None,
            },
        );
        let mut table = Table::create(s.clone(), "t", base_schema).unwrap();
        table.insert_row(row(0, 0)).unwrap();
        let mut base = RootValue::empty();
        base.put_table(&s, &table).unwrap();

        // Left adds (1,19), right adds (2,19): both land, both violate
        let mut ours_table = base.expect_table(&s, "t").unwrap();
        ours_table.insert_row(row(1, 19)).unwrap();
        let mut ours = base.clone();
        ours.put_table(&s, &ours_table).unwrap();

        let mut theirs_table = base.expect_table(&s, "t").unwrap();
        theirs_table.insert_row(row(2, 19)).unwrap();
        let mut theirs = base.clone();
        theirs.put_table(&s, &theirs_table).unwrap();

        let merger = Merger::new(s.clone(), CancelToken::new());
        let (merged, stats) = merger.merge_roots(&base, &ours, &theirs).unwrap();
        assert!(stats.conflicted_tables.is_empty());
        assert_eq!(stats.violated_tables, vec!["t".to_string()]);

        let t = merged.expect_table(&s, "t").unwrap();
        assert!(t.get_row(&[Value::Int(1)]).unwrap().is_some());
        assert!(t.get_row(&[Value::Int(2)]).unwrap().is_some());
        let violations = t.list_violations().unwrap();
        assert_eq!(violations.len(), 2);
        assert!(violations
            .iter()
            .all(|(_, v)| v.kind == ViolationKind::Unique));
    }

    #[test]
    fn test_table_added_on_their_side() {
        let s = store();
        let base = RootValue::empty();
        let ours = RootValue::empty();
        let theirs = root_with_rows(&s, &[(1, 1)]);
        let merger = Merger::new(s.clone(), CancelToken::new());
        let (merged, stats) = merger.merge_roots(&base, &ours, &theirs).unwrap();
        assert!(stats.is_clean());
        assert!(merged.has_table("t"));
    }

    #[test]
    fn test_drop_vs_modify_is_schema_conflict() {
        let s = store();
        let base = root_with_rows(&s, &[(1, 1)]);
        let ours = update_row(&s, &base, 1, 5);
        let mut theirs = base.clone();
        theirs.remove_table("t").unwrap();

        let merger = Merger::new(s.clone(), CancelToken::new());
        let (merged, stats) = merger.merge_roots(&base, &ours, &theirs).unwrap();
        assert_eq!(stats.schema_conflicts, vec!["t".to_string()]);
        assert!(merged.has_table("t"));
    }

    #[test]
    fn test_view_merge_by_name() {
        let s = store();
        let mut base = RootValue::empty();
        base.views
            .insert("v".to_string(), "SELECT 1".to_string());
        let mut ours = base.clone();
        ours.views.insert("ours_v".to_string(), "SELECT 2".to_string());
        let mut theirs = base.clone();
        theirs
            .views
            .insert("theirs_v".to_string(), "SELECT 3".to_string());

        let merger = Merger::new(s.clone(), CancelToken::new());
        let (merged, stats) = merger.merge_roots(&base, &ours, &theirs).unwrap();
        assert!(stats.is_clean());
        assert_eq!(merged.views.len(), 3);

        // Divergent redefinition conflicts on the schemas table
        let mut ours2 = base.clone();
        ours2.views.insert("v".to_string(), "SELECT 10".to_string());
        let mut theirs2 = base.clone();
        theirs2.views.insert("v".to_string(), "SELECT 20".to_string());
        let (_, stats) = merger.merge_roots(&base, &ours2, &theirs2).unwrap();
        assert_eq!(stats.conflicted_tables, vec![SCHEMAS_TABLE.to_string()]);
    }

    #[test]
    fn test_keyless_merge_sums_cardinalities() {
        let s = store();
        let keyless_schema = Schema::new(
            vec![
                Column::new("a", DataType::Int32, 1, true),
                Column::new("b", DataType::Int32, 2, true),
            ],
            vec![],
        );
        let mut table = Table::create(s.clone(), "t", keyless_schema).unwrap();
        let the_row = Tuple::from_fields(vec![(1, Value::Int(1)), (2, Value::Int(2))]);
        table.insert_row(the_row.clone()).unwrap();
        let mut base = RootValue::empty();
        base.put_table(&s, &table).unwrap();

        // Each side inserts the same row once more
        let mut ours_table = base.expect_table(&s, "t").unwrap();
        ours_table.insert_row(the_row.clone()).unwrap();
        let mut ours = base.clone();
        ours.put_table(&s, &ours_table).unwrap();

        let mut theirs_table = base.expect_table(&s, "t").unwrap();
        theirs_table.insert_row(the_row.clone()).unwrap();
        let mut theirs = base.clone();
        theirs.put_table(&s, &theirs_table).unwrap();

        let merger = Merger::new(s.clone(), CancelToken::new());
        let (merged, stats) = merger.merge_roots(&base, &ours, &theirs).unwrap();
        assert!(stats.is_clean());
        let t = merged.expect_table(&s, "t").unwrap();
        assert_eq!(t.row_count().unwrap(), 3);
    }
}
