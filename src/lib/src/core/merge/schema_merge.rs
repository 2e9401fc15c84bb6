//! Three-way schema merge, column-by-column by tag. A column present on one
//! side and absent on the other was either added there or dropped there,
//! which the base disambiguates. Any disagreement the base cannot explain is
//! a schema conflict and the whole table is skipped.

use std::collections::BTreeSet;

use crate::error::{DoltError, Result};
use crate::model::schema::{Column, Schema};

pub fn merge_schemas(base: Option<&Schema>, ours: &Schema, theirs: &Schema) -> Result<Schema> {
    if ours == theirs {
        return Ok(ours.clone());
    }
    let conflict = |reason: &str| {
        Err(DoltError::SchemaConflict(reason.to_string()))
    };

    // Primary keys must agree by tag
    let pk_tags = |s: &Schema| -> Vec<u64> {
        s.primary_key
            .iter()
            .filter_map(|n| s.get_column(n).map(|c| c.tag))
            .collect()
    };
    if pk_tags(ours) != pk_tags(theirs) {
        return conflict("primary keys differ");
    }

    let mut tags: BTreeSet<u64> = ours.tags().into_iter().collect();
    tags.extend(theirs.tags());
    if let Some(base) = base {
        tags.extend(base.tags());
    }

    let mut columns: Vec<Column> = Vec::new();
    for tag in tags {
        let in_base = base.and_then(|s| s.get_column_by_tag(tag));
        let in_ours = ours.get_column_by_tag(tag);
        let in_theirs = theirs.get_column_by_tag(tag);
        match (in_base, in_ours, in_theirs) {
            (_, Some(o), Some(t)) => {
                if o == t {
                    columns.push(o.clone());
                } else {
                    match in_base {
                        Some(b) if b == o => columns.push(t.clone()),
                        Some(b) if b == t => columns.push(o.clone()),
                        _ => return conflict(&format!("column {} changed on both sides", o.name)),
                    }
                }
            }
            // Added on one side
            (None, Some(col), None) | (None, None, Some(col)) => columns.push(col.clone()),
            // Dropped on one side: allowed only if the surviving side left it
            // untouched
            (Some(b), Some(o), None) => {
                if b != o {
                    return conflict(&format!("column {} dropped and modified", o.name));
                }
            }
            (Some(b), None, Some(t)) => {
                if b != t {
                    return conflict(&format!("column {} dropped and modified", t.name));
                }
            }
            // Dropped on both sides, or never existed
            (Some(_), None, None) | (None, None, None) => {}
        }
    }

    // Preserve our column order, appending columns only theirs carries
    let mut ordered: Vec<Column> = Vec::new();
    for col in &ours.columns {
        if let Some(merged) = columns.iter().find(|c| c.tag == col.tag) {
            ordered.push(merged.clone());
        }
    }
    for col in columns {
        if !ordered.iter().any(|c| c.tag == col.tag) {
            ordered.push(col);
        }
    }

    let mut merged = Schema::new(ordered, ours.primary_key.clone());

    // Indexes and checks merge by name
    for (name, ours_idx) in &ours.indexes {
        match theirs.indexes.get(name) {
            Some(theirs_idx) if ours_idx != theirs_idx => {
                let base_idx = base.and_then(|s| s.indexes.get(name));
                match base_idx {
                    Some(b) if b == ours_idx => {
                        merged.indexes.insert(name.clone(), theirs_idx.clone());
                    }
                    Some(b) if b == theirs_idx => {
                        merged.indexes.insert(name.clone(), ours_idx.clone());
                    }
                    _ => return conflict(&format!("index {name} changed on both sides")),
                }
            }
            Some(_) => {
                merged.indexes.insert(name.clone(), ours_idx.clone());
            }
            None => {
                let dropped_by_theirs = base.is_some_and(|s| s.indexes.contains_key(name));
                if !dropped_by_theirs {
                    merged.indexes.insert(name.clone(), ours_idx.clone());
                }
            }
        }
    }
    for (name, theirs_idx) in &theirs.indexes {
        if merged.indexes.contains_key(name) {
            continue;
        }
        let dropped_by_ours = base.is_some_and(|s| s.indexes.contains_key(name));
        if !dropped_by_ours {
            merged.indexes.insert(name.clone(), theirs_idx.clone());
        }
    }

    let mut checks = ours.checks.clone();
    for check in &theirs.checks {
        if !checks.iter().any(|c| c.name == check.name) {
            checks.push(check.clone());
        }
    }
    merged.checks = checks;
    merged.options = ours.options.clone();
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::schema::DataType;

    fn base_schema() -> Schema {
        Schema::new(
            vec![
                Column::new("pk", DataType::Int32, 1, false),
                Column::new("c", DataType::Int32, 2, true),
            ],
            vec!["pk".to_string()],
        )
    }

    #[test]
    fn test_equal_schemas_are_trivial() {
        let s = base_schema();
        assert_eq!(merge_schemas(Some(&s), &s, &s).unwrap(), s);
    }

    #[test]
    fn test_add_on_one_side() {
        let base = base_schema();
        let mut ours = base.clone();
        ours.columns.push(Column::new("added", DataType::Text, 3, true));
        let merged = merge_schemas(Some(&base), &ours, &base).unwrap();
        assert!(merged.has_column("added"));
        let merged = merge_schemas(Some(&base), &base, &ours).unwrap();
        assert!(merged.has_column("added"));
    }

    #[test]
    fn test_adds_on_both_sides_union() {
        let base = base_schema();
        let mut ours = base.clone();
        ours.columns.push(Column::new("from_ours", DataType::Text, 3, true));
        let mut theirs = base.clone();
        theirs
            .columns
            .push(Column::new("from_theirs", DataType::Text, 4, true));
        let merged = merge_schemas(Some(&base), &ours, &theirs).unwrap();
        assert!(merged.has_column("from_ours"));
        assert!(merged.has_column("from_theirs"));
    }

    #[test]
    fn test_drop_on_one_side() {
        let base = base_schema();
        let mut theirs = base.clone();
        theirs.columns.retain(|c| c.tag != 2);
        let merged = merge_schemas(Some(&base), &base, &theirs).unwrap();
        assert!(!merged.has_column("c"));
    }

    #[test]
    fn test_rename_on_one_side_wins() {
        let base = base_schema();
        let mut theirs = base.clone();
        theirs.columns[1].name = "renamed".to_string();
        let merged = merge_schemas(Some(&base), &base, &theirs).unwrap();
        assert!(merged.has_column("renamed"));
        assert!(!merged.has_column("c"));
    }

    #[test]
    fn test_same_type_change_on_both_sides_accepted() {
        let base = base_schema();
        let mut ours = base.clone();
        ours.columns[1].dtype = DataType::Int64;
        let theirs = ours.clone();
        let merged = merge_schemas(Some(&base), &ours, &theirs).unwrap();
        assert_eq!(merged.columns[1].dtype, DataType::Int64);
    }

    #[test]
    fn test_divergent_change_is_conflict() {
        let base = base_schema();
        let mut ours = base.clone();
        ours.columns[1].dtype = DataType::Int64;
        let mut theirs = base.clone();
        theirs.columns[1].name = "renamed".to_string();
        assert!(matches!(
            merge_schemas(Some(&base), &ours, &theirs),
            Err(DoltError::SchemaConflict(_))
        ));
    }

    #[test]
    fn test_drop_and_modify_is_conflict() {
        let base = base_schema();
        let mut ours = base.clone();
        ours.columns[1].dtype = DataType::Int64;
        let mut theirs = base.clone();
        theirs.columns.retain(|c| c.tag != 2);
        assert!(matches!(
            merge_schemas(Some(&base), &ours, &theirs),
            Err(DoltError::SchemaConflict(_))
        ));
    }

    #[test]
    fn test_pk_change_is_conflict() {
        let base = base_schema();
        let mut theirs = base.clone();
        theirs.primary_key = vec!["c".to_string()];
        assert!(matches!(
            merge_schemas(Some(&base), &base, &theirs),
            Err(DoltError::SchemaConflict(_))
        ));
    }
}
