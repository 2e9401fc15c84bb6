//! Row constraint evaluation: NOT NULL, type range, CHECK expressions,
//! UNIQUE probes, and FOREIGN KEY lookups against the parent index. Write
//! paths block on failure; the merge path records violations instead.

use crate::core::root::RootValue;
use crate::core::table::Table;
use crate::core::value::{Decimal, Tuple, Value};
use crate::error::{DoltError, Result};
use crate::model::conflict::{ViolationEntry, ViolationKind};
use crate::model::schema::{DataType, ForeignKey, Schema};

/// Blocking validation for the direct write path
pub fn validate_row(schema: &Schema, row: &Tuple) -> Result<()> {
    if let Some(entry) = first_row_violation(schema, row)? {
        return Err(DoltError::ConstraintViolation(format!(
            "{}: {}",
            entry.kind, entry.details
        )));
    }
    Ok(())
}

/// Non-blocking validation: NOT NULL, type, and CHECK failures as entries
pub fn first_row_violation(schema: &Schema, row: &Tuple) -> Result<Option<ViolationEntry>> {
    for col in &schema.columns {
        let value = row.get(col.tag).unwrap_or(&Value::Null);
        if value.is_null() {
            if !col.nullable || schema.primary_key.contains(&col.name) {
                return Ok(Some(ViolationEntry {
                    kind: ViolationKind::NotNull,
                    details: format!("column {} cannot be null", col.name),
                }));
            }
            continue;
        }
        if !value_fits_type(value, &col.dtype) {
            return Ok(Some(ViolationEntry {
                kind: ViolationKind::Check,
                details: format!("value out of range for column {} ({})", col.name, col.dtype),
            }));
        }
    }
    for check in &schema.checks {
        if !evaluate_check(&check.expression, schema, row)? {
            return Ok(Some(ViolationEntry {
                kind: ViolationKind::Check,
                details: format!("check constraint {} failed", check.name),
            }));
        }
    }
    Ok(None)
}

/// Probe every unique index for a different row holding the same key.
/// NULL key parts never collide, per SQL semantics.
pub fn check_unique_indexes(table: &Table, row: &Tuple, pk_key: &[u8]) -> Result<()> {
    if let Some((index_name, _)) = find_unique_collision(table, row, pk_key)? {
        return Err(DoltError::ConstraintViolation(format!(
            "duplicate entry for unique index {index_name} on table {}",
            table.name
        )));
    }
    Ok(())
}

/// Returns the colliding (index, existing pk key) if any unique index
/// already maps this row's index key to a different primary key
pub fn find_unique_collision(
    table: &Table,
    row: &Tuple,
    pk_key: &[u8],
) -> Result<Option<(String, Vec<u8>)>> {
    for index in table.schema.indexes.values() {
        if !index.unique {
            continue;
        }
        let mut fields = Vec::new();
        let mut any_null = false;
        for col in table.schema.index_columns(index)? {
            let value = row.get(col.tag).cloned().unwrap_or(Value::Null);
            any_null |= value.is_null();
            fields.push((value, col.null_order));
        }
        if any_null {
            continue;
        }
        let key = crate::core::value::codec::encode_key(&fields)?;
        if let Some(existing_pk) = table.index_tree(&index.name)?.get(&key)? {
            if existing_pk != pk_key {
                return Ok(Some((index.name.clone(), existing_pk)));
            }
        }
    }
    Ok(None)
}

/// Validate one row of the child table against a foreign key. A NULL in any
/// child column opts the row out, per SQL semantics.
pub fn check_foreign_key(
    root: &RootValue,
    store: &crate::core::db::StoreRef,
    fk: &ForeignKey,
    child: &Table,
    row: &Tuple,
) -> Result<Option<ViolationEntry>> {
    let mut child_values = Vec::new();
    for col_name in &fk.child_columns {
        let col = child
            .schema
            .get_column(col_name)
            .ok_or_else(|| DoltError::NotFound(format!("column {col_name}")))?;
        let value = row.get(col.tag).cloned().unwrap_or(Value::Null);
        if value.is_null() {
            return Ok(None);
        }
        child_values.push(value);
    }

    let parent = root.expect_table(store, &fk.parent_table)?;
    let exists = if fk.parent_columns == parent.schema.primary_key {
        parent.get_row(&child_values)?.is_some()
    } else {
        // Parent side must be backed by a unique index over those columns
        let index = parent
            .schema
            .indexes
            .values()
            .find(|i| i.unique && i.columns == fk.parent_columns)
            .ok_or_else(|| {
                DoltError::Internal(format!(
                    "foreign key {} has no backing unique index on {}",
                    fk.name, fk.parent_table
                ))
            })?;
        let fields: Vec<(Value, _)> = child_values
            .iter()
            .cloned()
            .zip(
                parent
                    .schema
                    .index_columns(index)?
                    .iter()
                    .map(|c| c.null_order),
            )
            .collect();
        let key = crate::core::value::codec::encode_key(&fields)?;
        parent.index_tree(&index.name)?.get(&key)?.is_some()
    };

    if exists {
        Ok(None)
    } else {
        Ok(Some(ViolationEntry {
            kind: ViolationKind::ForeignKey,
            details: format!(
                "foreign key {}: no matching row in {}",
                fk.name, fk.parent_table
            ),
        }))
    }
}

fn value_fits_type(value: &Value, dtype: &DataType) -> bool {
    match (value, dtype) {
        (Value::Bool(_), DataType::Boolean) => true,
        (Value::Int(i), DataType::Int8) => i8::try_from(*i).is_ok(),
        (Value::Int(i), DataType::Int16) => i16::try_from(*i).is_ok(),
        (Value::Int(i), DataType::Int32) => i32::try_from(*i).is_ok(),
        (Value::Int(_), DataType::Int64) => true,
        (Value::Int(i), DataType::UInt8) => u8::try_from(*i).is_ok(),
        (Value::Int(i), DataType::UInt16) => u16::try_from(*i).is_ok(),
        (Value::Int(i), DataType::UInt32) => u32::try_from(*i).is_ok(),
        (Value::Int(i), DataType::UInt64) => *i >= 0,
        (Value::Uint(u), DataType::UInt8) => u8::try_from(*u).is_ok(),
        (Value::Uint(u), DataType::UInt16) => u16::try_from(*u).is_ok(),
        (Value::Uint(u), DataType::UInt32) => u32::try_from(*u).is_ok(),
        (Value::Uint(_), DataType::UInt64) => true,
        (Value::Uint(u), DataType::Int64) => i64::try_from(*u).is_ok(),
        (Value::Float(_), DataType::Float32 | DataType::Float64) => true,
        (Value::Int(_), DataType::Float32 | DataType::Float64) => true,
        (Value::Decimal(_), DataType::Decimal { .. }) => true,
        (Value::Text(_), DataType::Text) => true,
        (Value::Blob(_) | Value::BlobRef { .. }, DataType::Blob | DataType::Text) => true,
        (Value::Timestamp(_), DataType::Timestamp) => true,
        (Value::Json(_), DataType::Json) => true,
        (Value::Geometry { .. }, DataType::Geometry) => true,
        (_, DataType::Unknown) => true,
        _ => false,
    }
}

/// Evaluate a CHECK expression of the form
/// `<column> <op> <literal> [AND <column> <op> <literal> ...]` with ops
/// `=, !=, <>, <, <=, >, >=`, plus `<column> IS [NOT] NULL`.
pub fn evaluate_check(expression: &str, schema: &Schema, row: &Tuple) -> Result<bool> {
    for clause in expression.split(" AND ") {
        if !evaluate_clause(clause.trim(), schema, row)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn evaluate_clause(clause: &str, schema: &Schema, row: &Tuple) -> Result<bool> {
    let clause = clause.trim_start_matches('(').trim_end_matches(')').trim();
    let upper = clause.to_ascii_uppercase();
    if let Some(col_name) = upper.strip_suffix(" IS NOT NULL") {
        let value = column_value(clause[..col_name.len()].trim(), schema, row)?;
        return Ok(!value.is_null());
    }
    if let Some(col_name) = upper.strip_suffix(" IS NULL") {
        let value = column_value(clause[..col_name.len()].trim(), schema, row)?;
        return Ok(value.is_null());
    }
    for op in ["<=", ">=", "!=", "<>", "=", "<", ">"] {
        if let Some(idx) = clause.find(op) {
            let column = clause[..idx].trim();
            let literal = clause[idx + op.len()..].trim();
            let left = column_value(column, schema, row)?;
            let right = Value::parse_literal(literal)?;
            // NULL compares as unknown, which a CHECK does not fail
            if left.is_null() || right.is_null() {
                return Ok(true);
            }
            let ord = compare_values(&left, &right)?;
            return Ok(match op {
                "=" => ord == std::cmp::Ordering::Equal,
                "!=" | "<>" => ord != std::cmp::Ordering::Equal,
                "<" => ord == std::cmp::Ordering::Less,
                "<=" => ord != std::cmp::Ordering::Greater,
                ">" => ord == std::cmp::Ordering::Greater,
                ">=" => ord != std::cmp::Ordering::Less,
                _ => unreachable!(),
            });
        }
    }
    Err(DoltError::InvalidArgument(format!(
        "unsupported check expression: {clause}"
    )))
}

fn column_value(name: &str, schema: &Schema, row: &Tuple) -> Result<Value> {
    let name = name.trim_matches('`');
    let col = schema
        .get_column(name)
        .ok_or_else(|| DoltError::NotFound(format!("column {name} in check expression")))?;
    Ok(row.get(col.tag).cloned().unwrap_or(Value::Null))
}

fn compare_values(a: &Value, b: &Value) -> Result<std::cmp::Ordering> {
    use std::cmp::Ordering;
    let ord = match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Uint(x), Value::Uint(y)) => x.cmp(y),
        (Value::Int(x), Value::Uint(y)) => {
            if *x < 0 {
                Ordering::Less
            } else {
                (*x as u64).cmp(y)
            }
        }
        (Value::Uint(x), Value::Int(y)) => {
            if *y < 0 {
                Ordering::Greater
            } else {
                x.cmp(&(*y as u64))
            }
        }
        (Value::Float(x), Value::Float(y)) => {
            x.partial_cmp(y).unwrap_or(Ordering::Equal)
        }
        (Value::Int(x), Value::Float(y)) => (*x as f64)
            .partial_cmp(y)
            .unwrap_or(Ordering::Equal),
        (Value::Float(x), Value::Int(y)) => x
            .partial_cmp(&(*y as f64))
            .unwrap_or(Ordering::Equal),
        (Value::Text(x), Value::Text(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Timestamp(x), Value::Timestamp(y)) => x.cmp(y),
        (Value::Decimal(x), Value::Decimal(y)) => Decimal::numeric_cmp(x, y),
        _ => {
            return Err(DoltError::InvalidArgument(format!(
                "cannot compare {a:?} with {b:?}"
            )))
        }
    };
    Ok(ord)
}
