use serde::{Deserialize, Serialize};

use crate::model::schema::DataType;

/// Where NULL sorts relative to non-NULL values in an ordered index
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NullOrder {
    #[default]
    First,
    Last,
}

/// A column definition. The `tag` is the column's stable identity: assigned
/// once at creation, preserved across renames and reorders, and never reused
/// for a different column in the table's entire history.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub dtype: DataType,
    pub tag: u64,
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub null_order: NullOrder,
    #[serde(default)]
    pub auto_increment: bool,
}

impl Column {
    pub fn new(name: impl AsRef<str>, dtype: DataType, tag: u64, nullable: bool) -> Column {
        Column {
            name: name.as_ref().to_string(),
            dtype,
            tag,
            nullable,
            default: None,
            comment: None,
            null_order: NullOrder::First,
            auto_increment: false,
        }
    }
}
