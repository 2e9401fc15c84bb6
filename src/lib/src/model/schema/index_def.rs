use serde::{Deserialize, Serialize};

/// A secondary index definition. The index tree maps
/// (index-key, primary-key) tuples, or just (index-key) when unique.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
    #[serde(default)]
    pub spatial: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// A named CHECK constraint with its expression text
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CheckDef {
    pub name: String,
    pub expression: String,
}

/// A foreign key relating a child column set to a parent column set.
/// Stored in the root-level collection, not on either table.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub name: String,
    pub child_table: String,
    pub child_columns: Vec<String>,
    pub parent_table: String,
    pub parent_columns: Vec<String>,
}
