//! Conflicts and constraint violations recorded during merge. Both live in
//! per-table prolly trees keyed by the conflicted primary key, so they are
//! versioned and diffable like any other data.

use serde::{Deserialize, Serialize};

use crate::core::value::{codec, Tuple, Value};
use crate::error::{DoltError, Result};

/// base/ours/theirs row variants for one conflicted key. A missing variant
/// means the row did not exist on that side.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConflictEntry {
    pub base: Option<Tuple>,
    pub ours: Option<Tuple>,
    pub theirs: Option<Tuple>,
}

impl ConflictEntry {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let to_value = |t: &Option<Tuple>| match t {
            Some(tuple) => Value::Tuple(tuple.clone()),
            None => Value::Null,
        };
        let list = Value::List(vec![
            to_value(&self.base),
            to_value(&self.ours),
            to_value(&self.theirs),
        ]);
        let mut out = Vec::new();
        codec::encode_value(&list, &mut out)?;
        Ok(out)
    }

    pub fn decode(buf: &[u8]) -> Result<ConflictEntry> {
        let mut pos = 0;
        let Value::List(items) = codec::decode_value(buf, &mut pos)? else {
            return Err(DoltError::Internal("malformed conflict entry".to_string()));
        };
        let from_value = |v: &Value| match v {
            Value::Tuple(t) => Some(t.clone()),
            _ => None,
        };
        if items.len() != 3 {
            return Err(DoltError::Internal("malformed conflict entry".to_string()));
        }
        Ok(ConflictEntry {
            base: from_value(&items[0]),
            ours: from_value(&items[1]),
            theirs: from_value(&items[2]),
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    NotNull,
    Check,
    Unique,
    ForeignKey,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::NotNull => "not_null",
            ViolationKind::Check => "check",
            ViolationKind::Unique => "unique",
            ViolationKind::ForeignKey => "foreign_key",
        }
    }
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One recorded constraint violation for a primary key
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ViolationEntry {
    pub kind: ViolationKind,
    pub details: String,
}

impl ViolationEntry {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(buf: &[u8]) -> Result<ViolationEntry> {
        Ok(serde_json::from_slice(buf)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_entry_round_trip() {
        let entry = ConflictEntry {
            base: Some(Tuple::from_fields(vec![(1, Value::Int(1))])),
            ours: Some(Tuple::from_fields(vec![(1, Value::Int(2))])),
            theirs: None,
        };
        let decoded = ConflictEntry::decode(&entry.encode().unwrap()).unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn test_violation_kind_names() {
        assert_eq!(ViolationKind::Unique.as_str(), "unique");
        assert_eq!(ViolationKind::ForeignKey.as_str(), "foreign_key");
        let entry = ViolationEntry {
            kind: ViolationKind::NotNull,
            details: "column c".to_string(),
        };
        assert_eq!(ViolationEntry::decode(&entry.encode().unwrap()).unwrap(), entry);
    }
}
