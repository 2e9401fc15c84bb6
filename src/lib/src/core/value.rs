//! Typed, self-describing values and the two encodings they travel in:
//! a self-describing byte codec for row values, and an order-preserving
//! key codec whose lexicographic byte order equals value order.

pub mod chunker;
pub mod codec;
pub mod tuple;

pub use tuple::Tuple;

use std::collections::BTreeMap;

use crate::error::{DoltError, Result};
use crate::model::Hash;
use crate::util::hasher;

/// A decimal held as its unscaled decimal digits: the numeric value is
/// `digits * 10^-scale`, negated when `negative`. Comparison is numeric,
/// never by representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decimal {
    pub negative: bool,
    pub scale: u32,
    /// ASCII digits `0..=9`, most significant first, no leading zeros.
    /// Empty means zero.
    pub digits: Vec<u8>,
}

impl Decimal {
    pub fn new(negative: bool, scale: u32, mut digits: Vec<u8>) -> Decimal {
        while digits.first() == Some(&0) {
            digits.remove(0);
        }
        let negative = negative && !digits.is_empty();
        Decimal {
            negative,
            scale,
            digits,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.digits.is_empty() || self.digits.iter().all(|d| *d == 0)
    }

    /// Significant digits with trailing zeros stripped, plus the count of
    /// integer digits (may be <= 0 for values below one).
    fn normalized(&self) -> (Vec<u8>, i64) {
        let mut digits = self.digits.clone();
        let int_digits = digits.len() as i64 - self.scale as i64;
        while digits.last() == Some(&0) {
            digits.pop();
        }
        (digits, int_digits)
    }

    pub fn numeric_cmp(&self, other: &Decimal) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        match (self.is_zero(), other.is_zero()) {
            (true, true) => return Ordering::Equal,
            (true, false) => {
                return if other.negative {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            }
            (false, true) => {
                return if self.negative {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            }
            _ => {}
        }
        if self.negative != other.negative {
            return if self.negative {
                Ordering::Less
            } else {
                Ordering::Greater
            };
        }
        let (a_digits, a_exp) = self.normalized();
        let (b_digits, b_exp) = other.normalized();
        let magnitude = a_exp.cmp(&b_exp).then_with(|| a_digits.cmp(&b_digits));
        if self.negative {
            magnitude.reverse()
        } else {
            magnitude
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Blob(Vec<u8>),
    /// Microseconds since the Unix epoch, UTC. Time zones are display-only.
    Timestamp(i64),
    /// Canonical document: object keys sorted, so equal documents hash equal
    Json(serde_json::Value),
    Geometry {
        srid: u32,
        wkb: Vec<u8>,
    },
    Tuple(Tuple),
    List(Vec<Value>),
    Map(BTreeMap<Vec<u8>, (Value, Value)>),
    Set(Vec<Value>),
    Ref(Hash),
    /// A blob too large to inline, spilled into a balanced byte tree
    BlobRef {
        hash: Hash,
        len: u64,
    },
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Hash of the self-describing encoding. Two equal values always hash
    /// equal because the codec canonicalizes floats and JSON.
    pub fn content_hash(&self) -> Result<Hash> {
        let mut buf = Vec::new();
        codec::encode_value(self, &mut buf)?;
        Ok(hasher::hash_buffer(&buf))
    }

    /// Canonicalize a JSON document: objects re-keyed in sorted order,
    /// recursively, so insertion order never changes the hash.
    pub fn canonical_json(value: serde_json::Value) -> serde_json::Value {
        match value {
            serde_json::Value::Object(map) => {
                let sorted: BTreeMap<String, serde_json::Value> = map
                    .into_iter()
                    .map(|(k, v)| (k, Value::canonical_json(v)))
                    .collect();
                let mut out = serde_json::Map::new();
                for (k, v) in sorted {
                    out.insert(k, v);
                }
                serde_json::Value::Object(out)
            }
            serde_json::Value::Array(items) => {
                serde_json::Value::Array(items.into_iter().map(Value::canonical_json).collect())
            }
            other => other,
        }
    }

    /// Parse a SQL-ish literal for DEFAULT expressions and CHECK operands
    pub fn parse_literal(text: &str) -> Result<Value> {
        let text = text.trim();
        if text.eq_ignore_ascii_case("null") {
            return Ok(Value::Null);
        }
        if text.eq_ignore_ascii_case("true") {
            return Ok(Value::Bool(true));
        }
        if text.eq_ignore_ascii_case("false") {
            return Ok(Value::Bool(false));
        }
        if (text.starts_with('\'') && text.ends_with('\'') && text.len() >= 2)
            || (text.starts_with('"') && text.ends_with('"') && text.len() >= 2)
        {
            return Ok(Value::Text(text[1..text.len() - 1].to_string()));
        }
        if let Ok(i) = text.parse::<i64>() {
            return Ok(Value::Int(i));
        }
        if let Ok(f) = text.parse::<f64>() {
            return Ok(Value::Float(f));
        }
        Err(DoltError::InvalidArgument(format!(
            "cannot parse literal {text:?}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    fn dec(s: &str) -> Decimal {
        let negative = s.starts_with('-');
        let s = s.trim_start_matches('-');
        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };
        let digits: Vec<u8> = format!("{int_part}{frac_part}")
            .bytes()
            .map(|b| b - b'0')
            .collect();
        Decimal::new(negative, frac_part.len() as u32, digits)
    }

    #[test]
    fn test_decimal_compare_is_numeric() {
        assert_eq!(dec("1.50").numeric_cmp(&dec("1.5")), Ordering::Equal);
        assert_eq!(dec("10").numeric_cmp(&dec("9.99")), Ordering::Greater);
        assert_eq!(dec("-10").numeric_cmp(&dec("-9.99")), Ordering::Less);
        assert_eq!(dec("0.00").numeric_cmp(&dec("0")), Ordering::Equal);
        assert_eq!(dec("-0.01").numeric_cmp(&dec("0.01")), Ordering::Less);
    }

    #[test]
    fn test_canonical_json_hash_ignores_key_order() {
        let a: serde_json::Value = serde_json::from_str(r#"{"b":1,"a":{"y":2,"x":3}}"#).unwrap();
        let b: serde_json::Value = serde_json::from_str(r#"{"a":{"x":3,"y":2},"b":1}"#).unwrap();
        let va = Value::Json(Value::canonical_json(a));
        let vb = Value::Json(Value::canonical_json(b));
        assert_eq!(va.content_hash().unwrap(), vb.content_hash().unwrap());
    }

    #[test]
    fn test_parse_literal() {
        assert_eq!(Value::parse_literal("42").unwrap(), Value::Int(42));
        assert_eq!(
            Value::parse_literal("'hi'").unwrap(),
            Value::Text("hi".to_string())
        );
        assert_eq!(Value::parse_literal("NULL").unwrap(), Value::Null);
        assert!(Value::parse_literal("not a literal").is_err());
    }
}
