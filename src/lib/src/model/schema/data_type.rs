//! Column data types and the MySQL-ish names they round-trip through.
//!

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Decimal { precision: u8, scale: u8 },
    Text,
    Blob,
    Timestamp,
    Json,
    Geometry,
    Unknown,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Decimal { precision, scale } => write!(f, "decimal({precision},{scale})"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

impl DataType {
    pub fn from_string(s: impl AsRef<str>) -> DataType {
        let s = s.as_ref().to_ascii_lowercase();
        if let Some(rest) = s.strip_prefix("decimal(") {
            if let Some(args) = rest.strip_suffix(')') {
                let parts: Vec<&str> = args.split(',').collect();
                if parts.len() == 2 {
                    if let (Ok(precision), Ok(scale)) =
                        (parts[0].trim().parse(), parts[1].trim().parse())
                    {
                        return DataType::Decimal { precision, scale };
                    }
                }
            }
            return DataType::Unknown;
        }
        match s.as_str() {
            "bool" | "boolean" | "tinyint(1)" => DataType::Boolean,
            "tinyint" | "i8" => DataType::Int8,
            "smallint" | "i16" => DataType::Int16,
            "int" | "integer" | "i32" => DataType::Int32,
            "bigint" | "i64" => DataType::Int64,
            "tinyint unsigned" | "u8" => DataType::UInt8,
            "smallint unsigned" | "u16" => DataType::UInt16,
            "int unsigned" | "u32" => DataType::UInt32,
            "bigint unsigned" | "u64" => DataType::UInt64,
            "float" | "f32" => DataType::Float32,
            "double" | "f64" => DataType::Float64,
            "text" | "varchar" | "char" | "str" => DataType::Text,
            "blob" | "varbinary" | "binary" => DataType::Blob,
            "timestamp" | "datetime" => DataType::Timestamp,
            "json" => DataType::Json,
            "geometry" => DataType::Geometry,
            _ => DataType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Boolean => "bool",
            DataType::Int8 => "tinyint",
            DataType::Int16 => "smallint",
            DataType::Int32 => "int",
            DataType::Int64 => "bigint",
            DataType::UInt8 => "tinyint unsigned",
            DataType::UInt16 => "smallint unsigned",
            DataType::UInt32 => "int unsigned",
            DataType::UInt64 => "bigint unsigned",
            DataType::Float32 => "float",
            DataType::Float64 => "double",
            DataType::Decimal { .. } => "decimal",
            DataType::Text => "text",
            DataType::Blob => "blob",
            DataType::Timestamp => "timestamp",
            DataType::Json => "json",
            DataType::Geometry => "geometry",
            DataType::Unknown => "?",
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::UInt8
                | DataType::UInt16
                | DataType::UInt32
                | DataType::UInt64
        )
    }

    /// A type change is compatible when every value of `self` is a value of
    /// `other` under the same encoding: integer or float widening in the same
    /// signedness, or text/blob growing. Anything else rewrites the table.
    pub fn widens_to(&self, other: &DataType) -> bool {
        use DataType::*;
        if self == other {
            return true;
        }
        matches!(
            (self, other),
            (Int8, Int16 | Int32 | Int64)
                | (Int16, Int32 | Int64)
                | (Int32, Int64)
                | (UInt8, UInt16 | UInt32 | UInt64)
                | (UInt16, UInt32 | UInt64)
                | (UInt32, UInt64)
                | (Float32, Float64)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_string_round_trip() {
        for s in ["int", "bigint", "text", "timestamp", "json", "bool"] {
            let dtype = DataType::from_string(s);
            assert_ne!(dtype, DataType::Unknown, "{s}");
            assert_eq!(DataType::from_string(dtype.as_str()), dtype);
        }
    }

    #[test]
    fn test_decimal_parse() {
        assert_eq!(
            DataType::from_string("decimal(10,2)"),
            DataType::Decimal {
                precision: 10,
                scale: 2
            }
        );
    }

    #[test]
    fn test_widening() {
        assert!(DataType::Int32.widens_to(&DataType::Int64));
        assert!(!DataType::Int64.widens_to(&DataType::Int32));
        assert!(!DataType::Int32.widens_to(&DataType::UInt64));
    }
}
