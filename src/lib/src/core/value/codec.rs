//! The two byte codecs of the value layer.
//!
//! `encode_value`/`decode_value` is the self-describing row codec: every
//! datum carries a type code, tuples carry their field tags, and round-trip
//! encode/decode is identity.
//!
//! `encode_key_field` is the order-preserving key codec: the lexicographic
//! order of encoded bytes equals the declared value order, so prolly trees
//! compare keys with plain slice comparison. NULL placement honors the
//! column's null-order flag; a shorter tuple that is a prefix of a longer
//! one sorts first by construction.

use std::collections::BTreeMap;

use crate::core::value::{Decimal, Tuple, Value};
use crate::error::{DoltError, Result};
use crate::model::hash::HASH_LEN;
use crate::model::Hash;
use crate::model::schema::NullOrder;

// Type codes for the self-describing codec
const T_NULL: u8 = 0x00;
const T_BOOL: u8 = 0x01;
const T_INT: u8 = 0x02;
const T_UINT: u8 = 0x03;
const T_FLOAT: u8 = 0x04;
const T_DECIMAL: u8 = 0x05;
const T_TEXT: u8 = 0x06;
const T_BLOB: u8 = 0x07;
const T_TIMESTAMP: u8 = 0x08;
const T_JSON: u8 = 0x09;
const T_GEOMETRY: u8 = 0x0a;
const T_TUPLE: u8 = 0x0b;
const T_LIST: u8 = 0x0c;
const T_MAP: u8 = 0x0d;
const T_SET: u8 = 0x0e;
const T_REF: u8 = 0x0f;
const T_BLOB_REF: u8 = 0x10;

// Key codec presence markers
const K_NULL_FIRST: u8 = 0x00;
const K_PRESENT: u8 = 0x01;
const K_NULL_LAST: u8 = 0xff;

fn put_len(out: &mut Vec<u8>, len: usize) {
    out.extend_from_slice(&(len as u32).to_be_bytes());
}

fn take_len(buf: &[u8], pos: &mut usize) -> Result<usize> {
    let bytes = take(buf, pos, 4)?;
    Ok(u32::from_be_bytes(bytes.try_into().unwrap()) as usize)
}

fn take<'a>(buf: &'a [u8], pos: &mut usize, n: usize) -> Result<&'a [u8]> {
    if *pos + n > buf.len() {
        return Err(DoltError::Internal("truncated value encoding".to_string()));
    }
    let slice = &buf[*pos..*pos + n];
    *pos += n;
    Ok(slice)
}

/// Canonical float bits: one NaN, no negative zero
fn canonical_float_bits(f: f64) -> u64 {
    if f.is_nan() {
        f64::NAN.to_bits()
    } else if f == 0.0 {
        0.0f64.to_bits()
    } else {
        f.to_bits()
    }
}

pub fn encode_value(value: &Value, out: &mut Vec<u8>) -> Result<()> {
    match value {
        Value::Null => out.push(T_NULL),
        Value::Bool(b) => {
            out.push(T_BOOL);
            out.push(*b as u8);
        }
        Value::Int(i) => {
            out.push(T_INT);
            out.extend_from_slice(&i.to_be_bytes());
        }
        Value::Uint(u) => {
            out.push(T_UINT);
            out.extend_from_slice(&u.to_be_bytes());
        }
        Value::Float(f) => {
            out.push(T_FLOAT);
            out.extend_from_slice(&canonical_float_bits(*f).to_be_bytes());
        }
        Value::Decimal(d) => {
            out.push(T_DECIMAL);
            out.push(d.negative as u8);
            out.extend_from_slice(&d.scale.to_be_bytes());
            put_len(out, d.digits.len());
            out.extend_from_slice(&d.digits);
        }
        Value::Text(s) => {
            out.push(T_TEXT);
            put_len(out, s.len());
            out.extend_from_slice(s.as_bytes());
        }
        Value::Blob(b) => {
            out.push(T_BLOB);
            put_len(out, b.len());
            out.extend_from_slice(b);
        }
        Value::Timestamp(micros) => {
            out.push(T_TIMESTAMP);
            out.extend_from_slice(&micros.to_be_bytes());
        }
        Value::Json(doc) => {
            let canonical = Value::canonical_json(doc.clone());
            let text = serde_json::to_string(&canonical)?;
            out.push(T_JSON);
            put_len(out, text.len());
            out.extend_from_slice(text.as_bytes());
        }
        Value::Geometry { srid, wkb } => {
            out.push(T_GEOMETRY);
            out.extend_from_slice(&srid.to_be_bytes());
            put_len(out, wkb.len());
            out.extend_from_slice(wkb);
        }
        Value::Tuple(tuple) => {
            out.push(T_TUPLE);
            put_len(out, tuple.len());
            for (tag, value) in tuple.fields() {
                out.extend_from_slice(&tag.to_be_bytes());
                encode_value(value, out)?;
            }
        }
        Value::List(items) => {
            out.push(T_LIST);
            put_len(out, items.len());
            for item in items {
                encode_value(item, out)?;
            }
        }
        Value::Map(entries) => {
            out.push(T_MAP);
            put_len(out, entries.len());
            for (key, value) in entries.values() {
                encode_value(key, out)?;
                encode_value(value, out)?;
            }
        }
        Value::Set(items) => {
            let mut encoded: Vec<Vec<u8>> = Vec::with_capacity(items.len());
            for item in items {
                let mut buf = Vec::new();
                encode_value(item, &mut buf)?;
                encoded.push(buf);
            }
            encoded.sort();
            encoded.dedup();
            out.push(T_SET);
            put_len(out, encoded.len());
            for buf in encoded {
                out.extend_from_slice(&buf);
            }
        }
        Value::Ref(hash) => {
            out.push(T_REF);
            out.extend_from_slice(hash.as_bytes());
        }
        Value::BlobRef { hash, len } => {
            out.push(T_BLOB_REF);
            out.extend_from_slice(hash.as_bytes());
            out.extend_from_slice(&len.to_be_bytes());
        }
    }
    Ok(())
}

pub fn decode_value(buf: &[u8], pos: &mut usize) -> Result<Value> {
    let code = take(buf, pos, 1)?[0];
    let value = match code {
        T_NULL => Value::Null,
        T_BOOL => Value::Bool(take(buf, pos, 1)?[0] != 0),
        T_INT => Value::Int(i64::from_be_bytes(take(buf, pos, 8)?.try_into().unwrap())),
        T_UINT => Value::Uint(u64::from_be_bytes(take(buf, pos, 8)?.try_into().unwrap())),
        T_FLOAT => Value::Float(f64::from_bits(u64::from_be_bytes(
            take(buf, pos, 8)?.try_into().unwrap(),
        ))),
        T_DECIMAL => {
            let negative = take(buf, pos, 1)?[0] != 0;
            let scale = u32::from_be_bytes(take(buf, pos, 4)?.try_into().unwrap());
            let len = take_len(buf, pos)?;
            let digits = take(buf, pos, len)?.to_vec();
            Value::Decimal(Decimal::new(negative, scale, digits))
        }
        T_TEXT => {
            let len = take_len(buf, pos)?;
            let bytes = take(buf, pos, len)?;
            Value::Text(
                String::from_utf8(bytes.to_vec())
                    .map_err(|_| DoltError::Internal("invalid utf8 in text value".to_string()))?,
            )
        }
        T_BLOB => {
            let len = take_len(buf, pos)?;
            Value::Blob(take(buf, pos, len)?.to_vec())
        }
        T_TIMESTAMP => Value::Timestamp(i64::from_be_bytes(take(buf, pos, 8)?.try_into().unwrap())),
        T_JSON => {
            let len = take_len(buf, pos)?;
            let bytes = take(buf, pos, len)?;
            Value::Json(serde_json::from_slice(bytes)?)
        }
        T_GEOMETRY => {
            let srid = u32::from_be_bytes(take(buf, pos, 4)?.try_into().unwrap());
            let len = take_len(buf, pos)?;
            Value::Geometry {
                srid,
                wkb: take(buf, pos, len)?.to_vec(),
            }
        }
        T_TUPLE => {
            let count = take_len(buf, pos)?;
            let mut fields = Vec::with_capacity(count);
            for _ in 0..count {
                let tag = u64::from_be_bytes(take(buf, pos, 8)?.try_into().unwrap());
                let value = decode_value(buf, pos)?;
                fields.push((tag, value));
            }
            Value::Tuple(Tuple::from_fields(fields))
        }
        T_LIST => {
            let count = take_len(buf, pos)?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(decode_value(buf, pos)?);
            }
            Value::List(items)
        }
        T_MAP => {
            let count = take_len(buf, pos)?;
            let mut entries = BTreeMap::new();
            for _ in 0..count {
                let key = decode_value(buf, pos)?;
                let value = decode_value(buf, pos)?;
                let mut key_bytes = Vec::new();
                encode_value(&key, &mut key_bytes)?;
                entries.insert(key_bytes, (key, value));
            }
            Value::Map(entries)
        }
        T_SET => {
            let count = take_len(buf, pos)?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(decode_value(buf, pos)?);
            }
            Value::Set(items)
        }
        T_REF => {
            let bytes = take(buf, pos, HASH_LEN)?;
            Value::Ref(Hash(bytes.try_into().unwrap()))
        }
        T_BLOB_REF => {
            let bytes = take(buf, pos, HASH_LEN)?;
            let hash = Hash(bytes.try_into().unwrap());
            let len = u64::from_be_bytes(take(buf, pos, 8)?.try_into().unwrap());
            Value::BlobRef { hash, len }
        }
        other => {
            return Err(DoltError::Internal(format!(
                "unknown value type code 0x{other:02x}"
            )))
        }
    };
    Ok(value)
}

pub fn encode_tuple(tuple: &Tuple) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    encode_value(&Value::Tuple(tuple.clone()), &mut out)?;
    Ok(out)
}

pub fn decode_tuple(buf: &[u8]) -> Result<Tuple> {
    let mut pos = 0;
    match decode_value(buf, &mut pos)? {
        Value::Tuple(tuple) => Ok(tuple),
        other => Err(DoltError::Internal(format!(
            "expected tuple encoding, found {other:?}"
        ))),
    }
}

/// Append an order-preserving encoding of one key field.
///
/// Escaped variable-length fields (text, blob) terminate with `0x00 0x00`
/// and escape interior zero bytes as `0x00 0xff`; fixed-width fields
/// self-delimit. NaN is not a legal key; negative zero encodes as zero.
pub fn encode_key_field(value: &Value, null_order: NullOrder, out: &mut Vec<u8>) -> Result<()> {
    match value {
        Value::Null => {
            out.push(match null_order {
                NullOrder::First => K_NULL_FIRST,
                NullOrder::Last => K_NULL_LAST,
            });
            return Ok(());
        }
        _ => out.push(K_PRESENT),
    }
    match value {
        Value::Bool(b) => out.push(*b as u8),
        Value::Int(i) => out.extend_from_slice(&((*i as u64) ^ (1 << 63)).to_be_bytes()),
        Value::Uint(u) => out.extend_from_slice(&u.to_be_bytes()),
        Value::Timestamp(micros) => {
            out.extend_from_slice(&((*micros as u64) ^ (1 << 63)).to_be_bytes())
        }
        Value::Float(f) => {
            if f.is_nan() {
                return Err(DoltError::InvalidArgument(
                    "NaN is not a valid index key".to_string(),
                ));
            }
            let bits = canonical_float_bits(*f);
            let ordered = if bits & (1 << 63) != 0 {
                !bits
            } else {
                bits | (1 << 63)
            };
            out.extend_from_slice(&ordered.to_be_bytes());
        }
        Value::Decimal(d) => encode_decimal_key(d, out),
        Value::Text(s) => encode_escaped(s.as_bytes(), out),
        Value::Blob(b) => encode_escaped(b, out),
        other => {
            return Err(DoltError::InvalidArgument(format!(
                "type is not valid as an index key: {other:?}"
            )))
        }
    }
    Ok(())
}

fn encode_escaped(bytes: &[u8], out: &mut Vec<u8>) {
    for &b in bytes {
        if b == 0x00 {
            out.push(0x00);
            out.push(0xff);
        } else {
            out.push(b);
        }
    }
    out.push(0x00);
    out.push(0x00);
}

/// Order-preserving decimal key: sign class byte, then biased exponent and
/// plus-one digit bytes terminated by zero. Negative values complement the
/// magnitude bytes so larger magnitudes sort earlier.
fn encode_decimal_key(d: &Decimal, out: &mut Vec<u8>) {
    if d.is_zero() {
        out.push(0x01);
        return;
    }
    let mut digits = d.digits.clone();
    let mut exponent = digits.len() as i64 - d.scale as i64;
    while digits.first() == Some(&0) {
        digits.remove(0);
        exponent -= 1;
    }
    while digits.last() == Some(&0) {
        digits.pop();
    }
    let mut magnitude: Vec<u8> = Vec::with_capacity(digits.len() + 9);
    magnitude.extend_from_slice(&((exponent as u64) ^ (1 << 63)).to_be_bytes());
    for digit in digits {
        magnitude.push(digit + 1);
    }
    magnitude.push(0x00);
    if d.negative {
        out.push(0x00);
        out.extend(magnitude.iter().map(|b| !b));
    } else {
        out.push(0x02);
        out.extend(magnitude);
    }
}

/// Encode a full key tuple: fields in declared key-part order
pub fn encode_key(fields: &[(Value, NullOrder)]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for (value, null_order) in fields {
        encode_key_field(value, *null_order, &mut out)?;
    }
    Ok(out)
}
