//! Prolly node wire format. A node is one chunk: a leaf holds entries, an
//! internal node holds (last key, child hash) pairs. Nodes are meta chunks;
//! the hashes they reference are exactly their children.
//!
//! ```text
//! leaf:     0x00 count(u32) [klen(u32) key vlen(u32) value]*
//! internal: 0x01 count(u32) [klen(u32) last_key child_hash(20)]*
//! ```

use crate::error::{DoltError, Result};
use crate::model::hash::HASH_LEN;
use crate::model::Hash;

const LEAF_MARKER: u8 = 0x00;
const INTERNAL_MARKER: u8 = 0x01;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Leaf(Vec<(Vec<u8>, Vec<u8>)>),
    Internal(Vec<(Vec<u8>, Hash)>),
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    pub fn len(&self) -> usize {
        match self {
            Node::Leaf(entries) => entries.len(),
            Node::Internal(children) => children.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Greatest key reachable from this node
    pub fn last_key(&self) -> Option<&[u8]> {
        match self {
            Node::Leaf(entries) => entries.last().map(|(k, _)| k.as_slice()),
            Node::Internal(children) => children.last().map(|(k, _)| k.as_slice()),
        }
    }

    pub fn child_hashes(&self) -> Vec<Hash> {
        match self {
            Node::Leaf(_) => vec![],
            Node::Internal(children) => children.iter().map(|(_, h)| *h).collect(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Node::Leaf(entries) => {
                out.push(LEAF_MARKER);
                out.extend_from_slice(&(entries.len() as u32).to_be_bytes());
                for (key, value) in entries {
                    out.extend_from_slice(&(key.len() as u32).to_be_bytes());
                    out.extend_from_slice(key);
                    out.extend_from_slice(&(value.len() as u32).to_be_bytes());
                    out.extend_from_slice(value);
                }
            }
            Node::Internal(children) => {
                out.push(INTERNAL_MARKER);
                out.extend_from_slice(&(children.len() as u32).to_be_bytes());
                for (last_key, hash) in children {
                    out.extend_from_slice(&(last_key.len() as u32).to_be_bytes());
                    out.extend_from_slice(last_key);
                    out.extend_from_slice(hash.as_bytes());
                }
            }
        }
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Node> {
        let marker = *buf.first().ok_or_else(corrupt)?;
        let mut pos = 1usize;
        let count = take_u32(buf, &mut pos)?;
        match marker {
            LEAF_MARKER => {
                let mut entries = Vec::with_capacity(count);
                for _ in 0..count {
                    let klen = take_u32(buf, &mut pos)?;
                    let key = take(buf, &mut pos, klen)?.to_vec();
                    let vlen = take_u32(buf, &mut pos)?;
                    let value = take(buf, &mut pos, vlen)?.to_vec();
                    entries.push((key, value));
                }
                Ok(Node::Leaf(entries))
            }
            INTERNAL_MARKER => {
                let mut children = Vec::with_capacity(count);
                for _ in 0..count {
                    let klen = take_u32(buf, &mut pos)?;
                    let last_key = take(buf, &mut pos, klen)?.to_vec();
                    let hash = Hash(take(buf, &mut pos, HASH_LEN)?.try_into().unwrap());
                    children.push((last_key, hash));
                }
                Ok(Node::Internal(children))
            }
            _ => Err(corrupt()),
        }
    }
}

fn corrupt() -> DoltError {
    DoltError::Internal("corrupt prolly node".to_string())
}

fn take<'a>(buf: &'a [u8], pos: &mut usize, n: usize) -> Result<&'a [u8]> {
    if *pos + n > buf.len() {
        return Err(corrupt());
    }
    let slice = &buf[*pos..*pos + n];
    *pos += n;
    Ok(slice)
}

fn take_u32(buf: &[u8], pos: &mut usize) -> Result<usize> {
    Ok(u32::from_be_bytes(take(buf, pos, 4)?.try_into().unwrap()) as usize)
}
