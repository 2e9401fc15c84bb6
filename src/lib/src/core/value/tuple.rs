//! Row tuples. Fields are identified by column tag, not position, so a row
//! written under an old schema stays readable after renames and reorders.

use crate::core::value::Value;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tuple {
    /// (tag, value) pairs sorted by tag
    fields: Vec<(u64, Value)>,
}

impl Tuple {
    pub fn new() -> Tuple {
        Tuple { fields: vec![] }
    }

    pub fn from_fields(mut fields: Vec<(u64, Value)>) -> Tuple {
        fields.sort_by_key(|(tag, _)| *tag);
        fields.dedup_by_key(|(tag, _)| *tag);
        Tuple { fields }
    }

    pub fn get(&self, tag: u64) -> Option<&Value> {
        self.fields
            .binary_search_by_key(&tag, |(t, _)| *t)
            .ok()
            .map(|i| &self.fields[i].1)
    }

    pub fn set(&mut self, tag: u64, value: Value) {
        match self.fields.binary_search_by_key(&tag, |(t, _)| *t) {
            Ok(i) => self.fields[i].1 = value,
            Err(i) => self.fields.insert(i, (tag, value)),
        }
    }

    pub fn remove(&mut self, tag: u64) -> Option<Value> {
        match self.fields.binary_search_by_key(&tag, |(t, _)| *t) {
            Ok(i) => Some(self.fields.remove(i).1),
            Err(_) => None,
        }
    }

    pub fn fields(&self) -> &[(u64, Value)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Keep only the given tags, in tag order. Tags the tuple does not carry
    /// are simply absent; the reader defaults them per its schema.
    pub fn project(&self, tags: &[u64]) -> Tuple {
        let fields = self
            .fields
            .iter()
            .filter(|(tag, _)| tags.contains(tag))
            .cloned()
            .collect();
        Tuple { fields }
    }
}

impl FromIterator<(u64, Value)> for Tuple {
    fn from_iter<I: IntoIterator<Item = (u64, Value)>>(iter: I) -> Tuple {
        Tuple::from_fields(iter.into_iter().collect())
    }
}
