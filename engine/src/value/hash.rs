use crate::error::{CResult, Error};
use serde_derive::{Deserialize, Serialize};
use std::collections::HashMap;

const HEADER: i64 = 16;
const PER_ENTRY: i64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct HashValue {
    fields: HashMap<Vec<u8>, Vec<u8>>,
}

impl HashValue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns 1 if `field` was newly created, 0 if it overwrote an
    /// existing value.
    pub fn set(&mut self, field: Vec<u8>, value: Vec<u8>) -> i64 {
        if self.fields.insert(field, value).is_none() { 1 } else { 0 }
    }

    pub fn set_nx(&mut self, field: Vec<u8>, value: Vec<u8>) -> bool {
        if self.fields.contains_key(&field) {
            false
        } else {
            self.fields.insert(field, value);
            true
        }
    }

    pub fn get(&self, field: &[u8]) -> Option<&[u8]> {
        self.fields.get(field).map(|v| v.as_slice())
    }

    /// Returns how many of the given fields were actually present and
    /// removed.
    pub fn remove(&mut self, fields: &[Vec<u8>]) -> i64 {
        let mut removed = 0;
        for f in fields {
            if self.fields.remove(f).is_some() {
                removed += 1;
            }
        }
        removed
    }

    pub fn exists(&self, field: &[u8]) -> bool {
        self.fields.contains_key(field)
    }

    pub fn len(&self) -> i64 {
        self.fields.len() as i64
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get_all(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.fields.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.fields.keys().cloned().collect()
    }

    pub fn values(&self) -> Vec<Vec<u8>> {
        self.fields.values().cloned().collect()
    }

    /// Creates the field with 0 if absent; fails `WrongType` if the
    /// existing value isn't a parseable integer.
    pub fn incr_by(&mut self, field: &[u8], delta: i64) -> CResult<i64> {
        let cur = match self.fields.get(field) {
            None => 0,
            Some(bytes) => std::str::from_utf8(bytes)
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .ok_or(Error::WrongType)?,
        };
        let next = cur.checked_add(delta).ok_or(Error::Overflow)?;
        self.fields.insert(field.to_vec(), next.to_string().into_bytes());
        Ok(next)
    }

    pub fn estimate_size(&self) -> i64 {
        HEADER + self.fields.len() as i64 * PER_ENTRY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_reports_field_creation() {
        let mut h = HashValue::new();
        assert_eq!(h.set(b"f".to_vec(), b"v".to_vec()), 1);
        assert_eq!(h.set(b"f".to_vec(), b"v2".to_vec()), 0);
        assert_eq!(h.get(b"f"), Some(b"v2".as_slice()));
    }

    #[test]
    fn remove_then_exists_is_false() {
        let mut h = HashValue::new();
        h.set(b"f".to_vec(), b"v".to_vec());
        assert_eq!(h.remove(&[b"f".to_vec()]), 1);
        assert!(!h.exists(b"f"));
    }

    #[test]
    fn incr_by_creates_missing_field_at_zero() {
        let mut h = HashValue::new();
        assert_eq!(h.incr_by(b"counter", 5).unwrap(), 5);
        assert_eq!(h.incr_by(b"counter", -2).unwrap(), 3);
    }

    #[test]
    fn incr_by_rejects_non_numeric_field() {
        let mut h = HashValue::new();
        h.set(b"f".to_vec(), b"not a number".to_vec());
        assert!(matches!(h.incr_by(b"f", 1), Err(Error::WrongType)));
    }
}
