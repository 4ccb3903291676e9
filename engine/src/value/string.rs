use crate::error::{CResult, Error};
use serde_derive::{Deserialize, Serialize};

const HEADER: i64 = 16;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StringValue {
    bytes: Vec<u8>,
}

impl StringValue {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn get(&self) -> &[u8] {
        &self.bytes
    }

    pub fn set(&mut self, bytes: Vec<u8>) {
        self.bytes = bytes;
    }

    pub fn append(&mut self, more: &[u8]) -> i64 {
        self.bytes.extend_from_slice(more);
        self.bytes.len() as i64
    }

    pub fn strlen(&self) -> i64 {
        self.bytes.len() as i64
    }

    /// Redis-style inclusive range with negative offsets, clamped.
    pub fn get_range(&self, start: i64, end: i64) -> Vec<u8> {
        match super::normalize_range(self.bytes.len(), start, end) {
            Some((s, e)) => self.bytes[s..=e].to_vec(),
            None => Vec::new(),
        }
    }

    fn parse_int(&self) -> CResult<i64> {
        if self.bytes.is_empty() {
            return Ok(0);
        }
        std::str::from_utf8(&self.bytes)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or(Error::InvalidInteger)
    }

    fn parse_float(&self) -> CResult<f64> {
        if self.bytes.is_empty() {
            return Ok(0.0);
        }
        std::str::from_utf8(&self.bytes)
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or(Error::InvalidFloat)
    }

    pub fn increment(&mut self, delta: i64) -> CResult<i64> {
        let cur = self.parse_int()?;
        let next = cur.checked_add(delta).ok_or(Error::Overflow)?;
        self.bytes = next.to_string().into_bytes();
        Ok(next)
    }

    /// Returns the exact bytes now stored under the key, so a caller that
    /// replies with this value can't drift from what `GET` would later
    /// return for the same float (the default `f64` `Display` impl doesn't
    /// always agree with `format_float`'s trimmed rendering).
    pub fn increment_float(&mut self, delta: f64) -> CResult<Vec<u8>> {
        let cur = self.parse_float()?;
        let next = cur + delta;
        self.bytes = format_float(next).into_bytes();
        Ok(self.bytes.clone())
    }

    pub fn estimate_size(&self) -> i64 {
        HEADER + self.bytes.len() as i64
    }
}

/// Trims trailing zeros the way Redis prints `INCRBYFLOAT` results, without
/// falling back to scientific notation for ordinary magnitudes.
fn format_float(f: f64) -> String {
    let mut s = format!("{:.17}", f);
    while s.contains('.') && (s.ends_with('0') || s.ends_with('.')) {
        let trailing_dot = s.ends_with('.');
        s.pop();
        if trailing_dot {
            break;
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_grows_and_reports_new_len() {
        let mut v = StringValue::new(b"Hello ".to_vec());
        assert_eq!(v.append(b"World"), 11);
        assert_eq!(v.get(), b"Hello World");
    }

    #[test]
    fn get_range_normalizes_negative_offsets() {
        let v = StringValue::new(b"This is a string".to_vec());
        assert_eq!(v.get_range(0, 3), b"This");
        assert_eq!(v.get_range(-3, -1), b"ing");
        assert_eq!(v.get_range(0, -1), b"This is a string");
    }

    #[test]
    fn increment_on_missing_value_starts_at_zero() {
        let mut v = StringValue::default();
        assert_eq!(v.increment(1).unwrap(), 1);
    }

    #[test]
    fn increment_rejects_non_numeric() {
        let mut v = StringValue::new(b"abc".to_vec());
        assert!(matches!(v.increment(1), Err(Error::InvalidInteger)));
    }

    #[test]
    fn increment_overflows_at_i64_max() {
        let mut v = StringValue::new(i64::MAX.to_string().into_bytes());
        assert!(matches!(v.increment(1), Err(Error::Overflow)));
    }

    #[test]
    fn increment_float_adds_and_reformats() {
        let mut v = StringValue::new(b"10.5".to_vec());
        assert_eq!(v.increment_float(0.1).unwrap(), b"10.6".to_vec());
    }

    #[test]
    fn empty_bulk_string_preserved() {
        let v = StringValue::new(Vec::new());
        assert_eq!(v.get(), b"");
        assert_eq!(v.strlen(), 0);
    }
}
