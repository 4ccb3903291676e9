//! C2: the five value types plus the `Entity` wrapper the keyspace actually
//! stores. Matches the teacher's `storage/memory.rs` convention of keeping
//! each concrete type in its own small module with a `#[cfg(test)] mod
//! tests` beside it, instead of one big file.

pub mod hash;
pub mod list;
pub mod set;
pub mod sorted_set;
pub mod string;

pub use hash::HashValue;
pub use list::ListValue;
pub use set::SetValue;
pub use sorted_set::SortedSetValue;
pub use string::StringValue;

use serde_derive::{Deserialize, Serialize};

/// Tagged union over the five value variants. Every executor match is
/// exhaustive; the default arm any executor falls through to for a mismatch
/// is the `WRONGTYPE` error, never a silent coercion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    String(StringValue),
    Hash(HashValue),
    List(ListValue),
    Set(SetValue),
    SortedSet(SortedSetValue),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Hash(_) => "hash",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::SortedSet(_) => "zset",
        }
    }

    pub fn estimate_size(&self) -> i64 {
        match self {
            Value::String(v) => v.estimate_size(),
            Value::Hash(v) => v.estimate_size(),
            Value::List(v) => v.estimate_size(),
            Value::Set(v) => v.estimate_size(),
            Value::SortedSet(v) => v.estimate_size(),
        }
    }
}

/// An owned value plus its cached size estimate; the unit the keyspace and
/// memory counter actually traffic in (spec's "Entity").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    pub value: Value,
    pub estimated_size: i64,
}

impl Entity {
    pub fn new(value: Value) -> Self {
        let estimated_size = value.estimate_size();
        Self { value, estimated_size }
    }

    /// Recomputes `estimated_size` after an in-place mutation of `value`.
    pub fn refresh_size(&mut self) {
        self.estimated_size = self.value.estimate_size();
    }
}

/// Normalizes a possibly-negative Redis-style index against a collection of
/// length `len`. Returns `None` if the index is out of range even after
/// normalization.
pub fn normalize_index(len: usize, idx: i64) -> Option<usize> {
    let len = len as i64;
    let idx = if idx < 0 { len + idx } else { idx };
    if idx < 0 || idx >= len {
        None
    } else {
        Some(idx as usize)
    }
}

/// Normalizes an inclusive `[start, stop]` Redis-style range against a
/// collection of length `len`, clamping out-of-range bounds rather than
/// failing. Returns `None` for an empty result (start after stop, or an
/// empty collection).
pub fn normalize_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }
    let ilen = len as i64;
    let mut start = if start < 0 { (ilen + start).max(0) } else { start };
    let mut stop = if stop < 0 { ilen + stop } else { stop };
    if start >= ilen || stop < 0 {
        return None;
    }
    if start < 0 {
        start = 0;
    }
    if stop >= ilen {
        stop = ilen - 1;
    }
    if start > stop {
        return None;
    }
    Some((start as usize, stop as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_index_handles_negative() {
        assert_eq!(normalize_index(5, -1), Some(4));
        assert_eq!(normalize_index(5, 0), Some(0));
        assert_eq!(normalize_index(5, 5), None);
        assert_eq!(normalize_index(5, -6), None);
    }

    #[test]
    fn normalize_range_clamps() {
        assert_eq!(normalize_range(5, 0, -1), Some((0, 4)));
        assert_eq!(normalize_range(5, -100, 100), Some((0, 4)));
        assert_eq!(normalize_range(5, 3, 1), None);
        assert_eq!(normalize_range(0, 0, -1), None);
    }
}
