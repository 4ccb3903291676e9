use rand::seq::IteratorRandom;
use serde_derive::{Deserialize, Serialize};
use std::collections::HashSet;

const HEADER: i64 = 16;
const PER_MEMBER: i64 = 80;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SetValue {
    members: HashSet<Vec<u8>>,
}

impl SetValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, members: Vec<Vec<u8>>) -> i64 {
        let mut added = 0;
        for m in members {
            if self.members.insert(m) {
                added += 1;
            }
        }
        added
    }

    pub fn remove(&mut self, members: &[Vec<u8>]) -> i64 {
        let mut removed = 0;
        for m in members {
            if self.members.remove(m) {
                removed += 1;
            }
        }
        removed
    }

    pub fn is_member(&self, member: &[u8]) -> bool {
        self.members.contains(member)
    }

    pub fn members(&self) -> Vec<Vec<u8>> {
        self.members.iter().cloned().collect()
    }

    pub fn len(&self) -> i64 {
        self.members.len() as i64
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Removes and returns an arbitrary member.
    pub fn pop(&mut self) -> Option<Vec<u8>> {
        let m = self.members.iter().next().cloned()?;
        self.members.remove(&m);
        Some(m)
    }

    pub fn rand_member(&self) -> Option<Vec<u8>> {
        self.members.iter().choose(&mut rand::thread_rng()).cloned()
    }

    /// Moves `member` from `self` into `dst`. Returns whether the member was
    /// present in `self`.
    pub fn move_member(&mut self, dst: &mut SetValue, member: &[u8]) -> bool {
        if self.members.remove(member) {
            dst.members.insert(member.to_vec());
            true
        } else {
            false
        }
    }

    pub fn diff(&self, others: &[&SetValue]) -> Vec<Vec<u8>> {
        self.members
            .iter()
            .filter(|m| !others.iter().any(|o| o.members.contains(*m)))
            .cloned()
            .collect()
    }

    pub fn intersect(&self, others: &[&SetValue]) -> Vec<Vec<u8>> {
        self.members
            .iter()
            .filter(|m| others.iter().all(|o| o.members.contains(*m)))
            .cloned()
            .collect()
    }

    pub fn union(&self, others: &[&SetValue]) -> Vec<Vec<u8>> {
        let mut out: HashSet<Vec<u8>> = self.members.clone();
        for o in others {
            out.extend(o.members.iter().cloned());
        }
        out.into_iter().collect()
    }

    pub fn estimate_size(&self) -> i64 {
        HEADER + self.members.len() as i64 * PER_MEMBER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_idempotent() {
        let mut s = SetValue::new();
        assert_eq!(s.add(vec![b"m".to_vec()]), 1);
        assert_eq!(s.add(vec![b"m".to_vec()]), 0);
    }

    #[test]
    fn move_member_transfers_between_sets() {
        let mut src = SetValue::new();
        let mut dst = SetValue::new();
        src.add(vec![b"m".to_vec()]);
        assert!(src.move_member(&mut dst, b"m"));
        assert!(!src.is_member(b"m"));
        assert!(dst.is_member(b"m"));
        assert!(!src.move_member(&mut dst, b"m"));
    }

    #[test]
    fn diff_intersect_union() {
        let mut a = SetValue::new();
        a.add(vec![b"x".to_vec(), b"y".to_vec(), b"z".to_vec()]);
        let mut b = SetValue::new();
        b.add(vec![b"y".to_vec()]);

        let mut diff = a.diff(&[&b]);
        diff.sort();
        assert_eq!(diff, vec![b"x".to_vec(), b"z".to_vec()]);

        assert_eq!(a.intersect(&[&b]), vec![b"y".to_vec()]);

        let mut union = a.union(&[&b]);
        union.sort();
        assert_eq!(union, vec![b"x".to_vec(), b"y".to_vec(), b"z".to_vec()]);
    }
}
