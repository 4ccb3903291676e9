use serde_derive::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

const HEADER: i64 = 16;
const PER_MEMBER: i64 = 120;

/// `f64` wrapper giving sorted-set entries a total order. Ties on score are
/// broken by byte-lexicographic comparison of the member itself (Redis's
/// historical rule) rather than insertion order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct Score(f64);

impl PartialEq for Score {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}
impl Eq for Score {}
impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
struct Entry {
    score: Score,
    member: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SortedSetValue {
    by_rank: BTreeSet<Entry>,
    by_member: HashMap<Vec<u8>, f64>,
}

impl SortedSetValue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns 1 if `member` is new, 0 if it already existed (its score is
    /// still updated).
    pub fn add(&mut self, score: f64, member: Vec<u8>) -> i64 {
        let is_new = match self.by_member.get(&member) {
            Some(&old) => {
                self.by_rank.remove(&Entry { score: Score(old), member: member.clone() });
                false
            }
            None => true,
        };
        self.by_rank.insert(Entry { score: Score(score), member: member.clone() });
        self.by_member.insert(member, score);
        if is_new { 1 } else { 0 }
    }

    pub fn remove(&mut self, member: &[u8]) -> bool {
        match self.by_member.remove(member) {
            Some(score) => {
                self.by_rank.remove(&Entry { score: Score(score), member: member.to_vec() });
                true
            }
            None => false,
        }
    }

    pub fn score(&self, member: &[u8]) -> Option<f64> {
        self.by_member.get(member).copied()
    }

    pub fn len(&self) -> i64 {
        self.by_rank.len() as i64
    }

    pub fn is_empty(&self) -> bool {
        self.by_rank.is_empty()
    }

    pub fn rank(&self, member: &[u8]) -> Option<i64> {
        let score = *self.by_member.get(member)?;
        let target = Entry { score: Score(score), member: member.to_vec() };
        self.by_rank.iter().position(|e| *e == target).map(|p| p as i64)
    }

    pub fn rev_rank(&self, member: &[u8]) -> Option<i64> {
        let rank = self.rank(member)?;
        Some(self.by_rank.len() as i64 - 1 - rank)
    }

    fn entries_ascending(&self) -> Vec<&Entry> {
        self.by_rank.iter().collect()
    }

    pub fn range(&self, start: i64, stop: i64, with_scores: bool) -> Vec<(Vec<u8>, Option<f64>)> {
        let entries = self.entries_ascending();
        match super::normalize_range(entries.len(), start, stop) {
            Some((s, e)) => entries[s..=e]
                .iter()
                .map(|en| (en.member.clone(), with_scores.then_some(en.score.0)))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn rev_range(&self, start: i64, stop: i64, with_scores: bool) -> Vec<(Vec<u8>, Option<f64>)> {
        let mut entries = self.entries_ascending();
        entries.reverse();
        match super::normalize_range(entries.len(), start, stop) {
            Some((s, e)) => entries[s..=e]
                .iter()
                .map(|en| (en.member.clone(), with_scores.then_some(en.score.0)))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Inclusive `[min, max]` by score.
    pub fn range_by_score(&self, min: f64, max: f64, with_scores: bool) -> Vec<(Vec<u8>, Option<f64>)> {
        self.entries_ascending()
            .into_iter()
            .filter(|e| e.score.0 >= min && e.score.0 <= max)
            .map(|en| (en.member.clone(), with_scores.then_some(en.score.0)))
            .collect()
    }

    pub fn count(&self, min: f64, max: f64) -> i64 {
        self.entries_ascending().into_iter().filter(|e| e.score.0 >= min && e.score.0 <= max).count() as i64
    }

    pub fn range_by_score_with_limit(
        &self,
        min: f64,
        max: f64,
        offset: i64,
        count: i64,
        with_scores: bool,
        reverse: bool,
    ) -> Vec<(Vec<u8>, Option<f64>)> {
        let mut matched: Vec<&Entry> =
            self.entries_ascending().into_iter().filter(|e| e.score.0 >= min && e.score.0 <= max).collect();
        if reverse {
            matched.reverse();
        }
        let offset = offset.max(0) as usize;
        let iter = matched.into_iter().skip(offset);
        let limited: Vec<&Entry> =
            if count < 0 { iter.collect() } else { iter.take(count as usize).collect() };
        limited.into_iter().map(|en| (en.member.clone(), with_scores.then_some(en.score.0))).collect()
    }

    pub fn incr_by(&mut self, delta: f64, member: Vec<u8>) -> f64 {
        let base = self.by_member.get(&member).copied().unwrap_or(0.0);
        let next = base + delta;
        self.add(next, member);
        next
    }

    pub fn estimate_size(&self) -> i64 {
        HEADER + self.by_rank.len() as i64 * PER_MEMBER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_reports_new_vs_update() {
        let mut z = SortedSetValue::new();
        assert_eq!(z.add(1.0, b"a".to_vec()), 1);
        assert_eq!(z.add(2.0, b"a".to_vec()), 0);
        assert_eq!(z.score(b"a"), Some(2.0));
    }

    #[test]
    fn ties_break_lexicographically_on_member() {
        let mut z = SortedSetValue::new();
        z.add(1.0, b"b".to_vec());
        z.add(1.0, b"a".to_vec());
        z.add(1.0, b"c".to_vec());
        let members: Vec<Vec<u8>> = z.range(0, -1, false).into_iter().map(|(m, _)| m).collect();
        assert_eq!(members, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn rank_and_rev_rank_are_complementary() {
        let mut z = SortedSetValue::new();
        z.add(1.0, b"a".to_vec());
        z.add(2.0, b"b".to_vec());
        z.add(3.0, b"c".to_vec());
        assert_eq!(z.rank(b"a"), Some(0));
        assert_eq!(z.rev_rank(b"a"), Some(2));
    }

    #[test]
    fn incr_by_creates_and_accumulates() {
        let mut z = SortedSetValue::new();
        assert_eq!(z.incr_by(5.0, b"m".to_vec()), 5.0);
        assert_eq!(z.incr_by(-2.0, b"m".to_vec()), 3.0);
    }

    #[test]
    fn range_by_score_with_limit_paginates() {
        let mut z = SortedSetValue::new();
        for i in 0..10 {
            z.add(i as f64, format!("m{i}").into_bytes());
        }
        let page = z.range_by_score_with_limit(0.0, 9.0, 2, 3, false, false);
        assert_eq!(page.len(), 3);
        assert_eq!(page[0].0, b"m2".to_vec());
    }
}
