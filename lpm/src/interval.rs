// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Closed integer intervals and canonically reduced interval sets.

use serde::Serialize;
use std::fmt::Display;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntervalError {
    #[error("Invalid interval: start {0} is greater than end {1}")]
    Inverted(i64, i64),
}

/// A closed interval `[start, end]`. An interval is never empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Interval {
    start: i64,
    end: i64,
}

impl Interval {
    /// Build the interval `[start, end]`
    ///
    /// # Errors
    ///
    /// Fails if `start > end`.
    pub fn new(start: i64, end: i64) -> Result<Self, IntervalError> {
        if start > end {
            return Err(IntervalError::Inverted(start, end));
        }
        Ok(Self { start, end })
    }
    /// Build the single-point interval `[value, value]`
    #[must_use]
    pub const fn point(value: i64) -> Self {
        Self {
            start: value,
            end: value,
        }
    }
    /// `[self.start, end]`, with `end` clamped so that the interval is never inverted
    #[must_use]
    pub(crate) const fn span_to(self, end: i64) -> Interval {
        Interval {
            start: self.start,
            end: if end < self.start { self.start } else { end },
        }
    }
    #[must_use]
    pub const fn start(&self) -> i64 {
        self.start
    }
    #[must_use]
    pub const fn end(&self) -> i64 {
        self.end
    }
    /// Number of integers in the interval
    #[must_use]
    pub fn size(&self) -> u128 {
        (i128::from(self.end) - i128::from(self.start) + 1).unsigned_abs()
    }
    #[must_use]
    pub const fn contains(&self, value: i64) -> bool {
        self.start <= value && value <= self.end
    }
    #[must_use]
    pub const fn is_subset(&self, other: &Interval) -> bool {
        other.start <= self.start && self.end <= other.end
    }
    #[must_use]
    pub const fn overlaps(&self, other: &Interval) -> bool {
        self.start <= other.end && other.start <= self.end
    }
    #[must_use]
    pub fn intersection(&self, other: &Interval) -> Option<Interval> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start <= end).then_some(Interval { start, end })
    }
}

impl Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// A union of closed intervals, kept sorted by start with no two intervals
/// overlapping or adjacent. Equality is therefore structural.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct IntervalSet {
    intervals: Vec<Interval>,
}

impl IntervalSet {
    /// Create an empty set
    #[must_use]
    pub const fn new() -> Self {
        Self {
            intervals: Vec::new(),
        }
    }
    #[must_use]
    pub fn from_interval(interval: Interval) -> Self {
        Self {
            intervals: vec![interval],
        }
    }
    /// Build the set holding the single interval `[start, end]`
    pub fn from_range(start: i64, end: i64) -> Result<Self, IntervalError> {
        Ok(Self::from_interval(Interval::new(start, end)?))
    }
    /// The set `[start, end]`, empty when `start > end`
    #[must_use]
    pub fn from_bounds(start: i64, end: i64) -> Self {
        Interval::new(start, end)
            .map(Self::from_interval)
            .unwrap_or_default()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
    #[must_use]
    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }
    pub fn iter(&self) -> std::slice::Iter<'_, Interval> {
        self.intervals.iter()
    }
    #[must_use]
    pub fn min(&self) -> Option<i64> {
        self.intervals.first().map(Interval::start)
    }
    #[must_use]
    pub fn max(&self) -> Option<i64> {
        self.intervals.last().map(Interval::end)
    }
    /// Number of integers in the set
    #[must_use]
    pub fn size(&self) -> u128 {
        self.intervals.iter().map(Interval::size).sum()
    }
    #[must_use]
    pub fn is_single_point(&self) -> bool {
        matches!(self.intervals.as_slice(), [i] if i.start == i.end)
    }

    /// Add an interval, merging it with every interval it overlaps or touches
    pub fn add_interval(&mut self, interval: Interval) {
        let lo = self
            .intervals
            .partition_point(|i| i.end.saturating_add(1) < interval.start);
        let hi = self
            .intervals
            .partition_point(|i| i.start <= interval.end.saturating_add(1));
        if lo == hi {
            self.intervals.insert(lo, interval);
            return;
        }
        let merged = Interval {
            start: interval.start.min(self.intervals[lo].start),
            end: interval.end.max(self.intervals[hi - 1].end),
        };
        self.intervals.splice(lo..hi, [merged]);
    }

    /// Add all the intervals of `other` to this set
    pub fn add(&mut self, other: &IntervalSet) {
        for interval in &other.intervals {
            self.add_interval(*interval);
        }
    }

    #[must_use]
    pub fn union(&self, other: &IntervalSet) -> IntervalSet {
        let (mut result, smaller) = if self.intervals.len() >= other.intervals.len() {
            (self.clone(), other)
        } else {
            (other.clone(), self)
        };
        result.add(smaller);
        result
    }

    #[must_use]
    pub fn intersection(&self, other: &IntervalSet) -> IntervalSet {
        let mut intervals = Vec::new();
        let (a, b) = (&self.intervals, &other.intervals);
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            if let Some(common) = a[i].intersection(&b[j]) {
                intervals.push(common);
            }
            if a[i].end < b[j].end {
                i += 1;
            } else {
                j += 1;
            }
        }
        IntervalSet { intervals }
    }

    #[must_use]
    pub fn subtract(&self, other: &IntervalSet) -> IntervalSet {
        let mut intervals = Vec::new();
        let holes = &other.intervals;
        let mut first = 0;
        for interval in &self.intervals {
            while first < holes.len() && holes[first].end < interval.start {
                first += 1;
            }
            let mut cursor = interval.start;
            let mut consumed = false;
            for hole in holes[first..].iter().take_while(|h| h.start <= interval.end) {
                if hole.start > cursor {
                    intervals.push(Interval {
                        start: cursor,
                        end: hole.start - 1,
                    });
                }
                if hole.end >= interval.end {
                    consumed = true;
                    break;
                }
                cursor = hole.end + 1;
            }
            if !consumed {
                intervals.push(Interval {
                    start: cursor,
                    end: interval.end,
                });
            }
        }
        IntervalSet { intervals }
    }

    #[must_use]
    pub fn contains(&self, value: i64) -> bool {
        let idx = self.intervals.partition_point(|i| i.end < value);
        self.intervals.get(idx).is_some_and(|i| i.start <= value)
    }

    /// Tell if every point of this set is in `other`
    #[must_use]
    pub fn is_subset(&self, other: &IntervalSet) -> bool {
        let mut j = 0;
        for interval in &self.intervals {
            while j < other.intervals.len() && other.intervals[j].end < interval.start {
                j += 1;
            }
            match other.intervals.get(j) {
                Some(container) if interval.is_subset(container) => {}
                _ => return false,
            }
        }
        true
    }

    #[must_use]
    pub fn overlaps(&self, other: &IntervalSet) -> bool {
        let (a, b) = (&self.intervals, &other.intervals);
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            if a[i].overlaps(&b[j]) {
                return true;
            }
            if a[i].end < b[j].end {
                i += 1;
            } else {
                j += 1;
            }
        }
        false
    }

    /// Split the set into one single-interval set per contiguous run
    #[must_use]
    pub fn split(&self) -> Vec<IntervalSet> {
        self.intervals
            .iter()
            .map(|i| IntervalSet::from_interval(*i))
            .collect()
    }
}

impl FromIterator<Interval> for IntervalSet {
    fn from_iter<T: IntoIterator<Item = Interval>>(iter: T) -> Self {
        let mut set = IntervalSet::new();
        for interval in iter {
            set.add_interval(interval);
        }
        set
    }
}

impl<'a> IntoIterator for &'a IntervalSet {
    type Item = &'a Interval;
    type IntoIter = std::slice::Iter<'a, Interval>;
    fn into_iter(self) -> Self::IntoIter {
        self.intervals.iter()
    }
}

impl Display for IntervalSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (n, interval) in self.intervals.iter().enumerate() {
            if n > 0 {
                write!(f, ",")?;
            }
            write!(f, "{interval}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ranges: &[(i64, i64)]) -> IntervalSet {
        ranges
            .iter()
            .map(|(s, e)| Interval::new(*s, *e).expect("Bad test interval"))
            .collect()
    }

    fn canonical(s: &IntervalSet) -> bool {
        s.intervals()
            .windows(2)
            .all(|w| w[1].start() > w[0].end() + 1)
    }

    // Points of a set drawn from a small universe, for brute-force comparison
    fn points(s: &IntervalSet) -> Vec<i64> {
        (-2..=300).filter(|v| s.contains(*v)).collect()
    }

    fn from_raw(raw: &[(u8, u8)]) -> IntervalSet {
        raw.iter()
            .map(|(a, b)| {
                let (lo, hi) = if a <= b { (*a, *b) } else { (*b, *a) };
                Interval::new(i64::from(lo), i64::from(hi)).expect("ordered")
            })
            .collect()
    }

    #[test]
    fn test_interval_new() {
        assert_eq!(Interval::new(5, 3), Err(IntervalError::Inverted(5, 3)));
        let i = Interval::new(3, 5).expect("Should succeed");
        assert_eq!(i.size(), 3);
        assert!(Interval::point(4).is_subset(&i));
        assert_eq!(i.to_string(), "3-5");
        assert_eq!(Interval::point(7).to_string(), "7");
    }

    #[test]
    fn test_add_interval_merges_adjacent() {
        let s = set(&[(1, 3), (7, 9), (4, 6)]);
        assert_eq!(s.intervals(), &[Interval::new(1, 9).expect("ok")]);

        let s = set(&[(10, 12), (1, 2), (5, 6), (3, 3)]);
        assert_eq!(s, set(&[(1, 3), (5, 6), (10, 12)]));
        assert!(canonical(&s));
    }

    #[test]
    fn test_set_operations() {
        let a = set(&[(1, 10), (20, 30)]);
        let b = set(&[(5, 25)]);
        assert_eq!(a.union(&b), set(&[(1, 30)]));
        assert_eq!(a.intersection(&b), set(&[(5, 10), (20, 25)]));
        assert_eq!(a.subtract(&b), set(&[(1, 4), (26, 30)]));
        assert_eq!(b.subtract(&a), set(&[(11, 19)]));
        assert!(a.overlaps(&b));
        assert!(!a.is_subset(&b));
        assert!(set(&[(21, 22)]).is_subset(&a));
        assert!(!set(&[(9, 21)]).is_subset(&a));
        assert!(a.contains(30));
        assert!(!a.contains(15));
        assert_eq!(a.to_string(), "1-10,20-30");
    }

    #[test]
    fn test_subtract_splits() {
        let a = set(&[(0, 100)]);
        let holes = set(&[(0, 0), (10, 20), (100, 100)]);
        assert_eq!(a.subtract(&holes), set(&[(1, 9), (21, 99)]));
        assert!(a.subtract(&a).is_empty());
    }

    #[test]
    fn test_single_point() {
        assert!(set(&[(4, 4)]).is_single_point());
        assert!(!set(&[(4, 5)]).is_single_point());
        assert!(!IntervalSet::new().is_single_point());
    }

    #[test]
    fn test_operations_match_pointwise() {
        bolero::check!()
            .with_type::<(Vec<(u8, u8)>, Vec<(u8, u8)>)>()
            .for_each(|(a, b)| {
                let (a, b) = (from_raw(a), from_raw(b));
                let (pa, pb) = (points(&a), points(&b));
                let union = a.union(&b);
                let inter = a.intersection(&b);
                let diff = a.subtract(&b);
                assert!(canonical(&union) && canonical(&inter) && canonical(&diff));
                for v in -2..=300 {
                    let (in_a, in_b) = (pa.contains(&v), pb.contains(&v));
                    assert_eq!(union.contains(v), in_a || in_b);
                    assert_eq!(inter.contains(v), in_a && in_b);
                    assert_eq!(diff.contains(v), in_a && !in_b);
                }
                assert_eq!(a.overlaps(&b), !inter.is_empty());
                assert_eq!(a.is_subset(&b), diff.is_empty());
            });
    }

    #[test]
    fn test_set_laws() {
        bolero::check!()
            .with_type::<(Vec<(u8, u8)>, Vec<(u8, u8)>, Vec<(u8, u8)>)>()
            .for_each(|(a, b, c)| {
                let (a, b, c) = (from_raw(a), from_raw(b), from_raw(c));
                // distributivity
                assert_eq!(
                    a.union(&b).intersection(&c),
                    a.intersection(&c).union(&b.intersection(&c))
                );
                assert!(a.subtract(&a).is_empty());
                assert_eq!(a.union(&b.subtract(&a)), a.union(&b));
                let sub = a.intersection(&b);
                assert_eq!(sub.union(&b), b);
                assert_eq!(sub.intersection(&b), sub);
            });
    }
}
