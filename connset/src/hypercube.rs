// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Canonical unions of N-dimensional hyper-rectangles.
//!
//! A set of dimension N maps disjoint axis-0 interval sets to sets of dimension N-1.
//! Dimension 0 is the unit marker that terminates the recursion. After every
//! operation, keys whose sub-cubes are equal are merged, so no two keys of a
//! layer map to equal sub-cubes. Since the sub-cubes are themselves canonical,
//! structural equality is semantic equality, and sets are ordered by value so they
//! can be grouped through an ordered map.

use crate::errors::AnalysisError;
use lpm::IntervalSet;
use std::collections::BTreeMap;
use std::fmt::Display;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HypercubeSet {
    dimensions: usize,
    layers: BTreeMap<IntervalSet, HypercubeSet>,
}

impl HypercubeSet {
    /// Create an empty set of the given dimension. Dimension 0 is the unit marker.
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            layers: BTreeMap::new(),
        }
    }
    fn unit() -> Self {
        Self::new(0)
    }
    /// Build the set holding the single cube whose axes are `cube`. If any axis
    /// is empty the set is empty.
    #[must_use]
    pub fn from_cube(cube: &[IntervalSet]) -> Self {
        let mut set = Self::new(cube.len());
        if let Some((first, rest)) = cube.split_first()
            && !cube.iter().any(IntervalSet::is_empty)
        {
            set.layers.insert(first.clone(), Self::from_cube(rest));
        }
        set
    }
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dimensions > 0 && self.layers.is_empty()
    }
    pub fn layers(&self) -> impl Iterator<Item = (&IntervalSet, &HypercubeSet)> {
        self.layers.iter()
    }

    /// Group entries by sub-cube and merge their keys. Empty keys and empty
    /// sub-cubes are dropped. Keys of `entries` must be pairwise disjoint.
    fn canonical(dimensions: usize, entries: Vec<(IntervalSet, HypercubeSet)>) -> Self {
        let mut by_value: BTreeMap<HypercubeSet, IntervalSet> = BTreeMap::new();
        for (key, value) in entries {
            if key.is_empty() || value.is_empty() {
                continue;
            }
            by_value.entry(value).or_default().add(&key);
        }
        Self {
            dimensions,
            layers: by_value.into_iter().map(|(v, k)| (k, v)).collect(),
        }
    }

    fn check(&self, other: &Self) -> Result<(), AnalysisError> {
        if self.dimensions == other.dimensions {
            Ok(())
        } else {
            Err(AnalysisError::DimensionMismatch(
                self.dimensions,
                other.dimensions,
            ))
        }
    }

    pub(crate) fn union_unchecked(&self, other: &Self) -> Self {
        if self.dimensions == 0 {
            return Self::unit();
        }
        let mut entries = Vec::new();
        let mut other_left: Vec<IntervalSet> = other.layers.keys().cloned().collect();
        for (k1, v1) in &self.layers {
            let mut left = k1.clone();
            for ((k2, v2), k2_left) in other.layers.iter().zip(other_left.iter_mut()) {
                let common = k1.intersection(k2);
                if common.is_empty() {
                    continue;
                }
                left = left.subtract(&common);
                *k2_left = k2_left.subtract(&common);
                entries.push((common, v1.union_unchecked(v2)));
            }
            entries.push((left, v1.clone()));
        }
        for ((_, v2), left) in other.layers.iter().zip(other_left) {
            entries.push((left, v2.clone()));
        }
        Self::canonical(self.dimensions, entries)
    }

    pub(crate) fn intersection_unchecked(&self, other: &Self) -> Self {
        if self.dimensions == 0 {
            return Self::unit();
        }
        let mut entries = Vec::new();
        for (k1, v1) in &self.layers {
            for (k2, v2) in &other.layers {
                let common = k1.intersection(k2);
                if !common.is_empty() {
                    entries.push((common, v1.intersection_unchecked(v2)));
                }
            }
        }
        Self::canonical(self.dimensions, entries)
    }

    pub(crate) fn subtract_unchecked(&self, other: &Self) -> Self {
        if self.dimensions == 0 {
            return Self::unit();
        }
        let mut entries = Vec::new();
        for (k1, v1) in &self.layers {
            let mut left = k1.clone();
            for (k2, v2) in &other.layers {
                let common = k1.intersection(k2);
                if common.is_empty() {
                    continue;
                }
                left = left.subtract(&common);
                // at the last axis the overlapping slice is removed entirely
                if self.dimensions > 1 {
                    entries.push((common, v1.subtract_unchecked(v2)));
                }
            }
            entries.push((left, v1.clone()));
        }
        Self::canonical(self.dimensions, entries)
    }

    pub(crate) fn is_subset_unchecked(&self, other: &Self) -> bool {
        if self.dimensions == 0 {
            return true;
        }
        for (k1, v1) in &self.layers {
            let mut covered = IntervalSet::new();
            for (k2, v2) in &other.layers {
                let common = k1.intersection(k2);
                if common.is_empty() {
                    continue;
                }
                if !v1.is_subset_unchecked(v2) {
                    return false;
                }
                covered.add(&common);
            }
            if !k1.is_subset(&covered) {
                return false;
            }
        }
        true
    }

    pub fn union(&self, other: &Self) -> Result<Self, AnalysisError> {
        self.check(other)?;
        Ok(self.union_unchecked(other))
    }
    pub fn intersection(&self, other: &Self) -> Result<Self, AnalysisError> {
        self.check(other)?;
        Ok(self.intersection_unchecked(other))
    }
    pub fn subtract(&self, other: &Self) -> Result<Self, AnalysisError> {
        self.check(other)?;
        Ok(self.subtract_unchecked(other))
    }
    /// Tell if this set is contained in `other`
    pub fn is_subset(&self, other: &Self) -> Result<bool, AnalysisError> {
        self.check(other)?;
        Ok(self.is_subset_unchecked(other))
    }

    /// Tell if the point, given as one coordinate per axis, is in the set
    #[must_use]
    pub fn contains(&self, point: &[i64]) -> bool {
        if point.len() != self.dimensions {
            return false;
        }
        match point.split_first() {
            None => true,
            Some((first, rest)) => self
                .layers
                .iter()
                .find(|(k, _)| k.contains(*first))
                .is_some_and(|(_, v)| v.contains(rest)),
        }
    }

    /// Enumerate the cubes of the set: lists of per-axis interval sets whose
    /// cartesian products partition the set
    #[must_use]
    pub fn cubes(&self) -> Vec<Vec<IntervalSet>> {
        if self.dimensions == 0 {
            return vec![vec![]];
        }
        let mut cubes = Vec::new();
        for (key, value) in &self.layers {
            for sub in value.cubes() {
                let mut cube = Vec::with_capacity(self.dimensions);
                cube.push(key.clone());
                cube.extend(sub);
                cubes.push(cube);
            }
        }
        cubes
    }

    /// Verify that no two keys of any layer map to equal sub-cubes and that keys
    /// of a layer are disjoint
    pub fn check_canonical(&self) -> Result<(), AnalysisError> {
        let layers: Vec<_> = self.layers.iter().collect();
        for (i, (k1, v1)) in layers.iter().enumerate() {
            for (k2, v2) in &layers[i + 1..] {
                if v1 == v2 {
                    return Err(AnalysisError::InvariantViolation(format!(
                        "keys {k1} and {k2} map to the same sub-cube"
                    )));
                }
                if k1.overlaps(k2) {
                    return Err(AnalysisError::InvariantViolation(format!(
                        "keys {k1} and {k2} overlap"
                    )));
                }
            }
            v1.check_canonical()?;
        }
        Ok(())
    }
}

impl Display for HypercubeSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cubes: Vec<String> = self
            .cubes()
            .iter()
            .map(|cube| {
                let axes: Vec<String> = cube.iter().map(ToString::to_string).collect();
                format!("({})", axes.join(", "))
            })
            .collect();
        write!(f, "{}", cubes.join("; "))
    }
}
