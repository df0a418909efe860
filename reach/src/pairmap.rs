// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! A table to store data for a pair of endpoints.
//!
//! Connectivity is computed for unordered pairs: the analysis of `a -> b` needs the
//! analysis of `b -> a` to decide which TCP connections have a return path. The table
//! stores one entry per pair holding the data of both directions, reachable from
//! either (east, west) or (west, east) without duplicating it.
//!
//!    (key)
//! ┌────────────┐
//! │(east, west)┼────────┐
//! └────────────┘        │  ┌────────────┬────────────┐
//!                       └──► east->west │ west->east │
//!                        ┌─►    data    │    data    │
//! ┌────────────┐         │ └────────────┴────────────┘
//! │(west, east)┼─────────┘
//! └────────────┘
//!
//! Queries are directional: [`DirectionalPairMap::ordered_get`] for (src, dst)
//! returns the data of `src -> dst` first. Pairs with east == west are rejected.

use ahash::RandomState;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Index of an endpoint in a connectivity analysis
pub type EndpointId = usize;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PairMapError {
    #[error("Can't store a pair with identical ends ({0})")]
    IdenticalEnds(EndpointId),
    #[error("Pair ({0}, {1}) already exists")]
    PairExists(EndpointId, EndpointId),
}

/// The data of both directions between two endpoints
#[derive(Debug, Clone, PartialEq)]
pub struct PairEntry<D> {
    east: EndpointId,
    west: EndpointId,
    /// data for east -> west
    east_data: D,
    /// data for west -> east
    west_data: D,
}

impl<D> PairEntry<D> {
    #[must_use]
    pub fn new(east: EndpointId, west: EndpointId, east_data: D, west_data: D) -> Self {
        Self {
            east,
            west,
            east_data,
            west_data,
        }
    }
    #[must_use]
    pub fn ends(&self) -> (EndpointId, EndpointId) {
        (self.east, self.west)
    }
    /// The data of the direction leaving `from`
    fn data_from(&self, from: EndpointId) -> Option<&D> {
        if from == self.east {
            Some(&self.east_data)
        } else if from == self.west {
            Some(&self.west_data)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct DirectionalPairMap<D>(HashMap<(EndpointId, EndpointId), Arc<PairEntry<D>>, RandomState>);

impl<D> Default for DirectionalPairMap<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> DirectionalPairMap<D> {
    #[must_use]
    pub fn new() -> Self {
        Self(HashMap::with_hasher(RandomState::with_seed(0)))
    }
    pub fn add(&mut self, entry: PairEntry<D>) -> Result<(), PairMapError> {
        let (east, west) = entry.ends();
        if east == west {
            return Err(PairMapError::IdenticalEnds(east));
        }
        if self.0.contains_key(&(east, west)) {
            return Err(PairMapError::PairExists(east, west));
        }
        let entry = Arc::new(entry);
        self.0.insert((east, west), entry.clone());
        self.0.insert((west, east), entry);
        Ok(())
    }
    /// Get the entry of a pair, in whichever order it was stored
    #[must_use]
    pub fn get(&self, east: EndpointId, west: EndpointId) -> Option<&PairEntry<D>> {
        self.0.get(&(east, west)).map(AsRef::as_ref)
    }
    /// The data of `src -> dst` and of `dst -> src`
    #[must_use]
    pub fn ordered_get(&self, src: EndpointId, dst: EndpointId) -> Option<(&D, &D)> {
        let entry = self.0.get(&(src, dst))?;
        Some((entry.data_from(src)?, entry.data_from(dst)?))
    }
    /// Number of pairs
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len() / 2
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_directional_access() {
        let mut map = DirectionalPairMap::new();
        map.add(PairEntry::new(3, 7, "3->7", "7->3"))
            .expect("New pair");
        assert_eq!(map.len(), 1);
        assert_eq!(map.ordered_get(3, 7), Some((&"3->7", &"7->3")));
        assert_eq!(map.ordered_get(7, 3), Some((&"7->3", &"3->7")));
        assert!(std::ptr::eq(
            map.get(3, 7).expect("Stored"),
            map.get(7, 3).expect("Stored")
        ));
        assert_eq!(map.ordered_get(3, 4), None);
    }

    #[test]
    fn test_rejected_pairs() {
        let mut map = DirectionalPairMap::new();
        assert_eq!(
            map.add(PairEntry::new(1, 1, (), ())),
            Err(PairMapError::IdenticalEnds(1))
        );
        map.add(PairEntry::new(1, 2, (), ())).expect("New pair");
        assert_eq!(
            map.add(PairEntry::new(2, 1, (), ())),
            Err(PairMapError::PairExists(2, 1))
        );
        assert!(!map.is_empty());
    }
}
