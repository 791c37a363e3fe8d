// Stem-net: Dandelion++ stem routing and anonymity-network address types
// Written in 2019-2024 by the project contributors
//
// To the extent possible under law, the author(s) have dedicated all
// copyright and related and neighboring rights to this software to
// the public domain worldwide. This software is distributed without
// any warranty.
//
// You should have received a copy of the MIT License
// along with this software.
// If not, see <https://opensource.org/licenses/MIT>.

//! The Dandelion++ connection map: a stable, balanced mapping from inbound
//! source identifiers to outbound stem peer identifiers that survives
//! peer-set churn without stealing already-bound sources back.
//!
//! **Not internally synchronized.** `ConnectionMap` holds no interior
//! mutability and performs no locking of its own; concurrent calls on the
//! same instance from multiple threads are undefined behavior (mutation
//! races on `stems`/`sources`). Callers are expected to hold a single lock
//! around the map, matching §5 of the design: a partial `update` observed
//! concurrently with `get_stem` could otherwise hand out a departing peer.

use std::collections::HashMap;
use std::hash::Hash;

/// A stem slot: either live with a peer, or a hole left by a dropped peer
/// waiting for a replacement.
type Slot<P> = Option<P>;

/// A stable, balanced mapping from inbound sources to outbound stem peers.
///
/// `P` is the peer-identifier type occupying stem slots; `S` is the
/// source-identifier type bound to them. Neither is fixed by this crate —
/// the transport instantiates the map with whatever handles it already uses
/// for outbound connections and inbound connections respectively. This
/// crate's own [`crate::net::NetAddr`] is a natural choice for `P`, but the
/// map does not require it.
#[derive(Clone, Debug)]
pub struct ConnectionMap<P, S>
where
    P: Clone + Eq + Hash,
    S: Clone + Eq + Hash,
{
    target: usize,
    stems: Vec<Slot<P>>,
    sources: HashMap<S, usize>,
}

impl<P, S> ConnectionMap<P, S>
where
    P: Clone + Eq + Hash,
    S: Clone + Eq + Hash,
{
    /// Builds a map targeting `target` stem slots, filling as many as
    /// possible from `available` — taken in the order given, which the
    /// caller must supply already ordered by whatever priority it wants
    /// (e.g. connection recency). This implementation never sorts
    /// `available` itself; see the design notes on why silently imposing an
    /// order would be worse than documenting the precondition.
    ///
    /// If `target` is zero the map is permanently empty: `get_stem` always
    /// returns `None`, `update` always returns `false`, and `size()` is
    /// always `0`.
    pub fn new(available: &[P], target: usize) -> Self {
        let mut stems = Vec::with_capacity(target);
        for peer in available.iter().take(target) {
            stems.push(Some(peer.clone()));
        }
        stems.resize(target, None);
        ConnectionMap {
            target,
            stems,
            sources: HashMap::new(),
        }
    }

    /// The number of live (non-hole) slots. Always `<= target`.
    pub fn size(&self) -> usize {
        self.stems.iter().filter(|s| s.is_some()).count()
    }

    /// Returns the stem peer bound to `source`, assigning one if `source`
    /// has never been seen before. Returns `None` if the map is empty, or
    /// if `source`'s bound slot is currently a hole.
    pub fn get_stem(&mut self, source: &S) -> Option<P> {
        if self.stems.is_empty() {
            return None;
        }

        if let Some(&slot) = self.sources.get(source) {
            return self.stems[slot].clone();
        }

        let slot = self.least_loaded_slot()?;
        self.sources.insert(source.clone(), slot);
        self.stems[slot].clone()
    }

    /// The lowest-indexed non-hole slot with the fewest sources currently
    /// bound to it. `None` only when every slot is a hole.
    fn least_loaded_slot(&self) -> Option<usize> {
        let mut load = vec![0usize; self.stems.len()];
        for &slot in self.sources.values() {
            load[slot] += 1;
        }
        self.stems
            .iter()
            .enumerate()
            .filter(|(_, peer)| peer.is_some())
            .min_by_key(|&(idx, _)| (load[idx], idx))
            .map(|(idx, _)| idx)
    }

    /// Reconciles the slot vector against a newly-observed `available` peer
    /// set, in order:
    ///
    /// 1. Any slot whose peer is no longer in `available` becomes a hole;
    ///    sources bound to it keep their slot index and resolve to `None`
    ///    via `get_stem` until a replacement is found.
    /// 2. Each hole is filled, in slot order, from peers in `available` that
    ///    are not already occupying some other slot — never stealing a peer
    ///    away from the slot it already occupies.
    /// 3. If fewer than `target` slots are live after that and `available`
    ///    still has unassigned peers left, new slots are appended up to
    ///    `target`.
    ///
    /// `available` must be supplied in the caller's preferred fill order;
    /// this method never reorders it. Returns `true` iff any slot's peer
    /// changed.
    pub fn update(&mut self, available: &[P]) -> bool {
        if self.target == 0 {
            return false;
        }

        let mut changed = false;

        // 1. Drop departed peers.
        for slot in &mut self.stems {
            if let Some(peer) = slot {
                if !available.contains(peer) {
                    *slot = None;
                    changed = true;
                }
            }
        }

        // 2. Fill holes, never displacing a peer already occupying a slot.
        for i in 0..self.stems.len() {
            if self.stems[i].is_some() {
                continue;
            }
            if let Some(peer) = available
                .iter()
                .find(|p| !self.stems.iter().any(|s| s.as_ref() == Some(p)))
            {
                self.stems[i] = Some(peer.clone());
                changed = true;
                log::trace!(target: "stem_net::dandelion", "hole at slot {i} filled");
            }
        }

        // 3. Grow toward target.
        while self.stems.len() < self.target {
            match available
                .iter()
                .find(|p| !self.stems.iter().any(|s| s.as_ref() == Some(p)))
            {
                Some(peer) => {
                    self.stems.push(Some(peer.clone()));
                    changed = true;
                    log::trace!(
                        target: "stem_net::dandelion",
                        "grew to slot {} ({}/{})",
                        self.stems.len() - 1,
                        self.stems.len(),
                        self.target
                    );
                }
                None => break,
            }
        }

        changed
    }

    /// An independent copy with identical slot contents and sources-table
    /// contents.
    pub fn clone_map(&self) -> Self {
        self.clone()
    }

    /// Iterates the live (non-hole) slot peers in slot-index order. The
    /// iterator's length equals [`ConnectionMap::size`].
    pub fn iter(&self) -> impl Iterator<Item = &P> {
        self.stems.iter().filter_map(|s| s.as_ref())
    }
}

impl<'a, P, S> IntoIterator for &'a ConnectionMap<P, S>
where
    P: Clone + Eq + Hash,
    S: Clone + Eq + Hash,
{
    type Item = &'a P;
    type IntoIter = Box<dyn Iterator<Item = &'a P> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Map = ConnectionMap<u32, u32>;

    #[test]
    fn empty_map_is_a_total_no_op() {
        let mut map: Map = ConnectionMap::new(&[1, 2, 3], 0);
        assert_eq!(map.size(), 0);
        assert_eq!(map.get_stem(&1), None);
        assert_eq!(map.update(&[4, 5, 6]), false);
        assert_eq!(map.size(), 0);
    }

    #[test]
    fn construction_fills_min_n_available() {
        let map: Map = ConnectionMap::new(&[10, 20], 5);
        assert_eq!(map.size(), 2);
        assert_eq!(map.iter().copied().collect::<Vec<_>>(), vec![10, 20]);
    }

    #[test]
    fn scenario_4_nine_sources_three_slots_six_peers() {
        let mut map: Map = ConnectionMap::new(&[1, 2, 3, 4, 5, 6], 3);
        let mut counts = HashMap::new();
        for source in 0..9u32 {
            let peer = map.get_stem(&source).unwrap();
            *counts.entry(peer).or_insert(0u32) += 1;
        }
        assert_eq!(map.size(), 3);
        assert_eq!(counts.len(), 3);
        assert!(counts.values().all(|&c| c == 3));
    }

    #[test]
    fn get_stem_is_stable_without_update() {
        let mut map: Map = ConnectionMap::new(&[1, 2, 3], 3);
        let first = map.get_stem(&42);
        let second = map.get_stem(&42);
        assert_eq!(first, second);
    }

    #[test]
    fn scenario_5_drop_one_of_six_peers() {
        let mut map: Map = ConnectionMap::new(&[1, 2, 3, 4, 5, 6], 3);
        let mut bound = vec![];
        for source in 0..9u32 {
            bound.push((source, map.get_stem(&source).unwrap()));
        }
        let dropped_peer = map.iter().nth(1).copied().unwrap();
        let sources_on_dropped: Vec<u32> = bound
            .iter()
            .filter(|(_, p)| *p == dropped_peer)
            .map(|(s, _)| *s)
            .collect();
        assert_eq!(sources_on_dropped.len(), 3);

        let remaining: Vec<u32> = [1, 2, 3, 4, 5, 6]
            .into_iter()
            .filter(|p| *p != dropped_peer)
            .collect();
        assert_eq!(map.update(&remaining), true);
        assert_eq!(map.size(), 3);

        let new_peer = map.iter().nth(1).copied().unwrap();
        assert_ne!(new_peer, dropped_peer);
        for source in &sources_on_dropped {
            assert_eq!(map.get_stem(source), Some(new_peer));
        }
        for (source, peer) in &bound {
            if !sources_on_dropped.contains(source) {
                assert_eq!(map.get_stem(source), Some(*peer));
            }
        }
    }

    #[test]
    fn scenario_6_drop_all_then_restore_disjoint() {
        let mut map: Map = ConnectionMap::new(&[1, 2, 3, 4, 5, 6], 3);
        let sources: Vec<u32> = (0..9).collect();
        for source in &sources {
            map.get_stem(source);
        }

        assert_eq!(map.update(&[]), true);
        assert_eq!(map.size(), 0);
        for source in &sources {
            assert_eq!(map.get_stem(source), None);
        }

        let fresh: Vec<u32> = (100..130).collect();
        assert_eq!(map.update(&fresh), true);
        assert_eq!(map.size(), 3);

        let mut counts = HashMap::new();
        for source in &sources {
            let peer = map.get_stem(source).unwrap();
            assert!(fresh.contains(&peer));
            *counts.entry(peer).or_insert(0u32) += 1;
        }
        assert_eq!(counts.len(), 3);
        assert!(counts.values().all(|&c| c == 3));

        // Stable across further calls.
        for source in &sources {
            let first = map.get_stem(source);
            let second = map.get_stem(source);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn update_is_idempotent_when_unchanged() {
        let mut map: Map = ConnectionMap::new(&[1, 2, 3], 3);
        assert_eq!(map.update(&[1, 2, 3]), false);
        assert_eq!(map.update(&[1, 2, 3]), false);
    }

    #[test]
    fn update_never_steals_a_live_peer() {
        let mut map: Map = ConnectionMap::new(&[1, 2], 3);
        assert_eq!(map.iter().copied().collect::<Vec<_>>(), vec![1, 2]);
        // 1 is already available and occupying slot 0; it must not also be
        // chosen to fill the hole at slot 2.
        assert_eq!(map.update(&[1, 2, 1]), true);
        assert_eq!(map.size(), 2);
    }

    #[test]
    fn clone_iterates_identically() {
        let mut map: Map = ConnectionMap::new(&[1, 2, 3], 3);
        map.get_stem(&7);
        map.update(&[1, 3]);
        let cloned = map.clone_map();
        assert_eq!(
            map.iter().collect::<Vec<_>>(),
            cloned.iter().collect::<Vec<_>>()
        );
    }

    #[test]
    fn grows_toward_target_as_peers_appear() {
        let mut map: Map = ConnectionMap::new(&[1], 3);
        assert_eq!(map.size(), 1);
        assert_eq!(map.update(&[1, 2, 3, 4]), true);
        assert_eq!(map.size(), 3);
    }
}
