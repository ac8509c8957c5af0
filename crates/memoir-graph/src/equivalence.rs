//! The equivalence structure: a disjoint-set over placeholder aliases.
//!
//! Every alias ever registered resolves, in bounded steps, to exactly one
//! canonical identity id. Merges are monotonic: there is no split operation,
//! and rerunning the same merges is a no-op.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use memoir_core::types::{Alias, IdentityId};

/// Disjoint-set over aliases with union by rank.
///
/// Paths are compressed during `merge`; `resolve` walks parent links
/// read-only (tree height is bounded by the rank invariant, so lookups stay
/// logarithmic even without compressing on read).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EquivalenceSet {
    /// Alias to slot. BTreeMap keeps serialization deterministic.
    index: BTreeMap<Alias, usize>,
    aliases: Vec<Alias>,
    parent: Vec<usize>,
    rank: Vec<u8>,
    /// Canonical identity id, meaningful on root slots only.
    canonical: Vec<Option<IdentityId>>,
}

impl EquivalenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// Register `alias` as pointing at `id`. Re-registering an existing
    /// alias rebinds its set's canonical id.
    pub fn insert(&mut self, alias: Alias, id: IdentityId) {
        match self.index.get(&alias) {
            Some(&slot) => {
                let root = self.find(slot);
                self.canonical[root] = Some(id);
            }
            None => {
                let slot = self.aliases.len();
                self.index.insert(alias.clone(), slot);
                self.aliases.push(alias);
                self.parent.push(slot);
                self.rank.push(0);
                self.canonical.push(Some(id));
            }
        }
    }

    /// The canonical identity id for `alias`, or `None` for an alias that
    /// was never registered (an unresolved placeholder).
    pub fn resolve(&self, alias: &Alias) -> Option<IdentityId> {
        let &slot = self.index.get(alias)?;
        self.canonical[self.find(slot)]
    }

    /// Merge the sets of two aliases. The smaller (older) canonical id wins.
    ///
    /// Returns `(winner, loser)` when two distinct canonical ids were
    /// actually unified, `None` when the aliases already shared a canonical
    /// id or either alias is unknown.
    pub fn merge(&mut self, a: &Alias, b: &Alias) -> Option<(IdentityId, IdentityId)> {
        let &slot_a = self.index.get(a)?;
        let &slot_b = self.index.get(b)?;
        let root_a = self.find_compress(slot_a);
        let root_b = self.find_compress(slot_b);
        if root_a == root_b {
            return None;
        }

        let id_a = self.canonical[root_a]?;
        let id_b = self.canonical[root_b]?;
        let (winner, loser) = if id_a <= id_b { (id_a, id_b) } else { (id_b, id_a) };

        // Union by rank; the surviving root carries the winning id.
        let (new_root, old_root) = if self.rank[root_a] >= self.rank[root_b] {
            (root_a, root_b)
        } else {
            (root_b, root_a)
        };
        self.parent[old_root] = new_root;
        if self.rank[root_a] == self.rank[root_b] {
            self.rank[new_root] += 1;
        }
        self.canonical[new_root] = Some(winner);
        self.canonical[old_root] = None;

        if winner == loser {
            None
        } else {
            Some((winner, loser))
        }
    }

    /// Rebind every set currently resolving to `from` so it resolves to
    /// `to`. Used when identities are merged by id rather than by alias.
    pub fn redirect(&mut self, from: IdentityId, to: IdentityId) {
        for slot in 0..self.canonical.len() {
            if self.canonical[slot] == Some(from) {
                self.canonical[slot] = Some(to);
            }
        }
    }

    /// The full alias-to-canonical mapping, for snapshots and idempotence
    /// checks. Deterministically ordered by alias.
    pub fn canonical_map(&self) -> BTreeMap<Alias, IdentityId> {
        let mut map = BTreeMap::new();
        for (alias, &slot) in &self.index {
            if let Some(id) = self.canonical[self.find(slot)] {
                map.insert(alias.clone(), id);
            }
        }
        map
    }

    /// All registered aliases, in registration order.
    pub fn aliases(&self) -> impl Iterator<Item = &Alias> {
        self.aliases.iter()
    }

    fn find(&self, mut slot: usize) -> usize {
        while self.parent[slot] != slot {
            slot = self.parent[slot];
        }
        slot
    }

    fn find_compress(&mut self, mut slot: usize) -> usize {
        let root = self.find(slot);
        while self.parent[slot] != root {
            let next = self.parent[slot];
            self.parent[slot] = root;
            slot = next;
        }
        root
    }
}
