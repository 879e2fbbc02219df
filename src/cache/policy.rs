//! Eviction Policy
//!
//! Least-popular-first victim selection for stores that do not fit.
//! Popularity is a plain read counter that never decays; ties go to the
//! entry inserted first.

use std::collections::HashSet;

use super::id::BlockId;
use super::index::BlockIndex;

/// Victims chosen to make room for one store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionPlan {
    /// Identifiers to remove, in selection order
    pub victims: Vec<BlockId>,
    /// Arena bytes released by removing them
    pub freed: usize,
}

impl EvictionPlan {
    /// Number of victims
    pub fn len(&self) -> usize {
        self.victims.len()
    }

    /// Check if nothing needs evicting
    pub fn is_empty(&self) -> bool {
        self.victims.is_empty()
    }
}

/// Eviction policy configuration
#[derive(Debug, Clone)]
pub struct EvictionPolicy {
    /// Name of the policy
    pub name: String,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self::least_popular()
    }
}

impl EvictionPolicy {
    /// Least-popular eviction (the only policy the arena uses)
    pub fn least_popular() -> Self {
        Self {
            name: "least-popular".to_string(),
        }
    }

    /// Pick the next victim, skipping identifiers already chosen
    pub fn select_victim(&self, index: &BlockIndex, chosen: &HashSet<BlockId>) -> Option<BlockId> {
        index.least_popular(|id| chosen.contains(id))
    }

    /// Choose victims until `needed` bytes fit after compaction
    ///
    /// Every victim counts toward the goal even if it alone frees too little.
    /// Returns `None` when evicting everything would still not make room.
    pub fn plan(
        &self,
        index: &BlockIndex,
        capacity: usize,
        tail: usize,
        needed: usize,
    ) -> Option<EvictionPlan> {
        let mut chosen = HashSet::new();
        let mut plan = EvictionPlan::default();

        while capacity - (tail - plan.freed) < needed {
            let victim = self.select_victim(index, &chosen)?;
            if let Some(entry) = index.get(&victim) {
                plan.freed += entry.stored_len;
            }
            chosen.insert(victim);
            plan.victims.push(victim);
        }

        Some(plan)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::index::BlockEntry;

    fn id(name: &str) -> BlockId {
        BlockId::from_name(name)
    }

    fn index_of(entries: &[(&str, usize)]) -> BlockIndex {
        let mut index = BlockIndex::new();
        let mut offset = 0;
        for (name, len) in entries {
            index.put(id(name), BlockEntry::new(offset, *len, *len, false));
            offset += len;
        }
        index
    }

    #[test]
    fn test_policy_name() {
        let policy = EvictionPolicy::default();
        assert_eq!(policy.name, "least-popular");
    }

    #[test]
    fn test_plan_nothing_when_it_fits() {
        let index = index_of(&[("a", 4)]);
        let plan = EvictionPolicy::default().plan(&index, 8, 4, 4).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.freed, 0);
    }

    #[test]
    fn test_plan_evicts_oldest_on_tie() {
        let index = index_of(&[("a", 4), ("b", 4)]);
        let plan = EvictionPolicy::default().plan(&index, 8, 8, 2).unwrap();

        assert_eq!(plan.victims, vec![id("a")]);
        assert_eq!(plan.freed, 4);
    }

    #[test]
    fn test_plan_skips_popular_entries() {
        let mut index = index_of(&[("a", 4), ("b", 4)]);
        index.get_mut(&id("a")).unwrap().record_access();

        let plan = EvictionPolicy::default().plan(&index, 8, 8, 2).unwrap();
        assert_eq!(plan.victims, vec![id("b")]);
    }

    #[test]
    fn test_plan_continues_past_small_victims() {
        // Oldest entry is tiny; it goes first but is not enough on its own
        let index = index_of(&[("tiny", 1), ("big", 6), ("mid", 1)]);
        let plan = EvictionPolicy::default().plan(&index, 8, 8, 5).unwrap();

        assert_eq!(plan.victims, vec![id("tiny"), id("big")]);
        assert_eq!(plan.freed, 7);
    }

    #[test]
    fn test_plan_exhausted() {
        let index = index_of(&[("a", 4)]);
        assert!(EvictionPolicy::default().plan(&index, 8, 4, 9).is_none());
    }

    #[test]
    fn test_plan_evicts_everything_for_full_payload() {
        let index = index_of(&[("a", 3), ("b", 3)]);
        let plan = EvictionPolicy::default().plan(&index, 8, 6, 8).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.freed, 6);
    }
}
