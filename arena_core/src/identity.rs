//! Identity Assigner - anonymized display names, fixed for the run.
//!
//! Agents never see each other's underlying identity or model family, only
//! `Agent-1 … Agent-N`. The mapping of identities to numbers is a seeded
//! permutation so that the order in which accounts were registered does not
//! leak through the names.

use std::collections::{HashMap, HashSet};

use arena_env::AgentId;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::ArenaError;

/// Prefix of generated display names.
pub const NAME_PREFIX: &str = "Agent-";

/// Bijective mapping between agent identities and display names.
#[derive(Debug, Clone)]
pub struct IdentityMap {
    /// Display names in presentation order
    names: Vec<String>,

    by_id: HashMap<AgentId, String>,

    /// Lower-cased display name -> (identity, canonical display name)
    by_name: HashMap<String, (AgentId, String)>,
}

impl IdentityMap {
    /// Assigns `Agent-1 … Agent-N` to the given identities using a seeded shuffle.
    pub fn assign(ids: &[AgentId], seed: u64) -> Self {
        let mut numbers: Vec<usize> = (1..=ids.len()).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        numbers.shuffle(&mut rng);

        let mut pairs: Vec<(AgentId, String)> = ids
            .iter()
            .zip(numbers)
            .map(|(id, n)| (*id, format!("{}{}", NAME_PREFIX, n)))
            .collect();
        pairs.sort_by_key(|(_, name)| name_number(name));

        Self::build(pairs)
    }

    /// Builds a map from explicit pairs, kept in the given order.
    ///
    /// Fails if two names collide case-insensitively or an identity repeats.
    pub fn from_pairs(pairs: Vec<(AgentId, String)>) -> Result<Self, ArenaError> {
        let mut seen_names = HashSet::new();
        let mut seen_ids = HashSet::new();
        for (id, name) in &pairs {
            if name.trim().is_empty() {
                return Err(ArenaError::setup("display names must be non-empty"));
            }
            if !seen_names.insert(name.to_lowercase()) {
                return Err(ArenaError::setup(format!("duplicate display name {}", name)));
            }
            if !seen_ids.insert(*id) {
                return Err(ArenaError::setup(format!("duplicate agent identity {}", id)));
            }
        }
        Ok(Self::build(pairs))
    }

    fn build(pairs: Vec<(AgentId, String)>) -> Self {
        let names = pairs.iter().map(|(_, name)| name.clone()).collect();
        let by_id = pairs.iter().map(|(id, name)| (*id, name.clone())).collect();
        let by_name = pairs
            .into_iter()
            .map(|(id, name)| (name.to_lowercase(), (id, name)))
            .collect();
        Self { names, by_id, by_name }
    }

    /// Resolves a name case-insensitively to its canonical spelling.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.by_name
            .get(&name.trim().to_lowercase())
            .map(|(_, canonical)| canonical.as_str())
    }

    pub fn id_of(&self, name: &str) -> Option<AgentId> {
        self.by_name.get(&name.trim().to_lowercase()).map(|(id, _)| *id)
    }

    pub fn name_of(&self, id: &AgentId) -> Option<&str> {
        self.by_id.get(id).map(String::as_str)
    }

    /// All display names in presentation order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

fn name_number(name: &str) -> usize {
    name.strip_prefix(NAME_PREFIX)
        .and_then(|n| n.parse().ok())
        .unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: u64) -> Vec<AgentId> {
        (0..n).map(AgentId::from_seed).collect()
    }

    #[test]
    fn test_assign_is_bijective() {
        let ids = ids(16);
        let map = IdentityMap::assign(&ids, 42);

        assert_eq!(map.len(), 16);
        for id in &ids {
            let name = map.name_of(id).unwrap();
            assert_eq!(map.id_of(name), Some(*id));
        }
        let expected: Vec<String> = (1..=16).map(|n| format!("Agent-{}", n)).collect();
        assert_eq!(map.names(), expected.as_slice());
    }

    #[test]
    fn test_assign_is_deterministic_per_seed() {
        let ids = ids(8);
        let a = IdentityMap::assign(&ids, 7);
        let b = IdentityMap::assign(&ids, 7);
        for id in &ids {
            assert_eq!(a.name_of(id), b.name_of(id));
        }
    }

    #[test]
    fn test_assign_does_not_follow_registration_order() {
        let ids = ids(16);
        let map = IdentityMap::assign(&ids, 42);
        let in_order = ids
            .iter()
            .enumerate()
            .all(|(i, id)| map.name_of(id) == Some(format!("Agent-{}", i + 1).as_str()));
        assert!(!in_order);
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let map = IdentityMap::assign(&ids(4), 1);
        assert_eq!(map.resolve("agent-3"), Some("Agent-3"));
        assert_eq!(map.resolve("  AGENT-3 "), Some("Agent-3"));
        assert_eq!(map.resolve("Agent-9"), None);
    }

    #[test]
    fn test_from_pairs_rejects_duplicates() {
        let pairs = vec![
            (AgentId::from_seed(1), "Alpha".to_string()),
            (AgentId::from_seed(2), "alpha".to_string()),
        ];
        assert!(IdentityMap::from_pairs(pairs).is_err());
    }
}
