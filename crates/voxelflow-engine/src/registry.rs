//! Registry of restore intents recorded during graph construction
//!
//! Each entry declares that the variables under a graph scope should be
//! restored from a named checkpoint, optionally remapping the scope prefix to
//! the namespace used inside the checkpoint. The registry is append-only
//! until restore time; precedence between overlapping scopes is decided by
//! [`RestoreRegistry::sorted_entries`].

use serde::{Deserialize, Serialize};

/// An intent to restore one scope's variables from a checkpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Graph namespace prefix selecting the variables
    pub scope: String,
    /// Logical checkpoint identifier, resolved through the checkpoint
    /// resolver at restore time
    pub checkpoint_id: String,
    /// Namespace prefix inside the checkpoint, substituted for `scope` when
    /// computing checkpoint-relative names
    pub checkpoint_scope: String,
}

impl RegistryEntry {
    pub fn new(
        scope: impl Into<String>,
        checkpoint_id: impl Into<String>,
        checkpoint_scope: impl Into<String>,
    ) -> Self {
        Self {
            scope: scope.into(),
            checkpoint_id: checkpoint_id.into(),
            checkpoint_scope: checkpoint_scope.into(),
        }
    }
}

/// Append-only collection of [`RegistryEntry`] values
///
/// Owned by the graph-construction context; construction code records
/// entries directly instead of writing into process-wide state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RestoreRegistry {
    entries: Vec<RegistryEntry>,
}

impl RestoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an intent to restore `scope` from `checkpoint_id`, renaming the
    /// prefix to `checkpoint_scope`
    pub fn register(
        &mut self,
        scope: impl Into<String>,
        checkpoint_id: impl Into<String>,
        checkpoint_scope: impl Into<String>,
    ) {
        self.entries
            .push(RegistryEntry::new(scope, checkpoint_id, checkpoint_scope));
    }

    pub fn add(&mut self, entry: RegistryEntry) {
        self.entries.push(entry);
    }

    /// Entries in registration order
    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    /// Entries sorted by `scope`, ascending
    ///
    /// This lexicographic order is the sole precedence mechanism for
    /// restoration: the first-sorted scope claims a variable and later
    /// entries cannot re-restore it. For slash-delimited scope hierarchies an
    /// ancestor sorts before its descendants; scope names that are not
    /// prefix-comparable (e.g. `"Ab"` vs `"A/B"`) sort by bytes, not by
    /// hierarchy. The sort is stable, so equal scopes keep registration
    /// order.
    pub fn sorted_entries(&self) -> Vec<RegistryEntry> {
        let mut sorted = self.entries.clone();
        sorted.sort_by(|a, b| a.scope.cmp(&b.scope));
        sorted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_entries_order_ancestors_first() {
        let mut registry = RestoreRegistry::new();
        registry.register("net/level2", "ckpt_b", "net/level2");
        registry.register("net", "ckpt_a", "net");
        registry.register("net/level1", "ckpt_c", "other");

        let scopes: Vec<_> = registry
            .sorted_entries()
            .into_iter()
            .map(|e| e.scope)
            .collect();
        assert_eq!(scopes, vec!["net", "net/level1", "net/level2"]);
    }

    #[test]
    fn test_registration_order_preserved_for_equal_scopes() {
        let mut registry = RestoreRegistry::new();
        registry.register("net", "first", "net");
        registry.register("net", "second", "net");

        let sorted = registry.sorted_entries();
        assert_eq!(sorted[0].checkpoint_id, "first");
        assert_eq!(sorted[1].checkpoint_id, "second");
    }

    #[test]
    fn test_serde_round_trip() {
        let mut registry = RestoreRegistry::new();
        registry.register("net", "pretrained", "old_net");
        let json = serde_json::to_string(&registry).unwrap();
        let decoded: RestoreRegistry = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.entries(), registry.entries());
    }
}
