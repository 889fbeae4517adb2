//! Initialise-or-restore: partial checkpoint restoration with scope precedence
//!
//! For every scope recorded in the restore registry, a variable under that
//! scope is restored from the named checkpoint when it exists there and no
//! earlier-sorted scope has already claimed it. Everything left unclaimed is
//! freshly initialised. The result is one combined [`RestoreOp`] executed by
//! the driver at session start.

use crate::checkpoint::{CheckpointResolver, RestoreInitializerFactory, ValueInitializer};
use crate::registry::RestoreRegistry;
use num_traits::{FromPrimitive, One, Zero};
use std::collections::HashSet;
use voxelflow_core::{Result, Variable, VariableId, VariableStore};

/// Compute a variable's name inside the checkpoint namespace
///
/// Substitutes the first occurrence of `scope` with `checkpoint_scope` and
/// strips the device/output suffix (everything from the first `:` on).
pub fn checkpoint_relative_name(var_name: &str, scope: &str, checkpoint_scope: &str) -> String {
    let renamed = var_name.replacen(scope, checkpoint_scope, 1);
    match renamed.split_once(':') {
        Some((head, _)) => head.to_string(),
        None => renamed,
    }
}

/// Split a checkpoint-relative name into optional sub-scope and leaf name at
/// the last `/`
pub fn split_checkpoint_name(name: &str) -> (Option<&str>, &str) {
    match name.rsplit_once('/') {
        Some((sub_scope, leaf)) => (Some(sub_scope), leaf),
        None => (None, name),
    }
}

struct RestoreAssignment<T> {
    variable: Variable<T>,
    initializer: ValueInitializer<T>,
    checkpoint_id: String,
    checkpoint_name: String,
}

/// The single combined operation restoring claimed variables and freshly
/// initialising the rest
///
/// Intended to run exactly once at session start; re-running re-applies the
/// same assignments.
pub struct RestoreOp<T> {
    restores: Vec<RestoreAssignment<T>>,
    fresh: Vec<Variable<T>>,
}

impl<T> RestoreOp<T> {
    pub fn restored_count(&self) -> usize {
        self.restores.len()
    }

    pub fn fresh_count(&self) -> usize {
        self.fresh.len()
    }

    /// Whether the variable was claimed by a checkpoint entry
    pub fn is_restored(&self, variable: &Variable<T>) -> bool {
        self.restores
            .iter()
            .any(|a| a.variable.id() == variable.id())
    }

    /// Variables claimed by checkpoint entries
    pub fn restored_variables(&self) -> Vec<Variable<T>> {
        self.restores.iter().map(|a| a.variable.clone()).collect()
    }

    /// Variables falling through to fresh initialization
    pub fn fresh_variables(&self) -> Vec<Variable<T>> {
        self.fresh.clone()
    }

    /// The checkpoint source of a restored variable, as
    /// `(checkpoint_id, checkpoint_relative_name)`
    pub fn restore_source(&self, variable: &Variable<T>) -> Option<(&str, &str)> {
        self.restores
            .iter()
            .find(|a| a.variable.id() == variable.id())
            .map(|a| (a.checkpoint_id.as_str(), a.checkpoint_name.as_str()))
    }
}

impl<T: Clone + Zero + One> RestoreOp<T> {
    /// Execute all fresh initializations and all recorded restorations
    pub fn run(&self) -> Result<()> {
        for variable in &self.fresh {
            variable.initialize()?;
        }
        for assignment in &self.restores {
            let value = (assignment.initializer)(
                assignment.variable.shape(),
                assignment.variable.dtype(),
            )?;
            assignment.variable.assign(value)?;
        }
        Ok(())
    }
}

impl<T> std::fmt::Debug for RestoreOp<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestoreOp")
            .field("restored", &self.restores.len())
            .field("fresh", &self.fresh.len())
            .finish()
    }
}

/// Builds the combined restore-or-initialise operation for a graph
pub struct RestoreOrchestrator<'a, T> {
    store: &'a VariableStore<T>,
    registry: &'a RestoreRegistry,
    resolver: &'a dyn CheckpointResolver,
    initializers: &'a dyn RestoreInitializerFactory<T>,
}

impl<'a, T> RestoreOrchestrator<'a, T>
where
    T: FromPrimitive + Clone + Send + Sync + 'static,
{
    pub fn new(
        store: &'a VariableStore<T>,
        registry: &'a RestoreRegistry,
        resolver: &'a dyn CheckpointResolver,
        initializers: &'a dyn RestoreInitializerFactory<T>,
    ) -> Self {
        Self {
            store,
            registry,
            resolver,
            initializers,
        }
    }

    /// Build the combined operation over `var_list` (all live graph variables
    /// when `None`)
    ///
    /// Registry entries are processed sorted by scope; a variable is claimed
    /// by the first entry whose checkpoint stores it under the renamed name,
    /// and later entries cannot restore it again. Variables matched by no
    /// entry fall through to fresh initialization — that is the default path,
    /// not an error. A checkpoint that fails to resolve aborts the build.
    pub fn build(&self, var_list: Option<&[Variable<T>]>) -> Result<RestoreOp<T>> {
        let var_list: Vec<Variable<T>> = match var_list {
            Some(explicit) => explicit.to_vec(),
            None => self.store.global_variables().to_vec(),
        };
        let eligible: HashSet<VariableId> = var_list.iter().map(|v| v.id()).collect();

        let mut claimed: HashSet<VariableId> = HashSet::new();
        let mut restores: Vec<RestoreAssignment<T>> = Vec::new();

        for entry in self.registry.sorted_entries() {
            let handle = self.resolver.resolve(&entry.checkpoint_id)?;
            let names_in_file: HashSet<String> = self
                .resolver
                .list_entries(&handle)?
                .into_iter()
                .map(|e| e.name)
                .collect();

            for variable in self.store.scope_variables(&entry.scope) {
                if !eligible.contains(&variable.id()) {
                    continue;
                }
                let relative = checkpoint_relative_name(
                    variable.name(),
                    &entry.scope,
                    &entry.checkpoint_scope,
                );
                if !names_in_file.contains(&relative) {
                    continue;
                }
                if claimed.contains(&variable.id()) {
                    continue;
                }
                let (sub_scope, leaf) = split_checkpoint_name(&relative);
                let initializer =
                    self.initializers
                        .make_initializer(&entry.checkpoint_id, leaf, sub_scope)?;
                log::debug!(
                    "restoring '{}' from checkpoint '{}' as '{}'",
                    variable.name(),
                    entry.checkpoint_id,
                    relative
                );
                claimed.insert(variable.id());
                restores.push(RestoreAssignment {
                    variable,
                    initializer,
                    checkpoint_id: entry.checkpoint_id.clone(),
                    checkpoint_name: relative,
                });
            }
        }

        let fresh: Vec<Variable<T>> = var_list
            .iter()
            .filter(|v| !claimed.contains(&v.id()))
            .cloned()
            .collect();
        log::info!(
            "restore op: {} variables from checkpoints, {} freshly initialised",
            restores.len(),
            fresh.len()
        );
        Ok(RestoreOp { restores, fresh })
    }
}
