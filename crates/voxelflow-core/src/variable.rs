//! Named variable handles and the live variable set of a graph
//!
//! Graph-construction code registers every trainable or stateful tensor here.
//! Restoration and initialization ops produced by the engine write values
//! back through the handles; identity (not name) decides whether a variable
//! has already been claimed by a restoration source.

use crate::{dtype_from_type, DType, EngineError, Result, Shape, Tensor};
use num_traits::{One, Zero};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

static NEXT_VARIABLE_ID: AtomicUsize = AtomicUsize::new(0);

/// Process-unique variable identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableId(usize);

/// Default-initialization policy of a variable
///
/// Applied when no checkpoint entry claims the variable.
#[derive(Debug, Clone)]
pub enum Initializer<T> {
    Zeros,
    Ones,
    Constant(T),
}

impl<T: Clone + Zero + One> Initializer<T> {
    /// Materialize an initial value of the given shape
    pub fn materialize(&self, shape: &Shape) -> Tensor<T> {
        match self {
            Initializer::Zeros => Tensor::zeros(shape.dims()),
            Initializer::Ones => Tensor::ones(shape.dims()),
            Initializer::Constant(value) => Tensor::from_array(ndarray::ArrayD::from_elem(
                ndarray::IxDyn(shape.dims()),
                value.clone(),
            )),
        }
    }
}

#[derive(Debug)]
struct VariableInner<T> {
    id: VariableId,
    name: String,
    shape: Shape,
    dtype: DType,
    initializer: Initializer<T>,
    value: RwLock<Option<Tensor<T>>>,
}

/// A named, shaped variable handle
///
/// Cheap to clone; all clones share the same value slot. The handle is owned
/// by graph-construction code, the engine only reads identity/shape/dtype and
/// writes values through assignment.
#[derive(Debug)]
pub struct Variable<T> {
    inner: Arc<VariableInner<T>>,
}

impl<T> Clone for Variable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: 'static> Variable<T> {
    fn new(name: String, shape: Shape, initializer: Initializer<T>) -> Self {
        Self {
            inner: Arc::new(VariableInner {
                id: VariableId(NEXT_VARIABLE_ID.fetch_add(1, Ordering::Relaxed)),
                name,
                shape,
                dtype: dtype_from_type::<T>(),
                initializer,
                value: RwLock::new(None),
            }),
        }
    }
}

impl<T> Variable<T> {
    pub fn id(&self) -> VariableId {
        self.inner.id
    }

    /// Fully-qualified name, globally unique within the owning store
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn shape(&self) -> &Shape {
        &self.inner.shape
    }

    pub fn dtype(&self) -> DType {
        self.inner.dtype
    }

    pub fn initializer(&self) -> &Initializer<T> {
        &self.inner.initializer
    }

    /// Whether an assignment has run for this variable
    pub fn is_initialized(&self) -> bool {
        self.inner
            .value
            .read()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    /// Assign a value, checking the shape against the declared one
    pub fn assign(&self, value: Tensor<T>) -> Result<()> {
        if value.shape() != &self.inner.shape {
            return Err(EngineError::shape_mismatch(
                "assign",
                self.inner.shape.to_string(),
                value.shape().to_string(),
            ));
        }
        let mut slot = self.inner.value.write().map_err(|_| {
            EngineError::precondition("assign", "variable value lock poisoned")
        })?;
        *slot = Some(value);
        Ok(())
    }
}

impl<T: Clone> Variable<T> {
    /// Current value, if any assignment has run
    pub fn value(&self) -> Option<Tensor<T>> {
        self.inner
            .value
            .read()
            .ok()
            .and_then(|slot| slot.clone())
    }
}

impl<T: Clone + Zero + One> Variable<T> {
    /// Apply the variable's own default initializer
    pub fn initialize(&self) -> Result<()> {
        self.assign(self.inner.initializer.materialize(&self.inner.shape))
    }
}

/// The live set of graph variables, in registration order
///
/// Explicit replacement for an implicit process-wide variables collection:
/// graph construction owns the store and passes it to the restore
/// orchestrator.
#[derive(Debug, Default)]
pub struct VariableStore<T> {
    variables: Vec<Variable<T>>,
    index: HashMap<String, usize>,
}

impl<T: 'static> VariableStore<T> {
    pub fn new() -> Self {
        Self {
            variables: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a new variable under a globally unique name
    pub fn add_variable(
        &mut self,
        name: &str,
        shape: Shape,
        initializer: Initializer<T>,
    ) -> Result<Variable<T>> {
        if name.is_empty() {
            return Err(EngineError::invalid_argument(
                "add_variable",
                "variable name must not be empty",
            ));
        }
        if self.index.contains_key(name) {
            return Err(EngineError::invalid_argument(
                "add_variable",
                format!("variable name '{}' already registered", name),
            ));
        }
        let variable = Variable::new(name.to_string(), shape, initializer);
        self.index.insert(name.to_string(), self.variables.len());
        self.variables.push(variable.clone());
        Ok(variable)
    }
}

impl<T> VariableStore<T> {
    /// All registered variables, in registration order
    pub fn global_variables(&self) -> &[Variable<T>] {
        &self.variables
    }

    /// Variables whose fully-qualified name starts with the given prefix,
    /// in registration order
    pub fn scope_variables(&self, prefix: &str) -> Vec<Variable<T>> {
        self.variables
            .iter()
            .filter(|v| v.name().starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&Variable<T>> {
        self.index.get(name).map(|&i| &self.variables[i])
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_variable_and_lookup() {
        let mut store = VariableStore::<f32>::new();
        let w = store
            .add_variable("net/conv/w", Shape::from_slice(&[2, 2]), Initializer::Zeros)
            .unwrap();
        assert_eq!(w.name(), "net/conv/w");
        assert_eq!(w.dtype(), crate::DType::Float32);
        assert!(store.get("net/conv/w").is_some());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut store = VariableStore::<f32>::new();
        store
            .add_variable("net/w", Shape::from_slice(&[1]), Initializer::Zeros)
            .unwrap();
        let result = store.add_variable("net/w", Shape::from_slice(&[1]), Initializer::Zeros);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut store = VariableStore::<f32>::new();
        assert!(store
            .add_variable("", Shape::from_slice(&[1]), Initializer::Zeros)
            .is_err());
    }

    #[test]
    fn test_scope_variables_prefix_match() {
        let mut store = VariableStore::<f32>::new();
        store
            .add_variable("net/conv/w", Shape::from_slice(&[1]), Initializer::Zeros)
            .unwrap();
        store
            .add_variable("net/conv/b", Shape::from_slice(&[1]), Initializer::Zeros)
            .unwrap();
        store
            .add_variable("head/w", Shape::from_slice(&[1]), Initializer::Zeros)
            .unwrap();
        let in_scope = store.scope_variables("net/conv");
        assert_eq!(in_scope.len(), 2);
        assert!(in_scope.iter().all(|v| v.name().starts_with("net/conv")));
    }

    #[test]
    fn test_assign_checks_shape() {
        let mut store = VariableStore::<f32>::new();
        let w = store
            .add_variable("w", Shape::from_slice(&[2]), Initializer::Zeros)
            .unwrap();
        assert!(w.assign(Tensor::zeros(&[3])).is_err());
        assert!(!w.is_initialized());
        w.assign(Tensor::from_vec(&[2], vec![1.0, 2.0]).unwrap()).unwrap();
        assert!(w.is_initialized());
        assert_eq!(w.value().unwrap().get(&[1]), Some(2.0));
    }

    #[test]
    fn test_initialize_applies_default_initializer() {
        let mut store = VariableStore::<f32>::new();
        let b = store
            .add_variable("b", Shape::from_slice(&[2]), Initializer::Constant(0.1))
            .unwrap();
        b.initialize().unwrap();
        assert_eq!(b.value().unwrap().get(&[0]), Some(0.1));
    }

    #[test]
    fn test_clones_share_the_value_slot() {
        let mut store = VariableStore::<f32>::new();
        let a = store
            .add_variable("a", Shape::from_slice(&[1]), Initializer::Zeros)
            .unwrap();
        let b = a.clone();
        assert_eq!(a.id(), b.id());
        a.assign(Tensor::from_vec(&[1], vec![7.0]).unwrap()).unwrap();
        assert_eq!(b.value().unwrap().get(&[0]), Some(7.0));
    }
}
