//! Per-device gradient collection and cross-device averaging
//!
//! Each compute device contributes one [`GradientSet`] during the graph
//! construction pass, in device order. The collector holds at most
//! `n_devices` sets; the averaged set is read once by the execution driver
//! when it assembles the training op.

use num_traits::{Float, FromPrimitive};
use voxelflow_core::{EngineError, Result, Tensor, Variable};

/// One (gradient, variable) pair as produced by an optimizer step
#[derive(Debug, Clone)]
pub struct GradientPair<T> {
    pub gradient: Tensor<T>,
    pub variable: Variable<T>,
}

/// An ordered list of gradient pairs from a single device
#[derive(Debug, Clone, Default)]
pub struct GradientSet<T> {
    pairs: Vec<GradientPair<T>>,
}

impl<T> GradientSet<T> {
    pub fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    pub fn from_pairs(pairs: Vec<GradientPair<T>>) -> Self {
        Self { pairs }
    }

    pub fn push(&mut self, gradient: Tensor<T>, variable: Variable<T>) {
        self.pairs.push(GradientPair { gradient, variable });
    }

    pub fn pairs(&self) -> &[GradientPair<T>] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Position-wise average of per-device gradient sets
///
/// Pairs are aligned by position across devices; the variable handle is taken
/// from the first device. All sets must have the same length and carry the
/// same variable at each position.
pub fn average_gradients<T>(sets: &[GradientSet<T>]) -> Result<GradientSet<T>>
where
    T: Float + FromPrimitive,
{
    let first = sets.first().ok_or_else(|| {
        EngineError::invalid_argument("average_gradients", "no gradient sets to average")
    })?;
    for set in &sets[1..] {
        if set.len() != first.len() {
            return Err(EngineError::invalid_argument(
                "average_gradients",
                format!(
                    "ragged gradient sets: expected {} pairs per device, got {}",
                    first.len(),
                    set.len()
                ),
            ));
        }
    }
    let mut averaged = GradientSet::new();
    for (position, lead) in first.pairs().iter().enumerate() {
        for set in &sets[1..] {
            let pair = &set.pairs()[position];
            if pair.variable.id() != lead.variable.id() {
                return Err(EngineError::invalid_argument(
                    "average_gradients",
                    format!(
                        "variable pairing differs across devices at position {}: '{}' vs '{}'",
                        position,
                        lead.variable.name(),
                        pair.variable.name()
                    ),
                ));
            }
        }
        let mean = Tensor::mean_of(sets.iter().map(|set| &set.pairs()[position].gradient))?;
        averaged.push(mean, lead.variable.clone());
    }
    Ok(averaged)
}

/// Collects one gradient set per device during graph construction
///
/// The averaged op over all devices is later added to the graph by the
/// application driver.
#[derive(Debug)]
pub struct GradientsCollector<T> {
    n_devices: usize,
    gradients: Vec<GradientSet<T>>,
}

impl<T> Default for GradientsCollector<T> {
    fn default() -> Self {
        Self {
            n_devices: 1,
            gradients: Vec::new(),
        }
    }
}

impl<T> GradientsCollector<T> {
    /// Create a collector for the given device count
    pub fn new(n_devices: usize) -> Result<Self> {
        if n_devices == 0 {
            return Err(EngineError::invalid_argument(
                "GradientsCollector::new",
                "n_devices must be positive",
            ));
        }
        Ok(Self {
            n_devices,
            gradients: Vec::new(),
        })
    }

    pub fn n_devices(&self) -> usize {
        self.n_devices
    }

    /// Number of gradient sets collected so far
    pub fn collected(&self) -> usize {
        self.gradients.len()
    }

    /// Add the gradient set produced on the next device, in device order
    pub fn add_to_collection(&mut self, gradients: GradientSet<T>) -> Result<()> {
        if self.gradients.len() >= self.n_devices {
            return Err(EngineError::device_overflow(
                "add_to_collection",
                self.gradients.len() + 1,
                self.n_devices,
            ));
        }
        self.gradients.push(gradients);
        Ok(())
    }
}

impl<T> GradientsCollector<T>
where
    T: Float + FromPrimitive,
{
    /// The averaged gradient set over all collected devices
    ///
    /// Used by the application driver when building the training op.
    pub fn gradients(&self) -> Result<GradientSet<T>> {
        if self.gradients.is_empty() {
            return Err(EngineError::precondition(
                "gradients",
                "add gradients to the collector when constructing the graph",
            ));
        }
        average_gradients(&self.gradients)
    }
}
