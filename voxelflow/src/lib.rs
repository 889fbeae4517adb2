//! # VoxelfloweRS - Volumetric Deep Learning Training Engine
//!
//! VoxelfloweRS manages the engine side of training and inference for
//! volumetric (medical imaging) networks: it collects what a computation
//! graph produces and decides how a graph gets its parameter values.
//!
//! - **Output collection**: named result tensors grouped into console,
//!   network-output and summary buckets, with cross-device averaging
//! - **Gradient collection**: one gradient set per compute device, averaged
//!   for the training op
//! - **Partial restoration**: trained parameters restored from checkpoints
//!   into a subset of a larger graph's variables, with scope-based
//!   precedence so nested scopes do not double-restore
//!
//! ## Quick Start
//!
//! ```rust
//! use voxelflow::prelude::*;
//!
//! # fn main() -> voxelflow::core::Result<()> {
//! // graph construction registers variables and restore intents
//! let mut graph = VariableStore::<f32>::new();
//! let w = graph.add_variable(
//!     "seg/conv/w",
//!     Shape::from_slice(&[3, 3]),
//!     Initializer::Zeros,
//! )?;
//!
//! let mut registry = RestoreRegistry::new();
//! registry.register("seg", "pretrained", "backbone");
//!
//! // collectors are populated once per device
//! let mut outputs = OutputsCollector::new(2)?;
//! outputs.add_to_console(Tensor::from_scalar(0.5f32), "loss", true)?;
//! outputs.add_to_console(Tensor::from_scalar(0.7f32), "loss", true)?;
//! outputs.finalise()?;
//!
//! // after all devices are built, the restore op initialises the graph
//! let checkpoints = MemoryCheckpointStore::new();
//! let restore_op =
//!     RestoreOrchestrator::new(&graph, &registry, &checkpoints, &checkpoints).build(None);
//! // "pretrained" is not in the store, so graph setup aborts here
//! assert!(restore_op.is_err());
//! # let _ = w;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! VoxelfloweRS is organized into focused crates:
//!
//! - [`core`]: tensors, shapes, dtypes, variables and the error taxonomy
//! - [`engine`]: collectors, restore registry/orchestrator and checkpoint
//!   interfaces

#![deny(missing_docs)]
#![warn(clippy::all)]

// Re-export all public APIs from subcrates
pub use voxelflow_core as core;
pub use voxelflow_engine as engine;

/// Prelude module for convenient imports
///
/// Re-exports the most commonly used types so applications can get started
/// with a single glob import:
///
/// ```rust
/// use voxelflow::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use crate::core::{DType, Initializer, Shape, Tensor, Variable, VariableStore};

    // Collectors
    pub use crate::engine::{Bucket, GradientSet, GradientsCollector, OutputsCollector};

    // Summaries
    pub use crate::engine::{MergedSummary, SummaryKind};

    // Restoration
    pub use crate::engine::{
        CheckpointResolver, DirCheckpointStore, MemoryCheckpointStore, RegistryEntry,
        RestoreOrchestrator, RestoreRegistry,
    };
}

/// The version of the VoxelfloweRS engine
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the version string of VoxelfloweRS
pub fn version() -> &'static str {
    VERSION
}
