//! Engine-side variable management for VoxelfloweRS
//!
//! This crate organizes what a training/inference graph produces and how a
//! graph gets its parameter values:
//!
//! - [`GradientsCollector`] gathers one gradient set per compute device
//!   during graph construction and serves the cross-device average to the
//!   application driver.
//! - [`OutputsCollector`] groups named result tensors into console, network
//!   output and summary buckets, with deterministic rename-on-collision and
//!   per-device averaging at finalise time.
//! - [`RestoreRegistry`] + [`RestoreOrchestrator`] selectively restore
//!   trained parameters from checkpoints into a subset of the graph's
//!   variables, first-sorted scope winning, and freshly initialise the rest
//!   through one combined [`RestoreOp`].
//!
//! All registration happens single-threaded during graph construction, once
//! per device in device order; the produced ops are handed off whole to the
//! execution driver.

#![allow(clippy::result_large_err)]

pub mod checkpoint;
pub mod gradients;
pub mod outputs;
pub mod registry;
pub mod restore;
pub mod summary;

pub use checkpoint::{
    CheckpointHandle, CheckpointResolver, DirCheckpointStore, MemoryCheckpointStore,
    RestoreInitializerFactory, TensorEntry, ValueInitializer,
};
pub use gradients::{average_gradients, GradientPair, GradientSet, GradientsCollector};
pub use outputs::{Bucket, CollectedValue, CollectionView, OutputsCollector};
pub use registry::{RegistryEntry, RestoreRegistry};
pub use restore::{
    checkpoint_relative_name, split_checkpoint_name, RestoreOp, RestoreOrchestrator,
};
pub use summary::{MergedSummary, SummaryFn, SummaryKind, SummaryOp};
