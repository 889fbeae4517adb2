//! Collection of named result tensors for evaluation
//!
//! Computed tensors are grouped into three buckets retrieved by the
//! application driver in the train/infer loops:
//!   - `Console`: printed on the command line
//!   - `Output`: decoded by an aggregator into network output files
//!   - `Summary`: added to the visualization log
//!
//! Entries marked for cross-device averaging accumulate one tensor per
//! device; [`OutputsCollector::finalise`] replaces each list with its mean
//! and builds the merged summary handle.

use crate::summary::{MergedSummary, SummaryKind, SummaryOp};
use num_traits::{Float, FromPrimitive};
use std::collections::BTreeMap;
use voxelflow_core::{EngineError, Result, Tensor};

/// The three output groupings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Console,
    Output,
    Summary,
}

impl Bucket {
    pub fn name(&self) -> &'static str {
        match self {
            Bucket::Console => "console",
            Bucket::Output => "output",
            Bucket::Summary => "summary",
        }
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A bucket entry: a single tensor, or one tensor per device pending averaging
#[derive(Debug, Clone)]
pub enum CollectedValue<T> {
    Single(Tensor<T>),
    PerDevice(Vec<Tensor<T>>),
}

impl<T> CollectedValue<T> {
    /// The finalised tensor, when the entry is not (or no longer) a list
    pub fn as_single(&self) -> Option<&Tensor<T>> {
        match self {
            CollectedValue::Single(tensor) => Some(tensor),
            CollectedValue::PerDevice(_) => None,
        }
    }

    pub fn is_pending_average(&self) -> bool {
        matches!(self, CollectedValue::PerDevice(_))
    }
}

/// View returned by [`OutputsCollector::variables`]
///
/// Console and Output expose their live mapping; Summary exposes the merged
/// handle once `finalise` has run and an empty view before that.
#[derive(Debug)]
pub enum CollectionView<'a, T> {
    Variables(&'a BTreeMap<String, CollectedValue<T>>),
    MergedSummary(Option<&'a MergedSummary<T>>),
}

/// Collects named result tensors during the per-device construction pass
#[derive(Debug)]
pub struct OutputsCollector<T> {
    n_devices: usize,
    console_vars: BTreeMap<String, CollectedValue<T>>,
    output_vars: BTreeMap<String, CollectedValue<T>>,
    summary_vars: BTreeMap<String, CollectedValue<T>>,
    summary_ops: Vec<SummaryOp<T>>,
    merge_op: Option<MergedSummary<T>>,
    finalised: bool,
}

impl<T> Default for OutputsCollector<T> {
    fn default() -> Self {
        Self {
            n_devices: 1,
            console_vars: BTreeMap::new(),
            output_vars: BTreeMap::new(),
            summary_vars: BTreeMap::new(),
            summary_ops: Vec::new(),
            merge_op: None,
            finalised: false,
        }
    }
}

impl<T> OutputsCollector<T> {
    /// Create a collector for the given device count
    pub fn new(n_devices: usize) -> Result<Self> {
        if n_devices == 0 {
            return Err(EngineError::invalid_argument(
                "OutputsCollector::new",
                "n_devices must be positive",
            ));
        }
        Ok(Self {
            n_devices,
            ..Self::default()
        })
    }

    pub fn n_devices(&self) -> usize {
        self.n_devices
    }

    /// Update a bucket with `{name: tensor}` or `{name: per-device list}`,
    /// returning the key actually used
    fn add_to_bucket(
        bucket: &mut BTreeMap<String, CollectedValue<T>>,
        tensor: Tensor<T>,
        name: &str,
        do_averaging: bool,
        n_devices: usize,
    ) -> Result<String> {
        if name.is_empty() {
            return Err(EngineError::invalid_argument(
                "add_to_collection",
                "select a meaningful name for the collected tensor",
            ));
        }
        if do_averaging && n_devices > 1 {
            // one slot per device; exceeding the device count means the same
            // name was registered more times than there are devices
            match bucket.get_mut(name) {
                None => {
                    let mut list = Vec::with_capacity(n_devices);
                    list.push(tensor);
                    bucket.insert(name.to_string(), CollectedValue::PerDevice(list));
                }
                Some(CollectedValue::PerDevice(list)) => {
                    if list.len() >= n_devices {
                        return Err(EngineError::name_collision(
                            "add_to_collection",
                            name,
                            format!("has already been collected for all {} devices", n_devices),
                        ));
                    }
                    list.push(tensor);
                }
                Some(CollectedValue::Single(_)) => {
                    return Err(EngineError::name_collision(
                        "add_to_collection",
                        name,
                        "has already been taken by a non-averaged entry",
                    ));
                }
            }
            Ok(name.to_string())
        } else {
            // collect and rename if the name exists: scan name_1, name_2, ...
            // for the first free slot, keeping variable naming reproducible
            let mut new_name = name.to_string();
            let mut uniq_id = 0usize;
            while bucket.contains_key(&new_name) {
                uniq_id += 1;
                new_name = format!("{}_{}", name, uniq_id);
            }
            bucket.insert(new_name.clone(), CollectedValue::Single(tensor));
            Ok(new_name)
        }
    }

    /// Add a tensor to be displayed on the command line
    pub fn add_to_console(
        &mut self,
        tensor: Tensor<T>,
        name: &str,
        average_over_devices: bool,
    ) -> Result<String> {
        Self::add_to_bucket(
            &mut self.console_vars,
            tensor,
            name,
            average_over_devices,
            self.n_devices,
        )
    }

    /// Add a tensor to be decoded by the output aggregator
    pub fn add_to_network_output(
        &mut self,
        tensor: Tensor<T>,
        name: &str,
        average_over_devices: bool,
    ) -> Result<String> {
        Self::add_to_bucket(
            &mut self.output_vars,
            tensor,
            name,
            average_over_devices,
            self.n_devices,
        )
    }

    /// Add a tensor to the visualization log
    ///
    /// In the non-averaging path the summary op is built immediately under the
    /// (possibly renamed) key; averaged entries get their summary op at
    /// `finalise` time instead.
    pub fn add_to_summary(
        &mut self,
        tensor: Tensor<T>,
        name: &str,
        average_over_devices: bool,
        summary_kind: SummaryKind,
    ) -> Result<String>
    where
        T: Clone,
    {
        let used = Self::add_to_bucket(
            &mut self.summary_vars,
            tensor,
            name,
            average_over_devices,
            self.n_devices,
        )?;
        if let Some(CollectedValue::Single(value)) = self.summary_vars.get(&used) {
            let op = summary_kind.builder()(&used, value);
            self.summary_ops.push(op);
        }
        Ok(used)
    }

    /// Add a tensor to the given bucket
    ///
    /// `summary_kind` only applies to [`Bucket::Summary`]. Returns the key the
    /// tensor was stored under.
    pub fn add_to_collection(
        &mut self,
        tensor: Tensor<T>,
        name: &str,
        average_over_devices: bool,
        bucket: Bucket,
        summary_kind: SummaryKind,
    ) -> Result<String>
    where
        T: Clone,
    {
        match bucket {
            Bucket::Console => self.add_to_console(tensor, name, average_over_devices),
            Bucket::Output => self.add_to_network_output(tensor, name, average_over_devices),
            Bucket::Summary => {
                self.add_to_summary(tensor, name, average_over_devices, summary_kind)
            }
        }
    }

    /// Tensors to be evaluated by the execution driver
    pub fn variables(&self, bucket: Bucket) -> CollectionView<'_, T> {
        match bucket {
            Bucket::Console => CollectionView::Variables(&self.console_vars),
            Bucket::Output => CollectionView::Variables(&self.output_vars),
            Bucket::Summary => CollectionView::MergedSummary(self.merge_op.as_ref()),
        }
    }

    /// The console bucket mapping
    pub fn console_variables(&self) -> &BTreeMap<String, CollectedValue<T>> {
        &self.console_vars
    }

    /// The network-output bucket mapping
    pub fn output_variables(&self) -> &BTreeMap<String, CollectedValue<T>> {
        &self.output_vars
    }

    /// The merged summary handle, once `finalise` has run
    pub fn merged_summary(&self) -> Option<&MergedSummary<T>> {
        self.merge_op.as_ref()
    }
}

impl<T> OutputsCollector<T>
where
    T: Float + FromPrimitive,
{
    fn average_over_devices(
        bucket: &mut BTreeMap<String, CollectedValue<T>>,
        summary_ops: Option<&mut Vec<SummaryOp<T>>>,
    ) -> Result<()> {
        let mut averaged_summaries = Vec::new();
        for (name, value) in bucket.iter_mut() {
            if let CollectedValue::PerDevice(list) = value {
                let mean = Tensor::mean_of(list.iter())?;
                if summary_ops.is_some() {
                    // averaged summaries are logged as scalars
                    let tag = format!("{}_device_average_", name);
                    averaged_summaries.push(crate::summary::scalar(&tag, &mean));
                }
                *value = CollectedValue::Single(mean);
            }
        }
        if let Some(ops) = summary_ops {
            ops.extend(averaged_summaries);
        }
        Ok(())
    }

    /// Replace every per-device list with its mean and build the merged
    /// summary handle
    ///
    /// The last step of creating the graph, run once after all devices have
    /// populated the collector; later calls are no-ops.
    pub fn finalise(&mut self) -> Result<()> {
        if self.finalised {
            return Ok(());
        }
        Self::average_over_devices(&mut self.console_vars, None)?;
        Self::average_over_devices(&mut self.output_vars, None)?;
        Self::average_over_devices(&mut self.summary_vars, Some(&mut self.summary_ops))?;
        if !self.summary_ops.is_empty() {
            self.merge_op = Some(MergedSummary::new(self.summary_ops.clone()));
        }
        self.finalised = true;
        log::debug!(
            "finalised outputs: {} console, {} output, {} summary ops",
            self.console_vars.len(),
            self.output_vars.len(),
            self.summary_ops.len()
        );
        Ok(())
    }
}
