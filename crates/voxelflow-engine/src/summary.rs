//! Visualization summary kinds and summary ops
//!
//! A summary op records a tagged tensor to be rendered by an external
//! visualization backend. The set of kinds is closed; kind strings coming
//! from configuration are validated by [`SummaryKind::from_str`] before any
//! collector state is touched.

use std::str::FromStr;
use voxelflow_core::{EngineError, Tensor};

/// Supported visualization kinds
///
/// The `image3_*` kinds tag a volume for mid-plane display along one of the
/// three anatomical orientations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SummaryKind {
    Scalar,
    Histogram,
    Image,
    Image3Sagittal,
    Image3Coronal,
    Image3Axial,
}

impl SummaryKind {
    pub const ALL: [SummaryKind; 6] = [
        SummaryKind::Scalar,
        SummaryKind::Histogram,
        SummaryKind::Image,
        SummaryKind::Image3Sagittal,
        SummaryKind::Image3Coronal,
        SummaryKind::Image3Axial,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SummaryKind::Scalar => "scalar",
            SummaryKind::Histogram => "histogram",
            SummaryKind::Image => "image",
            SummaryKind::Image3Sagittal => "image3_sagittal",
            SummaryKind::Image3Coronal => "image3_coronal",
            SummaryKind::Image3Axial => "image3_axial",
        }
    }

    /// The builder function registered for this kind
    pub fn builder<T: Clone>(self) -> SummaryFn<T> {
        match self {
            SummaryKind::Scalar => scalar::<T>,
            SummaryKind::Histogram => histogram::<T>,
            SummaryKind::Image => image::<T>,
            SummaryKind::Image3Sagittal => image3_sagittal::<T>,
            SummaryKind::Image3Coronal => image3_coronal::<T>,
            SummaryKind::Image3Axial => image3_axial::<T>,
        }
    }
}

impl std::fmt::Display for SummaryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for SummaryKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| {
                EngineError::unsupported_option(
                    "summary_kind",
                    s,
                    Self::ALL.iter().map(|k| k.name().to_string()).collect(),
                )
            })
    }
}

/// A tagged tensor pending visualization
#[derive(Debug, Clone)]
pub struct SummaryOp<T> {
    tag: String,
    kind: SummaryKind,
    tensor: Tensor<T>,
}

impl<T> SummaryOp<T> {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn kind(&self) -> SummaryKind {
        self.kind
    }

    pub fn tensor(&self) -> &Tensor<T> {
        &self.tensor
    }
}

/// Signature of the per-kind summary builders
pub type SummaryFn<T> = fn(&str, &Tensor<T>) -> SummaryOp<T>;

fn tagged<T: Clone>(tag: &str, kind: SummaryKind, tensor: &Tensor<T>) -> SummaryOp<T> {
    SummaryOp {
        tag: tag.to_string(),
        kind,
        tensor: tensor.clone(),
    }
}

pub fn scalar<T: Clone>(tag: &str, tensor: &Tensor<T>) -> SummaryOp<T> {
    tagged(tag, SummaryKind::Scalar, tensor)
}

pub fn histogram<T: Clone>(tag: &str, tensor: &Tensor<T>) -> SummaryOp<T> {
    tagged(tag, SummaryKind::Histogram, tensor)
}

pub fn image<T: Clone>(tag: &str, tensor: &Tensor<T>) -> SummaryOp<T> {
    tagged(tag, SummaryKind::Image, tensor)
}

pub fn image3_sagittal<T: Clone>(tag: &str, tensor: &Tensor<T>) -> SummaryOp<T> {
    tagged(tag, SummaryKind::Image3Sagittal, tensor)
}

pub fn image3_coronal<T: Clone>(tag: &str, tensor: &Tensor<T>) -> SummaryOp<T> {
    tagged(tag, SummaryKind::Image3Coronal, tensor)
}

pub fn image3_axial<T: Clone>(tag: &str, tensor: &Tensor<T>) -> SummaryOp<T> {
    tagged(tag, SummaryKind::Image3Axial, tensor)
}

/// The single handle produced by merging all registered summary ops
#[derive(Debug, Clone)]
pub struct MergedSummary<T> {
    ops: Vec<SummaryOp<T>>,
}

impl<T> MergedSummary<T> {
    pub fn new(ops: Vec<SummaryOp<T>>) -> Self {
        Self { ops }
    }

    pub fn ops(&self) -> &[SummaryOp<T>] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Tags in registration order
    pub fn tags(&self) -> Vec<&str> {
        self.ops.iter().map(|op| op.tag()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_round_trip() {
        for kind in SummaryKind::ALL {
            assert_eq!(kind.name().parse::<SummaryKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_from_str_rejects_unknown_kind() {
        let err = "bogus".parse::<SummaryKind>().unwrap_err();
        match err {
            EngineError::UnsupportedOption { option, supported, .. } => {
                assert_eq!(option, "bogus");
                assert!(supported.contains(&"image3_axial".to_string()));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_builder_produces_tagged_op() {
        let t = Tensor::from_scalar(1.0f32);
        let op = SummaryKind::Image3Coronal.builder()("lesion", &t);
        assert_eq!(op.tag(), "lesion");
        assert_eq!(op.kind(), SummaryKind::Image3Coronal);
    }
}
