//! Tensor values produced and consumed by the engine
//!
//! This is a CPU value type over `ndarray` storage. It carries the data that
//! flows through the collectors and the restore operation; device placement
//! and kernel execution live outside this crate.

use crate::{dtype_from_type, DType, EngineError, Result, Shape};
use ndarray::{ArrayD, IxDyn};
use num_traits::{FromPrimitive, One, Zero};

/// An n-dimensional value with a cached shape
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<T> {
    data: ArrayD<T>,
    shape: Shape,
}

impl<T> Tensor<T> {
    /// Create a tensor from an ndarray
    pub fn from_array(data: ArrayD<T>) -> Self {
        let shape = Shape::from_slice(data.shape());
        Self { data, shape }
    }

    /// Create a tensor from a flat value buffer with the given shape
    pub fn from_vec(shape: &[usize], values: Vec<T>) -> Result<Self> {
        let data = ArrayD::from_shape_vec(IxDyn(shape), values).map_err(|e| {
            EngineError::shape_mismatch("from_vec", Shape::from_slice(shape).to_string(), e.to_string())
        })?;
        Ok(Self::from_array(data))
    }

    /// Create a rank-zero tensor holding a single value
    pub fn from_scalar(value: T) -> Self
    where
        T: Clone,
    {
        Self::from_array(ArrayD::from_elem(IxDyn(&[]), value))
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Total number of elements
    pub fn numel(&self) -> usize {
        self.shape.size()
    }

    pub fn is_scalar(&self) -> bool {
        self.shape.is_scalar()
    }

    /// Borrow the underlying storage
    pub fn data(&self) -> &ArrayD<T> {
        &self.data
    }
}

impl<T: 'static> Tensor<T> {
    pub fn dtype(&self) -> DType {
        dtype_from_type::<T>()
    }
}

impl<T: Clone> Tensor<T> {
    /// Element at the given index, if in bounds
    pub fn get(&self, index: &[usize]) -> Option<T> {
        self.data.get(index).cloned()
    }

    /// The single element of a rank-zero or one-element tensor
    pub fn scalar_value(&self) -> Option<T> {
        if self.numel() == 1 {
            self.data.iter().next().cloned()
        } else {
            None
        }
    }
}

impl<T: Clone + Zero> Tensor<T> {
    pub fn zeros(shape: &[usize]) -> Self {
        Self::from_array(ArrayD::from_elem(IxDyn(shape), T::zero()))
    }
}

impl<T: Clone + One> Tensor<T> {
    pub fn ones(shape: &[usize]) -> Self {
        Self::from_array(ArrayD::from_elem(IxDyn(shape), T::one()))
    }
}

impl<T> Tensor<T>
where
    T: num_traits::Float + FromPrimitive,
{
    /// Element-wise mean of a non-empty sequence of same-shaped tensors
    ///
    /// This is the reduction applied to per-device value lists when a graph is
    /// finalised, and to gradient sets when averaging over devices. The result
    /// is keyed to the first tensor's shape; a differently shaped input fails
    /// with a shape mismatch.
    pub fn mean_of<'a, I>(tensors: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a Tensor<T>>,
        T: 'a,
    {
        let mut iter = tensors.into_iter();
        let first = iter.next().ok_or_else(|| {
            EngineError::invalid_argument("mean_of", "no tensors to average")
        })?;
        let mut acc = first.data.clone();
        let mut count = 1usize;
        for tensor in iter {
            if tensor.shape != first.shape {
                return Err(EngineError::shape_mismatch(
                    "mean_of",
                    first.shape.to_string(),
                    tensor.shape.to_string(),
                ));
            }
            acc.zip_mut_with(&tensor.data, |a, b| *a = *a + *b);
            count += 1;
        }
        let n = T::from_usize(count).ok_or_else(|| {
            EngineError::invalid_argument("mean_of", "device count not representable in element type")
        })?;
        Ok(Self::from_array(acc.mapv(|v| v / n)))
    }
}
