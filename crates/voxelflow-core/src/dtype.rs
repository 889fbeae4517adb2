use serde::{Deserialize, Serialize};

/// Numeric element types supported by engine tensors and checkpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    Float16,
    BFloat16,
    Float32,
    Float64,
    Int32,
    Int64,
    UInt8,
    Bool,
}

impl DType {
    pub fn size(&self) -> usize {
        match self {
            DType::Float16 => 2,
            DType::BFloat16 => 2,
            DType::Float32 => 4,
            DType::Float64 => 8,
            DType::Int32 => 4,
            DType::Int64 => 8,
            DType::UInt8 => 1,
            DType::Bool => 1,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DType::Float16 => "float16",
            DType::BFloat16 => "bfloat16",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::UInt8 => "uint8",
            DType::Bool => "bool",
        }
    }

    pub fn is_floating(&self) -> bool {
        matches!(
            self,
            DType::Float16 | DType::BFloat16 | DType::Float32 | DType::Float64
        )
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Get DType from Rust type
pub fn dtype_from_type<T: 'static>() -> DType {
    use half::{bf16, f16};
    use std::any::TypeId;

    if TypeId::of::<T>() == TypeId::of::<f16>() {
        DType::Float16
    } else if TypeId::of::<T>() == TypeId::of::<bf16>() {
        DType::BFloat16
    } else if TypeId::of::<T>() == TypeId::of::<f32>() {
        DType::Float32
    } else if TypeId::of::<T>() == TypeId::of::<f64>() {
        DType::Float64
    } else if TypeId::of::<T>() == TypeId::of::<i32>() {
        DType::Int32
    } else if TypeId::of::<T>() == TypeId::of::<i64>() {
        DType::Int64
    } else if TypeId::of::<T>() == TypeId::of::<u8>() {
        DType::UInt8
    } else if TypeId::of::<T>() == TypeId::of::<bool>() {
        DType::Bool
    } else {
        panic!("unsupported element type for engine tensors")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_from_type() {
        assert_eq!(dtype_from_type::<f32>(), DType::Float32);
        assert_eq!(dtype_from_type::<f64>(), DType::Float64);
        assert_eq!(dtype_from_type::<i64>(), DType::Int64);
    }

    #[test]
    fn test_dtype_properties() {
        assert_eq!(DType::Float32.size(), 4);
        assert_eq!(DType::Float32.name(), "float32");
        assert!(DType::Float16.is_floating());
        assert!(!DType::Int32.is_floating());
    }
}
