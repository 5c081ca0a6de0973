//! Element types for the tessel scheduler.
//!
//! The scheduler only ever needs the storage width of an element: working-set
//! sizing multiplies tile footprints by `bytes()`, and the quantize /
//! dequantize stages switch between narrow integer and wide float storage.
//! Vector/pointer composite types live with the code-emission backend, not
//! here.

/// Scalar element type of a tensor buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::Display, strum::EnumIter, strum::EnumCount)]
#[cfg_attr(feature = "proptest", derive(proptest_derive::Arbitrary))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DType {
    Int8,
    UInt8,
    Int16,
    Int32,
    Float16,
    BFloat16,
    Float32,
}

impl DType {
    /// Storage width in bytes.
    pub const fn bytes(&self) -> i64 {
        match self {
            Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::Float16 | Self::BFloat16 => 2,
            Self::Int32 | Self::Float32 => 4,
        }
    }

    /// True for integer storage (the quantized side of a quant/dequant pair).
    pub const fn is_int(&self) -> bool {
        matches!(self, Self::Int8 | Self::UInt8 | Self::Int16 | Self::Int32)
    }

    /// True for float storage.
    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float16 | Self::BFloat16 | Self::Float32)
    }

    /// The widened type a dequantize stage produces from `self`.
    ///
    /// Narrow integers widen to Float16; everything else is already wide.
    pub const fn dequantized(&self) -> DType {
        match self {
            Self::Int8 | Self::UInt8 => Self::Float16,
            other => *other,
        }
    }
}
