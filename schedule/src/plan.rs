//! Logical operator shape and the per-invocation plan record.
//!
//! One schedule invocation flows a single immutable-after-construction value
//! through the pipeline: shapes extracted from the graph, the classified
//! fusion record, and the core-binding choice. Components only ever add
//! their own result; committed fields are never revisited.

use tessel_dtype::DType;
use tessel_ir::{Tensor, tags};

use crate::bind::BindAxis;
use crate::error::{ConfigurationSnafu, Result};
use crate::fusion::FusionInfo;

/// Pooling reduction kind, read off the compute root's tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PoolMode {
    Max,
    Avg,
}

impl PoolMode {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            tags::POOL_MAX => Some(Self::Max),
            tags::POOL_AVG => Some(Self::Avg),
            _ => None,
        }
    }
}

/// Resolved operator attributes handed over by the front-end.
///
/// Shape/dtype/attr legality is the front-end's contract; only capacity
/// feasibility is checked here.
#[derive(Debug, Clone, Copy)]
pub struct PoolAttrs {
    /// Pooling window (height, width).
    pub kernel: (i64, i64),
    /// Window stride (height, width).
    pub stride: (i64, i64),
}

/// Logical shape of one pooling operator instance.
///
/// Layout is blocked: `[batch, c1, height, width, c0]` with `c0` fixed at
/// the hardware vector width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolShape {
    pub batch: i64,
    /// Channel groups (channels / c0).
    pub c1: i64,
    pub in_h: i64,
    pub in_w: i64,
    pub out_h: i64,
    pub out_w: i64,
    pub kernel_h: i64,
    pub kernel_w: i64,
    pub stride_h: i64,
    pub stride_w: i64,
    /// Vector lane width of the innermost axis.
    pub c0: i64,
    /// Element type of the pooling-stage working set.
    pub elem: DType,
}

impl PoolShape {
    /// Extract the logical shape from the classified graph plus attributes.
    ///
    /// The pooling root carries `[n, c1, out_h, out_w, c0]`, its designated
    /// source input `[n, c1, in_h, in_w, c0]`.
    pub fn derive(fusion: &FusionInfo, attrs: &PoolAttrs) -> Result<Self> {
        let out = five_dims(&fusion.pool_root)?;
        let src = five_dims(&fusion.pool_data)?;
        Ok(Self {
            batch: out[0],
            c1: out[1],
            in_h: src[2],
            in_w: src[3],
            out_h: out[2],
            out_w: out[3],
            kernel_h: attrs.kernel.0,
            kernel_w: attrs.kernel.1,
            stride_h: attrs.stride.0,
            stride_w: attrs.stride.1,
            c0: out[4],
            elem: fusion.pool_root.dtype(),
        })
    }

    /// Input rows one output-row tile of `factor` rows reads, halo included.
    pub fn padded_rows(&self, factor: i64) -> i64 {
        (factor - 1) * self.stride_h + self.kernel_h
    }

    /// Input columns one output-column tile of `factor` columns reads.
    pub fn padded_cols(&self, factor: i64) -> i64 {
        (factor - 1) * self.stride_w + self.kernel_w
    }

    /// Windows overlap when either stride is below the window extent; the
    /// overlap region can be re-read from cache instead of refetched.
    pub fn overlapping_windows(&self) -> bool {
        self.stride_h < self.kernel_h || self.stride_w < self.kernel_w
    }
}

fn five_dims(tensor: &Tensor) -> Result<[i64; 5]> {
    match *tensor.shape() {
        [n, c1, h, w, c0] => Ok([n, c1, h, w, c0]),
        ref other => ConfigurationSnafu {
            stage: "pooling",
            detail: format!("tensor {:?} has rank {}, expected blocked 5-D layout", tensor.name(), other.len()),
        }
        .fail(),
    }
}

/// Everything the loop-nest assembler consumes.
#[derive(Debug, Clone)]
pub struct Plan {
    pub shape: PoolShape,
    pub mode: PoolMode,
    pub fusion: FusionInfo,
    pub bind: BindAxis,
    pub core_count: usize,
}
