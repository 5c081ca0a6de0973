//! Tiling and loop-schedule synthesis for NPU tensor operators.
//!
//! Given a fused pooling operator's dataflow graph and a target device, this
//! crate chooses tile factors that fit the unified buffer, picks the axis to
//! partition across parallel cores, decides double buffering, and emits a
//! concrete schedule with memory scopes, core bindings, and instruction
//! selections.
//!
//! # Module Organization
//!
//! - [`fusion`] - Stage classification and fusion parameter decoding
//! - [`tiling`] - Capacity-constrained tile search
//! - [`bind`] - Core-binding axis and block-factor selection
//! - [`assemble`] - Loop-nest assembly
//! - [`emit`] - The emitted schedule object
//! - [`plan`] - Logical shapes and the per-invocation plan
//! - [`target`] - Device capability descriptors
//!
//! # Pipeline
//!
//! Classification and shape extraction run first, then the tile search, then
//! core binding, then assembly. Each component commits its result into the
//! plan exactly once; later components only consume it.
//!
//! # Example
//!
//! ```ignore
//! use tessel_schedule::{PoolAttrs, Target, schedule_pooling};
//!
//! let attrs = PoolAttrs { kernel: (3, 3), stride: (1, 1) };
//! let schedule = schedule_pooling(&output, &attrs, &Target::edge())?;
//! for step in &schedule.steps {
//!     println!("{step:?}");
//! }
//! ```

pub mod assemble;
pub mod bind;
pub mod emit;
pub mod error;
pub mod fusion;
pub mod plan;
pub mod target;
pub mod tiling;

#[cfg(test)]
pub mod test;

use std::sync::Arc;

use snafu::OptionExt;
use tessel_ir::Tensor;
use tracing::debug;

pub use assemble::assemble;
pub use bind::{BindAxis, block_factor, choose_bind_axis};
pub use emit::{CacheReadMode, InsnKind, IterVar, MemScope, Schedule, Step, cache_read_mode};
pub use error::{Result, ScheduleError};
pub use fusion::{FusionInfo, FusionKind, FusionSpec, L1FusionMode, RoundMode, classify};
pub use plan::{Plan, PoolAttrs, PoolMode, PoolShape};
pub use target::Target;
pub use tiling::{FusionFlags, TileFactors, TileStrategy, search_tiling, working_set_bytes};

use error::ConfigurationSnafu;

/// Schedule one pooling operator instance for `target`.
///
/// Runs the full pipeline: classify fusion stages, extract the logical
/// shape, choose the core-binding axis, search tile factors against the
/// unified-buffer budget, and assemble the loop nest. Both failure modes are
/// fatal: an inconsistent graph surfaces as [`ScheduleError::Configuration`],
/// a kernel too large for the device as
/// [`ScheduleError::TilingInfeasible`].
#[tracing::instrument(skip_all, fields(output = %output.name(), device = %target.device))]
pub fn schedule_pooling(output: &Arc<Tensor>, attrs: &PoolAttrs, target: &Target) -> Result<Schedule> {
    let fusion = classify(output)?;
    let shape = PoolShape::derive(&fusion, attrs)?;
    let mode = PoolMode::from_tag(fusion.pool_root.tag()).context(ConfigurationSnafu {
        stage: "pooling",
        detail: format!("tag {:?} names no pooling mode", fusion.pool_root.tag()),
    })?;

    let bind = choose_bind_axis(target.core_count, shape.batch, shape.c1, shape.out_h);
    let flags = FusionFlags::from(&fusion.kind);
    let tiling = search_tiling(&shape, flags, bind, target.core_count, target.ubuf_bytes)?;
    debug!(bind = %bind, strategy = %tiling.strategy, double_buffer = tiling.double_buffer, "plan committed");

    let plan = Plan { shape, mode, fusion, bind, core_count: target.core_count };
    Ok(assemble(&plan, &tiling))
}
