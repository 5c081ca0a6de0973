//! Loop-nest assembly.
//!
//! Consumes the chosen tile factors and core-binding axis and emits the
//! schedule: tile splits applied finest-first, the core-bound axis blocked
//! and moved outermost, stage tensors scoped into fast memory with
//! double-buffer flags and compute-at anchors, halo buffers aliased onto the
//! central tile storage, and one instruction selected per tensor.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use tessel_ir::Tensor;

use crate::bind::{BindAxis, block_factor};
use crate::emit::{InsnKind, IterVar, MemScope, Schedule, cache_read_mode};
use crate::fusion::StageTensors;
use crate::plan::{Plan, PoolMode};
use crate::tiling::TileFactors;

/// Build the schedule for one planned operator instance.
pub fn assemble(plan: &Plan, tiling: &TileFactors) -> Schedule {
    let mut sch = Schedule::new();
    let root_owned = plan.fusion.schedule_root().name().to_owned();
    let root = root_owned.as_str();

    // Root iteration space of the blocked layout.
    let n = sch.axis("n");
    let c1 = sch.axis("c1");
    let h = sch.axis("h");
    let w = sch.axis("w");
    let c0 = sch.axis("c0");

    // Tile splits, finest-first.
    let (c1o, c1i) = sch.split(root, &c1, tiling.c1);
    let (ho, hi) = sch.split(root, &h, tiling.h);
    let (wo, wi) = sch.split(root, &w, tiling.w);

    let c1_tiles = tiling.c1_tiles(&plan.shape);
    let h_tiles = tiling.h_tiles(&plan.shape);
    let w_tiles = tiling.w_tiles(&plan.shape);
    let serial = plan.shape.batch == 1 && c1_tiles == 1 && h_tiles == 1;

    // Block the core-bound axis and move it outermost. The block factor
    // shapes the loop even when no binding pragma is emitted.
    let bound_outer = match plan.bind {
        BindAxis::ChannelGroup => {
            let block = block_factor(c1_tiles, plan.core_count);
            let (boo, boi) = sch.split(root, &c1o, block);
            sch.reorder(root, &[boo.clone(), boi, n, ho, wo.clone(), c1i.clone(), hi, wi, c0]);
            boo
        }
        BindAxis::OutputRow => {
            let block = block_factor(h_tiles, plan.core_count);
            let (boo, boi) = sch.split(root, &ho, block);
            sch.reorder(root, &[boo.clone(), boi, n, c1o, wo.clone(), c1i.clone(), hi, wi, c0]);
            boo
        }
        BindAxis::Batch => {
            let block = if serial { 1 } else { block_factor(plan.shape.batch, plan.core_count) };
            let (boo, boi) = sch.split(root, &n, block);
            sch.reorder(root, &[boo.clone(), boi, c1o, ho, wo.clone(), c1i.clone(), hi, wi, c0]);
            boo
        }
    };

    // L1 residency leaves a single effective core; a fully serial shape has
    // nothing to partition. The split above still structures the loop.
    let l1_resident = plan.fusion.spec.l1_mode.is_fused();
    if !serial && !l1_resident {
        sch.bind_core(root, &bound_outer);
    }

    let mode = cache_read_mode(plan.shape.overlapping_windows(), h_tiles > 1 || w_tiles > 1);
    sch.cache_read(root, &bound_outer, mode);

    // Residency-fused IO bypasses global memory.
    if plan.fusion.spec.input_l1
        && let Some(source) = plan.fusion.source_input()
    {
        sch.set_scope(source.name(), MemScope::L1);
    }
    if plan.fusion.spec.output_l1 {
        sch.set_scope(root, MemScope::L1);
    }

    // Pooling-stage double buffering is unsafe under conversion fusion or L1
    // residency; the conversion stages themselves are unaffected.
    let db_pool = tiling.double_buffer
        && !plan.fusion.kind.has_quant()
        && !plan.fusion.kind.has_dequant()
        && !l1_resident;

    emit_pooling_stage(&mut sch, plan, root, &wo, db_pool);
    if let Some(quant) = plan.fusion.kind.quant() {
        let round = quant.round_mode;
        for t in stage_common(&mut sch, &quant.tensors, root, &wo, tiling.double_buffer) {
            let kind = if t.name() == tessel_ir::names::QUANT_INPUT {
                InsnKind::CastRound(round)
            } else if t.name() == quant.root.name() {
                InsnKind::DmaCopy
            } else {
                InsnKind::Vector
            };
            sch.emit_insn(t.name(), None, kind, BTreeMap::new());
        }
    }
    if let Some(dequant) = plan.fusion.kind.dequant() {
        for t in stage_common(&mut sch, &dequant.tensors, root, &wo, tiling.double_buffer) {
            if t.sole_input().is_some_and(|src| src.is_placeholder()) {
                sch.emit_insn(t.name(), None, InsnKind::DmaCopy, BTreeMap::new());
                if tiling.double_buffer {
                    sch.preload(t.name());
                }
            } else {
                sch.emit_insn(t.name(), None, InsnKind::Vector, BTreeMap::new());
            }
        }
    }

    // The outermost tensor is the store back out.
    let mut params = BTreeMap::new();
    if plan.fusion.select_write {
        params.insert("split_select".to_owned(), 1);
    }
    if plan.fusion.strided_write {
        params.insert("strided".to_owned(), 1);
    }
    sch.emit_insn(root, Some(&c1i), InsnKind::DmaCopy, params);

    debug!(
        root,
        bind = %plan.bind,
        strategy = %tiling.strategy,
        double_buffer = tiling.double_buffer,
        steps = sch.steps.len(),
        "assembled schedule"
    );
    sch
}

/// Scope, double-buffer, and anchor every stage tensor except the schedule
/// root; returns the stage tensors name-sorted for deterministic emission.
fn stage_common(
    sch: &mut Schedule,
    stage: &StageTensors,
    schedule_root: &str,
    anchor: &IterVar,
    double_buffer: bool,
) -> Vec<Arc<Tensor>> {
    let mut tensors: Vec<_> = stage.values().cloned().collect();
    tensors.sort_by(|a, b| a.name().cmp(b.name()));
    tensors.retain(|t| t.name() != schedule_root);
    for t in &tensors {
        sch.set_scope(t.name(), MemScope::Ubuf);
        if double_buffer {
            sch.double_buffer(t.name());
        }
        sch.compute_at(t.name(), schedule_root, anchor);
    }
    tensors
}

fn emit_pooling_stage(sch: &mut Schedule, plan: &Plan, root: &str, anchor: &IterVar, db_pool: bool) {
    let data_name = plan.fusion.pool_data.name().to_owned();
    for t in stage_common(sch, &plan.fusion.pool_stage, root, anchor, db_pool) {
        if t.is_pool_pad() {
            // Halo fills alias the central tile storage; no extra allocation.
            sch.reuse_alias(t.name(), &data_name);
            sch.emit_insn(t.name(), None, InsnKind::VectorDup, BTreeMap::new());
        } else if t.name() == data_name {
            let mut params = BTreeMap::new();
            if plan.fusion.spec.input_select_read {
                params.insert("select_read".to_owned(), 1);
            }
            sch.emit_insn(t.name(), None, InsnKind::DmaCopy, params);
            if db_pool {
                sch.preload(t.name());
            }
        } else {
            let kind = match plan.mode {
                PoolMode::Max => InsnKind::VectorMax,
                PoolMode::Avg => InsnKind::VectorAvg,
            };
            sch.emit_insn(t.name(), None, kind, BTreeMap::new());
        }
    }
}
