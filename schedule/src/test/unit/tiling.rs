//! Unit tests for the capacity-constrained tile search.

use crate::bind::{BindAxis, choose_bind_axis};
use crate::error::ScheduleError;
use crate::test::helpers::pool_shape;
use crate::tiling::{FusionFlags, TileStrategy, search_phase, search_tiling, working_set_bytes};

const NO_FUSION: FusionFlags = FusionFlags { dequant_fused: false, quant_fused: false };
const DEQUANT: FusionFlags = FusionFlags { dequant_fused: true, quant_fused: false };
const QUANT: FusionFlags = FusionFlags { dequant_fused: false, quant_fused: true };

#[test]
fn working_set_formula_by_hand() {
    // c1t=2, ht=3, wt=4 on a 2x2/1x1 window, f16, 16 lanes:
    // padded tile 4x5, central 2*4*5*16*2, halos 2x(2*2*5*16*2) + 2x(2*4*2*16*2).
    let shape = pool_shape(1, 2, 8, 8, (2, 2), (1, 1));
    assert_eq!(working_set_bytes(&shape, NO_FUSION, 2, 3, 4), 2560 + 1280 + 2048);
}

#[test]
fn wide_feature_map_tiles_rows_with_double_buffering() {
    // 1x4x112x112 map, 3x3 window, stride 1, 128 KiB budget, 2 cores: the
    // channel strategy cannot fit a whole 112x112 plane, rows can.
    let shape = pool_shape(1, 4, 112, 112, (3, 3), (1, 1));
    let bound = choose_bind_axis(2, shape.batch, shape.c1, shape.out_h);
    assert_eq!(bound, BindAxis::ChannelGroup);

    let tiling = search_tiling(&shape, NO_FUSION, bound, 2, 131072).unwrap();
    assert!(tiling.double_buffer);
    assert_eq!(tiling.strategy, TileStrategy::OutputRow);
    assert_eq!((tiling.c1, tiling.h, tiling.w), (1, 9, 110));

    // The accepted tiling fits the half (double-buffered) budget.
    assert!(working_set_bytes(&shape, NO_FUSION, tiling.c1, tiling.h, tiling.w) <= 131072 / 2);
}

#[test]
fn tiny_budget_is_infeasible() {
    let shape = pool_shape(1, 4, 112, 112, (3, 3), (1, 1));
    let err = search_tiling(&shape, NO_FUSION, BindAxis::ChannelGroup, 2, 256).unwrap_err();
    assert!(matches!(err, ScheduleError::TilingInfeasible { budget: 256, .. }), "{err}");
}

#[test]
fn channel_search_takes_largest_factor_when_not_bound() {
    let shape = pool_shape(1, 4, 8, 8, (2, 2), (2, 2));
    let tiling = search_tiling(&shape, NO_FUSION, BindAxis::Batch, 1, 10_000_000).unwrap();
    assert_eq!(tiling.strategy, TileStrategy::ChannelGroup);
    assert_eq!(tiling.c1, 4);
    assert_eq!((tiling.h, tiling.w), (shape.out_h, shape.out_w));
    assert!(tiling.double_buffer);
}

#[test]
fn channel_search_minimizes_core_rounds_when_bound() {
    // c1=4 over 3 cores: factor 2 gives each core 2 channel groups; factors
    // 4 and 3 leave cores idle while one does 4 or 3.
    let shape = pool_shape(1, 4, 8, 8, (2, 2), (2, 2));
    let tiling = search_tiling(&shape, NO_FUSION, BindAxis::ChannelGroup, 3, 10_000_000).unwrap();
    assert_eq!(tiling.strategy, TileStrategy::ChannelGroup);
    assert_eq!(tiling.c1, 2);
}

#[test]
fn column_tiling_only_in_full_budget_phase() {
    // A single channel group and a wide row: rows do not fit even at one
    // output row, columns do. Column tiling never double-buffers.
    let shape = pool_shape(1, 1, 112, 112, (3, 3), (1, 1));
    assert!(search_phase(&shape, NO_FUSION, BindAxis::Batch, 1, 8000, true).is_none());

    let tiling = search_tiling(&shape, NO_FUSION, BindAxis::Batch, 1, 16000).unwrap();
    assert_eq!(tiling.strategy, TileStrategy::OutputColumn);
    assert!(!tiling.double_buffer);
    assert_eq!((tiling.c1, tiling.h, tiling.w), (1, 1, 51));
}

#[test]
fn dequant_fusion_forces_even_channel_factor() {
    let shape = pool_shape(1, 8, 8, 8, (3, 3), (1, 1));
    let tiling = search_tiling(&shape, DEQUANT, BindAxis::Batch, 1, 80_000).unwrap();
    assert_eq!(tiling.strategy, TileStrategy::ChannelGroup);
    assert_eq!(tiling.c1 % 2, 0);
    assert_eq!(tiling.c1, 4);
}

#[test]
fn dequant_fusion_with_single_channel_group_is_infeasible() {
    let shape = pool_shape(1, 1, 8, 8, (3, 3), (1, 1));
    let err = search_tiling(&shape, DEQUANT, BindAxis::Batch, 1, 10_000_000).unwrap_err();
    assert!(matches!(err, ScheduleError::TilingInfeasible { .. }), "{err}");
}

#[test]
fn quant_fusion_allows_full_count_or_even_factors() {
    // Full odd count is allowed outright.
    let shape = pool_shape(1, 3, 8, 8, (3, 3), (1, 1));
    let tiling = search_tiling(&shape, QUANT, BindAxis::Batch, 1, 10_000_000).unwrap();
    assert_eq!(tiling.c1, 3);

    // Constrained budget: 4 does not fit, 3 is odd and not the full count,
    // 2 wins.
    let shape = pool_shape(1, 4, 8, 8, (3, 3), (1, 1));
    let tiling = search_tiling(&shape, QUANT, BindAxis::Batch, 1, 30_000).unwrap();
    assert_eq!(tiling.c1, 2);
    assert!(tiling.double_buffer);
}

#[test]
fn quant_fusion_with_single_channel_group_allows_one() {
    let shape = pool_shape(1, 1, 8, 8, (3, 3), (1, 1));
    let tiling = search_tiling(&shape, QUANT, BindAxis::Batch, 1, 10_000_000).unwrap();
    assert_eq!(tiling.c1, 1);
}

#[test]
fn accepted_tilings_fit_their_phase_budget() {
    let shape = pool_shape(1, 4, 16, 16, (3, 3), (2, 2));
    for flags in [NO_FUSION, DEQUANT, QUANT] {
        let budget = 80_000;
        let tiling = search_tiling(&shape, flags, BindAxis::Batch, 1, budget).unwrap();
        let cap = if tiling.double_buffer { budget / 2 } else { budget };
        assert!(working_set_bytes(&shape, flags, tiling.c1, tiling.h, tiling.w) <= cap, "{flags:?}");
    }
}
