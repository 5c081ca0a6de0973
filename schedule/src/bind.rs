//! Core-binding axis selection.
//!
//! One loop axis is partitioned across the device's parallel compute cores.
//! The selector prefers the axis with enough independent iterations to feed
//! every core, and the block factor minimizes the rounding-induced
//! imbalance when tiles are round-robined across cores.

/// Loop axis bound across parallel cores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BindAxis {
    Batch,
    ChannelGroup,
    OutputRow,
}

impl std::fmt::Display for BindAxis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Batch => write!(f, "batch"),
            Self::ChannelGroup => write!(f, "c1"),
            Self::OutputRow => write!(f, "h"),
        }
    }
}

/// Choose the axis to partition across `core_count` cores.
///
/// Preference order: batch (cheapest, no further splitting) when it can feed
/// every core or there is only one core; otherwise channel groups; otherwise
/// output rows; otherwise whichever of the three is largest, accepting idle
/// cores, with ties broken toward batch, then channel groups.
pub fn choose_bind_axis(core_count: usize, batch: i64, c1: i64, rows: i64) -> BindAxis {
    let cores = core_count as i64;
    if batch >= cores || core_count == 1 {
        BindAxis::Batch
    } else if c1 >= cores {
        BindAxis::ChannelGroup
    } else if rows >= cores {
        BindAxis::OutputRow
    } else if batch >= c1 && batch >= rows {
        BindAxis::Batch
    } else if c1 >= rows {
        BindAxis::ChannelGroup
    } else {
        BindAxis::OutputRow
    }
}

/// Total per-core work when `total_iters` iterations are grouped into blocks
/// of `factor` and the blocks are round-robined across `core_count` cores.
pub fn rounds(total_iters: i64, factor: i64, core_count: usize) -> i64 {
    let blocks = (total_iters + factor - 1) / factor;
    ((blocks + core_count as i64 - 1) / core_count as i64) * factor
}

/// Block factor minimizing [`rounds`].
///
/// Exhaustive descending scan over every integer factor; ties keep the
/// largest factor. `total_iters` is a compile-time tensor dimension, so the
/// O(total_iters) scan is fine.
pub fn block_factor(total_iters: i64, core_count: usize) -> i64 {
    let total = total_iters.max(1);
    let mut best = total;
    let mut best_rounds = i64::MAX;
    for factor in (1..=total).rev() {
        let r = rounds(total, factor, core_count);
        if r < best_rounds {
            best = factor;
            best_rounds = r;
        }
    }
    best
}
