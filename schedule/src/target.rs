//! Target device capabilities.
//!
//! The scheduler treats the platform as two opaque numbers — a fast-memory
//! budget and a parallel core count — plus the vector lane width the layout
//! is blocked by. Presets describe the device classes the compiler ships
//! schedules for; everything here is a pure lookup, queried once per
//! schedule invocation and threaded through by value.

/// Capability descriptor for one NPU device class.
#[derive(Debug, Clone)]
pub struct Target {
    /// Device identifier (e.g. "npu-edge").
    pub device: String,

    /// Parallel compute cores the core-binding axis is partitioned across.
    pub core_count: usize,

    /// Unified buffer: the fast on-chip working memory every tile must fit
    /// in, in bytes. This is the budget the tile search runs against.
    pub ubuf_bytes: i64,

    /// L1: the larger, slower on-chip tier used by residency fusion.
    pub l1_bytes: i64,

    /// Lanes in the blocked innermost axis (the fixed `c0` dimension).
    pub vector_width: i64,
}

impl Target {
    pub fn new(device: &str, core_count: usize, ubuf_bytes: i64, l1_bytes: i64, vector_width: i64) -> Self {
        Self { device: device.to_owned(), core_count, ubuf_bytes, l1_bytes, vector_width }
    }

    /// Small inference part: 2 cores, 256 KiB unified buffer, 1 MiB L1.
    pub fn edge() -> Self {
        Self::new("npu-edge", 2, 256 * 1024, 1024 * 1024, 16)
    }

    /// Training part: 32 cores, 256 KiB unified buffer, 1 MiB L1.
    pub fn server() -> Self {
        Self::new("npu-server", 32, 256 * 1024, 1024 * 1024, 16)
    }

    /// Override the core count, keeping memory capacities.
    pub fn with_cores(mut self, core_count: usize) -> Self {
        self.core_count = core_count;
        self
    }

    /// Override the unified-buffer budget, for capacity edge cases.
    pub fn with_ubuf_bytes(mut self, bytes: i64) -> Self {
        self.ubuf_bytes = bytes;
        self
    }
}
