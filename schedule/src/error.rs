use snafu::Snafu;

pub type Result<T, E = ScheduleError> = std::result::Result<T, E>;

/// Fatal scheduling failures.
///
/// Both kinds halt the pipeline immediately; there is no degraded schedule.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum ScheduleError {
    /// The operator graph is inconsistent with what its tags promise, e.g. a
    /// quantize tag is present but the stage's designated input tensor is
    /// missing. Not a resource limit; never retried.
    #[snafu(display("inconsistent {stage} stage configuration: {detail}"))]
    Configuration { stage: &'static str, detail: String },

    /// No tile-factor combination fits even the full fast-memory budget:
    /// this kernel/stride shape is unsupported on the target device.
    #[snafu(display(
        "pooling window {kernel_h}x{kernel_w} stride {stride_h}x{stride_w} exceeds the \
         {budget}-byte fast-memory budget on every tiling strategy"
    ))]
    TilingInfeasible { kernel_h: i64, kernel_w: i64, stride_h: i64, stride_w: i64, budget: i64 },
}
