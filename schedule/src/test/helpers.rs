//! Test utilities: graph builders for fused pooling operators.
//!
//! All builders emit the blocked `[n, c1, h, w, c0]` layout with `c0 = 16`
//! and valid-padding output sizes. The pooling stage always carries a
//! copy-in tensor, four halo fills, and one intermediate reduction, so the
//! assembler has real stage tensors to place.

use std::sync::Arc;

use tessel_dtype::DType;
use tessel_ir::{Attrs, Tensor, names, tags};

use crate::plan::PoolShape;

pub const C0: i64 = 16;

fn out_dim(input: i64, kernel: i64, stride: i64) -> i64 {
    (input - kernel) / stride + 1
}

/// Logical shape for direct tile-search and binding tests.
pub fn pool_shape(batch: i64, c1: i64, in_h: i64, in_w: i64, kernel: (i64, i64), stride: (i64, i64)) -> PoolShape {
    PoolShape {
        batch,
        c1,
        in_h,
        in_w,
        out_h: out_dim(in_h, kernel.0, stride.0),
        out_w: out_dim(in_w, kernel.1, stride.1),
        kernel_h: kernel.0,
        kernel_w: kernel.1,
        stride_h: stride.0,
        stride_w: stride.1,
        c0: C0,
        elem: DType::Float16,
    }
}

/// Pooling stage rooted on `source`: copy-in, four halo fills, one
/// intermediate reduction, and the tagged compute root carrying `attrs`.
fn pool_core(
    batch: i64,
    c1: i64,
    in_h: i64,
    in_w: i64,
    kernel: (i64, i64),
    stride: (i64, i64),
    source: Arc<Tensor>,
    attrs: Attrs,
    root_tag: &str,
) -> Arc<Tensor> {
    let in_dims = [batch, c1, in_h, in_w, C0];
    let out_dims = [batch, c1, out_dim(in_h, kernel.0, stride.0), out_dim(in_w, kernel.1, stride.1), C0];

    let data = Tensor::compute(names::POOL_DATA, &in_dims, DType::Float16, tags::POOL_DATA, &[source]);
    let pads: Vec<Arc<Tensor>> = ["top", "bottom", "left", "right"]
        .iter()
        .map(|side| {
            Tensor::compute(
                &format!("pooling2d_pad_{side}"),
                &in_dims,
                DType::Float16,
                &format!("{}{side}", tags::POOL_PAD_PREFIX),
                &[data.clone()],
            )
        })
        .collect();
    let row = Tensor::compute("pooling2d_row_max", &out_dims, DType::Float16, "pooling2d_row_max", &pads);
    Tensor::compute_with_attrs("pooling2d_res", &out_dims, DType::Float16, root_tag, &[row], attrs)
}

/// Unfused max pooling.
pub fn plain_pool(batch: i64, c1: i64, in_h: i64, in_w: i64, kernel: (i64, i64), stride: (i64, i64)) -> Arc<Tensor> {
    plain_pool_with_attrs(batch, c1, in_h, in_w, kernel, stride, Attrs::new())
}

/// Unfused max pooling with explicit root attributes (L1 fusion codes etc.).
pub fn plain_pool_with_attrs(
    batch: i64,
    c1: i64,
    in_h: i64,
    in_w: i64,
    kernel: (i64, i64),
    stride: (i64, i64),
    attrs: Attrs,
) -> Arc<Tensor> {
    let fmap = Tensor::placeholder("fmap_gm", &[batch, c1, in_h, in_w, C0], DType::Float16);
    pool_core(batch, c1, in_h, in_w, kernel, stride, fmap, attrs, tags::POOL_MAX)
}

/// Unfused average pooling.
pub fn plain_avg_pool(
    batch: i64,
    c1: i64,
    in_h: i64,
    in_w: i64,
    kernel: (i64, i64),
    stride: (i64, i64),
) -> Arc<Tensor> {
    let fmap = Tensor::placeholder("fmap_gm", &[batch, c1, in_h, in_w, C0], DType::Float16);
    pool_core(batch, c1, in_h, in_w, kernel, stride, fmap, Attrs::new(), tags::POOL_AVG)
}

/// Pooling fed by a dequantize stage (int8 source widened to f16).
pub fn dequant_pool(batch: i64, c1: i64, in_h: i64, in_w: i64, kernel: (i64, i64), stride: (i64, i64)) -> Arc<Tensor> {
    let in_dims = [batch, c1, in_h, in_w, C0];
    let fmap = Tensor::placeholder("fmap_gm", &in_dims, DType::Int8);
    let dq_data = Tensor::compute("dequant_data", &in_dims, DType::Int8, "dequant_data", &[fmap]);
    let dq = Tensor::compute("dequant_res", &in_dims, DType::Float16, tags::DEQUANT, &[dq_data]);
    pool_core(batch, c1, in_h, in_w, kernel, stride, dq, Attrs::new(), tags::POOL_MAX)
}

/// Quantize stage on top of `pool_root`, narrowing to int8.
pub fn quantize(pool_root: Arc<Tensor>, round_mode: Option<&str>) -> Arc<Tensor> {
    let out_dims: Vec<i64> = pool_root.shape().to_vec();
    let staged = Tensor::compute(names::QUANT_INPUT, &out_dims, DType::Int8, "quant_input", &[pool_root]);
    let attrs = match round_mode {
        Some(mode) => Attrs::new().with("round_mode", mode),
        None => Attrs::new(),
    };
    Tensor::compute_with_attrs("res_quant", &out_dims, DType::Int8, tags::QUANT, &[staged], attrs)
}

/// Pooling with a fused quantize output stage.
pub fn quant_pool(
    batch: i64,
    c1: i64,
    in_h: i64,
    in_w: i64,
    kernel: (i64, i64),
    stride: (i64, i64),
    round_mode: Option<&str>,
) -> Arc<Tensor> {
    quantize(plain_pool(batch, c1, in_h, in_w, kernel, stride), round_mode)
}

/// Pooling with both conversion stages fused.
pub fn both_pool(batch: i64, c1: i64, in_h: i64, in_w: i64, kernel: (i64, i64), stride: (i64, i64)) -> Arc<Tensor> {
    quantize(dequant_pool(batch, c1, in_h, in_w, kernel, stride), Some("round"))
}

/// Wrap `inner` in a selective-write output stage (detected by name marker).
pub fn with_select_write(inner: Arc<Tensor>) -> Arc<Tensor> {
    let dims: Vec<i64> = inner.shape().to_vec();
    let dtype = inner.dtype();
    Tensor::compute("res_write_select", &dims, dtype, "elewise", &[inner])
}

/// Wrap `inner` in a strided-write output stage (detected by tag).
pub fn with_strided_write(inner: Arc<Tensor>) -> Arc<Tensor> {
    let dims: Vec<i64> = inner.shape().to_vec();
    let dtype = inner.dtype();
    Tensor::compute("res_strided", &dims, dtype, tags::STRIDED_WRITE, &[inner])
}
