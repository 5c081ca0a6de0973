//! Tensor node and tag vocabulary.
//!
//! A tensor node is one intermediate buffer in an operator's dataflow graph.
//! Nodes are shared (`Arc`) between the graph and the stage maps that
//! classify them; identity is a process-unique id, so visited-tracking and
//! map keys never depend on pointer addresses or names.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use smallvec::SmallVec;
use tessel_dtype::DType;

use crate::attrs::{AttrValue, Attrs};
use crate::error::{AttrTypeSnafu, MissingAttrSnafu, Result};

/// Producer operation tags identifying the logical stage a tensor belongs to.
///
/// The front-end emits these on compute nodes; the classifier and crawler
/// stop conditions match on them. Pooling compute tags share a common prefix
/// (`pooling2d_max`, `pooling2d_avg`, `pooling2d_data`, `pooling2d_pad_*`).
pub mod tags {
    /// Quantize stage root (wide float → narrow int).
    pub const QUANT: &str = "quant";
    /// Dequantize stage root (narrow int → wide float).
    pub const DEQUANT: &str = "anti_quant";
    /// Common prefix of all pooling-stage tags.
    pub const POOLING_PREFIX: &str = "pooling2d_";
    /// Max-pooling compute root.
    pub const POOL_MAX: &str = "pooling2d_max";
    /// Average-pooling compute root.
    pub const POOL_AVG: &str = "pooling2d_avg";
    /// Pooling-stage copy-in of the source feature map.
    pub const POOL_DATA: &str = "pooling2d_data";
    /// Prefix of pooling halo/pad fill tensors (`..._pad_top` etc.).
    pub const POOL_PAD_PREFIX: &str = "pooling2d_pad_";
    /// Strided-write wrapper around the real compute output.
    pub const STRIDED_WRITE: &str = "strided_write";
}

/// Well-known tensor names the classifier resolves stages through.
pub mod names {
    /// Marker substring identifying a selective-write output tensor.
    pub const WRITE_SELECT: &str = "write_select";
    /// Designated input of the quantize stage; its sole producer is the
    /// pooling root.
    pub const QUANT_INPUT: &str = "quant_input";
    /// Designated source input of the pooling stage; its sole producer is a
    /// placeholder or the dequantize root.
    pub const POOL_DATA: &str = "pooling2d_data";
}

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

/// One buffer in the operator dataflow graph.
///
/// A tensor with no inputs is a placeholder (external input) and never
/// belongs to a stage.
#[derive(Debug)]
pub struct Tensor {
    /// Process-unique identity, assigned at construction.
    pub id: usize,
    name: String,
    shape: SmallVec<[i64; 5]>,
    dtype: DType,
    tag: String,
    inputs: SmallVec<[Arc<Tensor>; 2]>,
    attrs: Attrs,
}

impl Tensor {
    /// Create a placeholder (leaf / external input).
    pub fn placeholder(name: &str, shape: &[i64], dtype: DType) -> Arc<Self> {
        Self::build(name, shape, dtype, "", SmallVec::new(), Attrs::new())
    }

    /// Create a compute node with a producer tag.
    pub fn compute(name: &str, shape: &[i64], dtype: DType, tag: &str, inputs: &[Arc<Tensor>]) -> Arc<Self> {
        Self::build(name, shape, dtype, tag, inputs.iter().cloned().collect(), Attrs::new())
    }

    /// Create a compute node carrying an attribute bag.
    pub fn compute_with_attrs(
        name: &str,
        shape: &[i64],
        dtype: DType,
        tag: &str,
        inputs: &[Arc<Tensor>],
        attrs: Attrs,
    ) -> Arc<Self> {
        Self::build(name, shape, dtype, tag, inputs.iter().cloned().collect(), attrs)
    }

    fn build(
        name: &str,
        shape: &[i64],
        dtype: DType,
        tag: &str,
        inputs: SmallVec<[Arc<Tensor>; 2]>,
        attrs: Attrs,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            name: name.to_owned(),
            shape: SmallVec::from_slice(shape),
            dtype,
            tag: tag.to_owned(),
            inputs,
            attrs,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &[i64] {
        &self.shape
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn inputs(&self) -> &[Arc<Tensor>] {
        &self.inputs
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    /// A tensor with zero inputs is a placeholder and never joins a stage.
    pub fn is_placeholder(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn is_quant(&self) -> bool {
        self.tag == tags::QUANT
    }

    pub fn is_dequant(&self) -> bool {
        self.tag == tags::DEQUANT
    }

    pub fn is_pooling(&self) -> bool {
        self.tag.starts_with(tags::POOLING_PREFIX)
    }

    pub fn is_pool_pad(&self) -> bool {
        self.tag.starts_with(tags::POOL_PAD_PREFIX)
    }

    pub fn is_strided_write(&self) -> bool {
        self.tag == tags::STRIDED_WRITE
    }

    /// Selective-write outputs are identified by name marker, not tag.
    pub fn is_select_write(&self) -> bool {
        self.name.contains(names::WRITE_SELECT)
    }

    /// Sole producer of this tensor, if it has exactly one input.
    pub fn sole_input(&self) -> Option<&Arc<Tensor>> {
        match self.inputs.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    /// Checked integer-attribute lookup.
    pub fn require_int_attr(&self, key: &str) -> Result<i64> {
        match self.attrs.get(key) {
            Some(AttrValue::Int(v)) => Ok(*v),
            Some(other) => {
                AttrTypeSnafu { tensor: self.name.clone(), key: key.to_owned(), expected: "Int", found: other.kind() }
                    .fail()
            }
            None => MissingAttrSnafu { tensor: self.name.clone(), key: key.to_owned() }.fail(),
        }
    }
}

/// Identity-keyed wrapper for hashing tensors in sets and maps.
///
/// Hash and equality go through the stable id, so shared nodes reached via
/// different `Arc` clones compare equal.
#[derive(Debug, Clone)]
pub struct TensorKey(pub Arc<Tensor>);

impl PartialEq for TensorKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for TensorKey {}

impl std::hash::Hash for TensorKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}
