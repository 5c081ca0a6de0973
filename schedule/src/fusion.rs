//! Fusion classification.
//!
//! The output tensor of a fused pooling operator may be wrapped in a
//! selective/strided write stage, produced by a quantize stage, and fed by a
//! dequantize stage. Classification walks those boundaries once, collects
//! each stage's tensor map with the crawler, and decodes the per-tensor
//! fusion attributes into an explicit record — downstream components branch
//! on a closed [`FusionKind`], never on attribute-key presence.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use snafu::OptionExt;
use tessel_ir::{Tensor, crawl, names};

use crate::error::{ConfigurationSnafu, Result, ScheduleError};

/// Attribute keys the front-end resolves onto the core-compute tensor.
pub mod attr_keys {
    pub const L1_FUSION_TYPE: &str = "l1_fusion_type";
    pub const IN_L1: &str = "in_l1_flag";
    pub const OUT_L1: &str = "out_l1_flag";
    pub const IN_SELECT_READ: &str = "in_select_read";
    pub const ROUND_MODE: &str = "round_mode";
}

/// Tensors of one logical stage, keyed by name.
pub type StageTensors = HashMap<String, Arc<Tensor>>;

/// L1-residency fusion mode, decoded from the front-end's integer code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum L1FusionMode {
    /// No residency fusion; stage IO round-trips through global memory.
    #[default]
    None,
    /// Depth fusion: a chain of operators shares L1-resident IO.
    Depth,
    /// Breadth fusion: sibling operators share L1-resident IO.
    Breadth,
}

impl L1FusionMode {
    /// Decode the front-end code (-1 / 0 / 1).
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            -1 => Some(Self::None),
            0 => Some(Self::Depth),
            1 => Some(Self::Breadth),
            _ => None,
        }
    }

    pub fn is_fused(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Rounding mode of a fixed-point conversion stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RoundMode {
    #[default]
    Round,
    Rint,
    Floor,
    Ceil,
    Trunc,
}

impl FromStr for RoundMode {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "round" => Ok(Self::Round),
            "rint" => Ok(Self::Rint),
            "floor" => Ok(Self::Floor),
            "ceil" => Ok(Self::Ceil),
            "trunc" => Ok(Self::Trunc),
            other => ConfigurationSnafu { stage: "quant", detail: format!("unknown round mode {other:?}") }.fail(),
        }
    }
}

impl std::fmt::Display for RoundMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Round => "round",
            Self::Rint => "rint",
            Self::Floor => "floor",
            Self::Ceil => "ceil",
            Self::Trunc => "trunc",
        };
        write!(f, "{s}")
    }
}

/// Fusion parameters decoded once from the core-compute tensor's attributes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FusionSpec {
    pub l1_mode: L1FusionMode,
    /// Operator input already resident in L1.
    pub input_l1: bool,
    /// Operator output stays resident in L1.
    pub output_l1: bool,
    /// Input is gathered with a selective read.
    pub input_select_read: bool,
}

impl FusionSpec {
    pub fn decode(root: &Tensor) -> Result<Self> {
        let attrs = root.attrs();
        let l1_mode = match attrs.int(attr_keys::L1_FUSION_TYPE) {
            None => L1FusionMode::None,
            Some(code) => L1FusionMode::from_code(code).context(ConfigurationSnafu {
                stage: "pooling",
                detail: format!("unknown L1 fusion code {code}"),
            })?,
        };
        Ok(Self {
            l1_mode,
            input_l1: attrs.bool(attr_keys::IN_L1).unwrap_or(false),
            output_l1: attrs.bool(attr_keys::OUT_L1).unwrap_or(false),
            input_select_read: attrs.bool(attr_keys::IN_SELECT_READ).unwrap_or(false),
        })
    }
}

/// Quantize stage: pooling result narrowed to integer storage.
#[derive(Debug, Clone)]
pub struct QuantStage {
    pub root: Arc<Tensor>,
    pub round_mode: RoundMode,
    pub tensors: StageTensors,
}

/// Dequantize stage: integer source widened before pooling.
#[derive(Debug, Clone)]
pub struct DequantStage {
    pub root: Arc<Tensor>,
    pub tensors: StageTensors,
}

/// Which optional conversion stages surround the pooling compute.
#[derive(Debug, Clone, Default)]
pub enum FusionKind {
    #[default]
    None,
    Quant(QuantStage),
    Dequant(DequantStage),
    Both { quant: QuantStage, dequant: DequantStage },
}

impl FusionKind {
    pub fn quant(&self) -> Option<&QuantStage> {
        match self {
            Self::Quant(q) | Self::Both { quant: q, .. } => Some(q),
            _ => None,
        }
    }

    pub fn dequant(&self) -> Option<&DequantStage> {
        match self {
            Self::Dequant(d) | Self::Both { dequant: d, .. } => Some(d),
            _ => None,
        }
    }

    pub fn has_quant(&self) -> bool {
        self.quant().is_some()
    }

    pub fn has_dequant(&self) -> bool {
        self.dequant().is_some()
    }
}

/// Classification result: stage roots, stage tensor maps, write wrappers,
/// and the decoded fusion parameters.
#[derive(Debug, Clone)]
pub struct FusionInfo {
    pub select_write: bool,
    pub strided_write: bool,
    /// The write wrapper tensor, when the output is not the compute root.
    pub write_root: Option<Arc<Tensor>>,
    pub pool_root: Arc<Tensor>,
    /// Designated source input of the pooling stage (the copy-in tensor).
    pub pool_data: Arc<Tensor>,
    pub pool_stage: StageTensors,
    pub kind: FusionKind,
    pub spec: FusionSpec,
}

impl FusionInfo {
    /// The tensor whose iteration space the loop nest is built on: the
    /// outermost stage root present.
    pub fn schedule_root(&self) -> &Arc<Tensor> {
        if let Some(w) = &self.write_root {
            return w;
        }
        if let Some(q) = self.kind.quant() {
            return &q.root;
        }
        &self.pool_root
    }

    /// The operator's external source feature map: the first placeholder on
    /// the sole-producer chain behind the pooling copy-in.
    pub fn source_input(&self) -> Option<&Arc<Tensor>> {
        let mut cur = &self.pool_data;
        while let Some(input) = cur.sole_input() {
            if input.is_placeholder() {
                return Some(input);
            }
            cur = input;
        }
        None
    }
}

/// Classify the stages around `output`.
///
/// Evaluated in order, short-circuiting: write wrapper first, then the
/// quantize stage, then the pooling root, then the dequantize stage hanging
/// off the pooling stage's designated source input. A tag that indicates a
/// stage whose designated tensor cannot then be located is a fatal
/// configuration error, never silently skipped fusion.
pub fn classify(output: &Arc<Tensor>) -> Result<FusionInfo> {
    let select_write = output.is_select_write();
    let strided_write = output.is_strided_write();
    let (write_root, root) = if select_write || strided_write {
        let inner = output.sole_input().context(ConfigurationSnafu {
            stage: "write",
            detail: format!("write wrapper {:?} must have exactly one input", output.name()),
        })?;
        (Some(Arc::clone(output)), Arc::clone(inner))
    } else {
        (None, Arc::clone(output))
    };

    let (pool_root, quant) = if root.is_quant() {
        let mut tensors = crawl(&root, |t| t.is_placeholder() || t.is_pooling());
        let designated = tensors.get(names::QUANT_INPUT).context(ConfigurationSnafu {
            stage: "quant",
            detail: format!("designated input {:?} not found", names::QUANT_INPUT),
        })?;
        let pool_root = Arc::clone(designated.sole_input().context(ConfigurationSnafu {
            stage: "quant",
            detail: format!("{:?} must be produced by the pooling root alone", names::QUANT_INPUT),
        })?);
        let round_mode = match root.attrs().str(attr_keys::ROUND_MODE) {
            Some(s) => s.parse()?,
            None => RoundMode::default(),
        };
        tensors.insert(root.name().to_owned(), Arc::clone(&root));
        (pool_root, Some(QuantStage { root: Arc::clone(&root), round_mode, tensors }))
    } else {
        (Arc::clone(&root), None)
    };

    if !pool_root.is_pooling() {
        return ConfigurationSnafu {
            stage: "pooling",
            detail: format!("tensor {:?} carries tag {:?}, not a pooling compute", pool_root.name(), pool_root.tag()),
        }
        .fail();
    }

    let mut pool_stage = crawl(&pool_root, |t| t.is_placeholder() || t.is_dequant());
    pool_stage.insert(pool_root.name().to_owned(), Arc::clone(&pool_root));
    let pool_data = Arc::clone(pool_stage.get(names::POOL_DATA).context(ConfigurationSnafu {
        stage: "pooling",
        detail: format!("designated source input {:?} not found", names::POOL_DATA),
    })?);

    let dequant = match pool_data.sole_input() {
        Some(src) if src.is_dequant() => {
            let mut tensors = crawl(src, |t| t.is_placeholder());
            tensors.insert(src.name().to_owned(), Arc::clone(src));
            Some(DequantStage { root: Arc::clone(src), tensors })
        }
        _ => None,
    };

    let kind = match (quant, dequant) {
        (None, None) => FusionKind::None,
        (Some(quant), None) => FusionKind::Quant(quant),
        (None, Some(dequant)) => FusionKind::Dequant(dequant),
        (Some(quant), Some(dequant)) => FusionKind::Both { quant, dequant },
    };
    let spec = FusionSpec::decode(&pool_root)?;

    Ok(FusionInfo { select_write, strided_write, write_root, pool_root, pool_data, pool_stage, kind, spec })
}
