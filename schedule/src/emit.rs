//! The emitted schedule object.
//!
//! The code-emission backend consumes a linear record of schedule directives:
//! axis splits and reorders, the core binding, memory-scope assignments,
//! double-buffer/preload flags, buffer-reuse links, compute-at anchors, the
//! cache-read pragma, and per-tensor instruction selections. Directives are
//! recorded in issue order; iteration variables are handles minted by the
//! schedule itself.

use std::collections::BTreeMap;

use crate::fusion::RoundMode;

/// Handle to one loop axis of the emitted nest.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct IterVar {
    pub id: usize,
    pub name: String,
}

impl std::fmt::Display for IterVar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.name, self.id)
    }
}

/// Memory tier a tensor is assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum MemScope {
    /// Off-chip global memory.
    Global,
    /// Large, slower on-chip tier shared by residency-fused operators.
    L1,
    /// Unified buffer: the fast working memory next to the compute units.
    Ubuf,
}

impl std::fmt::Display for MemScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Global => write!(f, "global"),
            Self::L1 => write!(f, "l1"),
            Self::Ubuf => write!(f, "ubuf"),
        }
    }
}

/// Hardware instruction class selected for a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum InsnKind {
    /// Data movement between memory tiers.
    DmaCopy,
    /// Elementwise fill of a pad region.
    VectorDup,
    /// Windowed vector max.
    VectorMax,
    /// Windowed vector average.
    VectorAvg,
    /// Generic elementwise vector op.
    Vector,
    /// Fixed-point conversion with an explicit rounding mode.
    CastRound(RoundMode),
}

impl std::fmt::Display for InsnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DmaCopy => write!(f, "dma_copy"),
            Self::VectorDup => write!(f, "vector_dup"),
            Self::VectorMax => write!(f, "vector_max"),
            Self::VectorAvg => write!(f, "vector_avg"),
            Self::Vector => write!(f, "vector"),
            Self::CastRound(mode) => write!(f, "cast_{mode}"),
        }
    }
}

/// How the core-bound loop may re-read input from cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CacheReadMode {
    /// Overlapping windows, untiled plane: the whole input stays readable.
    FullReuse,
    /// Overlapping windows across tile boundaries: only the halo is re-read.
    HaloReuse,
    /// Disjoint windows, tiled plane: each tile streams once.
    TileStream,
    /// Disjoint windows, untiled plane: plain streaming.
    PlaneStream,
}

/// Joint decision of window overlap and spatial tiling granularity.
pub fn cache_read_mode(overlapping: bool, spatially_tiled: bool) -> CacheReadMode {
    match (overlapping, spatially_tiled) {
        (true, false) => CacheReadMode::FullReuse,
        (true, true) => CacheReadMode::HaloReuse,
        (false, true) => CacheReadMode::TileStream,
        (false, false) => CacheReadMode::PlaneStream,
    }
}

/// One recorded schedule directive.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Step {
    Split { tensor: String, axis: IterVar, factor: i64, outer: IterVar, inner: IterVar },
    Reorder { tensor: String, order: Vec<IterVar> },
    BindCore { tensor: String, axis: IterVar },
    SetScope { tensor: String, scope: MemScope },
    DoubleBuffer { tensor: String },
    Preload { tensor: String },
    /// `tensor` aliases the on-chip storage of `target`.
    ReuseAlias { tensor: String, target: String },
    ComputeAt { tensor: String, under: String, axis: IterVar },
    CacheRead { tensor: String, axis: IterVar, mode: CacheReadMode },
    EmitInsn { tensor: String, axis: Option<IterVar>, kind: InsnKind, params: BTreeMap<String, i64> },
}

/// The schedule handed to the code-emission backend.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Schedule {
    next_var: usize,
    pub steps: Vec<Step>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    fn fresh(&mut self, name: String) -> IterVar {
        let id = self.next_var;
        self.next_var += 1;
        IterVar { id, name }
    }

    /// Mint a root iteration variable.
    pub fn axis(&mut self, name: &str) -> IterVar {
        self.fresh(name.to_owned())
    }

    /// Split `axis` into `(outer, inner)` with `inner` spanning `factor`
    /// iterations.
    pub fn split(&mut self, tensor: &str, axis: &IterVar, factor: i64) -> (IterVar, IterVar) {
        let outer = self.fresh(format!("{}.o", axis.name));
        let inner = self.fresh(format!("{}.i", axis.name));
        self.steps.push(Step::Split {
            tensor: tensor.to_owned(),
            axis: axis.clone(),
            factor,
            outer: outer.clone(),
            inner: inner.clone(),
        });
        (outer, inner)
    }

    pub fn reorder(&mut self, tensor: &str, order: &[IterVar]) {
        self.steps.push(Step::Reorder { tensor: tensor.to_owned(), order: order.to_vec() });
    }

    pub fn bind_core(&mut self, tensor: &str, axis: &IterVar) {
        self.steps.push(Step::BindCore { tensor: tensor.to_owned(), axis: axis.clone() });
    }

    pub fn set_scope(&mut self, tensor: &str, scope: MemScope) {
        self.steps.push(Step::SetScope { tensor: tensor.to_owned(), scope });
    }

    pub fn double_buffer(&mut self, tensor: &str) {
        self.steps.push(Step::DoubleBuffer { tensor: tensor.to_owned() });
    }

    pub fn preload(&mut self, tensor: &str) {
        self.steps.push(Step::Preload { tensor: tensor.to_owned() });
    }

    pub fn reuse_alias(&mut self, tensor: &str, target: &str) {
        self.steps.push(Step::ReuseAlias { tensor: tensor.to_owned(), target: target.to_owned() });
    }

    pub fn compute_at(&mut self, tensor: &str, under: &str, axis: &IterVar) {
        self.steps.push(Step::ComputeAt { tensor: tensor.to_owned(), under: under.to_owned(), axis: axis.clone() });
    }

    pub fn cache_read(&mut self, tensor: &str, axis: &IterVar, mode: CacheReadMode) {
        self.steps.push(Step::CacheRead { tensor: tensor.to_owned(), axis: axis.clone(), mode });
    }

    pub fn emit_insn(&mut self, tensor: &str, axis: Option<&IterVar>, kind: InsnKind, params: BTreeMap<String, i64>) {
        self.steps.push(Step::EmitInsn { tensor: tensor.to_owned(), axis: axis.cloned(), kind, params });
    }

    // ---- queries (used by the pipeline's caller and by tests) ----

    pub fn scope_of(&self, tensor: &str) -> Option<MemScope> {
        self.steps.iter().rev().find_map(|s| match s {
            Step::SetScope { tensor: t, scope } if t == tensor => Some(*scope),
            _ => None,
        })
    }

    pub fn is_double_buffered(&self, tensor: &str) -> bool {
        self.steps.iter().any(|s| matches!(s, Step::DoubleBuffer { tensor: t } if t == tensor))
    }

    pub fn is_preloaded(&self, tensor: &str) -> bool {
        self.steps.iter().any(|s| matches!(s, Step::Preload { tensor: t } if t == tensor))
    }

    pub fn core_bind(&self) -> Option<(&str, &IterVar)> {
        self.steps.iter().find_map(|s| match s {
            Step::BindCore { tensor, axis } => Some((tensor.as_str(), axis)),
            _ => None,
        })
    }

    pub fn reorder_of(&self, tensor: &str) -> Option<&[IterVar]> {
        self.steps.iter().find_map(|s| match s {
            Step::Reorder { tensor: t, order } if t == tensor => Some(order.as_slice()),
            _ => None,
        })
    }

    pub fn insn_of(&self, tensor: &str) -> Option<(InsnKind, &BTreeMap<String, i64>)> {
        self.steps.iter().find_map(|s| match s {
            Step::EmitInsn { tensor: t, kind, params, .. } if t == tensor => Some((*kind, params)),
            _ => None,
        })
    }

    pub fn reuse_target(&self, tensor: &str) -> Option<&str> {
        self.steps.iter().find_map(|s| match s {
            Step::ReuseAlias { tensor: t, target } if t == tensor => Some(target.as_str()),
            _ => None,
        })
    }

    pub fn cache_read_of(&self, tensor: &str) -> Option<(&IterVar, CacheReadMode)> {
        self.steps.iter().find_map(|s| match s {
            Step::CacheRead { tensor: t, axis, mode } if t == tensor => Some((axis, *mode)),
            _ => None,
        })
    }

    pub fn splits_of(&self, tensor: &str) -> Vec<(&IterVar, i64)> {
        self.steps
            .iter()
            .filter_map(|s| match s {
                Step::Split { tensor: t, axis, factor, .. } if t == tensor => Some((axis, *factor)),
                _ => None,
            })
            .collect()
    }

    pub fn compute_at_of(&self, tensor: &str) -> Option<(&str, &IterVar)> {
        self.steps.iter().find_map(|s| match s {
            Step::ComputeAt { tensor: t, under, axis } if t == tensor => Some((under.as_str(), axis)),
            _ => None,
        })
    }
}
