//! Tracking of registers that hold the builder reference.
//!
//! Removing the builder is only complete if its reference is never observed
//! by anything but the instructions the rewrite deletes. The analysis follows
//! the reference from its allocation through object moves and checks every
//! use of a register that may hold it.
use rustc_hash::FxHashSet;

use dexopt_ir::{ControlFlowGraph, InstData, InstId, Method, Reg, SymbolTable, ValueKind};

use super::{BuilderDescriptor, RemoveBuilderError};
use crate::{
    regset::RegSet,
    dataflow::{ForwardAnalysis, ForwardSolver},
};

/// Registers that may (`may`) or must (`must`) hold the builder reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaintState {
    reached: bool,
    pub may: RegSet,
    pub must: RegSet,
}

impl TaintState {
    fn unreached() -> Self {
        Self {
            reached: false,
            may: RegSet::new(),
            must: RegSet::new(),
        }
    }

    fn clear(&mut self, reg: Reg) {
        self.may.remove(reg);
        self.must.remove(reg);
    }
}

pub struct TaintedRegs<'a> {
    builder: &'a BuilderDescriptor,
}

impl<'a> TaintedRegs<'a> {
    pub fn new(builder: &'a BuilderDescriptor) -> Self {
        Self { builder }
    }
}

impl ForwardAnalysis for TaintedRegs<'_> {
    type State = TaintState;

    fn entry_state(&self) -> TaintState {
        TaintState {
            reached: true,
            ..TaintState::unreached()
        }
    }

    fn bottom(&self) -> TaintState {
        TaintState::unreached()
    }

    fn meet(&self, acc: &mut TaintState, other: &TaintState) {
        if !other.reached {
            return;
        }
        if !acc.reached {
            *acc = other.clone();
            return;
        }

        acc.may.union_with(&other.may);
        acc.must.intersect_with(&other.must);
    }

    fn transfer(&self, method: &Method, inst: InstId, state: &mut TaintState) {
        let data = method.inst(inst);
        match *data {
            InstData::NewInstance { dest, ty } if ty == self.builder.ty => {
                state.may.insert(dest);
                state.must.insert(dest);
            }

            InstData::Move {
                kind: ValueKind::Object,
                dest,
                src,
            } if state.may.contains(src) => {
                let must = state.must.contains(src);
                state.may.insert(dest);
                if must {
                    state.must.insert(dest);
                } else {
                    state.must.remove(dest);
                }
            }

            _ => {
                for reg in data.defs() {
                    state.clear(reg);
                }
            }
        }
    }
}

/// Result of following the builder reference through a method.
#[derive(Debug, Default)]
pub struct BuilderRefs {
    /// Object moves that copy the builder reference.
    pub moves: FxHashSet<InstId>,

    /// The first instruction that observes the reference in a way the rewrite
    /// cannot remove.
    pub escape: Option<InstId>,
}

impl BuilderRefs {
    pub fn compute(
        symbols: &SymbolTable,
        method: &Method,
        cfg: &ControlFlowGraph,
        builder: &BuilderDescriptor,
    ) -> Self {
        let analysis = TaintedRegs::new(builder);
        let mut solver = ForwardSolver::new();
        solver.compute(method, cfg, &analysis);

        let mut refs = Self::default();
        for block in method.layout.iter_block() {
            let res = solver.try_replay(method, &analysis, block, |inst, state| {
                let data = method.inst(inst);
                if !is_allowed(symbols, builder, data, state) {
                    return Err(inst);
                }
                if let InstData::Move {
                    kind: ValueKind::Object,
                    src,
                    ..
                } = *data
                {
                    if state.must.contains(src) {
                        refs.moves.insert(inst);
                    }
                }
                Ok(())
            });

            if let Err(inst) = res {
                refs.escape = Some(inst);
                break;
            }
        }

        refs
    }

    pub fn check(&self) -> Result<(), RemoveBuilderError> {
        match self.escape {
            Some(inst) => Err(RemoveBuilderError::BuilderEscapes(inst)),
            None => Ok(()),
        }
    }
}

/// Returns `true` if every use `data` makes of a possibly tainted register is
/// one the rewrite deletes, and every builder access goes through the local
/// builder.
fn is_allowed(
    symbols: &SymbolTable,
    builder: &BuilderDescriptor,
    data: &InstData,
    state: &TaintState,
) -> bool {
    let is_builder_field = |field| symbols.field(field).class == builder.ty;

    // The operand through which the rewrite may see the builder.
    let carrier = match data {
        InstData::FieldGet { obj, field, .. } | InstData::FieldPut { obj, field, .. }
            if is_builder_field(*field) =>
        {
            Some(*obj)
        }
        InstData::Invoke { method, args, .. } if builder.is_constructor(symbols, *method) => {
            args.first().copied()
        }
        InstData::Move {
            kind: ValueKind::Object,
            src,
            ..
        } if state.may.contains(*src) => Some(*src),
        _ => None,
    };

    if let Some(carrier) = carrier {
        if !state.must.contains(carrier) {
            return false;
        }
    }

    let mut seen_carrier = false;
    let mut allowed = true;
    data.for_each_use(|reg| {
        if Some(reg) == carrier && !seen_carrier {
            seen_carrier = true;
        } else if state.may.contains(reg) {
            allowed = false;
        }
    });
    allowed
}
