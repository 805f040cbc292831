use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use dexopt_ir::{InstData, InstId, Method, Reg, SymbolTable, ValueKind};

use super::{
    lattice::{FieldValue, FieldValueAnalysis, FieldsRegs},
    BuilderDescriptor, BuilderRefs, RemoveBuilderError,
};
use crate::dataflow::ForwardSolver;

/// A register operand of a planned move.
///
/// Registers are numbered against the frame before it grows; fresh
/// registers are slots in the block of registers the commit adds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedReg {
    Existing(Reg),
    Fresh(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedMove {
    pub kind: ValueKind,
    pub dest: PlannedReg,
    pub src: PlannedReg,
}

/// The complete rewrite of one method, computed before anything is mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewritePlan {
    /// Zero constants loaded at method entry, by fresh slot.
    pub null_inits: SmallVec<[(u16, ValueKind); 2]>,

    /// Moves inserted right after their anchor, in order.
    pub moves: Vec<(InstId, PlannedMove)>,

    pub deletes: Vec<InstId>,

    /// Number of fresh registers the plan uses.
    pub extra_regs: u16,
}

pub struct Planner<'a> {
    symbols: &'a SymbolTable,
    builder: &'a BuilderDescriptor,

    plan: RewritePlan,
    /// Shared zero register for narrow and object reads.
    null: Option<u16>,
    /// Zero register pair for wide reads.
    wide_null: Option<u16>,
    /// Bridge slot of every field write that needed one.
    bridges: FxHashMap<InstId, u16>,
}

impl<'a> Planner<'a> {
    pub fn new(symbols: &'a SymbolTable, builder: &'a BuilderDescriptor) -> Self {
        Self {
            symbols,
            builder,
            plan: RewritePlan::default(),
            null: None,
            wide_null: None,
            bridges: FxHashMap::default(),
        }
    }

    /// Classifies every builder-related instruction, in block order.
    pub fn plan(
        mut self,
        method: &Method,
        solver: &ForwardSolver<FieldsRegs>,
        analysis: &FieldValueAnalysis,
        refs: &BuilderRefs,
    ) -> Result<RewritePlan, RemoveBuilderError> {
        for block in method.layout.iter_block() {
            // Unreachable blocks lose their builder instructions but get no
            // replacement reads.
            let mut state = solver.block_entry(block).cloned();

            for inst in method.layout.iter_inst(block) {
                let data = method.inst(inst);
                self.classify(method, inst, data, state.as_ref(), refs)?;
                if let Some(state) = &mut state {
                    analysis.apply(data, inst, state);
                }
            }
        }

        Ok(self.plan)
    }

    fn classify(
        &mut self,
        method: &Method,
        inst: InstId,
        data: &InstData,
        state: Option<&FieldsRegs>,
        refs: &BuilderRefs,
    ) -> Result<(), RemoveBuilderError> {
        match *data {
            InstData::FieldPut { field, .. } if self.is_builder_field(field) => {
                self.plan.deletes.push(inst);
            }

            InstData::FieldGet {
                kind, dest, field, ..
            } if self.is_builder_field(field) => {
                let Some(idx) = self.builder.field_index(field) else {
                    panic!("`{inst}` reads a field the builder does not declare");
                };
                if let Some(state) = state {
                    self.plan_read(method, inst, kind, dest, state.get(idx))?;
                }
                self.plan.deletes.push(inst);
            }

            InstData::NewInstance { ty, .. } if ty == self.builder.ty => {
                self.plan.deletes.push(inst);
            }

            InstData::Invoke { method: callee, .. }
                if self.builder.is_constructor(self.symbols, callee) =>
            {
                self.plan.deletes.push(inst);
            }

            InstData::Move { .. } if refs.moves.contains(&inst) => {
                self.plan.deletes.push(inst);
            }

            _ => {}
        }

        Ok(())
    }

    fn plan_read(
        &mut self,
        method: &Method,
        read: InstId,
        kind: ValueKind,
        dest: Reg,
        value: FieldValue,
    ) -> Result<(), RemoveBuilderError> {
        let src = match value {
            FieldValue::Different => return Err(RemoveBuilderError::AmbiguousFieldValue(read)),

            FieldValue::Bottom | FieldValue::Undefined => PlannedReg::Fresh(self.null_slot(kind)),

            FieldValue::Register { reg, origin, .. } => {
                match origin.and_then(|write| self.bridges.get(&write)) {
                    Some(&slot) => PlannedReg::Fresh(slot),
                    None if reg == dest => return Ok(()),
                    None => PlannedReg::Existing(reg),
                }
            }

            FieldValue::Overwritten { origin: None, .. } => {
                return Err(RemoveBuilderError::UnresolvedOriginatingWrite(read))
            }

            FieldValue::Overwritten {
                origin: Some(write),
                ..
            } => PlannedReg::Fresh(self.bridge_slot(method, write)),
        };

        self.plan.moves.push((
            read,
            PlannedMove {
                kind,
                dest: PlannedReg::Existing(dest),
                src,
            },
        ));
        Ok(())
    }

    fn null_slot(&mut self, kind: ValueKind) -> u16 {
        let (slot, init_kind) = if kind.is_wide() {
            (&mut self.wide_null, ValueKind::Wide)
        } else {
            (&mut self.null, ValueKind::Narrow)
        };

        if let Some(slot) = *slot {
            return slot;
        }
        let new = self.plan.extra_regs;
        self.plan.extra_regs += init_kind.width();
        *slot = Some(new);
        self.plan.null_inits.push((new, init_kind));
        new
    }

    /// Returns the bridge register of `write`, planning the copy right after
    /// the write on first use.
    fn bridge_slot(&mut self, method: &Method, write: InstId) -> u16 {
        if let Some(&slot) = self.bridges.get(&write) {
            return slot;
        }

        let InstData::FieldPut { kind, src, .. } = *method.inst(write) else {
            panic!("originating write `{write}` is not a field write");
        };

        let slot = self.plan.extra_regs;
        self.plan.extra_regs += kind.width();
        self.bridges.insert(write, slot);
        self.plan.moves.push((
            write,
            PlannedMove {
                kind,
                dest: PlannedReg::Fresh(slot),
                src: PlannedReg::Existing(src),
            },
        ));
        slot
    }

    fn is_builder_field(&self, field: dexopt_ir::FieldRef) -> bool {
        self.symbols.field(field).class == self.builder.ty
    }
}
