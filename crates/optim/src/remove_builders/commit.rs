use dexopt_ir::{FlushSummary, InstData, Method, MutationBuffer, Reg};

use super::{
    planner::{PlannedReg, RewritePlan},
    regframe::enlarge_frame,
    RemoveBuilderError,
};

/// Applies `plan` to `method`: grows the frame, then inserts the zero
/// constants and moves and deletes the builder instructions in one flush.
pub fn commit(method: &mut Method, plan: RewritePlan) -> Result<FlushSummary, RemoveBuilderError> {
    let first_param = method.first_param_reg();
    let extra = plan.extra_regs;
    let base = enlarge_frame(method, extra)?;

    let resolve = |reg: PlannedReg| -> Reg {
        match reg {
            PlannedReg::Existing(reg) if reg >= first_param => reg.offset(extra),
            PlannedReg::Existing(reg) => reg,
            PlannedReg::Fresh(slot) => base.offset(slot),
        }
    };

    let mut buffer = MutationBuffer::new();
    for (slot, kind) in plan.null_inits {
        buffer.insert_at_entry(InstData::make_zero(kind, base.offset(slot)));
    }
    for (anchor, mv) in plan.moves {
        buffer.insert_after(
            anchor,
            InstData::make_move(mv.kind, resolve(mv.dest), resolve(mv.src)),
        );
    }
    for inst in plan.deletes {
        buffer.remove(inst);
    }

    Ok(buffer.flush(method)?)
}
