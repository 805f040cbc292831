//! Splicing of a single-block callee into its caller.
use thiserror::Error;
use tracing::trace;

use dexopt_ir::{InstData, InstId, Method, Reg, SymbolTable};

use super::regframe::{enlarge_frame, grown_size, FrameError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InlineError {
    #[error("no body is available for the callee")]
    NoBody,

    #[error("callee is not a single block ending in a return")]
    NotStraightLine,

    #[error("callee has {len} instructions, more than the limit of {max}")]
    TooLarge { len: usize, max: usize },

    #[error("call passes {found} argument registers, callee expects {expected}")]
    ArityMismatch { expected: usize, found: usize },

    #[error("call result does not match the value the callee returns")]
    ReturnMismatch,

    #[error(transparent)]
    RegisterBudget(#[from] FrameError),
}

/// Replaces `call` in `caller` with the body of `callee`.
///
/// The callee's registers are appended to the caller's frame between its
/// locals and its parameters. Arguments are copied into the callee's
/// parameter registers and the `move-result` following the call, if any,
/// becomes a copy of the returned register. Nothing is changed on error.
pub fn inline_call(
    symbols: &SymbolTable,
    caller: &mut Method,
    call: InstId,
    callee: &Method,
    max_insts: usize,
) -> Result<(), InlineError> {
    let InstData::Invoke { method, ref args, .. } = *caller.inst(call) else {
        panic!("`{call}` is not an invocation");
    };
    let sig = symbols.method(method);

    let mut blocks = callee.layout.iter_block();
    let (Some(block), None) = (blocks.next(), blocks.next()) else {
        return Err(InlineError::NotStraightLine);
    };
    let insts: Vec<_> = callee.layout.iter_inst(block).collect();
    let Some((&ret, body)) = insts.split_last() else {
        return Err(InlineError::NotStraightLine);
    };
    if !callee.inst(ret).is_return()
        || body.iter().any(|&inst| callee.inst(inst).is_terminator())
        || matches!(
            body.first().map(|&inst| callee.inst(inst)),
            Some(InstData::MoveResult { .. })
        )
    {
        return Err(InlineError::NotStraightLine);
    }

    if insts.len() > max_insts {
        return Err(InlineError::TooLarge {
            len: insts.len(),
            max: max_insts,
        });
    }

    let expected = sig.arg_width() as usize;
    if args.len() != expected || callee.ins_size as usize != expected {
        return Err(InlineError::ArityMismatch {
            expected,
            found: args.len(),
        });
    }

    // The instruction receiving the call result.
    let result = caller
        .layout
        .next_inst_of(call)
        .filter(|&next| matches!(caller.inst(next), InstData::MoveResult { .. }));
    let returned = match (callee.inst(ret), result.map(|inst| caller.inst(inst))) {
        (&InstData::Return { kind, src }, Some(&InstData::MoveResult { kind: expect, .. })) => {
            if kind != expect {
                return Err(InlineError::ReturnMismatch);
            }
            Some((kind, src))
        }
        (InstData::ReturnVoid, Some(_)) => return Err(InlineError::ReturnMismatch),
        _ => None,
    };

    grown_size(caller.registers_size, callee.registers_size)?;

    // Validation is done; from here on the caller is rewritten.
    let base = enlarge_frame(caller, callee.registers_size)?;
    let map = |reg: Reg| base.offset(reg.as_u16());

    let InstData::Invoke { args, .. } = caller.inst(call).clone() else {
        unreachable!();
    };
    let mut pos = 0;
    for kind in sig.arg_kinds() {
        let dest = map(callee.first_param_reg().offset(pos));
        let copy = caller.make_inst(InstData::make_move(kind, dest, args[pos as usize]));
        caller.layout.insert_inst_before(copy, call);
        pos += kind.width();
    }

    for &inst in body {
        let mut data = callee.inst(inst).clone();
        data.map_regs(map);
        let new = caller.make_inst(data);
        caller.layout.insert_inst_before(new, call);
    }

    if let (Some(result), Some((kind, src))) = (result, returned) {
        let InstData::MoveResult { dest, .. } = *caller.inst(result) else {
            unreachable!();
        };
        caller.replace_inst(result, InstData::make_move(kind, dest, map(src)));
    }
    caller.layout.remove_inst(call);

    trace!(
        target: "dexopt::remove_builders",
        %call,
        spliced = body.len(),
        extra_regs = callee.registers_size,
        "inlined call"
    );
    Ok(())
}
