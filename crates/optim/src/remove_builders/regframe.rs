use thiserror::Error;

use dexopt_ir::{Method, Reg};

/// Hard ceiling on the register frame of a rewritten method.
pub const MAX_REGISTERS: u16 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("register frame of {current} cannot grow by {extra} (limit {MAX_REGISTERS})")]
pub struct FrameError {
    pub current: u16,
    pub extra: u16,
}

/// Returns the frame size after adding `extra` registers.
pub fn grown_size(current: u16, extra: u16) -> Result<u16, FrameError> {
    current
        .checked_add(extra)
        .filter(|&size| size <= MAX_REGISTERS)
        .ok_or(FrameError { current, extra })
}

/// Grows the frame of `method` by `extra` registers and returns the first new
/// register. The method is untouched on error.
pub fn enlarge_frame(method: &mut Method, extra: u16) -> Result<Reg, FrameError> {
    grown_size(method.registers_size, extra)?;
    Ok(method.grow_frame(extra))
}
