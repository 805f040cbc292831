//! This module contains register and value-kind definitions.

use std::fmt;

use cranelift_entity::EntityRef;

/// A virtual register of a method's register frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reg(pub u16);

impl Reg {
    pub fn new(idx: u16) -> Self {
        Self(idx)
    }

    pub fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns the register `offset` slots above `self`.
    pub fn offset(self, offset: u16) -> Self {
        Self(self.0 + offset)
    }

    /// Returns `true` if a value of `kind` held in `self` occupies `other`.
    pub fn covers(self, kind: ValueKind, other: Reg) -> bool {
        other.0 >= self.0 && other.0 < self.0 + kind.width()
    }
}

impl EntityRef for Reg {
    fn new(idx: usize) -> Self {
        debug_assert!(idx <= u16::MAX as usize);
        Self(idx as u16)
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// The category of a value held in registers.
///
/// A [`ValueKind::Wide`] value (`long`/`double`) occupies two consecutive
/// registers; the others occupy one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueKind {
    Narrow,
    Wide,
    Object,
}

impl ValueKind {
    pub fn width(self) -> u16 {
        match self {
            Self::Wide => 2,
            Self::Narrow | Self::Object => 1,
        }
    }

    pub fn is_wide(self) -> bool {
        matches!(self, Self::Wide)
    }

    /// Opcode suffix used by the text format, e.g. `move-wide`.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Narrow => "",
            Self::Wide => "-wide",
            Self::Object => "-object",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Narrow => f.write_str("narrow"),
            Self::Wide => f.write_str("wide"),
            Self::Object => f.write_str("object"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_value_covers_two_registers() {
        let r = Reg(4);
        assert!(r.covers(ValueKind::Wide, Reg(4)));
        assert!(r.covers(ValueKind::Wide, Reg(5)));
        assert!(!r.covers(ValueKind::Wide, Reg(6)));
        assert!(!r.covers(ValueKind::Object, Reg(5)));
        assert!(!r.covers(ValueKind::Narrow, Reg(3)));
    }
}
