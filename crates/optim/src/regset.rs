//! Sets of frame registers.

use std::fmt;

use bit_set::BitSet;

use dexopt_ir::Reg;

/// A set of registers of one frame, one bit per register.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RegSet(BitSet);

impl RegSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, reg: Reg) -> bool {
        self.0.insert(usize::from(reg.as_u16()))
    }

    pub fn remove(&mut self, reg: Reg) -> bool {
        self.0.remove(usize::from(reg.as_u16()))
    }

    pub fn contains(&self, reg: Reg) -> bool {
        self.0.contains(usize::from(reg.as_u16()))
    }

    pub fn union_with(&mut self, other: &Self) {
        self.0.union_with(&other.0);
    }

    /// Keeps only the registers that are also in `other`.
    pub fn intersect_with(&mut self, other: &Self) {
        self.0.intersect_with(&other.0);
    }

    pub fn is_subset(&self, other: &Self) -> bool {
        self.0.is_subset(&other.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Registers in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = Reg> + '_ {
        self.0.iter().map(|idx| Reg(idx as u16))
    }
}

impl FromIterator<Reg> for RegSet {
    fn from_iter<I: IntoIterator<Item = Reg>>(iter: I) -> Self {
        let mut set = Self::new();
        for reg in iter {
            set.insert(reg);
        }
        set
    }
}

impl fmt::Debug for RegSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
