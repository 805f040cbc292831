//! Field-value lattice and its transfer function.
//!
//! For every field of the builder the analysis tracks which register, if
//! any, still holds the value last stored into the field. Per field the
//! order is
//!
//! ```text
//!                        Different
//!            /               |              \
//!    Undefined   Overwritten(r, *)   ...  (one chain per register)
//!                   /            \
//!        Register(r, *)     Overwritten(r, w)
//!                   \            /
//!                   Register(r, w)
//!                        |
//!                      Bottom
//! ```
//!
//! where `w` is the originating field write and `*` means the write is not
//! unique. Values of different registers only meet in `Different`.
use smallvec::SmallVec;

use dexopt_ir::{InstData, InstId, Method, Reg, ValueKind};

use super::BuilderDescriptor;
use crate::dataflow::ForwardAnalysis;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue {
    /// Not reached yet. The identity of [`FieldValue::meet`].
    Bottom,

    /// Never written on some path reaching this point.
    Undefined,

    /// The value is held in `reg` on every path.
    Register {
        reg: Reg,
        kind: ValueKind,
        origin: Option<InstId>,
    },

    /// The value was held in `reg` but the register has been redefined on
    /// some path.
    Overwritten {
        reg: Reg,
        kind: ValueKind,
        origin: Option<InstId>,
    },

    /// No unique register holds the value.
    Different,
}

impl FieldValue {
    pub fn meet(self, other: Self) -> Self {
        use FieldValue::*;

        match (self, other) {
            (Bottom, v) | (v, Bottom) => v,
            (Undefined, Undefined) => Undefined,

            (
                Register {
                    reg: r1,
                    kind: k1,
                    origin: o1,
                },
                Register {
                    reg: r2,
                    kind: k2,
                    origin: o2,
                },
            ) if r1 == r2 && k1 == k2 => Register {
                reg: r1,
                kind: k1,
                origin: same_origin(o1, o2),
            },

            (
                Register {
                    reg: r1,
                    kind: k1,
                    origin: o1,
                }
                | Overwritten {
                    reg: r1,
                    kind: k1,
                    origin: o1,
                },
                Register {
                    reg: r2,
                    kind: k2,
                    origin: o2,
                }
                | Overwritten {
                    reg: r2,
                    kind: k2,
                    origin: o2,
                },
            ) if r1 == r2 && k1 == k2 => Overwritten {
                reg: r1,
                kind: k1,
                origin: same_origin(o1, o2),
            },

            _ => Different,
        }
    }

    /// The originating field write, if the value is register-backed and the
    /// write is unique.
    pub fn origin(self) -> Option<InstId> {
        match self {
            Self::Register { origin, .. } | Self::Overwritten { origin, .. } => origin,
            _ => None,
        }
    }

    /// Returns `true` if `self` lies below or at `other`.
    pub fn le(self, other: Self) -> bool {
        self.meet(other) == other
    }
}

fn same_origin(a: Option<InstId>, b: Option<InstId>) -> Option<InstId> {
    if a == b {
        a
    } else {
        None
    }
}

/// The abstract state of every builder field, indexed like
/// [`BuilderDescriptor::fields`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldsRegs {
    values: SmallVec<[FieldValue; 8]>,
}

impl FieldsRegs {
    pub fn new(field_num: usize, value: FieldValue) -> Self {
        Self {
            values: smallvec::smallvec![value; field_num],
        }
    }

    pub fn get(&self, idx: usize) -> FieldValue {
        self.values[idx]
    }

    pub fn set(&mut self, idx: usize, value: FieldValue) {
        self.values[idx] = value;
    }

    pub fn meet_with(&mut self, other: &Self) {
        debug_assert_eq!(self.values.len(), other.values.len());
        for (v, o) in self.values.iter_mut().zip(&other.values) {
            *v = v.meet(*o);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = FieldValue> + '_ {
        self.values.iter().copied()
    }
}

/// Tracks, for every builder field, the register holding its value.
pub struct FieldValueAnalysis<'a> {
    builder: &'a BuilderDescriptor,
}

impl<'a> FieldValueAnalysis<'a> {
    pub fn new(builder: &'a BuilderDescriptor) -> Self {
        Self { builder }
    }

    pub fn apply(&self, data: &InstData, inst: InstId, state: &mut FieldsRegs) {
        for value in state.values.iter_mut() {
            if *value == FieldValue::Bottom {
                *value = FieldValue::Undefined;
            }
        }

        if let Some((dest, dest_kind)) = data.def() {
            for value in state.values.iter_mut() {
                if let FieldValue::Register { reg, kind, origin } = *value {
                    if overlaps(reg, kind, dest, dest_kind) {
                        *value = FieldValue::Overwritten { reg, kind, origin };
                    }
                }
            }
        }

        match data {
            InstData::FieldPut {
                kind, src, field, ..
            } => {
                if let Some(idx) = self.builder.field_index(*field) {
                    state.set(
                        idx,
                        FieldValue::Register {
                            reg: *src,
                            kind: *kind,
                            origin: Some(inst),
                        },
                    );
                }
            }

            // A fresh instance starts with every field unset.
            InstData::NewInstance { ty, .. } if *ty == self.builder.ty => {
                for value in state.values.iter_mut() {
                    *value = FieldValue::Undefined;
                }
            }

            _ => {}
        }
    }
}

impl ForwardAnalysis for FieldValueAnalysis<'_> {
    type State = FieldsRegs;

    fn entry_state(&self) -> FieldsRegs {
        FieldsRegs::new(self.builder.fields.len(), FieldValue::Undefined)
    }

    fn bottom(&self) -> FieldsRegs {
        FieldsRegs::new(self.builder.fields.len(), FieldValue::Bottom)
    }

    fn meet(&self, acc: &mut FieldsRegs, other: &FieldsRegs) {
        acc.meet_with(other);
    }

    fn transfer(&self, method: &Method, inst: InstId, state: &mut FieldsRegs) {
        self.apply(method.inst(inst), inst, state);
    }
}

fn overlaps(a: Reg, a_kind: ValueKind, b: Reg, b_kind: ValueKind) -> bool {
    a.as_u16() < b.as_u16() + b_kind.width() && b.as_u16() < a.as_u16() + a_kind.width()
}
