//! This module contains register bytecode instruction definitions.

use std::fmt;

use cranelift_entity::entity_impl;
use smallvec::{smallvec, SmallVec};

use crate::{
    symbols::{FieldRef, MethodRef, TypeRef},
    BlockId, Reg, ValueKind,
};

/// An opaque reference to [`InstData`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstId(pub u32);
entity_impl!(InstId, "inst");

/// The coarse category of an instruction, as seen by analyses that only care
/// about object and field traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstCategory {
    FieldRead,
    FieldWrite,
    AllocateObject,
    InvokeMethod,
    RegisterMove,
    ConstantLoad,
    Other,
}

/// An instruction data definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InstData {
    /// Load a literal. An [`ValueKind::Object`] constant is always `null`.
    Const { kind: ValueKind, dest: Reg, imm: i64 },

    /// Register to register copy.
    Move { kind: ValueKind, dest: Reg, src: Reg },

    /// Copy the result of the preceding invocation.
    MoveResult { kind: ValueKind, dest: Reg },

    /// Allocate an uninitialized instance of `ty`.
    NewInstance { dest: Reg, ty: TypeRef },

    /// Read an instance field: `dest = obj.field`.
    FieldGet {
        kind: ValueKind,
        dest: Reg,
        obj: Reg,
        field: FieldRef,
    },

    /// Write an instance field: `obj.field = src`.
    FieldPut {
        kind: ValueKind,
        src: Reg,
        obj: Reg,
        field: FieldRef,
    },

    /// Method invocation. Wide arguments list both of their registers.
    Invoke {
        code: InvokeKind,
        method: MethodRef,
        args: SmallVec<[Reg; 4]>,
    },

    /// Binary arithmetic on narrow or wide operands.
    Binary {
        code: BinaryOp,
        kind: ValueKind,
        dest: Reg,
        args: [Reg; 2],
    },

    /// Unconditional jump.
    Jump { dest: BlockId },

    /// Conditional branch. A single argument is compared against zero.
    Branch {
        code: CmpOp,
        args: SmallVec<[Reg; 2]>,
        dests: [BlockId; 2],
    },

    /// Return a value.
    Return { kind: ValueKind, src: Reg },

    /// Return without a value.
    ReturnVoid,
}

impl InstData {
    pub fn make_move(kind: ValueKind, dest: Reg, src: Reg) -> Self {
        Self::Move { kind, dest, src }
    }

    /// The zero literal of `kind`, i.e. `0`, `0L` or `null`.
    pub fn make_zero(kind: ValueKind, dest: Reg) -> Self {
        Self::Const { kind, dest, imm: 0 }
    }

    pub fn category(&self) -> InstCategory {
        match self {
            Self::FieldGet { .. } => InstCategory::FieldRead,
            Self::FieldPut { .. } => InstCategory::FieldWrite,
            Self::NewInstance { .. } => InstCategory::AllocateObject,
            Self::Invoke { .. } => InstCategory::InvokeMethod,
            Self::Move { .. } | Self::MoveResult { .. } => InstCategory::RegisterMove,
            Self::Const { .. } => InstCategory::ConstantLoad,
            _ => InstCategory::Other,
        }
    }

    /// Returns the register this instruction defines together with the kind
    /// of the defined value.
    pub fn def(&self) -> Option<(Reg, ValueKind)> {
        match self {
            Self::Const { kind, dest, .. }
            | Self::Move { kind, dest, .. }
            | Self::MoveResult { kind, dest }
            | Self::FieldGet { kind, dest, .. }
            | Self::Binary { kind, dest, .. } => Some((*dest, *kind)),
            Self::NewInstance { dest, .. } => Some((*dest, ValueKind::Object)),
            _ => None,
        }
    }

    /// Returns all registers written by this instruction. The upper half of a
    /// wide definition is included.
    pub fn defs(&self) -> SmallVec<[Reg; 2]> {
        match self.def() {
            Some((dest, kind)) => (0..kind.width()).map(|i| dest.offset(i)).collect(),
            None => SmallVec::new(),
        }
    }

    /// Returns all registers read by this instruction. The upper half of a
    /// wide operand is included.
    pub fn uses(&self) -> SmallVec<[Reg; 4]> {
        let mut uses = SmallVec::new();
        self.for_each_use(|reg| uses.push(reg));
        uses
    }

    pub fn for_each_use(&self, mut f: impl FnMut(Reg)) {
        fn wide(kind: ValueKind, reg: Reg, f: &mut dyn FnMut(Reg)) {
            for i in 0..kind.width() {
                f(reg.offset(i))
            }
        }

        match self {
            Self::Move { kind, src, .. } | Self::Return { kind, src } => wide(*kind, *src, &mut f),
            Self::FieldGet { obj, .. } => f(*obj),
            Self::FieldPut { kind, src, obj, .. } => {
                wide(*kind, *src, &mut f);
                f(*obj);
            }
            Self::Invoke { args, .. } => args.iter().copied().for_each(f),
            Self::Binary { kind, args, .. } => {
                wide(*kind, args[0], &mut f);
                wide(*kind, args[1], &mut f);
            }
            Self::Branch { args, .. } => args.iter().copied().for_each(f),
            Self::Const { .. }
            | Self::MoveResult { .. }
            | Self::NewInstance { .. }
            | Self::Jump { .. }
            | Self::ReturnVoid => {}
        }
    }

    /// Applies `f` to every register operand, definitions included.
    pub fn map_regs(&mut self, mut f: impl FnMut(Reg) -> Reg) {
        match self {
            Self::Const { dest, .. }
            | Self::MoveResult { dest, .. }
            | Self::NewInstance { dest, .. } => *dest = f(*dest),
            Self::Move { dest, src, .. } => {
                *dest = f(*dest);
                *src = f(*src);
            }
            Self::FieldGet { dest, obj, .. } => {
                *dest = f(*dest);
                *obj = f(*obj);
            }
            Self::FieldPut { src, obj, .. } => {
                *src = f(*src);
                *obj = f(*obj);
            }
            Self::Invoke { args, .. } => {
                for arg in args.iter_mut() {
                    *arg = f(*arg);
                }
            }
            Self::Branch { args, .. } => {
                for arg in args.iter_mut() {
                    *arg = f(*arg);
                }
            }
            Self::Binary { dest, args, .. } => {
                *dest = f(*dest);
                for arg in args.iter_mut() {
                    *arg = f(*arg);
                }
            }
            Self::Return { src, .. } => *src = f(*src),
            Self::Jump { .. } | Self::ReturnVoid => {}
        }
    }

    pub fn field(&self) -> Option<FieldRef> {
        match self {
            Self::FieldGet { field, .. } | Self::FieldPut { field, .. } => Some(*field),
            _ => None,
        }
    }

    pub fn invoked(&self) -> Option<MethodRef> {
        match self {
            Self::Invoke { method, .. } => Some(*method),
            _ => None,
        }
    }

    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Self::Jump { .. } | Self::Branch { .. } | Self::Return { .. } | Self::ReturnVoid
        )
    }

    pub fn is_return(&self) -> bool {
        matches!(self, Self::Return { .. } | Self::ReturnVoid)
    }

    pub fn branch_dests(&self) -> SmallVec<[BlockId; 2]> {
        match self {
            Self::Jump { dest } => smallvec![*dest],
            Self::Branch { dests, .. } => {
                if dests[0] == dests[1] {
                    smallvec![dests[0]]
                } else {
                    dests.iter().copied().collect()
                }
            }
            _ => SmallVec::new(),
        }
    }

    pub fn rewrite_branch_dest(&mut self, from: BlockId, to: BlockId) {
        match self {
            Self::Jump { dest } => {
                if *dest == from {
                    *dest = to;
                }
            }
            Self::Branch { dests, .. } => {
                for dest in dests.iter_mut() {
                    if *dest == from {
                        *dest = to;
                    }
                }
            }
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvokeKind {
    Virtual,
    Direct,
    Static,
}

impl InvokeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Virtual => "invoke-virtual",
            Self::Direct => "invoke-direct",
            Self::Static => "invoke-static",
        }
    }
}

impl fmt::Display for InvokeKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    And,
    Or,
    Xor,
}

impl BinaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

impl CmpOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Lt => "lt",
            Self::Ge => "ge",
            Self::Gt => "gt",
            Self::Le => "le",
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
