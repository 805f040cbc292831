use std::ops::Range;

use cranelift_entity::{entity_impl, PrimaryMap};

use crate::{
    symbols::{MethodRef, SymbolTable, TypeRef},
    InstData, InstId, Layout, Reg,
};

/// An opaque reference to [`Block`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);
entity_impl!(BlockId, "block");

/// A basic block. Its instructions live in the [`Layout`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {}

/// A method body together with its register frame.
///
/// The frame holds `registers_size` registers. Incoming parameters occupy the
/// highest `ins_size` of them, so the receiver of an instance method is
/// `v{registers_size - ins_size}`.
#[derive(Debug, Clone)]
pub struct Method {
    pub method_ref: MethodRef,
    pub registers_size: u16,
    pub ins_size: u16,
    pub insts: PrimaryMap<InstId, InstData>,
    pub blocks: PrimaryMap<BlockId, Block>,
    pub layout: Layout,
}

impl Method {
    pub fn new(method_ref: MethodRef, registers_size: u16, ins_size: u16) -> Self {
        debug_assert!(ins_size <= registers_size);
        Self {
            method_ref,
            registers_size,
            ins_size,
            insts: PrimaryMap::new(),
            blocks: PrimaryMap::new(),
            layout: Layout::new(),
        }
    }

    pub fn make_block(&mut self) -> BlockId {
        self.blocks.push(Block::default())
    }

    /// Creates a detached instruction. It has no effect until inserted into
    /// the layout.
    pub fn make_inst(&mut self, data: InstData) -> InstId {
        self.insts.push(data)
    }

    pub fn inst(&self, inst: InstId) -> &InstData {
        &self.insts[inst]
    }

    pub fn replace_inst(&mut self, inst: InstId, data: InstData) {
        self.insts[inst] = data;
    }

    /// Number of registers not holding incoming parameters.
    pub fn locals_size(&self) -> u16 {
        self.registers_size - self.ins_size
    }

    pub fn first_param_reg(&self) -> Reg {
        Reg(self.locals_size())
    }

    pub fn param_regs(&self) -> Range<u16> {
        self.locals_size()..self.registers_size
    }

    pub fn is_param(&self, reg: Reg) -> bool {
        self.param_regs().contains(&reg.0)
    }

    /// Adds `extra` registers to the frame and returns the first of them.
    ///
    /// The new registers are placed right after the locals; parameter
    /// registers move up by `extra` and every instruction is renumbered
    /// accordingly. The caller is responsible for the frame ceiling.
    pub fn grow_frame(&mut self, extra: u16) -> Reg {
        let first = self.first_param_reg();
        if extra == 0 {
            return first;
        }

        for data in self.insts.values_mut() {
            data.map_regs(|reg| if reg >= first { reg.offset(extra) } else { reg });
        }
        self.registers_size += extra;
        first
    }

    /// Returns `true` if any instruction in the layout allocates, accesses a
    /// field of, or invokes a method of `ty`.
    pub fn mentions_type(&self, symbols: &SymbolTable, ty: TypeRef) -> bool {
        self.layout
            .iter_all_inst()
            .any(|inst| inst_mentions_type(symbols, self.inst(inst), ty))
    }
}

pub fn inst_mentions_type(symbols: &SymbolTable, data: &InstData, ty: TypeRef) -> bool {
    match data {
        InstData::NewInstance { ty: allocated, .. } => *allocated == ty,
        InstData::FieldGet { field, .. } | InstData::FieldPut { field, .. } => {
            symbols.field(*field).class == ty
        }
        InstData::Invoke { method, .. } => symbols.method(*method).class == ty,
        _ => false,
    }
}
