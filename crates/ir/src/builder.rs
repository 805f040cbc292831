//! Convenience API for constructing method bodies.
use smallvec::SmallVec;

use crate::{
    cursor::{CursorLocation, InstInserter, MethodCursor},
    symbols::{FieldRef, MethodRef, TypeRef},
    BinaryOp, BlockId, CmpOp, InstData, InstId, InvokeKind, Method, Reg, ValueKind,
};

pub struct MethodBuilder {
    pub method: Method,
    pub cursor: InstInserter,
}

impl MethodBuilder {
    pub fn new(method_ref: MethodRef, registers_size: u16, ins_size: u16) -> Self {
        Self {
            method: Method::new(method_ref, registers_size, ins_size),
            cursor: InstInserter::at_location(CursorLocation::NoWhere),
        }
    }

    pub fn build(self) -> Method {
        self.method
    }

    pub fn append_block(&mut self) -> BlockId {
        let block = self.cursor.make_block(&mut self.method);
        self.cursor.append_block(&mut self.method, block);
        block
    }

    pub fn switch_to_block(&mut self, block: BlockId) {
        self.cursor.set_location(CursorLocation::BlockBottom(block));
    }

    /// Inserts an instruction at the current position and moves the cursor
    /// onto it.
    pub fn insert(&mut self, data: InstData) -> InstId {
        let inst = self.cursor.insert_inst_data(&mut self.method, data);
        self.cursor.set_location(CursorLocation::At(inst));
        inst
    }

    pub fn const_narrow(&mut self, dest: Reg, imm: i64) -> InstId {
        self.insert(InstData::Const {
            kind: ValueKind::Narrow,
            dest,
            imm,
        })
    }

    pub fn const_wide(&mut self, dest: Reg, imm: i64) -> InstId {
        self.insert(InstData::Const {
            kind: ValueKind::Wide,
            dest,
            imm,
        })
    }

    pub fn const_null(&mut self, dest: Reg) -> InstId {
        self.insert(InstData::make_zero(ValueKind::Object, dest))
    }

    pub fn mov(&mut self, kind: ValueKind, dest: Reg, src: Reg) -> InstId {
        self.insert(InstData::make_move(kind, dest, src))
    }

    pub fn move_result(&mut self, kind: ValueKind, dest: Reg) -> InstId {
        self.insert(InstData::MoveResult { kind, dest })
    }

    pub fn new_instance(&mut self, dest: Reg, ty: TypeRef) -> InstId {
        self.insert(InstData::NewInstance { dest, ty })
    }

    pub fn field_get(&mut self, kind: ValueKind, dest: Reg, obj: Reg, field: FieldRef) -> InstId {
        self.insert(InstData::FieldGet {
            kind,
            dest,
            obj,
            field,
        })
    }

    pub fn field_put(&mut self, kind: ValueKind, src: Reg, obj: Reg, field: FieldRef) -> InstId {
        self.insert(InstData::FieldPut {
            kind,
            src,
            obj,
            field,
        })
    }

    pub fn invoke(&mut self, code: InvokeKind, method: MethodRef, args: &[Reg]) -> InstId {
        self.insert(InstData::Invoke {
            code,
            method,
            args: SmallVec::from_slice(args),
        })
    }

    pub fn binary(
        &mut self,
        code: BinaryOp,
        kind: ValueKind,
        dest: Reg,
        args: [Reg; 2],
    ) -> InstId {
        self.insert(InstData::Binary {
            code,
            kind,
            dest,
            args,
        })
    }

    pub fn jump(&mut self, dest: BlockId) -> InstId {
        self.insert(InstData::Jump { dest })
    }

    pub fn branch(&mut self, code: CmpOp, args: &[Reg], then: BlockId, else_: BlockId) -> InstId {
        self.insert(InstData::Branch {
            code,
            args: SmallVec::from_slice(args),
            dests: [then, else_],
        })
    }

    pub fn ret(&mut self, kind: ValueKind, src: Reg) -> InstId {
        self.insert(InstData::Return { kind, src })
    }

    pub fn ret_void(&mut self) -> InstId {
        self.insert(InstData::ReturnVoid)
    }
}

pub mod test_util {
    pub use super::MethodBuilder;

    use crate::{
        ir_writer::MethodWriter,
        symbols::{MethodRef, SymbolTable},
        Method,
    };

    /// A symbol table holding a single static no-argument method `LTest;.test`.
    pub fn test_symbols() -> (SymbolTable, MethodRef) {
        let mut symbols = SymbolTable::new();
        let class = symbols.make_type("LTest;");
        let sig = symbols.make_method(class, "test", &[], None, true);
        (symbols, sig)
    }

    pub fn dump_method(symbols: &SymbolTable, method: &Method) -> String {
        MethodWriter::new(symbols, method).dump_string()
    }
}
