use crate::{BlockId, InstData, InstId, Method};

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorLocation {
    At(InstId),
    BlockTop(BlockId),
    BlockBottom(BlockId),
    #[default]
    NoWhere,
}

pub trait MethodCursor {
    fn at_location(loc: CursorLocation) -> Self;
    fn set_location(&mut self, loc: CursorLocation);
    fn loc(&self) -> CursorLocation;

    fn set_to_entry(&mut self, method: &Method) {
        let loc = if let Some(entry) = method.layout.entry_block() {
            CursorLocation::BlockTop(entry)
        } else {
            CursorLocation::NoWhere
        };

        self.set_location(loc);
    }

    fn insert_inst(&mut self, method: &mut Method, inst: InstId) {
        match self.loc() {
            CursorLocation::At(at) => method.layout.insert_inst_after(inst, at),
            CursorLocation::BlockTop(block) => method.layout.prepend_inst(inst, block),
            CursorLocation::BlockBottom(block) => method.layout.append_inst(inst, block),
            CursorLocation::NoWhere => panic!("cursor loc points to `NoWhere`"),
        }
    }

    fn append_inst(&mut self, method: &mut Method, inst: InstId) {
        let current_block = self.expect_block(method);
        method.layout.append_inst(inst, current_block);
    }

    fn insert_inst_data(&mut self, method: &mut Method, data: InstData) -> InstId {
        let inst = method.make_inst(data);
        self.insert_inst(method, inst);
        inst
    }

    fn append_inst_data(&mut self, method: &mut Method, data: InstData) -> InstId {
        let inst = method.make_inst(data);
        self.append_inst(method, inst);
        inst
    }

    fn replace(&mut self, method: &mut Method, data: InstData) {
        let inst = self.expect_inst();
        method.replace_inst(inst, data);
    }

    /// Removes the instruction under the cursor and moves to the next
    /// location.
    fn remove_inst(&mut self, method: &mut Method) {
        let inst = self.expect_inst();
        let next_loc = self.next_loc(method);
        method.layout.remove_inst(inst);
        self.set_location(next_loc);
    }

    fn make_block(&mut self, method: &mut Method) -> BlockId {
        method.make_block()
    }

    fn append_block(&mut self, method: &mut Method, block: BlockId) {
        method.layout.append_block(block);
    }

    fn inst(&self) -> Option<InstId> {
        if let CursorLocation::At(inst) = self.loc() {
            Some(inst)
        } else {
            None
        }
    }

    fn expect_inst(&self) -> InstId {
        self.inst()
            .expect("current cursor location doesn't point to inst")
    }

    fn block(&self, method: &Method) -> Option<BlockId> {
        match self.loc() {
            CursorLocation::At(inst) => Some(method.layout.inst_block(inst)),
            CursorLocation::BlockTop(block) | CursorLocation::BlockBottom(block) => Some(block),
            CursorLocation::NoWhere => None,
        }
    }

    fn expect_block(&self, method: &Method) -> BlockId {
        self.block(method).expect("cursor loc points to `NoWhere`")
    }

    fn next_loc(&self, method: &Method) -> CursorLocation {
        match self.loc() {
            CursorLocation::At(inst) => method.layout.next_inst_of(inst).map_or_else(
                || CursorLocation::BlockBottom(method.layout.inst_block(inst)),
                CursorLocation::At,
            ),
            CursorLocation::BlockTop(block) => method
                .layout
                .first_inst_of(block)
                .map_or_else(|| CursorLocation::BlockBottom(block), CursorLocation::At),
            CursorLocation::BlockBottom(block) => method
                .layout
                .next_block_of(block)
                .map_or(CursorLocation::NoWhere, CursorLocation::BlockTop),
            CursorLocation::NoWhere => CursorLocation::NoWhere,
        }
    }

    fn proceed(&mut self, method: &Method) {
        self.set_location(self.next_loc(method));
    }
}

/// A cursor that inserts after its current location and then stays put.
#[derive(Debug)]
pub struct InstInserter {
    loc: CursorLocation,
}

impl MethodCursor for InstInserter {
    fn at_location(loc: CursorLocation) -> Self {
        Self { loc }
    }

    fn set_location(&mut self, loc: CursorLocation) {
        self.loc = loc;
    }

    fn loc(&self) -> CursorLocation {
        self.loc
    }
}
