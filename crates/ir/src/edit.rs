//! Deferred method mutation.
//!
//! Passes record insertions and removals in a [`MutationBuffer`] while they
//! still read the method, then apply everything with a single
//! [`MutationBuffer::flush`]. The flush validates every referenced instruction
//! before touching the layout, so a rejected buffer leaves the method as it
//! was.
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use crate::{
    cursor::{CursorLocation, InstInserter, MethodCursor},
    InstData, InstId, Method,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("insertion anchor `{0}` is not in the layout")]
    AnchorNotInserted(InstId),

    #[error("`{0}` is scheduled for removal but is not in the layout")]
    RemovedNotInserted(InstId),

    #[error("`{0}` is scheduled for removal twice")]
    DuplicateRemoval(InstId),

    #[error("entry insertion requested for a method without blocks")]
    MissingEntryBlock,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushSummary {
    pub inserted: usize,
    pub removed: usize,
}

#[derive(Debug, Default)]
pub struct MutationBuffer {
    at_entry: Vec<InstData>,
    after: Vec<(InstId, InstData)>,
    removals: Vec<InstId>,
}

impl MutationBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.at_entry.is_empty() && self.after.is_empty() && self.removals.is_empty()
    }

    /// Schedules `data` at the top of the entry block, after earlier entry
    /// insertions.
    pub fn insert_at_entry(&mut self, data: InstData) {
        self.at_entry.push(data);
    }

    /// Schedules `data` right after `anchor`, after earlier insertions with the
    /// same anchor. The anchor may itself be scheduled for removal.
    pub fn insert_after(&mut self, anchor: InstId, data: InstData) {
        self.after.push((anchor, data));
    }

    pub fn remove(&mut self, inst: InstId) {
        self.removals.push(inst);
    }

    pub fn flush(self, method: &mut Method) -> Result<FlushSummary, EditError> {
        self.validate(method)?;

        let mut summary = FlushSummary::default();
        let mut cursor = InstInserter::at_location(CursorLocation::NoWhere);

        if !self.at_entry.is_empty() {
            cursor.set_to_entry(method);
            for data in self.at_entry {
                let inst = cursor.insert_inst_data(method, data);
                cursor.set_location(CursorLocation::At(inst));
                summary.inserted += 1;
            }
        }

        let mut last_after: FxHashMap<InstId, InstId> = FxHashMap::default();
        for (anchor, data) in self.after {
            let pos = last_after.get(&anchor).copied().unwrap_or(anchor);
            cursor.set_location(CursorLocation::At(pos));
            let inst = cursor.insert_inst_data(method, data);
            last_after.insert(anchor, inst);
            summary.inserted += 1;
        }

        for inst in self.removals {
            method.layout.remove_inst(inst);
            summary.removed += 1;
        }

        Ok(summary)
    }

    fn validate(&self, method: &Method) -> Result<(), EditError> {
        if !self.at_entry.is_empty() && method.layout.entry_block().is_none() {
            return Err(EditError::MissingEntryBlock);
        }

        let is_inserted = |inst: InstId| {
            method.insts.is_valid(inst) && method.layout.is_inst_inserted(inst)
        };

        if let Some(&(anchor, _)) = self.after.iter().find(|(anchor, _)| !is_inserted(*anchor)) {
            return Err(EditError::AnchorNotInserted(anchor));
        }

        let mut seen = FxHashSet::default();
        for &inst in &self.removals {
            if !is_inserted(inst) {
                return Err(EditError::RemovedNotInserted(inst));
            }
            if !seen.insert(inst) {
                return Err(EditError::DuplicateRemoval(inst));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{builder::test_util::*, Reg, ValueKind};

    #[test]
    fn inserts_take_place_of_removed_anchor() {
        let (_, sig) = test_symbols();
        let mut builder = MethodBuilder::new(sig, 4, 0);
        let b0 = builder.append_block();
        builder.switch_to_block(b0);
        let c0 = builder.const_narrow(Reg(0), 1);
        let c1 = builder.const_narrow(Reg(1), 2);
        let ret = builder.ret_void();
        let mut method = builder.build();

        let mut buffer = MutationBuffer::new();
        buffer.insert_after(c1, InstData::make_move(ValueKind::Narrow, Reg(2), Reg(0)));
        buffer.insert_at_entry(InstData::make_zero(ValueKind::Object, Reg(3)));
        buffer.insert_after(c1, InstData::make_move(ValueKind::Narrow, Reg(3), Reg(1)));
        buffer.remove(c1);
        let summary = buffer.flush(&mut method).unwrap();
        assert_eq!(summary, FlushSummary { inserted: 3, removed: 1 });

        let order: Vec<_> = method
            .layout
            .iter_inst(b0)
            .map(|inst| method.inst(inst).clone())
            .collect();
        assert_eq!(
            order,
            vec![
                InstData::make_zero(ValueKind::Object, Reg(3)),
                method.inst(c0).clone(),
                InstData::make_move(ValueKind::Narrow, Reg(2), Reg(0)),
                InstData::make_move(ValueKind::Narrow, Reg(3), Reg(1)),
                InstData::ReturnVoid,
            ]
        );
        assert!(method.layout.is_inst_inserted(ret));
    }

    #[test]
    fn rejected_buffer_leaves_method_untouched() {
        let (symbols, sig) = test_symbols();
        let mut builder = MethodBuilder::new(sig, 2, 0);
        let b0 = builder.append_block();
        builder.switch_to_block(b0);
        let c0 = builder.const_narrow(Reg(0), 1);
        builder.ret_void();
        let mut method = builder.build();
        let before = dump_method(&symbols, &method);

        let detached = method.make_inst(InstData::ReturnVoid);
        let mut buffer = MutationBuffer::new();
        buffer.insert_after(c0, InstData::make_move(ValueKind::Narrow, Reg(1), Reg(0)));
        buffer.remove(detached);
        assert_eq!(
            buffer.flush(&mut method),
            Err(EditError::RemovedNotInserted(detached))
        );

        let mut buffer = MutationBuffer::new();
        buffer.remove(c0);
        buffer.remove(c0);
        assert_eq!(buffer.flush(&mut method), Err(EditError::DuplicateRemoval(c0)));

        assert_eq!(dump_method(&symbols, &method), before);
    }
}
