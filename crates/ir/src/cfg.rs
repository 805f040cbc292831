use std::collections::BTreeSet;

use cranelift_entity::{packed_option::PackedOption, SecondaryMap};
use smallvec::SmallVec;

use crate::{BlockId, InstId, Method};

#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct ControlFlowGraph {
    entry: PackedOption<BlockId>,
    blocks: SecondaryMap<BlockId, BlockNode>,
    pub exits: SmallVec<[BlockId; 8]>,
}

impl ControlFlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compute(&mut self, method: &Method) {
        self.clear();

        self.entry = method.layout.entry_block().into();

        for block in method.layout.iter_block() {
            if let Some(last_inst) = method.layout.last_inst_of(block) {
                self.analyze_inst(method, last_inst);
            }
        }
    }

    pub fn preds_of(&self, block: BlockId) -> impl Iterator<Item = &BlockId> {
        self.blocks[block].preds.iter()
    }

    pub fn succs_of(&self, block: BlockId) -> impl Iterator<Item = &BlockId> {
        self.blocks[block].succs.iter()
    }

    pub fn pred_num_of(&self, block: BlockId) -> usize {
        self.blocks[block].preds.len()
    }

    pub fn succ_num_of(&self, block: BlockId) -> usize {
        self.blocks[block].succs.len()
    }

    pub fn entry(&self) -> Option<BlockId> {
        self.entry.expand()
    }

    pub fn post_order(&self) -> CfgPostOrder<'_> {
        CfgPostOrder::new(self)
    }

    /// Blocks reachable from the entry, in reverse postorder.
    pub fn reverse_post_order(&self) -> Vec<BlockId> {
        let mut rpo: Vec<_> = self.post_order().collect();
        rpo.reverse();
        rpo
    }

    pub fn add_edge(&mut self, from: BlockId, to: BlockId) {
        self.blocks[to].preds.insert(from);
        self.blocks[from].succs.insert(to);
    }

    pub fn clear(&mut self) {
        self.entry = None.into();
        self.blocks.clear();
        self.exits.clear();
    }

    fn analyze_inst(&mut self, method: &Method, inst: InstId) {
        let data = method.inst(inst);
        let block = method.layout.inst_block(inst);
        if data.is_return() {
            self.exits.push(block);
        }

        for dest in data.branch_dests() {
            self.add_edge(block, dest);
        }
    }
}

#[derive(Default, Clone, Debug, PartialEq, Eq)]
struct BlockNode {
    preds: BTreeSet<BlockId>,
    succs: BTreeSet<BlockId>,
}

pub struct CfgPostOrder<'a> {
    cfg: &'a ControlFlowGraph,
    node_state: SecondaryMap<BlockId, NodeState>,
    stack: Vec<BlockId>,
}

impl<'a> CfgPostOrder<'a> {
    fn new(cfg: &'a ControlFlowGraph) -> Self {
        let mut stack = Vec::new();

        if let Some(entry) = cfg.entry() {
            stack.push(entry);
        }

        Self {
            cfg,
            node_state: SecondaryMap::default(),
            stack,
        }
    }
}

impl Iterator for CfgPostOrder<'_> {
    type Item = BlockId;

    fn next(&mut self) -> Option<BlockId> {
        while let Some(&block) = self.stack.last() {
            match self.node_state[block] {
                NodeState::Unvisited => {
                    self.node_state[block] = NodeState::Visited;
                    for &succ in self.cfg.succs_of(block) {
                        if self.node_state[succ] == NodeState::Unvisited {
                            self.stack.push(succ);
                        }
                    }
                }
                NodeState::Visited => {
                    self.stack.pop();
                    self.node_state[block] = NodeState::Finished;
                    return Some(block);
                }
                NodeState::Finished => {
                    self.stack.pop();
                }
            }
        }

        None
    }
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    #[default]
    Unvisited,
    Visited,
    Finished,
}
