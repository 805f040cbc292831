//! A generic forward dataflow solver.
//!
//! Blocks are visited in reverse postorder, round after round, until a full
//! round leaves every block's exit state unchanged. A block's entry state is
//! the meet of its predecessors' exit states; the entry block additionally
//! meets [`ForwardAnalysis::entry_state`]. Blocks unreachable from the entry
//! are never visited and have no state.
//!
//! The solver only reads the method.
use cranelift_entity::SecondaryMap;
use dexopt_ir::{BlockId, ControlFlowGraph, InstId, Method};
use tracing::trace;

pub trait ForwardAnalysis {
    type State: Clone + PartialEq;

    /// The state at method entry.
    fn entry_state(&self) -> Self::State;

    /// The identity of [`Self::meet`].
    fn bottom(&self) -> Self::State;

    fn meet(&self, acc: &mut Self::State, other: &Self::State);

    /// Updates `state` to reflect the effect of `inst`.
    fn transfer(&self, method: &Method, inst: InstId, state: &mut Self::State);
}

pub struct ForwardSolver<S: Clone> {
    entry_states: SecondaryMap<BlockId, Option<S>>,
    exit_states: SecondaryMap<BlockId, Option<S>>,
    rounds: usize,
}

impl<S> ForwardSolver<S>
where
    S: Clone + PartialEq,
{
    pub fn new() -> Self {
        Self {
            entry_states: SecondaryMap::new(),
            exit_states: SecondaryMap::new(),
            rounds: 0,
        }
    }

    pub fn compute<A>(&mut self, method: &Method, cfg: &ControlFlowGraph, analysis: &A)
    where
        A: ForwardAnalysis<State = S>,
    {
        self.clear();

        let Some(entry) = cfg.entry() else {
            return;
        };
        let order = cfg.reverse_post_order();

        loop {
            self.rounds += 1;
            let mut changed = false;

            for &block in &order {
                let mut state = if block == entry {
                    analysis.entry_state()
                } else {
                    analysis.bottom()
                };
                for &pred in cfg.preds_of(block) {
                    if let Some(pred_exit) = &self.exit_states[pred] {
                        analysis.meet(&mut state, pred_exit);
                    }
                }
                self.entry_states[block] = Some(state.clone());

                for inst in method.layout.iter_inst(block) {
                    analysis.transfer(method, inst, &mut state);
                }

                if self.exit_states[block].as_ref() != Some(&state) {
                    self.exit_states[block] = Some(state);
                    changed = true;
                }
            }

            trace!(target: "dexopt::dataflow", round = self.rounds, changed, "fixpoint round");
            if !changed {
                break;
            }
        }
    }

    /// Number of rounds the last [`Self::compute`] needed, including the
    /// final round that observed no change.
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    pub fn block_entry(&self, block: BlockId) -> Option<&S> {
        self.entry_states[block].as_ref()
    }

    pub fn block_exit(&self, block: BlockId) -> Option<&S> {
        self.exit_states[block].as_ref()
    }

    /// Replays `block` from its fixpoint entry state, calling `f` with the
    /// state holding right before each instruction. Stops at the first
    /// error. Unreachable blocks are skipped.
    pub fn try_replay<A, E>(
        &self,
        method: &Method,
        analysis: &A,
        block: BlockId,
        mut f: impl FnMut(InstId, &S) -> Result<(), E>,
    ) -> Result<(), E>
    where
        A: ForwardAnalysis<State = S>,
    {
        let Some(mut state) = self.block_entry(block).cloned() else {
            return Ok(());
        };
        for inst in method.layout.iter_inst(block) {
            f(inst, &state)?;
            analysis.transfer(method, inst, &mut state);
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.entry_states.clear();
        self.exit_states.clear();
        self.rounds = 0;
    }
}

impl<S> Default for ForwardSolver<S>
where
    S: Clone + PartialEq,
{
    fn default() -> Self {
        Self::new()
    }
}
