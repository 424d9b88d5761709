//! Value lifetime boundary
//!
//! Given a defining instruction and its users, computes the frontier: the set of
//! instructions right before which the value is dead on every path. Liveness is
//! propagated backwards from the user blocks until the defining block is reached.
//!
//! Control flow is never modified. When the value dies along an edge into a block
//! with several predecessors there is no instruction to place the frontier at, and
//! the analysis gives up instead of splitting the edge.

use crate::compiler_midend::analysis::cfg::ControlFlowGraph;
use crate::compiler_midend::ir::ir_function::IrFunction;
use crate::compiler_midend::ir::ir_nodes::{BlockId, InstId};
use rustc_hash::FxHashSet;

/// Instructions before which the value is dead, in discovery order
pub type Frontier = Vec<InstId>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontierMode {
    /// Fail instead of splitting critical edges
    PreserveControlFlow,
}

pub struct ValueLifetimeAnalysis<'a> {
    func: &'a IrFunction,
    cfg: &'a ControlFlowGraph,
    def_inst: InstId,
    def_block: BlockId,
    users: FxHashSet<InstId>,
    live_blocks: FxHashSet<BlockId>,
}

impl<'a> ValueLifetimeAnalysis<'a> {
    /// `cfg` must describe the current blocks of `func`
    pub fn new(
        func: &'a IrFunction,
        cfg: &'a ControlFlowGraph,
        def_inst: InstId,
        users: impl IntoIterator<Item = InstId>,
    ) -> Self {
        let mut analysis = ValueLifetimeAnalysis {
            func,
            cfg,
            def_inst,
            def_block: func.inst_block(def_inst),
            users: users.into_iter().collect(),
            live_blocks: FxHashSet::default(),
        };
        analysis.propagate_liveness();
        analysis
    }

    fn propagate_liveness(&mut self) {
        let mut worklist: Vec<BlockId> = Vec::new();
        self.live_blocks.insert(self.def_block);

        for user in &self.users {
            let block = self.func.inst_block(*user);
            if self.live_blocks.insert(block) {
                worklist.push(block);
            }
        }

        while let Some(block) = worklist.pop() {
            // Liveness never flows above the definition
            if block == self.def_block {
                continue;
            }
            for pred in self.cfg.predecessors(block) {
                if self.live_blocks.insert(*pred) {
                    worklist.push(*pred);
                }
            }
        }
    }

    fn is_alive_at_begin_of_block(&self, block: BlockId) -> bool {
        block != self.def_block && self.live_blocks.contains(&block)
    }

    /// The last user in a block, or the definition itself when no user follows it.
    ///
    /// Scans forward from the definition (or the block start) and stops at the last
    /// user, so the cost follows the lifetime rather than the block length.
    fn last_user_in_block(&self, block: BlockId) -> Option<InstId> {
        let mut remaining = self
            .users
            .iter()
            .filter(|user| self.func.inst_block(**user) == block)
            .count();

        let (mut last, mut cursor) = if block == self.def_block {
            (Some(self.def_inst), self.func.next_inst(self.def_inst))
        } else {
            (None, self.func.first_inst(block))
        };

        while remaining > 0 {
            // Users above the definition are never reached
            let Some(inst) = cursor else {
                break;
            };
            if self.users.contains(&inst) {
                remaining -= 1;
                last = Some(inst);
            }
            cursor = self.func.next_inst(inst);
        }

        last
    }

    pub fn compute_frontier(&self, mode: FrontierMode) -> Option<Frontier> {
        fn push(frontier: &mut Frontier, inst: InstId) {
            if !frontier.contains(&inst) {
                frontier.push(inst);
            }
        }

        let mut frontier = Frontier::new();

        let mut live_blocks: Vec<BlockId> = self.live_blocks.iter().copied().collect();
        live_blocks.sort();

        for block in live_blocks {
            let successors = self.cfg.successors(block);
            let live_in_succ = successors
                .iter()
                .any(|succ| self.is_alive_at_begin_of_block(*succ));
            let dead_successors: Vec<BlockId> = successors
                .iter()
                .copied()
                .filter(|succ| !self.is_alive_at_begin_of_block(*succ))
                .collect();

            if !live_in_succ {
                // The block holds a last use
                let last_user = self.last_user_in_block(block)?;
                match self.func.next_inst(last_user) {
                    Some(next) => push(&mut frontier, next),
                    None => {
                        // The terminator itself is the last use. The value dies on every outgoing edge.
                        for succ in successors {
                            self.edge_frontier(*succ, mode)?;
                            push(&mut frontier, self.func.first_inst(*succ)?);
                        }
                    }
                }
            } else {
                // Live out, but dead on some edges
                for succ in dead_successors {
                    self.edge_frontier(succ, mode)?;
                    push(&mut frontier, self.func.first_inst(succ)?);
                }
            }
        }

        Some(frontier)
    }

    /// Whether the value may end at the start of `succ` without splitting the edge
    fn edge_frontier(&self, succ: BlockId, mode: FrontierMode) -> Option<()> {
        match mode {
            FrontierMode::PreserveControlFlow => {
                self.cfg.single_predecessor(succ).map(|_| ())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler_midend::ir::ir_builder::IrBuilder;
    use crate::compiler_midend::ir::ir_nodes::{ArgumentConvention, FunctionId, IrType};

    #[test]
    fn straight_line_frontier_follows_last_user() {
        let mut func = IrFunction::new(FunctionId(0), "straight");
        let ty = IrType::object("Klass");
        let source = func.add_argument(ty.address_type(), ArgumentConvention::IndirectInGuaranteed);
        let block = func.add_block();
        let mut builder = IrBuilder::at_end(&mut func, block);
        let slot = builder.alloc_stack(ty);
        let copy = builder.copy_addr(source, slot, false, true);
        let destroy = builder.destroy_addr(slot);
        let dealloc = builder.dealloc_stack(slot);
        builder.return_(None);

        let cfg = ControlFlowGraph::compute(&func);
        let frontier = ValueLifetimeAnalysis::new(&func, &cfg, copy, [destroy])
            .compute_frontier(FrontierMode::PreserveControlFlow)
            .expect("straight line frontier exists");

        assert_eq!(frontier, vec![dealloc]);
        assert_eq!(func.prev_inst(frontier[0]), Some(destroy));
    }

    #[test]
    fn users_in_both_branches_give_two_frontier_points() {
        let mut func = IrFunction::new(FunctionId(0), "branches");
        let ty = IrType::object("Klass");
        let source = func.add_argument(ty.address_type(), ArgumentConvention::IndirectInGuaranteed);
        let flag = func.add_argument(IrType::trivial("Bool"), ArgumentConvention::DirectUnowned);
        let entry = func.add_block();
        let left = func.add_block();
        let right = func.add_block();

        let mut builder = IrBuilder::at_end(&mut func, entry);
        let slot = builder.alloc_stack(ty);
        let copy = builder.copy_addr(source, slot, false, true);
        builder.cond_branch(flag, left, right);

        let mut builder = IrBuilder::at_end(&mut func, left);
        let left_destroy = builder.destroy_addr(slot);
        let left_ret = builder.return_(None);

        let mut builder = IrBuilder::at_end(&mut func, right);
        let right_destroy = builder.destroy_addr(slot);
        let right_ret = builder.return_(None);

        let cfg = ControlFlowGraph::compute(&func);
        let mut frontier = ValueLifetimeAnalysis::new(&func, &cfg, copy, [left_destroy, right_destroy])
            .compute_frontier(FrontierMode::PreserveControlFlow)
            .expect("both successors have a single predecessor");
        frontier.sort();

        let mut expected = vec![left_ret, right_ret];
        expected.sort();
        assert_eq!(frontier, expected);
    }

    #[test]
    fn dying_on_critical_edge_gives_up() {
        let mut func = IrFunction::new(FunctionId(0), "critical");
        let ty = IrType::object("Klass");
        let source = func.add_argument(ty.address_type(), ArgumentConvention::IndirectInGuaranteed);
        let flag = func.add_argument(IrType::trivial("Bool"), ArgumentConvention::DirectUnowned);
        let entry = func.add_block();
        let user_block = func.add_block();
        let join = func.add_block();

        let mut builder = IrBuilder::at_end(&mut func, entry);
        let slot = builder.alloc_stack(ty);
        let copy = builder.copy_addr(source, slot, false, true);
        builder.cond_branch(flag, user_block, join);

        let mut builder = IrBuilder::at_end(&mut func, user_block);
        let destroy = builder.destroy_addr(slot);
        builder.branch(join);

        IrBuilder::at_end(&mut func, join).return_(None);

        // entry -> join is a critical edge, and the value is dead in join
        let cfg = ControlFlowGraph::compute(&func);
        let frontier = ValueLifetimeAnalysis::new(&func, &cfg, copy, [destroy])
            .compute_frontier(FrontierMode::PreserveControlFlow);
        assert!(frontier.is_none());
    }

    #[test]
    fn frontier_stops_at_the_last_user_not_the_block_end() {
        let mut func = IrFunction::new(FunctionId(0), "long_block");
        let ty = IrType::object("Klass");
        let source = func.add_argument(ty.address_type(), ArgumentConvention::IndirectInGuaranteed);
        let block = func.add_block();
        let mut builder = IrBuilder::at_end(&mut func, block);
        let slot = builder.alloc_stack(ty.clone());
        let copy = builder.copy_addr(source, slot, false, true);
        let destroy = builder.destroy_addr(slot);
        let dealloc = builder.dealloc_stack(slot);

        // Unrelated slots after the lifetime
        for _ in 0..50 {
            let other = builder.alloc_stack(ty.clone());
            builder.dealloc_stack(other);
        }
        builder.return_(None);

        let cfg = ControlFlowGraph::compute(&func);
        let frontier = ValueLifetimeAnalysis::new(&func, &cfg, copy, [destroy])
            .compute_frontier(FrontierMode::PreserveControlFlow)
            .expect("straight line frontier exists");
        assert_eq!(frontier, vec![dealloc]);

        // No users at all ends the lifetime right after the definition
        let frontier = ValueLifetimeAnalysis::new(&func, &cfg, copy, Vec::<InstId>::new())
            .compute_frontier(FrontierMode::PreserveControlFlow)
            .expect("definition alone has a frontier");
        assert_eq!(frontier, vec![destroy]);
    }
}
