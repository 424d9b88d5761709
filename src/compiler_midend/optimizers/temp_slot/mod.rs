//! Temporary slot elimination
//!
//! Removes stack slots that only hold a short lived copy of another address or of
//! an object value. Readers of the slot are redirected to the source and the
//! slot's allocation, initialization and teardown disappear.
//!
//! A candidate is rewritten only once three checks pass:
//! - every use of the slot is a read the rewrite knows how to redirect
//! - the source is not written before the last read
//! - the slot is destroyed right after its last use on every path
//!
//! Anything else leaves the candidate untouched.

mod copy_into_slot;
mod destroy_shape;
mod identity_copies;
mod source_mutation;
mod store_into_slot;
mod types;
mod use_collection;

pub use types::{CandidateOutcome, RejectedCheck, Rejection, TempSlotReport, TempSlotStats};

use crate::compiler_midend::analysis::alias_analysis::AliasOracle;
use crate::compiler_midend::analysis::cfg::ControlFlowGraph;
use crate::compiler_midend::compiler_messages::compiler_errors::CompilerError;
use crate::compiler_midend::ir::ir_function::IrFunction;
use crate::compiler_midend::ir::ir_nodes::{BlockId, InstId, InstKind};
use crate::compiler_midend::optimizers::temp_slot::copy_into_slot::try_optimize_copy_into_slot;
use crate::compiler_midend::optimizers::temp_slot::identity_copies::{
    is_identity_copy, remove_identity_copies,
};
use crate::compiler_midend::optimizers::temp_slot::store_into_slot::try_optimize_store_into_slot;
use crate::opt_log;
use crate::projects::settings::PassConfig;

/// Runs temp slot elimination over one function.
///
/// Errors only when the IR breaks an invariant the classifier relies on.
pub fn eliminate_temp_slots(
    func: &mut IrFunction,
    oracle: &dyn AliasOracle,
    config: &PassConfig,
) -> Result<TempSlotReport, CompilerError> {
    TempSlotEliminator::new(oracle, config).run(func)
}

struct TempSlotEliminator<'a> {
    oracle: &'a dyn AliasOracle,
    config: &'a PassConfig,
    stats: TempSlotStats,
    changed: bool,

    // Copies turned into `copy_addr %x to %x`, erased after the walk
    dead_copies: Vec<InstId>,
}

impl<'a> TempSlotEliminator<'a> {
    fn new(oracle: &'a dyn AliasOracle, config: &'a PassConfig) -> Self {
        Self {
            oracle,
            config,
            stats: TempSlotStats::default(),
            changed: false,
            dead_copies: Vec::new(),
        }
    }

    fn run(mut self, func: &mut IrFunction) -> Result<TempSlotReport, CompilerError> {
        let cfg = ControlFlowGraph::compute(func);
        let blocks: Vec<BlockId> = func.block_ids().collect();
        for block in blocks {
            self.optimize_block(func, &cfg, block)?;
        }

        let dead_copies = std::mem::take(&mut self.dead_copies);
        self.stats.identity_copies_removed = remove_identity_copies(func, dead_copies);

        opt_log!(format!(
            "[TempSlot] {}: {} slots eliminated, {} identity copies removed",
            func.name,
            self.stats.slots_eliminated(),
            self.stats.identity_copies_removed
        ));

        Ok(TempSlotReport {
            changed: self.changed,
            stats: self.stats,
        })
    }

    fn optimize_block(
        &mut self,
        func: &mut IrFunction,
        cfg: &ControlFlowGraph,
        block: BlockId,
    ) -> Result<(), CompilerError> {
        let max_depth = self.config.max_projection_depth;
        let mut cursor = func.first_inst(block);

        while let Some(inst) = cursor {
            match func.kind(inst) {
                InstKind::CopyAddr { .. } => {
                    self.stats.copies_examined += 1;
                    let outcome =
                        try_optimize_copy_into_slot(func, self.oracle, cfg, max_depth, inst);
                    self.record_outcome(&outcome);
                    if outcome.is_rewritten() {
                        self.stats.copies_rewritten += 1;
                    }

                    // Also catches identity copies that were in the input
                    if is_identity_copy(func, inst) {
                        self.changed = true;
                        self.dead_copies.push(inst);
                    }

                    // Read after the rewrite, which may have erased what followed
                    cursor = func.next_inst(inst);
                }

                InstKind::Store { .. } => {
                    self.stats.stores_examined += 1;
                    let (next, outcome) =
                        try_optimize_store_into_slot(func, self.oracle, max_depth, inst)?;
                    self.record_outcome(&outcome);
                    if outcome.is_rewritten() {
                        self.stats.stores_rewritten += 1;
                    }
                    cursor = next;
                }

                _ => cursor = func.next_inst(inst),
            }
        }

        Ok(())
    }

    fn record_outcome(&mut self, outcome: &CandidateOutcome) {
        match outcome {
            CandidateOutcome::Rewritten => self.changed = true,
            CandidateOutcome::Rejected(rejection) => self.stats.record_rejection(rejection),
        }
    }
}

#[cfg(test)]
mod tests;
