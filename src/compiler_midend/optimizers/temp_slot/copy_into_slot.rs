//! Copy into slot
//!
//! Rewrites
//!
//! ```text
//!   %t = alloc_stack $T
//!   copy_addr %src to [init] %t
//!   %v = load [copy] %t
//!   destroy_addr %t
//!   dealloc_stack %t
//! ```
//!
//! so every reader of `%t` reads `%src` directly. The initializing copy is left as
//! an identity copy for the driver to remove.

use crate::compiler_midend::analysis::alias_analysis::{AliasOracle, strip_access_markers};
use crate::compiler_midend::analysis::cfg::ControlFlowGraph;
use crate::compiler_midend::analysis::value_lifetime::Frontier;
use crate::compiler_midend::ir::ir_builder::IrBuilder;
use crate::compiler_midend::ir::ir_function::IrFunction;
use crate::compiler_midend::ir::ir_nodes::{InstId, InstKind, LoadQualifier, ValueId};
use crate::compiler_midend::optimizers::temp_slot::destroy_shape::check_temp_slot_destroy;
use crate::compiler_midend::optimizers::temp_slot::source_mutation::check_no_source_modification;
use crate::compiler_midend::optimizers::temp_slot::types::{CandidateOutcome, Rejection};
use crate::compiler_midend::optimizers::temp_slot::use_collection::UseCollector;
use crate::opt_log;

/// A copy that passed every check
struct CopyCandidate {
    copy: InstId,
    slot_alloc: InstId,
    slot: ValueId,

    /// Source as written on the copy, possibly behind an access marker
    src: ValueId,

    /// Source with access markers stripped. Readers are redirected here.
    source: ValueId,
    copy_takes_source: bool,
    frontier: Frontier,
}

/// `cfg` is shared by every candidate of `func`. Rewrites never touch terminators.
pub(crate) fn try_optimize_copy_into_slot(
    func: &mut IrFunction,
    oracle: &dyn AliasOracle,
    cfg: &ControlFlowGraph,
    max_projection_depth: usize,
    copy: InstId,
) -> CandidateOutcome {
    match check_copy_candidate(func, oracle, cfg, max_projection_depth, copy) {
        Ok(candidate) => {
            opt_log!(format!(
                "[TempSlot] {}: replacing {} with {} (copy inst#{})",
                func.name, candidate.slot, candidate.source, copy.0
            ));
            rewrite_copy_candidate(func, candidate);
            CandidateOutcome::Rewritten
        }
        Err(rejection) => {
            opt_log!(format!(
                "[TempSlot] {}: kept copy inst#{}, {}",
                func.name, copy.0, rejection
            ));
            CandidateOutcome::Rejected(rejection)
        }
    }
}

fn check_copy_candidate(
    func: &IrFunction,
    oracle: &dyn AliasOracle,
    cfg: &ControlFlowGraph,
    max_projection_depth: usize,
    copy: InstId,
) -> Result<CopyCandidate, Rejection> {
    let InstKind::CopyAddr {
        src,
        dest,
        take,
        init,
    } = *func.kind(copy)
    else {
        return Err(Rejection::NotACandidate(copy));
    };

    if !init {
        return Err(Rejection::NotInitialization);
    }

    let Some(slot_alloc) = func.defining_inst(dest) else {
        return Err(Rejection::DestNotStackSlot);
    };
    if !matches!(func.kind(slot_alloc), InstKind::AllocStack { .. }) {
        return Err(Rejection::DestNotStackSlot);
    }

    let source = strip_access_markers(func, src);
    if source == dest {
        return Err(Rejection::SelfCopy);
    }

    let mut collector = UseCollector::new(func, oracle, Some(source), max_projection_depth);
    collector.collect_slot_uses(dest, copy)?;
    let loads = collector.into_loads();

    check_no_source_modification(func, oracle, copy, source, &loads)?;

    let frontier = check_temp_slot_destroy(func, cfg, dest, copy, take)?;

    Ok(CopyCandidate {
        copy,
        slot_alloc,
        slot: dest,
        src,
        source,
        copy_takes_source: take,
        frontier,
    })
}

fn rewrite_copy_candidate(func: &mut IrFunction, candidate: CopyCandidate) {
    let mut to_delete: Vec<InstId> = Vec::new();

    for found in func.uses_of(candidate.slot) {
        let user = found.user;

        match func.kind(user).clone() {
            InstKind::DestroyAddr { .. } => {
                // A take copy moved the value out, so the source now carries the destroy
                if candidate.copy_takes_source {
                    func.set_operand(user, found.operand_index, candidate.source);
                } else {
                    to_delete.push(user);
                }
            }

            InstKind::DeallocStack { .. } => to_delete.push(user),

            // Includes the initializing copy itself, which becomes `copy_addr %src to %src`
            InstKind::CopyAddr { take, .. } => {
                if user != candidate.copy && take && !candidate.copy_takes_source {
                    func.set_copy_take(user, false);
                }
                func.set_operand(user, found.operand_index, candidate.source);
            }

            InstKind::Load {
                qualifier: LoadQualifier::Take,
                ..
            } if !candidate.copy_takes_source => {
                // The source keeps its value, so the take becomes a copy at the old copy
                // position, destroyed wherever the slot used to be destroyed
                let loaded = IrBuilder::before(func, candidate.copy)
                    .emit_load_value(candidate.src, LoadQualifier::Copy);

                for &point in &candidate.frontier {
                    let Some(last_user) = func.prev_inst(point) else {
                        continue;
                    };
                    if last_user == user {
                        continue;
                    }
                    IrBuilder::before(func, last_user).emit_destroy_value(loaded);
                }

                if let Some(old) = func.inst_result(user) {
                    func.replace_all_uses(old, loaded);
                }
                to_delete.push(user);
            }

            _ => func.set_operand(user, found.operand_index, candidate.source),
        }
    }

    for inst in to_delete {
        func.erase_inst(inst);
    }
    func.erase_inst(candidate.slot_alloc);
}
