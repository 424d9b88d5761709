use crate::compiler_midend::analysis::cfg::ControlFlowGraph;
use crate::compiler_midend::analysis::value_lifetime::{
    Frontier, FrontierMode, ValueLifetimeAnalysis,
};
use crate::compiler_midend::ir::ir_function::IrFunction;
use crate::compiler_midend::ir::ir_nodes::{InstId, InstKind, LoadQualifier, ValueId};
use crate::compiler_midend::optimizers::temp_slot::types::Rejection;

/// Checks the slot is torn down directly on every path.
///
/// The slot lifetime starts at the initializing copy and ends right after its last
/// user. Each of those end points must follow a `destroy_addr`, a `load [take]` or
/// a `copy_addr [take]` out of the slot, since those are the only shapes the
/// rewrite can move onto the source.
///
/// A copy that already takes its source needs no check and gets an empty frontier.
pub(crate) fn check_temp_slot_destroy(
    func: &IrFunction,
    cfg: &ControlFlowGraph,
    slot: ValueId,
    copy: InstId,
    copy_takes_source: bool,
) -> Result<Frontier, Rejection> {
    if copy_takes_source {
        return Ok(Frontier::new());
    }

    let users: Vec<InstId> = func
        .uses(slot)
        .iter()
        .map(|found| found.user)
        .filter(|user| *user != copy && !matches!(func.kind(*user), InstKind::DeallocStack { .. }))
        .collect();

    let Some(frontier) = ValueLifetimeAnalysis::new(func, cfg, copy, users)
        .compute_frontier(FrontierMode::PreserveControlFlow)
    else {
        return Err(Rejection::NoLifetimeFrontier);
    };

    for &point in &frontier {
        // Lifetime ends at a block entry or at a terminator
        let Some(last_user) = func.prev_inst(point) else {
            return Err(Rejection::LifetimeEndsAtBlockStart(point));
        };

        match func.kind(last_user) {
            InstKind::DestroyAddr { .. }
            | InstKind::Load {
                qualifier: LoadQualifier::Take,
                ..
            }
            | InstKind::CopyAddr { take: true, .. } => {}
            _ => return Err(Rejection::UnexpectedDestroy(last_user)),
        }
    }

    Ok(frontier)
}
