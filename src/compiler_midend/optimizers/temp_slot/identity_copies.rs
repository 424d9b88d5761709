use crate::compiler_midend::analysis::alias_analysis::strip_access_markers;
use crate::compiler_midend::ir::ir_function::IrFunction;
use crate::compiler_midend::ir::ir_nodes::{InstId, InstKind};

/// A copy from an address to itself. Erasing it is always safe.
pub(crate) fn is_identity_copy(func: &IrFunction, copy: InstId) -> bool {
    match func.kind(copy) {
        InstKind::CopyAddr { src, dest, .. } => strip_access_markers(func, *src) == *dest,
        _ => false,
    }
}

/// Erases the collected identity copies, then any address producer left without uses.
/// Returns how many copies were removed.
pub(crate) fn remove_identity_copies(func: &mut IrFunction, mut dead_copies: Vec<InstId>) -> usize {
    dead_copies.sort();
    dead_copies.dedup();

    let mut removed = 0;
    for copy in dead_copies {
        if func.is_erased(copy) {
            continue;
        }
        let InstKind::CopyAddr { src, .. } = *func.kind(copy) else {
            continue;
        };

        let src_def = func.defining_inst(src);
        func.erase_inst(copy);
        removed += 1;

        if let Some(src_def) = src_def {
            simplify_dead_address(func, src_def);
        }
    }

    removed
}

/// Walks up an address chain erasing producers nothing reads anymore
fn simplify_dead_address(func: &mut IrFunction, inst: InstId) {
    let mut cursor = Some(inst);

    while let Some(inst) = cursor {
        if func.is_erased(inst) {
            return;
        }
        let Some(result) = func.inst_result(inst) else {
            return;
        };

        let operand = match *func.kind(inst) {
            InstKind::StructElementAddr { operand, .. }
            | InstKind::TupleElementAddr { operand, .. } => {
                if func.has_uses(result) {
                    return;
                }
                operand
            }
            InstKind::BeginAccess { operand, .. } => {
                let uses = func.uses_of(result);
                if !uses
                    .iter()
                    .all(|found| matches!(func.kind(found.user), InstKind::EndAccess { .. }))
                {
                    return;
                }
                for found in uses {
                    func.erase_inst(found.user);
                }
                operand
            }
            _ => return,
        };

        func.erase_inst(inst);
        cursor = func.defining_inst(operand);
    }
}
