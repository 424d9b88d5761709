use crate::compiler_midend::analysis::alias_analysis::AliasOracle;
use crate::compiler_midend::ir::ir_function::IrFunction;
use crate::compiler_midend::ir::ir_nodes::{InstId, ValueId};
use crate::compiler_midend::optimizers::temp_slot::types::Rejection;
use rustc_hash::FxHashSet;

/// Proves the source is not written between the copy and the last read of the slot.
///
/// Every read lies in the copy's block, so a forward scan from the copy is enough.
/// Once all reads are seen, later writes to the source no longer matter. The last
/// read itself is not checked: a call reading the slot was already cleared of
/// aliasing inout arguments during classification.
pub(crate) fn check_no_source_modification(
    func: &IrFunction,
    oracle: &dyn AliasOracle,
    copy: InstId,
    source: ValueId,
    loads: &FxHashSet<InstId>,
) -> Result<(), Rejection> {
    let mut loads_found = 0;
    let mut cursor = func.next_inst(copy);

    while let Some(inst) = cursor {
        if loads.contains(&inst) {
            loads_found += 1;
        }
        if loads_found == loads.len() {
            return Ok(());
        }
        if oracle.may_write_to_memory(func, inst, source) {
            return Err(Rejection::SourceModified(inst));
        }
        cursor = func.next_inst(inst);
    }

    Err(Rejection::LoadsOutsideBlock)
}
