//! Store into slot
//!
//! A slot initialized from an object value and only read back by loads or copies
//! is replaced by the value itself. Every use is rewritten onto the stored value
//! with explicit `copy_value`/`destroy_value` to keep ownership balanced.

use crate::compiler_midend::analysis::alias_analysis::AliasOracle;
use crate::compiler_midend::compiler_messages::compiler_errors::{CompilerError, ErrorLocation};
use crate::compiler_midend::ir::ir_builder::IrBuilder;
use crate::compiler_midend::ir::ir_function::IrFunction;
use crate::compiler_midend::ir::ir_nodes::{InstId, InstKind, LoadQualifier, StoreQualifier, ValueId};
use crate::compiler_midend::optimizers::temp_slot::types::{CandidateOutcome, Rejection};
use crate::compiler_midend::optimizers::temp_slot::use_collection::UseCollector;
use crate::{opt_log, return_compiler_error};

enum PlannedRewrite {
    DestroyValue(InstId),
    Dealloc(InstId),
    StoreForCopy {
        copy: InstId,
        dest: ValueId,
        take: bool,
        init: bool,
    },
    ForwardLoad {
        load: InstId,
        needs_copy: bool,
    },
    FixLifetime(InstId),
}

/// Returns where the driver should continue and what happened to the store
pub(crate) fn try_optimize_store_into_slot(
    func: &mut IrFunction,
    oracle: &dyn AliasOracle,
    max_projection_depth: usize,
    store: InstId,
) -> Result<(Option<InstId>, CandidateOutcome), CompilerError> {
    let (value, slot, slot_alloc) = match check_store_candidate(func, oracle, max_projection_depth, store) {
        Ok(candidate) => candidate,
        Err(rejection) => {
            opt_log!(format!(
                "[TempSlot] {}: kept store inst#{}, {}",
                func.name, store.0, rejection
            ));
            return Ok((func.next_inst(store), CandidateOutcome::Rejected(rejection)));
        }
    };

    // Nothing is touched until every use has a rewrite
    let plan = plan_store_rewrites(func, store, slot)?;

    opt_log!(format!(
        "[TempSlot] {}: forwarding {} into the uses of {} (store inst#{})",
        func.name, value, slot, store.0
    ));

    let mut to_delete = Vec::with_capacity(plan.len());
    for rewrite in plan {
        match rewrite {
            PlannedRewrite::DestroyValue(user) => {
                IrBuilder::before(func, user).emit_destroy_value(value);
                to_delete.push(user);
            }

            PlannedRewrite::Dealloc(user) => to_delete.push(user),

            PlannedRewrite::StoreForCopy {
                copy,
                dest,
                take,
                init,
            } => {
                let mut builder = IrBuilder::before(func, copy);
                let stored = if take {
                    value
                } else {
                    builder.emit_copy_value(value)
                };
                let qualifier = if init {
                    StoreQualifier::Init
                } else {
                    StoreQualifier::Assign
                };
                builder.emit_store_value(stored, dest, qualifier);
                to_delete.push(copy);
            }

            PlannedRewrite::ForwardLoad { load, needs_copy } => {
                let forwarded = if needs_copy {
                    IrBuilder::before(func, load).emit_copy_value(value)
                } else {
                    value
                };
                if let Some(old) = func.inst_result(load) {
                    func.replace_all_uses(old, forwarded);
                }
                to_delete.push(load);
            }

            PlannedRewrite::FixLifetime(user) => {
                IrBuilder::before(func, user).emit_fix_lifetime(value);
                to_delete.push(user);
            }
        }
    }

    for inst in to_delete {
        func.erase_inst(inst);
    }

    let next = func.next_inst(store);
    func.erase_inst(store);
    func.erase_inst(slot_alloc);

    Ok((next, CandidateOutcome::Rewritten))
}

fn check_store_candidate(
    func: &IrFunction,
    oracle: &dyn AliasOracle,
    max_projection_depth: usize,
    store: InstId,
) -> Result<(ValueId, ValueId, InstId), Rejection> {
    let InstKind::Store {
        src,
        dest,
        qualifier,
    } = *func.kind(store)
    else {
        return Err(Rejection::NotACandidate(store));
    };

    if qualifier == StoreQualifier::Assign {
        return Err(Rejection::AssignStore);
    }

    let Some(slot_alloc) = func.defining_inst(dest) else {
        return Err(Rejection::DestNotStackSlot);
    };
    let InstKind::AllocStack {
        dynamic_lifetime, ..
    } = *func.kind(slot_alloc)
    else {
        return Err(Rejection::DestNotStackSlot);
    };
    if dynamic_lifetime {
        return Err(Rejection::DynamicLifetime);
    }

    let mut collector = UseCollector::new(func, oracle, None, max_projection_depth);
    collector.collect_slot_uses(dest, store)?;

    Ok((src, dest, slot_alloc))
}

fn plan_store_rewrites(
    func: &IrFunction,
    store: InstId,
    slot: ValueId,
) -> Result<Vec<PlannedRewrite>, CompilerError> {
    let mut plan = Vec::new();

    for found in func.uses_of(slot) {
        let user = found.user;
        if user == store {
            continue;
        }

        let rewrite = match *func.kind(user) {
            InstKind::DestroyAddr { .. } => PlannedRewrite::DestroyValue(user),
            InstKind::DeallocStack { .. } => PlannedRewrite::Dealloc(user),
            InstKind::CopyAddr {
                src,
                dest,
                take,
                init,
            } if src == slot && dest != slot => PlannedRewrite::StoreForCopy {
                copy: user,
                dest,
                take,
                init,
            },
            InstKind::Load { qualifier, .. } => PlannedRewrite::ForwardLoad {
                load: user,
                needs_copy: qualifier == LoadQualifier::Copy,
            },
            InstKind::FixLifetime { .. } => PlannedRewrite::FixLifetime(user),
            ref other => {
                return_compiler_error!(
                    format!(
                        "Store forwarding met a '{}' use of a slot that passed classification",
                        other.name()
                    ),
                    ErrorLocation::at_inst(func.name.clone(), func.inst_block(user), user),
                    {
                        CompilationStage => "Temp Slot Elimination",
                        InstructionKind => other.name(),
                    }
                );
            }
        };
        plan.push(rewrite);
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler_midend::compiler_messages::compiler_errors::{ErrorMetaDataKey, ErrorType};
    use crate::compiler_midend::ir::ir_nodes::{AccessKind, ArgumentConvention, FunctionId, IrType};

    #[test]
    fn unplanned_use_is_a_compiler_error() {
        let ty = IrType::object("Klass");
        let mut func = IrFunction::new(FunctionId(0), "drifted");
        let value = func.add_argument(ty.clone(), ArgumentConvention::DirectOwned);
        let block = func.add_block();

        let mut builder = IrBuilder::at_end(&mut func, block);
        let slot = builder.alloc_stack(ty);
        let store = builder.store(value, slot, StoreQualifier::Init);
        let access = builder.begin_access(slot, AccessKind::Read);
        builder.end_access(access);
        builder.destroy_addr(slot);
        builder.dealloc_stack(slot);
        builder.return_(None);

        let before = func.live_inst_count();
        let error = match plan_store_rewrites(&func, store, slot) {
            Ok(_) => panic!("planning should fail on an access marker"),
            Err(error) => error,
        };

        assert_eq!(error.error_type, ErrorType::Compiler);
        assert_eq!(
            error.metadata.get(&ErrorMetaDataKey::InstructionKind),
            Some(&"begin_access")
        );
        assert_eq!(func.live_inst_count(), before);
    }
}
