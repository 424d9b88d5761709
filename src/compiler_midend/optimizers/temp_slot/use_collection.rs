//! Use classification for candidate slots
//!
//! Every use accepted here is later redirected from the slot to the source (or,
//! for stores, rewritten onto the stored value). The accepted kinds are exactly the
//! ones the two rewrites know how to handle.

use crate::compiler_midend::analysis::alias_analysis::AliasOracle;
use crate::compiler_midend::ir::ir_function::{IrFunction, Use};
use crate::compiler_midend::ir::ir_nodes::{
    AccessKind, InstId, InstKind, LoadQualifier, OpenedAccess, ValueId,
};
use crate::compiler_midend::optimizers::temp_slot::types::Rejection;
use rustc_hash::FxHashSet;

pub(crate) struct UseCollector<'a> {
    func: &'a IrFunction,
    oracle: &'a dyn AliasOracle,

    /// The stripped copy source. `None` when the slot is initialized by a store.
    source: Option<ValueId>,
    max_depth: usize,

    loads: FxHashSet<InstId>,
}

impl<'a> UseCollector<'a> {
    pub(crate) fn new(
        func: &'a IrFunction,
        oracle: &'a dyn AliasOracle,
        source: Option<ValueId>,
        max_depth: usize,
    ) -> Self {
        Self {
            func,
            oracle,
            source,
            max_depth,
            loads: FxHashSet::default(),
        }
    }

    pub(crate) fn into_loads(self) -> FxHashSet<InstId> {
        self.loads
    }

    /// Classifies every use of the slot except its initializer and its terminal uses
    /// (`destroy_addr`, `dealloc_stack`, a top level `load [take]`)
    pub(crate) fn collect_slot_uses(
        &mut self,
        slot: ValueId,
        initializer: InstId,
    ) -> Result<(), Rejection> {
        for found in self.func.uses_of(slot) {
            if found.user == initializer || is_terminal_slot_use(self.func.kind(found.user)) {
                continue;
            }
            self.collect_loads(found, slot, 0)?;
        }
        Ok(())
    }

    /// Transitively explores one use of `address` until it reaches a read
    fn collect_loads(&mut self, found: Use, address: ValueId, depth: usize) -> Result<(), Rejection> {
        let user = found.user;

        // Reads must sit in the block of the address they read. Destroys may be elsewhere.
        let address_block = self
            .func
            .defining_inst(address)
            .map(|def| self.func.inst_block(def));
        if address_block != Some(self.func.inst_block(user)) {
            return Err(Rejection::UseOutsideBlock(user));
        }

        match self.func.kind(user) {
            InstKind::BeginAccess { kind, .. } => {
                if *kind != AccessKind::Read {
                    return Err(Rejection::WriteAccess(user));
                }
                self.collect_loads_from_projection(user, depth)
            }

            // Only reachable through a read access opened above
            InstKind::EndAccess { .. } => {
                self.loads.insert(user);
                Ok(())
            }

            InstKind::Apply { args, .. } | InstKind::TryApply { args, .. } => {
                let Some(argument) = args.get(found.operand_index) else {
                    return Err(Rejection::UnsupportedUse(user));
                };
                let convention = argument.convention;

                if !convention.is_guaranteed() {
                    return Err(Rejection::ConsumingCall(user));
                }

                match self.source {
                    // Materialized only to be passed by address. Removing it would need a signature change.
                    None if convention.is_indirect() => {
                        return Err(Rejection::IndirectCallWithoutSource(user));
                    }
                    None => {}

                    // The source mutation scan skips the call itself, so inout arguments are checked here
                    Some(source) => {
                        for arg in args.iter().filter(|arg| arg.convention.is_inout()) {
                            if !self.oracle.is_no_alias(self.func, arg.value, source) {
                                return Err(Rejection::InoutMayAliasSource(user));
                            }
                        }
                    }
                }

                self.loads.insert(user);
                Ok(())
            }

            InstKind::OpenExistentialAddr { access, .. } => {
                if self.source.is_none() {
                    return Err(Rejection::ProjectionWithoutSource(user));
                }
                if *access != OpenedAccess::Immutable {
                    return Err(Rejection::MutableExistential(user));
                }
                self.collect_loads_from_projection(user, depth)
            }

            // Taking the payload address only leaves the enum intact for optionals
            InstKind::UncheckedTakeEnumDataAddr { operand } => {
                if !self.func.value_type(*operand).optional {
                    return Err(Rejection::NonOptionalEnumPayload(user));
                }
                self.collect_loads_from_projection(user, depth)
            }

            InstKind::StructElementAddr { .. } | InstKind::TupleElementAddr { .. } => {
                self.collect_loads_from_projection(user, depth)
            }

            InstKind::Load { qualifier, .. } => {
                // Top level takes were skipped by the caller, so this one is on a projection.
                // That is a reinitialization pattern, not a temporary.
                if *qualifier == LoadQualifier::Take {
                    return Err(Rejection::TakeThroughProjection(user));
                }
                self.loads.insert(user);
                Ok(())
            }

            InstKind::LoadBorrow { .. } => {
                if self.source.is_none() {
                    return Err(Rejection::BorrowWithoutSource(user));
                }
                self.loads.insert(user);

                // The borrow reads the memory until its scope ends
                if let Some(borrowed) = self.func.inst_result(user) {
                    for borrow_use in self.func.uses_of(borrowed) {
                        if matches!(self.func.kind(borrow_use.user), InstKind::EndBorrow { .. }) {
                            self.loads.insert(borrow_use.user);
                        }
                    }
                }
                Ok(())
            }

            InstKind::FixLifetime { .. } => {
                self.loads.insert(user);
                Ok(())
            }

            InstKind::CopyAddr { dest, .. } => {
                if *dest == address {
                    return Err(Rejection::WritesSlot(user));
                }
                self.loads.insert(user);
                Ok(())
            }

            _ => Err(Rejection::UnsupportedUse(user)),
        }
    }

    fn collect_loads_from_projection(
        &mut self,
        projection: InstId,
        depth: usize,
    ) -> Result<(), Rejection> {
        if self.source.is_none() {
            return Err(Rejection::ProjectionWithoutSource(projection));
        }
        if depth >= self.max_depth {
            return Err(Rejection::ProjectionTooDeep(projection));
        }
        let Some(projected) = self.func.inst_result(projection) else {
            return Err(Rejection::UnsupportedUse(projection));
        };

        for found in self.func.uses_of(projected) {
            self.collect_loads(found, projected, depth + 1)?;
        }
        Ok(())
    }
}

/// Uses that end the slot's lifetime. They are allowed in other blocks.
pub(crate) fn is_terminal_slot_use(kind: &InstKind) -> bool {
    matches!(
        kind,
        InstKind::DestroyAddr { .. }
            | InstKind::DeallocStack { .. }
            | InstKind::Load {
                qualifier: LoadQualifier::Take,
                ..
            }
    )
}
