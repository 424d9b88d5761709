//! Alias queries used by the memory optimizers
//!
//! Addresses are resolved to an access path: the memory root they are derived from
//! plus the chain of projections applied to it. Two addresses only alias when their
//! roots may be the same memory and neither path diverges from the other.

use crate::compiler_midend::ir::ir_function::IrFunction;
use crate::compiler_midend::ir::ir_nodes::{
    ArgumentConvention, InstId, InstKind, LoadQualifier, ValueId,
};

pub trait AliasOracle {
    /// May `inst` write memory that could alias `address`
    fn may_write_to_memory(&self, func: &IrFunction, inst: InstId, address: ValueId) -> bool;

    /// Are `a` and `b` provably disjoint
    fn is_no_alias(&self, func: &IrFunction, a: ValueId, b: ValueId) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryRoot {
    Stack(InstId),
    Argument(ValueId),

    /// An address produced by something the analysis can't see through
    Unknown(ValueId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathElement {
    Field(u32),
    TupleElement(u32),

    // Existential and enum payload projections: overlap with anything below them
    Opaque,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPath {
    pub root: MemoryRoot,
    pub elements: Vec<PathElement>,
}

/// Walks projections and access markers back to the memory root
pub fn access_path(func: &IrFunction, address: ValueId) -> AccessPath {
    let mut elements = Vec::new();
    let mut current = address;

    let root = loop {
        let Some(def) = func.defining_inst(current) else {
            break MemoryRoot::Argument(current);
        };

        match func.kind(def) {
            InstKind::AllocStack { .. } => break MemoryRoot::Stack(def),
            InstKind::BeginAccess { operand, .. } => current = *operand,
            InstKind::StructElementAddr { operand, field } => {
                elements.push(PathElement::Field(*field));
                current = *operand;
            }
            InstKind::TupleElementAddr { operand, index } => {
                elements.push(PathElement::TupleElement(*index));
                current = *operand;
            }
            InstKind::OpenExistentialAddr { operand, .. }
            | InstKind::UncheckedTakeEnumDataAddr { operand } => {
                elements.push(PathElement::Opaque);
                current = *operand;
            }
            _ => break MemoryRoot::Unknown(current),
        }
    };

    elements.reverse();
    AccessPath { root, elements }
}

/// Strips access markers, which neither read nor write memory themselves
pub fn strip_access_markers(func: &IrFunction, mut address: ValueId) -> ValueId {
    while let Some(def) = func.defining_inst(address) {
        match func.kind(def) {
            InstKind::BeginAccess { operand, .. } => address = *operand,
            _ => break,
        }
    }
    address
}

/// Structural alias analysis over access paths and argument conventions
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicAliasAnalysis;

impl BasicAliasAnalysis {
    pub fn new() -> Self {
        BasicAliasAnalysis
    }

    fn roots_are_disjoint(&self, func: &IrFunction, a: MemoryRoot, b: MemoryRoot) -> bool {
        match (a, b) {
            (MemoryRoot::Stack(x), MemoryRoot::Stack(y)) => x != y,
            (MemoryRoot::Stack(_), MemoryRoot::Argument(_))
            | (MemoryRoot::Argument(_), MemoryRoot::Stack(_)) => true,
            (MemoryRoot::Argument(x), MemoryRoot::Argument(y)) => {
                if x == y {
                    return false;
                }
                // Exclusive access: an inout argument is not reachable through any other argument
                let exclusive = |value: ValueId| {
                    func.argument_convention(value) == Some(ArgumentConvention::IndirectInout)
                };
                exclusive(x) || exclusive(y)
            }
            _ => false,
        }
    }

    fn may_alias(&self, func: &IrFunction, a: ValueId, b: ValueId) -> bool {
        !self.is_no_alias(func, a, b)
    }

    fn is_local_stack(&self, func: &IrFunction, address: ValueId) -> bool {
        matches!(access_path(func, address).root, MemoryRoot::Stack(_))
    }
}

impl AliasOracle for BasicAliasAnalysis {
    fn is_no_alias(&self, func: &IrFunction, a: ValueId, b: ValueId) -> bool {
        let path_a = access_path(func, a);
        let path_b = access_path(func, b);

        if self.roots_are_disjoint(func, path_a.root, path_b.root) {
            return true;
        }
        if path_a.root != path_b.root {
            return false;
        }

        // Same root: disjoint once the paths pick different fields or elements
        for (x, y) in path_a.elements.iter().zip(&path_b.elements) {
            match (x, y) {
                (PathElement::Field(i), PathElement::Field(j))
                | (PathElement::TupleElement(i), PathElement::TupleElement(j)) => {
                    if i != j {
                        return true;
                    }
                }
                _ => return false,
            }
        }

        false
    }

    fn may_write_to_memory(&self, func: &IrFunction, inst: InstId, address: ValueId) -> bool {
        match func.kind(inst) {
            InstKind::CopyAddr {
                src, dest, take, ..
            } => {
                self.may_alias(func, *dest, address) || (*take && self.may_alias(func, *src, address))
            }
            InstKind::Store { dest, .. } => self.may_alias(func, *dest, address),
            InstKind::Load {
                operand,
                qualifier: LoadQualifier::Take,
            } => self.may_alias(func, *operand, address),
            InstKind::DeallocStack { operand } => self.may_alias(func, *operand, address),

            // Running a destructor may touch any memory that isn't a local slot
            InstKind::DestroyAddr { operand } => {
                self.may_alias(func, *operand, address)
                    || (!func.value_type(*operand).trivial && !self.is_local_stack(func, address))
            }
            InstKind::DestroyValue { operand } => {
                !func.value_type(*operand).trivial && !self.is_local_stack(func, address)
            }

            InstKind::Apply { args, effects, .. } | InstKind::TryApply { args, effects, .. } => {
                let writes_argument = args.iter().any(|arg| {
                    arg.convention.may_write_argument() && self.may_alias(func, arg.value, address)
                });
                writes_argument || (effects.may_write() && !self.is_local_stack(func, address))
            }
            InstKind::Builtin { effects, .. } => effects.may_write(),

            InstKind::AllocStack { .. }
            | InstKind::Load { .. }
            | InstKind::LoadBorrow { .. }
            | InstKind::EndBorrow { .. }
            | InstKind::CopyValue { .. }
            | InstKind::BeginAccess { .. }
            | InstKind::EndAccess { .. }
            | InstKind::OpenExistentialAddr { .. }
            | InstKind::UncheckedTakeEnumDataAddr { .. }
            | InstKind::StructElementAddr { .. }
            | InstKind::TupleElementAddr { .. }
            | InstKind::FixLifetime { .. }
            | InstKind::Branch { .. }
            | InstKind::CondBranch { .. }
            | InstKind::Return { .. }
            | InstKind::Unreachable => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler_midend::ir::ir_builder::IrBuilder;
    use crate::compiler_midend::ir::ir_nodes::{
        AccessKind, BlockId, CallArgument, FunctionId, IrType, MemoryEffects,
    };

    struct AliasFixture {
        func: IrFunction,
        guaranteed: ValueId,
        inout: ValueId,
        other_guaranteed: ValueId,
        slot: ValueId,
        field0: ValueId,
        field1: ValueId,
    }

    fn fixture() -> AliasFixture {
        let ty = IrType::object("Pair");
        let mut func = IrFunction::new(FunctionId(0), "alias");
        let guaranteed = func.add_argument(ty.address_type(), ArgumentConvention::IndirectInGuaranteed);
        let inout = func.add_argument(ty.address_type(), ArgumentConvention::IndirectInout);
        let other_guaranteed =
            func.add_argument(ty.address_type(), ArgumentConvention::IndirectInGuaranteed);
        let block = func.add_block();

        let mut builder = IrBuilder::at_end(&mut func, block);
        let slot = builder.alloc_stack(ty);
        let field0 = builder.struct_element_addr(guaranteed, 0, IrType::object("Klass"));
        let field1 = builder.struct_element_addr(guaranteed, 1, IrType::object("Klass"));
        builder.return_(None);

        AliasFixture {
            func,
            guaranteed,
            inout,
            other_guaranteed,
            slot,
            field0,
            field1,
        }
    }

    #[test]
    fn stack_slots_never_alias_arguments() {
        let f = fixture();
        let aa = BasicAliasAnalysis::new();
        assert!(aa.is_no_alias(&f.func, f.slot, f.guaranteed));
        assert!(aa.is_no_alias(&f.func, f.inout, f.slot));
    }

    #[test]
    fn inout_arguments_are_exclusive() {
        let f = fixture();
        let aa = BasicAliasAnalysis::new();
        assert!(aa.is_no_alias(&f.func, f.inout, f.guaranteed));
        assert!(!aa.is_no_alias(&f.func, f.guaranteed, f.other_guaranteed));
    }

    #[test]
    fn diverging_fields_do_not_alias() {
        let f = fixture();
        let aa = BasicAliasAnalysis::new();
        assert!(aa.is_no_alias(&f.func, f.field0, f.field1));
        assert!(!aa.is_no_alias(&f.func, f.field0, f.guaranteed));
    }

    #[test]
    fn access_markers_are_transparent() {
        let mut f = fixture();
        let ret = f.func.last_inst(BlockId(0)).expect("fixture has a return");
        let access = IrBuilder::before(&mut f.func, ret).begin_access(f.guaranteed, AccessKind::Read);

        assert_eq!(strip_access_markers(&f.func, access), f.guaranteed);
        assert_eq!(access_path(&f.func, access).root, MemoryRoot::Argument(f.guaranteed));
    }

    #[test]
    fn opaque_call_writes_arguments_but_not_slots() {
        let mut f = fixture();
        let ret = f.func.last_inst(BlockId(0)).expect("fixture has a return");
        let call = IrBuilder::before(&mut f.func, ret).apply(
            "opaque",
            vec![CallArgument::new(f.other_guaranteed, ArgumentConvention::IndirectInGuaranteed)],
            MemoryEffects::MayWrite,
        );
        let aa = BasicAliasAnalysis::new();

        assert!(aa.may_write_to_memory(&f.func, call, f.guaranteed));
        assert!(!aa.may_write_to_memory(&f.func, call, f.slot));
    }

    #[test]
    fn readonly_call_with_inout_argument_writes_only_that_argument() {
        let mut f = fixture();
        let ret = f.func.last_inst(BlockId(0)).expect("fixture has a return");
        let call = IrBuilder::before(&mut f.func, ret).apply(
            "mutate",
            vec![CallArgument::new(f.inout, ArgumentConvention::IndirectInout)],
            MemoryEffects::ReadOnly,
        );
        let aa = BasicAliasAnalysis::new();

        assert!(aa.may_write_to_memory(&f.func, call, f.inout));
        assert!(!aa.may_write_to_memory(&f.func, call, f.guaranteed));
    }
}
