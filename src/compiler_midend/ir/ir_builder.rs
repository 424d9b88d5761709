use crate::compiler_midend::ir::ir_function::IrFunction;
use crate::compiler_midend::ir::ir_nodes::{
    AccessKind, BlockId, CallArgument, InstId, InstKind, IrType, LoadQualifier, MemoryEffects,
    OpenedAccess, StoreQualifier, ValueId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPoint {
    Before(InstId),
    EndOf(BlockId),
}

/// Positioned instruction builder.
///
/// The ownership helpers (`emit_copy_value`, `emit_destroy_value`, `emit_load_value`,
/// `emit_store_value`) degrade to their trivial forms for trivial types, so callers
/// never have to special case them.
pub struct IrBuilder<'f> {
    func: &'f mut IrFunction,
    position: InsertPoint,
}

impl<'f> IrBuilder<'f> {
    pub fn before(func: &'f mut IrFunction, inst: InstId) -> Self {
        IrBuilder {
            func,
            position: InsertPoint::Before(inst),
        }
    }

    pub fn at_end(func: &'f mut IrFunction, block: BlockId) -> Self {
        IrBuilder {
            func,
            position: InsertPoint::EndOf(block),
        }
    }

    pub fn set_position(&mut self, position: InsertPoint) {
        self.position = position;
    }

    pub fn function(&self) -> &IrFunction {
        self.func
    }

    pub fn emit(&mut self, kind: InstKind, result_ty: Option<IrType>) -> InstId {
        match self.position {
            InsertPoint::Before(before) => self.func.insert_inst_before(before, kind, result_ty),
            InsertPoint::EndOf(block) => self.func.append_inst(block, kind, result_ty),
        }
    }

    fn emit_with_result(&mut self, kind: InstKind, result_ty: IrType) -> ValueId {
        match self.position {
            InsertPoint::Before(before) => self.func.insert_value_inst_before(before, kind, result_ty),
            InsertPoint::EndOf(block) => self.func.append_value_inst(block, kind, result_ty),
        }
    }

    // =====================================================================
    // Ownership helpers
    // =====================================================================

    pub fn emit_copy_value(&mut self, value: ValueId) -> ValueId {
        let ty = self.func.value_type(value).clone();
        if ty.trivial {
            return value;
        }
        self.emit_with_result(InstKind::CopyValue { operand: value }, ty)
    }

    pub fn emit_destroy_value(&mut self, value: ValueId) {
        if self.func.value_type(value).trivial {
            return;
        }
        self.emit(InstKind::DestroyValue { operand: value }, None);
    }

    /// Loads from an address. `Copy` and `Take` become `Trivial` for trivial types.
    pub fn emit_load_value(&mut self, address: ValueId, qualifier: LoadQualifier) -> ValueId {
        let ty = self.func.value_type(address).object_type();
        let qualifier = if ty.trivial {
            LoadQualifier::Trivial
        } else {
            qualifier
        };
        self.emit_with_result(
            InstKind::Load {
                operand: address,
                qualifier,
            },
            ty,
        )
    }

    pub fn emit_store_value(&mut self, src: ValueId, dest: ValueId, qualifier: StoreQualifier) {
        let qualifier = if self.func.value_type(src).trivial {
            StoreQualifier::Trivial
        } else {
            qualifier
        };
        self.emit(
            InstKind::Store {
                src,
                dest,
                qualifier,
            },
            None,
        );
    }

    pub fn emit_fix_lifetime(&mut self, value: ValueId) {
        self.emit(InstKind::FixLifetime { operand: value }, None);
    }

    // =====================================================================
    // Plain instructions
    // =====================================================================

    pub fn alloc_stack(&mut self, ty: IrType) -> ValueId {
        self.alloc_stack_with_lifetime(ty, false)
    }

    pub fn alloc_stack_with_lifetime(&mut self, ty: IrType, dynamic_lifetime: bool) -> ValueId {
        let address = ty.address_type();
        self.emit_with_result(
            InstKind::AllocStack {
                ty,
                dynamic_lifetime,
            },
            address,
        )
    }

    pub fn dealloc_stack(&mut self, slot: ValueId) -> InstId {
        self.emit(InstKind::DeallocStack { operand: slot }, None)
    }

    pub fn copy_addr(&mut self, src: ValueId, dest: ValueId, take: bool, init: bool) -> InstId {
        self.emit(
            InstKind::CopyAddr {
                src,
                dest,
                take,
                init,
            },
            None,
        )
    }

    pub fn store(&mut self, src: ValueId, dest: ValueId, qualifier: StoreQualifier) -> InstId {
        self.emit(
            InstKind::Store {
                src,
                dest,
                qualifier,
            },
            None,
        )
    }

    pub fn load(&mut self, address: ValueId, qualifier: LoadQualifier) -> ValueId {
        let ty = self.func.value_type(address).object_type();
        self.emit_with_result(
            InstKind::Load {
                operand: address,
                qualifier,
            },
            ty,
        )
    }

    pub fn load_borrow(&mut self, address: ValueId) -> ValueId {
        let ty = self.func.value_type(address).object_type();
        self.emit_with_result(InstKind::LoadBorrow { operand: address }, ty)
    }

    pub fn end_borrow(&mut self, borrowed: ValueId) -> InstId {
        self.emit(InstKind::EndBorrow { operand: borrowed }, None)
    }

    pub fn destroy_addr(&mut self, address: ValueId) -> InstId {
        self.emit(InstKind::DestroyAddr { operand: address }, None)
    }

    pub fn destroy_value(&mut self, value: ValueId) -> InstId {
        self.emit(InstKind::DestroyValue { operand: value }, None)
    }

    pub fn begin_access(&mut self, address: ValueId, kind: AccessKind) -> ValueId {
        let ty = self.func.value_type(address).clone();
        self.emit_with_result(
            InstKind::BeginAccess {
                operand: address,
                kind,
            },
            ty,
        )
    }

    pub fn end_access(&mut self, access: ValueId) -> InstId {
        self.emit(InstKind::EndAccess { operand: access }, None)
    }

    pub fn struct_element_addr(&mut self, address: ValueId, field: u32, field_ty: IrType) -> ValueId {
        self.emit_with_result(
            InstKind::StructElementAddr {
                operand: address,
                field,
            },
            field_ty.address_type(),
        )
    }

    pub fn tuple_element_addr(&mut self, address: ValueId, index: u32, element_ty: IrType) -> ValueId {
        self.emit_with_result(
            InstKind::TupleElementAddr {
                operand: address,
                index,
            },
            element_ty.address_type(),
        )
    }

    pub fn open_existential_addr(
        &mut self,
        address: ValueId,
        access: OpenedAccess,
        opened_ty: IrType,
    ) -> ValueId {
        self.emit_with_result(
            InstKind::OpenExistentialAddr {
                operand: address,
                access,
            },
            opened_ty.address_type(),
        )
    }

    pub fn unchecked_take_enum_data_addr(&mut self, address: ValueId, payload_ty: IrType) -> ValueId {
        self.emit_with_result(
            InstKind::UncheckedTakeEnumDataAddr { operand: address },
            payload_ty.address_type(),
        )
    }

    pub fn fix_lifetime(&mut self, value: ValueId) -> InstId {
        self.emit(InstKind::FixLifetime { operand: value }, None)
    }

    pub fn apply(
        &mut self,
        callee: impl Into<String>,
        args: Vec<CallArgument>,
        effects: MemoryEffects,
    ) -> InstId {
        self.emit(
            InstKind::Apply {
                callee: callee.into(),
                args,
                effects,
            },
            None,
        )
    }

    pub fn builtin(
        &mut self,
        name: impl Into<String>,
        operands: Vec<ValueId>,
        effects: MemoryEffects,
    ) -> InstId {
        self.emit(
            InstKind::Builtin {
                name: name.into(),
                operands,
                effects,
            },
            None,
        )
    }

    pub fn branch(&mut self, target: BlockId) -> InstId {
        self.emit(InstKind::Branch { target }, None)
    }

    pub fn cond_branch(&mut self, condition: ValueId, then_block: BlockId, else_block: BlockId) -> InstId {
        self.emit(
            InstKind::CondBranch {
                condition,
                then_block,
                else_block,
            },
            None,
        )
    }

    pub fn return_(&mut self, operand: Option<ValueId>) -> InstId {
        self.emit(InstKind::Return { operand }, None)
    }

    pub fn unreachable(&mut self) -> InstId {
        self.emit(InstKind::Unreachable, None)
    }

    pub fn try_apply(
        &mut self,
        callee: impl Into<String>,
        args: Vec<CallArgument>,
        normal: BlockId,
        error: BlockId,
    ) -> InstId {
        self.emit(
            InstKind::TryApply {
                callee: callee.into(),
                args,
                effects: MemoryEffects::MayWrite,
                normal,
                error,
            },
            None,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler_midend::ir::ir_nodes::{ArgumentConvention, FunctionId};

    #[test]
    fn ownership_helpers_degrade_for_trivial_types() {
        let mut func = IrFunction::new(FunctionId(0), "trivial");
        let int_value = func.add_argument(IrType::trivial("Int"), ArgumentConvention::DirectOwned);
        let block = func.add_block();

        let mut builder = IrBuilder::at_end(&mut func, block);
        let copied = builder.emit_copy_value(int_value);
        builder.emit_destroy_value(int_value);
        let slot = builder.alloc_stack(IrType::trivial("Int"));
        builder.emit_store_value(int_value, slot, StoreQualifier::Init);
        let loaded = builder.emit_load_value(slot, LoadQualifier::Take);

        assert_eq!(copied, int_value);
        let insts = func.block_insts(block);
        assert_eq!(insts.len(), 3);
        assert!(matches!(
            func.kind(insts[1]),
            InstKind::Store {
                qualifier: StoreQualifier::Trivial,
                ..
            }
        ));
        assert!(matches!(
            func.kind(insts[2]),
            InstKind::Load {
                qualifier: LoadQualifier::Trivial,
                ..
            }
        ));
        assert!(!func.value_type(loaded).is_address());
    }

    #[test]
    fn builder_inserts_before_position() {
        let mut func = IrFunction::new(FunctionId(0), "positions");
        let value = func.add_argument(IrType::object("Klass"), ArgumentConvention::DirectOwned);
        let block = func.add_block();
        let ret = IrBuilder::at_end(&mut func, block).return_(None);

        let copy = IrBuilder::before(&mut func, ret).emit_copy_value(value);

        let insts = func.block_insts(block);
        assert_eq!(insts.len(), 2);
        assert_eq!(func.inst_result(insts[0]), Some(copy));
        assert_eq!(insts[1], ret);
    }
}
