//! IR Validation
//!
//! Always-on structural validation for IR modules.
//! Runs after loading and after optimization, so the optimizer can rely on a
//! consistent layout and on well-typed memory operations.

use crate::compiler_midend::compiler_messages::compiler_errors::{
    CompilerError, CompilerMessages, ErrorLocation, ErrorMetaDataKey, ErrorType,
};
use crate::compiler_midend::ir::ir_function::{IrFunction, IrModule, Use};
use crate::compiler_midend::ir::ir_nodes::{BlockId, InstId, InstKind, ValueId};
use rustc_hash::FxHashSet;

pub fn validate_module(module: &IrModule) -> Result<(), CompilerMessages> {
    let errors: Vec<CompilerError> = module
        .functions
        .iter()
        .filter_map(|func| validate_function(func).err())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(CompilerMessages { errors })
    }
}

pub fn validate_function(func: &IrFunction) -> Result<(), CompilerError> {
    IrValidator::new(func).validate()
}

struct IrValidator<'a> {
    func: &'a IrFunction,
    seen_insts: FxHashSet<InstId>,
}

impl<'a> IrValidator<'a> {
    fn new(func: &'a IrFunction) -> Self {
        Self {
            func,
            seen_insts: FxHashSet::default(),
        }
    }

    fn validate(&mut self) -> Result<(), CompilerError> {
        for block in self.func.block_ids() {
            self.validate_layout(block)?;
        }

        for block in self.func.block_ids() {
            for inst in self.func.block_insts(block) {
                self.validate_operands(inst)?;
                self.validate_inst(inst)?;
            }
        }

        self.validate_use_lists()
    }

    fn validate_layout(&mut self, block: BlockId) -> Result<(), CompilerError> {
        let insts = self.func.block_insts(block);
        let Some(&last) = insts.last() else {
            return Err(self.error_at_block(block, format!("Block {block} is empty")));
        };

        let mut expected_prev = None;
        for &inst in &insts {
            let data = self.func.inst(inst);
            if data.erased || data.block != block || data.prev != expected_prev {
                return Err(self.error_at(
                    inst,
                    format!("Instruction list of {block} is corrupted around inst#{}", inst.0),
                ));
            }
            if !self.seen_insts.insert(inst) {
                return Err(self.error_at(inst, "Instruction appears twice in the layout"));
            }
            if data.kind.is_terminator() && inst != last {
                return Err(self.error_at(
                    inst,
                    format!("Terminator {} is not at the end of {block}", data.kind.name()),
                ));
            }
            expected_prev = Some(inst);
        }

        if !self.func.kind(last).is_terminator() {
            return Err(self.error_at_block(block, format!("Block {block} has no terminator")));
        }

        for successor in self.func.kind(last).successors() {
            if successor.0 as usize >= self.func.block_count() {
                return Err(self.error_at(
                    last,
                    format!("Branch to missing block {successor}"),
                ));
            }
        }

        Ok(())
    }

    fn validate_operands(&self, inst: InstId) -> Result<(), CompilerError> {
        for (operand_index, operand) in self.func.kind(inst).operands().into_iter().enumerate() {
            if !self.func.is_live_value(operand) {
                return Err(self.error_at(
                    inst,
                    format!("Operand {operand} refers to an erased or unknown value"),
                ));
            }
            let expected = Use {
                user: inst,
                operand_index,
            };
            if !self.func.uses(operand).contains(&expected) {
                return Err(self.error_at(
                    inst,
                    format!("Use list of {operand} is missing operand {operand_index}"),
                ));
            }
        }
        Ok(())
    }

    /// Every listed use must be a live operand that still names the value
    fn validate_use_lists(&self) -> Result<(), CompilerError> {
        for index in 0..self.func.value_count() {
            let value = ValueId(index as u32);
            for found in self.func.uses(value) {
                let operand = self.func.kind(found.user).operands().get(found.operand_index).copied();
                if self.func.is_erased(found.user) || operand != Some(value) {
                    return Err(self.error_at(
                        found.user,
                        format!("Use list of {value} holds a stale entry"),
                    ));
                }
            }
        }
        Ok(())
    }

    fn validate_inst(&self, inst: InstId) -> Result<(), CompilerError> {
        match self.func.kind(inst) {
            InstKind::DeallocStack { operand } => {
                let is_slot = self
                    .func
                    .defining_inst(*operand)
                    .is_some_and(|def| matches!(self.func.kind(def), InstKind::AllocStack { .. }));
                if !is_slot {
                    return Err(self.error_at(inst, "dealloc_stack operand is not an alloc_stack"));
                }
            }

            InstKind::DestroyAddr { operand }
            | InstKind::Load { operand, .. }
            | InstKind::LoadBorrow { operand }
            | InstKind::BeginAccess { operand, .. }
            | InstKind::OpenExistentialAddr { operand, .. }
            | InstKind::UncheckedTakeEnumDataAddr { operand }
            | InstKind::StructElementAddr { operand, .. }
            | InstKind::TupleElementAddr { operand, .. } => {
                self.require_address(inst, *operand)?;
            }

            InstKind::CopyAddr { src, dest, .. } => {
                self.require_address(inst, *src)?;
                self.require_address(inst, *dest)?;
            }

            InstKind::Store { src, dest, .. } => {
                self.require_object(inst, *src)?;
                self.require_address(inst, *dest)?;
            }

            InstKind::DestroyValue { operand } | InstKind::CopyValue { operand } => {
                self.require_object(inst, *operand)?;
            }

            InstKind::Apply { args, .. } | InstKind::TryApply { args, .. } => {
                for arg in args {
                    let is_address = self.func.value_type(arg.value).is_address();
                    if is_address != arg.convention.is_indirect() {
                        return Err(self.error_at(
                            inst,
                            format!(
                                "Argument {} is passed as [{}] but its type is {}",
                                arg.value,
                                arg.convention.as_str(),
                                self.func.value_type(arg.value)
                            ),
                        ));
                    }
                }
            }

            _ => {}
        }

        Ok(())
    }

    fn require_address(&self, inst: InstId, value: ValueId) -> Result<(), CompilerError> {
        if self.func.value_type(value).is_address() {
            return Ok(());
        }
        Err(self.error_at(
            inst,
            format!(
                "{} expects an address operand but {value} is {}",
                self.func.kind(inst).name(),
                self.func.value_type(value)
            ),
        ))
    }

    fn require_object(&self, inst: InstId, value: ValueId) -> Result<(), CompilerError> {
        if !self.func.value_type(value).is_address() {
            return Ok(());
        }
        Err(self.error_at(
            inst,
            format!(
                "{} expects an object operand but {value} is an address",
                self.func.kind(inst).name()
            ),
        ))
    }

    fn error_at(&self, inst: InstId, message: impl Into<String>) -> CompilerError {
        let mut error = CompilerError::new(
            message,
            ErrorLocation::at_inst(self.func.name.clone(), self.func.inst_block(inst), inst),
            ErrorType::Ir,
        );
        error.new_metadata_entry(ErrorMetaDataKey::InstructionKind, self.func.kind(inst).name());
        error
    }

    fn error_at_block(&self, block: BlockId, message: impl Into<String>) -> CompilerError {
        CompilerError::new(
            message,
            ErrorLocation::at_block(self.func.name.clone(), block),
            ErrorType::Ir,
        )
    }
}
