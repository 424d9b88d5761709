//! JSON form of an IR module.
//!
//! Value numbering is implicit: arguments take ids `0..n` in order, then every
//! instruction with a `result` type takes the next id in program order.
//! Serializing renumbers, so erased instructions leave no gaps in the output.

use crate::compiler_midend::compiler_messages::compiler_errors::{CompilerError, ErrorLocation};
use crate::compiler_midend::ir::ir_function::{IrFunction, IrModule};
use crate::compiler_midend::ir::ir_nodes::{
    ArgumentConvention, BlockId, FunctionId, InstKind, IrType, ValueId,
};
use crate::return_ir_error;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct SerializedModule {
    pub name: String,
    #[serde(default)]
    pub functions: Vec<SerializedFunction>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SerializedFunction {
    pub name: String,
    #[serde(default)]
    pub arguments: Vec<SerializedArgument>,
    pub blocks: Vec<Vec<SerializedInst>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SerializedArgument {
    pub ty: IrType,
    pub convention: ArgumentConvention,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SerializedInst {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<IrType>,
    pub inst: InstKind,
}

impl IrModule {
    pub fn from_json(source: &str) -> Result<IrModule, CompilerError> {
        let serialized: SerializedModule = match serde_json::from_str(source) {
            Ok(module) => module,
            Err(e) => {
                return_ir_error!(
                    format!("Could not parse IR module JSON: {e}"),
                    ErrorLocation::default(),
                    {
                        CompilationStage => "Loading IR",
                    }
                );
            }
        };

        let mut module = IrModule::new(serialized.name);
        for (index, function) in serialized.functions.into_iter().enumerate() {
            module
                .functions
                .push(function.into_ir(FunctionId(index as u32))?);
        }

        Ok(module)
    }

    pub fn to_json(&self) -> Result<String, CompilerError> {
        let serialized = SerializedModule {
            name: self.name.clone(),
            functions: self.functions.iter().map(SerializedFunction::from_ir).collect(),
        };

        serde_json::to_string_pretty(&serialized).map_err(|e| {
            CompilerError::compiler_error(format!("Could not serialize IR module: {e}"))
        })
    }
}

impl SerializedFunction {
    fn into_ir(self, id: FunctionId) -> Result<IrFunction, CompilerError> {
        let mut func = IrFunction::new(id, self.name);
        for argument in self.arguments {
            func.add_argument(argument.ty, argument.convention);
        }

        let blocks: Vec<BlockId> = self.blocks.iter().map(|_| func.add_block()).collect();
        for (block, insts) in blocks.into_iter().zip(self.blocks) {
            for serialized in insts {
                // Operands must refer to already defined values, successors to existing blocks
                for operand in serialized.inst.operands() {
                    if operand.0 as usize >= func.value_count() {
                        return_ir_error!(
                            format!(
                                "{} uses {operand} before it is defined",
                                serialized.inst.name()
                            ),
                            ErrorLocation::at_block(func.name.clone(), block),
                            {
                                CompilationStage => "Loading IR",
                                InstructionKind => serialized.inst.name(),
                            }
                        );
                    }
                }
                for target in serialized.inst.successors() {
                    if target.0 as usize >= func.block_count() {
                        return_ir_error!(
                            format!("{} branches to missing block {target}", serialized.inst.name()),
                            ErrorLocation::at_block(func.name.clone(), block),
                            {
                                CompilationStage => "Loading IR",
                                InstructionKind => serialized.inst.name(),
                            }
                        );
                    }
                }

                func.append_inst(block, serialized.inst, serialized.result);
            }
        }

        Ok(func)
    }

    fn from_ir(func: &IrFunction) -> SerializedFunction {
        let mut renumbered: FxHashMap<ValueId, ValueId> = FxHashMap::default();
        let mut next_value = 0u32;
        let mut fresh = |old: ValueId, map: &mut FxHashMap<ValueId, ValueId>| {
            map.insert(old, ValueId(next_value));
            next_value += 1;
        };

        let arguments = func
            .arguments
            .iter()
            .map(|argument| {
                fresh(argument.value, &mut renumbered);
                SerializedArgument {
                    ty: func.value_type(argument.value).clone(),
                    convention: argument.convention,
                }
            })
            .collect();

        let mut blocks = Vec::with_capacity(func.block_count());
        for block in func.block_ids() {
            let mut insts = Vec::new();
            for inst in func.block_insts(block) {
                let mut kind = func.kind(inst).clone();
                for operand in kind.operands_mut() {
                    if let Some(new) = renumbered.get(operand) {
                        *operand = *new;
                    }
                }

                let result = func.inst_result(inst).map(|result| {
                    fresh(result, &mut renumbered);
                    func.value_type(result).clone()
                });

                insts.push(SerializedInst { result, inst: kind });
            }
            blocks.push(insts);
        }

        SerializedFunction {
            name: func.name.clone(),
            arguments,
            blocks,
        }
    }
}
