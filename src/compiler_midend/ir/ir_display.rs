use crate::compiler_midend::ir::ir_function::{IrFunction, IrModule};
use crate::compiler_midend::ir::ir_nodes::{
    AccessKind, CallArgument, InstId, InstKind, LoadQualifier, MemoryEffects, OpenedAccess,
    StoreQualifier,
};
use std::fmt;

fn format_args_list(args: &[CallArgument]) -> String {
    args.iter()
        .map(|arg| format!("{} [{}]", arg.value, arg.convention.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn effects_suffix(effects: MemoryEffects) -> &'static str {
    match effects {
        MemoryEffects::None => " [readnone]",
        MemoryEffects::ReadOnly => " [readonly]",
        MemoryEffects::MayWrite => "",
    }
}

impl fmt::Display for InstKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name();
        match self {
            InstKind::AllocStack {
                ty,
                dynamic_lifetime,
            } => {
                let dynamic = if *dynamic_lifetime { "[dynamic_lifetime] " } else { "" };
                write!(f, "{name} {dynamic}{}", ty.object_type())
            }
            InstKind::CopyAddr {
                src,
                dest,
                take,
                init,
            } => {
                let take = if *take { "[take] " } else { "" };
                let init = if *init { "[init] " } else { "" };
                write!(f, "{name} {take}{src} to {init}{dest}")
            }
            InstKind::Store {
                src,
                dest,
                qualifier,
            } => {
                let qualifier = match qualifier {
                    StoreQualifier::Init => "init",
                    StoreQualifier::Assign => "assign",
                    StoreQualifier::Trivial => "trivial",
                };
                write!(f, "{name} {src} to [{qualifier}] {dest}")
            }
            InstKind::Load { operand, qualifier } => {
                let qualifier = match qualifier {
                    LoadQualifier::Copy => "copy",
                    LoadQualifier::Take => "take",
                    LoadQualifier::Trivial => "trivial",
                };
                write!(f, "{name} [{qualifier}] {operand}")
            }
            InstKind::BeginAccess { operand, kind } => {
                let kind = match kind {
                    AccessKind::Read => "read",
                    AccessKind::Modify => "modify",
                    AccessKind::Init => "init",
                    AccessKind::Deinit => "deinit",
                };
                write!(f, "{name} [{kind}] {operand}")
            }
            InstKind::OpenExistentialAddr { operand, access } => {
                let access = match access {
                    OpenedAccess::Immutable => "immutable_access",
                    OpenedAccess::Mutable => "mutable_access",
                };
                write!(f, "{name} {access} {operand}")
            }
            InstKind::StructElementAddr { operand, field } => {
                write!(f, "{name} {operand}, #{field}")
            }
            InstKind::TupleElementAddr { operand, index } => {
                write!(f, "{name} {operand}, {index}")
            }
            InstKind::DeallocStack { operand }
            | InstKind::LoadBorrow { operand }
            | InstKind::EndBorrow { operand }
            | InstKind::DestroyAddr { operand }
            | InstKind::DestroyValue { operand }
            | InstKind::CopyValue { operand }
            | InstKind::EndAccess { operand }
            | InstKind::UncheckedTakeEnumDataAddr { operand }
            | InstKind::FixLifetime { operand } => write!(f, "{name} {operand}"),

            InstKind::Apply {
                callee,
                args,
                effects,
            } => write!(
                f,
                "{name} @{callee}({}){}",
                format_args_list(args),
                effects_suffix(*effects)
            ),
            InstKind::Builtin {
                name: builtin,
                operands,
                effects,
            } => {
                let operands = operands
                    .iter()
                    .map(|operand| operand.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{name} \"{builtin}\"({operands}){}", effects_suffix(*effects))
            }

            InstKind::Branch { target } => write!(f, "{name} {target}"),
            InstKind::CondBranch {
                condition,
                then_block,
                else_block,
            } => write!(f, "{name} {condition}, {then_block}, {else_block}"),
            InstKind::Return { operand } => match operand {
                Some(operand) => write!(f, "{name} {operand}"),
                None => write!(f, "{name}"),
            },
            InstKind::Unreachable => write!(f, "{name}"),
            InstKind::TryApply {
                callee,
                args,
                effects,
                normal,
                error,
            } => write!(
                f,
                "{name} @{callee}({}){}, normal {normal}, error {error}",
                format_args_list(args),
                effects_suffix(*effects)
            ),
        }
    }
}

impl IrFunction {
    pub fn display_inst(&self, inst: InstId) -> String {
        match self.inst_result(inst) {
            Some(result) => format!(
                "{result} = {} : {}",
                self.kind(inst),
                self.value_type(result)
            ),
            None => self.kind(inst).to_string(),
        }
    }
}

impl fmt::Display for IrFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arguments = self
            .arguments
            .iter()
            .map(|argument| {
                format!(
                    "{} : {} [{}]",
                    argument.value,
                    self.value_type(argument.value),
                    argument.convention.as_str()
                )
            })
            .collect::<Vec<_>>()
            .join(", ");

        writeln!(f, "func @{}({arguments}) {{", self.name)?;
        for block in self.block_ids() {
            writeln!(f, "{block}:")?;
            for inst in self.block_insts(block) {
                writeln!(f, "  {}", self.display_inst(inst))?;
            }
        }
        writeln!(f, "}}")
    }
}

impl fmt::Display for IrModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "// module {}", self.name)?;
        for function in &self.functions {
            writeln!(f)?;
            write!(f, "{function}")?;
        }
        Ok(())
    }
}
