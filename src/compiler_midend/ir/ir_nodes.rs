//! Ownership-qualified mid-level IR nodes
//!
//! Every memory operation carries its ownership semantics explicitly:
//! loads copy or take, stores initialize or assign, copies may take their source
//! and may initialize their destination. Stack slots are created and destroyed by
//! explicit `alloc_stack` / `dealloc_stack` pairs.

use serde::{Deserialize, Serialize};
use std::fmt;

// =========================================================================
// Identifiers
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FunctionId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueId(pub u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

// =========================================================================
// Types
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeCategory {
    #[default]
    Object,
    Address,
}

/// A lowered type. Only the properties the optimizer cares about are modelled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IrType {
    pub name: String,

    #[serde(default)]
    pub category: TypeCategory,

    /// Optional-shaped sum type. Taking its payload address does not invalidate the enum.
    #[serde(default)]
    pub optional: bool,

    /// Trivial types need no copy or destroy
    #[serde(default)]
    pub trivial: bool,
}

impl IrType {
    pub fn object(name: impl Into<String>) -> Self {
        IrType {
            name: name.into(),
            category: TypeCategory::Object,
            optional: false,
            trivial: false,
        }
    }

    pub fn trivial(name: impl Into<String>) -> Self {
        IrType {
            trivial: true,
            ..IrType::object(name)
        }
    }

    pub fn optional_of(name: impl Into<String>) -> Self {
        IrType {
            optional: true,
            ..IrType::object(name)
        }
    }

    pub fn address_type(&self) -> IrType {
        IrType {
            category: TypeCategory::Address,
            ..self.clone()
        }
    }

    pub fn object_type(&self) -> IrType {
        IrType {
            category: TypeCategory::Object,
            ..self.clone()
        }
    }

    pub fn is_address(&self) -> bool {
        self.category == TypeCategory::Address
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.category {
            TypeCategory::Address => write!(f, "*${}", self.name),
            TypeCategory::Object => write!(f, "${}", self.name),
        }
    }
}

// =========================================================================
// Ownership qualifiers and conventions
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadQualifier {
    Copy,
    Take,
    Trivial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreQualifier {
    Init,
    Assign,
    Trivial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessKind {
    Read,
    Modify,
    Init,
    Deinit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenedAccess {
    Immutable,
    Mutable,
}

/// What a call or builtin may do to memory it is not handed explicitly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryEffects {
    None,
    ReadOnly,
    #[default]
    MayWrite,
}

impl MemoryEffects {
    pub fn may_write(self) -> bool {
        self == MemoryEffects::MayWrite
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgumentConvention {
    /// Consumed, passed by address
    IndirectIn,
    IndirectInGuaranteed,
    IndirectInout,
    IndirectInoutAliasable,
    IndirectOut,
    DirectOwned,
    DirectGuaranteed,
    DirectUnowned,
}

impl ArgumentConvention {
    pub fn is_indirect(self) -> bool {
        matches!(
            self,
            ArgumentConvention::IndirectIn
                | ArgumentConvention::IndirectInGuaranteed
                | ArgumentConvention::IndirectInout
                | ArgumentConvention::IndirectInoutAliasable
                | ArgumentConvention::IndirectOut
        )
    }

    /// The callee only reads the argument and leaves it alive
    pub fn is_guaranteed(self) -> bool {
        matches!(
            self,
            ArgumentConvention::IndirectInGuaranteed | ArgumentConvention::DirectGuaranteed
        )
    }

    pub fn is_inout(self) -> bool {
        matches!(
            self,
            ArgumentConvention::IndirectInout | ArgumentConvention::IndirectInoutAliasable
        )
    }

    /// The callee may write or consume the memory behind the argument
    pub fn may_write_argument(self) -> bool {
        matches!(
            self,
            ArgumentConvention::IndirectIn
                | ArgumentConvention::IndirectInout
                | ArgumentConvention::IndirectInoutAliasable
                | ArgumentConvention::IndirectOut
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ArgumentConvention::IndirectIn => "in",
            ArgumentConvention::IndirectInGuaranteed => "in_guaranteed",
            ArgumentConvention::IndirectInout => "inout",
            ArgumentConvention::IndirectInoutAliasable => "inout_aliasable",
            ArgumentConvention::IndirectOut => "out",
            ArgumentConvention::DirectOwned => "owned",
            ArgumentConvention::DirectGuaranteed => "guaranteed",
            ArgumentConvention::DirectUnowned => "unowned",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallArgument {
    pub value: ValueId,
    pub convention: ArgumentConvention,
}

impl CallArgument {
    pub fn new(value: ValueId, convention: ArgumentConvention) -> Self {
        CallArgument { value, convention }
    }
}

// =========================================================================
// Instructions
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum InstKind {
    // Stack slots
    AllocStack {
        ty: IrType,
        /// Conditionally initialized or taken on some paths
        #[serde(default)]
        dynamic_lifetime: bool,
    },
    DeallocStack {
        operand: ValueId,
    },

    // Memory operations
    CopyAddr {
        src: ValueId,
        dest: ValueId,
        #[serde(default)]
        take: bool,
        #[serde(default)]
        init: bool,
    },
    Store {
        src: ValueId,
        dest: ValueId,
        qualifier: StoreQualifier,
    },
    Load {
        operand: ValueId,
        qualifier: LoadQualifier,
    },
    LoadBorrow {
        operand: ValueId,
    },
    EndBorrow {
        operand: ValueId,
    },
    DestroyAddr {
        operand: ValueId,
    },

    // Owned values
    DestroyValue {
        operand: ValueId,
    },
    CopyValue {
        operand: ValueId,
    },

    // Access scopes
    BeginAccess {
        operand: ValueId,
        kind: AccessKind,
    },
    EndAccess {
        operand: ValueId,
    },

    // Address projections
    OpenExistentialAddr {
        operand: ValueId,
        access: OpenedAccess,
    },
    UncheckedTakeEnumDataAddr {
        operand: ValueId,
    },
    StructElementAddr {
        operand: ValueId,
        field: u32,
    },
    TupleElementAddr {
        operand: ValueId,
        index: u32,
    },

    FixLifetime {
        operand: ValueId,
    },

    Apply {
        callee: String,
        args: Vec<CallArgument>,
        #[serde(default)]
        effects: MemoryEffects,
    },
    Builtin {
        name: String,
        operands: Vec<ValueId>,
        #[serde(default)]
        effects: MemoryEffects,
    },

    // Terminators
    Branch {
        target: BlockId,
    },
    CondBranch {
        condition: ValueId,
        then_block: BlockId,
        else_block: BlockId,
    },
    Return {
        #[serde(default)]
        operand: Option<ValueId>,
    },
    Unreachable,
    TryApply {
        callee: String,
        args: Vec<CallArgument>,
        #[serde(default)]
        effects: MemoryEffects,
        normal: BlockId,
        error: BlockId,
    },
}

impl InstKind {
    /// Operands in a fixed order. `operands_mut` yields the same order.
    pub fn operands(&self) -> Vec<ValueId> {
        match self {
            InstKind::AllocStack { .. }
            | InstKind::Branch { .. }
            | InstKind::Unreachable => Vec::new(),

            InstKind::CopyAddr { src, dest, .. } | InstKind::Store { src, dest, .. } => {
                vec![*src, *dest]
            }

            InstKind::DeallocStack { operand }
            | InstKind::Load { operand, .. }
            | InstKind::LoadBorrow { operand }
            | InstKind::EndBorrow { operand }
            | InstKind::DestroyAddr { operand }
            | InstKind::DestroyValue { operand }
            | InstKind::CopyValue { operand }
            | InstKind::BeginAccess { operand, .. }
            | InstKind::EndAccess { operand }
            | InstKind::OpenExistentialAddr { operand, .. }
            | InstKind::UncheckedTakeEnumDataAddr { operand }
            | InstKind::StructElementAddr { operand, .. }
            | InstKind::TupleElementAddr { operand, .. }
            | InstKind::FixLifetime { operand } => vec![*operand],

            InstKind::Apply { args, .. } | InstKind::TryApply { args, .. } => {
                args.iter().map(|arg| arg.value).collect()
            }
            InstKind::Builtin { operands, .. } => operands.clone(),

            InstKind::CondBranch { condition, .. } => vec![*condition],
            InstKind::Return { operand } => operand.iter().copied().collect(),
        }
    }

    pub fn operands_mut(&mut self) -> Vec<&mut ValueId> {
        match self {
            InstKind::AllocStack { .. }
            | InstKind::Branch { .. }
            | InstKind::Unreachable => Vec::new(),

            InstKind::CopyAddr { src, dest, .. } | InstKind::Store { src, dest, .. } => {
                vec![src, dest]
            }

            InstKind::DeallocStack { operand }
            | InstKind::Load { operand, .. }
            | InstKind::LoadBorrow { operand }
            | InstKind::EndBorrow { operand }
            | InstKind::DestroyAddr { operand }
            | InstKind::DestroyValue { operand }
            | InstKind::CopyValue { operand }
            | InstKind::BeginAccess { operand, .. }
            | InstKind::EndAccess { operand }
            | InstKind::OpenExistentialAddr { operand, .. }
            | InstKind::UncheckedTakeEnumDataAddr { operand }
            | InstKind::StructElementAddr { operand, .. }
            | InstKind::TupleElementAddr { operand, .. }
            | InstKind::FixLifetime { operand } => vec![operand],

            InstKind::Apply { args, .. } | InstKind::TryApply { args, .. } => {
                args.iter_mut().map(|arg| &mut arg.value).collect()
            }
            InstKind::Builtin { operands, .. } => operands.iter_mut().collect(),

            InstKind::CondBranch { condition, .. } => vec![condition],
            InstKind::Return { operand } => operand.iter_mut().collect(),
        }
    }

    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            InstKind::Branch { .. }
                | InstKind::CondBranch { .. }
                | InstKind::Return { .. }
                | InstKind::Unreachable
                | InstKind::TryApply { .. }
        )
    }

    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            InstKind::Branch { target } => vec![*target],
            InstKind::CondBranch {
                then_block,
                else_block,
                ..
            } => vec![*then_block, *else_block],
            InstKind::TryApply { normal, error, .. } => vec![*normal, *error],
            _ => Vec::new(),
        }
    }

    /// Call arguments for `apply` and `try_apply`
    pub fn call_arguments(&self) -> Option<&[CallArgument]> {
        match self {
            InstKind::Apply { args, .. } | InstKind::TryApply { args, .. } => Some(args),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            InstKind::AllocStack { .. } => "alloc_stack",
            InstKind::DeallocStack { .. } => "dealloc_stack",
            InstKind::CopyAddr { .. } => "copy_addr",
            InstKind::Store { .. } => "store",
            InstKind::Load { .. } => "load",
            InstKind::LoadBorrow { .. } => "load_borrow",
            InstKind::EndBorrow { .. } => "end_borrow",
            InstKind::DestroyAddr { .. } => "destroy_addr",
            InstKind::DestroyValue { .. } => "destroy_value",
            InstKind::CopyValue { .. } => "copy_value",
            InstKind::BeginAccess { .. } => "begin_access",
            InstKind::EndAccess { .. } => "end_access",
            InstKind::OpenExistentialAddr { .. } => "open_existential_addr",
            InstKind::UncheckedTakeEnumDataAddr { .. } => "unchecked_take_enum_data_addr",
            InstKind::StructElementAddr { .. } => "struct_element_addr",
            InstKind::TupleElementAddr { .. } => "tuple_element_addr",
            InstKind::FixLifetime { .. } => "fix_lifetime",
            InstKind::Apply { .. } => "apply",
            InstKind::Builtin { .. } => "builtin",
            InstKind::Branch { .. } => "br",
            InstKind::CondBranch { .. } => "cond_br",
            InstKind::Return { .. } => "return",
            InstKind::Unreachable => "unreachable",
            InstKind::TryApply { .. } => "try_apply",
        }
    }
}
