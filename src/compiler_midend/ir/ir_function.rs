//! Function and module containers
//!
//! Instructions live in one arena per function and are threaded through their
//! block as a doubly linked list. Erasing an instruction only unlinks it, so ids
//! stay stable and a cursor held by a caller survives erasure of other instructions.
//!
//! Every value keeps a list of its uses by live instructions. All operand changes go
//! through this type so the lists stay in sync.

use crate::compiler_midend::ir::ir_nodes::{
    ArgumentConvention, BlockId, FunctionId, InstId, InstKind, IrType, ValueId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueDef {
    Argument(u32),
    Inst(InstId),
}

#[derive(Debug, Clone)]
pub struct ValueData {
    pub ty: IrType,
    pub def: ValueDef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionArgument {
    pub value: ValueId,
    pub convention: ArgumentConvention,
}

#[derive(Debug, Clone)]
pub struct InstData {
    pub kind: InstKind,
    pub block: BlockId,
    pub result: Option<ValueId>,
    pub prev: Option<InstId>,
    pub next: Option<InstId>,
    pub erased: bool,
}

#[derive(Debug, Clone, Default)]
pub struct BlockData {
    pub first: Option<InstId>,
    pub last: Option<InstId>,
}

/// A single use of a value: the instruction and the operand slot that reads it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Use {
    pub user: InstId,
    pub operand_index: usize,
}

#[derive(Debug, Clone)]
pub struct IrFunction {
    pub id: FunctionId,
    pub name: String,
    pub arguments: Vec<FunctionArgument>,
    values: Vec<ValueData>,
    insts: Vec<InstData>,
    blocks: Vec<BlockData>,

    // Indexed by value id, in the order the uses were added
    uses: Vec<Vec<Use>>,
}

impl IrFunction {
    pub fn new(id: FunctionId, name: impl Into<String>) -> Self {
        IrFunction {
            id,
            name: name.into(),
            arguments: Vec::new(),
            values: Vec::new(),
            insts: Vec::new(),
            blocks: Vec::new(),
            uses: Vec::new(),
        }
    }

    // =====================================================================
    // Construction
    // =====================================================================

    pub fn add_argument(&mut self, ty: IrType, convention: ArgumentConvention) -> ValueId {
        let value = ValueId(self.values.len() as u32);
        self.values.push(ValueData {
            ty,
            def: ValueDef::Argument(self.arguments.len() as u32),
        });
        self.uses.push(Vec::new());
        self.arguments.push(FunctionArgument { value, convention });
        value
    }

    pub fn add_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(BlockData::default());
        id
    }

    fn new_inst(&mut self, block: BlockId, kind: InstKind, result_ty: Option<IrType>) -> InstId {
        let id = InstId(self.insts.len() as u32);
        let result = result_ty.map(|ty| {
            let value = ValueId(self.values.len() as u32);
            self.values.push(ValueData {
                ty,
                def: ValueDef::Inst(id),
            });
            self.uses.push(Vec::new());
            value
        });

        for (operand_index, operand) in kind.operands().into_iter().enumerate() {
            self.add_use(operand, Use { user: id, operand_index });
        }

        self.insts.push(InstData {
            kind,
            block,
            result,
            prev: None,
            next: None,
            erased: false,
        });
        id
    }

    /// Appends an instruction to the end of a block
    pub fn append_inst(
        &mut self,
        block: BlockId,
        kind: InstKind,
        result_ty: Option<IrType>,
    ) -> InstId {
        let id = self.new_inst(block, kind, result_ty);
        let last = self.blocks[block.0 as usize].last;

        self.insts[id.0 as usize].prev = last;
        match last {
            Some(last) => self.insts[last.0 as usize].next = Some(id),
            None => self.blocks[block.0 as usize].first = Some(id),
        }
        self.blocks[block.0 as usize].last = Some(id);

        id
    }

    /// Inserts a new instruction immediately before `before`, in the same block
    pub fn insert_inst_before(
        &mut self,
        before: InstId,
        kind: InstKind,
        result_ty: Option<IrType>,
    ) -> InstId {
        let block = self.insts[before.0 as usize].block;
        let id = self.new_inst(block, kind, result_ty);
        let prev = self.insts[before.0 as usize].prev;

        self.insts[id.0 as usize].prev = prev;
        self.insts[id.0 as usize].next = Some(before);
        self.insts[before.0 as usize].prev = Some(id);
        match prev {
            Some(prev) => self.insts[prev.0 as usize].next = Some(id),
            None => self.blocks[block.0 as usize].first = Some(id),
        }

        id
    }

    /// Appends an instruction producing a value and returns that value
    pub fn append_value_inst(&mut self, block: BlockId, kind: InstKind, ty: IrType) -> ValueId {
        let value = ValueId(self.values.len() as u32);
        self.append_inst(block, kind, Some(ty));
        value
    }

    pub fn insert_value_inst_before(&mut self, before: InstId, kind: InstKind, ty: IrType) -> ValueId {
        let value = ValueId(self.values.len() as u32);
        self.insert_inst_before(before, kind, Some(ty));
        value
    }

    /// Unlinks an instruction from its block.
    /// Uses of its result are not touched, the caller must have replaced them.
    pub fn erase_inst(&mut self, inst: InstId) {
        let data = &self.insts[inst.0 as usize];
        if data.erased {
            return;
        }

        let (block, prev, next) = (data.block, data.prev, data.next);
        match prev {
            Some(prev) => self.insts[prev.0 as usize].next = next,
            None => self.blocks[block.0 as usize].first = next,
        }
        match next {
            Some(next) => self.insts[next.0 as usize].prev = prev,
            None => self.blocks[block.0 as usize].last = prev,
        }

        let data = &mut self.insts[inst.0 as usize];
        data.erased = true;
        data.prev = None;
        data.next = None;

        let operands = self.insts[inst.0 as usize].kind.operands();
        for (operand_index, operand) in operands.into_iter().enumerate() {
            self.remove_use(operand, Use { user: inst, operand_index });
        }
    }

    fn add_use(&mut self, value: ValueId, found: Use) {
        // Operands of unknown values are left for validation to report
        if let Some(uses) = self.uses.get_mut(value.0 as usize) {
            uses.push(found);
        }
    }

    fn remove_use(&mut self, value: ValueId, found: Use) {
        if let Some(uses) = self.uses.get_mut(value.0 as usize) {
            if let Some(position) = uses.iter().position(|candidate| *candidate == found) {
                uses.remove(position);
            }
        }
    }

    // =====================================================================
    // Layout queries
    // =====================================================================

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> + '_ {
        (0..self.blocks.len() as u32).map(BlockId)
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn first_inst(&self, block: BlockId) -> Option<InstId> {
        self.blocks[block.0 as usize].first
    }

    pub fn last_inst(&self, block: BlockId) -> Option<InstId> {
        self.blocks[block.0 as usize].last
    }

    pub fn next_inst(&self, inst: InstId) -> Option<InstId> {
        self.insts[inst.0 as usize].next
    }

    pub fn prev_inst(&self, inst: InstId) -> Option<InstId> {
        self.insts[inst.0 as usize].prev
    }

    /// Live instructions of a block in order. Collected up front, so the caller may mutate.
    pub fn block_insts(&self, block: BlockId) -> Vec<InstId> {
        let mut insts = Vec::new();
        let mut cursor = self.first_inst(block);
        while let Some(inst) = cursor {
            insts.push(inst);
            cursor = self.next_inst(inst);
        }
        insts
    }

    /// Every live instruction in block order
    pub fn live_insts(&self) -> Vec<InstId> {
        self.block_ids()
            .flat_map(|block| self.block_insts(block))
            .collect()
    }

    pub fn live_inst_count(&self) -> usize {
        self.insts.iter().filter(|inst| !inst.erased).count()
    }

    pub fn terminator(&self, block: BlockId) -> Option<InstId> {
        self.last_inst(block)
            .filter(|inst| self.kind(*inst).is_terminator())
    }

    pub fn successors(&self, block: BlockId) -> Vec<BlockId> {
        match self.terminator(block) {
            Some(term) => self.kind(term).successors(),
            None => Vec::new(),
        }
    }

    // =====================================================================
    // Instruction accessors
    // =====================================================================

    pub fn inst(&self, inst: InstId) -> &InstData {
        &self.insts[inst.0 as usize]
    }

    pub fn kind(&self, inst: InstId) -> &InstKind {
        &self.insts[inst.0 as usize].kind
    }

    pub fn inst_block(&self, inst: InstId) -> BlockId {
        self.insts[inst.0 as usize].block
    }

    pub fn inst_result(&self, inst: InstId) -> Option<ValueId> {
        self.insts[inst.0 as usize].result
    }

    pub fn is_erased(&self, inst: InstId) -> bool {
        self.insts[inst.0 as usize].erased
    }

    pub fn set_operand(&mut self, inst: InstId, operand_index: usize, value: ValueId) {
        let Some(operand) = self.insts[inst.0 as usize]
            .kind
            .operands_mut()
            .into_iter()
            .nth(operand_index)
        else {
            return;
        };

        let old = *operand;
        if old == value {
            return;
        }
        *operand = value;

        if !self.is_erased(inst) {
            let found = Use { user: inst, operand_index };
            self.remove_use(old, found);
            self.add_use(value, found);
        }
    }

    /// Sets the take flag of a `copy_addr`. Other instructions are left alone.
    pub fn set_copy_take(&mut self, inst: InstId, take: bool) {
        if let InstKind::CopyAddr { take: flag, .. } = &mut self.insts[inst.0 as usize].kind {
            *flag = take;
        }
    }

    // =====================================================================
    // Values
    // =====================================================================

    pub fn value(&self, value: ValueId) -> &ValueData {
        &self.values[value.0 as usize]
    }

    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    pub fn value_type(&self, value: ValueId) -> &IrType {
        &self.values[value.0 as usize].ty
    }

    pub fn defining_inst(&self, value: ValueId) -> Option<InstId> {
        match self.values.get(value.0 as usize)?.def {
            ValueDef::Inst(inst) => Some(inst),
            ValueDef::Argument(_) => None,
        }
    }

    pub fn argument_convention(&self, value: ValueId) -> Option<ArgumentConvention> {
        match self.values.get(value.0 as usize)?.def {
            ValueDef::Argument(index) => self
                .arguments
                .get(index as usize)
                .map(|argument| argument.convention),
            ValueDef::Inst(_) => None,
        }
    }

    /// A value is live when it is an argument or the result of a live instruction
    pub fn is_live_value(&self, value: ValueId) -> bool {
        match self.values.get(value.0 as usize) {
            Some(data) => match data.def {
                ValueDef::Argument(_) => true,
                ValueDef::Inst(inst) => !self.is_erased(inst),
            },
            None => false,
        }
    }

    /// Every use of a value by a live instruction. Copied out, so the caller may mutate.
    pub fn uses_of(&self, value: ValueId) -> Vec<Use> {
        self.uses(value).to_vec()
    }

    pub fn uses(&self, value: ValueId) -> &[Use] {
        self.uses
            .get(value.0 as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_uses(&self, value: ValueId) -> bool {
        !self.uses(value).is_empty()
    }

    pub fn replace_all_uses(&mut self, old: ValueId, new: ValueId) {
        for found in self.uses_of(old) {
            self.set_operand(found.user, found.operand_index, new);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IrModule {
    pub name: String,
    pub functions: Vec<IrFunction>,
}

impl IrModule {
    pub fn new(name: impl Into<String>) -> Self {
        IrModule {
            name: name.into(),
            functions: Vec::new(),
        }
    }

    pub fn add_function(&mut self, name: impl Into<String>) -> &mut IrFunction {
        let id = FunctionId(self.functions.len() as u32);
        self.functions.push(IrFunction::new(id, name));
        let index = self.functions.len() - 1;
        &mut self.functions[index]
    }
}
