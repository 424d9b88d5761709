use crate::compiler_midend::ir::ir_function::IrFunction;
use crate::compiler_midend::ir::ir_nodes::BlockId;

/// Successor and predecessor lists, indexed by block id
#[derive(Debug, Clone, Default)]
pub struct ControlFlowGraph {
    successors: Vec<Vec<BlockId>>,
    predecessors: Vec<Vec<BlockId>>,
}

impl ControlFlowGraph {
    pub fn compute(func: &IrFunction) -> Self {
        let block_count = func.block_count();
        let mut successors = vec![Vec::new(); block_count];
        let mut predecessors = vec![Vec::new(); block_count];

        for block in func.block_ids() {
            for successor in func.successors(block) {
                // A block reached twice from one terminator is still one edge for liveness
                if !successors[block.0 as usize].contains(&successor) {
                    successors[block.0 as usize].push(successor);
                    predecessors[successor.0 as usize].push(block);
                }
            }
        }

        ControlFlowGraph {
            successors,
            predecessors,
        }
    }

    pub fn successors(&self, block: BlockId) -> &[BlockId] {
        self.successors
            .get(block.0 as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn predecessors(&self, block: BlockId) -> &[BlockId] {
        self.predecessors
            .get(block.0 as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn single_predecessor(&self, block: BlockId) -> Option<BlockId> {
        match self.predecessors(block) {
            [only] => Some(*only),
            _ => None,
        }
    }
}
