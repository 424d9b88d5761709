pub mod analysis;
pub mod compiler_messages;
pub mod ir;
pub mod optimizers;
