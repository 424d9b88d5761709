pub mod ir_builder;
pub mod ir_display;
pub mod ir_function;
pub mod ir_json;
pub mod ir_nodes;
pub mod ir_validation;
