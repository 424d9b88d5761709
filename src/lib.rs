//! Temporary slot elimination for an ownership-qualified IR.
//!
//! The optimizer removes stack slots that only hold a short lived copy of another
//! address or value, see [`compiler_midend::optimizers::temp_slot`].

pub mod build_system;
pub mod compiler_midend;
pub mod projects;
