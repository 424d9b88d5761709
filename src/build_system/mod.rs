pub mod core_build;
