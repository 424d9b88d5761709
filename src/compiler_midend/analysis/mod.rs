pub mod alias_analysis;
pub mod cfg;
pub mod value_lifetime;
