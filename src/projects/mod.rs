// The command line driver and the settings it loads
pub mod cli;
pub mod settings;
