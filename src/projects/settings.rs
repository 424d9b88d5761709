use crate::compiler_midend::compiler_messages::compiler_errors::CompilerError;
use crate::return_config_error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = "tempslot.toml";
pub const IR_FILE_EXTENSION: &str = "json";

pub const DEFAULT_MAX_PROJECTION_DEPTH: usize = 32;

/// Settings of the temp slot pass and the module pipeline around it
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PassConfig {
    /// Deepest projection chain the use classifier follows before giving up
    pub max_projection_depth: usize,

    /// Optimize functions on the rayon pool
    pub parallel: bool,

    /// Re-validate every function after the pass
    pub verify_after_pass: bool,
}

impl Default for PassConfig {
    fn default() -> Self {
        Self {
            max_projection_depth: DEFAULT_MAX_PROJECTION_DEPTH,
            parallel: true,
            verify_after_pass: true,
        }
    }
}

/// Root of the config file. Unknown tables are ignored.
#[derive(Debug, Default, Deserialize)]
struct ConfigToml {
    #[serde(default)]
    temp_slot: PassConfig,
}

impl PassConfig {
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    pub fn from_toml_str(source: &str, path: &Path) -> Result<PassConfig, CompilerError> {
        let config: ConfigToml = match toml::from_str(source) {
            Ok(config) => config,
            Err(e) => return_config_error!(path, format!("Invalid config file: {e}"), {
                CompilationStage => "Config",
                PrimarySuggestion => "Settings belong in a [temp_slot] table",
            }),
        };

        if config.temp_slot.max_projection_depth == 0 {
            return_config_error!(path, "max_projection_depth must be at least 1", {
                CompilationStage => "Config",
            });
        }

        Ok(config.temp_slot)
    }
}

pub fn load_pass_config(path: &Path) -> Result<PassConfig, CompilerError> {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            return Err(CompilerError::file_error(
                path,
                format!("Could not read config file: {e}"),
            ));
        }
    };

    PassConfig::from_toml_str(&source, path)
}
