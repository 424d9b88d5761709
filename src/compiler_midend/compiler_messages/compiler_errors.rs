use crate::compiler_midend::ir::ir_nodes::{BlockId, InstId};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

// The final set of errors emitted from a pipeline run
#[derive(Debug, Default)]
pub struct CompilerMessages {
    pub errors: Vec<CompilerError>,
}

impl CompilerMessages {
    pub fn new() -> Self {
        CompilerMessages { errors: Vec::new() }
    }

    pub fn from_error(error: CompilerError) -> Self {
        CompilerMessages {
            errors: vec![error],
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[derive(Debug, Eq, Hash, PartialEq, Clone, Copy)]
pub enum ErrorMetaDataKey {
    CompilationStage,
    InstructionKind,

    // Optional suggestions
    PrimarySuggestion,
    AlternativeSuggestion,
}

/// Where an error happened.
/// IR errors point at a function and optionally a block or instruction inside it.
/// File and config errors point at a path on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorLocation {
    pub function: Option<String>,
    pub block: Option<BlockId>,
    pub inst: Option<InstId>,
    pub path: Option<PathBuf>,
}

impl ErrorLocation {
    pub fn in_function(name: impl Into<String>) -> Self {
        ErrorLocation {
            function: Some(name.into()),
            ..ErrorLocation::default()
        }
    }

    pub fn at_inst(name: impl Into<String>, block: BlockId, inst: InstId) -> Self {
        ErrorLocation {
            function: Some(name.into()),
            block: Some(block),
            inst: Some(inst),
            path: None,
        }
    }

    pub fn at_block(name: impl Into<String>, block: BlockId) -> Self {
        ErrorLocation {
            function: Some(name.into()),
            block: Some(block),
            ..ErrorLocation::default()
        }
    }

    pub fn at_path(path: &Path) -> Self {
        ErrorLocation {
            path: Some(path.to_path_buf()),
            ..ErrorLocation::default()
        }
    }
}

impl fmt::Display for ErrorLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(path) = &self.path {
            write!(f, "{}", path.display())?;
        }
        if let Some(function) = &self.function {
            write!(f, "@{function}")?;
        }
        if let Some(block) = self.block {
            write!(f, " {block}")?;
        }
        if let Some(inst) = self.inst {
            write!(f, " inst#{}", inst.0)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CompilerError {
    pub msg: String,
    pub location: ErrorLocation,
    pub error_type: ErrorType,

    // This is for creating more structured and detailed error messages
    pub metadata: HashMap<ErrorMetaDataKey, &'static str>,
}

impl CompilerError {
    pub fn new(msg: impl Into<String>, location: ErrorLocation, error_type: ErrorType) -> Self {
        CompilerError {
            msg: msg.into(),
            location,
            error_type,
            metadata: HashMap::new(),
        }
    }

    pub fn with_error_type(mut self, error_type: ErrorType) -> Self {
        self.error_type = error_type;
        self
    }

    pub fn with_path(mut self, path: &Path) -> Self {
        self.location.path = Some(path.to_path_buf());
        self
    }

    pub fn new_metadata_entry(&mut self, key: ErrorMetaDataKey, value: &'static str) {
        self.metadata.insert(key, value);
    }

    /// Malformed IR handed to the optimizer
    pub fn new_ir_error(msg: impl Into<String>, location: ErrorLocation) -> Self {
        CompilerError::new(msg, location, ErrorType::Ir)
    }

    /// Create a compiler error (internal bug, not the IR producer's fault)
    pub fn compiler_error(msg: impl Into<String>) -> Self {
        CompilerError::new(msg, ErrorLocation::default(), ErrorType::Compiler)
    }

    /// Create a file system error from a Path
    pub fn file_error(path: &Path, msg: impl Into<String>) -> Self {
        CompilerError::new(msg, ErrorLocation::at_path(path), ErrorType::File)
    }

    pub fn config_error(path: &Path, msg: impl Into<String>) -> Self {
        CompilerError::new(msg, ErrorLocation::at_path(path), ErrorType::Config)
    }
}

impl fmt::Display for CompilerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {}: {}",
            error_type_to_str(&self.error_type),
            self.location,
            self.msg
        )
    }
}

// Adds more information to the CompilerError
// So it knows which stage produced it
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum ErrorType {
    Ir,
    File,
    Config,
    Compiler,
}

pub fn error_type_to_str(e_type: &ErrorType) -> &'static str {
    match e_type {
        ErrorType::Compiler => "Compiler Bug",
        ErrorType::Config => "Malformed Config",
        ErrorType::File => "File Error",
        ErrorType::Ir => "Malformed IR",
    }
}

/// Returns a new CompilerError for IR that breaks a structural rule.
///
/// Usage:
/// `return_ir_error!("message", location, {
///     CompilationStage => "IR Validation",
///     InstructionKind => "dealloc_stack",
/// })`;
#[macro_export]
macro_rules! return_ir_error {
    ($msg:expr, $location:expr, { $( $key:ident => $value:expr ),* $(,)? }) => {
        return Err($crate::compiler_midend::compiler_messages::compiler_errors::CompilerError {
            msg: $msg.into(),
            location: $location,
            error_type: $crate::compiler_midend::compiler_messages::compiler_errors::ErrorType::Ir,
            metadata: {
                let mut map = std::collections::HashMap::new();
                $(
                    map.insert($crate::compiler_midend::compiler_messages::compiler_errors::ErrorMetaDataKey::$key, $value);
                )*
                map
            },
        })
    };
    ($msg:expr, $location:expr) => {
        return Err($crate::compiler_midend::compiler_messages::compiler_errors::CompilerError {
            msg: $msg.into(),
            location: $location,
            error_type: $crate::compiler_midend::compiler_messages::compiler_errors::ErrorType::Ir,
            metadata: std::collections::HashMap::new(),
        })
    };
}

/// Returns a new CompilerError for internal optimizer bugs.
///
/// These abort the whole pipeline. Use only for broken invariants between passes,
/// never for a candidate the optimizer simply declines to rewrite.
#[macro_export]
macro_rules! return_compiler_error {
    ($msg:expr, $location:expr, { $( $key:ident => $value:expr ),* $(,)? }) => {
        return Err($crate::compiler_midend::compiler_messages::compiler_errors::CompilerError {
            msg: $msg.into(),
            location: $location,
            error_type: $crate::compiler_midend::compiler_messages::compiler_errors::ErrorType::Compiler,
            metadata: {
                let mut map = std::collections::HashMap::new();
                $( map.insert($crate::compiler_midend::compiler_messages::compiler_errors::ErrorMetaDataKey::$key, $value); )*
                map
            },
        })
    };
    ($msg:expr, $location:expr) => {
        return Err($crate::compiler_midend::compiler_messages::compiler_errors::CompilerError {
            msg: $msg.into(),
            location: $location,
            error_type: $crate::compiler_midend::compiler_messages::compiler_errors::ErrorType::Compiler,
            metadata: std::collections::HashMap::new(),
        })
    };
}

/// Returns a new CompilerError
///
/// Usage: `return_config_error!(path, "message")`;
#[macro_export]
macro_rules! return_config_error {
    ($path:expr, $msg:expr, { $( $key:ident => $value:expr ),* $(,)? }) => {{
        let mut error = $crate::compiler_midend::compiler_messages::compiler_errors::CompilerError::config_error(
            $path, $msg,
        );
        $( error.new_metadata_entry($crate::compiler_midend::compiler_messages::compiler_errors::ErrorMetaDataKey::$key, $value); )*
        return Err(error);
    }};
    ($path:expr, $msg:expr) => {{
        return Err($crate::compiler_midend::compiler_messages::compiler_errors::CompilerError::config_error(
            $path, $msg,
        ));
    }};
}
