use crate::compiler_midend::compiler_messages::compiler_errors::{
    CompilerError, CompilerMessages, ErrorMetaDataKey, ErrorType,
};
use saying::say;
use std::env;
use std::path::Path;

fn relative_display_path(path: &Path) -> String {
    match env::current_dir() {
        Ok(dir) => path
            .strip_prefix(&dir)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string(),
        Err(_) => path.to_string_lossy().to_string(),
    }
}

pub fn print_compiler_messages(messages: CompilerMessages) {
    for err in messages.errors {
        print_formatted_error(err);
    }
}

pub fn print_formatted_error(e: CompilerError) {
    let relative_dir = match &e.location.path {
        Some(path) => relative_display_path(path),
        None => String::new(),
    };

    match e.error_type {
        ErrorType::Ir => {
            if !relative_dir.is_empty() {
                say!("\n(ಠ_ಠ) ", Dark Magenta relative_dir);
            }

            say!(Red "Malformed IR");
            if let Some(function) = &e.location.function {
                say!(Dark Magenta "Function ", Bright {function});
            }
            if let Some(block) = e.location.block {
                say!(Dark Magenta "Block ", Bright {block.to_string()});
            }
        }

        ErrorType::File => {
            say!(Yellow "🏚 Can't find/read file or directory: ", relative_dir);
            say!(e.msg);
            return;
        }

        ErrorType::Compiler => {
            if let Some(function) = &e.location.function {
                say!("\nヽ༼☉ ‿ ⚆༽ﾉ  🔥🔥🔥🔥 ", Dark Magenta function, " 🔥🔥🔥🔥  ╰(° _ o╰) ");
            }
            say!(Yellow "OPTIMIZER BUG - ");
            say!(Dark Yellow "optimizer developer skill issue (not your fault)");
        }

        ErrorType::Config => {
            if !relative_dir.is_empty() {
                say!("\n (-_-)  🔥🔥🔥🔥 ", Dark Magenta relative_dir, " 🔥🔥🔥🔥  <(^~^)/ ");
            }
            say!(Yellow "CONFIG FILE ISSUE- ");
            say!(Dark Yellow "Malformed config file, something doesn't make sense inside the pass config");
        }
    }

    say!(Red e.msg);

    if let Some(kind) = e.metadata.get(&ErrorMetaDataKey::InstructionKind) {
        say!(Bright Black "Instruction: ", kind);
    }
    if let Some(suggestion) = e.metadata.get(&ErrorMetaDataKey::PrimarySuggestion) {
        say!(Green "Suggestion: ", suggestion);
    }
}
