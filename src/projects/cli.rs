//! Command-line entrypoints for the temp slot optimizer.
//!
//! This module parses CLI commands and dispatches them into the load, optimize and print
//! workflows of the module pipeline.

use crate::build_system::core_build::{load_ir_module, optimize_module};
use crate::compiler_midend::analysis::alias_analysis::BasicAliasAnalysis;
use crate::compiler_midend::compiler_messages::compiler_errors::CompilerMessages;
use crate::compiler_midend::compiler_messages::display_messages::print_compiler_messages;
use crate::projects::settings::{CONFIG_FILE_NAME, IR_FILE_EXTENSION, PassConfig, load_pass_config};
use saying::say;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct OptimizeOptions {
    config: Option<PathBuf>,
    sequential: bool,
    emit_json: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    // Runs the pass over a JSON module and prints the result
    Optimize {
        path: PathBuf,
        options: OptimizeOptions,
    },

    Print(PathBuf),

    Help,
}

pub fn start_cli() {
    let compiler_args: Vec<String> = env::args().collect();

    if compiler_args.len() < 2 {
        print_help(true);
        return;
    }

    let command = match get_command(&compiler_args[1..]) {
        Ok(command) => command,
        Err(e) => {
            say!(Red e);
            print_help(true);
            return;
        }
    };

    match command {
        Command::Help => {
            print_help(false);
        }

        Command::Print(path) => match load_ir_module(&path) {
            Ok(module) => {
                let text = module.to_string();
                say!(text);
            }
            Err(messages) => print_compiler_messages(messages),
        },

        Command::Optimize { path, options } => {
            if let Err(messages) = run_optimize(&path, &options) {
                print_compiler_messages(messages);
            }
        }
    }
}

fn run_optimize(path: &Path, options: &OptimizeOptions) -> Result<(), CompilerMessages> {
    let mut config = resolve_config(options)?;
    if options.sequential {
        config = config.sequential();
    }

    let mut module = load_ir_module(path)?;
    let report = optimize_module(&mut module, &config, &BasicAliasAnalysis::new())?;

    if options.emit_json {
        let json = module.to_json().map_err(CompilerMessages::from_error)?;
        say!(json);
    } else {
        let text = module.to_string();
        say!(text);
    }

    say!(
        Green "Temp slots eliminated: ",
        Bright { report.stats.slots_eliminated() },
        Bright Black format!(" ({})", report.stats)
    );

    Ok(())
}

// An explicit --config wins, otherwise a config file in the working directory is used if present
fn resolve_config(options: &OptimizeOptions) -> Result<PassConfig, CompilerMessages> {
    let path = match &options.config {
        Some(path) => path.to_owned(),
        None => {
            let default_path = PathBuf::from(CONFIG_FILE_NAME);
            if !default_path.exists() {
                return Ok(PassConfig::default());
            }
            default_path
        }
    };

    load_pass_config(&path).map_err(CompilerMessages::from_error)
}

fn get_command(args: &[String]) -> Result<Command, String> {
    let command = args.first().map(String::as_str);

    match command {
        Some("help") => Ok(Command::Help),

        Some("print") => match args.get(1) {
            Some(path) => Ok(Command::Print(module_path(path)?)),
            None => Err(String::from("Missing module path for 'print'")),
        },

        Some("optimize") => parse_optimize_command(args),

        Some(other) => Err(format!("Invalid command: '{other}'")),

        None => Err(String::from("Missing command")),
    }
}

fn parse_optimize_command(args: &[String]) -> Result<Command, String> {
    let mut path = None;
    let mut options = OptimizeOptions::default();
    let mut index = 1usize;

    while let Some(arg) = args.get(index) {
        match arg.as_str() {
            "--config" => {
                let Some(config) = args.get(index + 1) else {
                    return Err(String::from("Missing value for --config"));
                };
                if config.starts_with("--") {
                    return Err(String::from("Missing value for --config"));
                }
                options.config = Some(PathBuf::from(config));
                index += 2;
            }
            "--sequential" => {
                options.sequential = true;
                index += 1;
            }
            "--emit-json" => {
                options.emit_json = true;
                index += 1;
            }
            _ if arg.starts_with("--") => {
                return Err(format!(
                    "Unknown optimize flag: '{arg}'. Supported flags are --config, --sequential, --emit-json."
                ));
            }
            _ => {
                if path.is_some() {
                    return Err(String::from(
                        "Optimize command accepts exactly one module path.",
                    ));
                }
                path = Some(module_path(arg)?);
                index += 1;
            }
        }
    }

    match path {
        Some(path) => Ok(Command::Optimize { path, options }),
        None => Err(String::from("Missing module path for 'optimize'")),
    }
}

fn module_path(arg: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(arg);
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(IR_FILE_EXTENSION) => Ok(path),
        _ => Err(format!(
            "Module '{arg}' must be a .{IR_FILE_EXTENSION} file"
        )),
    }
}

fn print_help(commands_only: bool) {
    if !commands_only {
        say!(Bright Black "------------------------------------");
        say!(Green Bold "Temp slot elimination for ownership IR");
        say!("Usage: ", Bold "<command>", Italic " <args>");
    }
    say!(Green Bold "\nCommands:");
    say!("  optimize <module.json>  - Eliminates temporary slots and prints the result");
    say!("  print <module.json>     - Prints the module as IR text");
    say!("  help                    - Shows this message");

    say!(Green Bold "\nOptimize flags:");
    say!("  --config <path>   (default: ./", CONFIG_FILE_NAME, " when present)");
    say!("  --sequential      Optimize one function at a time");
    say!("  --emit-json       Print the optimized module as JSON");
}

#[cfg(test)]
#[path = "tests/cli_tests.rs"]
mod tests;
