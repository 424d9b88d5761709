// Module pipeline
//
// Runs temp slot elimination over every function of a module:
// - Load and validate the JSON module
// - Optimize each function (in parallel unless configured otherwise)
// - Re-validate the result

use crate::compiler_midend::analysis::alias_analysis::AliasOracle;
use crate::compiler_midend::compiler_messages::compiler_errors::{
    CompilerError, CompilerMessages,
};
use crate::compiler_midend::ir::ir_function::IrModule;
use crate::compiler_midend::ir::ir_validation::validate_module;
use crate::compiler_midend::optimizers::temp_slot::{
    TempSlotReport, TempSlotStats, eliminate_temp_slots,
};
use crate::projects::settings::PassConfig;
use crate::{ir_log, timer_log};
use rayon::prelude::*;
use std::fs;
use std::path::Path;
use std::time::Instant;

/// Result of optimizing a whole module
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleReport {
    /// Names of the functions the pass rewrote
    pub changed_functions: Vec<String>,
    pub stats: TempSlotStats,
}

impl ModuleReport {
    pub fn changed(&self) -> bool {
        !self.changed_functions.is_empty()
    }
}

/// Reads a module from disk and validates it before any pass sees it
pub fn load_ir_module(path: &Path) -> Result<IrModule, CompilerMessages> {
    let time = Instant::now();

    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            return Err(CompilerMessages::from_error(CompilerError::file_error(
                path,
                format!("Could not read IR module: {e}"),
            )));
        }
    };

    let module = match IrModule::from_json(&source) {
        Ok(module) => module,
        Err(e) => return Err(CompilerMessages::from_error(e.with_path(path))),
    };

    if let Err(mut messages) = validate_module(&module) {
        for error in &mut messages.errors {
            error.location.path = Some(path.to_path_buf());
        }
        return Err(messages);
    }

    timer_log!(time, "IR loaded and validated in: ");
    ir_log!(format!("Loaded module '{}':\n{}", module.name, module));

    Ok(module)
}

/// Optimize every function of the module
///
/// Functions are independent, so they are optimized on the rayon pool when
/// `config.parallel` is set. Every failing function is reported, not just the first.
pub fn optimize_module(
    module: &mut IrModule,
    config: &PassConfig,
    oracle: &(dyn AliasOracle + Sync),
) -> Result<ModuleReport, CompilerMessages> {
    let time = Instant::now();

    let results: Vec<Result<TempSlotReport, CompilerError>> = if config.parallel {
        module
            .functions
            .par_iter_mut()
            .map(|func| eliminate_temp_slots(func, oracle, config))
            .collect()
    } else {
        module
            .functions
            .iter_mut()
            .map(|func| eliminate_temp_slots(func, oracle, config))
            .collect()
    };

    timer_log!(time, "Temp slots eliminated in: ");

    let mut report = ModuleReport::default();
    let mut errors: Vec<CompilerError> = Vec::new();

    for (func, result) in module.functions.iter().zip(results) {
        match result {
            Ok(func_report) => {
                if func_report.changed {
                    report.changed_functions.push(func.name.clone());
                }
                report.stats.merge(&func_report.stats);
            }
            Err(e) => errors.push(e),
        }
    }

    if !errors.is_empty() {
        return Err(CompilerMessages { errors });
    }

    if config.verify_after_pass {
        let time = Instant::now();
        validate_module(module)?;
        timer_log!(time, "Optimized IR validated in: ");
    }

    Ok(report)
}
