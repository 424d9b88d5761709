use proptest::prelude::*;
use std::fs;
use tempslot::build_system::core_build::{load_ir_module, optimize_module};
use tempslot::compiler_midend::analysis::alias_analysis::BasicAliasAnalysis;
use tempslot::compiler_midend::ir::ir_builder::{InsertPoint, IrBuilder};
use tempslot::compiler_midend::ir::ir_function::{IrFunction, IrModule};
use tempslot::compiler_midend::ir::ir_nodes::{
    ArgumentConvention, BlockId, CallArgument, InstId, InstKind, IrType, LoadQualifier,
    MemoryEffects, StoreQualifier, ValueId,
};
use tempslot::compiler_midend::ir::ir_validation::validate_module;
use tempslot::projects::settings::{PassConfig, load_pass_config};

/// Shapes a temporary slot shows up in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotPattern {
    // Copy of the source read by a call
    ReadCopy,
    // Same, but the source is written before the read
    MutatedSource,
    // Object value stored and taken straight back out
    StoreThenTake,
    // Copy of the source loaded once and destroyed
    LoadCopy,
    // Copy of the source written straight back
    CopyBack,
    // Copy of the source taken on one branch and destroyed on the other
    Diamond,
    // Copy that takes the source, which is then reinitialized by a store
    TakingCopy,
}

impl SlotPattern {
    fn needs_owned_value(self) -> bool {
        matches!(self, SlotPattern::StoreThenTake | SlotPattern::TakingCopy)
    }
}

fn slot_pattern() -> impl Strategy<Value = SlotPattern> {
    prop_oneof![
        Just(SlotPattern::ReadCopy),
        Just(SlotPattern::MutatedSource),
        Just(SlotPattern::StoreThenTake),
        Just(SlotPattern::LoadCopy),
        Just(SlotPattern::CopyBack),
        Just(SlotPattern::Diamond),
        Just(SlotPattern::TakingCopy),
    ]
}

fn module_patterns() -> impl Strategy<Value = Vec<Vec<SlotPattern>>> {
    prop::collection::vec(prop::collection::vec(slot_pattern(), 0..8), 1..4)
}

fn klass() -> IrType {
    IrType::object("Klass")
}

fn read(slot: ValueId) -> Vec<CallArgument> {
    vec![CallArgument::new(slot, ArgumentConvention::IndirectInGuaranteed)]
}

fn consume(value: ValueId) -> Vec<CallArgument> {
    vec![CallArgument::new(value, ArgumentConvention::DirectOwned)]
}

fn build_function(func: &mut IrFunction, patterns: &[SlotPattern]) {
    let source = func.add_argument(klass().address_type(), ArgumentConvention::IndirectInout);
    let flag = func.add_argument(IrType::trivial("Bool"), ArgumentConvention::DirectUnowned);
    let values: Vec<ValueId> = patterns
        .iter()
        .filter(|pattern| pattern.needs_owned_value())
        .map(|_| func.add_argument(klass(), ArgumentConvention::DirectOwned))
        .collect();
    let mut values = values.into_iter();
    let mut current = func.add_block();

    for pattern in patterns {
        // Arms and join block of a diamond
        let arms = (*pattern == SlotPattern::Diamond)
            .then(|| (func.add_block(), func.add_block(), func.add_block()));

        let mut builder = IrBuilder::at_end(func, current);
        let slot = builder.alloc_stack(klass());
        match pattern {
            SlotPattern::ReadCopy => {
                builder.copy_addr(source, slot, false, true);
                builder.apply("read", read(slot), MemoryEffects::ReadOnly);
                builder.destroy_addr(slot);
                builder.dealloc_stack(slot);
            }
            SlotPattern::MutatedSource => {
                builder.copy_addr(source, slot, false, true);
                builder.apply(
                    "mutate",
                    vec![CallArgument::new(source, ArgumentConvention::IndirectInout)],
                    MemoryEffects::MayWrite,
                );
                builder.apply("read", read(slot), MemoryEffects::ReadOnly);
                builder.destroy_addr(slot);
                builder.dealloc_stack(slot);
            }
            SlotPattern::StoreThenTake => {
                if let Some(value) = values.next() {
                    builder.store(value, slot, StoreQualifier::Init);
                    let taken = builder.load(slot, LoadQualifier::Take);
                    builder.apply("consume", consume(taken), MemoryEffects::MayWrite);
                }
                builder.dealloc_stack(slot);
            }
            SlotPattern::LoadCopy => {
                builder.copy_addr(source, slot, false, true);
                let loaded = builder.load(slot, LoadQualifier::Copy);
                builder.apply("consume", consume(loaded), MemoryEffects::MayWrite);
                builder.destroy_addr(slot);
                builder.dealloc_stack(slot);
            }
            SlotPattern::CopyBack => {
                builder.copy_addr(source, slot, false, true);
                builder.copy_addr(slot, source, false, false);
                builder.destroy_addr(slot);
                builder.dealloc_stack(slot);
            }
            SlotPattern::TakingCopy => {
                builder.copy_addr(source, slot, true, true);
                builder.apply("read", read(slot), MemoryEffects::ReadOnly);
                builder.destroy_addr(slot);
                if let Some(value) = values.next() {
                    builder.store(value, source, StoreQualifier::Init);
                }
                builder.dealloc_stack(slot);
            }
            SlotPattern::Diamond => {
                if let Some((left, right, join)) = arms {
                    builder.copy_addr(source, slot, false, true);
                    builder.apply("read", read(slot), MemoryEffects::ReadOnly);
                    builder.cond_branch(flag, left, right);

                    builder.set_position(InsertPoint::EndOf(left));
                    let taken = builder.load(slot, LoadQualifier::Take);
                    builder.apply("consume", consume(taken), MemoryEffects::MayWrite);
                    builder.dealloc_stack(slot);
                    builder.branch(join);

                    builder.set_position(InsertPoint::EndOf(right));
                    builder.destroy_addr(slot);
                    builder.dealloc_stack(slot);
                    builder.branch(join);

                    current = join;
                }
            }
        }
    }
    IrBuilder::at_end(func, current).return_(None);
}

fn build_module(functions: &[Vec<SlotPattern>]) -> IrModule {
    let mut module = IrModule::new("generated");
    for (index, patterns) in functions.iter().enumerate() {
        let func = module.add_function(format!("f{index}"));
        build_function(func, patterns);
    }
    module
}

fn count_kind(module: &IrModule, name: &str) -> usize {
    module
        .functions
        .iter()
        .map(|func| {
            func.live_insts()
                .into_iter()
                .filter(|inst| func.kind(*inst).name() == name)
                .count()
        })
        .sum()
}

/// Ownership ends minus ownership starts. Moves count as neither.
fn ownership_balance(kind: &InstKind) -> i64 {
    match kind {
        InstKind::CopyAddr { take, init, .. } => i64::from(!*init) - i64::from(!*take),
        InstKind::Load {
            qualifier: LoadQualifier::Copy,
            ..
        }
        | InstKind::CopyValue { .. } => -1,
        InstKind::DestroyAddr { .. } | InstKind::DestroyValue { .. } => 1,
        InstKind::Store {
            qualifier: StoreQualifier::Assign,
            ..
        } => 1,
        InstKind::Apply { args, .. } | InstKind::TryApply { args, .. } => args
            .iter()
            .filter(|arg| {
                matches!(
                    arg.convention,
                    ArgumentConvention::DirectOwned | ArgumentConvention::IndirectIn
                )
            })
            .count() as i64,
        _ => 0,
    }
}

/// Ownership balance of every path from the entry block to a return
fn path_balances(func: &IrFunction) -> Vec<i64> {
    let block_balance = |block: BlockId| -> i64 {
        func.block_insts(block)
            .into_iter()
            .map(|inst: InstId| ownership_balance(func.kind(inst)))
            .sum()
    };

    let mut balances = Vec::new();
    let mut stack: Vec<(BlockId, i64)> = func.block_ids().take(1).map(|entry| (entry, 0)).collect();
    while let Some((block, balance)) = stack.pop() {
        let balance = balance + block_balance(block);
        let successors = func.successors(block);
        if successors.is_empty() {
            balances.push(balance);
        }
        stack.extend(successors.into_iter().map(|succ| (succ, balance)));
    }
    balances
}

fn module_path_balances(module: &IrModule) -> Vec<Vec<i64>> {
    module.functions.iter().map(path_balances).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every rewrite leaves a module that still validates
    #[test]
    fn optimized_module_has_no_dangling_uses(functions in module_patterns()) {
        let mut module = build_module(&functions);
        prop_assert!(validate_module(&module).is_ok());

        let mut config = PassConfig::default();
        config.verify_after_pass = false;
        prop_assert!(optimize_module(&mut module, &config, &BasicAliasAnalysis::new()).is_ok());
        prop_assert!(validate_module(&module).is_ok());
    }

    /// Running the pass a second time finds nothing left to do
    #[test]
    fn pass_is_idempotent(functions in module_patterns()) {
        let oracle = BasicAliasAnalysis::new();
        let mut module = build_module(&functions);

        optimize_module(&mut module, &PassConfig::default(), &oracle)
            .expect("first run should succeed");
        let once = module.to_string();

        let report = optimize_module(&mut module, &PassConfig::default(), &oracle)
            .expect("second run should succeed");

        prop_assert!(!report.changed());
        prop_assert_eq!(once, module.to_string());
    }

    /// Copies and destroys still pair up on every path after the rewrite
    #[test]
    fn ownership_stays_balanced_on_every_path(functions in module_patterns()) {
        let mut module = build_module(&functions);
        let before = module_path_balances(&module);

        optimize_module(&mut module, &PassConfig::default(), &BasicAliasAnalysis::new())
            .expect("pipeline should succeed");

        prop_assert_eq!(before, module_path_balances(&module));
    }

    /// Only slots whose source is written before the read survive
    #[test]
    fn only_mutated_sources_keep_their_slot(functions in module_patterns()) {
        let mut module = build_module(&functions);
        let report = optimize_module(&mut module, &PassConfig::default().sequential(), &BasicAliasAnalysis::new())
            .expect("pipeline should succeed");

        let kept = functions
            .iter()
            .flatten()
            .filter(|pattern| **pattern == SlotPattern::MutatedSource)
            .count();

        prop_assert_eq!(count_kind(&module, "alloc_stack"), kept);
        prop_assert_eq!(report.stats.rejected_source_mutation, kept);
    }
}

#[test]
fn diamond_slot_moves_its_teardown_onto_both_arms() {
    let mut module = build_module(&[vec![SlotPattern::Diamond, SlotPattern::TakingCopy]]);
    let before = module_path_balances(&module);

    // The taking copy ends the value the source held on entry
    assert_eq!(before, vec![vec![1, 1]]);

    let report = optimize_module(&mut module, &PassConfig::default(), &BasicAliasAnalysis::new())
        .expect("pipeline should succeed");

    assert_eq!(report.stats.copies_rewritten, 2);
    assert_eq!(count_kind(&module, "alloc_stack"), 0);

    // The take on the left arm became a copy at the branch, destroyed on the right arm
    assert_eq!(count_kind(&module, "load"), 1);
    assert_eq!(count_kind(&module, "destroy_value"), 1);
    assert_eq!(module_path_balances(&module), before);
}

const READ_COPY_MODULE: &str = r#"{
    "name": "on_disk",
    "functions": [{
        "name": "read_copy",
        "arguments": [{"ty": {"name": "Klass", "category": "address"}, "convention": "indirect_in_guaranteed"}],
        "blocks": [[
            {"result": {"name": "Klass", "category": "address"}, "inst": {"op": "alloc_stack", "ty": {"name": "Klass"}}},
            {"inst": {"op": "copy_addr", "src": 0, "dest": 1, "init": true}},
            {"inst": {"op": "apply", "callee": "use", "args": [{"value": 1, "convention": "indirect_in_guaranteed"}], "effects": "read_only"}},
            {"inst": {"op": "destroy_addr", "operand": 1}},
            {"inst": {"op": "dealloc_stack", "operand": 1}},
            {"inst": {"op": "return"}}
        ]]
    }]
}"#;

#[test]
fn module_and_config_load_from_disk() {
    let dir = tempfile::tempdir().expect("temp dir");
    let module_path = dir.path().join("module.json");
    let config_path = dir.path().join("tempslot.toml");
    fs::write(&module_path, READ_COPY_MODULE).expect("module should be written");
    fs::write(&config_path, "[temp_slot]\nparallel = false\n").expect("config should be written");

    let config = load_pass_config(&config_path).expect("config should load");
    assert!(!config.parallel);

    let mut module = load_ir_module(&module_path).expect("module should load");
    let report = optimize_module(&mut module, &config, &BasicAliasAnalysis::new())
        .expect("pipeline should succeed");

    assert_eq!(report.changed_functions, vec!["read_copy"]);
    assert_eq!(module.functions[0].live_inst_count(), 2);

    let json = module.to_json().expect("module should serialize");
    let reloaded = IrModule::from_json(&json).expect("optimized module should reload");
    assert_eq!(reloaded.to_string(), module.to_string());
}

#[test]
fn malformed_module_reports_its_path() {
    let dir = tempfile::tempdir().expect("temp dir");
    let module_path = dir.path().join("broken.json");
    fs::write(&module_path, "{ \"name\": ").expect("module should be written");

    let messages = load_ir_module(&module_path).expect_err("malformed json should fail");
    assert_eq!(
        messages.errors[0].location.path.as_deref(),
        Some(module_path.as_path())
    );
}
