use crate::compiler_midend::ir::ir_builder::IrBuilder;
use crate::compiler_midend::ir::ir_nodes::{
    ArgumentConvention, LoadQualifier, MemoryEffects, StoreQualifier,
};
use crate::compiler_midend::optimizers::temp_slot::tests::test_support::{
    count_kind, function_with_args, guaranteed, inout, klass, owned, pair, printed, read_only,
    run_pass, run_pass_with,
};
use crate::projects::settings::PassConfig;

#[test]
fn copy_back_into_source_collapses_to_nothing() {
    let (mut func, args, entry) =
        function_with_args("round_trip", &[ArgumentConvention::IndirectInout], pair());
    let whole = args[0];

    let mut builder = IrBuilder::at_end(&mut func, entry);
    let field = builder.struct_element_addr(whole, 0, klass());
    let slot = builder.alloc_stack(klass());
    builder.copy_addr(field, slot, false, true);
    builder.copy_addr(slot, field, false, false);
    builder.destroy_addr(slot);
    builder.dealloc_stack(slot);
    builder.return_(None);

    let report = run_pass(&mut func);

    assert!(report.changed);
    assert_eq!(report.stats.copies_rewritten, 1);
    assert_eq!(report.stats.identity_copies_removed, 2);

    // Both copies and the field projection that fed them are gone
    assert_eq!(count_kind(&func, "struct_element_addr"), 0);
    assert_eq!(func.live_inst_count(), 1);
}

#[test]
fn identity_copy_in_input_is_removed() {
    let (mut func, args, entry) =
        function_with_args("self_copy", &[ArgumentConvention::IndirectInout], klass());

    let mut builder = IrBuilder::at_end(&mut func, entry);
    builder.copy_addr(args[0], args[0], false, false);
    builder.return_(None);

    let report = run_pass(&mut func);

    assert!(report.changed);
    assert_eq!(report.stats.slots_eliminated(), 0);
    assert_eq!(report.stats.identity_copies_removed, 1);
    assert_eq!(func.live_inst_count(), 1);
}

#[test]
fn second_run_changes_nothing() {
    let (mut func, args, entry) = function_with_args(
        "mixed",
        &[ArgumentConvention::IndirectInGuaranteed, ArgumentConvention::IndirectInout],
        klass(),
    );
    let (source, mutated) = (args[0], args[1]);
    let value = func.add_argument(klass(), ArgumentConvention::DirectOwned);

    let mut builder = IrBuilder::at_end(&mut func, entry);

    // Removable
    let first = builder.alloc_stack(klass());
    builder.copy_addr(source, first, false, true);
    builder.apply("read", vec![guaranteed(first)], read_only());
    builder.destroy_addr(first);
    builder.dealloc_stack(first);

    // Source written before the read
    let second = builder.alloc_stack(klass());
    builder.copy_addr(mutated, second, false, true);
    builder.apply("mutate", vec![inout(mutated)], MemoryEffects::MayWrite);
    builder.apply("read", vec![guaranteed(second)], read_only());
    builder.destroy_addr(second);
    builder.dealloc_stack(second);

    // Forwardable store
    let third = builder.alloc_stack(klass());
    builder.store(value, third, StoreQualifier::Init);
    let taken = builder.load(third, LoadQualifier::Take);
    builder.apply("consume", vec![owned(taken)], MemoryEffects::MayWrite);
    builder.dealloc_stack(third);
    builder.return_(None);

    let first_report = run_pass(&mut func);
    assert!(first_report.changed);
    assert_eq!(first_report.stats.copies_rewritten, 1);
    assert_eq!(first_report.stats.stores_rewritten, 1);
    assert_eq!(first_report.stats.rejected_source_mutation, 1);
    assert_eq!(count_kind(&func, "alloc_stack"), 1);

    let after_first = printed(&func);
    let second_report = run_pass(&mut func);

    assert!(!second_report.changed);
    assert_eq!(second_report.stats.slots_eliminated(), 0);
    assert_eq!(printed(&func), after_first);
}

#[test]
fn projection_limit_comes_from_config() {
    let (mut func, args, entry) = function_with_args(
        "limited",
        &[ArgumentConvention::IndirectInGuaranteed],
        pair(),
    );

    let mut builder = IrBuilder::at_end(&mut func, entry);
    let slot = builder.alloc_stack(pair());
    builder.copy_addr(args[0], slot, false, true);
    let outer = builder.struct_element_addr(slot, 0, pair());
    let inner = builder.struct_element_addr(outer, 0, klass());
    builder.apply("read", vec![guaranteed(inner)], read_only());
    builder.destroy_addr(slot);
    builder.dealloc_stack(slot);
    builder.return_(None);

    let config = PassConfig {
        max_projection_depth: 1,
        ..PassConfig::default()
    };
    let report = run_pass_with(&mut func, &config);

    assert!(!report.changed);
    assert_eq!(report.stats.rejected_use_classification, 1);
}

#[test]
fn long_block_of_read_copies_is_fully_rewritten() {
    let (mut func, args, entry) =
        function_with_args("many_reads", &[ArgumentConvention::IndirectInGuaranteed], klass());
    let source = args[0];

    let mut builder = IrBuilder::at_end(&mut func, entry);
    for _ in 0..200 {
        let slot = builder.alloc_stack(klass());
        builder.copy_addr(source, slot, false, true);
        builder.apply("read", vec![guaranteed(slot)], read_only());
        builder.destroy_addr(slot);
        builder.dealloc_stack(slot);
    }
    builder.return_(None);

    let report = run_pass(&mut func);

    assert_eq!(report.stats.copies_rewritten, 200);
    assert_eq!(count_kind(&func, "alloc_stack"), 0);
    assert_eq!(count_kind(&func, "apply"), 200);

    // Every read now names the source directly
    assert_eq!(func.uses(source).len(), 200);
}
