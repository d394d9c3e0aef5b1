//! Redundant field-load elimination integration tests.
//!
//! Bodies are built with `CodeBuilder` and optimized either through the
//! `PassScheduler` or by running the pass directly. The tests cover:
//! 1. Repeated instance reads without intervening writes, calls or locks
//! 2. Static writes to other classes and their initializer side effects
//! 3. Repeated class-initialization checks
//! 4. Idempotence of the pass
//! 5. Configuration switches

use shrinkwave::{
    events::{EventKind, EventLog},
    ir::{CodeBuilder, InvokeKind, MethodCode, Op},
    optimize::{MethodPass, PassContext, PassScheduler, RedundantFieldLoadElimination},
    program::{
        FieldFlags, FieldRef, IdentityLens, MethodFlags, MethodId, Program, ProgramBuilder, TypeId,
    },
    OptimizerConfig, Result,
};

struct Setup {
    builder: ProgramBuilder,
    class: TypeId,
    method: MethodId,
    field: FieldRef,
}

fn setup() -> Setup {
    let mut builder = ProgramBuilder::new();
    let class = builder.class("Lp/Holder;");
    let method = builder.method(class, "run", "(Lp/Holder;)I", MethodFlags::PUBLIC);
    let field = builder.field(class, "value", "I", FieldFlags::empty());
    let field = builder.field_ref(field);
    Setup {
        builder,
        class,
        method,
        field,
    }
}

fn count(code: &MethodCode, predicate: impl Fn(&Op) -> bool) -> usize {
    code.instructions().filter(|i| predicate(&i.op)).count()
}

fn instance_gets(code: &MethodCode) -> usize {
    count(code, |op| matches!(op, Op::InstanceGet { .. }))
}

/// Runs the pass directly and returns whether it changed `code`.
fn run_pass(program: &Program, config: &OptimizerConfig, code: &mut MethodCode) -> Result<bool> {
    let events = EventLog::new();
    let ctx = PassContext::new(program, config, &events);
    let pass = RedundantFieldLoadElimination::new();
    if !pass.should_run(code, &ctx) {
        return Ok(false);
    }
    let outcome = pass.run_on_method(code, &ctx)?;
    code.check_consistency()?;
    Ok(outcome.changed)
}

#[test]
fn test_repeated_read_is_eliminated_by_scheduler() -> Result<()> {
    let mut setup = setup();
    let mut code = CodeBuilder::new(setup.method);
    let this = code.argument(0);
    let first = code.instance_get(this, setup.field.clone());
    let second = code.instance_get(this, setup.field.clone());
    let sum = code.add(first, second);
    code.return_value(sum);
    setup.builder.body(setup.method, code.finish()?);
    let program = setup.builder.build();

    let report = PassScheduler::with_default_passes(OptimizerConfig::default())
        .run(&program, &IdentityLens)?;
    assert_eq!(report.changed_methods, 1);
    assert_eq!(report.events.count_kind(EventKind::FieldLoadEliminated), 1);

    let optimized = program.code(setup.method).expect("body is put back");
    assert_eq!(instance_gets(&optimized), 1);
    assert!(optimized.instructions().any(|i| matches!(
        i.op,
        Op::Binop { left, right, .. } if left == first && right == first
    )));
    Ok(())
}

#[test]
fn test_call_and_lock_keep_reads() -> Result<()> {
    let mut setup = setup();
    let library = setup.builder.library_class("Ljava/lang/System;");
    let gc = setup
        .builder
        .method(library, "gc", "()V", MethodFlags::STATIC | MethodFlags::PUBLIC);
    let gc = setup.builder.method_ref(gc);

    let mut code = CodeBuilder::new(setup.method);
    let this = code.argument(0);
    let first = code.instance_get(this, setup.field.clone());
    code.invoke(InvokeKind::Static, gc, &[]);
    let second = code.instance_get(this, setup.field.clone());
    code.monitor_enter(this);
    let third = code.instance_get(this, setup.field.clone());
    code.monitor_exit(this);
    let sum = code.add(first, second);
    let sum = code.add(sum, third);
    code.return_value(sum);
    let mut code = code.finish()?;
    let program = setup.builder.build();

    assert!(!run_pass(&program, &OptimizerConfig::default(), &mut code)?);
    assert_eq!(instance_gets(&code), 3);
    Ok(())
}

#[test]
fn test_static_write_to_other_class_invalidates() -> Result<()> {
    let mut setup = setup();
    let counter = setup
        .builder
        .field(setup.class, "counter", "I", FieldFlags::STATIC);
    let counter = setup.builder.field_ref(counter);
    let other = setup.builder.class("Lq/Registry;");
    setup
        .builder
        .method(other, "<clinit>", "()V", MethodFlags::STATIC);
    let entries = setup.builder.field(
        other,
        "entries",
        "I",
        FieldFlags::STATIC | FieldFlags::PUBLIC,
    );
    let entries = setup.builder.field_ref(entries);

    let mut code = CodeBuilder::new(setup.method);
    let written = code.const_number(5);
    let zero = code.const_number(0);
    code.static_put(counter.clone(), written);
    let same = code.static_get(counter.clone());
    code.static_put(entries, zero);
    let after = code.static_get(counter);
    let sum = code.add(same, after);
    code.return_value(sum);
    let mut code = code.finish()?;
    let program = setup.builder.build();

    assert!(run_pass(&program, &OptimizerConfig::default(), &mut code)?);
    assert_eq!(count(&code, |op| matches!(op, Op::StaticGet { .. })), 1);
    assert!(code.instructions().any(|i| matches!(
        i.op,
        Op::Binop { left, right, .. } if left == written && right == after
    )));
    Ok(())
}

#[test]
fn test_second_init_class_check_is_removed() -> Result<()> {
    let mut setup = setup();
    let other = setup.builder.class("Lq/Lazy;");
    setup
        .builder
        .method(other, "<clinit>", "()V", MethodFlags::STATIC);

    let mut code = CodeBuilder::new(setup.method);
    code.init_class(other);
    code.init_class(other);
    let this = code.argument(0);
    let read = code.instance_get(this, setup.field.clone());
    code.return_value(read);
    let mut code = code.finish()?;
    let program = setup.builder.build();

    assert!(run_pass(&program, &OptimizerConfig::default(), &mut code)?);
    assert_eq!(count(&code, |op| matches!(op, Op::InitClass { .. })), 1);
    Ok(())
}

#[test]
fn test_pass_is_idempotent() -> Result<()> {
    let mut setup = setup();
    let mut code = CodeBuilder::new(setup.method);
    let this = code.argument(0);
    let one = code.const_number(1);
    code.instance_put(this, setup.field.clone(), one);
    let first = code.instance_get(this, setup.field.clone());
    let second = code.instance_get(this, setup.field.clone());
    let sum = code.add(first, second);
    code.return_value(sum);
    let mut code = code.finish()?;
    let program = setup.builder.build();
    let config = OptimizerConfig::default();

    assert!(run_pass(&program, &config, &mut code)?);
    assert_eq!(instance_gets(&code), 0);
    let snapshot = format!("{code:?}");

    assert!(!run_pass(&program, &config, &mut code)?);
    assert_eq!(format!("{code:?}"), snapshot);
    Ok(())
}

#[test]
fn test_other_holder_needs_whole_program_mode() -> Result<()> {
    let mut setup = setup();
    let other = setup.builder.class("Lq/Other;");
    let foreign = setup
        .builder
        .field(other, "foreign", "I", FieldFlags::PUBLIC);
    let foreign = setup.builder.field_ref(foreign);

    let build = |method: MethodId| -> Result<MethodCode> {
        let mut code = CodeBuilder::new(method);
        let this = code.argument(0);
        let first = code.instance_get(this, foreign.clone());
        let second = code.instance_get(this, foreign.clone());
        let sum = code.add(first, second);
        code.return_value(sum);
        code.finish()
    };
    let mut closed = build(setup.method)?;
    let mut open = build(setup.method)?;
    let program = setup.builder.build();

    assert!(run_pass(&program, &OptimizerConfig::default(), &mut closed)?);
    assert_eq!(instance_gets(&closed), 1);

    let config = OptimizerConfig::default().with_whole_program_optimizations(false);
    assert!(!run_pass(&program, &config, &mut open)?);
    assert_eq!(instance_gets(&open), 2);
    Ok(())
}

#[test]
fn test_disabled_pass_does_not_run() -> Result<()> {
    let mut setup = setup();
    let mut code = CodeBuilder::new(setup.method);
    let this = code.argument(0);
    let first = code.instance_get(this, setup.field.clone());
    let second = code.instance_get(this, setup.field.clone());
    let sum = code.add(first, second);
    code.return_value(sum);
    setup.builder.body(setup.method, code.finish()?);
    let program = setup.builder.build();

    let config = OptimizerConfig::default().with_redundant_field_load_elimination(false);
    let report = PassScheduler::with_default_passes(config).run(&program, &IdentityLens)?;
    assert!(!report.has_changes());
    assert_eq!(instance_gets(&program.code(setup.method).expect("body")), 2);
    Ok(())
}
