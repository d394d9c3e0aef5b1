//! Call graph integration tests.
//!
//! These tests build small programs through the public API and verify:
//! 1. Node creation for every program method
//! 2. Edge deduplication and invoke counting
//! 3. Self-recursion handling
//! 4. Conservative virtual dispatch
//! 5. Single- and double-call-site classification

use shrinkwave::{
    callgraph::{CallGraph, CallGraphBuilder},
    events::{EventKind, EventLog},
    ir::{CodeBuilder, InvokeKind},
    program::{IdentityLens, MethodFlags, MethodId, MethodRef, Program, ProgramBuilder},
    Result,
};

/// Attaches a body to `method` that invokes each of `targets` once.
fn calls(
    builder: &mut ProgramBuilder,
    method: MethodId,
    kind: InvokeKind,
    targets: &[MethodRef],
) -> Result<()> {
    let mut code = CodeBuilder::new(method);
    let receiver = (kind != InvokeKind::Static).then(|| code.const_null());
    for target in targets {
        let args: Vec<_> = receiver.into_iter().collect();
        code.invoke(kind, target.clone(), &args);
    }
    code.return_void();
    builder.body(method, code.finish()?);
    Ok(())
}

fn statics(builder: &mut ProgramBuilder, count: usize) -> Vec<MethodId> {
    let app = builder.class("Lp/App;");
    (0..count)
        .map(|i| builder.method(app, &format!("m{i}"), "()V", MethodFlags::STATIC))
        .collect()
}

#[test]
fn test_every_program_method_has_a_node() -> Result<()> {
    let mut builder = ProgramBuilder::new();
    let methods = statics(&mut builder, 3);
    let library = builder.library_class("Ljava/lang/Math;");
    let abs = builder.method(library, "abs", "(I)I", MethodFlags::STATIC | MethodFlags::PUBLIC);
    let abs_ref = builder.method_ref(abs);
    calls(&mut builder, methods[0], InvokeKind::Static, &[abs_ref])?;
    let program = builder.build();

    let graph = CallGraph::build(&program, &IdentityLens)?;
    assert_eq!(graph.len(), 3);
    for method in &methods {
        assert!(graph.contains(*method));
    }
    assert!(!graph.contains(abs));
    assert_eq!(graph.edge_count(), 0);
    graph.verify_symmetry()?;
    Ok(())
}

#[test]
fn test_repeated_call_sites_share_one_edge() -> Result<()> {
    let mut builder = ProgramBuilder::new();
    let methods = statics(&mut builder, 2);
    let target = builder.method_ref(methods[1]);
    calls(
        &mut builder,
        methods[0],
        InvokeKind::Static,
        &[target.clone(), target.clone(), target],
    )?;
    let program = builder.build();

    let graph = CallGraph::build(&program, &IdentityLens)?;
    assert_eq!(graph.edge_count(), 1);
    assert_eq!(graph.callees(methods[0]), vec![methods[1]]);
    assert_eq!(graph.callers(methods[1]), vec![methods[0]]);
    let callee = graph.node(methods[1]).expect("callee node");
    assert_eq!(callee.invoke_count(), 3);
    Ok(())
}

#[test]
fn test_self_recursion_adds_no_edge() -> Result<()> {
    let mut builder = ProgramBuilder::new();
    let methods = statics(&mut builder, 1);
    let itself = builder.method_ref(methods[0]);
    calls(&mut builder, methods[0], InvokeKind::Static, &[itself])?;
    let program = builder.build();

    let graph = CallGraph::build(&program, &IdentityLens)?;
    let node = graph.node(methods[0]).expect("node");
    assert!(node.is_self_recursive());
    assert_eq!(node.call_degree(), 0);
    assert_eq!(node.caller_count(), 0);
    assert!(node.is_leaf());
    assert_eq!(graph.stats().self_recursive, 1);
    Ok(())
}

#[test]
fn test_virtual_calls_reach_overrides() -> Result<()> {
    let mut builder = ProgramBuilder::new();
    let base = builder.class("Lp/Base;");
    let sub = builder.subclass("Lp/Sub;", base);
    let caller = builder.method(base, "caller", "()V", MethodFlags::STATIC);
    let base_run = builder.method(base, "run", "()V", MethodFlags::PUBLIC);
    let sub_run = builder.method(sub, "run", "()V", MethodFlags::PUBLIC);
    let target = builder.method_ref(base_run);
    calls(&mut builder, caller, InvokeKind::Virtual, &[target])?;
    let program = builder.build();

    let graph = CallGraph::build(&program, &IdentityLens)?;
    let mut callees = graph.callees(caller);
    callees.sort();
    let mut expected = vec![base_run, sub_run];
    expected.sort();
    assert_eq!(callees, expected);
    graph.verify_symmetry()?;
    Ok(())
}

#[test]
fn test_call_site_classification() -> Result<()> {
    let mut builder = ProgramBuilder::new();
    let methods = statics(&mut builder, 5);
    let once = builder.method_ref(methods[1]);
    let twice = builder.method_ref(methods[2]);
    let pinned = builder.method_ref(methods[3]);
    calls(
        &mut builder,
        methods[0],
        InvokeKind::Static,
        &[once, twice.clone(), pinned],
    )?;
    calls(&mut builder, methods[4], InvokeKind::Static, &[twice])?;
    builder.pin_method(methods[3]);
    let program = builder.build();

    let graph = CallGraph::build(&program, &IdentityLens)?;
    assert!(graph.has_single_call_site(methods[1]));
    assert!(graph.has_double_call_site(methods[2]));
    assert!(!graph.has_single_call_site(methods[3]));
    assert!(!graph.has_single_call_site(methods[0]));

    let stats = graph.stats();
    assert_eq!(stats.single_call_sites, 1);
    assert_eq!(stats.double_call_sites, 1);
    Ok(())
}

#[test]
fn test_no_classification_without_liveness() -> Result<()> {
    let mut builder = ProgramBuilder::new();
    let methods = statics(&mut builder, 2);
    let target = builder.method_ref(methods[1]);
    calls(&mut builder, methods[0], InvokeKind::Static, &[target])?;
    let program = builder.build();

    let graph = CallGraph::build(&program, &IdentityLens)?;
    assert!(!graph.has_single_call_site(methods[1]));
    Ok(())
}

#[test]
fn test_parallel_and_serial_scans_agree() -> Result<()> {
    let mut builder = ProgramBuilder::new();
    let methods = statics(&mut builder, 32);
    for i in 0..methods.len() {
        let targets: Vec<_> = [(i * 7 + 3) % 32, (i * 5 + 1) % 32]
            .iter()
            .map(|&t| builder.method_ref(methods[t]))
            .collect();
        calls(&mut builder, methods[i], InvokeKind::Static, &targets)?;
    }
    let program: Program = builder.build();

    let events = EventLog::new();
    let parallel = CallGraphBuilder::new(&program, &IdentityLens)
        .with_parallel_scan(true)
        .with_events(&events)
        .build()?;
    let serial = CallGraphBuilder::new(&program, &IdentityLens)
        .with_parallel_scan(false)
        .build()?;

    assert_eq!(parallel.stats(), serial.stats());
    for &method in &methods {
        assert_eq!(parallel.callees(method), serial.callees(method));
    }
    assert_eq!(events.count_kind(EventKind::CallGraphBuilt), 1);
    Ok(())
}

#[test]
fn test_dot_output_names_methods() -> Result<()> {
    let mut builder = ProgramBuilder::new();
    let methods = statics(&mut builder, 2);
    let target = builder.method_ref(methods[1]);
    calls(&mut builder, methods[0], InvokeKind::Static, &[target])?;
    let program = builder.build();

    let graph = CallGraph::build(&program, &IdentityLens)?;
    let dot = graph.to_dot(&program, Some("calls"));
    assert!(dot.starts_with("digraph"));
    assert!(dot.contains("m0"));
    assert!(dot.contains("m1"));
    assert!(dot.contains("->"));
    Ok(())
}
