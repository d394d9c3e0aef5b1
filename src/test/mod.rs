//! Program fixtures shared by the unit tests.
//!
//! All fixtures build a single program class `Lp/App;` whose methods are
//! static, take no arguments and only call each other.

use crate::{
    ir::{CodeBuilder, InvokeKind},
    program::{MethodFlags, MethodId, Program, ProgramBuilder},
};

/// A program of `count` static methods `m0..m{count}` with the given calls,
/// as `(caller, callee)` index pairs. Each pair is one call site.
pub fn call_program(count: usize, calls: &[(usize, usize)]) -> (Program, Vec<MethodId>) {
    let mut builder = ProgramBuilder::new();
    let app = builder.class("Lp/App;");
    let methods: Vec<MethodId> = (0..count)
        .map(|i| builder.method(app, &format!("m{i}"), "()V", MethodFlags::STATIC))
        .collect();

    for (index, &method) in methods.iter().enumerate() {
        let mut code = CodeBuilder::new(method);
        for &(caller, callee) in calls {
            if caller == index {
                code.invoke(InvokeKind::Static, builder.method_ref(methods[callee]), &[]);
            }
        }
        code.return_void();
        builder.body(method, code.finish().unwrap());
    }
    (builder.build(), methods)
}

/// `m0 -> m1 -> ... -> m{count - 1}`
pub fn chain(count: usize) -> (Program, Vec<MethodId>) {
    let calls: Vec<_> = (1..count).map(|i| (i - 1, i)).collect();
    call_program(count, &calls)
}

/// `m0 -> m1 -> ... -> m{count - 1} -> m0`
pub fn cycle(count: usize) -> (Program, Vec<MethodId>) {
    let calls: Vec<_> = (0..count).map(|i| (i, (i + 1) % count)).collect();
    call_program(count, &calls)
}

/// `m0 -> {m1, m2} -> m3`
pub fn diamond() -> (Program, Vec<MethodId>) {
    call_program(4, &[(0, 1), (0, 2), (1, 3), (2, 3)])
}
