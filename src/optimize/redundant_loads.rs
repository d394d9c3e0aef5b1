//! Redundant field-load and class-initialization elimination.
//!
//! Removes instance and static field reads whose value is already held by an
//! SSA value, or is a constant that can be re-created, and removes
//! class-initialization checks for classes that are known to be initialized.
//!
//! # Example
//!
//! Before:
//! ```text
//! v1 = InstanceGet A.f v0
//! v2 = InstanceGet A.f v0    // Redundant - same field, same receiver
//! v3 = add v1, v2
//! ```
//!
//! After:
//! ```text
//! v1 = InstanceGet A.f v0
//! v3 = add v1, v1
//! ```
//!
//! # Algorithm
//!
//! Blocks are visited once, in dominator-tree preorder. A block starts with
//! the facts its predecessor ended with if it has exactly one predecessor,
//! and with nothing otherwise. Within a block every instruction either uses
//! the facts, adds to them or invalidates some of them:
//!
//! 1. Reads consult the facts and are replaced when a value is known
//! 2. Writes replace the facts for the written field
//! 3. Anything that may run unknown code (calls, lock acquisition, static
//!    initializers) invalidates every non-final fact
//!
//! Facts flowing along an exceptional edge exclude whatever the throwing
//! instruction would have established.
//!
//! # Limitations
//!
//! - No fixed point: facts never flow into merge points or around loops
//! - Receivers are only compared by identity after following `Assume` aliases

use std::fmt;

use imbl::HashSet as ImHashSet;
use rustc_hash::FxHashMap;

use crate::{
    events::EventKind,
    ir::{InvokeKind, MethodCode, Op, Value, ValueId},
    optimize::{FieldValue, FieldValuesMap, MethodPass, PassContext, PassOutcome},
    program::{FieldId, FieldInitialization, FieldRef, InstanceInitializerInfo, MethodId, MethodRef, TypeId},
    utils::graph::{algorithms::compute_dominators, NodeId},
    Result,
};

const PASS_NAME: &str = "redundant-field-load-elimination";

/// Counters of one run of [`RedundantFieldLoadElimination`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldLoadStats {
    /// Reads replaced by an existing value.
    pub eliminated: usize,
    /// Reads replaced by a constant.
    pub materialized: usize,
    /// Class-initialization checks removed.
    pub init_classes_removed: usize,
    /// Values reported to type narrowing.
    pub affected_values: usize,
}

impl FieldLoadStats {
    /// Total number of rewritten instructions.
    #[must_use]
    pub fn total(&self) -> usize {
        self.eliminated + self.materialized + self.init_classes_removed
    }

    /// Returns `true` if anything was rewritten.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

impl fmt::Display for FieldLoadStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} loads eliminated, {} materialized, {} init-class checks removed",
            self.eliminated, self.materialized, self.init_classes_removed
        )
    }
}

/// Redundant field-load elimination pass.
///
/// Instance facts are keyed by the resolved field and the receiver, after
/// following alias links. Reads whose result is bound to a source-level local
/// are left alone so that debuggers keep seeing them.
#[derive(Debug, Default, Clone, Copy)]
pub struct RedundantFieldLoadElimination;

impl RedundantFieldLoadElimination {
    /// Creates a new pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Runs the pass and returns its counters alongside the outcome.
    ///
    /// # Errors
    ///
    /// Returns an invariant error if a block of the dominator order does not
    /// exist in `code`.
    pub fn run_with_stats(
        &self,
        code: &mut MethodCode,
        ctx: &PassContext<'_>,
    ) -> Result<(PassOutcome, FieldLoadStats)> {
        let method = code.method();
        let mut walker = FieldLoadWalker {
            ctx,
            method,
            context: ctx.program.method(method).holder(),
            stats: FieldLoadStats::default(),
            affected: Vec::new(),
        };
        walker.run(code)?;

        let FieldLoadWalker {
            mut stats,
            mut affected,
            ..
        } = walker;
        if !stats.has_changes() {
            return Ok((PassOutcome::unchanged(), stats));
        }

        code.remove_trivial_phis();
        affected.sort_unstable();
        affected.dedup();
        stats.affected_values = affected.len();

        ctx.events
            .record(EventKind::PassCompleted)
            .method(method)
            .pass(PASS_NAME)
            .message(stats.to_string());

        Ok((
            PassOutcome {
                changed: true,
                affected_values: affected,
            },
            stats,
        ))
    }
}

impl MethodPass for RedundantFieldLoadElimination {
    fn name(&self) -> &'static str {
        PASS_NAME
    }

    fn should_run(&self, code: &MethodCode, ctx: &PassContext<'_>) -> bool {
        ctx.config.enable_redundant_field_load_elimination && code.has_field_get_or_init_class()
    }

    fn run_on_method(&self, code: &mut MethodCode, ctx: &PassContext<'_>) -> Result<PassOutcome> {
        self.run_with_stats(code, ctx).map(|(outcome, _)| outcome)
    }

    fn description(&self) -> &'static str {
        "Eliminates field reads and class-initialization checks with known outcomes"
    }
}

/// Facts that hold at a program point.
#[derive(Debug, Clone, Default)]
struct BlockState {
    fields: FieldValuesMap,
    initialized: ImHashSet<TypeId>,
}

/// Position of an instruction.
#[derive(Debug, Clone, Copy)]
struct Site {
    block: usize,
    index: usize,
}

struct FieldLoadWalker<'a, 'c> {
    ctx: &'a PassContext<'c>,
    method: MethodId,
    context: TypeId,
    stats: FieldLoadStats,
    affected: Vec<ValueId>,
}

impl FieldLoadWalker<'_, '_> {
    fn run(&mut self, code: &mut MethodCode) -> Result<()> {
        let dominators = compute_dominators(&*code, NodeId::new(0));
        let mut pending: FxHashMap<usize, BlockState> = FxHashMap::default();

        for node in dominators.preorder() {
            let block = node.index();
            let mut state = pending.remove(&block).unwrap_or_default();
            self.process_block(code, block, &mut state)?;
            self.propagate(code, block, &state, &mut pending);
        }
        Ok(())
    }

    fn process_block(
        &mut self,
        code: &mut MethodCode,
        block: usize,
        state: &mut BlockState,
    ) -> Result<()> {
        if code.block(block).is_none() {
            return Err(invariant_error!(
                "block {} of method {} is not part of its body",
                block,
                self.method
            ));
        }

        let mut index = 0;
        while let Some(op) = code
            .block(block)
            .and_then(|b| b.instructions().get(index))
            .map(|instruction| instruction.op.clone())
        {
            let removed = self.process_instruction(code, Site { block, index }, op, state);
            if !removed {
                index += 1;
            }
        }
        Ok(())
    }

    /// Applies one instruction to `state`. Returns `true` if the instruction
    /// was removed from the block.
    fn process_instruction(
        &mut self,
        code: &mut MethodCode,
        site: Site,
        op: Op,
        state: &mut BlockState,
    ) -> bool {
        match op {
            Op::InstanceGet {
                dest,
                object,
                field,
            } => self.instance_get(code, site, dest, object, &field, state),
            Op::InstancePut { object, field, value } => {
                self.instance_put(code, object, &field, value, state);
                false
            }
            Op::StaticGet { dest, field } => self.static_get(code, site, dest, &field, state),
            Op::StaticPut { field, value } => {
                self.static_put(&field, value, state);
                false
            }
            Op::InitClass { class, .. } => self.init_class(code, site, class, state),
            Op::Invoke {
                kind, method, args, ..
            } => {
                self.invoke(code, kind, &method, &args, state);
                false
            }
            Op::NewInstance { class, .. } => {
                self.new_instance(class, state);
                false
            }
            Op::InvokeCustom { .. } | Op::MonitorEnter { .. } => {
                state.fields.clear_non_final();
                false
            }
            Op::Argument { .. }
            | Op::ArrayGet { .. }
            | Op::ArrayLength { .. }
            | Op::ArrayPut { .. }
            | Op::Assume { .. }
            | Op::Binop { .. }
            | Op::CheckCast { .. }
            | Op::ConstClass { .. }
            | Op::ConstNull { .. }
            | Op::ConstNumber { .. }
            | Op::ConstString { .. }
            | Op::DebugLocalRead
            | Op::Goto
            | Op::If { .. }
            | Op::InstanceOf { .. }
            | Op::MonitorExit { .. }
            | Op::MoveException { .. }
            | Op::NewArray { .. }
            | Op::NewArrayFilled { .. }
            | Op::Return { .. }
            | Op::Switch { .. }
            | Op::Throw { .. }
            | Op::Unop { .. } => false,
        }
    }

    // Resolution

    /// Resolves `field` to a definition whose values may be tracked.
    ///
    /// Returns `None` for unresolvable, volatile or pinned fields, and for
    /// references whose static-ness does not match the instruction.
    fn resolve_field(&self, field: &FieldRef, is_static: bool) -> Option<FieldId> {
        let program = self.ctx.program;
        let resolved = if self.ctx.config.enable_whole_program_optimizations {
            program.resolve_field(field)
        } else if field.holder == self.context {
            program.definition_for_field(field)
        } else {
            None
        }?;
        let fits = program.field(resolved).is_static() == is_static;
        (fits && program.may_propagate_value_for(resolved)).then_some(resolved)
    }

    fn is_final(&self, field: FieldId) -> bool {
        self.ctx.program.field(field).is_final()
    }

    /// Returns `true` if touching a static member of `holder` cannot run its
    /// static initializer. Only the method's own class and classes already
    /// initialized on this path qualify.
    fn is_initialized(&self, state: &BlockState, holder: TypeId) -> bool {
        holder == self.context || state.initialized.contains(&holder)
    }

    fn has_local_info(code: &MethodCode, value: ValueId) -> bool {
        code.value(value).is_some_and(Value::has_local_info)
    }

    // Rewriting

    /// Replaces the read at `site` by `known`.
    ///
    /// Returns `None` if `known` cannot be used here, otherwise whether the
    /// read was removed from the block.
    fn replace_read(
        &mut self,
        code: &mut MethodCode,
        site: Site,
        dest: ValueId,
        known: &FieldValue,
    ) -> Option<bool> {
        match known {
            FieldValue::Existing(value) => {
                self.affected.extend(code.affected_values(dest));
                code.replace_uses(dest, *value);
                self.stats.eliminated += 1;
                self.record(
                    EventKind::FieldLoadEliminated,
                    site,
                    format!("{dest} -> {value}"),
                );
                Some(code.remove_or_replace_by_debug_local_read(site.block, site.index))
            }
            FieldValue::Materializable(constant) => {
                if !constant.is_materializable_in_context(self.ctx.program, self.context) {
                    return None;
                }
                self.affected.extend(code.affected_values(dest));
                code.replace_op(site.block, site.index, constant.materialize(dest));
                self.stats.materialized += 1;
                self.record(
                    EventKind::FieldLoadMaterialized,
                    site,
                    format!("{dest} = {constant}"),
                );
                Some(false)
            }
        }
    }

    fn record(&self, kind: EventKind, site: Site, message: String) {
        self.ctx
            .events
            .record(kind)
            .method(self.method)
            .location(site.block)
            .pass(PASS_NAME)
            .message(message);
    }

    // Instruction handlers

    fn instance_get(
        &mut self,
        code: &mut MethodCode,
        site: Site,
        dest: ValueId,
        object: ValueId,
        field: &FieldRef,
        state: &mut BlockState,
    ) -> bool {
        let Some(resolved) = self.resolve_field(field, false) else {
            state.fields.clear_non_final();
            return false;
        };
        if Self::has_local_info(code, dest) {
            return false;
        }

        let object = code.aliased_value(object);
        if let Some(known) = state.fields.instance_field(resolved, object).cloned() {
            if let Some(removed) = self.replace_read(code, site, dest, &known) {
                return removed;
            }
        }
        state
            .fields
            .put_non_final_instance_field(resolved, object, FieldValue::Existing(dest));
        false
    }

    fn instance_put(
        &mut self,
        code: &MethodCode,
        object: ValueId,
        field: &FieldRef,
        value: ValueId,
        state: &mut BlockState,
    ) {
        let Some(resolved) = self.resolve_field(field, false) else {
            state.fields.clear_non_final();
            return;
        };

        // Any other receiver may alias this one.
        state.fields.remove_non_final_instance_fields(resolved);
        let object = code.aliased_value(object);
        let value = FieldValue::Existing(value);
        if self.is_final(resolved) {
            state.fields.put_final_instance_field(resolved, object, value);
        } else {
            state
                .fields
                .put_non_final_instance_field(resolved, object, value);
        }
    }

    fn static_get(
        &mut self,
        code: &mut MethodCode,
        site: Site,
        dest: ValueId,
        field: &FieldRef,
        state: &mut BlockState,
    ) -> bool {
        let Some(resolved) = self.resolve_field(field, true) else {
            state.fields.clear_non_final();
            return false;
        };
        let holder = self.ctx.program.field(resolved).holder();

        // The read still initializes its holder.
        if Self::has_local_info(code, dest) {
            if !self.is_initialized(state, holder) {
                state.fields.clear_non_final_static_fields();
            }
            state.initialized.insert(holder);
            return false;
        }

        if let Some(known) = state.fields.static_field(resolved).cloned() {
            if let Some(removed) = self.replace_read(code, site, dest, &known) {
                return removed;
            }
        }

        if !self.is_initialized(state, holder) {
            state.fields.clear_non_final_static_fields();
        }
        state
            .fields
            .put_non_final_static_field(resolved, FieldValue::Existing(dest));
        state.initialized.insert(holder);
        false
    }

    fn static_put(&mut self, field: &FieldRef, value: ValueId, state: &mut BlockState) {
        let Some(resolved) = self.resolve_field(field, true) else {
            state.fields.clear_non_final();
            return;
        };

        let holder = self.ctx.program.field(resolved).holder();
        if !self.is_initialized(state, holder) {
            state.fields.clear_non_final_static_fields();
        }
        let value = FieldValue::Existing(value);
        if self.is_final(resolved) {
            state.fields.put_final_static_field(resolved, value);
        } else {
            state.fields.put_non_final_static_field(resolved, value);
        }
        state.initialized.insert(holder);
    }

    fn init_class(
        &mut self,
        code: &mut MethodCode,
        site: Site,
        class: TypeId,
        state: &mut BlockState,
    ) -> bool {
        if state.initialized.contains(&class) {
            self.stats.init_classes_removed += 1;
            self.record(
                EventKind::InitClassRemoved,
                site,
                self.ctx.program.type_name(class).to_string(),
            );
            return code.remove_or_replace_by_debug_local_read(site.block, site.index);
        }

        if !self.is_initialized(state, class) {
            state.fields.clear_non_final_static_fields();
        }
        state.initialized.insert(class);
        false
    }

    fn new_instance(&mut self, class: TypeId, state: &mut BlockState) {
        if !state.initialized.contains(&class)
            && self
                .ctx
                .program
                .class_initialization_may_have_side_effects(class, self.context)
        {
            state.fields.clear_non_final();
        }
        state.initialized.insert(class);
    }

    fn invoke(
        &mut self,
        code: &MethodCode,
        kind: InvokeKind,
        method: &MethodRef,
        args: &[ValueId],
        state: &mut BlockState,
    ) {
        let info = if kind == InvokeKind::Direct && self.ctx.config.enable_whole_program_optimizations {
            self.initializer_info(method)
        } else {
            None
        };
        let (Some(info), Some(&receiver)) = (info, args.first()) else {
            state.fields.clear_non_final();
            return;
        };

        if info.may_have_other_side_effects() {
            state.fields.clear_non_final();
        }

        let program = self.ctx.program;
        let receiver = code.aliased_value(receiver);
        for (field, initialization) in info.field_initializations() {
            let field = *field;
            state.fields.remove_non_final_instance_fields(field);
            state.fields.remove_instance_field(field, receiver);
            if !program.may_propagate_value_for(field) {
                continue;
            }

            let value = match initialization {
                FieldInitialization::Argument(index) => match args.get(*index) {
                    Some(&argument) => FieldValue::Existing(argument),
                    None => continue,
                },
                FieldInitialization::Value(constant) => {
                    if !constant.is_materializable_in_context(program, self.context) {
                        continue;
                    }
                    FieldValue::Materializable(constant.clone())
                }
            };
            if self.is_final(field) {
                state.fields.put_final_instance_field(field, receiver, value);
            } else {
                state
                    .fields
                    .put_non_final_instance_field(field, receiver, value);
            }
        }
    }

    /// Summary of the instance initializer a direct invocation binds to.
    fn initializer_info(&self, method: &MethodRef) -> Option<InstanceInitializerInfo> {
        let program = self.ctx.program;
        let target = program.resolve_method(InvokeKind::Direct, method)?;
        if !program.method(target).is_instance_initializer() {
            return None;
        }
        program.instance_initializer_info(target)
    }

    // Propagation

    /// Hands the facts at the end of `block` to every successor that has no
    /// other predecessor.
    ///
    /// A handler of a block with several throwing instructions may be entered
    /// before any of them completed, so it starts with nothing.
    fn propagate(
        &self,
        code: &MethodCode,
        block: usize,
        state: &BlockState,
        pending: &mut FxHashMap<usize, BlockState>,
    ) {
        let Some(current) = code.block(block) else {
            return;
        };
        let faulting = current
            .exceptional_exit()
            .and_then(|index| current.instructions().get(index))
            .map(|instruction| &instruction.op);
        let single_thrower = current.throwing_instruction_count() <= 1;

        for successor in current.all_successors() {
            if code.predecessors_of(successor).len() != 1 {
                continue;
            }
            if !current.has_catch_successor(successor) {
                pending.insert(successor, state.clone());
                continue;
            }
            if !single_thrower {
                pending.insert(successor, BlockState::default());
                continue;
            }
            let mut inherited = state.clone();
            if let Some(op) = faulting {
                self.forget_faulting(code, op, &mut inherited);
            }
            pending.insert(successor, inherited);
        }
    }

    /// Drops the facts `op` would have established had it completed.
    fn forget_faulting(&self, code: &MethodCode, op: &Op, state: &mut BlockState) {
        match op {
            Op::InstanceGet { object, field, .. } | Op::InstancePut { object, field, .. } => {
                if let Some(resolved) = self.resolve_field(field, false) {
                    state
                        .fields
                        .remove_instance_field(resolved, code.aliased_value(*object));
                }
            }
            Op::StaticGet { field, .. } | Op::StaticPut { field, .. } => {
                if let Some(resolved) = self.resolve_field(field, true) {
                    state.fields.remove_static_field(resolved);
                    state
                        .initialized
                        .remove(&self.ctx.program.field(resolved).holder());
                }
            }
            Op::InitClass { class, .. } | Op::NewInstance { class, .. } => {
                state.initialized.remove(class);
            }
            _ => {}
        }
    }
}
