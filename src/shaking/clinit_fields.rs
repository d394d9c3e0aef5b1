//! Fields standing in for class-initialization checks.
//!
//! An `InitClass` instruction is eventually emitted as a read of a static
//! field of the class, which triggers the class's static initializer exactly
//! like the check would. Each class referenced by such an instruction needs
//! one field that every referencing method can access. An existing field is
//! reused when one fits; otherwise a synthetic one is added to the class.

use rayon::{prelude::*, ThreadPool};

use crate::{
    events::{EventKind, EventLog},
    program::{
        ClassDef, FieldFlags, FieldId, InitClassLens, InitClassLensBuilder, Program, TypeId,
        Visibility,
    },
    Result,
};

/// Base name of synthesized init fields.
pub const CLINIT_FIELD_NAME: &str = "$clinit";

/// Picks or synthesizes one init field per class referenced by an
/// `InitClass` instruction.
///
/// Existing fields are looked up in parallel on the supplied pool, one class
/// per task. Synthesis mutates the program and runs serially afterwards, in
/// ascending class order.
///
/// # Example
///
/// ```rust
/// use rayon::ThreadPoolBuilder;
/// use shrinkwave::events::EventLog;
/// use shrinkwave::program::ProgramBuilder;
/// use shrinkwave::shaking::ClassInitFieldSynthesizer;
///
/// let mut program = ProgramBuilder::new().build();
/// let pool = ThreadPoolBuilder::new().num_threads(2).build()?;
/// let lens = ClassInitFieldSynthesizer::new(&pool).run(&mut program, &EventLog::new())?;
/// assert!(lens.is_empty());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct ClassInitFieldSynthesizer<'a> {
    pool: &'a ThreadPool,
}

impl<'a> ClassInitFieldSynthesizer<'a> {
    /// Creates a synthesizer running its parallel phase on `pool`.
    #[must_use]
    pub fn new(pool: &'a ThreadPool) -> Self {
        Self { pool }
    }

    /// Maps every class referenced by an init-class check to its init field.
    ///
    /// Classes that are not program classes are left unmapped since no field
    /// can be added to them.
    ///
    /// # Errors
    ///
    /// Returns an invariant error if a field cannot be added to a program class.
    pub fn run(&self, program: &mut Program, events: &EventLog) -> Result<InitClassLens> {
        let references = program.init_class_references();
        let lens = InitClassLensBuilder::new();
        if references.is_empty() {
            return Ok(lens.build());
        }

        let shared: &Program = program;
        let missing: Vec<TypeId> = self.pool.install(|| {
            references
                .par_iter()
                .filter_map(|&(class, required)| {
                    match find_existing_field(shared, class, required) {
                        Some(field) => {
                            lens.map(class, field);
                            None
                        }
                        None => Some(class),
                    }
                })
                .collect()
        });

        for class in missing {
            if !program.class(class).is_some_and(ClassDef::is_program_class) {
                continue;
            }
            let name = unique_field_name(program, class);
            let field = program.add_static_field(
                class,
                &name,
                "I",
                FieldFlags::PUBLIC | FieldFlags::STATIC | FieldFlags::FINAL | FieldFlags::SYNTHETIC,
            )?;
            lens.map(class, field);
            events
                .record(EventKind::InitClassFieldSynthesized)
                .message(format!("{}.{}", program.type_name(class), name));
        }

        Ok(lens.build())
    }
}

/// Returns `true` if a field declared with `actual` visibility is accessible
/// wherever a field with `required` visibility must be.
#[must_use]
pub fn satisfies_visibility(actual: Visibility, required: Visibility) -> bool {
    match required {
        Visibility::Public => actual == Visibility::Public,
        Visibility::Protected => matches!(actual, Visibility::Public | Visibility::Protected),
        Visibility::PackagePrivate => actual != Visibility::Private,
        Visibility::Private => true,
    }
}

/// The most visible live, non-wide static field of `class` that satisfies
/// `required`, stopping at the first public one.
fn find_existing_field(program: &Program, class: TypeId, required: Visibility) -> Option<FieldId> {
    let definition = program.class(class)?;
    let mut candidate: Option<(FieldId, Visibility)> = None;
    for &field in &definition.fields {
        let field_def = program.field(field);
        if !field_def.is_static() || field_def.is_dead || field_def.is_wide() {
            continue;
        }
        let visibility = field_def.visibility();
        if !satisfies_visibility(visibility, required) {
            continue;
        }
        if candidate.map_or(true, |(_, best)| visibility > best) {
            candidate = Some((field, visibility));
        }
        if visibility == Visibility::Public {
            break;
        }
    }
    candidate.map(|(field, _)| field)
}

fn unique_field_name(program: &Program, class: TypeId) -> String {
    let taken = |name: &str| {
        program.class(class).is_some_and(|definition| {
            definition
                .fields
                .iter()
                .any(|&field| &*program.field(field).reference.name == name)
        })
    };
    if !taken(CLINIT_FIELD_NAME) {
        return CLINIT_FIELD_NAME.to_string();
    }
    let mut suffix = 1;
    loop {
        let name = format!("{CLINIT_FIELD_NAME}${suffix}");
        if !taken(&name) {
            return name;
        }
        suffix += 1;
    }
}

#[cfg(test)]
mod tests {
    use rayon::ThreadPoolBuilder;

    use super::*;
    use crate::{
        ir::CodeBuilder,
        program::{MethodFlags, ProgramBuilder},
    };

    fn init_class_from(builder: &mut ProgramBuilder, context: TypeId, targets: &[TypeId]) {
        let method = builder.method(context, "touch", "()V", MethodFlags::STATIC);
        let mut code = CodeBuilder::new(method);
        for &target in targets {
            code.init_class(target);
        }
        code.return_void();
        builder.body(method, code.finish().unwrap());
    }

    fn synthesize(program: &mut Program) -> (InitClassLens, EventLog) {
        let pool = ThreadPoolBuilder::new().num_threads(4).build().unwrap();
        let events = EventLog::new();
        let lens = ClassInitFieldSynthesizer::new(&pool)
            .run(program, &events)
            .unwrap();
        (lens, events)
    }

    #[test]
    fn test_visibility_rules() {
        use Visibility::*;
        assert!(satisfies_visibility(Public, Public));
        assert!(!satisfies_visibility(Protected, Public));
        assert!(satisfies_visibility(Protected, Protected));
        assert!(!satisfies_visibility(PackagePrivate, Protected));
        assert!(satisfies_visibility(Protected, PackagePrivate));
        assert!(satisfies_visibility(PackagePrivate, PackagePrivate));
        assert!(!satisfies_visibility(Private, PackagePrivate));
    }

    #[test]
    fn test_reuses_public_field() {
        let mut builder = ProgramBuilder::new();
        let user = builder.class("Lp/User;");
        let target = builder.class("Lq/Target;");
        builder.field(target, "hidden", "I", FieldFlags::STATIC);
        let shown = builder.field(target, "SHOWN", "I", FieldFlags::STATIC | FieldFlags::PUBLIC);
        init_class_from(&mut builder, user, &[target]);
        let mut program = builder.build();

        let (lens, events) = synthesize(&mut program);
        assert_eq!(lens.init_field(target), Some(shown));
        assert_eq!(events.count_kind(EventKind::InitClassFieldSynthesized), 0);
    }

    #[test]
    fn test_same_package_prefers_most_visible() {
        let mut builder = ProgramBuilder::new();
        let user = builder.class("Lp/User;");
        let target = builder.class("Lp/Target;");
        builder.field(target, "a", "I", FieldFlags::STATIC);
        let protected = builder.field(target, "b", "I", FieldFlags::STATIC | FieldFlags::PROTECTED);
        builder.field(target, "c", "I", FieldFlags::STATIC | FieldFlags::PRIVATE);
        init_class_from(&mut builder, user, &[target]);
        let mut program = builder.build();

        let (lens, _) = synthesize(&mut program);
        assert_eq!(lens.init_field(target), Some(protected));
    }

    #[test]
    fn test_synthesizes_when_nothing_fits() {
        let mut builder = ProgramBuilder::new();
        let user = builder.class("Lp/User;");
        let target = builder.class("Lq/Target;");
        builder.field(target, "wide", "J", FieldFlags::STATIC | FieldFlags::PUBLIC);
        let dead = builder.field(target, "dead", "I", FieldFlags::STATIC | FieldFlags::PUBLIC);
        builder.mark_field_dead(dead);
        builder.field(target, CLINIT_FIELD_NAME, "I", FieldFlags::STATIC | FieldFlags::PRIVATE);
        init_class_from(&mut builder, user, &[target]);
        let mut program = builder.build();

        let (lens, events) = synthesize(&mut program);
        let field = lens.init_field(target).unwrap();
        let definition = program.field(field);
        assert_eq!(&*definition.reference.name, "$clinit$1");
        assert_eq!(&*definition.reference.ty, "I");
        assert!(definition.is_static() && definition.is_final());
        assert!(definition.flags.contains(FieldFlags::SYNTHETIC));
        assert_eq!(definition.visibility(), Visibility::Public);
        assert_eq!(events.count_kind(EventKind::InitClassFieldSynthesized), 1);
    }

    #[test]
    fn test_library_classes_are_not_mapped() {
        let mut builder = ProgramBuilder::new();
        let user = builder.class("Lp/User;");
        let library = builder.library_class("Ljava/lang/Thread;");
        let target = builder.class("Lp/Target;");
        init_class_from(&mut builder, user, &[library, target]);
        let mut program = builder.build();

        let (lens, _) = synthesize(&mut program);
        assert_eq!(lens.len(), 1);
        assert!(lens.init_field(library).is_none());
        let field = lens.init_field(target).unwrap();
        assert_eq!(&*program.field(field).reference.name, CLINIT_FIELD_NAME);
    }

    #[test]
    fn test_no_init_class_no_work() {
        let mut builder = ProgramBuilder::new();
        builder.class("Lp/User;");
        let mut program = builder.build();

        let (lens, events) = synthesize(&mut program);
        assert!(lens.is_empty());
        assert!(events.is_empty());
    }
}
