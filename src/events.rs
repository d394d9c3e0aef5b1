//! Event log for the optimizer pipeline.
//!
//! Scheduling decisions and individual rewrites are recorded as [`Event`]s in an
//! [`EventLog`]. The log is append-only and lock-free, so the per-method passes
//! of one wave can record into the same log from different worker threads.
//!
//! # Example
//!
//! ```rust
//! use shrinkwave::events::{EventKind, EventLog};
//!
//! let log = EventLog::new();
//! log.record(EventKind::FieldLoadEliminated)
//!     .location(3)
//!     .message("v7 -> v2");
//! log.info("wave 1 complete");
//!
//! assert_eq!(log.count_kind(EventKind::FieldLoadEliminated), 1);
//! println!("{}", log.summary());
//! ```

use std::{collections::HashMap, fmt};

use crate::program::MethodId;

/// Kind of recorded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
pub enum EventKind {
    // Rewrites
    /// A redundant field read was replaced by an earlier value.
    FieldLoadEliminated,
    /// A redundant field read was replaced by a constant.
    FieldLoadMaterialized,
    /// A redundant class-initialization check was removed.
    InitClassRemoved,
    /// A field was synthesized to carry class-initialization checks.
    InitClassFieldSynthesized,

    // Scheduling
    /// The call graph was built.
    CallGraphBuilt,
    /// A frontier of leaves was extracted from the call graph.
    LeavesPicked,
    /// Calls of a method were severed to break a cycle.
    CyclesBroken,

    // Engine
    /// A pass finished on a method and changed it.
    PassCompleted,
    /// A method finished processing and was marked as processed.
    MethodProcessed,

    // Diagnostic
    /// Informational message.
    Info,
    /// Warning message.
    Warning,
    /// Error message.
    Error,
}

impl EventKind {
    /// Short human readable description.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::FieldLoadEliminated => "field load eliminated",
            Self::FieldLoadMaterialized => "field load materialized",
            Self::InitClassRemoved => "init class removed",
            Self::InitClassFieldSynthesized => "init class field synthesized",
            Self::CallGraphBuilt => "call graph built",
            Self::LeavesPicked => "leaves picked",
            Self::CyclesBroken => "cycles broken",
            Self::PassCompleted => "pass completed",
            Self::MethodProcessed => "method processed",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// Returns `true` for events that describe a code rewrite.
    #[must_use]
    pub fn is_transformation(&self) -> bool {
        matches!(
            self,
            Self::FieldLoadEliminated
                | Self::FieldLoadMaterialized
                | Self::InitClassRemoved
                | Self::InitClassFieldSynthesized
        )
    }

    /// Returns `true` for plain diagnostics.
    #[must_use]
    pub fn is_diagnostic(&self) -> bool {
        matches!(self, Self::Info | Self::Warning | Self::Error)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A single recorded event.
#[derive(Debug, Clone)]
pub struct Event {
    /// What happened.
    pub kind: EventKind,
    /// The method the event applies to, if any.
    pub method: Option<MethodId>,
    /// Instruction position or other numeric location within the method.
    pub location: Option<usize>,
    /// Free-form details.
    pub message: String,
    /// Name of the pass that produced the event.
    pub pass: Option<&'static str>,
}

impl Event {
    fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            method: None,
            location: None,
            message: message.into(),
            pass: None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.kind)?;
        if let Some(method) = self.method {
            write!(f, "{method}: ")?;
        }
        f.write_str(&self.message)
    }
}

/// Fluent event construction; the event is pushed into the log on drop.
pub struct EventBuilder<'a> {
    log: &'a EventLog,
    kind: EventKind,
    method: Option<MethodId>,
    location: Option<usize>,
    message: Option<String>,
    pass: Option<&'static str>,
}

impl<'a> EventBuilder<'a> {
    fn new(log: &'a EventLog, kind: EventKind) -> Self {
        Self {
            log,
            kind,
            method: None,
            location: None,
            message: None,
            pass: None,
        }
    }

    /// Sets the method the event applies to.
    pub fn method(mut self, method: MethodId) -> Self {
        self.method = Some(method);
        self
    }

    /// Sets the location inside the method.
    pub fn location(mut self, location: usize) -> Self {
        self.location = Some(location);
        self
    }

    /// Sets the message. Defaults to the kind's description.
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Sets the producing pass.
    pub fn pass(mut self, pass: &'static str) -> Self {
        self.pass = Some(pass);
        self
    }
}

impl Drop for EventBuilder<'_> {
    fn drop(&mut self) {
        let message = self
            .message
            .take()
            .unwrap_or_else(|| self.kind.description().to_string());

        self.log.events.push(Event {
            kind: self.kind,
            method: self.method.take(),
            location: self.location.take(),
            message,
            pass: self.pass.take(),
        });
    }
}

/// Thread-safe, append-only collection of events.
#[derive(Debug, Default)]
pub struct EventLog {
    events: boxcar::Vec<Event>,
}

impl Clone for EventLog {
    fn clone(&self) -> Self {
        let new_log = Self::new();
        new_log.merge(self);
        new_log
    }
}

impl EventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: boxcar::Vec::new(),
        }
    }

    /// Returns `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.count() == 0
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.count()
    }

    /// Starts recording an event of the given kind.
    pub fn record(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder::new(self, kind)
    }

    /// Records an informational message.
    pub fn info(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Info, message));
    }

    /// Records a warning.
    pub fn warn(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Warning, message));
    }

    /// Records an error message.
    pub fn error(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Error, message));
    }

    /// Appends copies of all events of `other`.
    pub fn merge(&self, other: &EventLog) {
        for (_, event) in &other.events {
            self.events.push(event.clone());
        }
    }

    /// Returns `true` if at least one event of `kind` was recorded.
    #[must_use]
    pub fn has(&self, kind: EventKind) -> bool {
        self.events.iter().any(|(_, e)| e.kind == kind)
    }

    /// Number of events of `kind`.
    #[must_use]
    pub fn count_kind(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|(_, e)| e.kind == kind).count()
    }

    /// Iterates over all events in recording order.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|(_, e)| e)
    }

    /// Iterates over the events of `kind`.
    pub fn filter_kind(&self, kind: EventKind) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(move |e| e.kind == kind)
    }

    /// Iterates over the events recorded for `method`.
    pub fn filter_method(&self, method: MethodId) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(move |e| e.method == Some(method))
    }

    /// Iterates over rewrite events.
    pub fn transformations(&self) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(|e| e.kind.is_transformation())
    }

    /// Iterates over warnings.
    pub fn warnings(&self) -> impl Iterator<Item = &Event> + '_ {
        self.filter_kind(EventKind::Warning)
    }

    /// Counts events per kind.
    #[must_use]
    pub fn count_by_kind(&self) -> HashMap<EventKind, usize> {
        let mut counts = HashMap::new();
        for (_, event) in &self.events {
            *counts.entry(event.kind).or_insert(0) += 1;
        }
        counts
    }

    /// One-line summary of the rewrites and scheduling events.
    #[must_use]
    pub fn summary(&self) -> String {
        use strum::IntoEnumIterator;

        let counts = self.count_by_kind();
        let parts: Vec<String> = EventKind::iter()
            .filter(|kind| !kind.is_diagnostic())
            .filter_map(|kind| {
                counts
                    .get(&kind)
                    .map(|count| format!("{count} {}", kind.description()))
            })
            .collect();

        if parts.is_empty() {
            "no changes".to_string()
        } else {
            parts.join(", ")
        }
    }
}

impl fmt::Display for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for event in self.iter() {
            writeln!(f, "{event}")?;
        }
        Ok(())
    }
}
