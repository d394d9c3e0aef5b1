//! Optimization summaries recorded for processed methods.
//!
//! Summaries are produced while a method is optimized and consumed by its
//! callers. The leaf scheduler guarantees callees are processed first, so a
//! caller sees the summaries of everything it calls unless a cycle had to be
//! broken.

use crate::{ir::SingleValue, program::FieldId};

/// How an instance initializer sets one of the fields of the new object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldInitialization {
    /// The field receives the argument at this index. Index 0 is the receiver.
    Argument(usize),
    /// The field receives a known constant.
    Value(SingleValue),
}

/// What an `<init>` method does to the object it initializes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceInitializerInfo {
    fields: Vec<(FieldId, FieldInitialization)>,
    may_have_other_side_effects: bool,
}

impl InstanceInitializerInfo {
    /// An initializer that does nothing observable.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Summary for an initializer whose effects are unknown.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            fields: Vec::new(),
            may_have_other_side_effects: true,
        }
    }

    /// Records that `field` is initialized from the argument at `index`.
    #[must_use]
    pub fn with_argument(mut self, field: FieldId, index: usize) -> Self {
        self.fields
            .push((field, FieldInitialization::Argument(index)));
        self
    }

    /// Records that `field` is initialized to a constant.
    #[must_use]
    pub fn with_value(mut self, field: FieldId, value: SingleValue) -> Self {
        self.fields.push((field, FieldInitialization::Value(value)));
        self
    }

    /// Marks the initializer as doing more than assigning fields of the receiver.
    #[must_use]
    pub fn with_other_side_effects(mut self) -> Self {
        self.may_have_other_side_effects = true;
        self
    }

    /// Field initializations in recording order.
    #[must_use]
    pub fn field_initializations(&self) -> &[(FieldId, FieldInitialization)] {
        &self.fields
    }

    /// Returns `true` if the initializer may do anything besides assigning
    /// fields of the receiver.
    #[must_use]
    pub fn may_have_other_side_effects(&self) -> bool {
        self.may_have_other_side_effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let info = InstanceInitializerInfo::new()
            .with_argument(FieldId::new(0), 1)
            .with_value(FieldId::new(1), SingleValue::Number(3));
        assert!(!info.may_have_other_side_effects());
        assert_eq!(info.field_initializations().len(), 2);
        assert_eq!(
            info.field_initializations()[0],
            (FieldId::new(0), FieldInitialization::Argument(1))
        );
        assert!(InstanceInitializerInfo::unknown().may_have_other_side_effects());
    }
}
