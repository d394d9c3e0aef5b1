//! Known field values at a program point.
//!
//! The maps use `imbl` persistent collections so the state at the end of a
//! block can be handed to each single-predecessor successor with an O(1)
//! clone.

use imbl::HashMap as ImHashMap;

use crate::{
    ir::{SingleValue, ValueId},
    program::FieldId,
};

/// A known value of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// The value is already held by an SSA value of the method.
    Existing(ValueId),
    /// The value is a constant that can be re-created where it is needed.
    Materializable(SingleValue),
}

type ReceiverValues = ImHashMap<ValueId, FieldValue>;

/// Known instance and static field values, split by field finality.
///
/// A field, or a field and receiver pair, is present in at most one of the
/// final and non-final partitions. Final facts survive kills: only the
/// initializer that is currently running can write a final field.
#[derive(Debug, Clone, Default)]
pub struct FieldValuesMap {
    final_instance: ImHashMap<FieldId, ReceiverValues>,
    non_final_instance: ImHashMap<FieldId, ReceiverValues>,
    final_static: ImHashMap<FieldId, FieldValue>,
    non_final_static: ImHashMap<FieldId, FieldValue>,
}

impl FieldValuesMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if nothing is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.final_instance.is_empty()
            && self.non_final_instance.is_empty()
            && self.final_static.is_empty()
            && self.non_final_static.is_empty()
    }

    /// Number of known facts across all partitions.
    #[must_use]
    pub fn len(&self) -> usize {
        let instance: usize = self
            .final_instance
            .values()
            .chain(self.non_final_instance.values())
            .map(ImHashMap::len)
            .sum();
        instance + self.final_static.len() + self.non_final_static.len()
    }

    /// The known value of `field` on `object`.
    #[must_use]
    pub fn instance_field(&self, field: FieldId, object: ValueId) -> Option<&FieldValue> {
        self.non_final_instance
            .get(&field)
            .and_then(|receivers| receivers.get(&object))
            .or_else(|| {
                self.final_instance
                    .get(&field)
                    .and_then(|receivers| receivers.get(&object))
            })
    }

    /// The known value of static `field`.
    #[must_use]
    pub fn static_field(&self, field: FieldId) -> Option<&FieldValue> {
        self.non_final_static
            .get(&field)
            .or_else(|| self.final_static.get(&field))
    }

    fn insert_receiver(
        map: &mut ImHashMap<FieldId, ReceiverValues>,
        field: FieldId,
        object: ValueId,
        value: FieldValue,
    ) {
        let mut receivers = map.get(&field).cloned().unwrap_or_default();
        receivers.insert(object, value);
        map.insert(field, receivers);
    }

    fn remove_receiver(map: &mut ImHashMap<FieldId, ReceiverValues>, field: FieldId, object: ValueId) {
        let Some(receivers) = map.get(&field) else {
            return;
        };
        if !receivers.contains_key(&object) {
            return;
        }
        let mut receivers = receivers.clone();
        receivers.remove(&object);
        if receivers.is_empty() {
            map.remove(&field);
        } else {
            map.insert(field, receivers);
        }
    }

    /// Records a final instance field value.
    pub fn put_final_instance_field(&mut self, field: FieldId, object: ValueId, value: FieldValue) {
        Self::remove_receiver(&mut self.non_final_instance, field, object);
        Self::insert_receiver(&mut self.final_instance, field, object, value);
    }

    /// Records a non-final instance field value.
    pub fn put_non_final_instance_field(
        &mut self,
        field: FieldId,
        object: ValueId,
        value: FieldValue,
    ) {
        Self::remove_receiver(&mut self.final_instance, field, object);
        Self::insert_receiver(&mut self.non_final_instance, field, object, value);
    }

    /// Records a final static field value.
    pub fn put_final_static_field(&mut self, field: FieldId, value: FieldValue) {
        self.non_final_static.remove(&field);
        self.final_static.insert(field, value);
    }

    /// Records a non-final static field value.
    pub fn put_non_final_static_field(&mut self, field: FieldId, value: FieldValue) {
        self.final_static.remove(&field);
        self.non_final_static.insert(field, value);
    }

    /// Forgets `field` on `object` in both partitions.
    pub fn remove_instance_field(&mut self, field: FieldId, object: ValueId) {
        Self::remove_receiver(&mut self.final_instance, field, object);
        Self::remove_receiver(&mut self.non_final_instance, field, object);
    }

    /// Forgets non-final values of `field` on every receiver.
    pub fn remove_non_final_instance_fields(&mut self, field: FieldId) {
        self.non_final_instance.remove(&field);
    }

    /// Forgets static `field` in both partitions.
    pub fn remove_static_field(&mut self, field: FieldId) {
        self.final_static.remove(&field);
        self.non_final_static.remove(&field);
    }

    /// Forgets the non-final value of static `field`.
    pub fn remove_non_final_static_field(&mut self, field: FieldId) {
        self.non_final_static.remove(&field);
    }

    /// Forgets every non-final instance field value.
    pub fn clear_non_final_instance_fields(&mut self) {
        self.non_final_instance = ImHashMap::new();
    }

    /// Forgets every non-final static field value.
    pub fn clear_non_final_static_fields(&mut self) {
        self.non_final_static = ImHashMap::new();
    }

    /// Forgets every non-final value.
    pub fn clear_non_final(&mut self) {
        self.clear_non_final_instance_fields();
        self.clear_non_final_static_fields();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f(index: u32) -> FieldId {
        FieldId::new(index)
    }

    fn v(index: u32) -> ValueId {
        ValueId::new(index)
    }

    #[test]
    fn test_partitions_stay_disjoint() {
        let mut map = FieldValuesMap::new();
        map.put_non_final_instance_field(f(0), v(1), FieldValue::Existing(v(2)));
        map.put_final_instance_field(f(0), v(1), FieldValue::Existing(v(3)));
        assert_eq!(map.len(), 1);
        assert_eq!(map.instance_field(f(0), v(1)), Some(&FieldValue::Existing(v(3))));

        map.put_non_final_instance_field(f(0), v(1), FieldValue::Existing(v(4)));
        assert_eq!(map.len(), 1);
        assert_eq!(map.instance_field(f(0), v(1)), Some(&FieldValue::Existing(v(4))));

        map.put_final_static_field(f(1), FieldValue::Materializable(SingleValue::Null));
        map.put_non_final_static_field(f(1), FieldValue::Existing(v(5)));
        assert_eq!(map.len(), 2);
        assert_eq!(map.static_field(f(1)), Some(&FieldValue::Existing(v(5))));
    }

    #[test]
    fn test_kill_keeps_final_facts() {
        let mut map = FieldValuesMap::new();
        map.put_final_instance_field(f(0), v(1), FieldValue::Existing(v(2)));
        map.put_non_final_instance_field(f(1), v(1), FieldValue::Existing(v(3)));
        map.put_final_static_field(f(2), FieldValue::Existing(v(4)));
        map.put_non_final_static_field(f(3), FieldValue::Existing(v(5)));

        map.clear_non_final();
        assert_eq!(map.len(), 2);
        assert!(map.instance_field(f(0), v(1)).is_some());
        assert!(map.instance_field(f(1), v(1)).is_none());
        assert!(map.static_field(f(2)).is_some());
        assert!(map.static_field(f(3)).is_none());
    }

    #[test]
    fn test_field_kill_covers_all_receivers() {
        let mut map = FieldValuesMap::new();
        map.put_non_final_instance_field(f(0), v(1), FieldValue::Existing(v(10)));
        map.put_non_final_instance_field(f(0), v(2), FieldValue::Existing(v(11)));
        map.put_non_final_instance_field(f(1), v(1), FieldValue::Existing(v(12)));

        map.remove_non_final_instance_fields(f(0));
        assert!(map.instance_field(f(0), v(1)).is_none());
        assert!(map.instance_field(f(0), v(2)).is_none());
        assert!(map.instance_field(f(1), v(1)).is_some());
    }

    #[test]
    fn test_clones_are_independent() {
        let mut map = FieldValuesMap::new();
        map.put_non_final_static_field(f(0), FieldValue::Existing(v(1)));
        let mut copy = map.clone();
        copy.remove_static_field(f(0));
        copy.remove_instance_field(f(9), v(9));

        assert!(copy.is_empty());
        assert_eq!(map.static_field(f(0)), Some(&FieldValue::Existing(v(1))));
    }
}
