//! Tuples: rows bound to a schema.

use std::fmt;
use std::sync::Arc;

use bytes::{Buf, BufMut};

use crate::datum::{SerializationError, Value};
use crate::heap::RecordId;

use super::desc::TupleDesc;
use super::error::TupleError;

/// A row of field values bound to a [`TupleDesc`].
///
/// The value list grows by appending: [`set_field`](Self::set_field) replaces
/// an existing value or appends at exactly the next index, and silently
/// ignores any other index. [`get_field`](Self::get_field) returns `None` for
/// an index with no value. A tuple read from or inserted into a page carries
/// the [`RecordId`] of its slot.
///
/// `Tuple` has no `PartialEq`: comparing rows is only meaningful once both
/// have a record id, so use [`try_eq`](Self::try_eq).
#[derive(Debug, Clone)]
pub struct Tuple {
    desc: Arc<TupleDesc>,
    values: Vec<Value>,
    record_id: Option<RecordId>,
}

impl Tuple {
    /// Creates an empty tuple bound to `desc`.
    pub fn new(desc: Arc<TupleDesc>) -> Self {
        let values = Vec::with_capacity(desc.num_fields());
        Self {
            desc,
            values,
            record_id: None,
        }
    }

    /// Creates a tuple with the given values.
    ///
    /// Values beyond the descriptor's field count are dropped.
    pub fn with_values(desc: Arc<TupleDesc>, values: impl IntoIterator<Item = Value>) -> Self {
        let mut tuple = Self::new(desc);
        for value in values {
            if tuple.values.len() == tuple.desc.num_fields() {
                break;
            }
            tuple.values.push(value);
        }
        tuple
    }

    /// Returns the schema this tuple is bound to.
    pub fn tuple_desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    /// Rebinds the tuple to another schema.
    ///
    /// Existing values are kept as they are; the caller is responsible for
    /// them matching the new schema.
    pub fn reset_tuple_desc(&mut self, desc: Arc<TupleDesc>) {
        self.desc = desc;
    }

    /// Returns the physical location of this tuple, if it has one.
    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    /// Sets or clears the physical location of this tuple.
    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }

    /// Sets field `i`.
    ///
    /// Replaces the value if `i` is already set, appends if `i` is the next
    /// unset index, and does nothing otherwise. Appending past the
    /// descriptor's field count is also ignored.
    pub fn set_field(&mut self, i: usize, value: Value) {
        if i < self.values.len() {
            self.values[i] = value;
        } else if i == self.values.len() && i < self.desc.num_fields() {
            self.values.push(value);
        }
    }

    /// Returns field `i`, or `None` if it is not set.
    pub fn get_field(&self, i: usize) -> Option<&Value> {
        self.values.get(i)
    }

    /// Returns an iterator over the values that are set, in field order.
    pub fn fields(&self) -> std::slice::Iter<'_, Value> {
        self.values.iter()
    }

    /// Returns the number of values that are set.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no value is set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Compares two materialized tuples.
    ///
    /// Tuples are equal if they have the same record id, equal descriptors
    /// and equal values at every position.
    ///
    /// # Errors
    ///
    /// Returns `TupleError::MissingRecordId` if either tuple has no record id.
    pub fn try_eq(&self, other: &Tuple) -> Result<bool, TupleError> {
        let (Some(left), Some(right)) = (self.record_id, other.record_id) else {
            return Err(TupleError::MissingRecordId);
        };
        Ok(left == right && self.desc == other.desc && self.values == other.values)
    }

    /// Encodes all fields in schema order, writing exactly
    /// `tuple_desc().size()` bytes.
    ///
    /// # Errors
    ///
    /// Returns `SerializationError::IncompleteTuple` unless every field is
    /// set, or the error of the first value that fails to encode.
    pub fn serialize(&self, dst: &mut impl BufMut) -> Result<(), SerializationError> {
        if self.values.len() != self.desc.num_fields() {
            return Err(SerializationError::IncompleteTuple {
                expected: self.desc.num_fields(),
                present: self.values.len(),
            });
        }
        for (value, field) in self.values.iter().zip(self.desc.iter()) {
            value.serialize(field.field_type, dst)?;
        }
        Ok(())
    }

    /// Decodes one row of `desc` from `src`.
    ///
    /// The returned tuple has no record id.
    pub fn deserialize(
        desc: &Arc<TupleDesc>,
        src: &mut impl Buf,
    ) -> Result<Self, SerializationError> {
        let mut tuple = Self::new(Arc::clone(desc));
        for field in desc.iter() {
            tuple.values.push(Value::deserialize(field.field_type, src)?);
        }
        Ok(tuple)
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, "\t")?;
            }
            write!(f, "{}", value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::Type;
    use crate::storage::{PageId, TableId};

    fn desc() -> Arc<TupleDesc> {
        Arc::new(TupleDesc::new(&[Type::Int4, Type::Char(10)], &["id", "name"]).unwrap())
    }

    fn rid(page: u64, slot: usize) -> RecordId {
        RecordId::new(PageId::new(TableId::new(1), page), slot)
    }

    #[test]
    fn test_set_field_append_and_replace() {
        let mut t = Tuple::new(desc());
        t.set_field(0, Value::Int32(1));
        t.set_field(1, Value::Text("a".into()));
        assert_eq!(t.len(), 2);

        t.set_field(0, Value::Int32(2));
        assert_eq!(t.get_field(0), Some(&Value::Int32(2)));
    }

    #[test]
    fn test_set_field_out_of_range_is_ignored() {
        let mut t = Tuple::new(desc());
        t.set_field(1, Value::Text("skip".into()));
        assert!(t.is_empty());

        t.set_field(0, Value::Int32(1));
        t.set_field(5, Value::Int32(5));
        assert_eq!(t.len(), 1);
        assert_eq!(t.get_field(5), None);
    }

    #[test]
    fn test_get_field_out_of_range_is_none() {
        let t = Tuple::with_values(desc(), [Value::Int32(7)]);
        assert_eq!(t.get_field(0), Some(&Value::Int32(7)));
        assert_eq!(t.get_field(1), None);
        assert_eq!(t.get_field(usize::MAX), None);
    }

    #[test]
    fn test_fields_iterator_is_fresh() {
        let t = Tuple::with_values(desc(), [Value::Int32(1), Value::Text("x".into())]);
        assert_eq!(t.fields().count(), 2);
        assert_eq!(t.fields().next(), Some(&Value::Int32(1)));
    }

    #[test]
    fn test_reset_tuple_desc_keeps_values() {
        let mut t = Tuple::with_values(desc(), [Value::Int32(1), Value::Text("x".into())]);
        let other = Arc::new(TupleDesc::anonymous(&[Type::Int8]).unwrap());
        t.reset_tuple_desc(Arc::clone(&other));
        assert!(Arc::ptr_eq(t.tuple_desc(), &other));
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn test_try_eq_requires_record_id() {
        let a = Tuple::with_values(desc(), [Value::Int32(1), Value::Text("x".into())]);
        let mut b = a.clone();
        assert_eq!(a.try_eq(&b), Err(TupleError::MissingRecordId));

        b.set_record_id(Some(rid(0, 0)));
        assert_eq!(a.try_eq(&b), Err(TupleError::MissingRecordId));
    }

    #[test]
    fn test_try_eq() {
        let mut a = Tuple::with_values(desc(), [Value::Int32(1), Value::Text("x".into())]);
        a.set_record_id(Some(rid(0, 3)));
        let mut b = a.clone();
        assert_eq!(a.try_eq(&b), Ok(true));

        b.set_field(1, Value::Text("y".into()));
        assert_eq!(a.try_eq(&b), Ok(false));

        let mut c = a.clone();
        c.set_record_id(Some(rid(0, 4)));
        assert_eq!(a.try_eq(&c), Ok(false));
    }

    #[test]
    fn test_serialize_layout() {
        let t = Tuple::with_values(desc(), [Value::Int32(258), Value::Text("bob".into())]);
        let mut buf = Vec::new();
        t.serialize(&mut buf).unwrap();
        assert_eq!(buf.len(), 14);
        assert_eq!(&buf[..4], &258i32.to_le_bytes());
        assert_eq!(&buf[4..], b"bob\0\0\0\0\0\0\0");

        let parsed = Tuple::deserialize(&desc(), &mut buf.as_slice()).unwrap();
        assert_eq!(parsed.fields().cloned().collect::<Vec<_>>(), t.values);
        assert_eq!(parsed.record_id(), None);
    }

    #[test]
    fn test_serialize_incomplete() {
        let t = Tuple::with_values(desc(), [Value::Int32(1)]);
        let mut buf = Vec::new();
        assert!(matches!(
            t.serialize(&mut buf),
            Err(SerializationError::IncompleteTuple {
                expected: 2,
                present: 1
            })
        ));
    }

    #[test]
    fn test_display() {
        let t = Tuple::with_values(desc(), [Value::Int32(1), Value::Text("ann".into())]);
        assert_eq!(t.to_string(), "1\tann");
    }
}
