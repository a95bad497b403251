//! Tuple descriptors (table schemas).

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::datum::Type;

use super::error::TupleError;

/// One column of a [`TupleDesc`]: a type and an optional name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDesc {
    /// Column type.
    pub field_type: Type,
    /// Column name, `None` for anonymous columns.
    pub name: Option<String>,
}

impl FieldDesc {
    /// Creates a named field.
    pub fn new(field_type: Type, name: impl Into<String>) -> Self {
        Self {
            field_type,
            name: Some(name.into()),
        }
    }

    /// Creates an anonymous field.
    pub fn anonymous(field_type: Type) -> Self {
        Self {
            field_type,
            name: None,
        }
    }
}

impl fmt::Display for FieldDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}({})", self.field_type, name),
            None => write!(f, "{}", self.field_type),
        }
    }
}

/// Ordered schema of typed, optionally named fields.
///
/// Equality (and hashing) is type-positional: two descriptors are equal when
/// they have the same number of fields, the same total size and the same type
/// at every position. Field names take no part in it, so a tuple produced by a
/// join or a projection with renamed columns still matches the table it is
/// inserted into.
///
/// # Example
///
/// ```
/// use heapstore::datum::Type;
/// use heapstore::tuple::TupleDesc;
///
/// let desc = TupleDesc::new(&[Type::Int4, Type::Char(10)], &["id", "name"]).unwrap();
/// assert_eq!(desc.size(), 14);
/// assert_eq!(desc.index_of_field("t.name").unwrap(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct TupleDesc {
    fields: Vec<FieldDesc>,
    size: usize,
}

impl TupleDesc {
    /// Creates a descriptor from parallel type and name lists.
    ///
    /// # Errors
    ///
    /// Returns `TupleError::LengthMismatch` if the lists differ in length and
    /// `TupleError::Empty` if there are no fields.
    pub fn new(types: &[Type], names: &[&str]) -> Result<Self, TupleError> {
        if types.len() != names.len() {
            return Err(TupleError::LengthMismatch {
                types: types.len(),
                names: names.len(),
            });
        }
        Self::from_fields(
            types
                .iter()
                .zip(names)
                .map(|(&ty, &name)| FieldDesc::new(ty, name))
                .collect(),
        )
    }

    /// Creates a descriptor whose fields have no names.
    pub fn anonymous(types: &[Type]) -> Result<Self, TupleError> {
        Self::from_fields(types.iter().map(|&ty| FieldDesc::anonymous(ty)).collect())
    }

    /// Creates a descriptor from a list of fields.
    pub fn from_fields(fields: Vec<FieldDesc>) -> Result<Self, TupleError> {
        if fields.is_empty() {
            return Err(TupleError::Empty);
        }
        let size = fields.iter().map(|f| f.field_type.len()).sum();
        Ok(Self { fields, size })
    }

    /// Returns the number of fields.
    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    /// Returns the name of field `i` (`None` for an anonymous field).
    pub fn field_name(&self, i: usize) -> Result<Option<&str>, TupleError> {
        self.field(i).map(|f| f.name.as_deref())
    }

    /// Returns the type of field `i`.
    pub fn field_type(&self, i: usize) -> Result<Type, TupleError> {
        self.field(i).map(|f| f.field_type)
    }

    fn field(&self, i: usize) -> Result<&FieldDesc, TupleError> {
        self.fields.get(i).ok_or(TupleError::FieldIndex {
            index: i,
            num_fields: self.fields.len(),
        })
    }

    /// Finds the index of the field called `name`.
    ///
    /// A field matches if its name equals `name`, or equals the part of
    /// `name` after the last `.` (so `"t.id"` finds a field named `"id"`).
    /// The first matching index is returned.
    ///
    /// # Errors
    ///
    /// Returns `TupleError::NoSuchField` if no field matches.
    pub fn index_of_field(&self, name: &str) -> Result<usize, TupleError> {
        let unqualified = name.rsplit_once('.').map_or(name, |(_, suffix)| suffix);
        self.fields
            .iter()
            .position(|f| {
                f.name
                    .as_deref()
                    .is_some_and(|n| n == name || n == unqualified)
            })
            .ok_or_else(|| TupleError::NoSuchField(name.to_string()))
    }

    /// Returns the byte width of a row with this schema.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns an iterator over the fields in declaration order.
    pub fn iter(&self) -> std::slice::Iter<'_, FieldDesc> {
        self.fields.iter()
    }

    /// Returns a descriptor with the fields of `a` followed by those of `b`.
    ///
    /// A missing operand yields the other one unchanged; neither input is
    /// modified.
    pub fn merge(
        a: Option<&Arc<TupleDesc>>,
        b: Option<&Arc<TupleDesc>>,
    ) -> Option<Arc<TupleDesc>> {
        match (a, b) {
            (None, None) => None,
            (Some(a), None) => Some(Arc::clone(a)),
            (None, Some(b)) => Some(Arc::clone(b)),
            (Some(a), Some(b)) => {
                let fields = a.fields.iter().chain(&b.fields).cloned().collect();
                Some(Arc::new(TupleDesc {
                    fields,
                    size: a.size + b.size,
                }))
            }
        }
    }
}

impl PartialEq for TupleDesc {
    fn eq(&self, other: &Self) -> bool {
        self.fields.len() == other.fields.len()
            && self.size == other.size
            && self
                .fields
                .iter()
                .zip(&other.fields)
                .all(|(a, b)| a.field_type == b.field_type)
    }
}

impl Eq for TupleDesc {}

impl Hash for TupleDesc {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for field in &self.fields {
            field.field_type.hash(state);
        }
    }
}

impl<'a> IntoIterator for &'a TupleDesc {
    type Item = &'a FieldDesc;
    type IntoIter = std::slice::Iter<'a, FieldDesc>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for TupleDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", field)?;
        }
        Ok(())
    }
}
