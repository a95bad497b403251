//! Row data model: schemas and tuples.
//!
//! - [`TupleDesc`]: ordered, typed, optionally named schema of a table
//! - [`Tuple`]: one row of [`Value`](crate::datum::Value)s bound to a schema
//!
//! A [`TupleDesc`] is created once per table and shared through `Arc` by every
//! tuple and page of that table. Its byte width ([`TupleDesc::size`]) is the
//! fixed slot width used by heap pages.

mod desc;
mod error;
mod record;

pub use desc::{FieldDesc, TupleDesc};
pub use error::TupleError;
pub use record::Tuple;
