//! Heap-file storage layer.
//!
//! Tables are stored as unordered heap files of fixed-size slotted pages.
//! Every row of a table has the same fixed width, given by its
//! [`TupleDesc`](tuple::TupleDesc). Transactional access to pages goes
//! through a [`BufferPool`](buffer::BufferPool), which enforces page-level
//! locking; the heap layer itself keeps no page cache.
//!
//! - [`datum`]: column types and their fixed-width encoding
//! - [`tuple`]: row schemas and rows
//! - [`storage`]: page identity, configuration, raw I/O errors
//! - [`heap`]: slotted pages, heap files and cursors
//! - [`buffer`]: page cache and lock table
//! - [`catalog`]: table registry

pub mod buffer;
pub mod catalog;
pub mod datum;
pub mod heap;
pub mod storage;
pub mod tuple;
pub mod tx;
