//! Heap page implementation using a fixed-width slotted layout.
//!
//! Every slot holds exactly one row of the table's schema, so the number of
//! slots is a function of the page size and the row width alone. Each slot
//! costs `tuple_size * 8` bits of body plus one occupancy bit of header:
//!
//! ```text
//! num_slots   = floor(page_size * 8 / (tuple_size * 8 + 1))
//! header_size = ceil(num_slots / 8)
//!
//! +-------------------------+ offset 0
//! | Header bitmap           | bit i = byte i/8, bit i%8 (LSB first); 1 = used
//! +-------------------------+ offset header_size
//! | Slot 0 (tuple_size B)   |
//! | Slot 1                  |
//! | ...                     |
//! | Slot num_slots-1        |
//! +-------------------------+
//! | Zero padding            |
//! +-------------------------+ offset page_size
//! ```
//!
//! A [`HeapPage`] is the decoded form of those bytes; [`HeapPage::page_data`]
//! encodes it back.

use std::fmt;
use std::sync::Arc;

use bytes::BufMut;

use crate::storage::PageId;
use crate::tuple::{Tuple, TupleDesc};
use crate::tx::TransactionId;

use super::error::HeapError;

/// Slot index within a page.
pub type SlotId = usize;

/// Global identifier for a record (page + slot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    /// Page containing the record.
    pub page_id: PageId,
    /// Slot within the page.
    pub slot_id: SlotId,
}

impl RecordId {
    /// Creates a new record identifier.
    pub fn new(page_id: PageId, slot_id: SlotId) -> Self {
        Self { page_id, slot_id }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.page_id, self.slot_id)
    }
}

/// Returns how many rows of `tuple_size` bytes fit in a page, counting one
/// header bit per slot.
pub const fn slots_per_page(page_size: usize, tuple_size: usize) -> usize {
    (page_size * 8) / (tuple_size * 8 + 1)
}

/// Returns the header bitmap size in bytes for `num_slots` slots.
pub const fn header_size(num_slots: usize) -> usize {
    num_slots.div_ceil(8)
}

/// A decoded heap page.
///
/// Holds the occupancy bitmap and the decoded tuple of every used slot. The
/// page does no locking of its own; callers mutate it only while holding
/// write access from the buffer pool.
#[derive(Debug, Clone)]
pub struct HeapPage {
    page_id: PageId,
    desc: Arc<TupleDesc>,
    page_size: usize,
    header: Vec<u8>,
    slots: Vec<Option<Tuple>>,
    dirtied_by: Option<TransactionId>,
}

impl HeapPage {
    /// Creates a page with every slot free.
    pub fn empty(page_id: PageId, desc: Arc<TupleDesc>, page_size: usize) -> Self {
        let num_slots = slots_per_page(page_size, desc.size());
        Self {
            page_id,
            desc,
            page_size,
            header: vec![0u8; header_size(num_slots)],
            slots: vec![None; num_slots],
            dirtied_by: None,
        }
    }

    /// Returns the on-disk image of an empty page.
    pub fn empty_page_data(page_size: usize) -> Vec<u8> {
        vec![0u8; page_size]
    }

    /// Decodes a page from its on-disk bytes.
    ///
    /// The page size is taken from `data.len()`. Every used slot is decoded
    /// against `desc` and gets the record id `(page_id, slot)`.
    ///
    /// # Errors
    ///
    /// Returns `HeapError::Serialization` if a used slot holds bytes that do
    /// not decode as a row of `desc`.
    pub fn from_bytes(
        page_id: PageId,
        desc: Arc<TupleDesc>,
        data: &[u8],
    ) -> Result<Self, HeapError> {
        let page_size = data.len();
        let tuple_size = desc.size();
        let num_slots = slots_per_page(page_size, tuple_size);
        let header_len = header_size(num_slots);

        let mut page = Self {
            page_id,
            page_size,
            header: data[..header_len].to_vec(),
            slots: vec![None; num_slots],
            dirtied_by: None,
            desc,
        };

        for slot_id in 0..num_slots {
            if !page.is_slot_used(slot_id) {
                continue;
            }
            let start = header_len + slot_id * tuple_size;
            let mut src = &data[start..start + tuple_size];
            let mut tuple = Tuple::deserialize(&page.desc, &mut src)?;
            tuple.set_record_id(Some(RecordId::new(page_id, slot_id)));
            page.slots[slot_id] = Some(tuple);
        }

        Ok(page)
    }

    /// Returns this page's id.
    pub fn id(&self) -> PageId {
        self.page_id
    }

    /// Returns the schema of the rows on this page.
    pub fn tuple_desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    /// Returns the page size in bytes.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns the number of slots on this page.
    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    /// Returns the header bitmap size in bytes.
    pub fn header_size(&self) -> usize {
        self.header.len()
    }

    /// Returns the number of free slots.
    pub fn num_empty_slots(&self) -> usize {
        (0..self.num_slots())
            .filter(|&slot_id| !self.is_slot_used(slot_id))
            .count()
    }

    /// Returns true if `slot_id` holds a row. Out-of-range slots are unused.
    pub fn is_slot_used(&self, slot_id: SlotId) -> bool {
        slot_id < self.num_slots() && self.header[slot_id / 8] & (1 << (slot_id % 8)) != 0
    }

    fn set_slot_used(&mut self, slot_id: SlotId, used: bool) {
        let mask = 1u8 << (slot_id % 8);
        if used {
            self.header[slot_id / 8] |= mask;
        } else {
            self.header[slot_id / 8] &= !mask;
        }
    }

    /// Returns the row in `slot_id`, if the slot is used.
    pub fn tuple(&self, slot_id: SlotId) -> Option<&Tuple> {
        self.slots.get(slot_id).and_then(Option::as_ref)
    }

    /// Returns an iterator over the rows on this page in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Tuple> {
        self.slots.iter().flatten()
    }

    /// Inserts `tuple` into the lowest free slot and returns its record id.
    ///
    /// On success the tuple's record id is set as well.
    ///
    /// # Errors
    ///
    /// - `HeapError::SchemaMismatch` if the tuple's schema differs from the page's
    /// - `HeapError::PageFull` if no slot is free
    /// - `HeapError::Serialization` if the tuple cannot be encoded
    pub fn insert_tuple(&mut self, tuple: &mut Tuple) -> Result<RecordId, HeapError> {
        if **tuple.tuple_desc() != *self.desc {
            return Err(HeapError::SchemaMismatch {
                expected: self.desc.to_string(),
                actual: tuple.tuple_desc().to_string(),
            });
        }

        let slot_id = (0..self.num_slots())
            .find(|&slot_id| !self.is_slot_used(slot_id))
            .ok_or(HeapError::PageFull(self.page_id))?;

        // Catch encoding errors before the slot is claimed.
        let mut scratch = Vec::with_capacity(self.desc.size());
        tuple.serialize(&mut scratch)?;

        let record_id = RecordId::new(self.page_id, slot_id);
        let mut stored = tuple.clone();
        stored.reset_tuple_desc(Arc::clone(&self.desc));
        stored.set_record_id(Some(record_id));

        self.slots[slot_id] = Some(stored);
        self.set_slot_used(slot_id, true);
        tuple.set_record_id(Some(record_id));

        Ok(record_id)
    }

    /// Deletes the row addressed by the tuple's record id and clears that id.
    ///
    /// Only the occupancy bit matters; the slot's old bytes are not part of
    /// the page any more.
    ///
    /// # Errors
    ///
    /// - `HeapError::MissingRecordId` if the tuple has no record id
    /// - `HeapError::InvalidRecordId` if the id addresses another page or a
    ///   free slot
    pub fn delete_tuple(&mut self, tuple: &mut Tuple) -> Result<(), HeapError> {
        let record_id = tuple.record_id().ok_or(HeapError::MissingRecordId)?;
        if record_id.page_id != self.page_id || !self.is_slot_used(record_id.slot_id) {
            return Err(HeapError::InvalidRecordId(record_id));
        }

        self.set_slot_used(record_id.slot_id, false);
        self.slots[record_id.slot_id] = None;
        tuple.set_record_id(None);

        Ok(())
    }

    /// Encodes this page into exactly `page_size` bytes.
    pub fn page_data(&self) -> Result<Vec<u8>, HeapError> {
        let tuple_size = self.desc.size();
        let mut buf = Vec::with_capacity(self.page_size);
        buf.put_slice(&self.header);
        for slot in &self.slots {
            match slot {
                Some(tuple) => tuple.serialize(&mut buf)?,
                None => buf.put_bytes(0, tuple_size),
            }
        }
        buf.resize(self.page_size, 0);
        Ok(buf)
    }

    /// Marks the page dirty (modified by `txn`) or clean.
    pub fn mark_dirty(&mut self, dirty: bool, txn: TransactionId) {
        self.dirtied_by = dirty.then_some(txn);
    }

    /// Returns the transaction that last dirtied the page, or `None` if the
    /// page is clean.
    pub fn is_dirty(&self) -> Option<TransactionId> {
        self.dirtied_by
    }
}
