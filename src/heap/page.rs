//! Heap page implementation using a fixed-width slotted layout.
//!
//! A heap page stores tuples of one schema in equal-width slots, tracked by
//! an occupancy bitmap at the front of the page:
//!
//! ```text
//! +--------------------------+ offset 0
//! | Occupancy Bitmap         |  ceil(n/8) bytes, bit i = slot i, 1 = used
//! +--------------------------+ offset ceil(n/8)
//! | Slot 0 (tuple_size B)    |
//! | Slot 1 (tuple_size B)    |
//! | ...                      |
//! | Slot n-1 (tuple_size B)  |
//! +--------------------------+
//! | Padding (< 1 slot)       |
//! +--------------------------+ offset 4096
//! ```
//!
//! The slot count n is the largest value satisfying
//! `n * (tuple_size * 8 + 1) <= PAGE_SIZE * 8`: each slot costs its tuple
//! bytes plus one bitmap bit. Bits are assigned LSB-first within each bitmap
//! byte, so slot i lives at bit `i % 8` of byte `i / 8`.
//!
//! A zeroed buffer is a valid empty page; no separate initialization is
//! required for freshly allocated pages.

use super::error::HeapError;
use crate::storage::PAGE_SIZE;
use crate::tuple::{Schema, SlotId, Tuple};

/// Largest serialized tuple size that still leaves room for its bitmap bit.
pub const MAX_TUPLE_SIZE: usize = PAGE_SIZE - 1;

/// Number of tuple slots a page holds for the given schema.
pub fn page_capacity(schema: &Schema) -> u16 {
    (PAGE_SIZE * 8 / (schema.tuple_size() * 8 + 1)) as u16
}

/// A view of one heap page's bytes.
///
/// The type parameter `T` allows this to wrap:
/// - `&[u8]` - read-only view
/// - `&mut [u8]` - mutable view
/// - Any type implementing `AsRef<[u8]>` (and optionally `AsMut<[u8]>`)
///
/// The view computes its layout from the schema at construction; it carries
/// no header bytes of its own beyond the occupancy bitmap.
pub struct HeapPage<T> {
    data: T,
    tuple_size: usize,
    slot_count: u16,
    bitmap_size: usize,
}

// Read-only methods (available for any T: AsRef<[u8]>)
impl<T: AsRef<[u8]>> HeapPage<T> {
    /// Creates a page view over the given data.
    ///
    /// # Panics
    ///
    /// Panics if `data.as_ref().len() != PAGE_SIZE`.
    pub fn new(data: T, schema: &Schema) -> Self {
        assert_eq!(
            data.as_ref().len(),
            PAGE_SIZE,
            "HeapPage requires exactly {} bytes, got {}",
            PAGE_SIZE,
            data.as_ref().len()
        );
        let slot_count = page_capacity(schema);
        Self {
            data,
            tuple_size: schema.tuple_size(),
            slot_count,
            bitmap_size: (slot_count as usize).div_ceil(8),
        }
    }

    fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    fn slot_offset(&self, slot: SlotId) -> usize {
        self.bitmap_size + slot as usize * self.tuple_size
    }

    /// Returns the number of slots in this page.
    pub fn slot_count(&self) -> u16 {
        self.slot_count
    }

    /// Returns the fixed slot width in bytes.
    pub fn tuple_size(&self) -> usize {
        self.tuple_size
    }

    /// Returns true if the slot holds a tuple.
    ///
    /// Out-of-range slots report false.
    pub fn is_slot_used(&self, slot: SlotId) -> bool {
        if slot >= self.slot_count {
            return false;
        }
        let i = slot as usize;
        self.data()[i / 8] & (1 << (i % 8)) != 0
    }

    /// Returns the number of occupied slots.
    pub fn used_slots(&self) -> u16 {
        (0..self.slot_count).filter(|&s| self.is_slot_used(s)).count() as u16
    }

    /// Returns the number of vacant slots.
    pub fn free_slots(&self) -> u16 {
        self.slot_count - self.used_slots()
    }

    /// Returns the lowest-numbered vacant slot, if any.
    pub fn first_free_slot(&self) -> Option<SlotId> {
        (0..self.slot_count).find(|&s| !self.is_slot_used(s))
    }

    /// Returns the raw bytes of the tuple in `slot`.
    ///
    /// Returns `None` if the slot is out of range or vacant.
    pub fn tuple_bytes(&self, slot: SlotId) -> Option<&[u8]> {
        if !self.is_slot_used(slot) {
            return None;
        }
        let start = self.slot_offset(slot);
        Some(&self.data()[start..start + self.tuple_size])
    }

    /// Deserializes the tuple in `slot`.
    ///
    /// The returned tuple carries no record id; the caller knows the page
    /// and attaches one.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot is out of range, vacant, or holds
    /// malformed bytes.
    pub fn read_tuple(&self, slot: SlotId, schema: &Schema) -> Result<Tuple, HeapError> {
        if slot >= self.slot_count {
            return Err(HeapError::SlotOutOfRange {
                slot,
                slot_count: self.slot_count,
            });
        }
        let Some(bytes) = self.tuple_bytes(slot) else {
            return Err(HeapError::SlotVacant(slot));
        };
        Ok(Tuple::deserialize(bytes, schema)?)
    }

    /// Returns an iterator over all occupied slots in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &[u8])> {
        (0..self.slot_count).filter_map(move |slot| self.tuple_bytes(slot).map(|b| (slot, b)))
    }

    /// Returns the full page image.
    pub fn as_bytes(&self) -> &[u8] {
        self.data()
    }
}

// Mutable methods (available for T: AsRef<[u8]> + AsMut<[u8]>)
impl<T: AsRef<[u8]> + AsMut<[u8]>> HeapPage<T> {
    fn data_mut(&mut self) -> &mut [u8] {
        self.data.as_mut()
    }

    /// Resets this page to empty.
    ///
    /// Zeroes the whole page; a zeroed page has every slot vacant.
    pub fn init(&mut self) {
        self.data_mut().fill(0);
    }

    fn set_slot_used(&mut self, slot: SlotId, used: bool) {
        let i = slot as usize;
        if used {
            self.data_mut()[i / 8] |= 1 << (i % 8);
        } else {
            self.data_mut()[i / 8] &= !(1 << (i % 8));
        }
    }

    /// Stores serialized tuple bytes in the lowest-numbered vacant slot.
    ///
    /// # Errors
    ///
    /// Returns `HeapError::TupleSizeMismatch` if the bytes are not exactly
    /// one slot wide, or `HeapError::PageFull` if every slot is occupied.
    pub fn insert(&mut self, tuple_bytes: &[u8]) -> Result<SlotId, HeapError> {
        if tuple_bytes.len() != self.tuple_size {
            return Err(HeapError::TupleSizeMismatch {
                expected: self.tuple_size,
                actual: tuple_bytes.len(),
            });
        }
        let Some(slot) = self.first_free_slot() else {
            return Err(HeapError::PageFull {
                slots: self.slot_count,
            });
        };

        let start = self.slot_offset(slot);
        let end = start + self.tuple_size;
        self.data_mut()[start..end].copy_from_slice(tuple_bytes);
        self.set_slot_used(slot, true);
        Ok(slot)
    }

    /// Frees the given slot.
    ///
    /// Only the bitmap bit is cleared; the stale tuple bytes stay in place
    /// and are overwritten on reuse.
    ///
    /// # Errors
    ///
    /// Returns `HeapError::SlotOutOfRange` or `HeapError::SlotVacant`.
    pub fn delete(&mut self, slot: SlotId) -> Result<(), HeapError> {
        if slot >= self.slot_count {
            return Err(HeapError::SlotOutOfRange {
                slot,
                slot_count: self.slot_count,
            });
        }
        if !self.is_slot_used(slot) {
            return Err(HeapError::SlotVacant(slot));
        }
        self.set_slot_used(slot, false);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::{Type, Value};
    use crate::tuple::Column;

    fn sample_schema() -> Schema {
        Schema::new(vec![
            Column::new("id", Type::Int4),
            Column::new("active", Type::Bool),
        ])
    }

    fn tuple_bytes(schema: &Schema, id: i32, active: bool) -> Vec<u8> {
        let tuple = Tuple::new(vec![Value::Int32(id), Value::Boolean(active)]);
        let mut buf = vec![0u8; schema.tuple_size()];
        tuple.serialize(schema, &mut buf).unwrap();
        buf
    }

    #[test]
    fn test_capacity_math() {
        // tuple_size 6: floor(4096*8 / 49) = 668 slots, 84 bitmap bytes
        let schema = sample_schema();
        assert_eq!(schema.tuple_size(), 6);
        assert_eq!(page_capacity(&schema), 668);

        let page = HeapPage::new(vec![0u8; PAGE_SIZE], &schema);
        assert_eq!(page.slot_count(), 668);
        // bitmap + slots never overflow the page
        assert!(84 + 668 * 6 <= PAGE_SIZE);

        // tuple_size 9: floor(32768 / 73) = 448 slots
        let wide = Schema::new(vec![Column::new("n", Type::Int8)]);
        assert_eq!(page_capacity(&wide), 448);
    }

    #[test]
    fn test_zeroed_page_is_empty() {
        let schema = sample_schema();
        let page = HeapPage::new(vec![0u8; PAGE_SIZE], &schema);
        assert_eq!(page.used_slots(), 0);
        assert_eq!(page.free_slots(), page.slot_count());
        assert_eq!(page.first_free_slot(), Some(0));
        assert!(!page.is_slot_used(0));
        assert!(page.tuple_bytes(0).is_none());
        assert_eq!(page.iter().count(), 0);
    }

    #[test]
    fn test_insert_and_read() {
        let schema = sample_schema();
        let mut page = HeapPage::new(vec![0u8; PAGE_SIZE], &schema);

        let bytes = tuple_bytes(&schema, 42, true);
        let slot = page.insert(&bytes).unwrap();
        assert_eq!(slot, 0);
        assert!(page.is_slot_used(0));
        assert_eq!(page.used_slots(), 1);
        assert_eq!(page.tuple_bytes(0), Some(bytes.as_slice()));

        let tuple = page.read_tuple(0, &schema).unwrap();
        assert_eq!(tuple.values(), &[Value::Int32(42), Value::Boolean(true)]);
    }

    #[test]
    fn test_insert_fills_lowest_slot_first() {
        let schema = sample_schema();
        let mut page = HeapPage::new(vec![0u8; PAGE_SIZE], &schema);

        for i in 0..4 {
            let slot = page.insert(&tuple_bytes(&schema, i, false)).unwrap();
            assert_eq!(slot, i as SlotId);
        }

        page.delete(1).unwrap();
        assert_eq!(page.first_free_slot(), Some(1));

        // Freed slot is reused before any higher slot.
        let slot = page.insert(&tuple_bytes(&schema, 99, true)).unwrap();
        assert_eq!(slot, 1);
        let tuple = page.read_tuple(1, &schema).unwrap();
        assert_eq!(tuple.values()[0], Value::Int32(99));
    }

    #[test]
    fn test_insert_wrong_size() {
        let schema = sample_schema();
        let mut page = HeapPage::new(vec![0u8; PAGE_SIZE], &schema);
        assert!(matches!(
            page.insert(&[0u8; 3]),
            Err(HeapError::TupleSizeMismatch {
                expected: 6,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_page_full() {
        // Three text columns make slots wide enough to fill a page quickly:
        // tuple_size 391, capacity 10.
        let schema = Schema::new(vec![
            Column::new("a", Type::Text),
            Column::new("b", Type::Text),
            Column::new("c", Type::Text),
        ]);
        assert_eq!(page_capacity(&schema), 10);

        let mut page = HeapPage::new(vec![0u8; PAGE_SIZE], &schema);
        let tuple = Tuple::new(vec![
            Value::Text("a".to_string()),
            Value::Null,
            Value::Null,
        ]);
        let mut buf = vec![0u8; schema.tuple_size()];
        tuple.serialize(&schema, &mut buf).unwrap();

        for _ in 0..10 {
            page.insert(&buf).unwrap();
        }
        assert_eq!(page.free_slots(), 0);
        assert!(matches!(
            page.insert(&buf),
            Err(HeapError::PageFull { slots: 10 })
        ));
    }

    #[test]
    fn test_delete_errors() {
        let schema = sample_schema();
        let mut page = HeapPage::new(vec![0u8; PAGE_SIZE], &schema);

        assert!(matches!(page.delete(0), Err(HeapError::SlotVacant(0))));
        assert!(matches!(
            page.delete(page_capacity(&schema)),
            Err(HeapError::SlotOutOfRange { .. })
        ));

        let slot = page.insert(&tuple_bytes(&schema, 1, true)).unwrap();
        page.delete(slot).unwrap();
        assert!(matches!(page.delete(slot), Err(HeapError::SlotVacant(_))));
    }

    #[test]
    fn test_iter_skips_vacant_slots() {
        let schema = sample_schema();
        let mut page = HeapPage::new(vec![0u8; PAGE_SIZE], &schema);

        page.insert(&tuple_bytes(&schema, 0, false)).unwrap();
        let middle = page.insert(&tuple_bytes(&schema, 1, false)).unwrap();
        page.insert(&tuple_bytes(&schema, 2, false)).unwrap();
        page.delete(middle).unwrap();

        let slots: Vec<SlotId> = page.iter().map(|(slot, _)| slot).collect();
        assert_eq!(slots, vec![0, 2]);
    }

    #[test]
    fn test_read_only_view() {
        let schema = sample_schema();
        let mut data = vec![0u8; PAGE_SIZE];
        {
            let mut page = HeapPage::new(&mut data[..], &schema);
            page.insert(&tuple_bytes(&schema, 7, true)).unwrap();
        }

        let page = HeapPage::new(&data[..], &schema);
        assert_eq!(page.used_slots(), 1);
        let tuple = page.read_tuple(0, &schema).unwrap();
        assert_eq!(tuple.values()[0], Value::Int32(7));
    }

    #[test]
    fn test_init_clears_page() {
        let schema = sample_schema();
        let mut page = HeapPage::new(vec![0u8; PAGE_SIZE], &schema);
        page.insert(&tuple_bytes(&schema, 1, true)).unwrap();
        page.insert(&tuple_bytes(&schema, 2, true)).unwrap();

        page.init();
        assert_eq!(page.used_slots(), 0);
        assert!(page.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_delete_keeps_bytes_until_reuse() {
        let schema = sample_schema();
        let mut page = HeapPage::new(vec![0u8; PAGE_SIZE], &schema);
        let bytes = tuple_bytes(&schema, 5, true);
        let slot = page.insert(&bytes).unwrap();
        page.delete(slot).unwrap();

        // The bitmap is authoritative; stale bytes are invisible.
        assert!(page.tuple_bytes(slot).is_none());
        assert!(page.read_tuple(slot, &schema).is_err());
    }
}
