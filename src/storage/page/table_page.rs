use byteorder::{ByteOrder, LittleEndian};

use crate::common::types::{Lsn, PageId, Rid, SlotNum, INVALID_PAGE_ID, PAGE_SIZE};
use crate::storage::page::Page;

// Header layout, all fields little-endian i32/u32:
// | page_id | lsn | prev_page_id | next_page_id | free_space_pointer | tuple_count |
const OFFSET_PREV_PAGE_ID: usize = 8;
const OFFSET_NEXT_PAGE_ID: usize = 12;
const OFFSET_FREE_SPACE_PTR: usize = 16;
const OFFSET_TUPLE_COUNT: usize = 20;
const HEADER_SIZE: usize = 24;

const SLOT_SIZE: usize = 8;
/// High bit of the stored tuple size marks a tuple as logically deleted
const DELETE_MASK: u32 = 1 << 31;

/// Slotted table page: slot array grows up from the header, tuple bytes grow
/// down from the end of the page. Slots are never compacted, so a RID stays
/// valid for the lifetime of its page.
pub struct TablePage<'a> {
    page: &'a mut Page,
}

impl<'a> TablePage<'a> {
    pub fn new(page: &'a mut Page) -> Self {
        Self { page }
    }

    /// Format a fresh page and link it behind `prev_page_id`
    pub fn init(&mut self, page_id: PageId, prev_page_id: PageId) {
        self.page.data.fill(0);
        self.page.page_id = page_id;
        LittleEndian::write_i32(&mut self.page.data[0..4], page_id);
        self.set_lsn(crate::common::types::INVALID_LSN);
        self.set_prev_page_id(prev_page_id);
        self.set_next_page_id(INVALID_PAGE_ID);
        self.set_free_space_pointer(PAGE_SIZE as u32);
        self.set_tuple_count(0);
    }

    pub fn page_id(&self) -> PageId {
        LittleEndian::read_i32(&self.page.data[0..4])
    }

    pub fn lsn(&self) -> Lsn {
        self.page.lsn()
    }

    pub fn set_lsn(&mut self, lsn: Lsn) {
        self.page.set_lsn(lsn);
    }

    pub fn prev_page_id(&self) -> PageId {
        LittleEndian::read_i32(&self.page.data[OFFSET_PREV_PAGE_ID..OFFSET_PREV_PAGE_ID + 4])
    }

    pub fn set_prev_page_id(&mut self, page_id: PageId) {
        LittleEndian::write_i32(
            &mut self.page.data[OFFSET_PREV_PAGE_ID..OFFSET_PREV_PAGE_ID + 4],
            page_id,
        );
    }

    pub fn next_page_id(&self) -> PageId {
        LittleEndian::read_i32(&self.page.data[OFFSET_NEXT_PAGE_ID..OFFSET_NEXT_PAGE_ID + 4])
    }

    pub fn set_next_page_id(&mut self, page_id: PageId) {
        LittleEndian::write_i32(
            &mut self.page.data[OFFSET_NEXT_PAGE_ID..OFFSET_NEXT_PAGE_ID + 4],
            page_id,
        );
    }

    pub fn tuple_count(&self) -> u32 {
        LittleEndian::read_u32(&self.page.data[OFFSET_TUPLE_COUNT..OFFSET_TUPLE_COUNT + 4])
    }

    fn set_tuple_count(&mut self, count: u32) {
        LittleEndian::write_u32(
            &mut self.page.data[OFFSET_TUPLE_COUNT..OFFSET_TUPLE_COUNT + 4],
            count,
        );
    }

    fn free_space_pointer(&self) -> u32 {
        LittleEndian::read_u32(&self.page.data[OFFSET_FREE_SPACE_PTR..OFFSET_FREE_SPACE_PTR + 4])
    }

    fn set_free_space_pointer(&mut self, pointer: u32) {
        LittleEndian::write_u32(
            &mut self.page.data[OFFSET_FREE_SPACE_PTR..OFFSET_FREE_SPACE_PTR + 4],
            pointer,
        );
    }

    fn slot_offset(slot: SlotNum) -> usize {
        HEADER_SIZE + slot as usize * SLOT_SIZE
    }

    fn slot(&self, slot: SlotNum) -> (u32, u32) {
        let pos = Self::slot_offset(slot);
        let offset = LittleEndian::read_u32(&self.page.data[pos..pos + 4]);
        let size = LittleEndian::read_u32(&self.page.data[pos + 4..pos + 8]);
        (offset, size)
    }

    fn set_slot(&mut self, slot: SlotNum, offset: u32, size: u32) {
        let pos = Self::slot_offset(slot);
        LittleEndian::write_u32(&mut self.page.data[pos..pos + 4], offset);
        LittleEndian::write_u32(&mut self.page.data[pos + 4..pos + 8], size);
    }

    fn remaining_space(&self) -> usize {
        let slot_end = Self::slot_offset(self.tuple_count());
        self.free_space_pointer() as usize - slot_end
    }

    /// Append a tuple, returning its RID, or None when the page is full
    pub fn insert_tuple(&mut self, data: &[u8]) -> Option<Rid> {
        if data.is_empty() || data.len() + SLOT_SIZE > self.remaining_space() {
            return None;
        }

        let slot = self.tuple_count();
        let new_pointer = self.free_space_pointer() - data.len() as u32;
        self.page.data[new_pointer as usize..new_pointer as usize + data.len()]
            .copy_from_slice(data);
        self.set_free_space_pointer(new_pointer);
        self.set_slot(slot, new_pointer, data.len() as u32);
        self.set_tuple_count(slot + 1);

        Some(Rid::new(self.page_id(), slot))
    }

    /// Read a live tuple; None for out-of-range, dead, or mark-deleted slots
    pub fn get_tuple(&self, rid: Rid) -> Option<Vec<u8>> {
        if rid.slot_num >= self.tuple_count() {
            return None;
        }
        let (offset, size) = self.slot(rid.slot_num);
        if size == 0 || size & DELETE_MASK != 0 {
            return None;
        }
        Some(self.page.data[offset as usize..offset as usize + size as usize].to_vec())
    }

    /// First phase of a two-phase delete: flag the slot, keep the bytes
    pub fn mark_delete(&mut self, rid: Rid) -> bool {
        if rid.slot_num >= self.tuple_count() {
            return false;
        }
        let (offset, size) = self.slot(rid.slot_num);
        if size == 0 || size & DELETE_MASK != 0 {
            return false;
        }
        self.set_slot(rid.slot_num, offset, size | DELETE_MASK);
        true
    }

    /// Undo a mark-delete
    pub fn rollback_delete(&mut self, rid: Rid) -> bool {
        if rid.slot_num >= self.tuple_count() {
            return false;
        }
        let (offset, size) = self.slot(rid.slot_num);
        if size & DELETE_MASK == 0 {
            return false;
        }
        self.set_slot(rid.slot_num, offset, size & !DELETE_MASK);
        true
    }

    /// Second phase of delete: kill the slot for good. Space is not
    /// compacted.
    pub fn apply_delete(&mut self, rid: Rid) -> bool {
        if rid.slot_num >= self.tuple_count() {
            return false;
        }
        let (_, size) = self.slot(rid.slot_num);
        if size == 0 {
            return false;
        }
        self.set_slot(rid.slot_num, 0, 0);
        true
    }

    /// Replace a tuple in place when the new image fits in the old slot,
    /// appending a fresh copy otherwise. The RID is preserved.
    pub fn update_tuple(&mut self, rid: Rid, data: &[u8]) -> bool {
        if rid.slot_num >= self.tuple_count() || data.is_empty() {
            return false;
        }
        let (offset, size) = self.slot(rid.slot_num);
        if size == 0 || size & DELETE_MASK != 0 {
            return false;
        }

        let old_len = (size & !DELETE_MASK) as usize;
        if data.len() <= old_len {
            self.page.data[offset as usize..offset as usize + data.len()].copy_from_slice(data);
            self.set_slot(rid.slot_num, offset, data.len() as u32);
            return true;
        }

        if data.len() > self.remaining_space() {
            return false;
        }
        let new_pointer = self.free_space_pointer() - data.len() as u32;
        self.page.data[new_pointer as usize..new_pointer as usize + data.len()]
            .copy_from_slice(data);
        self.set_free_space_pointer(new_pointer);
        self.set_slot(rid.slot_num, new_pointer, data.len() as u32);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_page(page_id: PageId) -> Page {
        let mut page = Page::new(page_id);
        TablePage::new(&mut page).init(page_id, INVALID_PAGE_ID);
        page
    }

    #[test]
    fn test_insert_and_get() {
        let mut page = fresh_page(1);
        let mut tp = TablePage::new(&mut page);

        let rid = tp.insert_tuple(b"first").unwrap();
        assert_eq!(rid, Rid::new(1, 0));
        let rid2 = tp.insert_tuple(b"second").unwrap();
        assert_eq!(rid2, Rid::new(1, 1));

        assert_eq!(tp.get_tuple(rid).unwrap(), b"first");
        assert_eq!(tp.get_tuple(rid2).unwrap(), b"second");
        assert_eq!(tp.get_tuple(Rid::new(1, 2)), None);
    }

    #[test]
    fn test_two_phase_delete() {
        let mut page = fresh_page(1);
        let mut tp = TablePage::new(&mut page);
        let rid = tp.insert_tuple(b"doomed").unwrap();

        assert!(tp.mark_delete(rid));
        assert_eq!(tp.get_tuple(rid), None);
        assert!(tp.rollback_delete(rid));
        assert_eq!(tp.get_tuple(rid).unwrap(), b"doomed");

        assert!(tp.mark_delete(rid));
        assert!(tp.apply_delete(rid));
        assert!(!tp.rollback_delete(rid));
        assert_eq!(tp.get_tuple(rid), None);
    }

    #[test]
    fn test_update_keeps_rid() {
        let mut page = fresh_page(2);
        let mut tp = TablePage::new(&mut page);
        let rid = tp.insert_tuple(b"some data here").unwrap();

        assert!(tp.update_tuple(rid, b"short"));
        assert_eq!(tp.get_tuple(rid).unwrap(), b"short");

        assert!(tp.update_tuple(rid, b"a rather longer replacement image"));
        assert_eq!(tp.get_tuple(rid).unwrap(), b"a rather longer replacement image");
    }

    #[test]
    fn test_page_fills_up() {
        let mut page = fresh_page(3);
        let mut tp = TablePage::new(&mut page);
        let blob = vec![0xAAu8; 512];
        let mut inserted = 0;
        while tp.insert_tuple(&blob).is_some() {
            inserted += 1;
        }
        // (512 + 8) bytes per tuple against ~4KB of usable space
        assert!(inserted >= 6 && inserted < 8, "inserted {}", inserted);
    }

    #[test]
    fn test_sibling_links() {
        let mut page = fresh_page(5);
        let mut tp = TablePage::new(&mut page);
        tp.set_next_page_id(6);
        tp.set_prev_page_id(4);
        assert_eq!(tp.next_page_id(), 6);
        assert_eq!(tp.prev_page_id(), 4);
        assert_eq!(tp.page_id(), 5);
    }
}
