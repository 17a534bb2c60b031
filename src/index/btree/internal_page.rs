use std::cmp::Ordering;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use byteorder::{ByteOrder, LittleEndian};

use crate::common::types::{PageId, PAGE_SIZE};
use crate::index::btree::key::{KeyComparator, StorageKey};
use crate::index::btree::node::{self, PageType, COMMON_HEADER_SIZE};

pub const INTERNAL_HEADER_SIZE: usize = COMMON_HEADER_SIZE;

/// View over the bytes of an internal node. Entries are (key, child page id)
/// pairs; the first key is a sentinel and never compared, so an internal
/// node of size n separates n children with n-1 keys. As with leaves, one
/// entry of physical headroom beyond `max_size` absorbs the pre-split
/// overflow.
pub struct InternalPage<B, K> {
    data: B,
    _marker: PhantomData<K>,
}

impl<B, K> InternalPage<B, K>
where
    B: Deref<Target = [u8; PAGE_SIZE]>,
    K: StorageKey,
{
    pub fn new(data: B) -> Self {
        Self {
            data,
            _marker: PhantomData,
        }
    }

    const fn entry_size() -> usize {
        K::ENCODED_SIZE + 4
    }

    pub fn capacity() -> usize {
        (PAGE_SIZE - INTERNAL_HEADER_SIZE) / Self::entry_size() - 1
    }

    fn entry_offset(index: usize) -> usize {
        INTERNAL_HEADER_SIZE + index * Self::entry_size()
    }

    pub fn size(&self) -> usize {
        node::size(&self.data[..])
    }

    pub fn max_size(&self) -> usize {
        node::max_size(&self.data[..])
    }

    pub fn page_id(&self) -> PageId {
        node::node_page_id(&self.data[..])
    }

    pub fn parent_page_id(&self) -> PageId {
        node::parent_page_id(&self.data[..])
    }

    pub fn key_at(&self, index: usize) -> K {
        debug_assert!(index < self.size());
        K::read_from(&self.data[Self::entry_offset(index)..])
    }

    pub fn value_at(&self, index: usize) -> PageId {
        debug_assert!(index < self.size());
        let pos = Self::entry_offset(index) + K::ENCODED_SIZE;
        LittleEndian::read_i32(&self.data[pos..pos + 4])
    }

    /// Index of the entry whose value equals `page_id`, if any
    pub fn value_index(&self, page_id: PageId) -> Option<usize> {
        (0..self.size()).find(|&i| self.value_at(i) == page_id)
    }

    /// Child to descend into for `key`. Binary search starts at index 1
    /// because the first key slot is a sentinel.
    pub fn lookup<C: KeyComparator<K>>(&self, key: &K, comparator: &C) -> PageId {
        let mut left = 1isize;
        let mut right = self.size() as isize - 1;
        while left <= right {
            let mid = left + (right - left) / 2;
            match comparator.compare(&self.key_at(mid as usize), key) {
                Ordering::Equal => return self.value_at(mid as usize),
                Ordering::Less => left = mid + 1,
                Ordering::Greater => right = mid - 1,
            }
        }
        self.value_at((left - 1) as usize)
    }
}

impl<B, K> InternalPage<B, K>
where
    B: DerefMut<Target = [u8; PAGE_SIZE]>,
    K: StorageKey,
{
    pub fn init(&mut self, page_id: PageId, parent_id: PageId, max_size: usize) {
        debug_assert!(max_size <= Self::capacity());
        self.data.fill(0);
        node::set_node_page_id(&mut self.data[..], page_id);
        node::set_page_type(&mut self.data[..], PageType::Internal);
        node::set_size(&mut self.data[..], 0);
        node::set_max_size(&mut self.data[..], max_size);
        node::set_parent_page_id(&mut self.data[..], parent_id);
    }

    pub fn set_parent_page_id(&mut self, parent: PageId) {
        node::set_parent_page_id(&mut self.data[..], parent);
    }

    pub fn set_key_at(&mut self, index: usize, key: &K) {
        debug_assert!(index < self.size());
        key.write_to(&mut self.data[Self::entry_offset(index)..]);
    }

    fn set_value_at(&mut self, index: usize, page_id: PageId) {
        let pos = Self::entry_offset(index) + K::ENCODED_SIZE;
        LittleEndian::write_i32(&mut self.data[pos..pos + 4], page_id);
    }

    fn set_entry(&mut self, index: usize, key: &K, page_id: PageId) {
        key.write_to(&mut self.data[Self::entry_offset(index)..]);
        self.set_value_at(index, page_id);
    }

    fn shift_entries(&mut self, from: usize, to: usize, count: usize) {
        if count == 0 {
            return;
        }
        let src = Self::entry_offset(from);
        let dst = Self::entry_offset(to);
        let len = count * Self::entry_size();
        self.data.copy_within(src..src + len, dst);
    }

    /// Install the two children produced by a root split
    pub fn populate_new_root(&mut self, old_child: PageId, key: &K, new_child: PageId) {
        node::set_size(&mut self.data[..], 2);
        self.set_value_at(0, old_child);
        self.set_entry(1, key, new_child);
    }

    /// Insert (key, new_child) immediately after the entry whose value is
    /// `old_child`. Returns the size after insertion.
    pub fn insert_node_after(&mut self, old_child: PageId, key: &K, new_child: PageId) -> usize {
        let size = self.size();
        let target = self
            .value_index(old_child)
            .expect("split sibling must follow an existing child");
        self.shift_entries(target + 1, target + 2, size - target - 1);
        node::set_size(&mut self.data[..], size + 1);
        self.set_entry(target + 1, key, new_child);
        size + 1
    }

    /// Remove the entry at `index`
    pub fn remove(&mut self, index: usize) {
        let size = self.size();
        debug_assert!(index < size);
        self.shift_entries(index + 1, index, size - index - 1);
        node::set_size(&mut self.data[..], size - 1);
    }

    /// Split support: move the upper half (its first key becoming the
    /// separator pushed into the parent) to `recipient`. Returns the moved
    /// child page ids so the caller can re-parent them.
    pub fn move_half_to<B2>(&mut self, recipient: &mut InternalPage<B2, K>) -> Vec<PageId>
    where
        B2: DerefMut<Target = [u8; PAGE_SIZE]>,
    {
        let size = self.size();
        let start = (size - 1) / 2 + 1;
        let moved = size - start;

        let src = Self::entry_offset(start);
        let dst = Self::entry_offset(0);
        let len = moved * Self::entry_size();
        recipient.data[dst..dst + len].copy_from_slice(&self.data[src..src + len]);

        node::set_size(&mut self.data[..], start);
        node::set_size(&mut recipient.data[..], moved);

        (0..moved).map(|i| recipient.value_at(i)).collect()
    }

    /// Merge support: pull the separator `middle_key` down into the first
    /// key slot and move every entry into the left sibling `recipient`.
    /// Returns the moved child page ids.
    pub fn move_all_to<B2>(
        &mut self,
        recipient: &mut InternalPage<B2, K>,
        middle_key: &K,
    ) -> Vec<PageId>
    where
        B2: DerefMut<Target = [u8; PAGE_SIZE]>,
    {
        let size = self.size();
        let recipient_size = recipient.size();
        debug_assert!(size + recipient_size <= recipient.max_size());
        self.set_key_at(0, middle_key);

        let src = Self::entry_offset(0);
        let dst = Self::entry_offset(recipient_size);
        let len = size * Self::entry_size();
        recipient.data[dst..dst + len].copy_from_slice(&self.data[src..src + len]);

        node::set_size(&mut recipient.data[..], recipient_size + size);
        node::set_size(&mut self.data[..], 0);

        (0..size).map(|i| recipient.value_at(recipient_size + i)).collect()
    }

    /// Redistribution with a right-hand underflowing sibling: rotate this
    /// node's first child through the parent separator onto the end of
    /// `recipient`. Returns (new separator for the parent, moved child).
    pub fn move_first_to_end_of<B2>(
        &mut self,
        recipient: &mut InternalPage<B2, K>,
        middle_key: &K,
    ) -> (K, PageId)
    where
        B2: DerefMut<Target = [u8; PAGE_SIZE]>,
    {
        let new_middle = self.key_at(1);
        let moved_child = self.value_at(0);
        let second_child = self.value_at(1);
        self.set_value_at(0, second_child);
        self.remove(1);

        let recipient_size = recipient.size();
        node::set_size(&mut recipient.data[..], recipient_size + 1);
        recipient.set_entry(recipient_size, middle_key, moved_child);

        (new_middle, moved_child)
    }

    /// Redistribution with a left-hand underflowing sibling: rotate this
    /// node's last child through the parent separator onto the front of
    /// `recipient`. Returns (new separator for the parent, moved child).
    pub fn move_last_to_front_of<B2>(
        &mut self,
        recipient: &mut InternalPage<B2, K>,
        middle_key: &K,
    ) -> (K, PageId)
    where
        B2: DerefMut<Target = [u8; PAGE_SIZE]>,
    {
        let size = self.size();
        let new_middle = self.key_at(size - 1);
        let moved_child = self.value_at(size - 1);
        node::set_size(&mut self.data[..], size - 1);

        let recipient_size = recipient.size();
        let old_first_child = recipient.value_at(0);
        recipient.shift_entries(1, 2, recipient_size - 1);
        node::set_size(&mut recipient.data[..], recipient_size + 1);
        recipient.set_entry(1, middle_key, old_first_child);
        recipient.set_value_at(0, moved_child);

        (new_middle, moved_child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::INVALID_PAGE_ID;
    use crate::index::btree::key::OrdComparator;

    fn make_internal(page_id: PageId, max_size: usize) -> Box<[u8; PAGE_SIZE]> {
        let mut data = Box::new([0u8; PAGE_SIZE]);
        InternalPage::<_, i64>::new(&mut *data).init(page_id, INVALID_PAGE_ID, max_size);
        data
    }

    #[test]
    fn test_populate_and_lookup() {
        let cmp = OrdComparator::<i64>::new();
        let mut data = make_internal(10, 4);
        let mut page = InternalPage::<_, i64>::new(&mut *data);
        page.populate_new_root(1, &5, 2);
        // keys < 5 go left, >= 5 go right
        assert_eq!(page.lookup(&3, &cmp), 1);
        assert_eq!(page.lookup(&5, &cmp), 2);
        assert_eq!(page.lookup(&9, &cmp), 2);
    }

    #[test]
    fn test_insert_node_after() {
        let cmp = OrdComparator::<i64>::new();
        let mut data = make_internal(10, 4);
        let mut page = InternalPage::<_, i64>::new(&mut *data);
        page.populate_new_root(1, &10, 2);
        page.insert_node_after(2, &20, 3);
        assert_eq!(page.size(), 3);
        assert_eq!(page.lookup(&15, &cmp), 2);
        assert_eq!(page.lookup(&25, &cmp), 3);
        assert_eq!(page.value_index(3), Some(2));
    }

    #[test]
    fn test_move_half_reports_children() {
        let mut data = make_internal(10, 4);
        let mut page = InternalPage::<_, i64>::new(&mut *data);
        page.populate_new_root(1, &10, 2);
        page.insert_node_after(2, &20, 3);
        page.insert_node_after(3, &30, 4);
        page.insert_node_after(4, &40, 5);

        let mut sibling_data = make_internal(11, 4);
        let mut sibling = InternalPage::<_, i64>::new(&mut *sibling_data);
        let moved = page.move_half_to(&mut sibling);

        assert_eq!(page.size(), 3);
        assert_eq!(sibling.size(), 2);
        assert_eq!(moved, vec![4, 5]);
        // first key of the recipient is the separator to push up
        assert_eq!(sibling.key_at(0), 30);
    }
}
