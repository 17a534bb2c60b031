use std::marker::PhantomData;
use std::sync::Arc;

use crate::common::types::{Rid, INVALID_PAGE_ID};
use crate::index::btree::key::StorageKey;
use crate::index::btree::leaf_page::LeafPage;
use crate::index::btree::node;
use crate::storage::buffer::BufferPoolManager;
use crate::storage::page::PageReadGuard;

/// Forward scan over the linked leaves. Holds the read latch and a pin on
/// the current leaf; crossing to the next leaf latches it before the
/// current one is released. At the end the iterator owns nothing.
pub struct TreeIterator<K: StorageKey> {
    current: Option<(PageReadGuard, usize)>,
    buffer_pool: Arc<BufferPoolManager>,
    _marker: PhantomData<K>,
}

impl<K: StorageKey> TreeIterator<K> {
    pub(crate) fn new(
        current: Option<(PageReadGuard, usize)>,
        buffer_pool: Arc<BufferPoolManager>,
    ) -> Self {
        Self {
            current,
            buffer_pool,
            _marker: PhantomData,
        }
    }

    pub(crate) fn end(buffer_pool: Arc<BufferPoolManager>) -> Self {
        Self::new(None, buffer_pool)
    }

    pub fn is_end(&self) -> bool {
        self.current.is_none()
    }

    /// Step to the next leaf in the chain, read-latching it before the
    /// current leaf is unlatched and unpinned. Returns whether the
    /// iterator still holds a leaf.
    fn advance_leaf(&mut self, guard: PageReadGuard) -> bool {
        let next_id = LeafPage::<_, K>::new(&*guard.data).next_page_id();
        let page_id = guard.page_id;

        if next_id == INVALID_PAGE_ID {
            drop(guard);
            self.release_page(page_id);
            self.current = None;
            return false;
        }

        match self.buffer_pool.fetch_page(next_id) {
            Ok(next_page) => {
                let next_guard = next_page.read_arc();
                drop(guard);
                self.release_page(page_id);
                self.current = Some((next_guard, 0));
                true
            }
            Err(err) => {
                log::warn!("range scan stopped at page {}: {}", next_id, err);
                drop(guard);
                self.release_page(page_id);
                self.current = None;
                false
            }
        }
    }

    fn release_page(&self, page_id: crate::common::types::PageId) {
        if let Err(err) = self.buffer_pool.unpin_page(page_id, false) {
            log::warn!("failed to unpin leaf {} during scan: {}", page_id, err);
        }
    }
}

impl<K: StorageKey> Iterator for TreeIterator<K> {
    type Item = (K, Rid);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (guard, index) = self.current.take()?;
            let size = node::size(&guard.data[..]);
            if index < size {
                let item = {
                    let leaf = LeafPage::<_, K>::new(&*guard.data);
                    (leaf.key_at(index), leaf.rid_at(index))
                };
                if index + 1 < size {
                    self.current = Some((guard, index + 1));
                } else {
                    self.advance_leaf(guard);
                }
                return Some(item);
            }
            // exhausted (or empty) leaf: move on or finish
            if !self.advance_leaf(guard) {
                return None;
            }
        }
    }
}

impl<K: StorageKey> Drop for TreeIterator<K> {
    fn drop(&mut self) {
        if let Some((guard, _)) = self.current.take() {
            let page_id = guard.page_id;
            drop(guard);
            self.release_page(page_id);
        }
    }
}
