use std::collections::VecDeque;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use parking_lot::MutexGuard;

use crate::common::types::{PageId, Rid, HEADER_PAGE_ID, INVALID_PAGE_ID, PAGE_SIZE, RID_SIZE};
use crate::index::btree::error::BTreeError;
use crate::index::btree::header_page::HeaderPage;
use crate::index::btree::internal_page::{InternalPage, INTERNAL_HEADER_SIZE};
use crate::index::btree::iterator::TreeIterator;
use crate::index::btree::key::{KeyComparator, OrdComparator, StorageKey};
use crate::index::btree::leaf_page::{LeafPage, LEAF_HEADER_SIZE};
use crate::index::btree::node;
use crate::storage::buffer::BufferPoolManager;
use crate::storage::page::{Page, PageWriteGuard};
use crate::transaction::concurrency::transaction::Transaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Get,
    Insert,
    Delete,
}

struct LatchedPage {
    page_id: PageId,
    guard: PageWriteGuard,
}

/// Per-operation crabbing state: the root-id mutex guard plus the ordered
/// chain of write-latched pages (ancestors, and siblings pre-latched for
/// deletes). Pages merged away are collected and deleted after all latches
/// are released.
struct Context<'a> {
    root_guard: Option<MutexGuard<'a, PageId>>,
    pages: Vec<LatchedPage>,
    deleted: Vec<PageId>,
}

impl<'a> Context<'a> {
    fn new(root_guard: MutexGuard<'a, PageId>) -> Self {
        Self {
            root_guard: Some(root_guard),
            pages: Vec::new(),
            deleted: Vec::new(),
        }
    }

    fn root_page_id(&self) -> PageId {
        **self.root_guard.as_ref().expect("root latch released early")
    }

    fn set_root_page_id(&mut self, page_id: PageId) {
        **self.root_guard.as_mut().expect("root latch released early") = page_id;
    }

    fn get(&self, page_id: PageId) -> Option<&Page> {
        self.pages
            .iter()
            .find(|entry| entry.page_id == page_id)
            .map(|entry| &*entry.guard)
    }

    fn get_mut(&mut self, page_id: PageId) -> Option<&mut Page> {
        self.pages
            .iter_mut()
            .find(|entry| entry.page_id == page_id)
            .map(|entry| &mut *entry.guard)
    }

    /// Two distinct latched pages borrowed mutably at once
    fn get_pair_mut(&mut self, first: PageId, second: PageId) -> (&mut Page, &mut Page) {
        let i = self
            .pages
            .iter()
            .position(|e| e.page_id == first)
            .expect("page not latched");
        let j = self
            .pages
            .iter()
            .position(|e| e.page_id == second)
            .expect("page not latched");
        assert_ne!(i, j);
        if i < j {
            let (lo, hi) = self.pages.split_at_mut(j);
            (&mut *lo[i].guard, &mut *hi[0].guard)
        } else {
            let (lo, hi) = self.pages.split_at_mut(i);
            (&mut *hi[0].guard, &mut *lo[j].guard)
        }
    }

    /// Drop every held latch (oldest first) and unpin, releasing the
    /// root-id mutex with them.
    fn release_held(&mut self, buffer_pool: &BufferPoolManager) -> Result<(), BTreeError> {
        self.root_guard = None;
        for entry in self.pages.drain(..) {
            let page_id = entry.page_id;
            drop(entry.guard);
            buffer_pool.unpin_page(page_id, true)?;
        }
        Ok(())
    }
}

/// Concurrent B+Tree index over buffered pages. Keys are ordered by a
/// caller-supplied comparator, values are RIDs, duplicates are rejected.
/// The root page id is registered in the header-page directory under the
/// index name.
pub struct BPlusTree<K, C = OrdComparator<K>>
where
    K: StorageKey,
    C: KeyComparator<K>,
{
    index_name: String,
    buffer_pool: Arc<BufferPoolManager>,
    comparator: C,
    root_page_id: parking_lot::Mutex<PageId>,
    leaf_max_size: usize,
    internal_max_size: usize,
    _marker: std::marker::PhantomData<K>,
}

impl<K, C> BPlusTree<K, C>
where
    K: StorageKey,
    C: KeyComparator<K>,
{
    /// Open (or register) the index named `name`, with node capacities
    /// derived from the page size and the entry widths.
    pub fn new(
        name: impl Into<String>,
        buffer_pool: Arc<BufferPoolManager>,
        comparator: C,
    ) -> Result<Self, BTreeError> {
        let leaf_max = (PAGE_SIZE - LEAF_HEADER_SIZE) / (K::ENCODED_SIZE + RID_SIZE) - 1;
        let internal_max = (PAGE_SIZE - INTERNAL_HEADER_SIZE) / (K::ENCODED_SIZE + 4) - 1;
        Self::new_with_max_size(name, buffer_pool, comparator, leaf_max, internal_max)
    }

    /// Open the index with explicit node capacities. Small capacities make
    /// structural changes easy to exercise.
    pub fn new_with_max_size(
        name: impl Into<String>,
        buffer_pool: Arc<BufferPoolManager>,
        comparator: C,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Result<Self, BTreeError> {
        let index_name = name.into();
        let root_page_id = {
            let header = buffer_pool.fetch_page(HEADER_PAGE_ID)?;
            let mut guard = header.write();
            let root = HeaderPage::new(&mut guard)
                .get_root_id(&index_name)
                .unwrap_or(INVALID_PAGE_ID);
            drop(guard);
            buffer_pool.unpin_page(HEADER_PAGE_ID, false)?;
            root
        };

        Ok(Self {
            index_name,
            buffer_pool,
            comparator,
            root_page_id: parking_lot::Mutex::new(root_page_id),
            leaf_max_size,
            internal_max_size,
            _marker: std::marker::PhantomData,
        })
    }

    pub fn is_empty(&self) -> bool {
        *self.root_page_id.lock() == INVALID_PAGE_ID
    }

    pub fn root_page_id(&self) -> PageId {
        *self.root_page_id.lock()
    }

    /// Point lookup
    pub fn get(&self, key: &K) -> Result<Option<Rid>, BTreeError> {
        let guard = match self.find_leaf_read(Some(key))? {
            Some(guard) => guard,
            None => return Ok(None),
        };
        let result = LeafPage::<_, K>::new(&*guard.data).lookup(key, &self.comparator);
        let page_id = guard.page_id;
        drop(guard);
        self.buffer_pool.unpin_page(page_id, false)?;
        Ok(result)
    }

    /// Insert a unique key. Returns false when the key already exists.
    pub fn insert(
        &self,
        key: &K,
        value: Rid,
        _txn: Option<&Transaction>,
    ) -> Result<bool, BTreeError> {
        let mut ctx = Context::new(self.root_page_id.lock());
        if ctx.root_page_id() == INVALID_PAGE_ID {
            self.start_new_tree(key, value, &mut ctx)?;
            return Ok(true);
        }

        let leaf_id = self.find_leaf_write(key, Operation::Insert, &mut ctx)?;
        let (prev_size, new_size) = {
            let page = ctx.get_mut(leaf_id).expect("leaf latched");
            let mut leaf = LeafPage::<_, K>::new(&mut *page.data);
            let prev = leaf.size();
            let new = leaf.insert(key, value, &self.comparator);
            (prev, new)
        };

        if new_size == prev_size {
            // duplicate key
            ctx.release_held(&self.buffer_pool)?;
            return Ok(false);
        }
        if new_size <= self.leaf_max_size {
            ctx.release_held(&self.buffer_pool)?;
            return Ok(true);
        }

        // Leaf overflow: split and push the new leaf's first key upward
        let (new_page, new_page_id) = self.buffer_pool.new_page()?;
        let up_key;
        {
            let mut new_guard = new_page.write();
            let old = ctx.get_mut(leaf_id).expect("leaf latched");
            let mut old_leaf = LeafPage::<_, K>::new(&mut *old.data);
            let mut new_leaf = LeafPage::<_, K>::new(&mut *new_guard.data);
            new_leaf.init(new_page_id, old_leaf.parent_page_id(), self.leaf_max_size);
            old_leaf.move_half_to(&mut new_leaf);
            up_key = new_leaf.key_at(0);
        }
        self.buffer_pool.unpin_page(new_page_id, true)?;

        self.insert_into_parent(&mut ctx, leaf_id, up_key, new_page_id)?;
        ctx.release_held(&self.buffer_pool)?;
        Ok(true)
    }

    /// Delete a key; absent keys are a no-op
    pub fn remove(&self, key: &K, txn: Option<&Transaction>) -> Result<(), BTreeError> {
        let mut ctx = Context::new(self.root_page_id.lock());
        if ctx.root_page_id() == INVALID_PAGE_ID {
            return Ok(());
        }

        let leaf_id = self.find_leaf_write(key, Operation::Delete, &mut ctx)?;
        {
            let page = ctx.get_mut(leaf_id).expect("leaf latched");
            let mut leaf = LeafPage::<_, K>::new(&mut *page.data);
            leaf.remove(key, &self.comparator);
        }
        self.coalesce_or_redistribute(&mut ctx, leaf_id)?;
        ctx.release_held(&self.buffer_pool)?;

        for page_id in ctx.deleted.drain(..) {
            match txn {
                Some(txn) => txn.add_deleted_page(page_id),
                None => {
                    // a concurrent reader may still pin the dead page; it
                    // is unreachable either way
                    if let Err(err) = self.buffer_pool.delete_page(page_id) {
                        log::debug!("deferred delete of page {} skipped: {}", page_id, err);
                    }
                }
            }
        }
        Ok(())
    }

    /// Iterator over the whole index in key order
    pub fn begin(&self) -> Result<TreeIterator<K>, BTreeError> {
        match self.find_leaf_read(None)? {
            Some(guard) => Ok(TreeIterator::new(Some((guard, 0)), self.buffer_pool.clone())),
            None => Ok(TreeIterator::end(self.buffer_pool.clone())),
        }
    }

    /// Iterator positioned at the entry whose key equals `key`; the end
    /// iterator when the key is absent.
    pub fn begin_at(&self, key: &K) -> Result<TreeIterator<K>, BTreeError> {
        let guard = match self.find_leaf_read(Some(key))? {
            Some(guard) => guard,
            None => return Ok(TreeIterator::end(self.buffer_pool.clone())),
        };
        let leaf = LeafPage::<_, K>::new(&*guard.data);
        if leaf.lookup(key, &self.comparator).is_some() {
            let index = leaf.key_index(key, &self.comparator);
            Ok(TreeIterator::new(
                Some((guard, index)),
                self.buffer_pool.clone(),
            ))
        } else {
            let page_id = guard.page_id;
            drop(guard);
            self.buffer_pool.unpin_page(page_id, false)?;
            Ok(TreeIterator::end(self.buffer_pool.clone()))
        }
    }

    /// Read-latched descent: each ancestor is released as soon as its child
    /// is latched. Returns the target leaf read-latched and pinned, or None
    /// for an empty tree. `None` key means leftmost descent.
    fn find_leaf_read(
        &self,
        key: Option<&K>,
    ) -> Result<Option<crate::storage::page::PageReadGuard>, BTreeError> {
        let mut root_guard = Some(self.root_page_id.lock());
        let root_id = **root_guard.as_ref().unwrap();
        if root_id == INVALID_PAGE_ID {
            return Ok(None);
        }

        let page = self.buffer_pool.fetch_page(root_id)?;
        let mut guard = page.read_arc();
        loop {
            if node::is_leaf(&guard.data[..]) {
                break;
            }
            let child_id = {
                let view = InternalPage::<_, K>::new(&*guard.data);
                match key {
                    Some(key) => view.lookup(key, &self.comparator),
                    None => view.value_at(0),
                }
            };
            let child_page = self.buffer_pool.fetch_page(child_id)?;
            let child_guard = child_page.read_arc();

            let parent_id = guard.page_id;
            let parent_was_root = node::is_root(&guard.data[..]);
            drop(guard);
            self.buffer_pool.unpin_page(parent_id, false)?;
            if parent_was_root {
                root_guard = None;
            }
            guard = child_guard;
        }
        drop(root_guard);
        Ok(Some(guard))
    }

    /// Write-latched descent for a mutating operation. Ancestors are held
    /// until a node safe for `op` is reached; for deletes the sibling of
    /// every unsafe node is write-latched alongside it.
    fn find_leaf_write(
        &self,
        key: &K,
        op: Operation,
        ctx: &mut Context<'_>,
    ) -> Result<PageId, BTreeError> {
        let mut page_id = ctx.root_page_id();
        loop {
            let page = self.buffer_pool.fetch_page(page_id)?;
            let guard = page.write_arc();

            if self.is_safe(&guard.data[..], op) {
                ctx.release_held(&self.buffer_pool)?;
            } else if op == Operation::Delete && !node::is_root(&guard.data[..]) {
                self.latch_delete_sibling(&guard, ctx)?;
            }

            let child = if node::is_leaf(&guard.data[..]) {
                None
            } else {
                let view = InternalPage::<_, K>::new(&*guard.data);
                Some(view.lookup(key, &self.comparator))
            };
            ctx.pages.push(LatchedPage { page_id, guard });

            match child {
                None => return Ok(page_id),
                Some(child_id) => page_id = child_id,
            }
        }
    }

    /// A node is safe for an operation when performing it cannot force a
    /// structural change in the parent.
    fn is_safe(&self, data: &[u8], op: Operation) -> bool {
        let size = node::size(data);
        match op {
            Operation::Get => true,
            Operation::Insert => size < node::max_size(data),
            Operation::Delete => {
                if node::is_root(data) {
                    if node::is_leaf(data) {
                        size > 1
                    } else {
                        size > 2
                    }
                } else {
                    size > node::min_size(data)
                }
            }
        }
    }

    /// Pre-latch the sibling an unsafe node would coalesce with or borrow
    /// from: the left sibling when one exists, else the right.
    fn latch_delete_sibling(
        &self,
        node_page: &Page,
        ctx: &mut Context<'_>,
    ) -> Result<(), BTreeError> {
        let parent_id = node::parent_page_id(&node_page.data[..]);
        let node_id = node_page.page_id;
        let sibling_id = {
            let parent = ctx
                .get(parent_id)
                .expect("parent stays latched while its child is unsafe");
            let view = InternalPage::<_, K>::new(&*parent.data);
            let index = view.value_index(node_id).expect("child known to parent");
            if index > 0 {
                view.value_at(index - 1)
            } else {
                view.value_at(index + 1)
            }
        };
        let sibling_page = self.buffer_pool.fetch_page(sibling_id)?;
        let sibling_guard = sibling_page.write_arc();
        ctx.pages.push(LatchedPage {
            page_id: sibling_id,
            guard: sibling_guard,
        });
        Ok(())
    }

    fn start_new_tree(&self, key: &K, value: Rid, ctx: &mut Context<'_>) -> Result<(), BTreeError> {
        let (page, page_id) = self.buffer_pool.new_page()?;
        {
            let mut guard = page.write();
            let mut leaf = LeafPage::<_, K>::new(&mut *guard.data);
            leaf.init(page_id, INVALID_PAGE_ID, self.leaf_max_size);
            leaf.insert(key, value, &self.comparator);
        }
        self.buffer_pool.unpin_page(page_id, true)?;
        ctx.set_root_page_id(page_id);
        self.update_root_record(page_id)?;
        ctx.release_held(&self.buffer_pool)?;
        Ok(())
    }

    /// Hook the sibling produced by a split into the parent of `old_id`,
    /// splitting upward as needed; a splitting root grows a new root.
    fn insert_into_parent(
        &self,
        ctx: &mut Context<'_>,
        old_id: PageId,
        key: K,
        new_id: PageId,
    ) -> Result<(), BTreeError> {
        let parent_id = {
            let old = ctx.get(old_id).expect("node latched");
            node::parent_page_id(&old.data[..])
        };

        if parent_id == INVALID_PAGE_ID {
            // the root split: grow a new root above both halves
            let (root_page, root_id) = self.buffer_pool.new_page()?;
            {
                let mut guard = root_page.write();
                let mut root = InternalPage::<_, K>::new(&mut *guard.data);
                root.init(root_id, INVALID_PAGE_ID, self.internal_max_size);
                root.populate_new_root(old_id, &key, new_id);
            }
            self.buffer_pool.unpin_page(root_id, true)?;

            let old = ctx.get_mut(old_id).expect("node latched");
            node::set_parent_page_id(&mut old.data[..], root_id);
            self.set_parent(ctx, new_id, root_id)?;

            ctx.set_root_page_id(root_id);
            self.update_root_record(root_id)?;
            return Ok(());
        }

        let new_size = {
            let parent = ctx.get_mut(parent_id).expect("parent latched");
            let mut view = InternalPage::<_, K>::new(&mut *parent.data);
            view.insert_node_after(old_id, &key, new_id)
        };
        if new_size <= self.internal_max_size {
            return Ok(());
        }

        // parent overflow: split it and recurse
        let (sibling_page, sibling_id) = self.buffer_pool.new_page()?;
        let separator;
        let moved_children;
        {
            let mut sibling_guard = sibling_page.write();
            let parent = ctx.get_mut(parent_id).expect("parent latched");
            let mut parent_view = InternalPage::<_, K>::new(&mut *parent.data);
            let mut sibling_view = InternalPage::<_, K>::new(&mut *sibling_guard.data);
            sibling_view.init(sibling_id, parent_view.parent_page_id(), self.internal_max_size);
            moved_children = parent_view.move_half_to(&mut sibling_view);
            separator = sibling_view.key_at(0);
        }
        self.buffer_pool.unpin_page(sibling_id, true)?;

        for child in moved_children {
            self.set_parent(ctx, child, sibling_id)?;
        }
        self.insert_into_parent(ctx, parent_id, separator, sibling_id)
    }

    /// Rebalance `node_id` after a deletion left it under-full
    fn coalesce_or_redistribute(
        &self,
        ctx: &mut Context<'_>,
        node_id: PageId,
    ) -> Result<(), BTreeError> {
        let (is_leaf, size, parent_id, is_root, min_size) = {
            let page = ctx.get(node_id).expect("node latched");
            let data = &page.data[..];
            (
                node::is_leaf(data),
                node::size(data),
                node::parent_page_id(data),
                node::is_root(data),
                node::min_size(data),
            )
        };

        if is_root {
            return self.adjust_root(ctx, node_id);
        }
        if size >= min_size {
            return Ok(());
        }

        let (neighbor_id, neighbor_is_left, node_index) = {
            let parent = ctx.get(parent_id).expect("parent latched");
            let view = InternalPage::<_, K>::new(&*parent.data);
            let index = view.value_index(node_id).expect("child known to parent");
            if index > 0 {
                (view.value_at(index - 1), true, index)
            } else {
                (view.value_at(index + 1), false, index)
            }
        };
        let neighbor_size = {
            let neighbor = ctx.get(neighbor_id).expect("sibling pre-latched");
            node::size(&neighbor.data[..])
        };
        let max_size = if is_leaf {
            self.leaf_max_size
        } else {
            self.internal_max_size
        };

        if neighbor_size + size <= max_size {
            // coalesce: merge the right node into the left, drop the
            // separator from the parent, then rebalance the parent
            let (left_id, right_id, right_index) = if neighbor_is_left {
                (neighbor_id, node_id, node_index)
            } else {
                (node_id, neighbor_id, node_index + 1)
            };
            let middle_key = {
                let parent = ctx.get(parent_id).expect("parent latched");
                InternalPage::<_, K>::new(&*parent.data).key_at(right_index)
            };

            let moved_children = {
                let (left, right) = ctx.get_pair_mut(left_id, right_id);
                if is_leaf {
                    let mut left_view = LeafPage::<_, K>::new(&mut *left.data);
                    let mut right_view = LeafPage::<_, K>::new(&mut *right.data);
                    right_view.move_all_to(&mut left_view);
                    Vec::new()
                } else {
                    let mut left_view = InternalPage::<_, K>::new(&mut *left.data);
                    let mut right_view = InternalPage::<_, K>::new(&mut *right.data);
                    right_view.move_all_to(&mut left_view, &middle_key)
                }
            };
            for child in moved_children {
                self.set_parent(ctx, child, left_id)?;
            }

            {
                let parent = ctx.get_mut(parent_id).expect("parent latched");
                let mut view = InternalPage::<_, K>::new(&mut *parent.data);
                view.remove(right_index);
            }
            ctx.deleted.push(right_id);
            return self.coalesce_or_redistribute(ctx, parent_id);
        }

        // redistribute a single entry and fix the separator
        if neighbor_is_left {
            let middle_key = {
                let parent = ctx.get(parent_id).expect("parent latched");
                InternalPage::<_, K>::new(&*parent.data).key_at(node_index)
            };
            let (new_separator, moved_child) = {
                let (neighbor, page) = ctx.get_pair_mut(neighbor_id, node_id);
                if is_leaf {
                    let mut neighbor_view = LeafPage::<_, K>::new(&mut *neighbor.data);
                    let mut node_view = LeafPage::<_, K>::new(&mut *page.data);
                    neighbor_view.move_last_to_front_of(&mut node_view);
                    (node_view.key_at(0), INVALID_PAGE_ID)
                } else {
                    let mut neighbor_view = InternalPage::<_, K>::new(&mut *neighbor.data);
                    let mut node_view = InternalPage::<_, K>::new(&mut *page.data);
                    neighbor_view.move_last_to_front_of(&mut node_view, &middle_key)
                }
            };
            if !is_leaf {
                self.set_parent(ctx, moved_child, node_id)?;
            }
            let parent = ctx.get_mut(parent_id).expect("parent latched");
            let mut view = InternalPage::<_, K>::new(&mut *parent.data);
            view.set_key_at(node_index, &new_separator);
        } else {
            let neighbor_index = node_index + 1;
            let middle_key = {
                let parent = ctx.get(parent_id).expect("parent latched");
                InternalPage::<_, K>::new(&*parent.data).key_at(neighbor_index)
            };
            let (new_separator, moved_child) = {
                let (neighbor, page) = ctx.get_pair_mut(neighbor_id, node_id);
                if is_leaf {
                    let mut neighbor_view = LeafPage::<_, K>::new(&mut *neighbor.data);
                    let mut node_view = LeafPage::<_, K>::new(&mut *page.data);
                    neighbor_view.move_first_to_end_of(&mut node_view);
                    (neighbor_view.key_at(0), INVALID_PAGE_ID)
                } else {
                    let mut neighbor_view = InternalPage::<_, K>::new(&mut *neighbor.data);
                    let mut node_view = InternalPage::<_, K>::new(&mut *page.data);
                    neighbor_view.move_first_to_end_of(&mut node_view, &middle_key)
                }
            };
            if !is_leaf {
                self.set_parent(ctx, moved_child, node_id)?;
            }
            let parent = ctx.get_mut(parent_id).expect("parent latched");
            let mut view = InternalPage::<_, K>::new(&mut *parent.data);
            view.set_key_at(neighbor_index, &new_separator);
        }
        Ok(())
    }

    /// Shrink the root: an internal root with a single child promotes that
    /// child; an empty leaf root empties the tree.
    fn adjust_root(&self, ctx: &mut Context<'_>, root_id: PageId) -> Result<(), BTreeError> {
        let (is_leaf, size) = {
            let page = ctx.get(root_id).expect("root latched");
            (node::is_leaf(&page.data[..]), node::size(&page.data[..]))
        };

        if !is_leaf && size == 1 {
            let child_id = {
                let page = ctx.get(root_id).unwrap();
                InternalPage::<_, K>::new(&*page.data).value_at(0)
            };
            self.set_parent(ctx, child_id, INVALID_PAGE_ID)?;
            ctx.set_root_page_id(child_id);
            self.update_root_record(child_id)?;
            ctx.deleted.push(root_id);
        } else if is_leaf && size == 0 {
            ctx.set_root_page_id(INVALID_PAGE_ID);
            self.update_root_record(INVALID_PAGE_ID)?;
            ctx.deleted.push(root_id);
        }
        Ok(())
    }

    /// Update a node's parent pointer, through the crabbing context when
    /// the node is latched there, directly through the buffer pool when not.
    fn set_parent(
        &self,
        ctx: &mut Context<'_>,
        page_id: PageId,
        parent_id: PageId,
    ) -> Result<(), BTreeError> {
        if let Some(page) = ctx.get_mut(page_id) {
            node::set_parent_page_id(&mut page.data[..], parent_id);
            return Ok(());
        }
        let page = self.buffer_pool.fetch_page(page_id)?;
        {
            let mut guard = page.write();
            node::set_parent_page_id(&mut guard.data[..], parent_id);
        }
        self.buffer_pool.unpin_page(page_id, true)?;
        Ok(())
    }

    /// Record this index's root under its name in the header page
    fn update_root_record(&self, root_page_id: PageId) -> Result<(), BTreeError> {
        let header = self.buffer_pool.fetch_page(HEADER_PAGE_ID)?;
        {
            let mut guard = header.write();
            if !HeaderPage::new(&mut guard).set_record(&self.index_name, root_page_id) {
                return Err(BTreeError::NameTooLong(self.index_name.clone()));
            }
        }
        self.buffer_pool.unpin_page(HEADER_PAGE_ID, true)?;
        Ok(())
    }
}

impl<K, C> BPlusTree<K, C>
where
    K: StorageKey + std::fmt::Debug,
    C: KeyComparator<K>,
{
    /// Level-order dump of the tree structure; debugging aid
    pub fn to_string_tree(&self, verbose: bool) -> Result<String, BTreeError> {
        let root_id = *self.root_page_id.lock();
        if root_id == INVALID_PAGE_ID {
            return Ok("Empty tree".to_string());
        }

        let mut out = String::new();
        let mut level = VecDeque::from([root_id]);
        while !level.is_empty() {
            let mut next_level = VecDeque::new();
            for page_id in level.drain(..) {
                let page = self.buffer_pool.fetch_page(page_id)?;
                {
                    let guard = page.read();
                    if node::is_leaf(&guard.data[..]) {
                        let leaf = LeafPage::<_, K>::new(&*guard.data);
                        out.push('[');
                        if verbose {
                            let _ = write!(out, "#{} ", page_id);
                        }
                        for i in 0..leaf.size() {
                            if i > 0 {
                                out.push(' ');
                            }
                            let _ = write!(out, "{:?}", leaf.key_at(i));
                        }
                        out.push_str("] ");
                    } else {
                        let view = InternalPage::<_, K>::new(&*guard.data);
                        out.push('<');
                        if verbose {
                            let _ = write!(out, "#{} ", page_id);
                        }
                        for i in 1..view.size() {
                            if i > 1 {
                                out.push(' ');
                            }
                            let _ = write!(out, "{:?}", view.key_at(i));
                        }
                        out.push_str("> ");
                        for i in 0..view.size() {
                            next_level.push_back(view.value_at(i));
                        }
                    }
                }
                self.buffer_pool.unpin_page(page_id, false)?;
            }
            out.push('\n');
            level = next_level;
        }
        Ok(out)
    }
}

impl<K, C> BPlusTree<K, C>
where
    K: StorageKey + From<i64>,
    C: KeyComparator<K>,
{
    /// Bulk-insert keys listed one per line in a file; test harness helper
    pub fn insert_from_file(
        &self,
        path: impl AsRef<Path>,
        txn: Option<&Transaction>,
    ) -> Result<(), BTreeError> {
        let reader = BufReader::new(File::open(path)?);
        for line in reader.lines() {
            let line = line?;
            if let Ok(value) = line.trim().parse::<i64>() {
                self.insert(&K::from(value), Rid::from_packed(value), txn)?;
            }
        }
        Ok(())
    }

    /// Bulk-delete keys listed one per line in a file
    pub fn remove_from_file(
        &self,
        path: impl AsRef<Path>,
        txn: Option<&Transaction>,
    ) -> Result<(), BTreeError> {
        let reader = BufReader::new(File::open(path)?);
        for line in reader.lines() {
            let line = line?;
            if let Ok(value) = line.trim().parse::<i64>() {
                self.remove(&K::from(value), txn)?;
            }
        }
        Ok(())
    }
}
