use byteorder::{ByteOrder, LittleEndian};

use crate::common::types::{PageId, INVALID_PAGE_ID};

// Common node header, shared by leaf and internal pages:
// | page_id | lsn | page_type | current_size | max_size | parent_page_id |
pub const OFFSET_PAGE_TYPE: usize = 8;
pub const OFFSET_SIZE: usize = 12;
pub const OFFSET_MAX_SIZE: usize = 16;
pub const OFFSET_PARENT: usize = 20;
pub const COMMON_HEADER_SIZE: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    Invalid,
    Internal,
    Leaf,
}

pub fn page_type(data: &[u8]) -> PageType {
    match LittleEndian::read_u32(&data[OFFSET_PAGE_TYPE..OFFSET_PAGE_TYPE + 4]) {
        1 => PageType::Internal,
        2 => PageType::Leaf,
        _ => PageType::Invalid,
    }
}

pub fn set_page_type(data: &mut [u8], page_type: PageType) {
    let tag = match page_type {
        PageType::Invalid => 0,
        PageType::Internal => 1,
        PageType::Leaf => 2,
    };
    LittleEndian::write_u32(&mut data[OFFSET_PAGE_TYPE..OFFSET_PAGE_TYPE + 4], tag);
}

pub fn is_leaf(data: &[u8]) -> bool {
    page_type(data) == PageType::Leaf
}

pub fn node_page_id(data: &[u8]) -> PageId {
    LittleEndian::read_i32(&data[0..4])
}

pub fn set_node_page_id(data: &mut [u8], page_id: PageId) {
    LittleEndian::write_i32(&mut data[0..4], page_id);
}

pub fn size(data: &[u8]) -> usize {
    LittleEndian::read_u32(&data[OFFSET_SIZE..OFFSET_SIZE + 4]) as usize
}

pub fn set_size(data: &mut [u8], size: usize) {
    LittleEndian::write_u32(&mut data[OFFSET_SIZE..OFFSET_SIZE + 4], size as u32);
}

pub fn max_size(data: &[u8]) -> usize {
    LittleEndian::read_u32(&data[OFFSET_MAX_SIZE..OFFSET_MAX_SIZE + 4]) as usize
}

pub fn set_max_size(data: &mut [u8], max_size: usize) {
    LittleEndian::write_u32(&mut data[OFFSET_MAX_SIZE..OFFSET_MAX_SIZE + 4], max_size as u32);
}

pub fn parent_page_id(data: &[u8]) -> PageId {
    LittleEndian::read_i32(&data[OFFSET_PARENT..OFFSET_PARENT + 4])
}

pub fn set_parent_page_id(data: &mut [u8], parent: PageId) {
    LittleEndian::write_i32(&mut data[OFFSET_PARENT..OFFSET_PARENT + 4], parent);
}

pub fn is_root(data: &[u8]) -> bool {
    parent_page_id(data) == INVALID_PAGE_ID
}

/// Smallest entry count a non-root node may shrink to
pub fn min_size(data: &[u8]) -> usize {
    (max_size(data) + 1) / 2
}
