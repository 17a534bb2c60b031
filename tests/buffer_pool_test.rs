use anyhow::Result;
use tarndb::storage::buffer::BufferPoolError;

mod common;
use common::create_test_buffer_pool;

#[test]
fn test_new_page() -> Result<()> {
    let (buffer_pool, _dir) = create_test_buffer_pool(10)?;

    let (page, page_id) = buffer_pool.new_page()?;
    assert!(page_id > 0);
    {
        let guard = page.read();
        assert_eq!(guard.page_id, page_id);
        assert!(guard.data.iter().all(|&b| b == 0));
    }
    buffer_pool.unpin_page(page_id, false)?;
    Ok(())
}

#[test]
fn test_fetch_resident_page() -> Result<()> {
    let (buffer_pool, _dir) = create_test_buffer_pool(10)?;

    let (_, page_id) = buffer_pool.new_page()?;
    buffer_pool.unpin_page(page_id, false)?;

    let fetched = buffer_pool.fetch_page(page_id)?;
    assert_eq!(fetched.read().page_id, page_id);
    buffer_pool.unpin_page(page_id, false)?;
    Ok(())
}

#[test]
fn test_modification_survives_eviction() -> Result<()> {
    let (buffer_pool, _dir) = create_test_buffer_pool(3)?;

    let (page, page_id) = buffer_pool.new_page()?;
    {
        let mut guard = page.write();
        guard.data[100..109].copy_from_slice(b"Test Data");
    }
    buffer_pool.unpin_page(page_id, true)?;

    // force the dirty page out through replacement
    for _ in 0..6 {
        let (_, id) = buffer_pool.new_page()?;
        buffer_pool.unpin_page(id, false)?;
    }

    let fetched = buffer_pool.fetch_page(page_id)?;
    assert_eq!(&fetched.read().data[100..109], b"Test Data");
    buffer_pool.unpin_page(page_id, false)?;
    Ok(())
}

#[test]
fn test_all_pinned_pool_is_full() -> Result<()> {
    let (buffer_pool, _dir) = create_test_buffer_pool(3)?;

    let mut ids = Vec::new();
    for _ in 0..3 {
        let (_, id) = buffer_pool.new_page()?;
        ids.push(id);
    }
    assert!(matches!(
        buffer_pool.new_page(),
        Err(BufferPoolError::BufferPoolFull)
    ));

    // releasing one pin makes a frame reclaimable again
    buffer_pool.unpin_page(ids[0], false)?;
    let (_, id) = buffer_pool.new_page()?;
    buffer_pool.unpin_page(id, false)?;
    for &id in &ids[1..] {
        buffer_pool.unpin_page(id, false)?;
    }
    Ok(())
}

#[test]
fn test_pin_counting() -> Result<()> {
    let (buffer_pool, _dir) = create_test_buffer_pool(5)?;

    let (_, page_id) = buffer_pool.new_page()?;
    // second pin via fetch
    buffer_pool.fetch_page(page_id)?;

    buffer_pool.unpin_page(page_id, false)?;
    buffer_pool.unpin_page(page_id, false)?;
    // third unpin has nothing to release
    assert!(matches!(
        buffer_pool.unpin_page(page_id, false),
        Err(BufferPoolError::PageNotPinned(_))
    ));
    Ok(())
}

#[test]
fn test_unpinned_page_joins_replacer() -> Result<()> {
    let (buffer_pool, _dir) = create_test_buffer_pool(5)?;

    let (_, page_id) = buffer_pool.new_page()?;
    assert_eq!(buffer_pool.replacer_len(), 0);
    buffer_pool.unpin_page(page_id, false)?;
    assert_eq!(buffer_pool.replacer_len(), 1);

    // re-pinning removes it from the replacer again
    buffer_pool.fetch_page(page_id)?;
    assert_eq!(buffer_pool.replacer_len(), 0);
    buffer_pool.unpin_page(page_id, false)?;
    Ok(())
}

#[test]
fn test_delete_page() -> Result<()> {
    let (buffer_pool, _dir) = create_test_buffer_pool(5)?;

    let (_, page_id) = buffer_pool.new_page()?;
    assert!(matches!(
        buffer_pool.delete_page(page_id),
        Err(BufferPoolError::PagePinned(_))
    ));

    buffer_pool.unpin_page(page_id, false)?;
    let free_before = buffer_pool.free_list_len();
    buffer_pool.delete_page(page_id)?;
    assert_eq!(buffer_pool.free_list_len(), free_before + 1);
    Ok(())
}

#[test]
fn test_flush_page_clears_dirty() -> Result<()> {
    let (buffer_pool, _dir) = create_test_buffer_pool(5)?;

    let (page, page_id) = buffer_pool.new_page()?;
    page.write().data[0..4].copy_from_slice(&[1, 2, 3, 4]);
    buffer_pool.unpin_page(page_id, true)?;
    buffer_pool.flush_page(page_id)?;

    // evict it, then read back from disk
    for _ in 0..6 {
        let (_, id) = buffer_pool.new_page()?;
        buffer_pool.unpin_page(id, false)?;
    }
    let fetched = buffer_pool.fetch_page(page_id)?;
    assert_eq!(&fetched.read().data[0..4], &[1, 2, 3, 4]);
    buffer_pool.unpin_page(page_id, false)?;
    Ok(())
}
