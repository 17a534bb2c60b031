use byteorder::{ByteOrder, LittleEndian};

use crate::common::types::{Lsn, PageId, Rid, SlotNum, TxnId, INVALID_LSN, INVALID_TXN_ID, RID_SIZE};

/// Fixed wire header: size, lsn, txn_id, prev_lsn, type; 4 bytes each,
/// little-endian.
pub const LOG_HEADER_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRecordType {
    Invalid,
    Insert,
    MarkDelete,
    ApplyDelete,
    RollbackDelete,
    Update,
    NewPage,
    Begin,
    Commit,
    Abort,
}

impl LogRecordType {
    fn to_wire(self) -> u32 {
        match self {
            LogRecordType::Invalid => 0,
            LogRecordType::Insert => 1,
            LogRecordType::MarkDelete => 2,
            LogRecordType::ApplyDelete => 3,
            LogRecordType::RollbackDelete => 4,
            LogRecordType::Update => 5,
            LogRecordType::NewPage => 6,
            LogRecordType::Begin => 7,
            LogRecordType::Commit => 8,
            LogRecordType::Abort => 9,
        }
    }

    fn from_wire(tag: u32) -> Option<Self> {
        Some(match tag {
            1 => LogRecordType::Insert,
            2 => LogRecordType::MarkDelete,
            3 => LogRecordType::ApplyDelete,
            4 => LogRecordType::RollbackDelete,
            5 => LogRecordType::Update,
            6 => LogRecordType::NewPage,
            7 => LogRecordType::Begin,
            8 => LogRecordType::Commit,
            9 => LogRecordType::Abort,
            _ => return None,
        })
    }
}

/// Type-specific payload following the header. Tuples travel as raw bytes
/// prefixed with their 32-bit length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogPayload {
    /// BEGIN / COMMIT / ABORT
    None,
    /// INSERT and the three delete flavors
    TupleOp { rid: Rid, tuple: Vec<u8> },
    /// UPDATE carries both images
    Update {
        rid: Rid,
        old_tuple: Vec<u8>,
        new_tuple: Vec<u8>,
    },
    /// NEWPAGE records the page it chains behind
    NewPage { prev_page_id: PageId },
}

/// One write-ahead log record. Immutable once appended; the LSN is
/// assigned by the log manager at append time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub size: i32,
    pub lsn: Lsn,
    pub txn_id: TxnId,
    pub prev_lsn: Lsn,
    pub record_type: LogRecordType,
    pub payload: LogPayload,
}

fn tuple_wire_size(tuple: &[u8]) -> usize {
    4 + tuple.len()
}

impl LogRecord {
    fn new(txn_id: TxnId, prev_lsn: Lsn, record_type: LogRecordType, payload: LogPayload) -> Self {
        let payload_size = match &payload {
            LogPayload::None => 0,
            LogPayload::TupleOp { tuple, .. } => RID_SIZE + tuple_wire_size(tuple),
            LogPayload::Update {
                old_tuple,
                new_tuple,
                ..
            } => RID_SIZE + tuple_wire_size(old_tuple) + tuple_wire_size(new_tuple),
            LogPayload::NewPage { .. } => 4,
        };
        Self {
            size: (LOG_HEADER_SIZE + payload_size) as i32,
            lsn: INVALID_LSN,
            txn_id,
            prev_lsn,
            record_type,
            payload,
        }
    }

    pub fn new_begin(txn_id: TxnId) -> Self {
        Self::new(txn_id, INVALID_LSN, LogRecordType::Begin, LogPayload::None)
    }

    pub fn new_commit(txn_id: TxnId, prev_lsn: Lsn) -> Self {
        Self::new(txn_id, prev_lsn, LogRecordType::Commit, LogPayload::None)
    }

    pub fn new_abort(txn_id: TxnId, prev_lsn: Lsn) -> Self {
        Self::new(txn_id, prev_lsn, LogRecordType::Abort, LogPayload::None)
    }

    pub fn new_insert(txn_id: TxnId, prev_lsn: Lsn, rid: Rid, tuple: Vec<u8>) -> Self {
        Self::new(
            txn_id,
            prev_lsn,
            LogRecordType::Insert,
            LogPayload::TupleOp { rid, tuple },
        )
    }

    pub fn new_mark_delete(txn_id: TxnId, prev_lsn: Lsn, rid: Rid, tuple: Vec<u8>) -> Self {
        Self::new(
            txn_id,
            prev_lsn,
            LogRecordType::MarkDelete,
            LogPayload::TupleOp { rid, tuple },
        )
    }

    pub fn new_apply_delete(txn_id: TxnId, prev_lsn: Lsn, rid: Rid, tuple: Vec<u8>) -> Self {
        Self::new(
            txn_id,
            prev_lsn,
            LogRecordType::ApplyDelete,
            LogPayload::TupleOp { rid, tuple },
        )
    }

    pub fn new_rollback_delete(txn_id: TxnId, prev_lsn: Lsn, rid: Rid, tuple: Vec<u8>) -> Self {
        Self::new(
            txn_id,
            prev_lsn,
            LogRecordType::RollbackDelete,
            LogPayload::TupleOp { rid, tuple },
        )
    }

    pub fn new_update(
        txn_id: TxnId,
        prev_lsn: Lsn,
        rid: Rid,
        old_tuple: Vec<u8>,
        new_tuple: Vec<u8>,
    ) -> Self {
        Self::new(
            txn_id,
            prev_lsn,
            LogRecordType::Update,
            LogPayload::Update {
                rid,
                old_tuple,
                new_tuple,
            },
        )
    }

    pub fn new_new_page(txn_id: TxnId, prev_lsn: Lsn, prev_page_id: PageId) -> Self {
        Self::new(
            txn_id,
            prev_lsn,
            LogRecordType::NewPage,
            LogPayload::NewPage { prev_page_id },
        )
    }

    /// Serialize into `buf`, which must be at least `self.size` bytes
    pub fn serialize_into(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= self.size as usize);
        LittleEndian::write_i32(&mut buf[0..4], self.size);
        LittleEndian::write_i32(&mut buf[4..8], self.lsn);
        LittleEndian::write_i32(&mut buf[8..12], self.txn_id);
        LittleEndian::write_i32(&mut buf[12..16], self.prev_lsn);
        LittleEndian::write_u32(&mut buf[16..20], self.record_type.to_wire());

        let mut pos = LOG_HEADER_SIZE;
        match &self.payload {
            LogPayload::None => {}
            LogPayload::TupleOp { rid, tuple } => {
                pos = write_rid(buf, pos, *rid);
                write_tuple(buf, pos, tuple);
            }
            LogPayload::Update {
                rid,
                old_tuple,
                new_tuple,
            } => {
                pos = write_rid(buf, pos, *rid);
                pos = write_tuple(buf, pos, old_tuple);
                write_tuple(buf, pos, new_tuple);
            }
            LogPayload::NewPage { prev_page_id } => {
                LittleEndian::write_i32(&mut buf[pos..pos + 4], *prev_page_id);
            }
        }
    }

    /// Parse one record from the front of `buf`. None means the bytes do
    /// not hold a complete, valid record (truncation or corruption).
    pub fn deserialize(buf: &[u8]) -> Option<LogRecord> {
        if buf.len() < LOG_HEADER_SIZE {
            return None;
        }
        let size = LittleEndian::read_i32(&buf[0..4]);
        if size <= 0 || (size as usize) < LOG_HEADER_SIZE || size as usize > buf.len() {
            return None;
        }
        let lsn = LittleEndian::read_i32(&buf[4..8]);
        let txn_id = LittleEndian::read_i32(&buf[8..12]);
        let prev_lsn = LittleEndian::read_i32(&buf[12..16]);
        let record_type = LogRecordType::from_wire(LittleEndian::read_u32(&buf[16..20]))?;
        if lsn == INVALID_LSN || txn_id == INVALID_TXN_ID {
            return None;
        }

        let body = &buf[LOG_HEADER_SIZE..size as usize];
        let payload = match record_type {
            LogRecordType::Invalid => return None,
            LogRecordType::Begin | LogRecordType::Commit | LogRecordType::Abort => LogPayload::None,
            LogRecordType::Insert
            | LogRecordType::MarkDelete
            | LogRecordType::ApplyDelete
            | LogRecordType::RollbackDelete => {
                let (rid, pos) = read_rid(body)?;
                let (tuple, _) = read_tuple(body, pos)?;
                LogPayload::TupleOp { rid, tuple }
            }
            LogRecordType::Update => {
                let (rid, pos) = read_rid(body)?;
                let (old_tuple, pos) = read_tuple(body, pos)?;
                let (new_tuple, _) = read_tuple(body, pos)?;
                LogPayload::Update {
                    rid,
                    old_tuple,
                    new_tuple,
                }
            }
            LogRecordType::NewPage => {
                if body.len() < 4 {
                    return None;
                }
                LogPayload::NewPage {
                    prev_page_id: LittleEndian::read_i32(&body[0..4]),
                }
            }
        };

        Some(LogRecord {
            size,
            lsn,
            txn_id,
            prev_lsn,
            record_type,
            payload,
        })
    }
}

fn write_rid(buf: &mut [u8], pos: usize, rid: Rid) -> usize {
    LittleEndian::write_i32(&mut buf[pos..pos + 4], rid.page_id);
    LittleEndian::write_u32(&mut buf[pos + 4..pos + 8], rid.slot_num);
    pos + RID_SIZE
}

fn write_tuple(buf: &mut [u8], pos: usize, tuple: &[u8]) -> usize {
    LittleEndian::write_u32(&mut buf[pos..pos + 4], tuple.len() as u32);
    buf[pos + 4..pos + 4 + tuple.len()].copy_from_slice(tuple);
    pos + 4 + tuple.len()
}

fn read_rid(body: &[u8]) -> Option<(Rid, usize)> {
    if body.len() < RID_SIZE {
        return None;
    }
    let rid = Rid::new(
        LittleEndian::read_i32(&body[0..4]),
        LittleEndian::read_u32(&body[4..8]) as SlotNum,
    );
    Some((rid, RID_SIZE))
}

fn read_tuple(body: &[u8], pos: usize) -> Option<(Vec<u8>, usize)> {
    if body.len() < pos + 4 {
        return None;
    }
    let len = LittleEndian::read_u32(&body[pos..pos + 4]) as usize;
    if body.len() < pos + 4 + len {
        return None;
    }
    Some((body[pos + 4..pos + 4 + len].to_vec(), pos + 4 + len))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(mut record: LogRecord) -> LogRecord {
        record.lsn = 42;
        let mut buf = vec![0u8; record.size as usize];
        record.serialize_into(&mut buf);
        let parsed = LogRecord::deserialize(&buf).expect("valid record");
        assert_eq!(parsed, record);
        parsed
    }

    #[test]
    fn test_begin_commit_abort_round_trip() {
        round_trip(LogRecord::new_begin(7));
        round_trip(LogRecord::new_commit(7, 3));
        round_trip(LogRecord::new_abort(7, 3));
    }

    #[test]
    fn test_insert_round_trip() {
        let record = round_trip(LogRecord::new_insert(
            5,
            2,
            Rid::new(3, 2),
            b"tuple bytes".to_vec(),
        ));
        assert_eq!(record.size as usize, LOG_HEADER_SIZE + 8 + 4 + 11);
    }

    #[test]
    fn test_update_round_trip() {
        round_trip(LogRecord::new_update(
            5,
            2,
            Rid::new(1, 0),
            b"old".to_vec(),
            b"newer".to_vec(),
        ));
    }

    #[test]
    fn test_new_page_round_trip() {
        let record = round_trip(LogRecord::new_new_page(9, 4, 12));
        assert_eq!(
            record.payload,
            LogPayload::NewPage { prev_page_id: 12 }
        );
    }

    #[test]
    fn test_truncated_record_rejected() {
        let mut record = LogRecord::new_insert(5, 2, Rid::new(3, 2), vec![1, 2, 3]);
        record.lsn = 1;
        let mut buf = vec![0u8; record.size as usize];
        record.serialize_into(&mut buf);
        assert!(LogRecord::deserialize(&buf[..buf.len() - 1]).is_none());
        assert!(LogRecord::deserialize(&buf[..10]).is_none());
    }

    #[test]
    fn test_garbage_rejected() {
        let buf = [0u8; 64];
        assert!(LogRecord::deserialize(&buf).is_none());
        let mut bad_type = [0u8; LOG_HEADER_SIZE];
        LittleEndian::write_i32(&mut bad_type[0..4], LOG_HEADER_SIZE as i32);
        LittleEndian::write_i32(&mut bad_type[4..8], 1);
        LittleEndian::write_i32(&mut bad_type[8..12], 1);
        LittleEndian::write_u32(&mut bad_type[16..20], 99);
        assert!(LogRecord::deserialize(&bad_type).is_none());
    }
}
