//! Log record types and their on-disk encoding.
//!
//! # Record Layout
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       1     kind (1 = update, 2 = commit)
//! 1       8     transaction id (little-endian)
//! -- update records only --
//! 9       4     table id
//! 13      4     page number
//! 17      4     image length L
//! 21      L     before-image
//! 21+L    L     after-image
//! -- all records --
//! end-4   4     CRC32 of every preceding byte of the record
//! ```

use crate::common::{Error, PageId, Result, TableId, TransactionId};

const KIND_UPDATE: u8 = 1;
const KIND_COMMIT: u8 = 2;

/// One entry of the write-ahead log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    /// A page changed from `before` to `after` under `tid`.
    Update {
        tid: TransactionId,
        page_id: PageId,
        before: Vec<u8>,
        after: Vec<u8>,
    },
    /// `tid` committed; every update record for it precedes this one.
    Commit { tid: TransactionId },
}

impl LogRecord {
    pub fn tid(&self) -> TransactionId {
        match self {
            LogRecord::Update { tid, .. } | LogRecord::Commit { tid } => *tid,
        }
    }

    /// Append the encoded update record to `buf` without copying the images
    /// into a `LogRecord` first.
    pub(crate) fn encode_update(
        buf: &mut Vec<u8>,
        tid: TransactionId,
        page_id: PageId,
        before: &[u8],
        after: &[u8],
    ) {
        debug_assert_eq!(before.len(), after.len());
        let start = buf.len();
        buf.push(KIND_UPDATE);
        buf.extend_from_slice(&tid.0.to_le_bytes());
        buf.extend_from_slice(&page_id.table_id.0.to_le_bytes());
        buf.extend_from_slice(&page_id.page_number.to_le_bytes());
        buf.extend_from_slice(&(before.len() as u32).to_le_bytes());
        buf.extend_from_slice(before);
        buf.extend_from_slice(after);
        let crc = crc32fast::hash(&buf[start..]);
        buf.extend_from_slice(&crc.to_le_bytes());
    }

    pub(crate) fn encode_commit(buf: &mut Vec<u8>, tid: TransactionId) {
        let start = buf.len();
        buf.push(KIND_COMMIT);
        buf.extend_from_slice(&tid.0.to_le_bytes());
        let crc = crc32fast::hash(&buf[start..]);
        buf.extend_from_slice(&crc.to_le_bytes());
    }

    /// Encode this record.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        match self {
            LogRecord::Update {
                tid,
                page_id,
                before,
                after,
            } => Self::encode_update(buf, *tid, *page_id, before, after),
            LogRecord::Commit { tid } => Self::encode_commit(buf, *tid),
        }
    }

    /// Decode every record in `bytes`.
    ///
    /// # Errors
    /// - `Error::CorruptLog` with the offset of the first record that is
    ///   truncated, has an unknown kind, or fails its checksum
    pub fn decode_all(bytes: &[u8]) -> Result<Vec<LogRecord>> {
        let mut records = Vec::new();
        let mut offset = 0;

        while offset < bytes.len() {
            let (record, len) =
                Self::decode_one(&bytes[offset..]).ok_or(Error::CorruptLog(offset as u64))?;
            records.push(record);
            offset += len;
        }

        Ok(records)
    }

    fn decode_one(bytes: &[u8]) -> Option<(LogRecord, usize)> {
        let kind = *bytes.first()?;
        let tid = TransactionId(u64::from_le_bytes(bytes.get(1..9)?.try_into().ok()?));

        let (record, body_len) = match kind {
            KIND_UPDATE => {
                let table_id = read_u32(bytes, 9)?;
                let page_number = read_u32(bytes, 13)?;
                let len = read_u32(bytes, 17)? as usize;
                let before = bytes.get(21..21 + len)?.to_vec();
                let after = bytes.get(21 + len..21 + 2 * len)?.to_vec();
                let record = LogRecord::Update {
                    tid,
                    page_id: PageId::new(TableId(table_id), page_number),
                    before,
                    after,
                };
                (record, 21 + 2 * len)
            }
            KIND_COMMIT => (LogRecord::Commit { tid }, 9),
            _ => return None,
        };

        let stored_crc = read_u32(bytes, body_len)?;
        if crc32fast::hash(&bytes[..body_len]) != stored_crc {
            return None;
        }

        Some((record, body_len + 4))
    }
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_le_bytes(bytes.get(at..at + 4)?.try_into().ok()?))
}
