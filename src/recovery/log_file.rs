//! Log File - an append-only, file-backed write-ahead log.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::common::{PageId, Result, TransactionId};
use crate::recovery::{LogRecord, WriteAheadLog};

/// Write-ahead log stored in a single append-only file.
///
/// Records are buffered in memory until [`force`](WriteAheadLog::force),
/// which flushes the buffer and `fsync`s the file. Nothing appended before
/// a `force` is guaranteed to survive a crash.
pub struct LogFile {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl LogFile {
    /// Create a new, empty log.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .append(true)
            .create_new(true)
            .open(&path)?;

        Ok(Self::from_file(path.as_ref(), file))
    }

    /// Open an existing log, appending after its current end.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().append(true).open(&path)?;
        Ok(Self::from_file(path.as_ref(), file))
    }

    fn from_file(path: &Path, file: File) -> Self {
        Self {
            path: path.to_path_buf(),
            writer: Mutex::new(BufWriter::new(file)),
        }
    }

    /// Read back every record, including ones not yet forced.
    ///
    /// # Errors
    /// - `Error::CorruptLog` if a record fails its checksum
    pub fn read_records(&self) -> Result<Vec<LogRecord>> {
        // Hold the writer so no record is half-written while we read
        let mut writer = self.writer.lock();
        writer.flush()?;
        let bytes = std::fs::read(&self.path)?;
        LogRecord::decode_all(&bytes)
    }

    fn append(&self, buf: &[u8]) -> Result<()> {
        self.writer.lock().write_all(buf)?;
        Ok(())
    }
}

impl WriteAheadLog for LogFile {
    fn log_write(
        &self,
        tid: TransactionId,
        page_id: PageId,
        before: &[u8],
        after: &[u8],
    ) -> Result<()> {
        let mut buf = Vec::with_capacity(before.len() * 2 + 32);
        LogRecord::encode_update(&mut buf, tid, page_id, before, after);
        self.append(&buf)
    }

    fn log_commit(&self, tid: TransactionId) -> Result<()> {
        let mut buf = Vec::with_capacity(16);
        LogRecord::encode_commit(&mut buf, tid);
        self.append(&buf)
    }

    fn force(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.flush()?;
        writer.get_ref().sync_data()?;
        Ok(())
    }
}
