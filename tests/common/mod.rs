#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tempfile::TempDir;

use txcache::{
    BufferPool, Catalog, Config, DirtyPagePolicy, Error, HeapFile, Page, PageId, PageStore,
    Result, SharedPage, TableId, TransactionId, Tuple, WriteAheadLog,
};

pub const PAGE_SIZE: usize = 256;
pub const TUPLE_WIDTH: usize = 8;
pub const TABLE: TableId = TableId(1);

pub fn setup_logger() {
    use std::io::Write;

    fn tn() -> String {
        std::thread::current()
            .name()
            .unwrap_or("unknown")
            .to_owned()
    }

    let mut builder = env_logger::Builder::new();
    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "{:05} {:20} {:12} {}",
                record.level(),
                tn(),
                record
                    .module_path()
                    .and_then(|path| path.split("::").last())
                    .unwrap_or("?"),
                record.args()
            )
        })
        .filter(None, log::LevelFilter::Info);

    if let Ok(env) = std::env::var("RUST_LOG") {
        builder.parse_filters(&env);
    }

    let _r = builder.try_init();
}

/// Everything the pool asked its log and page store to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    LogWrite {
        tid: TransactionId,
        page_id: PageId,
        before: Vec<u8>,
        after: Vec<u8>,
    },
    LogCommit(TransactionId),
    Force,
    PageWrite {
        page_id: PageId,
        bytes: Vec<u8>,
    },
}

pub type Events = Arc<Mutex<Vec<Event>>>;

/// In-memory log that records every call.
pub struct RecordingLog {
    events: Events,
}

impl WriteAheadLog for RecordingLog {
    fn log_write(
        &self,
        tid: TransactionId,
        page_id: PageId,
        before: &[u8],
        after: &[u8],
    ) -> Result<()> {
        self.events.lock().push(Event::LogWrite {
            tid,
            page_id,
            before: before.to_vec(),
            after: after.to_vec(),
        });
        Ok(())
    }

    fn log_commit(&self, tid: TransactionId) -> Result<()> {
        self.events.lock().push(Event::LogCommit(tid));
        Ok(())
    }

    fn force(&self) -> Result<()> {
        self.events.lock().push(Event::Force);
        Ok(())
    }
}

/// Heap file wrapper that records page writes and can be told to fail them.
pub struct RecordingStore {
    inner: Arc<HeapFile>,
    events: Events,
    fail_writes: Arc<AtomicBool>,
}

impl PageStore for RecordingStore {
    fn table_id(&self) -> TableId {
        self.inner.table_id()
    }

    fn read_page(&self, page_id: PageId) -> Result<Page> {
        self.inner.read_page(page_id)
    }

    fn write_page(&self, page: &Page) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Io(std::io::Error::other("injected write failure")));
        }
        self.events.lock().push(Event::PageWrite {
            page_id: page.id(),
            bytes: page.as_slice().to_vec(),
        });
        self.inner.write_page(page)
    }

    fn num_pages(&self) -> Result<u32> {
        self.inner.num_pages()
    }

    fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<SharedPage>> {
        self.inner.insert_tuple(pool, tid, tuple)
    }

    fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<SharedPage>> {
        self.inner.delete_tuple(pool, tid, tuple)
    }
}

pub struct Harness {
    pub pool: Arc<BufferPool>,
    pub file: Arc<HeapFile>,
    pub events: Events,
    pub fail_writes: Arc<AtomicBool>,
    _dir: TempDir,
}

impl Harness {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn clear_events(&self) {
        self.events.lock().clear();
    }

    /// First byte of a page as the heap file currently stores it.
    pub fn disk_byte(&self, page_id: PageId) -> u8 {
        self.file.read_page(page_id).unwrap().as_slice()[0]
    }
}

pub fn pid(page_number: u32) -> PageId {
    PageId::new(TABLE, page_number)
}

pub fn test_config(capacity: usize) -> Config {
    Config {
        page_size: PAGE_SIZE,
        pool_capacity: capacity,
        lock_timeout: Duration::from_millis(200),
        dirty_page_policy: DirtyPagePolicy::default(),
    }
}

/// A pool over one recorded heap file holding `pages` empty pages.
pub fn create_pool(config: Config, pages: u32) -> Harness {
    setup_logger();

    let dir = tempfile::tempdir().unwrap();
    let file = Arc::new(
        HeapFile::create(dir.path().join("table.dat"), TABLE, TUPLE_WIDTH, PAGE_SIZE).unwrap(),
    );
    for _ in 0..pages {
        file.allocate_page().unwrap();
    }

    let events: Events = Arc::default();
    let fail_writes = Arc::new(AtomicBool::new(false));
    let catalog = Arc::new(Catalog::new());
    catalog.add_table(
        Arc::new(RecordingStore {
            inner: Arc::clone(&file),
            events: Arc::clone(&events),
            fail_writes: Arc::clone(&fail_writes),
        }),
        "table",
    );
    let log = Arc::new(RecordingLog {
        events: Arc::clone(&events),
    });

    let pool = Arc::new(BufferPool::new(&config, catalog, log).unwrap());

    Harness {
        pool,
        file,
        events,
        fail_writes,
        _dir: dir,
    }
}

/// Overwrite the first byte of a page and mark it dirty by `tid`.
pub fn write_byte(page: &SharedPage, tid: TransactionId, value: u8) {
    let mut page = page.write();
    page.as_mut_slice()[0] = value;
    page.mark_dirty(tid);
}
