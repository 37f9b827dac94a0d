use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use tempfile::TempDir;
use txcache::{
    BufferPool, Catalog, Config, HeapFile, LockManager, LockMode, LogFile, PageId, Permissions,
    TableId, TransactionId,
};

const TABLE: TableId = TableId(1);

fn setup_pool(capacity: usize, pages: u32) -> (BufferPool, TempDir) {
    let dir = TempDir::new().unwrap();
    let config = Config {
        pool_capacity: capacity,
        ..Config::default()
    };

    let file = HeapFile::create(dir.path().join("bench.dat"), TABLE, 64, config.page_size).unwrap();
    for _ in 0..pages {
        file.allocate_page().unwrap();
    }

    let catalog = Arc::new(Catalog::new());
    catalog.add_table(Arc::new(file), "bench");
    let log = Arc::new(LogFile::create(dir.path().join("bench.wal")).unwrap());

    (BufferPool::new(&config, catalog, log).unwrap(), dir)
}

fn benchmark_cache_hit(c: &mut Criterion) {
    let (pool, _dir) = setup_pool(16, 16);
    let tid = TransactionId(1);
    for n in 0..16 {
        pool.get_page(tid, PageId::new(TABLE, n), Permissions::ReadOnly)
            .unwrap();
    }

    c.bench_function("get_page_hit", |b| {
        let mut n = 0;
        b.iter(|| {
            n = (n + 1) % 16;
            black_box(
                pool.get_page(tid, PageId::new(TABLE, n), Permissions::ReadOnly)
                    .unwrap(),
            );
        });
    });
}

fn benchmark_eviction_churn(c: &mut Criterion) {
    let (pool, _dir) = setup_pool(8, 64);

    c.bench_function("get_page_miss_with_eviction", |b| {
        let mut tid = 0;
        let mut n = 0;
        b.iter(|| {
            tid += 1;
            n = (n + 1) % 64;
            let tid = TransactionId(tid);
            black_box(
                pool.get_page(tid, PageId::new(TABLE, n), Permissions::ReadOnly)
                    .unwrap(),
            );
            pool.transaction_complete(tid, true).unwrap();
        });
    });
}

fn benchmark_lock_acquire_release(c: &mut Criterion) {
    let lm = LockManager::default();
    let page = PageId::new(TABLE, 0);

    c.bench_function("lock_acquire_release", |b| {
        b.iter(|| {
            lm.acquire_lock(page, TransactionId(1), LockMode::Shared)
                .unwrap();
            lm.acquire_lock(page, TransactionId(1), LockMode::Exclusive)
                .unwrap();
            lm.release_all_locks(TransactionId(1));
        });
    });
}

criterion_group!(
    benches,
    benchmark_cache_hit,
    benchmark_eviction_churn,
    benchmark_lock_acquire_release
);
criterion_main!(benches);
