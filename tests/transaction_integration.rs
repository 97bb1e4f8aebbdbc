//! Integration tests for transaction semantics over heap files.
//!
//! Covers lock conflicts between transactions, the timeout-based abort
//! path, commit durability and abort rollback, probe lock release during
//! inserts, and concurrent writers retrying after aborts.

use std::sync::Arc;
use std::time::Duration;

use strata::buffer::{BufferError, BufferPool, BufferPoolConfig};
use strata::catalog::Catalog;
use strata::datum::{Type, Value};
use strata::heap::{DbFile, HeapError, HeapFile, TupleIterator, page_capacity};
use strata::storage::PageId;
use strata::tuple::{Column, Schema, Tuple};
use strata::tx::TransactionId;
use tempfile::TempDir;

fn int_schema() -> Schema {
    Schema::new(vec![Column::new("n", Type::Int8)])
}

fn int_tuple(n: i64) -> Tuple {
    Tuple::new(vec![Value::Int64(n)])
}

async fn open_table(
    dir: &TempDir,
    lock_timeout: Duration,
) -> (Arc<BufferPool>, Arc<HeapFile>) {
    let catalog = Arc::new(Catalog::new());
    let file = Arc::new(
        HeapFile::open(dir.path().join("table.tbl"), int_schema())
            .await
            .unwrap(),
    );
    catalog.register("table", file.clone());
    let pool = Arc::new(BufferPool::new(
        catalog,
        BufferPoolConfig {
            pool_size: 32,
            lock_timeout,
        },
    ));
    (pool, file)
}

async fn count_tuples(pool: &Arc<BufferPool>, file: &Arc<HeapFile>, tid: TransactionId) -> usize {
    let mut scan = file.clone().scan(pool.clone(), tid);
    scan.open().await.unwrap();
    let mut count = 0;
    while scan.has_next().await.unwrap() {
        scan.next().await.unwrap();
        count += 1;
    }
    count
}

#[tokio::test]
async fn test_writer_blocks_writer_until_completion() {
    let dir = TempDir::new().unwrap();
    let (pool, file) = open_table(&dir, Duration::from_millis(50)).await;

    let t1 = TransactionId::fresh();
    file.insert_tuple(&pool, t1, int_tuple(1)).await.unwrap();

    // t1 holds an exclusive lock on page 0, so t2's insert cannot even
    // probe the page and aborts on timeout.
    let t2 = TransactionId::fresh();
    let err = file.insert_tuple(&pool, t2, int_tuple(2)).await;
    assert!(matches!(
        err,
        Err(HeapError::Buffer(BufferError::TransactionAborted(t))) if t == t2
    ));
    pool.complete_transaction(t2, false).await.unwrap();

    // Once t1 commits, a fresh transaction gets through.
    pool.complete_transaction(t1, true).await.unwrap();
    let t3 = TransactionId::fresh();
    file.insert_tuple(&pool, t3, int_tuple(2)).await.unwrap();
    pool.complete_transaction(t3, true).await.unwrap();
}

#[tokio::test]
async fn test_reader_blocks_writer() {
    let dir = TempDir::new().unwrap();
    let (pool, file) = open_table(&dir, Duration::from_millis(50)).await;

    let setup = TransactionId::fresh();
    let stored = file
        .insert_tuple(&pool, setup, int_tuple(1))
        .await
        .unwrap()
        .tuple;
    pool.complete_transaction(setup, true).await.unwrap();

    // A scan leaves the reader holding a shared lock on every page it
    // visited.
    let reader = TransactionId::fresh();
    assert_eq!(count_tuples(&pool, &file, reader).await, 1);
    assert!(pool.holds_lock(reader, PageId::new(file.file_id(), 0)));

    let writer = TransactionId::fresh();
    let err = file.delete_tuple(&pool, writer, &stored).await;
    assert!(matches!(
        err,
        Err(HeapError::Buffer(BufferError::TransactionAborted(_)))
    ));
    pool.complete_transaction(writer, false).await.unwrap();

    pool.complete_transaction(reader, true).await.unwrap();
    let retry = TransactionId::fresh();
    file.delete_tuple(&pool, retry, &stored).await.unwrap();
    pool.complete_transaction(retry, true).await.unwrap();
}

#[tokio::test]
async fn test_readers_share_pages() {
    let dir = TempDir::new().unwrap();
    let (pool, file) = open_table(&dir, Duration::from_millis(50)).await;

    let setup = TransactionId::fresh();
    for n in 0..5 {
        file.insert_tuple(&pool, setup, int_tuple(n)).await.unwrap();
    }
    pool.complete_transaction(setup, true).await.unwrap();

    // Two transactions scan the same pages concurrently without either
    // aborting.
    let r1 = TransactionId::fresh();
    let r2 = TransactionId::fresh();
    assert_eq!(count_tuples(&pool, &file, r1).await, 5);
    assert_eq!(count_tuples(&pool, &file, r2).await, 5);
    pool.complete_transaction(r1, true).await.unwrap();
    pool.complete_transaction(r2, true).await.unwrap();
}

#[tokio::test]
async fn test_aborted_insert_leaves_no_trace() {
    let dir = TempDir::new().unwrap();
    let (pool, file) = open_table(&dir, Duration::from_millis(100)).await;

    let t1 = TransactionId::fresh();
    for n in 0..10 {
        file.insert_tuple(&pool, t1, int_tuple(n)).await.unwrap();
    }
    pool.complete_transaction(t1, false).await.unwrap();

    // The file grew (growth is not rolled back) but the page came to disk
    // zeroed, so nothing is visible.
    assert_eq!(file.page_count(), 1);
    let t2 = TransactionId::fresh();
    assert_eq!(count_tuples(&pool, &file, t2).await, 0);

    // The freed slots are reusable by later transactions.
    pool.complete_transaction(t2, true).await.unwrap();
    let t3 = TransactionId::fresh();
    let inserted = file.insert_tuple(&pool, t3, int_tuple(42)).await.unwrap();
    assert_eq!(inserted.tuple.rid().unwrap().slot, 0);
    pool.complete_transaction(t3, true).await.unwrap();
}

#[tokio::test]
async fn test_insert_releases_probe_locks_on_full_pages() {
    let dir = TempDir::new().unwrap();
    // Generous timeout: this test must not rely on timing.
    let (pool, file) = open_table(&dir, Duration::from_secs(5)).await;

    // Fill page 0 completely and commit.
    let setup = TransactionId::fresh();
    let per_page = page_capacity(&int_schema()) as i64;
    for n in 0..per_page {
        file.insert_tuple(&pool, setup, int_tuple(n)).await.unwrap();
    }
    pool.complete_transaction(setup, true).await.unwrap();

    // t1's insert probes page 0, finds it full, and must give that lock
    // back before landing on page 1.
    let t1 = TransactionId::fresh();
    let inserted = file
        .insert_tuple(&pool, t1, int_tuple(per_page))
        .await
        .unwrap();
    let page_0 = PageId::new(file.file_id(), 0);
    assert_eq!(inserted.tuple.rid().unwrap().page.page_no, 1);
    assert!(!pool.holds_lock(t1, page_0));
    assert!(pool.holds_lock(t1, PageId::new(file.file_id(), 1)));

    // With page 0 unlocked, another transaction can write it while t1 is
    // still running.
    let t2 = TransactionId::fresh();
    let guard = pool.fetch_page_mut(t2, page_0).await.unwrap();
    drop(guard);
    pool.complete_transaction(t2, true).await.unwrap();
    pool.complete_transaction(t1, true).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_inserters_retry_after_abort() {
    let dir = TempDir::new().unwrap();
    let (pool, file) = open_table(&dir, Duration::from_millis(20)).await;

    let workers = 8;
    let inserts_per_worker = 5;

    let mut handles = Vec::new();
    for worker in 0..workers {
        let pool = pool.clone();
        let file = file.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..inserts_per_worker {
                let value = (worker * 100 + i) as i64;
                // Aborted transactions release their locks and retry with
                // a fresh id, as a client would.
                loop {
                    let tid = TransactionId::fresh();
                    match file.insert_tuple(&pool, tid, int_tuple(value)).await {
                        Ok(_) => {
                            pool.complete_transaction(tid, true).await.unwrap();
                            break;
                        }
                        Err(HeapError::Buffer(BufferError::TransactionAborted(_))) => {
                            pool.complete_transaction(tid, false).await.unwrap();
                            tokio::task::yield_now().await;
                        }
                        Err(err) => panic!("unexpected insert error: {}", err),
                    }
                }
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let tid = TransactionId::fresh();
    let mut scan = file.clone().scan(pool.clone(), tid);
    scan.open().await.unwrap();
    let mut values = Vec::new();
    while scan.has_next().await.unwrap() {
        match scan.next().await.unwrap().get(0) {
            Some(Value::Int64(n)) => values.push(*n),
            other => panic!("unexpected value {:?}", other),
        }
    }
    values.sort_unstable();

    let mut expected: Vec<i64> = (0..workers)
        .flat_map(|w| (0..inserts_per_worker).map(move |i| (w * 100 + i) as i64))
        .collect();
    expected.sort_unstable();
    assert_eq!(values, expected);
}
