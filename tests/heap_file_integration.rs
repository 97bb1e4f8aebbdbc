//! Integration tests for heap files accessed through the buffer pool.
//!
//! These tests exercise the full insert/delete/scan path end to end,
//! including placement order, slot reuse, durability across reopen, and a
//! seeded random workload checked against an in-memory model.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use strata::buffer::{BufferPool, BufferPoolConfig};
use strata::catalog::Catalog;
use strata::datum::{Type, Value};
use strata::heap::{DbFile, HeapFile, TupleIterator, page_capacity};
use strata::tuple::{Column, Schema, Tuple};
use strata::tx::TransactionId;
use tempfile::TempDir;

/// Int8 key plus a text pad. The pad keeps tuples wide enough that a page
/// holds 29 of them, so multi-page behavior shows up quickly.
fn keyed_schema() -> Schema {
    Schema::new(vec![
        Column::new("key", Type::Int8),
        Column::new("pad", Type::Text),
    ])
}

fn keyed_tuple(key: i64) -> Tuple {
    Tuple::new(vec![Value::Int64(key), Value::Text(format!("pad-{}", key))])
}

fn key_of(tuple: &Tuple) -> i64 {
    match tuple.get(0) {
        Some(Value::Int64(key)) => *key,
        other => panic!("unexpected key value {:?}", other),
    }
}

async fn open_table(
    dir: &TempDir,
    pool_size: usize,
) -> (Arc<BufferPool>, Arc<HeapFile>) {
    let catalog = Arc::new(Catalog::new());
    let file = Arc::new(
        HeapFile::open(dir.path().join("table.tbl"), keyed_schema())
            .await
            .unwrap(),
    );
    catalog.register("table", file.clone());
    let pool = Arc::new(BufferPool::new(
        catalog,
        BufferPoolConfig {
            pool_size,
            lock_timeout: Duration::from_millis(500),
        },
    ));
    (pool, file)
}

async fn scan_keys(pool: &Arc<BufferPool>, file: &Arc<HeapFile>, tid: TransactionId) -> Vec<i64> {
    let mut scan = file.clone().scan(pool.clone(), tid);
    scan.open().await.unwrap();
    let mut keys = Vec::new();
    while scan.has_next().await.unwrap() {
        keys.push(key_of(&scan.next().await.unwrap()));
    }
    keys
}

#[tokio::test]
async fn test_insert_scan_roundtrip_across_pages() {
    let dir = TempDir::new().unwrap();
    let (pool, file) = open_table(&dir, 64).await;
    let tid = TransactionId::fresh();

    let per_page = page_capacity(&keyed_schema()) as i64;
    let total = per_page * 3 + 5;
    for key in 0..total {
        file.insert_tuple(&pool, tid, keyed_tuple(key)).await.unwrap();
    }
    assert_eq!(file.page_count(), 4);

    let keys = scan_keys(&pool, &file, tid).await;
    assert_eq!(keys, (0..total).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_deleted_slots_are_reused_before_growth() {
    let dir = TempDir::new().unwrap();
    let (pool, file) = open_table(&dir, 64).await;
    let tid = TransactionId::fresh();

    // Fill two pages exactly.
    let per_page = page_capacity(&keyed_schema()) as i64;
    let mut stored = Vec::new();
    for key in 0..per_page * 2 {
        stored.push(
            file.insert_tuple(&pool, tid, keyed_tuple(key))
                .await
                .unwrap()
                .tuple,
        );
    }
    assert_eq!(file.page_count(), 2);

    // Free one slot on page 0 and one on page 1, then insert twice. Both
    // inserts must reclaim the freed slots, page 0's first, without
    // growing the file.
    let on_page_0 = &stored[3];
    let on_page_1 = &stored[per_page as usize + 7];
    file.delete_tuple(&pool, tid, on_page_0).await.unwrap();
    file.delete_tuple(&pool, tid, on_page_1).await.unwrap();

    let first = file
        .insert_tuple(&pool, tid, keyed_tuple(1000))
        .await
        .unwrap();
    assert_eq!(first.tuple.rid(), on_page_0.rid());

    let second = file
        .insert_tuple(&pool, tid, keyed_tuple(1001))
        .await
        .unwrap();
    assert_eq!(second.tuple.rid(), on_page_1.rid());
    assert_eq!(file.page_count(), 2);
}

#[tokio::test]
async fn test_committed_data_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let expected: Vec<i64> = (0..100).collect();

    {
        let (pool, file) = open_table(&dir, 64).await;
        let tid = TransactionId::fresh();
        for &key in &expected {
            file.insert_tuple(&pool, tid, keyed_tuple(key)).await.unwrap();
        }
        pool.complete_transaction(tid, true).await.unwrap();
    }

    // A pool smaller than the file forces eviction and reload during the
    // scan.
    let (pool, file) = open_table(&dir, 2).await;
    let tid = TransactionId::fresh();
    let keys = scan_keys(&pool, &file, tid).await;
    assert_eq!(keys, expected);
}

#[tokio::test]
async fn test_deletions_are_durable() {
    let dir = TempDir::new().unwrap();

    {
        let (pool, file) = open_table(&dir, 64).await;
        let tid = TransactionId::fresh();
        let mut stored = Vec::new();
        for key in 0..10 {
            stored.push(
                file.insert_tuple(&pool, tid, keyed_tuple(key))
                    .await
                    .unwrap()
                    .tuple,
            );
        }
        for tuple in stored.iter().filter(|t| key_of(t) % 2 == 0) {
            file.delete_tuple(&pool, tid, tuple).await.unwrap();
        }
        pool.complete_transaction(tid, true).await.unwrap();
    }

    let (pool, file) = open_table(&dir, 64).await;
    let tid = TransactionId::fresh();
    let keys = scan_keys(&pool, &file, tid).await;
    assert_eq!(keys, vec![1, 3, 5, 7, 9]);
    // Deleting never shrinks the file.
    assert_eq!(file.page_count(), 1);
}

#[tokio::test]
async fn test_random_churn_matches_model() {
    let dir = TempDir::new().unwrap();
    let (pool, file) = open_table(&dir, 64).await;
    let tid = TransactionId::fresh();

    let mut rng = StdRng::seed_from_u64(7);
    let mut live: Vec<Tuple> = Vec::new();
    let mut next_key = 0i64;

    for _ in 0..300 {
        if live.is_empty() || rng.gen_bool(0.6) {
            let inserted = file
                .insert_tuple(&pool, tid, keyed_tuple(next_key))
                .await
                .unwrap();
            live.push(inserted.tuple);
            next_key += 1;
        } else {
            let victim = live.swap_remove(rng.gen_range(0..live.len()));
            file.delete_tuple(&pool, tid, &victim).await.unwrap();
        }
    }

    let mut expected: Vec<i64> = live.iter().map(key_of).collect();
    expected.sort_unstable();

    let mut scanned = scan_keys(&pool, &file, tid).await;
    scanned.sort_unstable();
    assert_eq!(scanned, expected);

    // The same state must be readable from disk after commit and reopen.
    pool.complete_transaction(tid, true).await.unwrap();
    drop(pool);
    drop(file);

    let (pool, file) = open_table(&dir, 8).await;
    let tid = TransactionId::fresh();
    let mut reread = scan_keys(&pool, &file, tid).await;
    reread.sort_unstable();
    assert_eq!(reread, expected);
}
