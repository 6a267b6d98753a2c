mod common;

use common::*;
use deposit_monitor::app::{build_processor, process_hashes};
use deposit_monitor::blockchain::ProcessOutcome;
use deposit_monitor::config::AppConfig;
use prometheus::Registry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tempfile::TempDir;

const TEST_COLLECTION: &str = "test deposits";

fn tester_config(dir: &TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.audit.path = dir.path().join("transactions.log").to_string_lossy().into_owned();
    config
}

#[tokio::test]
async fn test_batch_processes_each_hash_into_test_collection() {
    let found = tx_hash(40);
    let missing = tx_hash(41);
    let chain = Arc::new(
        FakeChain::new()
            .with_block(DEPOSIT_BLOCK, DEPOSIT_TIMESTAMP)
            .with_transaction(deposit_transaction(&found)),
    );
    let store = Arc::new(CountingStore::new());
    let dir = TempDir::new().unwrap();
    let config = tester_config(&dir);
    let registry = Registry::new();

    let processor = build_processor(&config, chain.clone(), store.clone(), TEST_COLLECTION, &registry).unwrap();

    let outcomes = process_hashes(&processor, store.as_ref(), &[found.clone(), missing.clone()])
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].0, found);
    assert!(outcomes[0].1.is_success());
    assert_eq!(outcomes[1].0, missing);
    assert!(matches!(outcomes[1].1, ProcessOutcome::NotFound));
    assert_eq!(outcomes[1].1.to_string(), "transaction not found");

    // once per hash
    assert_eq!(chain.transaction_calls.load(Ordering::SeqCst), 2);
    assert_eq!(store.insert_count(), 1);
    assert_eq!(store.inner().get_deposit(TEST_COLLECTION, &found).unwrap().value, "1.5");
    assert_eq!(store.inner().count(COLLECTION).unwrap(), 0);

    assert_eq!(store.closes.load(Ordering::SeqCst), 1);

    let lines = read_lines(&dir.path().join("transactions.log"));
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("Success: true"));
    assert!(lines[1].ends_with("Success: false"));
}

#[tokio::test]
async fn test_batch_reports_rpc_failures_without_aborting() {
    let store = Arc::new(CountingStore::new());
    let dir = TempDir::new().unwrap();
    let config = tester_config(&dir);

    let processor = build_processor(
        &config,
        Arc::new(FakeChain::new().fail_rpc()),
        store.clone(),
        TEST_COLLECTION,
        &Registry::new(),
    )
    .unwrap();

    let outcomes = process_hashes(&processor, store.as_ref(), &[tx_hash(42), tx_hash(43)])
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 2);
    for (_, outcome) in &outcomes {
        assert!(matches!(outcome, ProcessOutcome::Failed(_)));
        assert!(outcome.to_string().starts_with("failed: "));
    }
    assert_eq!(store.insert_count(), 0);
    assert_eq!(store.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_delivered_outcome_lists_every_sink() {
    let hash = tx_hash(44);
    let chain = Arc::new(
        FakeChain::new()
            .with_block(DEPOSIT_BLOCK, DEPOSIT_TIMESTAMP)
            .with_transaction(deposit_transaction(&hash)),
    );
    let store = Arc::new(CountingStore::new());
    let dir = TempDir::new().unwrap();
    let mut config = tester_config(&dir);
    config.processing.test_mode = true;

    let processor = build_processor(&config, chain, store.clone(), TEST_COLLECTION, &Registry::new()).unwrap();
    let outcomes = process_hashes(&processor, store.as_ref(), &[hash]).await.unwrap();

    assert_eq!(
        outcomes[0].1.to_string(),
        "delivered (metrics: delivered, store: skipped, notification: skipped, audit: delivered)"
    );
    assert_eq!(store.insert_count(), 0);
}
