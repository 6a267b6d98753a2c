#![allow(dead_code)]

use async_trait::async_trait;
use deposit_monitor::blockchain::{ChainClient, DepositProcessor, EventSource, TransactionResolver};
use deposit_monitor::database::{DepositStore, SqliteDepositStore};
use deposit_monitor::error::{MonitorError, ResolutionError, SinkError, StoreError};
use deposit_monitor::models::{ChainBlock, ChainTransaction, DepositRecord, LogMatch};
use deposit_monitor::sinks::{AuditLog, DepositMetrics, Notifier, SinkFanout};
use ethers::types::U256;
use futures::stream::{self, BoxStream, StreamExt};
use prometheus::Registry;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::mpsc;

pub const COLLECTION: &str = "rt deposits";
pub const DEPOSIT_BLOCK: u64 = 18_570_000;
pub const DEPOSIT_TIMESTAMP: u64 = 1_700_000_000;

pub fn tx_hash(n: u8) -> String {
    format!("0x{}", format!("{:02x}", n).repeat(32))
}

pub fn gwei(amount: u64) -> U256 {
    U256::from(amount) * U256::exp10(9)
}

/// 1.5 ETH at 20 gwei with a 21000 gas limit
pub fn deposit_transaction(hash: &str) -> ChainTransaction {
    ChainTransaction {
        hash: hash.to_string(),
        from: "0x1111111111111111111111111111111111111111".to_string(),
        to: Some("0x00000000219ab540356cBB839Cbe05303d7705Fa".to_string()),
        value: U256::from(15) * U256::exp10(17),
        gas_price: gwei(20),
        gas_limit: U256::from(21_000),
        block_number: Some(DEPOSIT_BLOCK),
    }
}

/// In-memory chain with configurable transactions and blocks
#[derive(Default)]
pub struct FakeChain {
    transactions: Mutex<HashMap<String, ChainTransaction>>,
    blocks: Mutex<HashMap<u64, ChainBlock>>,
    fail_rpc: AtomicBool,
    pub transaction_calls: AtomicUsize,
}

impl FakeChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_block(self, number: u64, timestamp: u64) -> Self {
        self.blocks.lock().unwrap().insert(number, ChainBlock { number, timestamp });
        self
    }

    pub fn with_transaction(self, tx: ChainTransaction) -> Self {
        self.transactions.lock().unwrap().insert(tx.hash.clone(), tx);
        self
    }

    pub fn fail_rpc(self) -> Self {
        self.fail_rpc.store(true, Ordering::SeqCst);
        self
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn get_transaction(&self, hash: &str) -> Result<Option<ChainTransaction>, ResolutionError> {
        self.transaction_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_rpc.load(Ordering::SeqCst) {
            return Err(ResolutionError::Rpc {
                method: "eth_getTransactionByHash".to_string(),
                message: "connection reset by peer".to_string(),
            });
        }
        Ok(self.transactions.lock().unwrap().get(hash).cloned())
    }

    async fn get_block(&self, number: u64) -> Result<Option<ChainBlock>, ResolutionError> {
        Ok(self.blocks.lock().unwrap().get(&number).cloned())
    }
}

/// SQLite store that counts calls and can be switched to fail every insert
pub struct CountingStore {
    inner: SqliteDepositStore,
    fail: bool,
    pub inserts: AtomicUsize,
    pub closes: AtomicUsize,
}

impl CountingStore {
    pub fn new() -> Self {
        Self {
            inner: SqliteDepositStore::new_in_memory().expect("Failed to create store"),
            fail: false,
            inserts: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self { fail: true, ..Self::new() }
    }

    pub fn inner(&self) -> &SqliteDepositStore {
        &self.inner
    }

    pub fn insert_count(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DepositStore for CountingStore {
    async fn insert(&self, collection: &str, record: &DepositRecord) -> Result<(), StoreError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(StoreError::Operation("connection refused".to_string()));
        }
        self.inner.insert(collection, record).await
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.inner.close().await
    }
}

/// Notifier that records every message it is asked to send
pub struct RecordingNotifier {
    configured: bool,
    fail: bool,
    pub messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self { configured: true, fail: false, messages: Mutex::new(Vec::new()) }
    }

    pub fn unconfigured() -> Self {
        Self { configured: false, ..Self::new() }
    }

    pub fn failing() -> Self {
        Self { fail: true, ..Self::new() }
    }

    pub fn sent(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn send(&self, text: &str) -> Result<(), SinkError> {
        self.messages.lock().unwrap().push(text.to_string());
        if self.fail {
            return Err(SinkError::Notification("chat endpoint unreachable".to_string()));
        }
        Ok(())
    }
}

/// Event source fed through a channel; dropping the sender ends the stream
pub struct ChannelSource {
    receiver: Mutex<Option<mpsc::UnboundedReceiver<LogMatch>>>,
}

impl ChannelSource {
    pub fn new() -> (Self, mpsc::UnboundedSender<LogMatch>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { receiver: Mutex::new(Some(receiver)) }, sender)
    }
}

#[async_trait]
impl EventSource for ChannelSource {
    async fn subscribe<'a>(&'a self) -> Result<BoxStream<'a, LogMatch>, MonitorError> {
        let receiver = self
            .receiver
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| MonitorError::Subscription("already subscribed".to_string()))?;

        Ok(stream::unfold(receiver, |mut receiver| async move {
            receiver.recv().await.map(|log_match| (log_match, receiver))
        })
        .boxed())
    }
}

/// Event source whose subscription is always refused
pub struct RefusingSource;

#[async_trait]
impl EventSource for RefusingSource {
    async fn subscribe<'a>(&'a self) -> Result<BoxStream<'a, LogMatch>, MonitorError> {
        Err(MonitorError::Subscription("connection refused".to_string()))
    }
}

/// A processor wired to fakes, with its audit log in a temp directory
pub struct Harness {
    pub processor: DepositProcessor,
    pub metrics: DepositMetrics,
    pub registry: Registry,
    pub audit_path: PathBuf,
    _dir: TempDir,
}

impl Harness {
    pub fn new(
        chain: Arc<FakeChain>,
        store: Arc<CountingStore>,
        notifier: Arc<dyn Notifier>,
        test_mode: bool,
    ) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let audit_path = dir.path().join("transactions.log");

        let registry = Registry::new();
        let metrics = DepositMetrics::new(&registry).expect("Failed to register metrics");

        let fanout = SinkFanout::new(
            metrics.clone(),
            store,
            notifier,
            Arc::new(AuditLog::new(audit_path.clone())),
            COLLECTION,
            test_mode,
        );
        let processor = DepositProcessor::new(TransactionResolver::new(chain), fanout);

        Self { processor, metrics, registry, audit_path, _dir: dir }
    }

    pub fn audit_lines(&self) -> Vec<String> {
        read_lines(&self.audit_path)
    }
}

pub fn read_lines(path: &PathBuf) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => contents.lines().map(str::to_string).collect(),
        Err(_) => Vec::new(),
    }
}
