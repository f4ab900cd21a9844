//! Shared wiring for integration tests: an in-memory ledger, seeded catalogs,
//! and a failure-injecting store for saga tests.

// Each test binary uses a subset of this harness.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::mpsc;

use siteledger::catalog::{InMemoryCatalog, InMemoryTemplateCatalog};
use siteledger::events::{Event, EventSender};
use siteledger::models::template::{LocationTemplate, TemplateItem};
use siteledger::services::InventoryServices;
use siteledger::store::{
    keys, Document, LedgerStore, MemoryLedgerStore, QueryOptions, StoreError,
};

pub fn dec(value: i64) -> Decimal {
    Decimal::new(value * 10_000, 4)
}

pub struct TestLedger {
    pub services: InventoryServices,
    pub store: Arc<MemoryLedgerStore>,
    pub catalog: Arc<InMemoryCatalog>,
    pub templates: Arc<InMemoryTemplateCatalog>,
    pub events: mpsc::Receiver<Event>,
}

/// Builds a full service stack over one in-memory store with materials
/// M1/M2/M3 and the "plumbing-van" template preloaded.
pub fn test_ledger() -> TestLedger {
    let store = Arc::new(MemoryLedgerStore::new());
    let catalog = Arc::new(InMemoryCatalog::new());
    catalog.insert_basic("M1", "Copper pipe 15mm");
    catalog.insert_basic("M2", "Ball valve 1/2in");
    catalog.insert_basic("M3", "PTFE tape");

    let templates = Arc::new(InMemoryTemplateCatalog::new());
    templates.insert(LocationTemplate {
        id: "plumbing-van".to_string(),
        name: "Standard plumbing van".to_string(),
        items: vec![
            TemplateItem {
                material_id: "M1".to_string(),
                standard_quantity: dec(20),
                bin_location: Some("A1".to_string()),
            },
            TemplateItem {
                material_id: "M2".to_string(),
                standard_quantity: dec(8),
                bin_location: None,
            },
        ],
    });

    let (event_sender, events) = EventSender::channel(64);
    let services = InventoryServices::new(
        store.clone(),
        catalog.clone(),
        templates.clone(),
        Some(event_sender),
        true,
    );

    TestLedger {
        services,
        store,
        catalog,
        templates,
        events,
    }
}

/// Store wrapper that, once armed, rejects transaction-row writes to a single
/// partition. Everything else passes through, which is exactly the shape of a
/// destination-side failure mid-transfer.
pub struct FlakyStore {
    inner: MemoryLedgerStore,
    fail_partition: String,
    armed: AtomicBool,
}

impl FlakyStore {
    pub fn new(fail_partition: impl Into<String>) -> Self {
        Self {
            inner: MemoryLedgerStore::new(),
            fail_partition: fail_partition.into(),
            armed: AtomicBool::new(false),
        }
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    pub fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerStore for FlakyStore {
    async fn get(
        &self,
        partition_key: &str,
        sort_key: &str,
    ) -> Result<Option<Document>, StoreError> {
        self.inner.get(partition_key, sort_key).await
    }

    async fn put(
        &self,
        partition_key: &str,
        sort_key: &str,
        record: Document,
    ) -> Result<(), StoreError> {
        if self.armed.load(Ordering::SeqCst)
            && partition_key == self.fail_partition
            && sort_key.starts_with(keys::TRANSACTION_PREFIX)
        {
            return Err(StoreError::Unavailable(format!(
                "injected write failure for {partition_key}"
            )));
        }
        self.inner.put(partition_key, sort_key, record).await
    }

    async fn update(
        &self,
        partition_key: &str,
        sort_key: &str,
        delta: Document,
    ) -> Result<Document, StoreError> {
        self.inner.update(partition_key, sort_key, delta).await
    }

    async fn query_prefix(
        &self,
        partition_key: &str,
        sort_key_prefix: &str,
        options: QueryOptions,
    ) -> Result<Vec<Document>, StoreError> {
        self.inner
            .query_prefix(partition_key, sort_key_prefix, options)
            .await
    }
}

/// Store wrapper that yields to the scheduler before every operation. Plain
/// [`MemoryLedgerStore`] awaits never suspend, so racing tasks run back to
/// back; the yields force real interleaving at each store access.
pub struct YieldStore {
    inner: MemoryLedgerStore,
}

impl YieldStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryLedgerStore::new(),
        }
    }
}

#[async_trait]
impl LedgerStore for YieldStore {
    async fn get(
        &self,
        partition_key: &str,
        sort_key: &str,
    ) -> Result<Option<Document>, StoreError> {
        tokio::task::yield_now().await;
        self.inner.get(partition_key, sort_key).await
    }

    async fn put(
        &self,
        partition_key: &str,
        sort_key: &str,
        record: Document,
    ) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        self.inner.put(partition_key, sort_key, record).await
    }

    async fn update(
        &self,
        partition_key: &str,
        sort_key: &str,
        delta: Document,
    ) -> Result<Document, StoreError> {
        tokio::task::yield_now().await;
        self.inner.update(partition_key, sort_key, delta).await
    }

    async fn query_prefix(
        &self,
        partition_key: &str,
        sort_key_prefix: &str,
        options: QueryOptions,
    ) -> Result<Vec<Document>, StoreError> {
        tokio::task::yield_now().await;
        self.inner
            .query_prefix(partition_key, sort_key_prefix, options)
            .await
    }
}

/// Same stack as [`test_ledger`] but over a [`YieldStore`], for interleaving
/// tests.
pub fn yielding_ledger() -> InventoryServices {
    let store = Arc::new(YieldStore::new());
    let catalog = Arc::new(InMemoryCatalog::new());
    catalog.insert_basic("M1", "Copper pipe 15mm");
    catalog.insert_basic("M2", "Ball valve 1/2in");
    let templates = Arc::new(InMemoryTemplateCatalog::new());

    InventoryServices::new(store, catalog, templates, None, true)
}

/// Same stack as [`test_ledger`] but over a [`FlakyStore`].
pub fn flaky_ledger(fail_partition: &str) -> (InventoryServices, Arc<FlakyStore>) {
    let store = Arc::new(FlakyStore::new(fail_partition));
    let catalog = Arc::new(InMemoryCatalog::new());
    catalog.insert_basic("M1", "Copper pipe 15mm");
    catalog.insert_basic("M2", "Ball valve 1/2in");
    let templates = Arc::new(InMemoryTemplateCatalog::new());

    let services = InventoryServices::new(store.clone(), catalog, templates, None, true);
    (services, store)
}
