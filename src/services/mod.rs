pub mod checks;
pub mod levels;
pub mod locks;
pub mod reconcile;
pub mod templates;
pub mod transactions;
pub mod transfers;

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::catalog::{CachedCatalog, MaterialCatalog, TemplateCatalog};
use crate::config::AppConfig;
use crate::events::{Event, EventSender};
use crate::store::LedgerStore;

pub use checks::CheckService;
pub use levels::{LevelService, UpsertLevel};
pub use locks::{CheckLocks, LevelLocks};
pub use reconcile::{LevelDrift, ReconciliationService, RepairOutcome};
pub use templates::{TemplateApplication, TemplateService};
pub use transactions::{RecordOptions, TransactionService};
pub use transfers::{
    TransactionSink, TransferItem, TransferOutcome, TransferRequest, TransferService,
};

/// All inventory services wired over shared dependencies.
///
/// The field-side recorder doubles as the warehouse sink by default; callers
/// integrating the sibling warehouse inventory service swap in their own
/// [`TransactionSink`] via [`InventoryServices::with_warehouse_sink`].
pub struct InventoryServices {
    pub levels: LevelService,
    pub transactions: Arc<TransactionService>,
    pub transfers: TransferService,
    pub checks: CheckService,
    pub templates: TemplateService,
    pub reconcile: ReconciliationService,
    event_sender: Option<EventSender>,
    transfer_stock_check: bool,
}

impl InventoryServices {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        catalog: Arc<dyn MaterialCatalog>,
        template_catalog: Arc<dyn TemplateCatalog>,
        event_sender: Option<EventSender>,
        transfer_stock_check: bool,
    ) -> Self {
        Self::assemble(
            store,
            catalog,
            template_catalog,
            event_sender,
            transfer_stock_check,
            false,
        )
    }

    /// Builds the stack from application configuration: the event channel is
    /// sized by `event_channel_capacity`, the catalog is wrapped in a TTL
    /// cache, and the transfer stock check and check-completion
    /// reconciliation defaults come from their config knobs. Returns the
    /// receiving end of the event channel for the caller's event loop.
    pub fn from_config(
        config: &AppConfig,
        store: Arc<dyn LedgerStore>,
        catalog: Arc<dyn MaterialCatalog>,
        template_catalog: Arc<dyn TemplateCatalog>,
    ) -> (Self, mpsc::Receiver<Event>) {
        let (event_sender, events) = EventSender::channel(config.event_channel_capacity);
        let catalog: Arc<dyn MaterialCatalog> =
            Arc::new(CachedCatalog::new(catalog, config.catalog_cache_ttl()));
        let services = Self::assemble(
            store,
            catalog,
            template_catalog,
            Some(event_sender),
            config.transfer_stock_check,
            config.check_reconcile_default,
        );
        (services, events)
    }

    fn assemble(
        store: Arc<dyn LedgerStore>,
        catalog: Arc<dyn MaterialCatalog>,
        template_catalog: Arc<dyn TemplateCatalog>,
        event_sender: Option<EventSender>,
        transfer_stock_check: bool,
        check_reconcile_default: bool,
    ) -> Self {
        let locks = Arc::new(LevelLocks::new());
        let levels = LevelService::new(store.clone(), locks.clone());
        let transactions = Arc::new(TransactionService::new(
            store.clone(),
            levels.clone(),
            locks.clone(),
            catalog,
            event_sender.clone(),
        ));
        let transfers = TransferService::new(
            transactions.clone(),
            transactions.clone(),
            event_sender.clone(),
            transfer_stock_check,
        );
        let checks = CheckService::new(
            store,
            transactions.clone(),
            event_sender.clone(),
            check_reconcile_default,
        );
        let templates = TemplateService::new(
            levels.clone(),
            template_catalog,
            locks,
            event_sender.clone(),
        );
        let reconcile =
            ReconciliationService::new(transactions.as_ref().clone(), event_sender.clone());

        Self {
            levels,
            transactions,
            transfers,
            checks,
            templates,
            reconcile,
            event_sender,
            transfer_stock_check,
        }
    }

    /// Replaces the warehouse-side sink used by the transfer coordinator.
    pub fn with_warehouse_sink(mut self, sink: Arc<dyn TransactionSink>) -> Self {
        self.transfers = TransferService::new(
            self.transactions.clone(),
            sink,
            self.event_sender.clone(),
            self.transfer_stock_check,
        );
        self
    }
}
