//! Prometheus registry for the crate's counters.
//!
//! Counters live next to the code that bumps them (see the service modules);
//! this module collects them into one registry for scraping.

use lazy_static::lazy_static;
use prometheus::{proto::MetricFamily, Registry};

use crate::services::{checks, reconcile, templates, transactions, transfers};

lazy_static! {
    pub static ref REGISTRY: Registry = {
        let registry = Registry::new();
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(transactions::TRANSACTIONS_RECORDED.clone()),
            Box::new(transactions::TRANSACTION_FAILURES.clone()),
            Box::new(transfers::INVENTORY_TRANSFERS.clone()),
            Box::new(transfers::INVENTORY_TRANSFER_FAILURES.clone()),
            Box::new(transfers::INVENTORY_TRANSFER_PARTIALS.clone()),
            Box::new(checks::CHECKS_COMPLETED.clone()),
            Box::new(templates::TEMPLATES_APPLIED.clone()),
            Box::new(reconcile::LEVEL_DRIFTS_DETECTED.clone()),
        ];
        for collector in collectors {
            registry
                .register(collector)
                .expect("metric can be registered");
        }
        registry
    };
}

/// Snapshot of all registered metric families.
pub fn gather() -> Vec<MetricFamily> {
    REGISTRY.gather()
}
