//! SiteLedger Inventory Library
//!
//! Append-only inventory ledger for field service operations: immutable
//! transactions per (location, material), derived level rows, two-sided
//! transfers, physical-count checks, and location templates.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod catalog;
pub mod config;
pub mod errors;
pub mod events;
pub mod metrics;
pub mod models;
pub mod services;
pub mod store;

pub use catalog::{InMemoryCatalog, InMemoryTemplateCatalog, Material, MaterialCatalog, TemplateCatalog};
pub use config::AppConfig;
pub use errors::InventoryError;
pub use events::{Event, EventSender};
pub use models::check::{InventoryCheck, Variance};
pub use models::level::{InventoryLevel, LocationId};
pub use models::template::{LocationTemplate, TemplateItem};
pub use models::transaction::{InventoryTransaction, Movement, TransferRole};
pub use services::InventoryServices;
pub use store::{memory::MemoryLedgerStore, LedgerStore};
