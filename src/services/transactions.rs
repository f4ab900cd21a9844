use std::sync::Arc;

use chrono::Utc;
use lazy_static::lazy_static;
use prometheus::IntCounter;
use rust_decimal::Decimal;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::catalog::MaterialCatalog;
use crate::errors::InventoryError;
use crate::events::{Event, EventSender};
use crate::models::level::LocationId;
use crate::models::transaction::{InventoryTransaction, Movement};
use crate::store::{from_document, keys, to_document, IndexName, LedgerStore, QueryOptions};

use super::levels::{LevelService, UpsertLevel};
use super::locks::LevelLocks;

lazy_static! {
    pub(crate) static ref TRANSACTIONS_RECORDED: IntCounter = IntCounter::new(
        "inventory_transactions_recorded_total",
        "Total number of inventory transactions recorded"
    )
    .expect("metric can be created");
    pub(crate) static ref TRANSACTION_FAILURES: IntCounter = IntCounter::new(
        "inventory_transaction_failures_total",
        "Total number of failed inventory transaction recordings"
    )
    .expect("metric can be created");
}

#[derive(Debug, Clone, Default)]
pub struct RecordOptions {
    pub project_id: Option<String>,
    pub notes: Option<String>,
}

/// Appends immutable transaction rows and keeps the derived level in step.
///
/// The transaction row is written before the level update, so a failure in
/// the second step leaves an accurate audit trail with a stale level; the
/// reconciliation service recomputes levels from history for that window.
#[derive(Clone)]
pub struct TransactionService {
    store: Arc<dyn LedgerStore>,
    levels: LevelService,
    locks: Arc<LevelLocks>,
    catalog: Arc<dyn MaterialCatalog>,
    event_sender: Option<EventSender>,
}

impl TransactionService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        levels: LevelService,
        locks: Arc<LevelLocks>,
        catalog: Arc<dyn MaterialCatalog>,
        event_sender: Option<EventSender>,
    ) -> Self {
        Self {
            store,
            levels,
            locks,
            catalog,
            event_sender,
        }
    }

    pub fn levels(&self) -> &LevelService {
        &self.levels
    }

    /// Records one movement: append the transaction row, then update the
    /// level through the quantity policy. Serialized per (location, material)
    /// so concurrent recorders cannot lose an update.
    #[instrument(skip(self, opts), fields(location = %location, material = %material_id, kind = movement.kind()))]
    pub async fn record(
        &self,
        location: &LocationId,
        material_id: &str,
        movement: Movement,
        actor: &str,
        opts: RecordOptions,
    ) -> Result<InventoryTransaction, InventoryError> {
        movement.validate().map_err(|err| {
            TRANSACTION_FAILURES.inc();
            err
        })?;

        if self.catalog.get_material(material_id).await?.is_none() {
            TRANSACTION_FAILURES.inc();
            return Err(InventoryError::not_found(format!(
                "material {material_id}"
            )));
        }

        let _guard = self.locks.acquire(location, material_id).await;

        let previous_quantity = self
            .levels
            .get_level(location, material_id)
            .await?
            .map(|level| level.current_quantity)
            .unwrap_or(Decimal::ZERO);
        let new_quantity = movement.level_effect().apply(previous_quantity);

        let now = Utc::now();
        let transaction = InventoryTransaction {
            id: Uuid::new_v4(),
            location: location.clone(),
            material_id: material_id.to_string(),
            movement,
            previous_quantity,
            new_quantity,
            project_id: opts.project_id,
            notes: opts.notes,
            created_by: actor.to_string(),
            created_at: now,
        };

        self.store
            .put(
                &location.as_key(),
                &keys::transaction_sort_key(now, transaction.id),
                to_document(&transaction).map_err(|err| {
                    TRANSACTION_FAILURES.inc();
                    InventoryError::from(err)
                })?,
            )
            .await
            .map_err(|err| {
                TRANSACTION_FAILURES.inc();
                InventoryError::from(err)
            })?;

        // The transaction row is persisted from here on. A level-update
        // failure is surfaced, but the row is never rolled back.
        if let Err(err) = self
            .levels
            .upsert_level(UpsertLevel {
                location: location.clone(),
                material_id: material_id.to_string(),
                new_quantity,
                actor: actor.to_string(),
                standard_quantity: None,
                bin_location: None,
            })
            .await
        {
            TRANSACTION_FAILURES.inc();
            error!(
                transaction_id = %transaction.id,
                location = %location,
                material = %material_id,
                error = %err,
                "Transaction recorded but level update failed; level is stale until reconciliation"
            );
            if let Some(sender) = &self.event_sender {
                let _ = sender
                    .send(Event::LevelUpdateDeferred {
                        transaction_id: transaction.id,
                        location: location.clone(),
                        material_id: material_id.to_string(),
                    })
                    .await;
            }
            return Err(err);
        }

        TRANSACTIONS_RECORDED.inc();
        info!(
            transaction_id = %transaction.id,
            previous = %previous_quantity,
            new = %new_quantity,
            "Transaction recorded"
        );
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender
                .send(Event::TransactionRecorded {
                    transaction_id: transaction.id,
                    location: location.clone(),
                    material_id: material_id.to_string(),
                    kind: transaction.movement.kind().to_string(),
                    new_quantity,
                })
                .await
            {
                warn!("Failed to send transaction event: {}", e);
            }
        }

        Ok(transaction)
    }

    /// A location's movement history in creation order.
    #[instrument(skip(self), fields(location = %location))]
    pub async fn list_transactions(
        &self,
        location: &LocationId,
        limit: Option<usize>,
        descending: bool,
    ) -> Result<Vec<InventoryTransaction>, InventoryError> {
        let docs = self
            .store
            .query_prefix(
                &location.as_key(),
                keys::TRANSACTION_PREFIX,
                QueryOptions {
                    limit,
                    descending,
                    index: None,
                },
            )
            .await?;
        docs.into_iter()
            .map(|d| from_document(d).map_err(InventoryError::from))
            .collect()
    }

    /// Point lookup by id within one location's history. The sort key embeds
    /// the creation timestamp, so this scans the prefix rather than
    /// reconstructing the key.
    pub async fn get_transaction(
        &self,
        location: &LocationId,
        transaction_id: Uuid,
    ) -> Result<InventoryTransaction, InventoryError> {
        let history = self.list_transactions(location, None, false).await?;
        history
            .into_iter()
            .find(|tx| tx.id == transaction_id)
            .ok_or_else(|| {
                InventoryError::not_found(format!(
                    "transaction {transaction_id} at {location}"
                ))
            })
    }

    /// One material's movements across all locations, via the secondary
    /// index.
    #[instrument(skip(self))]
    pub async fn material_history(
        &self,
        material_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<InventoryTransaction>, InventoryError> {
        let docs = self
            .store
            .query_prefix(
                material_id,
                keys::TRANSACTION_PREFIX,
                QueryOptions {
                    limit,
                    descending: false,
                    index: Some(IndexName::Material),
                },
            )
            .await?;
        docs.into_iter()
            .map(|d| from_document(d).map_err(InventoryError::from))
            .collect()
    }
}
