use std::sync::Arc;

use chrono::Utc;
use lazy_static::lazy_static;
use prometheus::IntCounter;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::InventoryError;
use crate::events::{Event, EventSender};
use crate::models::check::{CheckItem, InventoryCheck};
use crate::models::level::LocationId;
use crate::models::transaction::Movement;
use crate::store::{from_document, keys, to_document, LedgerStore, QueryOptions};

use super::locks::CheckLocks;
use super::transactions::{RecordOptions, TransactionService};

lazy_static! {
    pub(crate) static ref CHECKS_COMPLETED: IntCounter = IntCounter::new(
        "inventory_checks_completed_total",
        "Total number of completed inventory checks"
    )
    .expect("metric can be created");
}

/// Stateful physical-count workflow: create a check, record actual counts per
/// material, complete it once. Completion is terminal; there is no reopen.
#[derive(Clone)]
pub struct CheckService {
    store: Arc<dyn LedgerStore>,
    recorder: Arc<TransactionService>,
    event_sender: Option<EventSender>,
    locks: Arc<CheckLocks>,
    default_reconcile: bool,
}

impl CheckService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        recorder: Arc<TransactionService>,
        event_sender: Option<EventSender>,
        default_reconcile: bool,
    ) -> Self {
        Self {
            store,
            recorder,
            event_sender,
            locks: Arc::new(CheckLocks::new()),
            default_reconcile,
        }
    }

    /// Snapshots the location's levels into a new pending check. Expected
    /// quantities are frozen from each level's standard quantity at this
    /// moment and never retroactively updated.
    #[instrument(skip(self), fields(location = %location))]
    pub async fn create_check(
        &self,
        location: &LocationId,
        actor: &str,
    ) -> Result<InventoryCheck, InventoryError> {
        let levels = self.recorder.levels().list_levels(location).await?;
        let now = Utc::now();
        let check = InventoryCheck {
            id: Uuid::new_v4(),
            location: location.clone(),
            performed_by: actor.to_string(),
            date: now,
            items: levels
                .iter()
                .map(|level| CheckItem {
                    material_id: level.material_id.clone(),
                    expected_quantity: level.standard_quantity.unwrap_or(Decimal::ZERO),
                    actual_quantity: Decimal::ZERO,
                    counted: false,
                    notes: None,
                })
                .collect(),
            variance: None,
            completed: false,
            created_at: now,
            created_by: actor.to_string(),
            updated_at: now,
            updated_by: actor.to_string(),
        };

        self.put_check(&check).await?;
        info!(check_id = %check.id, items = check.items.len(), "Check created");
        if let Some(sender) = &self.event_sender {
            let _ = sender
                .send(Event::CheckCreated {
                    check_id: check.id,
                    location: location.clone(),
                    item_count: check.items.len(),
                })
                .await;
        }
        Ok(check)
    }

    pub async fn get_check(
        &self,
        location: &LocationId,
        check_id: Uuid,
    ) -> Result<InventoryCheck, InventoryError> {
        self.store
            .get(&location.as_key(), &keys::check_sort_key(check_id))
            .await?
            .map(|doc| from_document(doc).map_err(InventoryError::from))
            .transpose()?
            .ok_or_else(|| {
                InventoryError::not_found(format!("check {check_id} at {location}"))
            })
    }

    /// All checks recorded for a location, pending and completed.
    pub async fn list_checks(
        &self,
        location: &LocationId,
    ) -> Result<Vec<InventoryCheck>, InventoryError> {
        let docs = self
            .store
            .query_prefix(
                &location.as_key(),
                keys::CHECK_PREFIX,
                QueryOptions::default(),
            )
            .await?;
        docs.into_iter()
            .map(|d| from_document(d).map_err(InventoryError::from))
            .collect()
    }

    /// Overwrites one item's counted quantity and notes while the check is
    /// pending. A recount replaces the previous count wholesale, so passing
    /// no notes clears any earlier ones.
    #[instrument(skip(self, notes), fields(location = %location, material = %material_id))]
    pub async fn record_item_count(
        &self,
        check_id: Uuid,
        location: &LocationId,
        material_id: &str,
        actual_quantity: Decimal,
        notes: Option<String>,
        actor: &str,
    ) -> Result<InventoryCheck, InventoryError> {
        if actual_quantity < Decimal::ZERO {
            return Err(InventoryError::invalid_quantity(
                "counted quantity cannot be negative",
            ));
        }

        let _guard = self.locks.acquire(check_id).await;
        let mut check = self.get_check(location, check_id).await?;
        if check.completed {
            return Err(InventoryError::AlreadyCompleted(check_id));
        }

        let item = check.item_mut(material_id).ok_or_else(|| {
            InventoryError::not_found(format!("material {material_id} in check {check_id}"))
        })?;
        item.actual_quantity = actual_quantity;
        item.counted = true;
        item.notes = notes;

        check.updated_at = Utc::now();
        check.updated_by = actor.to_string();
        self.put_check(&check).await?;
        Ok(check)
    }

    /// Completes the check: computes variance and, when `reconcile_levels` is
    /// set, corrects each level to its counted quantity through the recorder,
    /// so the correction itself is an auditable `inventory_check` transaction.
    #[instrument(skip(self), fields(location = %location))]
    pub async fn complete_check(
        &self,
        check_id: Uuid,
        location: &LocationId,
        reconcile_levels: bool,
        actor: &str,
    ) -> Result<InventoryCheck, InventoryError> {
        // The completed flag is read and written under the check's lock, so a
        // second completer parks here and then sees the flag set. Without it
        // both callers pass the guard during the reconciling awaits and the
        // correction rows are written twice.
        let _guard = self.locks.acquire(check_id).await;
        let mut check = self.get_check(location, check_id).await?;
        if check.completed {
            warn!(check_id = %check_id, "Check already completed");
            return Err(InventoryError::AlreadyCompleted(check_id));
        }

        let variance = check.compute_variance();
        let now = Utc::now();

        if reconcile_levels {
            for item in &check.items {
                self.recorder
                    .record(
                        location,
                        &item.material_id,
                        Movement::InventoryCount {
                            counted: item.actual_quantity,
                        },
                        actor,
                        RecordOptions {
                            project_id: None,
                            notes: Some(format!("inventory check {check_id}")),
                        },
                    )
                    .await?;
                self.recorder
                    .levels()
                    .mark_stock_checked(location, &item.material_id, now, actor)
                    .await?;
            }
        }

        check.variance = Some(variance.clone());
        check.completed = true;
        check.updated_at = now;
        check.updated_by = actor.to_string();
        self.put_check(&check).await?;

        CHECKS_COMPLETED.inc();
        info!(
            check_id = %check_id,
            missing = variance.missing.len(),
            extra = variance.extra.len(),
            reconciled = reconcile_levels,
            "Check completed"
        );
        if let Some(sender) = &self.event_sender {
            let _ = sender
                .send(Event::CheckCompleted {
                    check_id,
                    location: location.clone(),
                    missing_count: variance.missing.len(),
                    extra_count: variance.extra.len(),
                    reconciled: reconcile_levels,
                })
                .await;
        }
        Ok(check)
    }

    /// [`complete_check`](Self::complete_check) with the configured
    /// reconciliation default (`check_reconcile_default`).
    pub async fn complete_check_default(
        &self,
        check_id: Uuid,
        location: &LocationId,
        actor: &str,
    ) -> Result<InventoryCheck, InventoryError> {
        self.complete_check(check_id, location, self.default_reconcile, actor)
            .await
    }

    async fn put_check(&self, check: &InventoryCheck) -> Result<(), InventoryError> {
        self.store
            .put(
                &check.location.as_key(),
                &keys::check_sort_key(check.id),
                to_document(check)?,
            )
            .await?;
        Ok(())
    }
}
