use std::collections::BTreeMap;

use lazy_static::lazy_static;
use prometheus::IntCounter;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use crate::errors::InventoryError;
use crate::events::{Event, EventSender};
use crate::models::level::LocationId;
use crate::models::transaction::LevelEffect;

use super::levels::{LevelService, UpsertLevel};
use super::transactions::TransactionService;

lazy_static! {
    pub(crate) static ref LEVEL_DRIFTS_DETECTED: IntCounter = IntCounter::new(
        "inventory_level_drifts_detected_total",
        "Total number of level rows found inconsistent with transaction history"
    )
    .expect("metric can be created");
}

/// One level row compared against its replayed transaction history.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelDrift {
    pub material_id: String,
    pub recorded: Decimal,
    pub replayed: Decimal,
}

impl LevelDrift {
    pub fn drift(&self) -> Decimal {
        self.recorded - self.replayed
    }
}

/// Result of a corrective pass over one level.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairOutcome {
    pub replayed: Decimal,
    pub recorded: Decimal,
    /// False when the level already matched its history.
    pub corrected: bool,
}

/// Recomputes levels from the append-only transaction log.
///
/// Levels are a derived cache; when a recorder's level update failed after
/// its log write, replaying history in creation order from zero (with counts
/// as reset points) yields the true quantity.
pub struct ReconciliationService {
    transactions: TransactionService,
    event_sender: Option<EventSender>,
}

impl ReconciliationService {
    pub fn new(transactions: TransactionService, event_sender: Option<EventSender>) -> Self {
        Self {
            transactions,
            event_sender,
        }
    }

    fn levels(&self) -> &LevelService {
        self.transactions.levels()
    }

    /// Folds the quantity policy over the full history of one
    /// (location, material).
    #[instrument(skip(self), fields(location = %location, material = %material_id))]
    pub async fn replay(
        &self,
        location: &LocationId,
        material_id: &str,
    ) -> Result<Decimal, InventoryError> {
        let history = self.transactions.list_transactions(location, None, false).await?;
        let mut quantity = Decimal::ZERO;
        for transaction in history
            .iter()
            .filter(|tx| tx.material_id == material_id)
        {
            quantity = match transaction.movement.level_effect() {
                LevelEffect::Delta(delta) => quantity + delta,
                // Counts are absolute-set reset points in the replay.
                LevelEffect::Set(value) => value,
            };
        }
        Ok(quantity)
    }

    /// Compares every material at a location against its replayed history.
    ///
    /// Covers materials present in the level table or only in the transaction
    /// log; the latter happens when a level update failed after its row was
    /// written, leaving history with no level at all.
    #[instrument(skip(self), fields(location = %location))]
    pub async fn drift_report(
        &self,
        location: &LocationId,
    ) -> Result<Vec<LevelDrift>, InventoryError> {
        let mut recorded: BTreeMap<String, Decimal> = self
            .levels()
            .list_levels(location)
            .await?
            .into_iter()
            .map(|level| (level.material_id, level.current_quantity))
            .collect();
        for transaction in self
            .transactions
            .list_transactions(location, None, false)
            .await?
        {
            recorded
                .entry(transaction.material_id)
                .or_insert(Decimal::ZERO);
        }

        let mut drifts = Vec::new();
        for (material_id, stored) in recorded {
            let replayed = self.replay(location, &material_id).await?;
            if replayed != stored {
                LEVEL_DRIFTS_DETECTED.inc();
                warn!(
                    material = %material_id,
                    recorded = %stored,
                    replayed = %replayed,
                    "Level drift detected"
                );
                if let Some(sender) = &self.event_sender {
                    let _ = sender
                        .send(Event::LevelDriftDetected {
                            location: location.clone(),
                            material_id: material_id.clone(),
                            recorded: stored,
                            replayed,
                        })
                        .await;
                }
                drifts.push(LevelDrift {
                    material_id,
                    recorded: stored,
                    replayed,
                });
            }
        }
        Ok(drifts)
    }

    /// Overwrites a drifted level with its replayed quantity. The corrective
    /// write goes straight through the level repository; history already
    /// accounts for it. In-step levels are left untouched.
    #[instrument(skip(self), fields(location = %location, material = %material_id))]
    pub async fn repair(
        &self,
        location: &LocationId,
        material_id: &str,
        actor: &str,
    ) -> Result<RepairOutcome, InventoryError> {
        let replayed = self.replay(location, material_id).await?;
        let stored = self
            .levels()
            .get_level(location, material_id)
            .await?
            .map(|level| level.current_quantity)
            .unwrap_or(Decimal::ZERO);
        if stored == replayed {
            return Ok(RepairOutcome {
                replayed,
                recorded: stored,
                corrected: false,
            });
        }

        self.levels()
            .upsert_level(UpsertLevel {
                location: location.clone(),
                material_id: material_id.to_string(),
                new_quantity: replayed,
                actor: actor.to_string(),
                standard_quantity: None,
                bin_location: None,
            })
            .await?;
        info!(
            recorded = %stored,
            replayed = %replayed,
            "Level repaired from transaction history"
        );
        Ok(RepairOutcome {
            replayed,
            recorded: stored,
            corrected: true,
        })
    }
}
