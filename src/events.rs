use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::level::LocationId;

/// Events emitted by the inventory core as mutations land. Delivery is
/// best-effort; ledger correctness never depends on an event being observed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    TransactionRecorded {
        transaction_id: Uuid,
        location: LocationId,
        material_id: String,
        kind: String,
        new_quantity: Decimal,
    },
    /// The level row could not be updated after the transaction row was
    /// written; the level is stale until a reconciliation pass runs.
    LevelUpdateDeferred {
        transaction_id: Uuid,
        location: LocationId,
        material_id: String,
    },
    TransferCompleted {
        source: LocationId,
        destination: LocationId,
        item_count: usize,
    },
    TransferPartiallyApplied {
        source: LocationId,
        destination: LocationId,
        material_id: String,
    },
    CheckCreated {
        check_id: Uuid,
        location: LocationId,
        item_count: usize,
    },
    CheckCompleted {
        check_id: Uuid,
        location: LocationId,
        missing_count: usize,
        extra_count: usize,
        reconciled: bool,
    },
    TemplateApplied {
        location: LocationId,
        template_id: String,
        items_applied: usize,
        replace_existing: bool,
    },
    LevelDriftDetected {
        location: LocationId,
        material_id: String,
        recorded: Decimal,
        replayed: Decimal,
    },
    Generic {
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl Event {
    pub fn with_message(message: impl Into<String>) -> Self {
        Event::Generic {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Creates a sender/receiver pair with the given channel capacity.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Handlers implementing this trait process events asynchronously.
#[async_trait::async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_event(&self, event: Event) -> Result<(), String>;
}

/// Drains the event channel, logging each event and flagging the ones that
/// need operator attention.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::TransactionRecorded {
                transaction_id,
                location,
                material_id,
                kind,
                new_quantity,
            } => {
                info!(
                    transaction_id = %transaction_id,
                    location = %location,
                    material = %material_id,
                    kind = %kind,
                    new_quantity = %new_quantity,
                    "Transaction recorded"
                );
            }
            Event::LevelUpdateDeferred {
                transaction_id,
                location,
                material_id,
            } => {
                warn!(
                    transaction_id = %transaction_id,
                    location = %location,
                    material = %material_id,
                    "Level update deferred; run reconciliation for this material"
                );
            }
            Event::TransferPartiallyApplied {
                source,
                destination,
                material_id,
            } => {
                error!(
                    source = %source,
                    destination = %destination,
                    material = %material_id,
                    "Transfer partially applied and needs compensation"
                );
            }
            Event::LevelDriftDetected {
                location,
                material_id,
                recorded,
                replayed,
            } => {
                warn!(
                    location = %location,
                    material = %material_id,
                    recorded = %recorded,
                    replayed = %replayed,
                    "Level drift detected against transaction history"
                );
            }
            other => {
                info!("Event: {:?}", other);
            }
        }
    }

    warn!("Event processing loop has ended");
}
