use std::sync::Arc;

use lazy_static::lazy_static;
use prometheus::IntCounter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::errors::InventoryError;
use crate::events::{Event, EventSender};
use crate::models::level::LocationId;
use crate::models::transaction::{InventoryTransaction, Movement, TransferRole};

use super::transactions::{RecordOptions, TransactionService};

lazy_static! {
    pub(crate) static ref INVENTORY_TRANSFERS: IntCounter = IntCounter::new(
        "inventory_transfers_total",
        "Total number of inventory transfers"
    )
    .expect("metric can be created");
    pub(crate) static ref INVENTORY_TRANSFER_FAILURES: IntCounter = IntCounter::new(
        "inventory_transfer_failures_total",
        "Total number of failed inventory transfers"
    )
    .expect("metric can be created");
    pub(crate) static ref INVENTORY_TRANSFER_PARTIALS: IntCounter = IntCounter::new(
        "inventory_transfer_partials_total",
        "Total number of transfers left partially applied"
    )
    .expect("metric can be created");
}

/// Where one leg of a transfer is recorded. Vehicle/case legs go to the
/// tracked level store; warehouse legs go to the sibling warehouse inventory
/// service, which shares this contract.
#[async_trait::async_trait]
pub trait TransactionSink: Send + Sync {
    async fn record(
        &self,
        location: &LocationId,
        material_id: &str,
        movement: Movement,
        actor: &str,
        opts: RecordOptions,
    ) -> Result<InventoryTransaction, InventoryError>;

    /// Current tracked quantity, or `None` when the sink does not track
    /// per-material levels (the abstract warehouse).
    async fn available_quantity(
        &self,
        location: &LocationId,
        material_id: &str,
    ) -> Result<Option<Decimal>, InventoryError>;
}

#[async_trait::async_trait]
impl TransactionSink for TransactionService {
    async fn record(
        &self,
        location: &LocationId,
        material_id: &str,
        movement: Movement,
        actor: &str,
        opts: RecordOptions,
    ) -> Result<InventoryTransaction, InventoryError> {
        TransactionService::record(self, location, material_id, movement, actor, opts).await
    }

    async fn available_quantity(
        &self,
        location: &LocationId,
        material_id: &str,
    ) -> Result<Option<Decimal>, InventoryError> {
        Ok(self
            .levels()
            .get_level(location, material_id)
            .await?
            .map(|level| level.current_quantity))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TransferItem {
    #[validate(length(min = 1, message = "Material ID cannot be empty"))]
    pub material_id: String,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TransferRequest {
    pub source: LocationId,
    pub destination: LocationId,
    #[validate(length(min = 1, message = "Transfer needs at least one item"))]
    pub items: Vec<TransferItem>,
    #[validate(length(min = 1, message = "Actor cannot be empty"))]
    pub actor: String,
    pub project_id: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferOutcome {
    pub source_transaction_ids: Vec<Uuid>,
    pub destination_transaction_ids: Vec<Uuid>,
    pub transferred_items: Vec<TransferItem>,
}

/// Orchestrates two-sided transfers as a source-then-destination saga.
///
/// The store has no cross-row transaction primitive, so a destination-side
/// failure after the source leg leaves the transfer partially applied; that
/// state is surfaced as [`InventoryError::PartialTransfer`] so a caller can
/// compensate. Retrying a transfer blindly would double-apply it.
pub struct TransferService {
    field_sink: Arc<dyn TransactionSink>,
    warehouse_sink: Arc<dyn TransactionSink>,
    event_sender: Option<EventSender>,
    /// Validate requested quantity against tracked source levels.
    check_source_stock: bool,
}

impl TransferService {
    pub fn new(
        field_sink: Arc<dyn TransactionSink>,
        warehouse_sink: Arc<dyn TransactionSink>,
        event_sender: Option<EventSender>,
        check_source_stock: bool,
    ) -> Self {
        Self {
            field_sink,
            warehouse_sink,
            event_sender,
            check_source_stock,
        }
    }

    fn sink_for(&self, location: &LocationId) -> &dyn TransactionSink {
        if location.is_warehouse() {
            self.warehouse_sink.as_ref()
        } else {
            self.field_sink.as_ref()
        }
    }

    #[instrument(skip(self, request), fields(source = %request.source, destination = %request.destination))]
    pub async fn transfer(
        &self,
        request: TransferRequest,
    ) -> Result<TransferOutcome, InventoryError> {
        request.validate().map_err(|e| {
            INVENTORY_TRANSFER_FAILURES.inc();
            let msg = format!("Invalid transfer request: {}", e);
            error!("{}", msg);
            InventoryError::ValidationError(msg)
        })?;

        if request.source == request.destination {
            INVENTORY_TRANSFER_FAILURES.inc();
            return Err(InventoryError::invalid_transfer(format!(
                "source and destination are both {}",
                request.source
            )));
        }

        for item in &request.items {
            if item.quantity <= Decimal::ZERO {
                INVENTORY_TRANSFER_FAILURES.inc();
                return Err(InventoryError::invalid_quantity(format!(
                    "transfer of {} requires a positive quantity, got {}",
                    item.material_id, item.quantity
                )));
            }
        }

        // Availability pre-check against tracked sources, before any leg is
        // applied.
        if self.check_source_stock && !request.source.is_warehouse() {
            for item in &request.items {
                let available = self
                    .sink_for(&request.source)
                    .available_quantity(&request.source, &item.material_id)
                    .await?
                    .unwrap_or(Decimal::ZERO);
                if available < item.quantity {
                    INVENTORY_TRANSFER_FAILURES.inc();
                    return Err(InventoryError::insufficient_stock(format!(
                        "{} has {} of {}, requested {}",
                        request.source, available, item.material_id, item.quantity
                    )));
                }
            }
        }

        let opts = RecordOptions {
            project_id: request.project_id.clone(),
            notes: request.notes.clone(),
        };

        let mut source_transaction_ids = Vec::with_capacity(request.items.len());
        let mut destination_transaction_ids = Vec::with_capacity(request.items.len());

        for item in &request.items {
            let outgoing = self
                .sink_for(&request.source)
                .record(
                    &request.source,
                    &item.material_id,
                    Movement::Transfer {
                        role: TransferRole::Outgoing,
                        counterpart: request.destination.clone(),
                        quantity: item.quantity,
                    },
                    &request.actor,
                    opts.clone(),
                )
                .await
                .map_err(|err| {
                    INVENTORY_TRANSFER_FAILURES.inc();
                    err
                })?;
            source_transaction_ids.push(outgoing.id);

            let incoming = self
                .sink_for(&request.destination)
                .record(
                    &request.destination,
                    &item.material_id,
                    Movement::Transfer {
                        role: TransferRole::Incoming,
                        counterpart: request.source.clone(),
                        quantity: item.quantity,
                    },
                    &request.actor,
                    opts.clone(),
                )
                .await;

            match incoming {
                Ok(tx) => destination_transaction_ids.push(tx.id),
                Err(cause) => {
                    INVENTORY_TRANSFER_FAILURES.inc();
                    INVENTORY_TRANSFER_PARTIALS.inc();
                    error!(
                        material = %item.material_id,
                        error = %cause,
                        "Destination leg failed after source leg; transfer partially applied"
                    );
                    if let Some(sender) = &self.event_sender {
                        let _ = sender
                            .send(Event::TransferPartiallyApplied {
                                source: request.source.clone(),
                                destination: request.destination.clone(),
                                material_id: item.material_id.clone(),
                            })
                            .await;
                    }
                    return Err(InventoryError::PartialTransfer {
                        source: request.source,
                        destination: request.destination,
                        material_id: item.material_id.clone(),
                        source_transaction_ids,
                        destination_transaction_ids,
                        cause: Box::new(cause),
                    });
                }
            }
        }

        INVENTORY_TRANSFERS.inc();
        info!(
            items = request.items.len(),
            "Transfer completed"
        );
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender
                .send(Event::TransferCompleted {
                    source: request.source.clone(),
                    destination: request.destination.clone(),
                    item_count: request.items.len(),
                })
                .await
            {
                warn!("Failed to send transfer event: {}", e);
            }
        }

        Ok(TransferOutcome {
            source_transaction_ids,
            destination_transaction_ids,
            transferred_items: request.items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;
    use mockall::mock;

    mock! {
        Sink {}

        #[async_trait::async_trait]
        impl TransactionSink for Sink {
            async fn record(
                &self,
                location: &LocationId,
                material_id: &str,
                movement: Movement,
                actor: &str,
                opts: RecordOptions,
            ) -> Result<InventoryTransaction, InventoryError>;

            async fn available_quantity(
                &self,
                location: &LocationId,
                material_id: &str,
            ) -> Result<Option<Decimal>, InventoryError>;
        }
    }

    fn leg(
        location: &LocationId,
        material_id: &str,
        movement: &Movement,
    ) -> InventoryTransaction {
        InventoryTransaction {
            id: Uuid::new_v4(),
            location: location.clone(),
            material_id: material_id.to_string(),
            movement: movement.clone(),
            previous_quantity: Decimal::ZERO,
            new_quantity: movement.level_effect().apply(Decimal::ZERO),
            project_id: None,
            notes: None,
            created_by: "test".into(),
            created_at: Utc::now(),
        }
    }

    fn one_item_request(source: LocationId, destination: LocationId) -> TransferRequest {
        TransferRequest {
            source,
            destination,
            items: vec![TransferItem {
                material_id: "M1".into(),
                quantity: Decimal::ONE,
            }],
            actor: "test".into(),
            project_id: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn legs_are_routed_by_location_kind() {
        let mut warehouse = MockSink::new();
        warehouse
            .expect_record()
            .withf(|location, _, movement, _, _| {
                location.is_warehouse()
                    && matches!(
                        movement,
                        Movement::Transfer {
                            role: TransferRole::Outgoing,
                            ..
                        }
                    )
            })
            .times(1)
            .returning(|location, material_id, movement, _, _| {
                Ok(leg(location, material_id, &movement))
            });

        let mut field = MockSink::new();
        field
            .expect_record()
            .withf(|location, _, movement, _, _| {
                !location.is_warehouse()
                    && matches!(
                        movement,
                        Movement::Transfer {
                            role: TransferRole::Incoming,
                            ..
                        }
                    )
            })
            .times(1)
            .returning(|location, material_id, movement, _, _| {
                Ok(leg(location, material_id, &movement))
            });

        let service =
            TransferService::new(Arc::new(field), Arc::new(warehouse), None, true);
        let outcome = service
            .transfer(one_item_request(
                LocationId::Warehouse,
                LocationId::vehicle("v1"),
            ))
            .await
            .expect("transfer routed through both sinks");
        assert_eq!(outcome.source_transaction_ids.len(), 1);
        assert_eq!(outcome.destination_transaction_ids.len(), 1);
    }

    #[tokio::test]
    async fn stock_pre_check_stops_before_any_leg() {
        let mut field = MockSink::new();
        field
            .expect_available_quantity()
            .times(1)
            .returning(|_, _| Ok(Some(Decimal::ZERO)));
        // No record expectation: a recorded leg would panic the mock.

        let warehouse = MockSink::new();
        let service =
            TransferService::new(Arc::new(field), Arc::new(warehouse), None, true);
        let err = service
            .transfer(one_item_request(
                LocationId::vehicle("v1"),
                LocationId::case("c1"),
            ))
            .await
            .unwrap_err();
        assert_matches!(err, InventoryError::InsufficientStock(_));
    }

    #[tokio::test]
    async fn disabling_the_pre_check_skips_availability_reads() {
        let mut field = MockSink::new();
        field
            .expect_record()
            .times(2)
            .returning(|location, material_id, movement, _, _| {
                Ok(leg(location, material_id, &movement))
            });

        let warehouse = MockSink::new();
        let service =
            TransferService::new(Arc::new(field), Arc::new(warehouse), None, false);
        service
            .transfer(one_item_request(
                LocationId::vehicle("v1"),
                LocationId::case("c1"),
            ))
            .await
            .expect("transfer proceeds without availability reads");
    }
}
