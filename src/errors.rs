use serde::Serialize;
use uuid::Uuid;

use crate::models::level::LocationId;
use crate::store::StoreError;

/// Error taxonomy for the inventory ledger core.
///
/// Services attach location/material/type context when propagating and never
/// silently swallow an error; the excluded handler layer maps these variants
/// to transport-level responses.
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Invalid transaction type: {0}")]
    InvalidTransactionType(String),

    #[error("Invalid transfer: {0}")]
    InvalidTransfer(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Inventory check {0} is already completed")]
    AlreadyCompleted(Uuid),

    #[error(
        "Partial transfer of {material_id}: {source} was debited but {destination} \
         was not credited: {cause}"
    )]
    PartialTransfer {
        source: LocationId,
        destination: LocationId,
        material_id: String,
        /// Transactions that were applied before the failure, for compensation.
        source_transaction_ids: Vec<Uuid>,
        destination_transaction_ids: Vec<Uuid>,
        #[source]
        cause: Box<InventoryError>,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for InventoryError {
    fn from(err: validator::ValidationErrors) -> Self {
        InventoryError::ValidationError(err.to_string())
    }
}

impl InventoryError {
    pub fn not_found(what: impl Into<String>) -> Self {
        InventoryError::NotFound(what.into())
    }

    pub fn invalid_quantity(msg: impl Into<String>) -> Self {
        InventoryError::InvalidQuantity(msg.into())
    }

    pub fn invalid_transfer(msg: impl Into<String>) -> Self {
        InventoryError::InvalidTransfer(msg.into())
    }

    pub fn insufficient_stock(msg: impl Into<String>) -> Self {
        InventoryError::InsufficientStock(msg.into())
    }

    /// Stable machine-readable kind, used by handlers and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::InvalidQuantity(_) => "invalid_quantity",
            Self::InvalidTransactionType(_) => "invalid_transaction_type",
            Self::InvalidTransfer(_) => "invalid_transfer",
            Self::InsufficientStock(_) => "insufficient_stock",
            Self::AlreadyCompleted(_) => "already_completed",
            Self::PartialTransfer { .. } => "partial_transfer",
            Self::ValidationError(_) => "validation_error",
            Self::StoreError(_) => "store_error",
            Self::SerializationError(_) => "serialization_error",
            Self::EventError(_) => "event_error",
            Self::Other(_) => "internal_error",
        }
    }

    /// True when the failure left the ledger in a state that needs
    /// compensation rather than a blind retry.
    pub fn needs_compensation(&self) -> bool {
        matches!(self, Self::PartialTransfer { .. })
    }
}

/// Serializable summary of an error for event payloads and exports.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorSummary {
    pub kind: String,
    pub message: String,
}

impl From<&InventoryError> for ErrorSummary {
    fn from(err: &InventoryError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}
