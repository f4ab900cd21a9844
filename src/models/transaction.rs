use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::level::LocationId;
use crate::errors::InventoryError;

/// Which side of a transfer a transaction records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferRole {
    Outgoing,
    Incoming,
}

/// One quantity-changing movement, as a closed sum over the transaction
/// types. Each variant carries exactly the fields it needs; directionality of
/// a transfer is explicit in the variant, never inferred from sign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Movement {
    /// Materials bought in; increases holdings.
    Purchase { quantity: Decimal },
    /// Restock from the company warehouse; increases holdings.
    Stock { quantity: Decimal },
    /// Materials returned to the location; increases holdings.
    Return { quantity: Decimal },
    /// Reserved against a project; decreases holdings.
    Allocation { quantity: Decimal },
    /// Consumed on a job; decreases holdings.
    Usage { quantity: Decimal },
    /// Correction where `delta` itself carries the sign.
    Adjustment { delta: Decimal },
    /// Unvalidated correction entered by hand; `delta` carries the sign.
    ManualAdjustment { delta: Decimal },
    /// Broken or lost material; always a decrease.
    Damage { quantity: Decimal },
    /// One leg of a two-location transfer.
    Transfer {
        role: TransferRole,
        counterpart: LocationId,
        quantity: Decimal,
    },
    /// Physical-count correction: sets the level to `counted` directly.
    InventoryCount { counted: Decimal },
}

/// How a movement affects the stored level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LevelEffect {
    /// Add the signed delta to the current quantity.
    Delta(Decimal),
    /// Overwrite the current quantity, bypassing delta math.
    Set(Decimal),
}

impl LevelEffect {
    /// New absolute quantity given the current one.
    pub fn apply(self, current: Decimal) -> Decimal {
        match self {
            LevelEffect::Delta(delta) => current + delta,
            LevelEffect::Set(value) => value,
        }
    }
}

impl Movement {
    /// The quantity policy: pure mapping from movement to level effect.
    pub fn level_effect(&self) -> LevelEffect {
        match *self {
            Movement::Purchase { quantity }
            | Movement::Stock { quantity }
            | Movement::Return { quantity } => LevelEffect::Delta(quantity),
            Movement::Allocation { quantity }
            | Movement::Usage { quantity }
            | Movement::Damage { quantity } => LevelEffect::Delta(-quantity),
            Movement::Adjustment { delta } | Movement::ManualAdjustment { delta } => {
                LevelEffect::Delta(delta)
            }
            Movement::Transfer { role, quantity, .. } => match role {
                TransferRole::Outgoing => LevelEffect::Delta(-quantity),
                TransferRole::Incoming => LevelEffect::Delta(quantity),
            },
            Movement::InventoryCount { counted } => LevelEffect::Set(counted),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Movement::Purchase { .. } => "purchase",
            Movement::Stock { .. } => "stock",
            Movement::Return { .. } => "return",
            Movement::Allocation { .. } => "allocation",
            Movement::Usage { .. } => "usage",
            Movement::Adjustment { .. } => "adjustment",
            Movement::ManualAdjustment { .. } => "manual_adjustment",
            Movement::Damage { .. } => "damage",
            Movement::Transfer { .. } => "transfer",
            Movement::InventoryCount { .. } => "inventory_check",
        }
    }

    /// The quantity as supplied by the caller, for the audit record.
    pub fn quantity(&self) -> Decimal {
        match *self {
            Movement::Purchase { quantity }
            | Movement::Stock { quantity }
            | Movement::Return { quantity }
            | Movement::Allocation { quantity }
            | Movement::Usage { quantity }
            | Movement::Damage { quantity }
            | Movement::Transfer { quantity, .. } => quantity,
            Movement::Adjustment { delta } | Movement::ManualAdjustment { delta } => delta,
            Movement::InventoryCount { counted } => counted,
        }
    }

    /// Re-checks the sign rules enforced by [`Movement::from_parts`], for
    /// callers that construct variants directly.
    pub fn validate(&self) -> Result<(), InventoryError> {
        match *self {
            Movement::Purchase { quantity }
            | Movement::Stock { quantity }
            | Movement::Return { quantity }
            | Movement::Allocation { quantity }
            | Movement::Usage { quantity }
            | Movement::Damage { quantity }
            | Movement::Transfer { quantity, .. } => {
                if quantity <= Decimal::ZERO {
                    return Err(InventoryError::invalid_quantity(format!(
                        "{} requires a positive quantity, got {quantity}",
                        self.kind()
                    )));
                }
            }
            Movement::Adjustment { delta } | Movement::ManualAdjustment { delta } => {
                if delta == Decimal::ZERO {
                    return Err(InventoryError::invalid_quantity(
                        "adjustment delta must be non-zero",
                    ));
                }
            }
            Movement::InventoryCount { counted } => {
                if counted < Decimal::ZERO {
                    return Err(InventoryError::invalid_quantity(
                        "counted quantity cannot be negative",
                    ));
                }
            }
        }
        Ok(())
    }

    /// Boundary constructor from the wire-level `(type, quantity)` pair.
    ///
    /// Magnitude-carrying types require a positive quantity; adjustments
    /// require a non-zero signed delta; counts require a non-negative value.
    /// Transfers must state their role and counterpart explicitly.
    pub fn from_parts(
        kind: &str,
        quantity: Decimal,
        transfer: Option<(TransferRole, LocationId)>,
    ) -> Result<Self, InventoryError> {
        let positive = |quantity: Decimal| -> Result<Decimal, InventoryError> {
            if quantity <= Decimal::ZERO {
                return Err(InventoryError::invalid_quantity(format!(
                    "{kind} requires a positive quantity, got {quantity}"
                )));
            }
            Ok(quantity)
        };

        let movement = match kind {
            "purchase" => Movement::Purchase {
                quantity: positive(quantity)?,
            },
            "stock" => Movement::Stock {
                quantity: positive(quantity)?,
            },
            "return" => Movement::Return {
                quantity: positive(quantity)?,
            },
            "allocation" => Movement::Allocation {
                quantity: positive(quantity)?,
            },
            "usage" => Movement::Usage {
                quantity: positive(quantity)?,
            },
            "damage" => Movement::Damage {
                quantity: positive(quantity)?,
            },
            "adjustment" | "manual_adjustment" => {
                if quantity == Decimal::ZERO {
                    return Err(InventoryError::invalid_quantity(
                        "adjustment delta must be non-zero",
                    ));
                }
                if kind == "adjustment" {
                    Movement::Adjustment { delta: quantity }
                } else {
                    Movement::ManualAdjustment { delta: quantity }
                }
            }
            "transfer" => {
                let (role, counterpart) = transfer.ok_or_else(|| {
                    InventoryError::invalid_transfer(
                        "transfer requires an explicit role and counterpart location",
                    )
                })?;
                Movement::Transfer {
                    role,
                    counterpart,
                    quantity: positive(quantity)?,
                }
            }
            "inventory_check" => {
                if quantity < Decimal::ZERO {
                    return Err(InventoryError::invalid_quantity(
                        "counted quantity cannot be negative",
                    ));
                }
                Movement::InventoryCount { counted: quantity }
            }
            other => return Err(InventoryError::InvalidTransactionType(other.to_string())),
        };
        Ok(movement)
    }
}

/// Immutable record of one movement. Source of truth for the ledger; the
/// level row is a derived cache. Never mutated or deleted after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryTransaction {
    pub id: Uuid,
    pub location: LocationId,
    pub material_id: String,
    #[serde(flatten)]
    pub movement: Movement,
    /// Level before and after this movement was applied, for audit reads.
    pub previous_quantity: Decimal,
    pub new_quantity: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}
