use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// An inventory-holding entity: the company warehouse, a vehicle, or an
/// employee case.
///
/// The warehouse is a single abstract location; vehicles and cases carry
/// their own identifiers. Serializes as its partition key string
/// (`warehouse`, `vehicle#<id>`, `case#<id>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LocationId {
    Warehouse,
    Vehicle(String),
    Case(String),
}

impl LocationId {
    pub fn vehicle(id: impl Into<String>) -> Self {
        LocationId::Vehicle(id.into())
    }

    pub fn case(id: impl Into<String>) -> Self {
        LocationId::Case(id.into())
    }

    pub fn is_warehouse(&self) -> bool {
        matches!(self, LocationId::Warehouse)
    }

    /// Partition key for this location's records.
    pub fn as_key(&self) -> String {
        match self {
            LocationId::Warehouse => "warehouse".to_string(),
            LocationId::Vehicle(id) => format!("vehicle#{id}"),
            LocationId::Case(id) => format!("case#{id}"),
        }
    }
}

impl std::fmt::Display for LocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_key())
    }
}

impl std::str::FromStr for LocationId {
    type Err = crate::errors::InventoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "warehouse" {
            return Ok(LocationId::Warehouse);
        }
        if let Some(id) = s.strip_prefix("vehicle#") {
            if !id.is_empty() {
                return Ok(LocationId::Vehicle(id.to_string()));
            }
        }
        if let Some(id) = s.strip_prefix("case#") {
            if !id.is_empty() {
                return Ok(LocationId::Case(id.to_string()));
            }
        }
        Err(crate::errors::InventoryError::not_found(format!(
            "location {s}"
        )))
    }
}

impl Serialize for LocationId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_key())
    }
}

impl<'de> Deserialize<'de> for LocationId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let key = String::deserialize(deserializer)?;
        key.parse().map_err(serde::de::Error::custom)
    }
}

/// Current tracked quantity of one material at one location.
///
/// Derived cache over the transaction history: `current_quantity` is the fold
/// of all signed deltas for this (location, material), modulo the absolute-set
/// semantics of inventory counts. Rows are never deleted; quantity can be
/// driven to zero but the row persists for bin-location and standard-quantity
/// metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryLevel {
    pub location: LocationId,
    pub material_id: String,
    pub current_quantity: Decimal,
    /// Target/par level; seeds `expected_quantity` when a check is created.
    pub standard_quantity: Option<Decimal>,
    /// Free-text bin/shelf within the location.
    pub bin_location: Option<String>,
    pub last_stock_check: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

impl InventoryLevel {
    /// True when holdings have fallen below the standard quantity.
    pub fn is_below_standard(&self) -> bool {
        self.standard_quantity
            .map(|standard| self.current_quantity < standard)
            .unwrap_or(false)
    }
}

/// Plain row handed to the external CSV/S3 import/export layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct LevelExportRow {
    #[validate(length(min = 1, message = "Material ID cannot be empty"))]
    pub material_id: String,
    pub quantity: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standard_quantity: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bin_location: Option<String>,
}

impl From<&InventoryLevel> for LevelExportRow {
    fn from(level: &InventoryLevel) -> Self {
        Self {
            material_id: level.material_id.clone(),
            quantity: level.current_quantity,
            standard_quantity: level.standard_quantity,
            bin_location: level.bin_location.clone(),
        }
    }
}
