use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use tracing::{info, instrument};
use validator::Validate;

use crate::errors::InventoryError;
use crate::models::level::{InventoryLevel, LevelExportRow, LocationId};
use crate::store::{from_document, keys, to_document, LedgerStore, QueryOptions};

use super::locks::LevelLocks;

/// Parameters for a level upsert. The quantity is a **set**, not a delta;
/// callers compute the new absolute value first.
#[derive(Debug, Clone)]
pub struct UpsertLevel {
    pub location: LocationId,
    pub material_id: String,
    pub new_quantity: Decimal,
    pub actor: String,
    /// Overrides the standard quantity; on first creation a missing value
    /// defaults to `new_quantity`.
    pub standard_quantity: Option<Decimal>,
    pub bin_location: Option<String>,
}

/// Read/update of (location, material) current-quantity rows over the ledger
/// store.
///
/// Point reads and single-row upserts take no lock themselves; callers that
/// compose a read-modify-write (the recorder, the template applicator,
/// `import_rows` below) hold the shared per-key lock across the window.
#[derive(Clone)]
pub struct LevelService {
    store: Arc<dyn LedgerStore>,
    locks: Arc<LevelLocks>,
}

impl LevelService {
    pub fn new(store: Arc<dyn LedgerStore>, locks: Arc<LevelLocks>) -> Self {
        Self { store, locks }
    }

    #[instrument(skip(self), fields(location = %location, material = %material_id))]
    pub async fn get_level(
        &self,
        location: &LocationId,
        material_id: &str,
    ) -> Result<Option<InventoryLevel>, InventoryError> {
        let doc = self
            .store
            .get(&location.as_key(), &keys::level_sort_key(material_id))
            .await?;
        doc.map(|d| from_document(d).map_err(InventoryError::from))
            .transpose()
    }

    /// Creates or overwrites the level row. Rows are never deleted; a
    /// quantity of zero keeps the row and its metadata.
    #[instrument(skip(self, upsert), fields(location = %upsert.location, material = %upsert.material_id))]
    pub async fn upsert_level(
        &self,
        upsert: UpsertLevel,
    ) -> Result<InventoryLevel, InventoryError> {
        let now = Utc::now();
        let existing = self.get_level(&upsert.location, &upsert.material_id).await?;

        let level = match existing {
            Some(mut level) => {
                level.current_quantity = upsert.new_quantity;
                if let Some(standard) = upsert.standard_quantity {
                    level.standard_quantity = Some(standard);
                }
                if let Some(bin) = upsert.bin_location {
                    level.bin_location = Some(bin);
                }
                level.updated_at = now;
                level.updated_by = upsert.actor;
                level
            }
            None => InventoryLevel {
                location: upsert.location.clone(),
                material_id: upsert.material_id.clone(),
                current_quantity: upsert.new_quantity,
                standard_quantity: Some(
                    upsert.standard_quantity.unwrap_or(upsert.new_quantity),
                ),
                bin_location: upsert.bin_location,
                last_stock_check: None,
                created_at: now,
                created_by: upsert.actor.clone(),
                updated_at: now,
                updated_by: upsert.actor,
            },
        };

        self.store
            .put(
                &level.location.as_key(),
                &keys::level_sort_key(&level.material_id),
                to_document(&level)?,
            )
            .await?;

        info!(
            location = %level.location,
            material = %level.material_id,
            quantity = %level.current_quantity,
            "Level upserted"
        );
        Ok(level)
    }

    /// Full snapshot of one location's levels, unordered.
    #[instrument(skip(self), fields(location = %location))]
    pub async fn list_levels(
        &self,
        location: &LocationId,
    ) -> Result<Vec<InventoryLevel>, InventoryError> {
        let docs = self
            .store
            .query_prefix(&location.as_key(), keys::LEVEL_PREFIX, QueryOptions::default())
            .await?;
        docs.into_iter()
            .map(|d| from_document(d).map_err(InventoryError::from))
            .collect()
    }

    /// Stamps the last-stock-check time via a partial merge, leaving the
    /// quantity fields untouched.
    pub async fn mark_stock_checked(
        &self,
        location: &LocationId,
        material_id: &str,
        at: DateTime<Utc>,
        actor: &str,
    ) -> Result<(), InventoryError> {
        let mut delta = Map::new();
        delta.insert(
            "last_stock_check".to_string(),
            serde_json::to_value(at).map_err(InventoryError::SerializationError)?,
        );
        delta.insert(
            "updated_at".to_string(),
            serde_json::to_value(Utc::now()).map_err(InventoryError::SerializationError)?,
        );
        delta.insert("updated_by".to_string(), Value::String(actor.to_string()));
        self.store
            .update(&location.as_key(), &keys::level_sort_key(material_id), delta)
            .await?;
        Ok(())
    }

    /// Rows for the external CSV/S3 export layer.
    pub async fn export_rows(
        &self,
        location: &LocationId,
    ) -> Result<Vec<LevelExportRow>, InventoryError> {
        let levels = self.list_levels(location).await?;
        Ok(levels.iter().map(LevelExportRow::from).collect())
    }

    /// Seeds levels from rows produced by the external import layer. With
    /// `replace` each row is a hard set; otherwise quantities add to whatever
    /// the location already holds.
    #[instrument(skip(self, rows), fields(location = %location, rows = rows.len()))]
    pub async fn import_rows(
        &self,
        location: &LocationId,
        rows: Vec<LevelExportRow>,
        actor: &str,
        replace: bool,
    ) -> Result<usize, InventoryError> {
        for row in &rows {
            row.validate()?;
        }

        let count = rows.len();
        for row in rows {
            let _guard = self.locks.acquire(location, &row.material_id).await;
            let new_quantity = if replace {
                row.quantity
            } else {
                let existing = self
                    .get_level(location, &row.material_id)
                    .await?
                    .map(|level| level.current_quantity)
                    .unwrap_or_default();
                existing + row.quantity
            };
            self.upsert_level(UpsertLevel {
                location: location.clone(),
                material_id: row.material_id,
                new_quantity,
                actor: actor.to_string(),
                standard_quantity: row.standard_quantity,
                bin_location: row.bin_location,
            })
            .await?;
        }
        Ok(count)
    }

    /// Levels whose holdings have fallen below their standard quantity.
    pub async fn below_standard(
        &self,
        location: &LocationId,
    ) -> Result<Vec<InventoryLevel>, InventoryError> {
        let levels = self.list_levels(location).await?;
        Ok(levels
            .into_iter()
            .filter(InventoryLevel::is_below_standard)
            .collect())
    }
}
