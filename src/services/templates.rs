use std::sync::Arc;

use lazy_static::lazy_static;
use prometheus::IntCounter;
use tracing::{info, instrument, warn};

use crate::catalog::TemplateCatalog;
use crate::errors::InventoryError;
use crate::events::{Event, EventSender};
use crate::models::level::LocationId;

use super::levels::{LevelService, UpsertLevel};
use super::locks::LevelLocks;

lazy_static! {
    pub(crate) static ref TEMPLATES_APPLIED: IntCounter = IntCounter::new(
        "inventory_templates_applied_total",
        "Total number of template applications"
    )
    .expect("metric can be created");
}

#[derive(Debug, Clone)]
pub struct TemplateApplication {
    pub items_applied: usize,
}

/// Seeds a case or vehicle from a named template, either adding to existing
/// levels or replacing them outright.
#[derive(Clone)]
pub struct TemplateService {
    levels: LevelService,
    templates: Arc<dyn TemplateCatalog>,
    locks: Arc<LevelLocks>,
    event_sender: Option<EventSender>,
}

impl TemplateService {
    pub fn new(
        levels: LevelService,
        templates: Arc<dyn TemplateCatalog>,
        locks: Arc<LevelLocks>,
        event_sender: Option<EventSender>,
    ) -> Self {
        Self {
            levels,
            templates,
            locks,
            event_sender,
        }
    }

    /// With `replace_existing` each item is a hard set to the template's
    /// standard quantity, so reapplying is idempotent; without it the
    /// standard quantity is added on top of whatever the location holds.
    #[instrument(skip(self), fields(location = %location))]
    pub async fn apply(
        &self,
        location: &LocationId,
        template_id: &str,
        actor: &str,
        replace_existing: bool,
    ) -> Result<TemplateApplication, InventoryError> {
        let template = self
            .templates
            .get_template(template_id)
            .await?
            .ok_or_else(|| InventoryError::not_found(format!("template {template_id}")))?;

        let mut items_applied = 0;
        for item in &template.items {
            let _guard = self.locks.acquire(location, &item.material_id).await;
            let new_quantity = if replace_existing {
                item.standard_quantity
            } else {
                let existing = self
                    .levels
                    .get_level(location, &item.material_id)
                    .await?
                    .map(|level| level.current_quantity)
                    .unwrap_or_default();
                existing + item.standard_quantity
            };

            self.levels
                .upsert_level(UpsertLevel {
                    location: location.clone(),
                    material_id: item.material_id.clone(),
                    new_quantity,
                    actor: actor.to_string(),
                    standard_quantity: Some(item.standard_quantity),
                    bin_location: item.bin_location.clone(),
                })
                .await?;
            items_applied += 1;
        }

        TEMPLATES_APPLIED.inc();
        info!(
            template = %template_id,
            items = items_applied,
            replace = replace_existing,
            "Template applied"
        );
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender
                .send(Event::TemplateApplied {
                    location: location.clone(),
                    template_id: template_id.to_string(),
                    items_applied,
                    replace_existing,
                })
                .await
            {
                warn!("Failed to send template event: {}", e);
            }
        }

        Ok(TemplateApplication { items_applied })
    }
}
