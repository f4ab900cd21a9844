//! External collaborator lookups: the material catalog and template source.
//!
//! The catalog gates existence only; quantity math never depends on it beyond
//! validation, and its output enriches exports. The cached decorator is the
//! one piece of process-wide state: a lazily-filled handle created once and
//! reused across requests.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::errors::InventoryError;
use crate::models::template::LocationTemplate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
    pub unit_of_measure: Option<String>,
}

#[async_trait::async_trait]
pub trait MaterialCatalog: Send + Sync {
    async fn get_material(&self, material_id: &str) -> Result<Option<Material>, InventoryError>;
}

#[async_trait::async_trait]
pub trait TemplateCatalog: Send + Sync {
    async fn get_template(
        &self,
        template_id: &str,
    ) -> Result<Option<LocationTemplate>, InventoryError>;
}

/// In-memory catalog for tests and local runs.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    materials: DashMap<String, Material>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, material: Material) {
        self.materials.insert(material.id.clone(), material);
    }

    /// Registers a bare material with just an id and name.
    pub fn insert_basic(&self, id: impl Into<String>, name: impl Into<String>) {
        let id = id.into();
        self.insert(Material {
            id: id.clone(),
            name: name.into(),
            category: None,
            unit_of_measure: None,
        });
    }
}

#[async_trait::async_trait]
impl MaterialCatalog for InMemoryCatalog {
    async fn get_material(&self, material_id: &str) -> Result<Option<Material>, InventoryError> {
        Ok(self.materials.get(material_id).map(|entry| entry.clone()))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryTemplateCatalog {
    templates: DashMap<String, LocationTemplate>,
}

impl InMemoryTemplateCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, template: LocationTemplate) {
        self.templates.insert(template.id.clone(), template);
    }
}

#[async_trait::async_trait]
impl TemplateCatalog for InMemoryTemplateCatalog {
    async fn get_template(
        &self,
        template_id: &str,
    ) -> Result<Option<LocationTemplate>, InventoryError> {
        Ok(self.templates.get(template_id).map(|entry| entry.clone()))
    }
}

/// TTL cache over a catalog backend. Negative lookups are not cached, so a
/// material created after a miss is visible on the next call.
pub struct CachedCatalog {
    inner: Arc<dyn MaterialCatalog>,
    ttl: Duration,
    entries: DashMap<String, (Material, DateTime<Utc>)>,
}

impl CachedCatalog {
    pub fn new(inner: Arc<dyn MaterialCatalog>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: DashMap::new(),
        }
    }
}

#[async_trait::async_trait]
impl MaterialCatalog for CachedCatalog {
    async fn get_material(&self, material_id: &str) -> Result<Option<Material>, InventoryError> {
        if let Some(entry) = self.entries.get(material_id) {
            let (material, cached_at) = entry.value();
            if Utc::now() - *cached_at < self.ttl {
                return Ok(Some(material.clone()));
            }
        }
        let fetched = self.inner.get_material(material_id).await?;
        match fetched {
            Some(material) => {
                self.entries
                    .insert(material_id.to_string(), (material.clone(), Utc::now()));
                Ok(Some(material))
            }
            None => {
                self.entries.remove(material_id);
                Ok(None)
            }
        }
    }
}
