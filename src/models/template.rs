use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One line of a template: what a stocked case/vehicle should carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateItem {
    pub material_id: String,
    pub standard_quantity: Decimal,
    /// Suggested bin/shelf within the location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bin_location: Option<String>,
}

/// Named list of materials and standard quantities used to seed a new case or
/// vehicle. Authored by administrators elsewhere; consumed read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationTemplate {
    pub id: String,
    pub name: String,
    pub items: Vec<TemplateItem>,
}
