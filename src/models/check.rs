use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::level::LocationId;

/// One counted line in a check. `expected_quantity` is snapshotted from the
/// level's standard quantity when the check is created and never retroactively
/// updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckItem {
    pub material_id: String,
    pub expected_quantity: Decimal,
    pub actual_quantity: Decimal,
    /// Whether a count has been entered; an uncounted item is treated as
    /// zero on completion.
    #[serde(default)]
    pub counted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceLine {
    pub material_id: String,
    pub quantity: Decimal,
}

/// Expected-vs-actual differences, split by direction. Magnitudes are always
/// positive; items that counted exactly appear in neither list.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Variance {
    pub missing: Vec<VarianceLine>,
    pub extra: Vec<VarianceLine>,
}

impl Variance {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty()
    }
}

/// One physical-count event for a location.
///
/// Lifecycle: created with all current levels snapshotted and actual counts at
/// zero, mutated per item as counts come in, then completed exactly once.
/// `variance` is only populated on completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryCheck {
    pub id: Uuid,
    pub location: LocationId,
    pub performed_by: String,
    pub date: DateTime<Utc>,
    pub items: Vec<CheckItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variance: Option<Variance>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

impl InventoryCheck {
    pub fn item(&self, material_id: &str) -> Option<&CheckItem> {
        self.items.iter().find(|item| item.material_id == material_id)
    }

    pub fn item_mut(&mut self, material_id: &str) -> Option<&mut CheckItem> {
        self.items
            .iter_mut()
            .find(|item| item.material_id == material_id)
    }

    /// Per-item diff of actual against expected.
    pub fn compute_variance(&self) -> Variance {
        let mut variance = Variance::default();
        for item in &self.items {
            let diff = item.actual_quantity - item.expected_quantity;
            if diff < Decimal::ZERO {
                variance.missing.push(VarianceLine {
                    material_id: item.material_id.clone(),
                    quantity: -diff,
                });
            } else if diff > Decimal::ZERO {
                variance.extra.push(VarianceLine {
                    material_id: item.material_id.clone(),
                    quantity: diff,
                });
            }
        }
        variance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn check_with(items: Vec<CheckItem>) -> InventoryCheck {
        InventoryCheck {
            id: Uuid::new_v4(),
            location: LocationId::case("c42"),
            performed_by: "user-1".into(),
            date: Utc::now(),
            items,
            variance: None,
            completed: false,
            created_at: Utc::now(),
            created_by: "user-1".into(),
            updated_at: Utc::now(),
            updated_by: "user-1".into(),
        }
    }

    fn item(material: &str, expected: Decimal, actual: Decimal) -> CheckItem {
        CheckItem {
            material_id: material.into(),
            expected_quantity: expected,
            actual_quantity: actual,
            counted: true,
            notes: None,
        }
    }

    #[test]
    fn variance_splits_by_direction_with_positive_magnitudes() {
        let check = check_with(vec![
            item("M1", dec!(10), dec!(6)),
            item("M2", dec!(5), dec!(8)),
            item("M3", dec!(4), dec!(4)),
        ]);
        let variance = check.compute_variance();
        assert_eq!(variance.missing.len(), 1);
        assert_eq!(variance.missing[0].material_id, "M1");
        assert_eq!(variance.missing[0].quantity, dec!(4));
        assert_eq!(variance.extra.len(), 1);
        assert_eq!(variance.extra[0].material_id, "M2");
        assert_eq!(variance.extra[0].quantity, dec!(3));
    }

    #[test]
    fn exact_counts_produce_a_clean_variance() {
        let check = check_with(vec![item("M1", dec!(7), dec!(7))]);
        assert!(check.compute_variance().is_clean());
    }
}
