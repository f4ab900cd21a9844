//! Partition/sort key conventions.
//!
//! Levels:       (location, "INVENTORY#<material_id>")
//! Transactions: (location, "TRANSACTION#<millis>#<transaction_id>")
//! Checks:       (location, "CHECK#<check_id>")
//!
//! Transaction sort keys embed a zero-padded millisecond timestamp so that
//! lexicographic order equals creation order; a process-wide sequence breaks
//! ties within a millisecond, and the transaction id suffix keeps keys unique
//! across writers.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use uuid::Uuid;

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

pub const LEVEL_PREFIX: &str = "INVENTORY#";
pub const TRANSACTION_PREFIX: &str = "TRANSACTION#";
pub const CHECK_PREFIX: &str = "CHECK#";

pub fn level_sort_key(material_id: &str) -> String {
    format!("{LEVEL_PREFIX}{material_id}")
}

pub fn transaction_sort_key(at: DateTime<Utc>, transaction_id: Uuid) -> String {
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed) % 100_000_000;
    format!(
        "{TRANSACTION_PREFIX}{:015}#{seq:08}#{transaction_id}",
        at.timestamp_millis()
    )
}

pub fn check_sort_key(check_id: Uuid) -> String {
    format!("{CHECK_PREFIX}{check_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn transaction_keys_sort_by_creation_time() {
        let early = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 1).unwrap();
        let a = transaction_sort_key(early, Uuid::new_v4());
        let b = transaction_sort_key(late, Uuid::new_v4());
        assert!(a < b);
        assert!(a.starts_with(TRANSACTION_PREFIX));
    }

    #[test]
    fn same_millisecond_keys_stay_ordered_and_unique() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let a = transaction_sort_key(at, Uuid::new_v4());
        let b = transaction_sort_key(at, Uuid::new_v4());
        assert_ne!(a, b);
        // The sequence component keeps in-process writes in creation order
        // even when timestamps collide.
        assert!(a < b);
    }

    #[test]
    fn level_keys_carry_the_material() {
        assert_eq!(level_sort_key("M1"), "INVENTORY#M1");
    }
}
