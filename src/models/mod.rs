pub mod check;
pub mod level;
pub mod template;
pub mod transaction;

pub use check::{CheckItem, InventoryCheck, Variance, VarianceLine};
pub use level::{InventoryLevel, LevelExportRow, LocationId};
pub use template::{LocationTemplate, TemplateItem};
pub use transaction::{InventoryTransaction, LevelEffect, Movement, TransferRole};
