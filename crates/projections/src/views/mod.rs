//! Read model views.

mod course_catalog;
mod purchase_ledger;

pub use course_catalog::{CourseCatalogView, CourseListing, PriceSort, SearchQuery};
pub use purchase_ledger::{PurchaseLedgerView, PurchaseSummary};
