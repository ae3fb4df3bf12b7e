//! Query side: projections folded from the event store.
//!
//! - [`Projection`] is the contract a view implements
//! - [`ProjectionProcessor`] replays stored events into registered views
//! - [`PurchaseLedgerView`] resolves provider correlation ids and per-user purchases
//! - [`CourseCatalogView`] serves course listings and search

pub mod error;
pub mod processor;
pub mod projection;
pub mod views;

pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::{Checkpoint, Projection};
pub use views::{
    CourseCatalogView, CourseListing, PriceSort, PurchaseLedgerView, PurchaseSummary, SearchQuery,
};
