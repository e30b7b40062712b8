//! Strata: feature-oriented configuration management
//!
//! Variants of a system are committed as artifact trees together with the
//! feature configuration they implement. Extraction slices the trees into
//! associations, each carrying a presence condition over feature modules, and
//! composition reassembles a variant for any configuration from the
//! associations whose conditions hold.

pub mod artifact;
pub mod association;
pub mod cli;
pub mod composition;
pub mod concurrency;
pub mod condition;
pub mod config;
pub mod dependency;
pub mod digest;
pub mod error;
pub mod feature;
pub mod logging;
pub mod module;
pub mod repository;
pub mod store;
pub mod text;
pub mod tree;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use composition::{Checkout, MaterializedCheckout, OrderWarning};
pub use error::{ApiError, StorageError};
pub use feature::{Configuration, FeatureInstance};
pub use repository::{Commit, Repository};
pub use types::{AssociationId, RevisionRef};
