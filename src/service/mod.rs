//! Service layer: the ingestion pipeline.
//!
//! [`FirehoseSubscription`] drives events through [`extract_operations`],
//! [`classify`] (against the [`ListCache`] snapshot) and [`apply_batch`],
//! and schedules cursor storage, list refreshes and [`RetentionPurger`]
//! runs.

pub mod batch;
pub mod classifier;
pub mod extractor;
pub mod list_cache;
pub mod retention;
pub mod subscription;
pub mod validator;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::{IngestBatch, apply_batch, build_batch};
pub use classifier::{classify, has_external_link};
pub use extractor::extract_operations;
pub use list_cache::ListCache;
pub use retention::RetentionPurger;
pub use subscription::{FirehoseSubscription, SubscriptionSettings};
pub use validator::{LexiconValidator, SchemaValidator};
