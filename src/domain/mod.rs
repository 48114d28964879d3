//! Domain layer: protocol types, decoded records, categories and status.
//!
//! Everything here is plain data. Decoding lives in [`crate::firehose`],
//! behavior in [`crate::service`].

pub mod category;
pub mod feed_row;
pub mod list_snapshot;
pub mod operation;
pub mod records;
pub mod repo_event;
pub mod status;

pub use category::Category;
pub use feed_row::FeedRow;
pub use list_snapshot::{ListSizes, ListSnapshot, ListTopic};
pub use operation::{CreateOp, DeleteOp, Operations, OperationsByType, PostCreate};
pub use records::{IngestedRecord, PostRecord};
pub use repo_event::{BlockMap, Commit, OpAction, RepoEvent, RepoOp};
pub use status::{IngestStatus, StatusReport, SubscriptionState};
