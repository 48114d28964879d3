//! Event stream capability.
//!
//! [`EventSource`] is what the subscription driver consumes. The concrete
//! [`FirehoseStream`] speaks `com.atproto.sync.subscribeRepos` over a
//! websocket; frames are decoded by [`frame`], commit block sets by [`car`]
//! and record blocks by [`record`].

pub mod car;
pub mod frame;
pub mod record;
pub mod stream;

#[cfg(test)]
pub(crate) mod testing;

use std::future::Future;

use crate::domain::RepoEvent;
use crate::error::IngestError;

pub use frame::{Frame, decode_frame};
pub use record::decode_record;
pub use stream::FirehoseStream;

/// A source of repository change events in strictly increasing sequence
/// order.
pub trait EventSource: Send {
    /// Opens the stream, resuming after `cursor` when one is given.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Transport`] if the stream cannot be opened.
    fn connect(
        &mut self,
        cursor: Option<i64>,
    ) -> impl Future<Output = Result<(), IngestError>> + Send;

    /// Waits for the next event. `Ok(None)` means the stream has ended.
    ///
    /// # Errors
    ///
    /// Returns an error only when the source cannot continue.
    fn next_event(&mut self) -> impl Future<Output = Result<Option<RepoEvent>, IngestError>> + Send;
}
