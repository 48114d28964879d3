//! List-membership capability.
//!
//! The list cache asks a [`ListService`] for the members of each curated
//! list. [`XrpcClient`] implements it against an AT Protocol PDS.

pub mod xrpc;

use std::collections::HashSet;
use std::future::Future;

use crate::error::IngestError;

pub use xrpc::XrpcClient;

/// Source of list memberships.
pub trait ListService: Send + Sync {
    /// Establishes an authenticated session.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Auth`] if the credentials are rejected or the
    /// service is unreachable.
    fn login(&self) -> impl Future<Output = Result<(), IngestError>> + Send;

    /// Returns the DIDs of every member of `list` (an `at://` list URI).
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::ListFetch`] if any page of the list cannot be
    /// fetched.
    fn list_members(
        &self,
        list: &str,
    ) -> impl Future<Output = Result<HashSet<String>, IngestError>> + Send;
}
