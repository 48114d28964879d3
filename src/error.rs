//! Ingest error types.
//!
//! [`IngestError`] is the central error type for the pipeline. The driver
//! uses [`IngestError::is_fatal`] to decide whether a failure ends the
//! subscription or is logged and skipped.

/// Pipeline error enum.
///
/// # Failure Policy
///
/// | Variant       | Scope                         | Driver reaction          |
/// |---------------|-------------------------------|--------------------------|
/// | `Config`      | startup                       | fatal                    |
/// | `Auth`        | login                         | fatal                    |
/// | `Transport`   | stream connect                | fatal                    |
/// | `Decode`      | single frame / operation      | dropped, logged          |
/// | `Validation`  | single operation              | dropped silently         |
/// | `ListFetch`   | list refresh                  | previous snapshot kept   |
/// | `Persistence` | one event's writes / cursor   | event skipped, logged    |
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Authentication with the upstream service failed.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The event stream could not be established.
    #[error("transport error: {0}")]
    Transport(String),

    /// A frame, CAR block or record could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// A record does not conform to its collection schema.
    #[error("schema validation failed: {0}")]
    Validation(String),

    /// Fetching a moderation list failed.
    #[error("list fetch failed for {list}: {message}")]
    ListFetch {
        /// The list URI that failed.
        list: String,
        /// Underlying failure description.
        message: String,
    },

    /// Storage layer failure.
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl IngestError {
    /// Returns `true` if this error must stop the subscription driver.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Auth(_) | Self::Transport(_))
    }

    /// Short machine-readable label, used as a structured log field.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Auth(_) => "auth",
            Self::Transport(_) => "transport",
            Self::Decode(_) => "decode",
            Self::Validation(_) => "validation",
            Self::ListFetch { .. } => "list_fetch",
            Self::Persistence(_) => "persistence",
        }
    }
}

impl From<sqlx::Error> for IngestError {
    fn from(err: sqlx::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for IngestError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::Persistence(err.to_string())
    }
}
