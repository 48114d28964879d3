//! # newsfeed-ingest
//!
//! Firehose ingestion pipeline for Bluesky news feeds.
//!
//! The service subscribes to the network's repository event stream, decodes
//! post creations and deletions, classifies posts as headlines, charts or
//! journalist posts using cheap text heuristics plus curated author lists,
//! and stores matches in one Postgres table per category. A separate feed
//! generator serves feeds from those tables.
//!
//! ## Architecture
//!
//! ```text
//! Firehose (websocket, CBOR frames)
//!     │
//!     ├── FirehoseStream (firehose/)
//!     │
//!     ├── FirehoseSubscription (service/)
//!     │     ├── extract_operations → LexiconValidator
//!     │     ├── classify ← ListCache ← XrpcClient (lists/)
//!     │     ├── apply_batch
//!     │     └── RetentionPurger
//!     │
//!     ├── IngestStatus (domain/) → /health, /status (api/)
//!     │
//!     └── PostgreSQL Persistence (headline, chart, journalist, sub_state)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod firehose;
pub mod lists;
pub mod persistence;
pub mod service;
