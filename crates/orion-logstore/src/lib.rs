//! Log-Store Client (spec component 4.A).
//!
//! A thin wrapper around the external append-only log store: push,
//! range query, and (optionally) tail. Every other component in the
//! core reaches the log store only through this crate.

pub mod client;
pub mod http;
pub mod memory;

pub use client::{
    backoff_delay, split_into_batches, LogRecord, LogStoreClient, DEFAULT_BATCH_CAP_BYTES,
    PUSH_DEADLINE, QUERY_DEADLINE,
};
pub use http::HttpLogStoreClient;
pub use memory::InMemoryLogStore;
