//! brokergate-state — configuration store for brokergate.
//!
//! Backed by [redb](https://docs.rs/redb), holds the four configuration
//! record kinds that drive route construction: brokers, broker endpoints,
//! endpoints and transformations.
//!
//! # Architecture
//!
//! Records are JSON-serialized into redb's `&[u8]` value columns, keyed by
//! a numeric id. Ids are allocated from a per-table sequence inside the same
//! write transaction that stores the record.
//!
//! Ownership is a strict tree (`BrokerEndpoint` → `Endpoint` →
//! `Transformation`) expressed with explicit foreign-key ids. The whole tree
//! can be written and read back in one transaction as an [`EndpointConfig`].
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
