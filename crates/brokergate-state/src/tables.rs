//! redb table definitions for the brokergate configuration store.
//!
//! Record tables use `u64` keys (the record id) and `&[u8]` values
//! (JSON-serialized records).

use redb::TableDefinition;

/// Brokers keyed by broker id.
pub const BROKERS: TableDefinition<u64, &[u8]> = TableDefinition::new("brokers");

/// Broker endpoints keyed by broker endpoint id.
pub const BROKER_ENDPOINTS: TableDefinition<u64, &[u8]> =
    TableDefinition::new("broker_endpoints");

/// Downstream endpoints keyed by endpoint id.
pub const ENDPOINTS: TableDefinition<u64, &[u8]> = TableDefinition::new("endpoints");

/// Transformations keyed by transformation id.
pub const TRANSFORMATIONS: TableDefinition<u64, &[u8]> = TableDefinition::new("transformations");

/// Last allocated id, keyed by record table name.
pub const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");
