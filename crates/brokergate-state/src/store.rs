//! StateStore — redb-backed configuration persistence for brokergate.
//!
//! Provides primary-key CRUD over brokers, broker endpoints, endpoints and
//! transformations, plus a cascading save/load of a whole
//! [`EndpointConfig`] tree. All values are JSON-serialized into redb's
//! `&[u8]` value columns. The store supports both on-disk and in-memory
//! backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

type RecordTable = TableDefinition<'static, u64, &'static [u8]>;

fn table_for(kind: RecordKind) -> RecordTable {
    match kind {
        RecordKind::Broker => BROKERS,
        RecordKind::BrokerEndpoint => BROKER_ENDPOINTS,
        RecordKind::Endpoint => ENDPOINTS,
        RecordKind::Transformation => TRANSFORMATIONS,
    }
}

/// Thread-safe configuration store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(BROKERS).map_err(map_err!(Table))?;
        txn.open_table(BROKER_ENDPOINTS).map_err(map_err!(Table))?;
        txn.open_table(ENDPOINTS).map_err(map_err!(Table))?;
        txn.open_table(TRANSFORMATIONS).map_err(map_err!(Table))?;
        txn.open_table(SEQUENCES).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Generic record access ──────────────────────────────────────

    /// Get any record by kind and id.
    pub fn get(&self, kind: RecordKind, id: RecordId) -> StateResult<Option<Record>> {
        let record = match kind {
            RecordKind::Broker => self.get_record::<Broker>(id)?.map(Record::Broker),
            RecordKind::BrokerEndpoint => self
                .get_record::<BrokerEndpoint>(id)?
                .map(Record::BrokerEndpoint),
            RecordKind::Endpoint => self.get_record::<Endpoint>(id)?.map(Record::Endpoint),
            RecordKind::Transformation => self
                .get_record::<Transformation>(id)?
                .map(Record::Transformation),
        };
        Ok(record)
    }

    /// Insert or update any record. Returns the record with its id assigned.
    pub fn save(&self, record: Record) -> StateResult<Record> {
        let saved = match record {
            Record::Broker(r) => Record::Broker(self.put_record(r)?),
            Record::BrokerEndpoint(r) => Record::BrokerEndpoint(self.put_broker_endpoint(r)?),
            Record::Endpoint(r) => Record::Endpoint(self.put_record(r)?),
            Record::Transformation(r) => Record::Transformation(self.put_record(r)?),
        };
        Ok(saved)
    }

    /// Get a typed record by id.
    pub fn get_record<T: StoredRecord>(&self, id: RecordId) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn
            .open_table(table_for(T::KIND))
            .map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: T =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Insert or update a typed record, allocating an id when it is `0`.
    pub fn put_record<T: StoredRecord>(&self, mut record: T) -> StateResult<T> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        insert_record(&txn, &mut record)?;
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(kind = %T::KIND, id = record.record_id(), "record stored");
        Ok(record)
    }

    /// Delete a record by kind and id. Returns true if it existed.
    pub fn delete(&self, kind: RecordKind, id: RecordId) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(table_for(kind)).map_err(map_err!(Table))?;
            existed = table.remove(id).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%kind, id, existed, "record deleted");
        Ok(existed)
    }

    // ── Brokers ────────────────────────────────────────────────────

    pub fn put_broker(&self, broker: Broker) -> StateResult<Broker> {
        self.put_record(broker)
    }

    pub fn get_broker(&self, id: RecordId) -> StateResult<Option<Broker>> {
        self.get_record(id)
    }

    // ── Broker endpoints ───────────────────────────────────────────

    /// Insert or update a broker endpoint, enforcing name uniqueness
    /// within its broker.
    pub fn put_broker_endpoint(&self, mut endpoint: BrokerEndpoint) -> StateResult<BrokerEndpoint> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        ensure_unique_name(&txn, &endpoint)?;
        insert_record(&txn, &mut endpoint)?;
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(id = endpoint.id, name = %endpoint.name, "broker endpoint stored");
        Ok(endpoint)
    }

    pub fn get_broker_endpoint(&self, id: RecordId) -> StateResult<Option<BrokerEndpoint>> {
        self.get_record(id)
    }

    /// List all broker endpoints.
    pub fn list_broker_endpoints(&self) -> StateResult<Vec<BrokerEndpoint>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(BROKER_ENDPOINTS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let endpoint: BrokerEndpoint =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(endpoint);
        }
        Ok(results)
    }

    // ── Endpoints & transformations ────────────────────────────────

    pub fn put_endpoint(&self, endpoint: Endpoint) -> StateResult<Endpoint> {
        self.put_record(endpoint)
    }

    pub fn get_endpoint(&self, id: RecordId) -> StateResult<Option<Endpoint>> {
        self.get_record(id)
    }

    pub fn put_transformation(&self, transformation: Transformation) -> StateResult<Transformation> {
        self.put_record(transformation)
    }

    pub fn get_transformation(&self, id: RecordId) -> StateResult<Option<Transformation>> {
        self.get_record(id)
    }

    // ── Endpoint configuration trees ───────────────────────────────

    /// Store a broker endpoint with its endpoint and transformation in a
    /// single transaction, wiring up the foreign keys in both directions.
    pub fn save_endpoint_config(&self, config: EndpointConfig) -> StateResult<EndpointConfig> {
        let EndpointConfig {
            mut broker_endpoint,
            mut endpoint,
            mut transformation,
        } = config;

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        ensure_unique_name(&txn, &broker_endpoint)?;

        broker_endpoint.id = assign_id(&txn, RecordKind::BrokerEndpoint, broker_endpoint.id)?;
        endpoint.id = assign_id(&txn, RecordKind::Endpoint, endpoint.id)?;
        transformation.id = assign_id(&txn, RecordKind::Transformation, transformation.id)?;

        broker_endpoint.endpoint_id = Some(endpoint.id);
        endpoint.broker_endpoint_id = broker_endpoint.id;
        endpoint.transformation_id = Some(transformation.id);
        transformation.endpoint_id = endpoint.id;

        insert_record(&txn, &mut broker_endpoint)?;
        insert_record(&txn, &mut endpoint)?;
        insert_record(&txn, &mut transformation)?;
        txn.commit().map_err(map_err!(Transaction))?;

        debug!(
            broker_endpoint = broker_endpoint.id,
            endpoint = endpoint.id,
            transformation = transformation.id,
            "endpoint config stored"
        );

        Ok(EndpointConfig {
            broker_endpoint,
            endpoint,
            transformation,
        })
    }

    /// Load a broker endpoint and the records it owns.
    ///
    /// Returns `Ok(None)` when the broker endpoint does not exist and
    /// `NotFound` when it exists but an owned record is missing.
    pub fn load_endpoint_config(
        &self,
        broker_endpoint_id: RecordId,
    ) -> StateResult<Option<EndpointConfig>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let broker_endpoints = txn.open_table(BROKER_ENDPOINTS).map_err(map_err!(Table))?;
        let Some(broker_endpoint) = read_in::<BrokerEndpoint>(&broker_endpoints, broker_endpoint_id)?
        else {
            return Ok(None);
        };

        let endpoint_id = broker_endpoint.endpoint_id.ok_or_else(|| {
            StateError::NotFound(format!(
                "broker endpoint {broker_endpoint_id} has no endpoint"
            ))
        })?;
        let endpoint = read_in::<Endpoint>(
            &txn.open_table(ENDPOINTS).map_err(map_err!(Table))?,
            endpoint_id,
        )?
        .ok_or_else(|| StateError::NotFound(format!("endpoint {endpoint_id}")))?;

        let transformation_id = endpoint.transformation_id.ok_or_else(|| {
            StateError::NotFound(format!("endpoint {endpoint_id} has no transformation"))
        })?;
        let transformation = read_in::<Transformation>(
            &txn.open_table(TRANSFORMATIONS).map_err(map_err!(Table))?,
            transformation_id,
        )?
        .ok_or_else(|| StateError::NotFound(format!("transformation {transformation_id}")))?;

        Ok(Some(EndpointConfig {
            broker_endpoint,
            endpoint,
            transformation,
        }))
    }
}

/// Deserialize a record from an already-opened table.
fn read_in<T: StoredRecord>(
    table: &impl ReadableTable<u64, &'static [u8]>,
    id: RecordId,
) -> StateResult<Option<T>> {
    match table.get(id).map_err(map_err!(Read))? {
        Some(guard) => {
            let record: T = serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
            Ok(Some(record))
        }
        None => Ok(None),
    }
}

/// Return `id` unchanged if non-zero, otherwise allocate the next id for
/// `kind`. The sequence never falls behind an explicitly chosen id.
fn assign_id(txn: &WriteTransaction, kind: RecordKind, id: RecordId) -> StateResult<RecordId> {
    let mut seq = txn.open_table(SEQUENCES).map_err(map_err!(Table))?;
    let last = seq
        .get(kind.table_name())
        .map_err(map_err!(Read))?
        .map(|guard| guard.value())
        .unwrap_or(0);
    let assigned = if id == 0 { last + 1 } else { id };
    if assigned > last {
        seq.insert(kind.table_name(), assigned)
            .map_err(map_err!(Write))?;
    }
    Ok(assigned)
}

/// Assign an id if needed and write the record inside `txn`.
fn insert_record<T: StoredRecord>(txn: &WriteTransaction, record: &mut T) -> StateResult<()> {
    let id = assign_id(txn, T::KIND, record.record_id())?;
    record.set_record_id(id);
    let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
    let mut table = txn
        .open_table(table_for(T::KIND))
        .map_err(map_err!(Table))?;
    table
        .insert(id, value.as_slice())
        .map_err(map_err!(Write))?;
    Ok(())
}

/// Reject a broker endpoint whose name is already used by a different
/// endpoint of the same broker.
fn ensure_unique_name(txn: &WriteTransaction, candidate: &BrokerEndpoint) -> StateResult<()> {
    let table = txn.open_table(BROKER_ENDPOINTS).map_err(map_err!(Table))?;
    for entry in table.iter().map_err(map_err!(Read))? {
        let (_, value) = entry.map_err(map_err!(Read))?;
        let existing: BrokerEndpoint =
            serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
        if existing.id != candidate.id
            && existing.broker_id == candidate.broker_id
            && existing.name == candidate.name
        {
            return Err(StateError::Conflict(format!(
                "broker {} already has an endpoint named '{}'",
                candidate.broker_id, candidate.name
            )));
        }
    }
    Ok(())
}
