//! Record types for the brokergate configuration store.
//!
//! These are plain value structs. Relationships are explicit foreign-key
//! ids; a record id of `0` means "not yet stored" and is replaced by a
//! freshly allocated id on save.

use serde::{Deserialize, Serialize};

/// Primary key of every stored record.
pub type RecordId = u64;

/// Template-type tag selecting the structured-mapping processor.
pub const TEMPLATE_TYPE_ATLAS: &str = "atlas";

/// Template-type tag selecting the templated-text processor.
pub const TEMPLATE_TYPE_VELOCITY: &str = "velocity";

// ── Broker ─────────────────────────────────────────────────────────

/// Logical owner of one or more exposed capabilities.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Broker {
    #[serde(default)]
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

// ── BrokerEndpoint ─────────────────────────────────────────────────

/// One exposed capability under a broker.
///
/// `name` is unique within its broker and doubles as the route id and the
/// inbound URL segment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct BrokerEndpoint {
    #[serde(default)]
    pub id: RecordId,
    pub broker_id: RecordId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Owned endpoint, set once the tree has been stored.
    #[serde(default)]
    pub endpoint_id: Option<RecordId>,
}

// ── Endpoint ───────────────────────────────────────────────────────

/// Downstream target description.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Endpoint {
    #[serde(default)]
    pub id: RecordId,
    /// Back-reference to the owning broker endpoint.
    #[serde(default)]
    pub broker_endpoint_id: RecordId,
    pub name: String,
    pub host: String,
    pub port: String,
    pub path: String,
    pub http_method: String,
    /// Scheme of the downstream call, e.g. `http`.
    #[serde(rename = "type")]
    pub endpoint_type: String,
    /// JSON object of headers added to every downstream call.
    #[serde(default)]
    pub headers: Option<String>,
    /// JSON object of query parameters appended to the downstream URL.
    #[serde(default)]
    pub query_parameters: Option<String>,
    /// JSON object of `{name}` placeholders substituted into `path`.
    #[serde(default)]
    pub path_parameters: Option<String>,
    #[serde(default)]
    pub request_definition: Option<String>,
    #[serde(default)]
    pub response_definition: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub transformation_id: Option<RecordId>,
}

// ── Transformation ─────────────────────────────────────────────────

/// Per-direction body transformation settings for an endpoint.
///
/// A blob is only meaningful when its direction is enabled. For the
/// `atlas` template type it holds a mapping specification; for `velocity`
/// it holds a template body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Transformation {
    #[serde(default)]
    pub id: RecordId,
    #[serde(default)]
    pub endpoint_id: RecordId,
    #[serde(default)]
    pub request_enabled: bool,
    #[serde(default, with = "blob")]
    pub request_transformation: Vec<u8>,
    #[serde(default)]
    pub request_template_type: Option<String>,
    #[serde(default)]
    pub response_enabled: bool,
    #[serde(default, with = "blob")]
    pub response_transformation: Vec<u8>,
    #[serde(default)]
    pub response_template_type: Option<String>,
}

// ── Aggregates ─────────────────────────────────────────────────────

/// A broker endpoint together with the endpoint and transformation it owns.
///
/// This is the unit a route is built from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct EndpointConfig {
    pub broker_endpoint: BrokerEndpoint,
    pub endpoint: Endpoint,
    #[serde(default)]
    pub transformation: Transformation,
}

/// The four stored record kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Broker,
    BrokerEndpoint,
    Endpoint,
    Transformation,
}

impl RecordKind {
    /// Name of the backing table, also used as the id sequence key.
    pub fn table_name(self) -> &'static str {
        match self {
            RecordKind::Broker => "brokers",
            RecordKind::BrokerEndpoint => "broker_endpoints",
            RecordKind::Endpoint => "endpoints",
            RecordKind::Transformation => "transformations",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table_name())
    }
}

/// Any stored record, tagged by kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum Record {
    Broker(Broker),
    BrokerEndpoint(BrokerEndpoint),
    Endpoint(Endpoint),
    Transformation(Transformation),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Broker(_) => RecordKind::Broker,
            Record::BrokerEndpoint(_) => RecordKind::BrokerEndpoint,
            Record::Endpoint(_) => RecordKind::Endpoint,
            Record::Transformation(_) => RecordKind::Transformation,
        }
    }

    pub fn id(&self) -> RecordId {
        match self {
            Record::Broker(r) => r.id,
            Record::BrokerEndpoint(r) => r.id,
            Record::Endpoint(r) => r.id,
            Record::Transformation(r) => r.id,
        }
    }
}

/// Implemented by the four record structs so the store can handle them
/// uniformly.
pub trait StoredRecord: Serialize + serde::de::DeserializeOwned {
    const KIND: RecordKind;

    fn record_id(&self) -> RecordId;

    fn set_record_id(&mut self, id: RecordId);
}

macro_rules! stored_record {
    ($ty:ty, $kind:ident) => {
        impl StoredRecord for $ty {
            const KIND: RecordKind = RecordKind::$kind;

            fn record_id(&self) -> RecordId {
                self.id
            }

            fn set_record_id(&mut self, id: RecordId) {
                self.id = id;
            }
        }
    };
}

stored_record!(Broker, Broker);
stored_record!(BrokerEndpoint, BrokerEndpoint);
stored_record!(Endpoint, Endpoint);
stored_record!(Transformation, Transformation);

fn enabled_by_default() -> bool {
    true
}

/// Serde adapter storing binary blobs as standard base64 strings.
mod blob {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = Option::<String>::deserialize(deserializer)?;
        match encoded {
            Some(s) => STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transformation_blobs_are_base64_in_json() {
        let t = Transformation {
            request_enabled: true,
            request_transformation: b"{\"a\":1}".to_vec(),
            request_template_type: Some("atlas".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["request_transformation"], "eyJhIjoxfQ==");
        assert_eq!(json["response_transformation"], "");

        let back: Transformation = serde_json::from_value(json).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn transformation_missing_blob_is_empty() {
        let t: Transformation =
            serde_json::from_str(r#"{"request_enabled":false,"response_transformation":null}"#)
                .unwrap();
        assert!(t.request_transformation.is_empty());
        assert!(t.response_transformation.is_empty());
    }

    #[test]
    fn endpoint_type_uses_type_key() {
        let ep: Endpoint = serde_json::from_str(
            r#"{"name":"say hello","host":"localhost","port":"8081",
                "path":"/api/sayhello","http_method":"POST","type":"http"}"#,
        )
        .unwrap();
        assert_eq!(ep.endpoint_type, "http");
        assert!(ep.enabled);
        assert_eq!(ep.id, 0);
    }

    #[test]
    fn record_reports_kind_and_id() {
        let record = Record::Broker(Broker {
            id: 7,
            name: "OFSLL".to_string(),
            description: None,
        });
        assert_eq!(record.kind(), RecordKind::Broker);
        assert_eq!(record.id(), 7);
        assert_eq!(RecordKind::Transformation.to_string(), "transformations");
    }
}
