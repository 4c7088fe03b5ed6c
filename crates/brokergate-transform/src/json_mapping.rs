//! Built-in mapping executor driven by a JSON mapping specification.
//!
//! ```json
//! {
//!   "source_document": "source",
//!   "target_document": "target-2db007fa",
//!   "mappings": [
//!     { "from": "/greeting", "to": "/name" },
//!     { "constant": "en", "to": "/meta/lang" },
//!     { "from": "/nickname", "to": "/alias", "default": "anonymous" }
//!   ]
//! }
//! ```
//!
//! `from` and `to` are JSON pointers (RFC 6901). A `from` that resolves to
//! nothing is skipped unless a `default` is given. Intermediate objects on
//! the `to` path are created as needed.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};

use crate::error::{TransformError, TransformResult};
use crate::mapping::{MappingExecutor, MappingHandle, SOURCE_DOCUMENT};

#[derive(Debug, Clone, Deserialize)]
struct MappingSpec {
    #[serde(default = "default_source_document")]
    source_document: String,
    target_document: String,
    #[serde(default)]
    mappings: Vec<FieldMapping>,
}

#[derive(Debug, Clone, Deserialize)]
struct FieldMapping {
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    constant: Option<JsonValue>,
    #[serde(default)]
    default: Option<JsonValue>,
    to: String,
}

fn default_source_document() -> String {
    SOURCE_DOCUMENT.to_string()
}

fn mapping_error(msg: impl Into<String>) -> TransformError {
    TransformError::MappingExecution(msg.into())
}

/// Stateless JSON-pointer mapping executor.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonMappingExecutor;

impl JsonMappingExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl MappingExecutor for JsonMappingExecutor {
    fn load_spec(&self, spec: &[u8]) -> TransformResult<MappingHandle> {
        let parsed: MappingSpec = serde_json::from_slice(spec)
            .map_err(|e| mapping_error(format!("invalid mapping spec: {e}")))?;

        if parsed.target_document.is_empty() {
            return Err(mapping_error("mapping spec has an empty target_document"));
        }
        for (idx, m) in parsed.mappings.iter().enumerate() {
            if m.from.is_some() == m.constant.is_some() {
                return Err(mapping_error(format!(
                    "mapping #{idx} needs exactly one of 'from' or 'constant'"
                )));
            }
            for pointer in m.from.iter().chain(std::iter::once(&m.to)) {
                if !pointer.is_empty() && !pointer.starts_with('/') {
                    return Err(mapping_error(format!(
                        "mapping #{idx}: '{pointer}' is not a JSON pointer"
                    )));
                }
            }
        }

        Ok(MappingHandle::new(parsed.target_document.clone(), parsed))
    }

    fn execute(
        &self,
        handle: &MappingHandle,
        source_name: &str,
        source_json: &str,
    ) -> TransformResult<HashMap<String, String>> {
        let spec = handle
            .compiled::<MappingSpec>()
            .ok_or_else(|| mapping_error("handle was not produced by this executor"))?;

        if spec.source_document != source_name {
            return Err(mapping_error(format!(
                "source document '{}' is not bound (got '{source_name}')",
                spec.source_document
            )));
        }

        let source: JsonValue = serde_json::from_str(source_json)
            .map_err(|e| mapping_error(format!("source is not JSON: {e}")))?;
        let mut target = JsonValue::Object(Map::new());

        for m in &spec.mappings {
            let value = match (&m.from, &m.constant) {
                (Some(from), _) => source.pointer(from).cloned().or_else(|| m.default.clone()),
                (None, Some(constant)) => Some(constant.clone()),
                (None, None) => None,
            };
            if let Some(value) = value {
                write_pointer(&mut target, &m.to, value)?;
            }
        }

        let text = serde_json::to_string(&target)
            .map_err(|e| mapping_error(format!("cannot encode target: {e}")))?;
        Ok(HashMap::from([(spec.target_document.clone(), text)]))
    }
}

/// Write `value` at `pointer`, creating intermediate objects.
fn write_pointer(root: &mut JsonValue, pointer: &str, value: JsonValue) -> TransformResult<()> {
    if pointer.is_empty() {
        *root = value;
        return Ok(());
    }

    let tokens: Vec<String> = pointer[1..]
        .split('/')
        .map(|t| t.replace("~1", "/").replace("~0", "~"))
        .collect();
    let (last, parents) = tokens
        .split_last()
        .ok_or_else(|| mapping_error(format!("empty pointer '{pointer}'")))?;

    let mut node = root;
    for token in parents {
        let JsonValue::Object(map) = node else {
            return Err(mapping_error(format!(
                "cannot write '{pointer}': '{token}' has a non-object parent"
            )));
        };
        node = map
            .entry(token.clone())
            .or_insert_with(|| JsonValue::Object(Map::new()));
    }

    match node {
        JsonValue::Object(map) => {
            map.insert(last.clone(), value);
            Ok(())
        }
        _ => Err(mapping_error(format!(
            "cannot write '{pointer}': parent is not an object"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::apply_structured_mapping;

    fn run(spec: &str, body: &str) -> TransformResult<JsonValue> {
        let out = apply_structured_mapping(&JsonMappingExecutor, spec.as_bytes(), body)?;
        Ok(serde_json::from_str(&out).unwrap())
    }

    #[test]
    fn identity_mapping_on_name() {
        let spec = r#"{"target_document":"t","mappings":[{"from":"/name","to":"/name"}]}"#;
        let out = run(spec, r#"{"name":"x"}"#).unwrap();
        assert_eq!(out["name"], "x");
    }

    #[test]
    fn renames_and_nests_fields() {
        let spec = r#"{
            "target_document": "target-2db007fa",
            "mappings": [
                {"from": "/greeting", "to": "/message/text"},
                {"constant": "en", "to": "/message/lang"}
            ]
        }"#;
        let out = run(spec, r#"{"greeting":"hi"}"#).unwrap();
        assert_eq!(
            out,
            serde_json::json!({"message": {"text": "hi", "lang": "en"}})
        );
    }

    #[test]
    fn missing_source_uses_default_or_skips() {
        let spec = r#"{"target_document":"t","mappings":[
            {"from":"/nick","to":"/alias","default":"anonymous"},
            {"from":"/age","to":"/age"}
        ]}"#;
        let out = run(spec, "{}").unwrap();
        assert_eq!(out, serde_json::json!({"alias": "anonymous"}));
    }

    #[test]
    fn escaped_pointer_tokens() {
        let spec = r#"{"target_document":"t","mappings":[{"from":"/a~1b","to":"/c~0d"}]}"#;
        let out = run(spec, r#"{"a/b":1}"#).unwrap();
        assert_eq!(out["c~d"], 1);
    }

    #[test]
    fn whole_document_copy() {
        let spec = r#"{"target_document":"t","mappings":[{"from":"","to":""}]}"#;
        let out = run(spec, r#"{"a":[1,2]}"#).unwrap();
        assert_eq!(out, serde_json::json!({"a": [1, 2]}));
    }

    #[test]
    fn unparseable_spec_is_mapping_error() {
        let err = JsonMappingExecutor.load_spec(b"PK\x03\x04 not json").unwrap_err();
        assert!(matches!(err, TransformError::MappingExecution(_)));
    }

    #[test]
    fn spec_validation() {
        let both = r#"{"target_document":"t","mappings":[{"from":"/a","constant":1,"to":"/a"}]}"#;
        assert!(JsonMappingExecutor.load_spec(both.as_bytes()).is_err());

        let bad_pointer = r#"{"target_document":"t","mappings":[{"from":"a","to":"/a"}]}"#;
        assert!(JsonMappingExecutor.load_spec(bad_pointer.as_bytes()).is_err());

        let no_target = r#"{"target_document":"","mappings":[]}"#;
        assert!(JsonMappingExecutor.load_spec(no_target.as_bytes()).is_err());
    }

    #[test]
    fn unbound_source_name_fails() {
        let spec = r#"{"source_document":"order","target_document":"t","mappings":[]}"#;
        let handle = JsonMappingExecutor.load_spec(spec.as_bytes()).unwrap();
        let err = JsonMappingExecutor
            .execute(&handle, SOURCE_DOCUMENT, "{}")
            .unwrap_err();
        assert!(err.to_string().contains("not bound"));
    }

    #[test]
    fn writing_through_scalar_fails() {
        let spec = r#"{"target_document":"t","mappings":[
            {"constant":1,"to":"/a"},
            {"constant":2,"to":"/a/b"}
        ]}"#;
        assert!(run(spec, "{}").is_err());
    }
}
