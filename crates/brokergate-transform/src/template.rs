//! Text templates rendered against the current exchange.
//!
//! Supported variables:
//!
//! - `${body}` — the current body text
//! - `${body.field.subfield}` — a value inside the JSON body; numeric
//!   segments index arrays
//! - `${property.name}` — an exchange property
//! - `${name}` — shorthand for `${property.name}`
//!
//! String values are inserted raw; other JSON values are inserted as JSON.
//! Any variable that does not resolve fails the render.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value as JsonValue;

use crate::error::{TransformError, TransformResult};

static VAR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("variable pattern is valid"));

/// Render `template` with the given body and exchange properties.
pub fn render(
    template: &str,
    body: &str,
    properties: &HashMap<String, String>,
) -> TransformResult<String> {
    let mut resolver = Resolver {
        body,
        body_json: None,
        properties,
    };

    let mut out = String::with_capacity(template.len() + body.len());
    let mut last = 0;
    for caps in VAR_REGEX.captures_iter(template) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&template[last..whole.start()]);
        out.push_str(&resolver.resolve(caps[1].trim())?);
        last = whole.end();
    }
    out.push_str(&template[last..]);
    Ok(out)
}

struct Resolver<'a> {
    body: &'a str,
    body_json: Option<JsonValue>,
    properties: &'a HashMap<String, String>,
}

impl Resolver<'_> {
    fn resolve(&mut self, expr: &str) -> TransformResult<String> {
        if expr == "body" {
            return Ok(self.body.to_string());
        }
        if let Some(path) = expr.strip_prefix("body.") {
            return self.resolve_body_path(expr, path);
        }
        let key = expr.strip_prefix("property.").unwrap_or(expr);
        self.properties
            .get(key)
            .cloned()
            .ok_or_else(|| unresolved(expr))
    }

    fn resolve_body_path(&mut self, expr: &str, path: &str) -> TransformResult<String> {
        if self.body_json.is_none() {
            let parsed = serde_json::from_str(self.body).map_err(|e| {
                TransformError::TemplateRender(format!("'${{{expr}}}' needs a JSON body: {e}"))
            })?;
            self.body_json = Some(parsed);
        }

        let mut node = self.body_json.as_ref();
        for segment in path.split('.') {
            node = node.and_then(|n| match n {
                JsonValue::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                other => other.get(segment),
            });
        }

        match node {
            Some(JsonValue::String(s)) => Ok(s.clone()),
            Some(JsonValue::Null) | None => Err(unresolved(expr)),
            Some(other) => Ok(other.to_string()),
        }
    }
}

fn unresolved(expr: &str) -> TransformError {
    TransformError::TemplateRender(format!("unresolved variable '${{{expr}}}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn renders_body_and_properties() {
        let out = render(
            r#"{"wrapped": ${body}, "route": "${property.route.id}"}"#,
            r#"{"a":1}"#,
            &props(&[("route.id", "sayHello")]),
        )
        .unwrap();
        assert_eq!(out, r#"{"wrapped": {"a":1}, "route": "sayHello"}"#);
    }

    #[test]
    fn bare_name_resolves_property() {
        let out = render("status=${response.status}", "", &props(&[("response.status", "404")]))
            .unwrap();
        assert_eq!(out, "status=404");
    }

    #[test]
    fn body_paths() {
        let body = r#"{"user":{"name":"Ada","tags":["x","y"],"age":36}}"#;
        let out = render(
            "${body.user.name}/${body.user.tags.1}/${body.user.age}/${body.user.tags}",
            body,
            &HashMap::new(),
        )
        .unwrap();
        assert_eq!(out, r#"Ada/y/36/["x","y"]"#);
    }

    #[test]
    fn unresolved_variable_fails() {
        let err = render("${nope}", "{}", &HashMap::new()).unwrap_err();
        assert!(matches!(err, TransformError::TemplateRender(_)));

        let err = render("${body.missing}", "{}", &HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("unresolved"));
    }

    #[test]
    fn body_path_on_text_body_fails() {
        let err = render("${body.a}", "plain text", &HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("needs a JSON body"));
    }

    #[test]
    fn template_without_variables_is_verbatim() {
        assert_eq!(render("{\"ok\":true}", "ignored", &HashMap::new()).unwrap(), "{\"ok\":true}");
    }
}
