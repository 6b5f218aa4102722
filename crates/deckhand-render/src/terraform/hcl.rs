//! A small HCL pretty-printer
//!
//! Record bodies follow the Kubernetes provider's conventions: nested objects
//! become nested blocks, arrays of objects become repeated blocks named in the
//! singular, and a fixed set of string maps (labels, annotations, data,
//! selectors, resource quantities) stay attribute maps.

use indexmap::IndexMap;
use serde_json::Value as JsonValue;

/// Keys whose object values are printed as `key = { ... }` when every value is a scalar
const ATTRIBUTE_MAPS: &[&str] = &[
    "labels",
    "annotations",
    "data",
    "string_data",
    "binary_data",
    "selector",
    "match_labels",
    "node_selector",
    "limits",
    "requests",
    "hard",
    "default",
    "default_request",
    "max",
    "min",
    "capacity",
    "parameters",
];

/// An HCL value
#[derive(Debug, Clone, PartialEq)]
pub enum Hcl {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    /// Raw expression, printed unquoted (`var.namespace`)
    Expr(String),
    List(Vec<Hcl>),
    Object(IndexMap<String, Hcl>),
}

impl Hcl {
    pub fn expr(expression: impl Into<String>) -> Self {
        Self::Expr(expression.into())
    }

    /// Every string is a literal
    pub fn from_json(value: &JsonValue) -> Self {
        Self::convert(value, false)
    }

    /// Strings of the form `${expr}` become expressions
    pub fn from_input(value: &JsonValue) -> Self {
        Self::convert(value, true)
    }

    fn convert(value: &JsonValue, expressions: bool) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(*b),
            JsonValue::Number(n) => Self::Number(n.clone()),
            JsonValue::String(s) => match s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
                Some(expression) if expressions => Self::Expr(expression.to_string()),
                _ => Self::String(s.clone()),
            },
            JsonValue::Array(items) => {
                Self::List(items.iter().map(|i| Self::convert(i, expressions)).collect())
            }
            JsonValue::Object(map) => Self::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::convert(v, expressions)))
                    .collect(),
            ),
        }
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, Self::List(_) | Self::Object(_))
    }

    pub fn as_object_mut(&mut self) -> Option<&mut IndexMap<String, Hcl>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }
}

/// `matchLabels` -> `match_labels`, `targetCPUUtilizationPercentage` -> `target_cpu_utilization_percentage`
pub fn snake_case(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let mut out = String::with_capacity(key.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1);
            let boundary = match prev {
                Some(p) if p.is_ascii_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_ascii_uppercase() => next.is_some_and(|n| n.is_ascii_lowercase()),
                _ => false,
            };
            if boundary {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else if c == '-' || c == '.' {
            out.push('_');
        } else {
            out.push(c);
        }
    }
    out
}

/// Block name for one element of a list-of-objects field
pub fn singular(key: &str) -> String {
    match key {
        "tls" | "image_pull_secrets" => key.to_string(),
        "policies" => "policy".to_string(),
        "addresses" => "address".to_string(),
        other if other.ends_with("ies") => format!("{}y", &other[..other.len() - 3]),
        other if other.ends_with('s') && !other.ends_with("ss") && other.len() > 1 => {
            other[..other.len() - 1].to_string()
        }
        other => other.to_string(),
    }
}

/// Quote and escape a string literal, including template sequences
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '$' | '%' if chars.peek() == Some(&'{') => {
                out.push(c);
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Print `value` as an expression at `indent` levels
pub fn expression(value: &Hcl, indent: usize) -> String {
    match value {
        Hcl::Null => "null".to_string(),
        Hcl::Bool(b) => b.to_string(),
        Hcl::Number(n) => n.to_string(),
        Hcl::String(s) => quote(s),
        Hcl::Expr(e) => e.clone(),
        Hcl::List(items) if items.is_empty() => "[]".to_string(),
        Hcl::List(items) if items.iter().all(Hcl::is_scalar) => format!(
            "[{}]",
            items
                .iter()
                .map(|i| expression(i, indent))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        Hcl::List(items) => {
            let pad = "  ".repeat(indent + 1);
            let mut out = String::from("[\n");
            for item in items {
                out.push_str(&format!("{pad}{},\n", expression(item, indent + 1)));
            }
            out.push_str(&"  ".repeat(indent));
            out.push(']');
            out
        }
        Hcl::Object(map) if map.is_empty() => "{}".to_string(),
        Hcl::Object(map) => {
            let pad = "  ".repeat(indent + 1);
            let mut out = String::from("{\n");
            for (key, value) in map {
                out.push_str(&format!(
                    "{pad}{} = {}\n",
                    quote(key),
                    expression(value, indent + 1)
                ));
            }
            out.push_str(&"  ".repeat(indent));
            out.push('}');
            out
        }
    }
}

/// Accumulates HCL text
#[derive(Debug, Default)]
pub struct HclWriter {
    out: String,
    indent: usize,
}

impl HclWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self) -> String {
        self.out
    }

    fn line(&mut self, text: &str) {
        if text.is_empty() {
            self.out.push('\n');
        } else {
            self.out.push_str(&"  ".repeat(self.indent));
            self.out.push_str(text);
            self.out.push('\n');
        }
    }

    pub fn comment(&mut self, text: &str) {
        self.line(&format!("# {text}"));
    }

    pub fn blank(&mut self) {
        self.line("");
    }

    /// `key = value`, key printed as given
    pub fn attribute(&mut self, key: &str, value: &Hcl) {
        let key = if is_identifier(key) { key.to_string() } else { quote(key) };
        let rendered = expression(value, self.indent);
        self.line(&format!("{key} = {rendered}"));
    }

    /// Open a block, run `body`, close it
    pub fn block(&mut self, name: &str, labels: &[&str], body: impl FnOnce(&mut Self)) {
        let mut header = name.to_string();
        for label in labels {
            header.push(' ');
            header.push_str(&quote(label));
        }
        self.line(&format!("{header} {{"));
        self.indent += 1;
        body(self);
        self.indent -= 1;
        self.line("}");
    }

    /// Block whose body is a generated record, printed with provider conventions
    pub fn record_block(&mut self, name: &str, labels: &[&str], body: &IndexMap<String, Hcl>) {
        self.block(name, labels, |w| w.record_body(body));
    }

    fn record_body(&mut self, body: &IndexMap<String, Hcl>) {
        for (key, value) in body {
            let key = snake_case(key);
            match value {
                Hcl::Null => {}
                Hcl::Object(map)
                    if ATTRIBUTE_MAPS.contains(&key.as_str()) && map.values().all(Hcl::is_scalar) =>
                {
                    self.attribute(&key, value);
                }
                Hcl::Object(map) => self.record_block(&key, &[], map),
                Hcl::List(items)
                    if !items.is_empty() && items.iter().all(|i| matches!(i, Hcl::Object(_))) =>
                {
                    let name = singular(&key);
                    for item in items {
                        if let Hcl::Object(map) = item {
                            self.record_block(&name, &[], map);
                        }
                    }
                }
                other => self.attribute(&key, other),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: JsonValue) -> String {
        let Hcl::Object(body) = Hcl::from_json(&value) else {
            panic!("expected object");
        };
        let mut writer = HclWriter::new();
        writer.record_block("resource", &["kubernetes_service_v1", "web"], &body);
        writer.finish()
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(snake_case("matchLabels"), "match_labels");
        assert_eq!(snake_case("clusterIP"), "cluster_ip");
        assert_eq!(
            snake_case("targetCPUUtilizationPercentage"),
            "target_cpu_utilization_percentage"
        );
        assert_eq!(snake_case("initialDelaySeconds"), "initial_delay_seconds");
    }

    #[test]
    fn test_singular() {
        assert_eq!(singular("containers"), "container");
        assert_eq!(singular("volume_mounts"), "volume_mount");
        assert_eq!(singular("env"), "env");
        assert_eq!(singular("policies"), "policy");
        assert_eq!(singular("volume_claim_templates"), "volume_claim_template");
    }

    #[test]
    fn test_quote_escapes_templates() {
        assert_eq!(quote("a \"b\"\n${c} %{d}"), r#""a \"b\"\n$${c} %%{d}""#);
    }

    #[test]
    fn test_service_record() {
        let hcl = record(json!({
            "metadata": {
                "name": "web",
                "labels": {"app.kubernetes.io/name": "web"},
            },
            "spec": {
                "selector": {"app": "web"},
                "clusterIP": "None",
                "ports": [
                    {"name": "http", "port": 80, "targetPort": 8080},
                    {"name": "metrics", "port": 9090, "targetPort": 9090},
                ],
            },
        }));
        insta::assert_snapshot!(hcl, @r#"
        resource "kubernetes_service_v1" "web" {
          metadata {
            name = "web"
            labels = {
              "app.kubernetes.io/name" = "web"
            }
          }
          spec {
            selector = {
              "app" = "web"
            }
            cluster_ip = "None"
            port {
              name = "http"
              port = 80
              target_port = 8080
            }
            port {
              name = "metrics"
              port = 9090
              target_port = 9090
            }
          }
        }
        "#);
    }

    #[test]
    fn test_selector_with_nested_object_is_a_block() {
        let hcl = record(json!({
            "spec": {
                "selector": {"matchLabels": {"app": "web"}},
                "args": ["--port", "8080"],
                "emptyDir": {},
            },
        }));
        insta::assert_snapshot!(hcl, @r#"
        resource "kubernetes_service_v1" "web" {
          spec {
            selector {
              match_labels = {
                "app" = "web"
              }
            }
            args = ["--port", "8080"]
            empty_dir {
            }
          }
        }
        "#);
    }

    #[test]
    fn test_input_expressions() {
        assert_eq!(
            Hcl::from_input(&json!("${var.namespace}")),
            Hcl::expr("var.namespace")
        );
        assert_eq!(
            Hcl::from_json(&json!("${var.namespace}")),
            Hcl::String("${var.namespace}".to_string())
        );
    }

    #[test]
    fn test_mixed_list_expression() {
        let value = Hcl::from_json(&json!([{"a": 1}, {"b": true}]));
        assert_eq!(
            expression(&value, 0),
            "[\n  {\n    \"a\" = 1\n  },\n  {\n    \"b\" = true\n  },\n]"
        );
    }
}
