//! Chart value trees
//!
//! A chart's `values.yaml` starts from defaults derived from the primary
//! workload. Overrides from definitions and `--set key=value` arguments are
//! layered on top with [`Values::merge`] and [`Values::set`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::error::{CoreError, Result};

/// A tree of chart values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Values(pub JsonValue);

impl Values {
    /// An empty mapping
    pub fn new() -> Self {
        Self(JsonValue::Object(Map::new()))
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(Self(serde_yaml::from_str(yaml)?))
    }

    /// Layer `overlay` on top: mappings merge key by key, anything else replaces
    pub fn merge(&mut self, overlay: &Values) {
        let mut pending = vec![(&mut self.0, &overlay.0)];
        while let Some((base, top)) = pending.pop() {
            match (base, top) {
                (JsonValue::Object(base), JsonValue::Object(top)) => {
                    for (key, value) in top {
                        if !base.contains_key(key) {
                            base.insert(key.clone(), value.clone());
                        }
                    }
                    pending.extend(
                        base.iter_mut()
                            .filter_map(|(key, slot)| top.get(key).map(|value| (slot, value))),
                    );
                }
                (base, top) => *base = top.clone(),
            }
        }
    }

    /// Set `path` (`ingress.enabled`), creating mappings along the way
    ///
    /// A non-mapping found on the way is replaced by a mapping.
    pub fn set(&mut self, path: &str, value: JsonValue) -> Result<()> {
        let keys: Vec<&str> = path.split('.').collect();
        if keys.iter().any(|key| key.is_empty()) {
            return Err(CoreError::InvalidOverride {
                input: path.to_string(),
                message: "path segments must not be empty".to_string(),
            });
        }

        let (last, parents) = keys.split_last().ok_or_else(|| CoreError::InvalidOverride {
            input: path.to_string(),
            message: "empty path".to_string(),
        })?;
        let mut node = &mut self.0;
        for key in parents {
            node = ensure_object(node)
                .entry(key.to_string())
                .or_insert_with(|| JsonValue::Object(Map::new()));
        }
        ensure_object(node).insert(last.to_string(), value);
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<&JsonValue> {
        path.split('.')
            .try_fold(&self.0, |node, key| node.as_object()?.get(key))
    }

    pub fn inner(&self) -> &JsonValue {
        &self.0
    }
}

impl From<JsonValue> for Values {
    fn from(value: JsonValue) -> Self {
        Self(value)
    }
}

fn ensure_object(node: &mut JsonValue) -> &mut Map<String, JsonValue> {
    if !node.is_object() {
        *node = JsonValue::Object(Map::new());
    }
    match node {
        JsonValue::Object(map) => map,
        _ => unreachable!("replaced by a mapping above"),
    }
}

/// Type a `--set` right-hand side: booleans, null, integers, floats and
/// inline JSON arrays/objects; anything else stays a string
fn typed_scalar(raw: &str) -> JsonValue {
    match raw {
        "true" => return JsonValue::Bool(true),
        "false" => return JsonValue::Bool(false),
        "null" => return JsonValue::Null,
        _ => {}
    }
    if let Ok(int) = raw.parse::<i64>() {
        return JsonValue::from(int);
    }
    if let Some(float) = raw.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
        return JsonValue::Number(float);
    }
    if raw.starts_with(['[', '{']) {
        if let Ok(parsed) = serde_json::from_str(raw) {
            return parsed;
        }
    }
    JsonValue::String(raw.to_string())
}

/// Build an override tree from `key=value` arguments, later arguments winning
pub fn parse_set_values(args: &[String]) -> Result<Values> {
    args.iter().try_fold(Values::new(), |mut values, arg| {
        let (path, raw) = arg.split_once('=').ok_or_else(|| CoreError::InvalidOverride {
            input: arg.clone(),
            message: "expected key=value".to_string(),
        })?;
        values.set(path, typed_scalar(raw))?;
        Ok(values)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_layers_overrides() {
        let mut defaults = Values(json!({
            "replicaCount": 1,
            "image": {"repository": "nginx", "tag": "1.21", "pullPolicy": "IfNotPresent"},
            "service": {"type": "ClusterIP", "port": 80},
        }));
        defaults.merge(&Values(json!({
            "replicaCount": 3,
            "image": {"tag": "1.25"},
            "podAnnotations": {"team": "web"},
        })));

        assert_eq!(defaults.get("replicaCount"), Some(&json!(3)));
        assert_eq!(defaults.get("image.repository"), Some(&json!("nginx")));
        assert_eq!(defaults.get("image.tag"), Some(&json!("1.25")));
        assert_eq!(defaults.get("service.port"), Some(&json!(80)));
        assert_eq!(defaults.get("podAnnotations.team"), Some(&json!("web")));
    }

    #[test]
    fn test_merge_replaces_lists_and_scalars() {
        let mut values = Values::from_yaml("ingress:\n  hosts: [a, b]\n  enabled: false\n").unwrap();
        values.merge(&Values::from_yaml("ingress:\n  hosts: [c]\n  enabled: {tls: true}\n").unwrap());
        assert_eq!(values.get("ingress.hosts"), Some(&json!(["c"])));
        assert_eq!(values.get("ingress.enabled.tls"), Some(&json!(true)));
    }

    #[test]
    fn test_set_creates_and_replaces_parents() {
        let mut values = Values(json!({"autoscaling": false}));
        values.set("autoscaling.enabled", json!(true)).unwrap();
        values.set("redis.auth.enabled", json!(false)).unwrap();
        assert_eq!(values.get("autoscaling.enabled"), Some(&json!(true)));
        assert_eq!(values.get("redis.auth.enabled"), Some(&json!(false)));
        assert!(values.set("redis..enabled", json!(true)).is_err());
        assert!(values.set("", json!(true)).is_err());
    }

    #[test]
    fn test_parse_set_values_types_scalars() {
        let values = parse_set_values(&[
            "image.tag=1.25".to_string(),
            "replicaCount=4".to_string(),
            "ingress.enabled=true".to_string(),
            "cpuRatio=0.5".to_string(),
            "ingress.hosts=[\"shop.example.com\"]".to_string(),
            "nameOverride=null".to_string(),
        ])
        .unwrap();

        assert_eq!(values.get("image.tag"), Some(&json!(1.25)));
        assert_eq!(values.get("replicaCount"), Some(&json!(4)));
        assert_eq!(values.get("ingress.enabled"), Some(&json!(true)));
        assert_eq!(values.get("cpuRatio"), Some(&json!(0.5)));
        assert_eq!(values.get("ingress.hosts"), Some(&json!(["shop.example.com"])));
        assert_eq!(values.get("nameOverride"), Some(&JsonValue::Null));
    }

    #[test]
    fn test_parse_set_values_rejects_missing_equals() {
        let err = parse_set_values(&["replicaCount".to_string()]).unwrap_err();
        assert!(err.to_string().contains("expected key=value"));
    }
}
