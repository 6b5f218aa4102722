use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;

use super::DEFAULT_NAMESPACE;
use crate::labels;
use crate::names;

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

/// Identity shared by every builder: name, namespace, labels and annotations
///
/// The name is fixed at construction. Labels set here are layered over the
/// generator defaults (`app.kubernetes.io/name`, `app.kubernetes.io/managed-by`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub(crate) name: String,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl ObjectMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: default_namespace(),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Generator defaults with user labels layered on top
    pub fn all_labels(&self) -> BTreeMap<String, String> {
        let mut all = BTreeMap::from([
            (labels::K8S_NAME.to_string(), self.name.clone()),
            (labels::K8S_MANAGED_BY.to_string(), labels::GENERATOR.to_string()),
        ]);
        all.extend(self.labels.clone());
        all
    }

    /// Labels used to select this builder's pods
    pub fn selector(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(labels::APP.to_string(), self.name.clone())])
    }

    /// `metadata` for a record named after this builder
    pub fn to_json(&self, namespaced: bool) -> JsonValue {
        self.to_json_named(&self.name, namespaced)
    }

    /// `metadata` for a secondary record (e.g. `web-backup`) owned by this builder
    pub fn to_json_named(&self, name: &str, namespaced: bool) -> JsonValue {
        let mut meta = Map::new();
        meta.insert("name".into(), JsonValue::String(name.to_string()));
        if namespaced {
            meta.insert(
                "namespace".into(),
                JsonValue::String(self.namespace.clone()),
            );
        }
        meta.insert("labels".into(), string_map(&self.all_labels()));
        if !self.annotations.is_empty() {
            meta.insert("annotations".into(), string_map(&self.annotations));
        }
        JsonValue::Object(meta)
    }

    pub(crate) fn name_problems(&self, what: &str) -> Vec<String> {
        let mut problems = names::name_problems(what, &self.name, names::MAX_LABEL_LEN);
        if !names::is_valid_label_name(&self.namespace) {
            problems.push(format!(
                "{what} '{}' has invalid namespace '{}'",
                self.name, self.namespace
            ));
        }
        problems
    }
}

/// Convert a string map into a JSON object
pub(crate) fn string_map(map: &BTreeMap<String, String>) -> JsonValue {
    JsonValue::Object(
        map.iter()
            .map(|(k, v)| (k.clone(), JsonValue::String(v.clone())))
            .collect(),
    )
}

/// Implements the metadata setters every builder exposes
macro_rules! meta_setters {
    ($($path:ident).+) => {
        /// Set the namespace
        pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
            self.$($path).+.namespace = namespace.into();
            self
        }

        /// Add a label
        pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
            self.$($path).+.labels.insert(key.into(), value.into());
            self
        }

        /// Add an annotation
        pub fn annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
            self.$($path).+.annotations.insert(key.into(), value.into());
            self
        }

        pub fn meta(&self) -> &$crate::builder::ObjectMeta {
            &self.$($path).+
        }
    };
}

pub(crate) use meta_setters;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_labels_layers_user_labels() {
        let mut meta = ObjectMeta::new("web");
        meta.labels.insert("tier".into(), "frontend".into());
        meta.labels
            .insert(labels::K8S_NAME.into(), "custom".into());

        let all = meta.all_labels();
        assert_eq!(all["tier"], "frontend");
        assert_eq!(all[labels::K8S_NAME], "custom");
        assert_eq!(all[labels::K8S_MANAGED_BY], "deckhand");
    }

    #[test]
    fn test_to_json_omits_namespace_when_cluster_scoped() {
        let meta = ObjectMeta::new("admin");
        assert!(meta.to_json(false).get("namespace").is_none());
        assert_eq!(meta.to_json(true)["namespace"], "default");
        assert!(meta.to_json(true).get("annotations").is_none());
    }

    #[test]
    fn test_deserialize_defaults_namespace() {
        let meta: ObjectMeta = serde_json::from_value(serde_json::json!({"name": "x"})).unwrap();
        assert_eq!(meta.namespace, "default");
    }
}
