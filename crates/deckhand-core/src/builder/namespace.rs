use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};

use super::meta::{ObjectMeta, meta_setters};
use super::workload::ResourceRequirements;
use super::{Builder, OutputFormat, tagged_definition};
use crate::error::Result;
use crate::resource::Resource;

/// A Namespace, optionally with a ResourceQuota and default container limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Namespace {
    #[serde(flatten)]
    meta: ObjectMeta,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    quota: Option<ResourceRequirements>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_limits: Option<ResourceRequirements>,
}

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut meta = ObjectMeta::new(name.clone());
        meta.namespace = name;
        Self {
            meta,
            quota: None,
            default_limits: None,
        }
    }

    meta_setters!(meta);

    /// Total requests/limits allowed across the namespace
    pub fn quota(mut self, quota: ResourceRequirements) -> Self {
        self.quota = Some(quota);
        self
    }

    /// Requests/limits applied to containers that declare none
    pub fn default_limits(mut self, limits: ResourceRequirements) -> Self {
        self.default_limits = Some(limits);
        self
    }
}

impl Builder for Namespace {
    fn type_name(&self) -> &'static str {
        "Namespace"
    }

    fn name(&self) -> &str {
        self.meta.name()
    }

    fn namespace(&self) -> &str {
        self.meta.name()
    }

    fn generate_kubernetes_resources(&self) -> Result<Vec<Resource>> {
        let name = self.meta.name();
        let mut resources = vec![Resource::new(json!({
            "apiVersion": "v1",
            "kind": "Namespace",
            "metadata": self.meta.to_json(false),
        }))];

        let mut scoped = self.meta.clone();
        scoped.namespace = name.to_string();

        if let Some(quota) = &self.quota {
            let mut hard = Map::new();
            for (key, value) in [
                ("requests.cpu", &quota.cpu_request),
                ("requests.memory", &quota.memory_request),
                ("limits.cpu", &quota.cpu_limit),
                ("limits.memory", &quota.memory_limit),
            ] {
                if let Some(value) = value {
                    hard.insert(key.into(), json!(value));
                }
            }
            resources.push(Resource::new(json!({
                "apiVersion": "v1",
                "kind": "ResourceQuota",
                "metadata": scoped.to_json_named(&format!("{name}-quota"), true),
                "spec": {"hard": hard},
            })));
        }

        if let Some(limits) = &self.default_limits {
            let mut entry = Map::new();
            entry.insert("type".into(), json!("Container"));
            let json = limits.to_json();
            if let Some(requests) = json.get("requests") {
                entry.insert("defaultRequest".into(), requests.clone());
            }
            if let Some(limits) = json.get("limits") {
                entry.insert("default".into(), limits.clone());
            }
            resources.push(Resource::new(json!({
                "apiVersion": "v1",
                "kind": "LimitRange",
                "metadata": scoped.to_json_named(&format!("{name}-limits"), true),
                "spec": {"limits": [JsonValue::Object(entry)]},
            })));
        }

        Ok(resources)
    }

    fn validate(&self) -> Vec<String> {
        let mut problems = self.meta.name_problems("Namespace");
        if self.meta.name().starts_with("kube-") {
            problems.push(format!(
                "Namespace '{}' uses the reserved 'kube-' prefix",
                self.meta.name()
            ));
        }
        problems
    }

    fn compatibility(&self, format: OutputFormat) -> Vec<String> {
        match format {
            OutputFormat::Compose => vec![format!(
                "Namespace '{}' has no compose equivalent and is skipped",
                self.meta.name()
            )],
            _ => Vec::new(),
        }
    }

    fn to_definition(&self) -> Result<JsonValue> {
        tagged_definition(self.type_name(), self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_is_cluster_scoped() {
        let resources = Namespace::new("shop").generate_kubernetes_resources().unwrap();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].kind(), Some("Namespace"));
        assert_eq!(resources[0].namespace(), None);
    }

    #[test]
    fn test_quota_and_limits_live_in_namespace() {
        let resources = Namespace::new("shop")
            .quota(ResourceRequirements::requests("4", "8Gi").limits("8", "16Gi"))
            .default_limits(ResourceRequirements::requests("100m", "128Mi"))
            .generate_kubernetes_resources()
            .unwrap();
        assert_eq!(resources.len(), 3);
        assert_eq!(resources[1].namespace(), Some("shop"));
        let hard = resources[1].get("spec.hard").unwrap();
        assert_eq!(hard["limits.cpu"], "8");
        assert_eq!(
            resources[2].get("spec.limits").and_then(|l| l.get(0)).unwrap()["defaultRequest"]["cpu"],
            "100m"
        );
    }
}
