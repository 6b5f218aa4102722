//! The resource record: one Kubernetes object as a JSON document
//!
//! Every builder lowers its configuration into a list of [`Resource`]s, and every
//! renderer consumes that list. A record is an ordered JSON object that must carry
//! `apiVersion`, `kind` and `metadata.name`; the payload (`spec`, `data`, ...) is
//! opaque to the pipeline.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Kinds that never live in a namespace
pub const CLUSTER_SCOPED_KINDS: &[&str] = &[
    "Namespace",
    "ClusterRole",
    "ClusterRoleBinding",
    "CustomResourceDefinition",
    "PersistentVolume",
    "StorageClass",
    "PriorityClass",
];

/// Check whether a kind is cluster scoped
pub fn is_cluster_scoped(kind: &str) -> bool {
    CLUSTER_SCOPED_KINDS.contains(&kind)
}

/// A single resource record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resource(JsonValue);

impl Resource {
    /// Wrap a JSON value. Non-object values are replaced by an empty object.
    pub fn new(value: JsonValue) -> Self {
        match value {
            JsonValue::Object(_) => Self(value),
            _ => Self(JsonValue::Object(Map::new())),
        }
    }

    /// Start a record with `apiVersion`, `kind` and `metadata.name` in place
    pub fn with_type(api_version: &str, kind: &str, name: &str) -> Self {
        let mut map = Map::new();
        map.insert("apiVersion".into(), JsonValue::String(api_version.into()));
        map.insert("kind".into(), JsonValue::String(kind.into()));
        let mut meta = Map::new();
        meta.insert("name".into(), JsonValue::String(name.into()));
        map.insert("metadata".into(), JsonValue::Object(meta));
        Self(JsonValue::Object(map))
    }

    pub fn api_version(&self) -> Option<&str> {
        self.0.get("apiVersion").and_then(JsonValue::as_str)
    }

    pub fn kind(&self) -> Option<&str> {
        self.0.get("kind").and_then(JsonValue::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.metadata().and_then(|m| m.get("name")).and_then(JsonValue::as_str)
    }

    pub fn namespace(&self) -> Option<&str> {
        self.metadata()
            .and_then(|m| m.get("namespace"))
            .and_then(JsonValue::as_str)
    }

    pub fn metadata(&self) -> Option<&Map<String, JsonValue>> {
        self.0.get("metadata").and_then(JsonValue::as_object)
    }

    /// Labels as a sorted map; non-string values are skipped
    pub fn labels(&self) -> BTreeMap<String, String> {
        self.string_map("labels")
    }

    pub fn annotations(&self) -> BTreeMap<String, String> {
        self.string_map("annotations")
    }

    fn string_map(&self, field: &str) -> BTreeMap<String, String> {
        self.metadata()
            .and_then(|m| m.get(field))
            .and_then(JsonValue::as_object)
            .map(|obj| {
                obj.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Get a nested value by dotted path (e.g. `spec.replicas`)
    pub fn get(&self, path: &str) -> Option<&JsonValue> {
        path.split('.').try_fold(&self.0, |value, key| value.get(key))
    }

    /// Mutable access to `metadata`, creating it if absent
    pub fn metadata_mut(&mut self) -> &mut Map<String, JsonValue> {
        let root = self.root_mut();
        let meta = root
            .entry("metadata")
            .or_insert_with(|| JsonValue::Object(Map::new()));
        if !meta.is_object() {
            *meta = JsonValue::Object(Map::new());
        }
        match meta {
            JsonValue::Object(map) => map,
            _ => unreachable!("metadata was just normalized to an object"),
        }
    }

    fn root_mut(&mut self) -> &mut Map<String, JsonValue> {
        if !self.0.is_object() {
            self.0 = JsonValue::Object(Map::new());
        }
        match &mut self.0 {
            JsonValue::Object(map) => map,
            _ => unreachable!("record root is always an object"),
        }
    }

    pub fn set_namespace(&mut self, namespace: &str) {
        self.metadata_mut()
            .insert("namespace".into(), JsonValue::String(namespace.into()));
    }

    /// Insert a label unless one with the same key is already set
    pub fn insert_label(&mut self, key: &str, value: &str) {
        insert_if_absent(self.metadata_mut(), "labels", key, value);
    }

    /// Insert an annotation unless one with the same key is already set
    pub fn insert_annotation(&mut self, key: &str, value: &str) {
        insert_if_absent(self.metadata_mut(), "annotations", key, value);
    }

    /// Set a top-level field (e.g. `spec`, `data`)
    pub fn set(&mut self, field: &str, value: JsonValue) {
        self.root_mut().insert(field.to_string(), value);
    }

    pub fn id(&self) -> ResourceId {
        ResourceId {
            kind: self.kind().unwrap_or_default().to_string(),
            name: self.name().unwrap_or_default().to_string(),
            namespace: self.namespace().map(String::from),
        }
    }

    /// Required fields that are missing or empty
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.api_version().is_none_or(str::is_empty) {
            missing.push("apiVersion");
        }
        if self.kind().is_none_or(str::is_empty) {
            missing.push("kind");
        }
        if self.name().is_none_or(str::is_empty) {
            missing.push("metadata.name");
        }
        missing
    }

    pub fn as_json(&self) -> &JsonValue {
        &self.0
    }

    pub fn into_json(self) -> JsonValue {
        self.0
    }

    /// Serialize to a YAML document (without a leading `---`)
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.0)
    }
}

fn insert_if_absent(meta: &mut Map<String, JsonValue>, field: &str, key: &str, value: &str) {
    let entry = meta
        .entry(field)
        .or_insert_with(|| JsonValue::Object(Map::new()));
    if !entry.is_object() {
        *entry = JsonValue::Object(Map::new());
    }
    if let JsonValue::Object(map) = entry {
        map.entry(key)
            .or_insert_with(|| JsonValue::String(value.to_string()));
    }
}

impl From<JsonValue> for Resource {
    fn from(value: JsonValue) -> Self {
        Self::new(value)
    }
}

/// Identity of a record: kind + name + namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId {
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", ns, self.kind, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

/// Apply order for resource kinds
///
/// Ordered so that applying a directory of manifests never references an object
/// that does not exist yet: namespaces and CRDs first, then identities, config,
/// storage, network, workloads, and finally the objects that point at workloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KindPriority {
    Namespace = 0,
    CustomResourceDefinition = 1,
    ServiceAccount = 2,
    Role = 3,
    RoleBinding = 4,
    ClusterRole = 5,
    ClusterRoleBinding = 6,
    ConfigMap = 7,
    Secret = 8,
    PersistentVolume = 9,
    PersistentVolumeClaim = 10,
    Service = 11,
    Deployment = 12,
    StatefulSet = 13,
    DaemonSet = 14,
    Job = 15,
    CronJob = 16,
    Ingress = 17,
    HorizontalPodAutoscaler = 18,
    NetworkPolicy = 19,
    ServiceMonitor = 20,
    /// Everything else, ordered by name
    Other = 100,
}

impl KindPriority {
    pub fn of(kind: &str) -> Self {
        match kind {
            "Namespace" => Self::Namespace,
            "CustomResourceDefinition" => Self::CustomResourceDefinition,
            "ServiceAccount" => Self::ServiceAccount,
            "Role" => Self::Role,
            "RoleBinding" => Self::RoleBinding,
            "ClusterRole" => Self::ClusterRole,
            "ClusterRoleBinding" => Self::ClusterRoleBinding,
            "ConfigMap" => Self::ConfigMap,
            "Secret" => Self::Secret,
            "PersistentVolume" => Self::PersistentVolume,
            "PersistentVolumeClaim" => Self::PersistentVolumeClaim,
            "Service" => Self::Service,
            "Deployment" => Self::Deployment,
            "StatefulSet" => Self::StatefulSet,
            "DaemonSet" => Self::DaemonSet,
            "Job" => Self::Job,
            "CronJob" => Self::CronJob,
            "Ingress" => Self::Ingress,
            "HorizontalPodAutoscaler" => Self::HorizontalPodAutoscaler,
            "NetworkPolicy" => Self::NetworkPolicy,
            "ServiceMonitor" => Self::ServiceMonitor,
            _ => Self::Other,
        }
    }
}

/// Sort records into apply order
///
/// The sort is stable: records of the same known kind keep their input order.
/// Records of unknown kinds go last, alphabetically by name.
pub fn sort_for_apply(resources: &mut [Resource]) {
    resources.sort_by(|a, b| {
        let pa = KindPriority::of(a.kind().unwrap_or_default());
        let pb = KindPriority::of(b.kind().unwrap_or_default());
        pa.cmp(&pb).then_with(|| {
            if pa == KindPriority::Other {
                a.name().cmp(&b.name())
            } else {
                std::cmp::Ordering::Equal
            }
        })
    });
}

/// Drop records whose identity was already seen, keeping the first occurrence
///
/// The same nested builder can be attached to several owners; each owner emits
/// its records, so duplicates are expected and removed here.
pub fn dedup_by_identity(resources: Vec<Resource>) -> Vec<Resource> {
    let mut seen = HashSet::new();
    resources
        .into_iter()
        .filter(|r| seen.insert(r.id()))
        .collect()
}

/// Standard `app.kubernetes.io/component` value for a kind
pub fn component_for_kind(kind: &str) -> &'static str {
    match kind {
        "Deployment" | "StatefulSet" | "DaemonSet" | "ReplicaSet" | "Pod" => "application",
        "Service" | "Ingress" | "NetworkPolicy" => "network",
        "ConfigMap" | "Secret" => "configuration",
        "Job" | "CronJob" => "batch",
        "PersistentVolume" | "PersistentVolumeClaim" | "StorageClass" => "storage",
        "ServiceAccount" | "Role" | "RoleBinding" | "ClusterRole" | "ClusterRoleBinding" => {
            "security"
        }
        "HorizontalPodAutoscaler" => "scaling",
        "ServiceMonitor" => "monitoring",
        _ => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(kind: &str, name: &str) -> Resource {
        Resource::with_type("v1", kind, name)
    }

    #[test]
    fn test_accessors() {
        let r = Resource::new(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "web", "namespace": "prod", "labels": {"app": "web"}},
            "spec": {"replicas": 3}
        }));
        assert_eq!(r.api_version(), Some("apps/v1"));
        assert_eq!(r.kind(), Some("Deployment"));
        assert_eq!(r.name(), Some("web"));
        assert_eq!(r.namespace(), Some("prod"));
        assert_eq!(r.labels().get("app").map(String::as_str), Some("web"));
        assert_eq!(r.get("spec.replicas"), Some(&json!(3)));
        assert!(r.missing_fields().is_empty());
    }

    #[test]
    fn test_missing_fields() {
        let r = Resource::new(json!({"kind": "ConfigMap", "metadata": {}}));
        assert_eq!(r.missing_fields(), vec!["apiVersion", "metadata.name"]);

        let r = Resource::new(json!("not an object"));
        assert_eq!(r.missing_fields().len(), 3);
    }

    #[test]
    fn test_insert_label_keeps_existing() {
        let mut r = record("ConfigMap", "cfg");
        r.insert_label("tier", "backend");
        r.insert_label("tier", "frontend");
        assert_eq!(r.labels()["tier"], "backend");
    }

    #[test]
    fn test_sort_for_apply_known_kinds() {
        let mut resources = vec![
            record("Deployment", "a"),
            record("Service", "b"),
            record("Secret", "c"),
            record("ConfigMap", "d"),
        ];
        sort_for_apply(&mut resources);
        let kinds: Vec<_> = resources.iter().map(|r| r.kind().unwrap()).collect();
        assert_eq!(kinds, vec!["ConfigMap", "Secret", "Service", "Deployment"]);
    }

    #[test]
    fn test_sort_for_apply_unknown_kinds_last_by_name() {
        let mut resources = vec![
            record("Widget", "zeta"),
            record("Gadget", "alpha"),
            record("Namespace", "ns"),
            record("CustomResourceDefinition", "widgets.example.com"),
        ];
        sort_for_apply(&mut resources);
        let names: Vec<_> = resources.iter().map(|r| r.name().unwrap()).collect();
        assert_eq!(names, vec!["ns", "widgets.example.com", "alpha", "zeta"]);
    }

    #[test]
    fn test_dedup_by_identity() {
        let mut a = record("Secret", "db");
        a.set_namespace("default");
        let b = a.clone();
        let mut c = record("Secret", "db");
        c.set_namespace("other");

        let out = dedup_by_identity(vec![a, b, c]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_cluster_scoped() {
        assert!(is_cluster_scoped("ClusterRole"));
        assert!(is_cluster_scoped("PersistentVolume"));
        assert!(!is_cluster_scoped("PersistentVolumeClaim"));
        assert!(!is_cluster_scoped("Deployment"));
    }

    #[test]
    fn test_component_for_kind() {
        assert_eq!(component_for_kind("StatefulSet"), "application");
        assert_eq!(component_for_kind("Service"), "network");
        assert_eq!(component_for_kind("Secret"), "configuration");
        assert_eq!(component_for_kind("CronJob"), "batch");
    }

    #[test]
    fn test_resource_id_display() {
        let mut r = record("Service", "web");
        assert_eq!(r.id().to_string(), "Service/web");
        r.set_namespace("prod");
        assert_eq!(r.id().to_string(), "prod/Service/web");
    }
}
