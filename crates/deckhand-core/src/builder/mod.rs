//! Builder objects
//!
//! A builder describes one logical unit (an app, a secret, a job, ...) through
//! chained setters, and lowers itself into resource records on demand.
//! Builders never cache: every call to [`Builder::generate_kubernetes_resources`]
//! produces fresh, equal records for the same configuration.

mod app;
mod configmap;
mod custom_resource;
mod group;
mod ingress;
mod job;
mod meta;
mod namespace;
mod network;
mod rbac;
mod scaling;
mod secret;
mod service;
mod source;
mod stateful;
mod workload;

pub use app::App;
pub use configmap::ConfigMap;
pub use custom_resource::{Controller, CrdScope, CustomResource, Instance, PropertyType, SchemaProperty};
pub use group::AppGroup;
pub use ingress::{Ingress, IngressPath, IngressRule, IngressTls, PathType};
pub use job::{ConcurrencyPolicy, CronJob, Job, JobTemplate, RestartPolicy};
pub use meta::ObjectMeta;
pub use namespace::Namespace;
pub use network::{NetworkPolicy, Peer, PolicyType, TrafficRule};
pub use rbac::{
    ClusterRole, ClusterRoleBinding, PolicyRule, Role, RoleBinding, RoleRef, ServiceAccount,
    Subject, SubjectKind,
};
pub use scaling::{HorizontalScaling, Scaling};
pub use secret::{Secret, SecretType};
pub use service::{Service, ServicePort, ServiceType};
pub use source::{DataSource, MissingSourcePolicy, ResolvedData};
pub use stateful::{Backup, PodManagementPolicy, StatefulApp};
pub use workload::{
    BuildContext, Companion, Metrics, Port, Probe, ProbeAction, Protocol, ResourceRequirements,
    Storage, Volume, VolumeSource, Workload, DEFAULT_IMAGE,
};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};
use crate::resource::Resource;

/// Namespace used when none is configured
pub const DEFAULT_NAMESPACE: &str = "default";

/// Target output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Kubernetes,
    Compose,
    Helm,
    Kustomize,
    Terraform,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 5] = [
        OutputFormat::Kubernetes,
        OutputFormat::Compose,
        OutputFormat::Helm,
        OutputFormat::Kustomize,
        OutputFormat::Terraform,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kubernetes => "kubernetes",
            Self::Compose => "compose",
            Self::Helm => "helm",
            Self::Kustomize => "kustomize",
            Self::Terraform => "terraform",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "kubernetes" | "k8s" | "yaml" => Ok(Self::Kubernetes),
            "compose" | "docker-compose" => Ok(Self::Compose),
            "helm" | "chart" => Ok(Self::Helm),
            "kustomize" => Ok(Self::Kustomize),
            "terraform" | "tf" => Ok(Self::Terraform),
            other => Err(CoreError::invalid_value(
                "format",
                format!(
                    "unknown output format '{}' (expected one of: kubernetes, compose, helm, kustomize, terraform)",
                    other
                ),
            )),
        }
    }
}

/// The contract every builder honors
pub trait Builder: fmt::Debug {
    /// Registry discriminator, e.g. `"App"`
    fn type_name(&self) -> &'static str;

    fn name(&self) -> &str;

    fn namespace(&self) -> &str;

    /// Lower the current configuration into resource records
    ///
    /// Deterministic for a given state. Composite builders flatten the records
    /// of their nested builders after their own primary records.
    fn generate_kubernetes_resources(&self) -> Result<Vec<Resource>>;

    /// Advisory problems; rendering proceeds regardless
    fn validate(&self) -> Vec<String> {
        Vec::new()
    }

    /// Container workloads, for renderers that need fields the records don't carry
    fn workloads(&self) -> Vec<&Workload> {
        Vec::new()
    }

    /// Whether rendering this builder to `format` produces anything meaningful
    fn supports(&self, format: OutputFormat) -> bool {
        match format {
            OutputFormat::Compose => !self.workloads().is_empty(),
            _ => true,
        }
    }

    /// Settings on this builder that `format` ignores, as human-readable notes
    fn compatibility(&self, _format: OutputFormat) -> Vec<String> {
        Vec::new()
    }

    /// Serialize to a tagged definition understood by [`crate::registry::BuilderRegistry`]
    fn to_definition(&self) -> Result<JsonValue>;
}

/// Serialize `value` with a leading `type` discriminator
pub(crate) fn tagged_definition<T: Serialize>(type_name: &str, value: &T) -> Result<JsonValue> {
    let body = serde_json::to_value(value)?;
    let mut map = serde_json::Map::new();
    map.insert("type".into(), JsonValue::String(type_name.into()));
    if let JsonValue::Object(fields) = body {
        map.extend(fields);
    }
    Ok(JsonValue::Object(map))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parse() {
        assert_eq!("k8s".parse::<OutputFormat>().unwrap(), OutputFormat::Kubernetes);
        assert_eq!("docker-compose".parse::<OutputFormat>().unwrap(), OutputFormat::Compose);
        assert_eq!("Chart".parse::<OutputFormat>().unwrap(), OutputFormat::Helm);
        assert_eq!("tf".parse::<OutputFormat>().unwrap(), OutputFormat::Terraform);
        assert!("pulumi".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_tagged_definition_puts_type_first() {
        let value = tagged_definition("Secret", &serde_json::json!({"name": "s"})).unwrap();
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["type", "name"]);
    }
}
