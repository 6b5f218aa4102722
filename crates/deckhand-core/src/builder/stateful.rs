//! Stateful application: StatefulSet, headless Service and optional backups

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};
use std::collections::BTreeMap;

use super::job::{ConcurrencyPolicy, CronJob};
use super::meta::{meta_setters, string_map};
use super::workload::{StorageMode, Workload, workload_setters};
use super::{Builder, OutputFormat, tagged_definition};
use crate::error::Result;
use crate::labels;
use crate::resource::Resource;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodManagementPolicy {
    #[default]
    OrderedReady,
    Parallel,
}

impl PodManagementPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrderedReady => "OrderedReady",
            Self::Parallel => "Parallel",
        }
    }
}

/// Scheduled backup, emitted as a `{name}-backup` CronJob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    pub schedule: String,
    pub image: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    /// Number of successful backup runs to keep
    #[serde(default = "default_retention")]
    pub retention: u32,
}

fn default_retention() -> u32 {
    7
}

impl Backup {
    pub fn new(schedule: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            schedule: schedule.into(),
            image: image.into(),
            command: Vec::new(),
            retention: default_retention(),
        }
    }

    pub fn command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = command.into_iter().map(Into::into).collect();
        self
    }

    pub fn retention(mut self, runs: u32) -> Self {
        self.retention = runs;
        self
    }
}

/// A workload with stable identity and per-replica storage
///
/// Always emits a headless Service named after the app, which the StatefulSet
/// references as its `serviceName`. Storage declarations become
/// `volumeClaimTemplates` rather than standalone claims.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatefulApp {
    #[serde(flatten)]
    workload: Workload,

    #[serde(default = "default_replicas")]
    replicas: u32,

    #[serde(default)]
    pod_management_policy: PodManagementPolicy,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    backup: Option<Backup>,
}

fn default_replicas() -> u32 {
    1
}

impl StatefulApp {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            workload: Workload::new(name),
            replicas: default_replicas(),
            pod_management_policy: PodManagementPolicy::OrderedReady,
            backup: None,
        }
    }

    meta_setters!(workload.meta);
    workload_setters!(workload);

    pub fn replicas(mut self, replicas: u32) -> Self {
        self.replicas = replicas;
        self
    }

    pub fn pod_management_policy(mut self, policy: PodManagementPolicy) -> Self {
        self.pod_management_policy = policy;
        self
    }

    pub fn backup(mut self, backup: Backup) -> Self {
        self.backup = Some(backup);
        self
    }

    pub fn get_replicas(&self) -> u32 {
        self.replicas
    }

    fn stateful_set(&self) -> Result<Resource> {
        let meta = &self.workload.meta;
        let mut annotations = BTreeMap::new();
        if let Some(checksum) = self.workload.config_checksum()? {
            annotations.insert(labels::CONFIG_CHECKSUM.to_string(), checksum);
        }

        let mut spec = Map::new();
        spec.insert("serviceName".into(), json!(meta.name()));
        spec.insert("replicas".into(), json!(self.replicas));
        spec.insert(
            "podManagementPolicy".into(),
            json!(self.pod_management_policy.as_str()),
        );
        spec.insert(
            "selector".into(),
            json!({"matchLabels": string_map(&meta.selector())}),
        );
        spec.insert(
            "template".into(),
            self.workload
                .pod_template(StorageMode::ClaimTemplates, &annotations),
        );
        if !self.workload.storage.is_empty() {
            let templates: Vec<JsonValue> = self
                .workload
                .storage
                .iter()
                .map(|s| json!({"metadata": {"name": s.name}, "spec": s.claim_spec()}))
                .collect();
            spec.insert("volumeClaimTemplates".into(), JsonValue::Array(templates));
        }

        Ok(Resource::new(json!({
            "apiVersion": "apps/v1",
            "kind": "StatefulSet",
            "metadata": meta.to_json(true),
            "spec": spec,
        })))
    }

    fn headless_service(&self) -> Resource {
        let meta = &self.workload.meta;
        let ports: Vec<JsonValue> = self
            .workload
            .ports
            .iter()
            .enumerate()
            .map(|(i, p)| {
                json!({
                    "name": p.name_or(i),
                    "port": p.container,
                    "targetPort": p.container,
                    "protocol": p.protocol.as_str(),
                })
            })
            .collect();
        Resource::new(json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": meta.to_json(true),
            "spec": {
                "clusterIP": "None",
                "selector": string_map(&meta.selector()),
                "ports": ports,
            },
        }))
    }

    /// Backup CronJob pointed at replica 0 through `BACKUP_TARGET`
    fn backup_job(&self, backup: &Backup) -> CronJob {
        let meta = &self.workload.meta;
        let mut job = CronJob::new(format!("{}-backup", meta.name()), backup.schedule.clone())
            .namespace(meta.namespace.clone())
            .image(backup.image.clone())
            .command(backup.command.clone())
            .concurrency_policy(ConcurrencyPolicy::Forbid)
            .history_limits(backup.retention, 1)
            .env("BACKUP_TARGET", format!("{}-0.{}", meta.name(), meta.name()));
        for (key, value) in &meta.labels {
            job = job.label(key.clone(), value.clone());
        }
        job
    }
}

impl Builder for StatefulApp {
    fn type_name(&self) -> &'static str {
        "StatefulApp"
    }

    fn name(&self) -> &str {
        self.workload.name()
    }

    fn namespace(&self) -> &str {
        &self.workload.meta.namespace
    }

    fn generate_kubernetes_resources(&self) -> Result<Vec<Resource>> {
        let mut resources = vec![self.stateful_set()?, self.headless_service()];
        if let Some(backup) = &self.backup {
            resources.extend(self.backup_job(backup).generate_kubernetes_resources()?);
        }
        resources.extend(self.workload.config_resources()?);
        Ok(resources)
    }

    fn validate(&self) -> Vec<String> {
        let mut problems = self.workload.validate("StatefulApp");
        let name = self.workload.name();
        if self.workload.storage.is_empty() {
            problems.push(format!(
                "StatefulApp '{name}' declares no storage; consider an App instead"
            ));
        }
        if self.workload.ports.is_empty() {
            problems.push(format!(
                "StatefulApp '{name}' exposes no ports; its headless Service will have none"
            ));
        }
        if let Some(backup) = &self.backup {
            problems.extend(self.backup_job(backup).validate());
        }
        problems
    }

    fn workloads(&self) -> Vec<&Workload> {
        vec![&self.workload]
    }

    fn compatibility(&self, format: OutputFormat) -> Vec<String> {
        let name = self.workload.name();
        let mut notes = Vec::new();
        match format {
            OutputFormat::Compose => {
                if self.replicas > 1 {
                    notes.push(format!(
                        "StatefulApp '{name}': compose runs a single replica"
                    ));
                }
                if self.backup.is_some() {
                    notes.push(format!(
                        "StatefulApp '{name}': backup schedule is ignored by compose"
                    ));
                }
            }
            _ => {
                if self.workload.build.is_some() {
                    notes.push(format!(
                        "StatefulApp '{name}': build context is only used by compose"
                    ));
                }
            }
        }
        notes
    }

    fn to_definition(&self) -> Result<JsonValue> {
        tagged_definition(self.type_name(), self)
    }
}
