//! The container workload shared by `App` and `StatefulApp`
//!
//! Holds everything about the primary container and its pod: image or build
//! context, ports, environment, attached ConfigMaps/Secrets, probes, companion
//! containers, volumes and storage. Record lowering for the pod template lives
//! here so both workload kinds produce identical containers.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use super::configmap::ConfigMap;
use super::meta::{ObjectMeta, string_map};
use super::secret::Secret;
use crate::error::Result;
use crate::labels;
use crate::names;

/// Image used when neither an image nor a build context is configured
pub const DEFAULT_IMAGE: &str = "nginx:latest";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
    Sctp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "TCP",
            Self::Udp => "UDP",
            Self::Sctp => "SCTP",
        }
    }
}

/// A container port, optionally published on a specific host port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Port {
    pub container: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub protocol: Protocol,
}

impl Port {
    pub fn new(container: u16) -> Self {
        Self {
            container,
            host: None,
            name: None,
            protocol: Protocol::Tcp,
        }
    }

    /// Port name, defaulting to `http` for the first port and `port-{n}` otherwise
    pub fn name_or(&self, index: usize) -> String {
        self.name.clone().unwrap_or_else(|| {
            if index == 0 {
                "http".to_string()
            } else {
                format!("port-{}", self.container)
            }
        })
    }

    /// Compose `host:container` mapping
    pub fn compose_mapping(&self) -> String {
        let mapping = format!("{}:{}", self.host.unwrap_or(self.container), self.container);
        match self.protocol {
            Protocol::Tcp => mapping,
            other => format!("{}/{}", mapping, other.as_str().to_ascii_lowercase()),
        }
    }
}

/// Local build context (compose only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildContext {
    pub context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub args: IndexMap<String, String>,
}

/// CPU/memory requests and limits, in Kubernetes quantity notation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequirements {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_request: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_request: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_limit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<String>,
}

impl ResourceRequirements {
    pub fn requests(cpu: impl Into<String>, memory: impl Into<String>) -> Self {
        Self {
            cpu_request: Some(cpu.into()),
            memory_request: Some(memory.into()),
            ..Default::default()
        }
    }

    pub fn limits(mut self, cpu: impl Into<String>, memory: impl Into<String>) -> Self {
        self.cpu_limit = Some(cpu.into());
        self.memory_limit = Some(memory.into());
        self
    }

    pub fn to_json(&self) -> JsonValue {
        let mut out = Map::new();
        let mut requests = Map::new();
        if let Some(cpu) = &self.cpu_request {
            requests.insert("cpu".into(), json!(cpu));
        }
        if let Some(memory) = &self.memory_request {
            requests.insert("memory".into(), json!(memory));
        }
        let mut limits = Map::new();
        if let Some(cpu) = &self.cpu_limit {
            limits.insert("cpu".into(), json!(cpu));
        }
        if let Some(memory) = &self.memory_limit {
            limits.insert("memory".into(), json!(memory));
        }
        if !requests.is_empty() {
            out.insert("requests".into(), JsonValue::Object(requests));
        }
        if !limits.is_empty() {
            out.insert("limits".into(), JsonValue::Object(limits));
        }
        JsonValue::Object(out)
    }
}

/// What a probe checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProbeAction {
    Http { path: String, port: u16 },
    Exec { command: Vec<String> },
    Tcp { port: u16 },
}

/// A liveness or readiness probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Probe {
    #[serde(flatten)]
    pub action: ProbeAction,
    #[serde(default = "default_initial_delay")]
    pub initial_delay: u32,
    #[serde(default = "default_period")]
    pub period: u32,
    #[serde(default = "default_timeout")]
    pub timeout: u32,
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

fn default_initial_delay() -> u32 {
    10
}
fn default_period() -> u32 {
    10
}
fn default_timeout() -> u32 {
    5
}
fn default_failure_threshold() -> u32 {
    3
}

impl Probe {
    fn with_action(action: ProbeAction) -> Self {
        Self {
            action,
            initial_delay: default_initial_delay(),
            period: default_period(),
            timeout: default_timeout(),
            failure_threshold: default_failure_threshold(),
        }
    }

    pub fn http(path: impl Into<String>, port: u16) -> Self {
        Self::with_action(ProbeAction::Http {
            path: path.into(),
            port,
        })
    }

    pub fn exec<I, S>(command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_action(ProbeAction::Exec {
            command: command.into_iter().map(Into::into).collect(),
        })
    }

    pub fn tcp(port: u16) -> Self {
        Self::with_action(ProbeAction::Tcp { port })
    }

    pub fn initial_delay(mut self, seconds: u32) -> Self {
        self.initial_delay = seconds;
        self
    }

    pub fn period(mut self, seconds: u32) -> Self {
        self.period = seconds;
        self
    }

    pub fn to_json(&self) -> JsonValue {
        let mut probe = match &self.action {
            ProbeAction::Http { path, port } => {
                json!({"httpGet": {"path": path, "port": port}})
            }
            ProbeAction::Exec { command } => json!({"exec": {"command": command}}),
            ProbeAction::Tcp { port } => json!({"tcpSocket": {"port": port}}),
        };
        if let JsonValue::Object(map) = &mut probe {
            map.insert("initialDelaySeconds".into(), json!(self.initial_delay));
            map.insert("periodSeconds".into(), json!(self.period));
            map.insert("timeoutSeconds".into(), json!(self.timeout));
            map.insert("failureThreshold".into(), json!(self.failure_threshold));
        }
        probe
    }
}

/// Where a pod volume's content comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum VolumeSource {
    EmptyDir,
    HostPath { path: String },
    Claim { claim: String },
}

/// An extra pod volume mounted into the primary container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub name: String,
    pub mount_path: String,
    #[serde(flatten)]
    pub source: VolumeSource,
    #[serde(default)]
    pub read_only: bool,
}

/// A persistent storage declaration
///
/// On a `StatefulApp` this becomes a volume claim template; on an `App` a
/// PersistentVolumeClaim named `{app}-{storage}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Storage {
    pub name: String,
    pub mount_path: String,
    pub size: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
    #[serde(default = "default_access_modes")]
    pub access_modes: Vec<String>,
}

fn default_access_modes() -> Vec<String> {
    vec!["ReadWriteOnce".to_string()]
}

impl Storage {
    pub fn new(
        name: impl Into<String>,
        mount_path: impl Into<String>,
        size: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            mount_path: mount_path.into(),
            size: size.into(),
            storage_class: None,
            access_modes: default_access_modes(),
        }
    }

    pub fn storage_class(mut self, class: impl Into<String>) -> Self {
        self.storage_class = Some(class.into());
        self
    }

    /// PersistentVolumeClaim `spec`
    pub fn claim_spec(&self) -> JsonValue {
        let mut spec = json!({
            "accessModes": self.access_modes,
            "resources": {"requests": {"storage": self.size}},
        });
        if let (Some(class), JsonValue::Object(map)) = (&self.storage_class, &mut spec) {
            map.insert("storageClassName".into(), json!(class));
        }
        spec
    }
}

/// Prometheus metrics endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub port: u16,
    #[serde(default = "default_metrics_path")]
    pub path: String,
    /// Emit a ServiceMonitor for the Prometheus operator
    #[serde(default)]
    pub service_monitor: bool,
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

/// A sidecar or init container running next to the primary container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Companion {
    pub name: String,
    pub image: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub env: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<u16>,
    /// Mount pod volumes by name: volume -> mount path
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub mounts: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    /// Run to completion before the primary container starts
    #[serde(default)]
    pub init: bool,
}

impl Companion {
    pub fn sidecar(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            command: Vec::new(),
            args: Vec::new(),
            env: IndexMap::new(),
            ports: Vec::new(),
            mounts: BTreeMap::new(),
            resources: None,
            init: false,
        }
    }

    pub fn init(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            init: true,
            ..Self::sidecar(name, image)
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

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.ports.push(port);
        self
    }

    pub fn mount(mut self, volume: impl Into<String>, path: impl Into<String>) -> Self {
        self.mounts.insert(volume.into(), path.into());
        self
    }

    fn to_json(&self) -> JsonValue {
        let mut container = Map::new();
        container.insert("name".into(), json!(self.name));
        container.insert("image".into(), json!(self.image));
        if !self.command.is_empty() {
            container.insert("command".into(), json!(self.command));
        }
        if !self.args.is_empty() {
            container.insert("args".into(), json!(self.args));
        }
        if !self.ports.is_empty() {
            let ports: Vec<JsonValue> = self
                .ports
                .iter()
                .map(|p| json!({"containerPort": p, "protocol": "TCP"}))
                .collect();
            container.insert("ports".into(), JsonValue::Array(ports));
        }
        if !self.env.is_empty() {
            container.insert("env".into(), env_list(&self.env));
        }
        if let Some(resources) = &self.resources {
            container.insert("resources".into(), resources.to_json());
        }
        if !self.mounts.is_empty() {
            let mounts: Vec<JsonValue> = self
                .mounts
                .iter()
                .map(|(volume, path)| json!({"name": volume, "mountPath": path}))
                .collect();
            container.insert("volumeMounts".into(), JsonValue::Array(mounts));
        }
        JsonValue::Object(container)
    }
}

/// How workload storage is attached to the pod
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StorageMode {
    /// One PersistentVolumeClaim per declaration, referenced by name
    Claims,
    /// Volume claim templates on the StatefulSet; mounts only
    ClaimTemplates,
}

/// Primary container and pod configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workload {
    #[serde(flatten)]
    pub meta: ObjectMeta,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildContext>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<Port>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub env: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<Secret>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config_maps: Vec<ConfigMap>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liveness: Option<Probe>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readiness: Option<Probe>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub companions: Vec<Companion>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub storage: Vec<Storage>,

    /// Services that must be healthy before this one starts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    /// Services this one talks to, without a health requirement
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connects_to: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Metrics>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,

    /// Compose restart policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart: Option<String>,
}

impl Workload {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            meta: ObjectMeta::new(name),
            image: None,
            build: None,
            image_pull_policy: None,
            command: Vec::new(),
            args: Vec::new(),
            ports: Vec::new(),
            env: IndexMap::new(),
            secrets: Vec::new(),
            config_maps: Vec::new(),
            resources: None,
            liveness: None,
            readiness: None,
            companions: Vec::new(),
            volumes: Vec::new(),
            storage: Vec::new(),
            depends_on: Vec::new(),
            connects_to: Vec::new(),
            metrics: None,
            service_account: None,
            node_selector: BTreeMap::new(),
            restart: None,
        }
    }

    pub fn name(&self) -> &str {
        self.meta.name()
    }

    /// Image to run, falling back to [`DEFAULT_IMAGE`]
    pub fn image_or_default(&self) -> &str {
        self.image.as_deref().unwrap_or(DEFAULT_IMAGE)
    }

    /// Split the image into repository and tag (`nginx:1.21` -> `nginx`, `1.21`)
    pub fn image_parts(&self) -> (String, Option<String>) {
        split_image(self.image_or_default())
    }

    /// Port the first Service port targets
    pub fn primary_port(&self) -> Option<u16> {
        self.ports.first().map(|p| p.container)
    }

    /// Main container record
    pub(crate) fn container_json(&self) -> JsonValue {
        let mut container = Map::new();
        container.insert("name".into(), json!(self.name()));
        container.insert("image".into(), json!(self.image_or_default()));
        if let Some(policy) = &self.image_pull_policy {
            container.insert("imagePullPolicy".into(), json!(policy));
        }
        if !self.command.is_empty() {
            container.insert("command".into(), json!(self.command));
        }
        if !self.args.is_empty() {
            container.insert("args".into(), json!(self.args));
        }
        if !self.ports.is_empty() {
            let ports: Vec<JsonValue> = self
                .ports
                .iter()
                .enumerate()
                .map(|(i, p)| {
                    json!({
                        "name": p.name_or(i),
                        "containerPort": p.container,
                        "protocol": p.protocol.as_str(),
                    })
                })
                .collect();
            container.insert("ports".into(), JsonValue::Array(ports));
        }
        if !self.env.is_empty() {
            container.insert("env".into(), env_list(&self.env));
        }

        let env_from: Vec<JsonValue> = self
            .config_maps
            .iter()
            .filter(|c| c.mount_path.is_none())
            .map(|c| json!({"configMapRef": {"name": c.meta().name()}}))
            .chain(
                self.secrets
                    .iter()
                    .filter(|s| s.mount_path.is_none())
                    .map(|s| json!({"secretRef": {"name": s.meta().name()}})),
            )
            .collect();
        if !env_from.is_empty() {
            container.insert("envFrom".into(), JsonValue::Array(env_from));
        }

        if let Some(resources) = &self.resources {
            container.insert("resources".into(), resources.to_json());
        }
        if let Some(probe) = &self.liveness {
            container.insert("livenessProbe".into(), probe.to_json());
        }
        if let Some(probe) = &self.readiness {
            container.insert("readinessProbe".into(), probe.to_json());
        }

        let mounts = self.volume_mounts();
        if !mounts.is_empty() {
            container.insert("volumeMounts".into(), JsonValue::Array(mounts));
        }

        JsonValue::Object(container)
    }

    fn volume_mounts(&self) -> Vec<JsonValue> {
        let mut mounts = Vec::new();
        for cm in &self.config_maps {
            if let Some(path) = &cm.mount_path {
                mounts.push(json!({
                    "name": format!("config-{}", cm.meta().name()),
                    "mountPath": path,
                    "readOnly": true,
                }));
            }
        }
        for secret in &self.secrets {
            if let Some(path) = &secret.mount_path {
                mounts.push(json!({
                    "name": format!("secret-{}", secret.meta().name()),
                    "mountPath": path,
                    "readOnly": true,
                }));
            }
        }
        for volume in &self.volumes {
            let mut mount = json!({"name": volume.name, "mountPath": volume.mount_path});
            if volume.read_only {
                mount["readOnly"] = json!(true);
            }
            mounts.push(mount);
        }
        for storage in &self.storage {
            mounts.push(json!({"name": storage.name, "mountPath": storage.mount_path}));
        }
        mounts
    }

    fn pod_volumes(&self, storage_mode: StorageMode) -> Vec<JsonValue> {
        let mut volumes = Vec::new();
        for cm in &self.config_maps {
            if cm.mount_path.is_some() {
                volumes.push(json!({
                    "name": format!("config-{}", cm.meta().name()),
                    "configMap": {"name": cm.meta().name()},
                }));
            }
        }
        for secret in &self.secrets {
            if secret.mount_path.is_some() {
                volumes.push(json!({
                    "name": format!("secret-{}", secret.meta().name()),
                    "secret": {"secretName": secret.meta().name()},
                }));
            }
        }
        for volume in &self.volumes {
            let source = match &volume.source {
                VolumeSource::EmptyDir => json!({"emptyDir": {}}),
                VolumeSource::HostPath { path } => json!({"hostPath": {"path": path}}),
                VolumeSource::Claim { claim } => {
                    json!({"persistentVolumeClaim": {"claimName": claim}})
                }
            };
            let mut entry = json!({"name": volume.name});
            if let (JsonValue::Object(map), JsonValue::Object(src)) = (&mut entry, source) {
                map.extend(src);
            }
            volumes.push(entry);
        }
        if storage_mode == StorageMode::Claims {
            for storage in &self.storage {
                volumes.push(json!({
                    "name": storage.name,
                    "persistentVolumeClaim": {"claimName": self.claim_name(storage)},
                }));
            }
        }
        volumes
    }

    /// Name of the standalone claim backing `storage` on an `App`
    pub fn claim_name(&self, storage: &Storage) -> String {
        format!("{}-{}", self.name(), storage.name)
    }

    /// Pod template (`metadata` + `spec`)
    pub(crate) fn pod_template(
        &self,
        storage_mode: StorageMode,
        extra_annotations: &BTreeMap<String, String>,
    ) -> JsonValue {
        let mut pod_labels = self.meta.all_labels();
        pod_labels.extend(self.meta.selector());

        let mut annotations = extra_annotations.clone();
        if let Some(metrics) = &self.metrics {
            annotations.insert(labels::PROMETHEUS_SCRAPE.into(), "true".into());
            annotations.insert(labels::PROMETHEUS_PORT.into(), metrics.port.to_string());
            annotations.insert(labels::PROMETHEUS_PATH.into(), metrics.path.clone());
        }

        let mut metadata = Map::new();
        metadata.insert("labels".into(), string_map(&pod_labels));
        if !annotations.is_empty() {
            metadata.insert("annotations".into(), string_map(&annotations));
        }

        let mut containers = vec![self.container_json()];
        containers.extend(
            self.companions
                .iter()
                .filter(|c| !c.init)
                .map(Companion::to_json),
        );
        let init_containers: Vec<JsonValue> = self
            .companions
            .iter()
            .filter(|c| c.init)
            .map(Companion::to_json)
            .collect();

        let mut spec = Map::new();
        if let Some(account) = &self.service_account {
            spec.insert("serviceAccountName".into(), json!(account));
        }
        if !init_containers.is_empty() {
            spec.insert("initContainers".into(), JsonValue::Array(init_containers));
        }
        spec.insert("containers".into(), JsonValue::Array(containers));
        let volumes = self.pod_volumes(storage_mode);
        if !volumes.is_empty() {
            spec.insert("volumes".into(), JsonValue::Array(volumes));
        }
        if !self.node_selector.is_empty() {
            spec.insert("nodeSelector".into(), string_map(&self.node_selector));
        }

        json!({"metadata": metadata, "spec": spec})
    }

    /// Records of every attached ConfigMap and Secret, in attachment order
    pub(crate) fn config_resources(&self) -> Result<Vec<crate::resource::Resource>> {
        let mut out = Vec::new();
        for cm in &self.config_maps {
            out.extend(super::Builder::generate_kubernetes_resources(cm)?);
        }
        for secret in &self.secrets {
            out.extend(super::Builder::generate_kubernetes_resources(secret)?);
        }
        Ok(self.adopt(out))
    }

    /// Move nested records left in the default namespace into this workload's
    /// namespace; records given an explicit namespace keep it
    pub(crate) fn adopt(
        &self,
        mut records: Vec<crate::resource::Resource>,
    ) -> Vec<crate::resource::Resource> {
        let namespace = self.meta.namespace.as_str();
        if namespace == super::DEFAULT_NAMESPACE {
            return records;
        }
        for record in &mut records {
            let kind = record.kind().unwrap_or_default();
            if crate::resource::is_cluster_scoped(kind) {
                continue;
            }
            if matches!(record.namespace(), None | Some(super::DEFAULT_NAMESPACE)) {
                record.set_namespace(namespace);
            }
        }
        records
    }

    /// Digest over every attached ConfigMap, `None` when there are none
    pub(crate) fn config_checksum(&self) -> Result<Option<String>> {
        if self.config_maps.is_empty() {
            return Ok(None);
        }
        let mut hasher = Sha256::new();
        for cm in &self.config_maps {
            hasher.update(cm.checksum()?.as_bytes());
        }
        Ok(Some(format!("{:x}", hasher.finalize())))
    }

    pub(crate) fn validate(&self, what: &str) -> Vec<String> {
        let mut problems = self.meta.name_problems(what);
        let name = self.name();

        if self.image.is_none() && self.build.is_none() {
            problems.push(format!(
                "{what} '{name}' has no image or build context; {DEFAULT_IMAGE} will be used"
            ));
        }
        if let Some(image) = &self.image {
            if image.trim().is_empty() || image.contains(char::is_whitespace) {
                problems.push(format!("{what} '{name}' has invalid image '{image}'"));
            }
        }

        let mut seen = std::collections::HashSet::new();
        for port in &self.ports {
            if port.container == 0 {
                problems.push(format!("{what} '{name}' declares container port 0"));
            }
            if !seen.insert(port.container) {
                problems.push(format!(
                    "{what} '{name}' declares container port {} more than once",
                    port.container
                ));
            }
        }

        for key in self.env.keys() {
            if key.is_empty() || key.contains(char::is_whitespace) || key.contains('=') {
                problems.push(format!(
                    "{what} '{name}' has invalid environment variable name '{key}'"
                ));
            }
        }

        for companion in &self.companions {
            if !names::is_valid_label_name(&companion.name) {
                problems.push(format!(
                    "{what} '{name}' has companion with invalid name '{}'",
                    companion.name
                ));
            }
        }

        for storage in &self.storage {
            if !names::is_valid_label_name(&storage.name) {
                problems.push(format!(
                    "{what} '{name}' has storage with invalid name '{}'",
                    storage.name
                ));
            }
        }

        for cm in &self.config_maps {
            problems.extend(super::Builder::validate(cm));
        }
        for secret in &self.secrets {
            problems.extend(super::Builder::validate(secret));
        }

        problems
    }
}

/// Implements the container setters shared by `App` and `StatefulApp`
macro_rules! workload_setters {
    ($field:ident) => {
        /// Container image, e.g. `nginx:1.21`
        pub fn image(mut self, image: impl Into<String>) -> Self {
            self.$field.image = Some(image.into());
            self
        }

        /// Build from a local context instead of pulling an image (compose output)
        pub fn build(mut self, context: impl Into<String>) -> Self {
            self.$field.build = Some($crate::builder::BuildContext {
                context: context.into(),
                dockerfile: None,
                args: indexmap::IndexMap::new(),
            });
            self
        }

        pub fn dockerfile(mut self, dockerfile: impl Into<String>) -> Self {
            if let Some(build) = &mut self.$field.build {
                build.dockerfile = Some(dockerfile.into());
            }
            self
        }

        pub fn build_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
            if let Some(build) = &mut self.$field.build {
                build.args.insert(key.into(), value.into());
            }
            self
        }

        pub fn image_pull_policy(mut self, policy: impl Into<String>) -> Self {
            self.$field.image_pull_policy = Some(policy.into());
            self
        }

        pub fn command<I, S>(mut self, command: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            self.$field.command = command.into_iter().map(Into::into).collect();
            self
        }

        pub fn args<I, S>(mut self, args: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            self.$field.args = args.into_iter().map(Into::into).collect();
            self
        }

        /// Expose a container port (published on the same host port in compose)
        pub fn port(mut self, port: u16) -> Self {
            self.$field.ports.push($crate::builder::Port::new(port));
            self
        }

        /// Expose a container port published on a different host port
        pub fn port_mapping(mut self, host: u16, container: u16) -> Self {
            let mut port = $crate::builder::Port::new(container);
            port.host = Some(host);
            self.$field.ports.push(port);
            self
        }

        pub fn named_port(mut self, name: impl Into<String>, port: u16) -> Self {
            let mut p = $crate::builder::Port::new(port);
            p.name = Some(name.into());
            self.$field.ports.push(p);
            self
        }

        pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
            self.$field.env.insert(key.into(), value.into());
            self
        }

        pub fn add_secret(mut self, secret: $crate::builder::Secret) -> Self {
            self.$field.secrets.push(secret);
            self
        }

        pub fn add_config_map(mut self, config_map: $crate::builder::ConfigMap) -> Self {
            self.$field.config_maps.push(config_map);
            self
        }

        pub fn resources(mut self, resources: $crate::builder::ResourceRequirements) -> Self {
            self.$field.resources = Some(resources);
            self
        }

        pub fn liveness(mut self, probe: $crate::builder::Probe) -> Self {
            self.$field.liveness = Some(probe);
            self
        }

        pub fn readiness(mut self, probe: $crate::builder::Probe) -> Self {
            self.$field.readiness = Some(probe);
            self
        }

        /// Shorthand for an HTTP liveness and readiness probe on the first port
        pub fn health_check(mut self, path: impl Into<String>) -> Self {
            let port = self.$field.primary_port().unwrap_or(80);
            let probe = $crate::builder::Probe::http(path, port);
            self.$field.liveness = Some(probe.clone());
            self.$field.readiness = Some(probe.initial_delay(5));
            self
        }

        pub fn companion(mut self, companion: $crate::builder::Companion) -> Self {
            self.$field.companions.push(companion);
            self
        }

        pub fn volume(mut self, volume: $crate::builder::Volume) -> Self {
            self.$field.volumes.push(volume);
            self
        }

        pub fn storage(mut self, storage: $crate::builder::Storage) -> Self {
            self.$field.storage.push(storage);
            self
        }

        /// Start only after `service` is healthy
        pub fn depends_on(mut self, service: impl Into<String>) -> Self {
            self.$field.depends_on.push(service.into());
            self
        }

        /// Declare a runtime connection to `service` without a health requirement
        pub fn connects_to(mut self, service: impl Into<String>) -> Self {
            self.$field.connects_to.push(service.into());
            self
        }

        pub fn metrics(mut self, port: u16, path: impl Into<String>) -> Self {
            self.$field.metrics = Some($crate::builder::Metrics {
                port,
                path: path.into(),
                service_monitor: false,
            });
            self
        }

        /// Also emit a ServiceMonitor for the metrics endpoint
        pub fn service_monitor(mut self) -> Self {
            if let Some(metrics) = &mut self.$field.metrics {
                metrics.service_monitor = true;
            }
            self
        }

        pub fn service_account_name(mut self, name: impl Into<String>) -> Self {
            self.$field.service_account = Some(name.into());
            self
        }

        pub fn node_selector(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
            self.$field.node_selector.insert(key.into(), value.into());
            self
        }

        /// Compose restart policy (`no`, `always`, `on-failure`, `unless-stopped`)
        pub fn restart(mut self, policy: impl Into<String>) -> Self {
            self.$field.restart = Some(policy.into());
            self
        }

        pub fn workload(&self) -> &$crate::builder::Workload {
            &self.$field
        }
    };
}

pub(crate) use workload_setters;

/// Container `env` list from an ordered map
pub(crate) fn env_list(env: &IndexMap<String, String>) -> JsonValue {
    JsonValue::Array(
        env.iter()
            .map(|(k, v)| json!({"name": k, "value": v}))
            .collect(),
    )
}

/// Split `registry:5000/app:1.2` into (`registry:5000/app`, `1.2`)
pub fn split_image(image: &str) -> (String, Option<String>) {
    let image = image.split('@').next().unwrap_or(image);
    let last_slash = image.rfind('/').map(|i| i + 1).unwrap_or(0);
    match image[last_slash..].rfind(':') {
        Some(i) => {
            let split = last_slash + i;
            (image[..split].to_string(), Some(image[split + 1..].to_string()))
        }
        None => (image.to_string(), None),
    }
}
