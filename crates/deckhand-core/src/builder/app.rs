//! Stateless application: a Deployment plus everything attached to it

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};
use std::collections::BTreeMap;

use super::ingress::Ingress;
use super::job::{CronJob, Job};
use super::meta::meta_setters;
use super::rbac::ServiceAccount;
use super::scaling::Scaling;
use super::service::{ServicePort, ServiceType};
use super::workload::{StorageMode, Workload, workload_setters};
use super::{Builder, OutputFormat, tagged_definition};
use crate::error::Result;
use crate::labels;
use crate::resource::Resource;

/// A stateless workload
///
/// Emits a Deployment, then a Service when ports are configured (or
/// [`App::expose`] was called), then one record per attached Ingress,
/// ConfigMap, Secret, storage claim, Job and CronJob. A
/// HorizontalPodAutoscaler follows only when autoscaling is enabled.
///
/// The Service carries the App's own name.
///
/// ```
/// use deckhand_core::builder::{App, Builder};
///
/// let app = App::new("web").image("nginx:1.21").port(8080).replicas(3);
/// let resources = app.generate_kubernetes_resources().unwrap();
/// assert_eq!(resources.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct App {
    #[serde(flatten)]
    workload: Workload,

    #[serde(default)]
    scaling: Scaling,

    #[serde(default)]
    expose: bool,

    #[serde(default)]
    service_type: ServiceType,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    ingresses: Vec<Ingress>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    jobs: Vec<Job>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    cron_jobs: Vec<CronJob>,

    /// Created alongside the Deployment and used as its pod identity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    managed_service_account: Option<ServiceAccount>,
}

impl App {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            workload: Workload::new(name),
            scaling: Scaling::default(),
            expose: false,
            service_type: ServiceType::ClusterIP,
            ingresses: Vec::new(),
            jobs: Vec::new(),
            cron_jobs: Vec::new(),
            managed_service_account: None,
        }
    }

    meta_setters!(workload.meta);
    workload_setters!(workload);

    pub fn replicas(mut self, replicas: u32) -> Self {
        self.scaling.replicas = replicas;
        self
    }

    pub fn scaling(mut self, scaling: Scaling) -> Self {
        self.scaling = scaling;
        self
    }

    /// Shorthand for horizontal autoscaling between `min` and `max` replicas
    pub fn autoscale(mut self, min: u32, max: u32) -> Self {
        self.scaling = self.scaling.horizontal(min, max);
        self
    }

    /// Emit a Service even without declared ports
    pub fn expose(mut self) -> Self {
        self.expose = true;
        self
    }

    pub fn service_type(mut self, service_type: ServiceType) -> Self {
        self.service_type = service_type;
        self.expose = true;
        self
    }

    pub fn add_ingress(mut self, ingress: Ingress) -> Self {
        self.ingresses.push(ingress);
        self
    }

    /// Route `host` to this App's Service through an Ingress named after the App
    pub fn ingress(self, host: impl Into<String>) -> Self {
        let ingress = Ingress::new(self.workload.name())
            .namespace(self.workload.meta.namespace.clone())
            .host(host);
        self.add_ingress(ingress)
    }

    pub fn add_job(mut self, job: Job) -> Self {
        self.jobs.push(job);
        self
    }

    pub fn add_cron_job(mut self, cron_job: CronJob) -> Self {
        self.cron_jobs.push(cron_job);
        self
    }

    /// Create `account` and run the pods under it
    pub fn with_service_account(mut self, account: ServiceAccount) -> Self {
        self.workload.service_account = Some(account.meta().name().to_string());
        self.managed_service_account = Some(account);
        self
    }

    pub fn get_scaling(&self) -> &Scaling {
        &self.scaling
    }

    pub fn ingresses(&self) -> &[Ingress] {
        &self.ingresses
    }

    fn has_service(&self) -> bool {
        self.expose || !self.workload.ports.is_empty() || self.service_monitor_port().is_some()
    }

    fn service_monitor_port(&self) -> Option<u16> {
        self.workload
            .metrics
            .as_ref()
            .filter(|m| m.service_monitor)
            .map(|m| m.port)
    }

    /// Port an attached Ingress without an explicit backend routes to
    fn backend_port(&self) -> u16 {
        self.service_ports().first().map(|p| p.port).unwrap_or(80)
    }

    fn service_ports(&self) -> Vec<ServicePort> {
        let mut ports: Vec<ServicePort> = self
            .workload
            .ports
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let mut port = ServicePort::new(p.container, p.container);
                port.name = Some(p.name_or(i));
                port.protocol = p.protocol;
                port
            })
            .collect();
        if let Some(metrics) = self.service_monitor_port() {
            if !ports.iter().any(|p| p.target_port == metrics) {
                let mut port = ServicePort::new(metrics, metrics);
                port.name = Some("metrics".into());
                ports.push(port);
            }
        }
        if ports.is_empty() {
            let mut port = ServicePort::new(80, 80);
            port.name = Some("http".into());
            ports.push(port);
        }
        ports
    }

    fn deployment(&self) -> Result<Resource> {
        let meta = &self.workload.meta;
        let mut annotations = BTreeMap::new();
        if let Some(checksum) = self.workload.config_checksum()? {
            annotations.insert(labels::CONFIG_CHECKSUM.to_string(), checksum);
        }

        let mut spec = Map::new();
        spec.insert("replicas".into(), json!(self.scaling.replicas));
        spec.insert(
            "selector".into(),
            json!({"matchLabels": super::meta::string_map(&meta.selector())}),
        );
        spec.insert(
            "template".into(),
            self.workload.pod_template(StorageMode::Claims, &annotations),
        );

        Ok(Resource::new(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": meta.to_json(true),
            "spec": spec,
        })))
    }

    fn service(&self) -> Resource {
        let meta = &self.workload.meta;
        let ports: Vec<JsonValue> = self
            .service_ports()
            .iter()
            .map(|p| {
                json!({
                    "name": p.name,
                    "port": p.port,
                    "targetPort": p.target_port,
                    "protocol": p.protocol.as_str(),
                })
            })
            .collect();

        let mut spec = Map::new();
        match self.service_type {
            ServiceType::Headless => {
                spec.insert("clusterIP".into(), json!("None"));
            }
            other => {
                spec.insert("type".into(), json!(service_type_name(other)));
            }
        }
        spec.insert(
            "selector".into(),
            super::meta::string_map(&meta.selector()),
        );
        spec.insert("ports".into(), JsonValue::Array(ports));

        Resource::new(json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": meta.to_json(true),
            "spec": spec,
        }))
    }

    fn storage_claims(&self) -> Vec<Resource> {
        let meta = &self.workload.meta;
        self.workload
            .storage
            .iter()
            .map(|storage| {
                Resource::new(json!({
                    "apiVersion": "v1",
                    "kind": "PersistentVolumeClaim",
                    "metadata": meta.to_json_named(&self.workload.claim_name(storage), true),
                    "spec": storage.claim_spec(),
                }))
            })
            .collect()
    }

    fn service_monitor_record(&self) -> Option<Resource> {
        let metrics = self.workload.metrics.as_ref().filter(|m| m.service_monitor)?;
        let meta = &self.workload.meta;
        Some(Resource::new(json!({
            "apiVersion": "monitoring.coreos.com/v1",
            "kind": "ServiceMonitor",
            "metadata": meta.to_json(true),
            "spec": {
                "selector": {"matchLabels": super::meta::string_map(&meta.selector())},
                "endpoints": [{
                    "targetPort": metrics.port,
                    "path": metrics.path,
                }],
            },
        })))
    }
}

fn service_type_name(service_type: ServiceType) -> &'static str {
    match service_type {
        ServiceType::ClusterIP | ServiceType::Headless => "ClusterIP",
        ServiceType::NodePort => "NodePort",
        ServiceType::LoadBalancer => "LoadBalancer",
    }
}

impl Builder for App {
    fn type_name(&self) -> &'static str {
        "App"
    }

    fn name(&self) -> &str {
        self.workload.name()
    }

    fn namespace(&self) -> &str {
        &self.workload.meta.namespace
    }

    fn generate_kubernetes_resources(&self) -> Result<Vec<Resource>> {
        let mut resources = vec![self.deployment()?];

        if self.has_service() {
            resources.push(self.service());
        }

        let mut nested = Vec::new();
        for ingress in &self.ingresses {
            let ingress = ingress.with_default_backend(self.workload.name(), self.backend_port());
            nested.extend(ingress.generate_kubernetes_resources()?);
        }
        resources.extend(self.workload.adopt(nested));

        resources.extend(self.workload.config_resources()?);
        resources.extend(self.storage_claims());

        let mut nested = Vec::new();
        for job in &self.jobs {
            nested.extend(job.generate_kubernetes_resources()?);
        }
        for cron_job in &self.cron_jobs {
            nested.extend(cron_job.generate_kubernetes_resources()?);
        }
        if let Some(account) = &self.managed_service_account {
            nested.extend(account.generate_kubernetes_resources()?);
        }
        resources.extend(self.workload.adopt(nested));
        if let Some(hpa) = self.scaling.autoscaler(&self.workload.meta) {
            resources.push(hpa);
        }
        if let Some(monitor) = self.service_monitor_record() {
            resources.push(monitor);
        }

        Ok(resources)
    }

    fn validate(&self) -> Vec<String> {
        let mut problems = self.workload.validate("App");
        problems.extend(self.scaling.problems(self.workload.name()));
        if self.scaling.replicas == 0 && !self.scaling.is_autoscaled() {
            problems.push(format!(
                "App '{}' has 0 replicas and will not run",
                self.workload.name()
            ));
        }
        for ingress in &self.ingresses {
            let ingress = ingress.with_default_backend(self.workload.name(), self.backend_port());
            problems.extend(ingress.validate());
        }
        for job in &self.jobs {
            problems.extend(job.validate());
        }
        for cron_job in &self.cron_jobs {
            problems.extend(cron_job.validate());
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
                if !self.ingresses.is_empty() {
                    notes.push(format!(
                        "App '{name}': ingress rules have no compose equivalent; ports are published instead"
                    ));
                }
                if self.scaling.is_autoscaled() {
                    notes.push(format!(
                        "App '{name}': autoscaling is ignored by compose"
                    ));
                }
                if !self.jobs.is_empty() || !self.cron_jobs.is_empty() {
                    notes.push(format!("App '{name}': jobs are ignored by compose"));
                }
                if !self.workload.node_selector.is_empty() {
                    notes.push(format!("App '{name}': node selector is ignored by compose"));
                }
                if self.managed_service_account.is_some() {
                    notes.push(format!("App '{name}': service account is ignored by compose"));
                }
            }
            _ => {
                if self.workload.build.is_some() {
                    notes.push(format!(
                        "App '{name}': build context is only used by compose; image {} is deployed",
                        self.workload.image_or_default()
                    ));
                }
                if self.workload.restart.is_some() {
                    notes.push(format!(
                        "App '{name}': restart policy is only used by compose"
                    ));
                }
                if !self.workload.depends_on.is_empty() {
                    notes.push(format!(
                        "App '{name}': startup ordering is only enforced by compose"
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
