//! Helm chart renderer
//!
//! A chart is built around the builder's primary workload: its Deployment or
//! StatefulSet, Service, Ingress, autoscaler and service account become
//! parameterized templates driven by `values.yaml`. Every other generated
//! record, and anything passed to [`Chart::add_resource`], is copied into its
//! own template bound to the release namespace.

mod package;
mod templates;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};
use std::path::{Path, PathBuf};

use deckhand_core::{Builder, Resource, Values, Workload, dedup_by_identity};

use crate::error::{RenderError, Result};
use crate::output::{to_yaml, unique_file_names, write_file};

const DEFAULT_APP_VERSION: &str = "1.0.0";

/// A chart dependency as declared in `Chart.yaml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDependency {
    pub name: String,
    pub version: String,
    pub repository: String,
    /// Installed unless the values path named by `condition` is turned on
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

fn default_true() -> bool {
    true
}

impl ChartDependency {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        repository: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            repository: repository.into(),
            enabled: true,
            condition: None,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Values path that toggles this dependency, `{name}.enabled` unless set
    pub fn condition_path(&self) -> String {
        self.condition
            .as_deref()
            .and_then(|c| c.split(',').next())
            .map(|c| c.trim().to_string())
            .unwrap_or_else(|| format!("{}.enabled", self.name))
    }

    fn to_json(&self) -> JsonValue {
        let mut entry = Map::new();
        entry.insert("name".into(), json!(self.name));
        entry.insert("version".into(), json!(self.version));
        entry.insert("repository".into(), json!(self.repository));
        if self.condition.is_some() || !self.enabled {
            entry.insert("condition".into(), json!(self.condition_path()));
        }
        JsonValue::Object(entry)
    }
}

/// Chart metadata and packaging options
#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    name: String,
    version: semver::Version,
    app_version: String,
    description: String,
    dependencies: Vec<ChartDependency>,
    overrides: Values,
    resources: Vec<Resource>,
    notes: Option<String>,
    tests: bool,
    legacy_requirements: bool,
}

impl Chart {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            description: format!("A Helm chart for {name}"),
            name,
            version: semver::Version::new(0, 1, 0),
            app_version: DEFAULT_APP_VERSION.to_string(),
            dependencies: Vec::new(),
            overrides: Values::new(),
            resources: Vec::new(),
            notes: None,
            tests: true,
            legacy_requirements: false,
        }
    }

    /// Chart named after `builder`, with `appVersion` taken from its image tag
    pub fn for_builder(builder: &dyn Builder) -> Self {
        let mut chart = Self::new(builder.name());
        if let Some((_, Some(tag))) = builder.workloads().first().map(|w| w.image_parts()) {
            chart.app_version = tag;
        }
        chart
    }

    /// Set the chart version; must be SemVer 2
    pub fn version(mut self, version: &str) -> Result<Self> {
        self.version =
            semver::Version::parse(version).map_err(|e| RenderError::InvalidChartVersion {
                version: version.to_string(),
                message: e.to_string(),
            })?;
        Ok(self)
    }

    pub fn app_version(mut self, app_version: impl Into<String>) -> Self {
        self.app_version = app_version.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn dependency(mut self, dependency: ChartDependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Override a default value by dotted path (`ingress.enabled`)
    pub fn set(mut self, path: &str, value: JsonValue) -> Result<Self> {
        self.overrides.set(path, value)?;
        Ok(self)
    }

    /// Deep-merge `values` over the defaults
    pub fn values(mut self, values: &Values) -> Self {
        self.overrides.merge(values);
        self
    }

    /// Ship `resource` as an extra template
    pub fn add_resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    /// Replace the generated `NOTES.txt`
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn without_tests(mut self) -> Self {
        self.tests = false;
        self
    }

    /// Declare dependencies in `requirements.yaml` (chart API v1)
    pub fn legacy_requirements(mut self) -> Self {
        self.legacy_requirements = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get_version(&self) -> &semver::Version {
        &self.version
    }

    /// `{name}-{version}.tgz`
    pub fn archive_name(&self) -> String {
        format!("{}-{}.tgz", self.name, self.version)
    }

    /// `Chart.yaml` content
    pub fn manifest(&self) -> JsonValue {
        let mut manifest = Map::new();
        let api_version = if self.legacy_requirements { "v1" } else { "v2" };
        manifest.insert("apiVersion".into(), json!(api_version));
        manifest.insert("name".into(), json!(self.name));
        manifest.insert("description".into(), json!(self.description));
        manifest.insert("type".into(), json!("application"));
        manifest.insert("version".into(), json!(self.version.to_string()));
        manifest.insert("appVersion".into(), json!(self.app_version));
        if !self.dependencies.is_empty() && !self.legacy_requirements {
            manifest.insert("dependencies".into(), self.dependency_list());
        }
        JsonValue::Object(manifest)
    }

    fn dependency_list(&self) -> JsonValue {
        JsonValue::Array(self.dependencies.iter().map(|d| d.to_json()).collect())
    }
}

impl Default for Chart {
    fn default() -> Self {
        Self::new("chart")
    }
}

/// The workload a chart is built around, with the records its templates replace
struct Primary<'a> {
    workload: &'a Workload,
    record: &'a Resource,
    service: Option<&'a Resource>,
    ingress: Option<&'a Resource>,
    autoscaler: Option<&'a Resource>,
    service_account: Option<&'a Resource>,
}

impl<'a> Primary<'a> {
    fn find(builder: &'a dyn Builder, records: &'a [Resource]) -> Option<Self> {
        let workload = builder.workloads().into_iter().next()?;
        let name = workload.name();
        let named = |kind: &str| {
            records
                .iter()
                .find(|r| r.kind() == Some(kind) && r.name() == Some(name))
        };
        let record = named("Deployment").or_else(|| named("StatefulSet"))?;
        let service_account = workload.service_account.as_deref().and_then(|account| {
            records
                .iter()
                .find(|r| r.kind() == Some("ServiceAccount") && r.name() == Some(account))
        });
        Some(Self {
            workload,
            record,
            service: named("Service"),
            ingress: named("Ingress"),
            autoscaler: named("HorizontalPodAutoscaler"),
            service_account,
        })
    }

    fn covers(&self, record: &Resource) -> bool {
        [
            Some(self.record),
            self.service,
            self.ingress,
            self.autoscaler,
            self.service_account,
        ]
        .into_iter()
        .flatten()
        .any(|covered| std::ptr::eq(covered, record))
    }

    fn kind(&self) -> &str {
        self.record.kind().unwrap_or("Deployment")
    }

    fn values(&self) -> JsonValue {
        let workload = self.workload;
        let (repository, tag) = workload.image_parts();

        let mut values = Map::new();
        values.insert(
            "replicaCount".into(),
            self.record.get("spec.replicas").cloned().unwrap_or(json!(1)),
        );
        values.insert(
            "image".into(),
            json!({
                "repository": repository,
                "tag": tag.unwrap_or_default(),
                "pullPolicy": workload.image_pull_policy.as_deref().unwrap_or("IfNotPresent"),
            }),
        );
        values.insert("imagePullSecrets".into(), json!([]));
        values.insert("nameOverride".into(), json!(""));
        values.insert("fullnameOverride".into(), json!(""));
        values.insert(
            "serviceAccount".into(),
            json!({
                "create": self.service_account.is_some(),
                "annotations": {},
                "name": workload.service_account.clone().unwrap_or_default(),
            }),
        );
        values.insert(
            "podAnnotations".into(),
            self.record
                .get("spec.template.metadata.annotations")
                .cloned()
                .unwrap_or(json!({})),
        );
        values.insert("service".into(), self.service_values());
        values.insert("ingress".into(), self.ingress_values());
        values.insert(
            "resources".into(),
            workload
                .resources
                .as_ref()
                .map(|r| r.to_json())
                .unwrap_or(json!({})),
        );
        values.insert("autoscaling".into(), self.autoscaling_values());
        values.insert("nodeSelector".into(), json!(workload.node_selector));
        values.insert("env".into(), json!(workload.env));
        if let Some(probe) = &workload.liveness {
            values.insert("livenessProbe".into(), probe.to_json());
        }
        if let Some(probe) = &workload.readiness {
            values.insert("readinessProbe".into(), probe.to_json());
        }
        JsonValue::Object(values)
    }

    fn service_values(&self) -> JsonValue {
        let first = self.service.and_then(|s| s.get("spec.ports")).and_then(|p| p.get(0));
        let port = first.and_then(|p| p.get("port")).cloned().unwrap_or(json!(80));
        let target_port = first
            .and_then(|p| p.get("targetPort"))
            .cloned()
            .unwrap_or_else(|| port.clone());
        json!({
            "enabled": self.service.is_some(),
            "type": self
                .service
                .and_then(|s| s.get("spec.type"))
                .cloned()
                .unwrap_or(json!("ClusterIP")),
            "headless": self
                .service
                .and_then(|s| s.get("spec.clusterIP"))
                .is_some_and(|ip| ip == "None"),
            "port": port,
            "targetPort": target_port,
            "portName": first.and_then(|p| p.get("name")).cloned().unwrap_or(json!("http")),
        })
    }

    fn ingress_values(&self) -> JsonValue {
        let Some(ingress) = self.ingress else {
            return json!({
                "enabled": false,
                "className": "",
                "annotations": {},
                "hosts": [{
                    "host": "chart-example.local",
                    "paths": [{"path": "/", "pathType": "ImplementationSpecific"}],
                }],
                "tls": [],
            });
        };

        let hosts: Vec<JsonValue> = ingress
            .get("spec.rules")
            .and_then(JsonValue::as_array)
            .map(|rules| {
                rules
                    .iter()
                    .map(|rule| {
                        let paths: Vec<JsonValue> = rule["http"]["paths"]
                            .as_array()
                            .map(|paths| {
                                paths
                                    .iter()
                                    .map(|p| json!({"path": p["path"], "pathType": p["pathType"]}))
                                    .collect()
                            })
                            .unwrap_or_default();
                        json!({"host": rule.get("host").cloned().unwrap_or(json!("")), "paths": paths})
                    })
                    .collect()
            })
            .unwrap_or_default();

        json!({
            "enabled": true,
            "className": ingress.get("spec.ingressClassName").cloned().unwrap_or(json!("")),
            "annotations": ingress.annotations(),
            "hosts": hosts,
            "tls": ingress.get("spec.tls").cloned().unwrap_or(json!([])),
        })
    }

    fn autoscaling_values(&self) -> JsonValue {
        let Some(hpa) = self.autoscaler else {
            return json!({
                "enabled": false,
                "minReplicas": 1,
                "maxReplicas": 100,
                "targetCPUUtilizationPercentage": 80,
            });
        };
        let utilization = |resource: &str| {
            hpa.get("spec.metrics")
                .and_then(JsonValue::as_array)
                .and_then(|metrics| {
                    metrics
                        .iter()
                        .find(|m| m["resource"]["name"] == resource)
                        .map(|m| m["resource"]["target"]["averageUtilization"].clone())
                })
        };
        let mut values = json!({
            "enabled": true,
            "minReplicas": hpa.get("spec.minReplicas").cloned().unwrap_or(json!(1)),
            "maxReplicas": hpa.get("spec.maxReplicas").cloned().unwrap_or(json!(100)),
        });
        if let JsonValue::Object(map) = &mut values {
            if let Some(cpu) = utilization("cpu") {
                map.insert("targetCPUUtilizationPercentage".into(), cpu);
            }
            if let Some(memory) = utilization("memory") {
                map.insert("targetMemoryUtilizationPercentage".into(), memory);
            }
        }
        values
    }
}

/// Renders a builder into a chart directory or archive
#[derive(Debug, Clone, Default)]
pub struct ChartRenderer {
    chart: Chart,
}

impl ChartRenderer {
    pub fn new(chart: Chart) -> Self {
        Self { chart }
    }

    pub fn chart(&self) -> &Chart {
        &self.chart
    }

    /// Final `values.yaml` tree: derived defaults, then overrides, then
    /// disabled dependencies forced off
    pub fn values(&self, builder: &dyn Builder, records: &[Resource]) -> Result<Values> {
        let mut values = match Primary::find(builder, records) {
            Some(primary) => Values(primary.values()),
            None => Values(json!({"nameOverride": "", "fullnameOverride": ""})),
        };
        values.merge(&self.chart.overrides);
        for dependency in self.chart.dependencies.iter().filter(|d| !d.enabled) {
            values.set(&dependency.condition_path(), json!(false))?;
        }
        Ok(values)
    }

    /// Every chart file as `(chart-relative path, content)`, in a stable order
    pub fn files(&self, builder: &dyn Builder, records: &[Resource]) -> Result<Vec<(String, String)>> {
        let chart = &self.chart;
        let name = chart.name.as_str();
        let mut files = vec![
            ("Chart.yaml".to_string(), to_yaml(&chart.manifest())?),
            (
                "values.yaml".to_string(),
                format!(
                    "# Default values for {name}\n{}",
                    to_yaml(self.values(builder, records)?.inner())?
                ),
            ),
            (".helmignore".to_string(), templates::HELMIGNORE.to_string()),
        ];
        if chart.legacy_requirements && !chart.dependencies.is_empty() {
            files.push((
                "requirements.yaml".to_string(),
                to_yaml(&json!({"dependencies": chart.dependency_list()}))?,
            ));
        }

        files.push(("templates/_helpers.tpl".to_string(), templates::helpers(name)));

        let primary = Primary::find(builder, records);
        if let Some(primary) = &primary {
            let workload_file = format!("templates/{}.yaml", primary.kind().to_ascii_lowercase());
            files.push((workload_file, templates::workload(name, primary.record)?));
            files.push(("templates/service.yaml".to_string(), templates::service(name, primary.service)?));
            files.push(("templates/serviceaccount.yaml".to_string(), templates::service_account(name)));
            files.push(("templates/ingress.yaml".to_string(), templates::ingress(name)));
            files.push(("templates/hpa.yaml".to_string(), templates::hpa(name, primary.kind())));
        }

        let extra: Vec<Resource> = records
            .iter()
            .filter(|r| !primary.as_ref().is_some_and(|p| p.covers(r)))
            .cloned()
            .chain(chart.resources.iter().cloned())
            .collect();
        let extra = dedup_by_identity(extra);
        for (record, file_name) in extra.iter().zip(unique_file_names(&extra)) {
            files.push((format!("templates/{file_name}"), templates::resource(record)?));
        }

        let notes = match (&chart.notes, &primary) {
            (Some(custom), _) => templates::notes(name, Some(custom.as_str())),
            (None, Some(_)) => templates::notes(name, None),
            (None, None) => format!("Thank you for installing {{{{ .Chart.Name }}}}.\n"),
        };
        files.push(("templates/NOTES.txt".to_string(), notes));

        if chart.tests && primary.as_ref().is_some_and(|p| p.service.is_some()) {
            files.push((
                "templates/tests/test-connection.yaml".to_string(),
                templates::test_connection(name),
            ));
        }
        Ok(files)
    }

    /// Write the chart into `dir/{name}/`
    pub fn write(&self, builder: &dyn Builder, records: &[Resource], dir: &Path) -> Result<Vec<PathBuf>> {
        let root = dir.join(&self.chart.name);
        let files = self.files(builder, records)?;
        let written = files
            .iter()
            .map(|(path, content)| write_file(&root.join(path), content))
            .collect::<Result<Vec<_>>>()?;
        tracing::info!(chart = %root.display(), files = written.len(), "rendered chart");
        Ok(written)
    }

    /// Write `dir/{name}-{version}.tgz`
    pub fn package(&self, builder: &dyn Builder, records: &[Resource], dir: &Path) -> Result<PathBuf> {
        let files = self.files(builder, records)?;
        package::create_archive(&self.chart.name, &files, &dir.join(self.chart.archive_name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckhand_core::{App, ConfigMap, Secret, StatefulApp};
    use deckhand_core::builder::Storage;

    fn render(chart: Chart, builder: &dyn Builder) -> Vec<(String, String)> {
        let records = builder.generate_kubernetes_resources().unwrap();
        ChartRenderer::new(chart).files(builder, &records).unwrap()
    }

    fn file<'a>(files: &'a [(String, String)], path: &str) -> &'a str {
        files
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, c)| c.as_str())
            .unwrap_or_else(|| panic!("missing {path}"))
    }

    fn paths(files: &[(String, String)]) -> Vec<&str> {
        files.iter().map(|(p, _)| p.as_str()).collect()
    }

    #[test]
    fn test_version_must_be_semver() {
        assert!(Chart::new("web").version("1.2.3-rc.1").is_ok());
        let err = Chart::new("web").version("1.2").unwrap_err();
        assert!(matches!(err, RenderError::InvalidChartVersion { .. }));
    }

    #[test]
    fn test_app_chart_layout() {
        let app = App::new("web")
            .image("nginx:1.21")
            .port(8080)
            .add_config_map(ConfigMap::new("web-settings").add("MODE", "prod"));
        let files = render(Chart::for_builder(&app), &app);
        assert_eq!(
            paths(&files),
            vec![
                "Chart.yaml",
                "values.yaml",
                ".helmignore",
                "templates/_helpers.tpl",
                "templates/deployment.yaml",
                "templates/service.yaml",
                "templates/serviceaccount.yaml",
                "templates/ingress.yaml",
                "templates/hpa.yaml",
                "templates/configmap-web-settings.yaml",
                "templates/NOTES.txt",
                "templates/tests/test-connection.yaml",
            ]
        );

        let manifest: serde_yaml::Value = serde_yaml::from_str(file(&files, "Chart.yaml")).unwrap();
        assert_eq!(manifest["apiVersion"], "v2");
        assert_eq!(manifest["version"], "0.1.0");
        assert_eq!(manifest["appVersion"], "1.21");
    }

    #[test]
    fn test_values_are_derived_from_the_app() {
        let app = App::new("web")
            .image("nginx:1.21")
            .port(8080)
            .replicas(3)
            .env("MODE", "prod")
            .ingress("web.example.com")
            .autoscale(2, 6);
        let records = app.generate_kubernetes_resources().unwrap();
        let values = ChartRenderer::default().values(&app, &records).unwrap();
        assert_eq!(values.get("replicaCount"), Some(&json!(3)));
        assert_eq!(values.get("image.repository"), Some(&json!("nginx")));
        assert_eq!(values.get("image.tag"), Some(&json!("1.21")));
        assert_eq!(values.get("service.port"), Some(&json!(8080)));
        assert_eq!(values.get("env.MODE"), Some(&json!("prod")));
        assert_eq!(values.get("ingress.enabled"), Some(&json!(true)));
        assert_eq!(values.get("ingress.hosts").and_then(|h| h.get(0)).map(|h| &h["host"]), Some(&json!("web.example.com")));
        assert_eq!(values.get("autoscaling.enabled"), Some(&json!(true)));
        assert_eq!(values.get("autoscaling.maxReplicas"), Some(&json!(6)));
    }

    #[test]
    fn test_defaults_without_ingress_or_autoscaling() {
        let app = App::new("web").port(80);
        let records = app.generate_kubernetes_resources().unwrap();
        let values = ChartRenderer::default().values(&app, &records).unwrap();
        assert_eq!(values.get("ingress.enabled"), Some(&json!(false)));
        assert_eq!(values.get("autoscaling.enabled"), Some(&json!(false)));
        assert_eq!(values.get("resources"), Some(&json!({})));
    }

    #[test]
    fn test_service_template_follows_service_values() {
        let worker = App::new("worker").image("worker:1");
        let files = render(Chart::for_builder(&worker), &worker);
        let service = file(&files, "templates/service.yaml");
        assert!(service.starts_with("{{- if .Values.service.enabled -}}"));
        assert!(service.trim_end().ends_with("{{- end }}"));
        assert!(!paths(&files).contains(&"templates/tests/test-connection.yaml"));

        let records = worker.generate_kubernetes_resources().unwrap();
        let values = ChartRenderer::default().values(&worker, &records).unwrap();
        assert_eq!(values.get("service.enabled"), Some(&json!(false)));

        let web = App::new("web").image("nginx").port(8080);
        let records = web.generate_kubernetes_resources().unwrap();
        let values = ChartRenderer::default().values(&web, &records).unwrap();
        assert_eq!(values.get("service.enabled"), Some(&json!(true)));
    }

    #[test]
    fn test_overrides_and_disabled_dependencies() {
        let app = App::new("web").port(80);
        let chart = Chart::new("web")
            .set("ingress.enabled", json!(true))
            .unwrap()
            .dependency(ChartDependency::new("redis", "18.0.0", "https://charts.bitnami.com/bitnami").disabled())
            .dependency(
                ChartDependency::new("postgresql", "13.0.0", "https://charts.bitnami.com/bitnami")
                    .disabled()
                    .condition("database.enabled"),
            );
        let records = app.generate_kubernetes_resources().unwrap();
        let renderer = ChartRenderer::new(chart);
        let values = renderer.values(&app, &records).unwrap();
        assert_eq!(values.get("ingress.enabled"), Some(&json!(true)));
        assert_eq!(values.get("redis.enabled"), Some(&json!(false)));
        assert_eq!(values.get("database.enabled"), Some(&json!(false)));

        let manifest = renderer.chart().manifest();
        assert_eq!(manifest["dependencies"][0]["condition"], "redis.enabled");
        assert_eq!(manifest["dependencies"][1]["condition"], "database.enabled");
    }

    #[test]
    fn test_legacy_requirements() {
        let app = App::new("web").port(80);
        let chart = Chart::new("web")
            .legacy_requirements()
            .dependency(ChartDependency::new("redis", "18.0.0", "https://charts.bitnami.com/bitnami"));
        let files = render(chart, &app);
        assert!(paths(&files).contains(&"requirements.yaml"));
        assert!(!file(&files, "Chart.yaml").contains("dependencies"));
    }

    #[test]
    fn test_stateful_chart_uses_statefulset_template() {
        let db = StatefulApp::new("db")
            .image("postgres:16")
            .port(5432)
            .storage(Storage::new("data", "/var/lib/postgresql/data", "10Gi"));
        let files = render(Chart::for_builder(&db), &db);
        assert!(paths(&files).contains(&"templates/statefulset.yaml"));
        assert!(file(&files, "templates/hpa.yaml").contains("kind: StatefulSet"));

        let records = db.generate_kubernetes_resources().unwrap();
        let values = ChartRenderer::default().values(&db, &records).unwrap();
        assert_eq!(values.get("service.headless"), Some(&json!(true)));
    }

    #[test]
    fn test_chart_without_workload_copies_records() {
        let secret = Secret::new("api-token").add("TOKEN", "t");
        let chart = Chart::for_builder(&secret)
            .add_resource(Resource::with_type("v1", "ConfigMap", "extra"));
        let files = render(chart, &secret);
        assert_eq!(
            paths(&files),
            vec![
                "Chart.yaml",
                "values.yaml",
                ".helmignore",
                "templates/_helpers.tpl",
                "templates/secret-api-token.yaml",
                "templates/configmap-extra.yaml",
                "templates/NOTES.txt",
            ]
        );
    }

    #[test]
    fn test_custom_notes_and_no_tests() {
        let app = App::new("web").port(80);
        let files = render(Chart::new("web").notes("Deployed.").without_tests(), &app);
        assert_eq!(file(&files, "templates/NOTES.txt"), "Deployed.\n");
        assert!(!paths(&files).contains(&"templates/tests/test-connection.yaml"));
    }
}
