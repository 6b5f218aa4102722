//! Docker Compose renderer
//!
//! Works from the builder's workloads rather than the generated records: build
//! contexts, host port mappings and health checks have no Kubernetes record
//! equivalent.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};
use std::path::{Path, PathBuf};

use deckhand_core::builder::{Companion, ProbeAction, VolumeSource};
use deckhand_core::names::{sanitize_filename, to_env_name};
use deckhand_core::{Builder, CoreError, OutputFormat, Workload};

use crate::error::{RenderError, Result};
use crate::output::{to_yaml, write_file};

/// Main compose file name
pub const COMPOSE_FILE: &str = "docker-compose.yml";

/// Environment-specific override documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComposeOverride {
    /// Source bind mounts for hot reload and debug environment variables
    Development,
    /// `restart: always` and bounded json-file logging
    Production,
}

impl ComposeOverride {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }

    pub fn file_name(&self) -> String {
        format!("docker-compose.{}.yml", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeOptions {
    /// Value of the top-level `version` key
    pub version: String,
    /// Write a `.env` file with every service's environment
    pub env_file: bool,
    pub overrides: Vec<ComposeOverride>,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            version: "3.8".to_string(),
            env_file: false,
            overrides: Vec::new(),
        }
    }
}

/// A rendered compose project, before anything is written
#[derive(Debug, Clone)]
pub struct ComposeProject {
    pub name: String,
    pub document: JsonValue,
    /// Flattened environment of every service, first occurrence wins
    pub env: IndexMap<String, String>,
    /// Files backing config/secret bind mounts, relative to the compose file
    pub files: Vec<(String, Vec<u8>)>,
    services: Vec<ServiceInfo>,
}

#[derive(Debug, Clone)]
struct ServiceInfo {
    name: String,
    build_context: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ComposeRenderer {
    options: ComposeOptions,
}

impl ComposeRenderer {
    pub fn new(options: ComposeOptions) -> Self {
        Self { options }
    }

    /// Translate every workload of `builder` into a compose project
    pub fn project(&self, builder: &dyn Builder) -> Result<ComposeProject> {
        let workloads = builder.workloads();
        if workloads.is_empty() {
            return Err(RenderError::Unsupported {
                type_name: builder.type_name().to_string(),
                name: builder.name().to_string(),
                format: OutputFormat::Compose,
            });
        }

        let network = sanitize_filename(builder.name());
        let mut services = Map::new();
        let mut volumes = Map::new();
        let mut env = IndexMap::new();
        let mut files = Vec::new();
        let mut infos = Vec::new();

        for workload in workloads {
            let service = ServiceBuilder::new(workload, &network).build(&mut volumes, &mut files)?;
            if let Some(environment) = service.get("environment").and_then(JsonValue::as_object) {
                for (key, value) in environment {
                    if let Some(value) = value.as_str() {
                        env.entry(key.clone()).or_insert_with(|| value.to_string());
                    }
                }
            }
            for companion in &workload.companions {
                let name = format!("{}-{}", workload.name(), companion.name);
                services.insert(name, companion_service(workload.name(), companion, &network));
            }
            infos.push(ServiceInfo {
                name: workload.name().to_string(),
                build_context: workload.build.as_ref().map(|b| b.context.clone()),
            });
            services.insert(workload.name().to_string(), service);
        }

        let mut document = Map::new();
        document.insert("version".into(), json!(self.options.version));
        document.insert("services".into(), JsonValue::Object(services));
        if !volumes.is_empty() {
            document.insert("volumes".into(), JsonValue::Object(volumes));
        }
        document.insert(
            "networks".into(),
            json!({ network.clone(): {"driver": "bridge"} }),
        );

        Ok(ComposeProject {
            name: builder.name().to_string(),
            document: JsonValue::Object(document),
            env,
            files,
            services: infos,
        })
    }

    /// The main compose document as YAML
    pub fn render(&self, builder: &dyn Builder) -> Result<String> {
        to_yaml(&self.project(builder)?.document)
    }

    /// Override document for one environment
    pub fn override_document(&self, project: &ComposeProject, kind: ComposeOverride) -> JsonValue {
        let mut services = Map::new();
        for service in &project.services {
            let entry = match kind {
                ComposeOverride::Development => {
                    let mut entry = json!({
                        "environment": {"DEBUG": "true", "LOG_LEVEL": "debug"},
                    });
                    if let (Some(context), JsonValue::Object(map)) =
                        (&service.build_context, &mut entry)
                    {
                        map.insert("volumes".into(), json!([format!("{context}:/app")]));
                    }
                    entry
                }
                ComposeOverride::Production => json!({
                    "restart": "always",
                    "logging": {
                        "driver": "json-file",
                        "options": {"max-size": "10m", "max-file": "3"},
                    },
                }),
            };
            services.insert(service.name.clone(), entry);
        }
        json!({
            "version": self.options.version,
            "services": services,
        })
    }

    /// Write the compose file, bind-mounted config files, `.env` and overrides into `dir`
    pub fn write(&self, builder: &dyn Builder, dir: &Path) -> Result<Vec<PathBuf>> {
        let project = self.project(builder)?;
        let mut written = vec![write_file(&dir.join(COMPOSE_FILE), to_yaml(&project.document)?)?];

        for (relative, content) in &project.files {
            written.push(write_file(&dir.join(relative), content)?);
        }

        if self.options.env_file {
            let mut content = format!("# Environment for {}\n", project.name);
            for (key, value) in &project.env {
                content.push_str(&format!("{key}={}\n", quote_env(value)));
            }
            written.push(write_file(&dir.join(".env"), content)?);
        }

        for kind in &self.options.overrides {
            let document = self.override_document(&project, *kind);
            written.push(write_file(&dir.join(kind.file_name()), to_yaml(&document)?)?);
        }

        tracing::info!(
            dir = %dir.display(),
            services = project.services.len(),
            "rendered compose project"
        );
        Ok(written)
    }
}

struct ServiceBuilder<'a> {
    workload: &'a Workload,
    network: &'a str,
}

impl<'a> ServiceBuilder<'a> {
    fn new(workload: &'a Workload, network: &'a str) -> Self {
        Self { workload, network }
    }

    fn build(
        &self,
        volumes: &mut Map<String, JsonValue>,
        files: &mut Vec<(String, Vec<u8>)>,
    ) -> Result<JsonValue> {
        let workload = self.workload;
        let mut service = Map::new();

        match &workload.build {
            Some(build) => {
                let mut stanza = Map::new();
                stanza.insert("context".into(), json!(build.context));
                if let Some(dockerfile) = &build.dockerfile {
                    stanza.insert("dockerfile".into(), json!(dockerfile));
                }
                if !build.args.is_empty() {
                    stanza.insert("args".into(), json!(build.args));
                }
                service.insert("build".into(), JsonValue::Object(stanza));
            }
            None => {
                service.insert("image".into(), json!(workload.image_or_default()));
            }
        }
        if let Some(policy) = workload.image_pull_policy.as_deref().and_then(pull_policy) {
            service.insert("pull_policy".into(), json!(policy));
        }
        if !workload.command.is_empty() {
            service.insert("entrypoint".into(), json!(workload.command));
        }
        if !workload.args.is_empty() {
            service.insert("command".into(), json!(workload.args));
        }
        if !workload.ports.is_empty() {
            let ports: Vec<String> = workload.ports.iter().map(|p| p.compose_mapping()).collect();
            service.insert("ports".into(), json!(ports));
        }

        let environment = self.environment()?;
        if !environment.is_empty() {
            service.insert("environment".into(), json!(environment));
        }

        let mounts = self.mounts(volumes, files)?;
        if !mounts.is_empty() {
            service.insert("volumes".into(), json!(mounts));
        }

        if let Some(healthcheck) = healthcheck(workload) {
            service.insert("healthcheck".into(), healthcheck);
        }

        let depends_on = depends_on(workload);
        if !depends_on.is_empty() {
            service.insert("depends_on".into(), JsonValue::Object(depends_on));
        }

        if let Some(deploy) = deploy(workload) {
            service.insert("deploy".into(), deploy);
        }

        service.insert(
            "restart".into(),
            json!(workload.restart.as_deref().unwrap_or("unless-stopped")),
        );
        service.insert("networks".into(), json!([self.network]));
        Ok(JsonValue::Object(service))
    }

    /// Direct env, then `{SECRET}_{KEY}` per Secret key, then `{CONFIGMAP}_{KEY}`
    fn environment(&self) -> Result<IndexMap<String, String>> {
        let mut environment = self.workload.env.clone();
        for secret in &self.workload.secrets {
            let data = secret.resolve().map_err(CoreError::from)?;
            let prefix = to_env_name(secret.name());
            for (key, value) in data.text {
                environment.insert(format!("{prefix}_{}", to_env_name(&key)), value);
            }
        }
        for config_map in &self.workload.config_maps {
            let data = config_map.resolve().map_err(CoreError::from)?;
            let prefix = to_env_name(config_map.name());
            for (key, value) in data.text {
                environment.insert(format!("{prefix}_{}", to_env_name(&key)), value);
            }
        }
        Ok(environment)
    }

    fn mounts(
        &self,
        volumes: &mut Map<String, JsonValue>,
        files: &mut Vec<(String, Vec<u8>)>,
    ) -> Result<Vec<String>> {
        let workload = self.workload;
        let mut mounts = Vec::new();

        for storage in &workload.storage {
            let volume = format!("{}-{}", workload.name(), storage.name);
            mounts.push(format!("{volume}:{}", storage.mount_path));
            volumes.insert(volume, json!({}));
        }

        for volume in &workload.volumes {
            let suffix = if volume.read_only { ":ro" } else { "" };
            match &volume.source {
                VolumeSource::EmptyDir => mounts.push(volume.mount_path.clone()),
                VolumeSource::HostPath { path } => {
                    mounts.push(format!("{path}:{}{suffix}", volume.mount_path))
                }
                VolumeSource::Claim { claim } => {
                    mounts.push(format!("{claim}:{}{suffix}", volume.mount_path));
                    volumes.insert(claim.clone(), json!({}));
                }
            }
        }

        for config_map in &workload.config_maps {
            if let Some(mount_path) = config_map.get_mount_path() {
                let dir = format!("config/{}", sanitize_filename(config_map.name()));
                let data = config_map.resolve().map_err(CoreError::from)?;
                push_files(files, &dir, data.text, data.binary);
                mounts.push(format!("./{dir}:{mount_path}:ro"));
            }
        }
        for secret in &workload.secrets {
            if let Some(mount_path) = secret.get_mount_path() {
                let dir = format!("secrets/{}", sanitize_filename(secret.name()));
                let data = secret.resolve().map_err(CoreError::from)?;
                push_files(files, &dir, data.text, data.binary);
                mounts.push(format!("./{dir}:{mount_path}:ro"));
            }
        }
        Ok(mounts)
    }
}

fn push_files(
    files: &mut Vec<(String, Vec<u8>)>,
    dir: &str,
    text: std::collections::BTreeMap<String, String>,
    binary: std::collections::BTreeMap<String, Vec<u8>>,
) {
    for (key, value) in text {
        files.push((format!("{dir}/{}", sanitize_filename(&key)), value.into_bytes()));
    }
    for (key, value) in binary {
        files.push((format!("{dir}/{}", sanitize_filename(&key)), value));
    }
}

/// Explicit HTTP/exec probe, else an HTTP check on the first port at `/health`
fn healthcheck(workload: &Workload) -> Option<JsonValue> {
    let probe = [&workload.liveness, &workload.readiness]
        .into_iter()
        .flatten()
        .find(|p| matches!(p.action, ProbeAction::Http { .. } | ProbeAction::Exec { .. }));

    if let Some(probe) = probe {
        let test = match &probe.action {
            ProbeAction::Http { path, port } => curl_test(*port, path),
            ProbeAction::Exec { command } => {
                let mut test = vec!["CMD".to_string()];
                test.extend(command.iter().cloned());
                test
            }
            ProbeAction::Tcp { .. } => return None,
        };
        return Some(json!({
            "test": test,
            "interval": format!("{}s", probe.period),
            "timeout": format!("{}s", probe.timeout),
            "retries": probe.failure_threshold,
            "start_period": format!("{}s", probe.initial_delay),
        }));
    }

    workload.primary_port().map(|port| {
        json!({
            "test": curl_test(port, "/health"),
            "interval": "30s",
            "timeout": "10s",
            "retries": 3,
        })
    })
}

fn curl_test(port: u16, path: &str) -> Vec<String> {
    vec![
        "CMD".to_string(),
        "curl".to_string(),
        "-f".to_string(),
        format!("http://localhost:{port}{path}"),
    ]
}

/// `dependsOn` waits for health, `connectsTo` only for start, init companions for completion
fn depends_on(workload: &Workload) -> Map<String, JsonValue> {
    let mut depends = Map::new();
    for service in &workload.depends_on {
        depends.insert(service.clone(), json!({"condition": "service_healthy"}));
    }
    for service in &workload.connects_to {
        depends
            .entry(service.clone())
            .or_insert_with(|| json!({"condition": "service_started"}));
    }
    for companion in workload.companions.iter().filter(|c| c.init) {
        depends.insert(
            format!("{}-{}", workload.name(), companion.name),
            json!({"condition": "service_completed_successfully"}),
        );
    }
    depends
}

fn deploy(workload: &Workload) -> Option<JsonValue> {
    let resources = workload.resources.as_ref()?;
    let mut stanza = Map::new();

    let mut limits = Map::new();
    if let Some(cpu) = &resources.cpu_limit {
        limits.insert("cpus".into(), json!(compose_cpus(cpu)));
    }
    if let Some(memory) = &resources.memory_limit {
        limits.insert("memory".into(), json!(compose_memory(memory)));
    }
    let mut reservations = Map::new();
    if let Some(cpu) = &resources.cpu_request {
        reservations.insert("cpus".into(), json!(compose_cpus(cpu)));
    }
    if let Some(memory) = &resources.memory_request {
        reservations.insert("memory".into(), json!(compose_memory(memory)));
    }

    if !limits.is_empty() {
        stanza.insert("limits".into(), JsonValue::Object(limits));
    }
    if !reservations.is_empty() {
        stanza.insert("reservations".into(), JsonValue::Object(reservations));
    }
    if stanza.is_empty() {
        return None;
    }
    Some(json!({"resources": stanza}))
}

fn companion_service(owner: &str, companion: &Companion, network: &str) -> JsonValue {
    let mut service = Map::new();
    service.insert("image".into(), json!(companion.image));
    if !companion.command.is_empty() {
        service.insert("entrypoint".into(), json!(companion.command));
    }
    if !companion.args.is_empty() {
        service.insert("command".into(), json!(companion.args));
    }
    if !companion.ports.is_empty() {
        let ports: Vec<String> = companion.ports.iter().map(|p| format!("{p}:{p}")).collect();
        service.insert("ports".into(), json!(ports));
    }
    if !companion.env.is_empty() {
        service.insert("environment".into(), json!(companion.env));
    }
    if companion.init {
        service.insert("restart".into(), json!("no"));
    } else {
        service.insert(
            "depends_on".into(),
            json!({ owner: {"condition": "service_started"} }),
        );
        service.insert("restart".into(), json!("unless-stopped"));
    }
    service.insert("networks".into(), json!([network]));
    JsonValue::Object(service)
}

/// Kubernetes pull policy to compose `pull_policy`
fn pull_policy(policy: &str) -> Option<&'static str> {
    match policy {
        "Always" => Some("always"),
        "IfNotPresent" => Some("missing"),
        "Never" => Some("never"),
        _ => None,
    }
}

/// `500m` -> `0.5`; whole or decimal cores pass through
pub fn compose_cpus(quantity: &str) -> String {
    match quantity.strip_suffix('m').and_then(|m| m.parse::<f64>().ok()) {
        Some(millis) => format!("{}", millis / 1000.0),
        None => quantity.to_string(),
    }
}

/// `512Mi` -> `512M`, `1Gi` -> `1G`
pub fn compose_memory(quantity: &str) -> String {
    quantity.strip_suffix('i').unwrap_or(quantity).to_string()
}

fn quote_env(value: &str) -> String {
    if value.chars().any(|c| c.is_whitespace() || c == '#' || c == '"') {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckhand_core::builder::{Probe, ResourceRequirements, Storage};
    use deckhand_core::{App, AppGroup, ConfigMap, Secret, StatefulApp};
    use tempfile::TempDir;

    fn service<'a>(project: &'a ComposeProject, name: &str) -> &'a JsonValue {
        &project.document["services"][name]
    }

    #[test]
    fn test_port_mapping() {
        let renderer = ComposeRenderer::default();

        let same = renderer.project(&App::new("web").port(8080)).unwrap();
        assert_eq!(service(&same, "web")["ports"], json!(["8080:8080"]));

        let mapped = renderer
            .project(&App::new("web").port_mapping(8080, 80))
            .unwrap();
        assert_eq!(service(&mapped, "web")["ports"], json!(["8080:80"]));
    }

    #[test]
    fn test_build_replaces_image() {
        let renderer = ComposeRenderer::default();
        let built = renderer
            .project(&App::new("api").build("./api").dockerfile("Dockerfile.dev"))
            .unwrap();
        let api = service(&built, "api");
        assert_eq!(api["build"]["context"], "./api");
        assert_eq!(api["build"]["dockerfile"], "Dockerfile.dev");
        assert!(api.get("image").is_none());

        let plain = renderer.project(&App::new("cache")).unwrap();
        assert_eq!(service(&plain, "cache")["image"], "nginx:latest");
    }

    #[test]
    fn test_environment_merge_order() {
        let app = App::new("api")
            .image("api:1")
            .env("MODE", "prod")
            .add_secret(Secret::new("db-creds").add("password", "pw"))
            .add_config_map(ConfigMap::new("api-settings").add("log.level", "info"));
        let project = ComposeRenderer::default().project(&app).unwrap();
        let keys: Vec<_> = service(&project, "api")["environment"]
            .as_object()
            .unwrap()
            .keys()
            .cloned()
            .collect();
        assert_eq!(keys, vec!["MODE", "DB_CREDS_PASSWORD", "API_SETTINGS_LOG_LEVEL"]);
        assert_eq!(project.env["DB_CREDS_PASSWORD"], "pw");
    }

    #[test]
    fn test_healthcheck_prefers_explicit_probe() {
        let renderer = ComposeRenderer::default();

        let explicit = renderer
            .project(&App::new("web").port(8080).liveness(Probe::exec(["pg_isready"])))
            .unwrap();
        assert_eq!(
            service(&explicit, "web")["healthcheck"]["test"],
            json!(["CMD", "pg_isready"])
        );

        let synthesized = renderer.project(&App::new("web").port(8080)).unwrap();
        assert_eq!(
            service(&synthesized, "web")["healthcheck"]["test"],
            json!(["CMD", "curl", "-f", "http://localhost:8080/health"])
        );

        let none = renderer.project(&App::new("worker")).unwrap();
        assert!(service(&none, "worker").get("healthcheck").is_none());
    }

    #[test]
    fn test_depends_on_conditions() {
        let app = App::new("api")
            .depends_on("db")
            .connects_to("cache")
            .connects_to("db");
        let project = ComposeRenderer::default().project(&app).unwrap();
        let depends = &service(&project, "api")["depends_on"];
        assert_eq!(depends["db"]["condition"], "service_healthy");
        assert_eq!(depends["cache"]["condition"], "service_started");
    }

    #[test]
    fn test_storage_and_mounted_config() {
        let db = StatefulApp::new("db")
            .image("postgres:16")
            .storage(Storage::new("data", "/var/lib/postgresql/data", "10Gi"))
            .add_config_map(
                ConfigMap::new("db-config")
                    .add("postgresql.conf", "max_connections = 100")
                    .mount_path("/etc/postgresql"),
            );
        let project = ComposeRenderer::default().project(&db).unwrap();
        let volumes = service(&project, "db")["volumes"].as_array().unwrap();
        assert_eq!(volumes[0], "db-data:/var/lib/postgresql/data");
        assert_eq!(volumes[1], "./config/db-config:/etc/postgresql:ro");
        assert!(project.document["volumes"].get("db-data").is_some());
        assert_eq!(project.files[0].0, "config/db-config/postgresql.conf");
    }

    #[test]
    fn test_resource_limits() {
        let app = App::new("api")
            .resources(ResourceRequirements::requests("250m", "128Mi").limits("1", "512Mi"));
        let project = ComposeRenderer::default().project(&app).unwrap();
        let resources = &service(&project, "api")["deploy"]["resources"];
        assert_eq!(resources["limits"]["cpus"], "1");
        assert_eq!(resources["limits"]["memory"], "512M");
        assert_eq!(resources["reservations"]["cpus"], "0.25");
    }

    #[test]
    fn test_group_renders_one_service_per_workload() {
        let group = AppGroup::new("shop")
            .add(App::new("web").port(80))
            .add(App::new("api").port(8080))
            .add(ConfigMap::new("shared").add("a", "b"));
        let project = ComposeRenderer::default().project(&group).unwrap();
        let names: Vec<_> = project.document["services"]
            .as_object()
            .unwrap()
            .keys()
            .cloned()
            .collect();
        assert_eq!(names, vec!["web", "api"]);
        assert_eq!(project.document["networks"]["shop"]["driver"], "bridge");
    }

    #[test]
    fn test_builder_without_workloads_is_unsupported() {
        let err = ComposeRenderer::default()
            .project(&Secret::new("s").add("k", "v"))
            .unwrap_err();
        assert!(matches!(err, RenderError::Unsupported { .. }));
    }

    #[test]
    fn test_write_with_env_file_and_overrides() {
        let dir = TempDir::new().unwrap();
        let renderer = ComposeRenderer::new(ComposeOptions {
            env_file: true,
            overrides: vec![ComposeOverride::Development, ComposeOverride::Production],
            ..ComposeOptions::default()
        });
        renderer
            .write(&App::new("web").build("./web").env("GREETING", "hello world"), dir.path())
            .unwrap();

        let env = std::fs::read_to_string(dir.path().join(".env")).unwrap();
        assert!(env.contains("GREETING=\"hello world\""));

        let dev: serde_yaml::Value = serde_yaml::from_str(
            &std::fs::read_to_string(dir.path().join("docker-compose.development.yml")).unwrap(),
        )
        .unwrap();
        assert_eq!(dev["services"]["web"]["volumes"][0], "./web:/app");

        let prod: serde_yaml::Value = serde_yaml::from_str(
            &std::fs::read_to_string(dir.path().join("docker-compose.production.yml")).unwrap(),
        )
        .unwrap();
        assert_eq!(prod["services"]["web"]["restart"], "always");
        assert_eq!(prod["services"]["web"]["logging"]["driver"], "json-file");
    }

    #[test]
    fn test_quantity_conversion() {
        assert_eq!(compose_cpus("500m"), "0.5");
        assert_eq!(compose_cpus("2"), "2");
        assert_eq!(compose_memory("1Gi"), "1G");
        assert_eq!(compose_memory("64M"), "64M");
    }
}
