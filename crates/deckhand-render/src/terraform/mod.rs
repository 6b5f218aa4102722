//! Terraform module renderer
//!
//! Every record becomes one `resource` block of the Kubernetes provider, chosen
//! through a fixed kind table. Kinds without a typed provider resource fall
//! back to `kubernetes_manifest`. Namespaced records are bound to
//! `var.namespace` so a module can be instantiated once per namespace.

pub mod hcl;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use deckhand_core::names::to_identifier;
use deckhand_core::{
    DEFAULT_NAMESPACE, Resource, dedup_by_identity, is_cluster_scoped, sort_for_apply,
};

use crate::docs;
use crate::error::Result;
use crate::output::write_file;
use hcl::{Hcl, HclWriter, expression};

pub const DEFAULT_PROVIDER_VERSION: &str = "~> 2.23";
pub const DEFAULT_REQUIRED_VERSION: &str = ">= 1.3";

/// Fallback for kinds without a typed provider resource
pub const MANIFEST_RESOURCE: &str = "kubernetes_manifest";

/// Provider resource type for a Kubernetes kind
pub fn resource_type(kind: &str) -> Option<&'static str> {
    let ty = match kind {
        "Namespace" => "kubernetes_namespace_v1",
        "ServiceAccount" => "kubernetes_service_account_v1",
        "Role" => "kubernetes_role_v1",
        "RoleBinding" => "kubernetes_role_binding_v1",
        "ClusterRole" => "kubernetes_cluster_role_v1",
        "ClusterRoleBinding" => "kubernetes_cluster_role_binding_v1",
        "ConfigMap" => "kubernetes_config_map_v1",
        "Secret" => "kubernetes_secret_v1",
        "PersistentVolume" => "kubernetes_persistent_volume_v1",
        "PersistentVolumeClaim" => "kubernetes_persistent_volume_claim_v1",
        "Service" => "kubernetes_service_v1",
        "Deployment" => "kubernetes_deployment_v1",
        "StatefulSet" => "kubernetes_stateful_set_v1",
        "DaemonSet" => "kubernetes_daemon_set_v1",
        "Job" => "kubernetes_job_v1",
        "CronJob" => "kubernetes_cron_job_v1",
        "Ingress" => "kubernetes_ingress_v1",
        "HorizontalPodAutoscaler" => "kubernetes_horizontal_pod_autoscaler_v2",
        "NetworkPolicy" => "kubernetes_network_policy_v1",
        "PodDisruptionBudget" => "kubernetes_pod_disruption_budget_v1",
        "StorageClass" => "kubernetes_storage_class_v1",
        "PriorityClass" => "kubernetes_priority_class_v1",
        "ResourceQuota" => "kubernetes_resource_quota_v1",
        "LimitRange" => "kubernetes_limit_range_v1",
        _ => return None,
    };
    Some(ty)
}

/// Kinds that get a `{ident}_{kind}_name` output automatically
const NAMED_OUTPUT_KINDS: &[&str] = &["Service", "Deployment", "StatefulSet", "Ingress"];

fn default_type() -> String {
    "string".to_string()
}

/// An input variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    pub name: String,
    #[serde(rename = "type", default = "default_type")]
    pub type_: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// `None` makes the variable required
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<JsonValue>,
    #[serde(default)]
    pub sensitive: bool,
}

impl Variable {
    pub fn new(name: impl Into<String>, type_: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_: type_.into(),
            description: None,
            default: None,
            sensitive: false,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn default(mut self, value: JsonValue) -> Self {
        self.default = Some(value);
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }

    /// Value written to `terraform.tfvars.example`
    fn example(&self) -> Hcl {
        if let Some(default) = &self.default {
            return Hcl::from_json(default);
        }
        let ty = self.type_.as_str();
        if ty == "number" {
            Hcl::Number(0.into())
        } else if ty == "bool" {
            Hcl::Bool(false)
        } else if ty.starts_with("list") || ty.starts_with("set") || ty.starts_with("tuple") {
            Hcl::List(Vec::new())
        } else if ty.starts_with("map") || ty.starts_with("object") {
            Hcl::Object(IndexMap::new())
        } else {
            Hcl::String(String::new())
        }
    }
}

/// An output value; `value` is an HCL expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Output {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub sensitive: bool,
}

impl Output {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            description: None,
            sensitive: false,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }
}

/// A `data` block; strings written as `${expr}` in `body` become expressions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub body: JsonValue,
}

impl DataSource {
    pub fn new(kind: impl Into<String>, name: impl Into<String>, body: JsonValue) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            body,
        }
    }
}

/// A `module` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleCall {
    pub name: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub inputs: IndexMap<String, JsonValue>,
}

impl ModuleCall {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            version: None,
            inputs: IndexMap::new(),
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn input(mut self, name: impl Into<String>, value: JsonValue) -> Self {
        self.inputs.insert(name.into(), value);
        self
    }
}

/// Remote state backend (`s3`, `gcs`, `azurerm`, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backend {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub config: IndexMap<String, JsonValue>,
}

impl Backend {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            config: IndexMap::new(),
        }
    }

    pub fn set(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.config.insert(key.into(), value);
        self
    }
}

/// Module-level settings layered on top of the generated resources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TerraformModule {
    /// Default of `var.namespace`; records in this namespace are bound to the variable
    pub namespace: Option<String>,
    pub variables: Vec<Variable>,
    pub outputs: Vec<Output>,
    pub locals: IndexMap<String, JsonValue>,
    pub data_sources: Vec<DataSource>,
    pub modules: Vec<ModuleCall>,
    pub backend: Option<Backend>,
    pub provider_version: String,
    pub required_version: String,
}

impl Default for TerraformModule {
    fn default() -> Self {
        Self {
            namespace: None,
            variables: Vec::new(),
            outputs: Vec::new(),
            locals: IndexMap::new(),
            data_sources: Vec::new(),
            modules: Vec::new(),
            backend: None,
            provider_version: DEFAULT_PROVIDER_VERSION.to_string(),
            required_version: DEFAULT_REQUIRED_VERSION.to_string(),
        }
    }
}

impl TerraformModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set the namespace unless one is configured already
    pub fn with_default_namespace(mut self, namespace: &str) -> Self {
        self.namespace.get_or_insert_with(|| namespace.to_string());
        self
    }

    pub fn variable(mut self, variable: Variable) -> Self {
        self.variables.push(variable);
        self
    }

    pub fn output(mut self, output: Output) -> Self {
        self.outputs.push(output);
        self
    }

    pub fn local(mut self, name: impl Into<String>, value: JsonValue) -> Self {
        self.locals.insert(name.into(), value);
        self
    }

    pub fn data_source(mut self, data: DataSource) -> Self {
        self.data_sources.push(data);
        self
    }

    pub fn module(mut self, module: ModuleCall) -> Self {
        self.modules.push(module);
        self
    }

    pub fn backend(mut self, backend: Backend) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn provider_version(mut self, version: impl Into<String>) -> Self {
        self.provider_version = version.into();
        self
    }

    pub fn required_version(mut self, version: impl Into<String>) -> Self {
        self.required_version = version.into();
        self
    }

    fn module_namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
    }

    /// Built-in variables followed by the declared ones; a declared variable
    /// replaces a built-in of the same name
    fn all_variables(&self) -> Vec<Variable> {
        let builtins = [
            Variable::new("namespace", "string")
                .description("Namespace the resources are created in")
                .default(json!(self.module_namespace())),
            Variable::new("kubeconfig_path", "string")
                .description("Path to the kubeconfig file")
                .default(json!("~/.kube/config")),
            Variable::new("kube_context", "string")
                .description("Kubeconfig context, empty for the current context")
                .default(json!("")),
        ];
        let mut variables: Vec<Variable> = builtins
            .into_iter()
            .filter(|b| !self.variables.iter().any(|v| v.name == b.name))
            .collect();
        variables.extend(self.variables.iter().cloned());
        variables
    }
}

/// One record lowered to a provider resource
#[derive(Debug)]
struct Block {
    kind: String,
    name: String,
    resource_type: &'static str,
    label: String,
    body: IndexMap<String, Hcl>,
}

impl Block {
    fn address(&self) -> String {
        format!("{}.{}", self.resource_type, self.label)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TerraformRenderer {
    module: TerraformModule,
}

impl TerraformRenderer {
    pub fn new(module: TerraformModule) -> Self {
        Self { module }
    }

    pub fn module(&self) -> &TerraformModule {
        &self.module
    }

    /// `(file name, content)` for every file of the module
    pub fn files(&self, name: &str, resources: &[Resource]) -> Result<Vec<(String, String)>> {
        self.render(name, "terraform", resources)
    }

    /// Write the module into `dir`
    pub fn write(&self, name: &str, resources: &[Resource], dir: &Path) -> Result<Vec<PathBuf>> {
        let directory = dir
            .file_name()
            .map(|d| d.to_string_lossy().to_string())
            .unwrap_or_else(|| "terraform".to_string());
        let files = self.render(name, &directory, resources)?;
        let mut written = Vec::with_capacity(files.len());
        for (file, content) in &files {
            written.push(write_file(&dir.join(file), content)?);
        }
        tracing::info!(dir = %dir.display(), files = written.len(), "wrote terraform module");
        Ok(written)
    }

    fn render(
        &self,
        name: &str,
        directory: &str,
        resources: &[Resource],
    ) -> Result<Vec<(String, String)>> {
        let blocks = self.blocks(resources);
        let variables = self.module.all_variables();
        let outputs = self.outputs(&blocks);

        let mut files = vec![
            ("main.tf".to_string(), main_tf(&blocks)),
            ("variables.tf".to_string(), variables_tf(&variables)),
            ("outputs.tf".to_string(), outputs_tf(&outputs)),
            ("versions.tf".to_string(), self.versions_tf()),
            ("providers.tf".to_string(), providers_tf()),
        ];
        if !self.module.locals.is_empty() {
            files.push(("locals.tf".to_string(), self.locals_tf()));
        }
        if !self.module.data_sources.is_empty() {
            files.push(("data.tf".to_string(), self.data_tf()));
        }
        if !self.module.modules.is_empty() {
            files.push(("modules.tf".to_string(), self.modules_tf()));
        }
        if let Some(backend) = &self.module.backend {
            files.push(("backend.tf".to_string(), backend_tf(backend)));
        }
        files.push(("terraform.tfvars.example".to_string(), tfvars_example(&variables)));

        let readme = docs::terraform_readme(json!({
            "name": name,
            "directory": directory,
            "generator_version": env!("CARGO_PKG_VERSION"),
            "resources": blocks
                .iter()
                .map(|b| json!({"type": b.resource_type, "name": b.label}))
                .collect::<Vec<_>>(),
            "variables": variables
                .iter()
                .map(|v| json!({
                    "name": v.name,
                    "type": v.type_,
                    "description": v.description,
                    "default": v.default,
                    "required": v.is_required(),
                }))
                .collect::<Vec<_>>(),
            "outputs": outputs
                .iter()
                .map(|o| json!({"name": o.name, "description": o.description}))
                .collect::<Vec<_>>(),
        }))?;
        files.push(("README.md".to_string(), readme));
        Ok(files)
    }

    fn blocks(&self, resources: &[Resource]) -> Vec<Block> {
        let mut records = dedup_by_identity(resources.to_vec());
        sort_for_apply(&mut records);

        let mut used: HashMap<&'static str, usize> = HashMap::new();
        records
            .into_iter()
            .map(|record| {
                let kind = record.kind().unwrap_or_default().to_string();
                let name = record.name().unwrap_or("unnamed").to_string();
                let resource_type = resource_type(&kind).unwrap_or(MANIFEST_RESOURCE);

                let count = used.entry(resource_type).or_insert(0);
                *count += 1;
                let label = match *count {
                    1 => to_identifier(&name),
                    n => format!("{}_{n}", to_identifier(&name)),
                };

                let body = self.block_body(&kind, record, resource_type == MANIFEST_RESOURCE);
                Block {
                    kind,
                    name,
                    resource_type,
                    label,
                    body,
                }
            })
            .collect()
    }

    fn block_body(&self, kind: &str, record: Resource, manifest: bool) -> IndexMap<String, Hcl> {
        let namespace = record.namespace().map(str::to_string);
        let bind_namespace = !is_cluster_scoped(kind)
            && namespace
                .as_deref()
                .is_none_or(|ns| ns == self.module.module_namespace());

        let Hcl::Object(mut body) = Hcl::from_json(&record.into_json()) else {
            return IndexMap::new();
        };

        if let Some(metadata) = body.get_mut("metadata").and_then(Hcl::as_object_mut)
            && bind_namespace
        {
            metadata.insert("namespace".to_string(), Hcl::expr("var.namespace"));
        }

        if manifest {
            let mut wrapped = IndexMap::new();
            wrapped.insert("manifest".to_string(), Hcl::Object(body));
            return wrapped;
        }

        body.shift_remove("apiVersion");
        body.shift_remove("kind");
        body.shift_remove("status");

        if kind == "Secret" {
            // Provider `data` takes plain text, `binary_data` takes base64
            let binary = body.shift_remove("data");
            if let Some(plain) = body.shift_remove("stringData") {
                body.insert("data".to_string(), plain);
            }
            if let Some(binary) = binary {
                body.insert("binary_data".to_string(), binary);
            }
        }
        body
    }

    fn outputs(&self, blocks: &[Block]) -> Vec<Output> {
        let mut outputs: Vec<Output> = blocks
            .iter()
            .filter(|b| NAMED_OUTPUT_KINDS.contains(&b.kind.as_str()))
            .map(|b| {
                let kind = hcl::snake_case(&b.kind);
                Output::new(
                    format!("{}_{kind}_name", b.label),
                    format!("{}.metadata[0].name", b.address()),
                )
                .description(format!("Name of the {} {}", b.kind, b.name))
            })
            .filter(|o| !self.module.outputs.iter().any(|d| d.name == o.name))
            .collect();
        outputs.extend(self.module.outputs.iter().cloned());
        outputs
    }

    fn versions_tf(&self) -> String {
        let mut w = header();
        w.block("terraform", &[], |w| {
            w.attribute(
                "required_version",
                &Hcl::String(self.module.required_version.clone()),
            );
            w.blank();
            w.block("required_providers", &[], |w| {
                let mut provider = IndexMap::new();
                provider.insert(
                    "source".to_string(),
                    Hcl::String("hashicorp/kubernetes".to_string()),
                );
                provider.insert(
                    "version".to_string(),
                    Hcl::String(self.module.provider_version.clone()),
                );
                w.attribute("kubernetes", &Hcl::Object(provider));
            });
        });
        w.finish()
    }

    fn locals_tf(&self) -> String {
        let mut w = header();
        w.block("locals", &[], |w| {
            for (name, value) in &self.module.locals {
                w.attribute(name, &Hcl::from_input(value));
            }
        });
        w.finish()
    }

    fn data_tf(&self) -> String {
        let mut w = header();
        for (i, data) in self.module.data_sources.iter().enumerate() {
            if i > 0 {
                w.blank();
            }
            let body = match Hcl::from_input(&data.body) {
                Hcl::Object(body) => body,
                _ => IndexMap::new(),
            };
            w.record_block("data", &[&data.kind, &data.name], &body);
        }
        w.finish()
    }

    fn modules_tf(&self) -> String {
        let mut w = header();
        for (i, module) in self.module.modules.iter().enumerate() {
            if i > 0 {
                w.blank();
            }
            w.block("module", &[&module.name], |w| {
                w.attribute("source", &Hcl::String(module.source.clone()));
                if let Some(version) = &module.version {
                    w.attribute("version", &Hcl::String(version.clone()));
                }
                if !module.inputs.is_empty() {
                    w.blank();
                }
                for (name, value) in &module.inputs {
                    w.attribute(name, &Hcl::from_input(value));
                }
            });
        }
        w.finish()
    }
}

fn header() -> HclWriter {
    let mut w = HclWriter::new();
    w.comment(&format!(
        "Generated by deckhand {}. Do not edit by hand.",
        env!("CARGO_PKG_VERSION")
    ));
    w.blank();
    w
}

fn main_tf(blocks: &[Block]) -> String {
    let mut w = header();
    for (i, block) in blocks.iter().enumerate() {
        if i > 0 {
            w.blank();
        }
        if block.resource_type == MANIFEST_RESOURCE {
            w.block("resource", &[block.resource_type, &block.label], |w| {
                if let Some(manifest) = block.body.get("manifest") {
                    w.attribute("manifest", manifest);
                }
            });
        } else {
            w.record_block("resource", &[block.resource_type, &block.label], &block.body);
        }
    }
    w.finish()
}

fn variables_tf(variables: &[Variable]) -> String {
    let mut w = header();
    for (i, variable) in variables.iter().enumerate() {
        if i > 0 {
            w.blank();
        }
        w.block("variable", &[&variable.name], |w| {
            w.attribute("type", &Hcl::expr(variable.type_.clone()));
            if let Some(description) = &variable.description {
                w.attribute("description", &Hcl::String(description.clone()));
            }
            if let Some(default) = &variable.default {
                w.attribute("default", &Hcl::from_json(default));
            }
            if variable.sensitive {
                w.attribute("sensitive", &Hcl::Bool(true));
            }
        });
    }
    w.finish()
}

fn outputs_tf(outputs: &[Output]) -> String {
    let mut w = header();
    for (i, output) in outputs.iter().enumerate() {
        if i > 0 {
            w.blank();
        }
        w.block("output", &[&output.name], |w| {
            if let Some(description) = &output.description {
                w.attribute("description", &Hcl::String(description.clone()));
            }
            w.attribute("value", &Hcl::expr(output.value.clone()));
            if output.sensitive {
                w.attribute("sensitive", &Hcl::Bool(true));
            }
        });
    }
    w.finish()
}

fn providers_tf() -> String {
    let mut w = header();
    w.block("provider", &["kubernetes"], |w| {
        w.attribute("config_path", &Hcl::expr("var.kubeconfig_path"));
        w.attribute(
            "config_context",
            &Hcl::expr("var.kube_context == \"\" ? null : var.kube_context"),
        );
    });
    w.finish()
}

fn backend_tf(backend: &Backend) -> String {
    let mut w = header();
    w.block("terraform", &[], |w| {
        w.block("backend", &[&backend.kind], |w| {
            for (key, value) in &backend.config {
                w.attribute(key, &Hcl::from_json(value));
            }
        });
    });
    w.finish()
}

fn tfvars_example(variables: &[Variable]) -> String {
    let mut out = String::new();
    for variable in variables {
        if let Some(description) = &variable.description {
            out.push_str(&format!("# {description}\n"));
        }
        if variable.is_required() {
            out.push_str("# (required)\n");
        }
        out.push_str(&format!(
            "{} = {}\n\n",
            variable.name,
            expression(&variable.example(), 0)
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn records() -> Vec<Resource> {
        let mut config = Resource::with_type("v1", "ConfigMap", "web-config");
        config.set("data", json!({"LOG_LEVEL": "info"}));

        let mut secret = Resource::with_type("v1", "Secret", "web-creds");
        secret.set("type", json!("Opaque"));
        secret.set("stringData", json!({"password": "hunter2"}));
        secret.set("data", json!({"cert": "AAEC"}));

        let mut service = Resource::with_type("v1", "Service", "web");
        service.set("spec", json!({"selector": {"app": "web"}, "ports": [{"port": 80}]}));

        let mut monitor = Resource::with_type("monitoring.coreos.com/v1", "ServiceMonitor", "web");
        monitor.set("spec", json!({"endpoints": [{"port": "metrics"}]}));

        let namespace = Resource::with_type("v1", "Namespace", "shop");
        vec![service, monitor, secret, config, namespace]
    }

    fn file<'a>(files: &'a [(String, String)], name: &str) -> &'a str {
        files
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c.as_str())
            .unwrap()
    }

    #[test]
    fn test_resource_type_table() {
        assert_eq!(resource_type("Deployment"), Some("kubernetes_deployment_v1"));
        assert_eq!(
            resource_type("HorizontalPodAutoscaler"),
            Some("kubernetes_horizontal_pod_autoscaler_v2")
        );
        assert_eq!(resource_type("ServiceMonitor"), None);
    }

    #[test]
    fn test_module_files() {
        let files = TerraformRenderer::default().files("web", &records()).unwrap();
        let names: Vec<&str> = files.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "main.tf",
                "variables.tf",
                "outputs.tf",
                "versions.tf",
                "providers.tf",
                "terraform.tfvars.example",
                "README.md",
            ]
        );
    }

    #[test]
    fn test_main_tf_blocks() {
        let files = TerraformRenderer::default().files("web", &records()).unwrap();
        let main = file(&files, "main.tf");

        // Apply order: Namespace, ConfigMap, Secret, Service, then unknown kinds
        let order: Vec<usize> = [
            "resource \"kubernetes_namespace_v1\" \"shop\"",
            "resource \"kubernetes_config_map_v1\" \"web_config\"",
            "resource \"kubernetes_secret_v1\" \"web_creds\"",
            "resource \"kubernetes_service_v1\" \"web\"",
            "resource \"kubernetes_manifest\" \"web\"",
        ]
        .iter()
        .map(|header| main.find(header).unwrap())
        .collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]));

        assert!(main.contains("    namespace = var.namespace\n"));
        assert!(main.contains("  data = {\n    \"password\" = \"hunter2\"\n  }\n"));
        assert!(main.contains("  binary_data = {\n    \"cert\" = \"AAEC\"\n  }\n"));
        assert!(main.contains("  manifest = {\n    \"apiVersion\" = \"monitoring.coreos.com/v1\"\n"));
        assert!(!main.contains("api_version"));
    }

    #[test]
    fn test_cluster_scoped_records_are_not_bound_to_namespace() {
        let ns = Resource::with_type("v1", "Namespace", "shop");
        let files = TerraformRenderer::default().files("shop", &[ns]).unwrap();
        assert!(!file(&files, "main.tf").contains("var.namespace"));
    }

    #[test]
    fn test_foreign_namespace_is_kept() {
        let mut config = Resource::with_type("v1", "ConfigMap", "shared");
        config.set_namespace("platform");
        let renderer = TerraformRenderer::new(TerraformModule::new().namespace("shop"));
        let files = renderer.files("shop", &[config]).unwrap();
        assert!(file(&files, "main.tf").contains("namespace = \"platform\""));
    }

    #[test]
    fn test_variables_and_outputs() {
        let module = TerraformModule::new()
            .namespace("shop")
            .variable(Variable::new("image_tag", "string").description("Image tag"))
            .variable(Variable::new("replicas", "number").default(json!(2)));
        let files = TerraformRenderer::new(module)
            .files("web", &records())
            .unwrap();

        let variables = file(&files, "variables.tf");
        assert!(variables.contains("variable \"namespace\" {\n  type = string\n"));
        assert!(variables.contains("  default = \"shop\"\n"));
        assert!(variables.contains("variable \"image_tag\" {\n  type = string\n  description = \"Image tag\"\n}\n"));

        let outputs = file(&files, "outputs.tf");
        assert!(outputs.contains("output \"web_service_name\""));
        assert!(outputs.contains("  value = kubernetes_service_v1.web.metadata[0].name\n"));

        let tfvars = file(&files, "terraform.tfvars.example");
        assert!(tfvars.contains("# Image tag\n# (required)\nimage_tag = \"\"\n"));
        assert!(tfvars.contains("replicas = 2\n"));

        let readme = file(&files, "README.md");
        assert!(readme.contains("  image_tag = \"...\""));
        assert!(readme.contains("| `web_service_name` |"));
    }

    #[test]
    fn test_optional_files() {
        let module = TerraformModule::new()
            .local("app_labels", json!({"team": "shop"}))
            .data_source(DataSource::new(
                "kubernetes_namespace_v1",
                "existing",
                json!({"metadata": {"name": "${var.namespace}"}}),
            ))
            .module(
                ModuleCall::new("redis", "bitnami/redis/kubernetes")
                    .version("1.0.0")
                    .input("namespace", json!("${var.namespace}")),
            )
            .backend(Backend::new("s3").set("bucket", json!("state")));
        let files = TerraformRenderer::new(module).files("web", &[]).unwrap();

        assert!(file(&files, "locals.tf").contains("app_labels = {\n    \"team\" = \"shop\"\n  }"));
        assert!(file(&files, "data.tf").contains(
            "data \"kubernetes_namespace_v1\" \"existing\" {\n  metadata {\n    name = var.namespace\n  }\n}\n"
        ));
        assert!(file(&files, "modules.tf").contains("  namespace = var.namespace\n"));
        assert!(file(&files, "backend.tf").contains("  backend \"s3\" {\n    bucket = \"state\"\n  }\n"));
        assert!(file(&files, "README.md").contains("This module has no outputs."));
    }

    #[test]
    fn test_duplicate_labels_are_suffixed() {
        let mut a = Resource::with_type("v1", "ConfigMap", "settings");
        a.set_namespace("dev");
        let mut b = Resource::with_type("v1", "ConfigMap", "settings");
        b.set_namespace("prod");
        let files = TerraformRenderer::default().files("x", &[a, b]).unwrap();
        let main = file(&files, "main.tf");
        assert!(main.contains("\"kubernetes_config_map_v1\" \"settings\""));
        assert!(main.contains("\"kubernetes_config_map_v1\" \"settings_2\""));
    }

    #[test]
    fn test_write_uses_directory_name() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("infra");
        let written = TerraformRenderer::default()
            .write("web", &records(), &out)
            .unwrap();
        assert_eq!(written.len(), 7);
        let readme = std::fs::read_to_string(out.join("README.md")).unwrap();
        assert!(readme.contains("source = \"./infra\""));
    }
}
