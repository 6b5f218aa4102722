//! Kustomize renderer
//!
//! Writes `base/` (one file per record plus `kustomization.yaml`) and one
//! `overlays/{name}/` per overlay referencing the base by relative path.
//! Patches are structured declarations, written out as patch files and
//! listed under `patches` with their target.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use deckhand_core::Resource;
use deckhand_core::names::sanitize_filename;

use crate::error::Result;
use crate::kubernetes::KubernetesRenderer;
use crate::output::{to_yaml, write_file};

const KUSTOMIZATION_FILE: &str = "kustomization.yaml";

/// `group/version/kind/name` a patch applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchTarget {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub group: String,
    #[serde(default = "default_version")]
    pub version: String,
    pub kind: String,
    pub name: String,
}

fn default_version() -> String {
    "v1".to_string()
}

impl PatchTarget {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Target with group and version inferred from a well-known kind
    pub fn for_kind(kind: &str, name: impl Into<String>) -> Self {
        let (group, version) = match kind {
            "Deployment" | "StatefulSet" | "DaemonSet" | "ReplicaSet" => ("apps", "v1"),
            "Job" | "CronJob" => ("batch", "v1"),
            "HorizontalPodAutoscaler" => ("autoscaling", "v2"),
            "Ingress" | "NetworkPolicy" => ("networking.k8s.io", "v1"),
            "Role" | "RoleBinding" | "ClusterRole" | "ClusterRoleBinding" => {
                ("rbac.authorization.k8s.io", "v1")
            }
            "CustomResourceDefinition" => ("apiextensions.k8s.io", "v1"),
            _ => ("", "v1"),
        };
        Self::new(group, version, kind, name)
    }

    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

/// One RFC 6902 operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOp {
    pub op: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<JsonValue>,
}

impl PatchOp {
    pub fn replace(path: impl Into<String>, value: JsonValue) -> Self {
        Self {
            op: "replace".to_string(),
            path: path.into(),
            value: Some(value),
        }
    }

    pub fn add(path: impl Into<String>, value: JsonValue) -> Self {
        Self {
            op: "add".to_string(),
            path: path.into(),
            value: Some(value),
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            op: "remove".to_string(),
            path: path.into(),
            value: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Patch {
    /// JSON patch operations
    Json { target: PatchTarget, ops: Vec<PatchOp> },
    /// Partial document merged into the target
    StrategicMerge {
        target: PatchTarget,
        document: JsonValue,
    },
}

impl Patch {
    pub fn target(&self) -> &PatchTarget {
        match self {
            Self::Json { target, .. } | Self::StrategicMerge { target, .. } => target,
        }
    }

    fn file_name(&self, index: usize) -> String {
        let target = self.target();
        format!(
            "patch-{}-{}-{}.yaml",
            index + 1,
            target.kind.to_ascii_lowercase(),
            sanitize_filename(&target.name)
        )
    }

    /// Patch file content
    fn document(&self) -> JsonValue {
        match self {
            Self::Json { ops, .. } => json!(ops),
            Self::StrategicMerge { target, document } => {
                let mut patch = Map::new();
                patch.insert("apiVersion".into(), json!(target.api_version()));
                patch.insert("kind".into(), json!(target.kind));
                patch.insert("metadata".into(), json!({"name": target.name}));
                if let JsonValue::Object(fields) = document {
                    for (key, value) in fields {
                        if !matches!(key.as_str(), "apiVersion" | "kind" | "metadata") {
                            patch.insert(key.clone(), value.clone());
                        }
                    }
                }
                JsonValue::Object(patch)
            }
        }
    }
}

/// `images:` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageOverride {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_tag: Option<String>,
}

/// `secretGenerator` / `configMapGenerator` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Generator {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub literals: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub envs: Vec<String>,
    /// `create`, `merge` or `replace`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior: Option<String>,
}

impl Generator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            literals: Vec::new(),
            files: Vec::new(),
            envs: Vec::new(),
            behavior: None,
        }
    }

    pub fn literal(mut self, key: &str, value: &str) -> Self {
        self.literals.push(format!("{key}={value}"));
        self
    }

    pub fn file(mut self, path: impl Into<String>) -> Self {
        self.files.push(path.into());
        self
    }

    pub fn env(mut self, path: impl Into<String>) -> Self {
        self.envs.push(path.into());
        self
    }

    pub fn behavior(mut self, behavior: impl Into<String>) -> Self {
        self.behavior = Some(behavior.into());
        self
    }
}

/// Settings shared by the base and every overlay
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kustomization {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_suffix: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub common_labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub common_annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageOverride>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secret_generators: Vec<Generator>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config_map_generators: Vec<Generator>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patches: Vec<Patch>,
}

impl Kustomization {
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = Some(prefix.into());
        self
    }

    pub fn name_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.name_suffix = Some(suffix.into());
        self
    }

    pub fn common_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.common_labels.insert(key.into(), value.into());
        self
    }

    pub fn common_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.common_annotations.insert(key.into(), value.into());
        self
    }

    /// Retag `image` (`nginx` -> `nginx:1.25`)
    pub fn image_tag(mut self, image: impl Into<String>, tag: impl Into<String>) -> Self {
        self.images.push(ImageOverride {
            name: image.into(),
            new_name: None,
            new_tag: Some(tag.into()),
        });
        self
    }

    pub fn secret_generator(mut self, generator: Generator) -> Self {
        self.secret_generators.push(generator);
        self
    }

    pub fn config_map_generator(mut self, generator: Generator) -> Self {
        self.config_map_generators.push(generator);
        self
    }

    pub fn patch(mut self, patch: Patch) -> Self {
        self.patches.push(patch);
        self
    }

    /// Replace `spec.replicas` on a workload
    pub fn replicas(self, kind: &str, name: &str, count: u32) -> Self {
        self.patch(Patch::Json {
            target: PatchTarget::for_kind(kind, name),
            ops: vec![PatchOp::replace("/spec/replicas", json!(count))],
        })
    }

    /// Merge `data` into a ConfigMap
    pub fn config_map_data<I, K, V>(self, name: &str, data: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let data: BTreeMap<String, String> = data
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.patch(Patch::StrategicMerge {
            target: PatchTarget::for_kind("ConfigMap", name),
            document: json!({"data": data}),
        })
    }

    /// `kustomization.yaml` for `resources`, plus patch files keyed by name
    fn render(&self, resources: &[String]) -> Result<(String, Vec<(String, String)>)> {
        let mut doc = Map::new();
        doc.insert(
            "apiVersion".into(),
            json!("kustomize.config.k8s.io/v1beta1"),
        );
        doc.insert("kind".into(), json!("Kustomization"));
        if let Some(namespace) = &self.namespace {
            doc.insert("namespace".into(), json!(namespace));
        }
        if let Some(prefix) = &self.name_prefix {
            doc.insert("namePrefix".into(), json!(prefix));
        }
        if let Some(suffix) = &self.name_suffix {
            doc.insert("nameSuffix".into(), json!(suffix));
        }
        if !self.common_labels.is_empty() {
            doc.insert("commonLabels".into(), json!(self.common_labels));
        }
        if !self.common_annotations.is_empty() {
            doc.insert("commonAnnotations".into(), json!(self.common_annotations));
        }
        doc.insert("resources".into(), json!(resources));
        if !self.images.is_empty() {
            doc.insert("images".into(), json!(self.images));
        }
        if !self.config_map_generators.is_empty() {
            doc.insert("configMapGenerator".into(), json!(self.config_map_generators));
        }
        if !self.secret_generators.is_empty() {
            doc.insert("secretGenerator".into(), json!(self.secret_generators));
        }

        let mut patch_files = Vec::new();
        if !self.patches.is_empty() {
            let mut entries = Vec::new();
            for (index, patch) in self.patches.iter().enumerate() {
                let file_name = patch.file_name(index);
                entries.push(json!({"path": file_name, "target": patch.target()}));
                patch_files.push((file_name, to_yaml(&patch.document())?));
            }
            doc.insert("patches".into(), JsonValue::Array(entries));
        }

        Ok((to_yaml(&doc)?, patch_files))
    }
}

/// A named variant layered over the base
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overlay {
    pub name: String,
    #[serde(flatten)]
    pub kustomization: Kustomization,
}

impl Overlay {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kustomization: Kustomization::default(),
        }
    }

    pub fn with(mut self, configure: impl FnOnce(Kustomization) -> Kustomization) -> Self {
        self.kustomization = configure(self.kustomization);
        self
    }

    pub fn replicas(self, kind: &str, name: &str, count: u32) -> Self {
        self.with(|k| k.replicas(kind, name, count))
    }

    pub fn config_map_data<I, K, V>(self, name: &str, data: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.with(|k| k.config_map_data(name, data))
    }
}

#[derive(Debug, Clone, Default)]
pub struct KustomizeRenderer {
    base: Kustomization,
    overlays: Vec<Overlay>,
    records: KubernetesRenderer,
}

impl KustomizeRenderer {
    pub fn new(base: Kustomization, overlays: Vec<Overlay>) -> Self {
        Self {
            base,
            overlays,
            records: KubernetesRenderer::default(),
        }
    }

    pub fn overlays(&self) -> &[Overlay] {
        &self.overlays
    }

    /// Write `base/` and `overlays/*` under `dir`
    pub fn write(&self, resources: &[Resource], dir: &Path) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();

        let base_dir = dir.join("base");
        let documents = self.records.documents(resources)?;
        let mut file_names = Vec::with_capacity(documents.len());
        for (name, yaml) in documents {
            written.push(write_file(&base_dir.join(&name), yaml)?);
            file_names.push(name);
        }
        written.extend(write_kustomization(&self.base, &file_names, &base_dir)?);

        for overlay in &self.overlays {
            let overlay_dir = dir.join("overlays").join(sanitize_filename(&overlay.name));
            written.extend(write_kustomization(
                &overlay.kustomization,
                &["../../base".to_string()],
                &overlay_dir,
            )?);
        }

        tracing::info!(
            dir = %dir.display(),
            overlays = self.overlays.len(),
            "rendered kustomize tree"
        );
        Ok(written)
    }
}

fn write_kustomization(
    kustomization: &Kustomization,
    resources: &[String],
    dir: &Path,
) -> Result<Vec<PathBuf>> {
    let (manifest, patches) = kustomization.render(resources)?;
    let mut written = vec![write_file(&dir.join(KUSTOMIZATION_FILE), manifest)?];
    for (name, content) in patches {
        written.push(write_file(&dir.join(name), content)?);
    }
    Ok(written)
}
