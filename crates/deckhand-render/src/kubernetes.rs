//! Kubernetes YAML renderer
//!
//! Writes records as apply-ready manifests: one file per record, or a single
//! multi-document file. Records are copied, stamped with standard labels,
//! given a `default` namespace where one is required, deduplicated by identity
//! and sorted so that `kubectl apply -f <dir>` never references an object that
//! does not exist yet.

use serde_json::json;
use std::path::{Path, PathBuf};

use deckhand_core::labels;
use deckhand_core::resource::component_for_kind;
use deckhand_core::{
    DEFAULT_NAMESPACE, Resource, dedup_by_identity, is_cluster_scoped, sort_for_apply,
};

use crate::error::Result;
use crate::output::{to_yaml, unique_file_names, write_file};

/// Document separator between records in a combined file
pub const DOCUMENT_SEPARATOR: &str = "---\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    /// `{kind}-{name}.yaml` per record
    PerResource,
    /// All records in one file with `---` separators
    SingleFile(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YamlOptions {
    pub layout: Layout,
    /// Stamp managed-by, component and generator labels/annotations
    pub standard_labels: bool,
    /// Also write a `kustomization.yaml` listing every file
    pub kustomization: bool,
}

impl Default for YamlOptions {
    fn default() -> Self {
        Self {
            layout: Layout::PerResource,
            standard_labels: true,
            kustomization: false,
        }
    }
}

impl YamlOptions {
    pub fn single_file(name: impl Into<String>) -> Self {
        Self {
            layout: Layout::SingleFile(name.into()),
            ..Self::default()
        }
    }

    pub fn with_kustomization(mut self) -> Self {
        self.kustomization = true;
        self
    }

    pub fn without_standard_labels(mut self) -> Self {
        self.standard_labels = false;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct KubernetesRenderer {
    options: YamlOptions,
}

impl KubernetesRenderer {
    pub fn new(options: YamlOptions) -> Self {
        Self { options }
    }

    /// Copy, stamp, deduplicate and sort records; the input is left untouched
    pub fn prepare(&self, resources: &[Resource]) -> Vec<Resource> {
        let stamped = resources
            .iter()
            .cloned()
            .map(|mut resource| {
                let kind = resource.kind().unwrap_or_default().to_string();
                if self.options.standard_labels {
                    stamp_standard_metadata(&mut resource, &kind);
                }
                if !is_cluster_scoped(&kind) && resource.namespace().is_none() {
                    resource.set_namespace(DEFAULT_NAMESPACE);
                }
                resource
            })
            .collect();

        let mut prepared = dedup_by_identity(stamped);
        sort_for_apply(&mut prepared);
        prepared
    }

    /// `(file name, YAML)` per prepared record, in apply order
    pub fn documents(&self, resources: &[Resource]) -> Result<Vec<(String, String)>> {
        let prepared = self.prepare(resources);
        let names = unique_file_names(&prepared);
        prepared
            .iter()
            .zip(names)
            .map(|(resource, name)| Ok((name, to_yaml(resource.as_json())?)))
            .collect()
    }

    /// Every prepared record as one multi-document string
    pub fn render_combined(&self, resources: &[Resource]) -> Result<String> {
        let documents = self.documents(resources)?;
        Ok(documents
            .into_iter()
            .map(|(_, yaml)| yaml)
            .collect::<Vec<_>>()
            .join(DOCUMENT_SEPARATOR))
    }

    /// Write manifests into `dir`, returning the paths written
    pub fn write(&self, resources: &[Resource], dir: &Path) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        let file_names = match &self.options.layout {
            Layout::PerResource => {
                let documents = self.documents(resources)?;
                let mut names = Vec::with_capacity(documents.len());
                for (name, yaml) in documents {
                    written.push(write_file(&dir.join(&name), yaml)?);
                    names.push(name);
                }
                names
            }
            Layout::SingleFile(name) => {
                let combined = self.render_combined(resources)?;
                written.push(write_file(&dir.join(name), combined)?);
                vec![name.clone()]
            }
        };

        if self.options.kustomization {
            let kustomization = json!({
                "apiVersion": "kustomize.config.k8s.io/v1beta1",
                "kind": "Kustomization",
                "resources": file_names,
            });
            written.push(write_file(
                &dir.join("kustomization.yaml"),
                to_yaml(&kustomization)?,
            )?);
        }

        tracing::info!(
            dir = %dir.display(),
            files = written.len(),
            "rendered kubernetes manifests"
        );
        Ok(written)
    }
}

fn stamp_standard_metadata(resource: &mut Resource, kind: &str) {
    resource.insert_label(labels::K8S_MANAGED_BY, labels::GENERATOR);
    resource.insert_label(labels::K8S_COMPONENT, component_for_kind(kind));
    resource.insert_annotation(labels::GENERATED_BY, labels::GENERATOR);
    resource.insert_annotation(
        labels::GENERATOR_VERSION_ANNOTATION,
        labels::GENERATOR_VERSION,
    );
}
