//! The resource generator facade
//!
//! Bridges one configured builder to any number of output formats. Records are
//! generated at most once per facade and every `to_*` call renders that same
//! cached list, so chained calls never regenerate.

use once_cell::unsync::OnceCell;
use std::path::Path;

use deckhand_core::{Builder, OutputFormat, Resource};

use crate::chart::{Chart, ChartRenderer};
use crate::compose::{ComposeOptions, ComposeRenderer};
use crate::error::Result;
use crate::kubernetes::{DOCUMENT_SEPARATOR, KubernetesRenderer, YamlOptions};
use crate::kustomize::{Kustomization, KustomizeRenderer, Overlay};
use crate::terraform::{TerraformModule, TerraformRenderer};

/// Per-format settings for [`ResourceGenerator::to_all_formats_with`]
#[derive(Debug, Clone, Default)]
pub struct OutputSettings {
    pub yaml: YamlOptions,
    pub compose: ComposeOptions,
    /// Defaults to [`Chart::for_builder`]
    pub chart: Option<Chart>,
    pub kustomization: Kustomization,
    pub overlays: Vec<Overlay>,
    pub terraform: TerraformModule,
}

/// `.generate()` on every builder
pub trait GenerateExt: Builder + Sized {
    fn generate(&self) -> ResourceGenerator<'_> {
        ResourceGenerator::new(self)
    }
}

impl<B: Builder> GenerateExt for B {}

#[derive(Debug)]
pub struct ResourceGenerator<'a> {
    builder: &'a dyn Builder,
    resources: OnceCell<Vec<Resource>>,
}

impl<'a> ResourceGenerator<'a> {
    pub fn new(builder: &'a dyn Builder) -> Self {
        Self {
            builder,
            resources: OnceCell::new(),
        }
    }

    pub fn builder(&self) -> &'a dyn Builder {
        self.builder
    }

    /// The builder's records, generated on first access
    pub fn resources(&self) -> Result<&[Resource]> {
        let resources = self.resources.get_or_try_init(|| {
            let resources = self.builder.generate_kubernetes_resources()?;
            tracing::debug!(
                builder = self.builder.type_name(),
                name = self.builder.name(),
                records = resources.len(),
                "generated records"
            );
            Ok::<_, crate::error::RenderError>(resources)
        })?;
        Ok(resources.as_slice())
    }

    fn note_compatibility(&self, format: OutputFormat) {
        for note in self.builder.compatibility(format) {
            tracing::warn!(
                builder = self.builder.type_name(),
                name = self.builder.name(),
                format = %format,
                "{note}"
            );
        }
    }

    /// One manifest per record in `dir`
    pub fn to_yaml(&self, dir: impl AsRef<Path>) -> Result<&Self> {
        self.to_yaml_with(dir, YamlOptions::default())
    }

    pub fn to_yaml_with(&self, dir: impl AsRef<Path>, options: YamlOptions) -> Result<&Self> {
        self.note_compatibility(OutputFormat::Kubernetes);
        KubernetesRenderer::new(options).write(self.resources()?, dir.as_ref())?;
        Ok(self)
    }

    /// `docker-compose.yml` in `dir`
    pub fn to_docker_compose(&self, dir: impl AsRef<Path>) -> Result<&Self> {
        self.to_docker_compose_with(dir, ComposeOptions::default())
    }

    pub fn to_docker_compose_with(
        &self,
        dir: impl AsRef<Path>,
        options: ComposeOptions,
    ) -> Result<&Self> {
        self.note_compatibility(OutputFormat::Compose);
        ComposeRenderer::new(options).write(self.builder, dir.as_ref())?;
        Ok(self)
    }

    /// Chart directory `dir/{name}/` with default chart metadata
    pub fn to_helm_chart(&self, dir: impl AsRef<Path>) -> Result<&Self> {
        self.to_helm_chart_with(dir, Chart::for_builder(self.builder))
    }

    pub fn to_helm_chart_with(&self, dir: impl AsRef<Path>, chart: Chart) -> Result<&Self> {
        self.note_compatibility(OutputFormat::Helm);
        ChartRenderer::new(chart).write(self.builder, self.resources()?, dir.as_ref())?;
        Ok(self)
    }

    /// `base/` plus one directory per overlay under `dir`
    pub fn to_kustomize(&self, dir: impl AsRef<Path>, overlays: Vec<Overlay>) -> Result<&Self> {
        self.to_kustomize_with(dir, Kustomization::default(), overlays)
    }

    pub fn to_kustomize_with(
        &self,
        dir: impl AsRef<Path>,
        base: Kustomization,
        overlays: Vec<Overlay>,
    ) -> Result<&Self> {
        self.note_compatibility(OutputFormat::Kustomize);
        KustomizeRenderer::new(base, overlays).write(self.resources()?, dir.as_ref())?;
        Ok(self)
    }

    /// Terraform module in `dir`
    pub fn to_terraform(&self, dir: impl AsRef<Path>) -> Result<&Self> {
        self.to_terraform_with(dir, TerraformModule::default())
    }

    pub fn to_terraform_with(&self, dir: impl AsRef<Path>, module: TerraformModule) -> Result<&Self> {
        self.note_compatibility(OutputFormat::Terraform);
        let module = module.with_default_namespace(self.builder.namespace());
        TerraformRenderer::new(module).write(self.builder.name(), self.resources()?, dir.as_ref())?;
        Ok(self)
    }

    /// Render `formats` (all of them when empty) under `dir` with default settings
    pub fn to_all_formats(&self, dir: impl AsRef<Path>, formats: &[OutputFormat]) -> Result<&Self> {
        self.to_all_formats_with(dir, formats, OutputSettings::default())
    }

    /// Render `formats` under `dir`:
    ///
    /// ```text
    /// dir/
    ///   k8s/
    ///   docker-compose.yml
    ///   charts/{name}/
    ///   kustomize/base/ and kustomize/overlays/{overlay}/
    ///   terraform/
    /// ```
    ///
    /// Formats the builder does not support are skipped.
    pub fn to_all_formats_with(
        &self,
        dir: impl AsRef<Path>,
        formats: &[OutputFormat],
        settings: OutputSettings,
    ) -> Result<&Self> {
        let dir = dir.as_ref();
        let all = OutputFormat::ALL;
        let formats = if formats.is_empty() {
            &all[..]
        } else {
            formats
        };

        let OutputSettings {
            yaml,
            compose,
            chart,
            kustomization,
            overlays,
            terraform,
        } = settings;
        let mut chart = chart;
        let mut kustomize = Some((kustomization, overlays));
        let mut terraform = Some(terraform);

        for format in formats {
            if !self.builder.supports(*format) {
                tracing::warn!(
                    builder = self.builder.type_name(),
                    name = self.builder.name(),
                    format = %format,
                    "skipping unsupported output format"
                );
                continue;
            }
            match format {
                OutputFormat::Kubernetes => {
                    self.to_yaml_with(dir.join("k8s"), yaml.clone())?;
                }
                OutputFormat::Compose => {
                    self.to_docker_compose_with(dir, compose.clone())?;
                }
                OutputFormat::Helm => {
                    let chart = chart
                        .take()
                        .unwrap_or_else(|| Chart::for_builder(self.builder));
                    self.to_helm_chart_with(dir.join("charts"), chart)?;
                }
                OutputFormat::Kustomize => {
                    let (base, overlays) = kustomize.take().unwrap_or_default();
                    self.to_kustomize_with(dir.join("kustomize"), base, overlays)?;
                }
                OutputFormat::Terraform => {
                    let module = terraform.take().unwrap_or_default();
                    self.to_terraform_with(dir.join("terraform"), module)?;
                }
            }
        }
        tracing::info!(
            dir = %dir.display(),
            formats = formats.len(),
            "rendered all formats"
        );
        Ok(self)
    }

    /// Builder problems followed by structural problems of each record
    pub fn validate(&self) -> Result<Vec<String>> {
        let mut problems = self.builder.validate();
        for (i, resource) in self.resources()?.iter().enumerate() {
            for field in resource.missing_fields() {
                let label = match (resource.kind(), resource.name()) {
                    (Some(kind), Some(name)) => format!("{kind}/{name}"),
                    (Some(kind), None) => format!("{kind} #{i}"),
                    _ => format!("record #{i}"),
                };
                problems.push(format!("{label}: missing {field}"));
            }
        }
        Ok(problems)
    }

    /// Every record as YAML, each preceded by a `# Source: {kind}/{name}` line
    pub fn preview(&self) -> Result<String> {
        let documents = self
            .resources()?
            .iter()
            .map(|resource| -> Result<String> {
                let yaml = resource.to_yaml()?;
                Ok(format!(
                    "# Source: {}/{}\n{yaml}",
                    resource.kind().unwrap_or("Unknown"),
                    resource.name().unwrap_or("unnamed")
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(documents.join(DOCUMENT_SEPARATOR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::COMPOSE_FILE;
    use deckhand_core::App;
    use serde_json::{Value as JsonValue, json};
    use std::cell::Cell;
    use tempfile::TempDir;

    #[derive(Debug, Default)]
    struct Counting {
        calls: Cell<usize>,
    }

    impl Builder for Counting {
        fn type_name(&self) -> &'static str {
            "Counting"
        }

        fn name(&self) -> &str {
            "counting"
        }

        fn namespace(&self) -> &str {
            "default"
        }

        fn generate_kubernetes_resources(&self) -> deckhand_core::Result<Vec<Resource>> {
            self.calls.set(self.calls.get() + 1);
            Ok(vec![
                Resource::with_type("v1", "ConfigMap", "settings"),
                Resource::new(json!({"kind": "Secret", "metadata": {}})),
            ])
        }

        fn to_definition(&self) -> deckhand_core::Result<JsonValue> {
            Ok(json!({"type": "Counting"}))
        }
    }

    #[test]
    fn test_resources_are_generated_once() {
        let builder = Counting::default();
        let generator = builder.generate();
        let first = generator.resources().unwrap().as_ptr();
        let second = generator.resources().unwrap().as_ptr();
        assert_eq!(first, second);
        assert_eq!(builder.calls.get(), 1);
    }

    #[test]
    fn test_chained_outputs_share_the_cache() {
        let dir = TempDir::new().unwrap();
        let builder = Counting::default();
        builder
            .generate()
            .to_yaml(dir.path().join("k8s"))
            .unwrap()
            .to_terraform(dir.path().join("terraform"))
            .unwrap();
        assert_eq!(builder.calls.get(), 1);
        assert!(dir.path().join("k8s/configmap-settings.yaml").exists());
        assert!(dir.path().join("terraform/main.tf").exists());
    }

    #[test]
    fn test_validate_reports_missing_fields() {
        let builder = Counting::default();
        let problems = builder.generate().validate().unwrap();
        assert_eq!(
            problems,
            vec!["Secret #1: missing apiVersion", "Secret #1: missing metadata.name"]
        );
    }

    #[test]
    fn test_preview() {
        let app = App::new("web").image("nginx:1.21").port(8080);
        let preview = app.generate().preview().unwrap();
        assert!(preview.starts_with("# Source: Deployment/web\n"));
        assert!(preview.contains("---\n# Source: Service/web\n"));
    }

    #[test]
    fn test_unsupported_formats_are_skipped() {
        let dir = TempDir::new().unwrap();
        let builder = Counting::default();
        builder
            .generate()
            .to_all_formats(dir.path(), &[OutputFormat::Compose, OutputFormat::Kubernetes])
            .unwrap();
        assert!(!dir.path().join(COMPOSE_FILE).exists());
        assert!(dir.path().join("k8s").is_dir());
    }
}
