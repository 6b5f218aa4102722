//! Definition files (`deckhand.yaml`)
//!
//! A definition names the project, lists builder definitions under
//! `builders:` and optionally carries per-format settings. Builder entries are
//! decoded through the registry by their `type` field; more than one builder
//! is wrapped in an `AppGroup` named after the project.

use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use deckhand_core::{
    AppGroup, Builder, BuilderRegistry, CoreError, OutputFormat, Resource, Values,
    parse_set_values,
};
use deckhand_render::compose::ComposeOverride;
use deckhand_render::{
    Chart, ChartDependency, ComposeOptions, Kustomization, Overlay, OutputSettings,
    TerraformModule, YamlOptions,
};

use crate::error::{CliError, Result};

/// File looked up when no definition path is given
pub const DEFAULT_DEFINITION: &str = "deckhand.yaml";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Definition {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    /// Formats rendered when `--format` is not given; all when empty
    #[serde(default)]
    pub formats: Vec<OutputFormat>,
    #[serde(default)]
    pub chart: ChartSettings,
    #[serde(default)]
    pub compose: ComposeSettings,
    /// Kustomize base settings
    #[serde(default)]
    pub kustomization: Kustomization,
    #[serde(default)]
    pub overlays: Vec<OverlaySettings>,
    #[serde(default)]
    pub terraform: TerraformModule,
    pub builders: Vec<JsonValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChartSettings {
    pub version: Option<String>,
    pub app_version: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<ChartDependency>,
    /// Overrides merged over the derived `values.yaml`
    pub values: Option<JsonValue>,
    pub notes: Option<String>,
    pub tests: Option<bool>,
    #[serde(default)]
    pub legacy_requirements: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ComposeSettings {
    pub version: Option<String>,
    #[serde(default)]
    pub env_file: bool,
    #[serde(default)]
    pub overrides: Vec<ComposeOverride>,
}

/// An overlay plus a `replicas` shorthand: workload name -> replica count
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlaySettings {
    #[serde(flatten)]
    pub overlay: Overlay,
    #[serde(default)]
    pub replicas: BTreeMap<String, u32>,
}

/// A loaded definition with its builders decoded
#[derive(Debug)]
pub struct Project {
    pub definition: Definition,
    pub builder: Box<dyn Builder>,
}

impl Project {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| CliError::io(path, e))?;
        Self::from_yaml(path, &content)
    }

    /// Parse `content`; `path` is only used in error messages
    pub fn from_yaml(path: &Path, content: &str) -> Result<Self> {
        let definition: Definition = serde_yaml::from_str(content)
            .map_err(|e| CliError::definition(path, e.to_string()))?;

        if definition.builders.is_empty() {
            return Err(CliError::definition_with_help(
                path,
                "no builders defined",
                "add at least one entry under `builders:`, e.g. `- type: App`",
            ));
        }

        let registry = BuilderRegistry::with_builtins();
        let mut builders = Vec::with_capacity(definition.builders.len());
        for entry in &definition.builders {
            let mut entry = entry.clone();
            if let (Some(namespace), Some(map)) = (&definition.namespace, entry.as_object_mut()) {
                map.entry("namespace")
                    .or_insert_with(|| JsonValue::String(namespace.clone()));
            }
            let builder = registry.decode(entry).map_err(|e| match e {
                CoreError::UnknownBuilderType {
                    type_name,
                    known,
                    suggestion,
                } => CliError::definition_with_help(
                    path,
                    format!("unknown builder type '{type_name}'"),
                    match suggestion {
                        Some(s) => format!("did you mean '{s}'?"),
                        None => format!("known types: {}", known.join(", ")),
                    },
                ),
                other => CliError::Builder(other),
            })?;
            builders.push(builder);
        }

        let builder = if builders.len() == 1 {
            builders.remove(0)
        } else {
            let mut group = AppGroup::new(definition.name.clone());
            if let Some(namespace) = &definition.namespace {
                group = group.namespace(namespace.clone());
            }
            Box::new(
                builders
                    .into_iter()
                    .fold(group, |group, member| group.add_boxed(member)),
            )
        };

        tracing::debug!(
            name = %definition.name,
            builder = builder.type_name(),
            "loaded definition"
        );
        Ok(Self {
            definition,
            builder,
        })
    }

    /// `--format` values, else the definition's list, else every format
    pub fn formats(&self, requested: &[String]) -> Result<Vec<OutputFormat>> {
        if requested.is_empty() {
            return Ok(if self.definition.formats.is_empty() {
                OutputFormat::ALL.to_vec()
            } else {
                self.definition.formats.clone()
            });
        }
        let mut formats = Vec::new();
        for value in requested {
            let parsed = if value == "all" {
                OutputFormat::ALL.to_vec()
            } else {
                vec![value.parse::<OutputFormat>()?]
            };
            for format in parsed {
                if !formats.contains(&format) {
                    formats.push(format);
                }
            }
        }
        Ok(formats)
    }

    /// Chart metadata from the `chart:` section, with `--set` overrides applied last
    pub fn chart(&self, set_values: &[String]) -> Result<Chart> {
        let settings = &self.definition.chart;
        let mut chart = Chart::for_builder(self.builder.as_ref());
        if let Some(version) = &settings.version {
            chart = chart.version(version)?;
        }
        if let Some(app_version) = &settings.app_version {
            chart = chart.app_version(app_version.clone());
        }
        if let Some(description) = &settings.description {
            chart = chart.description(description.clone());
        }
        for dependency in &settings.dependencies {
            chart = chart.dependency(dependency.clone());
        }
        if let Some(values) = &settings.values {
            chart = chart.values(&Values(values.clone()));
        }
        if !set_values.is_empty() {
            chart = chart.values(&parse_set_values(set_values)?);
        }
        if let Some(notes) = &settings.notes {
            chart = chart.notes(notes.clone());
        }
        if settings.tests == Some(false) {
            chart = chart.without_tests();
        }
        if settings.legacy_requirements {
            chart = chart.legacy_requirements();
        }
        Ok(chart)
    }

    /// Overlays with their `replicas` shorthand expanded into patches
    pub fn overlays(&self, records: &[Resource]) -> Vec<Overlay> {
        self.definition
            .overlays
            .iter()
            .map(|settings| {
                settings
                    .replicas
                    .iter()
                    .fold(settings.overlay.clone(), |overlay, (name, count)| {
                        overlay.replicas(workload_kind(records, name), name, *count)
                    })
            })
            .collect()
    }

    pub fn settings(
        &self,
        records: &[Resource],
        set_values: &[String],
        single_file: bool,
    ) -> Result<OutputSettings> {
        let compose = &self.definition.compose;
        let mut compose_options = ComposeOptions {
            env_file: compose.env_file,
            overrides: compose.overrides.clone(),
            ..ComposeOptions::default()
        };
        if let Some(version) = &compose.version {
            compose_options.version = version.clone();
        }

        Ok(OutputSettings {
            yaml: if single_file {
                YamlOptions::single_file(format!("{}.yaml", self.builder.name()))
            } else {
                YamlOptions::default()
            },
            compose: compose_options,
            chart: Some(self.chart(set_values)?),
            kustomization: self.definition.kustomization.clone(),
            overlays: self.overlays(records),
            terraform: self.definition.terraform.clone(),
        })
    }
}

/// Kind of the workload record named `name`, `Deployment` if there is none
fn workload_kind<'a>(records: &'a [Resource], name: &str) -> &'a str {
    records
        .iter()
        .filter(|r| r.name() == Some(name))
        .filter_map(Resource::kind)
        .find(|kind| matches!(*kind, "Deployment" | "StatefulSet" | "DaemonSet"))
        .unwrap_or("Deployment")
}
