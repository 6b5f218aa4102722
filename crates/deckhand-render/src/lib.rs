//! Deckhand Render - output renderers for generated Kubernetes records
//!
//! This crate turns a configured builder into files on disk:
//! - `ResourceGenerator`: the facade that caches records and fans out to renderers
//! - Kubernetes YAML (per record or combined, apply-ordered)
//! - compose projects, rendered from the builder's workloads
//! - Helm-style charts, as a directory or a `.tgz` archive
//! - Kustomize base and overlay trees with structured patches
//! - Terraform modules for the Kubernetes provider

pub mod chart;
pub mod compose;
mod docs;
pub mod error;
pub mod generator;
pub mod kubernetes;
pub mod kustomize;
pub mod output;
pub mod terraform;

pub use chart::{Chart, ChartDependency, ChartRenderer};
pub use compose::{ComposeOptions, ComposeOverride, ComposeRenderer};
pub use error::{RenderError, Result};
pub use generator::{GenerateExt, OutputSettings, ResourceGenerator};
pub use kubernetes::{KubernetesRenderer, Layout, YamlOptions};
pub use kustomize::{Kustomization, KustomizeRenderer, Overlay, Patch, PatchOp, PatchTarget};
pub use terraform::{TerraformModule, TerraformRenderer};
