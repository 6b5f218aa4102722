//! Deckhand Core - builder objects and the resource record model
//!
//! This crate provides the foundational types used throughout deckhand:
//! - `Builder`: the contract every builder (App, Secret, CronJob, ...) honors
//! - `Resource`: one generated Kubernetes object, the pipeline's intermediate form
//! - `Values`: chart value trees with layered overrides
//! - `BuilderRegistry`: tagged (de)serialization of builders from definitions

pub mod builder;
pub mod error;
pub mod labels;
pub mod names;
pub mod registry;
pub mod resource;
pub mod values;

pub use builder::{
    App, AppGroup, Builder, ConfigMap, CronJob, CustomResource, Ingress, Job, MissingSourcePolicy,
    Namespace, NetworkPolicy, OutputFormat, Secret, Service, StatefulApp, Workload,
    DEFAULT_NAMESPACE,
};
pub use error::{ConfigSourceError, CoreError, Result};
pub use registry::{BuilderRegistry, encode};
pub use resource::{
    KindPriority, Resource, ResourceId, dedup_by_identity, is_cluster_scoped, sort_for_apply,
};
pub use values::{Values, parse_set_values};
