use serde_json::{Map, Value as JsonValue, json};

use super::meta::{ObjectMeta, meta_setters, string_map};
use super::namespace::Namespace;
use super::{Builder, OutputFormat, Workload};
use crate::error::Result;
use crate::labels;
use crate::resource::{Resource, dedup_by_identity};

/// A named set of builders rendered as one unit
///
/// Records of every member are emitted in member order, labelled
/// `app.kubernetes.io/part-of: {group}`, with duplicates (the same nested
/// ConfigMap attached to two apps, say) collapsed by kind, name and namespace.
#[derive(Debug)]
pub struct AppGroup {
    meta: ObjectMeta,
    members: Vec<Box<dyn Builder>>,
    create_namespace: bool,
}

impl AppGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            meta: ObjectMeta::new(name),
            members: Vec::new(),
            create_namespace: false,
        }
    }

    meta_setters!(meta);

    /// Add a member builder
    pub fn add<B: Builder + 'static>(mut self, member: B) -> Self {
        self.members.push(Box::new(member));
        self
    }

    pub fn add_boxed(mut self, member: Box<dyn Builder>) -> Self {
        self.members.push(member);
        self
    }

    /// Emit a Namespace record for the group's namespace first
    pub fn create_namespace(mut self) -> Self {
        self.create_namespace = true;
        self
    }

    pub fn members(&self) -> &[Box<dyn Builder>] {
        &self.members
    }
}

impl Builder for AppGroup {
    fn type_name(&self) -> &'static str {
        "AppGroup"
    }

    fn name(&self) -> &str {
        self.meta.name()
    }

    fn namespace(&self) -> &str {
        &self.meta.namespace
    }

    fn generate_kubernetes_resources(&self) -> Result<Vec<Resource>> {
        let mut resources = Vec::new();
        if self.create_namespace {
            let namespace = Namespace::new(self.meta.namespace.clone());
            resources.extend(namespace.generate_kubernetes_resources()?);
        }
        for member in &self.members {
            resources.extend(member.generate_kubernetes_resources()?);
        }
        for resource in &mut resources {
            resource.insert_label(labels::K8S_PART_OF, self.meta.name());
            for (key, value) in &self.meta.labels {
                resource.insert_label(key, value);
            }
        }
        Ok(dedup_by_identity(resources))
    }

    fn validate(&self) -> Vec<String> {
        let mut problems = self.meta.name_problems("AppGroup");
        if self.members.is_empty() {
            problems.push(format!("AppGroup '{}' has no members", self.meta.name()));
        }
        let mut seen = std::collections::HashSet::new();
        for member in &self.members {
            if !seen.insert((member.type_name(), member.name().to_string())) {
                problems.push(format!(
                    "AppGroup '{}' contains {} '{}' more than once",
                    self.meta.name(),
                    member.type_name(),
                    member.name()
                ));
            }
            problems.extend(member.validate());
        }
        problems
    }

    fn workloads(&self) -> Vec<&Workload> {
        self.members.iter().flat_map(|m| m.workloads()).collect()
    }

    fn compatibility(&self, format: OutputFormat) -> Vec<String> {
        self.members
            .iter()
            .flat_map(|m| m.compatibility(format))
            .collect()
    }

    fn to_definition(&self) -> Result<JsonValue> {
        let members = self
            .members
            .iter()
            .map(|m| m.to_definition())
            .collect::<Result<Vec<_>>>()?;
        let mut def = Map::new();
        def.insert("type".into(), json!(self.type_name()));
        def.insert("name".into(), json!(self.meta.name()));
        def.insert("namespace".into(), json!(self.meta.namespace));
        if !self.meta.labels.is_empty() {
            def.insert("labels".into(), string_map(&self.meta.labels));
        }
        if !self.meta.annotations.is_empty() {
            def.insert("annotations".into(), string_map(&self.meta.annotations));
        }
        if self.create_namespace {
            def.insert("createNamespace".into(), json!(true));
        }
        def.insert("members".into(), JsonValue::Array(members));
        Ok(JsonValue::Object(def))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{App, ConfigMap};

    #[test]
    fn test_shared_config_is_emitted_once() {
        let shared = ConfigMap::new("shared").add("REGION", "eu");
        let group = AppGroup::new("shop")
            .add(App::new("web").image("web:1").port(80).add_config_map(shared.clone()))
            .add(App::new("api").image("api:1").port(8080).add_config_map(shared));

        let resources = group.generate_kubernetes_resources().unwrap();
        let config_maps = resources
            .iter()
            .filter(|r| r.kind() == Some("ConfigMap"))
            .count();
        assert_eq!(config_maps, 1);
        assert_eq!(resources.len(), 5);
        assert!(
            resources
                .iter()
                .all(|r| r.labels().get(labels::K8S_PART_OF).map(String::as_str) == Some("shop"))
        );
    }

    #[test]
    fn test_workloads_flatten_members() {
        let group = AppGroup::new("shop")
            .add(App::new("web").image("web:1"))
            .add(ConfigMap::new("settings").add("a", "b"))
            .add(App::new("api").image("api:1"));
        let names: Vec<_> = group.workloads().iter().map(|w| w.name()).collect();
        assert_eq!(names, vec!["web", "api"]);
        assert!(group.supports(OutputFormat::Compose));
    }

    #[test]
    fn test_create_namespace() {
        let resources = AppGroup::new("shop")
            .namespace("shop")
            .create_namespace()
            .add(App::new("web").namespace("shop").image("web:1"))
            .generate_kubernetes_resources()
            .unwrap();
        assert_eq!(resources[0].kind(), Some("Namespace"));
        assert_eq!(resources[0].name(), Some("shop"));
    }

    #[test]
    fn test_validate_duplicate_members() {
        let group = AppGroup::new("shop")
            .add(App::new("web").image("web:1"))
            .add(App::new("web").image("web:2"));
        let problems = group.validate();
        assert!(problems.iter().any(|p| p.contains("more than once")));
    }
}
