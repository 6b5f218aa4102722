//! Custom resource definitions, their controller and their instances

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};

use super::meta::{ObjectMeta, meta_setters, string_map};
use super::{Builder, OutputFormat, tagged_definition};
use crate::error::Result;
use crate::labels;
use crate::names;
use crate::resource::Resource;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrdScope {
    #[default]
    Namespaced,
    Cluster,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }
}

/// One property of the custom resource's `spec`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaProperty {
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed: Vec<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    /// Element type for arrays
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<PropertyType>,
}

impl SchemaProperty {
    pub fn new(property_type: PropertyType) -> Self {
        Self {
            property_type,
            description: None,
            required: false,
            default: None,
            allowed: Vec::new(),
            minimum: None,
            maximum: None,
            items: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: JsonValue) -> Self {
        self.default = Some(value);
        self
    }

    pub fn one_of<I: IntoIterator<Item = JsonValue>>(mut self, values: I) -> Self {
        self.allowed = values.into_iter().collect();
        self
    }

    pub fn range(mut self, minimum: f64, maximum: f64) -> Self {
        self.minimum = Some(minimum);
        self.maximum = Some(maximum);
        self
    }

    pub fn items(mut self, items: PropertyType) -> Self {
        self.items = Some(items);
        self
    }

    fn to_schema(&self) -> JsonValue {
        let mut schema = Map::new();
        schema.insert("type".into(), json!(self.property_type.as_str()));
        if let Some(description) = &self.description {
            schema.insert("description".into(), json!(description));
        }
        if let Some(default) = &self.default {
            schema.insert("default".into(), default.clone());
        }
        if !self.allowed.is_empty() {
            schema.insert("enum".into(), json!(self.allowed));
        }
        if let Some(minimum) = self.minimum {
            schema.insert("minimum".into(), json!(minimum));
        }
        if let Some(maximum) = self.maximum {
            schema.insert("maximum".into(), json!(maximum));
        }
        match self.property_type {
            PropertyType::Array => {
                let items = self.items.unwrap_or(PropertyType::String);
                schema.insert("items".into(), json!({"type": items.as_str()}));
            }
            PropertyType::Object => {
                schema.insert("x-kubernetes-preserve-unknown-fields".into(), json!(true));
            }
            _ => {}
        }
        JsonValue::Object(schema)
    }
}

/// Operator deployment reconciling the custom resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Controller {
    pub image: String,
    #[serde(default = "default_controller_replicas")]
    pub replicas: u32,
    /// Extra `(api group, resource)` pairs the controller manages besides its own kind
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub manages: Vec<(String, String)>,
}

fn default_controller_replicas() -> u32 {
    1
}

impl Controller {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            replicas: default_controller_replicas(),
            manages: Vec::new(),
        }
    }

    pub fn manages(mut self, api_group: impl Into<String>, resource: impl Into<String>) -> Self {
        self.manages.push((api_group.into(), resource.into()));
        self
    }
}

/// One object of the custom kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub spec: JsonValue,
}

/// A custom resource kind
///
/// Emits its CustomResourceDefinition, then ServiceAccount, ClusterRole,
/// ClusterRoleBinding and Deployment when a controller is configured, then
/// one record per instance. The CRD is named `{plural}.{group}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomResource {
    #[serde(flatten)]
    meta: ObjectMeta,

    group: String,
    version: String,
    kind: String,
    plural: String,

    #[serde(default)]
    scope: CrdScope,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    short_names: Vec<String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    properties: IndexMap<String, SchemaProperty>,

    #[serde(default)]
    status_subresource: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    controller: Option<Controller>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    instances: Vec<Instance>,
}

impl CustomResource {
    /// `kind` like `Widget`; the plural defaults to `widgets`
    pub fn new(group: impl Into<String>, version: impl Into<String>, kind: impl Into<String>) -> Self {
        let kind = kind.into();
        let plural = format!("{}s", kind.to_ascii_lowercase());
        Self {
            meta: ObjectMeta::new(kind.to_ascii_lowercase()),
            group: group.into(),
            version: version.into(),
            kind,
            plural,
            scope: CrdScope::Namespaced,
            short_names: Vec::new(),
            properties: IndexMap::new(),
            status_subresource: false,
            controller: None,
            instances: Vec::new(),
        }
    }

    meta_setters!(meta);

    pub fn plural(mut self, plural: impl Into<String>) -> Self {
        self.plural = plural.into();
        self
    }

    pub fn scope(mut self, scope: CrdScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn short_name(mut self, short_name: impl Into<String>) -> Self {
        self.short_names.push(short_name.into());
        self
    }

    pub fn property(mut self, name: impl Into<String>, property: SchemaProperty) -> Self {
        self.properties.insert(name.into(), property);
        self
    }

    pub fn with_status(mut self) -> Self {
        self.status_subresource = true;
        self
    }

    pub fn controller(mut self, controller: Controller) -> Self {
        self.controller = Some(controller);
        self
    }

    pub fn instance(mut self, name: impl Into<String>, spec: JsonValue) -> Self {
        self.instances.push(Instance {
            name: name.into(),
            namespace: None,
            spec,
        });
        self
    }

    /// `{plural}.{group}`
    pub fn crd_name(&self) -> String {
        format!("{}.{}", self.plural, self.group)
    }

    pub fn api_version(&self) -> String {
        format!("{}/{}", self.group, self.version)
    }

    /// JSON schema of `spec`
    pub fn spec_schema(&self) -> JsonValue {
        let properties: Map<String, JsonValue> = self
            .properties
            .iter()
            .map(|(name, prop)| (name.clone(), prop.to_schema()))
            .collect();
        let required: Vec<&String> = self
            .properties
            .iter()
            .filter(|(_, prop)| prop.required)
            .map(|(name, _)| name)
            .collect();
        let mut schema = Map::new();
        schema.insert("type".into(), json!("object"));
        schema.insert("properties".into(), JsonValue::Object(properties));
        if !required.is_empty() {
            schema.insert("required".into(), json!(required));
        }
        JsonValue::Object(schema)
    }

    fn controller_name(&self) -> String {
        format!("{}-controller", self.kind.to_ascii_lowercase())
    }

    fn definition(&self) -> Resource {
        let mut root_properties = Map::new();
        root_properties.insert("spec".into(), self.spec_schema());
        if self.status_subresource {
            root_properties.insert(
                "status".into(),
                json!({"type": "object", "x-kubernetes-preserve-unknown-fields": true}),
            );
        }

        let mut version = Map::new();
        version.insert("name".into(), json!(self.version));
        version.insert("served".into(), json!(true));
        version.insert("storage".into(), json!(true));
        version.insert(
            "schema".into(),
            json!({"openAPIV3Schema": {"type": "object", "properties": root_properties}}),
        );
        if self.status_subresource {
            version.insert("subresources".into(), json!({"status": {}}));
        }

        let mut names = Map::new();
        names.insert("kind".into(), json!(self.kind));
        names.insert("plural".into(), json!(self.plural));
        names.insert("singular".into(), json!(self.kind.to_ascii_lowercase()));
        if !self.short_names.is_empty() {
            names.insert("shortNames".into(), json!(self.short_names));
        }

        let scope = match self.scope {
            CrdScope::Namespaced => "Namespaced",
            CrdScope::Cluster => "Cluster",
        };

        Resource::new(json!({
            "apiVersion": "apiextensions.k8s.io/v1",
            "kind": "CustomResourceDefinition",
            "metadata": self.meta.to_json_named(&self.crd_name(), false),
            "spec": {
                "group": self.group,
                "names": names,
                "scope": scope,
                "versions": [version],
            },
        }))
    }

    fn controller_resources(&self, controller: &Controller) -> Vec<Resource> {
        let name = self.controller_name();
        let namespace = &self.meta.namespace;

        let mut rules = vec![
            json!({
                "apiGroups": [self.group],
                "resources": [self.plural, format!("{}/status", self.plural)],
                "verbs": ["get", "list", "watch", "create", "update", "patch", "delete"],
            }),
            json!({
                "apiGroups": [""],
                "resources": ["events"],
                "verbs": ["create", "patch"],
            }),
        ];
        for (group, resource) in &controller.manages {
            rules.push(json!({
                "apiGroups": [group],
                "resources": [resource],
                "verbs": ["get", "list", "watch", "create", "update", "patch", "delete"],
            }));
        }

        let mut pod_labels = self.meta.all_labels();
        pod_labels.insert(labels::APP.into(), name.clone());
        pod_labels.insert(labels::K8S_NAME.into(), name.clone());
        pod_labels.insert(labels::K8S_COMPONENT.into(), "controller".into());

        vec![
            Resource::new(json!({
                "apiVersion": "v1",
                "kind": "ServiceAccount",
                "metadata": self.meta.to_json_named(&name, true),
            })),
            Resource::new(json!({
                "apiVersion": "rbac.authorization.k8s.io/v1",
                "kind": "ClusterRole",
                "metadata": self.meta.to_json_named(&name, false),
                "rules": rules,
            })),
            Resource::new(json!({
                "apiVersion": "rbac.authorization.k8s.io/v1",
                "kind": "ClusterRoleBinding",
                "metadata": self.meta.to_json_named(&name, false),
                "roleRef": {
                    "apiGroup": "rbac.authorization.k8s.io",
                    "kind": "ClusterRole",
                    "name": name,
                },
                "subjects": [{
                    "kind": "ServiceAccount",
                    "name": name,
                    "namespace": namespace,
                }],
            })),
            Resource::new(json!({
                "apiVersion": "apps/v1",
                "kind": "Deployment",
                "metadata": self.meta.to_json_named(&name, true),
                "spec": {
                    "replicas": controller.replicas,
                    "selector": {"matchLabels": {"app": name}},
                    "template": {
                        "metadata": {"labels": string_map(&pod_labels)},
                        "spec": {
                            "serviceAccountName": name,
                            "containers": [{
                                "name": "controller",
                                "image": controller.image,
                            }],
                        },
                    },
                },
            })),
        ]
    }

    fn instance_record(&self, instance: &Instance) -> Resource {
        let mut metadata = Map::new();
        metadata.insert("name".into(), json!(instance.name));
        if self.scope == CrdScope::Namespaced {
            let namespace = instance
                .namespace
                .clone()
                .unwrap_or_else(|| self.meta.namespace.clone());
            metadata.insert("namespace".into(), json!(namespace));
        }
        metadata.insert("labels".into(), string_map(&self.meta.all_labels()));
        Resource::new(json!({
            "apiVersion": self.api_version(),
            "kind": self.kind,
            "metadata": metadata,
            "spec": instance.spec,
        }))
    }
}

impl Builder for CustomResource {
    fn type_name(&self) -> &'static str {
        "CustomResource"
    }

    fn name(&self) -> &str {
        self.meta.name()
    }

    fn namespace(&self) -> &str {
        &self.meta.namespace
    }

    fn generate_kubernetes_resources(&self) -> Result<Vec<Resource>> {
        let mut resources = vec![self.definition()];
        if let Some(controller) = &self.controller {
            resources.extend(self.controller_resources(controller));
        }
        resources.extend(self.instances.iter().map(|i| self.instance_record(i)));
        Ok(resources)
    }

    fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let kind = &self.kind;

        if !names::is_valid_qualified_name(&self.group) || !self.group.contains('.') {
            problems.push(format!(
                "CustomResource '{kind}' group '{}' must be a dotted domain",
                self.group
            ));
        }
        if !kind.starts_with(|c: char| c.is_ascii_uppercase())
            || !kind.chars().all(|c| c.is_ascii_alphanumeric())
        {
            problems.push(format!("CustomResource kind '{kind}' must be UpperCamelCase"));
        }
        if !names::is_valid_label_name(&self.plural) {
            problems.push(format!(
                "CustomResource '{kind}' plural '{}' must be a lowercase DNS label",
                self.plural
            ));
        }

        let validator = match jsonschema::validator_for(&self.spec_schema()) {
            Ok(validator) => validator,
            Err(e) => {
                problems.push(format!("CustomResource '{kind}' has an invalid schema: {e}"));
                return problems;
            }
        };
        for instance in &self.instances {
            problems.extend(names::name_problems(kind, &instance.name, names::MAX_NAME_LEN));
            for error in validator.iter_errors(&instance.spec) {
                let path = error.instance_path.to_string();
                let path = if path.is_empty() { "(root)".to_string() } else { path };
                problems.push(format!(
                    "{kind} '{}' spec {path}: {error}",
                    instance.name
                ));
            }
        }
        problems
    }

    fn compatibility(&self, format: OutputFormat) -> Vec<String> {
        match format {
            OutputFormat::Compose => vec![format!(
                "CustomResource '{}' has no compose equivalent and is skipped",
                self.kind
            )],
            _ => Vec::new(),
        }
    }

    fn to_definition(&self) -> Result<JsonValue> {
        tagged_definition(self.type_name(), self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget() -> CustomResource {
        CustomResource::new("example.com", "v1", "Widget")
            .property(
                "size",
                SchemaProperty::new(PropertyType::Integer)
                    .required()
                    .range(1.0, 10.0),
            )
            .property(
                "color",
                SchemaProperty::new(PropertyType::String).one_of([json!("red"), json!("blue")]),
            )
    }

    #[test]
    fn test_crd_record() {
        let resources = widget().generate_kubernetes_resources().unwrap();
        assert_eq!(resources.len(), 1);
        let crd = &resources[0];
        assert_eq!(crd.name(), Some("widgets.example.com"));
        assert_eq!(crd.namespace(), None);
        let schema = crd
            .get("spec.versions")
            .and_then(|v| v.get(0))
            .and_then(|v| v.get("schema"))
            .and_then(|s| s.get("openAPIV3Schema"))
            .unwrap();
        assert_eq!(
            schema["properties"]["spec"]["required"],
            json!(["size"])
        );
        assert_eq!(
            schema["properties"]["spec"]["properties"]["color"]["enum"],
            json!(["red", "blue"])
        );
    }

    #[test]
    fn test_controller_and_instances() {
        let resources = widget()
            .namespace("widgets")
            .controller(Controller::new("widget-operator:0.3"))
            .instance("small", json!({"size": 1}))
            .generate_kubernetes_resources()
            .unwrap();
        let kinds: Vec<_> = resources.iter().filter_map(|r| r.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                "CustomResourceDefinition",
                "ServiceAccount",
                "ClusterRole",
                "ClusterRoleBinding",
                "Deployment",
                "Widget"
            ]
        );
        assert_eq!(resources[5].api_version(), Some("example.com/v1"));
        assert_eq!(resources[5].namespace(), Some("widgets"));
        assert_eq!(resources[4].name(), Some("widget-controller"));
    }

    #[test]
    fn test_validate_instances_against_schema() {
        let crd = widget()
            .instance("ok", json!({"size": 3, "color": "red"}))
            .instance("bad", json!({"size": 42, "color": "green"}))
            .instance("missing", json!({}));
        let problems = crd.validate();
        assert_eq!(problems.iter().filter(|p| p.contains("'bad'")).count(), 2);
        assert_eq!(problems.iter().filter(|p| p.contains("'missing'")).count(), 1);
        assert!(!problems.iter().any(|p| p.contains("'ok'")));
    }
}
