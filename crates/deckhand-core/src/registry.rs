//! Builder registry: tagged (de)serialization of builders
//!
//! A definition is a JSON/YAML object whose `type` field names the builder,
//! e.g. `{type: App, name: web, image: "nginx:1.21"}`. Decoders are registered
//! explicitly; [`BuilderRegistry::with_builtins`] registers every builder this
//! crate ships.

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::builder::{
    App, AppGroup, Builder, ClusterRole, ClusterRoleBinding, ConfigMap, CronJob, CustomResource,
    Ingress, Job, Namespace, NetworkPolicy, Role, RoleBinding, Secret, Service, ServiceAccount,
    StatefulApp,
};
use crate::error::{CoreError, Result};

/// Maximum edit distance for a "did you mean" suggestion
const MAX_SUGGESTION_DISTANCE: usize = 3;

/// Turns a definition (with its `type` field) into a builder
pub type DecodeFn = fn(JsonValue, &BuilderRegistry) -> Result<Box<dyn Builder>>;

#[derive(Debug, Clone, Default)]
pub struct BuilderRegistry {
    decoders: BTreeMap<&'static str, DecodeFn>,
}

impl BuilderRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry knowing every built-in builder type
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .register("App", decode_serde::<App>)
            .register("StatefulApp", decode_serde::<StatefulApp>)
            .register("Secret", decode_serde::<Secret>)
            .register("ConfigMap", decode_serde::<ConfigMap>)
            .register("Job", decode_serde::<Job>)
            .register("CronJob", decode_serde::<CronJob>)
            .register("Service", decode_serde::<Service>)
            .register("Ingress", decode_serde::<Ingress>)
            .register("NetworkPolicy", decode_serde::<NetworkPolicy>)
            .register("ServiceAccount", decode_serde::<ServiceAccount>)
            .register("Role", decode_serde::<Role>)
            .register("ClusterRole", decode_serde::<ClusterRole>)
            .register("RoleBinding", decode_serde::<RoleBinding>)
            .register("ClusterRoleBinding", decode_serde::<ClusterRoleBinding>)
            .register("CustomResource", decode_serde::<CustomResource>)
            .register("Namespace", decode_serde::<Namespace>)
            .register("AppGroup", decode_group);
        registry
    }

    /// Register (or replace) the decoder for a type name
    pub fn register(&mut self, type_name: &'static str, decode: DecodeFn) -> &mut Self {
        self.decoders.insert(type_name, decode);
        self
    }

    /// Known type names, sorted
    pub fn known_types(&self) -> Vec<&'static str> {
        self.decoders.keys().copied().collect()
    }

    pub fn is_registered(&self, type_name: &str) -> bool {
        self.decoders.contains_key(type_name)
    }

    /// Decode one definition
    pub fn decode(&self, definition: JsonValue) -> Result<Box<dyn Builder>> {
        let type_name = definition
            .get("type")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| {
                CoreError::invalid_definition(format!(
                    "definition{} has no 'type' field",
                    describe_name(&definition)
                ))
            })?
            .to_string();

        let decode = self
            .decoders
            .get(type_name.as_str())
            .ok_or_else(|| self.unknown_type(&type_name))?;

        tracing::debug!(type_name = %type_name, "decoding builder definition");
        decode(definition, self)
    }

    /// Decode a list of definitions, failing on the first bad one
    pub fn decode_all(&self, definitions: Vec<JsonValue>) -> Result<Vec<Box<dyn Builder>>> {
        definitions
            .into_iter()
            .map(|definition| self.decode(definition))
            .collect()
    }

    /// Decode a YAML document holding one definition
    pub fn decode_yaml(&self, yaml: &str) -> Result<Box<dyn Builder>> {
        let definition: JsonValue = serde_yaml::from_str(yaml)?;
        self.decode(definition)
    }

    fn unknown_type(&self, type_name: &str) -> CoreError {
        let known = self.known_types();
        CoreError::UnknownBuilderType {
            type_name: type_name.to_string(),
            suggestion: closest_type(type_name, &known),
            known: known.into_iter().map(String::from).collect(),
        }
    }
}

/// Serialize a builder to its tagged definition
pub fn encode(builder: &dyn Builder) -> Result<JsonValue> {
    builder.to_definition()
}

fn decode_serde<B>(definition: JsonValue, _registry: &BuilderRegistry) -> Result<Box<dyn Builder>>
where
    B: Builder + DeserializeOwned + 'static,
{
    let context = describe_name(&definition);
    let builder: B = serde_json::from_value(definition).map_err(|e| {
        CoreError::invalid_definition(format!("definition{context}: {e}"))
    })?;
    Ok(Box::new(builder))
}

fn decode_group(definition: JsonValue, registry: &BuilderRegistry) -> Result<Box<dyn Builder>> {
    let JsonValue::Object(mut fields) = definition else {
        return Err(CoreError::invalid_definition("AppGroup definition must be a mapping"));
    };

    let name = fields
        .get("name")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| CoreError::invalid_definition("AppGroup definition has no 'name'"))?;
    let mut group = AppGroup::new(name);

    if let Some(namespace) = fields.get("namespace").and_then(JsonValue::as_str) {
        group = group.namespace(namespace);
    }
    for (key, value) in string_entries(fields.get("labels")) {
        group = group.label(key, value);
    }
    for (key, value) in string_entries(fields.get("annotations")) {
        group = group.annotation(key, value);
    }
    if fields.get("createNamespace").and_then(JsonValue::as_bool) == Some(true) {
        group = group.create_namespace();
    }

    match fields.remove("members") {
        Some(JsonValue::Array(members)) => {
            for member in registry.decode_all(members)? {
                group = group.add_boxed(member);
            }
        }
        Some(_) => {
            return Err(CoreError::invalid_definition(
                "AppGroup 'members' must be a list",
            ));
        }
        None => {}
    }
    Ok(Box::new(group))
}

fn string_entries(value: Option<&JsonValue>) -> Vec<(String, String)> {
    value
        .and_then(JsonValue::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

fn describe_name(definition: &JsonValue) -> String {
    definition
        .get("name")
        .and_then(JsonValue::as_str)
        .map(|name| format!(" '{name}'"))
        .unwrap_or_default()
}

/// Closest known type, preferring a case-insensitive exact match
fn closest_type(input: &str, known: &[&'static str]) -> Option<String> {
    if let Some(exact) = known.iter().find(|k| k.eq_ignore_ascii_case(input)) {
        return Some(exact.to_string());
    }
    known
        .iter()
        .map(|candidate| (strsim::levenshtein(input, candidate), *candidate))
        .filter(|(distance, _)| *distance <= MAX_SUGGESTION_DISTANCE)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, candidate)| candidate.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Scaling;
    use serde_json::json;

    #[test]
    fn test_builtins_registered() {
        let registry = BuilderRegistry::with_builtins();
        let known = registry.known_types();
        assert_eq!(known.len(), 17);
        assert!(registry.is_registered("App"));
        assert!(registry.is_registered("AppGroup"));
        assert!(!registry.is_registered("Deployment"));
    }

    #[test]
    fn test_decode_app() {
        let registry = BuilderRegistry::with_builtins();
        let builder = registry
            .decode(json!({
                "type": "App",
                "name": "web",
                "image": "nginx:1.21",
                "ports": [{"container": 8080}],
                "scaling": {"replicas": 3},
            }))
            .unwrap();
        assert_eq!(builder.type_name(), "App");
        assert_eq!(builder.name(), "web");

        let resources = builder.generate_kubernetes_resources().unwrap();
        assert_eq!(resources[0].get("spec.replicas"), Some(&json!(3)));
    }

    #[test]
    fn test_round_trip_preserves_records() {
        let registry = BuilderRegistry::with_builtins();
        let app = App::new("api")
            .image("api:2")
            .port(8080)
            .env("MODE", "prod")
            .scaling(Scaling::default().horizontal(2, 5))
            .add_secret(Secret::new("api-creds").add("TOKEN", "t"));

        let definition = encode(&app).unwrap();
        assert_eq!(definition["type"], "App");
        let decoded = registry.decode(definition).unwrap();
        assert_eq!(
            decoded.generate_kubernetes_resources().unwrap(),
            app.generate_kubernetes_resources().unwrap()
        );
    }

    #[test]
    fn test_unknown_type_suggests() {
        let registry = BuilderRegistry::with_builtins();
        let err = registry
            .decode(json!({"type": "Secrets", "name": "x"}))
            .unwrap_err();
        match err {
            CoreError::UnknownBuilderType {
                type_name,
                known,
                suggestion,
            } => {
                assert_eq!(type_name, "Secrets");
                assert!(known.contains(&"Secret".to_string()));
                assert_eq!(suggestion.as_deref(), Some("Secret"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_type_case_insensitive_suggestion() {
        let registry = BuilderRegistry::with_builtins();
        let err = registry.decode(json!({"type": "configmap"})).unwrap_err();
        assert!(matches!(
            err,
            CoreError::UnknownBuilderType { suggestion: Some(ref s), .. } if s == "ConfigMap"
        ));
    }

    #[test]
    fn test_missing_type_field() {
        let registry = BuilderRegistry::with_builtins();
        let err = registry.decode(json!({"name": "web"})).unwrap_err();
        assert!(err.to_string().contains("'web' has no 'type' field"));
    }

    #[test]
    fn test_bad_field_reports_name() {
        let registry = BuilderRegistry::with_builtins();
        let err = registry
            .decode(json!({"type": "App", "name": "web", "ports": "eighty"}))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidDefinition { .. }));
        assert!(err.to_string().contains("'web'"));
    }

    #[test]
    fn test_decode_group_recursively() {
        let registry = BuilderRegistry::with_builtins();
        let group = registry
            .decode_yaml(
                r#"
type: AppGroup
name: shop
namespace: shop
createNamespace: true
members:
  - type: App
    name: web
    namespace: shop
    image: web:1
  - type: Secret
    name: db
    namespace: shop
    sources:
      - source: literal
        key: PASSWORD
        value: pw
"#,
            )
            .unwrap();
        assert_eq!(group.type_name(), "AppGroup");
        let kinds: Vec<_> = group
            .generate_kubernetes_resources()
            .unwrap()
            .iter()
            .filter_map(|r| r.kind().map(String::from))
            .collect();
        assert_eq!(kinds, vec!["Namespace", "Deployment", "Secret"]);

        let again = registry.decode(encode(group.as_ref()).unwrap()).unwrap();
        assert_eq!(
            again.generate_kubernetes_resources().unwrap(),
            group.generate_kubernetes_resources().unwrap()
        );
    }

    #[test]
    fn test_custom_decoder() {
        fn decode_alias(
            mut definition: JsonValue,
            registry: &BuilderRegistry,
        ) -> Result<Box<dyn Builder>> {
            definition["type"] = json!("App");
            registry.decode(definition)
        }

        let mut registry = BuilderRegistry::with_builtins();
        registry.register("WebApp", decode_alias);
        let builder = registry
            .decode(json!({"type": "WebApp", "name": "site"}))
            .unwrap();
        assert_eq!(builder.type_name(), "App");
    }
}
