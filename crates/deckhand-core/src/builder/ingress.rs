use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};

use super::meta::{ObjectMeta, meta_setters};
use super::{Builder, OutputFormat, tagged_definition};
use crate::error::Result;
use crate::names;
use crate::resource::Resource;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathType {
    #[default]
    Prefix,
    Exact,
    ImplementationSpecific,
}

impl PathType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prefix => "Prefix",
            Self::Exact => "Exact",
            Self::ImplementationSpecific => "ImplementationSpecific",
        }
    }
}

/// One path routed to a backend Service
///
/// An empty `service` or a zero `port` is filled in by the owning `App`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressPath {
    pub path: String,
    #[serde(default)]
    pub path_type: PathType,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub paths: Vec<IngressPath>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressTls {
    pub hosts: Vec<String>,
    pub secret_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ingress {
    #[serde(flatten)]
    meta: ObjectMeta,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    class_name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) rules: Vec<IngressRule>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tls: Vec<IngressTls>,
}

impl Ingress {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            meta: ObjectMeta::new(name),
            class_name: None,
            rules: Vec::new(),
            tls: Vec::new(),
        }
    }

    meta_setters!(meta);

    pub fn class_name(mut self, class: impl Into<String>) -> Self {
        self.class_name = Some(class.into());
        self
    }

    /// Route `host` to the owning App's Service
    pub fn host(self, host: impl Into<String>) -> Self {
        self.route(host, "/", "", 0)
    }

    /// Route `host` + `path` to `service:port`
    pub fn route(
        mut self,
        host: impl Into<String>,
        path: impl Into<String>,
        service: impl Into<String>,
        port: u16,
    ) -> Self {
        let host = host.into();
        let entry = IngressPath {
            path: path.into(),
            path_type: PathType::Prefix,
            service: service.into(),
            port,
        };
        match self
            .rules
            .iter_mut()
            .find(|r| r.host.as_deref() == Some(host.as_str()))
        {
            Some(rule) => rule.paths.push(entry),
            None => self.rules.push(IngressRule {
                host: Some(host),
                paths: vec![entry],
            }),
        }
        self
    }

    pub fn rule(mut self, rule: IngressRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Terminate TLS for `hosts` with the certificate in `secret_name`
    pub fn tls<I, S>(mut self, hosts: I, secret_name: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tls.push(IngressTls {
            hosts: hosts.into_iter().map(Into::into).collect(),
            secret_name: secret_name.into(),
        });
        self
    }

    pub fn rules(&self) -> &[IngressRule] {
        &self.rules
    }

    pub fn hosts(&self) -> Vec<&str> {
        self.rules.iter().filter_map(|r| r.host.as_deref()).collect()
    }

    /// Fill unset backends with `service:port`
    pub(crate) fn with_default_backend(&self, service: &str, port: u16) -> Self {
        let mut ingress = self.clone();
        for rule in &mut ingress.rules {
            for path in &mut rule.paths {
                if path.service.is_empty() {
                    path.service = service.to_string();
                }
                if path.port == 0 {
                    path.port = port;
                }
            }
        }
        ingress
    }
}

impl Builder for Ingress {
    fn type_name(&self) -> &'static str {
        "Ingress"
    }

    fn name(&self) -> &str {
        self.meta.name()
    }

    fn namespace(&self) -> &str {
        &self.meta.namespace
    }

    fn generate_kubernetes_resources(&self) -> Result<Vec<Resource>> {
        let mut spec = Map::new();
        if let Some(class) = &self.class_name {
            spec.insert("ingressClassName".into(), json!(class));
        }
        if !self.tls.is_empty() {
            let tls: Vec<JsonValue> = self
                .tls
                .iter()
                .map(|t| json!({"hosts": t.hosts, "secretName": t.secret_name}))
                .collect();
            spec.insert("tls".into(), JsonValue::Array(tls));
        }
        let rules: Vec<JsonValue> = self
            .rules
            .iter()
            .map(|rule| {
                let paths: Vec<JsonValue> = rule
                    .paths
                    .iter()
                    .map(|p| {
                        json!({
                            "path": p.path,
                            "pathType": p.path_type.as_str(),
                            "backend": {
                                "service": {
                                    "name": p.service,
                                    "port": {"number": p.port},
                                }
                            }
                        })
                    })
                    .collect();
                let mut entry = Map::new();
                if let Some(host) = &rule.host {
                    entry.insert("host".into(), json!(host));
                }
                entry.insert("http".into(), json!({"paths": paths}));
                JsonValue::Object(entry)
            })
            .collect();
        spec.insert("rules".into(), JsonValue::Array(rules));

        Ok(vec![Resource::new(json!({
            "apiVersion": "networking.k8s.io/v1",
            "kind": "Ingress",
            "metadata": self.meta.to_json(true),
            "spec": spec,
        }))])
    }

    fn validate(&self) -> Vec<String> {
        let mut problems = self.meta.name_problems("Ingress");
        let name = self.meta.name();
        if self.rules.is_empty() {
            problems.push(format!("Ingress '{name}' has no rules"));
        }
        for rule in &self.rules {
            if let Some(host) = &rule.host {
                let bare = host.strip_prefix("*.").unwrap_or(host);
                if !names::is_valid_qualified_name(bare) {
                    problems.push(format!("Ingress '{name}' has invalid host '{host}'"));
                }
            }
            for path in &rule.paths {
                if !path.path.starts_with('/') {
                    problems.push(format!(
                        "Ingress '{name}' path '{}' must start with '/'",
                        path.path
                    ));
                }
                if path.service.is_empty() {
                    problems.push(format!(
                        "Ingress '{name}' path '{}' has no backend service",
                        path.path
                    ));
                }
            }
        }
        problems
    }

    fn compatibility(&self, format: OutputFormat) -> Vec<String> {
        match format {
            OutputFormat::Compose => vec![format!(
                "Ingress '{}' has no compose equivalent; publish ports instead",
                self.meta.name()
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

    #[test]
    fn test_route_groups_paths_by_host() {
        let ingress = Ingress::new("web")
            .class_name("nginx")
            .route("example.com", "/", "web", 80)
            .route("example.com", "/api", "api", 8080)
            .tls(["example.com"], "web-tls");
        assert_eq!(ingress.rules().len(), 1);

        let resources = ingress.generate_kubernetes_resources().unwrap();
        let record = &resources[0];
        assert_eq!(record.get("spec.ingressClassName"), Some(&json!("nginx")));
        let paths = record
            .get("spec.rules")
            .and_then(|r| r.get(0))
            .and_then(|r| r.get("http"))
            .and_then(|h| h.get("paths"))
            .and_then(JsonValue::as_array)
            .unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[1]["backend"]["service"]["name"], "api");
        assert_eq!(paths[1]["backend"]["service"]["port"]["number"], 8080);
        assert!(ingress.validate().is_empty());
    }

    #[test]
    fn test_default_backend_fills_gaps() {
        let ingress = Ingress::new("web")
            .host("example.com")
            .with_default_backend("web", 8080);
        assert_eq!(ingress.rules()[0].paths[0].service, "web");
        assert_eq!(ingress.rules()[0].paths[0].port, 8080);
    }

    #[test]
    fn test_validate_unbound_path() {
        let problems = Ingress::new("web").host("example.com").validate();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("no backend service"));
    }
}
