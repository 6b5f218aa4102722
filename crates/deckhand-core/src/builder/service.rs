use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};
use std::collections::BTreeMap;

use super::meta::{ObjectMeta, meta_setters, string_map};
use super::workload::Protocol;
use super::{Builder, tagged_definition};
use crate::error::Result;
use crate::resource::Resource;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceType {
    #[default]
    ClusterIP,
    NodePort,
    LoadBalancer,
    /// ClusterIP `None`, for stable per-pod DNS
    Headless,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePort {
    pub port: u16,
    pub target_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_port: Option<u16>,
    #[serde(default)]
    pub protocol: Protocol,
}

impl ServicePort {
    pub fn new(port: u16, target_port: u16) -> Self {
        Self {
            port,
            target_port,
            name: None,
            node_port: None,
            protocol: Protocol::Tcp,
        }
    }

    fn to_json(&self, index: usize) -> JsonValue {
        let mut port = Map::new();
        let name = self.name.clone().unwrap_or_else(|| {
            if index == 0 {
                "http".to_string()
            } else {
                format!("port-{}", self.port)
            }
        });
        port.insert("name".into(), json!(name));
        port.insert("port".into(), json!(self.port));
        port.insert("targetPort".into(), json!(self.target_port));
        port.insert("protocol".into(), json!(self.protocol.as_str()));
        if let Some(node_port) = self.node_port {
            port.insert("nodePort".into(), json!(node_port));
        }
        JsonValue::Object(port)
    }
}

/// A standalone Service selecting pods by label
///
/// Apps create their own Service; this builder covers Services that front
/// workloads defined elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    #[serde(flatten)]
    meta: ObjectMeta,

    #[serde(default)]
    service_type: ServiceType,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    ports: Vec<ServicePort>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    selector: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_affinity: Option<String>,
}

impl Service {
    /// A ClusterIP Service selecting `app: {name}` until told otherwise
    pub fn new(name: impl Into<String>) -> Self {
        let meta = ObjectMeta::new(name);
        let selector = meta.selector();
        Self {
            meta,
            service_type: ServiceType::ClusterIP,
            ports: Vec::new(),
            selector,
            session_affinity: None,
        }
    }

    meta_setters!(meta);

    pub fn service_type(mut self, service_type: ServiceType) -> Self {
        self.service_type = service_type;
        self
    }

    pub fn headless(self) -> Self {
        self.service_type(ServiceType::Headless)
    }

    /// Expose `port`, forwarding to the same port on the pods
    pub fn port(mut self, port: u16) -> Self {
        self.ports.push(ServicePort::new(port, port));
        self
    }

    pub fn port_mapping(mut self, port: u16, target_port: u16) -> Self {
        self.ports.push(ServicePort::new(port, target_port));
        self
    }

    pub fn add_port(mut self, port: ServicePort) -> Self {
        self.ports.push(port);
        self
    }

    /// Replace the default selector
    pub fn selector<I, K, V>(mut self, selector: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.selector = selector
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    pub fn session_affinity(mut self, affinity: impl Into<String>) -> Self {
        self.session_affinity = Some(affinity.into());
        self
    }

    pub fn ports(&self) -> &[ServicePort] {
        &self.ports
    }

    /// The `spec` of a Service record
    pub(crate) fn spec(&self) -> JsonValue {
        let mut spec = Map::new();
        match self.service_type {
            ServiceType::Headless => {
                spec.insert("clusterIP".into(), json!("None"));
            }
            ServiceType::ClusterIP => {
                spec.insert("type".into(), json!("ClusterIP"));
            }
            ServiceType::NodePort => {
                spec.insert("type".into(), json!("NodePort"));
            }
            ServiceType::LoadBalancer => {
                spec.insert("type".into(), json!("LoadBalancer"));
            }
        }
        spec.insert("selector".into(), string_map(&self.selector));
        let ports: Vec<JsonValue> = self
            .ports
            .iter()
            .enumerate()
            .map(|(i, p)| p.to_json(i))
            .collect();
        spec.insert("ports".into(), JsonValue::Array(ports));
        if let Some(affinity) = &self.session_affinity {
            spec.insert("sessionAffinity".into(), json!(affinity));
        }
        JsonValue::Object(spec)
    }
}

impl Builder for Service {
    fn type_name(&self) -> &'static str {
        "Service"
    }

    fn name(&self) -> &str {
        self.meta.name()
    }

    fn namespace(&self) -> &str {
        &self.meta.namespace
    }

    fn generate_kubernetes_resources(&self) -> Result<Vec<Resource>> {
        Ok(vec![Resource::new(json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": self.meta.to_json(true),
            "spec": self.spec(),
        }))])
    }

    fn validate(&self) -> Vec<String> {
        let mut problems = self.meta.name_problems("Service");
        let name = self.meta.name();
        if self.ports.is_empty() && self.service_type != ServiceType::Headless {
            problems.push(format!("Service '{name}' exposes no ports"));
        }
        if self.selector.is_empty() {
            problems.push(format!("Service '{name}' has an empty selector"));
        }
        for port in &self.ports {
            if port.node_port.is_some() && self.service_type != ServiceType::NodePort {
                problems.push(format!(
                    "Service '{name}' sets nodePort {} on a non-NodePort service",
                    port.port
                ));
            }
        }
        problems
    }

    fn to_definition(&self) -> Result<JsonValue> {
        tagged_definition(self.type_name(), self)
    }
}
