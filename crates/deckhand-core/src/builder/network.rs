use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};
use std::collections::BTreeMap;

use super::meta::{ObjectMeta, meta_setters, string_map};
use super::workload::Protocol;
use super::{Builder, OutputFormat, tagged_definition};
use crate::error::Result;
use crate::resource::Resource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyType {
    Ingress,
    Egress,
}

impl PolicyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ingress => "Ingress",
            Self::Egress => "Egress",
        }
    }
}

/// Traffic source (ingress) or destination (egress)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Peer {
    /// Pods in the policy's namespace carrying these labels
    Pods { labels: BTreeMap<String, String> },
    /// Every pod in namespaces carrying these labels
    Namespaces { labels: BTreeMap<String, String> },
    /// An IP block, optionally with holes
    Cidr {
        cidr: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        except: Vec<String>,
    },
}

impl Peer {
    /// Pods selected by `app: {name}`
    pub fn app(name: impl Into<String>) -> Self {
        Self::Pods {
            labels: BTreeMap::from([("app".to_string(), name.into())]),
        }
    }

    pub fn namespace(name: impl Into<String>) -> Self {
        Self::Namespaces {
            labels: BTreeMap::from([(
                "kubernetes.io/metadata.name".to_string(),
                name.into(),
            )]),
        }
    }

    pub fn cidr(cidr: impl Into<String>) -> Self {
        Self::Cidr {
            cidr: cidr.into(),
            except: Vec::new(),
        }
    }

    fn to_json(&self) -> JsonValue {
        match self {
            Self::Pods { labels } => json!({"podSelector": {"matchLabels": string_map(labels)}}),
            Self::Namespaces { labels } => {
                json!({"namespaceSelector": {"matchLabels": string_map(labels)}})
            }
            Self::Cidr { cidr, except } => {
                let mut block = Map::new();
                block.insert("cidr".into(), json!(cidr));
                if !except.is_empty() {
                    block.insert("except".into(), json!(except));
                }
                json!({"ipBlock": block})
            }
        }
    }
}

/// One allow rule: any of `peers` on any of `ports`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficRule {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub peers: Vec<Peer>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<(u16, Protocol)>,
}

impl TrafficRule {
    fn to_json(&self, direction: PolicyType) -> JsonValue {
        let mut rule = Map::new();
        if !self.peers.is_empty() {
            let key = match direction {
                PolicyType::Ingress => "from",
                PolicyType::Egress => "to",
            };
            let peers: Vec<JsonValue> = self.peers.iter().map(Peer::to_json).collect();
            rule.insert(key.into(), JsonValue::Array(peers));
        }
        if !self.ports.is_empty() {
            let ports: Vec<JsonValue> = self
                .ports
                .iter()
                .map(|(port, protocol)| json!({"port": port, "protocol": protocol.as_str()}))
                .collect();
            rule.insert("ports".into(), JsonValue::Array(ports));
        }
        JsonValue::Object(rule)
    }
}

/// A NetworkPolicy applying to pods selected by label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkPolicy {
    #[serde(flatten)]
    meta: ObjectMeta,

    /// Empty selects every pod in the namespace
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pod_selector: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    ingress: Vec<TrafficRule>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    egress: Vec<TrafficRule>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    policy_types: Vec<PolicyType>,
}

impl NetworkPolicy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            meta: ObjectMeta::new(name),
            pod_selector: BTreeMap::new(),
            ingress: Vec::new(),
            egress: Vec::new(),
            policy_types: Vec::new(),
        }
    }

    meta_setters!(meta);

    /// Apply to pods labelled `app: {name}`
    pub fn for_app(mut self, name: impl Into<String>) -> Self {
        self.pod_selector.insert("app".into(), name.into());
        self
    }

    pub fn pod_selector(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.pod_selector.insert(key.into(), value.into());
        self
    }

    /// Allow traffic from `peer` on `port`
    pub fn allow_from(mut self, peer: Peer, port: u16) -> Self {
        self.ingress.push(TrafficRule {
            peers: vec![peer],
            ports: vec![(port, Protocol::Tcp)],
        });
        self.add_type(PolicyType::Ingress);
        self
    }

    /// Allow traffic to `peer` on `port`
    pub fn allow_to(mut self, peer: Peer, port: u16) -> Self {
        self.egress.push(TrafficRule {
            peers: vec![peer],
            ports: vec![(port, Protocol::Tcp)],
        });
        self.add_type(PolicyType::Egress);
        self
    }

    pub fn ingress_rule(mut self, rule: TrafficRule) -> Self {
        self.ingress.push(rule);
        self.add_type(PolicyType::Ingress);
        self
    }

    pub fn egress_rule(mut self, rule: TrafficRule) -> Self {
        self.egress.push(rule);
        self.add_type(PolicyType::Egress);
        self
    }

    /// Allow DNS lookups to kube-system
    pub fn allow_dns(mut self) -> Self {
        self.egress.push(TrafficRule {
            peers: vec![Peer::namespace("kube-system")],
            ports: vec![(53, Protocol::Udp), (53, Protocol::Tcp)],
        });
        self.add_type(PolicyType::Egress);
        self
    }

    /// Deny all ingress traffic not allowed by another policy
    pub fn deny_all_ingress(mut self) -> Self {
        self.add_type(PolicyType::Ingress);
        self
    }

    /// Deny all egress traffic not allowed by another policy
    pub fn deny_all_egress(mut self) -> Self {
        self.add_type(PolicyType::Egress);
        self
    }

    fn add_type(&mut self, policy_type: PolicyType) {
        if !self.policy_types.contains(&policy_type) {
            self.policy_types.push(policy_type);
        }
    }
}

impl Builder for NetworkPolicy {
    fn type_name(&self) -> &'static str {
        "NetworkPolicy"
    }

    fn name(&self) -> &str {
        self.meta.name()
    }

    fn namespace(&self) -> &str {
        &self.meta.namespace
    }

    fn generate_kubernetes_resources(&self) -> Result<Vec<Resource>> {
        let mut spec = Map::new();
        spec.insert(
            "podSelector".into(),
            json!({"matchLabels": string_map(&self.pod_selector)}),
        );
        let types: Vec<&str> = self.policy_types.iter().map(PolicyType::as_str).collect();
        spec.insert("policyTypes".into(), json!(types));
        if self.policy_types.contains(&PolicyType::Ingress) {
            let rules: Vec<JsonValue> = self
                .ingress
                .iter()
                .map(|r| r.to_json(PolicyType::Ingress))
                .collect();
            spec.insert("ingress".into(), JsonValue::Array(rules));
        }
        if self.policy_types.contains(&PolicyType::Egress) {
            let rules: Vec<JsonValue> = self
                .egress
                .iter()
                .map(|r| r.to_json(PolicyType::Egress))
                .collect();
            spec.insert("egress".into(), JsonValue::Array(rules));
        }

        Ok(vec![Resource::new(json!({
            "apiVersion": "networking.k8s.io/v1",
            "kind": "NetworkPolicy",
            "metadata": self.meta.to_json(true),
            "spec": spec,
        }))])
    }

    fn validate(&self) -> Vec<String> {
        let mut problems = self.meta.name_problems("NetworkPolicy");
        if self.policy_types.is_empty() {
            problems.push(format!(
                "NetworkPolicy '{}' has no rules and restricts nothing",
                self.meta.name()
            ));
        }
        problems
    }

    fn compatibility(&self, format: OutputFormat) -> Vec<String> {
        match format {
            OutputFormat::Compose => vec![format!(
                "NetworkPolicy '{}' has no compose equivalent and is skipped",
                self.meta.name()
            )],
            _ => Vec::new(),
        }
    }

    fn to_definition(&self) -> Result<JsonValue> {
        tagged_definition(self.type_name(), self)
    }
}
