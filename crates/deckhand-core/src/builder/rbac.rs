//! RBAC builders
//!
//! `ServiceAccount`, `Role`/`ClusterRole` and their bindings. Each emits one
//! record, except bindings configured with [`RoleBinding::one_per_subject`]
//! (or the cluster equivalent), which emit `{name}-{subject}` per subject.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};

use super::meta::{ObjectMeta, meta_setters};
use super::{Builder, OutputFormat, tagged_definition};
use crate::error::Result;
use crate::resource::Resource;

const RBAC_API: &str = "rbac.authorization.k8s.io/v1";

/// One permission rule of a Role or ClusterRole
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRule {
    #[serde(default)]
    pub api_groups: Vec<String>,
    pub resources: Vec<String>,
    pub verbs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_names: Vec<String>,
}

impl PolicyRule {
    /// `api_group` is `""` for the core group
    pub fn new<R, V>(api_group: &str, resources: R, verbs: V) -> Self
    where
        R: IntoIterator,
        R::Item: Into<String>,
        V: IntoIterator,
        V::Item: Into<String>,
    {
        Self {
            api_groups: vec![api_group.to_string()],
            resources: resources.into_iter().map(Into::into).collect(),
            verbs: verbs.into_iter().map(Into::into).collect(),
            resource_names: Vec::new(),
        }
    }

    /// `get`, `list` and `watch` on `resources`
    pub fn read_only<R>(api_group: &str, resources: R) -> Self
    where
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self::new(api_group, resources, ["get", "list", "watch"])
    }

    fn to_json(&self) -> JsonValue {
        let mut rule = Map::new();
        rule.insert("apiGroups".into(), json!(self.api_groups));
        rule.insert("resources".into(), json!(self.resources));
        rule.insert("verbs".into(), json!(self.verbs));
        if !self.resource_names.is_empty() {
            rule.insert("resourceNames".into(), json!(self.resource_names));
        }
        JsonValue::Object(rule)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubjectKind {
    ServiceAccount,
    User,
    Group,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub kind: SubjectKind,
    pub name: String,
    /// Only meaningful for service accounts; defaults to the binding's namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl Subject {
    pub fn service_account(name: impl Into<String>) -> Self {
        Self {
            kind: SubjectKind::ServiceAccount,
            name: name.into(),
            namespace: None,
        }
    }

    pub fn user(name: impl Into<String>) -> Self {
        Self {
            kind: SubjectKind::User,
            name: name.into(),
            namespace: None,
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self {
            kind: SubjectKind::Group,
            name: name.into(),
            namespace: None,
        }
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    fn to_json(&self, default_namespace: &str) -> JsonValue {
        match self.kind {
            SubjectKind::ServiceAccount => json!({
                "kind": "ServiceAccount",
                "name": self.name,
                "namespace": self.namespace.as_deref().unwrap_or(default_namespace),
            }),
            SubjectKind::User => json!({
                "kind": "User",
                "name": self.name,
                "apiGroup": "rbac.authorization.k8s.io",
            }),
            SubjectKind::Group => json!({
                "kind": "Group",
                "name": self.name,
                "apiGroup": "rbac.authorization.k8s.io",
            }),
        }
    }
}

/// The role a binding grants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRef {
    /// `Role` or `ClusterRole`
    pub kind: String,
    pub name: String,
}

impl RoleRef {
    pub fn role(name: impl Into<String>) -> Self {
        Self {
            kind: "Role".into(),
            name: name.into(),
        }
    }

    pub fn cluster_role(name: impl Into<String>) -> Self {
        Self {
            kind: "ClusterRole".into(),
            name: name.into(),
        }
    }

    fn to_json(&self) -> JsonValue {
        json!({
            "apiGroup": "rbac.authorization.k8s.io",
            "kind": self.kind,
            "name": self.name,
        })
    }
}

fn rbac_compatibility(kind: &str, name: &str, format: OutputFormat) -> Vec<String> {
    match format {
        OutputFormat::Compose => vec![format!(
            "{kind} '{name}' has no compose equivalent and is skipped"
        )],
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAccount {
    #[serde(flatten)]
    meta: ObjectMeta,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    automount_token: Option<bool>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    image_pull_secrets: Vec<String>,
}

impl ServiceAccount {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            meta: ObjectMeta::new(name),
            automount_token: None,
            image_pull_secrets: Vec::new(),
        }
    }

    meta_setters!(meta);

    pub fn automount_token(mut self, automount: bool) -> Self {
        self.automount_token = Some(automount);
        self
    }

    pub fn image_pull_secret(mut self, secret: impl Into<String>) -> Self {
        self.image_pull_secrets.push(secret.into());
        self
    }
}

impl Builder for ServiceAccount {
    fn type_name(&self) -> &'static str {
        "ServiceAccount"
    }

    fn name(&self) -> &str {
        self.meta.name()
    }

    fn namespace(&self) -> &str {
        &self.meta.namespace
    }

    fn generate_kubernetes_resources(&self) -> Result<Vec<Resource>> {
        let mut record = Map::new();
        record.insert("apiVersion".into(), json!("v1"));
        record.insert("kind".into(), json!("ServiceAccount"));
        record.insert("metadata".into(), self.meta.to_json(true));
        if let Some(automount) = self.automount_token {
            record.insert("automountServiceAccountToken".into(), json!(automount));
        }
        if !self.image_pull_secrets.is_empty() {
            let secrets: Vec<JsonValue> = self
                .image_pull_secrets
                .iter()
                .map(|s| json!({"name": s}))
                .collect();
            record.insert("imagePullSecrets".into(), JsonValue::Array(secrets));
        }
        Ok(vec![Resource::new(JsonValue::Object(record))])
    }

    fn validate(&self) -> Vec<String> {
        self.meta.name_problems("ServiceAccount")
    }

    fn compatibility(&self, format: OutputFormat) -> Vec<String> {
        rbac_compatibility("ServiceAccount", self.meta.name(), format)
    }

    fn to_definition(&self) -> Result<JsonValue> {
        tagged_definition(self.type_name(), self)
    }
}

/// Implements `Builder` for a role kind; `$namespaced` selects Role vs ClusterRole
macro_rules! role_builder {
    ($ty:ident, $kind:literal, $namespaced:expr) => {
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub struct $ty {
            #[serde(flatten)]
            meta: ObjectMeta,

            #[serde(default)]
            rules: Vec<PolicyRule>,
        }

        impl $ty {
            pub fn new(name: impl Into<String>) -> Self {
                Self {
                    meta: ObjectMeta::new(name),
                    rules: Vec::new(),
                }
            }

            meta_setters!(meta);

            pub fn rule(mut self, rule: PolicyRule) -> Self {
                self.rules.push(rule);
                self
            }

            /// Grant `verbs` on `resources` in `api_group` (`""` for core)
            pub fn allow<R, V>(self, api_group: &str, resources: R, verbs: V) -> Self
            where
                R: IntoIterator,
                R::Item: Into<String>,
                V: IntoIterator,
                V::Item: Into<String>,
            {
                self.rule(PolicyRule::new(api_group, resources, verbs))
            }

            pub fn rules(&self) -> &[PolicyRule] {
                &self.rules
            }
        }

        impl Builder for $ty {
            fn type_name(&self) -> &'static str {
                $kind
            }

            fn name(&self) -> &str {
                self.meta.name()
            }

            fn namespace(&self) -> &str {
                &self.meta.namespace
            }

            fn generate_kubernetes_resources(&self) -> Result<Vec<Resource>> {
                let rules: Vec<JsonValue> = self.rules.iter().map(PolicyRule::to_json).collect();
                Ok(vec![Resource::new(json!({
                    "apiVersion": RBAC_API,
                    "kind": $kind,
                    "metadata": self.meta.to_json($namespaced),
                    "rules": rules,
                }))])
            }

            fn validate(&self) -> Vec<String> {
                let mut problems = self.meta.name_problems($kind);
                if self.rules.is_empty() {
                    problems.push(format!("{} '{}' grants nothing", $kind, self.meta.name()));
                }
                for rule in &self.rules {
                    if rule.verbs.is_empty() || rule.resources.is_empty() {
                        problems.push(format!(
                            "{} '{}' has a rule without verbs or resources",
                            $kind,
                            self.meta.name()
                        ));
                    }
                }
                problems
            }

            fn compatibility(&self, format: OutputFormat) -> Vec<String> {
                rbac_compatibility($kind, self.meta.name(), format)
            }

            fn to_definition(&self) -> Result<JsonValue> {
                tagged_definition(self.type_name(), self)
            }
        }
    };
}

role_builder!(Role, "Role", true);
role_builder!(ClusterRole, "ClusterRole", false);

/// Implements `Builder` for a binding kind; `$namespaced` selects RoleBinding vs ClusterRoleBinding
macro_rules! binding_builder {
    ($ty:ident, $kind:literal, $namespaced:expr) => {
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub struct $ty {
            #[serde(flatten)]
            meta: ObjectMeta,

            role_ref: RoleRef,

            #[serde(default)]
            subjects: Vec<Subject>,

            #[serde(default)]
            one_per_subject: bool,
        }

        impl $ty {
            pub fn new(name: impl Into<String>, role_ref: RoleRef) -> Self {
                Self {
                    meta: ObjectMeta::new(name),
                    role_ref,
                    subjects: Vec::new(),
                    one_per_subject: false,
                }
            }

            meta_setters!(meta);

            pub fn subject(mut self, subject: Subject) -> Self {
                self.subjects.push(subject);
                self
            }

            /// Bind a ServiceAccount in the binding's namespace
            pub fn service_account(self, name: impl Into<String>) -> Self {
                self.subject(Subject::service_account(name))
            }

            /// Emit one binding per subject instead of one binding listing all
            pub fn one_per_subject(mut self) -> Self {
                self.one_per_subject = true;
                self
            }

            pub fn subjects(&self) -> &[Subject] {
                &self.subjects
            }

            fn record(&self, name: &str, subjects: &[Subject]) -> Resource {
                let subjects: Vec<JsonValue> = subjects
                    .iter()
                    .map(|s| s.to_json(&self.meta.namespace))
                    .collect();
                Resource::new(json!({
                    "apiVersion": RBAC_API,
                    "kind": $kind,
                    "metadata": self.meta.to_json_named(name, $namespaced),
                    "roleRef": self.role_ref.to_json(),
                    "subjects": subjects,
                }))
            }
        }

        impl Builder for $ty {
            fn type_name(&self) -> &'static str {
                $kind
            }

            fn name(&self) -> &str {
                self.meta.name()
            }

            fn namespace(&self) -> &str {
                &self.meta.namespace
            }

            fn generate_kubernetes_resources(&self) -> Result<Vec<Resource>> {
                if self.one_per_subject && self.subjects.len() > 1 {
                    return Ok(self
                        .subjects
                        .iter()
                        .map(|s| {
                            let name = format!("{}-{}", self.meta.name(), s.name);
                            self.record(&name, std::slice::from_ref(s))
                        })
                        .collect());
                }
                Ok(vec![self.record(self.meta.name(), &self.subjects)])
            }

            fn validate(&self) -> Vec<String> {
                let mut problems = self.meta.name_problems($kind);
                if self.subjects.is_empty() {
                    problems.push(format!("{} '{}' has no subjects", $kind, self.meta.name()));
                }
                if !$namespaced && self.role_ref.kind != "ClusterRole" {
                    problems.push(format!(
                        "{} '{}' must reference a ClusterRole, not a {}",
                        $kind,
                        self.meta.name(),
                        self.role_ref.kind
                    ));
                }
                problems
            }

            fn compatibility(&self, format: OutputFormat) -> Vec<String> {
                rbac_compatibility($kind, self.meta.name(), format)
            }

            fn to_definition(&self) -> Result<JsonValue> {
                tagged_definition(self.type_name(), self)
            }
        }
    };
}

binding_builder!(RoleBinding, "RoleBinding", true);
binding_builder!(ClusterRoleBinding, "ClusterRoleBinding", false);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_record() {
        let role = Role::new("pod-reader")
            .namespace("apps")
            .rule(PolicyRule::read_only("", ["pods"]));
        let resources = role.generate_kubernetes_resources().unwrap();
        assert_eq!(resources[0].api_version(), Some(RBAC_API));
        assert_eq!(resources[0].namespace(), Some("apps"));
        assert_eq!(
            resources[0].get("rules").and_then(|r| r.get(0)),
            Some(&json!({"apiGroups": [""], "resources": ["pods"], "verbs": ["get", "list", "watch"]}))
        );
    }

    #[test]
    fn test_cluster_role_has_no_namespace() {
        let role = ClusterRole::new("admin").allow("*", ["*"], ["*"]);
        let resources = role.generate_kubernetes_resources().unwrap();
        assert_eq!(resources[0].namespace(), None);
    }

    #[test]
    fn test_binding_single_record() {
        let binding = RoleBinding::new("readers", RoleRef::role("pod-reader"))
            .namespace("apps")
            .service_account("ci")
            .subject(Subject::user("alice"));
        let resources = binding.generate_kubernetes_resources().unwrap();
        assert_eq!(resources.len(), 1);
        let subjects = resources[0].get("subjects").unwrap();
        assert_eq!(subjects[0]["namespace"], "apps");
        assert_eq!(subjects[1]["apiGroup"], "rbac.authorization.k8s.io");
    }

    #[test]
    fn test_binding_one_per_subject() {
        let binding = ClusterRoleBinding::new("viewers", RoleRef::cluster_role("view"))
            .subject(Subject::group("devs"))
            .subject(Subject::group("ops"))
            .one_per_subject();
        let resources = binding.generate_kubernetes_resources().unwrap();
        let names: Vec<_> = resources.iter().filter_map(|r| r.name()).collect();
        assert_eq!(names, vec!["viewers-devs", "viewers-ops"]);
        assert!(resources.iter().all(|r| r.namespace().is_none()));
        assert!(binding.validate().is_empty());
    }

    #[test]
    fn test_cluster_binding_requires_cluster_role() {
        let problems = ClusterRoleBinding::new("bad", RoleRef::role("local"))
            .service_account("ci")
            .validate();
        assert_eq!(problems.len(), 1);
    }
}
