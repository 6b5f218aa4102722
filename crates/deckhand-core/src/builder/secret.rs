use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};

use super::meta::{ObjectMeta, meta_setters, string_map};
use super::source::{DataSource, MissingSourcePolicy, source_setters};
use super::{Builder, OutputFormat, tagged_definition};
use crate::error::Result;
use crate::resource::Resource;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecretType {
    #[default]
    Opaque,
    Tls,
    DockerConfigJson,
    BasicAuth,
    ServiceAccountToken,
}

impl SecretType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Opaque => "Opaque",
            Self::Tls => "kubernetes.io/tls",
            Self::DockerConfigJson => "kubernetes.io/dockerconfigjson",
            Self::BasicAuth => "kubernetes.io/basic-auth",
            Self::ServiceAccountToken => "kubernetes.io/service-account-token",
        }
    }

    /// Keys the type requires to be present
    fn required_keys(&self) -> &'static [&'static str] {
        match self {
            Self::Tls => &["tls.crt", "tls.key"],
            Self::DockerConfigJson => &[".dockerconfigjson"],
            Self::BasicAuth => &["username", "password"],
            Self::Opaque | Self::ServiceAccountToken => &[],
        }
    }
}

/// A Secret, emitted with plaintext `stringData` and base64 `data` for binary entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Secret {
    #[serde(flatten)]
    meta: ObjectMeta,

    #[serde(default)]
    secret_type: SecretType,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    sources: Vec<DataSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) mount_path: Option<String>,

    #[serde(default)]
    missing_sources: MissingSourcePolicy,

    #[serde(default)]
    immutable: bool,
}

impl Secret {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            meta: ObjectMeta::new(name),
            secret_type: SecretType::Opaque,
            sources: Vec::new(),
            mount_path: None,
            missing_sources: MissingSourcePolicy::Error,
            immutable: false,
        }
    }

    meta_setters!(meta);
    source_setters!();

    pub fn secret_type(mut self, secret_type: SecretType) -> Self {
        self.secret_type = secret_type;
        self
    }

    /// A `kubernetes.io/tls` secret from certificate and key files
    pub fn tls(
        name: impl Into<String>,
        cert: impl Into<std::path::PathBuf>,
        key: impl Into<std::path::PathBuf>,
    ) -> Self {
        Self::new(name)
            .secret_type(SecretType::Tls)
            .from_file_as("tls.crt", cert)
            .from_file_as("tls.key", key)
    }

    /// A `kubernetes.io/dockerconfigjson` pull secret for one registry
    pub fn docker_config(
        name: impl Into<String>,
        registry: &str,
        username: &str,
        password: &str,
    ) -> Self {
        let auth = BASE64.encode(format!("{username}:{password}"));
        let config = json!({
            "auths": {
                registry: {
                    "username": username,
                    "password": password,
                    "auth": auth,
                }
            }
        });
        let mut secret = Self::new(name).secret_type(SecretType::DockerConfigJson);
        secret.sources.push(DataSource::Literal {
            key: ".dockerconfigjson".into(),
            value: config.to_string(),
        });
        secret
    }

    /// A `kubernetes.io/basic-auth` secret
    pub fn basic_auth(name: impl Into<String>, username: &str, password: &str) -> Self {
        Self::new(name)
            .secret_type(SecretType::BasicAuth)
            .add("username", username)
            .add("password", password)
    }

    pub fn get_secret_type(&self) -> SecretType {
        self.secret_type
    }

    pub fn get_mount_path(&self) -> Option<&str> {
        self.mount_path.as_deref()
    }
}

impl Builder for Secret {
    fn type_name(&self) -> &'static str {
        "Secret"
    }

    fn name(&self) -> &str {
        self.meta.name()
    }

    fn namespace(&self) -> &str {
        &self.meta.namespace
    }

    fn generate_kubernetes_resources(&self) -> Result<Vec<Resource>> {
        let resolved = self.resolve()?;

        let mut record = Map::new();
        record.insert("apiVersion".into(), json!("v1"));
        record.insert("kind".into(), json!("Secret"));
        record.insert("metadata".into(), self.meta.to_json(true));
        record.insert("type".into(), json!(self.secret_type.as_str()));
        record.insert("stringData".into(), string_map(&resolved.text));
        if !resolved.binary.is_empty() {
            let data: Map<String, JsonValue> = resolved
                .binary
                .iter()
                .map(|(k, v)| (k.clone(), JsonValue::String(BASE64.encode(v))))
                .collect();
            record.insert("data".into(), JsonValue::Object(data));
        }
        if self.immutable {
            record.insert("immutable".into(), json!(true));
        }

        Ok(vec![Resource::new(JsonValue::Object(record))])
    }

    fn validate(&self) -> Vec<String> {
        let mut problems = self.meta.name_problems("Secret");
        let resolved = match self.resolve() {
            Ok(resolved) => resolved,
            Err(e) => {
                problems.push(e.to_string());
                return problems;
            }
        };
        for key in self.secret_type.required_keys() {
            if !resolved.text.contains_key(*key) && !resolved.binary.contains_key(*key) {
                problems.push(format!(
                    "Secret '{}' of type {} is missing required key '{}'",
                    self.meta.name(),
                    self.secret_type.as_str(),
                    key
                ));
            }
        }
        if resolved.is_empty() {
            problems.push(format!("Secret '{}' has no data", self.meta.name()));
        }
        problems
    }

    fn compatibility(&self, format: OutputFormat) -> Vec<String> {
        match format {
            OutputFormat::Compose if self.secret_type != SecretType::Opaque => vec![format!(
                "Secret '{}': type {} has no compose equivalent; entries are exposed as plain environment",
                self.meta.name(),
                self.secret_type.as_str()
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
    use crate::error::{ConfigSourceError, CoreError};

    #[test]
    fn test_single_literal() {
        let resources = Secret::new("s").add("k", "v").generate_kubernetes_resources().unwrap();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].kind(), Some("Secret"));
        assert_eq!(resources[0].get("stringData"), Some(&json!({"k": "v"})));
        assert!(resources[0].get("data").is_none());
        assert_eq!(resources[0].get("type"), Some(&json!("Opaque")));
    }

    #[test]
    fn test_binary_goes_to_data() {
        let resources = Secret::new("s")
            .add_binary("blob", vec![0xff, 0x00, 0x10])
            .generate_kubernetes_resources()
            .unwrap();
        assert_eq!(resources[0].get("data.blob"), Some(&json!("/wAQ")));
    }

    #[test]
    fn test_docker_config() {
        let secret = Secret::docker_config("pull", "ghcr.io", "bot", "hunter2");
        let resources = secret.generate_kubernetes_resources().unwrap();
        let raw = resources[0]
            .get("stringData")
            .and_then(|d| d.get(".dockerconfigjson"))
            .and_then(|v| v.as_str())
            .unwrap();
        let parsed: JsonValue = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed["auths"]["ghcr.io"]["auth"], "Ym90Omh1bnRlcjI=");
        assert_eq!(
            resources[0].get("type"),
            Some(&json!("kubernetes.io/dockerconfigjson"))
        );
        assert!(secret.validate().is_empty());
    }

    #[test]
    fn test_missing_file_is_an_error_by_default() {
        let err = Secret::new("tls")
            .from_file("/nonexistent/deckhand/tls.crt")
            .generate_kubernetes_resources()
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::ConfigSource(ConfigSourceError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_validate_tls_missing_key() {
        let secret = Secret::new("tls")
            .secret_type(SecretType::Tls)
            .add("tls.crt", "cert");
        let problems = secret.validate();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("tls.key"));
    }
}
