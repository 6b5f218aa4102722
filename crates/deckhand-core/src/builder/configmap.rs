use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};
use sha2::{Digest, Sha256};

use super::meta::{ObjectMeta, meta_setters, string_map};
use super::source::{DataSource, MissingSourcePolicy, source_setters};
use super::{Builder, tagged_definition};
use crate::error::Result;
use crate::resource::Resource;

/// A ConfigMap, emitted with text entries under `data` and the rest under `binaryData`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMap {
    #[serde(flatten)]
    meta: ObjectMeta,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    sources: Vec<DataSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) mount_path: Option<String>,

    #[serde(default)]
    missing_sources: MissingSourcePolicy,

    #[serde(default)]
    immutable: bool,
}

impl ConfigMap {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            meta: ObjectMeta::new(name),
            sources: Vec::new(),
            mount_path: None,
            missing_sources: MissingSourcePolicy::Error,
            immutable: false,
        }
    }

    meta_setters!(meta);
    source_setters!();

    pub fn get_mount_path(&self) -> Option<&str> {
        self.mount_path.as_deref()
    }

    /// SHA-256 over the resolved entries, used to roll pods on config change
    pub fn checksum(&self) -> Result<String> {
        let resolved = self.resolve()?;
        let mut hasher = Sha256::new();
        for (k, v) in &resolved.text {
            hasher.update(k.as_bytes());
            hasher.update([0]);
            hasher.update(v.as_bytes());
            hasher.update([0]);
        }
        for (k, v) in &resolved.binary {
            hasher.update(k.as_bytes());
            hasher.update([0]);
            hasher.update(v);
            hasher.update([0]);
        }
        Ok(format!("{:x}", hasher.finalize()))
    }
}

impl Builder for ConfigMap {
    fn type_name(&self) -> &'static str {
        "ConfigMap"
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
        record.insert("kind".into(), json!("ConfigMap"));
        record.insert("metadata".into(), self.meta.to_json(true));
        record.insert("data".into(), string_map(&resolved.text));
        if !resolved.binary.is_empty() {
            let binary: Map<String, JsonValue> = resolved
                .binary
                .iter()
                .map(|(k, v)| (k.clone(), JsonValue::String(BASE64.encode(v))))
                .collect();
            record.insert("binaryData".into(), JsonValue::Object(binary));
        }
        if self.immutable {
            record.insert("immutable".into(), json!(true));
        }

        Ok(vec![Resource::new(JsonValue::Object(record))])
    }

    fn validate(&self) -> Vec<String> {
        let mut problems = self.meta.name_problems("ConfigMap");
        match self.resolve() {
            Ok(resolved) => {
                let size: usize = resolved.text.values().map(String::len).sum::<usize>()
                    + resolved.binary.values().map(Vec::len).sum::<usize>();
                if size > 1024 * 1024 {
                    problems.push(format!(
                        "ConfigMap '{}' holds {} bytes, above the 1MiB object limit",
                        self.meta.name(),
                        size
                    ));
                }
                for key in resolved.text.keys().chain(resolved.binary.keys()) {
                    if !key
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
                    {
                        problems.push(format!(
                            "ConfigMap '{}' has invalid key '{}'",
                            self.meta.name(),
                            key
                        ));
                    }
                }
            }
            Err(e) => problems.push(e.to_string()),
        }
        problems
    }

    fn to_definition(&self) -> Result<JsonValue> {
        tagged_definition(self.type_name(), self)
    }
}
