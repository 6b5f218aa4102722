//! Filesystem helpers shared by the renderers

use std::fs;
use std::path::{Path, PathBuf};

use deckhand_core::Resource;
use deckhand_core::names::sanitize_filename;

use crate::error::{RenderError, Result};

/// Write `content` to `path`, creating parent directories
pub(crate) fn write_file(path: &Path, content: impl AsRef<[u8]>) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| RenderError::write(parent, e))?;
    }
    fs::write(path, content).map_err(|e| RenderError::write(path, e))?;
    tracing::debug!(path = %path.display(), "wrote file");
    Ok(path.to_path_buf())
}

/// Serialize a value as a YAML document
pub(crate) fn to_yaml<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(serde_yaml::to_string(value)?)
}

/// `{kind-lowercase}-{name}.yaml`, sanitized
pub fn resource_file_name(resource: &Resource) -> String {
    format!(
        "{}-{}.yaml",
        resource.kind().unwrap_or("unknown").to_ascii_lowercase(),
        sanitize_filename(resource.name().unwrap_or("unnamed"))
    )
}

/// File names for `resources`, disambiguating records that share kind and name
/// across namespaces by inserting the namespace
pub(crate) fn unique_file_names(resources: &[Resource]) -> Vec<String> {
    let mut used = std::collections::HashSet::new();
    resources
        .iter()
        .map(|resource| {
            let mut name = resource_file_name(resource);
            if !used.insert(name.clone()) {
                name = format!(
                    "{}-{}-{}.yaml",
                    resource.kind().unwrap_or("unknown").to_ascii_lowercase(),
                    sanitize_filename(resource.namespace().unwrap_or("cluster")),
                    sanitize_filename(resource.name().unwrap_or("unnamed"))
                );
                used.insert(name.clone());
            }
            name
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resource_file_name() {
        let resource = Resource::with_type("apps/v1", "Deployment", "web");
        assert_eq!(resource_file_name(&resource), "deployment-web.yaml");

        let odd = Resource::with_type("v1", "ConfigMap", "a/b c");
        assert_eq!(resource_file_name(&odd), "configmap-a-b-c.yaml");
    }

    #[test]
    fn test_unique_file_names_across_namespaces() {
        let mut a = Resource::with_type("v1", "ConfigMap", "settings");
        a.set_namespace("dev");
        let mut b = Resource::with_type("v1", "ConfigMap", "settings");
        b.set_namespace("prod");
        assert_eq!(
            unique_file_names(&[a, b]),
            vec!["configmap-settings.yaml", "configmap-prod-settings.yaml"]
        );
    }

    #[test]
    fn test_write_file_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/c.txt");
        write_file(&path, "hello").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "hello");
    }
}
