//! Data sources for ConfigMaps and Secrets
//!
//! Every source resolves into entries of one flat string-keyed map (or the
//! binary map, for content that is not UTF-8). Sources are applied in the order
//! they were declared; a later source overwrites an earlier key.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::ConfigSourceError;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid regex"));

/// What to do when a file, directory or env-file source does not exist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingSourcePolicy {
    /// Fail generation with a [`ConfigSourceError`]
    #[default]
    Error,
    /// Substitute a comment naming the missing path and keep going
    Placeholder,
}

/// One declared source of ConfigMap/Secret data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "camelCase")]
pub enum DataSource {
    Literal {
        key: String,
        value: String,
    },
    Json {
        key: String,
        value: JsonValue,
    },
    Yaml {
        key: String,
        value: JsonValue,
    },
    Properties {
        key: String,
        entries: IndexMap<String, String>,
    },
    Ini {
        key: String,
        sections: IndexMap<String, IndexMap<String, String>>,
    },
    File {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<String>,
        path: PathBuf,
    },
    Directory {
        path: PathBuf,
    },
    EnvFile {
        path: PathBuf,
    },
    Template {
        key: String,
        template: String,
        #[serde(default)]
        vars: IndexMap<String, String>,
    },
    Binary {
        key: String,
        data: Vec<u8>,
    },
    BinaryFile {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<String>,
        path: PathBuf,
    },
}

/// Fully resolved data of one ConfigMap or Secret
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedData {
    pub text: BTreeMap<String, String>,
    pub binary: BTreeMap<String, Vec<u8>>,
}

impl ResolvedData {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.binary.is_empty()
    }

    fn insert_text(&mut self, key: String, value: String) {
        self.binary.remove(&key);
        self.text.insert(key, value);
    }

    fn insert_binary(&mut self, key: String, value: Vec<u8>) {
        self.text.remove(&key);
        self.binary.insert(key, value);
    }

    /// Insert file content as text if it is UTF-8, binary otherwise
    fn insert_content(&mut self, key: String, content: Vec<u8>) {
        match String::from_utf8(content) {
            Ok(text) => self.insert_text(key, text),
            Err(err) => self.insert_binary(key, err.into_bytes()),
        }
    }
}

/// Resolve `sources` in declaration order
///
/// `owner` names the ConfigMap/Secret in error messages.
pub fn resolve(
    owner: &str,
    sources: &[DataSource],
    policy: MissingSourcePolicy,
) -> Result<ResolvedData, ConfigSourceError> {
    let mut data = ResolvedData::default();

    for source in sources {
        match source {
            DataSource::Literal { key, value } => data.insert_text(key.clone(), value.clone()),
            DataSource::Json { key, value } => {
                let text = serde_json::to_string_pretty(value).map_err(|e| {
                    ConfigSourceError::Serialize {
                        owner: owner.to_string(),
                        key: key.clone(),
                        message: e.to_string(),
                    }
                })?;
                data.insert_text(key.clone(), text);
            }
            DataSource::Yaml { key, value } => {
                let text =
                    serde_yaml::to_string(value).map_err(|e| ConfigSourceError::Serialize {
                        owner: owner.to_string(),
                        key: key.clone(),
                        message: e.to_string(),
                    })?;
                data.insert_text(key.clone(), text);
            }
            DataSource::Properties { key, entries } => {
                data.insert_text(key.clone(), render_properties(entries));
            }
            DataSource::Ini { key, sections } => {
                data.insert_text(key.clone(), render_ini(sections));
            }
            DataSource::Template {
                key,
                template,
                vars,
            } => data.insert_text(key.clone(), substitute(template, vars)),
            DataSource::Binary { key, data: bytes } => {
                data.insert_binary(key.clone(), bytes.clone())
            }
            DataSource::File { key, path } => {
                let key = key.clone().unwrap_or_else(|| file_key(path));
                match read_file(owner, path, policy)? {
                    Some(content) => data.insert_content(key, content),
                    None => data.insert_text(key, placeholder("file", path)),
                }
            }
            DataSource::BinaryFile { key, path } => {
                let key = key.clone().unwrap_or_else(|| file_key(path));
                match read_file(owner, path, policy)? {
                    Some(content) => data.insert_binary(key, content),
                    None => data.insert_text(key, placeholder("file", path)),
                }
            }
            DataSource::Directory { path } => resolve_directory(owner, path, policy, &mut data)?,
            DataSource::EnvFile { path } => match read_file(owner, path, policy)? {
                Some(content) => {
                    let content = String::from_utf8_lossy(&content);
                    for (k, v) in parse_env_file(&content) {
                        data.insert_text(k, v);
                    }
                }
                None => data.insert_text(file_key(path), placeholder("env file", path)),
            },
        }
    }

    Ok(data)
}

fn file_key(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

fn placeholder(what: &str, path: &Path) -> String {
    format!("# {} not found: {}", what, path.display())
}

/// Read a file; `Ok(None)` means missing under the placeholder policy
fn read_file(
    owner: &str,
    path: &Path,
    policy: MissingSourcePolicy,
) -> Result<Option<Vec<u8>>, ConfigSourceError> {
    match std::fs::read(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => match policy {
            MissingSourcePolicy::Error => Err(ConfigSourceError::FileNotFound {
                owner: owner.to_string(),
                path: path.to_path_buf(),
            }),
            MissingSourcePolicy::Placeholder => {
                tracing::warn!(owner, path = %path.display(), "source file not found, using placeholder");
                Ok(None)
            }
        },
        Err(source) => Err(ConfigSourceError::Unreadable {
            owner: owner.to_string(),
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Every regular file directly inside `path`, keyed by file name, in name order
fn resolve_directory(
    owner: &str,
    path: &Path,
    policy: MissingSourcePolicy,
    data: &mut ResolvedData,
) -> Result<(), ConfigSourceError> {
    if !path.is_dir() {
        return match policy {
            MissingSourcePolicy::Error => Err(ConfigSourceError::DirectoryNotFound {
                owner: owner.to_string(),
                path: path.to_path_buf(),
            }),
            MissingSourcePolicy::Placeholder => {
                tracing::warn!(owner, path = %path.display(), "source directory not found, using placeholder");
                data.insert_text(file_key(path), placeholder("directory", path));
                Ok(())
            }
        };
    }

    let walker = WalkDir::new(path)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|e| ConfigSourceError::Unreadable {
            owner: owner.to_string(),
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let content =
            std::fs::read(entry.path()).map_err(|source| ConfigSourceError::Unreadable {
                owner: owner.to_string(),
                path: entry.path().to_path_buf(),
                source,
            })?;
        data.insert_content(entry.file_name().to_string_lossy().to_string(), content);
    }

    Ok(())
}

/// Parse `KEY=VALUE` lines, skipping blanks and comments, stripping `export` and quotes
pub fn parse_env_file(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), unquote(value.trim()).to_string()))
        })
        .collect()
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

fn render_properties(entries: &IndexMap<String, String>) -> String {
    entries
        .iter()
        .map(|(k, v)| format!("{}={}\n", k, v))
        .collect()
}

fn render_ini(sections: &IndexMap<String, IndexMap<String, String>>) -> String {
    let mut out = String::new();
    for (i, (section, entries)) in sections.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&format!("[{}]\n", section));
        for (k, v) in entries {
            out.push_str(&format!("{} = {}\n", k, v));
        }
    }
    out
}

/// Replace `{name}` placeholders; unknown placeholders are left as written
pub fn substitute(template: &str, vars: &IndexMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            vars.get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Implements the data-source setters shared by `ConfigMap` and `Secret`
macro_rules! source_setters {
    () => {
        /// Add a literal key/value entry
        pub fn add(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
            self.sources.push($crate::builder::DataSource::Literal {
                key: key.into(),
                value: value.into(),
            });
            self
        }

        /// Add `value` serialized as pretty-printed JSON
        pub fn add_json(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
            self.sources.push($crate::builder::DataSource::Json {
                key: key.into(),
                value,
            });
            self
        }

        /// Add `value` serialized as YAML
        pub fn add_yaml(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
            self.sources.push($crate::builder::DataSource::Yaml {
                key: key.into(),
                value,
            });
            self
        }

        /// Add a `key=value` properties file
        pub fn add_properties<I, K, V>(mut self, key: impl Into<String>, entries: I) -> Self
        where
            I: IntoIterator<Item = (K, V)>,
            K: Into<String>,
            V: Into<String>,
        {
            self.sources.push($crate::builder::DataSource::Properties {
                key: key.into(),
                entries: entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            });
            self
        }

        /// Add an INI file built from sections of key/value pairs
        pub fn add_ini(
            mut self,
            key: impl Into<String>,
            sections: indexmap::IndexMap<String, indexmap::IndexMap<String, String>>,
        ) -> Self {
            self.sources.push($crate::builder::DataSource::Ini {
                key: key.into(),
                sections,
            });
            self
        }

        /// Add a file, keyed by its file name
        pub fn from_file(mut self, path: impl Into<std::path::PathBuf>) -> Self {
            self.sources.push($crate::builder::DataSource::File {
                key: None,
                path: path.into(),
            });
            self
        }

        /// Add a file under an explicit key
        pub fn from_file_as(
            mut self,
            key: impl Into<String>,
            path: impl Into<std::path::PathBuf>,
        ) -> Self {
            self.sources.push($crate::builder::DataSource::File {
                key: Some(key.into()),
                path: path.into(),
            });
            self
        }

        /// Add every regular file directly inside a directory
        pub fn from_directory(mut self, path: impl Into<std::path::PathBuf>) -> Self {
            self.sources
                .push($crate::builder::DataSource::Directory { path: path.into() });
            self
        }

        /// Add each `KEY=VALUE` line of an env file as its own entry
        pub fn from_env_file(mut self, path: impl Into<std::path::PathBuf>) -> Self {
            self.sources
                .push($crate::builder::DataSource::EnvFile { path: path.into() });
            self
        }

        /// Add `template` with `{name}` placeholders replaced from `vars`
        pub fn add_template<I, K, V>(
            mut self,
            key: impl Into<String>,
            template: impl Into<String>,
            vars: I,
        ) -> Self
        where
            I: IntoIterator<Item = (K, V)>,
            K: Into<String>,
            V: Into<String>,
        {
            self.sources.push($crate::builder::DataSource::Template {
                key: key.into(),
                template: template.into(),
                vars: vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            });
            self
        }

        /// Add raw bytes, emitted base64-encoded
        pub fn add_binary(mut self, key: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
            self.sources.push($crate::builder::DataSource::Binary {
                key: key.into(),
                data: data.into(),
            });
            self
        }

        /// Add a file as binary content regardless of encoding
        pub fn from_binary_file(mut self, path: impl Into<std::path::PathBuf>) -> Self {
            self.sources.push($crate::builder::DataSource::BinaryFile {
                key: None,
                path: path.into(),
            });
            self
        }

        /// Mount as files at `path` instead of exposing entries as environment
        pub fn mount_path(mut self, path: impl Into<String>) -> Self {
            self.mount_path = Some(path.into());
            self
        }

        /// Choose how missing file and directory sources are handled
        pub fn missing_sources(mut self, policy: $crate::builder::MissingSourcePolicy) -> Self {
            self.missing_sources = policy;
            self
        }

        pub fn immutable(mut self) -> Self {
            self.immutable = true;
            self
        }

        pub fn sources(&self) -> &[$crate::builder::DataSource] {
            &self.sources
        }

        /// Resolve every source into the final key/value maps
        pub fn resolve(
            &self,
        ) -> std::result::Result<$crate::builder::ResolvedData, $crate::error::ConfigSourceError>
        {
            $crate::builder::source::resolve(self.meta.name(), &self.sources, self.missing_sources)
        }
    };
}

pub(crate) use source_setters;

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn literal(key: &str, value: &str) -> DataSource {
        DataSource::Literal {
            key: key.into(),
            value: value.into(),
        }
    }

    #[test]
    fn test_later_sources_overwrite() {
        let data = resolve(
            "cfg",
            &[literal("a", "1"), literal("b", "2"), literal("a", "3")],
            MissingSourcePolicy::Error,
        )
        .unwrap();
        assert_eq!(data.text["a"], "3");
        assert_eq!(data.text["b"], "2");
    }

    #[test]
    fn test_json_source_round_trips() {
        let value = serde_json::json!({"a": 1});
        let data = resolve(
            "cfg",
            &[DataSource::Json {
                key: "cfg.json".into(),
                value: value.clone(),
            }],
            MissingSourcePolicy::Error,
        )
        .unwrap();
        let parsed: JsonValue = serde_json::from_str(&data.text["cfg.json"]).unwrap();
        assert_eq!(parsed, value);
    }

    #[test]
    fn test_properties_and_ini() {
        let mut entries = IndexMap::new();
        entries.insert("db.host".to_string(), "localhost".to_string());
        entries.insert("db.port".to_string(), "5432".to_string());

        let mut server = IndexMap::new();
        server.insert("port".to_string(), "8080".to_string());
        let mut log = IndexMap::new();
        log.insert("level".to_string(), "info".to_string());
        let mut sections = IndexMap::new();
        sections.insert("server".to_string(), server);
        sections.insert("log".to_string(), log);

        let data = resolve(
            "cfg",
            &[
                DataSource::Properties {
                    key: "app.properties".into(),
                    entries,
                },
                DataSource::Ini {
                    key: "app.ini".into(),
                    sections,
                },
            ],
            MissingSourcePolicy::Error,
        )
        .unwrap();

        assert_eq!(data.text["app.properties"], "db.host=localhost\ndb.port=5432\n");
        assert_eq!(
            data.text["app.ini"],
            "[server]\nport = 8080\n\n[log]\nlevel = info\n"
        );
    }

    #[test]
    fn test_template_substitution() {
        let mut vars = IndexMap::new();
        vars.insert("host".to_string(), "db.internal".to_string());
        assert_eq!(
            substitute("postgres://{host}:{port}/app", &vars),
            "postgres://db.internal:{port}/app"
        );
    }

    #[test]
    fn test_parse_env_file() {
        let parsed = parse_env_file(
            "# comment\n\nFOO=bar\nexport QUOTED=\"hello world\"\nSINGLE='x'\nbroken\nEMPTY=\n",
        );
        assert_eq!(
            parsed,
            vec![
                ("FOO".to_string(), "bar".to_string()),
                ("QUOTED".to_string(), "hello world".to_string()),
                ("SINGLE".to_string(), "x".to_string()),
                ("EMPTY".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_missing_file_error_policy() {
        let err = resolve(
            "cfg",
            &[DataSource::File {
                key: None,
                path: PathBuf::from("/nonexistent/app.conf"),
            }],
            MissingSourcePolicy::Error,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigSourceError::FileNotFound { .. }));
        assert_eq!(err.path(), Some(Path::new("/nonexistent/app.conf")));
    }

    #[test]
    fn test_missing_file_placeholder_policy() {
        let data = resolve(
            "cfg",
            &[DataSource::File {
                key: None,
                path: PathBuf::from("/nonexistent/app.conf"),
            }],
            MissingSourcePolicy::Placeholder,
        )
        .unwrap();
        assert_eq!(data.text["app.conf"], "# file not found: /nonexistent/app.conf");
    }

    #[test]
    fn test_directory_source_is_sorted_and_flat() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.txt"), "bee").unwrap();
        fs::write(dir.path().join("a.txt"), "ay").unwrap();
        fs::write(dir.path().join("blob.bin"), [0xff, 0xfe, 0x00]).unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested/c.txt"), "sea").unwrap();

        let data = resolve(
            "cfg",
            &[DataSource::Directory {
                path: dir.path().to_path_buf(),
            }],
            MissingSourcePolicy::Error,
        )
        .unwrap();

        let keys: Vec<_> = data.text.keys().cloned().collect();
        assert_eq!(keys, vec!["a.txt", "b.txt"]);
        assert_eq!(data.binary["blob.bin"], vec![0xff, 0xfe, 0x00]);
    }

    #[test]
    fn test_missing_directory() {
        let err = resolve(
            "cfg",
            &[DataSource::Directory {
                path: PathBuf::from("/nonexistent/dir"),
            }],
            MissingSourcePolicy::Error,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigSourceError::DirectoryNotFound { .. }));
    }

    #[test]
    fn test_env_file_source() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.env");
        fs::write(&path, "A=1\nB=two\n").unwrap();

        let data = resolve(
            "cfg",
            &[DataSource::EnvFile { path }],
            MissingSourcePolicy::Error,
        )
        .unwrap();
        assert_eq!(data.text["A"], "1");
        assert_eq!(data.text["B"], "two");
    }
}
