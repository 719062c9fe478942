// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Generator configuration.
//!
//! Settings come from two places: an optional YAML document holding values
//! that rarely change between runs (denylisted datasources, plugin version,
//! placeholder datasource uid) and per-run CLI flags. [`ScaffoldOptions`]
//! is the merged view consumed by the generator.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::{self, Error};

/// Datasource type blocked when no configuration overrides the denylist.
const DEFAULT_BLOCKED_DATASOURCE: &str = "elasticsearch";
/// Grafana plugin version stamped into every generated panel.
const DEFAULT_PLUGIN_VERSION: &str = "12.3.0";
/// Placeholder uid used when neither a flag nor `__inputs` provide one.
const DEFAULT_DATASOURCE_UID: &str = "${DS_PROMETHEUS}";
/// Datasource type assumed for panels that do not declare one.
pub const DEFAULT_DATASOURCE_TYPE: &str = "prometheus";

/// YAML document with long-lived generator settings.
///
/// # Examples
///
/// ```
/// use grafonnet_scaffold::GeneratorConfig;
///
/// let yaml = r#"
/// blocked_datasources: [elasticsearch, opensearch]
/// plugin_version: "11.4.0"
/// "#;
/// let config: GeneratorConfig = serde_yaml::from_str(yaml).expect("valid configuration");
/// assert_eq!(config.blocked_datasources.len(), 2);
/// assert_eq!(config.default_datasource_uid, "${DS_PROMETHEUS}");
/// ```
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Datasource types whose panels always fall back to raw JSON.
    #[serde(default = "default_blocked_datasources")]
    pub blocked_datasources: Vec<String>,

    /// Plugin version written into the generated `config` object.
    #[serde(default = "default_plugin_version", deserialize_with = "deserialize_plugin_version")]
    pub plugin_version: String,

    /// Datasource uid used when nothing more specific is available.
    #[serde(default = "default_datasource_uid")]
    pub default_datasource_uid: String
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            blocked_datasources:    default_blocked_datasources(),
            plugin_version:         default_plugin_version(),
            default_datasource_uid: default_datasource_uid()
        }
    }
}

fn default_blocked_datasources() -> Vec<String> {
    vec![DEFAULT_BLOCKED_DATASOURCE.to_owned()]
}

fn default_plugin_version() -> String {
    DEFAULT_PLUGIN_VERSION.to_owned()
}

fn default_datasource_uid() -> String {
    DEFAULT_DATASOURCE_UID.to_owned()
}

fn deserialize_plugin_version<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>
{
    let value = String::deserialize(deserializer)?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(serde::de::Error::custom("plugin_version must not be empty"));
    }
    Ok(trimmed.to_owned())
}

/// Loads the generator configuration from a YAML file.
///
/// # Errors
///
/// Returns [`Error::ConfigIo`] when the file cannot be read and
/// [`Error::Config`] when the YAML cannot be decoded.
pub fn load_config(path: &Path) -> Result<GeneratorConfig, Error> {
    let contents =
        fs::read_to_string(path).map_err(|source| error::config_io_error(path, source))?;
    parse_config(&contents)
}

/// Parses the generator configuration from a YAML string.
///
/// An empty document yields [`GeneratorConfig::default`].
///
/// # Errors
///
/// Returns [`Error::Config`] when the YAML is malformed or contains unknown
/// keys.
pub fn parse_config(contents: &str) -> Result<GeneratorConfig, Error> {
    if contents.trim().is_empty() {
        return Ok(GeneratorConfig::default());
    }
    Ok(serde_yaml::from_str(contents)?)
}

/// Case-insensitive substring denylist applied to resolved datasource types.
///
/// # Examples
///
/// ```
/// use grafonnet_scaffold::DatasourceDenylist;
///
/// let denylist = DatasourceDenylist::new(["Elasticsearch", "  "]);
/// assert!(denylist.blocks("grafana-elasticsearch-datasource"));
/// assert!(!denylist.blocks("prometheus"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasourceDenylist {
    entries: Vec<String>
}

impl DatasourceDenylist {
    /// Builds a denylist, trimming and lowercasing entries and dropping empty
    /// or duplicate ones.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>
    {
        let mut denylist = Self::default();
        denylist.extend(entries);
        denylist
    }

    /// Adds entries using the same normalization as [`new`](Self::new).
    pub fn extend<I, S>(&mut self, entries: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>
    {
        for entry in entries {
            let normalized = entry.as_ref().trim().to_lowercase();
            if !normalized.is_empty() && !self.entries.contains(&normalized) {
                self.entries.push(normalized);
            }
        }
    }

    /// Returns `true` when the datasource type contains any entry.
    pub fn blocks(&self, datasource_type: &str) -> bool {
        let lowered = datasource_type.to_lowercase();
        self.entries.iter().any(|entry| lowered.contains(entry.as_str()))
    }

    /// Normalized entries in insertion order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}

/// Merged per-run options driving scaffold generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaffoldOptions {
    /// System the dashboard belongs to; carried into logs and the report.
    pub system:                 String,
    /// Default datasource type for panels that do not declare one.
    pub datasource_type:        String,
    /// Explicit datasource uid, taking precedence over `__inputs`.
    pub datasource_uid:         Option<String>,
    /// Explicit slug, taking precedence over the title-derived one.
    pub slug:                   Option<String>,
    /// Datasource types forcing panels to raw fallback.
    pub denylist:               DatasourceDenylist,
    /// Plugin version written into the generated `config` object.
    pub plugin_version:         String,
    /// Datasource uid used when nothing more specific is available.
    pub default_datasource_uid: String
}

impl ScaffoldOptions {
    /// Creates options for `system` using defaults from `config`.
    pub fn from_config(system: impl Into<String>, config: &GeneratorConfig) -> Self {
        Self {
            system:                 system.into(),
            datasource_type:        DEFAULT_DATASOURCE_TYPE.to_owned(),
            datasource_uid:         None,
            slug:                   None,
            denylist:               DatasourceDenylist::new(&config.blocked_datasources),
            plugin_version:         config.plugin_version.clone(),
            default_datasource_uid: config.default_datasource_uid.clone()
        }
    }

    /// Creates options for `system` with built-in defaults.
    pub fn new(system: impl Into<String>) -> Self {
        Self::from_config(system, &GeneratorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::{DatasourceDenylist, GeneratorConfig, ScaffoldOptions, load_config, parse_config};
    use crate::Error;

    #[test]
    fn empty_document_yields_defaults() {
        let config = parse_config("  \n").expect("empty config should parse");
        assert_eq!(config, GeneratorConfig::default());
        assert_eq!(config.blocked_datasources, vec!["elasticsearch".to_owned()]);
        assert_eq!(config.plugin_version, "12.3.0");
    }

    #[test]
    fn partial_document_fills_missing_keys() {
        let config = parse_config("plugin_version: \" 11.0.0 \"\n").expect("config should parse");
        assert_eq!(config.plugin_version, "11.0.0");
        assert_eq!(config.default_datasource_uid, "${DS_PROMETHEUS}");
        assert_eq!(config.blocked_datasources, vec!["elasticsearch".to_owned()]);
    }

    #[test]
    fn explicit_empty_denylist_is_respected() {
        let config = parse_config("blocked_datasources: []\n").expect("config should parse");
        assert!(config.blocked_datasources.is_empty());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let error = parse_config("blocked: [loki]\n").expect_err("unknown key should fail");
        assert!(matches!(error, Error::Config { .. }));
    }

    #[test]
    fn blank_plugin_version_is_rejected() {
        let error = parse_config("plugin_version: \"  \"\n").expect_err("blank version");
        assert!(error.to_string().contains("plugin_version must not be empty"));
    }

    #[test]
    fn load_config_reads_file() {
        let temp = tempdir().expect("failed to create tempdir");
        let path = temp.path().join("scaffold.yaml");
        std::fs::write(&path, "blocked_datasources: [loki]\n").expect("failed to write config");

        let config = load_config(&path).expect("config should load");
        assert_eq!(config.blocked_datasources, vec!["loki".to_owned()]);
    }

    #[test]
    fn load_config_reports_missing_file() {
        let temp = tempdir().expect("failed to create tempdir");
        let error = load_config(&temp.path().join("missing.yaml")).expect_err("missing file");
        assert!(matches!(error, Error::ConfigIo { .. }));
        assert!(
            error
                .to_display_string()
                .starts_with("failed to read configuration from")
        );
    }

    #[test]
    fn denylist_normalizes_and_deduplicates() {
        let denylist = DatasourceDenylist::new([" Loki ", "loki", "", "OpenSearch"]);
        assert_eq!(denylist.entries(), ["loki".to_owned(), "opensearch".to_owned()]);
    }

    #[test]
    fn denylist_matches_substrings_case_insensitively() {
        let denylist = DatasourceDenylist::new(["elasticsearch"]);
        assert!(denylist.blocks("Elasticsearch"));
        assert!(denylist.blocks("grafana-ELASTICSEARCH-datasource"));
        assert!(!denylist.blocks("prometheus"));
        assert!(!DatasourceDenylist::default().blocks("elasticsearch"));
    }

    #[test]
    fn options_take_defaults_from_config() {
        let config = GeneratorConfig {
            blocked_datasources:    vec!["Loki".to_owned()],
            plugin_version:         "10.4.1".to_owned(),
            default_datasource_uid: "${DS_MIMIR}".to_owned()
        };
        let options = ScaffoldOptions::from_config("payments", &config);

        assert_eq!(options.system, "payments");
        assert_eq!(options.datasource_type, "prometheus");
        assert_eq!(options.plugin_version, "10.4.1");
        assert_eq!(options.default_datasource_uid, "${DS_MIMIR}");
        assert!(options.denylist.blocks("loki"));
        assert!(!options.denylist.blocks("elasticsearch"));
    }
}
