//! rule sets and configuration
//!
//! A configuration directory holds YAML files:
//!
//! | file                         | content                                              |
//! |------------------------------|------------------------------------------------------|
//! | `common.yaml`                | [RuleSet] shared by every resource type              |
//! | `aws_<type>.yaml`            | [RuleSet] overlay for one source type                |
//! | `resource_type_names.yaml`   | `source type: target type`                           |
//! | `service_names.yaml`         | `service segment: target service`                    |
//! | `references.yaml`            | `name:` list of [NameReference]s                     |
//! | `hierarchy.yaml`             | [Hierarchy] settings (optional)                      |
//! | `template.yaml`              | base template the resources are written into         |
//!
//! The effective rule set of a type is the common rule set with the type overlay merged on top
//! (see [RuleSet::overlay]).
use crate::naming::Naming;
use crate::value::{Map, Value};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Rules for one source resource type
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuleSet {
    /// `path: value` set when absent
    pub default: IndexMap<String, Value>,
    /// `path: query` replacing existing values with the query result
    pub transform: IndexMap<String, String>,
    /// `path: new key`
    pub rename: IndexMap<String, String>,
    /// paths (in target casing) removed after merging
    pub remove: Vec<String>,
    /// keys whose value is taken over verbatim (only the key is pascalized)
    pub preserve_case: Vec<String>,
    /// `destination path[:suffix]: rule`
    pub merge: IndexMap<String, MergeRule>,
    /// related types that are always consumed
    pub merge_exclude_types: Vec<String>,
    /// additional resources derived from this one
    pub add: Vec<AddRule>,
    /// `depends_on` entries of these types are dropped
    pub exclude_depends_on_types: Vec<String>,
    pub debug: bool,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeRule {
    /// related source type
    #[serde(rename = "type")]
    pub resource_type: String,
    /// query that must yield `true` for a related resource to be merged
    pub filter: Option<String>,
    /// query producing the merged value from a related resource
    pub transform: String,
    #[serde(default)]
    pub object_type: ObjectType,
    /// merge into an existing object instead of only setting an absent one
    #[serde(default)]
    pub merge: bool,
}

/// How merged values are written to the destination path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    /// all values as a list
    #[default]
    Array,
    /// every value merged into one object
    Object,
    /// the first value
    String,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddRule {
    /// target type of the derived resource
    #[serde(rename = "type")]
    pub target_type: String,
    pub filter: Option<String>,
    pub name_query: String,
    pub transform: String,
}

impl RuleSet {
    /// Additive merge: maps are merged (overlay wins per key), lists are concatenated
    pub fn overlay(&self, overlay: &RuleSet) -> RuleSet {
        fn maps<V: Clone>(base: &IndexMap<String, V>, overlay: &IndexMap<String, V>) -> IndexMap<String, V> {
            let mut merged = base.clone();
            merged.extend(overlay.iter().map(|(k, v)| (k.clone(), v.clone())));
            merged
        }

        fn lists<V: Clone>(base: &[V], overlay: &[V]) -> Vec<V> {
            base.iter().chain(overlay).cloned().collect()
        }

        RuleSet {
            default: maps(&self.default, &overlay.default),
            transform: maps(&self.transform, &overlay.transform),
            rename: maps(&self.rename, &overlay.rename),
            remove: lists(&self.remove, &overlay.remove),
            preserve_case: lists(&self.preserve_case, &overlay.preserve_case),
            merge: maps(&self.merge, &overlay.merge),
            merge_exclude_types: lists(&self.merge_exclude_types, &overlay.merge_exclude_types),
            add: lists(&self.add, &overlay.add),
            exclude_depends_on_types: lists(
                &self.exclude_depends_on_types,
                &overlay.exclude_depends_on_types,
            ),
            debug: self.debug || overlay.debug,
        }
    }

    /// Whether the merge resolver has anything to do
    pub fn merges(&self) -> bool {
        !self.merge.is_empty() || !self.merge_exclude_types.is_empty()
    }
}

/// Rewrites a name attribute into a reference before relationships are built
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct NameReference {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name_attribute: String,
    pub target_type: String,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct References {
    #[serde(default)]
    name: Vec<NameReference>,
}

/// Tree shaped relation walked by the merge resolver
///
/// Related resources of `type` point at a node (`link`); each node points at its parent
/// (`parent`) and contributes one path segment (`segment`). The walk ends at the root, which is
/// referenced through the `root` attribute of the owning resource.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct Hierarchy {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub link: String,
    pub parent: String,
    pub segment: String,
    pub root: String,
    /// attribute referencing a resource consumed together with the related one
    pub companion: String,
    /// attribute the computed path is written to before queries run
    pub output: String,
}

impl Default for Hierarchy {
    fn default() -> Self {
        Self {
            resource_type: "aws_api_gateway_integration".into(),
            link: "resource_id".into(),
            parent: "parent_id".into(),
            segment: "path_part".into(),
            root: "root_resource_id".into(),
            companion: "http_method".into(),
            output: "_api_path".into(),
        }
    }
}

/// Everything loaded from a configuration directory
///
/// Built once, read only afterwards.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub common: RuleSet,
    pub rules: HashMap<String, RuleSet>,
    pub naming: Naming,
    pub hierarchy: Hierarchy,
    pub name_references: Vec<NameReference>,
    pub template: Map,
}

impl Config {
    /// Effective rule set of a source type
    pub fn rules_for(&self, resource_type: &str) -> RuleSet {
        match self.rules.get(resource_type) {
            Some(rules) => self.common.overlay(rules),
            None => self.common.clone(),
        }
    }

    pub fn load_directory(dir_path: &Path) -> Result<Self, ConfigError> {
        tracing::info!(path=%dir_path.display(), "loading configuration");

        let mut config = Config::default();
        let read_dir = std::fs::read_dir(dir_path).map_err(|source| ConfigError::Io {
            path: dir_path.to_owned(),
            source,
        })?;

        let mut files = vec![];
        for dir_entry in read_dir {
            let dir_entry = dir_entry.map_err(|source| ConfigError::Io {
                path: dir_path.to_owned(),
                source,
            })?;
            let path = dir_entry.path();
            let is_yaml = path.extension().is_some_and(|ext| ext == "yaml" || ext == "yml");
            if path.is_file() && is_yaml {
                files.push(path);
            }
        }
        files.sort();

        for file_path in files {
            let Some(stem) = file_path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            match stem {
                "common" => config.common = load_yaml(&file_path)?,
                "resource_type_names" => config.naming.type_names = load_yaml(&file_path)?,
                "service_names" => config.naming.service_names = load_yaml(&file_path)?,
                "references" => {
                    let references: References = load_yaml(&file_path)?;
                    config.name_references = references.name;
                }
                "hierarchy" => config.hierarchy = load_yaml(&file_path)?,
                "template" => config.template = load_yaml(&file_path)?,
                resource_type if resource_type.starts_with(&config.naming.provider_prefix) => {
                    let rules: RuleSet = load_yaml(&file_path)?;
                    config.rules.insert(resource_type.to_string(), rules);
                }
                _ => tracing::debug!(path=%file_path.display(), "ignoring unknown configuration file"),
            }
        }

        Ok(config)
    }
}

fn load_yaml<T: serde::de::DeserializeOwned>(file_path: &Path) -> Result<T, ConfigError> {
    tracing::trace!(path=%file_path.display(), "loading configuration file");

    let contents = std::fs::read_to_string(file_path).map_err(|source| ConfigError::Io {
        path: file_path.to_owned(),
        source,
    })?;

    // an empty file is an empty document
    if contents.trim().is_empty() {
        return serde_yaml::from_str("{}").map_err(|source| ConfigError::Yaml {
            path: file_path.to_owned(),
            source,
        });
    }

    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Yaml {
        path: file_path.to_owned(),
        source,
    })
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("unable to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration file {}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}
