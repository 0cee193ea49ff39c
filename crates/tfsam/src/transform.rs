//! per resource transformation
//!
//! Turns one source resource into one target resource (plus any resources derived from it
//! through `add` rules). The steps run in a fixed order:
//!
//! 1. target type and name
//! 2. effective rule set
//! 3. detach `preserve_case` attributes
//! 4. `default`, 5. `transform`, 6. `rename`
//! 7. pascalize keys and re-attach the preserved attributes
//! 8. detach `depends_on`
//! 9. expand references
//! 10. merge related resources
//! 11. `remove`
//! 12. assemble the target resource
//! 13. filter `DependsOn`
//! 14. derive additional resources
use crate::casing::{pascalize, pascalize_map};
use crate::expand::{ParentReference, Parameters, VariableExpander};
use crate::identity::{strip_marker, ResourceId};
use crate::merge::{MergeError, MergeResolver};
use crate::path::{Operation, Path, PathError};
use crate::query::{QueryEngine, QueryError};
use crate::relationships::RelationshipGraph;
use crate::rules::{AddRule, Config, RuleSet};
use crate::value::{Map, Value};
use crate::Resources;

const DEPENDS_ON: &str = "DependsOn";

/// A resource of the target template
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TargetResource {
    #[serde(rename = "Type")]
    pub target_type: String,
    #[serde(rename = "Properties")]
    pub properties: Map,
    #[serde(rename = "DependsOn", skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

/// Result of transforming one source resource
#[derive(Debug, Default)]
pub struct Transformed {
    /// `(target name, resource)`, the transformed resource first
    pub resources: Vec<(String, TargetResource)>,
    /// target names of related resources merged into this one
    pub consumed: Vec<String>,
    /// external parameters referenced by this resource
    pub parameters: Parameters,
}

#[derive(thiserror::Error, Debug)]
pub enum TransformError {
    #[error("attributes must be an object")]
    NotAnObject,
    #[error("invalid rule path")]
    Path(#[from] PathError),
    #[error("rule query failed")]
    Query(#[from] QueryError),
    #[error("unable to merge related resources")]
    Merge(#[from] MergeError),
}

pub struct Transformer<'a> {
    config: &'a Config,
    engine: &'a dyn QueryEngine,
    graph: Option<&'a RelationshipGraph>,
    resources: Option<&'a Resources>,
}

impl<'a> Transformer<'a> {
    pub fn new(config: &'a Config, engine: &'a dyn QueryEngine) -> Self {
        Self {
            config,
            engine,
            graph: None,
            resources: None,
        }
    }

    /// Enable merging of related resources
    pub fn with_relationships(mut self, graph: &'a RelationshipGraph, resources: &'a Resources) -> Self {
        self.graph = Some(graph);
        self.resources = Some(resources);
        self
    }

    #[tracing::instrument(level = "debug", skip_all, fields(%id))]
    pub fn transform(&self, id: &ResourceId, attributes: &Value) -> Result<Transformed, TransformError> {
        let naming = &self.config.naming;
        let target = naming.transform(id);
        let rules = self.config.rules_for(&id.resource_type);

        let related = self.graph.and_then(|graph| graph.get(id));
        if rules.debug {
            tracing::debug!(%id, related = ?related, "relationships");
        }

        let mut attributes = attributes.as_object().cloned().ok_or(TransformError::NotAnObject)?;

        let mut preserved = Map::new();
        for key in &rules.preserve_case {
            if let Some(value) = attributes.shift_remove(key) {
                preserved.insert(pascalize(key), value);
            }
        }

        for (path, value) in &rules.default {
            path.parse::<Path>()?
                .apply(&mut attributes, Operation::SetDefault(value.clone()))?;
        }

        for (path, query) in &rules.transform {
            let path: Path = path.parse()?;
            self.apply_query(&path, query, &mut attributes)?;
            self.apply_query(&path, query, &mut preserved)?;
        }

        for (path, new_key) in &rules.rename {
            path.parse::<Path>()?
                .apply(&mut attributes, Operation::Rename(new_key.clone()))?;
        }

        let mut properties = pascalize_map(attributes.clone());
        properties.extend(preserved);

        let depends_on = properties.shift_remove(DEPENDS_ON);

        let mut parents = vec![];
        let mut parameters = Parameters::new();
        let mut properties =
            VariableExpander::new(naming, &mut parents, &mut parameters).expand_map(properties);

        let mut consumed = vec![];
        if let (Some(related), Some(resources)) = (related, self.resources) {
            if rules.merges() && !related.is_empty() {
                consumed = MergeResolver::new(self.config, self.engine, resources).resolve(
                    id,
                    &rules,
                    &mut properties,
                    related,
                )?;
            }
        }

        for path in &rules.remove {
            path.parse::<Path>()?.apply(&mut properties, Operation::Delete)?;
        }

        let resource = TargetResource {
            target_type: target.target_type.clone(),
            properties,
            depends_on: self.depends_on(depends_on, &parents, &rules),
        };

        let mut transformed = Transformed {
            resources: vec![(target.name.clone(), resource)],
            consumed,
            parameters: Parameters::new(),
        };

        let mut scratch = attributes;
        scratch.insert("__type_name__".into(), id.to_string().into());
        scratch.insert("__target_type__".into(), target.target_type.into());
        scratch.insert("__target_name__".into(), target.name.into());

        for add in &rules.add {
            if let Some(derived) = self.derive(add, &scratch, &mut parents, &mut parameters)? {
                transformed.resources.push(derived);
            }
        }

        transformed.parameters = parameters;
        Ok(transformed)
    }

    /// Replace the values at `path` with the result of `query` against `attributes`
    fn apply_query(&self, path: &Path, query: &str, attributes: &mut Map) -> Result<bool, TransformError> {
        let input = Value::Object(attributes.clone());
        let mut evaluate = || self.engine.evaluate(query, &input);
        Ok(path.apply(attributes, Operation::SetComputed(&mut evaluate))?)
    }

    /// Drop dependencies that are already expressed as a reference or that are excluded by type
    fn depends_on(
        &self,
        depends_on: Option<Value>,
        parents: &[ParentReference],
        rules: &RuleSet,
    ) -> Vec<String> {
        let entries = match depends_on {
            Some(Value::Array(entries)) => entries,
            Some(entry @ Value::String(_)) => vec![entry],
            _ => return vec![],
        };

        let mut kept = vec![];
        for entry in &entries {
            let Some(reference) = entry.as_str() else {
                continue;
            };

            let resource_type = strip_marker(reference).split('.').next().unwrap_or_default();
            let target_name = self.config.naming.transform_reference(reference).name;

            let referenced = parents.iter().any(|parent| parent.target_name == target_name);
            let excluded = rules
                .exclude_depends_on_types
                .iter()
                .any(|excluded| excluded == resource_type);

            if referenced || excluded {
                tracing::trace!(%target_name, referenced, excluded, "dropping dependency");
                continue;
            }
            kept.push(target_name);
        }

        kept
    }

    /// Derive an additional resource from the source attributes
    fn derive(
        &self,
        add: &AddRule,
        scratch: &Map,
        parents: &mut Vec<ParentReference>,
        parameters: &mut Parameters,
    ) -> Result<Option<(String, TargetResource)>, TransformError> {
        let scratch = Value::Object(scratch.clone());

        if let Some(filter) = &add.filter {
            if self.engine.evaluate(filter, &scratch)? != Value::Boolean(true) {
                return Ok(None);
            }
        }

        let scratch = VariableExpander::new(&self.config.naming, parents, parameters).expand(scratch);

        let name = self.engine.evaluate(&add.name_query, &scratch)?;
        let properties = self.engine.evaluate(&add.transform, &scratch)?;

        match (name, properties) {
            (Value::String(name), Value::Object(properties)) => {
                tracing::debug!(%name, target_type = %add.target_type, "derived resource");
                Ok(Some((
                    name,
                    TargetResource {
                        target_type: add.target_type.clone(),
                        properties,
                        depends_on: vec![],
                    },
                )))
            }
            (name, properties) => {
                tracing::debug!(?name, ?properties, "derived resource skipped");
                Ok(None)
            }
        }
    }
}
