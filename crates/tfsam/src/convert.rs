//! whole graph conversion
use crate::expand::Parameters;
use crate::identity::ResourceId;
use crate::query::{JmesPath, QueryError};
use crate::relationships::RelationshipGraph;
use crate::rules::Config;
use crate::transform::{TargetResource, TransformError, Transformer};
use crate::value::{Map, Value};
use crate::Resources;
use indexmap::IndexMap;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(thiserror::Error, Debug)]
pub enum ConvertError {
    #[error("no resources defined")]
    NoResources,
    #[error("no resources to write to template")]
    NothingToWrite,
    #[error("target resource {name} is produced by both {first} and {second}")]
    DuplicateTarget {
        name: String,
        first: ResourceId,
        second: ResourceId,
    },
    #[error("unable to transform {id}")]
    Transform {
        id: ResourceId,
        #[source]
        source: TransformError,
    },
    #[error("unable to set up query engine")]
    Query(#[from] QueryError),
}

/// The generated template
#[derive(Debug, Clone, serde::Serialize)]
pub struct Template {
    #[serde(flatten)]
    pub base: Map,
    /// parameters of the base template plus every discovered external parameter
    #[serde(rename = "Parameters", skip_serializing_if = "Map::is_empty")]
    pub parameters: Map,
    #[serde(rename = "Resources")]
    pub resources: IndexMap<String, TargetResource>,
}

/// Convert all source resources into a template
///
/// `filter` restricts which resources are transformed; every resource still takes part in the
/// relationship graph.
#[tracing::instrument(level = "debug", skip_all)]
pub fn convert(
    config: &Config,
    mut resources: Resources,
    filter: Option<&Regex>,
) -> Result<Template, ConvertError> {
    if resources.values().all(|named| named.is_empty()) {
        return Err(ConvertError::NoResources);
    }

    resolve_name_references(config, &mut resources);

    let graph = RelationshipGraph::build(&resources);
    let engine = JmesPath::with_extensions(Arc::new(config.naming.clone()))?;
    let transformer = Transformer::new(config, &engine).with_relationships(&graph, &resources);

    let mut produced: Vec<(ResourceId, String, TargetResource)> = vec![];
    let mut consumed = HashSet::new();
    let mut discovered = Parameters::new();

    for (resource_type, named) in &resources {
        for (name, attributes) in named {
            let id = ResourceId::new(resource_type.as_str(), name.as_str());
            if let Some(filter) = filter {
                if !filter.is_match(&id.to_string()) {
                    tracing::trace!(%id, "filtered");
                    continue;
                }
            }

            tracing::info!(%id, "processing");
            let transformed = transformer
                .transform(&id, attributes)
                .map_err(|source| ConvertError::Transform {
                    id: id.clone(),
                    source,
                })?;

            consumed.extend(transformed.consumed);
            discovered.extend(transformed.parameters);
            for (target_name, resource) in transformed.resources {
                produced.push((id.clone(), target_name, resource));
            }
        }
    }

    let mut sources: IndexMap<String, ResourceId> = IndexMap::new();
    let mut target_resources = IndexMap::new();
    for (id, target_name, resource) in produced {
        if consumed.contains(&target_name) {
            tracing::debug!(%target_name, "elided merged resource");
            continue;
        }

        if let Some(first) = sources.get(&target_name) {
            return Err(ConvertError::DuplicateTarget {
                name: target_name,
                first: first.clone(),
                second: id,
            });
        }

        sources.insert(target_name.clone(), id);
        target_resources.insert(target_name, resource);
    }

    if target_resources.is_empty() {
        return Err(ConvertError::NothingToWrite);
    }

    let mut base = config.template.clone();
    base.shift_remove("Resources");

    let mut parameters = match base.shift_remove("Parameters") {
        Some(Value::Object(declared)) => declared,
        Some(other) => {
            tracing::warn!(?other, "base template parameters are not an object, ignoring them");
            Map::new()
        }
        None => Map::new(),
    };
    for name in discovered {
        parameters
            .entry(name)
            .or_insert_with(|| Value::Object(Map::from([("Type".to_string(), Value::from("String"))])));
    }

    Ok(Template {
        base,
        parameters,
        resources: target_resources,
    })
}

/// Turn plain name attributes into references so they take part in the relationship graph
fn resolve_name_references(config: &Config, resources: &mut Resources) {
    for reference in &config.name_references {
        let Some(named) = resources.get_mut(&reference.resource_type) else {
            continue;
        };

        for (name, attributes) in named.iter_mut() {
            let Some(object) = attributes.as_object_mut() else {
                continue;
            };
            let Some(value) = object
                .get(&reference.name_attribute)
                .and_then(Value::as_str)
                .filter(|value| !value.contains("${"))
                .map(str::to_string)
            else {
                continue;
            };

            let rewritten = format!("${{{}.{value}.id}}", reference.target_type);
            tracing::trace!(resource = %name, from = %value, to = %rewritten, "name reference");
            object.insert(reference.name_attribute.clone(), Value::String(rewritten));
        }
    }
}
