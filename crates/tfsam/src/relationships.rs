//! relationship graph
//!
//! For every reference from resource `A` to resource `B` two entries are recorded:
//! - under `B`: `A` as a related instance of `A`'s type (`B` is referenced by `A`)
//! - under `A`: `B` as a related instance of `B`'s type (`A` references `B`)
//!
//! Every list of related names is sorted and free of duplicates, so the graph does not depend on
//! the order resources are visited in.
use crate::identity::ResourceId;
use crate::scan::referenced_resources;
use crate::Resources;
use std::collections::{BTreeMap, BTreeSet};

/// related type -> sorted related names
pub type Related = BTreeMap<String, Vec<String>>;

#[derive(Debug, Default, Clone, PartialEq, serde::Serialize)]
#[serde(transparent)]
pub struct RelationshipGraph {
    entries: BTreeMap<ResourceId, Related>,
}

impl RelationshipGraph {
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn build(resources: &Resources) -> Self {
        let mut presence: BTreeMap<ResourceId, BTreeMap<String, BTreeSet<String>>> =
            Default::default();

        for (resource_type, named) in resources {
            for (name, attributes) in named {
                let referencing = ResourceId::new(resource_type.as_str(), name.as_str());

                for referenced in referenced_resources(attributes) {
                    tracing::trace!(%referencing, %referenced, "relationship");

                    presence
                        .entry(referenced.clone())
                        .or_default()
                        .entry(referencing.resource_type.clone())
                        .or_default()
                        .insert(referencing.name.clone());

                    presence
                        .entry(referencing.clone())
                        .or_default()
                        .entry(referenced.resource_type)
                        .or_default()
                        .insert(referenced.name);
                }
            }
        }

        let entries = presence
            .into_iter()
            .map(|(id, related)| {
                let related = related
                    .into_iter()
                    .map(|(related_type, names)| (related_type, names.into_iter().collect()))
                    .collect();
                (id, related)
            })
            .collect();

        Self { entries }
    }

    /// Everything related to `id`
    pub fn get(&self, id: &ResourceId) -> Option<&Related> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
