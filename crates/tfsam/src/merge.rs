//! merge resolution
//!
//! Some target resources are assembled from several source resources. An API in the target
//! template for example carries its paths and methods, while the source describes every path
//! segment, method and integration as a resource of its own.
//!
//! For every merge rule of a [RuleSet] the related resources of the rule's type are looked up in
//! the [RelationshipGraph](crate::relationships::RelationshipGraph). Each one that passes the
//! filter query is transformed and written to the destination path. Every related resource that
//! contributed a value is *consumed*: it is elided from the final template.
use crate::casing::pascalize;
use crate::identity::{strip_marker, Reference, ResourceId};
use crate::path::{Operation, Path, PathError};
use crate::query::{QueryEngine, QueryError};
use crate::relationships::Related;
use crate::rules::{Config, MergeRule, ObjectType, RuleSet};
use crate::value::{Map, Value};
use crate::Resources;

/// Upper bound of hierarchy nodes visited for a single related resource
pub const MAX_WALK: usize = 50;

/// Placeholder key of a transform result that is replaced by the related resource name
const REF_NAME_PLACEHOLDER: &str = "_ref_name_";

#[derive(thiserror::Error, Debug)]
pub enum MergeError {
    #[error("hierarchy starting at {start} is deeper than {steps} levels (cycle?)")]
    HierarchyTooDeep { start: String, steps: usize },
    #[error("invalid merge destination")]
    Path(#[from] PathError),
    #[error(transparent)]
    Query(#[from] QueryError),
}

#[derive(derive_new::new)]
pub struct MergeResolver<'a> {
    config: &'a Config,
    engine: &'a dyn QueryEngine,
    resources: &'a Resources,
}

impl MergeResolver<'_> {
    /// Merge related resources into `properties`
    ///
    /// Returns the target names of all consumed resources.
    #[tracing::instrument(level = "trace", skip_all, fields(%id))]
    pub fn resolve(
        &self,
        id: &ResourceId,
        rules: &RuleSet,
        properties: &mut Map,
        related: &Related,
    ) -> Result<Vec<String>, MergeError> {
        let mut consumed = vec![];

        for (destination, rule) in &rules.merge {
            // `Path:suffix` allows multiple rules for one destination
            let destination = destination.split(':').next().unwrap_or(destination);
            if rules.debug {
                tracing::debug!(%id, destination, "merging");
            }

            let names = related
                .get(&rule.resource_type)
                .map(Vec::as_slice)
                .unwrap_or_default();

            let mut values = vec![];
            for name in names {
                if let Some((value, mut merged)) = self.merge_one(rule, name, rules.debug)? {
                    values.push(value);
                    consumed.append(&mut merged);
                }
            }

            if values.is_empty() {
                continue;
            }

            let path: Path = destination.parse()?;
            let write = |value: Value| {
                if rule.merge {
                    Operation::MergeInto(value)
                } else {
                    Operation::SetDefault(value)
                }
            };

            match rule.object_type {
                ObjectType::Object => {
                    for value in values {
                        path.apply(properties, write(value))?;
                    }
                }
                ObjectType::String => {
                    if let Some(first) = values.into_iter().next() {
                        path.apply(properties, write(first))?;
                    }
                }
                ObjectType::Array => {
                    path.apply(properties, write(Value::Array(values)))?;
                }
            }
        }

        for resource_type in &rules.merge_exclude_types {
            for name in related.get(resource_type).into_iter().flatten() {
                let id = ResourceId::new(resource_type.as_str(), name.as_str());
                consumed.push(self.config.naming.transform(&id).name);
            }
        }

        if rules.debug {
            tracing::debug!(%id, ?consumed, "merged");
        }

        Ok(consumed)
    }

    /// Transform one related resource
    ///
    /// Returns the produced value and the resources consumed with it, or nothing if the resource
    /// is filtered out or the transform has no result.
    fn merge_one(
        &self,
        rule: &MergeRule,
        name: &str,
        debug: bool,
    ) -> Result<Option<(Value, Vec<String>)>, MergeError> {
        let related_id = ResourceId::new(rule.resource_type.as_str(), name);
        let Some(attributes) = self
            .resources
            .get(&rule.resource_type)
            .and_then(|named| named.get(name))
        else {
            return Ok(None);
        };

        let mut instance = attributes.clone();
        let mut consumed = vec![];

        let hierarchy = &self.config.hierarchy;
        if rule.resource_type == hierarchy.resource_type {
            if let Some(companion) = instance
                .get(&hierarchy.companion)
                .and_then(Value::as_str)
                .and_then(ResourceId::parse)
            {
                consumed.push(self.config.naming.transform(&companion).name);
            }

            let (path, mut nodes) = self.walk(&related_id, &instance)?;
            consumed.append(&mut nodes);
            if let (Some(path), Some(object)) = (path, instance.as_object_mut()) {
                object.insert(hierarchy.output.clone(), Value::String(path));
            }
        }

        if let Some(filter) = &rule.filter {
            let matched = self.engine.evaluate(filter, &instance)?;
            if debug {
                tracing::debug!(%filter, ?matched, related = %related_id, "merge filter");
            }
            if matched != Value::Boolean(true) {
                return Ok(None);
            }
        }

        let mut value = self.engine.evaluate(&rule.transform, &instance)?;
        if value.is_null() {
            return Ok(None);
        }

        if let Some(object) = value.as_object_mut() {
            if let Some(bound) = object.shift_remove(REF_NAME_PLACEHOLDER) {
                object.insert(pascalize(name), bound);
            }
        }

        consumed.push(self.config.naming.transform(&related_id).name);
        Ok(Some((value, consumed)))
    }

    /// Follow the parent links starting at the related resource's link attribute
    ///
    /// Returns the accumulated path (`/outer/inner`) and the target names of all visited nodes.
    fn walk(
        &self,
        start: &ResourceId,
        instance: &Value,
    ) -> Result<(Option<String>, Vec<String>), MergeError> {
        let hierarchy = &self.config.hierarchy;
        let Some(mut link) = instance
            .get(&hierarchy.link)
            .and_then(Value::as_str)
            .map(str::to_string)
        else {
            return Ok((None, vec![]));
        };

        let mut segments = vec![];
        let mut nodes = vec![];

        loop {
            let Reference::Resource { id, attribute } = Reference::parse(strip_marker(&link))
            else {
                break;
            };

            // the root node is not a resource of its own
            if attribute.as_deref() == Some(hierarchy.root.as_str()) {
                break;
            }

            let Some(node) = self
                .resources
                .get(&id.resource_type)
                .and_then(|named| named.get(&id.name))
            else {
                break;
            };

            let Some(parent) = node.get(&hierarchy.parent).and_then(Value::as_str) else {
                break;
            };

            if nodes.len() == MAX_WALK {
                return Err(MergeError::HierarchyTooDeep {
                    start: start.to_string(),
                    steps: MAX_WALK,
                });
            }

            tracing::trace!(%id, step = nodes.len(), "hierarchy node");
            nodes.push(self.config.naming.transform(&id).name);
            if let Some(segment) = node.get(&hierarchy.segment).and_then(Value::as_str) {
                segments.push(segment.to_string());
            }
            link = parent.to_string();
        }

        segments.reverse();
        Ok((Some(format!("/{}", segments.join("/"))), nodes))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::naming::Naming;
    use crate::query::JmesPath;
    use crate::relationships::RelationshipGraph;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn config() -> Config {
        Config {
            naming: Naming {
                type_names: HashMap::from([(
                    "aws_api_gateway_rest_api".to_string(),
                    "AWS::Serverless::Api".to_string(),
                )]),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn resources(json: serde_json::Value) -> Resources {
        serde_json::from_value(json).expect("valid resources")
    }

    fn rules(yaml: &str) -> RuleSet {
        serde_yaml::from_str(yaml).expect("valid rules")
    }

    fn resolve(
        config: &Config,
        resources: &Resources,
        id: &ResourceId,
        rules: &RuleSet,
        properties: &mut Map,
    ) -> Result<Vec<String>, MergeError> {
        let engine = JmesPath::with_extensions(Arc::new(config.naming.clone())).unwrap();
        let graph = RelationshipGraph::build(resources);
        let related = graph.get(id).cloned().unwrap_or_default();
        MergeResolver::new(config, &engine, resources).resolve(id, rules, properties, &related)
    }

    fn api_resources() -> Resources {
        resources(serde_json::json!({
            "aws_api_gateway_rest_api": {"api": {"name": "api"}},
            "aws_api_gateway_resource": {
                "users": {
                    "rest_api_id": "${aws_api_gateway_rest_api.api.id}",
                    "parent_id": "${aws_api_gateway_rest_api.api.root_resource_id}",
                    "path_part": "users"
                },
                "user": {
                    "rest_api_id": "${aws_api_gateway_rest_api.api.id}",
                    "parent_id": "${aws_api_gateway_resource.users.id}",
                    "path_part": "{id}"
                }
            },
            "aws_api_gateway_method": {
                "get_user": {
                    "rest_api_id": "${aws_api_gateway_rest_api.api.id}",
                    "resource_id": "${aws_api_gateway_resource.user.id}",
                    "http_method": "GET"
                }
            },
            "aws_api_gateway_integration": {
                "get_user": {
                    "rest_api_id": "${aws_api_gateway_rest_api.api.id}",
                    "resource_id": "${aws_api_gateway_resource.user.id}",
                    "http_method": "${aws_api_gateway_method.get_user.http_method}",
                    "type": "AWS_PROXY"
                },
                "mock": {
                    "rest_api_id": "${aws_api_gateway_rest_api.api.id}",
                    "type": "MOCK"
                }
            }
        }))
    }

    #[test]
    fn hierarchy_walk_builds_paths_and_consumes_nodes() {
        let config = config();
        let resources = api_resources();
        let rules = rules(
            r#"
            merge:
              DefinitionBody.paths:
                type: aws_api_gateway_integration
                filter: "type == 'AWS_PROXY'"
                transform: "{path: _api_path, type: type}"
            "#,
        );
        let mut properties = Map::new();
        properties.insert(
            "DefinitionBody".into(),
            Value::from(serde_json::json!({"swagger": "2.0"})),
        );

        let consumed = resolve(
            &config,
            &resources,
            &ResourceId::new("aws_api_gateway_rest_api", "api"),
            &rules,
            &mut properties,
        )
        .unwrap();

        assert_eq!(
            consumed,
            vec![
                "GetUserApiGatewayMethod",
                "UserApiGatewayResource",
                "UsersApiGatewayResource",
                "GetUserApiGatewayIntegration",
            ]
        );
        assert_eq!(
            Value::Object(properties).to_json(),
            serde_json::json!({
                "DefinitionBody": {
                    "swagger": "2.0",
                    "paths": [{"path": "/users/{id}", "type": "AWS_PROXY"}]
                }
            })
        );
    }

    #[test]
    fn object_type_merges_every_value_and_binds_ref_name() {
        let config = config();
        let resources = resources(serde_json::json!({
            "aws_lambda_function": {"handler": {"runtime": "python3.12"}},
            "aws_lambda_permission": {
                "from_api": {"function_name": "${aws_lambda_function.handler.arn}", "principal": "apigateway.amazonaws.com"},
                "from_s3": {"function_name": "${aws_lambda_function.handler.arn}", "principal": "s3.amazonaws.com"}
            }
        }));
        let rules = rules(
            r#"
            merge:
              Events:
                type: aws_lambda_permission
                object_type: object
                merge: true
                transform: "{_ref_name_: {Principal: principal}}"
            "#,
        );
        let mut properties = Map::new();
        properties.insert("Events".into(), Value::Object(Map::new()));

        let consumed = resolve(
            &config,
            &resources,
            &ResourceId::new("aws_lambda_function", "handler"),
            &rules,
            &mut properties,
        )
        .unwrap();

        assert_eq!(
            consumed,
            vec!["FromApiLambdaPermission", "FromS3LambdaPermission"]
        );
        assert_eq!(
            Value::Object(properties).to_json(),
            serde_json::json!({"Events": {
                "FromApi": {"Principal": "apigateway.amazonaws.com"},
                "FromS3": {"Principal": "s3.amazonaws.com"}
            }})
        );
    }

    #[test]
    fn string_type_picks_first_and_no_match_leaves_destination_untouched() {
        let config = config();
        let resources = resources(serde_json::json!({
            "aws_lambda_function": {"handler": {"runtime": "python3.12"}},
            "aws_cloudwatch_log_group": {
                "a": {"name": "/aws/lambda/a", "retention_in_days": 7, "for": "${aws_lambda_function.handler.arn}"},
                "b": {"name": "/aws/lambda/b", "retention_in_days": 14, "for": "${aws_lambda_function.handler.arn}"}
            }
        }));
        let rules = rules(
            r#"
            merge:
              LogGroup:
                type: aws_cloudwatch_log_group
                object_type: string
                transform: name
              Retention:
                type: aws_cloudwatch_log_group
                filter: "retention_in_days > `30`"
                transform: retention_in_days
            "#,
        );
        let mut properties = Map::new();

        let consumed = resolve(
            &config,
            &resources,
            &ResourceId::new("aws_lambda_function", "handler"),
            &rules,
            &mut properties,
        )
        .unwrap();

        assert_eq!(consumed, vec!["ACloudwatchLogGroup", "BCloudwatchLogGroup"]);
        assert_eq!(
            Value::Object(properties).to_json(),
            serde_json::json!({"LogGroup": "/aws/lambda/a"})
        );
    }

    #[test]
    fn exclude_types_are_consumed_without_a_rule() {
        let config = config();
        let resources = resources(serde_json::json!({
            "aws_api_gateway_rest_api": {"api": {}},
            "aws_api_gateway_deployment": {"prod": {"rest_api_id": "${aws_api_gateway_rest_api.api.id}"}}
        }));
        let rules = rules("merge_exclude_types: [aws_api_gateway_deployment]");

        let consumed = resolve(
            &config,
            &resources,
            &ResourceId::new("aws_api_gateway_rest_api", "api"),
            &rules,
            &mut Map::new(),
        )
        .unwrap();

        assert_eq!(consumed, vec!["ProdApiGatewayDeployment"]);
    }

    #[test]
    fn suffixed_destinations_write_to_the_same_path() {
        let config = config();
        let resources = resources(serde_json::json!({
            "aws_lambda_function": {"handler": {"runtime": "python3.12"}},
            "aws_lambda_permission": {
                "from_api": {"function_name": "${aws_lambda_function.handler.arn}", "principal": "apigateway.amazonaws.com"},
                "from_s3": {"function_name": "${aws_lambda_function.handler.arn}", "principal": "s3.amazonaws.com"}
            }
        }));
        let rules = rules(
            r#"
            merge:
              Events:api:
                type: aws_lambda_permission
                filter: "principal == 'apigateway.amazonaws.com'"
                object_type: object
                merge: true
                transform: "{_ref_name_: {Type: 'Api'}}"
              Events:s3:
                type: aws_lambda_permission
                filter: "principal == 's3.amazonaws.com'"
                object_type: object
                merge: true
                transform: "{_ref_name_: {Type: 'S3'}}"
            "#,
        );
        let mut properties = Map::new();

        let consumed = resolve(
            &config,
            &resources,
            &ResourceId::new("aws_lambda_function", "handler"),
            &rules,
            &mut properties,
        )
        .unwrap();

        assert_eq!(
            consumed,
            vec!["FromApiLambdaPermission", "FromS3LambdaPermission"]
        );
        assert_eq!(
            Value::Object(properties).to_json(),
            serde_json::json!({"Events": {
                "FromApi": {"Type": "Api"},
                "FromS3": {"Type": "S3"}
            }})
        );
    }

    #[test]
    fn hierarchy_of_exactly_max_walk_nodes_reaches_the_root() {
        let config = config();

        let mut nodes = serde_json::Map::new();
        for n in 0..MAX_WALK {
            let parent = match n {
                0 => "${aws_api_gateway_rest_api.api.root_resource_id}".to_string(),
                n => format!("${{aws_api_gateway_resource.n{}.id}}", n - 1),
            };
            nodes.insert(
                format!("n{n}"),
                serde_json::json!({"parent_id": parent, "path_part": format!("p{n}")}),
            );
        }
        let resources = resources(serde_json::json!({
            "aws_api_gateway_rest_api": {"api": {}},
            "aws_api_gateway_resource": nodes,
            "aws_api_gateway_integration": {
                "deep": {
                    "rest_api_id": "${aws_api_gateway_rest_api.api.id}",
                    "resource_id": format!("${{aws_api_gateway_resource.n{}.id}}", MAX_WALK - 1)
                }
            }
        }));
        let rules = rules(
            r#"
            merge:
              Paths:
                type: aws_api_gateway_integration
                transform: _api_path
            "#,
        );
        let mut properties = Map::new();

        let consumed = resolve(
            &config,
            &resources,
            &ResourceId::new("aws_api_gateway_rest_api", "api"),
            &rules,
            &mut properties,
        )
        .unwrap();

        let expected_path = (0..MAX_WALK)
            .map(|n| format!("/p{n}"))
            .collect::<String>();
        assert_eq!(consumed.len(), MAX_WALK + 1);
        assert_eq!(
            Value::Object(properties).to_json(),
            serde_json::json!({"Paths": [expected_path]})
        );
    }

    #[test]
    fn cyclic_hierarchy_stops_after_bound() {
        let config = config();
        let resources = resources(serde_json::json!({
            "aws_api_gateway_rest_api": {"api": {}},
            "aws_api_gateway_resource": {
                "a": {"parent_id": "${aws_api_gateway_resource.b.id}", "path_part": "a"},
                "b": {"parent_id": "${aws_api_gateway_resource.a.id}", "path_part": "b"}
            },
            "aws_api_gateway_integration": {
                "loop": {
                    "rest_api_id": "${aws_api_gateway_rest_api.api.id}",
                    "resource_id": "${aws_api_gateway_resource.a.id}"
                }
            }
        }));
        let rules = rules(
            r#"
            merge:
              Paths:
                type: aws_api_gateway_integration
                transform: _api_path
            "#,
        );

        let error = resolve(
            &config,
            &resources,
            &ResourceId::new("aws_api_gateway_rest_api", "api"),
            &rules,
            &mut Map::new(),
        )
        .expect_err("cycle must be reported");

        assert!(matches!(
            error,
            MergeError::HierarchyTooDeep { ref start, steps: MAX_WALK }
                if start == "aws_api_gateway_integration.loop"
        ));
    }
}
