//! source identity -> target type and logical name
use crate::casing::pascalize;
use crate::identity::{strip_marker, ResourceId};
use std::collections::HashMap;

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct Naming {
    /// Source types outside of this prefix are passed through
    pub provider_prefix: String,
    /// First segment of every derived target type
    pub organization: String,
    /// Joins target type segments
    pub separator: String,
    /// Explicit `source type -> target type` table
    pub type_names: HashMap<String, String>,
    /// Lower case service segment -> target service name
    pub service_names: HashMap<String, String>,
}

impl Default for Naming {
    fn default() -> Self {
        Self {
            provider_prefix: "aws_".into(),
            organization: "AWS".into(),
            separator: "::".into(),
            type_names: Default::default(),
            service_names: Default::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetName {
    pub target_type: String,
    pub name: String,
}

impl Naming {
    pub fn transform(&self, id: &ResourceId) -> TargetName {
        if !id.resource_type.starts_with(&self.provider_prefix) {
            return TargetName {
                target_type: id.resource_type.clone(),
                name: id.to_string(),
            };
        }

        let segments: Vec<String> = match self.type_names.get(&id.resource_type) {
            Some(target_type) => target_type
                .split(self.separator.as_str())
                .map(str::to_string)
                .collect(),
            None => {
                let mut segments: Vec<String> =
                    id.resource_type.splitn(3, '_').map(pascalize).collect();
                segments[0] = self.organization.clone();
                if let Some(service) = segments.get_mut(1) {
                    if let Some(known) = self.service_names.get(&service.to_lowercase()) {
                        *service = known.clone();
                    }
                }
                segments
            }
        };

        TargetName {
            target_type: segments.join(&self.separator),
            name: format!("{}{}", pascalize(&id.name), segments[1..].concat()),
        }
    }

    /// Transform a reference string (`${type.name.attr}`, `type.name`...)
    ///
    /// Anything that does not name a resource is passed through as is.
    pub fn transform_reference(&self, reference: &str) -> TargetName {
        match ResourceId::parse(reference) {
            Some(id) => self.transform(&id),
            None => {
                let reference = strip_marker(reference);
                TargetName {
                    target_type: reference.to_string(),
                    name: reference.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn naming() -> Naming {
        Naming {
            type_names: HashMap::from([(
                "aws_api_gateway_rest_api".to_string(),
                "AWS::ApiGateway::RestApi".to_string(),
            )]),
            service_names: HashMap::from([("dynamodb".to_string(), "DynamoDB".to_string())]),
            ..Default::default()
        }
    }

    fn target(target_type: &str, name: &str) -> TargetName {
        TargetName {
            target_type: target_type.into(),
            name: name.into(),
        }
    }

    #[test]
    fn explicit_type_table() {
        assert_eq!(
            naming().transform(&ResourceId::new("aws_api_gateway_rest_api", "foo")),
            target("AWS::ApiGateway::RestApi", "FooApiGatewayRestApi")
        );
    }

    #[test]
    fn derived_type_with_service_lookup() {
        assert_eq!(
            naming().transform(&ResourceId::new("aws_dynamodb_table", "user_sessions")),
            target("AWS::DynamoDB::Table", "UserSessionsDynamoDBTable")
        );
        assert_eq!(
            naming().transform(&ResourceId::new("aws_lambda_function", "foo_bar-api")),
            target("AWS::Lambda::Function", "FooBarApiLambdaFunction")
        );
        assert_eq!(
            naming().transform(&ResourceId::new("aws_iam_role_policy", "p")),
            target("AWS::Iam::RolePolicy", "PIamRolePolicy")
        );
    }

    #[test]
    fn foreign_types_pass_through() {
        assert_eq!(
            naming().transform(&ResourceId::new("random_id", "suffix")),
            target("random_id", "random_id.suffix")
        );
        assert_eq!(
            naming().transform_reference("${local.name}"),
            target("local.name", "local.name")
        );
    }

    #[test]
    fn same_name_different_types_do_not_collide() {
        let naming = naming();
        let a = naming.transform(&ResourceId::new("aws_s3_bucket", "logs"));
        let b = naming.transform(&ResourceId::new("aws_s3_bucket_policy", "logs"));
        let c = naming.transform_reference("${aws_s3_bucket.logs.arn}");

        assert_ne!(a, b);
        assert_eq!(a, c);
        assert_eq!(a.name, "LogsS3Bucket");
    }
}
