//! # tfsam - terraform to AWS SAM
//!
//! Converts the resources of a terraform configuration into an AWS SAM (CloudFormation) template.
//!
//! ## Introduction for developers
//!
//! Read this to understand how `tfsam` works internally.
//!
//! ### Loading files
//!
//! A `.tf` document is parsed as a `body` ([hcl_edit::structure::Body]) and every
//! `resource "<type>" "<name>"` block is collected by [terraform::TerraformDocuments]. The result is
//! plain data: [Resources], a map of source type to resource name to attributes
//! ([value::Value]). Expressions that cannot be represented as literals (traversals, function
//! calls...) are kept as `${...}` reference strings, which is all the following steps care about.
//!
//! ### Configuration
//!
//! How a resource is converted is described by rule sets loaded from a configuration directory
//! ([rules::Config]). Each source type gets the common rule set with its own rule set layered on
//! top. Rules address attributes with dotted paths ([path::Path]) and compute values with JMESPath
//! queries ([query::QueryEngine]).
//!
//! ### Relationships
//!
//! Before anything is converted the `${type.name...}` references of all resources are collected
//! into a [relationships::RelationshipGraph]. For each resource it knows which resources it
//! references and which resources reference it.
//!
//! ```hcl
//! resource "aws_api_gateway_rest_api" "foo" {}
//!
//! resource "aws_api_gateway_deployment" "foo" {
//!   rest_api_id = aws_api_gateway_rest_api.foo.id
//! }
//! ```
//!
//! | **resource**                       | **related**                                  |
//! |------------------------------------|----------------------------------------------|
//! | `aws_api_gateway_rest_api.foo`     | `aws_api_gateway_deployment: [foo]`          |
//! | `aws_api_gateway_deployment.foo`   | `aws_api_gateway_rest_api: [foo]`            |
//!
//! ### Transforming
//!
//! see [transform::Transformer::transform]
//!
//! Every resource is transformed on its own, in sorted order. Attribute keys are pascalized,
//! references are expanded into intrinsic functions ([expand::VariableExpander]) and target
//! names are derived from the source identity ([naming::Naming]):
//!
//! | **source**                              | **target**                                   |
//! |-----------------------------------------|----------------------------------------------|
//! | `aws_sqs_queue.jobs`                    | `JobsSqsQueue` of type `AWS::SQS::Queue`     |
//! | `"${aws_sqs_queue.jobs.arn}"`           | `{"Ref": "JobsSqsQueue"}`                    |
//! | `"${aws_sqs_queue.jobs.url}"`           | `{"Fn::GetAtt": ["JobsSqsQueue", "Url"]}`    |
//! | `"${var.stage}"`                        | `{"Ref": "stage"}` plus a template parameter |
//!
//! ### Merging
//!
//! Some target resources are assembled from several source resources (an API carries its
//! paths and methods). The [merge::MergeResolver] uses the relationship graph to find the related
//! resources, folds them into the target resource and reports them as consumed. Consumed
//! resources are left out of the template ([convert::convert]).
//!
//! ### Output
//!
//! The resulting [convert::Template] is serialized via [serde] (YAML or JSON).
//!
use std::collections::BTreeMap;

pub mod casing;
pub mod convert;
pub mod expand;
pub mod identity;
pub mod merge;
pub mod naming;
pub mod path;
pub mod query;
pub mod relationships;
pub mod rules;
pub mod scan;
pub mod terraform;
pub mod transform;
pub mod value;
mod visit;

/// source type -> resource name -> attributes
pub type Resources = BTreeMap<String, BTreeMap<String, value::Value>>;
