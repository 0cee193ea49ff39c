//! terraform documents
//!
//! Collects all `resource "<type>" "<name>" { ... }` blocks of one or more `.tf` documents into
//! [Resources]. Everything else (variables, outputs, providers...) is ignored.
//!
//! Attribute expressions are converted like this:
//!
//! | expression                     | value                                  |
//! |--------------------------------|----------------------------------------|
//! | `null`, `true`, `42`, `"text"` | the literal                            |
//! | `"arn:${var.x}"`               | the template text `arn:${var.x}`       |
//! | `aws_s3_bucket.logs.arn`       | `${aws_s3_bucket.logs.arn}`            |
//! | `[...]`, `{...}`               | array, object                          |
//! | anything else                  | the expression wrapped in `${...}`     |
//!
//! `depends_on = [aws_s3_bucket.logs]` becomes the list of bare identities (`aws_s3_bucket.logs`).
//! A nested block becomes an object under the block identifier, repeated blocks become a list.
use crate::identity::ResourceId;
use crate::value::{Map, Value};
use crate::Resources;
use hcl::{Block, Body, Expression, ObjectKey, Structure, TemplateExpr};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const RESOURCE_BLOCK: &str = "resource";
const DEPENDS_ON: &str = "depends_on";

pub type Source = Option<PathBuf>;

#[derive(Default, Debug)]
pub struct TerraformDocuments {
    resources: Resources,
}

impl TerraformDocuments {
    /// Inserts the resources of a terraform document
    pub fn insert(
        &mut self,
        document: hcl_edit::structure::Body,
        path: impl Into<Source>,
    ) -> Result<(), LoadError> {
        let source = path.into();

        let document: Body = document.into();
        for structure in document.into_iter() {
            let Structure::Block(block) = structure else {
                continue;
            };
            if block.identifier.as_str() != RESOURCE_BLOCK {
                continue;
            }

            let [resource_type, name] = block.labels.as_slice() else {
                tracing::warn!(labels = block.labels.len(), "resource block without type and name labels");
                continue;
            };
            let id = ResourceId::new(resource_type.as_str(), name.as_str());

            let named = self.resources.entry(id.resource_type.clone()).or_default();
            if named.contains_key(&id.name) {
                return Err(LoadError::DuplicateResource { id, path: source });
            }

            tracing::trace!(%id, "resource");
            named.insert(id.name, Value::Object(body_to_map(block.body)));
        }

        Ok(())
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    pub fn into_resources(self) -> Resources {
        self.resources
    }
}

impl TerraformDocuments {
    pub fn load_file(&mut self, file_path: &Path) -> Result<(), LoadError> {
        let file_path = file_path.canonicalize()?;
        tracing::info!(path=%file_path.display(), "loading file");

        let file_contents = std::fs::read_to_string(&file_path)?;
        let body = hcl_edit::parser::parse_body(&file_contents)?;

        self.insert(body, Some(file_path))
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("IO error")]
    IoError(#[from] std::io::Error),
    #[error("Unable to parse terraform file")]
    HclParseFailed(#[from] hcl_edit::parser::Error),
    #[error("resource {id} defined twice{}", origin(.path))]
    DuplicateResource { id: ResourceId, path: Source },
}

fn origin(path: &Source) -> String {
    match path {
        Some(path) => format!(" (in {})", path.display()),
        None => String::new(),
    }
}

fn body_to_map(body: Body) -> Map {
    let mut map = Map::new();
    let mut block_keys = HashSet::new();

    for structure in body.into_iter() {
        match structure {
            Structure::Attribute(attribute) => {
                let key = attribute.key.to_string();
                let value = if key == DEPENDS_ON {
                    dependencies(attribute.expr)
                } else {
                    expression_to_value(attribute.expr)
                };
                map.insert(key, value);
            }
            Structure::Block(block) => {
                let key = block.identifier.to_string();
                let value = block_to_value(block);
                let repeated = !block_keys.insert(key.clone());

                match map.get_mut(&key) {
                    Some(Value::Array(blocks)) if repeated => blocks.push(value),
                    Some(existing) if repeated => {
                        let first = std::mem::replace(existing, Value::Null);
                        *existing = Value::Array(vec![first, value]);
                    }
                    _ => {
                        map.insert(key, value);
                    }
                }
            }
        }
    }

    map
}

/// Block body, nested under its labels (if any)
fn block_to_value(block: Block) -> Value {
    let mut value = Value::Object(body_to_map(block.body));
    for label in block.labels.iter().rev() {
        let mut labelled = Map::new();
        labelled.insert(label.as_str().to_string(), value);
        value = Value::Object(labelled);
    }
    value
}

fn expression_to_value(expression: Expression) -> Value {
    match expression {
        Expression::Null => Value::Null,
        Expression::Bool(boolean) => Value::Boolean(boolean),
        Expression::Number(number) => match number.as_i64() {
            Some(integer) => Value::Integer(integer),
            None => number.as_f64().map(Value::Decimal).unwrap_or(Value::Null),
        },
        Expression::String(string) => Value::String(string),
        Expression::Array(array) => Value::Array(array.into_iter().map(expression_to_value).collect()),
        Expression::Object(object) => Value::Object(
            object
                .into_iter()
                .map(|(key, value)| (object_key(key), expression_to_value(value)))
                .collect(),
        ),
        Expression::TemplateExpr(template) => Value::String(template_text(*template)),
        Expression::Parenthesis(inner) => expression_to_value(*inner),
        other => Value::String(format!("${{{other}}}")),
    }
}

fn template_text(template: TemplateExpr) -> String {
    match template {
        TemplateExpr::QuotedString(text) => text,
        TemplateExpr::Heredoc(heredoc) => heredoc.template,
    }
}

fn object_key(key: ObjectKey) -> String {
    match key {
        ObjectKey::Identifier(identifier) => identifier.to_string(),
        ObjectKey::Expression(Expression::String(string)) => string,
        other => other.to_string(),
    }
}

/// `depends_on` entries as bare `type.name` strings
fn dependencies(expression: Expression) -> Value {
    let entries = match expression {
        Expression::Array(entries) => entries,
        single => vec![single],
    };

    entries
        .into_iter()
        .map(|entry| match entry {
            Expression::String(string) => Value::String(string),
            Expression::TemplateExpr(template) => Value::String(template_text(*template)),
            other => Value::String(other.to_string()),
        })
        .collect::<Vec<_>>()
        .into()
}

/// Utility macro to create [TerraformDocuments]
///
/// Create from a single document
/// ```
/// # use tfsam::terraform_documents;
/// let documents = terraform_documents!(r#"resource "aws_sqs_queue" "jobs" {}"#);
/// assert_eq!(documents.resources().len(), 1);
/// ```
///
/// Create from multiple documents (path required)
/// ```
/// # use tfsam::terraform_documents;
/// terraform_documents! {
///   "queue.tf" => r#"resource "aws_sqs_queue" "jobs" {}"#,
///   "topic.tf" => r#"resource "aws_sns_topic" "jobs" {}"#
/// };
/// ```
///
/// # Panic
/// Panics on invalid input
///
/// ```should_panic
/// # use tfsam::terraform_documents;
/// terraform_documents!("not = valid = hcl");
/// ```
#[macro_export]
macro_rules! terraform_documents {
    // single document without source
    { $expr:expr } => {{
        let mut docs = $crate::terraform::TerraformDocuments::default();
        docs.insert(hcl_edit::parser::parse_body($expr).expect("body must parse"), None)
            .expect("resources must be unique");
        docs
    }};
    // multi document with sources
    { $($source:expr => $expr:expr),+ } => {{
        let mut docs = $crate::terraform::TerraformDocuments::default();
        $(
            docs.insert(
                hcl_edit::parser::parse_body($expr).expect("body must parse"),
                Some(std::path::PathBuf::from($source)),
            )
            .expect("resources must be unique");
        )+

        docs
    }};
}
