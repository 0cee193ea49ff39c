//! reference expansion
//!
//! Rewrites `${...}` reference expressions embedded in string values into target intrinsics.
//!
//! | source string                           | result                                                 |
//! |-----------------------------------------|--------------------------------------------------------|
//! | `${var.Stage}`                          | `{"Ref": "Stage"}` (and `Stage` becomes a parameter)   |
//! | `${AWS::Region}`                        | `${AWS::Region}` (unchanged)                           |
//! | `${aws_iam_role.exec.arn}`              | `{"Ref": "ExecIamRole"}`                               |
//! | `${aws_sqs_queue.jobs.url}`             | `{"Fn::GetAtt": ["JobsSqsQueue", "Url"]}`              |
//! | `arn:${AWS::Partition}:${var.Stage}/x`  | `{"Fn::Sub": ["arn:${AWS::Partition}:${Stage}/x", {"Stage": {"Ref": "Stage"}}]}` |
use crate::casing::pascalize;
use crate::identity::{find_references, whole_reference, Reference, ResourceId};
use crate::naming::Naming;
use crate::value::{Intrinsic, Map, Value};
use crate::visit::{VisitMut, VisitStringsMut};
use std::collections::BTreeSet;

/// Attributes resolved to a plain `Ref` of another resource
const REFERENCE_ATTRIBUTES: &[&str] = &["Id", "Arn"];

/// A whole-string reference to another resource that became a `Ref`
///
/// A `depends_on` entry pointing at the same resource is redundant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentReference {
    pub id: ResourceId,
    pub target_name: String,
}

/// External parameters discovered while expanding
pub type Parameters = BTreeSet<String>;

pub struct VariableExpander<'a> {
    naming: &'a Naming,
    parent_references: &'a mut Vec<ParentReference>,
    parameters: &'a mut Parameters,
}

impl<'a> VariableExpander<'a> {
    pub fn new(
        naming: &'a Naming,
        parent_references: &'a mut Vec<ParentReference>,
        parameters: &'a mut Parameters,
    ) -> Self {
        Self {
            naming,
            parent_references,
            parameters,
        }
    }

    /// Expand every string in the tree
    pub fn expand(&mut self, mut value: Value) -> Value {
        value.visit_strings_mut(self);
        value
    }

    pub fn expand_map(&mut self, map: Map) -> Map {
        match self.expand(Value::Object(map)) {
            Value::Object(map) => map,
            _ => unreachable!("expansion only replaces string leaves"),
        }
    }

    fn expand_string(&mut self, string: &str) -> Option<Value> {
        if let Some(interior) = whole_reference(string) {
            return self.resolve_whole(interior);
        }

        if string.contains("${") {
            return Some(self.resolve_template(string));
        }

        None
    }

    fn resolve_whole(&mut self, interior: &str) -> Option<Value> {
        match Reference::parse(interior) {
            Reference::Parameter(name) => {
                self.parameters.insert(name.clone());
                Some(Intrinsic::Ref(name).into())
            }
            Reference::Pseudo(_) | Reference::Other(_) => None,
            Reference::Resource { id, attribute } => {
                let target = self.naming.transform(&id);
                let attribute = attribute.as_deref().map(pascalize);

                match attribute {
                    Some(attribute) if !REFERENCE_ATTRIBUTES.contains(&attribute.as_str()) => {
                        Some(Intrinsic::GetAtt(target.name, attribute).into())
                    }
                    _ => {
                        self.parent_references.push(ParentReference {
                            id,
                            target_name: target.name.clone(),
                        });
                        Some(Intrinsic::Ref(target.name).into())
                    }
                }
            }
        }
    }

    fn resolve_template(&mut self, string: &str) -> Value {
        let interiors: BTreeSet<&str> = find_references(string)
            .map(|reference| &reference[2..reference.len() - 1])
            .collect();

        let mut template = string.to_string();
        let mut variables = Map::new();

        for interior in interiors {
            match Reference::parse(interior) {
                Reference::Pseudo(_) | Reference::Other(_) => {}
                Reference::Parameter(name) => {
                    self.parameters.insert(name.clone());
                    template = template.replace(&format!("${{{interior}}}"), &format!("${{{name}}}"));
                    variables.insert(name.clone(), Intrinsic::Ref(name).into());
                }
                Reference::Resource { id, attribute } => {
                    let target = self.naming.transform(&id);
                    let value = match attribute {
                        Some(attribute) => Intrinsic::GetAtt(target.name, pascalize(&attribute)),
                        None => Intrinsic::Ref(target.name),
                    };
                    variables.insert(interior.to_string(), value.into());
                }
            }
        }

        Intrinsic::Sub(template, variables).into()
    }
}

impl VisitMut<Value> for VariableExpander<'_> {
    fn visit_mut(&mut self, value: &mut Value) {
        let Value::String(string) = value else {
            return;
        };

        if let Some(expanded) = self.expand_string(string) {
            tracing::trace!(from = %string, to = ?expanded, "expanded reference");
            *value = expanded;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Expanded {
        value: serde_json::Value,
        parents: Vec<ParentReference>,
        parameters: Parameters,
    }

    fn expand(input: serde_json::Value) -> Expanded {
        let naming = Naming::default();
        let mut parents = vec![];
        let mut parameters = Parameters::new();
        let value = VariableExpander::new(&naming, &mut parents, &mut parameters)
            .expand(Value::from(input))
            .to_json();
        Expanded {
            value,
            parents,
            parameters,
        }
    }

    #[test]
    fn whole_string_parameter() {
        let expanded = expand(serde_json::json!({"stage_name": "${var.Stage}"}));

        assert_eq!(expanded.value, serde_json::json!({"stage_name": {"Ref": "Stage"}}));
        assert_eq!(expanded.parameters, Parameters::from(["Stage".to_string()]));
    }

    #[test]
    fn whole_string_resource_references() {
        let expanded = expand(serde_json::json!({
            "role": "${aws_iam_role.exec.arn}",
            "queue": "${aws_sqs_queue.jobs.url}",
            "bucket": "${aws_s3_bucket.logs}",
            "region": "${AWS::Region}",
            "local": "${local.name}"
        }));

        assert_eq!(
            expanded.value,
            serde_json::json!({
                "role": {"Ref": "ExecIamRole"},
                "queue": {"Fn::GetAtt": ["JobsSqsQueue", "Url"]},
                "bucket": {"Ref": "LogsS3Bucket"},
                "region": "${AWS::Region}",
                "local": "${local.name}"
            })
        );
        assert_eq!(
            expanded.parents,
            vec![
                ParentReference {
                    id: ResourceId::new("aws_iam_role", "exec"),
                    target_name: "ExecIamRole".into()
                },
                ParentReference {
                    id: ResourceId::new("aws_s3_bucket", "logs"),
                    target_name: "LogsS3Bucket".into()
                },
            ]
        );
        assert!(expanded.parameters.is_empty());
    }

    #[test]
    fn embedded_references_become_sub() {
        let expanded = expand(serde_json::json!({
            "uri": "arn:${AWS::Partition}:${var.Stage}/${aws_lambda_function.f.arn}/${var.Stage}"
        }));

        assert_eq!(
            expanded.value,
            serde_json::json!({
                "uri": {"Fn::Sub": [
                    "arn:${AWS::Partition}:${Stage}/${aws_lambda_function.f.arn}/${Stage}",
                    {
                        "Stage": {"Ref": "Stage"},
                        "aws_lambda_function.f.arn": {"Fn::GetAtt": ["FLambdaFunction", "Arn"]}
                    }
                ]}
            })
        );
        assert_eq!(expanded.parameters.len(), 1);
        assert!(expanded.parents.is_empty());
    }

    #[test]
    fn pseudo_only_template_has_no_variables() {
        let expanded = expand(serde_json::json!(["${AWS::AccountId}-${AWS::Region}"]));

        assert_eq!(
            expanded.value,
            serde_json::json!([{"Fn::Sub": "${AWS::AccountId}-${AWS::Region}"}])
        );
    }

    #[test]
    fn intrinsics_are_not_expanded_twice() {
        let naming = Naming::default();
        let mut parents = vec![];
        let mut parameters = Parameters::new();
        let mut expander = VariableExpander::new(&naming, &mut parents, &mut parameters);

        let once = expander.expand(Value::from(serde_json::json!({"a": "x-${var.A}"})));
        let twice = expander.expand(once.clone());

        assert_eq!(once, twice);
    }

    #[test]
    fn other_leaves_are_untouched() {
        let input = serde_json::json!({"n": 1, "b": true, "s": "plain", "z": null});
        assert_eq!(expand(input.clone()).value, input);
    }
}
