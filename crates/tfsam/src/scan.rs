//! reference scanner
use crate::identity::{find_references, ResourceId};
use crate::value::Value;
use crate::visit::VisitStrings;
use std::collections::BTreeSet;

/// All resources referenced anywhere inside `value`
///
/// `${type.name.attribute}` is normalized to `type.name`. Pseudo parameters, external parameters
/// and anything else that does not name a resource are ignored.
pub fn referenced_resources(value: &Value) -> Vec<ResourceId> {
    let mut found = BTreeSet::new();
    value.visit_strings(&mut |string: &str| {
        if !string.contains("${") {
            return;
        }

        found.extend(find_references(string).filter_map(ResourceId::parse));
    });

    found.into_iter().collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn scans_nested_strings() {
        let value = Value::from(serde_json::json!({
            "rest_api_id": "${aws_api_gateway_rest_api.foo.id}",
            "uri": "arn:aws:apigateway:${AWS::Region}:lambda:path/${aws_lambda_function.f.arn}/${var.Stage}",
            "nested": [{"role": "${aws_iam_role.r.arn}"}, 42, true, null],
            "again": "${aws_api_gateway_rest_api.foo.root_resource_id}"
        }));

        assert_eq!(
            referenced_resources(&value),
            vec![
                ResourceId::new("aws_api_gateway_rest_api", "foo"),
                ResourceId::new("aws_iam_role", "r"),
                ResourceId::new("aws_lambda_function", "f"),
            ]
        );
    }

    #[test]
    fn non_string_leaves_yield_nothing() {
        assert!(referenced_resources(&Value::Integer(1)).is_empty());
        assert!(referenced_resources(&Value::String("no refs".into())).is_empty());
    }
}
