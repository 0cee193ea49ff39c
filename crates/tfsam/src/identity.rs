//! resource identities and the `${...}` reference syntax
use regex::Regex;
use std::sync::LazyLock;

static REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{[^}]+\}").expect("reference pattern must compile"));

/// Terraform roots that never name a resource
const NON_RESOURCE_ROOTS: &[&str] = &[
    "var", "local", "data", "module", "path", "count", "each", "self", "terraform",
];

/// Identity of a source resource: `type.name`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, derive_new::new)]
pub struct ResourceId {
    #[new(into)]
    pub resource_type: String,
    #[new(into)]
    pub name: String,
}

impl ResourceId {
    /// Parse `type.name` or `type.name.attribute`, with or without reference markers
    ///
    /// The attribute (if any) is dropped.
    pub fn parse(reference: &str) -> Option<Self> {
        match Reference::parse(strip_marker(reference)) {
            Reference::Resource { id, .. } => Some(id),
            _ => None,
        }
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.resource_type, self.name)
    }
}

impl serde::Serialize for ResourceId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Interior of a `${...}` reference expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// `AWS::Region`, passed through untouched
    Pseudo(String),
    /// `var.NAME` or `var["NAME"]`
    Parameter(String),
    /// `type.name` or `type.name.attribute`
    Resource {
        id: ResourceId,
        attribute: Option<String>,
    },
    /// anything else (locals, data sources, function calls...), passed through untouched
    Other(String),
}

impl Reference {
    pub fn parse(interior: &str) -> Self {
        if interior.contains("::") {
            return Reference::Pseudo(interior.to_string());
        }

        if let Some(rest) = interior.strip_prefix("var") {
            if let Some(name) = rest.strip_prefix('.') {
                return Reference::Parameter(name.to_string());
            }
            if let Some(name) = rest
                .strip_prefix("[\"")
                .and_then(|rest| rest.strip_suffix("\"]"))
            {
                return Reference::Parameter(name.to_string());
            }
        }

        let parts: Vec<&str> = interior.split('.').collect();
        let is_identifier = |part: &&str| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        };

        match parts.as_slice() {
            [resource_type, name] | [resource_type, name, _]
                if parts.iter().all(is_identifier)
                    && !NON_RESOURCE_ROOTS.contains(resource_type) =>
            {
                Reference::Resource {
                    id: ResourceId::new(*resource_type, *name),
                    attribute: parts.get(2).map(|attribute| attribute.to_string()),
                }
            }
            _ => Reference::Other(interior.to_string()),
        }
    }
}

/// All reference expressions (including markers) found in `text`, in order of appearance
pub fn find_references(text: &str) -> impl Iterator<Item = &str> {
    REFERENCE.find_iter(text).map(|found| found.as_str())
}

/// Remove the `${` and `}` markers if present on both ends
pub fn strip_marker(reference: &str) -> &str {
    reference
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
        .unwrap_or(reference)
}

/// Interior of `text` if the entire string is exactly one reference expression
pub fn whole_reference(text: &str) -> Option<&str> {
    let found = REFERENCE.find(text)?;
    if found.start() == 0 && found.end() == text.len() {
        Some(strip_marker(found.as_str()))
    } else {
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_reference_kinds() {
        assert_eq!(
            Reference::parse("AWS::Region"),
            Reference::Pseudo("AWS::Region".into())
        );
        assert_eq!(
            Reference::parse("var.Stage"),
            Reference::Parameter("Stage".into())
        );
        assert_eq!(
            Reference::parse(r#"var["Stage"]"#),
            Reference::Parameter("Stage".into())
        );
        assert_eq!(
            Reference::parse("aws_lambda_function.foo_bar-api.arn"),
            Reference::Resource {
                id: ResourceId::new("aws_lambda_function", "foo_bar-api"),
                attribute: Some("arn".into())
            }
        );
        assert_eq!(
            Reference::parse("local.name"),
            Reference::Other("local.name".into())
        );
        assert_eq!(
            Reference::parse("a.b.c.d"),
            Reference::Other("a.b.c.d".into())
        );
    }

    #[test]
    fn whole_reference_requires_exact_match() {
        assert_eq!(whole_reference("${aws_s3_bucket.b.id}"), Some("aws_s3_bucket.b.id"));
        assert_eq!(whole_reference("${aws_s3_bucket.b.id}/key"), None);
        assert_eq!(whole_reference("plain"), None);
    }

    #[test]
    fn resource_id_drops_attribute() {
        assert_eq!(
            ResourceId::parse("${aws_iam_role.exec.arn}"),
            Some(ResourceId::new("aws_iam_role", "exec"))
        );
        assert_eq!(ResourceId::parse("${var.Stage}"), None);
        assert_eq!(ResourceId::new("a", "b").to_string(), "a.b");
    }
}
