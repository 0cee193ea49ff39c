//! identifier casing
use crate::value::{Map, Value};

/// Convert `snake_case`, `kebab-case` or `camelCase` to `PascalCase`
///
/// Strings without any lower case letter (`ANY`, `GET`) and numbers are kept as they are.
pub fn pascalize(input: &str) -> String {
    let is_separator = |c: char| c == '_' || c == '-' || c.is_whitespace();

    if !input.chars().any(|c| c.is_lowercase()) {
        return input.to_string();
    }

    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    // leading separators are kept
    while let Some(c) = chars.next_if(|c| is_separator(*c)) {
        output.push(c);
    }

    let mut upper_next = true;
    let mut pending = String::new();
    for c in chars {
        if is_separator(c) {
            pending.push(c);
            upper_next = true;
            continue;
        }

        pending.clear();
        if upper_next {
            output.extend(c.to_uppercase());
            upper_next = false;
        } else {
            output.push(c);
        }
    }

    // trailing separators are kept
    output.push_str(&pending);
    output
}

/// Pascalize every object key in the tree
pub fn pascalize_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(pascalize_map(map)),
        Value::Array(array) => Value::Array(array.into_iter().map(pascalize_keys).collect()),
        other => other,
    }
}

pub fn pascalize_map(map: Map) -> Map {
    map.into_iter()
        .map(|(key, value)| (pascalize(&key), pascalize_keys(value)))
        .collect()
}
