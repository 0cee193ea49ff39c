use super::{Visit, VisitMut};
use crate::value::Value;

/// Recursively visit all string leaves
///
/// Intrinsics are already resolved and are not descended into.
pub trait VisitStrings {
    fn visit_strings(&self, visitor: &mut dyn Visit<str>);
}

/// Recursively visit all string leaves mutably
///
/// The visitor receives the [Value] holding the string so it can replace it with something
/// that is not a string (an intrinsic, usually).
pub trait VisitStringsMut {
    fn visit_strings_mut(&mut self, visitor: &mut dyn VisitMut<Value>);
}

impl VisitStrings for Value {
    fn visit_strings(&self, visitor: &mut dyn Visit<str>) {
        match self {
            Value::String(string) => visitor.visit(string),
            Value::Array(array) => {
                for value in array {
                    value.visit_strings(visitor);
                }
            }
            Value::Object(object) => {
                for value in object.values() {
                    value.visit_strings(visitor);
                }
            }
            Value::Null
            | Value::Boolean(_)
            | Value::Integer(_)
            | Value::Decimal(_)
            | Value::Intrinsic(_) => {}
        }
    }
}

impl VisitStringsMut for Value {
    fn visit_strings_mut(&mut self, visitor: &mut dyn VisitMut<Value>) {
        match self {
            Value::String(_) => visitor.visit_mut(self),
            Value::Array(array) => {
                for value in array {
                    value.visit_strings_mut(visitor);
                }
            }
            Value::Object(object) => {
                for value in object.values_mut() {
                    value.visit_strings_mut(visitor);
                }
            }
            Value::Null
            | Value::Boolean(_)
            | Value::Integer(_)
            | Value::Decimal(_)
            | Value::Intrinsic(_) => {}
        }
    }
}
