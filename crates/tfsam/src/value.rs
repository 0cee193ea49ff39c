//! value representation
//!
//! The attribute tree of a resource contains the following data types
//! - null
//! - boolean (true/false)
//! - integer (signed, i64)
//! - decimal (f64)
//! - string (utf-8)
//! - array ("list" of values)
//! - object (order-preserving "map"/"dictionary", where the key is of type string)
//! - intrinsic (an already resolved target expression such as `Ref` or `Fn::GetAtt`)
//!
//! Intrinsics are opaque to everything that walks a tree: they are never scanned for references,
//! never expanded twice and their keys are never re-cased.
use serde::{
    ser::{SerializeMap, SerializeSeq},
    Serializer,
};

pub type Map = indexmap::IndexMap<String, Value>;

/// All possible value types
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    String(String),
    Array(Vec<Value>),
    Object(Map),
    Intrinsic(Box<Intrinsic>),
}

/// A target template function call
#[derive(Debug, Clone, PartialEq)]
pub enum Intrinsic {
    /// `{"Ref": name}`
    Ref(String),
    /// `{"Fn::GetAtt": [resource, attribute]}`
    GetAtt(String, String),
    /// `{"Fn::Sub": template}` or `{"Fn::Sub": [template, variables]}` when variables are present
    Sub(String, Map),
    /// any other `Fn::*` call, kept verbatim
    Call(String, Value),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut Map> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Lookup a direct child of an object
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(key))
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl From<Intrinsic> for Value {
    fn from(value: Intrinsic) -> Self {
        Value::Intrinsic(Box::new(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<Map> for Value {
    fn from(value: Map) -> Self {
        Value::Object(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::Array(value.into_iter().map(Into::into).collect())
    }
}

impl From<serde_json::Number> for Value {
    fn from(value: serde_json::Number) -> Self {
        if let Some(int) = value.as_i64() {
            return Value::Integer(int);
        }

        // u64 beyond i64::MAX and every float end up here
        Value::Decimal(value.as_f64().unwrap_or(f64::NAN))
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => b.into(),
            serde_json::Value::Number(n) => n.into(),
            serde_json::Value::String(s) => s.into(),
            serde_json::Value::Array(a) => a.into(),
            serde_json::Value::Object(o) => {
                let map: Map = o.into_iter().map(|(k, v)| (k, v.into())).collect();
                match Intrinsic::lift(map) {
                    Ok(intrinsic) => intrinsic.into(),
                    Err(map) => Value::Object(map),
                }
            }
        }
    }
}

impl Intrinsic {
    /// Recognize a single key object as a template function call
    ///
    /// Returns the map unchanged if it is not one.
    pub fn lift(mut map: Map) -> Result<Intrinsic, Map> {
        if map.len() != 1 {
            return Err(map);
        }

        let is_call = map
            .keys()
            .next()
            .is_some_and(|key| key == "Ref" || key.starts_with("Fn::"));
        if !is_call {
            return Err(map);
        }

        let Some((key, value)) = map.pop() else {
            return Err(map);
        };

        let intrinsic = match (key, value) {
            (key, Value::String(name)) if key == "Ref" => Intrinsic::Ref(name),
            (key, Value::Array(mut parts)) if key == "Fn::GetAtt" && parts.len() == 2 => {
                match (parts.pop(), parts.pop()) {
                    (Some(Value::String(attribute)), Some(Value::String(resource))) => {
                        Intrinsic::GetAtt(resource, attribute)
                    }
                    (Some(attribute), Some(resource)) => {
                        Intrinsic::Call(key, Value::Array(vec![resource, attribute]))
                    }
                    _ => Intrinsic::Call(key, Value::Array(vec![])),
                }
            }
            (key, Value::String(template)) if key == "Fn::Sub" => {
                Intrinsic::Sub(template, Map::new())
            }
            (key, Value::Array(mut parts)) if key == "Fn::Sub" && parts.len() == 2 => {
                match (parts.pop(), parts.pop()) {
                    (Some(Value::Object(variables)), Some(Value::String(template))) => {
                        Intrinsic::Sub(template, variables)
                    }
                    (Some(variables), Some(template)) => {
                        Intrinsic::Call(key, Value::Array(vec![template, variables]))
                    }
                    _ => Intrinsic::Call(key, Value::Array(vec![])),
                }
            }
            (key, value) => Intrinsic::Call(key, value),
        };

        Ok(intrinsic)
    }
}

impl<'de> serde::de::Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::de::Deserializer<'de>,
    {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

impl serde::ser::Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Boolean(value) => serializer.serialize_bool(*value),
            Value::Integer(value) => serializer.serialize_i64(*value),
            Value::Decimal(value) => serializer.serialize_f64(*value),
            Value::String(value) => serializer.serialize_str(value),
            Value::Array(value) => {
                let mut ser = serializer.serialize_seq(Some(value.len()))?;
                for element in value {
                    ser.serialize_element(element)?;
                }
                ser.end()
            }
            Value::Object(value) => {
                let mut ser = serializer.serialize_map(Some(value.len()))?;
                for (element_key, element_value) in value {
                    ser.serialize_entry(element_key, element_value)?;
                }
                ser.end()
            }
            Value::Intrinsic(intrinsic) => intrinsic.serialize(serializer),
        }
    }
}

impl serde::ser::Serialize for Intrinsic {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut ser = serializer.serialize_map(Some(1))?;
        match self {
            Intrinsic::Ref(name) => ser.serialize_entry("Ref", name)?,
            Intrinsic::GetAtt(resource, attribute) => {
                ser.serialize_entry("Fn::GetAtt", &[resource, attribute])?
            }
            Intrinsic::Sub(template, variables) if variables.is_empty() => {
                ser.serialize_entry("Fn::Sub", template)?
            }
            Intrinsic::Sub(template, variables) => ser.serialize_entry(
                "Fn::Sub",
                &(template, Value::Object(variables.clone())),
            )?,
            Intrinsic::Call(function, arguments) => ser.serialize_entry(function, arguments)?,
        }
        ser.end()
    }
}
