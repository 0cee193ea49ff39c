//! path addressed tree mutation
//!
//! A [Path] is a dotted list of object keys. Each key may address a list element (`key[0]`) or
//! every list element (`key[]`, `key[*]`):
//!
//! ```text
//! ingress[*].cidr_blocks
//! lifecycle_rule[0].expiration
//! ```
//!
//! Walking a path never creates intermediate structure. Whenever an intermediate key is missing
//! (or does not hold an object) the [Operation] is a no-op, so rules can address optional
//! attributes without checking for them first.
use crate::query::QueryError;
use crate::value::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub key: String,
    pub index: Option<Index>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Index {
    At(usize),
    Each,
}

/// What to do once the final key of a path is reached
pub enum Operation<'a> {
    /// Replace an existing value
    Set(Value),
    /// Insert a value if the key is absent, never overwrite
    SetDefault(Value),
    /// Replace an existing value with a lazily produced one
    ///
    /// The producer runs once per location the path matches.
    SetComputed(&'a mut dyn FnMut() -> Result<Value, QueryError>),
    /// Move the value to another key
    Rename(String),
    /// Remove the key
    Delete,
    /// Insert a value if the key is absent, otherwise merge its entries into the existing object
    MergeInto(Value),
}

#[derive(thiserror::Error, Debug)]
pub enum PathError {
    #[error("invalid path `{0}`")]
    Invalid(String),
    #[error("cannot merge into `{0}`: both sides must be objects")]
    NotAnObject(String),
    #[error(transparent)]
    Query(#[from] QueryError),
}

impl std::str::FromStr for Path {
    type Err = PathError;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        let segments = path
            .split('.')
            .map(|part| {
                let invalid = || PathError::Invalid(path.to_string());

                let Some((key, rest)) = part.split_once('[') else {
                    if part.is_empty() || part.contains(']') {
                        return Err(invalid());
                    }
                    return Ok(Segment {
                        key: part.to_string(),
                        index: None,
                    });
                };

                let index = match rest.strip_suffix(']').ok_or_else(invalid)? {
                    "" | "*" => Index::Each,
                    number => Index::At(number.parse().map_err(|_| invalid())?),
                };

                if key.is_empty() {
                    return Err(invalid());
                }

                Ok(Segment {
                    key: key.to_string(),
                    index: Some(index),
                })
            })
            .collect::<Result<_, _>>()?;

        Ok(Self { segments })
    }
}

impl std::fmt::Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (position, segment) in self.segments.iter().enumerate() {
            if position > 0 {
                f.write_str(".")?;
            }
            f.write_str(&segment.key)?;
            match segment.index {
                Some(Index::At(n)) => write!(f, "[{n}]")?,
                Some(Index::Each) => f.write_str("[*]")?,
                None => {}
            }
        }
        Ok(())
    }
}

impl Path {
    /// Apply `operation` to every location addressed by this path
    ///
    /// Returns whether anything was changed.
    pub fn apply(&self, target: &mut Map, mut operation: Operation<'_>) -> Result<bool, PathError> {
        let mut cursor = Cursor {
            path: self,
            operation: &mut operation,
        };
        cursor.walk_object(target, &self.segments)
    }
}

struct Cursor<'p, 'o, 'a> {
    path: &'p Path,
    operation: &'o mut Operation<'a>,
}

impl Cursor<'_, '_, '_> {
    fn walk_object(&mut self, object: &mut Map, segments: &[Segment]) -> Result<bool, PathError> {
        let Some((segment, rest)) = segments.split_first() else {
            return Ok(false);
        };

        let is_last = rest.is_empty();

        if !object.contains_key(&segment.key) {
            if is_last && segment.index.is_none() {
                return self.insert_absent(object, &segment.key);
            }
            return Ok(false);
        }

        match (segment.index, is_last) {
            (None, true) => self.at_key(object, &segment.key),
            (None, false) => match object.get_mut(&segment.key) {
                Some(Value::Object(child)) => self.walk_object(child, rest),
                _ => Ok(false),
            },
            (Some(index), _) => {
                let Some(Value::Array(array)) = object.get_mut(&segment.key) else {
                    return Ok(false);
                };
                self.walk_array(array, index, rest)
            }
        }
    }

    fn walk_array(
        &mut self,
        array: &mut [Value],
        index: Index,
        rest: &[Segment],
    ) -> Result<bool, PathError> {
        let elements: &mut [Value] = match index {
            Index::Each => array,
            Index::At(n) if n < array.len() => &mut array[n..=n],
            Index::At(n) => {
                tracing::trace!(path = %self.path, index = n, "list index out of bounds");
                return Ok(false);
            }
        };

        let mut updated = false;
        for element in elements {
            let changed = if rest.is_empty() {
                self.at_element(element)?
            } else if let Value::Object(child) = element {
                self.walk_object(child, rest)?
            } else {
                false
            };
            updated |= changed;
        }

        Ok(updated)
    }

    fn insert_absent(&mut self, object: &mut Map, key: &str) -> Result<bool, PathError> {
        match self.operation {
            Operation::SetDefault(value) | Operation::MergeInto(value) => {
                object.insert(key.to_string(), value.clone());
                Ok(true)
            }
            Operation::Set(_)
            | Operation::SetComputed(_)
            | Operation::Rename(_)
            | Operation::Delete => Ok(false),
        }
    }

    fn at_key(&mut self, object: &mut Map, key: &str) -> Result<bool, PathError> {
        match self.operation {
            Operation::Rename(new_key) => {
                if let Some(value) = object.shift_remove(key) {
                    object.insert(new_key.clone(), value);
                }
                Ok(true)
            }
            Operation::Delete => Ok(object.shift_remove(key).is_some()),
            _ => match object.get_mut(key) {
                Some(existing) => self.at_element(existing),
                None => Ok(false),
            },
        }
    }

    /// Apply to a located value (an object entry or a list element)
    fn at_element(&mut self, existing: &mut Value) -> Result<bool, PathError> {
        match self.operation {
            Operation::Set(value) => *existing = value.clone(),
            Operation::SetComputed(produce) => *existing = produce()?,
            Operation::SetDefault(_) => return Ok(false),
            Operation::MergeInto(value) => {
                let (Value::Object(existing), Value::Object(entries)) = (existing, &*value) else {
                    return Err(PathError::NotAnObject(self.path.to_string()));
                };
                for (key, entry) in entries {
                    existing.insert(key.clone(), entry.clone());
                }
            }
            // renaming or removing a list element has no meaning
            Operation::Rename(_) | Operation::Delete => return Ok(false),
        }

        Ok(true)
    }
}
