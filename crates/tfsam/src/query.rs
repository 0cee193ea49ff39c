//! query engine
//!
//! Rules use [JMESPath](https://jmespath.org) queries to read from and reshape attribute trees.
//! On top of the builtin functions the following extensions are registered:
//!
//! | function                                 | result                                                 |
//! |------------------------------------------|--------------------------------------------------------|
//! | `re_sub(pattern, replacement, string)`   | regex substitution (`$1` style replacement groups)     |
//! | `object2keyvalues(object, key_name)`     | `[{key_name: key, Value: value}, ...]`                 |
//! | `concat(a, b)`                           | `a` followed by `b`                                    |
//! | `pascalize(string)`                      | `PascalCase` identifier                                |
//! | `ref(reference)`                         | `{"Ref": target_name}`                                 |
//! | `timestamp_number()`                     | current UTC time as `YYYYmmddHHMMSSffffff`             |
//! | `json_to_obj(string)`                    | parsed JSON (malformed JSON fails the query)           |
//! | `expand_array(attributes, list)`         | one copy of each object per value of each attribute    |
use crate::casing::pascalize;
use crate::naming::Naming;
use crate::value::Value;
use jmespath::functions::{ArgumentType, CustomFunction, Signature};
use jmespath::{Context, ErrorReason, JmespathError, Rcvar, Runtime, Variable};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Evaluates queries against attribute trees
pub trait QueryEngine {
    fn evaluate(&self, query: &str, value: &Value) -> Result<Value, QueryError>;
}

#[derive(thiserror::Error, Debug)]
pub enum QueryError {
    #[error("unable to evaluate `{query}` against {input}")]
    Evaluation {
        query: String,
        input: String,
        #[source]
        source: JmespathError,
    },
    #[error("query function `{0}` registered twice")]
    DuplicateFunction(String),
}

pub struct JmesPath {
    runtime: Runtime,
    registered: HashSet<String>,
}

impl std::fmt::Debug for JmesPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JmesPath")
            .field("registered", &self.registered)
            .finish_non_exhaustive()
    }
}

impl JmesPath {
    /// Engine with builtin functions only
    pub fn new() -> Self {
        let mut runtime = Runtime::new();
        runtime.register_builtin_functions();
        Self {
            runtime,
            registered: Default::default(),
        }
    }

    /// Engine with builtin and all extension functions
    pub fn with_extensions(naming: Arc<Naming>) -> Result<Self, QueryError> {
        use ArgumentType as Arg;

        let mut engine = Self::new();
        engine.register("re_sub", vec![Arg::String, Arg::String, Arg::String], Box::new(re_sub))?;
        engine.register(
            "object2keyvalues",
            vec![Arg::Object, Arg::String],
            Box::new(object_to_key_values),
        )?;
        engine.register("concat", vec![Arg::String, Arg::String], Box::new(concat))?;
        engine.register("pascalize", vec![Arg::String], Box::new(pascalize_function))?;
        engine.register(
            "ref",
            vec![Arg::String],
            Box::new(move |args: &[Rcvar], ctx: &mut Context<'_>| {
                let reference = string_arg(args, 0, ctx)?;
                let target = naming.transform_reference(reference);
                let mut object = BTreeMap::new();
                object.insert("Ref".to_string(), Rcvar::new(Variable::String(target.name)));
                Ok(Rcvar::new(Variable::Object(object)))
            }),
        )?;
        engine.register("timestamp_number", vec![], Box::new(timestamp_number))?;
        engine.register("json_to_obj", vec![Arg::String], Box::new(json_to_obj))?;
        engine.register("expand_array", vec![Arg::String, Arg::Array], Box::new(expand_array))?;

        Ok(engine)
    }

    /// Register an extension function
    ///
    /// Arguments are validated against `arguments` before `function` is invoked.
    pub fn register(
        &mut self,
        name: &str,
        arguments: Vec<ArgumentType>,
        function: Box<dyn Fn(&[Rcvar], &mut Context<'_>) -> Result<Rcvar, JmespathError> + Sync>,
    ) -> Result<(), QueryError> {
        if !self.registered.insert(name.to_string()) {
            return Err(QueryError::DuplicateFunction(name.to_string()));
        }

        let signature = Signature::new(arguments, None);
        self.runtime
            .register_function(name, Box::new(CustomFunction::new(signature, function)));
        Ok(())
    }
}

impl Default for JmesPath {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryEngine for JmesPath {
    #[tracing::instrument(level = "trace", skip(self, value))]
    fn evaluate(&self, query: &str, value: &Value) -> Result<Value, QueryError> {
        let failed = |source| QueryError::Evaluation {
            query: query.to_string(),
            input: value.to_json().to_string(),
            source,
        };

        let expression = self.runtime.compile(query).map_err(failed)?;
        let result = expression.search(value).map_err(failed)?;

        let json = serde_json::to_value(&*result).unwrap_or(serde_json::Value::Null);
        Ok(json.into())
    }
}

fn fail(ctx: &Context<'_>, reason: String) -> JmespathError {
    JmespathError::new(ctx.expression, ctx.offset, ErrorReason::Parse(reason))
}

fn string_arg<'a>(args: &'a [Rcvar], index: usize, ctx: &Context<'_>) -> Result<&'a str, JmespathError> {
    args.get(index)
        .and_then(|arg| arg.as_string())
        .map(String::as_str)
        .ok_or_else(|| fail(ctx, format!("argument {index} must be a string")))
}

fn re_sub(args: &[Rcvar], ctx: &mut Context<'_>) -> Result<Rcvar, JmespathError> {
    let pattern = string_arg(args, 0, ctx)?;
    let replacement = string_arg(args, 1, ctx)?;
    let string = string_arg(args, 2, ctx)?;

    let regex = regex::Regex::new(pattern)
        .map_err(|err| fail(ctx, format!("invalid pattern `{pattern}`: {err}")))?;
    let replaced = regex.replace_all(string, replacement).into_owned();

    Ok(Rcvar::new(Variable::String(replaced)))
}

fn object_to_key_values(args: &[Rcvar], ctx: &mut Context<'_>) -> Result<Rcvar, JmespathError> {
    let object = args
        .first()
        .and_then(|arg| arg.as_object())
        .ok_or_else(|| fail(ctx, "argument 0 must be an object".into()))?;
    let key_name = string_arg(args, 1, ctx)?;

    let pairs = object
        .iter()
        .map(|(key, value)| {
            let mut pair = BTreeMap::new();
            pair.insert(key_name.to_string(), Rcvar::new(Variable::String(key.clone())));
            pair.insert("Value".to_string(), value.clone());
            Rcvar::new(Variable::Object(pair))
        })
        .collect();

    Ok(Rcvar::new(Variable::Array(pairs)))
}

fn concat(args: &[Rcvar], ctx: &mut Context<'_>) -> Result<Rcvar, JmespathError> {
    let first = string_arg(args, 0, ctx)?;
    let second = string_arg(args, 1, ctx)?;
    Ok(Rcvar::new(Variable::String(format!("{first}{second}"))))
}

fn pascalize_function(args: &[Rcvar], ctx: &mut Context<'_>) -> Result<Rcvar, JmespathError> {
    let string = string_arg(args, 0, ctx)?;
    Ok(Rcvar::new(Variable::String(pascalize(string))))
}

fn timestamp_number(_args: &[Rcvar], _ctx: &mut Context<'_>) -> Result<Rcvar, JmespathError> {
    let now = chrono::Utc::now().format("%Y%m%d%H%M%S%6f").to_string();
    Ok(Rcvar::new(Variable::String(now)))
}

fn json_to_obj(args: &[Rcvar], ctx: &mut Context<'_>) -> Result<Rcvar, JmespathError> {
    let string = string_arg(args, 0, ctx)?;
    let parsed = Variable::from_json(string)
        .map_err(|err| fail(ctx, format!("invalid json in json_to_obj(): {string}: {err}")))?;
    Ok(Rcvar::new(parsed))
}

fn expand_array(args: &[Rcvar], ctx: &mut Context<'_>) -> Result<Rcvar, JmespathError> {
    let attributes: Vec<&str> = string_arg(args, 0, ctx)?.split(',').map(str::trim).collect();
    let list = args
        .get(1)
        .and_then(|arg| arg.as_array())
        .ok_or_else(|| fail(ctx, "argument 1 must be an array".into()))?;

    let mut expanded = vec![];
    for element in list {
        let Some(object) = element.as_object() else {
            continue;
        };

        let mut base = object.clone();
        let values: Vec<(&str, Option<Rcvar>)> = attributes
            .iter()
            .map(|attribute| (*attribute, base.remove(*attribute)))
            .collect();

        for (attribute, values) in values {
            let Some(values) = values.as_ref().and_then(|values| values.as_array()) else {
                continue;
            };
            for value in values {
                let mut copy = base.clone();
                copy.insert(attribute.to_string(), value.clone());
                expanded.push(Rcvar::new(Variable::Object(copy)));
            }
        }
    }

    Ok(Rcvar::new(Variable::Array(expanded)))
}
