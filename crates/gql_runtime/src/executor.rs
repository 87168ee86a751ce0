//! Query execution against a [`Schema`].
//!
//! The executor walks the selected operation directly, resolving each field
//! through the [`ResolverMap`]. Fields are completed against their declared
//! types when the schema knows them. Introspection fields (`__schema`,
//! `__type`) resolve to the schema's introspection description and are
//! completed by reading properties, as are selections whose parent type is
//! not known.

use crate::resolver::{DefaultResolver, ResolverArgs, ResolverInfo, ResolverMap};
use crate::schema::{FieldDef, InputFieldDef, Schema, TypeDef, TypeRef};
use crate::value::{const_to_json, to_json};
use gql_core::{LineIndex, Location, Span};
use gql_syntax::{Directive, Document, Field, Selection, SelectionSet};
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Executor configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum nesting of selection sets.
    pub max_depth: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { max_depth: 64 }
    }
}

/// The query executor.
pub struct Executor {
    config: ExecutorConfig,
    resolvers: Arc<ResolverMap>,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("config", &self.config)
            .field("resolvers", &self.resolvers)
            .finish()
    }
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

impl Executor {
    /// Creates an executor that reads every field from its parent value.
    pub fn new() -> Self {
        Self::new_with(ExecutorConfig::default(), ResolverMap::new())
    }

    pub fn with_config(config: ExecutorConfig) -> Self {
        Self::new_with(config, ResolverMap::new())
    }

    pub fn with_resolvers(resolvers: ResolverMap) -> Self {
        Self::new_with(ExecutorConfig::default(), resolvers)
    }

    pub fn new_with(config: ExecutorConfig, resolvers: ResolverMap) -> Self {
        Self {
            config,
            resolvers: Arc::new(resolvers),
        }
    }

    pub fn resolvers(&self) -> &ResolverMap {
        &self.resolvers
    }

    /// Executes a query document.
    ///
    /// Variables are read from `ctx`. `root_value` is the parent value of
    /// the root fields. Request-level failures (syntax errors, an unknown
    /// operation, missing required variables) produce a response without
    /// `data`; field failures produce `null` for the field and an entry in
    /// `errors`.
    pub async fn execute(
        &self,
        schema: &Schema,
        query: &str,
        operation_name: Option<&str>,
        ctx: &Context,
        root_value: &Value,
    ) -> Response {
        let line_index = LineIndex::new(query);
        let document = match gql_syntax::parse(query).into_result() {
            Ok(document) => document,
            Err(diagnostics) => {
                return Response::errors(
                    diagnostics
                        .iter()
                        .map(|d| {
                            let message = match d.labels.first() {
                                Some(label) => format!("Syntax Error: {} ({})", d.title, label.message),
                                None => format!("Syntax Error: {}", d.title),
                            };
                            let error = FieldError::new(message);
                            match d.primary_span() {
                                Some(span) => error.with_location(line_index.location(span.start)),
                                None => error,
                            }
                        })
                        .collect(),
                )
            }
        };

        let Some(operation) = document.operation(operation_name) else {
            let message = match operation_name {
                Some(name) => format!("Unknown operation named \"{name}\"."),
                None if document.operations().next().is_none() => {
                    "The document does not contain an operation.".to_string()
                }
                None => "Must provide operation name if query contains multiple operations."
                    .to_string(),
            };
            return Response::error(FieldError::new(message));
        };

        let Some(root_type) = schema.root_type(operation.operation) else {
            return Response::error(
                FieldError::new(format!(
                    "Schema is not configured to execute {} operation.",
                    operation.operation
                ))
                .with_location(line_index.location(operation.span.start)),
            );
        };

        let mut variables = HashMap::new();
        for definition in &operation.variables {
            let name = definition.name.value;
            if let Some(value) = ctx.variables.get(name) {
                variables.insert(name.to_string(), value.clone());
            } else if let Some(default) = &definition.default_value {
                variables.insert(name.to_string(), const_to_json(default));
            } else if matches!(definition.ty, gql_syntax::Type::NonNull(..)) {
                return Response::error(
                    FieldError::new(format!(
                        "Variable \"${name}\" of required type \"{}\" was not provided.",
                        definition.ty
                    ))
                    .with_location(line_index.location(definition.span.start)),
                );
            }
        }

        tracing::debug!(
            operation = operation.name.map(|n| n.value),
            kind = %operation.operation,
            "executing operation"
        );

        let user_ctx = Context {
            data: ctx.data.clone(),
            variables,
        };
        let exec = ExecutionContext {
            schema,
            document: &document,
            resolvers: &self.resolvers,
            ctx: &user_ctx,
            line_index: &line_index,
            max_depth: self.config.max_depth,
            errors: RwLock::new(Vec::new()),
        };

        let data = execute_selection_set(
            &exec,
            Some(root_type),
            Some(root_type.name()),
            &operation.selection_set,
            root_value,
            Vec::new(),
        )
        .await;

        let errors = exec.errors.into_inner();
        if !errors.is_empty() {
            tracing::debug!(count = errors.len(), "operation completed with field errors");
        }
        Response {
            data: Some(data),
            errors: (!errors.is_empty()).then_some(errors),
        }
    }
}

struct ExecutionContext<'e, 'a> {
    schema: &'e Schema,
    document: &'e Document<'a>,
    resolvers: &'e ResolverMap,
    ctx: &'e Context,
    line_index: &'e LineIndex,
    max_depth: usize,
    errors: RwLock<Vec<FieldError>>,
}

impl<'e, 'a> ExecutionContext<'e, 'a> {
    async fn push_error(&self, message: impl Into<String>, path: &[PathSegment], span: Span) {
        self.errors.write().await.push(
            FieldError::new(message)
                .with_path(path.to_vec())
                .with_location(self.line_index.location(span.start)),
        );
    }

    fn is_included(&self, directives: &[Directive<'_>]) -> bool {
        let condition = |name: &str| {
            directives
                .iter()
                .find(|d| d.name.value == name)
                .and_then(|d| d.arguments.iter().find(|a| a.name.value == "if"))
                .map(|arg| to_json(&arg.value, &self.ctx.variables) == Value::Bool(true))
        };
        condition("skip") != Some(true) && condition("include") != Some(false)
    }

    /// Whether a fragment with this type condition applies to the runtime
    /// type. An unknown runtime type matches every condition.
    fn fragment_applies(&self, condition: Option<&str>, runtime_type: Option<&str>) -> bool {
        match (condition, runtime_type) {
            (Some(condition), Some(runtime)) => self.schema.is_possible_type(condition, runtime),
            _ => true,
        }
    }

    /// Groups the selected fields by response key, following fragments.
    fn collect_fields<'s>(
        &self,
        runtime_type: Option<&str>,
        set: &'s SelectionSet<'s>,
        visited: &mut FxHashSet<&'s str>,
        fields: &mut IndexMap<&'s str, Vec<&'s Field<'s>>>,
    ) where
        'e: 's,
        'a: 's,
    {
        for selection in &set.selections {
            match selection {
                Selection::Field(field) => {
                    if self.is_included(&field.directives) {
                        fields.entry(field.response_key()).or_default().push(field);
                    }
                }
                Selection::FragmentSpread(spread) => {
                    if !self.is_included(&spread.directives) || !visited.insert(spread.name.value) {
                        continue;
                    }
                    let Some(fragment) = self.document.fragment(spread.name.value) else {
                        continue;
                    };
                    if self.fragment_applies(Some(fragment.type_condition.value), runtime_type) {
                        self.collect_fields(runtime_type, &fragment.selection_set, visited, fields);
                    }
                }
                Selection::InlineFragment(inline) => {
                    if self.is_included(&inline.directives)
                        && self.fragment_applies(inline.type_condition.map(|c| c.value), runtime_type)
                    {
                        self.collect_fields(runtime_type, &inline.selection_set, visited, fields);
                    }
                }
            }
        }
    }
}

/// Executes a selection set on one parent value.
///
/// `parent_type` is used to look up field definitions; `runtime_type` is
/// the concrete object type, when known, for `__typename` and fragment
/// matching.
fn execute_selection_set<'x, 'e: 'x, 'a: 'x>(
    exec: &'x ExecutionContext<'e, 'a>,
    parent_type: Option<&'x TypeDef>,
    runtime_type: Option<&'x str>,
    set: &'x SelectionSet<'x>,
    parent: &'x Value,
    path: Vec<PathSegment>,
) -> BoxFuture<'x, Value> {
    Box::pin(async move {
        if path.len() > exec.max_depth {
            exec.push_error("Query exceeds the maximum selection depth.", &path, set.span)
                .await;
            return Value::Null;
        }

        let mut grouped = IndexMap::new();
        exec.collect_fields(runtime_type, set, &mut FxHashSet::default(), &mut grouped);

        let mut result = Map::new();
        for (key, fields) in grouped {
            let mut field_path = path.clone();
            field_path.push(PathSegment::Field(key.to_string()));
            let value =
                execute_field(exec, parent_type, runtime_type, &fields, parent, field_path).await;
            result.insert(key.to_string(), value);
        }
        Value::Object(result)
    })
}

async fn execute_field<'x, 'e: 'x, 'a: 'x>(
    exec: &'x ExecutionContext<'e, 'a>,
    parent_type: Option<&'x TypeDef>,
    runtime_type: Option<&'x str>,
    fields: &'x [&'x Field<'x>],
    parent: &'x Value,
    path: Vec<PathSegment>,
) -> Value {
    let field = fields[0];
    let name = field.name.value;

    match name {
        "__typename" => {
            return runtime_type
                .map(Value::from)
                .or_else(|| parent.get("__typename").cloned())
                .unwrap_or(Value::Null);
        }
        "__schema" | "__type" if is_query_root(exec.schema, parent_type) => {
            let value = if name == "__schema" {
                exec.schema.to_introspection()["__schema"].clone()
            } else {
                let args = untyped_arguments(exec, field);
                args.get_as::<String>("name")
                    .and_then(|type_name| exec.schema.introspect_type(&type_name))
                    .and_then(|full| serde_json::to_value(full).ok())
                    .unwrap_or(Value::Null)
            };
            return complete_untyped(exec, fields, value, path).await;
        }
        _ => {}
    }

    let definition = parent_type.and_then(|ty| Some((ty, ty.fields()?.get(name)?)));
    let Some((owner, definition)) = definition else {
        if let Some(TypeDef::Object(object)) = parent_type {
            exec.push_error(
                format!("Cannot query field \"{name}\" on type \"{}\".", object.name),
                &path,
                field.name.span,
            )
            .await;
            return Value::Null;
        }
        return match DefaultResolver::read(parent, name) {
            Ok(value) => complete_untyped(exec, fields, value, path).await,
            Err(error) => {
                exec.push_error(error.to_string(), &path, field.name.span).await;
                Value::Null
            }
        };
    };

    let resolver_type = runtime_type.unwrap_or(owner.name());
    let args = coerce_arguments(exec, definition, field);
    let info = ResolverInfo::new(name, resolver_type)
        .with_return_type(definition.ty.to_string())
        .with_path(path.clone());
    let resolved = exec
        .resolvers
        .get(resolver_type, name)
        .resolve(parent, &args, exec.ctx, &info)
        .await;

    match resolved {
        Ok(value) => {
            let coordinate = format!("{resolver_type}.{name}");
            complete_value(exec, &definition.ty, &coordinate, fields, value, path).await
        }
        Err(error) => {
            tracing::debug!(field = %name, %error, "resolver failed");
            exec.push_error(error.to_string(), &path, field.name.span).await;
            Value::Null
        }
    }
}

fn is_query_root(schema: &Schema, ty: Option<&TypeDef>) -> bool {
    ty.is_some_and(|ty| schema.query_type.as_deref() == Some(ty.name()))
}

/// Arguments as written, with variables substituted.
fn untyped_arguments(exec: &ExecutionContext<'_, '_>, field: &Field<'_>) -> ResolverArgs {
    field
        .arguments
        .iter()
        .map(|arg| (arg.name.value.to_string(), to_json(&arg.value, &exec.ctx.variables)))
        .collect()
}

/// Arguments of a defined field, with defaults applied for omitted ones.
fn coerce_arguments(
    exec: &ExecutionContext<'_, '_>,
    definition: &FieldDef,
    field: &Field<'_>,
) -> ResolverArgs {
    let default = |arg: &InputFieldDef| arg.default_value.clone();
    definition
        .arguments
        .values()
        .filter_map(|arg| {
            let provided = field.arguments.iter().find(|a| a.name.value == arg.name);
            let value = match provided.map(|a| &a.value) {
                Some(gql_syntax::Value::Variable(variable)) => exec
                    .ctx
                    .variables
                    .get(variable.value)
                    .cloned()
                    .or_else(|| default(arg))?,
                Some(value) => to_json(value, &exec.ctx.variables),
                None => default(arg)?,
            };
            Some((arg.name.clone(), value))
        })
        .collect()
}

/// Merges the sub-selections of all fields sharing a response key.
fn merged_selection<'x>(fields: &[&'x Field<'x>]) -> Option<SelectionSet<'x>> {
    let mut sets = fields.iter().filter_map(|f| f.selection_set.as_ref());
    let first = sets.next()?.clone();
    Some(sets.fold(first, |mut merged, set| {
        merged.selections.extend(set.selections.iter().cloned());
        merged
    }))
}

fn complete_value<'x, 'e: 'x, 'a: 'x>(
    exec: &'x ExecutionContext<'e, 'a>,
    ty: &'x TypeRef,
    coordinate: &'x str,
    fields: &'x [&'x Field<'x>],
    value: Value,
    path: Vec<PathSegment>,
) -> BoxFuture<'x, Value> {
    Box::pin(async move {
        let span = fields[0].name.span;
        match ty {
            TypeRef::NonNull(inner) => {
                let completed = complete_value(exec, inner, coordinate, fields, value, path.clone()).await;
                if completed.is_null() {
                    exec.push_error(
                        format!("Cannot return null for non-nullable field {coordinate}."),
                        &path,
                        span,
                    )
                    .await;
                }
                completed
            }
            _ if value.is_null() => Value::Null,
            TypeRef::List(inner) => {
                let Value::Array(items) = value else {
                    exec.push_error(
                        format!("Expected a list for field {coordinate}."),
                        &path,
                        span,
                    )
                    .await;
                    return Value::Null;
                };
                let mut completed = Vec::with_capacity(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    let mut item_path = path.clone();
                    item_path.push(PathSegment::Index(index));
                    completed.push(complete_value(exec, inner, coordinate, fields, item, item_path).await);
                }
                Value::Array(completed)
            }
            TypeRef::Named(name) => match exec.schema.get_type(name) {
                Some(named) if named.is_leaf() => value,
                Some(named) => {
                    if !value.is_object() {
                        exec.push_error(
                            format!("Expected an object for field {coordinate}."),
                            &path,
                            span,
                        )
                        .await;
                        return Value::Null;
                    }
                    let runtime_type = match named {
                        TypeDef::Object(object) => Some(object.name.as_str()),
                        _ => value
                            .get("__typename")
                            .and_then(Value::as_str)
                            .and_then(|t| exec.schema.get_type(t))
                            .map(TypeDef::name),
                    };
                    let lookup_type = runtime_type
                        .and_then(|t| exec.schema.get_type(t))
                        .unwrap_or(named);
                    let Some(selection) = merged_selection(fields) else {
                        return value;
                    };
                    execute_selection_set(exec, Some(lookup_type), runtime_type, &selection, &value, path)
                        .await
                }
                None => complete_untyped(exec, fields, value, path).await,
            },
        }
    })
}

/// Completes a value by reading selected keys, without type information.
fn complete_untyped<'x, 'e: 'x, 'a: 'x>(
    exec: &'x ExecutionContext<'e, 'a>,
    fields: &'x [&'x Field<'x>],
    value: Value,
    path: Vec<PathSegment>,
) -> BoxFuture<'x, Value> {
    Box::pin(async move {
        let Some(selection) = merged_selection(fields) else {
            return value;
        };
        match value {
            Value::Array(items) => {
                let mut completed = Vec::with_capacity(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    let mut item_path = path.clone();
                    item_path.push(PathSegment::Index(index));
                    completed.push(complete_untyped(exec, fields, item, item_path).await);
                }
                Value::Array(completed)
            }
            Value::Object(_) => {
                execute_selection_set(exec, None, None, &selection, &value, path).await
            }
            other => other,
        }
    })
}

/// Request-scoped data and variables passed to resolvers.
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub data: HashMap<String, Value>,
    pub variables: HashMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_variables(variables: HashMap<String, Value>) -> Self {
        Self {
            data: HashMap::new(),
            variables,
        }
    }

    /// Stores a serializable value under `key`.
    pub fn set<T: Serialize>(&mut self, key: impl Into<String>, value: T) {
        if let Ok(v) = serde_json::to_value(value) {
            self.data.insert(key.into(), v);
        }
    }

    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn variable_as<T: for<'de> Deserialize<'de>>(&self, name: &str) -> Option<T> {
        self.variables
            .get(name)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// A GraphQL response, as sent over the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

impl Response {
    pub fn data(data: Value) -> Self {
        Self {
            data: Some(data),
            errors: None,
        }
    }

    pub fn error(error: FieldError) -> Self {
        Self::errors(vec![error])
    }

    pub fn errors(errors: Vec<FieldError>) -> Self {
        Self {
            data: None,
            errors: Some(errors),
        }
    }

    pub fn has_errors(&self) -> bool {
        self.errors.as_ref().is_some_and(|e| !e.is_empty())
    }

    pub fn has_data(&self) -> bool {
        self.data.as_ref().is_some_and(|d| !d.is_null())
    }
}

/// An entry of a response's `errors`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<Location>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<PathSegment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Map<String, Value>>,
}

/// A response path segment: a response key or a list index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

impl std::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Field(name) => f.write_str(name),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

impl FieldError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: None,
            path: None,
            extensions: None,
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: Vec<PathSegment>) -> Self {
        self.path = Some(path);
        self
    }

    #[must_use]
    pub fn with_location(mut self, location: Location) -> Self {
        self.locations.get_or_insert_with(Vec::new).push(location);
        self
    }

    #[must_use]
    pub fn with_extension(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extensions
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn with_code(self, code: impl Into<String>) -> Self {
        self.with_extension("code", Value::String(code.into()))
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)?;
        if let Some(path) = &self.path {
            let path: Vec<_> = path.iter().map(ToString::to_string).collect();
            write!(f, " (at {})", path.join("."))?;
        }
        Ok(())
    }
}

impl std::error::Error for FieldError {}
