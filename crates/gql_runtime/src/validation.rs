//! Validation of executable documents against a schema.
//!
//! This covers the rules a client needs to reject a document before it is
//! sent: structure (operations and fragments), field and argument existence,
//! selection shape on leaf and composite types, fragment and variable
//! references.

use crate::schema::{Schema, TypeDef};
use gql_core::Span;
use gql_syntax::{
    Argument, Definition, Directive, Document, FragmentDefinition, OperationDefinition,
    OperationType, Selection, SelectionSet, Value,
};
use rustc_hash::FxHashSet;
use thiserror::Error;

/// A validation failure, located in the document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
    pub span: Span,
}

impl ValidationError {
    fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

/// Validates an executable document against a schema.
///
/// Returns every error found, in document order. An empty result means the
/// document may be executed.
#[must_use]
pub fn validate(schema: &Schema, document: &Document<'_>) -> Vec<ValidationError> {
    let mut validator = Validator {
        schema,
        document,
        errors: Vec::new(),
    };
    validator.validate_document();
    validator.errors
}

struct Validator<'s, 'd, 'a> {
    schema: &'s Schema,
    document: &'d Document<'a>,
    errors: Vec<ValidationError>,
}

impl<'s, 'd, 'a> Validator<'s, 'd, 'a> {
    fn error(&mut self, message: impl Into<String>, span: Span) {
        self.errors.push(ValidationError::new(message, span));
    }

    fn validate_document(&mut self) {
        let document = self.document;
        let operation_count = document.operations().count();
        let mut operation_names = FxHashSet::default();

        for definition in &document.definitions {
            match definition {
                Definition::Operation(operation) => {
                    match operation.name {
                        None if operation_count > 1 => self.error(
                            "This anonymous operation must be the only defined operation.",
                            operation.span,
                        ),
                        Some(name) if !operation_names.insert(name.value) => self.error(
                            format!("There can be only one operation named \"{}\".", name.value),
                            name.span,
                        ),
                        _ => {}
                    }
                    self.validate_operation(operation);
                }
                Definition::Fragment(fragment) => self.validate_fragment(fragment),
                other => self.error(
                    "The definition is not executable.",
                    other.span(),
                ),
            }
        }

        let mut used_fragments = FxHashSet::default();
        for operation in document.operations() {
            self.collect_fragment_spreads(&operation.selection_set, &mut used_fragments);
        }
        for fragment in document.fragments() {
            if !used_fragments.contains(fragment.name.value) {
                self.error(
                    format!("Fragment \"{}\" is never used.", fragment.name.value),
                    fragment.name.span,
                );
            }
        }
    }

    fn validate_operation(&mut self, operation: &OperationDefinition<'a>) {
        let Some(root) = self.schema.root_type(operation.operation) else {
            self.error(
                format!(
                    "Schema is not configured to execute {} operation.",
                    operation.operation
                ),
                operation.span,
            );
            return;
        };

        self.validate_selection_set(root, &operation.selection_set);
        self.validate_variable_usage(operation);
    }

    fn validate_fragment(&mut self, fragment: &FragmentDefinition<'a>) {
        let condition = fragment.type_condition;
        if let Some(ty) = self.condition_type(condition.value, condition.span) {
            self.validate_selection_set(ty, &fragment.selection_set);
        }
    }

    /// Resolves a fragment type condition, reporting unknown or leaf types.
    /// Introspection types are not part of the schema and are not checked.
    fn condition_type(&mut self, name: &str, span: Span) -> Option<&'s TypeDef> {
        if name.starts_with("__") {
            return None;
        }
        match self.schema.get_type(name) {
            Some(ty) if ty.is_composite() => Some(ty),
            Some(_) => {
                self.error(
                    format!("Fragment cannot condition on non composite type \"{name}\"."),
                    span,
                );
                None
            }
            None => {
                self.error(format!("Unknown type \"{name}\"."), span);
                None
            }
        }
    }

    fn validate_selection_set(&mut self, parent: &'s TypeDef, set: &SelectionSet<'a>) {
        for selection in &set.selections {
            match selection {
                Selection::Field(field) => {
                    let name = field.name.value;
                    if name == "__typename" {
                        if let Some(set) = &field.selection_set {
                            self.error(
                                "Field \"__typename\" must not have a selection since type \"String!\" has no subfields.",
                                set.span,
                            );
                        }
                        continue;
                    }
                    if matches!(name, "__schema" | "__type") && self.is_query_root(parent) {
                        continue;
                    }

                    let Some(def) = parent.fields().and_then(|fields| fields.get(name)) else {
                        self.error(
                            format!(
                                "Cannot query field \"{name}\" on type \"{}\".",
                                parent.name()
                            ),
                            field.name.span,
                        );
                        continue;
                    };

                    let coordinate = format!("{}.{name}", parent.name());
                    for argument in &field.arguments {
                        if !def.arguments.contains_key(argument.name.value) {
                            self.error(
                                format!(
                                    "Unknown argument \"{}\" on field \"{coordinate}\".",
                                    argument.name.value
                                ),
                                argument.name.span,
                            );
                        }
                    }
                    for (arg_name, arg) in &def.arguments {
                        let provided = field.arguments.iter().any(|a| a.name.value == arg_name);
                        if arg.is_required() && !provided {
                            self.error(
                                format!(
                                    "Field \"{coordinate}\" argument \"{arg_name}\" of type \"{}\" is required, but it was not provided.",
                                    arg.ty
                                ),
                                field.name.span,
                            );
                        }
                    }

                    let Some(field_type) = self.schema.get_type(def.ty.named_type()) else {
                        continue;
                    };
                    match (&field.selection_set, field_type.is_leaf()) {
                        (Some(set), true) => self.error(
                            format!(
                                "Field \"{name}\" must not have a selection since type \"{}\" has no subfields.",
                                def.ty
                            ),
                            set.span,
                        ),
                        (None, false) => self.error(
                            format!(
                                "Field \"{name}\" of type \"{}\" must have a selection of subfields.",
                                def.ty
                            ),
                            field.name.span,
                        ),
                        (Some(set), false) => self.validate_selection_set(field_type, set),
                        (None, true) => {}
                    }
                }
                Selection::FragmentSpread(spread) => {
                    if self.document.fragment(spread.name.value).is_none() {
                        self.error(
                            format!("Unknown fragment \"{}\".", spread.name.value),
                            spread.name.span,
                        );
                    }
                }
                Selection::InlineFragment(inline) => {
                    let ty = match inline.type_condition {
                        Some(condition) => self.condition_type(condition.value, condition.span),
                        None => Some(parent),
                    };
                    if let Some(ty) = ty {
                        self.validate_selection_set(ty, &inline.selection_set);
                    }
                }
            }
        }
    }

    /// Records every fragment reachable from `set`, including through
    /// introspection fields and other fragments.
    fn collect_fragment_spreads(&self, set: &SelectionSet<'a>, used: &mut FxHashSet<&'a str>) {
        for selection in &set.selections {
            match selection {
                Selection::Field(field) => {
                    if let Some(set) = &field.selection_set {
                        self.collect_fragment_spreads(set, used);
                    }
                }
                Selection::FragmentSpread(spread) => {
                    if !used.insert(spread.name.value) {
                        continue;
                    }
                    if let Some(fragment) = self.document.fragment(spread.name.value) {
                        self.collect_fragment_spreads(&fragment.selection_set, used);
                    }
                }
                Selection::InlineFragment(inline) => {
                    self.collect_fragment_spreads(&inline.selection_set, used);
                }
            }
        }
    }

    fn is_query_root(&self, ty: &TypeDef) -> bool {
        self.schema.root_type_name(OperationType::Query) == Some(ty.name())
    }

    /// Checks that every variable reachable from the operation is defined.
    fn validate_variable_usage(&mut self, operation: &OperationDefinition<'a>) {
        let mut used = Vec::new();
        let mut visited = FxHashSet::default();
        collect_variables_in_directives(&operation.directives, &mut used);
        self.collect_variables(&operation.selection_set, &mut used, &mut visited);

        let defined: FxHashSet<&str> = operation.variables.iter().map(|v| v.name.value).collect();
        let mut reported = FxHashSet::default();
        for variable in used {
            if defined.contains(variable.value) || !reported.insert(variable.value) {
                continue;
            }
            let message = match operation.name {
                Some(name) => format!(
                    "Variable \"${}\" is not defined by operation \"{}\".",
                    variable.value, name.value
                ),
                None => format!("Variable \"${}\" is not defined.", variable.value),
            };
            self.error(message, variable.span);
        }
    }

    fn collect_variables(
        &self,
        set: &SelectionSet<'a>,
        used: &mut Vec<gql_syntax::Name<'a>>,
        visited: &mut FxHashSet<&'a str>,
    ) {
        for selection in &set.selections {
            match selection {
                Selection::Field(field) => {
                    collect_variables_in_arguments(&field.arguments, used);
                    collect_variables_in_directives(&field.directives, used);
                    if let Some(set) = &field.selection_set {
                        self.collect_variables(set, used, visited);
                    }
                }
                Selection::FragmentSpread(spread) => {
                    collect_variables_in_directives(&spread.directives, used);
                    if !visited.insert(spread.name.value) {
                        continue;
                    }
                    if let Some(fragment) = self.document.fragment(spread.name.value) {
                        collect_variables_in_directives(&fragment.directives, used);
                        self.collect_variables(&fragment.selection_set, used, visited);
                    }
                }
                Selection::InlineFragment(inline) => {
                    collect_variables_in_directives(&inline.directives, used);
                    self.collect_variables(&inline.selection_set, used, visited);
                }
            }
        }
    }
}

fn collect_variables_in_directives<'a>(
    directives: &[Directive<'a>],
    used: &mut Vec<gql_syntax::Name<'a>>,
) {
    for directive in directives {
        collect_variables_in_arguments(&directive.arguments, used);
    }
}

fn collect_variables_in_arguments<'a>(
    arguments: &[Argument<'a>],
    used: &mut Vec<gql_syntax::Name<'a>>,
) {
    for argument in arguments {
        collect_variables_in_value(&argument.value, used);
    }
}

fn collect_variables_in_value<'a>(value: &Value<'a>, used: &mut Vec<gql_syntax::Name<'a>>) {
    match value {
        Value::Variable(name) => used.push(*name),
        Value::List(items, _) => {
            for item in items {
                collect_variables_in_value(item, used);
            }
        }
        Value::Object(fields, _) => {
            for (_, value) in fields {
                collect_variables_in_value(value, used);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdl::build_ast_schema;

    const SDL: &str = r"
        scalar DateTime
        type Query {
            film(id: ID!): Film
            films(first: Int = 10): [Film]
            search(text: String!): [Result]
        }
        type Film { id: ID! title: String releaseDate: DateTime }
        type Person { name: String }
        union Result = Film | Person
    ";

    fn messages(source: &str) -> Vec<String> {
        let schema = build_ast_schema(SDL).expect("valid schema");
        let document = gql_syntax::parse(source).into_result().expect("valid syntax");
        validate(&schema, &document)
            .into_iter()
            .map(|e| e.message)
            .collect()
    }

    #[test]
    fn test_valid_document() {
        let errors = messages(
            r#"
            query Film($id: ID!, $withDate: Boolean = true) {
                film(id: $id) {
                    ...FilmFields
                    releaseDate @include(if: $withDate)
                }
                search(text: "hope") {
                    __typename
                    ... on Person { name }
                }
                __schema { queryType { name } }
            }
            fragment FilmFields on Film { id title }
            "#,
        );
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn test_unknown_field() {
        assert_eq!(
            messages("{ film(id: 1) { director } }"),
            ["Cannot query field \"director\" on type \"Film\"."]
        );
        assert_eq!(
            messages("{ search(text: \"x\") { name } }"),
            ["Cannot query field \"name\" on type \"Result\"."]
        );
    }

    #[test]
    fn test_selection_shape() {
        assert_eq!(
            messages("{ film(id: 1) }"),
            ["Field \"film\" of type \"Film\" must have a selection of subfields."]
        );
        assert_eq!(
            messages("{ film(id: 1) { title { length } } }"),
            ["Field \"title\" must not have a selection since type \"String\" has no subfields."]
        );
    }

    #[test]
    fn test_arguments() {
        assert_eq!(
            messages("{ film { id } }"),
            ["Field \"Query.film\" argument \"id\" of type \"ID!\" is required, but it was not provided."]
        );
        assert_eq!(
            messages("{ films(last: 2) { id } }"),
            ["Unknown argument \"last\" on field \"Query.films\"."]
        );
        assert!(messages("{ films { id } }").is_empty());
    }

    #[test]
    fn test_operations() {
        assert_eq!(
            messages("{ films { id } } query A { films { id } }"),
            ["This anonymous operation must be the only defined operation."]
        );
        assert_eq!(
            messages("query A { films { id } } query A { films { title } }"),
            ["There can be only one operation named \"A\"."]
        );
        assert_eq!(
            messages("mutation { films { id } }"),
            ["Schema is not configured to execute mutation operation."]
        );
        assert_eq!(
            messages("type Extra { a: Int } { films { id } }"),
            ["The definition is not executable."]
        );
    }

    #[test]
    fn test_fragments() {
        assert_eq!(
            messages("{ films { ...Missing } }"),
            ["Unknown fragment \"Missing\"."]
        );
        assert_eq!(
            messages("{ films { id } } fragment Unused on Film { id }"),
            ["Fragment \"Unused\" is never used."]
        );
        assert_eq!(
            messages("{ films { ... on DateTime { id } } }"),
            ["Fragment cannot condition on non composite type \"DateTime\"."]
        );
        assert_eq!(
            messages("{ films { ... on Ghost { id } } }"),
            ["Unknown type \"Ghost\"."]
        );
    }

    #[test]
    fn test_variables() {
        assert_eq!(
            messages("query Q { film(id: $id) { id } }"),
            ["Variable \"$id\" is not defined by operation \"Q\"."]
        );
        assert_eq!(
            messages("{ films { ...F } } fragment F on Film { title @skip(if: $hide) }"),
            ["Variable \"$hide\" is not defined."]
        );
    }

    #[test]
    fn test_fragments_used_under_introspection_fields() {
        assert!(messages(
            "{ __schema { queryType { ...T } } } fragment T on __Type { name fields { ...F } } fragment F on __Field { name }"
        )
        .is_empty());
        assert!(messages("{ __type(name: \"Film\") { ...T } } fragment T on __Type { name }").is_empty());
    }

    #[test]
    fn test_fragment_spread_only_by_unused_fragment() {
        assert_eq!(
            messages("{ films { id } } fragment A on Film { ...B } fragment B on Film { title }"),
            ["Fragment \"A\" is never used.", "Fragment \"B\" is never used."]
        );
    }

    #[test]
    fn test_introspection_query_is_valid() {
        assert!(messages(crate::INTROSPECTION_QUERY).is_empty());
    }

    #[test]
    fn test_errors_carry_spans() {
        let schema = build_ast_schema(SDL).expect("valid schema");
        let source = "{ film(id: 1) { director } }";
        let document = gql_syntax::parse(source).into_result().expect("valid syntax");
        let errors = validate(&schema, &document);
        assert_eq!(errors[0].span.slice(source), "director");
    }
}
