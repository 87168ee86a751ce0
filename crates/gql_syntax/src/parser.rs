//! Recursive descent parser for GraphQL documents.
//!
//! The parser never stops at the first error: it records a diagnostic,
//! recovers, and keeps going so that a single pass reports as much as
//! possible. Every repetition loop is guaranteed to consume input.

use crate::ast::*;
use crate::lexer::{decode_block_string, decode_string, Lexer};
use crate::token::{DirectiveLocation, Token, TokenKind};
use gql_core::{diagnostics::codes, Diagnostic, DiagnosticBag, Span};

/// Parser for GraphQL documents.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    prev_end: u32,
    diagnostics: DiagnosticBag,
}

/// Result of parsing.
pub struct ParseResult<'a> {
    pub document: Document<'a>,
    pub diagnostics: DiagnosticBag,
}

impl<'a> ParseResult<'a> {
    /// Returns the document if parsing produced no errors.
    ///
    /// # Errors
    ///
    /// Returns every error diagnostic otherwise.
    pub fn into_result(self) -> Result<Document<'a>, Vec<Diagnostic>> {
        if self.diagnostics.has_errors() {
            Err(self.diagnostics.into_vec())
        } else {
            Ok(self.document)
        }
    }
}

/// Parses a source string into a document.
#[must_use]
pub fn parse(source: &str) -> ParseResult<'_> {
    let mut parser = Parser::new(source);
    let document = parser.parse_document();
    ParseResult {
        document,
        diagnostics: parser.diagnostics,
    }
}

/// Parses a standalone constant value such as `[1, 2]` or `{ a: RED }`.
///
/// # Errors
///
/// Returns the error diagnostics when the text is not exactly one value.
pub fn parse_const_value(source: &str) -> Result<Value<'_>, Vec<Diagnostic>> {
    let mut parser = Parser::new(source);
    let value = parser.parse_value(true);
    if !parser.at_kind(TokenKind::Eof) {
        parser.error_expected("end of input");
    }
    if parser.diagnostics.has_errors() {
        Err(parser.diagnostics.into_vec())
    } else {
        Ok(value)
    }
}

impl<'a> Parser<'a> {
    /// Creates a new parser.
    #[must_use]
    pub fn new(source: &'a str) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token();
        Self {
            lexer,
            current,
            prev_end: 0,
            diagnostics: DiagnosticBag::new(),
        }
    }

    #[inline]
    fn at(&self) -> TokenKind {
        self.current.kind
    }

    #[inline]
    fn at_kind(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn advance(&mut self) {
        self.prev_end = self.current.span.end;
        self.current = self.lexer.next_token();
    }

    /// Consumes the token if it has the given kind.
    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at_kind(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> bool {
        if self.eat(kind) {
            true
        } else {
            self.error_expected(kind.as_str());
            false
        }
    }

    fn current_text(&self) -> &'a str {
        self.lexer.span_text(self.current.span)
    }

    #[inline]
    fn span_from(&self, start: u32) -> Span {
        Span::new(start, self.prev_end.max(start))
    }

    /// Skips the current token if a loop iteration consumed nothing.
    fn ensure_progress(&mut self, before: u32) {
        if self.current.span.start == before && !self.at_kind(TokenKind::Eof) {
            self.advance();
        }
    }

    fn error(&mut self, message: &str) {
        self.diagnostics.error(
            codes::INVALID_SYNTAX,
            message,
            self.current.span,
            message.to_string(),
        );
    }

    fn error_expected(&mut self, expected: &str) {
        let (code, title) = match self.at() {
            TokenKind::Eof => (codes::UNEXPECTED_EOF, "unexpected end of input"),
            TokenKind::Error if self.current_text().starts_with('"') => {
                (codes::UNTERMINATED_STRING, "unterminated string")
            }
            _ => (codes::UNEXPECTED_TOKEN, "unexpected token"),
        };
        let found = match self.at() {
            TokenKind::Error | TokenKind::Eof => self.at().as_str().to_string(),
            _ => format!("`{}`", self.current_text()),
        };
        self.diagnostics.error(
            code,
            title,
            self.current.span,
            format!("expected {expected}, found {found}"),
        );
    }

    /// Parses a document.
    pub fn parse_document(&mut self) -> Document<'a> {
        let start = self.current.span.start;
        let mut definitions = Vec::new();

        while !self.at_kind(TokenKind::Eof) {
            let before = self.current.span.start;
            if let Some(def) = self.parse_definition() {
                definitions.push(def);
            }
            self.ensure_progress(before);
        }

        if definitions.is_empty() && !self.diagnostics.has_errors() {
            self.error_expected("a definition");
        }

        Document {
            definitions,
            span: Span::new(start, self.current.span.end),
        }
    }

    fn parse_definition(&mut self) -> Option<Definition<'a>> {
        let description = self.try_parse_description();

        match self.at() {
            TokenKind::Schema => Some(Definition::Schema(
                self.parse_schema_definition(description),
            )),
            TokenKind::Type
            | TokenKind::Interface
            | TokenKind::Union
            | TokenKind::Enum
            | TokenKind::Input
            | TokenKind::Scalar => self.parse_type_definition(description).map(Definition::Type),
            TokenKind::Directive => Some(Definition::Directive(
                self.parse_directive_definition(description),
            )),
            TokenKind::Extend => {
                self.advance();
                if self.at_kind(TokenKind::Schema) {
                    Some(Definition::SchemaExtension(
                        self.parse_schema_definition(None),
                    ))
                } else {
                    self.parse_type_definition(None)
                        .map(Definition::TypeExtension)
                }
            }
            TokenKind::Query
            | TokenKind::Mutation
            | TokenKind::Subscription
            | TokenKind::LBrace => Some(Definition::Operation(self.parse_operation())),
            TokenKind::Fragment => Some(Definition::Fragment(self.parse_fragment_definition())),
            _ => {
                self.error_expected("a definition");
                None
            }
        }
    }

    fn parse_type_definition(
        &mut self,
        description: Option<Description>,
    ) -> Option<TypeDefinition<'a>> {
        let def = match self.at() {
            TokenKind::Type => TypeDefinition::Object(self.parse_object_type(description)),
            TokenKind::Interface => {
                TypeDefinition::Interface(self.parse_interface_type(description))
            }
            TokenKind::Union => TypeDefinition::Union(self.parse_union_type(description)),
            TokenKind::Enum => TypeDefinition::Enum(self.parse_enum_type(description)),
            TokenKind::Input => TypeDefinition::Input(self.parse_input_object_type(description)),
            TokenKind::Scalar => TypeDefinition::Scalar(self.parse_scalar_type(description)),
            _ => {
                self.error_expected("a type definition");
                return None;
            }
        };
        Some(def)
    }

    fn try_parse_description(&mut self) -> Option<Description> {
        let start = self.current.span.start;
        let value = self.parse_string_literal()?;
        Some(Description::new(value, self.span_from(start)))
    }

    /// Parses and decodes a string token if one is current.
    fn parse_string_literal(&mut self) -> Option<String> {
        let text = self.current_text();
        let value = match self.at() {
            TokenKind::StringLiteral => match decode_string(text) {
                Some(value) => value,
                None => {
                    self.error("invalid escape sequence");
                    String::new()
                }
            },
            TokenKind::BlockStringLiteral => decode_block_string(text),
            _ => return None,
        };
        self.advance();
        Some(value)
    }

    /// Parses a name. Keywords are valid names.
    fn parse_name(&mut self) -> Name<'a> {
        let span = self.current.span;
        let value = self.current_text();
        if self.at().is_name() {
            self.advance();
            Name::new(value, span)
        } else {
            self.error_expected("a name");
            if !self.at().is_closing() {
                self.advance();
            }
            Name::new("", span)
        }
    }

    fn parse_schema_definition(&mut self, description: Option<Description>) -> SchemaDefinition<'a> {
        let start = self.current.span.start;
        self.advance(); // schema

        let directives = self.parse_directives();
        let mut operations = Vec::new();

        if self.eat(TokenKind::LBrace) {
            while !self.at_kind(TokenKind::RBrace) && !self.at_kind(TokenKind::Eof) {
                let before = self.current.span.start;
                let op_start = self.current.span.start;
                if let Some(operation) = self.parse_operation_type() {
                    self.expect(TokenKind::Colon);
                    let type_name = self.parse_name();
                    operations.push(OperationTypeDefinition {
                        operation,
                        type_name,
                        span: self.span_from(op_start),
                    });
                }
                self.ensure_progress(before);
            }
            self.expect(TokenKind::RBrace);
        }

        SchemaDefinition {
            description,
            directives,
            operations,
            span: self.span_from(start),
        }
    }

    fn parse_operation_type(&mut self) -> Option<OperationType> {
        let operation = match self.at() {
            TokenKind::Query => OperationType::Query,
            TokenKind::Mutation => OperationType::Mutation,
            TokenKind::Subscription => OperationType::Subscription,
            _ => {
                self.error_expected("`query`, `mutation` or `subscription`");
                return None;
            }
        };
        self.advance();
        Some(operation)
    }

    fn parse_object_type(&mut self, description: Option<Description>) -> ObjectTypeDefinition<'a> {
        let start = self.current.span.start;
        self.advance(); // type

        let name = self.parse_name();
        let implements = self.parse_implements();
        let directives = self.parse_directives();
        let fields = self.parse_fields_block();

        ObjectTypeDefinition {
            description,
            name,
            implements,
            directives,
            fields,
            span: self.span_from(start),
        }
    }

    fn parse_interface_type(
        &mut self,
        description: Option<Description>,
    ) -> InterfaceTypeDefinition<'a> {
        let start = self.current.span.start;
        self.advance(); // interface

        let name = self.parse_name();
        let implements = self.parse_implements();
        let directives = self.parse_directives();
        let fields = self.parse_fields_block();

        InterfaceTypeDefinition {
            description,
            name,
            implements,
            directives,
            fields,
            span: self.span_from(start),
        }
    }

    fn parse_union_type(&mut self, description: Option<Description>) -> UnionTypeDefinition<'a> {
        let start = self.current.span.start;
        self.advance(); // union

        let name = self.parse_name();
        let directives = self.parse_directives();

        let mut members = Vec::new();
        if self.eat(TokenKind::Eq) {
            self.eat(TokenKind::Pipe);
            members.push(self.parse_name());
            while self.eat(TokenKind::Pipe) {
                members.push(self.parse_name());
            }
        }

        UnionTypeDefinition {
            description,
            name,
            directives,
            members,
            span: self.span_from(start),
        }
    }

    fn parse_enum_type(&mut self, description: Option<Description>) -> EnumTypeDefinition<'a> {
        let start = self.current.span.start;
        self.advance(); // enum

        let name = self.parse_name();
        let directives = self.parse_directives();

        let mut values = Vec::new();
        if self.eat(TokenKind::LBrace) {
            while !self.at_kind(TokenKind::RBrace) && !self.at_kind(TokenKind::Eof) {
                let before = self.current.span.start;
                let description = self.try_parse_description();
                let value_start = self.current.span.start;
                let name = self.parse_name();
                let directives = self.parse_directives();
                values.push(EnumValueDefinition {
                    description,
                    name,
                    directives,
                    span: self.span_from(value_start),
                });
                self.ensure_progress(before);
            }
            self.expect(TokenKind::RBrace);
        }

        EnumTypeDefinition {
            description,
            name,
            directives,
            values,
            span: self.span_from(start),
        }
    }

    fn parse_input_object_type(
        &mut self,
        description: Option<Description>,
    ) -> InputObjectTypeDefinition<'a> {
        let start = self.current.span.start;
        self.advance(); // input

        let name = self.parse_name();
        let directives = self.parse_directives();
        let fields = if self.eat(TokenKind::LBrace) {
            let fields = self.parse_input_value_definitions(TokenKind::RBrace);
            self.expect(TokenKind::RBrace);
            fields
        } else {
            Vec::new()
        };

        InputObjectTypeDefinition {
            description,
            name,
            directives,
            fields,
            span: self.span_from(start),
        }
    }

    fn parse_scalar_type(&mut self, description: Option<Description>) -> ScalarTypeDefinition<'a> {
        let start = self.current.span.start;
        self.advance(); // scalar

        let name = self.parse_name();
        let directives = self.parse_directives();

        ScalarTypeDefinition {
            description,
            name,
            directives,
            span: self.span_from(start),
        }
    }

    fn parse_directive_definition(
        &mut self,
        description: Option<Description>,
    ) -> DirectiveDefinition<'a> {
        let start = self.current.span.start;
        self.advance(); // directive

        self.expect(TokenKind::At);
        let name = self.parse_name();

        let arguments = if self.eat(TokenKind::LParen) {
            let args = self.parse_input_value_definitions(TokenKind::RParen);
            self.expect(TokenKind::RParen);
            args
        } else {
            Vec::new()
        };

        let repeatable = self.eat(TokenKind::Repeatable);
        self.expect(TokenKind::On);
        self.eat(TokenKind::Pipe);

        let mut locations = Vec::new();
        loop {
            let location = self.parse_name();
            match DirectiveLocation::parse(location.value) {
                Some(loc) => locations.push(loc),
                None if location.value.is_empty() => {}
                None => self.diagnostics.error(
                    codes::INVALID_SYNTAX,
                    "unknown directive location",
                    location.span,
                    format!("`{}` is not a directive location", location.value),
                ),
            }
            if !self.eat(TokenKind::Pipe) {
                break;
            }
        }

        DirectiveDefinition {
            description,
            name,
            arguments,
            repeatable,
            locations,
            span: self.span_from(start),
        }
    }

    fn parse_implements(&mut self) -> Vec<Name<'a>> {
        let mut interfaces = Vec::new();
        if self.eat(TokenKind::Implements) {
            self.eat(TokenKind::Amp);
            interfaces.push(self.parse_name());
            while self.eat(TokenKind::Amp) {
                interfaces.push(self.parse_name());
            }
        }
        interfaces
    }

    /// Parses an optional `{ fields }` block.
    fn parse_fields_block(&mut self) -> Vec<FieldDefinition<'a>> {
        let mut fields = Vec::new();
        if !self.eat(TokenKind::LBrace) {
            return fields;
        }
        while !self.at_kind(TokenKind::RBrace) && !self.at_kind(TokenKind::Eof) {
            let before = self.current.span.start;
            let description = self.try_parse_description();
            fields.push(self.parse_field_definition(description));
            self.ensure_progress(before);
        }
        self.expect(TokenKind::RBrace);
        fields
    }

    fn parse_field_definition(&mut self, description: Option<Description>) -> FieldDefinition<'a> {
        let start = self.current.span.start;
        let name = self.parse_name();

        let arguments = if self.eat(TokenKind::LParen) {
            let args = self.parse_input_value_definitions(TokenKind::RParen);
            self.expect(TokenKind::RParen);
            args
        } else {
            Vec::new()
        };

        self.expect(TokenKind::Colon);
        let ty = self.parse_type();
        let directives = self.parse_directives();

        FieldDefinition {
            description,
            name,
            arguments,
            ty,
            directives,
            span: self.span_from(start),
        }
    }

    fn parse_input_value_definitions(&mut self, close: TokenKind) -> Vec<InputValueDefinition<'a>> {
        let mut values = Vec::new();
        while !self.at_kind(close) && !self.at_kind(TokenKind::Eof) {
            let before = self.current.span.start;
            let description = self.try_parse_description();
            values.push(self.parse_input_value_definition(description));
            self.ensure_progress(before);
        }
        values
    }

    fn parse_input_value_definition(
        &mut self,
        description: Option<Description>,
    ) -> InputValueDefinition<'a> {
        let start = self.current.span.start;
        let name = self.parse_name();
        self.expect(TokenKind::Colon);
        let ty = self.parse_type();

        let default_value = if self.eat(TokenKind::Eq) {
            Some(self.parse_value(true))
        } else {
            None
        };

        let directives = self.parse_directives();

        InputValueDefinition {
            description,
            name,
            ty,
            default_value,
            directives,
            span: self.span_from(start),
        }
    }

    /// Parses a type reference: `Name`, `[Type]`, or either followed by `!`.
    fn parse_type(&mut self) -> Type<'a> {
        let start = self.current.span.start;

        let base = if self.eat(TokenKind::LBracket) {
            let inner = self.parse_type();
            self.expect(TokenKind::RBracket);
            Type::List(Box::new(inner), self.span_from(start))
        } else {
            Type::Named(self.parse_name())
        };

        if self.eat(TokenKind::Bang) {
            Type::NonNull(Box::new(base), self.span_from(start))
        } else {
            base
        }
    }

    fn parse_directives(&mut self) -> Vec<Directive<'a>> {
        let mut directives = Vec::new();
        while self.at_kind(TokenKind::At) {
            directives.push(self.parse_directive());
        }
        directives
    }

    fn parse_directive(&mut self) -> Directive<'a> {
        let start = self.current.span.start;
        self.advance(); // @

        let name = self.parse_name();
        let arguments = self.parse_arguments();

        Directive {
            name,
            arguments,
            span: self.span_from(start),
        }
    }

    /// Parses an optional `(name: value ...)` argument list.
    fn parse_arguments(&mut self) -> Vec<Argument<'a>> {
        let mut args = Vec::new();
        if !self.eat(TokenKind::LParen) {
            return args;
        }
        while !self.at_kind(TokenKind::RParen) && !self.at_kind(TokenKind::Eof) {
            let before = self.current.span.start;
            let start = self.current.span.start;
            let name = self.parse_name();
            self.expect(TokenKind::Colon);
            let value = self.parse_value(false);
            args.push(Argument {
                name,
                value,
                span: self.span_from(start),
            });
            self.ensure_progress(before);
        }
        self.expect(TokenKind::RParen);
        args
    }

    /// Parses a value. Variables are rejected in constant positions.
    fn parse_value(&mut self, constant: bool) -> Value<'a> {
        let start = self.current.span.start;

        match self.at() {
            TokenKind::Dollar => {
                self.advance();
                let name = self.parse_name();
                if constant {
                    self.diagnostics.error(
                        codes::INVALID_SYNTAX,
                        "unexpected variable",
                        self.span_from(start),
                        "variables are not allowed in constant values",
                    );
                }
                Value::Variable(name)
            }
            TokenKind::IntLiteral => {
                let text = self.current_text();
                let value = if let Ok(value) = text.parse() {
                    value
                } else {
                    self.error("integer literal out of range");
                    0
                };
                self.advance();
                Value::Int(value, self.span_from(start))
            }
            TokenKind::FloatLiteral => {
                let text = self.current_text();
                let value = if let Ok(value) = text.parse() {
                    value
                } else {
                    self.error("invalid float literal");
                    0.0
                };
                self.advance();
                Value::Float(value, self.span_from(start))
            }
            TokenKind::StringLiteral | TokenKind::BlockStringLiteral => {
                let value = self.parse_string_literal().unwrap_or_default();
                Value::String(value, self.span_from(start))
            }
            TokenKind::True => {
                self.advance();
                Value::Boolean(true, self.span_from(start))
            }
            TokenKind::False => {
                self.advance();
                Value::Boolean(false, self.span_from(start))
            }
            TokenKind::Null => {
                self.advance();
                Value::Null(self.span_from(start))
            }
            TokenKind::LBracket => {
                self.advance();
                let mut values = Vec::new();
                while !self.at_kind(TokenKind::RBracket) && !self.at_kind(TokenKind::Eof) {
                    let before = self.current.span.start;
                    values.push(self.parse_value(constant));
                    self.ensure_progress(before);
                }
                self.expect(TokenKind::RBracket);
                Value::List(values, self.span_from(start))
            }
            TokenKind::LBrace => {
                self.advance();
                let mut fields = Vec::new();
                while !self.at_kind(TokenKind::RBrace) && !self.at_kind(TokenKind::Eof) {
                    let before = self.current.span.start;
                    let name = self.parse_name();
                    self.expect(TokenKind::Colon);
                    let value = self.parse_value(constant);
                    fields.push((name, value));
                    self.ensure_progress(before);
                }
                self.expect(TokenKind::RBrace);
                Value::Object(fields, self.span_from(start))
            }
            kind if kind.is_name() => Value::Enum(self.parse_name()),
            _ => {
                self.error_expected("a value");
                if !self.at().is_closing() {
                    self.advance();
                }
                Value::Null(self.span_from(start))
            }
        }
    }

    fn parse_operation(&mut self) -> OperationDefinition<'a> {
        let start = self.current.span.start;

        let (operation, name) = if self.at_kind(TokenKind::LBrace) {
            (OperationType::Query, None)
        } else {
            let operation = self.parse_operation_type().unwrap_or(OperationType::Query);
            let name = self.at().is_name().then(|| self.parse_name());
            (operation, name)
        };

        let variables = if self.eat(TokenKind::LParen) {
            let vars = self.parse_variable_definitions();
            self.expect(TokenKind::RParen);
            vars
        } else {
            Vec::new()
        };

        let directives = self.parse_directives();
        let selection_set = self.parse_selection_set();

        OperationDefinition {
            operation,
            name,
            variables,
            directives,
            selection_set,
            span: self.span_from(start),
        }
    }

    fn parse_variable_definitions(&mut self) -> Vec<VariableDefinition<'a>> {
        let mut vars = Vec::new();
        while !self.at_kind(TokenKind::RParen) && !self.at_kind(TokenKind::Eof) {
            let before = self.current.span.start;
            vars.push(self.parse_variable_definition());
            self.ensure_progress(before);
        }
        vars
    }

    fn parse_variable_definition(&mut self) -> VariableDefinition<'a> {
        let start = self.current.span.start;
        self.expect(TokenKind::Dollar);
        let name = self.parse_name();
        self.expect(TokenKind::Colon);
        let ty = self.parse_type();

        let default_value = if self.eat(TokenKind::Eq) {
            Some(self.parse_value(true))
        } else {
            None
        };

        let directives = self.parse_directives();

        VariableDefinition {
            name,
            ty,
            default_value,
            directives,
            span: self.span_from(start),
        }
    }

    fn parse_fragment_definition(&mut self) -> FragmentDefinition<'a> {
        let start = self.current.span.start;
        self.advance(); // fragment

        if self.at_kind(TokenKind::On) {
            self.error_expected("a fragment name");
        }
        let name = self.parse_name();
        self.expect(TokenKind::On);
        let type_condition = self.parse_name();
        let directives = self.parse_directives();
        let selection_set = self.parse_selection_set();

        FragmentDefinition {
            name,
            type_condition,
            directives,
            selection_set,
            span: self.span_from(start),
        }
    }

    fn parse_selection_set(&mut self) -> SelectionSet<'a> {
        let start = self.current.span.start;
        let mut selections = Vec::new();

        if self.expect(TokenKind::LBrace) {
            while !self.at_kind(TokenKind::RBrace) && !self.at_kind(TokenKind::Eof) {
                let before = self.current.span.start;
                selections.push(self.parse_selection());
                self.ensure_progress(before);
            }
            if selections.is_empty() {
                self.error_expected("a selection");
            }
            self.expect(TokenKind::RBrace);
        }

        SelectionSet {
            selections,
            span: self.span_from(start),
        }
    }

    fn parse_selection(&mut self) -> Selection<'a> {
        let start = self.current.span.start;
        if !self.eat(TokenKind::Spread) {
            return Selection::Field(self.parse_field());
        }

        let spread_is_named = self.at().is_name() && !self.at_kind(TokenKind::On);
        if spread_is_named {
            let name = self.parse_name();
            let directives = self.parse_directives();
            return Selection::FragmentSpread(FragmentSpread {
                name,
                directives,
                span: self.span_from(start),
            });
        }

        let type_condition = if self.eat(TokenKind::On) {
            Some(self.parse_name())
        } else {
            None
        };
        let directives = self.parse_directives();
        let selection_set = self.parse_selection_set();
        Selection::InlineFragment(InlineFragment {
            type_condition,
            directives,
            selection_set,
            span: self.span_from(start),
        })
    }

    fn parse_field(&mut self) -> Field<'a> {
        let start = self.current.span.start;

        let first_name = self.parse_name();
        let (alias, name) = if self.eat(TokenKind::Colon) {
            (Some(first_name), self.parse_name())
        } else {
            (None, first_name)
        };

        let arguments = self.parse_arguments();
        let directives = self.parse_directives();

        let selection_set = if self.at_kind(TokenKind::LBrace) {
            Some(self.parse_selection_set())
        } else {
            None
        };

        Field {
            alias,
            name,
            arguments,
            directives,
            selection_set,
            span: self.span_from(start),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Document<'_> {
        let result = parse(source);
        let messages: Vec<_> = result
            .diagnostics
            .iter()
            .map(|d| format!("{}: {:?}", d.title, d.message))
            .collect();
        assert!(messages.is_empty(), "unexpected diagnostics: {messages:?}");
        result.document
    }

    #[test]
    fn test_parse_simple_type() {
        let doc = parse_ok("type Query { hello: String }");
        assert_eq!(doc.definitions.len(), 1);
    }

    #[test]
    fn test_parse_full_sdl() {
        let doc = parse_ok(
            r#"
            schema { query: Query mutation: Mutation }

            """
            A point in time.
            """
            scalar DateTime

            interface Node { id: ID! }

            type Film implements Node & Entity @key(fields: "id") {
                id: ID!
                "Release date"
                releaseDate: DateTime
                characters(first: Int = 10, after: String): [Person!]!
            }

            union SearchResult = | Film | Person
            enum Episode { NEWHOPE EMPIRE JEDI }
            input HeroInput { name: String!, tags: [String] = [] }
            directive @key(fields: String!) repeatable on OBJECT | INTERFACE
            extend type Film { rating: Float }
            "#,
        );
        assert_eq!(doc.definitions.len(), 9);

        let Definition::Type(TypeDefinition::Object(film)) = &doc.definitions[3] else {
            panic!("expected object type definition");
        };
        assert_eq!(film.name.value, "Film");
        assert_eq!(film.implements.len(), 2);
        assert_eq!(
            film.fields[1].description.as_ref().map(|d| d.value.as_str()),
            Some("Release date")
        );
        assert_eq!(film.fields[2].ty.to_string(), "[Person!]!");
        assert_eq!(film.fields[2].ty.named_type().value, "Person");

        let Definition::Type(TypeDefinition::Scalar(scalar)) = &doc.definitions[1] else {
            panic!("expected scalar definition");
        };
        assert_eq!(
            scalar.description.as_ref().map(|d| d.value.as_str()),
            Some("A point in time.")
        );

        assert!(matches!(
            doc.definitions[8],
            Definition::TypeExtension(TypeDefinition::Object(_))
        ));
    }

    #[test]
    fn test_keywords_are_valid_names() {
        let doc = parse_ok("type Query { type: String query(input: Int): Int }");
        let Definition::Type(TypeDefinition::Object(query)) = &doc.definitions[0] else {
            panic!("expected object type definition");
        };
        assert_eq!(query.fields[0].name.value, "type");
        assert_eq!(query.fields[1].arguments[0].name.value, "input");
    }

    #[test]
    fn test_parse_operation() {
        let doc = parse_ok(
            r#"
            query GetFilm($id: ID!, $first: Int = 5) @cached {
                film(id: $id) {
                    title
                    released: releaseDate
                    ... on Film { director }
                    ...FilmParts @include(if: true)
                }
            }
            fragment FilmParts on Film { producers }
            "#,
        );
        let op = doc.operation(None).expect("single operation");
        assert_eq!(op.operation, OperationType::Query);
        assert_eq!(op.name.map(|n| n.value), Some("GetFilm"));
        assert_eq!(op.variables.len(), 2);
        assert_eq!(op.directives.len(), 1);

        let Selection::Field(film) = &op.selection_set.selections[0] else {
            panic!("expected field");
        };
        let selections = &film.selection_set.as_ref().expect("sub-selection").selections;
        assert_eq!(selections.len(), 4);
        let Selection::Field(released) = &selections[1] else {
            panic!("expected field");
        };
        assert_eq!(released.response_key(), "released");
        assert_eq!(released.name.value, "releaseDate");
        assert!(matches!(selections[2], Selection::InlineFragment(_)));
        assert!(matches!(selections[3], Selection::FragmentSpread(_)));
        assert!(doc.fragment("FilmParts").is_some());
    }

    #[test]
    fn test_parse_anonymous_query() {
        let doc = parse_ok("{ allFilms { edges { node { releaseDate } } } }");
        let op = doc.operation(None).expect("operation");
        assert!(op.name.is_none());
        assert_eq!(op.operation, OperationType::Query);
    }

    #[test]
    fn test_parse_values() {
        let doc = parse_ok(
            r#"{ f(a: 1, b: -2.5e3, c: "s\n", d: true, e: null, g: ENUM, h: [1 2], i: {x: 1}) }"#,
        );
        let op = doc.operation(None).expect("operation");
        let Selection::Field(field) = &op.selection_set.selections[0] else {
            panic!("expected field");
        };
        let values: Vec<_> = field.arguments.iter().map(|a| &a.value).collect();
        assert!(matches!(values[0], Value::Int(1, _)));
        assert!(matches!(values[1], Value::Float(v, _) if (*v + 2500.0).abs() < f64::EPSILON));
        assert!(matches!(values[2], Value::String(s, _) if s == "s\n"));
        assert!(matches!(values[3], Value::Boolean(true, _)));
        assert!(matches!(values[4], Value::Null(_)));
        assert!(matches!(values[5], Value::Enum(n) if n.value == "ENUM"));
        assert!(matches!(values[6], Value::List(items, _) if items.len() == 2));
        assert!(matches!(values[7], Value::Object(fields, _) if fields.len() == 1));
    }

    #[test]
    fn test_operation_selection_by_name() {
        let doc = parse_ok("query A { a } query B { b }");
        assert!(doc.operation(None).is_none());
        assert_eq!(
            doc.operation(Some("B")).and_then(|op| op.name).map(|n| n.value),
            Some("B")
        );
    }

    #[test]
    fn test_errors_are_reported_and_parsing_terminates() {
        for source in [
            "{ film(id: ) }",
            "{ film { ) } }",
            "query ($x Int) { a }",
            "type Query { a: }",
            "{",
            "}",
            "fragment on on Film { a }",
            "{ a(x: $) }",
            "\"unterminated",
            "",
        ] {
            let result = parse(source);
            assert!(result.diagnostics.has_errors(), "expected errors for {source:?}");
        }
    }

    #[test]
    fn test_variables_rejected_in_defaults() {
        let result = parse("query ($a: Int = $b) { f }");
        assert!(result.diagnostics.has_errors());
    }

    #[test]
    fn test_diagnostic_codes() {
        let result = parse("{ film");
        let diagnostics = result.diagnostics.into_vec();
        assert_eq!(diagnostics[0].code, codes::UNEXPECTED_EOF);

        let result = parse("{ film(title: \"oops) }");
        let diagnostics = result.diagnostics.into_vec();
        assert_eq!(diagnostics[0].code, codes::UNTERMINATED_STRING);
    }

    #[test]
    fn test_parse_const_value() {
        let value = parse_const_value("[1, RED, {a: \"x\"}]").expect("valid value");
        assert!(matches!(value, Value::List(ref items, _) if items.len() == 3));
        assert!(parse_const_value("$var").is_err());
        assert!(parse_const_value("1 2").is_err());
    }

    #[test]
    fn test_diagnostic_messages() {
        let diagnostics = parse("{ film").diagnostics.into_vec();
        let message = diagnostics[0].labels[0].message.clone();
        insta::assert_snapshot!(message, @"expected }, found <eof>");

        let diagnostics = parse("{ film(id: ) }").diagnostics.into_vec();
        let message = diagnostics[0].labels[0].message.clone();
        insta::assert_snapshot!(message, @"expected a value, found `)`");
    }
}
