//! Declaration parsing implementation
//!
//! This module handles parsing of definitions and type declarations:
//!
//! - Modules: `module Name { ... }`, renamed by a pending `#pragma prefix`
//! - Interfaces: `interface Name [: Supers] { ... }` and forward declarations
//! - Valuetypes: `valuetype [Name] [[:] Type] [{ ... }]`
//! - Constructed types: `struct`, `union`, `enum`
//! - `typedef`, `native`, `exception` and `const` declarations
//!
//! # Grammar
//!
//! ```text
//! definition   ::= type_decl ";" | const_decl ";" | except_decl ";"
//!                | interface ";" | module ";" | codefrag | scoped_name | ";"
//! export       ::= type_decl ";" | except_decl ";" | attr_decl ";"
//!                | op_decl ";" | const_decl ";" | codefrag | ";"
//! value_member ::= export | member
//! type_decl    ::= typedef | struct | union | enum | valuetype | native
//! ```
//!
//! Every declaration except `module` may be preceded by modifiers and
//! property lists. Only interfaces reject modifiers; elsewhere the ones a
//! declaration has no field for are dropped.
//!
//! All parsing methods are implemented as `pub(crate)` methods on the [`Parser`] struct.

use crate::parser::ast::*;
use crate::parser::lexer::TokenKind;
use crate::parser::parse::{ParseResult, Parser, Prefix};
use tracing::debug;

/// Where a definition appears; decides which productions are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Context {
    /// Top level or module body
    Definition,
    Interface,
    ValueType,
}

impl Parser {
    /// Parse one top-level or module-level definition. Returns `None` for
    /// the no-op forms (stray `;`, bare scoped name).
    pub(crate) fn parse_definition(&mut self) -> ParseResult<Option<Definition>> {
        self.parse_body_item(Context::Definition)
    }

    fn parse_body_item(&mut self, context: Context) -> ParseResult<Option<Definition>> {
        let prefix = self.parse_modifiers_and_props()?;
        let Some(kind) = self.peek_kind()? else {
            return Err(self.unexpected_end());
        };

        // Forms that never take modifiers or properties
        if prefix.is_empty() {
            match kind {
                TokenKind::Semicolon => {
                    self.advance()?;
                    return Ok(None);
                }
                TokenKind::CodeFrag => {
                    let fragment = self.advance()?;
                    return Ok(Some(Definition::CodeFragment(fragment.value)));
                }
                TokenKind::Module if context == Context::Definition => {
                    let module = self.parse_module()?;
                    self.expect_semicolon("after module")?;
                    return Ok(Some(Definition::Module(module)));
                }
                TokenKind::Ident | TokenKind::Scope if context == Context::Definition => {
                    let name = self.parse_scoped_name()?;
                    debug!(name = %name, "ignoring bare scoped name");
                    return Ok(None);
                }
                _ => {}
            }
        }

        let definition = match kind {
            TokenKind::Interface if context == Context::Definition => {
                Definition::Interface(self.parse_interface(prefix)?)
            }
            TokenKind::Struct | TokenKind::Union | TokenKind::Enum => {
                let constructed = self.parse_constructed_type(prefix)?;
                if context == Context::ValueType && !self.check(TokenKind::Semicolon)? {
                    // `struct S { ... } s;` declares a state member
                    let field = self.parse_member_rest(constructed.into_type_spec(), Vec::new())?;
                    return Ok(Some(Definition::Field(field)));
                }
                constructed.into_definition()
            }
            TokenKind::Typedef => Definition::TypeDef(self.parse_typedef(prefix)?),
            TokenKind::Native => Definition::Native(self.parse_native(prefix)?),
            TokenKind::ValueType => Definition::ValueType(self.parse_value_type(prefix)?),
            TokenKind::Exception => Definition::Exception(self.parse_exception(prefix)?),
            TokenKind::Const => Definition::Const(self.parse_const(prefix)?),
            TokenKind::Attribute if context != Context::Definition => {
                Definition::Attribute(self.parse_attribute(prefix)?)
            }
            _ if context == Context::Interface => {
                Definition::Operation(self.parse_operation(prefix)?)
            }
            _ if context == Context::ValueType => {
                return self.parse_value_member(prefix).map(Some);
            }
            _ => return Err(self.unexpected("expected a definition")),
        };

        self.expect_semicolon("after declaration")?;
        Ok(Some(definition))
    }

    /// Parse `module Name { definitions }`
    pub(crate) fn parse_module(&mut self) -> ParseResult<Module> {
        self.expect_token(TokenKind::Module, "to start module")?;
        let name = self.expect_identifier("after 'module'")?;
        let name = format!("{}{}", self.take_module_prefix()?, name);
        debug!(module = %name, "parsing module");

        self.expect_token(TokenKind::LBrace, "after module name")?;
        let definitions = self.parse_body(Context::Definition)?;

        Ok(Module { name, definitions })
    }

    /// Consume a pending `#pragma prefix` and render it as `"prefix."`.
    fn take_module_prefix(&mut self) -> ParseResult<String> {
        let Some(Some(value)) = self.lexer.take_pragma("prefix") else {
            return Ok(String::new());
        };
        let Some(prefix) = unquote_pragma(&value) else {
            return Err(self.error(format!(
                "Invalid value specified for #pragma prefix: {}",
                value
            )));
        };
        if prefix.is_empty() {
            Ok(String::new())
        } else {
            Ok(format!("{}.", prefix))
        }
    }

    /// Definitions up to and including the closing `}`.
    fn parse_body(&mut self, context: Context) -> ParseResult<Vec<Definition>> {
        let mut definitions = Vec::new();
        while !self.match_token(TokenKind::RBrace)? {
            if let Some(definition) = self.parse_body_item(context)? {
                definitions.push(definition);
            }
        }
        Ok(definitions)
    }

    /// Parse `interface Name [: Supers] { exports }` or `interface Name`
    pub(crate) fn parse_interface(&mut self, prefix: Prefix) -> ParseResult<Interface> {
        if !prefix.modifiers.is_empty() {
            return Err(self.error("No modifiers are allowed for interface"));
        }
        self.expect_token(TokenKind::Interface, "to start interface")?;

        let name = match self.peek_kind()? {
            Some(TokenKind::Ident | TokenKind::Object | TokenKind::TypeCode) => self.advance()?.value,
            _ => return Err(self.unexpected("expected interface name")),
        };
        match name.to_ascii_lowercase().as_str() {
            "object" => return Err(self.error("Interfaces cannot be named `Object'")),
            "typecode" => return Err(self.error("Interfaces cannot be named `TypeCode'")),
            _ => {}
        }

        if !self.check(TokenKind::Colon)? && !self.check(TokenKind::LBrace)? {
            debug!(interface = %name, "forward declaration");
            return Ok(Interface {
                name,
                properties: prefix.properties,
                supers: None,
                body: None,
            });
        }

        let supers = if self.match_token(TokenKind::Colon)? {
            self.parse_scoped_name_list()?
        } else {
            Vec::new()
        };
        self.expect_token(TokenKind::LBrace, "before interface body")?;
        let body = self.parse_body(Context::Interface)?;
        debug!(interface = %name, exports = body.len(), "parsed interface");

        Ok(Interface {
            name,
            properties: prefix.properties,
            supers: Some(supers),
            body: Some(body),
        })
    }

    /// Parse `valuetype [Name] [[:] Type] [{ members }]`
    pub(crate) fn parse_value_type(&mut self, prefix: Prefix) -> ParseResult<ValueType> {
        self.expect_token(TokenKind::ValueType, "to start valuetype")?;
        let name = self.parse_optional_name()?;

        let inheritance = if self.match_token(TokenKind::Colon)? {
            Some(self.parse_type_spec()?)
        } else if self.starts_type_spec()? {
            Some(self.parse_type_spec()?)
        } else {
            None
        };

        let body = if self.match_token(TokenKind::LBrace)? {
            Some(self.parse_body(Context::ValueType)?)
        } else {
            None
        };

        Ok(ValueType {
            name,
            properties: prefix.properties,
            inheritance,
            body,
        })
    }

    /// Valuetype member that is neither a declaration nor an attribute:
    /// a state member `Type a, b[2];` or an operation `Type name(...)`.
    fn parse_value_member(&mut self, prefix: Prefix) -> ParseResult<Definition> {
        if self.check(TokenKind::Void)? {
            let operation = self.parse_operation(prefix)?;
            self.expect_semicolon("after operation")?;
            return Ok(Definition::Operation(operation));
        }

        let type_spec = self.parse_type_spec()?;
        let name = self.expect_identifier("in valuetype member")?;

        if self.check(TokenKind::LParen)? {
            self.check_param_type(&type_spec)?;
            let operation = self.parse_operation_rest(prefix, type_spec, name)?;
            self.expect_semicolon("after operation")?;
            return Ok(Definition::Operation(operation));
        }

        let first = self.parse_declarator_rest(name)?;
        let mut declarators = vec![first];
        while self.match_token(TokenKind::Comma)? {
            declarators.push(self.parse_declarator()?);
        }
        self.expect_semicolon("after member")?;

        Ok(Definition::Field(FieldDef {
            type_spec,
            declarators,
            properties: prefix.properties,
        }))
    }

    /// Parse a `struct`, `union` or `enum` declaration
    fn parse_constructed_type(&mut self, prefix: Prefix) -> ParseResult<Constructed> {
        let properties = prefix.properties;
        match self.peek_kind()? {
            Some(TokenKind::Struct) => Ok(Constructed::Struct(self.parse_struct(properties)?)),
            Some(TokenKind::Union) => Ok(Constructed::Union(self.parse_union(properties)?)),
            Some(TokenKind::Enum) => Ok(Constructed::Enum(self.parse_enum(properties)?)),
            _ => Err(self.unexpected("expected 'struct', 'union' or 'enum'")),
        }
    }

    /// Parse `struct [Name] { members }`
    pub(crate) fn parse_struct(&mut self, properties: Vec<Property>) -> ParseResult<StructDef> {
        self.expect_token(TokenKind::Struct, "to start struct")?;
        let name = self.parse_optional_name()?;
        self.expect_token(TokenKind::LBrace, "before struct body")?;
        let members = self.parse_members()?;

        Ok(StructDef {
            name,
            properties,
            members,
        })
    }

    /// Members up to and including the closing `}`.
    fn parse_members(&mut self) -> ParseResult<Vec<FieldDef>> {
        let mut members = Vec::new();
        while !self.match_token(TokenKind::RBrace)? {
            members.push(self.parse_member()?);
        }
        Ok(members)
    }

    /// Parse `[props] Type declarators ;`
    fn parse_member(&mut self) -> ParseResult<FieldDef> {
        let prefix = self.parse_modifiers_and_props()?;
        let type_spec = self.parse_type_spec()?;
        self.parse_member_rest(type_spec, prefix.properties)
    }

    fn parse_member_rest(
        &mut self,
        type_spec: TypeSpec,
        properties: Vec<Property>,
    ) -> ParseResult<FieldDef> {
        let declarators = self.parse_declarator_list()?;
        self.expect_semicolon("after member")?;
        Ok(FieldDef {
            type_spec,
            declarators,
            properties,
        })
    }

    /// Parse `union [Name] switch (Type) { cases }`
    pub(crate) fn parse_union(&mut self, properties: Vec<Property>) -> ParseResult<UnionDef> {
        self.expect_token(TokenKind::Union, "to start union")?;
        let name = self.parse_optional_name()?;
        self.expect_token(TokenKind::Switch, "after union name")?;
        self.expect_token(TokenKind::LParen, "after 'switch'")?;
        let switch_type = self.parse_switch_type()?;
        self.expect_token(TokenKind::RParen, "after switch type")?;
        self.expect_token(TokenKind::LBrace, "before union body")?;

        let mut cases = Vec::new();
        loop {
            cases.push(self.parse_union_case()?);
            if self.match_token(TokenKind::RBrace)? {
                break;
            }
        }

        Ok(UnionDef {
            name,
            properties,
            switch_type,
            cases,
        })
    }

    fn parse_switch_type(&mut self) -> ParseResult<TypeSpec> {
        if self.check(TokenKind::Enum)? {
            return Ok(TypeSpec::Enum(Box::new(self.parse_enum(Vec::new())?)));
        }
        let switch_type = self.parse_simple_type_spec()?;
        let legal = match &switch_type {
            TypeSpec::Basic(basic) => matches!(
                basic.name.as_str(),
                "short"
                    | "long"
                    | "long long"
                    | "unsigned short"
                    | "unsigned long"
                    | "unsigned long long"
                    | "char"
                    | "boolean"
            ),
            TypeSpec::Reference(_) => true,
            _ => false,
        };
        if legal {
            Ok(switch_type)
        } else {
            Err(self.error(format!("Illegal union switch type `{}'", switch_type)))
        }
    }

    /// Parse `case X: [case Y:] [default:] Type declarator ;`
    fn parse_union_case(&mut self) -> ParseResult<UnionCase> {
        let mut labels = Vec::new();
        loop {
            if self.match_token(TokenKind::Case)? {
                let value = self.parse_const_expr()?;
                self.expect_token(TokenKind::Colon, "after case label")?;
                labels.push(CaseLabel::Case(value));
            } else if self.match_token(TokenKind::Default)? {
                self.expect_token(TokenKind::Colon, "after 'default'")?;
                labels.push(CaseLabel::Default);
            } else {
                break;
            }
        }
        if labels.is_empty() {
            return Err(self.unexpected("expected 'case' or 'default'"));
        }

        let type_spec = self.parse_type_spec()?;
        let declarator = self.parse_declarator()?;
        self.expect_semicolon("after union element")?;

        Ok(UnionCase {
            labels,
            element: FieldDef {
                type_spec,
                declarators: vec![declarator],
                properties: Vec::new(),
            },
        })
    }

    /// Parse `enum [Name] { a, b, c }`
    pub(crate) fn parse_enum(&mut self, properties: Vec<Property>) -> ParseResult<EnumDef> {
        self.expect_token(TokenKind::Enum, "to start enum")?;
        let name = self.parse_optional_name()?;
        self.expect_token(TokenKind::LBrace, "before enumerators")?;

        let mut enumerators = vec![self.expect_identifier("in enum")?];
        while self.match_token(TokenKind::Comma)? {
            enumerators.push(self.expect_identifier("after ','")?);
        }
        self.expect_token(TokenKind::RBrace, "after enumerators")?;

        Ok(EnumDef {
            name,
            properties,
            enumerators,
        })
    }

    /// Parse `typedef Type declarators`
    fn parse_typedef(&mut self, prefix: Prefix) -> ParseResult<TypeDef> {
        self.expect_token(TokenKind::Typedef, "to start typedef")?;
        let type_spec = self.parse_type_spec()?;
        let declarators = self.parse_declarator_list()?;

        Ok(TypeDef {
            type_spec,
            declarators,
            properties: prefix.properties,
        })
    }

    /// Parse `native Name [(raw type)]`. The lexer switches to its native
    /// states on the keyword, so the raw type arrives as one token.
    fn parse_native(&mut self, prefix: Prefix) -> ParseResult<NativeDecl> {
        self.expect_token(TokenKind::Native, "to start native")?;
        let name = self.expect_identifier("after 'native'")?;

        let native_type = if self.match_token(TokenKind::LParen)? {
            let raw = self.expect_token(TokenKind::NativeType, "after '('")?;
            self.expect_token(TokenKind::RParen, "after native type")?;
            Some(raw.value)
        } else {
            None
        };

        Ok(NativeDecl {
            name,
            native_type,
            properties: prefix.properties,
        })
    }

    /// Parse `exception Name { members }`
    fn parse_exception(&mut self, prefix: Prefix) -> ParseResult<ExceptionDecl> {
        self.expect_token(TokenKind::Exception, "to start exception")?;
        let name = self.expect_identifier("after 'exception'")?;
        self.expect_token(TokenKind::LBrace, "before exception body")?;
        let members = self.parse_members()?;

        Ok(ExceptionDecl {
            name,
            members,
            properties: prefix.properties,
        })
    }

    /// Parse `const Type Name = expr`
    fn parse_const(&mut self, prefix: Prefix) -> ParseResult<ConstDecl> {
        self.expect_token(TokenKind::Const, "to start const")?;
        let const_type = self.parse_const_type()?;
        let name = self.expect_identifier("in const declaration")?;
        self.expect_token(TokenKind::Equal, "after const name")?;
        let value = self.parse_const_expr()?;

        Ok(ConstDecl {
            name,
            const_type,
            value,
            properties: prefix.properties,
        })
    }

    /// Bare `fixed` is a legal const type; everything else must be a
    /// scalar, string or named type.
    fn parse_const_type(&mut self) -> ParseResult<TypeSpec> {
        if self.check(TokenKind::Fixed)? {
            self.advance()?;
            if !self.check(TokenKind::Lt)? {
                return Ok(TypeSpec::basic("fixed"));
            }
            return Err(self.error("Illegal type specified for constant `fixed<>'"));
        }
        let const_type = self.parse_simple_type_spec()?;
        match &const_type {
            TypeSpec::Sequence { .. } | TypeSpec::FixedPoint { .. } => Err(self.error(format!(
                "Illegal type specified for constant `{}'",
                const_type
            ))),
            TypeSpec::Basic(basic) if matches!(basic.name.as_str(), "any" | "Object" | "TypeCode") => {
                Err(self.error(format!("Illegal type specified for constant `{}'", const_type)))
            }
            _ => Ok(const_type),
        }
    }

    fn parse_optional_name(&mut self) -> ParseResult<Option<String>> {
        if self.check(TokenKind::Ident)? {
            Ok(Some(self.advance()?.value))
        } else {
            Ok(None)
        }
    }
}

/// A struct, union or enum that is either a declaration on its own or the
/// type of a valuetype member.
enum Constructed {
    Struct(StructDef),
    Union(UnionDef),
    Enum(EnumDef),
}

impl Constructed {
    fn into_definition(self) -> Definition {
        match self {
            Constructed::Struct(def) => Definition::Struct(def),
            Constructed::Union(def) => Definition::Union(def),
            Constructed::Enum(def) => Definition::Enum(def),
        }
    }

    fn into_type_spec(self) -> TypeSpec {
        match self {
            Constructed::Struct(def) => TypeSpec::Struct(Box::new(def)),
            Constructed::Union(def) => TypeSpec::Union(Box::new(def)),
            Constructed::Enum(def) => TypeSpec::Enum(Box::new(def)),
        }
    }
}

/// Contents of a `"..."` or `'...'` pragma value.
fn unquote_pragma(value: &str) -> Option<&str> {
    let value = value.trim();
    let quote = value.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let rest = &value[1..];
    let mut escaped = false;
    for (i, c) in rest.char_indices() {
        match c {
            '\\' if !escaped => escaped = true,
            c if c == quote && !escaped => return Some(&rest[..i]),
            _ => escaped = false,
        }
    }
    None
}
