//! Type and name parsing
//!
//! - Type specs: base types, `sequence<T[,N]>`, `string[<N>]`, `wstring[<N>]`,
//!   `fixed<P,S>`, scoped names and inline `struct`/`union`/`enum`
//! - Declarators: `name` and `name[N][]`
//! - Scoped names: `a::b`, `::a::b`
//! - Modifiers (`oneway`, `readonly`) and property lists (`[key=value, ...]`)
//!
//! Property lists are lexed in the lexer's `PROP` state, pushed here right
//! after the opening `[` is consumed and popped by the lexer on `]`.

use crate::parser::ast::*;
use crate::parser::lexer::{LexState, TokenKind};
use crate::parser::parse::{ParseResult, Parser, Prefix};

impl Parser {
    /// Parse any leading `oneway`, `readonly` and `[props]` in any order.
    pub(crate) fn parse_modifiers_and_props(&mut self) -> ParseResult<Prefix> {
        let mut prefix = Prefix::default();
        loop {
            let modifier = match self.peek_kind()? {
                Some(TokenKind::Oneway) => Modifier::Oneway,
                Some(TokenKind::Readonly) => Modifier::Readonly,
                Some(TokenKind::LBracket) => {
                    self.parse_property_list(&mut prefix.properties)?;
                    continue;
                }
                _ => break,
            };
            if prefix.modifiers.contains(&modifier) {
                return Err(self.error(format!("Duplicate `{}' modifier", modifier)));
            }
            self.advance()?;
            prefix.modifiers.push(modifier);
        }
        Ok(prefix)
    }

    /// Parse `[key, key=value, key(args), ...]`, appending to `properties`.
    pub(crate) fn parse_property_list(&mut self, properties: &mut Vec<Property>) -> ParseResult<()> {
        self.expect_token(TokenKind::LBracket, "to start property list")?;
        // Nothing past the `[` has been read yet
        self.lexer.push_state(LexState::Prop);

        loop {
            if self.match_token(TokenKind::RBracket)? {
                return Ok(());
            }
            let key = self.expect_identifier("for property name")?;
            let value = self.parse_property_value()?;
            if properties.iter().any(|p| p.key == key) {
                return Err(self.error(format!("Property `{}' applied more than once", key)));
            }
            properties.push(Property { key, value });

            if !self.match_token(TokenKind::Comma)? {
                self.expect_token(TokenKind::RBracket, "to close property list")?;
                return Ok(());
            }
        }
    }

    fn parse_property_value(&mut self) -> ParseResult<Option<PropertyValue>> {
        if self.check(TokenKind::PropValue)? {
            let args = self.advance()?;
            return Ok(Some(PropertyValue::Args(strip_parens(&args.value))));
        }
        if !self.match_token(TokenKind::Equal)? {
            return Ok(None);
        }

        let Some(kind) = self.peek_kind()? else {
            return Err(self.unexpected_end());
        };
        let token = self.advance()?;
        let value = match kind {
            TokenKind::Ident if self.check(TokenKind::PropValue)? => {
                let args = self.advance()?;
                PropertyValue::Call {
                    name: token.value,
                    args: strip_parens(&args.value),
                }
            }
            TokenKind::Ident => PropertyValue::Ident(token.value),
            TokenKind::Integer => PropertyValue::Literal(Literal::Integer(token.value)),
            TokenKind::FloatingPt => PropertyValue::Literal(Literal::Float(token.value)),
            TokenKind::FixedPt => PropertyValue::Literal(Literal::FixedPoint(token.value)),
            TokenKind::DqString => PropertyValue::Literal(Literal::String(unquote(&token.value))),
            TokenKind::SqString => PropertyValue::Literal(Literal::Char(unquote(&token.value))),
            _ => {
                return Err(self.error(format!(
                    "Syntax error: expected property value, found '{}'",
                    token.value
                )))
            }
        };
        Ok(Some(value))
    }

    /// True when the next token can begin a type spec.
    pub(crate) fn starts_type_spec(&mut self) -> ParseResult<bool> {
        Ok(matches!(
            self.peek_kind()?,
            Some(
                TokenKind::Ident
                    | TokenKind::Scope
                    | TokenKind::Float
                    | TokenKind::Double
                    | TokenKind::Short
                    | TokenKind::Long
                    | TokenKind::Unsigned
                    | TokenKind::Char
                    | TokenKind::WChar
                    | TokenKind::Boolean
                    | TokenKind::Octet
                    | TokenKind::Any
                    | TokenKind::Object
                    | TokenKind::TypeCode
                    | TokenKind::Sequence
                    | TokenKind::String
                    | TokenKind::WString
                    | TokenKind::Fixed
                    | TokenKind::Struct
                    | TokenKind::Union
                    | TokenKind::Enum
            )
        ))
    }

    /// Parse a type spec, including inline constructed types
    pub(crate) fn parse_type_spec(&mut self) -> ParseResult<TypeSpec> {
        match self.peek_kind()? {
            Some(TokenKind::Struct) => Ok(TypeSpec::Struct(Box::new(self.parse_struct(Vec::new())?))),
            Some(TokenKind::Union) => Ok(TypeSpec::Union(Box::new(self.parse_union(Vec::new())?))),
            Some(TokenKind::Enum) => Ok(TypeSpec::Enum(Box::new(self.parse_enum(Vec::new())?))),
            _ => self.parse_simple_type_spec(),
        }
    }

    /// Parse a base, template or named type
    pub(crate) fn parse_simple_type_spec(&mut self) -> ParseResult<TypeSpec> {
        let Some(kind) = self.peek_kind()? else {
            return Err(self.unexpected_end());
        };
        let name = match kind {
            TokenKind::Float => "float",
            TokenKind::Double => "double",
            TokenKind::Short => "short",
            TokenKind::Char => "char",
            TokenKind::WChar => "wchar",
            TokenKind::Boolean => "boolean",
            TokenKind::Octet => "octet",
            TokenKind::Any => "any",
            TokenKind::Object => "Object",
            TokenKind::TypeCode => "TypeCode",
            TokenKind::Long => {
                self.advance()?;
                return Ok(TypeSpec::basic(self.parse_long_suffix()?));
            }
            TokenKind::Unsigned => return self.parse_unsigned_type(),
            TokenKind::Sequence => return self.parse_sequence_type(),
            TokenKind::String | TokenKind::WString => return self.parse_string_type(),
            TokenKind::Fixed => return self.parse_fixed_type(),
            TokenKind::Ident | TokenKind::Scope => {
                return Ok(TypeSpec::Reference(self.parse_scoped_name()?))
            }
            _ => return Err(self.unexpected("expected a type")),
        };
        self.advance()?;
        Ok(TypeSpec::basic(name))
    }

    /// After `long`: `long`, `long long` or `long double`.
    fn parse_long_suffix(&mut self) -> ParseResult<&'static str> {
        if self.match_token(TokenKind::Long)? {
            Ok("long long")
        } else if self.match_token(TokenKind::Double)? {
            Ok("long double")
        } else {
            Ok("long")
        }
    }

    fn parse_unsigned_type(&mut self) -> ParseResult<TypeSpec> {
        self.expect_token(TokenKind::Unsigned, "to start unsigned type")?;
        let name = if self.match_token(TokenKind::Short)? {
            "unsigned short"
        } else if self.match_token(TokenKind::Long)? {
            if self.match_token(TokenKind::Long)? {
                "unsigned long long"
            } else {
                "unsigned long"
            }
        } else {
            return Err(self.unexpected("expected 'short' or 'long' after 'unsigned'"));
        };
        Ok(TypeSpec::basic(name))
    }

    /// Parse `sequence<T>` or `sequence<T, N>`
    fn parse_sequence_type(&mut self) -> ParseResult<TypeSpec> {
        self.expect_token(TokenKind::Sequence, "to start sequence")?;
        self.expect_token(TokenKind::Lt, "after 'sequence'")?;
        self.angle_depth += 1;

        let element = self.parse_simple_type_spec()?;
        let bound = if self.match_token(TokenKind::Comma)? {
            Some(self.parse_const_expr()?)
        } else {
            None
        };

        self.angle_depth -= 1;
        self.expect_closing_angle("to close sequence")?;
        Ok(TypeSpec::Sequence {
            element: Box::new(element),
            bound,
        })
    }

    /// Parse `string`, `string<N>`, `wstring` or `wstring<N>`
    fn parse_string_type(&mut self) -> ParseResult<TypeSpec> {
        let wide = self.advance()?.kind == TokenKind::WString;
        let bound = if self.match_token(TokenKind::Lt)? {
            self.angle_depth += 1;
            let bound = self.parse_const_expr()?;
            self.angle_depth -= 1;
            self.expect_closing_angle("to close string bound")?;
            Some(bound)
        } else {
            None
        };
        Ok(TypeSpec::String { wide, bound })
    }

    /// Parse `fixed<digits, scale>`
    fn parse_fixed_type(&mut self) -> ParseResult<TypeSpec> {
        self.expect_token(TokenKind::Fixed, "to start fixed type")?;
        self.expect_token(TokenKind::Lt, "after 'fixed'")?;
        self.angle_depth += 1;

        let precision = self.parse_const_expr()?;
        self.expect_token(TokenKind::Comma, "after fixed precision")?;
        let scale = self.expect_token(TokenKind::Integer, "for fixed scale")?;

        self.angle_depth -= 1;
        self.expect_closing_angle("to close fixed type")?;
        Ok(TypeSpec::FixedPoint {
            precision,
            scale: ConstExpr::Literal(Literal::Integer(scale.value)),
        })
    }

    /// Parse `[::] ident (:: ident)*`
    pub(crate) fn parse_scoped_name(&mut self) -> ParseResult<ScopedName> {
        let absolute = self.match_token(TokenKind::Scope)?;
        let mut segments = vec![self.expect_identifier("in scoped name")?];
        while self.match_token(TokenKind::Scope)? {
            segments.push(self.expect_identifier("after '::'")?);
        }
        ScopedName::from_segments(&segments, absolute)
            .ok_or_else(|| self.error("Syntax error: empty scoped name"))
    }

    pub(crate) fn parse_scoped_name_list(&mut self) -> ParseResult<Vec<ScopedName>> {
        let mut names = vec![self.parse_scoped_name()?];
        while self.match_token(TokenKind::Comma)? {
            names.push(self.parse_scoped_name()?);
        }
        Ok(names)
    }

    pub(crate) fn parse_declarator_list(&mut self) -> ParseResult<Vec<Declarator>> {
        let mut declarators = vec![self.parse_declarator()?];
        while self.match_token(TokenKind::Comma)? {
            declarators.push(self.parse_declarator()?);
        }
        Ok(declarators)
    }

    pub(crate) fn parse_declarator(&mut self) -> ParseResult<Declarator> {
        let name = self.expect_identifier("in declarator")?;
        self.parse_declarator_rest(name)
    }

    /// Array dimensions following an already consumed declarator name.
    pub(crate) fn parse_declarator_rest(&mut self, name: String) -> ParseResult<Declarator> {
        let mut dimensions = Vec::new();
        while self.match_token(TokenKind::LBracket)? {
            if self.match_token(TokenKind::RBracket)? {
                dimensions.push(None);
                continue;
            }
            dimensions.push(Some(self.parse_const_expr()?));
            self.expect_token(TokenKind::RBracket, "after array size")?;
        }

        if dimensions.is_empty() {
            Ok(Declarator::Simple(name))
        } else {
            Ok(Declarator::Array(ArrayType { name, dimensions }))
        }
    }
}

/// Text of a quoted literal without its quotes.
pub(crate) fn unquote(text: &str) -> String {
    let mut chars = text.chars();
    chars.next();
    chars.next_back();
    chars.as_str().to_string()
}

fn strip_parens(text: &str) -> String {
    text.strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .unwrap_or(text)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Dialect;

    fn parser(source: &str) -> Parser {
        Parser::new(source, Dialect::OmgIdl)
    }

    #[test]
    fn test_base_types() {
        let cases = [
            ("long", "long"),
            ("long long", "long long"),
            ("long double", "long double"),
            ("unsigned short", "unsigned short"),
            ("unsigned long", "unsigned long"),
            ("unsigned long long", "unsigned long long"),
            ("wchar", "wchar"),
            ("Object", "Object"),
            ("TypeCode", "TypeCode"),
        ];
        for (source, name) in cases {
            assert_eq!(parser(source).parse_type_spec().unwrap(), TypeSpec::basic(name));
        }
        assert!(parser("unsigned char").parse_type_spec().is_err());
    }

    #[test]
    fn test_template_types() {
        let spec = parser("sequence<long, 10>").parse_type_spec().unwrap();
        assert!(matches!(spec, TypeSpec::Sequence { bound: Some(_), .. }));

        let spec = parser("wstring<8>").parse_type_spec().unwrap();
        assert!(matches!(spec, TypeSpec::String { wide: true, bound: Some(_) }));

        let spec = parser("string").parse_type_spec().unwrap();
        assert_eq!(spec, TypeSpec::String { wide: false, bound: None });

        let spec = parser("fixed<10, 2>").parse_type_spec().unwrap();
        assert!(matches!(spec, TypeSpec::FixedPoint { .. }));
    }

    #[test]
    fn test_nested_sequence_closing() {
        let mut p = parser("sequence<sequence<long>> x");
        let spec = p.parse_type_spec().unwrap();
        match spec {
            TypeSpec::Sequence { element, bound: None } => {
                assert!(matches!(*element, TypeSpec::Sequence { .. }))
            }
            other => panic!("Expected sequence, got {:?}", other),
        }
        assert_eq!(p.expect_identifier("in test").unwrap(), "x");

        let spec = parser("sequence<sequence<long, 4>>").parse_type_spec().unwrap();
        assert!(matches!(spec, TypeSpec::Sequence { .. }));
    }

    #[test]
    fn test_scoped_names() {
        let name = parser("a::b::c").parse_scoped_name().unwrap();
        assert_eq!(name.scope.depth(), 2);
        assert!(!name.is_absolute());

        let absolute = parser("::a::b").parse_scoped_name().unwrap();
        let relative = parser("a::b").parse_scoped_name().unwrap();
        assert!(absolute.is_absolute());
        assert_ne!(absolute, relative);
    }

    #[test]
    fn test_declarators() {
        let declarators = parser("a, b[2][], c").parse_declarator_list().unwrap();
        assert_eq!(declarators.len(), 3);
        match &declarators[1] {
            Declarator::Array(array) => {
                assert_eq!(array.name, "b");
                assert_eq!(array.dimensions.len(), 2);
                assert!(array.dimensions[1].is_none());
            }
            other => panic!("Expected array declarator, got {:?}", other),
        }
    }

    #[test]
    fn test_property_list() {
        let mut properties = Vec::new();
        parser("[in, uuid(1234-abcd), ref=Foo(x y), size=4, name=\"n\",]")
            .parse_property_list(&mut properties)
            .unwrap();

        assert_eq!(properties.len(), 5);
        assert_eq!(properties[0], Property { key: "in".to_string(), value: None });
        assert_eq!(
            properties[1].value,
            Some(PropertyValue::Args("1234-abcd".to_string()))
        );
        assert_eq!(
            properties[2].value,
            Some(PropertyValue::Call {
                name: "Foo".to_string(),
                args: "x y".to_string()
            })
        );
        assert_eq!(
            properties[3].value,
            Some(PropertyValue::Literal(Literal::Integer("4".to_string())))
        );
        assert_eq!(
            properties[4].value,
            Some(PropertyValue::Literal(Literal::String("n".to_string())))
        );
    }

    #[test]
    fn test_duplicate_property() {
        let mut properties = Vec::new();
        let err = parser("[a, b, a=1]")
            .parse_property_list(&mut properties)
            .unwrap_err();
        assert_eq!(err.message(), "Property `a' applied more than once");
    }

    #[test]
    fn test_modifiers_and_props() {
        let prefix = parser("[p] oneway [q=1] readonly void")
            .parse_modifiers_and_props()
            .unwrap();
        assert_eq!(prefix.modifiers, vec![Modifier::Oneway, Modifier::Readonly]);
        assert_eq!(prefix.properties.len(), 2);

        let err = parser("oneway oneway void")
            .parse_modifiers_and_props()
            .unwrap_err();
        assert_eq!(err.message(), "Duplicate `oneway' modifier");
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"abc\""), "abc");
        assert_eq!(unquote("'x'"), "x");
    }
}
