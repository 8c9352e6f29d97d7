//! Interface member parsing
//!
//! - Attributes: `[readonly] attribute [props] Type[?] a [getter raises(E)] [setter raises(E)], b`
//! - Operations: `[oneway] Type name(params) [raises(E, F)] [context("a", "b")]`
//! - Parameters: direction attributes, `optional` with default values,
//!   property lists and a trailing vararg marker
//!
//! # Grammar
//!
//! ```text
//! parameter_decls ::= "(" ")"
//!                   | "(" varargs ")"
//!                   | "(" param ("," param)* ["," varargs] ")"
//!                   | "(" param_attrs param_type "..." ident ")"   // ident is dropped
//! param           ::= param_attrs param_type ident ["=" const_exp]
//! param_attrs     ::= ("in" | "out" | "inout" | "optional" | "[" props "]")*
//! varargs         ::= "..." | "varargs"
//! ```

use crate::parser::ast::*;
use crate::parser::lexer::TokenKind;
use crate::parser::parse::{ParseResult, Parser, Prefix};
use crate::parser::types::unquote;
use tracing::trace;

/// Direction attributes and properties collected ahead of a parameter.
#[derive(Debug, Default)]
struct ParamAttributes {
    directions: Vec<Direction>,
    properties: Vec<Property>,
}

/// A declared parameter, or the typed vararg that ends the list.
enum ParamDecl {
    Named(Parameter),
    Varargs(Parameter),
}

impl Parser {
    /// Parse `attribute [props] Type[?] declarators`
    pub(crate) fn parse_attribute(&mut self, prefix: Prefix) -> ParseResult<AttrDef> {
        self.expect_token(TokenKind::Attribute, "to start attribute")?;

        let mut properties = prefix.properties;
        if self.check(TokenKind::LBracket)? {
            self.parse_property_list(&mut properties)?;
        }

        let type_spec = self.parse_param_type_spec()?;
        let nullable = self.match_token(TokenKind::Question)?;

        let mut declarators = vec![self.parse_attr_declarator()?];
        while self.match_token(TokenKind::Comma)? {
            declarators.push(self.parse_attr_declarator()?);
        }

        Ok(AttrDef {
            type_spec,
            readonly: prefix.modifiers.contains(&Modifier::Readonly),
            nullable,
            declarators,
            properties,
        })
    }

    /// `name` followed by any number of `getter raises(...)` and
    /// `setter raises(...)` clauses. `getter` and `setter` are not keywords.
    fn parse_attr_declarator(&mut self) -> ParseResult<AttrDeclarator> {
        let name = self.expect_identifier("for attribute name")?;
        let mut declarator = AttrDeclarator {
            name,
            getter_raises: Vec::new(),
            setter_raises: Vec::new(),
        };

        loop {
            let raises = if self.check_word("getter")? {
                &mut declarator.getter_raises
            } else if self.check_word("setter")? {
                &mut declarator.setter_raises
            } else {
                break;
            };
            self.advance()?;
            self.expect_token(TokenKind::Raises, "after 'getter' or 'setter'")?;
            raises.extend(self.parse_raises_list()?);
        }

        Ok(declarator)
    }

    /// Parse `(Type | void) name(params) [raises(...)] [context(...)]`
    pub(crate) fn parse_operation(&mut self, prefix: Prefix) -> ParseResult<OperationDef> {
        let return_type = if self.match_token(TokenKind::Void)? {
            TypeSpec::basic("void")
        } else {
            self.parse_param_type_spec()?
        };
        let name = self.expect_identifier("for operation name")?;
        self.parse_operation_rest(prefix, return_type, name)
    }

    /// Everything after the operation name.
    pub(crate) fn parse_operation_rest(
        &mut self,
        prefix: Prefix,
        return_type: TypeSpec,
        name: String,
    ) -> ParseResult<OperationDef> {
        let parameters = self.parse_parameter_decls()?;

        let raises = if self.match_token(TokenKind::Raises)? {
            Some(self.parse_raises_list()?)
        } else {
            None
        };
        let context = if self.match_token(TokenKind::Context)? {
            Some(self.parse_context_list()?)
        } else {
            None
        };

        trace!(operation = %name, parameters = parameters.items.len(), "parsed operation");
        Ok(OperationDef {
            name,
            return_type,
            parameters,
            raises,
            modifiers: prefix.modifiers,
            context,
            properties: prefix.properties,
        })
    }

    /// Types usable for parameters, attributes and return values.
    fn parse_param_type_spec(&mut self) -> ParseResult<TypeSpec> {
        if !self.check(TokenKind::Struct)? && !self.check(TokenKind::Union)? && !self.check(TokenKind::Enum)? {
            let type_spec = self.parse_simple_type_spec()?;
            self.check_param_type(&type_spec)?;
            return Ok(type_spec);
        }
        Err(self.unexpected("expected a parameter type"))
    }

    pub(crate) fn check_param_type(&self, type_spec: &TypeSpec) -> ParseResult<()> {
        match type_spec {
            TypeSpec::Sequence { .. } => Err(self.error(format!(
                "Illegal type specified for parameter or attribute: {}",
                type_spec
            ))),
            _ => Ok(()),
        }
    }

    /// Parse `( ... )` after an operation name
    fn parse_parameter_decls(&mut self) -> ParseResult<Parameters> {
        self.expect_token(TokenKind::LParen, "before parameters")?;
        let mut parameters = Parameters::default();
        if self.match_token(TokenKind::RParen)? {
            return Ok(parameters);
        }

        loop {
            if self.match_token(TokenKind::Ellipsis)? || self.match_token(TokenKind::Varargs)? {
                parameters.varargs = Some(Parameter::untyped_varargs());
                self.expect_token(TokenKind::RParen, "after variable arguments")?;
                return Ok(parameters);
            }

            match self.parse_parameter()? {
                ParamDecl::Named(parameter) => parameters.items.push(parameter),
                ParamDecl::Varargs(parameter) => {
                    if !parameters.items.is_empty() {
                        return Err(self.error("Typed variable arguments must be the only parameter"));
                    }
                    parameters.varargs = Some(parameter);
                    self.expect_token(TokenKind::RParen, "after variable arguments")?;
                    return Ok(parameters);
                }
            }

            if !self.match_token(TokenKind::Comma)? {
                break;
            }
        }

        self.expect_token(TokenKind::RParen, "after parameters")?;
        Ok(parameters)
    }

    fn parse_parameter(&mut self) -> ParseResult<ParamDecl> {
        let attributes = self.parse_param_attributes()?;
        let (type_spec, nullable) = if self.match_token(TokenKind::Void)? {
            (TypeSpec::basic("void"), false)
        } else {
            let type_spec = self.parse_param_type_spec()?;
            (type_spec, self.match_token(TokenKind::Question)?)
        };

        if self.match_token(TokenKind::Ellipsis)? {
            if !attributes.directions.is_empty() && attributes.directions != [Direction::In] {
                return Err(self.error("`out' direction specified for a typed variable argument"));
            }
            // The declared name is not kept.
            self.expect_identifier("after '...'")?;
            return Ok(ParamDecl::Varargs(Parameter {
                name: VARARGS_NAME.to_string(),
                type_spec,
                nullable,
                directions: vec![Direction::In],
                default_value: None,
                properties: attributes.properties,
            }));
        }

        let name = self.expect_identifier("for parameter name")?;
        let default_value = if self.match_token(TokenKind::Equal)? {
            Some(self.parse_const_expr()?)
        } else {
            None
        };

        let optional = attributes.directions.contains(&Direction::Optional);
        let has_direction = attributes
            .directions
            .iter()
            .any(|d| matches!(d, Direction::In | Direction::Out));
        if !has_direction && !self.webidl() {
            return Err(self.error("Missing direction attribute"));
        }
        if !optional && default_value.is_some() {
            return Err(self.error("Default value present for non-optional parameter"));
        }

        Ok(ParamDecl::Named(Parameter {
            name,
            type_spec,
            nullable,
            directions: attributes.directions,
            default_value,
            properties: attributes.properties,
        }))
    }

    /// `in`, `out`, `inout`, `optional` and property lists, in any order.
    fn parse_param_attributes(&mut self) -> ParseResult<ParamAttributes> {
        let mut attributes = ParamAttributes::default();
        loop {
            let directions: &[Direction] = match self.peek_kind()? {
                Some(TokenKind::In) => &[Direction::In],
                Some(TokenKind::Out) => &[Direction::Out],
                Some(TokenKind::InOut) => &[Direction::In, Direction::Out],
                Some(TokenKind::Optional) => &[Direction::Optional],
                Some(TokenKind::LBracket) => {
                    self.parse_property_list(&mut attributes.properties)?;
                    continue;
                }
                _ => return Ok(attributes),
            };
            for direction in directions {
                if attributes.directions.contains(direction) {
                    return Err(self.error(format!("Duplicate parameter attribute `{}'", direction)));
                }
                attributes.directions.push(*direction);
            }
            self.advance()?;
        }
    }

    /// Parse `( Name, ... )` after `raises`
    fn parse_raises_list(&mut self) -> ParseResult<Vec<ScopedName>> {
        self.expect_token(TokenKind::LParen, "after 'raises'")?;
        let names = self.parse_scoped_name_list()?;
        self.expect_token(TokenKind::RParen, "after raises list")?;
        Ok(names)
    }

    /// Parse `( "a", "b" "c" )` after `context`; adjacent literals are joined.
    fn parse_context_list(&mut self) -> ParseResult<Vec<String>> {
        self.expect_token(TokenKind::LParen, "after 'context'")?;
        let mut items = Vec::new();
        loop {
            let first = self.expect_token(TokenKind::DqString, "in context list")?;
            let mut item = unquote(&first.value);
            while self.check(TokenKind::DqString)? {
                item.push_str(&unquote(&self.advance()?.value));
            }
            items.push(item);
            if !self.match_token(TokenKind::Comma)? {
                break;
            }
        }
        self.expect_token(TokenKind::RParen, "after context list")?;
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Dialect;

    fn body(source: &str, dialect: Dialect) -> Result<Vec<Definition>, crate::Error> {
        let source = format!("interface I {{ {} }};", source);
        let mut spec = Parser::new(&source, dialect).parse_specification()?;
        match spec.definitions.remove(0) {
            Definition::Interface(interface) => Ok(interface.body.unwrap_or_default()),
            other => panic!("Expected interface, got {:?}", other),
        }
    }

    fn operation(source: &str, dialect: Dialect) -> OperationDef {
        match body(source, dialect).unwrap().remove(0) {
            Definition::Operation(op) => op,
            other => panic!("Expected operation, got {:?}", other),
        }
    }

    fn error(source: &str, dialect: Dialect) -> String {
        body(source, dialect).unwrap_err().message()
    }

    #[test]
    fn test_attribute() {
        let definitions = body(
            "readonly attribute [p] string name getter raises(E1) setter raises(E2, E3), alias;",
            Dialect::OmgIdl,
        )
        .unwrap();
        match &definitions[0] {
            Definition::Attribute(attr) => {
                assert!(attr.readonly);
                assert!(!attr.nullable);
                assert_eq!(attr.properties.len(), 1);
                assert_eq!(attr.declarators.len(), 2);
                assert_eq!(attr.declarators[0].getter_raises.len(), 1);
                assert_eq!(attr.declarators[0].setter_raises.len(), 2);
                assert!(attr.declarators[1].getter_raises.is_empty());
            }
            other => panic!("Expected attribute, got {:?}", other),
        }
    }

    #[test]
    fn test_oneway_attribute_accepted() {
        match &body("oneway attribute long a;", Dialect::OmgIdl).unwrap()[0] {
            Definition::Attribute(attr) => {
                assert!(!attr.readonly);
                assert_eq!(attr.declarators.len(), 1);
            }
            other => panic!("Expected attribute, got {:?}", other),
        }
    }

    #[test]
    fn test_nullable_attribute() {
        match &body("attribute Node? next;", Dialect::WebIdl).unwrap()[0] {
            Definition::Attribute(attr) => {
                assert!(attr.nullable);
                assert!(!attr.readonly);
            }
            other => panic!("Expected attribute, got {:?}", other),
        }
    }

    #[test]
    fn test_sequence_attribute_rejected() {
        let message = error("attribute sequence<long> values;", Dialect::OmgIdl);
        assert!(message.starts_with("Illegal type specified for parameter or attribute"));

        let message = error("void f(in sequence<long> values);", Dialect::OmgIdl);
        assert!(message.starts_with("Illegal type specified for parameter or attribute"));
    }

    #[test]
    fn test_operation() {
        let op = operation(
            "oneway long f(in long a, out string b, inout T c) raises(E) context(\"x\", \"y\" \"z\");",
            Dialect::OmgIdl,
        );
        assert_eq!(op.name, "f");
        assert_eq!(op.return_type, TypeSpec::basic("long"));
        assert_eq!(op.modifiers, vec![Modifier::Oneway]);
        assert_eq!(op.parameters.items.len(), 3);
        assert_eq!(op.parameters.items[2].directions, vec![Direction::In, Direction::Out]);
        assert_eq!(op.raises.as_ref().map(Vec::len), Some(1));
        assert_eq!(op.context, Some(vec!["x".to_string(), "yz".to_string()]));
        assert!(op.parameters.varargs.is_none());
    }

    #[test]
    fn test_untyped_varargs() {
        let op = operation("void f(in long x, ...);", Dialect::OmgIdl);
        assert_eq!(op.parameters.items.len(), 1);
        assert_eq!(op.parameters.varargs, Some(Parameter::untyped_varargs()));
        assert!(op.parameters.items.iter().all(|p| p.name != VARARGS_NAME));

        let op = operation("void g(varargs);", Dialect::OmgIdl);
        assert!(op.parameters.items.is_empty());
        assert!(op.parameters.varargs.is_some());
    }

    #[test]
    fn test_typed_varargs() {
        let op = operation("void f(in long ... rest);", Dialect::OmgIdl);
        let varargs = op.parameters.varargs.unwrap();
        assert_eq!(varargs.name, VARARGS_NAME);
        assert_eq!(varargs.type_spec, TypeSpec::basic("long"));
        assert_eq!(varargs.directions, vec![Direction::In]);
        assert!(op.parameters.items.is_empty());

        let op = operation("void f(any ... rest);", Dialect::OmgIdl);
        assert!(op.parameters.varargs.is_some());

        let message = error("void f(in long x, in long ... rest);", Dialect::OmgIdl);
        assert_eq!(message, "Typed variable arguments must be the only parameter");

        let message = error("void f(out long ... rest);", Dialect::OmgIdl);
        assert_eq!(message, "`out' direction specified for a typed variable argument");
    }

    #[test]
    fn test_varargs_must_be_last() {
        assert!(body("void f(..., in long x);", Dialect::OmgIdl).is_err());
    }

    #[test]
    fn test_missing_direction() {
        assert_eq!(error("void f(long x);", Dialect::OmgIdl), "Missing direction attribute");

        let op = operation("void f(long x);", Dialect::WebIdl);
        assert!(op.parameters.items[0].directions.is_empty());
    }

    #[test]
    fn test_duplicate_parameter_attribute() {
        assert_eq!(
            error("void f(in inout long x);", Dialect::OmgIdl),
            "Duplicate parameter attribute `in'"
        );
    }

    #[test]
    fn test_optional_with_default() {
        let op = operation("void f(optional long x = 5);", Dialect::WebIdl);
        let param = &op.parameters.items[0];
        assert!(param.is_optional());
        assert!(param.default_value.is_some());
    }

    #[test]
    fn test_default_without_optional() {
        assert_eq!(
            error("void f(in long x = 5);", Dialect::OmgIdl),
            "Default value present for non-optional parameter"
        );
        assert_eq!(
            error("void f(in long x = 5);", Dialect::WebIdl),
            "Default value present for non-optional parameter"
        );
        // Direction is checked first outside WebIDL
        assert_eq!(error("void f(long x = 5);", Dialect::OmgIdl), "Missing direction attribute");
    }

    #[test]
    fn test_optional_is_webidl_only() {
        assert!(body("void f(optional long x);", Dialect::OmgIdl).is_err());
    }

    #[test]
    fn test_parameter_properties() {
        let op = operation("void f([ref] in [size=4] long x);", Dialect::OmgIdl);
        assert_eq!(op.parameters.items[0].properties.len(), 2);

        let message = error("void f([ref] in [ref] long x);", Dialect::OmgIdl);
        assert_eq!(message, "Property `ref' applied more than once");
    }
}
