//! Visitor pattern for walking a parsed [`Specification`].
//!
//! [`NodeVisitor`] has one method per node kind and no default bodies, so an
//! implementation that misses a hook is rejected at compile time. Container
//! kinds get a `visit_*`/`depart_*` pair around their children; leaf kinds
//! get a single `visit_*`.
//!
//! [`walk`] drives a visitor depth-first, pre-order, in source order.
//! Exceptions and code fragments have no hooks and are passed over.

use crate::parser::ast::*;

/// Callbacks for every visitable node kind.
///
/// Returning an error from any callback stops the walk and is passed back
/// from [`walk`].
pub trait NodeVisitor {
    type Error;

    fn visit_specification(&mut self, node: &Specification) -> Result<(), Self::Error>;
    fn depart_specification(&mut self, node: &Specification) -> Result<(), Self::Error>;

    fn visit_module(&mut self, node: &Module) -> Result<(), Self::Error>;
    fn depart_module(&mut self, node: &Module) -> Result<(), Self::Error>;

    /// Called for forward declarations too, with no children in between.
    fn visit_interface(&mut self, node: &Interface) -> Result<(), Self::Error>;
    fn depart_interface(&mut self, node: &Interface) -> Result<(), Self::Error>;

    fn visit_value_type(&mut self, node: &ValueType) -> Result<(), Self::Error>;
    fn depart_value_type(&mut self, node: &ValueType) -> Result<(), Self::Error>;

    fn visit_struct(&mut self, node: &StructDef) -> Result<(), Self::Error>;
    fn depart_struct(&mut self, node: &StructDef) -> Result<(), Self::Error>;

    fn visit_enum(&mut self, node: &EnumDef) -> Result<(), Self::Error>;
    fn depart_enum(&mut self, node: &EnumDef) -> Result<(), Self::Error>;

    fn visit_union(&mut self, node: &UnionDef) -> Result<(), Self::Error>;
    fn depart_union(&mut self, node: &UnionDef) -> Result<(), Self::Error>;

    fn visit_type_def(&mut self, node: &TypeDef) -> Result<(), Self::Error>;
    fn visit_native_decl(&mut self, node: &NativeDecl) -> Result<(), Self::Error>;
    fn visit_attr_def(&mut self, node: &AttrDef) -> Result<(), Self::Error>;
    fn visit_operation_def(&mut self, node: &OperationDef) -> Result<(), Self::Error>;
    fn visit_field_def(&mut self, node: &FieldDef) -> Result<(), Self::Error>;
    fn visit_const_decl(&mut self, node: &ConstDecl) -> Result<(), Self::Error>;
}

/// Walk a whole specification.
pub fn walk<V: NodeVisitor + ?Sized>(visitor: &mut V, spec: &Specification) -> Result<(), V::Error> {
    visitor.visit_specification(spec)?;
    walk_definitions(visitor, &spec.definitions)?;
    visitor.depart_specification(spec)
}

/// Walk a sequence of sibling definitions.
pub fn walk_definitions<V: NodeVisitor + ?Sized>(
    visitor: &mut V,
    definitions: &[Definition],
) -> Result<(), V::Error> {
    for definition in definitions {
        walk_definition(visitor, definition)?;
    }
    Ok(())
}

/// Walk one definition and its children.
pub fn walk_definition<V: NodeVisitor + ?Sized>(
    visitor: &mut V,
    definition: &Definition,
) -> Result<(), V::Error> {
    match definition {
        Definition::Module(module) => {
            visitor.visit_module(module)?;
            walk_definitions(visitor, &module.definitions)?;
            visitor.depart_module(module)
        }
        Definition::Interface(interface) => {
            visitor.visit_interface(interface)?;
            if let Some(body) = &interface.body {
                walk_definitions(visitor, body)?;
            }
            visitor.depart_interface(interface)
        }
        Definition::ValueType(value_type) => {
            visitor.visit_value_type(value_type)?;
            if let Some(body) = &value_type.body {
                walk_definitions(visitor, body)?;
            }
            visitor.depart_value_type(value_type)
        }
        Definition::Struct(struct_def) => {
            visitor.visit_struct(struct_def)?;
            for member in &struct_def.members {
                visitor.visit_field_def(member)?;
            }
            visitor.depart_struct(struct_def)
        }
        // Enumerators are plain names
        Definition::Enum(enum_def) => {
            visitor.visit_enum(enum_def)?;
            visitor.depart_enum(enum_def)
        }
        Definition::Union(union_def) => {
            visitor.visit_union(union_def)?;
            for case in &union_def.cases {
                visitor.visit_field_def(&case.element)?;
            }
            visitor.depart_union(union_def)
        }
        Definition::TypeDef(node) => visitor.visit_type_def(node),
        Definition::Native(node) => visitor.visit_native_decl(node),
        Definition::Attribute(node) => visitor.visit_attr_def(node),
        Definition::Operation(node) => visitor.visit_operation_def(node),
        Definition::Field(node) => visitor.visit_field_def(node),
        Definition::Const(node) => visitor.visit_const_decl(node),
        Definition::Exception(_) | Definition::CodeFragment(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Dialect;
    use crate::parser::parse::Parser;

    /// Records one line per callback.
    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl Recorder {
        fn push(&mut self, event: String) -> Result<(), String> {
            self.events.push(event);
            Ok(())
        }
    }

    impl NodeVisitor for Recorder {
        type Error = String;

        fn visit_specification(&mut self, _: &Specification) -> Result<(), String> {
            self.push("+spec".into())
        }
        fn depart_specification(&mut self, _: &Specification) -> Result<(), String> {
            self.push("-spec".into())
        }
        fn visit_module(&mut self, node: &Module) -> Result<(), String> {
            self.push(format!("+module {}", node.name))
        }
        fn depart_module(&mut self, node: &Module) -> Result<(), String> {
            self.push(format!("-module {}", node.name))
        }
        fn visit_interface(&mut self, node: &Interface) -> Result<(), String> {
            self.push(format!("+interface {}", node.name))
        }
        fn depart_interface(&mut self, node: &Interface) -> Result<(), String> {
            self.push(format!("-interface {}", node.name))
        }
        fn visit_value_type(&mut self, _: &ValueType) -> Result<(), String> {
            self.push("+valuetype".into())
        }
        fn depart_value_type(&mut self, _: &ValueType) -> Result<(), String> {
            self.push("-valuetype".into())
        }
        fn visit_struct(&mut self, _: &StructDef) -> Result<(), String> {
            self.push("+struct".into())
        }
        fn depart_struct(&mut self, _: &StructDef) -> Result<(), String> {
            self.push("-struct".into())
        }
        fn visit_enum(&mut self, _: &EnumDef) -> Result<(), String> {
            self.push("+enum".into())
        }
        fn depart_enum(&mut self, _: &EnumDef) -> Result<(), String> {
            self.push("-enum".into())
        }
        fn visit_union(&mut self, _: &UnionDef) -> Result<(), String> {
            self.push("+union".into())
        }
        fn depart_union(&mut self, _: &UnionDef) -> Result<(), String> {
            self.push("-union".into())
        }
        fn visit_type_def(&mut self, _: &TypeDef) -> Result<(), String> {
            self.push("typedef".into())
        }
        fn visit_native_decl(&mut self, _: &NativeDecl) -> Result<(), String> {
            self.push("native".into())
        }
        fn visit_attr_def(&mut self, _: &AttrDef) -> Result<(), String> {
            self.push("attribute".into())
        }
        fn visit_operation_def(&mut self, node: &OperationDef) -> Result<(), String> {
            if node.name == "fail" {
                return Err("stop".into());
            }
            self.push(format!("operation {}", node.name))
        }
        fn visit_field_def(&mut self, _: &FieldDef) -> Result<(), String> {
            self.push("field".into())
        }
        fn visit_const_decl(&mut self, _: &ConstDecl) -> Result<(), String> {
            self.push("const".into())
        }
    }

    fn record(source: &str) -> Result<Vec<String>, String> {
        let spec = Parser::new(source, Dialect::OmgIdl)
            .parse_specification()
            .unwrap();
        let mut recorder = Recorder::default();
        walk(&mut recorder, &spec)?;
        Ok(recorder.events)
    }

    #[test]
    fn test_pre_order_pairs() {
        let events = record("module M { interface I { void f(); attribute long a; }; const long C = 1; };")
            .unwrap();
        assert_eq!(
            events,
            vec![
                "+spec",
                "+module M",
                "+interface I",
                "operation f",
                "attribute",
                "-interface I",
                "const",
                "-module M",
                "-spec",
            ]
        );
    }

    #[test]
    fn test_forward_interface_has_no_children() {
        let events = record("interface F;").unwrap();
        assert_eq!(events, vec!["+spec", "+interface F", "-interface F", "-spec"]);
    }

    #[test]
    fn test_members_and_skipped_kinds() {
        let source = "struct S { long a; short b; };\n\
                      enum E { x, y };\n\
                      union U switch (long) { case 1: long v; default: short w; };\n\
                      exception X { long code; };\n\
                      %{ fragment %}\n\
                      typedef long T;\n\
                      native N;";
        let events = record(source).unwrap();
        assert_eq!(
            events,
            vec![
                "+spec", "+struct", "field", "field", "-struct", "+enum", "-enum", "+union",
                "field", "field", "-union", "typedef", "native", "-spec",
            ]
        );
    }

    #[test]
    fn test_error_stops_walk() {
        let result = record("interface I { void fail(); void after(); };");
        assert_eq!(result, Err("stop".to_string()));
    }
}
