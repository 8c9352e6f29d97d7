//! AST (Abstract Syntax Tree) definitions for IDL specifications
//!
//! Nodes are plain data with public fields; [`crate::parser::visitor`] walks them.

use std::fmt;

/// Root of a parsed source: its top-level definitions in source order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Specification {
    pub definitions: Vec<Definition>,
}

impl Specification {
    pub fn new(definitions: Vec<Definition>) -> Self {
        Specification { definitions }
    }
}

/// Anything that can appear in a specification, module or body.
#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    Module(Module),
    Interface(Interface),
    ValueType(ValueType),
    Struct(StructDef),
    Union(UnionDef),
    Enum(EnumDef),
    TypeDef(TypeDef),
    Native(NativeDecl),
    Exception(ExceptionDecl),
    Const(ConstDecl),
    Attribute(AttrDef),
    Operation(OperationDef),
    Field(FieldDef),
    /// Raw text of a `%{ ... %}` block.
    CodeFragment(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    /// Qualified with the pending `#pragma prefix`, if any.
    pub name: String,
    pub definitions: Vec<Definition>,
}

/// `interface NAME [: supers] { body }` or the forward form `interface NAME;`.
///
/// A forward declaration has neither supers nor body. A defined interface
/// always has both, possibly empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Interface {
    pub name: String,
    pub properties: Vec<Property>,
    pub supers: Option<Vec<ScopedName>>,
    pub body: Option<Vec<Definition>>,
}

impl Interface {
    pub fn is_forward(&self) -> bool {
        self.body.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueType {
    pub name: Option<String>,
    pub properties: Vec<Property>,
    pub inheritance: Option<TypeSpec>,
    pub body: Option<Vec<Definition>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDef {
    pub name: Option<String>,
    pub properties: Vec<Property>,
    pub members: Vec<FieldDef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDef {
    pub name: Option<String>,
    pub properties: Vec<Property>,
    pub enumerators: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionDef {
    pub name: Option<String>,
    pub properties: Vec<Property>,
    pub switch_type: TypeSpec,
    pub cases: Vec<UnionCase>,
}

/// One `case ...: element;` arm of a union.
#[derive(Debug, Clone, PartialEq)]
pub struct UnionCase {
    pub labels: Vec<CaseLabel>,
    pub element: FieldDef,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaseLabel {
    Case(ConstExpr),
    Default,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDef {
    pub type_spec: TypeSpec,
    pub declarators: Vec<Declarator>,
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NativeDecl {
    pub name: String,
    /// Raw text between the parentheses of `native NAME (...)`.
    pub native_type: Option<String>,
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionDecl {
    pub name: String,
    pub members: Vec<FieldDef>,
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstDecl {
    pub name: String,
    pub const_type: TypeSpec,
    pub value: ConstExpr,
    pub properties: Vec<Property>,
}

/// Struct, exception, union or valuetype state member.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub type_spec: TypeSpec,
    pub declarators: Vec<Declarator>,
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttrDef {
    pub type_spec: TypeSpec,
    pub readonly: bool,
    pub nullable: bool,
    pub declarators: Vec<AttrDeclarator>,
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttrDeclarator {
    pub name: String,
    pub getter_raises: Vec<ScopedName>,
    pub setter_raises: Vec<ScopedName>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Oneway,
    Readonly,
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modifier::Oneway => write!(f, "oneway"),
            Modifier::Readonly => write!(f, "readonly"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationDef {
    pub name: String,
    pub return_type: TypeSpec,
    pub parameters: Parameters,
    pub raises: Option<Vec<ScopedName>>,
    pub modifiers: Vec<Modifier>,
    /// String literals of `context(...)`, quotes removed.
    pub context: Option<Vec<String>>,
    pub properties: Vec<Property>,
}

/// Named parameters plus the vararg slot, which is never one of `items`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Parameters {
    pub items: Vec<Parameter>,
    pub varargs: Option<Parameter>,
}

/// Name used for an untyped `...` / `varargs` marker.
pub const VARARGS_NAME: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
    Optional,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::In => write!(f, "in"),
            Direction::Out => write!(f, "out"),
            Direction::Optional => write!(f, "optional"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub type_spec: TypeSpec,
    pub nullable: bool,
    /// `inout` is stored as `[In, Out]`.
    pub directions: Vec<Direction>,
    pub default_value: Option<ConstExpr>,
    pub properties: Vec<Property>,
}

impl Parameter {
    /// The sentinel for an untyped vararg marker.
    pub fn untyped_varargs() -> Self {
        Parameter {
            name: VARARGS_NAME.to_string(),
            type_spec: TypeSpec::basic("any"),
            nullable: false,
            directions: vec![Direction::In],
            default_value: None,
            properties: Vec::new(),
        }
    }

    pub fn is_optional(&self) -> bool {
        self.directions.contains(&Direction::Optional)
    }
}

/// Type references
#[derive(Debug, Clone, PartialEq)]
pub enum TypeSpec {
    /// Primitive type by name: `long`, `unsigned long long`, `boolean`, ...
    Basic(BasicType),
    Reference(ScopedName),
    FixedPoint {
        precision: ConstExpr,
        scale: ConstExpr,
    },
    Sequence {
        element: Box<TypeSpec>,
        bound: Option<ConstExpr>,
    },
    String {
        wide: bool,
        bound: Option<ConstExpr>,
    },
    Struct(Box<StructDef>),
    Union(Box<UnionDef>),
    Enum(Box<EnumDef>),
}

impl TypeSpec {
    pub fn basic(name: &str) -> Self {
        TypeSpec::Basic(BasicType {
            name: name.to_string(),
        })
    }
}

impl fmt::Display for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSpec::Basic(basic) => write!(f, "{}", basic.name),
            TypeSpec::Reference(name) => write!(f, "{}", name),
            TypeSpec::FixedPoint { .. } => write!(f, "fixed<>"),
            TypeSpec::Sequence { element, .. } => write!(f, "sequence<{}>", element),
            TypeSpec::String { wide: false, .. } => write!(f, "string"),
            TypeSpec::String { wide: true, .. } => write!(f, "wstring"),
            TypeSpec::Struct(s) => write!(f, "struct {}", s.name.as_deref().unwrap_or("<anonymous>")),
            TypeSpec::Union(u) => write!(f, "union {}", u.name.as_deref().unwrap_or("<anonymous>")),
            TypeSpec::Enum(e) => write!(f, "enum {}", e.name.as_deref().unwrap_or("<anonymous>")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicType {
    pub name: String,
}

/// A simple name or an array name with its dimensions (`None` for `[]`).
#[derive(Debug, Clone, PartialEq)]
pub enum Declarator {
    Simple(String),
    Array(ArrayType),
}

impl Declarator {
    pub fn name(&self) -> &str {
        match self {
            Declarator::Simple(name) => name,
            Declarator::Array(array) => &array.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayType {
    pub name: String,
    pub dimensions: Vec<Option<ConstExpr>>,
}

/// A possibly qualified name: the last segment plus the scope chain
/// leading to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedName {
    pub name: String,
    pub scope: Scope,
}

impl ScopedName {
    /// Build from segments; `absolute` for a leading `::`.
    pub fn from_segments(segments: &[String], absolute: bool) -> Option<Self> {
        let (name, qualifiers) = segments.split_last()?;
        let mut scope = if absolute { Scope::Root } else { Scope::Current };
        for qualifier in qualifiers {
            scope = Scope::Namespace {
                name: qualifier.clone(),
                parent: Box::new(scope),
            };
        }
        Some(ScopedName {
            name: name.clone(),
            scope,
        })
    }

    pub fn is_absolute(&self) -> bool {
        self.scope.is_absolute()
    }
}

impl fmt::Display for ScopedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.scope)?;
        if !matches!(self.scope, Scope::Current) {
            write!(f, "::")?;
        }
        write!(f, "{}", self.name)
    }
}

/// Scope chain of a [`ScopedName`], innermost link first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Relative lookup from the current scope.
    Current,
    /// The global scope named by a leading `::`.
    Root,
    Namespace { name: String, parent: Box<Scope> },
}

impl Scope {
    /// Number of qualifying segments.
    pub fn depth(&self) -> usize {
        match self {
            Scope::Current | Scope::Root => 0,
            Scope::Namespace { parent, .. } => 1 + parent.depth(),
        }
    }

    pub fn is_absolute(&self) -> bool {
        match self {
            Scope::Current => false,
            Scope::Root => true,
            Scope::Namespace { parent, .. } => parent.is_absolute(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Current | Scope::Root => Ok(()),
            Scope::Namespace { name, parent } => {
                write!(f, "{}", parent)?;
                if !matches!(**parent, Scope::Current) {
                    write!(f, "::")?;
                }
                write!(f, "{}", name)
            }
        }
    }
}

/// Literal values, kept as written (string and char literals without quotes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Integer(String),
    Float(String),
    FixedPoint(String),
    String(String),
    Char(String),
    Boolean(bool),
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Or,
    Xor,
    And,
    Shl,
    Shr,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Negate, // -x
    Plus,   // +x
    Invert, // ~x
}

/// Constant expressions
#[derive(Debug, Clone, PartialEq)]
pub enum ConstExpr {
    Literal(Literal),
    Name(ScopedName),
    Binary {
        op: BinOp,
        lhs: Box<ConstExpr>,
        rhs: Box<ConstExpr>,
    },
    Unary {
        op: UnOp,
        operand: Box<ConstExpr>,
    },
    /// Adjacent string literals.
    Concat(Box<ConstExpr>, Box<ConstExpr>),
}

/// `[key]`, `[key=value]` or `[key(args)]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub key: String,
    pub value: Option<PropertyValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// `key(args)`: the raw text between the parentheses.
    Args(String),
    Ident(String),
    /// `key=name(args)`
    Call { name: String, args: String },
    Literal(Literal),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segments(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_scope_depth() {
        let relative = ScopedName::from_segments(&segments(&["a", "b", "c"]), false).unwrap();
        assert_eq!(relative.name, "c");
        assert_eq!(relative.scope.depth(), 2);
        assert!(!relative.is_absolute());

        let absolute = ScopedName::from_segments(&segments(&["a", "b"]), true).unwrap();
        assert_eq!(absolute.scope.depth(), 1);
        assert!(absolute.is_absolute());

        let relative_ab = ScopedName::from_segments(&segments(&["a", "b"]), false).unwrap();
        assert_ne!(absolute, relative_ab);
    }

    #[test]
    fn test_scoped_name_display() {
        let name = ScopedName::from_segments(&segments(&["a", "b"]), false).unwrap();
        assert_eq!(name.to_string(), "a::b");
        let name = ScopedName::from_segments(&segments(&["a", "b"]), true).unwrap();
        assert_eq!(name.to_string(), "::a::b");
        let name = ScopedName::from_segments(&segments(&["x"]), true).unwrap();
        assert_eq!(name.to_string(), "::x");
    }

    #[test]
    fn test_empty_segments() {
        assert!(ScopedName::from_segments(&[], false).is_none());
    }

    #[test]
    fn test_untyped_varargs() {
        let varargs = Parameter::untyped_varargs();
        assert_eq!(varargs.name, VARARGS_NAME);
        assert_eq!(varargs.type_spec, TypeSpec::basic("any"));
        assert_eq!(varargs.directions, vec![Direction::In]);
    }
}
