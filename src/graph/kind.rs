//! Block variants and the port names they expose.

use std::fmt;

use crate::types::{Type, TypeScheme, TypeVar};

pub const BODY: &str = "BODY";
pub const FUNC: &str = "FUNC";
pub const ARG: &str = "ARG";
pub const VALUE: &str = "VALUE";
pub const DO: &str = "DO";
pub const SCRUTINEE: &str = "SCRUTINEE";
pub const RETURN: &str = "RETURN";

pub fn arg_port(index: usize) -> String {
    format!("ARG{}", index)
}

pub fn item_port(index: usize) -> String {
    format!("ITEM{}", index)
}

pub fn generator_port(var: &str) -> String {
    format!("VAR_{}", var)
}

pub fn guard_port(index: usize) -> String {
    format!("GUARD{}", index)
}

pub fn arm_port(constructor: &str) -> String {
    format!("ARM_{}", constructor)
}

/// Name under which a data type's eliminator is bound in the environment.
pub fn case_name(type_name: &str) -> String {
    format!("case#{}", type_name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralBlock {
    pub value: String,
    pub ty: Type,
}

/// Call of a built-in operator, a data constructor or a user function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorBlock {
    pub name: String,
    pub arity: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableBlock {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LambdaBlock {
    pub param: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyBlock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalLetBlock {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListBlock {
    pub items: usize,
}

/// `[DO | v1 <- l1, ..., vn <- ln, g1, ..., gm]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComprehensionBlock {
    pub vars: Vec<String>,
    pub guards: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseArm {
    pub constructor: String,
    pub binders: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseBlock {
    pub type_name: String,
    pub arms: Vec<CaseArm>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionBlock {
    pub name: String,
    pub params: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructorDef {
    pub name: String,
    pub fields: Vec<Field>,
}

impl ConstructorDef {
    pub fn new(name: impl Into<String>, fields: Vec<(&str, Type)>) -> Self {
        ConstructorDef {
            name: name.into(),
            fields: fields
                .into_iter()
                .map(|(name, ty)| Field {
                    name: name.to_string(),
                    ty,
                })
                .collect(),
        }
    }
}

/// A user algebraic data type `name<params>` with its constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDeclarationBlock {
    pub name: String,
    pub params: Vec<String>,
    pub constructors: Vec<ConstructorDef>,
}

impl TypeDeclarationBlock {
    fn quantified(&self) -> Vec<TypeVar> {
        self.params.iter().map(TypeVar::new).collect()
    }

    pub fn result_type(&self) -> Type {
        Type::con(
            self.name.clone(),
            self.params.iter().map(Type::var).collect(),
        )
    }

    /// `field1 -> ... -> fieldn -> name<params>`
    pub fn constructor_scheme(&self, ctor: &ConstructorDef) -> TypeScheme {
        let ty = Type::curried(ctor.fields.iter().map(|f| f.ty.clone()), self.result_type());
        TypeScheme::polymorphic(self.quantified(), ty)
    }

    /// `name<params> -> (fields of c1 -> r) -> ... -> (fields of cn -> r) -> r`
    pub fn case_scheme(&self) -> TypeScheme {
        let result = TypeVar::new("%r");
        let arms = self.constructors.iter().map(|ctor| {
            Type::curried(ctor.fields.iter().map(|f| f.ty.clone()), Type::Var(result.clone()))
        });
        let ty = Type::curried(
            std::iter::once(self.result_type()).chain(arms),
            Type::Var(result.clone()),
        );
        let mut vars = self.quantified();
        vars.push(result);
        TypeScheme::polymorphic(vars, ty)
    }

    pub fn constructor(&self, name: &str) -> Option<&ConstructorDef> {
        self.constructors.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementBlock {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    Literal(LiteralBlock),
    Operator(OperatorBlock),
    Variable(VariableBlock),
    Lambda(LambdaBlock),
    Apply(ApplyBlock),
    LocalLet(LocalLetBlock),
    List(ListBlock),
    Comprehension(ComprehensionBlock),
    Case(CaseBlock),
    Function(FunctionBlock),
    TypeDeclaration(TypeDeclarationBlock),
    Statement(StatementBlock),
}

impl BlockKind {
    /// Whether the block itself produces a value on an output port.
    pub fn has_output(&self) -> bool {
        !matches!(
            self,
            BlockKind::Function(_) | BlockKind::TypeDeclaration(_) | BlockKind::Statement(_)
        )
    }

    pub fn is_declaration(&self) -> bool {
        matches!(self, BlockKind::TypeDeclaration(_))
    }

    pub fn is_statement(&self) -> bool {
        matches!(self, BlockKind::Statement(_))
    }

    pub fn as_function(&self) -> Option<&FunctionBlock> {
        match self {
            BlockKind::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_declaration(&self) -> Option<&TypeDeclarationBlock> {
        match self {
            BlockKind::TypeDeclaration(d) => Some(d),
            _ => None,
        }
    }

    /// Whether the expression plugged into `port` sees `name` rebound by
    /// this block rather than the binding visible at the block itself.
    pub fn shadows(&self, port: &str, name: &str) -> bool {
        match self {
            BlockKind::Lambda(l) => port == BODY && l.param == name,
            BlockKind::LocalLet(l) => port == BODY && l.name == name,
            // a generator's list sees only the variables bound before it
            BlockKind::Comprehension(c) => match c.vars.iter().position(|v| generator_port(v) == port) {
                Some(index) => c.vars[..index].iter().any(|v| v == name),
                None => c.vars.iter().any(|v| v == name),
            },
            BlockKind::Case(c) => c
                .arms
                .iter()
                .any(|arm| arm_port(&arm.constructor) == port && arm.binders.iter().any(|b| b == name)),
            _ => false,
        }
    }

    /// Name of the operator or function this block calls, if any.
    pub fn operator_name(&self) -> Option<&str> {
        match self {
            BlockKind::Operator(op) => Some(&op.name),
            _ => None,
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BlockKind::Literal(lit) => write!(f, "literal {}", lit.value),
            BlockKind::Operator(op) => write!(f, "operator {}", op.name),
            BlockKind::Variable(v) => write!(f, "variable {}", v.name),
            BlockKind::Lambda(l) => write!(f, "lambda {}", l.param),
            BlockKind::Apply(_) => write!(f, "apply"),
            BlockKind::LocalLet(l) => write!(f, "let {}", l.name),
            BlockKind::List(l) => write!(f, "list of {}", l.items),
            BlockKind::Comprehension(c) => write!(f, "comprehension over {}", c.vars.join(", ")),
            BlockKind::Case(c) => write!(f, "case on {}", c.type_name),
            BlockKind::Function(func) => write!(f, "function {}", func.name),
            BlockKind::TypeDeclaration(d) => write!(f, "data {}", d.name),
            BlockKind::Statement(s) => write!(f, "statement {}", s.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn maybe() -> TypeDeclarationBlock {
        TypeDeclarationBlock {
            name: "Maybe".to_string(),
            params: vec!["a".to_string()],
            constructors: vec![
                ConstructorDef::new("Nothing", vec![]),
                ConstructorDef::new("Just", vec![("value", Type::var("a"))]),
            ],
        }
    }

    #[test]
    fn test_constructor_schemes() {
        let decl = maybe();
        let just = decl.constructor("Just").unwrap();
        assert_eq!(decl.constructor_scheme(just).to_string(), "forall a. a -> Maybe<a>");
        let nothing = decl.constructor("Nothing").unwrap();
        assert_eq!(decl.constructor_scheme(nothing).to_string(), "forall a. Maybe<a>");
    }

    #[test]
    fn test_case_scheme() {
        let scheme = maybe().case_scheme();
        assert_eq!(
            scheme.to_string(),
            "forall a %r. Maybe<a> -> %r -> (a -> %r) -> %r"
        );
        assert!(scheme.free_type_vars().is_empty());
    }

    #[test]
    fn test_binders_shadow_only_their_scope() {
        let lambda = BlockKind::Lambda(LambdaBlock {
            param: "x".to_string(),
        });
        assert!(lambda.shadows(BODY, "x"));
        assert!(!lambda.shadows(BODY, "y"));

        let let_in = BlockKind::LocalLet(LocalLetBlock {
            name: "x".to_string(),
        });
        assert!(!let_in.shadows(VALUE, "x"));
        assert!(let_in.shadows(BODY, "x"));

        let comp = BlockKind::Comprehension(ComprehensionBlock {
            vars: vec!["x".to_string(), "y".to_string()],
            guards: 1,
        });
        assert!(!comp.shadows(&generator_port("x"), "x"));
        assert!(comp.shadows(&generator_port("y"), "x"));
        assert!(comp.shadows(&guard_port(0), "y"));
        assert!(comp.shadows(DO, "x"));
    }

    #[test]
    fn test_output_presence() {
        assert!(BlockKind::Apply(ApplyBlock).has_output());
        assert!(
            !BlockKind::Statement(StatementBlock {
                name: "drawingOf".to_string()
            })
            .has_output()
        );
    }
}
