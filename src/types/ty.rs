use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::signature;

/// A type variable, identified by the token the registry handed out for it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeVar(pub String);

impl TypeVar {
    pub fn new(name: impl Into<String>) -> Self {
        TypeVar(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeVar {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Var(TypeVar),
    /// A type constructor applied to its arguments; nullary for base types.
    Lit(String, Vec<Type>),
    Func(Box<Type>, Box<Type>),
}

/// Raised when a variant accessor is applied to the wrong kind of type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VariantError {
    #[error("not this variant: expected {expected}, found `{found}`")]
    NotThisVariant { expected: &'static str, found: Type },
}

impl Type {
    pub fn var(name: impl Into<String>) -> Self {
        Type::Var(TypeVar::new(name))
    }

    pub fn lit(name: impl Into<String>) -> Self {
        Type::Lit(name.into(), Vec::new())
    }

    pub fn con(name: impl Into<String>, children: Vec<Type>) -> Self {
        Type::Lit(name.into(), children)
    }

    pub fn func(arg: Type, result: Type) -> Self {
        Type::Func(Box::new(arg), Box::new(result))
    }

    /// Right-nested function type `a1 -> a2 -> ... -> result`.
    pub fn curried(args: impl IntoIterator<Item = Type>, result: Type) -> Self {
        let args: Vec<Type> = args.into_iter().collect();
        args.into_iter()
            .rev()
            .fold(result, |acc, arg| Type::func(arg, acc))
    }

    pub fn number() -> Self {
        Type::lit("Number")
    }

    pub fn bool() -> Self {
        Type::lit("Bool")
    }

    pub fn text() -> Self {
        Type::lit("Text")
    }

    pub fn list(element: Type) -> Self {
        Type::con("list", vec![element])
    }

    pub fn pair(first: Type, second: Type) -> Self {
        Type::con("pair", vec![first, second])
    }

    pub fn is_type_var(&self) -> bool {
        matches!(self, Type::Var(_))
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Type::Lit(..))
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Type::Func(..))
    }

    pub fn type_var(&self) -> Result<&TypeVar, VariantError> {
        match self {
            Type::Var(v) => Ok(v),
            _ => Err(self.not_this("type variable")),
        }
    }

    pub fn literal_name(&self) -> Result<&str, VariantError> {
        match self {
            Type::Lit(name, _) => Ok(name),
            _ => Err(self.not_this("literal")),
        }
    }

    pub fn literal_children(&self) -> Result<&[Type], VariantError> {
        match self {
            Type::Lit(_, children) => Ok(children),
            _ => Err(self.not_this("literal")),
        }
    }

    pub fn function_arg(&self) -> Result<&Type, VariantError> {
        match self {
            Type::Func(arg, _) => Ok(arg),
            _ => Err(self.not_this("function")),
        }
    }

    pub fn function_result(&self) -> Result<&Type, VariantError> {
        match self {
            Type::Func(_, result) => Ok(result),
            _ => Err(self.not_this("function")),
        }
    }

    fn not_this(&self, expected: &'static str) -> VariantError {
        VariantError::NotThisVariant {
            expected,
            found: self.clone(),
        }
    }

    /// Splits a curried function type into at most `arity` argument types
    /// and the remaining result type.
    pub fn uncurry(&self, arity: usize) -> (Vec<Type>, Type) {
        let mut args = Vec::new();
        let mut current = self;
        while args.len() < arity {
            match current {
                Type::Func(arg, result) => {
                    args.push((**arg).clone());
                    current = result;
                }
                _ => break,
            }
        }
        (args, current.clone())
    }

    /// Number of arrows along the result spine.
    pub fn arity(&self) -> usize {
        match self {
            Type::Func(_, result) => 1 + result.arity(),
            _ => 0,
        }
    }

    pub fn free_type_vars(&self) -> BTreeSet<TypeVar> {
        let mut set = BTreeSet::new();
        self.collect_vars(&mut set);
        set
    }

    fn collect_vars(&self, set: &mut BTreeSet<TypeVar>) {
        match self {
            Type::Var(v) => {
                set.insert(v.clone());
            }
            Type::Lit(_, children) => children.iter().for_each(|c| c.collect_vars(set)),
            Type::Func(arg, result) => {
                arg.collect_vars(set);
                result.collect_vars(set);
            }
        }
    }

    pub fn contains_var(&self, var: &TypeVar) -> bool {
        match self {
            Type::Var(v) => v == var,
            Type::Lit(_, children) => children.iter().any(|c| c.contains_var(var)),
            Type::Func(arg, result) => arg.contains_var(var) || result.contains_var(var),
        }
    }

    pub fn pretty(&self) -> String {
        match self {
            Type::Var(v) => v.0.clone(),
            Type::Lit(name, children) if children.is_empty() => name.clone(),
            Type::Lit(name, children) => {
                let args: Vec<String> = children.iter().map(Type::pretty).collect();
                format!("{}<{}>", name, args.join(", "))
            }
            Type::Func(arg, result) => {
                let arg_str = if arg.is_function() {
                    format!("({})", arg.pretty())
                } else {
                    arg.pretty()
                };
                format!("{} -> {}", arg_str, result.pretty())
            }
        }
    }

    /// Parses the signature notation used by the operator table.
    ///
    /// `->` associates to the right, `name<a, b>` applies a constructor and
    /// parentheses group. Identifiers starting with a lowercase letter are
    /// type variables, everything else names a literal type.
    ///
    /// ```text
    /// Bool -> a -> a -> a
    /// list<a> -> (a -> list<b>) -> list<b>
    /// ```
    pub fn parse(source: &str) -> Result<Type, ParseTypeError> {
        signature::parse_signature(source)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.pretty())
    }
}

impl FromStr for Type {
    type Err = ParseTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Type::parse(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid signature `{signature}`: {reason}")]
pub struct ParseTypeError {
    pub signature: String,
    pub reason: String,
}

/// A type quantified over `vars`. Monomorphic schemes have no variables.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeScheme {
    pub vars: Vec<TypeVar>,
    pub ty: Type,
}

impl TypeScheme {
    pub fn monomorphic(ty: Type) -> Self {
        TypeScheme {
            vars: Vec::new(),
            ty,
        }
    }

    pub fn polymorphic(vars: Vec<TypeVar>, ty: Type) -> Self {
        TypeScheme { vars, ty }
    }

    /// Quantifies every variable of `ty`.
    pub fn closed(ty: Type) -> Self {
        let vars = ty.free_type_vars().into_iter().collect();
        TypeScheme { vars, ty }
    }

    /// Parses a signature and quantifies all of its variables.
    pub fn parse(source: &str) -> Result<Self, ParseTypeError> {
        Type::parse(source).map(TypeScheme::closed)
    }

    pub fn free_type_vars(&self) -> BTreeSet<TypeVar> {
        let mut free = self.ty.free_type_vars();
        for var in &self.vars {
            free.remove(var);
        }
        free
    }
}

impl fmt::Display for TypeScheme {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.vars.is_empty() {
            return write!(f, "{}", self.ty);
        }
        let vars: Vec<&str> = self.vars.iter().map(TypeVar::name).collect();
        write!(f, "forall {}. {}", vars.join(" "), self.ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_predicates() {
        assert!(Type::var("A").is_type_var());
        assert!(Type::number().is_literal());
        assert!(Type::func(Type::number(), Type::bool()).is_function());
        assert!(!Type::number().is_function());
    }

    #[test]
    fn test_accessors_on_matching_variant() {
        let ty = Type::pair(Type::number(), Type::var("A"));
        assert_eq!(ty.literal_name(), Ok("pair"));
        assert_eq!(ty.literal_children().map(<[Type]>::len), Ok(2));

        let f = Type::func(Type::number(), Type::bool());
        assert_eq!(f.function_arg(), Ok(&Type::number()));
        assert_eq!(f.function_result(), Ok(&Type::bool()));
    }

    #[test]
    fn test_accessors_reject_other_variants() {
        let err = Type::number().function_arg().unwrap_err();
        assert_eq!(
            err,
            VariantError::NotThisVariant {
                expected: "function",
                found: Type::number(),
            }
        );
        assert!(Type::var("A").literal_name().is_err());
        assert!(Type::func(Type::number(), Type::number()).literal_children().is_err());
        assert!(Type::number().type_var().is_err());
    }

    #[test]
    fn test_equality_is_name_sensitive() {
        let a = Type::func(Type::var("A"), Type::var("A"));
        let b = Type::func(Type::var("B"), Type::var("B"));
        assert_ne!(a, b);
        assert_eq!(a, Type::func(Type::var("A"), Type::var("A")));
    }

    #[test]
    fn test_free_type_vars() {
        let ty = Type::func(Type::list(Type::var("A")), Type::pair(Type::var("B"), Type::var("A")));
        let free: Vec<_> = ty.free_type_vars().into_iter().collect();
        assert_eq!(free, vec![TypeVar::new("A"), TypeVar::new("B")]);
        assert!(Type::number().free_type_vars().is_empty());
    }

    #[test]
    fn test_pretty_print() {
        assert_eq!(Type::number().pretty(), "Number");
        assert_eq!(Type::list(Type::var("T")).pretty(), "list<T>");
        assert_eq!(
            Type::list(Type::pair(Type::number(), Type::bool())).pretty(),
            "list<pair<Number, Bool>>"
        );
        assert_eq!(Type::func(Type::var("A"), Type::var("B")).pretty(), "A -> B");
    }

    #[test]
    fn test_pretty_print_parenthesizes_function_argument() {
        let ty = Type::func(Type::func(Type::number(), Type::bool()), Type::text());
        assert_eq!(ty.to_string(), "(Number -> Bool) -> Text");
        let ty = Type::curried([Type::number(), Type::bool()], Type::text());
        assert_eq!(ty.to_string(), "Number -> Bool -> Text");
    }

    #[test]
    fn test_uncurry() {
        let ty = Type::parse("Bool -> a -> a -> a").unwrap();
        let (args, result) = ty.uncurry(3);
        assert_eq!(args, vec![Type::bool(), Type::var("a"), Type::var("a")]);
        assert_eq!(result, Type::var("a"));
        assert_eq!(ty.arity(), 3);

        let (args, result) = ty.uncurry(1);
        assert_eq!(args.len(), 1);
        assert_eq!(result, Type::parse("a -> a -> a").unwrap());
    }

    #[test]
    fn test_parse_signature() {
        let ty = Type::parse("list<a> -> (a -> list<b>) -> list<b>").unwrap();
        assert_eq!(
            ty,
            Type::curried(
                [
                    Type::list(Type::var("a")),
                    Type::func(Type::var("a"), Type::list(Type::var("b"))),
                ],
                Type::list(Type::var("b"))
            )
        );
        assert_eq!(Type::parse("pair<a, b>").unwrap(), Type::pair(Type::var("a"), Type::var("b")));
        assert_eq!("Number".parse::<Type>().unwrap(), Type::number());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Type::parse("a ->").is_err());
        assert!(Type::parse("list<a").is_err());
        assert!(Type::parse("a - b").is_err());
        assert!(Type::parse("(a").is_err());
        assert!(Type::parse("a b").is_err());
    }

    #[test]
    fn test_scheme_quantifies_signature_vars() {
        let scheme = TypeScheme::parse("a -> b -> pair<a, b>").unwrap();
        assert_eq!(scheme.vars, vec![TypeVar::new("a"), TypeVar::new("b")]);
        assert!(scheme.free_type_vars().is_empty());
        assert_eq!(scheme.to_string(), "forall a b. a -> b -> pair<a, b>");
    }

    #[test]
    fn test_monomorphic_scheme_keeps_free_vars() {
        let scheme = TypeScheme::monomorphic(Type::var("A"));
        assert_eq!(scheme.free_type_vars().len(), 1);
        assert_eq!(scheme.to_string(), "A");
    }
}
