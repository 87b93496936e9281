use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::ty::{Type, TypeScheme, TypeVar};

/// A finite map from type variables to types.
///
/// Application is a single pass: a variable is replaced by its image and the
/// image is not substituted again. Chained bindings must be composed first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitution(pub BTreeMap<TypeVar, Type>);

impl Substitution {
    pub fn empty() -> Self {
        Substitution(BTreeMap::new())
    }

    pub fn singleton(var: TypeVar, ty: Type) -> Self {
        let mut map = BTreeMap::new();
        map.insert(var, ty);
        Substitution(map)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, var: &TypeVar) -> Option<&Type> {
        self.0.get(var)
    }

    pub fn insert(&mut self, var: TypeVar, ty: Type) {
        self.0.insert(var, ty);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TypeVar, &Type)> {
        self.0.iter()
    }

    pub fn apply(&self, ty: &Type) -> Type {
        if self.is_empty() {
            return ty.clone();
        }
        match ty {
            Type::Var(v) => self.0.get(v).cloned().unwrap_or_else(|| ty.clone()),
            Type::Lit(name, children) => {
                Type::Lit(name.clone(), children.iter().map(|c| self.apply(c)).collect())
            }
            Type::Func(arg, result) => Type::func(self.apply(arg), self.apply(result)),
        }
    }

    /// Applies to the body of a scheme, leaving its quantified names alone.
    pub fn apply_scheme(&self, scheme: &TypeScheme) -> TypeScheme {
        let restricted = self.without(&scheme.vars);
        TypeScheme {
            vars: scheme.vars.clone(),
            ty: restricted.apply(&scheme.ty),
        }
    }

    /// `self.compose(&other)` applies `other` first, then `self`:
    /// `compose(s1, s2).apply(t) == s1.apply(&s2.apply(t))`.
    pub fn compose(&self, other: &Substitution) -> Substitution {
        let mut result: BTreeMap<TypeVar, Type> = other
            .0
            .iter()
            .map(|(var, ty)| (var.clone(), self.apply(ty)))
            .collect();

        for (var, ty) in &self.0 {
            result.entry(var.clone()).or_insert_with(|| ty.clone());
        }

        Substitution(result)
    }

    pub fn without(&self, vars: &[TypeVar]) -> Substitution {
        if vars.is_empty() {
            return self.clone();
        }
        let excluded: BTreeSet<&TypeVar> = vars.iter().collect();
        Substitution(
            self.0
                .iter()
                .filter(|(var, _)| !excluded.contains(var))
                .map(|(var, ty)| (var.clone(), ty.clone()))
                .collect(),
        )
    }
}

impl fmt::Display for Substitution {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bindings: Vec<String> = self
            .0
            .iter()
            .map(|(var, ty)| format!("{} := {}", var, ty))
            .collect();
        write!(f, "[{}]", bindings.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Type {
        Type::var(name)
    }

    #[test]
    fn test_empty_substitution() {
        let subst = Substitution::empty();
        let ty = Type::func(var("A"), Type::number());
        assert_eq!(subst.apply(&ty), ty);
    }

    #[test]
    fn test_apply_recurses_into_literal_children() {
        let subst = Substitution::singleton(TypeVar::new("A"), Type::number());
        let ty = Type::pair(var("A"), Type::list(var("A")));
        assert_eq!(
            subst.apply(&ty),
            Type::pair(Type::number(), Type::list(Type::number()))
        );
    }

    #[test]
    fn test_apply_is_single_pass() {
        let mut subst = Substitution::singleton(TypeVar::new("A"), var("B"));
        subst.insert(TypeVar::new("B"), Type::number());
        assert_eq!(subst.apply(&var("A")), var("B"));
    }

    #[test]
    fn test_compose_chains_bindings() {
        let s1 = Substitution::singleton(TypeVar::new("B"), Type::number());
        let s2 = Substitution::singleton(TypeVar::new("A"), var("B"));

        let composed = s1.compose(&s2);
        assert_eq!(composed.apply(&var("A")), Type::number());
        assert_eq!(composed.apply(&var("B")), Type::number());
    }

    #[test]
    fn test_compose_matches_sequential_application_on_conflicts() {
        let s1 = Substitution::singleton(TypeVar::new("A"), Type::number());
        let s2 = Substitution::singleton(TypeVar::new("A"), Type::bool());

        let ty = Type::func(var("A"), var("C"));
        let composed = s1.compose(&s2);
        assert_eq!(composed.apply(&ty), s1.apply(&s2.apply(&ty)));
        assert_eq!(composed.apply(&var("A")), Type::bool());
    }

    #[test]
    fn test_apply_scheme_skips_quantified_names() {
        let scheme = TypeScheme::polymorphic(
            vec![TypeVar::new("A")],
            Type::func(var("A"), var("B")),
        );
        let mut subst = Substitution::singleton(TypeVar::new("A"), Type::number());
        subst.insert(TypeVar::new("B"), Type::bool());

        let applied = subst.apply_scheme(&scheme);
        assert_eq!(applied.ty, Type::func(var("A"), Type::bool()));
        assert_eq!(applied.vars, scheme.vars);
    }

    #[test]
    fn test_display() {
        let subst = Substitution::singleton(TypeVar::new("A"), Type::list(Type::number()));
        assert_eq!(subst.to_string(), "[A := list<Number>]");
    }
}
