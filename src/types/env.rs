use std::collections::BTreeSet;

use im::OrdMap;

use super::registry::TypeVarRegistry;
use super::subst::Substitution;
use super::ty::{Type, TypeScheme, TypeVar};

/// Persistent map from binder names to schemes.
///
/// Extending an environment returns a new one that shares structure with
/// the old, so inference can branch freely without copying bindings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeEnv {
    bindings: OrdMap<String, TypeScheme>,
}

impl TypeEnv {
    pub fn empty() -> Self {
        TypeEnv {
            bindings: OrdMap::new(),
        }
    }

    pub fn with_bindings(bindings: Vec<(String, TypeScheme)>) -> Self {
        TypeEnv {
            bindings: bindings.into_iter().collect(),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&TypeScheme> {
        self.bindings.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn insert(&mut self, name: impl Into<String>, scheme: TypeScheme) {
        self.bindings.insert(name.into(), scheme);
    }

    pub fn extend(&self, name: impl Into<String>, scheme: TypeScheme) -> TypeEnv {
        TypeEnv {
            bindings: self.bindings.update(name.into(), scheme),
        }
    }

    pub fn extend_many(&self, bindings: impl IntoIterator<Item = (String, TypeScheme)>) -> TypeEnv {
        let mut env = self.clone();
        for (name, scheme) in bindings {
            env.insert(name, scheme);
        }
        env
    }

    pub fn remove(&self, name: &str) -> TypeEnv {
        TypeEnv {
            bindings: self.bindings.without(name),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TypeScheme)> {
        self.bindings.iter()
    }

    pub fn free_type_vars(&self) -> BTreeSet<TypeVar> {
        self.bindings
            .values()
            .flat_map(TypeScheme::free_type_vars)
            .collect()
    }

    pub fn apply_subst(&self, subst: &Substitution) -> TypeEnv {
        if subst.is_empty() {
            return self.clone();
        }
        TypeEnv {
            bindings: self
                .bindings
                .iter()
                .map(|(name, scheme)| (name.clone(), subst.apply_scheme(scheme)))
                .collect(),
        }
    }
}

/// Quantifies the variables of `ty` that are not free in `env`.
pub fn generalize(env: &TypeEnv, ty: &Type) -> TypeScheme {
    let free_in_env = env.free_type_vars();
    let vars = ty
        .free_type_vars()
        .into_iter()
        .filter(|v| !free_in_env.contains(v))
        .collect();
    TypeScheme::polymorphic(vars, ty.clone())
}

/// Replaces each quantified variable with a freshly allocated one.
pub fn instantiate(scheme: &TypeScheme, registry: &mut TypeVarRegistry) -> Type {
    if scheme.vars.is_empty() {
        return scheme.ty.clone();
    }
    let renaming = Substitution(
        scheme
            .vars
            .iter()
            .map(|v| (v.clone(), Type::Var(registry.allocate())))
            .collect(),
    );
    renaming.apply(&scheme.ty)
}
