use std::collections::BTreeMap;

use tracing::trace;

use super::env::{TypeEnv, generalize, instantiate};
use super::error::TypeError;
use super::registry::TypeVarRegistry;
use super::subst::Substitution;
use super::ty::{Type, TypeScheme};
use super::unify::unify;
use crate::expr::{Expression, Tag};

/// Algorithm W over [`Expression`] trees.
///
/// Fresh variables come from the borrowed registry, so every instantiation
/// is disjoint from all variables live elsewhere in the workspace. Types of
/// tagged nodes are recorded as inference walks the tree; they are relative
/// to the substitution at the time and are resolved against the final one
/// by [`Infer::resolve_annotations`].
pub struct Infer<'r> {
    registry: &'r mut TypeVarRegistry,
    annotations: Vec<(Tag, Type)>,
}

impl<'r> Infer<'r> {
    pub fn new(registry: &'r mut TypeVarRegistry) -> Self {
        Infer {
            registry,
            annotations: Vec::new(),
        }
    }

    pub fn fresh_var(&mut self) -> Type {
        Type::Var(self.registry.allocate())
    }

    pub fn instantiate(&mut self, scheme: &TypeScheme) -> Type {
        instantiate(scheme, self.registry)
    }

    pub fn registry(&mut self) -> &mut TypeVarRegistry {
        &mut *self.registry
    }

    pub fn annotation_count(&self) -> usize {
        self.annotations.len()
    }

    /// Drops annotations recorded after `len`, used to discard a failed run.
    pub fn truncate_annotations(&mut self, len: usize) {
        self.annotations.truncate(len);
    }

    /// Drains the recorded annotations, applying `subst` to each type.
    /// When a tag was recorded more than once the outermost node wins.
    pub fn resolve_annotations(&mut self, subst: &Substitution) -> BTreeMap<Tag, Type> {
        self.annotations
            .drain(..)
            .map(|(tag, ty)| (tag, subst.apply(&ty)))
            .collect()
    }

    fn annotate(&mut self, tag: Option<Tag>, ty: &Type) {
        if let Some(tag) = tag {
            trace!(%tag, ty = %ty, "annotated");
            self.annotations.push((tag, ty.clone()));
        }
    }

    pub fn infer_expr(
        &mut self,
        env: &TypeEnv,
        expr: &Expression,
    ) -> Result<(Substitution, Type), TypeError> {
        let (subst, ty) = match expr {
            Expression::Var { name, tag } => match env.lookup(name) {
                Some(scheme) => (Substitution::empty(), self.instantiate(scheme)),
                None => return Err(TypeError::unbound_variable(name.clone(), *tag)),
            },

            Expression::Lit { ty, .. } => (Substitution::empty(), ty.clone()),

            Expression::Abs { param, body, .. } => self.infer_abs(env, param, body)?,

            Expression::App { func, arg, tag } => self.infer_app(env, func, arg, *tag)?,

            Expression::Let {
                name, bound, body, ..
            } => self.infer_let(env, name, bound, body)?,
        };
        self.annotate(expr.tag(), &ty);
        Ok((subst, ty))
    }

    fn infer_abs(
        &mut self,
        env: &TypeEnv,
        param: &str,
        body: &Expression,
    ) -> Result<(Substitution, Type), TypeError> {
        let param_ty = self.fresh_var();
        let env1 = env.extend(param, TypeScheme::monomorphic(param_ty.clone()));
        let (s1, body_ty) = self.infer_expr(&env1, body)?;
        let arg_ty = s1.apply(&param_ty);
        Ok((s1, Type::func(arg_ty, body_ty)))
    }

    fn infer_app(
        &mut self,
        env: &TypeEnv,
        func: &Expression,
        arg: &Expression,
        tag: Option<Tag>,
    ) -> Result<(Substitution, Type), TypeError> {
        let (s1, func_ty) = self.infer_expr(env, func)?;
        let (s2, arg_ty) = self.infer_expr(&env.apply_subst(&s1), arg)?;
        let result_ty = self.fresh_var();

        let s3 = unify(&s2.apply(&func_ty), &Type::func(arg_ty, result_ty.clone()))
            .map_err(|err| TypeError::from_unify_error(err, tag))?;

        let subst = s3.compose(&s2.compose(&s1));
        Ok((subst, s3.apply(&result_ty)))
    }

    /// The bound expression is generalized against the environment without
    /// `name`, so each use in the body gets its own instance.
    fn infer_let(
        &mut self,
        env: &TypeEnv,
        name: &str,
        bound: &Expression,
        body: &Expression,
    ) -> Result<(Substitution, Type), TypeError> {
        let (s1, bound_ty) = self.infer_expr(env, bound)?;
        let env1 = env.remove(name).apply_subst(&s1);
        let scheme = generalize(&env1, &bound_ty);
        let env2 = env1.extend(name, scheme);
        let (s2, body_ty) = self.infer_expr(&env2, body)?;
        Ok((s2.compose(&s1), body_ty))
    }
}

/// Infers `expr` with a throwaway annotation buffer.
pub fn infer(
    registry: &mut TypeVarRegistry,
    env: &TypeEnv,
    expr: &Expression,
) -> Result<Type, TypeError> {
    let mut infer = Infer::new(registry);
    let (subst, ty) = infer.infer_expr(env, expr)?;
    Ok(subst.apply(&ty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::BlockId;
    use crate::types::unify::UnifyError;

    fn var(name: &str) -> Expression {
        Expression::var(name)
    }

    fn num() -> Expression {
        Expression::lit(Type::number())
    }

    fn boolean() -> Expression {
        Expression::lit(Type::bool())
    }

    fn app(f: Expression, a: Expression) -> Expression {
        Expression::app(f, a)
    }

    fn abs(p: &str, body: Expression) -> Expression {
        Expression::abs(p, body)
    }

    fn env() -> TypeEnv {
        TypeEnv::with_bindings(vec![
            (
                "+".to_string(),
                TypeScheme::parse("Number -> Number -> Number").unwrap(),
            ),
            (",".to_string(), TypeScheme::parse("a -> b -> pair<a, b>").unwrap()),
            ("if".to_string(), TypeScheme::parse("Bool -> a -> a -> a").unwrap()),
        ])
    }

    fn infer_type(expr: &Expression) -> Result<Type, TypeError> {
        let mut registry = TypeVarRegistry::new();
        infer(&mut registry, &env(), expr)
    }

    #[test]
    fn test_literal() {
        assert_eq!(infer_type(&num()), Ok(Type::number()));
    }

    #[test]
    fn test_identity_shares_variable() {
        let ty = infer_type(&abs("x", var("x"))).unwrap();
        let arg = ty.function_arg().unwrap();
        assert!(arg.is_type_var());
        assert_eq!(ty.function_result(), Ok(arg));
    }

    #[test]
    fn test_identity_applied() {
        let expr = app(abs("x", var("x")), num());
        assert_eq!(infer_type(&expr), Ok(Type::number()));
    }

    #[test]
    fn test_unbound_variable() {
        let err = infer_type(&var("nope")).unwrap_err();
        assert!(matches!(err, TypeError::UnboundVariable { ref name, .. } if name == "nope"));
    }

    #[test]
    fn test_builtin_application() {
        let expr = app(app(var("+"), num()), num());
        assert_eq!(infer_type(&expr), Ok(Type::number()));
    }

    #[test]
    fn test_partial_application() {
        let expr = app(var("+"), num());
        assert_eq!(
            infer_type(&expr),
            Ok(Type::func(Type::number(), Type::number()))
        );
    }

    #[test]
    fn test_application_mismatch_is_attributed() {
        let tag = Tag::Block(BlockId(7));
        let expr = app(app(var("+"), num()), boolean()).tagged(tag);
        let err = infer_type(&expr).unwrap_err();
        assert_eq!(err.tag(), Some(tag));
        assert!(matches!(
            err,
            TypeError::Unification {
                source: UnifyError::Mismatch { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_let_polymorphism() {
        let expr = Expression::let_in("id", abs("x", var("x")), app(var("id"), num()));
        assert_eq!(infer_type(&expr), Ok(Type::number()));

        let both = Expression::let_in(
            "id",
            abs("x", var("x")),
            app(
                app(var(","), app(var("id"), num())),
                app(var("id"), boolean()),
            ),
        );
        assert_eq!(
            infer_type(&both),
            Ok(Type::pair(Type::number(), Type::bool()))
        );
    }

    #[test]
    fn test_lambda_bound_is_monomorphic() {
        let expr = app(
            abs(
                "id",
                app(
                    app(var(","), app(var("id"), num())),
                    app(var("id"), boolean()),
                ),
            ),
            abs("x", var("x")),
        );
        assert!(matches!(
            infer_type(&expr),
            Err(TypeError::Unification { .. })
        ));
    }

    #[test]
    fn test_self_application_fails_occurs_check() {
        let expr = abs("x", app(var("x"), var("x")));
        assert!(matches!(
            infer_type(&expr),
            Err(TypeError::Unification {
                source: UnifyError::OccursCheck { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_let_shadows_outer_binding() {
        let expr = Expression::let_in("+", num(), var("+"));
        assert_eq!(infer_type(&expr), Ok(Type::number()));
    }

    #[test]
    fn test_annotations_resolve_against_final_substitution() {
        let mut registry = TypeVarRegistry::new();
        let param_tag = Tag::Block(BlockId(1));
        let abs_tag = Tag::Block(BlockId(2));
        let expr = app(
            abs("x", var("x").tagged(param_tag)).tagged(abs_tag),
            num(),
        );

        let mut infer = Infer::new(&mut registry);
        let (subst, ty) = infer.infer_expr(&env(), &expr).unwrap();
        let annotations = infer.resolve_annotations(&subst);

        assert_eq!(subst.apply(&ty), Type::number());
        assert_eq!(annotations.get(&param_tag), Some(&Type::number()));
        assert_eq!(
            annotations.get(&abs_tag),
            Some(&Type::func(Type::number(), Type::number()))
        );
    }

    #[test]
    fn test_let_annotations_see_later_constraints() {
        let mut registry = TypeVarRegistry::new();
        let tag = Tag::Block(BlockId(1));
        // let y = \x -> x in (\z -> if z z z) true, with z tagged
        let expr = Expression::let_in(
            "y",
            abs("x", var("x")),
            app(
                abs(
                    "z",
                    app(app(app(var("if"), var("z").tagged(tag)), var("z")), var("z")),
                ),
                boolean(),
            ),
        );

        let mut infer = Infer::new(&mut registry);
        let (subst, ty) = infer.infer_expr(&env(), &expr).unwrap();
        let annotations = infer.resolve_annotations(&subst);

        assert_eq!(subst.apply(&ty), Type::bool());
        assert_eq!(annotations.get(&tag), Some(&Type::bool()));
    }

    #[test]
    fn test_truncate_discards_failed_run() {
        let mut registry = TypeVarRegistry::new();
        let mut infer = Infer::new(&mut registry);
        let mark = infer.annotation_count();
        let expr = app(num().tagged(Tag::Block(BlockId(9))), num());
        assert!(infer.infer_expr(&env(), &expr).is_err());
        assert!(infer.annotation_count() > mark);
        infer.truncate_annotations(mark);
        assert!(infer.resolve_annotations(&Substitution::empty()).is_empty());
    }
}
