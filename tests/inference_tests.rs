//! Algorithm W over hand-built expressions

mod common;

use typed_blocks::expr::Expression;
use typed_blocks::types::builtins::builtin_env;
use typed_blocks::types::{Type, TypeEnv, TypeError, TypeVarRegistry, infer};

fn infer_closed(expr: &Expression) -> Result<Type, TypeError> {
    common::init_test_logging();
    let mut registry = TypeVarRegistry::new();
    let env = builtin_env().expect("builtin signatures parse");
    infer(&mut registry, &env, expr)
}

#[test]
fn test_literal_infers_to_its_type() {
    let twenty = Expression::lit(Type::number());
    assert_eq!(infer_closed(&twenty).unwrap(), Type::number());
}

#[test]
fn test_identity_shares_one_variable() {
    let id = Expression::abs("x", Expression::var("x"));
    let ty = infer_closed(&id).unwrap();
    let arg = ty.function_arg().unwrap();
    let result = ty.function_result().unwrap();
    assert!(arg.is_type_var());
    assert_eq!(arg, result);
}

#[test]
fn test_identity_applied_to_number() {
    let expr = Expression::app(
        Expression::abs("x", Expression::var("x")),
        Expression::lit(Type::number()),
    );
    assert_eq!(infer_closed(&expr).unwrap(), Type::number());
}

#[test]
fn test_let_polymorphism() {
    // let id = \x -> x in , (id 1) (id True)
    let expr = Expression::let_in(
        "id",
        Expression::abs("x", Expression::var("x")),
        Expression::apply_all(
            Expression::var(","),
            [
                Expression::app(Expression::var("id"), Expression::lit(Type::number())),
                Expression::app(Expression::var("id"), Expression::lit(Type::bool())),
            ],
        ),
    );
    assert_eq!(
        infer_closed(&expr).unwrap(),
        Type::pair(Type::number(), Type::bool())
    );
}

#[test]
fn test_lambda_bound_variables_stay_monomorphic() {
    // \f -> , (f 1) (f True)
    let expr = Expression::abs(
        "f",
        Expression::apply_all(
            Expression::var(","),
            [
                Expression::app(Expression::var("f"), Expression::lit(Type::number())),
                Expression::app(Expression::var("f"), Expression::lit(Type::bool())),
            ],
        ),
    );
    assert!(matches!(
        infer_closed(&expr),
        Err(TypeError::Unification { .. })
    ));
}

#[test]
fn test_unbound_variable() {
    let err = infer_closed(&Expression::var("nowhere")).unwrap_err();
    assert_eq!(err.to_string(), "unbound variable: nowhere");
}

#[test]
fn test_builtin_instances_are_independent() {
    // , (length [] ) ([])
    let mut registry = TypeVarRegistry::new();
    let env = builtin_env().unwrap();
    let expr = Expression::apply_all(
        Expression::var(","),
        [
            Expression::app(Expression::var("length"), Expression::var("[]")),
            Expression::var("[]"),
        ],
    );
    let ty = infer(&mut registry, &env, &expr).unwrap();
    assert_eq!(ty.literal_name().unwrap(), "pair");
    let children = ty.literal_children().unwrap();
    assert_eq!(children[0], Type::number());
    assert!(children[1].literal_children().unwrap()[0].is_type_var());
}

#[test]
fn test_empty_environment_knows_nothing() {
    let mut registry = TypeVarRegistry::new();
    let expr = Expression::app(Expression::var("negate"), Expression::lit(Type::number()));
    assert!(matches!(
        infer(&mut registry, &TypeEnv::empty(), &expr),
        Err(TypeError::UnboundVariable { .. })
    ));
}
