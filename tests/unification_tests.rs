//! Properties of unification and substitution composition

use proptest::prelude::*;
use typed_blocks::types::{Substitution, Type, TypeVar, UnifyError, unify};

const VAR_POOL: &[&str] = &["A", "B", "C", "D"];

fn arb_type() -> impl Strategy<Value = Type> {
    let leaf = prop_oneof![
        prop::sample::select(VAR_POOL).prop_map(Type::var),
        Just(Type::number()),
        Just(Type::bool()),
        Just(Type::text()),
    ];
    leaf.prop_recursive(4, 24, 2, |inner| {
        prop_oneof![
            inner.clone().prop_map(Type::list),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| Type::pair(a, b)),
            (inner.clone(), inner).prop_map(|(a, r)| Type::func(a, r)),
        ]
    })
}

fn arb_substitution() -> impl Strategy<Value = Substitution> {
    prop::collection::btree_map(
        prop::sample::select(VAR_POOL).prop_map(TypeVar::new),
        arb_type(),
        0..3,
    )
    .prop_map(Substitution)
}

proptest! {
    #[test]
    fn unify_is_reflexive(t in arb_type()) {
        prop_assert_eq!(unify(&t, &t), Ok(Substitution::empty()));
    }

    #[test]
    fn unifier_makes_both_sides_equal(a in arb_type(), b in arb_type()) {
        if let Ok(s) = unify(&a, &b) {
            prop_assert_eq!(s.apply(&a), s.apply(&b));
        }
    }

    #[test]
    fn unify_succeeds_in_both_directions(a in arb_type(), b in arb_type()) {
        prop_assert_eq!(unify(&a, &b).is_ok(), unify(&b, &a).is_ok());
    }

    #[test]
    fn unifier_is_idempotent(a in arb_type(), b in arb_type()) {
        if let Ok(s) = unify(&a, &b) {
            let once = s.apply(&a);
            prop_assert_eq!(s.apply(&once), once);
        }
    }

    #[test]
    fn composition_applies_right_then_left(
        s1 in arb_substitution(),
        s2 in arb_substitution(),
        t in arb_type(),
    ) {
        prop_assert_eq!(s1.compose(&s2).apply(&t), s1.apply(&s2.apply(&t)));
    }
}

#[test]
fn test_occurs_check() {
    let x = Type::var("x");
    let looping = Type::func(Type::var("x"), Type::lit("Int"));
    assert_eq!(
        unify(&x, &looping),
        Err(UnifyError::OccursCheck {
            var: TypeVar::new("x"),
            ty: looping.clone(),
        })
    );
}

#[test]
fn test_mismatch_message() {
    let err = unify(&Type::number(), &Type::func(Type::bool(), Type::bool())).unwrap_err();
    assert_eq!(err.to_string(), "type mismatch: Number vs Bool -> Bool");
}

#[test]
fn test_literal_arity_mismatch() {
    let short = Type::con("pair", vec![Type::number()]);
    let long = Type::pair(Type::number(), Type::bool());
    assert!(matches!(
        unify(&short, &long),
        Err(UnifyError::ArityMismatch { .. })
    ));
}

#[test]
fn test_children_thread_the_substitution() {
    // pair<A, A> against pair<Number, B> forces B through A
    let left = Type::pair(Type::var("A"), Type::var("A"));
    let right = Type::pair(Type::number(), Type::var("B"));
    let s = unify(&left, &right).unwrap();
    assert_eq!(s.apply(&Type::var("A")), Type::number());
    assert_eq!(s.apply(&Type::var("B")), Type::number());
}
