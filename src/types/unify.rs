use thiserror::Error;

use super::subst::Substitution;
use super::ty::{Type, TypeVar};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnifyError {
    #[error("type mismatch: {left} vs {right}")]
    Mismatch { left: Type, right: Type },
    #[error("occurs check: cannot construct infinite type {var} = {ty}")]
    OccursCheck { var: TypeVar, ty: Type },
    #[error("arity mismatch: {left} vs {right}")]
    ArityMismatch { left: Type, right: Type },
}

/// Binds `var` to `ty` after the occurs check.
///
/// Without the check a binding like `A := A -> Number` would be accepted,
/// and every application of it would grow the type:
///
/// ```text
/// A = A -> Number
///   = (A -> Number) -> Number
///   = ((A -> Number) -> Number) -> Number
///   = ...
/// ```
///
/// A port graph in which an output feeds back into its own input produces
/// exactly such an equation, so the failure has to be reported rather than
/// looped on.
fn bind(var: &TypeVar, ty: &Type) -> Result<Substitution, UnifyError> {
    if let Type::Var(other) = ty {
        if other == var {
            return Ok(Substitution::empty());
        }
    }
    if ty.contains_var(var) {
        return Err(UnifyError::OccursCheck {
            var: var.clone(),
            ty: ty.clone(),
        });
    }
    Ok(Substitution::singleton(var.clone(), ty.clone()))
}

/// Unify two types, finding the most general substitution that makes them equal.
///
/// # Algorithm
///
/// ## Type Variables
///
/// ```text
/// Unify(A, A)           = ∅
/// Unify(A, B)           = [A := B]
/// Unify(A, Number)      = [A := Number]
/// Unify(Number, A)      = [A := Number]
/// Unify(A, A -> Number) = OccursCheck
/// ```
///
/// When both sides are variables the left one is bound, so callers that want
/// to keep an existing name pass the fresher type first.
///
/// ## Function Types
///
/// ```text
/// Unify(a1 -> r1, a2 -> r2):
///   1. S1 = Unify(a1, a2)
///   2. S2 = Unify(S1(r1), S1(r2))
///   3. return S2 ∘ S1
/// ```
///
/// ## Literal Types
///
/// Names must agree and both sides must carry the same number of children.
/// Children are then unified left to right, threading the accumulated
/// substitution through the remaining pairs:
///
/// ```text
/// Unify(pair<A, Number>, pair<Bool, B>):
///   S1 = Unify(A, Bool)            = [A := Bool]
///   S2 = Unify(S1(Number), S1(B))  = [B := Number]
///   return S2 ∘ S1                 = [A := Bool, B := Number]
/// ```
///
/// Every other combination (a function against a literal, say) is a mismatch.
/// The inputs are never modified.
pub fn unify(t1: &Type, t2: &Type) -> Result<Substitution, UnifyError> {
    match (t1, t2) {
        (Type::Var(a), other) | (other, Type::Var(a)) => bind(a, other),

        (Type::Func(a1, r1), Type::Func(a2, r2)) => {
            let s1 = unify(a1, a2)?;
            let s2 = unify(&s1.apply(r1), &s1.apply(r2))?;
            Ok(s2.compose(&s1))
        }

        (Type::Lit(n1, c1), Type::Lit(n2, c2)) => {
            if n1 != n2 {
                return Err(UnifyError::Mismatch {
                    left: t1.clone(),
                    right: t2.clone(),
                });
            }
            if c1.len() != c2.len() {
                return Err(UnifyError::ArityMismatch {
                    left: t1.clone(),
                    right: t2.clone(),
                });
            }
            c1.iter()
                .zip(c2.iter())
                .try_fold(Substitution::empty(), |acc, (a, b)| {
                    let s = unify(&acc.apply(a), &acc.apply(b))?;
                    Ok(s.compose(&acc))
                })
        }

        _ => Err(UnifyError::Mismatch {
            left: t1.clone(),
            right: t2.clone(),
        }),
    }
}
