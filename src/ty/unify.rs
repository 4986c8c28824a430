//! Syntactic unification of monotypes.
//!
//! The cases are tried in this order:
//! 1. equal types need no substitution;
//! 2. a variable against a type it occurs in is an infinite type;
//! 3. a variable against anything else binds the variable;
//! 4. two functions unify their inputs, then their outputs under the input
//!    substitution;
//! 5. two tuples of equal length unify pairwise, left to right, each pair
//!    under the substitution accumulated so far;
//! 6. anything else does not unify.
//!
//! The occurs check only looks through function types (see
//! [`Type::occurs`]), so a variable may be bound to a tuple containing it.

use thiserror::Error;

use super::{Type, subst::Subst};
use crate::unique::TyVar;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnifyError {
    #[error("cannot unify {0:?} with {1:?}")]
    CannotUnify(Type, Type),
    #[error("type variable {0} occurs in {1:?}")]
    InfiniteType(TyVar, Type),
}

/// Returns a substitution that makes `a` and `b` equal.
pub fn unify(a: &Type, b: &Type) -> Result<Subst, UnifyError> {
    tracing::trace!(?a, ?b, "unify");

    if a == b {
        return Ok(Subst::empty());
    }

    match (a, b) {
        (Type::Var(var), other) | (other, Type::Var(var))
            if other.occurs(*var) =>
        {
            Err(UnifyError::InfiniteType(*var, other.clone()))
        }
        (Type::Var(var), other) | (other, Type::Var(var)) => {
            Ok(Subst::single(*var, other.clone()))
        }
        (Type::Fn(i1, o1), Type::Fn(i2, o2)) => {
            let inputs = unify(i1, i2)?;
            let outputs = unify(&inputs.apply(o1), &inputs.apply(o2))?;
            Ok(outputs.compose(&inputs))
        }
        (Type::Tuple(xs), Type::Tuple(ys)) if xs.len() == ys.len() => {
            xs.iter().zip(ys.iter()).try_fold(Subst::empty(), |acc, (x, y)| {
                let next = unify(&acc.apply(x), &acc.apply(y))?;
                Ok(next.compose(&acc))
            })
        }
        _ => Err(UnifyError::CannotUnify(a.clone(), b.clone())),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use super::{UnifyError, unify};
    use crate::{
        ty::{Type, subst::Subst},
        unique::TyVar,
    };

    fn tv(i: u64) -> TyVar {
        TyVar::from_index(i)
    }

    fn var(i: u64) -> Type {
        Type::Var(tv(i))
    }

    fn func(i: Type, o: Type) -> Type {
        Type::function(i, o)
    }

    /// Types built from variables, primitives and functions only, where the
    /// occurs check is complete.
    fn arb_fn_type() -> impl Strategy<Value = Type> {
        let leaf = prop_oneof![
            (0u64..4).prop_map(|i| Type::Var(TyVar::from_index(i))),
            Just(Type::NUMBER),
            Just(Type::FLOATING),
        ];

        leaf.prop_recursive(4, 16, 2, |inner| {
            (inner.clone(), inner).prop_map(|(i, o)| Type::function(i, o))
        })
    }

    #[test]
    fn equal_types_need_nothing() {
        assert_eq!(unify(&var(0), &var(0)), Ok(Subst::empty()));
        assert_eq!(unify(&Type::NUMBER, &Type::NUMBER), Ok(Subst::empty()));
    }

    #[test]
    fn occurs_check() {
        let t = var(0);
        assert_eq!(
            unify(&t, &func(t.clone(), Type::NUMBER)),
            Err(UnifyError::InfiniteType(tv(0), func(t.clone(), Type::NUMBER)))
        );
        assert_eq!(
            unify(&t, &func(Type::NUMBER, Type::NUMBER)),
            Ok(Subst::single(tv(0), func(Type::NUMBER, Type::NUMBER)))
        );
    }

    #[test]
    fn occurs_check_does_not_look_into_tuples() {
        let tuple = Type::Tuple(Box::new([var(0), Type::NUMBER]));
        assert_eq!(unify(&var(0), &tuple), Ok(Subst::single(tv(0), tuple)));
    }

    #[test]
    fn multiple_substitutions() {
        // a -> b -> a  ~  Number -> c -> c
        let left = Type::uncurry([var(0), var(1)], var(0));
        let right = Type::uncurry([Type::NUMBER, var(2)], var(2));
        let s = unify(&left, &right).unwrap();

        assert_eq!(s.apply(&var(0)), Type::NUMBER);
        assert_eq!(s.apply(&var(2)), Type::NUMBER);
        assert_eq!(s.apply(&left), s.apply(&right));
    }

    #[test]
    fn complex_unification_is_symmetric() {
        // (a -> b) -> a  ~  (Number -> Floating) -> c
        let left = func(func(var(0), var(1)), var(0));
        let right = func(func(Type::NUMBER, Type::FLOATING), var(2));

        let s1 = unify(&left, &right).unwrap();
        let s2 = unify(&right, &left).unwrap();

        for s in [&s1, &s2] {
            assert_eq!(
                s.apply(&left),
                func(func(Type::NUMBER, Type::FLOATING), Type::NUMBER)
            );
            assert_eq!(s.apply(&left), s.apply(&right));
        }
    }

    #[test]
    fn tuples_unify_pairwise() {
        let left = Type::Tuple(Box::new([var(0), var(0)]));
        let right = Type::Tuple(Box::new([Type::NUMBER, var(1)]));
        let s = unify(&left, &right).unwrap();

        assert_eq!(s.apply(&var(1)), Type::NUMBER);
        assert_eq!(s.apply(&left), s.apply(&right));

        let short = Type::Tuple(Box::new([var(0)]));
        assert!(matches!(
            unify(&left, &short),
            Err(UnifyError::CannotUnify(..))
        ));
    }

    #[test]
    fn mismatches() {
        assert_eq!(
            unify(&Type::NUMBER, &Type::FLOATING),
            Err(UnifyError::CannotUnify(Type::NUMBER, Type::FLOATING))
        );
        assert!(unify(&func(Type::NUMBER, var(0)), &Type::unit()).is_err());
    }

    proptest! {
        #[test]
        fn unification_is_symmetric(a in arb_fn_type(), b in arb_fn_type()) {
            let forward = unify(&a, &b);
            let backward = unify(&b, &a);
            prop_assert_eq!(forward.is_ok(), backward.is_ok());

            for s in forward.iter().chain(backward.iter()) {
                prop_assert_eq!(s.apply(&a), s.apply(&b));
            }
        }
    }
}
