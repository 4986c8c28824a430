//! Typing contexts.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    lang::{Builtin, Var},
    ty::{Type, scheme::TypeScheme, subst::Subst},
    unique::{TyVar, VarSupply},
};

/// An ordered map from core variables to their type schemes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assumptions(BTreeMap<Var, TypeScheme>);

impl FromIterator<(Var, TypeScheme)> for Assumptions {
    fn from_iter<T: IntoIterator<Item = (Var, TypeScheme)>>(iter: T) -> Self {
        Assumptions(iter.into_iter().collect())
    }
}

impl Extend<(Var, TypeScheme)> for Assumptions {
    fn extend<T: IntoIterator<Item = (Var, TypeScheme)>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

impl Assumptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// The schemes of every [`Builtin`].
    pub fn prelude(vars: &mut VarSupply) -> Self {
        Builtin::ALL
            .into_iter()
            .map(|builtin| {
                let a = Type::Var(vars.fresh());
                let body = match builtin {
                    Builtin::Fix => Type::function(
                        Type::function(a.clone(), a.clone()),
                        a,
                    ),
                    Builtin::Assign => Type::uncurry([a.clone(), a], Type::unit()),
                    Builtin::If => {
                        Type::uncurry([Type::BOOL, a.clone(), a.clone()], a)
                    }
                    Builtin::While => Type::uncurry([Type::BOOL, a], Type::unit()),
                };
                (Var::Builtin(builtin), TypeScheme::closed(body))
            })
            .collect()
    }

    pub fn get(&self, var: &Var) -> Option<&TypeScheme> {
        self.0.get(var)
    }

    pub fn contains(&self, var: &Var) -> bool {
        self.0.contains_key(var)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Var, &TypeScheme)> + '_ {
        self.0.iter()
    }

    pub fn insert(&mut self, var: Var, scheme: TypeScheme) {
        self.0.insert(var, scheme);
    }

    /// Returns `self` extended with `var`, replacing any earlier binding.
    pub fn with(&self, var: Var, scheme: TypeScheme) -> Self {
        let mut extended = self.clone();
        extended.insert(var, scheme);
        extended
    }

    pub fn without(&self, var: &Var) -> Self {
        let mut reduced = self.clone();
        reduced.0.remove(var);
        reduced
    }

    /// Returns the union of both contexts; bindings in `other` win.
    pub fn combine(&self, other: &Assumptions) -> Self {
        let mut combined = self.clone();
        combined.extend(other.iter().map(|(var, scheme)| (*var, scheme.clone())));
        combined
    }

    pub fn substitute(&self, subst: &Subst) -> Self {
        if subst.is_empty() {
            return self.clone();
        }

        self.iter()
            .map(|(var, scheme)| (*var, scheme.substitute(subst)))
            .collect()
    }

    pub fn free_vars(&self) -> BTreeSet<TyVar> {
        self.0.values().flat_map(TypeScheme::free_vars).collect()
    }

    /// Quantifies the variables of `ty` that are not free in `self`.
    pub fn generalize(&self, ty: &Type) -> TypeScheme {
        let context = self.free_vars();
        let bound = ty
            .free_vars()
            .into_iter()
            .filter(|var| !context.contains(var));
        TypeScheme::new(bound, ty.clone())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::Assumptions;
    use crate::{
        lang::{Builtin, Var},
        symbol::StringInterner,
        ty::{Type, scheme::TypeScheme, subst::Subst},
        unique::VarSupply,
    };

    #[test]
    fn generalize_excludes_context_vars() {
        let mut vars = VarSupply::new();
        let a = vars.fresh();
        let b = vars.fresh();
        let ctx = Assumptions::new()
            .with(Var::Synthetic(0), TypeScheme::mono(Type::Var(a)));

        let scheme = ctx.generalize(&Type::function(Type::Var(a), Type::Var(b)));
        assert_eq!(scheme.bound.into_iter().collect::<Vec<_>>(), vec![b]);
    }

    #[test]
    fn substitution_reaches_every_scheme() {
        let mut vars = VarSupply::new();
        let a = vars.fresh();
        let ctx = Assumptions::new()
            .with(Var::Synthetic(0), TypeScheme::mono(Type::Var(a)))
            .with(Var::Synthetic(1), TypeScheme::closed(Type::Var(a)));

        let ctx = ctx.substitute(&Subst::single(a, Type::NUMBER));
        assert_eq!(ctx.get(&Var::Synthetic(0)).unwrap().body, Type::NUMBER);
        assert_eq!(ctx.get(&Var::Synthetic(1)).unwrap().body, Type::Var(a));
    }

    #[test]
    fn combine_prefers_right() {
        let left = Assumptions::new()
            .with(Var::Synthetic(0), TypeScheme::mono(Type::NUMBER))
            .with(Var::Synthetic(1), TypeScheme::mono(Type::NUMBER));
        let right = Assumptions::new()
            .with(Var::Synthetic(0), TypeScheme::mono(Type::FLOATING));

        let combined = left.combine(&right);
        assert_eq!(combined.len(), 2);
        assert_eq!(
            combined.get(&Var::Synthetic(0)).unwrap().body,
            Type::FLOATING
        );
        assert!(!combined.without(&Var::Synthetic(1)).contains(&Var::Synthetic(1)));
    }

    #[test]
    fn prelude_is_closed() {
        let mut vars = VarSupply::new();
        let prelude = Assumptions::prelude(&mut vars);
        let interner = StringInterner::new();

        assert!(prelude.free_vars().is_empty());
        assert_eq!(
            prelude
                .get(&Var::Builtin(Builtin::Fix))
                .unwrap()
                .display(&interner)
                .to_string(),
            "∀a. (a -> a) -> a"
        );
        assert_eq!(
            prelude
                .get(&Var::Builtin(Builtin::Assign))
                .unwrap()
                .display(&interner)
                .to_string(),
            "∀a. a -> a -> ()"
        );
        assert_eq!(
            prelude
                .get(&Var::Builtin(Builtin::If))
                .unwrap()
                .display(&interner)
                .to_string(),
            "∀a. Bool -> a -> a -> a"
        );
        assert_eq!(
            prelude
                .get(&Var::Builtin(Builtin::While))
                .unwrap()
                .display(&interner)
                .to_string(),
            "∀a. Bool -> a -> ()"
        );
    }
}
