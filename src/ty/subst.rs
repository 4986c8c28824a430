//! Substitution sets.

use std::collections::BTreeMap;

use super::Type;
use crate::unique::TyVar;

/// A finite map from type variables to their replacements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subst(BTreeMap<TyVar, Type>);

impl FromIterator<(TyVar, Type)> for Subst {
    fn from_iter<T: IntoIterator<Item = (TyVar, Type)>>(iter: T) -> Self {
        Subst(iter.into_iter().collect())
    }
}

impl Subst {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn single(var: TyVar, ty: Type) -> Self {
        Subst(BTreeMap::from([(var, ty)]))
    }

    pub fn get(&self, var: TyVar) -> Option<&Type> {
        self.0.get(&var)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TyVar, &Type)> + '_ {
        self.0.iter().map(|(var, ty)| (*var, ty))
    }

    /// Returns `self` without the bindings for `vars`.
    pub fn without(&self, vars: impl Fn(TyVar) -> bool) -> Self {
        self.iter()
            .filter(|(var, _)| !vars(*var))
            .map(|(var, ty)| (var, ty.clone()))
            .collect()
    }

    /// Replaces every variable bound by `self` in `ty`.
    ///
    /// Replacements are not themselves rewritten, and nominal types are left
    /// as they are.
    pub fn apply(&self, ty: &Type) -> Type {
        if self.is_empty() {
            return ty.clone();
        }

        match ty {
            Type::Var(var) => self.get(*var).cloned().unwrap_or_else(|| ty.clone()),
            Type::Tuple(items) => {
                Type::Tuple(items.iter().map(|item| self.apply(item)).collect())
            }
            Type::Union(items) => {
                Type::Union(items.iter().map(|item| self.apply(item)).collect())
            }
            Type::Fn(input, output) => {
                Type::function(self.apply(input), self.apply(output))
            }
            Type::Prim(_)
            | Type::Struct(_)
            | Type::Interface(_)
            | Type::Enum { .. }
            | Type::Bottom => ty.clone(),
        }
    }

    /// Returns `self ∘ other`, the substitution that applies `other` first
    /// and `self` second.
    ///
    /// Where both bind a variable, the binding from `other` (with `self`
    /// applied) wins.
    pub fn compose(&self, other: &Subst) -> Subst {
        let mut composed: BTreeMap<_, _> = other
            .iter()
            .map(|(var, ty)| (var, self.apply(ty)))
            .collect();

        for (var, ty) in self.iter() {
            composed.entry(var).or_insert_with(|| ty.clone());
        }

        Subst(composed)
    }
}
