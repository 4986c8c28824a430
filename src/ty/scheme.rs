//! Type schemes (polytypes).

use std::collections::BTreeSet;

use super::{Names, Type, TypeDisplay, subst::Subst};
use crate::{symbol::StringInterner, unique::{TyVar, VarSupply}};

/// A type quantified over a set of variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeScheme {
    pub bound: BTreeSet<TyVar>,
    pub body: Type,
}

impl From<Type> for TypeScheme {
    fn from(value: Type) -> Self {
        Self::mono(value)
    }
}

impl TypeScheme {
    pub fn new(bound: impl IntoIterator<Item = TyVar>, body: Type) -> Self {
        Self {
            bound: bound.into_iter().collect(),
            body,
        }
    }

    /// A scheme that quantifies nothing.
    pub fn mono(body: Type) -> Self {
        Self {
            bound: BTreeSet::new(),
            body,
        }
    }

    /// Quantifies every variable of `body`.
    pub fn closed(body: Type) -> Self {
        Self {
            bound: body.free_vars(),
            body,
        }
    }

    pub fn is_mono(&self) -> bool {
        self.bound.is_empty()
    }

    pub fn free_vars(&self) -> BTreeSet<TyVar> {
        self.body
            .free_vars()
            .difference(&self.bound)
            .copied()
            .collect()
    }

    /// Applies `subst` to the body, leaving bound variables untouched.
    pub fn substitute(&self, subst: &Subst) -> Self {
        let subst = subst.without(|var| self.bound.contains(&var));
        Self {
            bound: self.bound.clone(),
            body: subst.apply(&self.body),
        }
    }

    /// Replaces every bound variable with a fresh one.
    pub fn instantiate(&self, vars: &mut VarSupply) -> Type {
        if self.is_mono() {
            return self.body.clone();
        }

        let fresh: Subst = self
            .bound
            .iter()
            .map(|&var| (var, Type::Var(vars.fresh())))
            .collect();
        fresh.apply(&self.body)
    }

    /// Renders `self` as `∀a, b. body`, renaming the bound variables in
    /// order of their first appearance.
    pub fn display<'a>(
        &'a self,
        interner: &'a StringInterner,
    ) -> SchemeDisplay<'a> {
        let free = self.free_vars();
        let mut renames = Vec::with_capacity(self.bound.len());
        let mut next = 0;

        for var in appearance_order(&self.body) {
            if !self.bound.contains(&var) || renames.iter().any(|(v, _)| *v == var)
            {
                continue;
            }

            let name = loop {
                let candidate = TyVar::from_index(next);
                next += 1;
                if !free.contains(&candidate) {
                    break candidate;
                }
            };
            renames.push((var, name));
        }

        SchemeDisplay {
            scheme: self,
            interner,
            renames,
        }
    }
}

fn appearance_order(ty: &Type) -> Vec<TyVar> {
    fn visit(ty: &Type, out: &mut Vec<TyVar>) {
        match ty {
            Type::Var(var) => out.push(*var),
            Type::Tuple(items) | Type::Union(items) => {
                items.iter().for_each(|item| visit(item, out));
            }
            Type::Fn(input, output) => {
                visit(input, out);
                visit(output, out);
            }
            _ => (),
        }
    }

    let mut out = Vec::new();
    visit(ty, &mut out);
    out
}

pub struct SchemeDisplay<'a> {
    scheme: &'a TypeScheme,
    interner: &'a StringInterner,
    renames: Vec<(TyVar, TyVar)>,
}

impl std::fmt::Display for SchemeDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.renames.is_empty() {
            f.write_str("∀")?;
            for (i, (_, name)) in self.renames.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{name}")?;
            }
            f.write_str(". ")?;
        }

        let names = Names {
            interner: self.interner,
            renames: &self.renames,
        };
        write!(f, "{}", TypeDisplay::new(&self.scheme.body, names))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::TypeScheme;
    use crate::{
        symbol::StringInterner,
        ty::{Type, subst::Subst},
        unique::{TyVar, VarSupply},
    };

    fn var(i: u64) -> Type {
        Type::Var(TyVar::from_index(i))
    }

    #[test]
    fn substitution_skips_bound_vars() {
        let scheme = TypeScheme::new(
            [TyVar::from_index(0)],
            Type::function(var(0), var(1)),
        );
        let subst: Subst = [
            (TyVar::from_index(0), Type::NUMBER),
            (TyVar::from_index(1), Type::FLOATING),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            scheme.substitute(&subst).body,
            Type::function(var(0), Type::FLOATING)
        );
    }

    #[test]
    fn instantiation_is_fresh() {
        let mut vars = VarSupply::new();
        let a = vars.fresh();
        let scheme = TypeScheme::closed(Type::function(Type::Var(a), Type::Var(a)));

        let first = scheme.instantiate(&mut vars);
        let second = scheme.instantiate(&mut vars);

        assert_ne!(first, second);
        assert_eq!(first.free_vars().len(), 1);
        assert!(!first.free_vars().contains(&a));
    }

    #[test]
    fn display_renames_bound_vars() {
        let interner = StringInterner::new();
        let scheme = TypeScheme::new(
            [TyVar::from_index(7), TyVar::from_index(3)],
            Type::uncurry([var(7), var(3)], var(7)),
        );
        assert_eq!(scheme.display(&interner).to_string(), "∀a, b. a -> b -> a");

        let partly_free = TypeScheme::new(
            [TyVar::from_index(5)],
            Type::function(var(5), var(0)),
        );
        assert_eq!(partly_free.display(&interner).to_string(), "∀b. b -> a");

        let mono = TypeScheme::mono(Type::NUMBER);
        assert_eq!(mono.display(&interner).to_string(), "Number");
    }
}
