//! Monomorphic types.
//!
//! # Equality
//! Types compare structurally, with two exceptions: nominal types (structs,
//! enums and enum tags) compare by name alone, and unions compare as sets.
//!
//! # Functions
//! Every [`Type::Fn`] has exactly one input and one output. Multi-argument
//! functions are curried with [`Type::uncurry`], and a function taking no
//! arguments takes the unit tuple.
//!
//! # Nominal leaves
//! Struct and enum types never expose their fields or tags to substitution,
//! free-variable collection or the occurs check. Their field types live in
//! [`nominal::Nominals`] and are only computed on demand.

use std::collections::BTreeSet;

use crate::{
    ast::NodeId,
    symbol::{StringInterner, Symbol},
    unique::TyVar,
};

pub mod nominal;
pub mod scheme;
pub mod subst;
pub mod unify;

/// The types of numeric literals, and of conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimTy {
    Number,
    Floating,
    Bool,
}

/// A type identified by its name.
#[derive(Debug, Clone, Copy)]
pub struct Nominal {
    pub name: Symbol,
    pub decl: NodeId,
    /// For enum tags, the enum the tag belongs to.
    pub inherits: Option<NodeId>,
}

impl PartialEq for Nominal {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Nominal {}

#[derive(Debug, Clone)]
pub enum Type {
    Var(TyVar),
    Prim(PrimTy),
    /// The empty tuple is the unit type.
    Tuple(Box<[Type]>),
    Union(Box<[Type]>),
    Fn(Box<Type>, Box<Type>),
    Struct(Nominal),
    Interface(Symbol),
    Enum {
        nominal: Nominal,
        tags: Box<[Type]>,
    },
    /// The uninhabited type.
    Bottom,
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Type::Var(a), Type::Var(b)) => a == b,
            (Type::Prim(a), Type::Prim(b)) => a == b,
            (Type::Tuple(a), Type::Tuple(b)) => a == b,
            (Type::Union(a), Type::Union(b)) => {
                a.iter().all(|ty| b.contains(ty))
                    && b.iter().all(|ty| a.contains(ty))
            }
            (Type::Fn(i1, o1), Type::Fn(i2, o2)) => i1 == i2 && o1 == o2,
            (Type::Struct(a), Type::Struct(b)) => a == b,
            (Type::Interface(a), Type::Interface(b)) => a == b,
            (Type::Enum { nominal: a, .. }, Type::Enum { nominal: b, .. }) => {
                a == b
            }
            (Type::Bottom, Type::Bottom) => true,
            _ => false,
        }
    }
}

impl Eq for Type {}

impl From<PrimTy> for Type {
    fn from(value: PrimTy) -> Self {
        Type::Prim(value)
    }
}

impl From<TyVar> for Type {
    fn from(value: TyVar) -> Self {
        Type::Var(value)
    }
}

impl Type {
    pub const NUMBER: Type = Type::Prim(PrimTy::Number);
    pub const FLOATING: Type = Type::Prim(PrimTy::Floating);
    pub const BOOL: Type = Type::Prim(PrimTy::Bool);

    pub fn unit() -> Self {
        Type::Tuple(Box::new([]))
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Type::Tuple(items) if items.is_empty())
    }

    pub fn function(input: Type, output: Type) -> Self {
        Type::Fn(Box::new(input), Box::new(output))
    }

    /// Builds `a1 -> a2 -> ... -> output`, or `() -> output` without
    /// arguments.
    pub fn uncurry(
        inputs: impl IntoIterator<Item = Type, IntoIter: DoubleEndedIterator>,
        output: Type,
    ) -> Self {
        let mut inputs = inputs.into_iter().rev().peekable();

        if inputs.peek().is_none() {
            return Type::function(Type::unit(), output);
        }

        inputs.fold(output, |acc, input| Type::function(input, acc))
    }

    /// Returns every type variable occurring in `self`, in ascending order.
    pub fn free_vars(&self) -> BTreeSet<TyVar> {
        let mut vars = BTreeSet::new();
        self.collect_vars(&mut vars);
        vars
    }

    fn collect_vars(&self, vars: &mut BTreeSet<TyVar>) {
        match self {
            Type::Var(var) => {
                vars.insert(*var);
            }
            Type::Tuple(items) | Type::Union(items) => {
                items.iter().for_each(|ty| ty.collect_vars(vars));
            }
            Type::Fn(input, output) => {
                input.collect_vars(vars);
                output.collect_vars(vars);
            }
            Type::Prim(_)
            | Type::Struct(_)
            | Type::Interface(_)
            | Type::Enum { .. }
            | Type::Bottom => (),
        }
    }

    /// Whether `var` occurs in `self`, looking through function inputs and
    /// outputs only.
    pub fn occurs(&self, var: TyVar) -> bool {
        match self {
            Type::Var(other) => *other == var,
            Type::Fn(input, output) => input.occurs(var) || output.occurs(var),
            _ => false,
        }
    }

    /// Renders `self`, looking up nominal names in `interner`.
    pub fn display<'a>(&'a self, interner: &'a StringInterner) -> TypeDisplay<'a> {
        TypeDisplay {
            ty: self,
            names: Names {
                interner,
                renames: &[],
            },
        }
    }
}

/// Name lookup for rendering: the interner for nominal types, plus an
/// optional renaming of variables.
#[derive(Clone, Copy)]
pub(crate) struct Names<'a> {
    pub interner: &'a StringInterner,
    pub renames: &'a [(TyVar, TyVar)],
}

impl Names<'_> {
    fn var(&self, var: TyVar) -> TyVar {
        self.renames
            .iter()
            .find_map(|(from, to)| (*from == var).then_some(*to))
            .unwrap_or(var)
    }
}

pub struct TypeDisplay<'a> {
    ty: &'a Type,
    names: Names<'a>,
}

impl<'a> TypeDisplay<'a> {
    pub(crate) fn new(ty: &'a Type, names: Names<'a>) -> Self {
        Self { ty, names }
    }
}

impl std::fmt::Display for TypeDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write_type(f, self.ty, self.names, Position::Top)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Position {
    Top,
    FnInput,
}

fn write_type(
    f: &mut std::fmt::Formatter<'_>,
    ty: &Type,
    names: Names<'_>,
    position: Position,
) -> std::fmt::Result {
    match ty {
        Type::Var(var) => write!(f, "{}", names.var(*var)),
        Type::Prim(PrimTy::Number) => f.write_str("Number"),
        Type::Prim(PrimTy::Floating) => f.write_str("Floating"),
        Type::Prim(PrimTy::Bool) => f.write_str("Bool"),
        Type::Tuple(items) => {
            f.write_str("(")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_type(f, item, names, Position::Top)?;
            }
            if items.len() == 1 {
                f.write_str(",")?;
            }
            f.write_str(")")
        }
        Type::Union(items) => {
            let parens = position == Position::FnInput;
            if parens {
                f.write_str("(")?;
            }
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(" | ")?;
                }
                write_type(f, item, names, Position::FnInput)?;
            }
            if parens {
                f.write_str(")")?;
            }
            Ok(())
        }
        Type::Fn(input, output) => {
            let parens = position == Position::FnInput;
            if parens {
                f.write_str("(")?;
            }
            write_type(f, input, names, Position::FnInput)?;
            f.write_str(" -> ")?;
            write_type(f, output, names, Position::Top)?;
            if parens {
                f.write_str(")")?;
            }
            Ok(())
        }
        Type::Struct(Nominal { name, .. })
        | Type::Interface(name)
        | Type::Enum {
            nominal: Nominal { name, .. },
            ..
        } => f.write_str(names.interner.display(*name)),
        Type::Bottom => f.write_str("!"),
    }
}
