//! Syntax-directed type inference (Algorithm W) over core terms.
//!
//! # Rules
//! - `x`: instantiate the scheme of `x`.
//! - `f(a)`: infer `f`, then `a` under the first substitution, then unify
//!   the function type with `typeof(a) -> β` for a fresh `β`.
//! - `λx. e`: bind `x` to a fresh variable (or its annotated type) and infer
//!   `e`.
//! - `let x = e in u`: infer `e`, unify with the annotation of `x` if there
//!   is one, generalize against the substituted context, and infer `u` with
//!   `x` bound to the resulting scheme.
//! - literals have fixed types; tuples infer their items left to right.
//!
//! Substitutions are threaded as return values. The only state an
//! [`Inferencer`] carries is its [`VarSupply`] and the types it records for
//! call and lambda expressions.

use thiserror::Error;

use crate::{
    ast::NodeId,
    lang::{Literal, Term, Var},
    ty::{
        Type,
        scheme::TypeScheme,
        subst::Subst,
        unify::{UnifyError, unify},
    },
    unique::{TyVar, VarSupply},
};

use assumptions::Assumptions;

pub mod assumptions;
pub mod decls;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InferError {
    #[error("unknown variable {0:?}")]
    UnknownVariable(Var),
    #[error("type variable {0} occurs in {1:?}")]
    InfiniteType(TyVar, Type),
    #[error("cannot unify {0:?} with {1:?}")]
    CannotUnify(Type, Type),
}

impl From<UnifyError> for InferError {
    fn from(value: UnifyError) -> Self {
        match value {
            UnifyError::CannotUnify(a, b) => InferError::CannotUnify(a, b),
            UnifyError::InfiniteType(var, ty) => InferError::InfiniteType(var, ty),
        }
    }
}

type Result<T, E = InferError> = std::result::Result<T, E>;

/// Infers the type of `term` under `ctx`.
pub fn infer(
    term: &Term,
    ctx: &Assumptions,
    vars: &mut VarSupply,
) -> Result<(Subst, Type)> {
    Inferencer::new(vars).infer(term, ctx)
}

pub struct Inferencer<'v> {
    vars: &'v mut VarSupply,
    judgements: Vec<(NodeId, Type)>,
}

impl<'v> Inferencer<'v> {
    pub fn new(vars: &'v mut VarSupply) -> Self {
        Self {
            vars,
            judgements: Vec::new(),
        }
    }

    pub fn fresh(&mut self) -> Type {
        Type::Var(self.vars.fresh())
    }

    /// The types recorded so far for expressions with an origin, as inferred
    /// at the time. Callers apply their final substitution to them.
    pub fn judgements(&self) -> &[(NodeId, Type)] {
        &self.judgements
    }

    pub fn into_judgements(self) -> Vec<(NodeId, Type)> {
        self.judgements
    }

    pub fn infer(&mut self, term: &Term, ctx: &Assumptions) -> Result<(Subst, Type)> {
        match term {
            Term::Var(var) => match ctx.get(var) {
                Some(scheme) => Ok((Subst::empty(), scheme.instantiate(self.vars))),
                None => Err(InferError::UnknownVariable(*var)),
            },
            Term::App { arg, func, origin } => {
                let (s1, t1) = self.infer(func, ctx)?;
                let (s2, t2) = self.infer(arg, &ctx.substitute(&s1))?;
                let beta = self.fresh();
                let s3 = unify(&s2.apply(&t1), &Type::function(t2, beta.clone()))?;

                let ty = s3.apply(&beta);
                self.record(*origin, &ty);
                Ok((s3.compose(&s2).compose(&s1), ty))
            }
            Term::Lambda { bind, body, origin } => {
                let beta = match (bind, ctx.get(bind)) {
                    (Var::Decl(_), Some(scheme)) if scheme.is_mono() => {
                        scheme.body.clone()
                    }
                    _ => self.fresh(),
                };
                let extended = ctx.with(*bind, TypeScheme::mono(beta.clone()));
                let (s1, t1) = self.infer(body, &extended)?;

                let ty = Type::function(s1.apply(&beta), t1);
                self.record(*origin, &ty);
                Ok((s1, ty))
            }
            Term::Let {
                binder,
                bind,
                usage,
            } => {
                let (mut s1, mut t1) = self.infer(binder, ctx)?;

                if let (Var::Decl(_), Some(annotation)) = (bind, ctx.get(bind)) {
                    let expected = annotation.substitute(&s1).instantiate(self.vars);
                    let su = unify(&expected, &t1)?;
                    t1 = su.apply(&t1);
                    s1 = su.compose(&s1);
                }

                let reduced = ctx.substitute(&s1).without(bind);
                let scheme = reduced.generalize(&t1);
                let (s2, t2) = self.infer(usage, &reduced.with(*bind, scheme))?;
                Ok((s2.compose(&s1), t2))
            }
            Term::Literal(Literal::Number(_)) => Ok((Subst::empty(), Type::NUMBER)),
            Term::Literal(Literal::Floating(_)) => {
                Ok((Subst::empty(), Type::FLOATING))
            }
            Term::Literal(Literal::Tuple(items)) => {
                let mut subst = Subst::empty();
                let mut types: Vec<Type> = Vec::with_capacity(items.len());

                for item in items.iter() {
                    let (s, t) = self.infer(item, &ctx.substitute(&subst))?;
                    types.iter_mut().for_each(|ty| *ty = s.apply(ty));
                    types.push(t);
                    subst = s.compose(&subst);
                }

                Ok((subst, Type::Tuple(types.into_boxed_slice())))
            }
        }
    }

    fn record(&mut self, origin: Option<NodeId>, ty: &Type) {
        if let Some(origin) = origin {
            self.judgements.push((origin, ty.clone()));
        }
    }
}
