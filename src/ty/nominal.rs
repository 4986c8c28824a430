//! Types of declarations and annotations.
//!
//! Type annotations are evaluated against the resolved tree: a resolved type
//! reference becomes the nominal type of its referral, and tuple and union
//! annotations evaluate pointwise. Struct field types are only computed when
//! a constructor or field access needs them, and are cached per struct so
//! that unannotated fields keep a single type variable.

use std::collections::HashMap;

use thiserror::Error;

use super::{Nominal, Type};
use crate::{
    ast::{Ast, NodeId, NodeKind},
    span::Span,
    unique::VarSupply,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("type reference at {0} was not resolved")]
    Unresolved(Span),
    #[error("{kind} at {span} is not a type")]
    NotAType { kind: &'static str, span: Span },
}

impl EvalError {
    pub fn span(&self) -> Span {
        match self {
            EvalError::Unresolved(span) | EvalError::NotAType { span, .. } => *span,
        }
    }
}

#[derive(Debug, Default)]
pub struct Nominals {
    fields: HashMap<NodeId, Box<[Type]>>,
}

impl Nominals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluates the type annotation `node`.
    pub fn eval(&self, ast: &Ast, node: NodeId) -> Result<Type, EvalError> {
        match ast.kind(node) {
            NodeKind::TupleType(items) => Ok(Type::Tuple(
                items
                    .iter()
                    .map(|&item| self.eval(ast, item))
                    .collect::<Result<_, _>>()?,
            )),
            NodeKind::UnionType(items) => Ok(Type::Union(
                items
                    .iter()
                    .map(|&item| self.eval(ast, item))
                    .collect::<Result<_, _>>()?,
            )),
            NodeKind::ResolvedType { referral, .. } => {
                Self::declared(ast, *referral)
            }
            NodeKind::TypeReference(_) => {
                Err(EvalError::Unresolved(ast.span(node)))
            }
            kind => Err(EvalError::NotAType {
                kind: kind.describe(),
                span: ast.span(node),
            }),
        }
    }

    /// Evaluates an optional annotation, falling back to a fresh variable.
    pub fn eval_or_fresh(
        &self,
        ast: &Ast,
        vars: &mut VarSupply,
        node: Option<NodeId>,
    ) -> Result<Type, EvalError> {
        match node {
            Some(node) => self.eval(ast, node),
            None => Ok(Type::Var(vars.fresh())),
        }
    }

    /// Returns the type named by the type declaration `decl`.
    pub fn declared(ast: &Ast, decl: NodeId) -> Result<Type, EvalError> {
        let nominal = |name| Nominal {
            name,
            decl,
            inherits: None,
        };

        match ast.kind(decl) {
            NodeKind::Struct { name, .. }
            | NodeKind::ForeignStruct { name, .. } => {
                Ok(Type::Struct(nominal(*name)))
            }
            NodeKind::Trait { name, .. } => Ok(Type::Interface(*name)),
            NodeKind::Enum { name, entries } => Ok(Type::Enum {
                nominal: nominal(*name),
                tags: entries
                    .iter()
                    .map(|&entry| Self::declared(ast, entry))
                    .collect::<Result<_, _>>()?,
            }),
            NodeKind::EnumEntry { name } => Ok(Type::Struct(Nominal {
                name: *name,
                decl,
                inherits: ast.parent(decl),
            })),
            kind => Err(EvalError::NotAType {
                kind: kind.describe(),
                span: ast.span(decl),
            }),
        }
    }

    /// Returns the field types of the struct `decl`, computing them on first
    /// use.
    pub fn fields(
        &mut self,
        ast: &Ast,
        vars: &mut VarSupply,
        decl: NodeId,
    ) -> Result<Box<[Type]>, EvalError> {
        if let Some(fields) = self.fields.get(&decl) {
            return Ok(fields.clone());
        }

        let fields: Box<[Type]> = match ast.kind(decl) {
            NodeKind::Struct { fields, .. } => fields
                .iter()
                .map(|&field| match ast.kind(field) {
                    NodeKind::Parameter { ty, .. } => {
                        self.eval_or_fresh(ast, vars, *ty)
                    }
                    _ => Ok(Type::Var(vars.fresh())),
                })
                .collect::<Result<_, _>>()?,
            _ => Box::new([]),
        };

        self.fields.insert(decl, fields.clone());
        Ok(fields)
    }

    /// Returns the type of the struct field `field`.
    pub fn field(
        &mut self,
        ast: &Ast,
        vars: &mut VarSupply,
        field: NodeId,
    ) -> Result<Option<Type>, EvalError> {
        let Some(owner) = ast.parent(field) else {
            return Ok(None);
        };
        let NodeKind::Struct { fields, .. } = ast.kind(owner) else {
            return Ok(None);
        };
        let Some(index) = fields.iter().position(|&f| f == field) else {
            return Ok(None);
        };

        Ok(self.fields(ast, vars, owner)?.get(index).cloned())
    }

    /// Returns the constructor type `f1 -> ... -> fn -> S` of the struct
    /// `decl`.
    pub fn constructor(
        &mut self,
        ast: &Ast,
        vars: &mut VarSupply,
        decl: NodeId,
    ) -> Result<Type, EvalError> {
        let fields = self.fields(ast, vars, decl)?;
        let output = Self::declared(ast, decl)?;
        Ok(Type::uncurry(fields.into_vec(), output))
    }
}
