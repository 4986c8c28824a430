//! Reference and type-reference resolution.
//!
//! # Unqualified names
//! A lookup starts in the innermost scope around the reference and asks each
//! scope in turn. A scope either answers (one declaration, or an ambiguity),
//! gives up for good (modules are the ceiling), or passes the question on to
//! the scope [`ScopeTree::escalate`] names.
//!
//! A block answers with every sibling binding of that name, wherever it
//! sits in the block, so two bindings sharing a name are ambiguous for
//! every reference inside it.
//!
//! # Qualified names
//! `::A::B::x` starts at the file's module list, `::x` at the enclosing
//! module, and `A::B::x` at whatever the type name `A` resolves to. Each link
//! narrows into the members of the previous one, and the final name is
//! matched against the last link without escalating.

use thiserror::Error;

use crate::{
    ast::{Ast, NodeId, NodeKind, Reference, ResolutionContext},
    scope::{ScopeId, ScopeTree},
    symbol::Symbol,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no matching declaration")]
    NotFound,
    #[error("{} declarations match", .0.len())]
    Multiple(Box<[NodeId]>),
}

/// The outcome of asking a single scope.
#[derive(Debug)]
enum FlowControl {
    NotFound,
    Multiple(Box<[NodeId]>),
    /// Ask the next scope outwards.
    RecurseUp,
}

impl From<FlowControl> for ResolveError {
    fn from(value: FlowControl) -> Self {
        match value {
            FlowControl::Multiple(candidates) => {
                ResolveError::Multiple(candidates)
            }
            FlowControl::NotFound | FlowControl::RecurseUp => {
                ResolveError::NotFound
            }
        }
    }
}

type Flow<T = NodeId> = Result<T, FlowControl>;

/// Expects exactly one candidate; `on_empty` decides what zero means.
fn only_unique(
    candidates: impl IntoIterator<Item = NodeId>,
    on_empty: FlowControl,
) -> Flow {
    let candidates: Vec<_> = candidates.into_iter().collect();

    match candidates.as_slice() {
        [] => Err(on_empty),
        [single] => Ok(*single),
        _ => Err(FlowControl::Multiple(candidates.into_boxed_slice())),
    }
}

/// Which kind of name a lookup is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Namespace {
    Value,
    Type,
}

pub struct Resolver<'a> {
    ast: &'a Ast,
    scopes: &'a ScopeTree,
}

impl<'a> Resolver<'a> {
    pub fn new(ast: &'a Ast, scopes: &'a ScopeTree) -> Self {
        Self { ast, scopes }
    }

    /// Resolves the expression-position `reference` located at `at`.
    pub fn resolve_reference(
        &self,
        at: NodeId,
        reference: &Reference,
    ) -> Result<NodeId, ResolveError> {
        self.resolve_in(at, reference, Namespace::Value)
    }

    /// Resolves the type-position `reference` located at `at`.
    pub fn resolve_type_reference(
        &self,
        at: NodeId,
        reference: &Reference,
    ) -> Result<NodeId, ResolveError> {
        self.resolve_in(at, reference, Namespace::Type)
    }

    /// Resolves every unresolved reference in the tree, in pre-order.
    pub fn resolve_all_references(
        &self,
    ) -> Vec<(NodeId, Reference, Result<NodeId, ResolveError>)> {
        self.collect(Namespace::Value)
    }

    /// Resolves every unresolved type reference in the tree, in pre-order.
    pub fn resolve_all_type_references(
        &self,
    ) -> Vec<(NodeId, Reference, Result<NodeId, ResolveError>)> {
        self.collect(Namespace::Type)
    }

    fn collect(
        &self,
        namespace: Namespace,
    ) -> Vec<(NodeId, Reference, Result<NodeId, ResolveError>)> {
        self.ast
            .walk()
            .into_iter()
            .filter_map(|id| match (self.ast.kind(id), namespace) {
                (NodeKind::Reference(reference), Namespace::Value)
                | (NodeKind::TypeReference(reference), Namespace::Type) => {
                    Some((id, reference.clone()))
                }
                _ => None,
            })
            .map(|(id, reference)| {
                let result = self.resolve_in(id, &reference, namespace);
                (id, reference, result)
            })
            .collect()
    }

    fn resolve_in(
        &self,
        at: NodeId,
        reference: &Reference,
        namespace: Namespace,
    ) -> Result<NodeId, ResolveError> {
        let result = match &reference.context {
            None => self.lookup(at, reference.name, namespace),
            Some(ResolutionContext { from_root, chain })
                if !from_root && chain.is_empty() =>
            {
                self.lookup(at, reference.name, namespace)
            }
            Some(context) => self
                .resolve_chain(at, context)
                .and_then(|container| {
                    self.member(container, reference.name, namespace)
                }),
        };

        tracing::trace!(
            name = self.ast.symbol_str(reference.name),
            ?namespace,
            ?result,
            "resolved"
        );
        result.map_err(ResolveError::from)
    }

    // UNQUALIFIED LOOKUP

    fn lookup(&self, at: NodeId, name: Symbol, namespace: Namespace) -> Flow {
        let mut current = self.scopes.enclosing(self.ast, at);

        while let Some(scope) = current {
            let answer = match namespace {
                Namespace::Value => self.ask_for_value(scope, name),
                Namespace::Type => self.ask_for_type(scope, name),
            };

            match answer {
                Err(FlowControl::RecurseUp) => {
                    current = self.scopes.escalate(scope);
                }
                answer => return answer,
            }
        }

        Err(FlowControl::NotFound)
    }

    fn ask_for_value(&self, scope: ScopeId, name: Symbol) -> Flow {
        let scope = &self.scopes[scope];
        let anchor = scope.anchor;

        match self.ast.kind(anchor) {
            NodeKind::Module { .. } => only_unique(
                self.named(&scope.declarations, name),
                FlowControl::NotFound,
            ),
            NodeKind::Function { name: own, .. }
            | NodeKind::AbstractFunction { name: own, .. }
            | NodeKind::ForeignFunction { name: own, .. }
            | NodeKind::Var { name: own, .. }
                if *own == name =>
            {
                Ok(anchor)
            }
            NodeKind::Var { .. } => Err(FlowControl::RecurseUp),
            _ => only_unique(
                self.named(&scope.declarations, name),
                FlowControl::RecurseUp,
            ),
        }
    }

    fn ask_for_type(&self, scope: ScopeId, name: Symbol) -> Flow {
        let anchor = self.scopes[scope].anchor;

        match self.ast.kind(anchor) {
            NodeKind::Module { items, .. } => only_unique(
                self.named_types(items, name),
                FlowControl::NotFound,
            ),
            NodeKind::Enum { entries, .. } => {
                only_unique(self.named(entries, name), FlowControl::RecurseUp)
            }
            NodeKind::Struct { name: own, .. }
            | NodeKind::Trait { name: own, .. }
                if *own == name =>
            {
                Ok(anchor)
            }
            _ => Err(FlowControl::RecurseUp),
        }
    }

    // QUALIFIED LOOKUP

    fn resolve_chain(&self, at: NodeId, context: &ResolutionContext) -> Flow {
        let (first, rest) = match (context.from_root, context.chain.split_first()) {
            (true, None) => {
                let module = self
                    .ast
                    .ancestors(at)
                    .find(|&node| matches!(self.ast.kind(node), NodeKind::Module { .. }));
                return module.ok_or(FlowControl::NotFound);
            }
            (true, Some((head, rest))) => {
                let NodeKind::File { modules } = self.ast.kind(self.ast.root()) else {
                    return Err(FlowControl::NotFound);
                };
                (only_unique(self.named(modules, *head), FlowControl::NotFound)?, rest)
            }
            (false, Some((head, rest))) => {
                (self.lookup(at, *head, Namespace::Type)?, rest)
            }
            (false, None) => return Err(FlowControl::NotFound),
        };

        rest.iter()
            .try_fold(first, |container, &link| self.narrow(container, link))
    }

    /// Steps from `container` into its member named `link`.
    fn narrow(&self, container: NodeId, link: Symbol) -> Flow {
        let candidates = match self.ast.kind(container) {
            NodeKind::Module { items, .. } => self.named_types(items, link),
            NodeKind::Enum { entries, .. } => self.named(entries, link),
            NodeKind::Struct {
                fields, members, ..
            } => {
                let mut candidates = self.named(fields, link);
                candidates.extend(self.named(members, link));
                candidates
            }
            NodeKind::Trait { members, .. } => self.named(members, link),
            _ => Vec::new(),
        };

        only_unique(candidates, FlowControl::NotFound)
    }

    /// Matches `name` against the members of `container`, without escalating.
    fn member(&self, container: NodeId, name: Symbol, namespace: Namespace) -> Flow {
        match (self.ast.kind(container), namespace) {
            (NodeKind::Module { items, .. }, Namespace::Type) => {
                only_unique(self.named_types(items, name), FlowControl::NotFound)
            }
            (NodeKind::Module { items, .. }, Namespace::Value) => {
                only_unique(self.named(items, name), FlowControl::NotFound)
            }
            (NodeKind::Enum { entries, .. }, _) => {
                only_unique(self.named(entries, name), FlowControl::NotFound)
            }
            (_, Namespace::Value) => self.narrow(container, name),
            (_, Namespace::Type) => Err(FlowControl::NotFound),
        }
    }

    // HELPERS

    fn named(&self, nodes: &[NodeId], name: Symbol) -> Vec<NodeId> {
        nodes
            .iter()
            .copied()
            .filter(|&node| self.ast.kind(node).name() == Some(name))
            .collect()
    }

    fn named_types(&self, nodes: &[NodeId], name: Symbol) -> Vec<NodeId> {
        nodes
            .iter()
            .copied()
            .filter(|&node| {
                let kind = self.ast.kind(node);
                kind.is_type_decl() && kind.name() == Some(name)
            })
            .collect()
    }
}
