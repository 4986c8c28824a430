//! Lexical scopes over an [`Ast`].
//!
//! A [`ScopeTree`] is built once per compilation unit, in a single top-down
//! walk, and is immutable afterwards. Each scope is anchored at the node that
//! introduces it and records the declarations bound directly inside it:
//!
//! | anchor | kind | declarations |
//! |---|---|---|
//! | module | [`ScopeKind::Global`] | module items |
//! | struct | [`ScopeKind::Object`] | fields and members |
//! | trait | [`ScopeKind::Object`] | members |
//! | enum | [`ScopeKind::Object`] | entries |
//! | function | [`ScopeKind::Protected`] | parameters |
//! | block | [`ScopeKind::Local`] | variables and functions |
//! | lambda | [`ScopeKind::Local`] | parameters |
//! | variable | [`ScopeKind::Local`] | nothing; the variable is the anchor |

use std::collections::HashMap;

use crate::ast::{Ast, NodeId, NodeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    Global,
    Object,
    Protected,
    Local,
}

impl ScopeKind {
    /// Returns the kind of scope `kind` introduces, if any.
    fn of(kind: &NodeKind) -> Option<Self> {
        match kind {
            NodeKind::Module { .. } => Some(ScopeKind::Global),
            NodeKind::Struct { .. }
            | NodeKind::Trait { .. }
            | NodeKind::Enum { .. } => Some(ScopeKind::Object),
            NodeKind::Function { .. }
            | NodeKind::AbstractFunction { .. }
            | NodeKind::ForeignFunction { .. } => Some(ScopeKind::Protected),
            NodeKind::Block { .. }
            | NodeKind::Lambda { .. }
            | NodeKind::Var { .. } => Some(ScopeKind::Local),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u32);

#[derive(Debug, Clone)]
pub struct Scope {
    pub anchor: NodeId,
    pub kind: ScopeKind,
    /// `None` exactly for [`ScopeKind::Global`] scopes.
    pub parent: Option<ScopeId>,
    pub declarations: Box<[NodeId]>,
}

#[derive(Debug, Clone, Default)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
    by_anchor: HashMap<NodeId, ScopeId>,
}

impl std::ops::Index<ScopeId> for ScopeTree {
    type Output = Scope;

    fn index(&self, id: ScopeId) -> &Self::Output {
        &self.scopes[id.0 as usize]
    }
}

impl ScopeTree {
    #[tracing::instrument(level = "debug", skip_all, fields(file = ast.file()))]
    pub fn build(ast: &Ast) -> Self {
        let mut tree = ScopeTree::default();
        let mut stack = vec![(ast.root(), None)];

        while let Some((node, enclosing)) = stack.pop() {
            let kind = ast.kind(node);
            let current = match ScopeKind::of(kind) {
                Some(scope_kind) => Some(tree.push(Scope {
                    anchor: node,
                    kind: scope_kind,
                    parent: enclosing,
                    declarations: declarations(ast, kind),
                })),
                None => enclosing,
            };

            stack.extend(
                kind.children().into_iter().rev().map(|child| (child, current)),
            );
        }

        tracing::debug!(scopes = tree.scopes.len(), "built scope tree");
        tree
    }

    fn push(&mut self, scope: Scope) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.by_anchor.insert(scope.anchor, id);
        self.scopes.push(scope);
        id
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ScopeId, &Scope)> + '_ {
        self.scopes
            .iter()
            .enumerate()
            .map(|(i, scope)| (ScopeId(i as u32), scope))
    }

    /// Returns the scope anchored at `node`, if there is one.
    pub fn anchored_at(&self, node: NodeId) -> Option<ScopeId> {
        self.by_anchor.get(&node).copied()
    }

    /// Returns the innermost scope strictly enclosing `node`.
    pub fn enclosing(&self, ast: &Ast, node: NodeId) -> Option<ScopeId> {
        ast.ancestors(node)
            .find_map(|ancestor| self.anchored_at(ancestor))
    }

    /// Returns the scope a failed lookup in `id` continues in.
    ///
    /// Lookups leaving a [`ScopeKind::Protected`] scope skip every local scope
    /// around it and continue in the nearest global or object scope.
    pub fn escalate(&self, id: ScopeId) -> Option<ScopeId> {
        let scope = &self[id];

        match scope.kind {
            ScopeKind::Protected => {
                let mut current = scope.parent;

                while let Some(candidate) = current {
                    match self[candidate].kind {
                        ScopeKind::Global | ScopeKind::Object => break,
                        ScopeKind::Protected | ScopeKind::Local => {
                            current = self[candidate].parent;
                        }
                    }
                }

                current
            }
            _ => scope.parent,
        }
    }
}

fn declarations(ast: &Ast, kind: &NodeKind) -> Box<[NodeId]> {
    match kind {
        NodeKind::Module { items, .. } => items.clone(),
        NodeKind::Struct {
            fields, members, ..
        } => fields.iter().chain(members.iter()).copied().collect(),
        NodeKind::Trait { members, .. } => members.clone(),
        NodeKind::Enum { entries, .. } => entries.clone(),
        NodeKind::Function { params, .. }
        | NodeKind::AbstractFunction { params, .. }
        | NodeKind::ForeignFunction { params, .. }
        | NodeKind::Lambda { params, .. } => params.clone(),
        NodeKind::Block { items } => items
            .iter()
            .copied()
            .filter(|&item| {
                matches!(
                    ast.kind(item),
                    NodeKind::Var { .. } | NodeKind::Function { .. }
                )
            })
            .collect(),
        _ => Box::new([]),
    }
}
