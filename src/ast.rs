//! The arena AST consumed by the semantic passes.
//!
//! # Shape
//! Every node lives in a single [`Ast`] and is addressed by a [`NodeId`].
//! Nodes know their parent (set once, when the parent is pushed) and expose
//! their children through [`NodeKind::children`]. Passes never restructure
//! the tree: the only mutation is [`Ast::replace`], which swaps a reference
//! node for its resolved form in place.
//!
//! # Declarations
//! Nodes that bind a name (modules, structs, functions, parameters,
//! variables, enum entries, ...) report it through [`NodeKind::name`]. Nodes
//! that can be the target of a type reference are singled out by
//! [`NodeKind::is_type_decl`].

use crate::{
    span::Span,
    symbol::{StringInterner, Symbol},
};

pub mod builder;

pub use builder::AstBuilder;

/// The index of a node in its [`Ast`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The qualifier of a reference such as `::A::B::x` or `A::B::x`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionContext {
    /// Whether the chain starts at the file's module list (a leading `::`).
    pub from_root: bool,
    /// The type names leading up to the referenced name.
    pub chain: Box<[Symbol]>,
}

/// A (possibly qualified) name in expression or type position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub name: Symbol,
    pub context: Option<ResolutionContext>,
}

impl Reference {
    pub fn unqualified(name: Symbol) -> Self {
        Self {
            name,
            context: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
    /// Only the root has no parent.
    pub parent: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    // DECLARATIONS
    File {
        modules: Box<[NodeId]>,
    },
    Module {
        name: Symbol,
        /// Whether the module spans the whole file (`module M` without braces).
        global: bool,
        items: Box<[NodeId]>,
    },
    Struct {
        name: Symbol,
        /// The allocated fields, as [`NodeKind::Parameter`] nodes.
        fields: Box<[NodeId]>,
        members: Box<[NodeId]>,
    },
    ForeignStruct {
        name: Symbol,
        relates_to: Box<str>,
    },
    Trait {
        name: Symbol,
        members: Box<[NodeId]>,
    },
    Enum {
        name: Symbol,
        entries: Box<[NodeId]>,
    },
    EnumEntry {
        name: Symbol,
    },
    Function {
        name: Symbol,
        params: Box<[NodeId]>,
        returns: Option<NodeId>,
        body: NodeId,
    },
    AbstractFunction {
        name: Symbol,
        params: Box<[NodeId]>,
        returns: Option<NodeId>,
    },
    ForeignFunction {
        name: Symbol,
        params: Box<[NodeId]>,
        returns: Option<NodeId>,
        descriptor: Box<str>,
    },
    Parameter {
        name: Symbol,
        ty: Option<NodeId>,
    },
    Var {
        name: Symbol,
        mutable: bool,
        ty: Option<NodeId>,
        value: NodeId,
    },

    // EXPRESSIONS
    Block {
        items: Box<[NodeId]>,
    },
    Reference(Reference),
    Resolved {
        reference: Reference,
        referral: NodeId,
    },
    Call {
        callee: NodeId,
        args: Box<[NodeId]>,
    },
    Lambda {
        params: Box<[NodeId]>,
        body: NodeId,
    },
    Number(Box<str>),
    Floating(Box<str>),
    Tuple(Box<[NodeId]>),
    Assign {
        target: NodeId,
        value: NodeId,
    },
    While {
        condition: NodeId,
        body: NodeId,
    },
    /// `if c { .. } elif c { .. } else { .. }`; `elifs` pairs each
    /// condition with its body.
    If {
        condition: NodeId,
        body: NodeId,
        elifs: Box<[(NodeId, NodeId)]>,
        otherwise: Option<NodeId>,
    },

    // TYPES
    TypeReference(Reference),
    ResolvedType {
        reference: Reference,
        referral: NodeId,
    },
    TupleType(Box<[NodeId]>),
    UnionType(Box<[NodeId]>),
}

impl NodeKind {
    /// Returns the syntactic children of this node, in source order.
    ///
    /// The referral of a resolved reference is not a child.
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            NodeKind::File { modules } => modules.to_vec(),
            NodeKind::Module { items, .. } => items.to_vec(),
            NodeKind::Struct {
                fields, members, ..
            } => fields.iter().chain(members.iter()).copied().collect(),
            NodeKind::Trait { members, .. } => members.to_vec(),
            NodeKind::Enum { entries, .. } => entries.to_vec(),
            NodeKind::Function {
                params,
                returns,
                body,
                ..
            } => params
                .iter()
                .copied()
                .chain(*returns)
                .chain(Some(*body))
                .collect(),
            NodeKind::AbstractFunction {
                params, returns, ..
            }
            | NodeKind::ForeignFunction {
                params, returns, ..
            } => params.iter().copied().chain(*returns).collect(),
            NodeKind::Parameter { ty, .. } => ty.iter().copied().collect(),
            NodeKind::Var { ty, value, .. } => {
                ty.iter().copied().chain(Some(*value)).collect()
            }
            NodeKind::Block { items } => items.to_vec(),
            NodeKind::Call { callee, args } => {
                Some(*callee).into_iter().chain(args.iter().copied()).collect()
            }
            NodeKind::Lambda { params, body } => {
                params.iter().copied().chain(Some(*body)).collect()
            }
            NodeKind::Tuple(items)
            | NodeKind::TupleType(items)
            | NodeKind::UnionType(items) => items.to_vec(),
            NodeKind::Assign { target, value } => vec![*target, *value],
            NodeKind::While { condition, body } => vec![*condition, *body],
            NodeKind::If {
                condition,
                body,
                elifs,
                otherwise,
            } => [*condition, *body]
                .into_iter()
                .chain(elifs.iter().flat_map(|&(cond, body)| [cond, body]))
                .chain(*otherwise)
                .collect(),
            NodeKind::ForeignStruct { .. }
            | NodeKind::EnumEntry { .. }
            | NodeKind::Reference(_)
            | NodeKind::Resolved { .. }
            | NodeKind::Number(_)
            | NodeKind::Floating(_)
            | NodeKind::TypeReference(_)
            | NodeKind::ResolvedType { .. } => Vec::new(),
        }
    }

    /// Returns the name bound by this node, if it is a declaration.
    pub fn name(&self) -> Option<Symbol> {
        match self {
            NodeKind::Module { name, .. }
            | NodeKind::Struct { name, .. }
            | NodeKind::ForeignStruct { name, .. }
            | NodeKind::Trait { name, .. }
            | NodeKind::Enum { name, .. }
            | NodeKind::EnumEntry { name }
            | NodeKind::Function { name, .. }
            | NodeKind::AbstractFunction { name, .. }
            | NodeKind::ForeignFunction { name, .. }
            | NodeKind::Parameter { name, .. }
            | NodeKind::Var { name, .. } => Some(*name),
            _ => None,
        }
    }

    /// Whether this node declares a type that module-level type references
    /// may point to.
    pub fn is_type_decl(&self) -> bool {
        matches!(
            self,
            NodeKind::Struct { .. }
                | NodeKind::ForeignStruct { .. }
                | NodeKind::Trait { .. }
                | NodeKind::Enum { .. }
        )
    }

    pub fn is_function(&self) -> bool {
        matches!(
            self,
            NodeKind::Function { .. }
                | NodeKind::AbstractFunction { .. }
                | NodeKind::ForeignFunction { .. }
        )
    }

    /// Returns the parameter list of a function-like node.
    pub fn params(&self) -> Option<&[NodeId]> {
        match self {
            NodeKind::Function { params, .. }
            | NodeKind::AbstractFunction { params, .. }
            | NodeKind::ForeignFunction { params, .. }
            | NodeKind::Lambda { params, .. } => Some(params),
            _ => None,
        }
    }

    /// A short human-readable description of the node, for diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            NodeKind::File { .. } => "file",
            NodeKind::Module { .. } => "module",
            NodeKind::Struct { .. } => "struct",
            NodeKind::ForeignStruct { .. } => "foreign type",
            NodeKind::Trait { .. } => "trait",
            NodeKind::Enum { .. } => "enum",
            NodeKind::EnumEntry { .. } => "enum entry",
            NodeKind::Function { .. } => "function",
            NodeKind::AbstractFunction { .. } => "abstract function",
            NodeKind::ForeignFunction { .. } => "foreign function",
            NodeKind::Parameter { .. } => "parameter",
            NodeKind::Var { .. } => "variable",
            NodeKind::Block { .. } => "block",
            NodeKind::Reference(_) | NodeKind::Resolved { .. } => "reference",
            NodeKind::Call { .. } => "call",
            NodeKind::Lambda { .. } => "lambda",
            NodeKind::Number(_) => "number",
            NodeKind::Floating(_) => "floating",
            NodeKind::Tuple(_) => "tuple",
            NodeKind::Assign { .. } => "assignment",
            NodeKind::While { .. } => "while loop",
            NodeKind::If { .. } => "if expression",
            NodeKind::TypeReference(_) | NodeKind::ResolvedType { .. } => {
                "type reference"
            }
            NodeKind::TupleType(_) => "tuple type",
            NodeKind::UnionType(_) => "union type",
        }
    }
}

/// A complete, positioned syntax tree for one source file.
#[derive(Debug, Clone)]
pub struct Ast {
    file: Box<str>,
    nodes: Vec<Node>,
    root: NodeId,
    pub interner: StringInterner,
}

impl std::ops::Index<NodeId> for Ast {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Self::Output {
        &self.nodes[id.index()]
    }
}

impl Ast {
    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self[id].kind
    }

    pub fn span(&self, id: NodeId) -> Span {
        self[id].span
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self[id].parent
    }

    /// Iterates over the strict ancestors of `id`, innermost first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), |&node| self.parent(node))
    }

    /// Returns the name `id` declares, rendered through the interner.
    pub fn name_of(&self, id: NodeId) -> Option<&str> {
        self.kind(id)
            .name()
            .map(|name| self.interner.display(name))
    }

    pub fn symbol_str(&self, sym: Symbol) -> &str {
        self.interner.display(sym)
    }

    /// Returns every node reachable from the root in pre-order.
    pub fn walk(&self) -> Vec<NodeId> {
        self.walk_from(self.root)
    }

    pub fn walk_from(&self, start: NodeId) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![start];

        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.kind(id).children().into_iter().rev());
        }

        order
    }

    /// Replaces the kind of `id`, keeping its span and parent.
    ///
    /// The new kind must have the same children as the old one, which holds
    /// for the reference-to-resolved rewrites the passes perform.
    pub fn replace(&mut self, id: NodeId, kind: NodeKind) -> NodeKind {
        std::mem::replace(&mut self.nodes[id.index()].kind, kind)
    }

    /// Finds the first declaration named `name` in pre-order.
    pub fn find_declaration(&self, name: &str) -> Option<NodeId> {
        let sym = self.interner.get(name)?;
        self.walk()
            .into_iter()
            .find(|&id| self.kind(id).name() == Some(sym))
    }
}

#[cfg(test)]
mod tests {
    use super::{AstBuilder, NodeKind};

    #[test]
    fn parents_are_set_at_construction() {
        let mut b = AstBuilder::new();
        let one = b.number("1");
        let x = b.var("x", one);
        let block = b.block([x]);
        let main = b.function("main", [], block);
        let module = b.module("M", [main]);
        let ast = b.finish_file("test.kd", [module]);

        assert_eq!(ast.parent(one), Some(x));
        assert_eq!(ast.parent(x), Some(block));
        assert_eq!(ast.ancestors(one).count(), 5);
        assert_eq!(ast.parent(ast.root()), None);
        assert!(ast.span(block).contains(ast.span(one)));
    }

    #[test]
    fn walk_is_pre_order() {
        let mut b = AstBuilder::new();
        let f = b.reference("f");
        let one = b.number("1");
        let two = b.number("2");
        let call = b.call(f, [one, two]);
        let main = b.function("main", [], call);
        let module = b.module("M", [main]);
        let ast = b.finish_file("test.kd", [module]);

        let order = ast.walk();
        assert_eq!(&order[2..], &[main, call, f, one, two]);
    }

    #[test]
    fn replace_keeps_position() {
        let mut b = AstBuilder::new();
        let x = b.param("x");
        let r = b.reference("x");
        let f = b.function("f", [x], r);
        let module = b.module("M", [f]);
        let mut ast = b.finish_file("test.kd", [module]);
        let span = ast.span(r);

        let NodeKind::Reference(reference) = ast.kind(r).clone() else {
            panic!("expected a reference");
        };
        ast.replace(
            r,
            NodeKind::Resolved {
                reference,
                referral: x,
            },
        );

        assert_eq!(ast.span(r), span);
        assert_eq!(ast.parent(r), Some(f));
        assert!(matches!(ast.kind(r), NodeKind::Resolved { referral, .. } if *referral == x));
        assert_eq!(ast.find_declaration("f"), Some(f));
    }
}
