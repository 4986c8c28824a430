//! Incremental construction of an [`Ast`].
//!
//! Children are pushed before their parents; pushing a node records it as the
//! parent of every child it names. Nodes pushed without an explicit span get
//! a synthetic one: leaves take the next free byte offset, and inner nodes
//! cover their children.

use crate::{
    span::{Span, SpanIndex},
    symbol::{StringInterner, Symbol},
};

use super::{Ast, Node, NodeId, NodeKind, Reference, ResolutionContext};

#[derive(Debug, Default)]
pub struct AstBuilder {
    nodes: Vec<Node>,
    interner: StringInterner,
    cursor: SpanIndex,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, s: &str) -> Symbol {
        self.interner.intern(s)
    }

    /// Pushes a node with a synthetic span.
    pub fn push(&mut self, kind: NodeKind) -> NodeId {
        let span = kind
            .children()
            .into_iter()
            .map(|child| self.nodes[child.index()].span)
            .reduce(Span::join)
            .unwrap_or_else(|| {
                let start = self.cursor;
                self.cursor += 1;
                Span::new(start, start + 1)
            });

        self.push_at(span, kind)
    }

    pub fn push_at(&mut self, span: Span, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);

        for child in kind.children() {
            self.nodes[child.index()].parent = Some(id);
        }

        self.cursor = self.cursor.max(span.end);
        self.nodes.push(Node {
            kind,
            span,
            parent: None,
        });
        id
    }

    pub fn finish(self, file: impl Into<Box<str>>, root: NodeId) -> Ast {
        Ast {
            file: file.into(),
            nodes: self.nodes,
            root,
            interner: self.interner,
        }
    }

    /// Pushes a [`NodeKind::File`] over `modules` and finishes the tree.
    pub fn finish_file(
        mut self,
        file: impl Into<Box<str>>,
        modules: impl IntoIterator<Item = NodeId>,
    ) -> Ast {
        let root = self.push(NodeKind::File {
            modules: modules.into_iter().collect(),
        });
        self.finish(file, root)
    }

    // DECLARATIONS

    pub fn module(
        &mut self,
        name: &str,
        items: impl IntoIterator<Item = NodeId>,
    ) -> NodeId {
        self.module_with(name, false, items)
    }

    pub fn global_module(
        &mut self,
        name: &str,
        items: impl IntoIterator<Item = NodeId>,
    ) -> NodeId {
        self.module_with(name, true, items)
    }

    fn module_with(
        &mut self,
        name: &str,
        global: bool,
        items: impl IntoIterator<Item = NodeId>,
    ) -> NodeId {
        let name = self.intern(name);
        self.push(NodeKind::Module {
            name,
            global,
            items: items.into_iter().collect(),
        })
    }

    pub fn structure(
        &mut self,
        name: &str,
        fields: impl IntoIterator<Item = NodeId>,
        members: impl IntoIterator<Item = NodeId>,
    ) -> NodeId {
        let name = self.intern(name);
        self.push(NodeKind::Struct {
            name,
            fields: fields.into_iter().collect(),
            members: members.into_iter().collect(),
        })
    }

    pub fn foreign_struct(&mut self, name: &str, relates_to: &str) -> NodeId {
        let name = self.intern(name);
        self.push(NodeKind::ForeignStruct {
            name,
            relates_to: relates_to.into(),
        })
    }

    pub fn trait_decl(
        &mut self,
        name: &str,
        members: impl IntoIterator<Item = NodeId>,
    ) -> NodeId {
        let name = self.intern(name);
        self.push(NodeKind::Trait {
            name,
            members: members.into_iter().collect(),
        })
    }

    /// Pushes an enum together with one entry per name.
    pub fn enum_decl<'a>(
        &mut self,
        name: &str,
        entries: impl IntoIterator<Item = &'a str>,
    ) -> NodeId {
        let entries = entries
            .into_iter()
            .map(|entry| {
                let name = self.intern(entry);
                self.push(NodeKind::EnumEntry { name })
            })
            .collect();
        let name = self.intern(name);
        self.push(NodeKind::Enum { name, entries })
    }

    pub fn function(
        &mut self,
        name: &str,
        params: impl IntoIterator<Item = NodeId>,
        body: NodeId,
    ) -> NodeId {
        self.typed_function(name, params, None, body)
    }

    pub fn typed_function(
        &mut self,
        name: &str,
        params: impl IntoIterator<Item = NodeId>,
        returns: Option<NodeId>,
        body: NodeId,
    ) -> NodeId {
        let name = self.intern(name);
        self.push(NodeKind::Function {
            name,
            params: params.into_iter().collect(),
            returns,
            body,
        })
    }

    pub fn abstract_function(
        &mut self,
        name: &str,
        params: impl IntoIterator<Item = NodeId>,
        returns: Option<NodeId>,
    ) -> NodeId {
        let name = self.intern(name);
        self.push(NodeKind::AbstractFunction {
            name,
            params: params.into_iter().collect(),
            returns,
        })
    }

    pub fn foreign_function(
        &mut self,
        name: &str,
        params: impl IntoIterator<Item = NodeId>,
        returns: Option<NodeId>,
        descriptor: &str,
    ) -> NodeId {
        let name = self.intern(name);
        self.push(NodeKind::ForeignFunction {
            name,
            params: params.into_iter().collect(),
            returns,
            descriptor: descriptor.into(),
        })
    }

    pub fn param(&mut self, name: &str) -> NodeId {
        let name = self.intern(name);
        self.push(NodeKind::Parameter { name, ty: None })
    }

    pub fn typed_param(&mut self, name: &str, ty: NodeId) -> NodeId {
        let name = self.intern(name);
        self.push(NodeKind::Parameter { name, ty: Some(ty) })
    }

    pub fn var(&mut self, name: &str, value: NodeId) -> NodeId {
        self.var_with(name, false, None, value)
    }

    pub fn mutable_var(&mut self, name: &str, value: NodeId) -> NodeId {
        self.var_with(name, true, None, value)
    }

    pub fn typed_var(&mut self, name: &str, ty: NodeId, value: NodeId) -> NodeId {
        self.var_with(name, false, Some(ty), value)
    }

    fn var_with(
        &mut self,
        name: &str,
        mutable: bool,
        ty: Option<NodeId>,
        value: NodeId,
    ) -> NodeId {
        let name = self.intern(name);
        self.push(NodeKind::Var {
            name,
            mutable,
            ty,
            value,
        })
    }

    // EXPRESSIONS

    pub fn block(&mut self, items: impl IntoIterator<Item = NodeId>) -> NodeId {
        self.push(NodeKind::Block {
            items: items.into_iter().collect(),
        })
    }

    pub fn reference(&mut self, name: &str) -> NodeId {
        let name = self.intern(name);
        self.push(NodeKind::Reference(Reference::unqualified(name)))
    }

    /// Pushes `::chain::name` when `from_root` holds, else `chain::name`.
    pub fn qualified<'a>(
        &mut self,
        from_root: bool,
        chain: impl IntoIterator<Item = &'a str>,
        name: &str,
    ) -> NodeId {
        let reference = self.qualified_reference(from_root, chain, name);
        self.push(NodeKind::Reference(reference))
    }

    pub fn call(
        &mut self,
        callee: NodeId,
        args: impl IntoIterator<Item = NodeId>,
    ) -> NodeId {
        self.push(NodeKind::Call {
            callee,
            args: args.into_iter().collect(),
        })
    }

    pub fn lambda(
        &mut self,
        params: impl IntoIterator<Item = NodeId>,
        body: NodeId,
    ) -> NodeId {
        self.push(NodeKind::Lambda {
            params: params.into_iter().collect(),
            body,
        })
    }

    pub fn number(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Number(text.into()))
    }

    pub fn floating(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Floating(text.into()))
    }

    pub fn tuple(&mut self, items: impl IntoIterator<Item = NodeId>) -> NodeId {
        self.push(NodeKind::Tuple(items.into_iter().collect()))
    }

    pub fn assign(&mut self, target: NodeId, value: NodeId) -> NodeId {
        self.push(NodeKind::Assign { target, value })
    }

    pub fn while_loop(&mut self, condition: NodeId, body: NodeId) -> NodeId {
        self.push(NodeKind::While { condition, body })
    }

    pub fn if_expr(
        &mut self,
        condition: NodeId,
        body: NodeId,
        elifs: impl IntoIterator<Item = (NodeId, NodeId)>,
        otherwise: Option<NodeId>,
    ) -> NodeId {
        self.push(NodeKind::If {
            condition,
            body,
            elifs: elifs.into_iter().collect(),
            otherwise,
        })
    }

    // TYPES

    pub fn type_ref(&mut self, name: &str) -> NodeId {
        let name = self.intern(name);
        self.push(NodeKind::TypeReference(Reference::unqualified(name)))
    }

    pub fn qualified_type<'a>(
        &mut self,
        from_root: bool,
        chain: impl IntoIterator<Item = &'a str>,
        name: &str,
    ) -> NodeId {
        let reference = self.qualified_reference(from_root, chain, name);
        self.push(NodeKind::TypeReference(reference))
    }

    pub fn tuple_type(
        &mut self,
        items: impl IntoIterator<Item = NodeId>,
    ) -> NodeId {
        self.push(NodeKind::TupleType(items.into_iter().collect()))
    }

    pub fn union_type(
        &mut self,
        items: impl IntoIterator<Item = NodeId>,
    ) -> NodeId {
        self.push(NodeKind::UnionType(items.into_iter().collect()))
    }

    fn qualified_reference<'a>(
        &mut self,
        from_root: bool,
        chain: impl IntoIterator<Item = &'a str>,
        name: &str,
    ) -> Reference {
        let chain = chain.into_iter().map(|link| self.intern(link)).collect();
        Reference {
            name: self.intern(name),
            context: Some(ResolutionContext { from_root, chain }),
        }
    }
}
