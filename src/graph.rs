//! Directed graphs over opaque nodes, and dependency scheduling on top of
//! them.
//!
//! An [`OrientedGraph`] deduplicates its nodes by value and keeps them in
//! insertion order, which is the order ties are broken in by both
//! [`OrientedGraph::top_sort`] and [`OrientedGraph::sorted_layers`].

use std::{
    collections::{HashMap, HashSet},
    fmt::Debug,
    hash::Hash,
};

use petgraph::{
    Direction,
    algo::tarjan_scc,
    graph::{DiGraph, NodeIndex},
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError<T: Debug> {
    /// The nodes named lie on a cycle.
    #[error("dependency cycle through {0:?}")]
    Cycle(Box<[T]>),
    #[error("node is not part of the graph")]
    NotFound,
}

/// A value that knows its own successors.
pub trait Node: Sized {
    fn children(&self) -> Vec<Self>;
}

/// A value that must come after each of its dependencies.
pub trait Depended: Sized {
    fn dependencies(&self) -> Vec<Self>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Colour {
    Unvisited,
    Visiting,
    Done,
}

#[derive(Debug, Clone)]
pub struct OrientedGraph<T> {
    graph: DiGraph<T, ()>,
    index: HashMap<T, NodeIndex>,
}

impl<T> Default for OrientedGraph<T> {
    fn default() -> Self {
        Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Clone + Eq + Hash + Debug> OrientedGraph<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph from `nodes` and the edges to their children.
    pub fn from_nodes(nodes: impl IntoIterator<Item = T>) -> Self
    where
        T: Node,
    {
        let mut graph = Self::new();
        for node in nodes {
            let children = node.children();
            graph.add_children(node, children);
        }
        graph
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains(&self, node: &T) -> bool {
        self.index.contains_key(node)
    }

    /// Adds `node` if it is not already present.
    pub fn add_node(&mut self, node: T) -> NodeIndex {
        if let Some(&idx) = self.index.get(&node) {
            return idx;
        }

        let idx = self.graph.add_node(node.clone());
        self.index.insert(node, idx);
        idx
    }

    /// Adds an edge from `parent` to each child, adding missing nodes.
    pub fn add_children(&mut self, parent: T, children: impl IntoIterator<Item = T>) {
        let from = self.add_node(parent);
        for child in children {
            let to = self.add_node(child);
            self.graph.update_edge(from, to, ());
        }
    }

    /// Orders the nodes reachable from `start` so that every node comes
    /// before its children.
    pub fn top_sort(&self, start: &T) -> Result<Vec<T>, GraphError<T>> {
        let &start = self.index.get(start).ok_or(GraphError::NotFound)?;
        let mut colours = vec![Colour::Unvisited; self.graph.node_count()];
        let mut order = Vec::with_capacity(self.graph.node_count());

        self.visit(start, &mut colours, &mut order)?;
        order.reverse();
        Ok(order.into_iter().map(|idx| self.graph[idx].clone()).collect())
    }

    fn visit(
        &self,
        node: NodeIndex,
        colours: &mut [Colour],
        order: &mut Vec<NodeIndex>,
    ) -> Result<(), GraphError<T>> {
        colours[node.index()] = Colour::Visiting;

        for child in self.children_of(node) {
            match colours[child.index()] {
                Colour::Unvisited => self.visit(child, colours, order)?,
                Colour::Visiting => {
                    return Err(GraphError::Cycle(Box::new([self.graph[child].clone()])));
                }
                Colour::Done => (),
            }
        }

        colours[node.index()] = Colour::Done;
        order.push(node);
        Ok(())
    }

    /// Splits the graph into layers: the first holds every node without a
    /// parent, and each following layer holds the nodes whose parents all
    /// lie in earlier layers.
    pub fn sorted_layers(&self) -> Result<Vec<Vec<T>>, GraphError<T>> {
        let mut in_degree: Vec<Option<usize>> = self
            .graph
            .node_indices()
            .map(|idx| {
                Some(
                    self.graph
                        .neighbors_directed(idx, Direction::Incoming)
                        .count(),
                )
            })
            .collect();
        let mut remaining = in_degree.len();
        let mut layers = Vec::new();

        while remaining > 0 {
            let layer: Vec<NodeIndex> = self
                .graph
                .node_indices()
                .filter(|idx| in_degree[idx.index()] == Some(0))
                .collect();

            if layer.is_empty() {
                return Err(GraphError::Cycle(self.cyclic_nodes()));
            }

            for &idx in &layer {
                in_degree[idx.index()] = None;
                for child in self.graph.neighbors(idx) {
                    if let Some(degree) = &mut in_degree[child.index()] {
                        *degree = degree.saturating_sub(1);
                    }
                }
            }

            remaining -= layer.len();
            layers.push(layer.into_iter().map(|idx| self.graph[idx].clone()).collect());
        }

        Ok(layers)
    }

    fn children_of(&self, node: NodeIndex) -> Vec<NodeIndex> {
        let mut children: Vec<_> = self.graph.neighbors(node).collect();
        children.sort();
        children
    }

    /// Every node in a non-trivial strongly connected component or with a
    /// self-loop, in insertion order.
    fn cyclic_nodes(&self) -> Box<[T]> {
        let mut nodes: Vec<NodeIndex> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || self.graph.contains_edge(component[0], component[0])
            })
            .flatten()
            .collect();
        nodes.sort();
        nodes.into_iter().map(|idx| self.graph[idx].clone()).collect()
    }
}

/// Orders `items` and everything they transitively depend on into layers,
/// dependencies first. Items within a layer do not depend on each other.
pub fn schedule<T>(items: impl IntoIterator<Item = T>) -> Result<Vec<Vec<T>>, GraphError<T>>
where
    T: Depended + Clone + Eq + Hash + Debug,
{
    let mut graph = OrientedGraph::new();
    let mut expanded = HashSet::new();
    let mut pending: Vec<T> = items.into_iter().collect();
    pending.reverse();

    while let Some(item) = pending.pop() {
        if !expanded.insert(item.clone()) {
            continue;
        }

        let dependencies = item.dependencies();
        graph.add_children(item, dependencies.iter().cloned());
        pending.extend(dependencies.into_iter().rev());
    }

    let mut layers = graph.sorted_layers()?;
    layers.reverse();
    tracing::debug!(?layers, "scheduled");
    Ok(layers)
}
