//! Directed dependency graph with cycle detection.

use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    NotVisited,
    OnPath,
    Visited,
}

/// Nodes that close a cycle, in path order. The first node depends on the
/// second and so on; the last depends on the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle<T>(pub Vec<T>);

/// `node -> [depends_on]` adjacency, kept in insertion order so builds are
/// deterministic.
#[derive(Debug, Clone)]
pub struct DependencyTree<T> {
    nodes: Vec<T>,
    edges: HashMap<T, Vec<T>>,
}

impl<T: Eq + Hash + Clone> Default for DependencyTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Eq + Hash + Clone> DependencyTree<T> {
    pub fn new() -> Self {
        DependencyTree {
            nodes: Vec::new(),
            edges: HashMap::new(),
        }
    }

    pub fn add_node(&mut self, node: T) {
        if !self.edges.contains_key(&node) {
            self.edges.insert(node.clone(), Vec::new());
            self.nodes.push(node);
        }
    }

    /// Record that `node` depends on `depends_on`, creating either end if
    /// needed. Duplicate edges are ignored.
    pub fn add_dependency(&mut self, node: T, depends_on: T) {
        self.add_node(node.clone());
        self.add_node(depends_on.clone());
        if let Some(targets) = self.edges.get_mut(&node) {
            if !targets.contains(&depends_on) {
                targets.push(depends_on);
            }
        }
    }

    pub fn contains(&self, node: &T) -> bool {
        self.edges.contains_key(node)
    }

    pub fn dependencies(&self, node: &T) -> &[T] {
        self.edges.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Check the graph for cycles and order it.
    ///
    /// On success every node comes before the nodes it depends on. The
    /// graph can be rebuilt any number of times as edges are added.
    pub fn build(&self) -> Result<Vec<T>, Cycle<T>> {
        let mut states: HashMap<&T, VisitState> = self
            .nodes
            .iter()
            .map(|node| (node, VisitState::NotVisited))
            .collect();
        let mut path = Vec::new();
        let mut post_order = Vec::with_capacity(self.nodes.len());

        for node in &self.nodes {
            if states.get(node) == Some(&VisitState::NotVisited) {
                self.visit(node, &mut states, &mut path, &mut post_order)?;
            }
        }

        post_order.reverse();
        Ok(post_order)
    }

    fn visit<'a>(
        &'a self,
        node: &'a T,
        states: &mut HashMap<&'a T, VisitState>,
        path: &mut Vec<&'a T>,
        post_order: &mut Vec<T>,
    ) -> Result<(), Cycle<T>> {
        states.insert(node, VisitState::OnPath);
        path.push(node);

        for target in self.dependencies(node) {
            match states.get(target).copied().unwrap_or(VisitState::NotVisited) {
                VisitState::NotVisited => self.visit(target, states, path, post_order)?,
                VisitState::OnPath => {
                    let start = path.iter().position(|n| *n == target).unwrap_or(0);
                    return Err(Cycle(path[start..].iter().map(|n| (*n).clone()).collect()));
                }
                VisitState::Visited => {}
            }
        }

        path.pop();
        states.insert(node, VisitState::Visited);
        post_order.push(node.clone());
        Ok(())
    }
}
