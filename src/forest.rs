//! Read-only view of a parse forest and its release.
//!
//! A [`ParseTree`] owns the engine forest of one successful parse. Nodes are
//! borrowed from it as [`Node`] handles, so no node outlives the tree, and
//! releasing consumes the tree, so it happens once.

use crate::engine::{NodeId, RawForest, RawNode};
use std::fmt;

/// The kinds of forest nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Nil,
    Error,
    Term,
    Anode,
    Alt,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Nil => "NIL",
            NodeKind::Error => "ERROR",
            NodeKind::Term => "TERM",
            NodeKind::Anode => "ANODE",
            NodeKind::Alt => "ALT",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The forest of one successful parse.
pub struct ParseTree<A> {
    forest: RawForest<A>,
    ambiguous: bool,
}

impl<A> ParseTree<A> {
    pub(crate) fn new(forest: RawForest<A>, ambiguous: bool) -> Self {
        ParseTree { forest, ambiguous }
    }

    pub fn root(&self) -> Option<Node<'_, A>> {
        self.forest.root().map(|id| Node { forest: &self.forest, id })
    }

    /// Whether the forest holds an alternatives chain of two or more parses.
    pub fn ambiguous(&self) -> bool {
        self.ambiguous
    }

    /// Distinct nodes reachable from the root.
    pub fn node_count(&self) -> usize {
        self.reachable().len()
    }

    /// Distinct terminal nodes reachable from the root.
    pub fn term_count(&self) -> usize {
        self.reachable()
            .into_iter()
            .filter(|&id| matches!(self.forest.node(id), RawNode::Term { .. }))
            .count()
    }

    fn reachable(&self) -> Vec<NodeId> {
        let mut seen = vec![false; self.forest.len()];
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.forest.root().into_iter().collect();
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut seen[id as usize], true) {
                continue;
            }
            out.push(id);
            match self.forest.node(id) {
                RawNode::Anode { children, .. } => stack.extend(children.iter().copied()),
                RawNode::Alt { node, next } => stack.extend(std::iter::once(*node).chain(*next)),
                _ => {}
            }
        }
        out
    }

    /// Release the forest, dropping terminal attributes.
    pub fn free(self) {
        self.forest.free(None);
    }

    /// Release the forest, handing each terminal's code and attribute to
    /// `on_term` exactly once.
    pub fn free_with(self, mut on_term: impl FnMut(i32, A)) {
        self.forest.free(Some(&mut on_term));
    }
}

impl<A> fmt::Debug for ParseTree<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseTree")
            .field("root", &self.forest.root())
            .field("nodes", &self.forest.len())
            .field("ambiguous", &self.ambiguous)
            .finish()
    }
}

/// A node borrowed from a [`ParseTree`].
pub struct Node<'t, A> {
    forest: &'t RawForest<A>,
    id: NodeId,
}

impl<A> Clone for Node<'_, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A> Copy for Node<'_, A> {}

impl<A> PartialEq for Node<'_, A> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && std::ptr::eq(self.forest, other.forest)
    }
}

impl<A> Eq for Node<'_, A> {}

impl<A> fmt::Debug for Node<'_, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind(), self.id)
    }
}

/// Contents of a node.
pub enum NodeView<'t, A> {
    Nil,
    Error,
    Term { code: i32, attr: Option<&'t A> },
    Anode { name: Option<&'t str>, cost: i32, children: Children<'t, A> },
    Alt { node: Node<'t, A>, next: Option<Node<'t, A>> },
}

impl<'t, A> Node<'t, A> {
    /// Identity of the node within its tree. Shared subtrees have equal ids.
    pub fn id(&self) -> usize {
        self.id as usize
    }

    fn raw(&self) -> &'t RawNode<A> {
        self.forest.node(self.id)
    }

    fn at(&self, id: NodeId) -> Node<'t, A> {
        Node { forest: self.forest, id }
    }

    pub fn kind(&self) -> NodeKind {
        match self.raw() {
            RawNode::Nil => NodeKind::Nil,
            RawNode::Error => NodeKind::Error,
            RawNode::Term { .. } => NodeKind::Term,
            RawNode::Anode { .. } => NodeKind::Anode,
            RawNode::Alt { .. } => NodeKind::Alt,
        }
    }

    pub fn view(&self) -> NodeView<'t, A> {
        match self.raw() {
            RawNode::Nil => NodeView::Nil,
            RawNode::Error => NodeView::Error,
            RawNode::Term { code, attr } => NodeView::Term { code: *code, attr: attr.as_ref() },
            RawNode::Anode { name, cost, .. } => NodeView::Anode {
                name: name.as_deref(),
                cost: *cost,
                children: self.children(),
            },
            RawNode::Alt { node, next } => NodeView::Alt {
                node: self.at(*node),
                next: next.map(|n| self.at(n)),
            },
        }
    }

    pub fn term_code(&self) -> Option<i32> {
        match self.raw() {
            RawNode::Term { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn term_attr(&self) -> Option<&'t A> {
        match self.raw() {
            RawNode::Term { attr, .. } => attr.as_ref(),
            _ => None,
        }
    }

    pub fn anode_name(&self) -> Option<&'t str> {
        match self.raw() {
            RawNode::Anode { name, .. } => name.as_deref(),
            _ => None,
        }
    }

    pub fn anode_cost(&self) -> Option<i32> {
        match self.raw() {
            RawNode::Anode { cost, .. } => Some(*cost),
            _ => None,
        }
    }

    /// Children of an abstract node in order; empty for other kinds.
    pub fn children(&self) -> Children<'t, A> {
        let ids: &'t [NodeId] = match self.raw() {
            RawNode::Anode { children, .. } => children,
            _ => &[],
        };
        Children { forest: self.forest, ids: ids.iter() }
    }

    /// The alternatives of an `Alt` chain in order. Any other node is its
    /// own single alternative.
    pub fn alternatives(&self) -> Alternatives<'t, A> {
        Alternatives { forest: self.forest, next: Some(self.id) }
    }
}

/// Iterator over the children of an abstract node.
pub struct Children<'t, A> {
    forest: &'t RawForest<A>,
    ids: std::slice::Iter<'t, NodeId>,
}

impl<A> Clone for Children<'_, A> {
    fn clone(&self) -> Self {
        Children { forest: self.forest, ids: self.ids.clone() }
    }
}

impl<'t, A> Iterator for Children<'t, A> {
    type Item = Node<'t, A>;

    fn next(&mut self) -> Option<Node<'t, A>> {
        let id = *self.ids.next()?;
        Some(Node { forest: self.forest, id })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ids.size_hint()
    }
}

impl<A> DoubleEndedIterator for Children<'_, A> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let id = *self.ids.next_back()?;
        Some(Node { forest: self.forest, id })
    }
}

impl<A> ExactSizeIterator for Children<'_, A> {}

/// Iterator over the links of an alternatives chain.
pub struct Alternatives<'t, A> {
    forest: &'t RawForest<A>,
    next: Option<NodeId>,
}

impl<'t, A> Iterator for Alternatives<'t, A> {
    type Item = Node<'t, A>;

    fn next(&mut self) -> Option<Node<'t, A>> {
        let id = self.next.take()?;
        match self.forest.node(id) {
            RawNode::Alt { node, next } => {
                self.next = *next;
                Some(Node { forest: self.forest, id: *node })
            }
            _ => Some(Node { forest: self.forest, id }),
        }
    }
}
