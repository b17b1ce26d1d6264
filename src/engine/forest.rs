//! Engine-side parse forest: an arena of tagged nodes together with the
//! allocator that paid for them.
//!
//! Every node lives in one arena and is addressed by a [`NodeId`]. Children and
//! alternative links are ids into the same arena, so shared subtrees of a packed
//! forest are shared by identity and a release walk is a DAG walk.

use std::rc::Rc;

pub type NodeId = u32;

/// One node of the translation forest.
#[derive(Debug)]
pub enum RawNode<A> {
    Nil,
    Error,
    /// `attr` is `None` only after the attribute was handed to a release callback.
    Term { code: i32, attr: Option<A> },
    Anode {
        name: Option<Rc<str>>,
        cost: i32,
        children: Vec<NodeId>,
    },
    /// One link of an alternatives chain.
    Alt { node: NodeId, next: Option<NodeId> },
}

/// Allocation hooks for engine-internal forest memory.
///
/// The engine calls [`ParseAlloc::alloc`] once per node it creates and
/// [`ParseAlloc::free`] once per node it releases, with the same size.
/// Refusing an allocation aborts the parse with `NO_MEMORY`.
pub trait ParseAlloc {
    fn alloc(&mut self, size: usize) -> bool;
    fn free(&mut self, size: usize);
}

/// The engine's default allocator: never refuses.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultAlloc;

impl ParseAlloc for DefaultAlloc {
    fn alloc(&mut self, _size: usize) -> bool {
        true
    }

    fn free(&mut self, _size: usize) {}
}

/// A forest produced by one parse. Owns its nodes and its allocator.
pub struct RawForest<A> {
    nodes: Vec<RawNode<A>>,
    root: Option<NodeId>,
    nil: Option<NodeId>,
    alloc: Box<dyn ParseAlloc>,
    released: bool,
}

impl<A> RawForest<A> {
    pub(crate) fn new(alloc: Box<dyn ParseAlloc>) -> Self {
        RawForest {
            nodes: Vec::new(),
            root: None,
            nil: None,
            alloc,
            released: false,
        }
    }

    /// Allocate a node; `Err` carries the `NO_MEMORY` status.
    pub(crate) fn push(&mut self, node: RawNode<A>) -> Result<NodeId, i32> {
        if !self.alloc.alloc(node_size(&node)) {
            return Err(super::codes::NO_MEMORY);
        }
        let id = self.nodes.len() as NodeId;
        self.nodes.push(node);
        Ok(id)
    }

    /// The forest's single shared `Nil` node, allocated on first use.
    pub(crate) fn nil(&mut self) -> Result<NodeId, i32> {
        if let Some(id) = self.nil {
            return Ok(id);
        }
        let id = self.push(RawNode::Nil)?;
        self.nil = Some(id);
        Ok(id)
    }

    pub(crate) fn set_root(&mut self, root: Option<NodeId>) {
        self.root = root;
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &RawNode<A> {
        &self.nodes[id as usize]
    }

    pub fn get(&self, id: NodeId) -> Option<&RawNode<A>> {
        self.nodes.get(id as usize)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether an `Alt` chain of two or more alternatives is reachable from
    /// the root.
    pub fn has_alt_chain(&self) -> bool {
        let mut visited = vec![false; self.nodes.len()];
        let mut stack: Vec<NodeId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            match visited.get_mut(id as usize) {
                Some(seen) if !*seen => *seen = true,
                _ => continue,
            }
            match &self.nodes[id as usize] {
                RawNode::Alt { next: Some(_), .. } => return true,
                RawNode::Alt { node, next: None } => stack.push(*node),
                RawNode::Anode { children, .. } => stack.extend(children.iter().copied()),
                RawNode::Nil | RawNode::Error | RawNode::Term { .. } => {}
            }
        }
        false
    }

    /// Release the forest: walk it once from the root, hand every `Term`
    /// attribute to `termcb` (or drop it), then return every node to the
    /// allocator that created it.
    pub fn free(mut self, termcb: Option<&mut dyn FnMut(i32, A)>) {
        self.release(termcb);
    }

    fn release(&mut self, mut termcb: Option<&mut dyn FnMut(i32, A)>) {
        if self.released {
            return;
        }
        self.released = true;

        let mut visited = vec![false; self.nodes.len()];
        let mut stack: Vec<NodeId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            let Some(seen) = visited.get_mut(id as usize) else {
                continue;
            };
            if *seen {
                continue;
            }
            *seen = true;
            match &mut self.nodes[id as usize] {
                RawNode::Term { code, attr } => {
                    if let Some(attr) = attr.take() {
                        if let Some(cb) = termcb.as_mut() {
                            cb(*code, attr);
                        }
                    }
                }
                RawNode::Anode { children, .. } => {
                    stack.extend(children.iter().rev().copied());
                }
                RawNode::Alt { node, next } => {
                    if let Some(next) = *next {
                        stack.push(next);
                    }
                    stack.push(*node);
                }
                RawNode::Nil | RawNode::Error => {}
            }
        }

        for node in self.nodes.drain(..) {
            self.alloc.free(node_size(&node));
        }
        tracing::trace!(visited = visited.iter().filter(|v| **v).count(), "forest released");
        self.root = None;
        self.nil = None;
    }
}

impl<A> Drop for RawForest<A> {
    fn drop(&mut self) {
        self.release(None);
    }
}

fn node_size<A>(node: &RawNode<A>) -> usize {
    let base = std::mem::size_of::<RawNode<A>>();
    match node {
        RawNode::Anode { children, .. } => base + children.len() * std::mem::size_of::<NodeId>(),
        _ => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Counting {
        live: Rc<Cell<i64>>,
    }

    impl ParseAlloc for Counting {
        fn alloc(&mut self, size: usize) -> bool {
            self.live.set(self.live.get() + size as i64);
            true
        }

        fn free(&mut self, size: usize) {
            self.live.set(self.live.get() - size as i64);
        }
    }

    #[test]
    fn release_returns_every_byte_and_visits_terms_once() {
        let live = Rc::new(Cell::new(0));
        let mut forest: RawForest<char> = RawForest::new(Box::new(Counting { live: live.clone() }));
        let a = forest.push(RawNode::Term { code: 97, attr: Some('a') }).unwrap();
        let b = forest.push(RawNode::Term { code: 98, attr: Some('b') }).unwrap();
        let left = forest
            .push(RawNode::Anode { name: Some("l".into()), cost: 1, children: vec![a, b] })
            .unwrap();
        let right = forest
            .push(RawNode::Anode { name: Some("r".into()), cost: 1, children: vec![b, a] })
            .unwrap();
        let tail = forest.push(RawNode::Alt { node: right, next: None }).unwrap();
        let head = forest.push(RawNode::Alt { node: left, next: Some(tail) }).unwrap();
        forest.set_root(Some(head));
        assert!(live.get() > 0);

        let mut seen = Vec::new();
        forest.free(Some(&mut |code, attr| seen.push((code, attr))));
        seen.sort();
        assert_eq!(seen, vec![(97, 'a'), (98, 'b')]);
        assert_eq!(live.get(), 0);
    }

    #[test]
    fn alt_chains_count_only_when_reachable() {
        let mut forest: RawForest<()> = RawForest::new(Box::new(DefaultAlloc));
        let a = forest.push(RawNode::Term { code: 97, attr: None }).unwrap();
        let b = forest.push(RawNode::Term { code: 98, attr: None }).unwrap();
        let tail = forest.push(RawNode::Alt { node: b, next: None }).unwrap();
        let head = forest.push(RawNode::Alt { node: a, next: Some(tail) }).unwrap();
        let wrap = forest.push(RawNode::Anode { name: None, cost: 0, children: vec![a] }).unwrap();
        forest.set_root(Some(wrap));
        assert!(!forest.has_alt_chain());
        forest.set_root(Some(head));
        assert!(forest.has_alt_chain());
    }

    #[test]
    fn shared_nil_is_allocated_once() {
        let mut forest: RawForest<()> = RawForest::new(Box::new(DefaultAlloc));
        let first = forest.nil().unwrap();
        let second = forest.nil().unwrap();
        assert_eq!(first, second);
        assert_eq!(forest.len(), 1);
    }
}
