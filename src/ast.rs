//! Typed form of a parse forest: terminals and abstract nodes only.

use crate::forest::{Node, NodeView};
use crate::value::printable_char;
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum Ast {
    Term {
        code: i32,
        /// Present when the code is a printable character.
        char: Option<char>,
    },
    Anode {
        name: Option<String>,
        cost: i32,
        /// `None` for children that are not terminals or abstract nodes.
        children: Vec<Option<Ast>>,
    },
}

impl Ast {
    pub fn name(&self) -> Option<&str> {
        match self {
            Ast::Anode { name, .. } => name.as_deref(),
            Ast::Term { .. } => None,
        }
    }

    pub fn children(&self) -> &[Option<Ast>] {
        match self {
            Ast::Anode { children, .. } => children,
            Ast::Term { .. } => &[],
        }
    }

    pub fn term_code(&self) -> Option<i32> {
        match self {
            Ast::Term { code, .. } => Some(*code),
            Ast::Anode { .. } => None,
        }
    }
}

impl Drop for Ast {
    fn drop(&mut self) {
        let Ast::Anode { children, .. } = self else {
            return;
        };
        let mut stack: Vec<Ast> = std::mem::take(children).into_iter().flatten().collect();
        while let Some(mut ast) = stack.pop() {
            if let Ast::Anode { children, .. } = &mut ast {
                stack.extend(std::mem::take(children).into_iter().flatten());
            }
        }
    }
}

enum Step<'t, A> {
    Enter(Node<'t, A>),
    Exit(Node<'t, A>, usize),
}

/// Convert a forest into the typed form. Nil, error and alternative nodes
/// become `None`, as does a node repeated on its own ancestor path.
pub fn to_ast<A>(root: Option<Node<'_, A>>) -> Option<Ast> {
    let mut on_path: HashSet<usize> = HashSet::new();
    let mut results: Vec<Option<Ast>> = Vec::new();
    let mut stack = vec![Step::Enter(root?)];

    while let Some(step) = stack.pop() {
        match step {
            Step::Enter(node) if on_path.contains(&node.id()) => results.push(None),
            Step::Enter(node) => match node.view() {
                NodeView::Term { code, .. } => results.push(Some(Ast::Term { code, char: printable_char(code) })),
                NodeView::Anode { children, .. } => {
                    on_path.insert(node.id());
                    stack.push(Step::Exit(node, children.len()));
                    stack.extend(children.rev().map(Step::Enter));
                }
                NodeView::Nil | NodeView::Error | NodeView::Alt { .. } => results.push(None),
            },
            Step::Exit(node, n) => {
                on_path.remove(&node.id());
                let children = results.split_off(results.len().saturating_sub(n));
                results.push(Some(Ast::Anode {
                    name: node.anode_name().map(str::to_string),
                    cost: node.anode_cost().unwrap_or(0),
                    children,
                }));
            }
        }
    }
    results.pop().flatten()
}
