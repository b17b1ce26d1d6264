//! Loading grammars into a [`Grammar`]: from a textual description or from
//! terminal and rule declarations pulled through callbacks.
//!
//! Declarations cross into the engine as borrowed strings and index arrays. The
//! engine keeps them until it has read every declaration, so they are copied
//! into a [`Keepalive`] pool that lives for exactly one load call.

use crate::engine::{RuleDecl, TermDecl};
use crate::error::Error;
use crate::grammar::Grammar;
use bumpalo::Bump;
use std::marker::PhantomData;

/// Call-scoped arena for strings and index arrays handed to the engine while
/// a grammar is being read. Everything in it is freed at once when the load
/// call returns.
pub struct Keepalive<'env> {
    bump: Bump,
    _env: PhantomData<&'env ()>,
}

impl<'env> Keepalive<'env> {
    fn new() -> Self {
        Keepalive { bump: Bump::new(), _env: PhantomData }
    }

    pub fn str(&self, s: &str) -> &str {
        self.bump.alloc_str(s)
    }

    pub fn names<S: AsRef<str>>(&self, names: &[S]) -> &[&str] {
        self.bump
            .alloc_slice_fill_iter(names.iter().map(|n| &*self.bump.alloc_str(n.as_ref())))
    }

    pub fn indices(&self, indices: &[i32]) -> &[i32] {
        self.bump.alloc_slice_copy(indices)
    }

    pub fn allocated_bytes(&self) -> usize {
        self.bump.allocated_bytes()
    }
}

/// A terminal declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalSpec {
    pub name: String,
    /// `None` lets the engine assign a code.
    pub code: Option<i32>,
}

impl TerminalSpec {
    pub fn new(name: impl Into<String>) -> Self {
        TerminalSpec { name: name.into(), code: None }
    }

    pub fn with_code(name: impl Into<String>, code: i32) -> Self {
        TerminalSpec { name: name.into(), code: Some(code) }
    }
}

/// A rule declaration.
///
/// `translation` lists RHS indices (negative for a nil child). Without an
/// abstract node name, no entries (or `None`) translate to nil and a single
/// entry passes that symbol's translation through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSpec {
    pub lhs: String,
    pub rhs: Vec<String>,
    pub anode: Option<String>,
    pub cost: i32,
    pub translation: Option<Vec<i32>>,
}

impl RuleSpec {
    pub fn new<S: Into<String>>(lhs: impl Into<String>, rhs: impl IntoIterator<Item = S>) -> Self {
        RuleSpec {
            lhs: lhs.into(),
            rhs: rhs.into_iter().map(Into::into).collect(),
            anode: None,
            cost: 1,
            translation: None,
        }
    }

    /// Translate to an abstract node with the given name and cost.
    pub fn anode(mut self, name: impl Into<String>, cost: i32) -> Self {
        self.anode = Some(name.into());
        self.cost = cost;
        self
    }

    pub fn translation(mut self, indices: impl Into<Vec<i32>>) -> Self {
        self.translation = Some(indices.into());
        self
    }
}

impl Grammar {
    /// Load a grammar from a textual description, replacing the current one.
    pub fn parse_description(&mut self, description: &str, strict: bool) -> Result<(), Error> {
        self.parse_description_bytes(description.as_bytes(), strict)
    }

    /// Load a grammar from raw description bytes. The bytes are passed to
    /// the engine unmodified.
    pub fn parse_description_bytes(&mut self, description: &[u8], strict: bool) -> Result<(), Error> {
        let status = self.raw_mut().parse_grammar(strict, description);
        tracing::debug!(bytes = description.len(), strict, status, "description loaded");
        self.status(status)
    }

    /// Load a grammar from declaration lists.
    pub fn read_grammar(
        &mut self,
        terminals: &[TerminalSpec],
        rules: &[RuleSpec],
        strict: bool,
    ) -> Result<(), Error> {
        let mut terminals = terminals.iter();
        let mut rules = rules.iter();
        self.read_grammar_with(
            strict,
            |pool| {
                terminals.next().map(|t| TermDecl { name: pool.str(&t.name), code: t.code })
            },
            |pool| {
                rules.next().map(|r| RuleDecl {
                    lhs: pool.str(&r.lhs),
                    rhs: pool.names(&r.rhs),
                    anode: r.anode.as_deref().map(|a| pool.str(a)),
                    cost: r.cost,
                    transl: r.translation.as_deref().map(|t| pool.indices(t)),
                })
            },
        )
    }

    /// Load a grammar from declarations pulled one at a time until each
    /// callback returns `None`. Both callbacks get the call's [`Keepalive`]
    /// pool; declarations may borrow from it or from anything that outlives
    /// the call.
    pub fn read_grammar_with<'env, T, R>(
        &mut self,
        strict: bool,
        mut next_terminal: T,
        mut next_rule: R,
    ) -> Result<(), Error>
    where
        T: for<'k> FnMut(&'k Keepalive<'env>) -> Option<TermDecl<'k>>,
        R: for<'k> FnMut(&'k Keepalive<'env>) -> Option<RuleDecl<'k>>,
    {
        let pool = Keepalive::new();
        let status = {
            let mut read_terminal = || next_terminal(&pool);
            let mut read_rule = || next_rule(&pool);
            self.raw_mut().read_grammar(strict, &mut read_terminal, &mut read_rule)
        };
        tracing::debug!(pinned_bytes = pool.allocated_bytes(), strict, status, "declarations loaded");
        drop(pool);
        self.status(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_copies_survive_the_source() {
        let pool = Keepalive::new();
        let names = {
            let source = vec!["a".to_string(), "bc".to_string()];
            pool.names(&source)
        };
        assert_eq!(names, &["a", "bc"]);
        assert_eq!(pool.indices(&[0, -1, 2]), &[0, -1, 2]);
        assert!(pool.allocated_bytes() > 0);
    }

    #[test]
    fn rule_spec_builder() {
        let rule = RuleSpec::new("E", ["E", "+", "T"]).anode("plus", 2).translation([0, 2]);
        assert_eq!(rule.rhs, vec!["E", "+", "T"]);
        assert_eq!(rule.anode.as_deref(), Some("plus"));
        assert_eq!(rule.cost, 2);
        assert_eq!(rule.translation, Some(vec![0, 2]));
        assert_eq!(RuleSpec::new("S", Vec::<String>::new()).cost, 1);
    }
}
