//! Build the translation forest of an accepted input.
//!
//! Every derivation of a nonterminal over an input span is recovered from the
//! Earley sets. Each derivation is turned into a node following its rule's
//! translation, and the alternatives for one span are linked into an `Alt`
//! chain. Results are memoized per `(symbol, start, end)`, so shared subtrees
//! are shared by identity.
//!
//! Spans nest as deep as the input is long, so both the node builder and the
//! cost search run on explicit frame stacks rather than the native stack.

use super::compile::{CompiledGrammar, RuleId, SymbolId, Translation};
use super::earley::{InputSym, Item, Recognition};
use super::forest::{NodeId, RawForest, RawNode};
use std::collections::HashMap;
use std::rc::Rc;

type Key = (SymbolId, u32, u32);

/// One way a rule covers a span: `bounds[t]..bounds[t + 1]` is the span of
/// the `t`-th RHS symbol.
#[derive(Debug)]
struct Derivation {
    rule: RuleId,
    bounds: Vec<u32>,
}

#[derive(Clone, Copy)]
enum Memo<T> {
    Busy,
    Done(T),
}

/// A result that is either known now or needs a span frame to be run first.
enum Pending<T, F> {
    Ready(T),
    Open(F),
}

/// A span whose derivations are being translated.
struct SpanFrame {
    key: Key,
    derivations: Rc<[Derivation]>,
    pending: std::vec::IntoIter<usize>,
    /// Total cost of the chosen derivation when selecting by cost.
    cost: Option<i64>,
    alts: Vec<NodeId>,
}

/// A derivation whose children are being translated.
struct DerivationFrame {
    derivations: Rc<[Derivation]>,
    index: usize,
    cost: Option<i64>,
    kids: Vec<NodeId>,
}

enum Frame {
    Span(SpanFrame),
    Derivation(DerivationFrame),
}

/// A span whose cheapest derivation is being searched: derivation `index`
/// has its RHS summed up to `pos`.
struct CostFrame {
    key: Key,
    derivations: Rc<[Derivation]>,
    index: usize,
    pos: usize,
    total: Option<i64>,
    found: Option<(i64, usize)>,
}

impl CostFrame {
    fn next_derivation(&mut self) {
        self.index += 1;
        self.pos = 0;
        self.total = None;
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Options {
    pub one_parse: bool,
    pub cost: bool,
}

struct Translator<'g, A> {
    g: &'g CompiledGrammar,
    rec: Recognition<A>,
    opts: Options,
    /// Per set: completed items by `(lhs, origin)`.
    completed: Vec<HashMap<(SymbolId, u32), Vec<RuleId>>>,
    /// Per set: ascending origins of completed items, by lhs.
    origins: Vec<HashMap<SymbolId, Vec<u32>>>,
    derivations: HashMap<Key, Rc<[Derivation]>>,
    nodes: HashMap<Key, Memo<Option<NodeId>>>,
    best: HashMap<Key, Memo<Option<(i64, usize)>>>,
    terms: HashMap<usize, NodeId>,
    forest: RawForest<A>,
}

/// Translate an accepted input into `forest`. Returns the forest with its
/// root set and whether an `Alt` chain of two or more alternatives is
/// reachable from that root.
pub(crate) fn translate<A>(
    g: &CompiledGrammar,
    rec: Recognition<A>,
    opts: Options,
    forest: RawForest<A>,
) -> Result<(RawForest<A>, bool), i32> {
    let mut completed = Vec::with_capacity(rec.sets.len());
    let mut origins = Vec::with_capacity(rec.sets.len());
    for set in &rec.sets {
        let mut by_lhs: HashMap<(SymbolId, u32), Vec<RuleId>> = HashMap::new();
        for item in &set.items {
            let rule = &g.rules[item.rule as usize];
            if item.dot as usize == rule.rhs.len() {
                by_lhs.entry((rule.lhs, item.origin)).or_default().push(item.rule);
            }
        }
        let mut by_sym: HashMap<SymbolId, Vec<u32>> = HashMap::new();
        for &(sym, origin) in by_lhs.keys() {
            by_sym.entry(sym).or_default().push(origin);
        }
        for list in by_sym.values_mut() {
            list.sort_unstable();
        }
        completed.push(by_lhs);
        origins.push(by_sym);
    }
    let root_key = (g.start, 0, rec.end as u32);
    let mut t = Translator {
        g,
        rec,
        opts,
        completed,
        origins,
        derivations: HashMap::new(),
        nodes: HashMap::new(),
        best: HashMap::new(),
        terms: HashMap::new(),
        forest,
    };

    let root = t.node(root_key)?;
    let root = root.filter(|&id| !matches!(t.forest.node(id), RawNode::Nil));
    t.forest.set_root(root);
    let ambiguous = t.forest.has_alt_chain();
    tracing::debug!(nodes = t.forest.len(), ambiguous, "forest built");
    Ok((t.forest, ambiguous))
}

impl<A> Translator<'_, A> {
    fn input_symbol(&self, k: usize) -> SymbolId {
        match self.rec.input_at(k) {
            InputSym::Token(t) => self.rec.tokens[t].sym,
            InputSym::Error { .. } => self.g.error_term,
        }
    }

    fn derivations(&mut self, key: Key) -> Rc<[Derivation]> {
        if let Some(found) = self.derivations.get(&key) {
            return found.clone();
        }
        let (sym, start, end) = key;
        let mut out = Vec::new();
        if let Some(rules) = self.completed[end as usize].get(&(sym, start)) {
            for &rule in rules {
                let len = self.g.rules[rule as usize].rhs.len();
                let mut bounds = vec![0; len + 1];
                bounds[len] = end;
                self.splits(rule, start, len, end, &mut bounds, &mut out);
            }
        }
        let out: Rc<[Derivation]> = out.into();
        self.derivations.insert(key, out.clone());
        out
    }

    /// Enumerate positions for RHS symbols `..t`, given that symbol `t - 1`
    /// ends at `k`.
    fn splits(&self, rule: RuleId, origin: u32, t: usize, k: u32, bounds: &mut Vec<u32>, out: &mut Vec<Derivation>) {
        if t == 0 {
            if k == origin {
                out.push(Derivation { rule, bounds: bounds.clone() });
            }
            return;
        }
        let sym = self.g.rules[rule as usize].rhs[t - 1];
        let prev = Item { rule, dot: (t - 1) as u32, origin };
        if self.g.is_term(sym) {
            if k == 0 {
                return;
            }
            let p = k - 1;
            if self.input_symbol(p as usize) == sym && self.rec.sets[p as usize].contains(&prev) {
                bounds[t - 1] = p;
                self.splits(rule, origin, t - 1, p, bounds, out);
            }
            return;
        }
        let Some(starts) = self.origins[k as usize].get(&sym) else {
            return;
        };
        for &p in starts.iter().filter(|&&p| p >= origin) {
            if self.rec.sets[p as usize].contains(&prev) {
                bounds[t - 1] = p;
                self.splits(rule, origin, t - 1, p, bounds, out);
            }
        }
    }

    fn term(&mut self, pos: u32) -> Result<NodeId, i32> {
        if let Some(&id) = self.terms.get(&(pos as usize)) {
            return Ok(id);
        }
        let node = match self.rec.input_at(pos as usize) {
            InputSym::Token(t) => {
                let token = &mut self.rec.tokens[t];
                RawNode::Term { code: token.code, attr: token.attr.take() }
            }
            InputSym::Error { .. } => RawNode::Error,
        };
        let id = self.forest.push(node)?;
        self.terms.insert(pos as usize, id);
        Ok(id)
    }

    /// Translation of a nonterminal span; `None` when every derivation leads
    /// back into a span that is still being translated.
    fn node(&mut self, root: Key) -> Result<Option<NodeId>, i32> {
        let mut stack = match self.enter(root) {
            Pending::Ready(id) => return Ok(id),
            Pending::Open(span) => vec![Frame::Span(span)],
        };
        // Result of the frame popped last, handed to the frame below it.
        let mut ret: Option<Option<NodeId>> = None;
        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Span(mut span) => {
                    if let Some(Some(id)) = ret.take() {
                        if !span.alts.contains(&id) {
                            span.alts.push(id);
                        }
                    }
                    let next = if self.opts.one_parse && !span.alts.is_empty() {
                        None
                    } else {
                        span.pending.next()
                    };
                    match next {
                        Some(index) => {
                            let derivation = DerivationFrame {
                                derivations: span.derivations.clone(),
                                index,
                                cost: span.cost,
                                kids: Vec::new(),
                            };
                            stack.push(Frame::Span(span));
                            stack.push(Frame::Derivation(derivation));
                        }
                        None => ret = Some(self.link(span)?),
                    }
                }
                Frame::Derivation(mut derivation) => match self.advance(&mut derivation, ret.take())? {
                    Pending::Ready(id) => ret = Some(id),
                    Pending::Open(span) => {
                        stack.push(Frame::Derivation(derivation));
                        stack.push(Frame::Span(span));
                    }
                },
            }
        }
        Ok(ret.flatten())
    }

    fn enter(&mut self, key: Key) -> Pending<Option<NodeId>, SpanFrame> {
        match self.nodes.get(&key) {
            Some(Memo::Busy) => return Pending::Ready(None),
            Some(Memo::Done(id)) => return Pending::Ready(*id),
            None => {}
        }
        self.nodes.insert(key, Memo::Busy);

        let derivations = self.derivations(key);
        let (pending, cost) = if self.opts.one_parse && self.opts.cost {
            match self.best(key) {
                Some((cost, d)) => (vec![d], Some(cost)),
                None => (Vec::new(), None),
            }
        } else {
            ((0..derivations.len()).collect(), None)
        };
        Pending::Open(SpanFrame { key, derivations, pending: pending.into_iter(), cost, alts: Vec::new() })
    }

    /// Finish a span: one alternative stands alone, several form a chain.
    fn link(&mut self, span: SpanFrame) -> Result<Option<NodeId>, i32> {
        let mut alts = span.alts;
        let mut head = None;
        if alts.len() == 1 {
            head = alts.pop();
        } else {
            for &alt in alts.iter().rev() {
                head = Some(self.forest.push(RawNode::Alt { node: alt, next: head })?);
            }
        }
        self.nodes.insert(span.key, Memo::Done(head));
        Ok(head)
    }

    fn child(&mut self, d: &Derivation, idx: usize) -> Result<Pending<Option<NodeId>, SpanFrame>, i32> {
        let sym = self.g.rules[d.rule as usize].rhs[idx];
        if self.g.is_term(sym) {
            self.term(d.bounds[idx]).map(|id| Pending::Ready(Some(id)))
        } else {
            Ok(self.enter((sym, d.bounds[idx], d.bounds[idx + 1])))
        }
    }

    /// Build as much of a derivation's node as possible. `incoming` is the
    /// translation of the child span the frame was waiting on.
    fn advance(
        &mut self,
        frame: &mut DerivationFrame,
        mut incoming: Option<Option<NodeId>>,
    ) -> Result<Pending<Option<NodeId>, SpanFrame>, i32> {
        let g = self.g;
        let derivations = frame.derivations.clone();
        let d = &derivations[frame.index];
        let (name, cost, children) = match &g.rules[d.rule as usize].transl {
            Translation::Nil => return self.forest.nil().map(|id| Pending::Ready(Some(id))),
            Translation::Pass(idx) => {
                return match incoming {
                    Some(id) => Ok(Pending::Ready(id)),
                    None => self.child(d, *idx),
                }
            }
            Translation::Anode { name, cost, children } => (name, *cost, children),
        };
        loop {
            match incoming.take() {
                Some(Some(id)) => frame.kids.push(id),
                Some(None) => return Ok(Pending::Ready(None)),
                None => {}
            }
            let Some(child) = children.get(frame.kids.len()) else {
                break;
            };
            match child {
                None => {
                    let nil = self.forest.nil()?;
                    frame.kids.push(nil);
                }
                Some(idx) => match self.child(d, *idx)? {
                    Pending::Ready(id) => incoming = Some(id),
                    open => return Ok(open),
                },
            }
        }
        let cost = frame.cost.map_or(cost, |total| total.clamp(0, i32::MAX as i64) as i32);
        let kids = std::mem::take(&mut frame.kids);
        self.forest
            .push(RawNode::Anode { name: name.clone(), cost, children: kids })
            .map(|id| Pending::Ready(Some(id)))
    }

    fn own_cost(&self, rule: RuleId) -> i64 {
        match &self.g.rules[rule as usize].transl {
            Translation::Anode { cost, .. } => *cost as i64,
            _ => 0,
        }
    }

    /// Cheapest derivation of a span as `(cost, derivation index)`, where a
    /// derivation costs its rule plus its cheapest sub-derivations. The first
    /// one wins ties.
    fn best(&mut self, root: Key) -> Option<(i64, usize)> {
        let mut stack = match self.enter_best(root) {
            Pending::Ready(found) => return found,
            Pending::Open(frame) => vec![frame],
        };
        let mut ret = None;
        while let Some(mut frame) = stack.pop() {
            match self.advance_cost(&mut frame, ret.take()) {
                Pending::Ready(found) => {
                    self.best.insert(frame.key, Memo::Done(found));
                    ret = Some(found);
                }
                Pending::Open(child) => {
                    stack.push(frame);
                    stack.push(child);
                }
            }
        }
        ret.flatten()
    }

    fn enter_best(&mut self, key: Key) -> Pending<Option<(i64, usize)>, CostFrame> {
        match self.best.get(&key) {
            Some(Memo::Busy) => return Pending::Ready(None),
            Some(Memo::Done(found)) => return Pending::Ready(*found),
            None => {}
        }
        self.best.insert(key, Memo::Busy);
        let derivations = self.derivations(key);
        Pending::Open(CostFrame { key, derivations, index: 0, pos: 0, total: None, found: None })
    }

    fn advance_cost(
        &mut self,
        frame: &mut CostFrame,
        mut incoming: Option<Option<(i64, usize)>>,
    ) -> Pending<Option<(i64, usize)>, CostFrame> {
        let g = self.g;
        let derivations = frame.derivations.clone();
        while let Some(d) = derivations.get(frame.index) {
            let rhs = &g.rules[d.rule as usize].rhs;
            let mut total = frame.total.unwrap_or_else(|| self.own_cost(d.rule));
            match incoming.take() {
                Some(Some((cost, _))) => {
                    total = total.saturating_add(cost);
                    frame.pos += 1;
                }
                Some(None) => {
                    frame.next_derivation();
                    continue;
                }
                None => {}
            }
            frame.total = Some(total);
            while frame.pos < rhs.len() && g.is_term(rhs[frame.pos]) {
                frame.pos += 1;
            }
            if frame.pos == rhs.len() {
                if frame.found.map_or(true, |(c, _)| total < c) {
                    frame.found = Some((total, frame.index));
                }
                frame.next_derivation();
                continue;
            }
            let key = (rhs[frame.pos], d.bounds[frame.pos], d.bounds[frame.pos + 1]);
            match self.enter_best(key) {
                Pending::Ready(found) => incoming = Some(found),
                open => return open,
            }
        }
        Pending::Ready(frame.found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::compile::{compile, RuleDecl, TermDecl};
    use crate::engine::earley::{Config, Recognizer};
    use crate::engine::forest::DefaultAlloc;

    fn run(g: &CompiledGrammar, opts: Options, codes: &[i32]) -> (RawForest<usize>, bool) {
        let cfg = Config { lookahead: true, recovery: false, recovery_match: 3, debug: 0 };
        let mut it = codes.iter().copied().enumerate();
        let mut read = move || it.next().map(|(i, c)| (c, i));
        let rec = Recognizer::new(g, cfg, &mut read).run(None).unwrap();
        translate(g, rec, opts, RawForest::new(Box::new(DefaultAlloc))).unwrap()
    }

    fn ambiguous_grammar() -> CompiledGrammar {
        let terms = [TermDecl { name: "a", code: Some(97) }];
        let rules = [
            RuleDecl { lhs: "S", rhs: &["a"], anode: None, cost: 1, transl: Some(&[0][..]) },
            RuleDecl { lhs: "S", rhs: &["S", "S"], anode: Some("pair"), cost: 1, transl: Some(&[0, 1][..]) },
        ];
        compile(true, &terms, &rules).unwrap()
    }

    #[test]
    fn two_tokens_have_one_derivation_three_have_two() {
        let g = ambiguous_grammar();
        let all = Options { one_parse: false, cost: false };
        let (forest, ambiguous) = run(&g, all, &[97, 97]);
        assert!(!ambiguous);
        assert!(matches!(forest.node(forest.root().unwrap()), RawNode::Anode { .. }));

        let (forest, ambiguous) = run(&g, all, &[97, 97, 97]);
        assert!(ambiguous);
        assert!(matches!(forest.node(forest.root().unwrap()), RawNode::Alt { next: Some(_), .. }));

        let (forest, ambiguous) = run(&g, Options { one_parse: true, cost: false }, &[97, 97, 97]);
        assert!(!ambiguous);
        assert!(matches!(forest.node(forest.root().unwrap()), RawNode::Anode { .. }));
    }

    #[test]
    fn terminal_nodes_are_shared_between_alternatives() {
        let g = ambiguous_grammar();
        let (forest, _) = run(&g, Options { one_parse: false, cost: false }, &[97, 97, 97]);
        let terms = (0..forest.len() as NodeId)
            .filter(|&id| matches!(forest.node(id), RawNode::Term { .. }))
            .count();
        assert_eq!(terms, 3);
    }

    #[test]
    fn cheapest_derivation_carries_total_cost() {
        let terms = [TermDecl { name: "a", code: Some(97) }];
        let rules = [
            RuleDecl { lhs: "S", rhs: &["A"], anode: Some("cheap"), cost: 1, transl: Some(&[0][..]) },
            RuleDecl { lhs: "S", rhs: &["B"], anode: Some("dear"), cost: 1, transl: Some(&[0][..]) },
            RuleDecl { lhs: "A", rhs: &["a"], anode: Some("x"), cost: 2, transl: Some(&[0][..]) },
            RuleDecl { lhs: "B", rhs: &["a"], anode: Some("y"), cost: 5, transl: Some(&[0][..]) },
        ];
        let g = compile(true, &terms, &rules).unwrap();
        let (forest, _) = run(&g, Options { one_parse: true, cost: true }, &[97]);
        match forest.node(forest.root().unwrap()) {
            RawNode::Anode { name, cost, .. } => {
                assert_eq!(name.as_deref(), Some("cheap"));
                assert_eq!(*cost, 3);
            }
            other => panic!("unexpected root {:?}", other),
        }
    }

    #[test]
    fn identical_translations_are_not_ambiguous() {
        let terms = [TermDecl { name: "a", code: Some(97) }];
        let rules = [
            RuleDecl { lhs: "S", rhs: &["A"], anode: None, cost: 1, transl: Some(&[0][..]) },
            RuleDecl { lhs: "S", rhs: &["B"], anode: None, cost: 1, transl: Some(&[0][..]) },
            RuleDecl { lhs: "A", rhs: &["a"], anode: None, cost: 1, transl: Some(&[0][..]) },
            RuleDecl { lhs: "B", rhs: &["a"], anode: None, cost: 1, transl: Some(&[0][..]) },
        ];
        let g = compile(true, &terms, &rules).unwrap();
        let (forest, ambiguous) = run(&g, Options { one_parse: false, cost: false }, &[97]);
        assert!(!ambiguous);
        assert!(matches!(forest.node(forest.root().unwrap()), RawNode::Term { code: 97, .. }));
    }

    #[test]
    fn deep_left_recursion_in_every_mode() {
        let terms = [TermDecl { name: "x", code: Some(120) }];
        let rules = [
            RuleDecl { lhs: "L", rhs: &["L", "x"], anode: Some("list"), cost: 1, transl: Some(&[0, 1][..]) },
            RuleDecl { lhs: "L", rhs: &["x"], anode: None, cost: 1, transl: Some(&[0][..]) },
        ];
        let g = compile(true, &terms, &rules).unwrap();
        let input = vec![120; 20_000];
        for (one_parse, cost) in [(false, false), (true, false), (true, true)] {
            let (forest, ambiguous) = run(&g, Options { one_parse, cost }, &input);
            assert!(!ambiguous);
            match forest.node(forest.root().unwrap()) {
                RawNode::Anode { cost: root_cost, .. } => {
                    let expected = if cost { 19_999 } else { 1 };
                    assert_eq!(*root_cost, expected);
                }
                other => panic!("unexpected root {:?}", other),
            }
        }
    }

    #[test]
    fn nil_start_translation_has_no_root() {
        let terms = [TermDecl { name: "a", code: Some(97) }];
        let rules = [RuleDecl { lhs: "S", rhs: &["a"], anode: None, cost: 1, transl: None }];
        let g = compile(true, &terms, &rules).unwrap();
        let (forest, _) = run(&g, Options { one_parse: true, cost: false }, &[97]);
        assert_eq!(forest.root(), None);
    }
}
