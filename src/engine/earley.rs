//! Earley recognition over a lazily read token stream, with optional
//! one-token lookahead on prediction and recovery through the `error` terminal.
//!
//! Set `k` holds the items before input position `k` is consumed. After a
//! successful recovery the input seen by the recognizer is the token stream with
//! one span of ignored tokens replaced by a single `error` symbol (a [`Splice`]).

use super::codes;
use super::compile::{CompiledGrammar, RuleId, SymbolId};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Item {
    pub rule: RuleId,
    pub dot: u32,
    pub origin: u32,
}

/// An Earley set: items in insertion order plus a membership index.
#[derive(Debug, Clone, Default)]
pub(crate) struct ItemSet {
    pub items: Vec<Item>,
    seen: HashSet<Item>,
}

impl ItemSet {
    fn add(&mut self, item: Item) -> bool {
        if self.seen.insert(item) {
            self.items.push(item);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, item: &Item) -> bool {
        self.seen.contains(item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug)]
pub(crate) struct Token<A> {
    pub code: i32,
    pub sym: SymbolId,
    /// Taken when the token's terminal node is built.
    pub attr: Option<A>,
}

/// The `error` symbol stands for tokens `[at, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Splice {
    pub at: usize,
    pub end: usize,
}

/// What the recognizer sees at an input position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InputSym {
    /// Index into the token stream; equal to the token count at end of input.
    Token(usize),
    Error { start: usize, end: usize },
}

fn input_at(k: usize, splice: Option<Splice>) -> InputSym {
    match splice {
        Some(s) if k == s.at => InputSym::Error { start: s.at, end: s.end },
        Some(s) if k > s.at => InputSym::Token(s.end + (k - s.at - 1)),
        _ => InputSym::Token(k),
    }
}

/// Recognizer settings taken from the grammar handle.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Config {
    pub lookahead: bool,
    pub recovery: bool,
    pub recovery_match: usize,
    pub debug: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Failure {
    pub code: i32,
    pub message: String,
}

impl Failure {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Failure { code, message: message.into() }
    }
}

/// Syntax error report: erroneous token, first ignored token and first
/// recovered token, each with its attribute. `-1` marks an absent index.
pub type SyntaxErrorFn<'a, A> =
    dyn FnMut(i32, Option<&A>, i32, Option<&A>, i32, Option<&A>) + 'a;

/// Token source: `None` or a negative code ends the input.
pub type ReadTokenFn<'a, A> = dyn FnMut() -> Option<(i32, A)> + 'a;

/// An accepted input.
#[derive(Debug)]
pub(crate) struct Recognition<A> {
    pub sets: Vec<ItemSet>,
    pub tokens: Vec<Token<A>>,
    pub splice: Option<Splice>,
    /// Index of the final (accepting) set.
    pub end: usize,
}

impl<A> Recognition<A> {
    pub fn input_at(&self, k: usize) -> InputSym {
        input_at(k, self.splice)
    }
}

struct TokenReader<'r, A> {
    read: &'r mut ReadTokenFn<'r, A>,
    tokens: Vec<Token<A>>,
    eof: bool,
}

impl<A> TokenReader<'_, A> {
    /// Read until token `idx` is available or input ends.
    fn fill(&mut self, g: &CompiledGrammar, idx: usize) -> Result<(), Failure> {
        while self.tokens.len() <= idx && !self.eof {
            match (self.read)() {
                Some((code, attr)) if code >= 0 => {
                    let sym = g.term_for_code(code).ok_or_else(|| {
                        Failure::new(
                            codes::INVALID_TOKEN_CODE,
                            format!("invalid token code {} at token {}", code, self.tokens.len()),
                        )
                    })?;
                    self.tokens.push(Token { code, sym, attr: Some(attr) });
                }
                _ => self.eof = true,
            }
        }
        Ok(())
    }

    fn symbol(&mut self, g: &CompiledGrammar, idx: usize) -> Result<Option<SymbolId>, Failure> {
        self.fill(g, idx)?;
        Ok(self.tokens.get(idx).map(|t| t.sym))
    }

    /// Whether position `idx` exists, where the end of input is a position.
    fn reaches(&mut self, g: &CompiledGrammar, idx: usize) -> Result<bool, Failure> {
        if idx > 0 {
            self.fill(g, idx - 1)?;
        }
        Ok(self.tokens.len() >= idx)
    }

    fn attr(&self, idx: usize) -> Option<&A> {
        self.tokens.get(idx).and_then(|t| t.attr.as_ref())
    }
}

enum Step {
    /// Input ended in an accepting set with this index.
    Accepted(usize),
    /// Input position that could not be consumed.
    Failed(usize),
    /// Reached the requested stop position.
    Reached(usize),
}

struct Recovery {
    sets: Vec<ItemSet>,
    splice: Splice,
    step: Step,
}

pub(crate) struct Recognizer<'g, 'r, A> {
    g: &'g CompiledGrammar,
    cfg: Config,
    reader: TokenReader<'r, A>,
}

impl<'g, 'r, A> Recognizer<'g, 'r, A> {
    pub fn new(g: &'g CompiledGrammar, cfg: Config, read: &'r mut ReadTokenFn<'r, A>) -> Self {
        Recognizer {
            g,
            cfg,
            reader: TokenReader { read, tokens: Vec::new(), eof: false },
        }
    }

    pub fn run(mut self, mut report: Option<&mut SyntaxErrorFn<'_, A>>) -> Result<Recognition<A>, Failure> {
        let mut sets = vec![ItemSet::default()];
        let mut splice = None;
        let mut from = 0;
        loop {
            let failed_at = match self.advance(&mut sets, from, splice, None)? {
                Step::Accepted(end) => return Ok(self.finish(sets, splice, end)),
                Step::Reached(k) => {
                    from = k;
                    continue;
                }
                Step::Failed(k) => k,
            };

            let error_token = match input_at(failed_at, splice) {
                InputSym::Token(t) => t,
                InputSym::Error { start, .. } => start,
            };
            let message = if self.reader.tokens.len() == error_token {
                "syntax error at end of input".to_string()
            } else {
                format!("syntax error on token {}", error_token)
            };
            if !self.cfg.recovery {
                return Err(Failure::new(codes::SYNTAX_ERROR, message));
            }
            if splice.is_some() {
                tracing::debug!(error_token, "second syntax error, recovery already used");
                return Err(Failure::new(codes::SYNTAX_ERROR, message));
            }

            let Some(found) = self.recover(&sets, failed_at)? else {
                tracing::debug!(error_token, "no recovery point");
                if let Some(report) = report.as_deref_mut() {
                    report(error_token as i32, self.reader.attr(error_token), -1, None, -1, None);
                }
                return Err(Failure::new(codes::SYNTAX_ERROR, message));
            };
            let Splice { at, end } = found.splice;
            tracing::debug!(error_token, start_ignored = at, start_recovered = end, "recovered");
            if let Some(report) = report.as_deref_mut() {
                report(
                    error_token as i32,
                    self.reader.attr(error_token),
                    at as i32,
                    self.reader.attr(at),
                    end as i32,
                    self.reader.attr(end),
                );
            }
            sets = found.sets;
            splice = Some(found.splice);
            match found.step {
                Step::Accepted(end) => return Ok(self.finish(sets, splice, end)),
                Step::Reached(k) | Step::Failed(k) => from = k,
            }
        }
    }

    fn finish(self, sets: Vec<ItemSet>, splice: Option<Splice>, end: usize) -> Recognition<A> {
        if self.cfg.debug >= 1 {
            let items: usize = sets.iter().map(ItemSet::len).sum();
            tracing::debug!(sets = sets.len(), items, tokens = self.reader.tokens.len(), "input accepted");
        }
        Recognition { sets, tokens: self.reader.tokens, splice, end }
    }

    fn symbol_at(&mut self, k: usize, splice: Option<Splice>) -> Result<Option<SymbolId>, Failure> {
        match input_at(k, splice) {
            InputSym::Token(t) => self.reader.symbol(self.g, t),
            InputSym::Error { .. } => Ok(Some(self.g.error_term)),
        }
    }

    /// Run from set `from` until the input is accepted, a position fails, or
    /// set `stop` is created.
    fn advance(
        &mut self,
        sets: &mut Vec<ItemSet>,
        from: usize,
        splice: Option<Splice>,
        stop: Option<usize>,
    ) -> Result<Step, Failure> {
        let mut k = from;
        loop {
            if stop == Some(k) {
                return Ok(Step::Reached(k));
            }
            let next = self.symbol_at(k, splice)?;
            self.close(sets, k, next);
            if self.cfg.debug >= 2 {
                self.trace_set(&sets[k], k);
            }
            let Some(sym) = next else {
                return Ok(if self.accepts(&sets[k]) { Step::Accepted(k) } else { Step::Failed(k) });
            };
            let scanned = self.scan(&sets[k], sym);
            if scanned.is_empty() {
                return Ok(Step::Failed(k));
            }
            sets.truncate(k + 1);
            sets.push(scanned);
            k += 1;
        }
    }

    fn next_symbol(&self, item: &Item) -> Option<SymbolId> {
        self.g.rules[item.rule as usize].rhs.get(item.dot as usize).copied()
    }

    /// Prediction filter: a rule is predicted when it can start with the next
    /// input symbol, derives the empty string, or can start with `error`.
    fn admits(&self, rule: RuleId, next: Option<SymbolId>) -> bool {
        if !self.cfg.lookahead || self.g.rule_nullable[rule as usize] {
            return true;
        }
        let first = &self.g.rule_first[rule as usize];
        (self.cfg.recovery && first.contains(self.g.error_term)) || next.is_some_and(|s| first.contains(s))
    }

    fn close(&self, sets: &mut [ItemSet], i: usize, next: Option<SymbolId>) {
        let g = self.g;
        if i == 0 {
            for &r in &g.rules_of[g.start as usize] {
                if self.admits(r, next) {
                    sets[0].add(Item { rule: r, dot: 0, origin: 0 });
                }
            }
        }
        let mut idx = 0;
        while idx < sets[i].items.len() {
            let item = sets[i].items[idx];
            idx += 1;
            match self.next_symbol(&item) {
                Some(sym) if !g.is_term(sym) => {
                    for &r in &g.rules_of[sym as usize] {
                        if self.admits(r, next) {
                            sets[i].add(Item { rule: r, dot: 0, origin: i as u32 });
                        }
                    }
                    if g.nullable[sym as usize] {
                        sets[i].add(Item { dot: item.dot + 1, ..item });
                    }
                }
                Some(_) => {}
                None => {
                    let lhs = g.rules[item.rule as usize].lhs;
                    let waiting: Vec<Item> = sets[item.origin as usize]
                        .items
                        .iter()
                        .filter(|w| self.next_symbol(w) == Some(lhs))
                        .map(|w| Item { dot: w.dot + 1, ..*w })
                        .collect();
                    for w in waiting {
                        sets[i].add(w);
                    }
                }
            }
        }
    }

    fn scan(&self, set: &ItemSet, sym: SymbolId) -> ItemSet {
        let mut out = ItemSet::default();
        for item in &set.items {
            if self.next_symbol(item) == Some(sym) {
                out.add(Item { dot: item.dot + 1, ..*item });
            }
        }
        out
    }

    fn accepts(&self, set: &ItemSet) -> bool {
        set.items.iter().any(|item| {
            let rule = &self.g.rules[item.rule as usize];
            item.origin == 0 && rule.lhs == self.g.start && item.dot as usize == rule.rhs.len()
        })
    }

    fn expects_error(&self, set: &ItemSet) -> bool {
        set.items.iter().any(|item| self.next_symbol(item) == Some(self.g.error_term))
    }

    /// Find the recovery with the fewest ignored tokens, preferring the latest
    /// back-off point on ties.
    ///
    /// Back-off points are tried latest first, each with growing ignored
    /// spans, against one trial vector whose prefix is shared with `sets`.
    /// A candidate only changes sets from its back-off point on. Spans as long
    /// as the best one found so far are skipped, and so is a token whose
    /// symbol already failed right after the `error` symbol at this point.
    fn recover(&mut self, sets: &[ItemSet], failed_at: usize) -> Result<Option<Recovery>, Failure> {
        let backoffs: Vec<usize> = (0..=failed_at).rev().filter(|&q| self.expects_error(&sets[q])).collect();
        let Some(&latest) = backoffs.first() else {
            return Ok(None);
        };
        let at_eof = self.symbol_at(failed_at, None)?.is_none();
        let min_end = if at_eof { failed_at } else { failed_at + 1 };
        let shorter = |best: Option<Splice>, q: usize, end: usize| best.map_or(true, |b| end - q < b.end - b.at);

        let mut trial: Vec<ItemSet> = sets[..latest].to_vec();
        let mut best: Option<Splice> = None;
        for &q in &backoffs {
            let first_end = q.max(min_end);
            if !shorter(best, q, first_end) {
                break;
            }
            let mut dead: HashSet<Option<SymbolId>> = HashSet::new();
            let mut end = first_end;
            while shorter(best, q, end) && self.reader.reaches(self.g, end)? {
                let next = self.symbol_at(end, None)?;
                if !dead.contains(&next) {
                    let splice = Splice { at: q, end };
                    match self.trial(&mut trial, sets, splice)? {
                        Step::Failed(k) => {
                            tracing::trace!(start_ignored = q, start_recovered = end, "recovery candidate rejected");
                            if k <= q + 1 {
                                dead.insert(next);
                            }
                        }
                        _ => best = Some(splice),
                    }
                }
                end += 1;
            }
        }

        let Some(splice) = best else {
            return Ok(None);
        };
        match self.trial(&mut trial, sets, splice)? {
            Step::Failed(_) => Ok(None),
            step => Ok(Some(Recovery { sets: trial, splice, step })),
        }
    }

    /// Run one recovery candidate on `trial`, restoring its sets up to the
    /// back-off point from `sets` first.
    fn trial(&mut self, trial: &mut Vec<ItemSet>, sets: &[ItemSet], splice: Splice) -> Result<Step, Failure> {
        trial.truncate(splice.at);
        let kept = trial.len();
        trial.extend_from_slice(&sets[kept..=splice.at]);
        let stop = splice.at + 1 + self.cfg.recovery_match;
        self.advance(trial, splice.at, Some(splice), Some(stop))
    }

    fn trace_set(&self, set: &ItemSet, k: usize) {
        for item in &set.items {
            tracing::trace!(
                set = k,
                origin = item.origin,
                "{}",
                self.g.item_text(item.rule, item.dot as usize)
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::compile::{compile, RuleDecl, TermDecl};

    fn cfg() -> Config {
        Config { lookahead: true, recovery: true, recovery_match: 3, debug: 0 }
    }

    fn recognize(g: &CompiledGrammar, cfg: Config, codes: &[i32]) -> Result<Recognition<()>, Failure> {
        let mut it = codes.iter().copied();
        let mut read = move || it.next().map(|c| (c, ()));
        Recognizer::new(g, cfg, &mut read).run(None)
    }

    #[test]
    fn splice_maps_positions() {
        let s = Some(Splice { at: 2, end: 5 });
        assert_eq!(input_at(1, s), InputSym::Token(1));
        assert_eq!(input_at(2, s), InputSym::Error { start: 2, end: 5 });
        assert_eq!(input_at(3, s), InputSym::Token(5));
        assert_eq!(input_at(4, None), InputSym::Token(4));
    }

    #[test]
    fn balanced_strings() {
        let terms = [TermDecl { name: "a", code: Some(97) }, TermDecl { name: "b", code: Some(98) }];
        let rules = [
            RuleDecl { lhs: "S", rhs: &["a", "S", "b"], anode: None, cost: 1, transl: None },
            RuleDecl { lhs: "S", rhs: &[], anode: None, cost: 1, transl: None },
        ];
        let g = compile(true, &terms, &rules).unwrap();
        for lookahead in [false, true] {
            let cfg = Config { lookahead, ..cfg() };
            assert_eq!(recognize(&g, cfg, &[]).unwrap().end, 0);
            assert_eq!(recognize(&g, cfg, &[97, 97, 98, 98]).unwrap().end, 4);
            assert_eq!(recognize(&g, cfg, &[97, 98, 98]).unwrap_err().code, codes::SYNTAX_ERROR);
        }
        assert_eq!(recognize(&g, cfg(), &[97, 42]).unwrap_err().code, codes::INVALID_TOKEN_CODE);
    }

    #[test]
    fn error_rule_absorbs_bad_tokens() {
        let terms = [TermDecl { name: "x", code: Some(1) }, TermDecl { name: "semi", code: Some(2) }];
        let rules = [
            RuleDecl { lhs: "L", rhs: &["L", "St"], anode: None, cost: 1, transl: None },
            RuleDecl { lhs: "L", rhs: &["St"], anode: None, cost: 1, transl: None },
            RuleDecl { lhs: "St", rhs: &["x", "semi"], anode: None, cost: 1, transl: None },
            RuleDecl { lhs: "St", rhs: &["error", "semi"], anode: None, cost: 1, transl: None },
        ];
        let g = compile(true, &terms, &rules).unwrap();
        let mut seen = Vec::new();
        let mut report = |e: i32, _: Option<&()>, i: i32, _: Option<&()>, r: i32, _: Option<&()>| seen.push((e, i, r));
        let mut it = [1, 2, 1, 1, 2, 1, 2].into_iter();
        let mut read = move || it.next().map(|c| (c, ()));
        let rec = Recognizer::new(&g, cfg(), &mut read).run(Some(&mut report)).unwrap();
        assert_eq!(rec.splice, Some(Splice { at: 2, end: 4 }));
        assert_eq!(seen, vec![(3, 2, 4)]);
    }
}
