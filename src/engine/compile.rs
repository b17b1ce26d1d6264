//! Grammar compilation: turns terminal and rule declarations into the symbol
//! and rule tables the recognizer runs on, and rejects grammars the recognizer
//! cannot use.

use super::codes;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

pub(crate) type SymbolId = u32;
pub(crate) type RuleId = u32;

/// Name of the predefined terminal used for error recovery.
pub const ERROR_NAME: &str = "error";

const RESERVED: [&str; 2] = ["$S", "$eof"];

/// First code handed out to terminals declared without one.
const FIRST_AUTO_CODE: i32 = 256;

/// A terminal declaration as delivered by a grammar reader.
#[derive(Debug, Clone, Copy)]
pub struct TermDecl<'p> {
    pub name: &'p str,
    /// `None` lets the engine assign a code.
    pub code: Option<i32>,
}

/// A rule declaration as delivered by a grammar reader.
///
/// `transl` lists zero-based RHS indices; a negative entry is a nil child.
/// Without `anode`, zero entries (or `None`) mean a nil translation and a
/// single entry passes the translation of that RHS symbol through.
#[derive(Debug, Clone, Copy)]
pub struct RuleDecl<'p> {
    pub lhs: &'p str,
    pub rhs: &'p [&'p str],
    pub anode: Option<&'p str>,
    pub cost: i32,
    pub transl: Option<&'p [i32]>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CompileError {
    pub code: i32,
    pub message: String,
}

impl CompileError {
    fn new(code: i32, message: impl Into<String>) -> Self {
        CompileError { code, message: message.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SymbolKind {
    Term { code: i32 },
    Nonterm,
}

#[derive(Debug, Clone)]
pub(crate) struct Symbol {
    pub name: Rc<str>,
    pub kind: SymbolKind,
}

impl Symbol {
    pub fn is_term(&self) -> bool {
        matches!(self.kind, SymbolKind::Term { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Translation {
    Nil,
    /// The translation of the RHS symbol at this index.
    Pass(usize),
    Anode {
        name: Option<Rc<str>>,
        cost: i32,
        /// `None` entries are nil children.
        children: Vec<Option<usize>>,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct Rule {
    pub lhs: SymbolId,
    pub rhs: Vec<SymbolId>,
    pub transl: Translation,
}

/// Fixed-size bit set over symbol ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SymbolSet {
    blocks: Box<[u64]>,
}

impl SymbolSet {
    fn new(nbits: usize) -> Self {
        SymbolSet { blocks: vec![0; nbits.div_ceil(64)].into_boxed_slice() }
    }

    fn insert(&mut self, bit: SymbolId) -> bool {
        let (block, mask) = (bit as usize / 64, 1u64 << (bit % 64));
        let changed = self.blocks[block] & mask == 0;
        self.blocks[block] |= mask;
        changed
    }

    /// Returns whether the set has changed.
    fn union_with(&mut self, other: &SymbolSet) -> bool {
        let mut changed = false;
        for (x, y) in self.blocks.iter_mut().zip(other.blocks.iter()) {
            let old = *x;
            *x |= *y;
            changed |= old != *x;
        }
        changed
    }

    pub fn contains(&self, bit: SymbolId) -> bool {
        self.blocks
            .get(bit as usize / 64)
            .is_some_and(|b| b & (1u64 << (bit % 64)) != 0)
    }
}

/// A grammar ready for recognition.
#[derive(Debug, Clone)]
pub(crate) struct CompiledGrammar {
    pub symbols: Vec<Symbol>,
    by_name: HashMap<Rc<str>, SymbolId>,
    term_by_code: HashMap<i32, SymbolId>,
    pub rules: Vec<Rule>,
    /// Rules per symbol, empty for terminals.
    pub rules_of: Vec<Vec<RuleId>>,
    pub start: SymbolId,
    pub error_term: SymbolId,
    pub nullable: Vec<bool>,
    /// Terminals that can begin each rule's RHS.
    pub rule_first: Vec<SymbolSet>,
    pub rule_nullable: Vec<bool>,
    /// Non-fatal findings (unreachable or looping nonterminals in lenient mode).
    pub warnings: Vec<String>,
}

impl CompiledGrammar {
    pub fn term_for_code(&self, code: i32) -> Option<SymbolId> {
        self.term_by_code.get(&code).copied()
    }

    pub fn symbol_named(&self, name: &str) -> Option<SymbolId> {
        self.by_name.get(name).copied()
    }

    pub fn terminal_code(&self, name: &str) -> Option<i32> {
        match self.symbols[self.symbol_named(name)? as usize].kind {
            SymbolKind::Term { code } if code >= 0 => Some(code),
            _ => None,
        }
    }

    pub fn name(&self, sym: SymbolId) -> &str {
        &self.symbols[sym as usize].name
    }

    pub fn is_term(&self, sym: SymbolId) -> bool {
        self.symbols[sym as usize].is_term()
    }

    pub fn item_text(&self, rule: RuleId, dot: usize) -> RuleText<'_> {
        RuleText { grammar: self, rule, dot }
    }
}

/// Display adapter rendering `lhs : a b . c`.
pub(crate) struct RuleText<'g> {
    grammar: &'g CompiledGrammar,
    rule: RuleId,
    dot: usize,
}

impl fmt::Display for RuleText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = &self.grammar.rules[self.rule as usize];
        write!(f, "{} :", self.grammar.name(rule.lhs))?;
        for (i, sym) in rule.rhs.iter().enumerate() {
            if self.dot == i {
                write!(f, " .")?;
            }
            write!(f, " {}", self.grammar.name(*sym))?;
        }
        if self.dot == rule.rhs.len() {
            write!(f, " .")?;
        }
        Ok(())
    }
}

struct Builder {
    symbols: Vec<Symbol>,
    by_name: HashMap<Rc<str>, SymbolId>,
}

impl Builder {
    fn add(&mut self, name: &str, kind: SymbolKind) -> SymbolId {
        let name: Rc<str> = Rc::from(name);
        let id = self.symbols.len() as SymbolId;
        self.symbols.push(Symbol { name: name.clone(), kind });
        self.by_name.insert(name, id);
        id
    }

    fn nonterm(&mut self, name: &str) -> SymbolId {
        match self.by_name.get(name) {
            Some(&id) => id,
            None => self.add(name, SymbolKind::Nonterm),
        }
    }
}

fn check_name(name: &str) -> Result<(), CompileError> {
    if name.is_empty() {
        return Err(CompileError::new(codes::INCORRECT_SYMBOL_NUMBER, "empty symbol name"));
    }
    if RESERVED.contains(&name) {
        return Err(CompileError::new(
            codes::FIXED_NAME_USAGE,
            format!("do not use fixed name `{}`", name),
        ));
    }
    Ok(())
}

/// Compile declarations into a grammar. With `strict`, unreachable and looping
/// nonterminals are errors; otherwise they are recorded as warnings.
pub(crate) fn compile(
    strict: bool,
    terms: &[TermDecl<'_>],
    rules: &[RuleDecl<'_>],
) -> Result<CompiledGrammar, CompileError> {
    let mut b = Builder { symbols: Vec::new(), by_name: HashMap::new() };
    let error_term = b.add(ERROR_NAME, SymbolKind::Term { code: -1 });

    let mut term_by_code = HashMap::new();
    let mut pending_auto = Vec::new();
    for decl in terms {
        check_name(decl.name)?;
        if decl.name == ERROR_NAME {
            return Err(CompileError::new(
                codes::FIXED_NAME_USAGE,
                format!("do not use fixed name `{}`", ERROR_NAME),
            ));
        }
        if b.by_name.contains_key(decl.name) {
            return Err(CompileError::new(
                codes::REPEATED_TERM_DECL,
                format!("repeated declaration of term `{}`", decl.name),
            ));
        }
        match decl.code {
            Some(code) if code < 0 => {
                return Err(CompileError::new(
                    codes::NEGATIVE_TERM_CODE,
                    format!("term `{}` has negative code {}", decl.name, code),
                ));
            }
            Some(code) => {
                if term_by_code.contains_key(&code) {
                    return Err(CompileError::new(
                        codes::REPEATED_TERM_CODE,
                        format!("repeated code {} in term `{}`", code, decl.name),
                    ));
                }
                let id = b.add(decl.name, SymbolKind::Term { code });
                term_by_code.insert(code, id);
            }
            None => pending_auto.push(b.add(decl.name, SymbolKind::Term { code: -1 })),
        }
    }
    let mut next_code = match term_by_code.keys().copied().max() {
        Some(max) => max.checked_add(1).map(|code| code.max(FIRST_AUTO_CODE)),
        None => Some(FIRST_AUTO_CODE),
    };
    for id in pending_auto {
        while let Some(taken) = next_code.filter(|code| term_by_code.contains_key(code)) {
            next_code = taken.checked_add(1);
        }
        let Some(code) = next_code else {
            return Err(CompileError::new(
                codes::REPEATED_TERM_CODE,
                format!("no free code left for term `{}`", b.symbols[id as usize].name),
            ));
        };
        b.symbols[id as usize].kind = SymbolKind::Term { code };
        term_by_code.insert(code, id);
        next_code = code.checked_add(1);
    }

    if rules.is_empty() {
        return Err(CompileError::new(codes::NO_RULES, "grammar does not contain rules"));
    }

    let mut compiled_rules = Vec::with_capacity(rules.len());
    for decl in rules {
        check_name(decl.lhs)?;
        let lhs = match b.by_name.get(decl.lhs) {
            Some(&id) if b.symbols[id as usize].is_term() => {
                return Err(CompileError::new(
                    codes::TERM_IN_RULE_LHS,
                    format!("term `{}` in the left hand side of rule", decl.lhs),
                ));
            }
            _ => b.nonterm(decl.lhs),
        };
        let mut rhs = Vec::with_capacity(decl.rhs.len());
        for name in decl.rhs {
            check_name(name)?;
            rhs.push(b.nonterm(name));
        }
        let transl = translation(decl)?;
        compiled_rules.push(Rule { lhs, rhs, transl });
    }

    let nsyms = b.symbols.len();
    let mut rules_of = vec![Vec::new(); nsyms];
    for (i, rule) in compiled_rules.iter().enumerate() {
        rules_of[rule.lhs as usize].push(i as RuleId);
    }
    let start = compiled_rules[0].lhs;
    let is_term: Vec<bool> = b.symbols.iter().map(Symbol::is_term).collect();

    // Productivity: every nonterminal must derive some terminal string.
    let mut productive = is_term.clone();
    loop {
        let mut changed = false;
        for rule in &compiled_rules {
            if !productive[rule.lhs as usize] && rule.rhs.iter().all(|s| productive[*s as usize]) {
                productive[rule.lhs as usize] = true;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    if let Some(bad) = (0..nsyms).find(|&s| !productive[s]) {
        return Err(CompileError::new(
            codes::NONTERM_DERIVATION,
            format!("nonterm `{}` does not derive any term string", b.symbols[bad].name),
        ));
    }

    let mut warnings = Vec::new();

    let mut reachable = vec![false; nsyms];
    let mut stack = vec![start];
    reachable[start as usize] = true;
    while let Some(sym) = stack.pop() {
        for &r in &rules_of[sym as usize] {
            for &s in &compiled_rules[r as usize].rhs {
                if !reachable[s as usize] {
                    reachable[s as usize] = true;
                    stack.push(s);
                }
            }
        }
    }
    for s in (0..nsyms).filter(|&s| !is_term[s] && !reachable[s]) {
        let message = format!("unaccessible nonterm `{}`", b.symbols[s].name);
        if strict {
            return Err(CompileError::new(codes::UNACCESSIBLE_NONTERM, message));
        }
        warnings.push(message);
    }

    let mut nullable = vec![false; nsyms];
    loop {
        let mut changed = false;
        for rule in &compiled_rules {
            if !nullable[rule.lhs as usize] && rule.rhs.iter().all(|s| nullable[*s as usize]) {
                nullable[rule.lhs as usize] = true;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    if let Some(looping) = find_loop(&compiled_rules, &nullable, nsyms) {
        let message = format!("nonterm `{}` can derive only itself", b.symbols[looping as usize].name);
        if strict {
            return Err(CompileError::new(codes::LOOP_NONTERM, message));
        }
        warnings.push(message);
    }

    let mut first = vec![SymbolSet::new(nsyms); nsyms];
    for (s, set) in first.iter_mut().enumerate() {
        if is_term[s] {
            set.insert(s as SymbolId);
        }
    }
    loop {
        let mut changed = false;
        for rule in &compiled_rules {
            let mut acc = SymbolSet::new(nsyms);
            first_of_seq(&mut acc, &first, &nullable, &rule.rhs);
            changed |= first[rule.lhs as usize].union_with(&acc);
        }
        if !changed {
            break;
        }
    }
    let mut rule_first = Vec::with_capacity(compiled_rules.len());
    let mut rule_nullable = Vec::with_capacity(compiled_rules.len());
    for rule in &compiled_rules {
        let mut acc = SymbolSet::new(nsyms);
        first_of_seq(&mut acc, &first, &nullable, &rule.rhs);
        rule_first.push(acc);
        rule_nullable.push(rule.rhs.iter().all(|s| nullable[*s as usize]));
    }

    Ok(CompiledGrammar {
        symbols: b.symbols,
        by_name: b.by_name,
        term_by_code,
        rules: compiled_rules,
        rules_of,
        start,
        error_term,
        nullable,
        rule_first,
        rule_nullable,
        warnings,
    })
}

fn first_of_seq(result: &mut SymbolSet, first: &[SymbolSet], nullable: &[bool], seq: &[SymbolId]) {
    for &sym in seq {
        result.union_with(&first[sym as usize]);
        if !nullable[sym as usize] {
            return;
        }
    }
}

fn translation(decl: &RuleDecl<'_>) -> Result<Translation, CompileError> {
    if decl.cost < 0 {
        return Err(CompileError::new(
            codes::NEGATIVE_COST,
            format!("negative cost {} in rule for `{}`", decl.cost, decl.lhs),
        ));
    }
    let indices = decl.transl.unwrap_or(&[]);
    let mut children = Vec::with_capacity(indices.len());
    for &idx in indices {
        if idx < 0 {
            children.push(None);
        } else if (idx as usize) < decl.rhs.len() {
            children.push(Some(idx as usize));
        } else {
            return Err(CompileError::new(
                codes::INCORRECT_TRANSLATION,
                format!(
                    "translation symbol number {} in rule for `{}` is out of range",
                    idx, decl.lhs
                ),
            ));
        }
    }
    if let Some(name) = decl.anode {
        return Ok(Translation::Anode { name: Some(Rc::from(name)), cost: decl.cost, children });
    }
    let pass = match children.as_slice() {
        [] | [None] => Some(None),
        [Some(idx)] => Some(Some(*idx)),
        _ => None,
    };
    Ok(match pass {
        Some(None) => Translation::Nil,
        Some(Some(idx)) => Translation::Pass(idx),
        None => Translation::Anode { name: None, cost: decl.cost, children },
    })
}

/// A nonterminal that derives itself through rules whose other symbols are
/// all nullable.
fn find_loop(rules: &[Rule], nullable: &[bool], nsyms: usize) -> Option<SymbolId> {
    let mut edges = vec![Vec::new(); nsyms];
    for rule in rules {
        for (i, &sym) in rule.rhs.iter().enumerate() {
            let others_nullable = rule
                .rhs
                .iter()
                .enumerate()
                .all(|(j, s)| j == i || nullable[*s as usize]);
            if others_nullable {
                edges[rule.lhs as usize].push(sym);
            }
        }
    }
    (0..nsyms as SymbolId).find(|&origin| {
        let mut seen = vec![false; nsyms];
        let mut stack = edges[origin as usize].clone();
        while let Some(sym) = stack.pop() {
            if sym == origin {
                return true;
            }
            if !std::mem::replace(&mut seen[sym as usize], true) {
                stack.extend(edges[sym as usize].iter().copied());
            }
        }
        false
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule<'p>(lhs: &'p str, rhs: &'p [&'p str], transl: Option<&'p [i32]>) -> RuleDecl<'p> {
        RuleDecl { lhs, rhs, anode: None, cost: 1, transl }
    }

    #[test]
    fn auto_codes_follow_explicit_ones() {
        let terms = [
            TermDecl { name: "a", code: Some(300) },
            TermDecl { name: "b", code: None },
            TermDecl { name: "c", code: None },
        ];
        let rules = [rule("S", &["a", "b", "c"], None)];
        let g = compile(true, &terms, &rules).unwrap();
        assert_eq!(g.terminal_code("a"), Some(300));
        assert_eq!(g.terminal_code("b"), Some(301));
        assert_eq!(g.terminal_code("c"), Some(302));
        assert_eq!(g.terminal_code("error"), None);
    }

    #[test]
    fn auto_codes_never_reuse_the_top_code() {
        let rules = [rule("S", &["a", "b"], None)];
        let terms = [TermDecl { name: "a", code: Some(i32::MAX) }, TermDecl { name: "b", code: None }];
        let err = compile(true, &terms, &rules).unwrap_err();
        assert_eq!(err.code, codes::REPEATED_TERM_CODE);
        assert!(err.message.contains("`b`"), "{}", err.message);

        let terms = [TermDecl { name: "a", code: Some(i32::MAX - 1) }, TermDecl { name: "b", code: None }];
        let g = compile(true, &terms, &rules).unwrap();
        assert_eq!(g.terminal_code("b"), Some(i32::MAX));
    }

    #[test]
    fn rejects_bad_declarations() {
        let rules = [rule("S", &["a"], None)];
        let dup = [TermDecl { name: "a", code: None }, TermDecl { name: "a", code: None }];
        assert_eq!(compile(true, &dup, &rules).unwrap_err().code, codes::REPEATED_TERM_DECL);

        let neg = [TermDecl { name: "a", code: Some(-4) }];
        assert_eq!(compile(true, &neg, &rules).unwrap_err().code, codes::NEGATIVE_TERM_CODE);

        let same_code = [TermDecl { name: "a", code: Some(1) }, TermDecl { name: "b", code: Some(1) }];
        assert_eq!(compile(true, &same_code, &rules).unwrap_err().code, codes::REPEATED_TERM_CODE);

        let fixed = [TermDecl { name: "error", code: None }];
        assert_eq!(compile(true, &fixed, &rules).unwrap_err().code, codes::FIXED_NAME_USAGE);

        let terms = [TermDecl { name: "a", code: None }];
        assert_eq!(compile(true, &terms, &[]).unwrap_err().code, codes::NO_RULES);
        let lhs_term = [rule("a", &["a"], None)];
        assert_eq!(compile(true, &terms, &lhs_term).unwrap_err().code, codes::TERM_IN_RULE_LHS);
        let bad_index = [rule("S", &["a"], Some(&[3][..]))];
        assert_eq!(compile(true, &terms, &bad_index).unwrap_err().code, codes::INCORRECT_TRANSLATION);
        let undefined = [rule("S", &["a", "X"], None)];
        assert_eq!(compile(true, &terms, &undefined).unwrap_err().code, codes::NONTERM_DERIVATION);
    }

    #[test]
    fn unreachable_and_loops_are_strict_only() {
        let terms = [TermDecl { name: "a", code: None }];
        let rules = [rule("S", &["a"], None), rule("T", &["a"], None)];
        assert_eq!(compile(true, &terms, &rules).unwrap_err().code, codes::UNACCESSIBLE_NONTERM);
        let lenient = compile(false, &terms, &rules).unwrap();
        assert_eq!(lenient.warnings.len(), 1);

        let looping = [rule("S", &["S"], None), rule("S", &["a"], None)];
        assert_eq!(compile(true, &terms, &looping).unwrap_err().code, codes::LOOP_NONTERM);
        assert!(compile(false, &terms, &looping).is_ok());
    }

    #[test]
    fn translation_shapes() {
        let terms = [TermDecl { name: "a", code: None }];
        let rules = [
            rule("S", &["A", "A"], Some(&[1][..])),
            rule("A", &["a"], Some(&[][..])),
            RuleDecl { lhs: "A", rhs: &["a", "a"], anode: Some("pair"), cost: 2, transl: Some(&[0, -1, 1][..]) },
            rule("A", &["a", "a", "a"], Some(&[2, 0][..])),
        ];
        let g = compile(true, &terms, &rules).unwrap();
        assert_eq!(g.rules[0].transl, Translation::Pass(1));
        assert_eq!(g.rules[1].transl, Translation::Nil);
        assert_eq!(
            g.rules[2].transl,
            Translation::Anode { name: Some("pair".into()), cost: 2, children: vec![Some(0), None, Some(1)] }
        );
        assert_eq!(
            g.rules[3].transl,
            Translation::Anode { name: None, cost: 1, children: vec![Some(2), Some(0)] }
        );
    }

    #[test]
    fn first_sets_see_through_nullable_prefixes() {
        let terms = [TermDecl { name: "a", code: None }, TermDecl { name: "b", code: None }];
        let rules = [rule("S", &["N", "b"], None), rule("N", &[], None), rule("N", &["a"], None)];
        let g = compile(true, &terms, &rules).unwrap();
        let a = g.symbol_named("a").unwrap();
        let b = g.symbol_named("b").unwrap();
        assert!(g.rule_first[0].contains(a));
        assert!(g.rule_first[0].contains(b));
        assert!(g.nullable[g.symbol_named("N").unwrap() as usize]);
        assert!(!g.rule_nullable[0]);
    }
}
