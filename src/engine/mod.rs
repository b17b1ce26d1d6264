//! The grammar engine behind the binding.
//!
//! The call surface is deliberately narrow: status codes are plain `i32`
//! values from [`codes`], configuration goes through exchange setters that
//! return the previous value, grammars and tokens are pulled through
//! callbacks, and absent token indices are `-1`. The binding modules only talk
//! to the engine through [`RawGrammar`] and [`RawForest`].

pub mod codes;
mod compile;
mod description;
mod earley;
pub mod forest;
mod translate;

pub use compile::{RuleDecl, TermDecl, ERROR_NAME};
pub use earley::{ReadTokenFn, SyntaxErrorFn};
pub use forest::{DefaultAlloc, NodeId, ParseAlloc, RawForest, RawNode};

use compile::{CompileError, CompiledGrammar};
use earley::{Config, Recognizer};

/// Result of one engine parse.
pub struct RawParse<A> {
    pub status: i32,
    /// Present only when `status` is zero.
    pub forest: Option<RawForest<A>>,
    pub ambiguous: bool,
}

/// An engine grammar handle.
#[derive(Debug)]
pub struct RawGrammar {
    lookahead_level: i32,
    debug_level: i32,
    one_parse: i32,
    cost: i32,
    error_recovery: i32,
    recovery_match: i32,
    error_code: i32,
    error_message: String,
    grammar: Option<CompiledGrammar>,
}

impl RawGrammar {
    /// Allocate a handle with default settings and no grammar.
    pub fn create() -> Result<Box<RawGrammar>, i32> {
        let mut error_message = String::new();
        error_message.try_reserve(256).map_err(|_| codes::NO_MEMORY)?;
        Ok(Box::new(RawGrammar {
            lookahead_level: 1,
            debug_level: 0,
            one_parse: 1,
            cost: 0,
            error_recovery: 1,
            recovery_match: 3,
            error_code: codes::OK,
            error_message,
            grammar: None,
        }))
    }


    pub fn error_code(&self) -> i32 {
        self.error_code
    }

    /// Message for the most recent failure; empty after a success.
    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    /// Clamped to `0..=2`.
    pub fn set_lookahead_level(&mut self, level: i32) -> i32 {
        std::mem::replace(&mut self.lookahead_level, level.clamp(0, 2))
    }

    pub fn set_debug_level(&mut self, level: i32) -> i32 {
        std::mem::replace(&mut self.debug_level, level)
    }

    pub fn set_one_parse_flag(&mut self, flag: i32) -> i32 {
        std::mem::replace(&mut self.one_parse, (flag != 0) as i32)
    }

    pub fn set_cost_flag(&mut self, flag: i32) -> i32 {
        std::mem::replace(&mut self.cost, (flag != 0) as i32)
    }

    pub fn set_error_recovery_flag(&mut self, flag: i32) -> i32 {
        std::mem::replace(&mut self.error_recovery, (flag != 0) as i32)
    }

    /// Negative counts are stored as zero.
    pub fn set_recovery_match(&mut self, count: i32) -> i32 {
        std::mem::replace(&mut self.recovery_match, count.max(0))
    }

    pub fn is_loaded(&self) -> bool {
        self.grammar.is_some()
    }

    /// Code of a declared terminal; `None` for unknown names, nonterminals and
    /// `error`.
    pub fn terminal_code(&self, name: &str) -> Option<i32> {
        self.grammar.as_ref()?.terminal_code(name)
    }

    fn set_status(&mut self, code: i32, message: &str) -> i32 {
        self.error_code = code;
        self.error_message.clear();
        self.error_message.push_str(message);
        code
    }

    fn install(&mut self, compiled: Result<CompiledGrammar, CompileError>) -> i32 {
        match compiled {
            Ok(grammar) => {
                for warning in &grammar.warnings {
                    tracing::warn!("{}", warning);
                }
                tracing::debug!(
                    symbols = grammar.symbols.len(),
                    rules = grammar.rules.len(),
                    "grammar loaded"
                );
                self.grammar = Some(grammar);
                self.set_status(codes::OK, "")
            }
            Err(err) => {
                tracing::debug!(code = codes::name(err.code), "{}", err.message);
                self.grammar = None;
                self.set_status(err.code, &err.message)
            }
        }
    }

    /// Load a grammar from its textual description, replacing any previous
    /// grammar. With `strict`, unreachable and looping nonterminals are errors.
    pub fn parse_grammar(&mut self, strict: bool, description: &[u8]) -> i32 {
        let compiled = description::read(description)
            .and_then(|desc| desc.with_decls(|terms, rules| compile::compile(strict, terms, rules)));
        self.install(compiled)
    }

    /// Load a grammar from pulled declarations, replacing any previous grammar.
    /// Every declaration is collected before compilation starts, so the
    /// borrowed strings must stay alive for the whole call.
    pub fn read_grammar<'p>(
        &mut self,
        strict: bool,
        read_terminal: &mut dyn FnMut() -> Option<TermDecl<'p>>,
        read_rule: &mut dyn FnMut() -> Option<RuleDecl<'p>>,
    ) -> i32 {
        let terms: Vec<TermDecl<'p>> = std::iter::from_fn(read_terminal).collect();
        let rules: Vec<RuleDecl<'p>> = std::iter::from_fn(read_rule).collect();
        self.install(compile::compile(strict, &terms, &rules))
    }

    /// Parse the pulled tokens. `syntax_error` is called at most once, when
    /// error recovery is on. Nodes are paid for through `alloc` (the default
    /// allocator when absent) and returned to it on release.
    pub fn parse<A>(
        &mut self,
        read_token: &mut ReadTokenFn<'_, A>,
        syntax_error: Option<&mut SyntaxErrorFn<'_, A>>,
        alloc: Option<Box<dyn ParseAlloc>>,
    ) -> RawParse<A> {
        let failed = |status| RawParse { status, forest: None, ambiguous: false };
        if self.grammar.is_none() {
            self.set_status(codes::UNDEFINED_OR_BAD_GRAMMAR, "undefined or bad grammar");
            return failed(codes::UNDEFINED_OR_BAD_GRAMMAR);
        }
        let cfg = Config {
            lookahead: self.lookahead_level > 0,
            recovery: self.error_recovery != 0,
            recovery_match: self.recovery_match as usize,
            debug: self.debug_level,
        };
        let opts = translate::Options { one_parse: self.one_parse != 0, cost: self.cost != 0 };
        tracing::debug!(one_parse = opts.one_parse, cost = opts.cost, recovery = cfg.recovery, "parse started");

        let Some(grammar) = self.grammar.as_ref() else {
            return failed(codes::UNDEFINED_OR_BAD_GRAMMAR);
        };
        let recognized = Recognizer::new(grammar, cfg, read_token).run(syntax_error);
        let forest = RawForest::new(alloc.unwrap_or_else(|| Box::new(DefaultAlloc)));
        let result = match recognized {
            Ok(rec) => translate::translate(grammar, rec, opts, forest).map_err(|code| (code, "no memory".to_string())),
            Err(failure) => Err((failure.code, failure.message)),
        };
        match result {
            Ok((forest, ambiguous)) => {
                self.set_status(codes::OK, "");
                RawParse { status: codes::OK, forest: Some(forest), ambiguous }
            }
            Err((code, message)) => {
                tracing::debug!(code = codes::name(code), "{}", message);
                self.set_status(code, &message);
                failed(code)
            }
        }
    }
}

impl Drop for RawGrammar {
    fn drop(&mut self) {
        tracing::trace!(loaded = self.grammar.is_some(), "grammar handle released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setters_return_previous_and_normalize() {
        let mut g = RawGrammar::create().unwrap();
        assert_eq!(g.set_lookahead_level(7), 1);
        assert_eq!(g.set_lookahead_level(-3), 2);
        assert_eq!(g.set_lookahead_level(1), 0);
        assert_eq!(g.set_one_parse_flag(5), 1);
        assert_eq!(g.set_one_parse_flag(0), 1);
        assert_eq!(g.set_cost_flag(1), 0);
        assert_eq!(g.set_error_recovery_flag(0), 1);
        assert_eq!(g.set_recovery_match(-1), 3);
        assert_eq!(g.set_recovery_match(2), 0);
        assert_eq!(g.set_debug_level(9), 0);
        assert_eq!(g.set_debug_level(0), 9);
        drop(g);
    }

    #[test]
    fn failed_load_leaves_no_grammar() {
        let mut g = RawGrammar::create().unwrap();
        assert_eq!(g.parse_grammar(true, b"TERM a;\nS : a ;"), codes::OK);
        assert!(g.is_loaded());
        assert_eq!(g.parse_grammar(true, b"TERM error;\nS : ;"), codes::FIXED_NAME_USAGE);
        assert!(!g.is_loaded());
        assert!(!g.error_message().is_empty());

        let mut tokens = std::iter::empty::<(i32, ())>();
        let mut read = move || tokens.next();
        let parse = g.parse(&mut read, None, None);
        assert_eq!(parse.status, codes::UNDEFINED_OR_BAD_GRAMMAR);
        assert!(parse.forest.is_none());
    }
}
