//! Grammar handle: owns one engine grammar and its configuration.

use crate::engine::{codes, RawGrammar};
use crate::error::Error;
use std::fmt;

/// Numeric configuration knobs of a [`Grammar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrammarOption {
    /// `0` disables prediction lookahead; stored clamped to `0..=2`.
    LookaheadLevel,
    /// `>= 2` traces every Earley set through `tracing`.
    DebugLevel,
    /// Build only one translation instead of the whole forest.
    OneParse,
    /// With one-parse, pick the cheapest derivation.
    Cost,
    ErrorRecovery,
    /// Tokens that must scan after a recovery for it to be accepted.
    RecoveryMatch,
}

/// An engine grammar handle.
///
/// The handle owns its engine grammar and releases it exactly once, when it
/// is dropped or passed to [`Grammar::free`]. It is neither `Clone` nor `Sync`; parsing takes
/// `&mut self`, so one handle is never used by two parses at a time.
pub struct Grammar {
    raw: Box<RawGrammar>,
}

impl Grammar {
    /// Create a handle with engine defaults: lookahead level 1, debug level 0,
    /// one-parse on, cost off, error recovery on, recovery match 3.
    pub fn new() -> Result<Grammar, Error> {
        let raw = RawGrammar::create().map_err(|_| Error::NoMemory)?;
        tracing::trace!("grammar handle created");
        Ok(Grammar { raw })
    }

    /// Release the handle now.
    pub fn free(self) {
        drop(self);
    }

    pub(crate) fn raw_mut(&mut self) -> &mut RawGrammar {
        &mut self.raw
    }

    /// Status of the most recent grammar load or parse; `0` after a success.
    pub fn error_code(&self) -> i32 {
        self.raw.error_code()
    }

    pub fn error_message(&self) -> Option<&str> {
        Some(self.raw.error_message()).filter(|m| !m.is_empty())
    }

    pub(crate) fn last_error(&self) -> (i32, String) {
        (self.raw.error_code(), self.raw.error_message().to_string())
    }

    /// Whether the last grammar load succeeded.
    pub fn is_loaded(&self) -> bool {
        self.raw.is_loaded()
    }

    /// Code of the declared terminal `name`.
    pub fn terminal_code(&self, name: &str) -> Option<i32> {
        self.raw.terminal_code(name)
    }

    /// Each setter stores the (normalized) value and returns the previous one.
    pub fn set_lookahead_level(&mut self, level: i32) -> i32 {
        self.raw.set_lookahead_level(level)
    }

    pub fn set_debug_level(&mut self, level: i32) -> i32 {
        self.raw.set_debug_level(level)
    }

    pub fn set_one_parse_flag(&mut self, flag: bool) -> bool {
        self.raw.set_one_parse_flag(flag as i32) != 0
    }

    pub fn set_cost_flag(&mut self, flag: bool) -> bool {
        self.raw.set_cost_flag(flag as i32) != 0
    }

    pub fn set_error_recovery_flag(&mut self, flag: bool) -> bool {
        self.raw.set_error_recovery_flag(flag as i32) != 0
    }

    pub fn set_recovery_match(&mut self, count: i32) -> i32 {
        self.raw.set_recovery_match(count)
    }

    /// Generic exchange setter: store `value`, return the previous value.
    pub fn configure(&mut self, option: GrammarOption, value: i32) -> i32 {
        let raw = &mut *self.raw;
        match option {
            GrammarOption::LookaheadLevel => raw.set_lookahead_level(value),
            GrammarOption::DebugLevel => raw.set_debug_level(value),
            GrammarOption::OneParse => raw.set_one_parse_flag(value),
            GrammarOption::Cost => raw.set_cost_flag(value),
            GrammarOption::ErrorRecovery => raw.set_error_recovery_flag(value),
            GrammarOption::RecoveryMatch => raw.set_recovery_match(value),
        }
    }

    /// Current value of an option. The engine only offers exchange setters,
    /// so this swaps the value out and back.
    pub fn option(&mut self, option: GrammarOption) -> i32 {
        let current = self.configure(option, 0);
        self.configure(option, current);
        current
    }

    pub(crate) fn status(&self, code: i32) -> Result<(), Error> {
        if code == codes::OK {
            return Ok(());
        }
        Err(Error::Grammar {
            code,
            message: self.raw.error_message().to_string(),
        })
    }
}

impl fmt::Debug for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grammar")
            .field("loaded", &self.is_loaded())
            .field("error_code", &self.error_code())
            .finish()
    }
}
