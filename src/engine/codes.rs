//! Status codes returned by the engine call surface.
//!
//! Zero means success. Every other value is reported verbatim to callers and
//! mirrored into the handle's `error_code`.

pub const OK: i32 = 0;
pub const NO_MEMORY: i32 = 1;
pub const UNDEFINED_OR_BAD_GRAMMAR: i32 = 2;
pub const DESCRIPTION_SYNTAX_ERROR: i32 = 3;
pub const FIXED_NAME_USAGE: i32 = 4;
pub const REPEATED_TERM_DECL: i32 = 5;
pub const NEGATIVE_TERM_CODE: i32 = 6;
pub const REPEATED_TERM_CODE: i32 = 7;
pub const NO_RULES: i32 = 8;
pub const TERM_IN_RULE_LHS: i32 = 9;
pub const INCORRECT_TRANSLATION: i32 = 10;
pub const NEGATIVE_COST: i32 = 11;
pub const INCORRECT_SYMBOL_NUMBER: i32 = 12;
pub const UNACCESSIBLE_NONTERM: i32 = 14;
pub const NONTERM_DERIVATION: i32 = 15;
pub const LOOP_NONTERM: i32 = 16;
pub const INVALID_TOKEN_CODE: i32 = 17;
pub const SYNTAX_ERROR: i32 = 19;

/// Short symbolic name for a status code, for logs and diagnostics.
pub fn name(code: i32) -> &'static str {
    match code {
        OK => "OK",
        NO_MEMORY => "NO_MEMORY",
        UNDEFINED_OR_BAD_GRAMMAR => "UNDEFINED_OR_BAD_GRAMMAR",
        DESCRIPTION_SYNTAX_ERROR => "DESCRIPTION_SYNTAX_ERROR",
        FIXED_NAME_USAGE => "FIXED_NAME_USAGE",
        REPEATED_TERM_DECL => "REPEATED_TERM_DECL",
        NEGATIVE_TERM_CODE => "NEGATIVE_TERM_CODE",
        REPEATED_TERM_CODE => "REPEATED_TERM_CODE",
        NO_RULES => "NO_RULES",
        TERM_IN_RULE_LHS => "TERM_IN_RULE_LHS",
        INCORRECT_TRANSLATION => "INCORRECT_TRANSLATION",
        NEGATIVE_COST => "NEGATIVE_COST",
        INCORRECT_SYMBOL_NUMBER => "INCORRECT_SYMBOL_NUMBER",
        UNACCESSIBLE_NONTERM => "UNACCESSIBLE_NONTERM",
        NONTERM_DERIVATION => "NONTERM_DERIVATION",
        LOOP_NONTERM => "LOOP_NONTERM",
        INVALID_TOKEN_CODE => "INVALID_TOKEN_CODE",
        SYNTAX_ERROR => "SYNTAX_ERROR",
        _ => "UNKNOWN",
    }
}
