//! # yaep: Earley grammar engine bindings
//!
//! Build a grammar from a textual description or from terminal and rule
//! declarations, parse token streams against it, and inspect the resulting
//! (possibly ambiguous) parse forest through owned, safe handles.
//!
//! ## Grammar descriptions
//!
//! ```text
//! TERM NUMBER = 300;
//! E : T                 # 0
//!   | E '+' T           # plus (0 2)
//!   ;
//! T : NUMBER            # 0
//!   ;
//! ```
//!
//! `'c'` literals declare terminals whose code is the character value. `#`
//! introduces a translation: bare `#` or `# -` is nil, `# n` passes the
//! translation of RHS symbol `n` through, and `# name cost (i j -)` builds an
//! abstract node (`-` is a nil child). The reserved terminal `error` enables
//! error recovery.
//!
//! ## Usage
//!
//! ```no_run
//! use yaep::{to_value, Grammar};
//!
//! let mut grammar = Grammar::new()?;
//! grammar.parse_description("TERM;\nE : 'a' # 0 ;", true)?;
//! let parsed = grammar.parse("a".bytes().map(i32::from)).into_result()?;
//! let tree = parsed.tree.expect("non-nil translation");
//! println!("{:?}", to_value(tree.root()));
//! tree.free();
//! # Ok::<(), yaep::Error>(())
//! ```

pub mod ast;
pub mod bridge;
pub mod dump;
pub mod engine;
pub mod error;
pub mod forest;
pub mod grammar;
pub mod parse;
pub mod value;

pub use ast::{to_ast, Ast};
pub use bridge::{Keepalive, RuleSpec, TerminalSpec};
pub use dump::{to_dot, to_json};
pub use engine::codes;
pub use error::Error;
pub use forest::{Node, NodeKind, NodeView, ParseTree};
pub use grammar::{Grammar, GrammarOption};
pub use parse::{ParseAllocator, ParseOptions, ParseOutcome, Parsed, SyntaxError, Token, TokenSource};
pub use value::{to_value, Value};
