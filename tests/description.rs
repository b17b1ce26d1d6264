//! Grammar loading: description syntax, declaration checks and the status
//! codes each failure reports.

use yaep::{codes, Grammar, RuleSpec, TerminalSpec};

fn load(description: &str, strict: bool) -> Result<Grammar, (i32, String)> {
    let mut g = Grammar::new().expect("grammar handle");
    match g.parse_description(description, strict) {
        Ok(()) => Ok(g),
        Err(e) => {
            assert_eq!(g.error_code(), e.code());
            assert!(!g.is_loaded());
            Err((e.code(), g.error_message().unwrap_or_default().to_string()))
        }
    }
}

fn code_of(description: &str) -> i32 {
    load(description, true).map(|_| codes::OK).unwrap_or_else(|(code, _)| code)
}

#[test]
fn test_description_syntax_error() {
    let (code, message) = load("TERM a b;\nS : a @ b;\n", true).unwrap_err();
    assert_eq!(code, codes::DESCRIPTION_SYNTAX_ERROR);
    assert!(message.contains("syntax error"), "{}", message);
}

#[test]
fn test_declaration_errors() {
    assert_eq!(code_of("TERM error;\nS : ;\n"), codes::FIXED_NAME_USAGE);
    assert_eq!(code_of("TERM a a;\nS : a;\n"), codes::REPEATED_TERM_DECL);
    assert_eq!(code_of("TERM a = 5 b = 5;\nS : a b;\n"), codes::REPEATED_TERM_CODE);
    assert_eq!(code_of("TERM a;\n"), codes::NO_RULES);
    assert_eq!(code_of("TERM a;\na : a;\n"), codes::TERM_IN_RULE_LHS);
    assert_eq!(code_of("TERM a;\nS : a # 1;\n"), codes::INCORRECT_TRANSLATION);
    assert_eq!(code_of("TERM a;\nS : a # node (0 2);\n"), codes::INCORRECT_TRANSLATION);
    assert_eq!(code_of("TERM a;\nS : a B;\n"), codes::NONTERM_DERIVATION);
}

#[test]
fn test_unreachable_nonterm_is_strict_only() {
    let description = "TERM a;\nS : a;\nU : a;\n";
    let (code, message) = load(description, true).unwrap_err();
    assert_eq!(code, codes::UNACCESSIBLE_NONTERM);
    assert!(message.contains('U'), "{}", message);
    assert!(load(description, false).expect("lenient").is_loaded());
}

#[test]
fn test_loop_is_strict_only() {
    let description = "TERM a;\nS : a | L;\nL : S;\n";
    assert_eq!(code_of(description), codes::LOOP_NONTERM);
    let mut g = load(description, false).expect("lenient");
    let parsed = g.parse([256]).into_result().expect("parse");
    assert!(parsed.tree.is_none());
}

#[test]
fn test_programmatic_declaration_errors() {
    let mut g = Grammar::new().unwrap();
    let rules = [RuleSpec::new("S", ["a"])];

    let err = g.read_grammar(&[TerminalSpec::with_code("a", -3)], &rules, true).unwrap_err();
    assert_eq!(err.code(), codes::NEGATIVE_TERM_CODE);

    let costly = [RuleSpec::new("S", ["a"]).anode("node", -1).translation(vec![0])];
    let err = g.read_grammar(&[TerminalSpec::new("a")], &costly, true).unwrap_err();
    assert_eq!(err.code(), codes::NEGATIVE_COST);

    let err = g.read_grammar(&[TerminalSpec::new("")], &rules, true).unwrap_err();
    assert_eq!(err.code(), codes::INCORRECT_SYMBOL_NUMBER);
    assert!(!g.is_loaded());
}

#[test]
fn test_auto_code_after_the_largest_code() {
    let mut g = Grammar::new().unwrap();
    let rules = [RuleSpec::new("S", ["a", "b"])];
    let terminals = [TerminalSpec::with_code("a", i32::MAX), TerminalSpec::new("b")];
    let err = g.read_grammar(&terminals, &rules, true).unwrap_err();
    assert_eq!(err.code(), codes::REPEATED_TERM_CODE);
    assert!(!g.is_loaded());

    let terminals = [TerminalSpec::with_code("a", i32::MAX - 1), TerminalSpec::new("b")];
    g.read_grammar(&terminals, &rules, true).expect("one code left");
    assert_eq!(g.terminal_code("b"), Some(i32::MAX));
    assert_eq!(g.parse([i32::MAX - 1, i32::MAX]).status, codes::OK);
}

#[test]
fn test_terminal_codes() {
    let g = load("TERM a b = 300 c;\nS : a b c 'x';\n", true).expect("grammar");
    assert_eq!(g.terminal_code("b"), Some(300));
    assert_eq!(g.terminal_code("a"), Some(301));
    assert_eq!(g.terminal_code("c"), Some(302));
    assert_eq!(g.terminal_code("'x'"), Some('x' as i32));
    assert_eq!(g.terminal_code("S"), None);
    assert_eq!(g.terminal_code("error"), None);
    assert_eq!(g.terminal_code("missing"), None);
}

#[test]
fn test_auto_codes_start_at_256() {
    let g = load("TERM a b;\nS : a b;\n", true).expect("grammar");
    assert_eq!(g.terminal_code("a"), Some(256));
    assert_eq!(g.terminal_code("b"), Some(257));
}

#[test]
fn test_invalid_utf8_in_comment_is_accepted() {
    let mut bytes = b"TERM a; /* ".to_vec();
    bytes.extend_from_slice(&[0xff, 0xfe, 0x80]);
    bytes.extend_from_slice(b" */\nS : a # 0;\n");
    let mut g = Grammar::new().unwrap();
    g.parse_description_bytes(&bytes, true).expect("loads");
    assert_eq!(g.terminal_code("a"), Some(256));
}

#[test]
fn test_unicode_names() {
    let mut g = load("TERM число;\nвыражение : число # узел (0);\n", true).expect("grammar");
    let tree = g.parse([256]).tree.expect("tree");
    assert_eq!(tree.root().and_then(|n| n.anode_name()), Some("узел"));
}

#[test]
fn test_error_is_usable_in_rules() {
    let mut g = load("TERM;\nS : 'a' | error;\n", true).expect("grammar");
    assert_eq!(g.parse([97]).status, codes::OK);
}
