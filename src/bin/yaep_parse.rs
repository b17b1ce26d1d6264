//! Parse input text against a grammar description and print the parse forest.
//!
//! Usage:
//!   yaep_parse [OPTIONS] GRAMMAR_FILE [INPUT]
//!
//! Without INPUT, reads the input from stdin. By default every non-whitespace
//! character of the input is one token whose code is the character value.
//!
//! Options:
//!   --dot            Print Graphviz DOT instead of JSON
//!   --ast            Print the typed form as JSON
//!   --all            Build the whole forest (one-parse off) and report ambiguity
//!   --cost           Pick the cheapest parse
//!   --names          INPUT is whitespace-separated terminal names
//!   --lenient        Accept grammars with unreachable or looping nonterminals
//!   --no-recovery    Disable error recovery
//!   --debug N        Engine debug level (2 traces Earley sets; set RUST_LOG too)
//!
//! Logging goes to stderr and follows RUST_LOG.

use anyhow::{bail, Context};
use std::io::{self, Read};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use yaep::{to_ast, to_dot, to_json, to_value, Grammar, ParseOptions, Token};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Output {
    Json,
    Dot,
    Ast,
}

fn take_flag(args: &mut Vec<String>, flag: &str) -> bool {
    match args.iter().position(|a| a == flag) {
        Some(pos) => {
            args.remove(pos);
            true
        }
        None => false,
    }
}

fn take_value(args: &mut Vec<String>, flag: &str) -> anyhow::Result<Option<String>> {
    let Some(pos) = args.iter().position(|a| a == flag) else {
        return Ok(None);
    };
    if pos + 1 >= args.len() {
        bail!("{} needs a value", flag);
    }
    let value = args.remove(pos + 1);
    args.remove(pos);
    Ok(Some(value))
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(true))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();
}

fn tokens(grammar: &Grammar, input: &str, names: bool) -> anyhow::Result<Vec<Token<usize>>> {
    if names {
        return input
            .split_whitespace()
            .enumerate()
            .map(|(i, name)| {
                grammar
                    .terminal_code(name)
                    .map(|code| Token::with_attr(code, i))
                    .with_context(|| format!("unknown terminal `{}`", name))
            })
            .collect();
    }
    Ok(input
        .chars()
        .filter(|c| !c.is_whitespace())
        .enumerate()
        .map(|(i, c)| Token::with_attr(c as i32, i))
        .collect())
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let output = if take_flag(&mut args, "--dot") {
        Output::Dot
    } else if take_flag(&mut args, "--ast") {
        Output::Ast
    } else {
        Output::Json
    };
    let all = take_flag(&mut args, "--all");
    let cost = take_flag(&mut args, "--cost");
    let names = take_flag(&mut args, "--names");
    let lenient = take_flag(&mut args, "--lenient");
    let no_recovery = take_flag(&mut args, "--no-recovery");
    let debug = take_value(&mut args, "--debug")?
        .map(|v| v.parse::<i32>().with_context(|| format!("bad --debug level `{}`", v)))
        .transpose()?;

    let (grammar_path, input) = match args.as_slice() {
        [path] => {
            let mut input = String::new();
            io::stdin().read_to_string(&mut input)?;
            (path.clone(), input)
        }
        [path, input] => (path.clone(), input.clone()),
        _ => bail!("usage: yaep_parse [OPTIONS] GRAMMAR_FILE [INPUT]"),
    };

    let description =
        std::fs::read(&grammar_path).with_context(|| format!("reading {}", grammar_path))?;
    let mut grammar = Grammar::new()?;
    grammar
        .parse_description_bytes(&description, !lenient)
        .with_context(|| format!("loading {}", grammar_path))?;
    grammar.set_one_parse_flag(!all);
    grammar.set_cost_flag(cost);
    grammar.set_error_recovery_flag(!no_recovery);
    if let Some(level) = debug {
        grammar.set_debug_level(level);
    }

    let tokens = tokens(&grammar, &input, names)?;
    let options = ParseOptions::<usize>::new().on_syntax_error(|err, _, _, _| match (err.start_ignored, err.start_recovered) {
        (Some(ignored), Some(recovered)) => eprintln!(
            "syntax error at token {}: ignored tokens {}..{}",
            err.error_token, ignored, recovered
        ),
        _ => eprintln!("syntax error at token {}: not recovered", err.error_token),
    });
    let parsed = grammar.parse_with(tokens.into_iter(), options).into_result()?;
    if all {
        eprintln!("ambiguous: {}", parsed.ambiguous);
    }

    let Some(tree) = parsed.tree else {
        println!("null");
        return Ok(());
    };
    match output {
        Output::Json => match to_value(tree.root()) {
            Some(value) => println!("{}", to_json(&value)?),
            None => println!("null"),
        },
        Output::Dot => {
            if let Some(value) = to_value(tree.root()) {
                print!("{}", to_dot(&value));
            }
        }
        Output::Ast => println!("{}", serde_json::to_string_pretty(&to_ast(tree.root()))?),
    }
    tree.free();
    grammar.free();
    Ok(())
}
