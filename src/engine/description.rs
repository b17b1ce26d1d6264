//! Read a textual grammar description into terminal and rule declarations
//! using PEST.

use super::codes;
use super::compile::{CompileError, RuleDecl, TermDecl};
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser as PestParser;

#[derive(PestParser)]
#[grammar = "engine/description.pest"]
struct DescriptionParser;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OwnedTerm {
    pub name: String,
    pub code: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OwnedRule {
    pub lhs: String,
    pub rhs: Vec<String>,
    pub anode: Option<String>,
    pub cost: i32,
    pub transl: Option<Vec<i32>>,
}

/// Declarations read from one description, in declaration order.
#[derive(Debug, Default)]
pub(crate) struct Description {
    pub terms: Vec<OwnedTerm>,
    pub rules: Vec<OwnedRule>,
}

impl Description {
    /// Borrow the owned declarations in the shape the compiler consumes.
    pub fn with_decls<R>(&self, f: impl FnOnce(&[TermDecl<'_>], &[RuleDecl<'_>]) -> R) -> R {
        let terms: Vec<TermDecl<'_>> = self
            .terms
            .iter()
            .map(|t| TermDecl { name: &t.name, code: t.code })
            .collect();
        let rhs: Vec<Vec<&str>> = self
            .rules
            .iter()
            .map(|r| r.rhs.iter().map(String::as_str).collect())
            .collect();
        let rules: Vec<RuleDecl<'_>> = self
            .rules
            .iter()
            .zip(rhs.iter())
            .map(|(r, rhs)| RuleDecl {
                lhs: &r.lhs,
                rhs,
                anode: r.anode.as_deref(),
                cost: r.cost,
                transl: r.transl.as_deref(),
            })
            .collect();
        f(&terms, &rules)
    }
}

fn syntax_error(message: impl Into<String>) -> CompileError {
    CompileError {
        code: codes::DESCRIPTION_SYNTAX_ERROR,
        message: message.into(),
    }
}

/// Read a description. Bytes that are not valid UTF-8 are decoded lossily and
/// left to the description syntax to accept or reject.
pub(crate) fn read(bytes: &[u8]) -> Result<Description, CompileError> {
    let source = String::from_utf8_lossy(bytes);
    let mut pairs = DescriptionParser::parse(Rule::description, &source)
        .map_err(|e| syntax_error(format!("description syntax error: {}", e)))?;
    let root = pairs.next().ok_or_else(|| syntax_error("empty description"))?;

    let mut desc = Description::default();
    let mut literals: Vec<OwnedTerm> = Vec::new();
    for item in root.into_inner() {
        match item.as_rule() {
            Rule::term_section => {
                for term in item.into_inner().filter(|p| p.as_rule() == Rule::term_item) {
                    desc.terms.push(build_term(term)?);
                }
            }
            Rule::rule => build_rule(item, &mut desc.rules, &mut literals)?,
            _ => {}
        }
    }
    desc.terms.extend(literals);
    Ok(desc)
}

fn build_term(pair: Pair<'_, Rule>) -> Result<OwnedTerm, CompileError> {
    let mut inner = pair.into_inner();
    let name = inner
        .next()
        .ok_or_else(|| syntax_error("term declaration without a name"))?
        .as_str()
        .to_string();
    let code = inner.next().map(|n| parse_number(n.as_str())).transpose()?;
    Ok(OwnedTerm { name, code })
}

fn build_rule(
    pair: Pair<'_, Rule>,
    rules: &mut Vec<OwnedRule>,
    literals: &mut Vec<OwnedTerm>,
) -> Result<(), CompileError> {
    let mut inner = pair.into_inner();
    let lhs = inner
        .next()
        .ok_or_else(|| syntax_error("rule without a left hand side"))?
        .as_str()
        .to_string();
    for alt in inner.filter(|p| p.as_rule() == Rule::alt) {
        let mut rule = OwnedRule {
            lhs: lhs.clone(),
            rhs: Vec::new(),
            anode: None,
            cost: 1,
            transl: None,
        };
        for part in alt.into_inner() {
            match part.as_rule() {
                Rule::ident => rule.rhs.push(part.as_str().to_string()),
                Rule::char_lit => {
                    let text = part.as_str();
                    let code = char_code(text)?;
                    if !literals.iter().any(|t| t.name == text) {
                        literals.push(OwnedTerm { name: text.to_string(), code: Some(code) });
                    }
                    rule.rhs.push(text.to_string());
                }
                Rule::translation => apply_translation(part, &mut rule)?,
                _ => {}
            }
        }
        rules.push(rule);
    }
    Ok(())
}

fn apply_translation(pair: Pair<'_, Rule>, rule: &mut OwnedRule) -> Result<(), CompileError> {
    let Some(kind) = pair.into_inner().next() else {
        rule.transl = Some(Vec::new());
        return Ok(());
    };
    match kind.as_rule() {
        Rule::nil_transl => rule.transl = Some(Vec::new()),
        Rule::index_transl => rule.transl = Some(vec![parse_number(kind.as_str())?]),
        Rule::anode_transl => {
            let mut children = Vec::new();
            for part in kind.into_inner() {
                match part.as_rule() {
                    Rule::ident => rule.anode = Some(part.as_str().to_string()),
                    Rule::cost => rule.cost = parse_number(part.as_str())?,
                    Rule::number => children.push(parse_number(part.as_str())?),
                    Rule::nil_child => children.push(-1),
                    _ => {}
                }
            }
            rule.transl = Some(children);
        }
        _ => {}
    }
    Ok(())
}

fn parse_number(s: &str) -> Result<i32, CompileError> {
    s.parse()
        .map_err(|_| syntax_error(format!("number `{}` is out of range", s)))
}

/// Code of a quoted character literal such as `'a'`, `'\n'` or `'\101'`.
fn char_code(lit: &str) -> Result<i32, CompileError> {
    let body = lit
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .ok_or_else(|| syntax_error(format!("malformed character literal {}", lit)))?;
    let Some(escaped) = body.strip_prefix('\\') else {
        let mut chars = body.chars();
        return match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c as i32),
            _ => Err(syntax_error(format!("malformed character literal {}", lit))),
        };
    };
    let code = match escaped {
        "n" => '\n' as i32,
        "t" => '\t' as i32,
        "r" => '\r' as i32,
        "a" => 0x07,
        "b" => 0x08,
        "f" => 0x0c,
        "v" => 0x0b,
        "\\" => '\\' as i32,
        "'" => '\'' as i32,
        "\"" => '"' as i32,
        _ if escaped.starts_with('x') => i32::from_str_radix(&escaped[1..], 16)
            .map_err(|_| syntax_error(format!("bad hex escape in {}", lit)))?,
        _ if (1..=3).contains(&escaped.len()) && escaped.bytes().all(|b| (b'0'..=b'7').contains(&b)) => {
            i32::from_str_radix(escaped, 8)
                .map_err(|_| syntax_error(format!("bad octal escape in {}", lit)))?
        }
        _ => return Err(syntax_error(format!("unknown escape in {}", lit))),
    };
    Ok(code)
}
