//! Generic map form of a parse forest.
//!
//! Every node becomes a map with a `type` entry:
//!
//! ```text
//! {type: NIL}
//! {type: ERROR}
//! {type: TERM, code: 97, char: "a"}          // char only when printable
//! {type: ANODE, name: "plus", cost: 1, children: [...]}
//! {type: ALT, alts: [...]}
//! ```

use crate::forest::{Node, NodeView};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use unicode_general_category::{get_general_category, GeneralCategory};

/// A materialized forest value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// An absent name, or a node cut off by the cycle guard.
    Null,
    Int(i64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Entry of a map value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map()?.get(key)
    }

    /// The `type` entry of a node map.
    pub fn node_type(&self) -> Option<&str> {
        self.get("type")?.as_str()
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(x: i64) -> Self {
        Value::Int(x)
    }
}

impl Drop for Value {
    // Deep forests give deeply nested values; unnest them on a heap stack.
    fn drop(&mut self) {
        let mut stack = match self {
            Value::List(items) => std::mem::take(items),
            Value::Map(entries) => std::mem::take(entries).into_values().collect(),
            _ => return,
        };
        while let Some(mut value) = stack.pop() {
            match &mut value {
                Value::List(items) => stack.append(items),
                Value::Map(entries) => stack.extend(std::mem::take(entries).into_values()),
                _ => {}
            }
        }
    }
}

/// The character for a terminal code when it is printable: not a control,
/// format, private-use, unassigned or separator code point, space excepted.
pub fn printable_char(code: i32) -> Option<char> {
    use GeneralCategory::*;
    let c = char::from_u32(u32::try_from(code).ok()?)?;
    let hidden = matches!(
        get_general_category(c),
        Control | Format | Surrogate | PrivateUse | Unassigned | LineSeparator | ParagraphSeparator | SpaceSeparator
    );
    (c == ' ' || !hidden).then_some(c)
}

fn node_map<const N: usize>(entries: [(&str, Value); N]) -> Value {
    Value::Map(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
}

enum Step<'t, A> {
    Enter(Node<'t, A>),
    /// Build the node from the last `n` results.
    Exit(Node<'t, A>, usize),
}

/// Convert a forest (from its root) into the generic map form. `None` in,
/// `None` out. Runs on an explicit stack, so deep forests do not exhaust the
/// native stack.
pub fn to_value<A>(root: Option<Node<'_, A>>) -> Option<Value> {
    let root = root?;
    let mut on_path: HashSet<usize> = HashSet::new();
    let mut results: Vec<Value> = Vec::new();
    let mut stack = vec![Step::Enter(root)];

    while let Some(step) = stack.pop() {
        match step {
            Step::Enter(node) => {
                if on_path.contains(&node.id()) {
                    results.push(Value::Null);
                    continue;
                }
                match node.view() {
                    NodeView::Nil => results.push(node_map([("type", "NIL".into())])),
                    NodeView::Error => results.push(node_map([("type", "ERROR".into())])),
                    NodeView::Term { code, .. } => {
                        let mut map = BTreeMap::new();
                        map.insert("type".to_string(), "TERM".into());
                        map.insert("code".to_string(), Value::Int(code as i64));
                        if let Some(c) = printable_char(code) {
                            map.insert("char".to_string(), Value::Str(c.to_string()));
                        }
                        results.push(Value::Map(map));
                    }
                    NodeView::Anode { children, .. } => {
                        on_path.insert(node.id());
                        stack.push(Step::Exit(node, children.len()));
                        stack.extend(children.rev().map(Step::Enter));
                    }
                    NodeView::Alt { .. } => {
                        on_path.insert(node.id());
                        let alts: Vec<Node<'_, A>> = node.alternatives().collect();
                        stack.push(Step::Exit(node, alts.len()));
                        stack.extend(alts.into_iter().rev().map(Step::Enter));
                    }
                }
            }
            Step::Exit(node, n) => {
                on_path.remove(&node.id());
                let items = Value::List(results.split_off(results.len().saturating_sub(n)));
                let value = match node.view() {
                    NodeView::Anode { name, cost, .. } => node_map([
                        ("type", "ANODE".into()),
                        ("name", name.map_or(Value::Null, Value::from)),
                        ("cost", Value::Int(cost as i64)),
                        ("children", items),
                    ]),
                    _ => node_map([("type", "ALT".into()), ("alts", items)]),
                };
                results.push(value);
            }
        }
    }
    results.pop()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printable_chars_only() {
        assert_eq!(printable_char(97), Some('a'));
        assert_eq!(printable_char(32), Some(' '));
        assert_eq!(printable_char(10), None);
        assert_eq!(printable_char(-1), None);
        assert_eq!(printable_char(0x110000), None);
        assert_eq!(printable_char(0x44F), Some('я'));
        assert_eq!(printable_char(0xA0), None);
        assert_eq!(printable_char(0x200B), None);
        assert_eq!(printable_char(0xE000), None);
        assert_eq!(printable_char(0x378), None);
        assert_eq!(printable_char(0x2028), None);
    }

    #[test]
    fn deep_values_drop_without_recursion() {
        let mut value = Value::Null;
        for _ in 0..200_000 {
            value = Value::List(vec![node_map([("type", "ANODE".into()), ("children", value)])]);
        }
        drop(value);
    }

    #[test]
    fn map_accessors() {
        let v = node_map([("type", "TERM".into()), ("code", Value::Int(97))]);
        assert_eq!(v.node_type(), Some("TERM"));
        assert_eq!(v.get("code").and_then(Value::as_i64), Some(97));
        assert!(v.get("char").is_none());
        assert_eq!(serde_json::to_string(&v).unwrap(), r#"{"code":97,"type":"TERM"}"#);
    }
}
