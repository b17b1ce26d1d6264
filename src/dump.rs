//! Render materialized forests for display: Graphviz DOT and JSON.

use crate::value::{printable_char, Value};
use std::fmt::Write;

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

fn label(node: &Value) -> String {
    let kind = node.node_type().unwrap_or("UNKNOWN");
    match kind {
        "TERM" => {
            let code = node.get("code").and_then(Value::as_i64).unwrap_or(-1);
            match i32::try_from(code).ok().and_then(printable_char) {
                Some(c) => format!("TERM\\n{} (code={})", escape(&format!("{:?}", c)), code),
                None => format!("TERM\\ncode={}", code),
            }
        }
        "ANODE" => match node.get("name").and_then(Value::as_str) {
            Some(name) => format!("ANODE\\n{}", escape(name)),
            None => "ANODE".to_string(),
        },
        other => escape(other),
    }
}

/// Graphviz source for a value produced by [`crate::to_value`]. Nodes cut by
/// the cycle guard (`null` entries) are left out.
pub fn to_dot(root: &Value) -> String {
    let mut out = String::from("digraph parse_tree {\n");
    let mut next_id = 0usize;
    let mut stack: Vec<(&Value, Option<usize>)> = vec![(root, None)];
    while let Some((node, parent)) = stack.pop() {
        if node.is_null() {
            continue;
        }
        let id = next_id;
        next_id += 1;
        let _ = writeln!(out, "  n{} [label=\"{}\"];", id, label(node));
        if let Some(parent) = parent {
            let _ = writeln!(out, "  n{} -> n{};", parent, id);
        }
        let kids = node
            .get("children")
            .or_else(|| node.get("alts"))
            .and_then(Value::as_list)
            .unwrap_or(&[]);
        stack.extend(kids.iter().rev().map(|k| (k, Some(id))));
    }
    out.push_str("}\n");
    out
}

/// Pretty-printed JSON for a materialized value.
pub fn to_json(root: &Value) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn map(entries: Vec<(&str, Value)>) -> Value {
        Value::Map(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect::<BTreeMap<_, _>>())
    }

    #[test]
    fn dot_labels_and_edges() {
        let tree = map(vec![
            ("type", "ANODE".into()),
            ("name", "plus".into()),
            ("cost", Value::Int(1)),
            (
                "children",
                Value::List(vec![
                    map(vec![("type", "TERM".into()), ("code", Value::Int(97)), ("char", "a".into())]),
                    Value::Null,
                    map(vec![("type", "TERM".into()), ("code", Value::Int(10))]),
                ]),
            ),
        ]);
        let dot = to_dot(&tree);
        assert!(dot.starts_with("digraph parse_tree {\n"));
        assert!(dot.contains("n0 [label=\"ANODE\\nplus\"];"));
        assert!(dot.contains("n1 [label=\"TERM\\n'a' (code=97)\"];"));
        assert!(dot.contains("n2 [label=\"TERM\\ncode=10\"];"));
        assert!(dot.contains("n0 -> n1;"));
        assert!(dot.contains("n0 -> n2;"));
        assert!(dot.trim_end().ends_with('}'));
    }

    #[test]
    fn json_is_pretty() {
        let v = map(vec![("type", "NIL".into())]);
        assert_eq!(to_json(&v).unwrap(), "{\n  \"type\": \"NIL\"\n}");
    }
}
