//! Plain-text rendering of terms for logs and the command-line driver.

use crate::error::FatalError;
use crate::node::{Node, NodeId, NodeKind, Value, param_slot};
use crate::node_map::NodeMap;

pub fn render(map: &NodeMap, id: NodeId) -> Result<String, FatalError> {
    let mut out = String::new();
    write_term(&mut out, map, id)?;
    Ok(out)
}

/// Renders each root on its own line, prefixed with its id.
pub fn render_roots(map: &NodeMap, roots: &[NodeId]) -> Result<String, FatalError> {
    let mut out = String::new();
    for root in roots {
        out.push_str(&format!("  #{} ", root));
        write_term(&mut out, map, *root)?;
        out.push('\n');
    }
    Ok(out)
}

fn write_term(out: &mut String, map: &NodeMap, id: NodeId) -> Result<(), FatalError> {
    let node = map.node(id)?;
    match node.kind {
        NodeKind::Number | NodeKind::Boolean => out.push_str(&scalar(node, "value")),
        NodeKind::String => {
            out.push_str(&format!("{:?}", node.field_str("value").unwrap_or_default()));
        }
        NodeKind::Symbol | NodeKind::LambdaArg | NodeKind::LambdaVar => {
            out.push_str(node.field_str("name").unwrap_or("?"));
        }
        NodeKind::Void => out.push_str("()"),
        NodeKind::Missing => out.push('_'),
        NodeKind::Lambda => {
            out.push_str("(λ");
            slot(out, map, node, "arg")?;
            out.push_str(". ");
            slot(out, map, node, "body")?;
            out.push(')');
        }
        NodeKind::Apply => {
            out.push('(');
            slot(out, map, node, "callee")?;
            out.push(' ');
            slot(out, map, node, "argument")?;
            out.push(')');
        }
        NodeKind::Binop => {
            out.push('(');
            slot(out, map, node, "left")?;
            out.push_str(&format!(" {} ", node.field_str("op").unwrap_or("?")));
            slot(out, map, node, "right")?;
            out.push(')');
        }
        NodeKind::Conditional => {
            out.push_str("(if ");
            slot(out, map, node, "condition")?;
            out.push_str(" then ");
            slot(out, map, node, "positive")?;
            out.push_str(" else ");
            slot(out, map, node, "negative")?;
            out.push(')');
        }
        NodeKind::Not => {
            out.push('!');
            slot(out, map, node, "value")?;
        }
        NodeKind::Array => {
            out.push('[');
            for (i, child) in node.children().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_term(out, map, child)?;
            }
            out.push(']');
        }
        NodeKind::Member => {
            slot(out, map, node, "array")?;
            out.push('[');
            slot(out, map, node, "index")?;
            out.push(']');
        }
        NodeKind::Reference => {
            out.push_str(node.field_str("name").unwrap_or("?"));
            let params = node.params();
            if !params.is_empty() {
                out.push('(');
                for (i, param) in params.into_iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    slot(out, map, node, &param_slot(param))?;
                }
                out.push(')');
            }
        }
        NodeKind::Define => {
            out.push_str(&format!("def {} = ", node.field_str("name").unwrap_or("?")));
            slot(out, map, node, "body")?;
        }
    }
    Ok(())
}

fn slot(out: &mut String, map: &NodeMap, node: &Node, name: &str) -> Result<(), FatalError> {
    match node.slot(name) {
        Some(child) => write_term(out, map, child),
        None => {
            out.push('_');
            Ok(())
        }
    }
}

fn scalar(node: &Node, key: &str) -> String {
    match node.field(key) {
        Some(Value::Int(v)) => v.to_string(),
        Some(Value::Bool(v)) => v.to_string(),
        Some(Value::Str(v)) => v.clone(),
        _ => "?".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_nested_terms() -> Result<(), Box<dyn std::error::Error>> {
        let map = NodeMap::new()
            .set(
                Node::new(1, NodeKind::Binop)
                    .with_field("op", "+")
                    .with_slot("left", 2)
                    .with_slot("right", 3),
            )
            .set(Node::new(2, NodeKind::Number).with_field("value", 1i64))
            .set(Node::new(3, NodeKind::Missing));
        assert_eq!(render(&map, 1)?, "(1 + _)");
        Ok(())
    }
}
