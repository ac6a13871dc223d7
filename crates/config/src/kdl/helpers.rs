//! Small accessors over KDL nodes.
//!
//! Settings are written as child nodes with a single argument, e.g.
//! `listen-port 8089`.

use anyhow::{anyhow, Result};
use kdl::{KdlNode, KdlValue};

/// Find the first child node with the given name
pub fn get_child<'a>(node: &'a KdlNode, name: &str) -> Option<&'a KdlNode> {
    node.children()?
        .nodes()
        .iter()
        .find(|child| child.name().value() == name)
}

/// First positional argument of a node
pub fn get_first_arg(node: &KdlNode) -> Option<&KdlValue> {
    node.entries()
        .iter()
        .find(|entry| entry.name().is_none())
        .map(|entry| entry.value())
}

/// String argument of child node `name`
pub fn get_string_entry(node: &KdlNode, name: &str) -> Result<Option<String>> {
    let Some(value) = get_child(node, name).and_then(get_first_arg) else {
        return Ok(None);
    };
    value
        .as_string()
        .map(|s| Some(s.to_string()))
        .ok_or_else(|| anyhow!("'{}' expects a string value, got {}", name, value))
}

/// String argument of child node `name` that may be switched off with `#null`.
///
/// `None` when the setting is absent, `Some(None)` when it is `#null`.
pub fn get_nullable_string_entry(node: &KdlNode, name: &str) -> Result<Option<Option<String>>> {
    match get_child(node, name).and_then(get_first_arg) {
        Some(KdlValue::Null) => Ok(Some(None)),
        Some(_) => get_string_entry(node, name).map(|value| value.map(Some)),
        None => Ok(None),
    }
}

/// Integer argument of child node `name`
pub fn get_int_entry(node: &KdlNode, name: &str) -> Result<Option<i128>> {
    let Some(value) = get_child(node, name).and_then(get_first_arg) else {
        return Ok(None);
    };
    value
        .as_integer()
        .map(Some)
        .ok_or_else(|| anyhow!("'{}' expects an integer value, got {}", name, value))
}

/// Reject child nodes outside `allowed`
pub fn ensure_known_children(node: &KdlNode, allowed: &[&str]) -> Result<()> {
    let Some(children) = node.children() else {
        return Ok(());
    };
    for child in children.nodes() {
        let name = child.name().value();
        if !allowed.contains(&name) {
            return Err(anyhow!(
                "Unknown setting '{}' in '{}' block. Valid settings: {}",
                name,
                node.name().value(),
                allowed.join(", ")
            ));
        }
    }
    Ok(())
}
