//! Structural operations over a [`NodeMap`].
//!
//! All walks are depth-first and post-order. Ids passed in are expected to be
//! present; a missing id is a [`FatalError`], not a game error.

use crate::error::FatalError;
use crate::ids::IdAllocator;
use crate::node::{Node, NodeId};
use crate::node_map::NodeMap;
use std::sync::Arc;

/// Result of [`clone_deep`].
#[derive(Debug, Clone)]
pub struct Cloned {
    pub root: Arc<Node>,
    /// Every cloned node below the root, post-order.
    pub descendants: Vec<Arc<Node>>,
    /// Source map plus the clones.
    pub map: NodeMap,
}

/// Copies the subtree at `id` under fresh ids. The copy is detached: its root
/// has no parent. Every cloned node gets `locked`.
pub fn clone_deep(
    map: &NodeMap,
    id: NodeId,
    locked: bool,
    ids: &mut IdAllocator,
) -> Result<Cloned, FatalError> {
    let mut out = map.clone();
    let mut descendants = Vec::new();
    let root_id = clone_node(map, &mut out, id, None, locked, ids, &mut descendants)?;
    // clone_node pushes the root last.
    descendants.pop();

    let root = out.node(root_id)?.clone();
    Ok(Cloned {
        root,
        descendants,
        map: out,
    })
}

fn clone_node(
    source: &NodeMap,
    out: &mut NodeMap,
    id: NodeId,
    parent: Option<(NodeId, &str)>,
    locked: bool,
    ids: &mut IdAllocator,
    visited: &mut Vec<Arc<Node>>,
) -> Result<NodeId, FatalError> {
    let node = source.node(id)?;
    let new_id = ids.next_id();

    let mut copy = Node::clone(node);
    copy.id = new_id;
    copy.parent = parent.map(|(p, _)| p);
    copy.parent_field = parent.map(|(_, slot)| slot.to_string());
    copy.locked = locked;

    for (slot, child) in node.subexpressions.iter() {
        let child_id = clone_node(source, out, *child, Some((new_id, slot.as_str())), locked, ids, visited)?;
        copy.subexpressions.insert(slot.clone(), child_id);
    }

    let copy = Arc::new(copy);
    out.insert_shared(copy.clone());
    visited.push(copy);
    Ok(new_id)
}

/// Applies `mapper` to every node of the subtree at `id`, children first.
///
/// Nodes rejected by `filter` are left as they are, together with everything
/// below them. After a parent is mapped, each of its children is re-pointed at
/// the parent's final id and slot. The root keeps whatever parent the mapper
/// gives it. Returns the updated map and the id of the mapped root.
pub fn map_deep<M, F>(
    map: &NodeMap,
    id: NodeId,
    mut mapper: M,
    filter: F,
) -> Result<(NodeMap, NodeId), FatalError>
where
    M: FnMut(&mut NodeMap, Node) -> Result<Node, FatalError>,
    F: Fn(&Node) -> bool,
{
    let mut out = map.clone();
    let root = map_node(&mut out, id, &mut mapper, &filter)?;
    Ok((out, root))
}

fn map_node<M, F>(map: &mut NodeMap, id: NodeId, mapper: &mut M, filter: &F) -> Result<NodeId, FatalError>
where
    M: FnMut(&mut NodeMap, Node) -> Result<Node, FatalError>,
    F: Fn(&Node) -> bool,
{
    let node = map.node(id)?.clone();
    if !filter(&node) {
        return Ok(id);
    }

    let mut owned = Node::clone(&node);
    for (slot, child) in node.subexpressions.iter() {
        let mapped_child = map_node(map, *child, mapper, filter)?;
        owned.subexpressions.insert(slot.clone(), mapped_child);
    }

    let mapped = mapper(map, owned)?;
    for (slot, child) in mapped.subexpressions.iter() {
        reparent(map, *child, mapped.id, slot)?;
    }

    let mapped_id = mapped.id;
    map.insert(mapped);
    Ok(mapped_id)
}

/// Points `child` at `parent`/`slot`, writing only when something changes.
pub fn reparent(map: &mut NodeMap, child: NodeId, parent: NodeId, slot: &str) -> Result<(), FatalError> {
    let current = map.node(child)?;
    if current.parent == Some(parent) && current.parent_field.as_deref() == Some(slot) {
        return Ok(());
    }
    let mut updated = Node::clone(current);
    updated.parent = Some(parent);
    updated.parent_field = Some(slot.to_string());
    map.insert(updated);
    Ok(())
}

/// Every node of the subtree at `id` that satisfies `predicate`, deepest first.
pub fn find_deep<P, F>(
    map: &NodeMap,
    id: NodeId,
    predicate: P,
    filter: F,
) -> Result<Vec<Arc<Node>>, FatalError>
where
    P: Fn(&Node) -> bool,
    F: Fn(&Node) -> bool,
{
    let mut found = Vec::new();
    find_node(map, id, &predicate, &filter, &mut found)?;
    Ok(found)
}

fn find_node<P, F>(
    map: &NodeMap,
    id: NodeId,
    predicate: &P,
    filter: &F,
    found: &mut Vec<Arc<Node>>,
) -> Result<(), FatalError>
where
    P: Fn(&Node) -> bool,
    F: Fn(&Node) -> bool,
{
    let node = map.node(id)?;
    if !filter(node) {
        return Ok(());
    }
    for child in node.children() {
        find_node(map, child, predicate, filter, found)?;
    }
    if predicate(node) {
        found.push(node.clone());
    }
    Ok(())
}

/// All ids of the subtree at `id`, post-order.
pub fn subtree_ids(map: &NodeMap, id: NodeId) -> Result<Vec<NodeId>, FatalError> {
    Ok(find_deep(map, id, |_| true, |_| true)?
        .iter()
        .map(|n| n.id)
        .collect())
}

/// Walks parent links up to the root of the tree containing `id`.
pub fn root_of(map: &NodeMap, id: NodeId) -> Result<NodeId, FatalError> {
    let mut current = map.node(id)?;
    let mut steps = 0usize;
    while let Some(parent) = current.parent {
        current = map.node(parent)?;
        steps += 1;
        if steps > map.len() {
            return Err(FatalError::Invariant(format!(
                "parent chain from node {} does not terminate",
                id
            )));
        }
    }
    Ok(current.id)
}

/// Same kinds, fields and slot layout, recursively. Ids, parents and locks are
/// ignored.
pub fn structurally_equal(
    left_map: &NodeMap,
    left: NodeId,
    right_map: &NodeMap,
    right: NodeId,
) -> Result<bool, FatalError> {
    let a = left_map.node(left)?;
    let b = right_map.node(right)?;

    if a.kind != b.kind || a.fields != b.fields {
        return Ok(false);
    }
    if a.subexpressions.len() != b.subexpressions.len() {
        return Ok(false);
    }
    for ((slot_a, child_a), (slot_b, child_b)) in a.subexpressions.iter().zip(b.subexpressions.iter()) {
        if slot_a != slot_b {
            return Ok(false);
        }
        if !structurally_equal(left_map, *child_a, right_map, *child_b)? {
            return Ok(false);
        }
    }
    Ok(true)
}
