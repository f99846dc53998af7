use crate::error::FatalError;
use crate::node::{Node, NodeId, Value};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

/// Persistent id -> node store.
///
/// Cloning a `NodeMap` is a pointer copy. Writes go through `Arc::make_mut`, so a
/// map that is shared with an older snapshot is copied before it is touched and
/// the older snapshot keeps its view. Nodes themselves are `Arc`-shared between
/// versions, which keeps undo history proportional to what actually changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Node>", into = "Vec<Node>")]
pub struct NodeMap {
    nodes: Arc<HashMap<NodeId, Arc<Node>>>,
}

impl NodeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: NodeId) -> Option<&Arc<Node>> {
        self.nodes.get(&id)
    }

    /// Lookup for ids the caller holds by contract. Absence is a defect.
    pub fn node(&self, id: NodeId) -> Result<&Arc<Node>, FatalError> {
        self.nodes.get(&id).ok_or(FatalError::DanglingNode(id))
    }

    pub fn has(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn set(&self, node: Node) -> NodeMap {
        let mut next = self.clone();
        next.insert(node);
        next
    }

    pub fn insert(&mut self, node: Node) {
        Arc::make_mut(&mut self.nodes).insert(node.id, Arc::new(node));
    }

    pub fn insert_shared(&mut self, node: Arc<Node>) {
        Arc::make_mut(&mut self.nodes).insert(node.id, node);
    }

    pub fn remove(&mut self, id: NodeId) -> Option<Arc<Node>> {
        if !self.nodes.contains_key(&id) {
            return None;
        }
        Arc::make_mut(&mut self.nodes).remove(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Node>> {
        self.nodes.values()
    }

    fn write_value_canonical(buf: &mut Vec<u8>, value: &Value) {
        match value {
            Value::Bool(v) => {
                buf.push(0x01);
                buf.push(if *v { 0x01 } else { 0x00 });
            }
            Value::Int(v) => {
                buf.push(0x02);
                buf.extend_from_slice(&v.to_be_bytes());
            }
            Value::Str(v) => {
                buf.push(0x03);
                Self::write_str(buf, v);
            }
            Value::List(items) => {
                buf.push(0x04);
                buf.extend_from_slice(&(items.len() as u64).to_be_bytes());
                for item in items {
                    Self::write_value_canonical(buf, item);
                }
            }
        }
    }

    fn write_str(buf: &mut Vec<u8>, s: &str) {
        buf.extend_from_slice(&(s.len() as u64).to_be_bytes());
        buf.extend_from_slice(s.as_bytes());
    }

    /// SHA-256 over the canonical encoding of every node, ordered by id.
    pub fn fingerprint(&self) -> [u8; 32] {
        let mut bytes = Vec::new();

        for id in self.ids() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            bytes.extend_from_slice(&id.to_be_bytes());
            Self::write_str(&mut bytes, node.kind.tag());
            bytes.extend_from_slice(&node.parent.unwrap_or(0).to_be_bytes());
            Self::write_str(&mut bytes, node.parent_field.as_deref().unwrap_or(""));
            bytes.push(if node.locked { 1 } else { 0 });

            bytes.extend_from_slice(&(node.fields.len() as u64).to_be_bytes());
            for (key, value) in &node.fields {
                Self::write_str(&mut bytes, key);
                Self::write_value_canonical(&mut bytes, value);
            }

            bytes.extend_from_slice(&(node.subexpressions.len() as u64).to_be_bytes());
            for (slot, child) in &node.subexpressions {
                Self::write_str(&mut bytes, slot);
                bytes.extend_from_slice(&child.to_be_bytes());
            }
        }

        let digest = Sha256::digest(bytes);
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        out
    }

    pub fn fingerprint_hex(&self) -> String {
        self.fingerprint()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

impl From<Vec<Node>> for NodeMap {
    fn from(nodes: Vec<Node>) -> Self {
        let map = nodes
            .into_iter()
            .map(|node| (node.id, Arc::new(node)))
            .collect();
        Self {
            nodes: Arc::new(map),
        }
    }
}

impl From<NodeMap> for Vec<Node> {
    fn from(map: NodeMap) -> Self {
        map.ids()
            .into_iter()
            .filter_map(|id| map.get(id).map(|n| Node::clone(n)))
            .collect()
    }
}
