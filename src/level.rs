//! JSON level files.
//!
//! A level lists the root terms of each area. Terms nest through their
//! `subexpressions`; ids written in the file are ignored and every node gets a
//! fresh id from the session allocator when the level is instantiated.

use crate::error::FatalError;
use crate::ids::IdAllocator;
use crate::node::{Node, NodeId, NodeKind, Value};
use crate::node_map::NodeMap;
use crate::semantics::Registry;
use crate::semantics::rules::{adopt, OPERATORS};
use crate::state::{GameState, Mode};
use crate::tree::subtree_ids;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NodeId>,
    #[serde(rename = "type")]
    pub tag: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub subexpressions: IndexMap<String, TermSpec>,
}

impl TermSpec {
    pub fn new(tag: &str) -> Self {
        Self {
            id: None,
            tag: tag.to_string(),
            fields: BTreeMap::new(),
            subexpressions: IndexMap::new(),
        }
    }

    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn slot(mut self, name: &str, term: TermSpec) -> Self {
        self.subexpressions.insert(name.to_string(), term);
        self
    }

    pub fn number(value: i64) -> Self {
        Self::new("number").field("value", value)
    }

    pub fn boolean(value: bool) -> Self {
        Self::new("boolean").field("value", value)
    }

    pub fn string(value: &str) -> Self {
        Self::new("string").field("value", value)
    }

    /// A symbol or one of its shape aliases.
    pub fn symbol(tag: &str) -> Self {
        Self::new(tag)
    }

    pub fn missing() -> Self {
        Self::new("missing")
    }

    pub fn var(name: &str) -> Self {
        Self::new("lambdaVar").field("name", name)
    }

    pub fn arg(name: &str) -> Self {
        Self::new("lambdaArg").field("name", name)
    }

    pub fn lambda(name: &str, body: TermSpec) -> Self {
        Self::new("lambda")
            .slot("arg", Self::arg(name))
            .slot("body", body)
    }

    pub fn apply(callee: TermSpec, argument: TermSpec) -> Self {
        Self::new("apply")
            .slot("callee", callee)
            .slot("argument", argument)
    }

    pub fn binop(op: &str, left: TermSpec, right: TermSpec) -> Self {
        Self::new("binop")
            .field("op", op)
            .slot("left", left)
            .slot("right", right)
    }

    pub fn conditional(condition: TermSpec, positive: TermSpec, negative: TermSpec) -> Self {
        Self::new("conditional")
            .slot("condition", condition)
            .slot("positive", positive)
            .slot("negative", negative)
    }

    pub fn not(value: TermSpec) -> Self {
        Self::new("not").slot("value", value)
    }

    pub fn array(elements: Vec<TermSpec>) -> Self {
        let mut term = Self::new("array").field("length", elements.len() as i64);
        for (i, element) in elements.into_iter().enumerate() {
            term = term.slot(&format!("elem{}", i), element);
        }
        term
    }

    pub fn member(array: TermSpec, index: TermSpec) -> Self {
        Self::new("member").slot("array", array).slot("index", index)
    }

    /// A reference with every parameter left open.
    pub fn reference(name: &str, params: &[&str]) -> Self {
        let params = params.iter().map(|p| Value::from(*p)).collect();
        Self::new("reference")
            .field("name", name)
            .field("params", Value::List(params))
    }

    pub fn define(name: &str, body: TermSpec) -> Self {
        Self::new("define").field("name", name).slot("body", body)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelSpec {
    #[serde(default)]
    pub board: Vec<TermSpec>,
    #[serde(default)]
    pub toolbox: Vec<TermSpec>,
    #[serde(default)]
    pub defs: Vec<TermSpec>,
    #[serde(default)]
    pub goal: Vec<TermSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelSet {
    pub levels: Vec<LevelSpec>,
}

impl LevelSet {
    pub fn new(levels: Vec<LevelSpec>) -> Self {
        Self { levels }
    }

    pub fn from_json(data: &str) -> Result<Self, FatalError> {
        Ok(serde_json::from_str(data)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read level file: {}", path.display()))?;
        let set = Self::from_json(&data)
            .with_context(|| format!("Failed to parse level file: {}", path.display()))?;
        Ok(set)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)
            .with_context(|| format!("Failed to write level file: {}", path.display()))?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Builds the starting state of level `index` with fresh ids.
    pub fn instantiate(
        &self,
        index: usize,
        registry: &Registry,
        ids: &mut IdAllocator,
    ) -> Result<GameState, FatalError> {
        let level = self
            .levels
            .get(index)
            .ok_or(FatalError::UnknownLevel(index))?;

        let mut builder = Builder {
            registry,
            ids,
            map: NodeMap::new(),
        };
        let board = builder.roots(&level.board)?;
        let toolbox = builder.roots(&level.toolbox)?;
        let goal = builder.roots(&level.goal)?;
        let defs = builder.roots(&level.defs)?;

        let mut map = builder.map;
        for def in &defs {
            let node = map.node(*def)?;
            if node.kind != NodeKind::Define {
                return Err(FatalError::MalformedTerm(format!(
                    "definition area holds a {} node",
                    node.kind
                )));
            }
            for id in subtree_ids(&map, *def)? {
                let mut locked = Node::clone(map.node(id)?);
                locked.locked = true;
                map.insert(locked);
            }
        }

        debug!(level = index, nodes = map.len(), "level instantiated");
        Ok(GameState {
            nodes: map,
            board,
            toolbox,
            defs,
            goal,
            level: index,
            mode: Mode::Gameplay,
            added: Vec::new(),
            removed: Vec::new(),
        })
    }
}

struct Builder<'a> {
    registry: &'a Registry,
    ids: &'a mut IdAllocator,
    map: NodeMap,
}

impl Builder<'_> {
    fn roots(&mut self, terms: &[TermSpec]) -> Result<Vec<NodeId>, FatalError> {
        terms.iter().map(|term| self.term(term)).collect()
    }

    fn term(&mut self, term: &TermSpec) -> Result<NodeId, FatalError> {
        let (kind, implied) = self.registry.resolve_tag(&term.tag)?;
        let mut node = Node::new(self.ids.next_id(), kind);
        for (key, value) in implied {
            node.fields.insert(key, value);
        }
        for (key, value) in &term.fields {
            node.fields.insert(key.clone(), value.clone());
        }
        if kind == NodeKind::Reference && !node.fields.contains_key("params") {
            node.fields.insert("params".to_string(), Value::List(Vec::new()));
        }
        self.check_fields(&node)?;

        let slots = self.registry.slot_names(&node)?;
        if let Some(unexpected) = term.subexpressions.keys().find(|k| !slots.contains(*k)) {
            return Err(FatalError::MalformedTerm(format!(
                "{} term has no '{}' slot",
                kind, unexpected
            )));
        }
        for slot in &slots {
            let child = match term.subexpressions.get(slot) {
                Some(sub) => self.term(sub)?,
                None => {
                    let hole = Node::new(self.ids.next_id(), NodeKind::Missing);
                    let id = hole.id;
                    self.map.insert(hole);
                    id
                }
            };
            adopt(&mut self.map, &mut node, slot, child)?;
        }

        let id = node.id;
        self.map.insert(node);
        Ok(id)
    }

    fn check_fields(&self, node: &Node) -> Result<(), FatalError> {
        let descriptor = self.registry.descriptor(node.kind)?;
        if let Some(absent) = descriptor
            .fields
            .iter()
            .find(|f| !node.fields.contains_key(**f))
        {
            return Err(FatalError::MalformedTerm(format!(
                "{} term is missing field '{}'",
                node.kind, absent
            )));
        }
        if let Some(bad) = descriptor.fields.iter().find(|f| {
            node.field(f)
                .is_some_and(|value| !field_has_shape(node.kind, f, value))
        }) {
            return Err(FatalError::MalformedTerm(format!(
                "{} term has a '{}' field of the wrong type",
                node.kind, bad
            )));
        }
        if node.kind == NodeKind::Binop {
            let op = node.field_str("op").unwrap_or_default();
            if !OPERATORS.contains(&op) {
                return Err(FatalError::MalformedTerm(format!("unknown operator '{}'", op)));
            }
        }
        if node.kind == NodeKind::Array && node.field_int("length").is_none_or(|n| n < 0) {
            return Err(FatalError::MalformedTerm(
                "array length must be a non-negative integer".to_string(),
            ));
        }
        Ok(())
    }
}

fn field_has_shape(kind: NodeKind, key: &str, value: &Value) -> bool {
    match (kind, key) {
        (NodeKind::Number, "value") | (_, "length") => value.as_int().is_some(),
        (NodeKind::Boolean, "value") => value.as_bool().is_some(),
        (_, "params") => value
            .as_list()
            .is_some_and(|params| params.iter().all(|p| p.as_str().is_some())),
        _ => value.as_str().is_some(),
    }
}
