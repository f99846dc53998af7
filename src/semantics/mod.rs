//! Node type contracts.
//!
//! Every [`NodeKind`] has one [`TypeDescriptor`] in the [`Registry`]. A
//! descriptor says which fields and slots a node carries, which slots must be
//! normal before the node itself can reduce, how to check that a reduction is
//! allowed, and how to perform it.

pub mod builtins;
pub mod rules;

use crate::config::EngineConfig;
use crate::error::{EngineError, FatalError, NodeError};
use crate::ids::IdAllocator;
use crate::node::{Node, NodeId, NodeKind, Value};
use crate::node_map::NodeMap;
use crate::state::GameState;
use builtins::Builtin;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Value,
    Expression,
}

/// Coarse type used for compatibility checks between a slot and its contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StaticType {
    Number,
    Boolean,
    String,
    Symbol,
    Lambda,
    Array,
    Void,
    Define,
    Hole,
    Expression,
}

impl StaticType {
    pub fn unifies(self, permitted: &[StaticType]) -> bool {
        permitted.contains(&self)
    }
}

impl fmt::Display for StaticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StaticType::Number => "number",
            StaticType::Boolean => "boolean",
            StaticType::String => "string",
            StaticType::Symbol => "symbol",
            StaticType::Lambda => "lambda",
            StaticType::Array => "array",
            StaticType::Void => "void",
            StaticType::Define => "define",
            StaticType::Hole => "hole",
            StaticType::Expression => "expression",
        };
        f.write_str(name)
    }
}

pub enum TypeRule {
    Fixed(StaticType),
    Dynamic(fn(&NodeMap, &Node) -> StaticType),
}

pub enum Slots {
    Fixed(&'static [&'static str]),
    /// Slot names derived from the node's fields (array length, reference params).
    Derived(fn(&Node) -> Vec<String>),
}

/// Everything a rule may touch besides the state it reads.
pub struct EvalContext<'a> {
    pub ids: &'a mut IdAllocator,
    pub config: &'a EngineConfig,
}

/// Replacement for a reduced node: `map` holds the new subtree rooted at `root`
/// on top of the untouched input map.
#[derive(Debug, Clone)]
pub struct Rewrite {
    pub map: NodeMap,
    pub root: NodeId,
}

/// Builtin effect whose result is produced in the second phase of a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deferred {
    pub builtin: String,
    pub node: NodeId,
    pub args: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub enum StepResult {
    Rewrite(Rewrite),
    Deferred(Deferred),
    NoRule,
}

pub type ValidateFn = fn(&Registry, &GameState, &Node) -> Result<Option<NodeError>, FatalError>;
pub type StepFn =
    fn(&Registry, &mut EvalContext<'_>, &GameState, &Node) -> Result<StepResult, EngineError>;
pub type StrictFn = fn(&NodeMap, &Node) -> Result<Vec<NodeId>, FatalError>;

pub struct TypeDescriptor {
    pub kind: NodeKind,
    pub category: Category,
    pub fields: &'static [&'static str],
    pub subexpressions: Slots,
    pub type_rule: TypeRule,
    pub strict: StrictFn,
    pub validate: ValidateFn,
    pub small_step: StepFn,
}

struct Alias {
    kind: NodeKind,
    fields: Vec<(String, Value)>,
}

/// Read-only table of node semantics, built once per session.
pub struct Registry {
    descriptors: HashMap<NodeKind, TypeDescriptor>,
    aliases: HashMap<String, Alias>,
    builtins: HashMap<&'static str, Builtin>,
}

impl Registry {
    pub fn empty() -> Self {
        Self {
            descriptors: HashMap::new(),
            aliases: HashMap::new(),
            builtins: HashMap::new(),
        }
    }

    pub fn standard() -> Self {
        let mut registry = Self::empty();
        for descriptor in rules::descriptors() {
            registry.register(descriptor);
        }
        for builtin in builtins::standard() {
            registry.register_builtin(builtin);
        }
        for shape in ["star", "rect", "triangle", "circle"] {
            registry.alias(shape, NodeKind::Symbol, vec![("name".to_string(), Value::from(shape))]);
        }
        registry
    }

    pub fn register(&mut self, descriptor: TypeDescriptor) {
        self.descriptors.insert(descriptor.kind, descriptor);
    }

    pub fn register_builtin(&mut self, builtin: Builtin) {
        self.builtins.insert(builtin.name, builtin);
    }

    /// Registers a presentational variant of `kind`. Loading `tag` produces a
    /// `kind` node with `fields` filled in unless the term sets them itself.
    pub fn alias(&mut self, tag: &str, kind: NodeKind, fields: Vec<(String, Value)>) {
        self.aliases.insert(tag.to_string(), Alias { kind, fields });
    }

    pub fn descriptor(&self, kind: NodeKind) -> Result<&TypeDescriptor, FatalError> {
        self.descriptors
            .get(&kind)
            .ok_or_else(|| FatalError::UnregisteredKind(kind.to_string()))
    }

    pub fn builtin(&self, name: &str) -> Option<&Builtin> {
        self.builtins.get(name)
    }

    /// Maps a content tag to its kind and any fields implied by the tag.
    pub fn resolve_tag(&self, tag: &str) -> Result<(NodeKind, Vec<(String, Value)>), FatalError> {
        if let Some(kind) = NodeKind::from_tag(tag) {
            self.descriptor(kind)?;
            return Ok((kind, Vec::new()));
        }
        match self.aliases.get(tag) {
            Some(alias) => {
                self.descriptor(alias.kind)?;
                Ok((alias.kind, alias.fields.clone()))
            }
            None => Err(FatalError::UnknownTag(tag.to_string())),
        }
    }

    pub fn slot_names(&self, node: &Node) -> Result<Vec<String>, FatalError> {
        let descriptor = self.descriptor(node.kind)?;
        Ok(match &descriptor.subexpressions {
            Slots::Fixed(names) => names.iter().map(|s| s.to_string()).collect(),
            Slots::Derived(derive) => derive(node),
        })
    }

    pub fn static_type(&self, map: &NodeMap, id: NodeId) -> Result<StaticType, FatalError> {
        let node = map.node(id)?;
        let descriptor = self.descriptor(node.kind)?;
        Ok(match &descriptor.type_rule {
            TypeRule::Fixed(ty) => *ty,
            TypeRule::Dynamic(rule) => rule(map, node),
        })
    }

    /// A value whose strict slots are all normal. Normal nodes have nothing
    /// left to reduce. A partially applied reference counts as a function
    /// value so it can be passed around before its holes are filled.
    pub fn is_normal(&self, map: &NodeMap, id: NodeId) -> Result<bool, FatalError> {
        let node = map.node(id)?;
        let descriptor = self.descriptor(node.kind)?;
        if descriptor.category == Category::Expression {
            return Ok(self.static_type(map, id)? == StaticType::Lambda);
        }
        for child in (descriptor.strict)(map, node)? {
            if !self.is_normal(map, child)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::standard()
    }
}
