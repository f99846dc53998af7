use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub type NodeId = u64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<Value>),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

/// The closed set of term kinds understood by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    Number,
    Boolean,
    String,
    Symbol,
    Void,
    Missing,
    Lambda,
    LambdaArg,
    LambdaVar,
    Apply,
    Binop,
    Conditional,
    Not,
    Array,
    Member,
    Reference,
    Define,
}

impl NodeKind {
    pub const ALL: [NodeKind; 17] = [
        NodeKind::Number,
        NodeKind::Boolean,
        NodeKind::String,
        NodeKind::Symbol,
        NodeKind::Void,
        NodeKind::Missing,
        NodeKind::Lambda,
        NodeKind::LambdaArg,
        NodeKind::LambdaVar,
        NodeKind::Apply,
        NodeKind::Binop,
        NodeKind::Conditional,
        NodeKind::Not,
        NodeKind::Array,
        NodeKind::Member,
        NodeKind::Reference,
        NodeKind::Define,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            NodeKind::Number => "number",
            NodeKind::Boolean => "boolean",
            NodeKind::String => "string",
            NodeKind::Symbol => "symbol",
            NodeKind::Void => "void",
            NodeKind::Missing => "missing",
            NodeKind::Lambda => "lambda",
            NodeKind::LambdaArg => "lambdaArg",
            NodeKind::LambdaVar => "lambdaVar",
            NodeKind::Apply => "apply",
            NodeKind::Binop => "binop",
            NodeKind::Conditional => "conditional",
            NodeKind::Not => "not",
            NodeKind::Array => "array",
            NodeKind::Member => "member",
            NodeKind::Reference => "reference",
            NodeKind::Define => "define",
        }
    }

    pub fn from_tag(tag: &str) -> Option<NodeKind> {
        NodeKind::ALL.into_iter().find(|k| k.tag() == tag)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub parent: Option<NodeId>,
    #[serde(default, rename = "parentField")]
    pub parent_field: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
    #[serde(default)]
    pub subexpressions: IndexMap<String, NodeId>,
    #[serde(default)]
    pub locked: bool,
}

impl Node {
    pub fn new(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            kind,
            parent: None,
            parent_field: None,
            fields: BTreeMap::new(),
            subexpressions: IndexMap::new(),
            locked: false,
        }
    }

    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn with_slot(mut self, slot: &str, child: NodeId) -> Self {
        self.subexpressions.insert(slot.to_string(), child);
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn field_int(&self, key: &str) -> Option<i64> {
        self.fields.get(key).and_then(Value::as_int)
    }

    pub fn field_bool(&self, key: &str) -> Option<bool> {
        self.fields.get(key).and_then(Value::as_bool)
    }

    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn slot(&self, name: &str) -> Option<NodeId> {
        self.subexpressions.get(name).copied()
    }

    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.subexpressions.values().copied()
    }

    /// Parameter names of a `reference` node, in slot order.
    pub fn params(&self) -> Vec<&str> {
        self.field("params")
            .and_then(Value::as_list)
            .map(|list| list.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

pub fn param_slot(param: &str) -> String {
    format!("arg_{}", param)
}
