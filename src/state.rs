use crate::error::FatalError;
use crate::node::{Node, NodeId, NodeKind};
use crate::node_map::NodeMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    Title,
    Gameplay,
    Victory,
    Defeat,
}

/// One snapshot of the puzzle: the term forest plus the root sets that
/// partition it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub nodes: NodeMap,
    pub board: Vec<NodeId>,
    pub toolbox: Vec<NodeId>,
    pub defs: Vec<NodeId>,
    pub goal: Vec<NodeId>,
    pub level: usize,
    pub mode: Mode,
    /// Ids introduced by the last step.
    pub added: Vec<NodeId>,
    /// Ids dropped by the last step.
    pub removed: Vec<NodeId>,
}

impl GameState {
    pub fn node(&self, id: NodeId) -> Result<&Arc<Node>, FatalError> {
        self.nodes.node(id)
    }

    pub fn on_board(&self, root: NodeId) -> bool {
        self.board.contains(&root)
    }

    pub fn in_toolbox(&self, root: NodeId) -> bool {
        self.toolbox.contains(&root)
    }

    /// The `define` node in `defs` carrying `name`.
    pub fn definition(&self, name: &str) -> Option<&Arc<Node>> {
        self.defs
            .iter()
            .filter_map(|id| self.nodes.get(*id))
            .find(|n| n.kind == NodeKind::Define && n.field_str("name") == Some(name))
    }

    /// Copy of this state with the diff sets cleared, ready for the next step.
    pub fn successor(&self) -> GameState {
        GameState {
            added: Vec::new(),
            removed: Vec::new(),
            ..self.clone()
        }
    }
}
