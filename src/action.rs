use crate::error::NodeError;
use crate::evaluator::PendingStep;
use crate::node::NodeId;
use crate::undoable::{Control, HistoryAction};
use serde::{Deserialize, Serialize};

/// Everything a collaborator can ask the engine to do.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    /// Reduce one step inside the board tree containing `target`.
    Execute { target: NodeId },
    /// Pull a subtree out of its parent, leaving a hole behind.
    Detach { node: NodeId },
    MoveNodeToBoard { node: NodeId },
    MoveNodeToDefs { node: NodeId },
    MoveNodeToSlot { node: NodeId, hole: NodeId },
    StartLevel { level: usize },
    Undo,
    Redo,
    ClearError,
    Cleanup,
    DetectCompletion,
    /// Records an error produced outside dispatch.
    RaiseError { error: NodeError },
    /// Second phase of a step begun with `Undoable::begin_step`.
    #[serde(skip)]
    Commit { step: PendingStep },
}

impl HistoryAction for Action {
    fn control(&self) -> Option<Control> {
        match self {
            Action::StartLevel { level } => Some(Control::StartLevel(*level)),
            Action::Undo => Some(Control::Undo),
            Action::Redo => Some(Control::Redo),
            Action::ClearError => Some(Control::ClearError),
            _ => None,
        }
    }

    fn records_history(&self) -> bool {
        !matches!(
            self,
            Action::Cleanup | Action::DetectCompletion | Action::RaiseError { .. }
        )
    }

    fn name(&self) -> &'static str {
        match self {
            Action::Execute { .. } => "execute",
            Action::Detach { .. } => "detach",
            Action::MoveNodeToBoard { .. } => "moveNodeToBoard",
            Action::MoveNodeToDefs { .. } => "moveNodeToDefs",
            Action::MoveNodeToSlot { .. } => "moveNodeToSlot",
            Action::StartLevel { .. } => "startLevel",
            Action::Undo => "undo",
            Action::Redo => "redo",
            Action::ClearError => "clearError",
            Action::Cleanup => "cleanup",
            Action::DetectCompletion => "detectCompletion",
            Action::RaiseError { .. } => "raiseError",
            Action::Commit { .. } => "commit",
        }
    }
}
