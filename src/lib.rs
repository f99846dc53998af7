pub mod action;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod game;
pub mod ids;
pub mod level;
pub mod node;
pub mod node_map;
pub mod render;
pub mod semantics;
pub mod state;
pub mod tree;
pub mod undoable;

pub use action::Action;
pub use config::EngineConfig;
pub use error::{EngineError, FatalError, NodeError};
pub use evaluator::{Evaluator, PendingStep, StepOutcome};
pub use game::Game;
pub use ids::IdAllocator;
pub use level::{LevelSet, LevelSpec, TermSpec};
pub use node::{Node, NodeId, NodeKind, Value};
pub use node_map::NodeMap;
pub use semantics::Registry;
pub use state::{GameState, Mode};
pub use undoable::{Undoable, UndoableState};
