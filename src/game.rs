//! The puzzle reducer: applies one [`Action`] to a [`GameState`].

use crate::action::Action;
use crate::config::EngineConfig;
use crate::error::{EngineError, FatalError, NodeError};
use crate::evaluator::{Evaluator, PendingStep, StepOutcome};
use crate::ids::IdAllocator;
use crate::level::LevelSet;
use crate::node::{Node, NodeId, NodeKind};
use crate::node_map::NodeMap;
use crate::semantics::{Registry, StaticType};
use crate::state::{GameState, Mode};
use crate::tree::{clone_deep, find_deep, root_of, structurally_equal, subtree_ids};
use crate::undoable::{Reducer, Undoable};
use std::sync::Arc;
use tracing::{debug, info};

pub struct Game {
    pub registry: Registry,
    pub config: EngineConfig,
    pub levels: LevelSet,
}

impl Game {
    pub fn new(levels: LevelSet, config: EngineConfig) -> Self {
        Self {
            registry: Registry::standard(),
            config,
            levels,
        }
    }

    pub fn evaluator(&self) -> Evaluator<'_> {
        Evaluator::new(&self.registry, &self.config)
    }

    /// Opens a session on `level` with a fresh allocator seeded from the config.
    pub fn start(self, level: usize) -> Result<Undoable<Game>, FatalError> {
        let ids = IdAllocator::seeded(self.config.id_seed);
        let history_limit = self.config.history_limit;
        Undoable::start(self, level, ids, history_limit)
    }

    fn execute(
        &self,
        state: &Arc<GameState>,
        target: NodeId,
        ids: &mut IdAllocator,
    ) -> Result<Arc<GameState>, EngineError> {
        match self.evaluator().step(state, target, ids)? {
            StepOutcome::Unchanged => Ok(state.clone()),
            StepOutcome::Reduced(next) => Ok(next),
        }
    }

    fn commit(
        &self,
        state: &Arc<GameState>,
        step: &PendingStep,
        ids: &mut IdAllocator,
    ) -> Result<Arc<GameState>, EngineError> {
        if !Arc::ptr_eq(step.base(), state) {
            return Err(FatalError::StaleStep(step.target()).into());
        }
        match self.evaluator().resolve(step.clone(), ids)? {
            StepOutcome::Unchanged => Ok(state.clone()),
            StepOutcome::Reduced(next) => Ok(next),
        }
    }

    fn detach(
        &self,
        state: &Arc<GameState>,
        id: NodeId,
        ids: &mut IdAllocator,
    ) -> Result<Arc<GameState>, EngineError> {
        let node = state.node(id)?;
        if !state.on_board(root_of(&state.nodes, id)?) {
            return Err(NodeError::NotOnBoard { node: id }.into());
        }
        let (Some(parent_id), Some(slot)) = (node.parent, node.parent_field.clone()) else {
            return Ok(state.clone());
        };

        let mut hole = Node::new(ids.next_id(), NodeKind::Missing);
        hole.parent = Some(parent_id);
        hole.parent_field = Some(slot.clone());
        let hole_id = hole.id;

        let mut parent = Node::clone(state.node(parent_id)?);
        parent.subexpressions.insert(slot, hole_id);
        let mut detached = Node::clone(node);
        detached.parent = None;
        detached.parent_field = None;

        let mut next = state.successor();
        next.nodes.insert(hole);
        next.nodes.insert(parent);
        next.nodes.insert(detached);
        next.board.push(id);
        next.added = vec![hole_id];
        Ok(Arc::new(next))
    }

    fn move_to_board(
        &self,
        state: &Arc<GameState>,
        id: NodeId,
    ) -> Result<Arc<GameState>, EngineError> {
        if state.on_board(id) {
            return Ok(state.clone());
        }
        if !state.in_toolbox(id) {
            return Err(NodeError::NotOnBoard { node: id }.into());
        }
        let mut next = state.successor();
        next.toolbox.retain(|root| *root != id);
        next.board.push(id);
        Ok(Arc::new(next))
    }

    fn move_to_defs(
        &self,
        state: &Arc<GameState>,
        id: NodeId,
        ids: &mut IdAllocator,
    ) -> Result<Arc<GameState>, EngineError> {
        if !state.on_board(id) {
            return Err(NodeError::NotOnBoard { node: id }.into());
        }
        let node = state.node(id)?;
        if node.kind != NodeKind::Define {
            let actual = self.registry.static_type(&state.nodes, id)?;
            return Err(NodeError::wrong_type(id, StaticType::Define, actual).into());
        }
        let name = node.field_str("name").map(str::to_string);
        let copy = clone_deep(&state.nodes, id, true, ids)?;

        let mut next = state.successor();
        next.nodes = copy.map;
        drop_subtree(&mut next.nodes, id, &state.nodes)?;
        next.board.retain(|root| *root != id);

        let replaced = name
            .as_deref()
            .and_then(|name| state.definition(name))
            .map(|def| def.id);
        match replaced {
            Some(old) => {
                drop_subtree(&mut next.nodes, old, &state.nodes)?;
                for def in next.defs.iter_mut() {
                    if *def == old {
                        *def = copy.root.id;
                    }
                }
            }
            None => next.defs.push(copy.root.id),
        }
        next.added = subtree_ids(&next.nodes, copy.root.id)?;
        Ok(Arc::new(next))
    }

    fn move_to_slot(
        &self,
        state: &Arc<GameState>,
        id: NodeId,
        hole_id: NodeId,
    ) -> Result<Arc<GameState>, EngineError> {
        if !state.on_board(id) && !state.in_toolbox(id) {
            return Err(NodeError::NotOnBoard { node: id }.into());
        }
        let hole = state.node(hole_id)?;
        let hole_root = root_of(&state.nodes, hole_id)?;
        if !state.on_board(hole_root) {
            return Err(NodeError::NotOnBoard { node: hole_id }.into());
        }
        if hole.kind != NodeKind::Missing {
            let actual = self.registry.static_type(&state.nodes, hole_id)?;
            return Err(NodeError::wrong_type(hole_id, StaticType::Hole, actual).into());
        }
        if hole_root == id {
            return Ok(state.clone());
        }
        let (Some(parent_id), Some(slot)) = (hole.parent, hole.parent_field.clone()) else {
            return Err(FatalError::Invariant(format!(
                "hole {} on the board has no parent slot",
                hole_id
            ))
            .into());
        };

        let mut parent = Node::clone(state.node(parent_id)?);
        parent.subexpressions.insert(slot.clone(), id);
        let mut moved = Node::clone(state.node(id)?);
        moved.parent = Some(parent_id);
        moved.parent_field = Some(slot);

        let mut next = state.successor();
        next.nodes.remove(hole_id);
        next.nodes.insert(parent);
        next.nodes.insert(moved);
        next.board.retain(|root| *root != id);
        next.toolbox.retain(|root| *root != id);
        next.removed = vec![hole_id];
        Ok(Arc::new(next))
    }

    fn cleanup(&self, state: &Arc<GameState>) -> Result<Arc<GameState>, EngineError> {
        let mut voids = Vec::new();
        for root in &state.board {
            if state.node(*root)?.kind == NodeKind::Void {
                voids.push(*root);
            }
        }
        if voids.is_empty() && state.added.is_empty() && state.removed.is_empty() {
            return Ok(state.clone());
        }

        let mut next = state.successor();
        next.board.retain(|root| !voids.contains(root));
        for void in voids {
            drop_subtree(&mut next.nodes, void, &state.nodes)?;
        }
        Ok(Arc::new(next))
    }

    fn detect_completion(&self, state: &Arc<GameState>) -> Result<Arc<GameState>, EngineError> {
        if state.mode != Mode::Gameplay {
            return Ok(state.clone());
        }
        let mode = if self.goal_reached(state)? {
            Mode::Victory
        } else if self.stuck(state)? {
            Mode::Defeat
        } else {
            return Ok(state.clone());
        };
        info!(level = state.level, ?mode, "level finished");
        let mut next = state.successor();
        next.mode = mode;
        Ok(Arc::new(next))
    }

    /// Every goal term is matched by a distinct board root and nothing else is
    /// left on the board.
    fn goal_reached(&self, state: &GameState) -> Result<bool, FatalError> {
        if state.goal.is_empty() || state.goal.len() != state.board.len() {
            return Ok(false);
        }
        let mut unmatched = state.board.clone();
        for goal in &state.goal {
            let mut found = None;
            for (i, root) in unmatched.iter().enumerate() {
                if structurally_equal(&state.nodes, *goal, &state.nodes, *root)? {
                    found = Some(i);
                    break;
                }
            }
            match found {
                Some(i) => {
                    unmatched.swap_remove(i);
                }
                None => return Ok(false),
            }
        }
        Ok(true)
    }

    /// Nothing left to reduce, place or take from the toolbox.
    fn stuck(&self, state: &GameState) -> Result<bool, FatalError> {
        if !state.toolbox.is_empty() {
            return Ok(false);
        }
        for root in &state.board {
            if !self.registry.is_normal(&state.nodes, *root)? {
                return Ok(false);
            }
            let holes = find_deep(
                &state.nodes,
                *root,
                |n| n.kind == NodeKind::Missing,
                |_| true,
            )?;
            if !holes.is_empty() {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Removes the nodes of `base`'s subtree at `id` from `map`.
fn drop_subtree(map: &mut NodeMap, id: NodeId, base: &NodeMap) -> Result<(), FatalError> {
    for node in subtree_ids(base, id)? {
        map.remove(node);
    }
    Ok(())
}

impl Reducer for Game {
    type State = GameState;
    type Action = Action;

    fn initial(&self, level: usize, ids: &mut IdAllocator) -> Result<Arc<GameState>, FatalError> {
        Ok(Arc::new(self.levels.instantiate(level, &self.registry, ids)?))
    }

    fn reduce(
        &self,
        state: &Arc<GameState>,
        action: &Action,
        ids: &mut IdAllocator,
    ) -> Result<Arc<GameState>, EngineError> {
        match action {
            Action::Execute { target } => self.execute(state, *target, ids),
            Action::Commit { step } => self.commit(state, step, ids),
            Action::Detach { node } => self.detach(state, *node, ids),
            Action::MoveNodeToBoard { node } => self.move_to_board(state, *node),
            Action::MoveNodeToDefs { node } => self.move_to_defs(state, *node, ids),
            Action::MoveNodeToSlot { node, hole } => self.move_to_slot(state, *node, *hole),
            Action::Cleanup => self.cleanup(state),
            Action::DetectCompletion => self.detect_completion(state),
            Action::RaiseError { error } => Err(error.clone().into()),
            Action::StartLevel { .. } | Action::Undo | Action::Redo | Action::ClearError => {
                Ok(state.clone())
            }
        }
    }
}

impl Undoable<Game> {
    /// First phase of a step on the present state. A rejected step is recorded
    /// as the current error and yields `None`.
    pub fn begin_step(&mut self, target: NodeId) -> Result<Option<PendingStep>, FatalError> {
        let (game, present, ids) = self.parts();
        let present = present.clone();
        match game.evaluator().begin_step(&present, target, ids) {
            Ok(step) => Ok(Some(step)),
            Err(EngineError::Node(error)) => {
                debug!(target, error = %error, "step rejected before commit");
                self.dispatch(&Action::RaiseError { error })?;
                Ok(None)
            }
            Err(EngineError::Fatal(err)) => Err(err),
        }
    }

    /// Second phase: commits `step` through the normal dispatch path.
    pub fn complete_step(&mut self, step: PendingStep) -> Result<(), FatalError> {
        self.dispatch(&Action::Commit { step })
    }
}
