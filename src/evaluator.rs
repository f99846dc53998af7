//! Single-step evaluation.
//!
//! A step runs in two phases. [`Evaluator::begin_step`] locates the redex,
//! validates it and asks its rule for a rewrite; builtins with deferred effects
//! hand back a [`Deferred`] instead. [`Evaluator::resolve`] finishes the
//! effect, diffs the old subtree against the new one and splices the result
//! into a successor state. Nothing is visible to other consumers until
//! `resolve` returns.

use crate::config::EngineConfig;
use crate::error::{EngineError, FatalError, NodeError};
use crate::ids::IdAllocator;
use crate::node::{Node, NodeId};
use crate::node_map::NodeMap;
use crate::semantics::{Category, Deferred, EvalContext, Registry, Rewrite, StepResult};
use crate::state::GameState;
use crate::tree::{root_of, subtree_ids};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Debug, Clone)]
enum Work {
    Ready { redex: NodeId, rewrite: Rewrite },
    Deferred { redex: NodeId, effect: Deferred },
    Nothing,
}

/// A step that has been validated but not yet committed.
#[derive(Debug, Clone)]
pub struct PendingStep {
    base: Arc<GameState>,
    target: NodeId,
    work: Work,
}

impl PendingStep {
    pub fn base(&self) -> &Arc<GameState> {
        &self.base
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    /// The node the step rewrites. `None` when there is nothing to reduce.
    pub fn redex(&self) -> Option<NodeId> {
        match &self.work {
            Work::Ready { redex, .. } | Work::Deferred { redex, .. } => Some(*redex),
            Work::Nothing => None,
        }
    }

    /// True when the result still has to be produced by `resolve`.
    pub fn is_deferred(&self) -> bool {
        matches!(self.work, Work::Deferred { .. })
    }
}

#[derive(Debug, Clone)]
pub enum StepOutcome {
    Unchanged,
    Reduced(Arc<GameState>),
}

pub struct Evaluator<'a> {
    registry: &'a Registry,
    config: &'a EngineConfig,
}

impl<'a> Evaluator<'a> {
    pub fn new(registry: &'a Registry, config: &'a EngineConfig) -> Self {
        Self { registry, config }
    }

    /// Validates and prepares one reduction inside the tree containing `target`.
    pub fn begin_step(
        &self,
        state: &Arc<GameState>,
        target: NodeId,
        ids: &mut IdAllocator,
    ) -> Result<PendingStep, EngineError> {
        let node = state.node(target)?;
        let root = root_of(&state.nodes, target)?;
        if !state.on_board(root) {
            return Err(NodeError::NotOnBoard { node: target }.into());
        }

        let pending = |work| PendingStep {
            base: state.clone(),
            target,
            work,
        };

        if node.locked {
            return Ok(pending(Work::Nothing));
        }
        let Some(redex) = self.find_redex(&state.nodes, target)? else {
            trace!(target, "nothing to reduce");
            return Ok(pending(Work::Nothing));
        };

        let redex_node = state.node(redex)?.clone();
        let descriptor = self.registry.descriptor(redex_node.kind)?;
        if let Some(err) = (descriptor.validate)(self.registry, state, &redex_node)? {
            debug!(target, redex, error = %err, "validation failed");
            return Err(err.into());
        }

        let mut ctx = EvalContext {
            ids,
            config: self.config,
        };
        let work = match (descriptor.small_step)(self.registry, &mut ctx, state, &redex_node)? {
            StepResult::Rewrite(rewrite) => Work::Ready { redex, rewrite },
            StepResult::Deferred(effect) => Work::Deferred { redex, effect },
            StepResult::NoRule => Work::Nothing,
        };
        Ok(pending(work))
    }

    /// Completes a step and builds the successor state.
    pub fn resolve(
        &self,
        pending: PendingStep,
        ids: &mut IdAllocator,
    ) -> Result<StepOutcome, EngineError> {
        let PendingStep { base, work, .. } = pending;
        let (redex, rewrite) = match work {
            Work::Nothing => return Ok(StepOutcome::Unchanged),
            Work::Ready { redex, rewrite } => (redex, rewrite),
            Work::Deferred { redex, effect } => {
                let builtin = self
                    .registry
                    .builtin(&effect.builtin)
                    .ok_or_else(|| FatalError::UnregisteredKind(effect.builtin.clone()))?;
                let resolve = builtin.resolve.ok_or_else(|| {
                    FatalError::Invariant(format!("builtin '{}' cannot defer", builtin.name))
                })?;
                let mut ctx = EvalContext {
                    ids,
                    config: self.config,
                };
                (redex, resolve(self.registry, &mut ctx, &base, &effect)?)
            }
        };

        let next = splice(&base, redex, rewrite)?;
        debug!(
            redex,
            added = next.added.len(),
            removed = next.removed.len(),
            "step resolved"
        );
        Ok(StepOutcome::Reduced(Arc::new(next)))
    }

    /// Both phases back to back.
    pub fn step(
        &self,
        state: &Arc<GameState>,
        target: NodeId,
        ids: &mut IdAllocator,
    ) -> Result<StepOutcome, EngineError> {
        let pending = self.begin_step(state, target, ids)?;
        self.resolve(pending, ids)
    }

    /// The node a step on `id` would rewrite: descend through strict slots that
    /// are not yet normal until reaching an expression whose strict slots are.
    pub fn find_redex(&self, map: &NodeMap, id: NodeId) -> Result<Option<NodeId>, FatalError> {
        let node = map.node(id)?;
        if node.locked {
            return Ok(None);
        }
        let descriptor = self.registry.descriptor(node.kind)?;
        for child in (descriptor.strict)(map, node)? {
            if !self.registry.is_normal(map, child)? {
                return self.find_redex(map, child);
            }
        }
        Ok(match descriptor.category {
            Category::Expression => Some(id),
            Category::Value => None,
        })
    }
}

/// Replaces the subtree at `redex` in `base` with the one at `rewrite.root`.
fn splice(base: &GameState, redex: NodeId, rewrite: Rewrite) -> Result<GameState, FatalError> {
    let old_ids = subtree_ids(&base.nodes, redex)?;
    let new_ids = subtree_ids(&rewrite.map, rewrite.root)?;
    let kept: HashSet<NodeId> = new_ids.iter().copied().collect();

    let removed: Vec<NodeId> = old_ids
        .iter()
        .copied()
        .filter(|id| !kept.contains(id))
        .collect();
    let added: Vec<NodeId> = new_ids
        .iter()
        .copied()
        .filter(|id| !base.nodes.has(*id))
        .collect();

    let mut nodes = rewrite.map;
    for id in nodes.ids() {
        if !base.nodes.has(id) && !kept.contains(&id) {
            nodes.remove(id);
        }
    }
    for id in &removed {
        nodes.remove(*id);
    }

    let redex_node = base.node(redex)?;
    let mut root = Node::clone(nodes.node(rewrite.root)?);
    root.parent = redex_node.parent;
    root.parent_field = redex_node.parent_field.clone();
    let root_id = root.id;
    nodes.insert(root);

    let mut next = base.successor();
    match (redex_node.parent, redex_node.parent_field.as_ref()) {
        (Some(parent_id), Some(slot)) => {
            let mut parent = Node::clone(nodes.node(parent_id)?);
            parent.subexpressions.insert(slot.clone(), root_id);
            nodes.insert(parent);
        }
        (Some(parent_id), None) => {
            return Err(FatalError::Invariant(format!(
                "node {} has parent {} but no parent field",
                redex, parent_id
            )));
        }
        (None, _) => {
            for entry in next.board.iter_mut() {
                if *entry == redex {
                    *entry = root_id;
                }
            }
        }
    }

    next.nodes = nodes;
    next.added = added;
    next.removed = removed;
    Ok(next)
}
