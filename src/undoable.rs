//! History-tracking wrapper around an inner reducer.
//!
//! [`transition`] is a pure function from one [`UndoableState`] to the next.
//! [`Undoable`] owns the current state together with the id allocator, which
//! deliberately lives outside the snapshots so that undo never hands out an id
//! twice.

use crate::error::{EngineError, FatalError, NodeError};
use crate::ids::IdAllocator;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};

/// Actions the wrapper interprets itself instead of forwarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    StartLevel(usize),
    Undo,
    Redo,
    ClearError,
}

pub trait HistoryAction {
    fn control(&self) -> Option<Control>;

    /// Whether a state change caused by this action gets an undo entry.
    fn records_history(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str;
}

pub trait Reducer {
    type State;
    type Action: HistoryAction;

    fn initial(&self, level: usize, ids: &mut IdAllocator) -> Result<Arc<Self::State>, FatalError>;

    /// Returns the same `Arc` when the action changes nothing.
    fn reduce(
        &self,
        state: &Arc<Self::State>,
        action: &Self::Action,
        ids: &mut IdAllocator,
    ) -> Result<Arc<Self::State>, EngineError>;
}

#[derive(Debug)]
pub struct UndoableState<S> {
    pub present: Arc<S>,
    /// Most recent first.
    pub past: VecDeque<Arc<S>>,
    /// Most recent first.
    pub future: VecDeque<Arc<S>>,
    pub error: Option<NodeError>,
}

impl<S> Clone for UndoableState<S> {
    fn clone(&self) -> Self {
        Self {
            present: self.present.clone(),
            past: self.past.clone(),
            future: self.future.clone(),
            error: self.error.clone(),
        }
    }
}

impl<S> UndoableState<S> {
    pub fn new(present: Arc<S>) -> Self {
        Self {
            present,
            past: VecDeque::new(),
            future: VecDeque::new(),
            error: None,
        }
    }
}

pub fn transition<R: Reducer>(
    reducer: &R,
    state: &UndoableState<R::State>,
    action: &R::Action,
    ids: &mut IdAllocator,
    history_limit: usize,
) -> Result<UndoableState<R::State>, FatalError> {
    match action.control() {
        Some(Control::StartLevel(level)) => {
            let present = reducer.initial(level, ids)?;
            return Ok(UndoableState::new(present));
        }
        Some(Control::Undo) => {
            let mut next = state.clone();
            next.error = None;
            if let Some(previous) = next.past.pop_front() {
                let current = std::mem::replace(&mut next.present, previous);
                next.future.push_front(current);
            }
            return Ok(next);
        }
        Some(Control::Redo) => {
            let mut next = state.clone();
            next.error = None;
            if let Some(following) = next.future.pop_front() {
                let current = std::mem::replace(&mut next.present, following);
                next.past.push_front(current);
                next.past.truncate(history_limit);
            }
            return Ok(next);
        }
        Some(Control::ClearError) => {
            let mut next = state.clone();
            next.error = None;
            return Ok(next);
        }
        None => {}
    }

    match reducer.reduce(&state.present, action, ids) {
        Err(EngineError::Node(err)) => {
            debug!(action = action.name(), error = %err, "action rejected");
            let mut next = state.clone();
            next.error = Some(err);
            Ok(next)
        }
        Err(EngineError::Fatal(err)) => {
            warn!(action = action.name(), error = %err, "fatal engine error");
            Err(err)
        }
        Ok(present) if Arc::ptr_eq(&present, &state.present) => Ok(state.clone()),
        Ok(present) => {
            let mut next = state.clone();
            if action.records_history() {
                let previous = std::mem::replace(&mut next.present, present);
                next.past.push_front(previous);
                next.past.truncate(history_limit);
                next.future.clear();
            } else {
                next.present = present;
            }
            Ok(next)
        }
    }
}

/// A reducer, its current [`UndoableState`] and the session's id source.
pub struct Undoable<R: Reducer> {
    reducer: R,
    state: UndoableState<R::State>,
    ids: IdAllocator,
    history_limit: usize,
}

impl<R: Reducer> Undoable<R> {
    pub fn start(
        reducer: R,
        level: usize,
        mut ids: IdAllocator,
        history_limit: usize,
    ) -> Result<Self, FatalError> {
        if history_limit == 0 {
            return Err(FatalError::Invariant(
                "history_limit must be at least 1".to_string(),
            ));
        }
        let present = reducer.initial(level, &mut ids)?;
        debug!(level, session = %ids.session(), "session started");
        Ok(Self {
            reducer,
            state: UndoableState::new(present),
            ids,
            history_limit,
        })
    }

    pub fn dispatch(&mut self, action: &R::Action) -> Result<(), FatalError> {
        let next = transition(
            &self.reducer,
            &self.state,
            action,
            &mut self.ids,
            self.history_limit,
        )?;
        debug!(
            action = action.name(),
            past = next.past.len(),
            future = next.future.len(),
            "dispatched"
        );
        self.state = next;
        Ok(())
    }

    pub fn reducer(&self) -> &R {
        &self.reducer
    }

    pub fn state(&self) -> &UndoableState<R::State> {
        &self.state
    }

    pub fn present(&self) -> &Arc<R::State> {
        &self.state.present
    }

    pub fn past(&self) -> &VecDeque<Arc<R::State>> {
        &self.state.past
    }

    pub fn future(&self) -> &VecDeque<Arc<R::State>> {
        &self.state.future
    }

    pub fn error(&self) -> Option<&NodeError> {
        self.state.error.as_ref()
    }

    pub fn can_undo(&self) -> bool {
        !self.state.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.state.future.is_empty()
    }

    pub fn ids(&self) -> &IdAllocator {
        &self.ids
    }

    /// Borrows the reducer and present state alongside the allocator, for work
    /// that runs against the present without dispatching.
    pub(crate) fn parts(&mut self) -> (&R, &Arc<R::State>, &mut IdAllocator) {
        (&self.reducer, &self.state.present, &mut self.ids)
    }
}
