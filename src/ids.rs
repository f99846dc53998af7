use crate::node::NodeId;
use uuid::Uuid;

/// Monotonic source of node ids for one session.
///
/// Lives outside every snapshot so that undo never hands out an id twice.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    session: Uuid,
    next: NodeId,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::seeded(1)
    }

    pub fn seeded(first: NodeId) -> Self {
        Self {
            session: Uuid::new_v4(),
            next: first.max(1),
        }
    }

    pub fn next_id(&mut self) -> NodeId {
        let id = self.next;
        self.next += 1;
        id
    }

    /// The id the next call to `next_id` will return.
    pub fn peek(&self) -> NodeId {
        self.next
    }

    pub fn session(&self) -> Uuid {
        self.session
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
