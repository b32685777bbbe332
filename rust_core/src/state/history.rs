//! Bounded recent-share window paired with the session best.
//!
//! Both live behind one lock in [`SharedState`](super::SharedState), so an
//! append and the matching session-best update are observed together.

use crate::types::{SessionBest, ShareEvent};
use std::collections::VecDeque;

/// What recording a share changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareOutcome {
    /// Appended to the history only
    Recorded,
    /// Appended and became the new session best
    NewSessionBest,
}

/// Fixed-capacity FIFO of accepted shares plus the running maximum
#[derive(Debug, Clone)]
pub struct ShareHistory {
    events: VecDeque<ShareEvent>,
    capacity: usize,
    session_best: Option<SessionBest>,
}

impl ShareHistory {
    /// A zero capacity is bumped to one so the latest share is always kept
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            session_best: None,
        }
    }

    /// Append, evicting the oldest event when full, and raise the session
    /// best if this share beats it.
    pub fn push(&mut self, event: ShareEvent) -> ShareOutcome {
        let beats_best = self
            .session_best
            .as_ref()
            .map_or(true, |best| event.difficulty > best.difficulty);

        if beats_best {
            self.session_best = Some(SessionBest::from(&event));
        }

        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);

        if beats_best {
            ShareOutcome::NewSessionBest
        } else {
            ShareOutcome::Recorded
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recently appended share
    pub fn latest(&self) -> Option<&ShareEvent> {
        self.events.back()
    }

    pub fn session_best(&self) -> Option<&SessionBest> {
        self.session_best.as_ref()
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &ShareEvent> {
        self.events.iter()
    }

    pub fn to_vec(&self) -> Vec<ShareEvent> {
        self.events.iter().cloned().collect()
    }
}
