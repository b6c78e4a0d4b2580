//! Lifecycle state shared by every stream object.
//!
//! A stream object is in exactly one of four states: open and healthy, open
//! with a latched failure, closed cleanly, or closed with a latched failure.
//! Transitions are one-way except for explicit recovery (the chunk decoder's
//! per-record recovery is the only user). Once failed, all data-moving
//! operations short-circuit and return the latched status.

use crate::status::Status;

#[derive(Debug, Clone)]
pub enum ObjectState {
    Open,
    OpenFailed(Status),
    Closed,
    ClosedFailed(Status),
}

impl ObjectState {
    pub fn new() -> Self {
        ObjectState::Open
    }

    /// True while no failure is latched.
    pub fn healthy(&self) -> bool {
        matches!(self, ObjectState::Open | ObjectState::Closed)
    }

    /// True until the object is closed, failed or not.
    pub fn is_open(&self) -> bool {
        matches!(self, ObjectState::Open | ObjectState::OpenFailed(_))
    }

    pub fn status(&self) -> Option<&Status> {
        match self {
            ObjectState::OpenFailed(status) | ObjectState::ClosedFailed(status) => Some(status),
            _ => None,
        }
    }

    /// Latch `status`. The first failure wins; later failures are dropped.
    /// Always returns `false` so call sites can `return self.state.fail(..)`.
    pub fn fail(&mut self, status: Status) -> bool {
        match self {
            ObjectState::Open => *self = ObjectState::OpenFailed(status),
            ObjectState::Closed => *self = ObjectState::ClosedFailed(status),
            ObjectState::OpenFailed(_) | ObjectState::ClosedFailed(_) => {}
        }
        false
    }

    /// Guard for data-moving operations: true only while open and healthy.
    /// Latches *failed-precondition* when called on a cleanly closed object;
    /// an already latched failure short-circuits unchanged.
    pub fn check_open(&mut self) -> bool {
        match self {
            ObjectState::Open => true,
            ObjectState::Closed => self.fail(Status::failed_precondition("Object closed")),
            ObjectState::OpenFailed(_) | ObjectState::ClosedFailed(_) => false,
        }
    }

    /// Transition open states to their closed counterparts. Idempotent.
    pub fn mark_closed(&mut self) {
        match std::mem::replace(self, ObjectState::Closed) {
            ObjectState::OpenFailed(status) | ObjectState::ClosedFailed(status) => {
                *self = ObjectState::ClosedFailed(status);
            }
            ObjectState::Open | ObjectState::Closed => {}
        }
    }

    /// Drop a latched failure on a still-open object, returning it.
    /// Used only where a component defines explicit recovery.
    pub fn recover(&mut self) -> Option<Status> {
        match std::mem::replace(self, ObjectState::Open) {
            ObjectState::OpenFailed(status) => Some(status),
            other => {
                *self = other;
                None
            }
        }
    }
}

impl Default for ObjectState {
    fn default() -> Self {
        ObjectState::new()
    }
}
