//! Handoff of one reply from the receiver thread to the waiting caller.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::error::{EndpointError, Result};
use crate::handler::Message;

#[derive(Default)]
struct SlotState {
    pending: bool,
    arrived: bool,
    outcome: Option<Result<Message>>,
    closed: bool,
}

/// Single-entry correlation slot.
///
/// Callers are serialized by the client's send lock, so at most one round
/// trip is in flight and no correlation id is needed on the wire.
#[derive(Default)]
pub(crate) struct CorrelationSlot {
    state: Mutex<SlotState>,
    arrived: Condvar,
}

impl CorrelationSlot {
    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reset the slot before sending a request.
    pub(crate) fn begin(&self) -> Result<()> {
        let mut state = self.lock();
        if state.closed {
            return Err(EndpointError::endpoint_closed());
        }
        state.pending = true;
        state.arrived = false;
        state.outcome = None;
        Ok(())
    }

    /// The request never left; nothing will arrive for it.
    pub(crate) fn abandon(&self) {
        let mut state = self.lock();
        state.pending = false;
        state.outcome = None;
    }

    /// Hand `outcome` to the waiting caller.
    ///
    /// Gives the outcome back when no round trip is pending.
    pub(crate) fn deliver(&self, outcome: Result<Message>) -> Option<Result<Message>> {
        let mut state = self.lock();
        if !state.pending || state.arrived {
            return Some(outcome);
        }
        state.outcome = Some(outcome);
        state.arrived = true;
        self.arrived.notify_all();
        None
    }

    /// Block until the pending round trip completes or the slot closes.
    pub(crate) fn wait(&self) -> Result<Message> {
        let mut state = self.lock();
        while !state.arrived && !state.closed {
            state = self
                .arrived
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.pending = false;
        state.arrived = false;
        state
            .outcome
            .take()
            .unwrap_or_else(|| Err(EndpointError::endpoint_closed()))
    }

    /// Mark the slot closed and wake any waiter.
    pub(crate) fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        self.arrived.notify_all();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.lock().closed
    }
}
