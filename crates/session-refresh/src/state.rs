//! Coordinator state machine
//!
//! Pure state machine: receives events, returns (new_state, action).
//! The actor loop in `coordinator.rs` executes the I/O implied by each action.
//! Generic over the waiter `W` and renewal outcome `O` so transitions can be
//! tested without channels or a runtime.

use std::collections::VecDeque;

/// Renewal state. There is no persistent "failed" state: every cycle ends in `Idle`.
#[derive(Debug)]
pub enum CoordinatorState<W> {
    Idle,
    /// A renewal exchange is in flight; `waiters` are served by it in arrival order.
    Refreshing { waiters: VecDeque<W> },
}

impl<W> CoordinatorState<W> {
    pub fn is_refreshing(&self) -> bool {
        matches!(self, CoordinatorState::Refreshing { .. })
    }
}

/// Events that drive state transitions.
#[derive(Debug)]
pub enum CoordinatorEvent<W, O> {
    /// A caller needs a fresh token
    Acquire(W),
    /// The in-flight renewal finished
    Settled(O),
}

/// Actions the actor should execute after a state transition
#[derive(Debug)]
pub enum CoordinatorAction<W, O> {
    /// Start the one renewal exchange for this cycle
    StartRenewal,
    /// Caller joined an in-flight renewal; `queued` is the queue length including it
    Enqueued { queued: usize },
    /// Deliver `outcome` to every waiter, front to back
    Resolve { waiters: VecDeque<W>, outcome: O },
    /// No-op
    None,
}

/// Advance the state machine by one event.
///
/// - Idle + Acquire → Refreshing (queue = [caller]), StartRenewal
/// - Refreshing + Acquire → Refreshing (caller appended), Enqueued
/// - Refreshing + Settled → Idle, Resolve (whole queue drained at once)
/// - Idle + Settled → Idle, None (no renewal to settle)
pub fn handle_event<W, O>(
    state: CoordinatorState<W>,
    event: CoordinatorEvent<W, O>,
) -> (CoordinatorState<W>, CoordinatorAction<W, O>) {
    match (state, event) {
        (CoordinatorState::Idle, CoordinatorEvent::Acquire(waiter)) => (
            CoordinatorState::Refreshing {
                waiters: VecDeque::from([waiter]),
            },
            CoordinatorAction::StartRenewal,
        ),
        (CoordinatorState::Refreshing { mut waiters }, CoordinatorEvent::Acquire(waiter)) => {
            waiters.push_back(waiter);
            let queued = waiters.len();
            (
                CoordinatorState::Refreshing { waiters },
                CoordinatorAction::Enqueued { queued },
            )
        }
        (CoordinatorState::Refreshing { waiters }, CoordinatorEvent::Settled(outcome)) => (
            CoordinatorState::Idle,
            CoordinatorAction::Resolve { waiters, outcome },
        ),
        (CoordinatorState::Idle, CoordinatorEvent::Settled(_)) => {
            (CoordinatorState::Idle, CoordinatorAction::None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type State = CoordinatorState<u32>;
    type Event = CoordinatorEvent<u32, &'static str>;

    #[test]
    fn first_acquire_starts_renewal() {
        let (state, action) = handle_event(State::Idle, Event::Acquire(1));
        assert!(state.is_refreshing());
        assert!(matches!(action, CoordinatorAction::StartRenewal));
    }

    #[test]
    fn acquires_during_renewal_only_enqueue() {
        let (mut state, _) = handle_event(State::Idle, Event::Acquire(1));
        for id in 2..=5 {
            let (next, action) = handle_event(state, Event::Acquire(id));
            state = next;
            match action {
                CoordinatorAction::Enqueued { queued } => assert_eq!(queued, id as usize),
                other => panic!("expected Enqueued, got {other:?}"),
            }
        }
        assert!(state.is_refreshing());
    }

    #[test]
    fn settle_drains_queue_in_arrival_order_and_returns_to_idle() {
        let mut state = State::Idle;
        for id in [10, 20, 30] {
            state = handle_event(state, Event::Acquire(id)).0;
        }

        let (state, action) = handle_event(state, Event::Settled("at_new"));
        assert!(matches!(state, CoordinatorState::Idle));
        match action {
            CoordinatorAction::Resolve { waiters, outcome } => {
                assert_eq!(Vec::from(waiters), vec![10, 20, 30]);
                assert_eq!(outcome, "at_new");
            }
            other => panic!("expected Resolve, got {other:?}"),
        }
    }

    #[test]
    fn acquire_after_settle_starts_a_new_cycle() {
        let (state, _) = handle_event(State::Idle, Event::Acquire(1));
        let (state, _) = handle_event(state, Event::Settled("failed"));
        let (state, action) = handle_event(state, Event::Acquire(2));
        assert!(state.is_refreshing());
        assert!(matches!(action, CoordinatorAction::StartRenewal));
    }

    #[test]
    fn stray_settle_while_idle_is_ignored() {
        let (state, action) = handle_event(State::Idle, Event::Settled("late"));
        assert!(!state.is_refreshing());
        assert!(matches!(action, CoordinatorAction::None));
    }
}
