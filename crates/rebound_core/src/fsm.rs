//! State Machine Runtime
//!
//! Flat state machines over user-defined state and event types.
//! Supports:
//! - Transition tables built up front
//! - Entry actions
//! - Bounded transition history (for diagnostics and tests)
//!
//! Events that have no matching transition from the current state are
//! ignored and leave the machine where it is.

use std::fmt::Debug;
use std::hash::Hash;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// An action executed when a state is entered
pub type Action = Box<dyn FnMut() + Send>;

/// Default number of transitions kept in the history ring
const DEFAULT_HISTORY_LIMIT: usize = 64;

/// A transition in the state machine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition<S, E> {
    pub from: S,
    pub event: E,
    pub to: S,
}

impl<S, E> Transition<S, E> {
    pub fn new(from: S, event: E, to: S) -> Self {
        Self { from, event, to }
    }
}

/// Builder for creating state machines
pub struct StateMachineBuilder<S, E> {
    initial_state: S,
    transitions: Vec<Transition<S, E>>,
    entry_callbacks: FxHashMap<S, SmallVec<[Action; 1]>>,
    history_limit: usize,
}

impl<S, E> StateMachineBuilder<S, E>
where
    S: Copy + Eq + Hash + Debug,
    E: Copy + Eq + Debug,
{
    pub fn new(initial_state: S) -> Self {
        Self {
            initial_state,
            transitions: Vec::new(),
            entry_callbacks: FxHashMap::default(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Add a transition (from, event, to)
    pub fn on(mut self, from: S, event: E, to: S) -> Self {
        self.transitions.push(Transition::new(from, event, to));
        self
    }

    /// Add the same event transition from several source states
    pub fn on_any(mut self, from: &[S], event: E, to: S) -> Self {
        for state in from {
            self.transitions.push(Transition::new(*state, event, to));
        }
        self
    }

    /// Add an entry action for a state
    pub fn on_enter<F: FnMut() + Send + 'static>(mut self, state: S, action: F) -> Self {
        self.entry_callbacks
            .entry(state)
            .or_default()
            .push(Box::new(action));
        self
    }

    /// Limit how many transitions are remembered (0 disables history)
    pub fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Build the state machine
    pub fn build(self) -> StateMachine<S, E> {
        StateMachine {
            current_state: self.initial_state,
            transitions: self.transitions,
            entry_callbacks: self.entry_callbacks,
            history: Vec::new(),
            history_limit: self.history_limit,
        }
    }
}

/// A state machine instance
pub struct StateMachine<S, E> {
    current_state: S,
    transitions: Vec<Transition<S, E>>,
    entry_callbacks: FxHashMap<S, SmallVec<[Action; 1]>>,
    history: Vec<(S, E, S)>,
    history_limit: usize,
}

impl<S, E> StateMachine<S, E>
where
    S: Copy + Eq + Hash + Debug,
    E: Copy + Eq + Debug,
{
    /// Create a builder for a state machine
    pub fn builder(initial_state: S) -> StateMachineBuilder<S, E> {
        StateMachineBuilder::new(initial_state)
    }

    /// Get the current state
    pub fn current_state(&self) -> S {
        self.current_state
    }

    /// Check if we're in a specific state
    pub fn is_in(&self, state: S) -> bool {
        self.current_state == state
    }

    /// Get transition history, oldest first
    pub fn history(&self) -> &[(S, E, S)] {
        &self.history
    }

    /// Clear transition history
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Check if an event can trigger a transition from current state
    pub fn can_send(&self, event: E) -> bool {
        self.find(event).is_some()
    }

    /// Send an event, returning the state the machine ends up in
    pub fn send(&mut self, event: E) -> S {
        let current = self.current_state;

        let Some(to_state) = self.find(event) else {
            tracing::trace!(state = ?current, ?event, "event ignored");
            return current;
        };

        self.current_state = to_state;
        tracing::trace!(from = ?current, ?event, to = ?to_state, "transition");

        if self.history_limit > 0 {
            if self.history.len() == self.history_limit {
                self.history.remove(0);
            }
            self.history.push((current, event, to_state));
        }

        if let Some(callbacks) = self.entry_callbacks.get_mut(&to_state) {
            for callback in callbacks.iter_mut() {
                callback();
            }
        }

        to_state
    }

    /// Send the first of `events` that has a transition from the current
    /// state. Returns the event taken and the new state, or `None` if none
    /// applies.
    pub fn send_first(&mut self, events: &[E]) -> Option<(E, S)> {
        let event = events.iter().copied().find(|&event| self.can_send(event))?;
        Some((event, self.send(event)))
    }

    fn find(&self, event: E) -> Option<S> {
        let current = self.current_state;
        self.transitions
            .iter()
            .find(|t| t.from == current && t.event == event)
            .map(|t| t.to)
    }
}
