//! Admission server lifecycle.
//!
//! The server moves through `Idle -> Listening -> Draining -> Stopped` with an
//! explicit transition table. `Stopped` is terminal. Requests are only served
//! while `Listening`; once draining starts the listener accepts nothing new and
//! in-flight requests are allowed to finish.

use std::fmt;
use std::net::SocketAddr;

/// Server phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ServerPhase {
    /// Configured but not yet bound
    #[default]
    Idle,
    /// Bound and serving requests
    Listening,
    /// Shutdown requested, finishing in-flight requests
    Draining,
    /// Terminal
    Stopped,
}

impl fmt::Display for ServerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerPhase::Idle => write!(f, "Idle"),
            ServerPhase::Listening => write!(f, "Listening"),
            ServerPhase::Draining => write!(f, "Draining"),
            ServerPhase::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Events that move the server between phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerEvent {
    /// Listener bound its address
    Bound,
    /// Listener could not be bound
    BindFailed,
    /// Shutdown was requested
    ShutdownRequested,
    /// The accept loop failed while serving
    ListenerFailed,
    /// All in-flight requests finished, or the drain timed out
    Drained,
}

impl fmt::Display for ServerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerEvent::Bound => write!(f, "Bound"),
            ServerEvent::BindFailed => write!(f, "BindFailed"),
            ServerEvent::ShutdownRequested => write!(f, "ShutdownRequested"),
            ServerEvent::ListenerFailed => write!(f, "ListenerFailed"),
            ServerEvent::Drained => write!(f, "Drained"),
        }
    }
}

/// Snapshot published to subscribers of a running server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ServerStatus {
    pub phase: ServerPhase,
    /// Bound address, set once `Listening`
    pub local_addr: Option<SocketAddr>,
}

#[derive(Debug)]
struct Transition {
    from: ServerPhase,
    to: ServerPhase,
    event: ServerEvent,
    description: &'static str,
}

impl Transition {
    const fn new(
        from: ServerPhase,
        to: ServerPhase,
        event: ServerEvent,
        description: &'static str,
    ) -> Self {
        Self {
            from,
            to,
            event,
            description,
        }
    }
}

/// Result of attempting a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    Success {
        from: ServerPhase,
        to: ServerPhase,
        description: &'static str,
    },
    InvalidTransition {
        current: ServerPhase,
        event: ServerEvent,
    },
}

impl TransitionResult {
    /// Phase after the attempt; unchanged when the transition was invalid
    pub fn phase(&self) -> ServerPhase {
        match self {
            TransitionResult::Success { to, .. } => *to,
            TransitionResult::InvalidTransition { current, .. } => *current,
        }
    }
}

/// Transition table for [`ServerPhase`]
pub struct ServerStateMachine {
    transitions: Vec<Transition>,
}

impl Default for ServerStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerStateMachine {
    pub fn new() -> Self {
        Self {
            transitions: vec![
                Transition::new(
                    ServerPhase::Idle,
                    ServerPhase::Listening,
                    ServerEvent::Bound,
                    "Listener bound, serving requests",
                ),
                Transition::new(
                    ServerPhase::Idle,
                    ServerPhase::Stopped,
                    ServerEvent::BindFailed,
                    "Listener could not be bound",
                ),
                Transition::new(
                    ServerPhase::Idle,
                    ServerPhase::Stopped,
                    ServerEvent::ShutdownRequested,
                    "Shutdown requested before listening",
                ),
                Transition::new(
                    ServerPhase::Listening,
                    ServerPhase::Draining,
                    ServerEvent::ShutdownRequested,
                    "Shutdown requested, draining in-flight requests",
                ),
                Transition::new(
                    ServerPhase::Listening,
                    ServerPhase::Stopped,
                    ServerEvent::ListenerFailed,
                    "Listener failed while serving",
                ),
                Transition::new(
                    ServerPhase::Draining,
                    ServerPhase::Stopped,
                    ServerEvent::Drained,
                    "Drain finished",
                ),
                Transition::new(
                    ServerPhase::Draining,
                    ServerPhase::Stopped,
                    ServerEvent::ListenerFailed,
                    "Listener failed while draining",
                ),
            ],
        }
    }

    pub fn transition(&self, current: ServerPhase, event: ServerEvent) -> TransitionResult {
        match self
            .transitions
            .iter()
            .find(|t| t.from == current && t.event == event)
        {
            Some(t) => TransitionResult::Success {
                from: t.from,
                to: t.to,
                description: t.description,
            },
            None => TransitionResult::InvalidTransition { current, event },
        }
    }

    pub fn can_transition(&self, current: ServerPhase, event: ServerEvent) -> bool {
        self.transitions
            .iter()
            .any(|t| t.from == current && t.event == event)
    }

    /// Events accepted in `current`
    pub fn valid_events(&self, current: ServerPhase) -> Vec<ServerEvent> {
        self.transitions
            .iter()
            .filter(|t| t.from == current)
            .map(|t| t.event)
            .collect()
    }
}
