use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::dao::backend::error::InitErrorKind;

/// Why the application ended up on the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FallbackReason {
    /// Every allowed attempt failed.
    Exhausted {
        attempts: u32,
        #[schema(value_type = String)]
        last_error: InitErrorKind,
    },
    /// A failure that retrying cannot fix.
    NonRetryable {
        #[schema(value_type = String)]
        error: InitErrorKind,
    },
    /// The user asked for offline mode.
    Manual,
}

/// Where backend initialization stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum InitPhase {
    /// Nothing has been attempted yet.
    NotStarted,
    /// Attempt number `attempt` (1-based) is in flight.
    Initializing { attempt: u32 },
    /// Attempt `attempt` failed; waiting out the backoff before the next one.
    Retrying {
        attempt: u32,
        #[schema(value_type = String)]
        last_error: InitErrorKind,
    },
    /// The remote store is installed.
    Ready,
    /// The local store is installed.
    FallbackActive { reason: FallbackReason },
}

impl InitPhase {
    /// Whether a backend is installed and data operations may run.
    pub fn is_initialized(&self) -> bool {
        matches!(self, InitPhase::Ready | InitPhase::FallbackActive { .. })
    }
}

/// Events that can be applied to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitEvent {
    /// First start of the application.
    Start,
    /// The in-flight attempt succeeded.
    AttemptSucceeded,
    /// The in-flight attempt failed.
    AttemptFailed { kind: InitErrorKind, retryable: bool },
    /// The backoff delay after a failure is over.
    BackoffElapsed,
    /// The user asked to stop waiting and go offline.
    SwitchToOffline,
    /// The user asked to try the remote store again from scratch.
    Retry,
}

/// Error returned when an event does not apply to the current phase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    pub from: InitPhase,
    pub event: InitEvent,
}

/// Snapshot of the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct Snapshot {
    #[serde(flatten)]
    pub phase: InitPhase,
    /// Increments every time a fresh run of attempts begins.
    pub run: u64,
    pub max_attempts: u32,
}

/// Pure initialization/retry/fallback state machine.
///
/// It performs no I/O: the supervisor reports outcomes as [`InitEvent`]s and acts on the
/// resulting phase.
#[derive(Debug, Clone)]
pub struct InitStateMachine {
    phase: InitPhase,
    run: u64,
    max_attempts: u32,
}

impl InitStateMachine {
    /// `max_attempts` is clamped to at least one.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            phase: InitPhase::NotStarted,
            run: 0,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn phase(&self) -> InitPhase {
        self.phase
    }

    /// Identifier of the current run of attempts.
    pub fn run(&self) -> u64 {
        self.run
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            run: self.run,
            max_attempts: self.max_attempts,
        }
    }

    /// Apply `event`, returning the new phase. Invalid events leave the machine untouched.
    pub fn apply(&mut self, event: InitEvent) -> Result<InitPhase, InvalidTransition> {
        let next = self.compute_transition(event)?;
        if matches!(event, InitEvent::Start | InitEvent::Retry) {
            self.run += 1;
        }
        self.phase = next;
        Ok(next)
    }

    fn compute_transition(&self, event: InitEvent) -> Result<InitPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (InitPhase::NotStarted, InitEvent::Start) => InitPhase::Initializing { attempt: 1 },
            (InitPhase::Initializing { .. }, InitEvent::AttemptSucceeded) => InitPhase::Ready,
            (
                InitPhase::Initializing { attempt },
                InitEvent::AttemptFailed { kind, retryable },
            ) => {
                if !retryable {
                    InitPhase::FallbackActive {
                        reason: FallbackReason::NonRetryable { error: kind },
                    }
                } else if attempt < self.max_attempts {
                    InitPhase::Retrying {
                        attempt,
                        last_error: kind,
                    }
                } else {
                    InitPhase::FallbackActive {
                        reason: FallbackReason::Exhausted {
                            attempts: attempt,
                            last_error: kind,
                        },
                    }
                }
            }
            (InitPhase::Retrying { attempt, .. }, InitEvent::BackoffElapsed) => {
                InitPhase::Initializing {
                    attempt: attempt + 1,
                }
            }
            (
                InitPhase::Initializing { .. } | InitPhase::Retrying { .. },
                InitEvent::SwitchToOffline,
            ) => InitPhase::FallbackActive {
                reason: FallbackReason::Manual,
            },
            (
                InitPhase::Retrying { .. } | InitPhase::FallbackActive { .. },
                InitEvent::Retry,
            ) => InitPhase::Initializing { attempt: 1 },
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}
