use std::fmt;

use log::{debug, warn};

/// Work stages of a backup run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Archiving,
    Staging,
    Uploading,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Archiving => "archiving",
            PipelineStage::Staging => "staging",
            PipelineStage::Uploading => "uploading",
        };
        f.write_str(name)
    }
}

/// `Idle → Archiving → Staging → Uploading → {Done | Failed}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Running(PipelineStage),
    Done,
    Failed { stage: PipelineStage, reason: String },
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed { .. })
    }

    /// The only state reachable from `self` on success.
    pub fn successor(&self) -> Option<PipelineState> {
        match self {
            PipelineState::Idle => Some(PipelineState::Running(PipelineStage::Archiving)),
            PipelineState::Running(PipelineStage::Archiving) => {
                Some(PipelineState::Running(PipelineStage::Staging))
            }
            PipelineState::Running(PipelineStage::Staging) => {
                Some(PipelineState::Running(PipelineStage::Uploading))
            }
            PipelineState::Running(PipelineStage::Uploading) => Some(PipelineState::Done),
            PipelineState::Done | PipelineState::Failed { .. } => None,
        }
    }

    /// Whether `next` is a legal transition: the successor, or failing the
    /// stage currently running.
    pub fn can_transition_to(&self, next: &PipelineState) -> bool {
        if self.successor().as_ref() == Some(next) {
            return true;
        }
        match (self, next) {
            (PipelineState::Running(current), PipelineState::Failed { stage, .. }) => current == stage,
            // credentials are checked before any stage starts
            (PipelineState::Idle, PipelineState::Failed { .. }) => true,
            _ => false,
        }
    }

    /// `Some(next)` when moving from `self` to `next` is legal.
    pub fn advance(&self, next: PipelineState) -> Option<PipelineState> {
        if self.can_transition_to(&next) {
            Some(next)
        } else {
            None
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Idle => f.write_str("idle"),
            PipelineState::Running(stage) => write!(f, "{}", stage),
            PipelineState::Done => f.write_str("done"),
            PipelineState::Failed { stage, reason } => write!(f, "failed during {}: {}", stage, reason),
        }
    }
}

/// Tracks the state of one run and refuses out-of-order transitions.
#[derive(Debug)]
pub(crate) struct StateMachine {
    state: PipelineState,
}

impl StateMachine {
    pub(crate) fn new() -> Self {
        StateMachine {
            state: PipelineState::Idle,
        }
    }

    pub(crate) fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Move to the successor state and return it.
    pub(crate) fn advance(&mut self) -> &PipelineState {
        if let Some(next) = self.state.successor() {
            debug!("Pipeline state: {} -> {}", self.state, next);
            self.state = next;
        }
        &self.state
    }

    /// Fail the running stage and return it. A failure before any stage has
    /// started (the credential check) is charged to uploading.
    pub(crate) fn fail(&mut self, reason: impl Into<String>) -> PipelineStage {
        let stage = match &self.state {
            PipelineState::Running(stage) | PipelineState::Failed { stage, .. } => *stage,
            PipelineState::Idle | PipelineState::Done => PipelineStage::Uploading,
        };
        let next = PipelineState::Failed {
            stage,
            reason: reason.into(),
        };
        match self.state.advance(next.clone()) {
            Some(next) => {
                debug!("Pipeline state: {} -> {}", self.state, next);
                self.state = next;
            }
            None => warn!("Ignoring invalid pipeline transition {} -> {}", self.state, next),
        }
        stage
    }
}
