//! The state machine that follows a submitted proof through its lifecycle events.
//!
//! ```text
//! Idle --IncludedInBlock--> SeenIncluded --Finalized--> SeenFinalized
//!                               |                            |
//!                               +----AttestationConfirmed----+--> Done
//! ```
//!
//! `Finalized` is optional. `IncludedInBlock` is required before `AttestationConfirmed`: a
//! confirmation seen while idle fails with [AttestError::OutOfOrderEvent].

use crate::error::{AttestError, Result};
use crate::network::LifecycleEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerPhase {
    Idle,
    SeenIncluded,
    SeenFinalized,
    Done,
}

/// Identifiers collected from the inclusion event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerState {
    attestation_id: Option<String>,
    leaf_digest: Option<String>,
}

impl TrackerState {
    pub fn attestation_id(&self) -> Option<&str> {
        self.attestation_id.as_deref()
    }

    pub fn leaf_digest(&self) -> Option<&str> {
        self.leaf_digest.as_deref()
    }

    fn identifiers(&self) -> Option<(String, String)> {
        Some((self.attestation_id.clone()?, self.leaf_digest.clone()?))
    }
}

/// Everything the finalizer needs, available only once the attestation is confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub attestation_id: String,
    pub leaf_digest: String,
    pub confirmation_id: String,
}

/// What handling one event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Included,
    Finalized,
    Confirmed(Confirmation),
    /// The event changed nothing.
    Ignored,
}

#[derive(Debug)]
pub struct EventTracker {
    phase: TrackerPhase,
    state: TrackerState,
}

impl Default for EventTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl EventTracker {
    pub fn new() -> Self {
        Self { phase: TrackerPhase::Idle, state: TrackerState::default() }
    }

    pub fn phase(&self) -> TrackerPhase {
        self.phase
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn is_done(&self) -> bool {
        self.phase == TrackerPhase::Done
    }

    /// Applies `event`.
    ///
    /// Once [TrackerPhase::Done] is reached every further event is ignored, so the attestation
    /// is finalized at most once.
    pub fn handle(&mut self, event: LifecycleEvent) -> Result<Transition> {
        if self.is_done() {
            tracing::warn!("ignoring {event}: attestation already confirmed");
            return Ok(Transition::Ignored);
        }

        match event {
            LifecycleEvent::IncludedInBlock { attestation_id, leaf_digest } => {
                tracing::info!(
                    "proof included in block: attestation {attestation_id}, leaf {leaf_digest}"
                );
                if self.phase != TrackerPhase::Idle {
                    tracing::warn!("duplicate inclusion event, replacing recorded identifiers");
                } else {
                    self.phase = TrackerPhase::SeenIncluded;
                }
                self.state.attestation_id = Some(attestation_id);
                self.state.leaf_digest = Some(leaf_digest);
                Ok(Transition::Included)
            }
            LifecycleEvent::Finalized { block_hash } => {
                if self.phase == TrackerPhase::Idle {
                    tracing::warn!("ignoring finalization of {block_hash} before inclusion");
                    return Ok(Transition::Ignored);
                }
                tracing::info!("proof finalized in block {block_hash}");
                self.phase = TrackerPhase::SeenFinalized;
                Ok(Transition::Finalized)
            }
            LifecycleEvent::AttestationConfirmed { confirmation_id } => {
                let Some((attestation_id, leaf_digest)) = self.state.identifiers() else {
                    return Err(AttestError::OutOfOrderEvent { event: "AttestationConfirmed" });
                };
                tracing::info!("attestation {confirmation_id} confirmed");
                self.phase = TrackerPhase::Done;
                Ok(Transition::Confirmed(Confirmation {
                    attestation_id,
                    leaf_digest,
                    confirmation_id,
                }))
            }
        }
    }
}
