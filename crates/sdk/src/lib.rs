//! # zkVerify SDK
//!
//! A library for submitting zero-knowledge proofs to the zkVerify network and keeping the
//! resulting attestation.
//!
//! A run opens a [Session], submits one [ProofBundle], follows the proof's
//! [LifecycleEvent]s with an [EventTracker] and, once the attestation is confirmed, writes the
//! [AttestationRecord] to disk. [workflow::attest] does all of it from an [AttestConfig].
//!
//! ### Examples
//!
//! ```no_run
//! use zkv_sdk::{utils, workflow, AttestConfig};
//!
//! # async fn run() -> zkv_sdk::Result<()> {
//! utils::setup_logger();
//! let config = AttestConfig::from_env()?;
//! let record = workflow::attest(&config).await?;
//! println!("attestation {:?}", record.attestation_id());
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod config;
pub mod error;
pub mod finalizer;
pub mod network;
pub mod proof;
pub mod session;
pub mod tracker;
pub mod utils;
pub mod workflow;

pub use config::{AttestConfig, Credential};
pub use error::{AttestError, Result};
pub use finalizer::{AttestationFinalizer, AttestationRecord};
pub use network::{
    AttestationNetwork, LifecycleEvent, MockNetwork, RelayerNetwork, Submission, TxOutcome,
};
pub use proof::{ProofBundle, ProofFile, ProofSystem, ProtocolVersion};
pub use session::{NetworkTarget, Session};
pub use tracker::{EventTracker, TrackerPhase, TrackerState};

// Re-export the utilities.
pub use utils::setup_logger;
