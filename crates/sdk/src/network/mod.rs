use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::Credential;
use crate::error::Result;
use crate::proof::{ProofBundle, ProofSystem};

pub mod mock;
pub mod relayer;

pub use mock::{MockCalls, MockNetwork};
pub use relayer::RelayerNetwork;

/// The result of a confirmation ("proof of event") lookup, as returned by the network.
pub type ProofOfEvent = Map<String, Value>;

/// Notifications emitted by the network while a submitted proof moves towards attestation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    IncludedInBlock { attestation_id: String, leaf_digest: String },
    Finalized { block_hash: String },
    AttestationConfirmed { confirmation_id: String },
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::IncludedInBlock { .. } => "IncludedInBlock",
            LifecycleEvent::Finalized { .. } => "Finalized",
            LifecycleEvent::AttestationConfirmed { .. } => "AttestationConfirmed",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleEvent::IncludedInBlock { attestation_id, leaf_digest } => write!(
                f,
                "IncludedInBlock(attestation_id={attestation_id}, leaf_digest={leaf_digest})"
            ),
            LifecycleEvent::Finalized { block_hash } => write!(f, "Finalized(block={block_hash})"),
            LifecycleEvent::AttestationConfirmed { confirmation_id } => {
                write!(f, "AttestationConfirmed(id={confirmation_id})")
            }
        }
    }
}

/// How far upstream the submission has to progress before its transaction result resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WaitFor {
    IncludedInBlock,
    #[default]
    Finalized,
    PublishedAttestation,
}

/// A request to verify one proof.
#[derive(Debug, Clone)]
pub struct VerifyRequest {
    pub proof_system: ProofSystem,
    pub wait_for: WaitFor,
    pub bundle: ProofBundle,
}

/// What the network reported about the submission transaction itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxOutcome {
    pub job_id: String,
    pub tx_hash: Option<String>,
    pub block_hash: Option<String>,
}

/// The handles returned by a submission.
///
/// `events` yields lifecycle notifications in the order the network produced them. `tx_result`
/// resolves once the requested [WaitFor] milestone is reached, or with an error if the network
/// rejected the transaction.
pub struct Submission {
    pub events: mpsc::UnboundedReceiver<LifecycleEvent>,
    pub tx_result: JoinHandle<Result<TxOutcome>>,
}

/// A client for a remote attestation network.
#[async_trait]
pub trait AttestationNetwork: Send + Sync {
    /// A short name used in logs.
    fn name(&self) -> &str;

    /// Authenticates with `credential`. Called once, before anything else.
    async fn connect(&mut self, credential: &Credential) -> Result<()>;

    /// Submits a proof for verification.
    async fn submit(&self, request: VerifyRequest) -> Result<Submission>;

    /// Looks up the evidence that `attestation_id` contains the leaf `leaf_digest`.
    async fn proof_of_event(&self, attestation_id: &str, leaf_digest: &str)
        -> Result<ProofOfEvent>;

    /// Releases the connection.
    async fn close(&self) -> Result<()>;
}
