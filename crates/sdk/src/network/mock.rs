use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::config::Credential;
use crate::error::{AttestError, Result};
use crate::network::{
    AttestationNetwork, LifecycleEvent, ProofOfEvent, Submission, TxOutcome, VerifyRequest,
};

/// Number of times each [MockNetwork] operation was invoked.
#[derive(Debug, Default)]
pub struct MockCalls {
    pub connect: AtomicUsize,
    pub submit: AtomicUsize,
    pub proof_of_event: AtomicUsize,
    pub close: AtomicUsize,
}

impl MockCalls {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// An in-process network that replays a scripted submission.
///
/// The default script includes, finalizes and confirms the proof.
pub struct MockNetwork {
    events: Vec<LifecycleEvent>,
    tx_result: std::result::Result<TxOutcome, String>,
    lookup: ProofOfEvent,
    accepted_secret: Option<String>,
    calls: Arc<MockCalls>,
}

impl Default for MockNetwork {
    fn default() -> Self {
        let leaf_digest = format!("0x{}", "d1".repeat(32));
        Self::new()
            .with_events(vec![
                LifecycleEvent::IncludedInBlock {
                    attestation_id: "1".to_string(),
                    leaf_digest: leaf_digest.clone(),
                },
                LifecycleEvent::Finalized { block_hash: format!("0x{}", "b1".repeat(32)) },
                LifecycleEvent::AttestationConfirmed { confirmation_id: "1".to_string() },
            ])
            .with_lookup(json!({
                "root": format!("0x{}", "a0".repeat(32)),
                "proof": [],
                "numberOfLeaves": 1,
                "leafIndex": 0,
                "leaf": leaf_digest,
            }))
    }
}

impl MockNetwork {
    /// Creates a mock with no scripted events.
    pub fn new() -> Self {
        Self {
            events: vec![],
            tx_result: Ok(TxOutcome { job_id: "mock-job".to_string(), ..Default::default() }),
            lookup: ProofOfEvent::new(),
            accepted_secret: None,
            calls: Arc::new(MockCalls::default()),
        }
    }

    pub fn with_events(mut self, events: Vec<LifecycleEvent>) -> Self {
        self.events = events;
        self
    }

    /// Sets the lookup result. Non-object values are stored under `value`.
    pub fn with_lookup(mut self, lookup: Value) -> Self {
        self.lookup = match lookup {
            Value::Object(map) => map,
            other => ProofOfEvent::from_iter([("value".to_string(), other)]),
        };
        self
    }

    /// Makes the submission transaction fail with `reason` after the scripted events.
    pub fn with_rejected_tx(mut self, reason: impl Into<String>) -> Self {
        self.tx_result = Err(reason.into());
        self
    }

    /// Only accepts `secret` when connecting.
    pub fn with_accepted_secret(mut self, secret: impl Into<String>) -> Self {
        self.accepted_secret = Some(secret.into());
        self
    }

    /// A handle on the call counters that stays valid after the mock is moved into a session.
    pub fn calls(&self) -> Arc<MockCalls> {
        self.calls.clone()
    }

    fn included_identifiers(&self) -> Vec<(&str, &str)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                LifecycleEvent::IncludedInBlock { attestation_id, leaf_digest } => {
                    Some((attestation_id.as_str(), leaf_digest.as_str()))
                }
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl AttestationNetwork for MockNetwork {
    fn name(&self) -> &str {
        "mock"
    }

    async fn connect(&mut self, credential: &Credential) -> Result<()> {
        self.calls.connect.fetch_add(1, Ordering::SeqCst);
        match &self.accepted_secret {
            Some(secret) if secret != credential.expose() => {
                Err(AttestError::Authentication("mock network rejected the credential".into()))
            }
            _ => Ok(()),
        }
    }

    async fn submit(&self, _request: VerifyRequest) -> Result<Submission> {
        self.calls.submit.fetch_add(1, Ordering::SeqCst);

        let (sender, events) = mpsc::unbounded_channel();
        let script = self.events.clone();
        let tx_result = self.tx_result.clone();
        let tx_result = tokio::spawn(async move {
            for event in script {
                // The receiver may already be gone once the run has its confirmation.
                let _ = sender.send(event);
            }
            tx_result.map_err(AttestError::Submission)
        });

        Ok(Submission { events, tx_result })
    }

    async fn proof_of_event(
        &self,
        attestation_id: &str,
        leaf_digest: &str,
    ) -> Result<ProofOfEvent> {
        self.calls.proof_of_event.fetch_add(1, Ordering::SeqCst);
        if !self.included_identifiers().contains(&(attestation_id, leaf_digest)) {
            return Err(AttestError::Lookup(format!(
                "unknown attestation {attestation_id} / leaf {leaf_digest}"
            )));
        }
        Ok(self.lookup.clone())
    }

    async fn close(&self) -> Result<()> {
        self.calls.close.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
