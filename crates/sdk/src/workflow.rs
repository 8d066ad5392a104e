//! One complete attestation run: open a session, submit the proof, follow its lifecycle events
//! and persist the attestation once it is confirmed.

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{timeout, timeout_at, Instant};

use crate::config::AttestConfig;
use crate::error::{AttestError, Result};
use crate::finalizer::{AttestationFinalizer, AttestationRecord};
use crate::network::{LifecycleEvent, Submission, TxOutcome};
use crate::proof::{ProofBundle, ProofFile};
use crate::session::{require_credential, Session};
use crate::tracker::{Confirmation, EventTracker, Transition};

/// Runs the whole flow described by `config`.
///
/// The credential and the proof are checked before anything goes on the wire. Opening the
/// session is bounded by `config.submission_timeout`, and the session is closed whether or not
/// the run succeeds.
pub async fn attest(config: &AttestConfig) -> Result<AttestationRecord> {
    let credential = require_credential(config.credential.as_ref())?;
    let bundle = load_bundle(config)?;

    tracing::info!("starting session on {}", config.network);
    let mut builder =
        Session::start().target(config.network.clone()).poll_interval(config.poll_interval);
    if let Some(endpoint) = &config.endpoint {
        builder = builder.endpoint(endpoint.clone());
    }
    let session = timeout(config.submission_timeout, builder.with_account(Some(credential)))
        .await
        .map_err(|_| AttestError::Timeout {
            operation: "connect",
            after: config.submission_timeout,
        })??;

    let result = submit_and_attest(&session, bundle, config).await;
    if let Err(e) = session.close().await {
        tracing::warn!("failed to close session: {e}");
    }
    result
}

/// Loads the proof named by `config` and attests it through an already open `session`.
pub async fn attest_with_session(
    session: &Session,
    config: &AttestConfig,
) -> Result<AttestationRecord> {
    submit_and_attest(session, load_bundle(config)?, config).await
}

fn load_bundle(config: &AttestConfig) -> Result<ProofBundle> {
    ProofFile::load(&config.proof_path)?.into_bundle(config.protocol_version)
}

/// Submits `bundle` and drives its lifecycle to a persisted [AttestationRecord].
///
/// The submission call, waiting for the confirmation and waiting for the submission transaction
/// share one deadline, `config.submission_timeout`; the lookup is bounded by
/// `config.lookup_timeout`. The artifact
/// is written only after the transaction result is known to be successful.
pub async fn submit_and_attest(
    session: &Session,
    bundle: ProofBundle,
    config: &AttestConfig,
) -> Result<AttestationRecord> {
    let deadline = Instant::now() + config.submission_timeout;
    let timed_out = |operation: &'static str| AttestError::Timeout {
        operation,
        after: config.submission_timeout,
    };

    let submit = session.verify().risc0().wait_for_published_attestation().execute(bundle);
    let Submission { mut events, mut tx_result } =
        timeout_at(deadline, submit).await.map_err(|_| timed_out("submission"))??;

    let (confirmation, tx_outcome) =
        match timeout_at(deadline, track(&mut events, &mut tx_result)).await {
            Ok(Ok(tracked)) => tracked,
            Ok(Err(e)) => {
                tx_result.abort();
                return Err(e);
            }
            Err(_) => {
                tx_result.abort();
                return Err(timed_out("attestation"));
            }
        };
    drop(events);

    let tx_outcome = match tx_outcome {
        Some(outcome) => outcome,
        None => match timeout_at(deadline, &mut tx_result).await {
            Ok(joined) => settled(joined)?,
            Err(_) => {
                tx_result.abort();
                return Err(timed_out("attestation"));
            }
        },
    };
    tracing::debug!("submission transaction {tx_outcome:?}");

    AttestationFinalizer::new(session, &config.attestation_path, config.lookup_timeout)
        .finalize(&confirmation)
        .await
}

/// Feeds lifecycle events into an [EventTracker] until the attestation is confirmed, watching
/// the transaction result at the same time.
async fn track(
    events: &mut UnboundedReceiver<LifecycleEvent>,
    tx_result: &mut JoinHandle<Result<TxOutcome>>,
) -> Result<(Confirmation, Option<TxOutcome>)> {
    let mut tracker = EventTracker::new();
    let mut tx_outcome = None;
    loop {
        tokio::select! {
            biased;

            event = events.recv() => {
                let Some(event) = event else {
                    // The producer is gone; report its failure if it had one.
                    if tx_outcome.is_none() {
                        settled((&mut *tx_result).await)?;
                    }
                    return Err(AttestError::Submission(
                        "event stream ended before the attestation was confirmed".to_string(),
                    ));
                };
                if let Transition::Confirmed(confirmation) = tracker.handle(event)? {
                    return Ok((confirmation, tx_outcome));
                }
            }
            joined = &mut *tx_result, if tx_outcome.is_none() => {
                let outcome = settled(joined)?;
                tracing::info!("submission transaction for job {} settled", outcome.job_id);
                tx_outcome = Some(outcome);
            }
        }
    }
}

fn settled(joined: std::result::Result<Result<TxOutcome>, JoinError>) -> Result<TxOutcome> {
    joined.map_err(|e| AttestError::Submission(format!("submission task failed: {e}")))?
}
