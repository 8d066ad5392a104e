use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use ethers::signers::coins_bip39::English;
use ethers::signers::{LocalWallet, MnemonicBuilder, Signer};
use ethers::utils::keccak256;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::sleep;

use crate::config::{Credential, DEFAULT_POLL_INTERVAL, DEFAULT_REQUEST_TIMEOUT};
use crate::error::{AttestError, Result};
use crate::network::{
    AttestationNetwork, LifecycleEvent, ProofOfEvent, Submission, TxOutcome, VerifyRequest,
    WaitFor,
};
use crate::proof::{hex_prefixed, ProofSystem, ProtocolVersion};

pub const ADDRESS_HEADER: &str = "x-zkv-address";
pub const TIMESTAMP_HEADER: &str = "x-zkv-timestamp";
pub const SIGNATURE_HEADER: &str = "x-zkv-signature";

/// A zkVerify client speaking JSON over HTTP to a relayer gateway.
///
/// The seed phrase never leaves the process: it is turned into a wallet on `connect`, and every
/// request carries the wallet address and a signature over the request instead.
///
/// Lifecycle events are derived by polling the job status and comparing each answer with the
/// previous one.
pub struct RelayerNetwork {
    gateway: Gateway,
    wallet: Option<LocalWallet>,
    // Polling interval for checking the job status, default is 3000 milliseconds
    poll_interval: Duration,
}

/// The HTTP side of a [RelayerNetwork], shared with the polling task.
#[derive(Clone)]
struct Gateway {
    client: Client,
    endpoint: String,
    request_timeout: Duration,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitProofRequest {
    proof_type: ProofSystem,
    proof_options: ProofOptions,
    proof_data: ProofData,
    wait_for: WaitFor,
}

#[derive(Serialize)]
struct ProofOptions {
    version: ProtocolVersion,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProofData {
    proof: String,
    public_signals: Value,
    vk: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitProofResponse {
    job_id: String,
}

#[derive(Deserialize)]
struct AccountResponse {
    address: String,
}

/// Job states reported by the gateway, in the order a successful job passes through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
pub(crate) enum JobStatus {
    Queued,
    Valid,
    Submitted,
    IncludedInBlock,
    Finalized,
    AttestationConfirmed,
    Failed,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JobStatusResponse {
    pub(crate) status: JobStatus,
    #[serde(default)]
    pub(crate) attestation_id: Option<Value>,
    #[serde(default)]
    pub(crate) leaf_digest: Option<String>,
    #[serde(default)]
    pub(crate) block_hash: Option<String>,
    #[serde(default)]
    pub(crate) tx_hash: Option<String>,
    #[serde(default)]
    pub(crate) error: Option<String>,
}

impl JobStatusResponse {
    fn attestation_id(&self) -> Option<String> {
        match self.attestation_id.as_ref()? {
            Value::String(id) => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }
}

impl WaitFor {
    fn terminal_status(self) -> JobStatus {
        match self {
            WaitFor::IncludedInBlock => JobStatus::IncludedInBlock,
            WaitFor::Finalized => JobStatus::Finalized,
            WaitFor::PublishedAttestation => JobStatus::AttestationConfirmed,
        }
    }
}

/// Returns the lifecycle events implied by moving from `last` to `response.status`.
///
/// Polling can skip intermediate states, so every milestone in between is reported, oldest
/// first.
pub(crate) fn events_between(
    last: JobStatus,
    response: &JobStatusResponse,
) -> Result<Vec<LifecycleEvent>> {
    let mut events = Vec::new();
    let passed = |milestone: JobStatus| last < milestone && milestone <= response.status;

    if passed(JobStatus::IncludedInBlock) {
        let (Some(attestation_id), Some(leaf_digest)) =
            (response.attestation_id(), response.leaf_digest.clone())
        else {
            return Err(AttestError::Submission(format!(
                "job reached {:?} without an attestation id and leaf digest",
                response.status
            )));
        };
        events.push(LifecycleEvent::IncludedInBlock { attestation_id, leaf_digest });
    }
    if passed(JobStatus::Finalized) {
        events.push(LifecycleEvent::Finalized {
            block_hash: response.block_hash.clone().unwrap_or_default(),
        });
    }
    if passed(JobStatus::AttestationConfirmed) {
        let confirmation_id = response.attestation_id().ok_or_else(|| {
            AttestError::Submission("attestation confirmed without an id".to_string())
        })?;
        events.push(LifecycleEvent::AttestationConfirmed { confirmation_id });
    }

    Ok(events)
}

/// Derives the account wallet from a BIP-39 seed phrase.
pub fn wallet_from_phrase(credential: &Credential) -> Result<LocalWallet> {
    MnemonicBuilder::<English>::default()
        .phrase(credential.expose().trim())
        .build()
        .map_err(|e| AttestError::Authentication(format!("invalid seed phrase: {e}")))
}

/// The message signed for one request: `METHOD&path&timestamp&keccak256(body)`.
pub fn signing_payload(method: &Method, path: &str, timestamp: u64, body: &[u8]) -> String {
    format!("{method}&{path}&{timestamp}&{}", hex::encode(keccak256(body)))
}

impl Gateway {
    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.endpoint)
    }

    /// Sends a request signed by `wallet`. Transport failures are mapped with `on_error`.
    async fn send(
        &self,
        wallet: &LocalWallet,
        method: Method,
        path: &str,
        body: Vec<u8>,
        on_error: fn(String) -> AttestError,
    ) -> Result<Response> {
        let timestamp =
            SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or_default();
        let signature = wallet
            .sign_message(signing_payload(&method, path, timestamp, &body))
            .await
            .map_err(|e| AttestError::Authentication(format!("failed to sign request: {e}")))?;

        let mut request = self
            .client
            .request(method, self.url(path))
            .timeout(self.request_timeout)
            .header(ADDRESS_HEADER, format!("{:?}", wallet.address()))
            .header(TIMESTAMP_HEADER, timestamp.to_string())
            .header(SIGNATURE_HEADER, signature.to_string());
        if !body.is_empty() {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }
        request.send().await.map_err(|e| on_error(e.to_string()))
    }
}

impl RelayerNetwork {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            gateway: Gateway {
                client: Client::new(),
                endpoint: endpoint.into().trim_end_matches('/').to_string(),
                request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT),
            },
            wallet: None,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Bounds every single HTTP request.
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.gateway.request_timeout = request_timeout;
        self
    }

    fn wallet(&self, on_error: fn(String) -> AttestError) -> Result<&LocalWallet> {
        self.wallet.as_ref().ok_or_else(|| on_error("session is not connected".to_string()))
    }

    async fn poll_job(
        gateway: Gateway,
        wallet: LocalWallet,
        job_id: String,
        wait_for: WaitFor,
        poll_interval: Duration,
        events: mpsc::UnboundedSender<LifecycleEvent>,
    ) -> Result<TxOutcome> {
        let terminal = wait_for.terminal_status();
        let status_path = format!("job-status/{job_id}");
        let mut last = JobStatus::Queued;
        loop {
            let response = gateway
                .send(&wallet, Method::GET, &status_path, Vec::new(), AttestError::Connection)
                .await?;
            let response = error_for_status(response, AttestError::Submission).await?;
            let status: JobStatusResponse = response
                .json()
                .await
                .map_err(|e| AttestError::Submission(format!("invalid job status: {e}")))?;

            if status.status == JobStatus::Failed {
                let reason = status.error.unwrap_or_else(|| "no reason given".to_string());
                tracing::error!("job {job_id} failed: {reason}");
                return Err(AttestError::Submission(reason));
            }

            for event in events_between(last, &status)? {
                if events.send(event).is_err() {
                    tracing::debug!("lifecycle receiver dropped, job {job_id}");
                }
            }
            if status.status > last {
                tracing::debug!("job {job_id}: {:?} -> {:?}", last, status.status);
                last = status.status;
            }

            if last >= terminal {
                return Ok(TxOutcome {
                    job_id,
                    tx_hash: status.tx_hash,
                    block_hash: status.block_hash,
                });
            }
            sleep(poll_interval).await;
        }
    }
}

/// Maps non-success HTTP statuses onto `on_error`, keeping the response body as the reason.
async fn error_for_status(
    response: Response,
    on_error: fn(String) -> AttestError,
) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(on_error(format!("{status}: {body}")))
}

#[async_trait]
impl AttestationNetwork for RelayerNetwork {
    fn name(&self) -> &str {
        &self.gateway.endpoint
    }

    async fn connect(&mut self, credential: &Credential) -> Result<()> {
        let wallet = wallet_from_phrase(credential)?;
        let address = format!("{:?}", wallet.address());

        let path = format!("account/{address}");
        let response = self
            .gateway
            .send(&wallet, Method::GET, &path, Vec::new(), AttestError::Connection)
            .await?;
        let response = match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                return Err(AttestError::Authentication(format!(
                    "{} does not know account {address}",
                    self.gateway.endpoint
                )))
            }
            _ => error_for_status(response, AttestError::Connection).await?,
        };
        let account: AccountResponse = response
            .json()
            .await
            .map_err(|e| AttestError::Connection(format!("invalid account response: {e}")))?;
        if !account.address.eq_ignore_ascii_case(&address) {
            return Err(AttestError::Authentication(format!(
                "gateway answered for account {} instead of {address}",
                account.address
            )));
        }
        tracing::info!("authenticated as {address}");

        self.wallet = Some(wallet);
        Ok(())
    }

    async fn submit(&self, request: VerifyRequest) -> Result<Submission> {
        let wallet = self.wallet(AttestError::Submission)?;
        let VerifyRequest { proof_system, wait_for, bundle } = request;
        let public_signals = match bundle.public_inputs() {
            [single] => Value::String(hex_prefixed(single)),
            many => Value::Array(many.iter().map(|v| Value::String(hex_prefixed(v))).collect()),
        };
        let body = SubmitProofRequest {
            proof_type: proof_system,
            proof_options: ProofOptions { version: bundle.version() },
            proof_data: ProofData {
                proof: hex_prefixed(bundle.proof()),
                public_signals,
                vk: hex_prefixed(bundle.verification_key()),
            },
            wait_for,
        };
        let body = serde_json::to_vec(&body)
            .map_err(|e| AttestError::Submission(format!("failed to encode request: {e}")))?;

        let start = tokio::time::Instant::now();
        let response = self
            .gateway
            .send(wallet, Method::POST, "submit-proof", body, AttestError::Connection)
            .await?;
        let response = error_for_status(response, AttestError::Submission).await?;
        let SubmitProofResponse { job_id } = response
            .json()
            .await
            .map_err(|e| AttestError::Submission(format!("invalid submit response: {e}")))?;
        tracing::info!("[submit proof] job {job_id} accepted in {:?}", start.elapsed());

        let (sender, events) = mpsc::unbounded_channel();
        let tx_result = tokio::spawn(Self::poll_job(
            self.gateway.clone(),
            wallet.clone(),
            job_id,
            wait_for,
            self.poll_interval,
            sender,
        ));

        Ok(Submission { events, tx_result })
    }

    async fn proof_of_event(
        &self,
        attestation_id: &str,
        leaf_digest: &str,
    ) -> Result<ProofOfEvent> {
        let wallet = self.wallet(AttestError::Lookup)?;
        let path = format!("proof-of-event/{attestation_id}/{leaf_digest}");
        let response =
            self.gateway.send(wallet, Method::GET, &path, Vec::new(), AttestError::Lookup).await?;
        let response = error_for_status(response, AttestError::Lookup).await?;
        response.json().await.map_err(|e| AttestError::Lookup(format!("invalid proof of event: {e}")))
    }

    async fn close(&self) -> Result<()> {
        tracing::debug!("closing session with {}", self.gateway.endpoint);
        Ok(())
    }
}
