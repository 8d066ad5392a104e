use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;
use crate::proof::ProtocolVersion;
use crate::session::NetworkTarget;

/// Environment variable holding the account seed phrase. It is only used locally, to derive the
/// signing wallet.
pub const CREDENTIAL_VAR: &str = "SEED_PHRASE";

pub const DEFAULT_POLL_INTERVAL: u64 = 3000; // 3s
pub const MIN_POLL_INTERVAL: u64 = 100; // 100ms
pub const DEFAULT_SUBMISSION_TIMEOUT: u64 = 3600; // 1h
pub const DEFAULT_LOOKUP_TIMEOUT: u64 = 60;
pub const DEFAULT_REQUEST_TIMEOUT: u64 = 30;
pub const DEFAULT_PROOF_PATH: &str = "proof.json";
pub const DEFAULT_ATTESTATION_PATH: &str = "attestation.json";

/// The secret used to authenticate a session. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Settings for one attestation run.
#[derive(Debug, Clone)]
pub struct AttestConfig {
    pub credential: Option<Credential>,
    pub network: NetworkTarget,
    /// Gateway URL for [NetworkTarget::Testnet].
    pub endpoint: Option<String>,
    /// Interval between job status polls.
    pub poll_interval: Duration,
    /// Upper bound on waiting for the attestation to be confirmed.
    pub submission_timeout: Duration,
    pub lookup_timeout: Duration,
    pub proof_path: PathBuf,
    pub attestation_path: PathBuf,
    pub protocol_version: ProtocolVersion,
}

impl Default for AttestConfig {
    fn default() -> Self {
        Self {
            credential: None,
            network: NetworkTarget::Testnet,
            endpoint: None,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL),
            submission_timeout: Duration::from_secs(DEFAULT_SUBMISSION_TIMEOUT),
            lookup_timeout: Duration::from_secs(DEFAULT_LOOKUP_TIMEOUT),
            proof_path: PathBuf::from(DEFAULT_PROOF_PATH),
            attestation_path: PathBuf::from(DEFAULT_ATTESTATION_PATH),
            protocol_version: ProtocolVersion::default(),
        }
    }
}

impl AttestConfig {
    /// Reads the configuration from the process environment.
    ///
    /// A missing credential is not an error here; opening the session reports it.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `var`, which maps a variable name to its value.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        config.credential = var(CREDENTIAL_VAR).map(Credential::new);

        if let Some(network) = var("ZKV_NETWORK") {
            config.network = network.parse()?;
        }
        config.endpoint = var("ZKV_ENDPOINT");

        let mut poll_interval = var("ZKV_PROOF_POLL_INTERVAL")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_POLL_INTERVAL);
        if poll_interval < MIN_POLL_INTERVAL {
            poll_interval = MIN_POLL_INTERVAL;
        }
        config.poll_interval = Duration::from_millis(poll_interval);

        if let Some(secs) = var("ZKV_SUBMISSION_TIMEOUT").and_then(|s| s.parse::<u64>().ok()) {
            config.submission_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = var("ZKV_LOOKUP_TIMEOUT").and_then(|s| s.parse::<u64>().ok()) {
            config.lookup_timeout = Duration::from_secs(secs);
        }
        if let Some(path) = var("ZKV_PROOF_PATH") {
            config.proof_path = PathBuf::from(path);
        }
        if let Some(path) = var("ZKV_ATTESTATION_PATH") {
            config.attestation_path = PathBuf::from(path);
        }
        if let Some(tag) = var("ZKV_PROTOCOL_VERSION") {
            config.protocol_version = ProtocolVersion::parse(&tag)?;
        }

        Ok(config)
    }
}
