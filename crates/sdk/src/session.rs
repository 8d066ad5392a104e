use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::action;
use crate::config::{Credential, DEFAULT_POLL_INTERVAL};
use crate::error::{AttestError, Result};
use crate::network::{AttestationNetwork, MockNetwork, ProofOfEvent, RelayerNetwork};

/// Which network a session talks to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NetworkTarget {
    /// The zkVerify testnet, reached through the gateway set with [SessionBuilder::endpoint].
    #[default]
    Testnet,
    /// A gateway at an explicit URL.
    Custom(String),
    /// The scripted in-process network.
    Mock,
}

impl FromStr for NetworkTarget {
    type Err = AttestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "testnet" => Ok(NetworkTarget::Testnet),
            "mock" => Ok(NetworkTarget::Mock),
            _ if s.starts_with("http://") || s.starts_with("https://") => {
                Ok(NetworkTarget::Custom(s.to_string()))
            }
            _ => Err(AttestError::Connection(format!(
                "unknown network `{s}`: expected 'testnet', 'mock' or an http(s) URL"
            ))),
        }
    }
}

impl fmt::Display for NetworkTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkTarget::Testnet => write!(f, "Testnet"),
            NetworkTarget::Custom(url) => write!(f, "{url}"),
            NetworkTarget::Mock => write!(f, "Mock"),
        }
    }
}

/// An open, authenticated connection to the attestation network.
///
/// A session serves a single run. Release it with [Session::close].
pub struct Session {
    network: Box<dyn AttestationNetwork>,
    target: NetworkTarget,
}

/// Builder returned by [Session::start].
pub struct SessionBuilder {
    target: NetworkTarget,
    endpoint: Option<String>,
    poll_interval: Duration,
    network: Option<Box<dyn AttestationNetwork>>,
}

impl Session {
    /// Starts configuring a session.
    ///
    /// ### Examples
    ///
    /// ```no_run
    /// use zkv_sdk::{Credential, Session};
    ///
    /// # async fn run() -> zkv_sdk::Result<()> {
    /// let credential = Credential::new(std::env::var("SEED_PHRASE").unwrap_or_default());
    /// let session = Session::start()
    ///     .testnet()
    ///     .endpoint("https://gateway.example/api/v1")
    ///     .with_account(Some(&credential))
    ///     .await?;
    /// session.close().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn start() -> SessionBuilder {
        SessionBuilder {
            target: NetworkTarget::Testnet,
            endpoint: None,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL),
            network: None,
        }
    }

    pub fn target(&self) -> &NetworkTarget {
        &self.target
    }

    /// Prepares a proof submission. See [action::Verify].
    pub fn verify(&self) -> action::Verify<'_> {
        action::Verify::new(self)
    }

    pub(crate) fn network(&self) -> &dyn AttestationNetwork {
        self.network.as_ref()
    }

    /// Looks up the proof of event for a leaf of an attestation.
    pub async fn proof_of_event(
        &self,
        attestation_id: &str,
        leaf_digest: &str,
    ) -> Result<ProofOfEvent> {
        self.network.proof_of_event(attestation_id, leaf_digest).await
    }

    /// Releases the connection.
    pub async fn close(self) -> Result<()> {
        tracing::debug!("closing session on {}", self.target);
        self.network.close().await
    }
}

impl SessionBuilder {
    pub fn testnet(mut self) -> Self {
        self.target = NetworkTarget::Testnet;
        self
    }

    /// Sets the gateway URL used for the testnet.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn custom(mut self, endpoint: impl Into<String>) -> Self {
        self.target = NetworkTarget::Custom(endpoint.into());
        self
    }

    pub fn mock(mut self) -> Self {
        self.target = NetworkTarget::Mock;
        self
    }

    pub fn target(mut self, target: NetworkTarget) -> Self {
        self.target = target;
        self
    }

    /// Sets the job status polling interval for gateway-backed sessions.
    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Uses `network` instead of the client implied by the target.
    pub fn with_network(mut self, network: impl AttestationNetwork + 'static) -> Self {
        self.network = Some(Box::new(network));
        self
    }

    /// Authenticates with `credential` and opens the session.
    ///
    /// A missing or blank credential fails before any network call is made.
    pub async fn with_account(self, credential: Option<&Credential>) -> Result<Session> {
        let credential = require_credential(credential)?;

        let Self { target, endpoint, poll_interval, network } = self;
        let mut network: Box<dyn AttestationNetwork> = match network {
            Some(network) => network,
            None => match &target {
                NetworkTarget::Testnet => {
                    let endpoint = endpoint.ok_or_else(|| {
                        AttestError::Connection(
                            "no testnet gateway configured, set ZKV_ENDPOINT".to_string(),
                        )
                    })?;
                    Box::new(RelayerNetwork::new(endpoint).with_poll_interval(poll_interval))
                }
                NetworkTarget::Custom(url) => {
                    Box::new(RelayerNetwork::new(url.clone()).with_poll_interval(poll_interval))
                }
                NetworkTarget::Mock => Box::new(MockNetwork::default()),
            },
        };

        network.connect(credential).await?;
        tracing::info!("session started on {target} via {}", network.name());

        Ok(Session { network, target })
    }
}

/// Returns the credential if it is present and not blank.
pub(crate) fn require_credential(credential: Option<&Credential>) -> Result<&Credential> {
    match credential {
        Some(credential) if !credential.is_empty() => Ok(credential),
        _ => Err(AttestError::Authentication(format!(
            "{} is not set",
            crate::config::CREDENTIAL_VAR
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::MockCalls;

    #[test]
    fn test_parse_target() {
        assert_eq!("testnet".parse::<NetworkTarget>().unwrap(), NetworkTarget::Testnet);
        assert_eq!("Mock".parse::<NetworkTarget>().unwrap(), NetworkTarget::Mock);
        assert_eq!(
            "https://gateway.example/api".parse::<NetworkTarget>().unwrap(),
            NetworkTarget::Custom("https://gateway.example/api".to_string())
        );
        assert!("mainnet".parse::<NetworkTarget>().is_err());
    }

    #[tokio::test]
    async fn test_missing_credential_fails_before_connecting() {
        let mock = MockNetwork::default();
        let calls = mock.calls();

        let err = Session::start().with_network(mock).with_account(None).await.err().unwrap();
        assert!(matches!(err, AttestError::Authentication(_)));

        let blank = Credential::new("  ");
        let err = Session::start().mock().with_account(Some(&blank)).await.err().unwrap();
        assert!(matches!(err, AttestError::Authentication(_)));

        assert_eq!(MockCalls::get(&calls.connect), 0);
    }

    #[tokio::test]
    async fn test_rejected_credential() {
        let mock = MockNetwork::default().with_accepted_secret("right");
        let wrong = Credential::new("wrong");
        let err = Session::start().with_network(mock).with_account(Some(&wrong)).await.err().unwrap();
        assert!(matches!(err, AttestError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_open_and_close() {
        let mock = MockNetwork::default();
        let calls = mock.calls();
        let credential = Credential::new("secret");

        let session =
            Session::start().mock().with_network(mock).with_account(Some(&credential)).await.unwrap();
        assert_eq!(session.target(), &NetworkTarget::Mock);
        session.close().await.unwrap();

        assert_eq!(MockCalls::get(&calls.connect), 1);
        assert_eq!(MockCalls::get(&calls.close), 1);
    }

    #[tokio::test]
    async fn test_testnet_requires_a_gateway() {
        let credential = Credential::new("secret");
        let err = Session::start().testnet().with_account(Some(&credential)).await.err().unwrap();
        assert!(matches!(err, AttestError::Connection(reason) if reason.contains("ZKV_ENDPOINT")));
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_connection_error() {
        let credential =
            Credential::new("test test test test test test test test test test test junk");
        let err = Session::start()
            .custom("http://127.0.0.1:9")
            .with_account(Some(&credential))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AttestError::Connection(_)));
    }
}
