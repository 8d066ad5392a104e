use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tokio::time::timeout;

use crate::error::{AttestError, Result};
use crate::network::ProofOfEvent;
use crate::session::Session;
use crate::tracker::Confirmation;

/// Key under which the confirmation event's id is stored in the record.
pub const ATTESTATION_ID_FIELD: &str = "attestationId";

/// The confirmation lookup result together with the id of the confirmation event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttestationRecord(Map<String, Value>);

impl AttestationRecord {
    /// Adds `confirmation_id` to `lookup`, replacing any `attestationId` it already had.
    pub fn new(lookup: ProofOfEvent, confirmation_id: &str) -> Self {
        let mut fields = lookup;
        fields.insert(ATTESTATION_ID_FIELD.to_string(), Value::String(confirmation_id.to_string()));
        Self(fields)
    }

    pub fn attestation_id(&self) -> Option<&str> {
        self.0.get(ATTESTATION_ID_FIELD).and_then(Value::as_str)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Writes the record as pretty JSON, replacing whatever is at `path`.
    ///
    /// The file is written next to `path` first and renamed into place, so readers never see a
    /// partial record.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut file = NamedTempFile::new_in(dir).map_err(|e| AttestError::persistence(path, e))?;
        serde_json::to_writer_pretty(&mut file, &self.0)
            .map_err(|e| AttestError::persistence(path, e))?;
        file.write_all(b"\n").map_err(|e| AttestError::persistence(path, e))?;
        file.persist(path).map_err(|e| AttestError::persistence(path, e.error))?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| AttestError::persistence(path, e))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| AttestError::persistence(path, e))
    }
}

/// Looks up and persists the attestation once the tracker reports a confirmation.
///
/// Finalizing consumes the finalizer, so a run writes its artifact at most once.
pub struct AttestationFinalizer<'a> {
    session: &'a Session,
    output: PathBuf,
    lookup_timeout: Duration,
}

impl<'a> AttestationFinalizer<'a> {
    pub fn new(session: &'a Session, output: impl Into<PathBuf>, lookup_timeout: Duration) -> Self {
        Self { session, output: output.into(), lookup_timeout }
    }

    pub async fn finalize(self, confirmation: &Confirmation) -> Result<AttestationRecord> {
        let Confirmation { attestation_id, leaf_digest, confirmation_id } = confirmation;
        tracing::info!("looking up proof of event for attestation {attestation_id}");

        let lookup = timeout(
            self.lookup_timeout,
            self.session.proof_of_event(attestation_id, leaf_digest),
        )
        .await
        .map_err(|_| AttestError::Timeout {
            operation: "confirmation lookup",
            after: self.lookup_timeout,
        })??;

        let record = AttestationRecord::new(lookup, confirmation_id);
        record.persist(&self.output)?;
        tracing::info!("attestation written to {}", self.output.display());

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::Credential;
    use crate::network::{
        AttestationNetwork, LifecycleEvent, MockCalls, MockNetwork, Submission, VerifyRequest,
    };

    fn lookup() -> ProofOfEvent {
        json!({ "root": "0xr00t", "proof": ["0x01"], "numberOfLeaves": 2, "leafIndex": 1 })
            .as_object()
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_record_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attestation.json");

        let record = AttestationRecord::new(lookup(), "C1");
        record.persist(&path).unwrap();
        let loaded = AttestationRecord::load(&path).unwrap();

        let mut expected = lookup();
        expected.insert("attestationId".to_string(), json!("C1"));
        assert_eq!(loaded.fields(), &expected);
        assert_eq!(loaded.attestation_id(), Some("C1"));
    }

    #[test]
    fn test_confirmation_id_replaces_lookup_field() {
        let mut fields = lookup();
        fields.insert("attestationId".to_string(), json!(99));
        let record = AttestationRecord::new(fields, "C1");
        assert_eq!(record.attestation_id(), Some("C1"));
    }

    #[test]
    fn test_persist_overwrites_previous_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attestation.json");
        std::fs::write(&path, "stale contents that are not even json").unwrap();

        AttestationRecord::new(lookup(), "C1").persist(&path).unwrap();
        assert_eq!(AttestationRecord::load(&path).unwrap().attestation_id(), Some("C1"));
    }

    #[test]
    fn test_persist_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("attestation.json");
        let err = AttestationRecord::new(lookup(), "C1").persist(&path).unwrap_err();
        assert!(matches!(err, AttestError::Persistence { .. }));
    }

    #[tokio::test]
    async fn test_finalize_looks_up_recorded_identifiers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attestation.json");
        let mock = MockNetwork::new()
            .with_events(vec![LifecycleEvent::IncludedInBlock {
                attestation_id: "0xA1".to_string(),
                leaf_digest: "0xD1".to_string(),
            }])
            .with_lookup(Value::Object(lookup()));
        let calls = mock.calls();
        let session = Session::start()
            .with_network(mock)
            .with_account(Some(&Credential::new("secret")))
            .await
            .unwrap();

        let confirmation = Confirmation {
            attestation_id: "0xA1".to_string(),
            leaf_digest: "0xD1".to_string(),
            confirmation_id: "C1".to_string(),
        };
        let record = AttestationFinalizer::new(&session, &path, Duration::from_secs(5))
            .finalize(&confirmation)
            .await
            .unwrap();

        assert_eq!(record.attestation_id(), Some("C1"));
        assert_eq!(AttestationRecord::load(&path).unwrap(), record);
        assert_eq!(MockCalls::get(&calls.proof_of_event), 1);
    }

    #[tokio::test]
    async fn test_unknown_identifiers_fail_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attestation.json");
        let session = Session::start()
            .with_network(MockNetwork::default())
            .with_account(Some(&Credential::new("secret")))
            .await
            .unwrap();

        let confirmation = Confirmation {
            attestation_id: "404".to_string(),
            leaf_digest: "0x00".to_string(),
            confirmation_id: "404".to_string(),
        };
        let err = AttestationFinalizer::new(&session, &path, Duration::from_secs(5))
            .finalize(&confirmation)
            .await
            .unwrap_err();

        assert!(matches!(err, AttestError::Lookup(_)));
        assert!(!path.exists());
    }

    /// Connects, but never answers a lookup.
    struct StalledLookup;

    #[async_trait::async_trait]
    impl AttestationNetwork for StalledLookup {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn connect(&mut self, _credential: &Credential) -> Result<()> {
            Ok(())
        }

        async fn submit(&self, _request: VerifyRequest) -> Result<Submission> {
            Err(AttestError::Submission("not used".to_string()))
        }

        async fn proof_of_event(&self, _: &str, _: &str) -> Result<ProofOfEvent> {
            std::future::pending().await
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_lookup_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attestation.json");
        let session = Session::start()
            .with_network(StalledLookup)
            .with_account(Some(&Credential::new("secret")))
            .await
            .unwrap();

        let confirmation = Confirmation {
            attestation_id: "0xA1".to_string(),
            leaf_digest: "0xD1".to_string(),
            confirmation_id: "C1".to_string(),
        };
        let err = AttestationFinalizer::new(&session, &path, Duration::from_millis(50))
            .finalize(&confirmation)
            .await
            .unwrap_err();

        assert!(matches!(err, AttestError::Timeout { operation: "confirmation lookup", .. }));
        assert!(!path.exists());
    }
}
