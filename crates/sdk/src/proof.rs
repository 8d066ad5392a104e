use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::error::{AttestError, Result};

/// Size of a RISC Zero image id in bytes (eight little-endian `u32` words).
pub const IMAGE_ID_LEN: usize = 32;

/// The proof families the verifier pallet accepts from this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProofSystem {
    #[default]
    #[strum(serialize = "risc0")]
    Risc0,
}

/// The RISC Zero receipt format version the proof was produced with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize)]
pub enum ProtocolVersion {
    V1_0,
    V1_1,
    #[default]
    V1_2,
}

impl ProtocolVersion {
    /// Parses a version tag such as `V1_2`.
    pub fn parse(tag: &str) -> Result<Self> {
        tag.parse()
            .map_err(|_| AttestError::Submission(format!("unrecognized protocol version `{tag}`")))
    }
}

/// Public inputs as they appear in `proof.json`: either the hex-encoded journal or an ordered
/// list of hex values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PublicInputs {
    Single(String),
    Sequence(Vec<String>),
}

impl PublicInputs {
    fn values(&self) -> Vec<&str> {
        match self {
            PublicInputs::Single(value) => vec![value.as_str()],
            PublicInputs::Sequence(values) => values.iter().map(String::as_str).collect(),
        }
    }
}

/// The on-disk proof document written by the host program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProofFile {
    pub proof: String,
    pub pub_inputs: PublicInputs,
    pub image_id: String,
}

impl ProofFile {
    /// Builds the document from raw bytes, hex-encoding every field with a `0x` prefix.
    pub fn new(proof: &[u8], journal: &[u8], image_id: [u8; IMAGE_ID_LEN]) -> Self {
        Self {
            proof: hex_prefixed(proof),
            pub_inputs: PublicInputs::Single(hex_prefixed(journal)),
            image_id: hex_prefixed(&image_id),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| AttestError::ProofInput(format!("{}: {e}", path.display())))?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| AttestError::ProofInput(format!("{}: {e}", path.display())))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| AttestError::persistence(path, e))?;
        serde_json::to_writer_pretty(file, self).map_err(|e| AttestError::persistence(path, e))
    }

    /// Decodes the document into a [ProofBundle] tagged with `version`.
    pub fn into_bundle(self, version: ProtocolVersion) -> Result<ProofBundle> {
        let proof = decode_hex("proof", &self.proof)?;
        let image_id = decode_hex("image_id", &self.image_id)?;
        let verification_key: [u8; IMAGE_ID_LEN] = image_id.try_into().map_err(|v: Vec<u8>| {
            AttestError::Submission(format!(
                "image_id must be {IMAGE_ID_LEN} bytes, got {}",
                v.len()
            ))
        })?;
        let public_inputs = self
            .pub_inputs
            .values()
            .into_iter()
            .map(|value| decode_hex("pub_inputs", value))
            .collect::<Result<Vec<_>>>()?;

        ProofBundle::new(proof, verification_key, public_inputs, version)
    }
}

/// A proof ready for submission. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofBundle {
    proof: Vec<u8>,
    verification_key: [u8; IMAGE_ID_LEN],
    public_inputs: Vec<Vec<u8>>,
    version: ProtocolVersion,
}

impl ProofBundle {
    pub fn new(
        proof: Vec<u8>,
        verification_key: [u8; IMAGE_ID_LEN],
        public_inputs: Vec<Vec<u8>>,
        version: ProtocolVersion,
    ) -> Result<Self> {
        if proof.is_empty() {
            return Err(AttestError::Submission("proof is empty".to_string()));
        }
        if verification_key.iter().all(|b| *b == 0) {
            return Err(AttestError::Submission("verification key is absent".to_string()));
        }
        Ok(Self { proof, verification_key, public_inputs, version })
    }

    pub fn proof(&self) -> &[u8] {
        &self.proof
    }

    pub fn verification_key(&self) -> &[u8; IMAGE_ID_LEN] {
        &self.verification_key
    }

    pub fn public_inputs(&self) -> &[Vec<u8>] {
        &self.public_inputs
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }
}

/// Hex-encodes `bytes` with a leading `0x`.
pub fn hex_prefixed(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn decode_hex(field: &str, value: &str) -> Result<Vec<u8>> {
    let digits = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")).unwrap_or(value);
    hex::decode(digits).map_err(|e| AttestError::Submission(format!("{field} is not valid hex: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_id() -> [u8; IMAGE_ID_LEN] {
        let mut id = [0u8; IMAGE_ID_LEN];
        id[0] = 0xab;
        id[31] = 0x01;
        id
    }

    #[test]
    fn test_load_producer_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proof.json");
        std::fs::write(
            &path,
            format!(
                r#"{{"proof":"0xdeadbeef","pub_inputs":"0x0102","image_id":"{}"}}"#,
                hex_prefixed(&image_id())
            ),
        )
        .unwrap();

        let bundle = ProofFile::load(&path).unwrap().into_bundle(ProtocolVersion::V1_2).unwrap();
        assert_eq!(bundle.proof(), &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(bundle.public_inputs(), &[vec![0x01, 0x02]]);
        assert_eq!(bundle.verification_key(), &image_id());
        assert_eq!(bundle.version(), ProtocolVersion::V1_2);
    }

    #[test]
    fn test_sequence_public_inputs_keep_order() {
        let file = ProofFile {
            proof: "0x01".to_string(),
            pub_inputs: PublicInputs::Sequence(vec!["0x03".to_string(), "0x01".to_string()]),
            image_id: hex_prefixed(&image_id()),
        };
        let bundle = file.into_bundle(ProtocolVersion::V1_1).unwrap();
        assert_eq!(bundle.public_inputs(), &[vec![0x03], vec![0x01]]);
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proof.json");
        std::fs::write(&path, r#"{"proof":"0x01","pub_inputs":"0x","image_id":"0x","vk":"0x"}"#)
            .unwrap();
        assert!(matches!(ProofFile::load(&path), Err(AttestError::ProofInput(_))));
    }

    #[test]
    fn test_missing_file_is_proof_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProofFile::load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, AttestError::ProofInput(_)));
    }

    #[test]
    fn test_malformed_payload_is_submission_error() {
        let short_key = ProofFile {
            proof: "0x01".to_string(),
            pub_inputs: PublicInputs::Single("0x".to_string()),
            image_id: "0x0102".to_string(),
        };
        assert!(matches!(
            short_key.into_bundle(ProtocolVersion::V1_2),
            Err(AttestError::Submission(_))
        ));

        let absent_key = ProofFile::new(&[1, 2, 3], &[], [0u8; IMAGE_ID_LEN]);
        assert!(matches!(
            absent_key.into_bundle(ProtocolVersion::V1_2),
            Err(AttestError::Submission(_))
        ));

        let bad_hex = ProofFile {
            proof: "0xzz".to_string(),
            pub_inputs: PublicInputs::Single("0x".to_string()),
            image_id: hex_prefixed(&image_id()),
        };
        assert!(matches!(bad_hex.into_bundle(ProtocolVersion::V1_2), Err(AttestError::Submission(_))));
    }

    #[test]
    fn test_protocol_version_tags() {
        assert_eq!(ProtocolVersion::parse("V1_0").unwrap(), ProtocolVersion::V1_0);
        assert_eq!(ProtocolVersion::V1_2.to_string(), "V1_2");
        assert!(matches!(ProtocolVersion::parse("V9_9"), Err(AttestError::Submission(_))));
        assert_eq!(ProofSystem::Risc0.to_string(), "risc0");
    }

    #[test]
    fn test_save_writes_producer_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proof.json");
        ProofFile::new(&[0xff], &[0x10, 0x20], image_id()).save(&path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["proof"], "0xff");
        assert_eq!(raw["pub_inputs"], "0x1020");
        assert_eq!(raw["image_id"], hex_prefixed(&image_id()));
    }
}
