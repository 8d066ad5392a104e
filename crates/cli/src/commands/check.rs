use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use zkv_sdk::config::DEFAULT_PROOF_PATH;
use zkv_sdk::proof::hex_prefixed;
use zkv_sdk::{ProofBundle, ProofFile, ProtocolVersion};

#[derive(Parser, Debug)]
#[command(name = "check", about = "Validate a proof document without submitting it")]
pub struct CheckCmd {
    #[clap(long, env = "ZKV_PROOF_PATH", default_value = DEFAULT_PROOF_PATH)]
    pub proof: PathBuf,
    #[clap(long = "proof-version", default_value = "V1_2")]
    pub version: ProtocolVersion,
}

impl CheckCmd {
    pub fn load(&self) -> Result<ProofBundle> {
        Ok(ProofFile::load(&self.proof)?.into_bundle(self.version)?)
    }

    pub fn run(&self) -> Result<()> {
        let bundle = self.load()?;
        println!("proof:         {} bytes", bundle.proof().len());
        println!("image id:      {}", hex_prefixed(bundle.verification_key()));
        println!("public inputs: {}", bundle.public_inputs().len());
        println!("version:       {}", bundle.version());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_valid_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proof.json");
        ProofFile::new(&[1, 2, 3, 4], &[5], [6u8; 32]).save(&path).unwrap();

        let cmd = CheckCmd { proof: path, version: ProtocolVersion::V1_2 };
        let bundle = cmd.load().unwrap();
        assert_eq!(bundle.proof().len(), 4);
        cmd.run().unwrap();
    }

    #[test]
    fn test_check_rejects_short_image_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proof.json");
        std::fs::write(&path, r#"{"proof":"0x01","pub_inputs":"0x","image_id":"0x01"}"#).unwrap();

        let cmd = CheckCmd { proof: path, version: ProtocolVersion::V1_2 };
        assert!(cmd.run().is_err());
    }
}
