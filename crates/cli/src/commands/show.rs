use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use zkv_sdk::config::DEFAULT_ATTESTATION_PATH;
use zkv_sdk::AttestationRecord;

#[derive(Parser, Debug)]
#[command(name = "show", about = "Print a saved attestation")]
pub struct ShowCmd {
    #[clap(long, env = "ZKV_ATTESTATION_PATH", default_value = DEFAULT_ATTESTATION_PATH)]
    pub path: PathBuf,
}

impl ShowCmd {
    pub fn run(&self) -> Result<()> {
        let record = AttestationRecord::load(&self.path)?;
        println!("{}", serde_json::to_string_pretty(record.fields())?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_show_saved_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attestation.json");
        let lookup = json!({ "root": "0x00" }).as_object().cloned().unwrap();
        AttestationRecord::new(lookup, "C1").persist(&path).unwrap();

        ShowCmd { path }.run().unwrap();
    }

    #[test]
    fn test_show_missing_record() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ShowCmd { path: dir.path().join("absent.json") }.run().is_err());
    }
}
