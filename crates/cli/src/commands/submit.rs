use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use yansi::Paint;
use zkv_sdk::config::MIN_POLL_INTERVAL;
use zkv_sdk::utils::block_on;
use zkv_sdk::{workflow, AttestConfig, NetworkTarget, ProtocolVersion};

/// Submit a proof for verification and persist its attestation.
///
/// Settings not given on the command line are read from the environment; the account secret
/// always comes from `SEED_PHRASE`.
#[derive(Parser, Debug)]
#[command(name = "submit", about = "Submit a proof to zkVerify and save its attestation")]
pub struct SubmitCmd {
    #[clap(long, help = "Proof document to submit [env: ZKV_PROOF_PATH] [default: proof.json]")]
    pub proof: Option<PathBuf>,
    #[clap(
        long,
        help = "Where to write the attestation [env: ZKV_ATTESTATION_PATH] [default: attestation.json]"
    )]
    pub output: Option<PathBuf>,
    #[clap(long, help = "'testnet', 'mock' or a gateway URL [env: ZKV_NETWORK]")]
    pub network: Option<NetworkTarget>,
    #[clap(long = "proof-version", help = "RISC Zero receipt version, e.g. V1_2")]
    pub version: Option<ProtocolVersion>,
    #[clap(long, help = "Milliseconds between job status polls")]
    pub poll_interval_ms: Option<u64>,
    #[clap(long, help = "Seconds to wait for the attestation to be confirmed")]
    pub timeout_secs: Option<u64>,
    #[clap(long, help = "Seconds to wait for the confirmation lookup")]
    pub lookup_timeout_secs: Option<u64>,
}

impl SubmitCmd {
    /// The environment configuration with the command line flags applied on top.
    pub fn config(&self) -> Result<AttestConfig> {
        let mut config = AttestConfig::from_env()?;
        if let Some(proof) = &self.proof {
            config.proof_path = proof.clone();
        }
        if let Some(output) = &self.output {
            config.attestation_path = output.clone();
        }
        if let Some(network) = &self.network {
            config.network = network.clone();
        }
        if let Some(version) = self.version {
            config.protocol_version = version;
        }
        if let Some(ms) = self.poll_interval_ms {
            config.poll_interval = Duration::from_millis(ms.max(MIN_POLL_INTERVAL));
        }
        if let Some(secs) = self.timeout_secs {
            config.submission_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.lookup_timeout_secs {
            config.lookup_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    pub fn run(&self) -> Result<()> {
        let config = self.config()?;
        let record = block_on(workflow::attest(&config))
            .context("failed to start the async runtime")?
            .with_context(|| format!("attesting {}", config.proof_path.display()))?;

        println!(
            "{} attestation {} written to {}",
            "Success:".green().bold(),
            record.attestation_id().unwrap_or("<unknown>"),
            config.attestation_path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_environment() {
        let cmd = SubmitCmd::try_parse_from([
            "submit",
            "--proof",
            "health_factor/proof.json",
            "--output",
            "out/attestation.json",
            "--network",
            "mock",
            "--proof-version",
            "V1_1",
            "--poll-interval-ms",
            "1",
            "--timeout-secs",
            "30",
        ])
        .unwrap();
        let config = cmd.config().unwrap();

        assert_eq!(config.proof_path, PathBuf::from("health_factor/proof.json"));
        assert_eq!(config.attestation_path, PathBuf::from("out/attestation.json"));
        assert_eq!(config.network, NetworkTarget::Mock);
        assert_eq!(config.protocol_version, ProtocolVersion::V1_1);
        assert_eq!(config.poll_interval, Duration::from_millis(MIN_POLL_INTERVAL));
        assert_eq!(config.submission_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_rejects_unknown_network_and_version() {
        assert!(SubmitCmd::try_parse_from(["submit", "--network", "mainnet"]).is_err());
        assert!(SubmitCmd::try_parse_from(["submit", "--proof-version", "V3"]).is_err());
    }
}
