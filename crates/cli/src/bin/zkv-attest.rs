use anyhow::Result;
use clap::{Parser, Subcommand};
use zkv_cli::{
    commands::{check::CheckCmd, show::ShowCmd, submit::SubmitCmd},
    ZKV_VERSION_MESSAGE,
};
use zkv_sdk::setup_logger;

#[derive(Parser)]
#[command(name = "zkv-attest", author, about, long_about = None, version = ZKV_VERSION_MESSAGE)]
pub struct AttestCli {
    #[command(subcommand)]
    pub command: AttestCliCommands,
}

#[derive(Subcommand)]
pub enum AttestCliCommands {
    Submit(SubmitCmd),
    Check(CheckCmd),
    Show(ShowCmd),
}

fn main() -> Result<()> {
    setup_logger();
    let args = AttestCli::parse();

    match args.command {
        AttestCliCommands::Submit(cmd) => cmd.run(),
        AttestCliCommands::Check(cmd) => cmd.run(),
        AttestCliCommands::Show(cmd) => cmd.run(),
    }
}
