use crate::error::Result;
use crate::network::{Submission, VerifyRequest, WaitFor};
use crate::proof::{ProofBundle, ProofSystem};
use crate::session::Session;

/// Builder to prepare and configure the submission of a proof for verification.
/// May be run with [Self::execute].
pub struct Verify<'a> {
    session: &'a Session,
    proof_system: ProofSystem,
    wait_for: WaitFor,
}

impl<'a> Verify<'a> {
    /// Prepare to submit a proof through `session`.
    ///
    /// Prefer using [Session::verify].
    pub fn new(session: &'a Session) -> Self {
        Self { session, proof_system: ProofSystem::default(), wait_for: WaitFor::default() }
    }

    /// Verify the proof with the RISC Zero verifier. This is the default.
    pub fn risc0(mut self) -> Self {
        self.proof_system = ProofSystem::Risc0;
        self
    }

    /// Resolve the transaction result once the proof is included in a block.
    pub fn wait_for_inclusion(mut self) -> Self {
        self.wait_for = WaitFor::IncludedInBlock;
        self
    }

    /// Resolve the transaction result once the block is finalized. This is the default.
    pub fn wait_for_finalization(mut self) -> Self {
        self.wait_for = WaitFor::Finalized;
        self
    }

    /// Resolve the transaction result only once an attestation containing the proof has been
    /// published.
    pub fn wait_for_published_attestation(mut self) -> Self {
        self.wait_for = WaitFor::PublishedAttestation;
        self
    }

    /// Submit `bundle`, consuming the built action `self`.
    ///
    /// The returned [Submission] must be driven by the caller: its events arrive asynchronously
    /// and its transaction result should be awaited to surface rejections.
    pub async fn execute(self, bundle: ProofBundle) -> Result<Submission> {
        let Self { session, proof_system, wait_for } = self;
        tracing::info!(
            "submitting {proof_system} proof ({}) for verification, waiting for {wait_for:?}",
            bundle.version()
        );
        session.network().submit(VerifyRequest { proof_system, wait_for, bundle }).await
    }
}
