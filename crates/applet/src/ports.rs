//! Port traits implemented by infrastructure crates.
//!
//! The orchestration layer depends only on these traits, so any concrete
//! provider or store can be substituted without touching the parser or the
//! coordinator.

use async_trait::async_trait;

use crate::{AppRecord, ArtifactIdentity, Prompt, ProviderError, RawGeneratorResponse};

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// An external text generator: prompt in, raw text out.
///
/// Implementations perform exactly one provider call per invocation and never
/// retry. They report truncation through [`crate::FinishReason::Truncated`]
/// rather than as an error, so the orchestrator can message it distinctly.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Sends `prompt` to the provider and returns its text.
    ///
    /// # Errors
    ///
    /// Any [`ProviderError`]; a missing credential is
    /// [`ProviderError::MissingCredential`].
    async fn complete(&self, prompt: &Prompt) -> Result<RawGeneratorResponse, ProviderError>;
}

// ---------------------------------------------------------------------------
// App store
// ---------------------------------------------------------------------------

/// Key-value storage of applied artifacts, keyed by identity.
///
/// Written by the update coordinator only on an explicit apply or right after
/// a successful create.
pub trait AppStore: Send + Sync {
    /// Returns the stored record for `identity`, if any.
    fn load(&self, identity: &ArtifactIdentity) -> Option<AppRecord>;

    /// Inserts or replaces the record for `record.identity`.
    fn save(&self, record: AppRecord);
}
