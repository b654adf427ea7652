//! The generation orchestrator.
//!
//! Turns one [`GenerationRequest`] into one [`ParsedResult`]: compose the
//! prompt, call the generator under a hard deadline, refuse truncated output,
//! parse and validate the text, and fill in name and icon for creates.
//!
//! The orchestrator touches neither the app store nor coordinator state, so it
//! can be exercised on its own with a stub [`Generator`].

use std::sync::Arc;
use std::time::Duration;

use applet::response::{self, ParseContext};
use applet::{
    catalog, prompt, FinishReason, GenerationError, GenerationRequest, Generator,
    OperationInputs, ParsedResult, ProviderError,
};

/// Longest generated name kept in a result.
pub const MAX_NAME_CHARS: usize = 50;

/// Name used when a create-from-description yields none.
pub const FALLBACK_NAME: &str = "Custom App";

/// Icon used when a create-from-description yields none.
pub const FALLBACK_ICON: &str = "✨";

/// Drives single generator operations.
pub struct Orchestrator {
    generator: Arc<dyn Generator>,
    timeout: Duration,
}

impl Orchestrator {
    /// Deadline applied when none is configured.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self {
            generator,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Overrides the generator deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs `request` against the generator.
    ///
    /// # Errors
    ///
    /// - [`GenerationError::Configuration`] when the provider has no credential.
    /// - [`GenerationError::Timeout`] when the deadline expires.
    /// - [`GenerationError::Truncated`] when the output hit the budget ceiling.
    /// - [`GenerationError::Provider`] for every other provider failure,
    ///   including an empty response.
    /// - [`GenerationError::Parse`] when the text breaks the wire contract.
    #[tracing::instrument(
        name = "orchestrator.generate",
        skip_all,
        fields(
            identity = %request.identity(),
            kind = %request.kind(),
            model = %request.model(),
        )
    )]
    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<ParsedResult, GenerationError> {
        let prompt = prompt::compose(request);

        let raw = match tokio::time::timeout(self.timeout, self.generator.complete(&prompt)).await
        {
            Err(_) => {
                tracing::warn!(timeout = ?self.timeout, "generator deadline expired");
                return Err(GenerationError::Timeout {
                    after: self.timeout,
                });
            }
            Ok(Err(ProviderError::MissingCredential)) => {
                return Err(GenerationError::configuration("API key not configured"));
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "generator call failed");
                return Err(err.into());
            }
            Ok(Ok(raw)) => raw,
        };

        match raw.finish {
            FinishReason::Complete => {}
            FinishReason::Truncated => {
                tracing::warn!(
                    max_output_tokens = %request.max_output_tokens(),
                    "generator output truncated at budget ceiling"
                );
                return Err(GenerationError::Truncated);
            }
            FinishReason::Error => {
                return Err(ProviderError::Upstream {
                    status: None,
                    message: "generation ended with a provider error".to_string(),
                }
                .into());
            }
        }

        let text = raw.text.trim();
        if text.is_empty() {
            return Err(ProviderError::EmptyContent.into());
        }

        let mut parsed = response::parse(text, &ParseContext::for_request(request)).map_err(|e| {
            tracing::warn!(error = %e, "generator output rejected");
            GenerationError::from(e)
        })?;
        finalize_identity(request, &mut parsed);

        tracing::info!(artifact_bytes = parsed.artifact.len(), "generation succeeded");
        Ok(parsed)
    }
}

/// Fills in name and icon for creates; rewrites carry neither.
fn finalize_identity(request: &GenerationRequest, parsed: &mut ParsedResult) {
    match request.inputs() {
        OperationInputs::Describe { suggested_name, .. } => {
            let name = suggested_name
                .clone()
                .or_else(|| parsed.name.take())
                .unwrap_or_else(|| FALLBACK_NAME.to_string());
            parsed.name = Some(name.chars().take(MAX_NAME_CHARS).collect());
            if parsed.icon.as_deref().map_or(true, str::is_empty) {
                parsed.icon = Some(FALLBACK_ICON.to_string());
            }
        }
        OperationInputs::Catalog => {
            let name = request.identity().as_str();
            parsed.name = Some(name.to_string());
            parsed.icon = Some(catalog::icon(name).to_string());
        }
        OperationInputs::Modify { .. } => {
            parsed.name = None;
            parsed.icon = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{document, ScriptedGenerator, SlowGenerator};
    use applet::{
        ArtifactIdentity, OperationKind, ParseError, RawGeneratorResponse, TokenCount,
    };

    fn describe(description: &str, suggested: Option<&str>) -> GenerationRequest {
        GenerationRequest::new(
            OperationKind::Create,
            ArtifactIdentity::new("custom-1").unwrap(),
            OperationInputs::Describe {
                description: description.into(),
                suggested_name: suggested.map(Into::into),
            },
        )
        .unwrap()
    }

    fn enhance(identity: &str, current: &str) -> GenerationRequest {
        GenerationRequest::new(
            OperationKind::Enhance,
            ArtifactIdentity::new(identity).unwrap(),
            OperationInputs::Modify {
                current_artifact: current.into(),
                command: None,
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn enhance_of_large_artifact_succeeds() {
        let current = format!("<html><body>{}</body></html>", "x".repeat(4_000));
        let body = document("enhanced calculator");
        let generator = ScriptedGenerator::with(vec![Ok(RawGeneratorResponse::complete(format!(
            "===DESCRIPTION===\nA better calculator.\n===END_DESCRIPTION===\n{body}"
        )))]);
        let orchestrator = Orchestrator::new(generator.clone());

        let parsed = orchestrator.generate(&enhance("calc-1", &current)).await.unwrap();

        assert_eq!(parsed.artifact, body);
        assert_eq!(parsed.description, "A better calculator.");
        let prompts = generator.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].user.contains(&current));
        assert_eq!(prompts[0].max_output_tokens, TokenCount::new(16_000));
    }

    #[tokio::test]
    async fn truncated_output_is_never_parsed() {
        let generator = ScriptedGenerator::with(vec![Ok(RawGeneratorResponse::new(
            format!("===DESCRIPTION===\nd\n===END_DESCRIPTION===\n{}", document("ok")),
            FinishReason::Truncated,
        ))]);
        let err = Orchestrator::new(generator)
            .generate(&enhance("calc-1", "<html></html>"))
            .await
            .unwrap_err();
        assert_eq!(err, GenerationError::Truncated);
    }

    #[tokio::test]
    async fn incomplete_document_is_reported_distinctly() {
        let generator = ScriptedGenerator::with(vec![Ok(RawGeneratorResponse::complete(
            "===DESCRIPTION===\nd\n===END_DESCRIPTION===\n<!DOCTYPE html><html><body>",
        ))]);
        let err = Orchestrator::new(generator)
            .generate(&enhance("calc-1", "<html></html>"))
            .await
            .unwrap_err();
        assert_eq!(err, GenerationError::Parse(ParseError::Incomplete));
    }

    #[tokio::test]
    async fn missing_credential_is_a_configuration_error() {
        let generator = ScriptedGenerator::with(vec![Err(ProviderError::MissingCredential)]);
        let err = Orchestrator::new(generator)
            .generate(&enhance("calc-1", "<html></html>"))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Configuration { .. }));
    }

    #[tokio::test]
    async fn provider_errors_pass_through() {
        let generator = ScriptedGenerator::with(vec![Err(ProviderError::QuotaExhausted)]);
        let err = Orchestrator::new(generator)
            .generate(&enhance("calc-1", "<html></html>"))
            .await
            .unwrap_err();
        assert_eq!(err, GenerationError::Provider(ProviderError::QuotaExhausted));
    }

    #[tokio::test]
    async fn blank_output_is_empty_content() {
        let generator = ScriptedGenerator::with(vec![Ok(RawGeneratorResponse::complete("  \n "))]);
        let err = Orchestrator::new(generator)
            .generate(&enhance("calc-1", "<html></html>"))
            .await
            .unwrap_err();
        assert_eq!(err, GenerationError::Provider(ProviderError::EmptyContent));
    }

    #[tokio::test]
    async fn slow_generator_times_out() {
        let orchestrator = Orchestrator::new(std::sync::Arc::new(SlowGenerator(
            Duration::from_secs(5),
        )))
        .with_timeout(Duration::from_millis(20));
        let err = orchestrator
            .generate(&enhance("calc-1", "<html></html>"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            GenerationError::Timeout {
                after: Duration::from_millis(20)
            }
        );
    }

    #[tokio::test]
    async fn create_from_description_fills_identity() {
        let long_name = "N".repeat(80);
        let generator = ScriptedGenerator::with(vec![Ok(RawGeneratorResponse::complete(format!(
            "===NAME===\n{long_name}\n===END_NAME===\n===DESCRIPTION===\nd\n===END_DESCRIPTION===\n{}",
            document("app")
        )))]);
        let parsed = Orchestrator::new(generator)
            .generate(&describe("A habit tracker with streaks", None))
            .await
            .unwrap();
        assert_eq!(parsed.name.as_deref().map(str::len), Some(MAX_NAME_CHARS));
        assert_eq!(parsed.icon.as_deref(), Some(FALLBACK_ICON));
    }

    #[tokio::test]
    async fn suggested_name_overrides_generated_one() {
        let generator = ScriptedGenerator::with(vec![Ok(RawGeneratorResponse::complete(format!(
            "===NAME===\nHabits\n===END_NAME===\n===ICON===\n📈\n===END_ICON===\n===DESCRIPTION===\nd\n===END_DESCRIPTION===\n{}",
            document("app")
        )))]);
        let parsed = Orchestrator::new(generator)
            .generate(&describe("A habit tracker with streaks", Some("Streaks")))
            .await
            .unwrap();
        assert_eq!(parsed.name.as_deref(), Some("Streaks"));
        assert_eq!(parsed.icon.as_deref(), Some("📈"));
    }

    #[tokio::test]
    async fn catalog_create_uses_catalog_icon() {
        let generator = ScriptedGenerator::with(vec![Ok(RawGeneratorResponse::complete(document("snake")))]);
        let request = GenerationRequest::new(
            OperationKind::Create,
            ArtifactIdentity::new("Snake").unwrap(),
            OperationInputs::Catalog,
        )
        .unwrap();
        let parsed = Orchestrator::new(generator).generate(&request).await.unwrap();
        assert_eq!(parsed.name.as_deref(), Some("Snake"));
        assert_eq!(parsed.icon.as_deref(), Some("🐍"));
        assert_eq!(parsed.description, "Snake app with core functionality.");
    }
}
