//! Shared value types for the AppForge generation domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! meaningful values with invariants (e.g. aspect ratios are two positive
//! integers, a parsed artifact is never empty) and participate in domain
//! computations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ArtifactIdentity, GenerationError, ModelId};

// ---------------------------------------------------------------------------
// Operation kinds
// ---------------------------------------------------------------------------

/// The four operations the generator can be asked to perform on an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationKind {
    /// Synthesise a new artifact, either from a free-text description or from
    /// a built-in catalog entry.
    Create,
    /// Add features to an existing artifact.
    Enhance,
    /// Repair an existing artifact the user is frustrated with.
    Fix,
    /// Apply a free-text user command to an existing artifact.
    Customize,
}

impl OperationKind {
    /// Returns `true` for operations that rewrite an existing artifact.
    ///
    /// Results of these operations are staged rather than applied in place.
    pub fn modifies_existing(self) -> bool {
        !matches!(self, Self::Create)
    }

    /// Default output budget for this operation kind.
    ///
    /// Rewrites carry the whole current artifact back, so they get the larger
    /// budget.
    pub fn default_output_budget(self) -> TokenCount {
        match self {
            Self::Create => TokenCount::new(8_000),
            Self::Enhance | Self::Fix | Self::Customize => TokenCount::new(16_000),
        }
    }

    /// Returns the wire name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Enhance => "enhance",
            Self::Fix => "fix",
            Self::Customize => "customize",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" => Ok(Self::Create),
            "enhance" => Ok(Self::Enhance),
            "fix" => Ok(Self::Fix),
            "customize" | "custom" => Ok(Self::Customize),
            other => Err(format!("unknown operation kind '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Token budgets
// ---------------------------------------------------------------------------

/// Number of tokens the generator may emit for one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenCount(u32);

impl TokenCount {
    /// Creates a [`TokenCount`] from a raw integer.
    pub fn new(count: u32) -> Self {
        Self(count)
    }

    /// Returns the underlying integer value.
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for TokenCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// Viewport aspect ratio hint in `W:H` form (e.g. `"9:16"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AspectRatio(String);

impl AspectRatio {
    /// The ratio used when a request does not provide one.
    pub const DEFAULT: &'static str = "9:16";

    /// Parses a `W:H` ratio, returning `None` unless both sides are positive
    /// integers.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let v = value.into();
        let (w, h) = v.trim().split_once(':')?;
        let w: u32 = w.trim().parse().ok()?;
        let h: u32 = h.trim().parse().ok()?;
        if w == 0 || h == 0 {
            return None;
        }
        Some(Self(format!("{w}:{h}")))
    }

    /// Returns the ratio as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AspectRatio {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value.clone()).ok_or_else(|| format!("invalid aspect ratio '{value}'"))
    }
}

impl From<AspectRatio> for String {
    fn from(value: AspectRatio) -> Self {
        value.0
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Minimum length of a free-text description for a create request.
pub const MIN_DESCRIPTION_CHARS: usize = 10;

/// The caller-supplied material an operation works from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "camelCase")]
pub enum OperationInputs {
    /// Create a new artifact from a free-text description.
    #[serde(rename_all = "camelCase")]
    Describe {
        /// What the user wants the app to do.
        description: String,
        /// Name to use instead of the generated one.
        suggested_name: Option<String>,
    },
    /// Create the built-in catalog app named by the artifact identity.
    Catalog,
    /// Rewrite an existing artifact.
    #[serde(rename_all = "camelCase")]
    Modify {
        /// Markup of the artifact as the user currently sees it.
        current_artifact: String,
        /// Free-text instruction; required for [`OperationKind::Customize`].
        command: Option<String>,
    },
}

/// An immutable, validated request for one generator operation.
///
/// Built with [`GenerationRequest::new`] and the `with_*` adjusters; once handed
/// to the orchestrator it is never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    kind: OperationKind,
    identity: ArtifactIdentity,
    inputs: OperationInputs,
    model: ModelId,
    aspect_ratio: AspectRatio,
    max_output_tokens: TokenCount,
}

impl GenerationRequest {
    /// Validates that `inputs` fit `kind` and builds a request with default
    /// model, aspect ratio, and output budget.
    ///
    /// # Errors
    ///
    /// [`GenerationError::Validation`] when:
    /// - a create-from-description has fewer than [`MIN_DESCRIPTION_CHARS`]
    ///   characters of description;
    /// - a create is given an existing artifact, or a rewrite is not;
    /// - the current artifact is blank;
    /// - a customize has no command.
    pub fn new(
        kind: OperationKind,
        identity: ArtifactIdentity,
        inputs: OperationInputs,
    ) -> Result<Self, GenerationError> {
        match (kind, &inputs) {
            (OperationKind::Create, OperationInputs::Describe { description, .. }) => {
                if description.trim().chars().count() < MIN_DESCRIPTION_CHARS {
                    return Err(GenerationError::validation(format!(
                        "Description must be at least {MIN_DESCRIPTION_CHARS} characters"
                    )));
                }
            }
            (OperationKind::Create, OperationInputs::Catalog) => {}
            (OperationKind::Create, OperationInputs::Modify { .. }) => {
                return Err(GenerationError::validation(
                    "Create does not take a current artifact",
                ));
            }
            (_, OperationInputs::Modify { current_artifact, command }) => {
                if current_artifact.trim().is_empty() {
                    return Err(GenerationError::validation("Current artifact is required"));
                }
                let has_command = command.as_deref().is_some_and(|c| !c.trim().is_empty());
                if kind == OperationKind::Customize && !has_command {
                    return Err(GenerationError::validation(
                        "Current artifact and command are required",
                    ));
                }
            }
            (_, _) => {
                return Err(GenerationError::validation(format!(
                    "{kind} requires the current artifact"
                )));
            }
        }

        Ok(Self {
            kind,
            identity,
            inputs,
            model: ModelId::default_model(),
            aspect_ratio: AspectRatio::default(),
            max_output_tokens: kind.default_output_budget(),
        })
    }

    /// Overrides the generator model.
    #[must_use]
    pub fn with_model(mut self, model: ModelId) -> Self {
        self.model = model;
        self
    }

    /// Overrides the layout hint.
    #[must_use]
    pub fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    /// Overrides the output budget.
    #[must_use]
    pub fn with_max_output_tokens(mut self, max_output_tokens: TokenCount) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn identity(&self) -> &ArtifactIdentity {
        &self.identity
    }

    pub fn inputs(&self) -> &OperationInputs {
        &self.inputs
    }

    pub fn model(&self) -> &ModelId {
        &self.model
    }

    pub fn aspect_ratio(&self) -> &AspectRatio {
        &self.aspect_ratio
    }

    pub fn max_output_tokens(&self) -> TokenCount {
        self.max_output_tokens
    }

    /// Returns `true` when the generator must also emit NAME and ICON sections.
    pub fn expects_identity_sections(&self) -> bool {
        matches!(self.inputs, OperationInputs::Describe { .. })
    }
}

// ---------------------------------------------------------------------------
// Generator output
// ---------------------------------------------------------------------------

/// Why the generator stopped emitting text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The generator finished on its own.
    Complete,
    /// The output hit the token budget ceiling.
    Truncated,
    /// The provider reported a failure mid-generation.
    Error,
}

/// Opaque text produced by the generator plus its terminal reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawGeneratorResponse {
    pub text: String,
    pub finish: FinishReason,
}

impl RawGeneratorResponse {
    pub fn new(text: impl Into<String>, finish: FinishReason) -> Self {
        Self {
            text: text.into(),
            finish,
        }
    }

    /// A response that finished normally.
    pub fn complete(text: impl Into<String>) -> Self {
        Self::new(text, FinishReason::Complete)
    }
}

/// Structured fields extracted from a generator response.
///
/// `artifact` is never empty. [`crate::response::parse`] checks completeness
/// on the markup as generated, before a bare fragment gets the canonical
/// `<!DOCTYPE html>` prefix, so a prefixed fragment need not contain
/// `</html>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedResult {
    pub description: String,
    pub artifact: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A staged, not-yet-applied generation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingUpdate {
    pub identity: ArtifactIdentity,
    pub result: ParsedResult,
    pub staged_at: Timestamp,
}

/// The persisted form of one mini-app, owned by the [`crate::AppStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppRecord {
    pub identity: ArtifactIdentity,
    pub artifact: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl AppRecord {
    /// Builds a record from a parsed result.
    pub fn from_result(identity: ArtifactIdentity, result: ParsedResult) -> Self {
        Self {
            identity,
            artifact: result.artifact,
            description: result.description,
            name: result.name,
            icon: result.icon,
        }
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ArtifactIdentity {
        ArtifactIdentity::new(s).unwrap()
    }

    #[test]
    fn aspect_ratio_requires_two_positive_integers() {
        assert_eq!(AspectRatio::new(" 16 : 9 ").unwrap().as_str(), "16:9");
        assert!(AspectRatio::new("0:9").is_none());
        assert!(AspectRatio::new("wide").is_none());
        assert!(AspectRatio::new("4:x").is_none());
    }

    #[test]
    fn short_description_is_rejected() {
        let err = GenerationRequest::new(
            OperationKind::Create,
            id("Weather"),
            OperationInputs::Describe {
                description: "  tiny   ".into(),
                suggested_name: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, GenerationError::Validation { .. }));
    }

    #[test]
    fn customize_requires_command() {
        let err = GenerationRequest::new(
            OperationKind::Customize,
            id("Notes"),
            OperationInputs::Modify {
                current_artifact: "<html></html>".into(),
                command: Some("   ".into()),
            },
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: Current artifact and command are required"
        );
    }

    #[test]
    fn rewrite_requires_current_artifact() {
        assert!(GenerationRequest::new(OperationKind::Enhance, id("Notes"), OperationInputs::Catalog).is_err());
        assert!(GenerationRequest::new(
            OperationKind::Fix,
            id("Notes"),
            OperationInputs::Modify {
                current_artifact: " \n".into(),
                command: None,
            },
        )
        .is_err());
    }

    #[test]
    fn defaults_follow_operation_kind() {
        let create = GenerationRequest::new(OperationKind::Create, id("Clock"), OperationInputs::Catalog).unwrap();
        assert_eq!(create.max_output_tokens(), TokenCount::new(8_000));
        assert_eq!(create.aspect_ratio().as_str(), "9:16");
        assert_eq!(create.model().as_str(), ModelId::DEFAULT);
        assert!(!create.expects_identity_sections());

        let fix = GenerationRequest::new(
            OperationKind::Fix,
            id("Clock"),
            OperationInputs::Modify {
                current_artifact: "<html></html>".into(),
                command: None,
            },
        )
        .unwrap();
        assert_eq!(fix.max_output_tokens(), TokenCount::new(16_000));
    }

    #[test]
    fn kind_parses_from_wire_names() {
        assert_eq!("Customize".parse::<OperationKind>().unwrap(), OperationKind::Customize);
        assert_eq!("custom".parse::<OperationKind>().unwrap(), OperationKind::Customize);
        assert!("delete".parse::<OperationKind>().is_err());
    }
}
