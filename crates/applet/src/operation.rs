//! JSON shapes of the operation endpoint.
//!
//! ```text
//! in:  { operationKind, artifactIdentity, description?, suggestedName?,
//!        currentArtifact?, command?, model?, aspectRatio? }
//! out: { artifact, description, name?, icon? } | { error, details? }
//! ```
//!
//! `appName` and `currentHtml` are accepted as aliases for older clients.

use serde::{Deserialize, Serialize};

use crate::{
    ArtifactIdentity, AspectRatio, GenerationError, GenerationRequest, ModelId, OperationInputs,
    OperationKind, ParsedResult, ProviderError,
};

/// Body of an operation request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRequest {
    #[serde(default)]
    pub operation_kind: Option<OperationKind>,
    #[serde(default, alias = "appName")]
    pub artifact_identity: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub suggested_name: Option<String>,
    #[serde(default, alias = "currentHtml")]
    pub current_artifact: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
}

impl OperationRequest {
    /// Validates the body and builds the domain request.
    ///
    /// `implied_kind` is the kind fixed by the route, if any; it wins over
    /// `operationKind`. A create without a description is a catalog create.
    ///
    /// # Errors
    ///
    /// [`GenerationError::Validation`] for a missing kind or identity, an
    /// unparseable aspect ratio, or any rule of [`GenerationRequest::new`].
    pub fn into_generation_request(
        self,
        implied_kind: Option<OperationKind>,
    ) -> Result<GenerationRequest, GenerationError> {
        let kind = implied_kind
            .or(self.operation_kind)
            .ok_or_else(|| GenerationError::validation("operationKind is required"))?;

        let identity = self
            .artifact_identity
            .and_then(ArtifactIdentity::new)
            .ok_or_else(|| GenerationError::validation("artifactIdentity is required"))?;

        let description = non_blank(self.description);
        let inputs = match kind {
            OperationKind::Create => match description {
                Some(description) => OperationInputs::Describe {
                    description,
                    suggested_name: non_blank(self.suggested_name),
                },
                None => OperationInputs::Catalog,
            },
            _ => OperationInputs::Modify {
                current_artifact: self.current_artifact.unwrap_or_default(),
                command: non_blank(self.command),
            },
        };

        let mut request = GenerationRequest::new(kind, identity, inputs)?;

        if let Some(model) = self.model.and_then(ModelId::new) {
            request = request.with_model(model);
        }
        if let Some(raw) = non_blank(self.aspect_ratio) {
            let ratio = AspectRatio::new(raw.as_str()).ok_or_else(|| {
                GenerationError::validation(format!("invalid aspect ratio '{raw}'"))
            })?;
            request = request.with_aspect_ratio(ratio);
        }
        Ok(request)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Successful operation response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResponse {
    pub artifact: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl From<ParsedResult> for OperationResponse {
    fn from(result: ParsedResult) -> Self {
        Self {
            artifact: result.artifact,
            description: result.description,
            name: result.name,
            icon: result.icon,
        }
    }
}

/// Failed operation response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationFailure {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl From<&GenerationError> for OperationFailure {
    fn from(err: &GenerationError) -> Self {
        match err {
            GenerationError::Provider(
                ProviderError::Transport { message } | ProviderError::InvalidResponse { message },
            ) => Self {
                error: "Failed to generate app".to_string(),
                details: Some(message.clone()),
            },
            other => Self {
                error: other.to_string(),
                details: None,
            },
        }
    }
}
