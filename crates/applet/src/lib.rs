//! Core generation domain for AppForge.
//!
//! This crate contains every domain concept, newtype identifier, shared value
//! type, and error type used to turn a user's request into a mini-app
//! artifact. Infrastructure crates implement the traits defined here; they
//! never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype domain identifiers (`ArtifactIdentity`, `ModelId`, `OperationId`) |
//! | [`types`] | Shared value types (`GenerationRequest`, `ParsedResult`, `AppRecord`, etc.) |
//! | [`errors`] | Error taxonomy and retry-policy types |
//! | [`ports`] | `Generator` and `AppStore` traits |
//! | [`prompt`] | Operation-specific prompt composition |
//! | [`response`] | Wire-contract parser and completeness validator |
//! | [`catalog`] | Built-in starter apps |
//! | [`operation`] | JSON request/response shapes of the operation endpoint |

pub mod catalog;
pub mod errors;
pub mod identifiers;
pub mod operation;
pub mod ports;
pub mod prompt;
pub mod response;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use errors::{GenerationError, MalformedReason, ParseError, ProviderError, RetryPolicy};
pub use identifiers::{ArtifactIdentity, ModelId, OperationId};
pub use operation::{OperationFailure, OperationRequest, OperationResponse};
pub use ports::{AppStore, Generator};
pub use prompt::Prompt;
pub use response::ParseContext;
pub use types::{
    AppRecord, AspectRatio, FinishReason, GenerationRequest, OperationInputs, OperationKind,
    ParsedResult, PendingUpdate, RawGeneratorResponse, Timestamp, TokenCount,
};
