//! AppForge generator infrastructure adapter.
//!
//! Implements the [`applet::Generator`] trait for OpenRouter's
//! OpenAI-compatible chat-completions API. Other providers are added as new
//! modules in this crate without any change to the `applet` crate.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP transport, request formatting, response decoding
//! and status mapping live here. The [`applet`] crate sees only
//! [`applet::Generator`].
//!
//! One call per invocation: nothing here retries. Truncation is reported as
//! [`applet::FinishReason::Truncated`], never as an error.

pub mod openrouter;
mod wire;

pub use openrouter::{OpenRouterConfig, OpenRouterProvider, DEFAULT_BASE_URL};
