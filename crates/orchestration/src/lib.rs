//! AppForge orchestration: running generations and deciding where results go.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** This crate sequences calls between the domain
//! rules in the [`applet`] crate and the [`applet::Generator`] and
//! [`applet::AppStore`] ports. It contains no prompt or parsing rules of its
//! own.
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`orchestrator`] | One request in, one validated result or typed error out |
//! | [`coordinator`] | Per-artifact freshness, staging, and apply/discard |
//! | [`store`] | In-memory `AppStore` |

pub mod coordinator;
pub mod orchestrator;
pub mod store;

#[cfg(test)]
mod test_support;

pub use coordinator::{
    Completion, CoordinatorState, GenerationToken, OperationHandle, UpdateCoordinator,
};
pub use orchestrator::Orchestrator;
pub use store::InMemoryAppStore;
