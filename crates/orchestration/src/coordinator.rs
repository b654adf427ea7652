//! Per-artifact update coordination.
//!
//! Generation is slow and the user keeps moving while it runs. The
//! [`UpdateCoordinator`] decides what happens to each result when it lands:
//!
//! | Result for | Outcome |
//! |------------|---------|
//! | a superseded operation | [`Completion::Discarded`], nothing changes |
//! | a successful create | written to the store immediately |
//! | a successful rewrite | staged as a [`PendingUpdate`] until applied |
//! | any failure | recorded and surfaced, the stored app is untouched |
//!
//! ## State per artifact
//!
//! ```text
//! Idle ──start──▶ InFlight ──finish(ok, rewrite)──▶ PendingApply ──apply──▶ Idle
//!                    │    └──finish(ok, create)──▶ Idle (saved)
//!                    └──finish(err)──▶ Failed ──discard──▶ Idle
//! ```
//!
//! Starting an operation always replaces whatever the slot held. Every check
//! and transition happens under one lock so a stale result can never overwrite
//! a fresher one.

use std::collections::HashMap;
use std::sync::Arc;

use applet::{
    AppRecord, AppStore, ArtifactIdentity, GenerationError, GenerationRequest, OperationId,
    OperationKind, ParsedResult, PendingUpdate, Timestamp,
};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::Instrument;

use crate::Orchestrator;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Freshness token handed out when an operation starts.
///
/// Tokens only ever increase; a result is accepted only while its token is
/// the latest one issued for its artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct GenerationToken(u64);

impl GenerationToken {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Externally visible state of one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CoordinatorState {
    Idle,
    InFlight,
    PendingApply,
    Failed,
}

/// What [`UpdateCoordinator::finish`] did with a result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum Completion {
    /// The result belonged to a superseded operation.
    Discarded,
    /// A create was written straight to the store.
    Applied { record: AppRecord },
    /// A rewrite is waiting for [`UpdateCoordinator::apply_pending`].
    Staged { pending: PendingUpdate },
    /// The operation failed; the stored app is unchanged.
    Failed { error: GenerationError },
}

/// A started operation.
#[derive(Debug)]
pub struct OperationHandle {
    pub identity: ArtifactIdentity,
    pub operation: OperationId,
    pub token: GenerationToken,
    task: JoinHandle<Completion>,
}

impl OperationHandle {
    /// Waits for the operation. A superseded operation yields
    /// [`Completion::Discarded`].
    pub async fn join(self) -> Completion {
        match self.task.await {
            Ok(completion) => completion,
            Err(err) => {
                if err.is_panic() {
                    tracing::error!(identity = %self.identity, "operation task panicked");
                }
                Completion::Discarded
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Slot {
    Idle,
    InFlight {
        token: GenerationToken,
        kind: OperationKind,
        abort: Option<AbortHandle>,
    },
    PendingApply(PendingUpdate),
    Failed(GenerationError),
}

impl Slot {
    fn state(&self) -> CoordinatorState {
        match self {
            Slot::Idle => CoordinatorState::Idle,
            Slot::InFlight { .. } => CoordinatorState::InFlight,
            Slot::PendingApply(_) => CoordinatorState::PendingApply,
            Slot::Failed(_) => CoordinatorState::Failed,
        }
    }
}

#[derive(Debug, Default)]
struct Slots {
    focus: Option<ArtifactIdentity>,
    by_identity: HashMap<ArtifactIdentity, Slot>,
    last_token: u64,
}

struct Shared {
    orchestrator: Arc<Orchestrator>,
    store: Arc<dyn AppStore>,
    slots: Mutex<Slots>,
}

// ---------------------------------------------------------------------------
// UpdateCoordinator
// ---------------------------------------------------------------------------

/// Owns the per-artifact state machine. Cheap to clone.
#[derive(Clone)]
pub struct UpdateCoordinator {
    shared: Arc<Shared>,
}

impl UpdateCoordinator {
    pub fn new(orchestrator: Arc<Orchestrator>, store: Arc<dyn AppStore>) -> Self {
        Self {
            shared: Arc::new(Shared {
                orchestrator,
                store,
                slots: Mutex::new(Slots::default()),
            }),
        }
    }

    /// The store results are applied to.
    pub fn store(&self) -> &Arc<dyn AppStore> {
        &self.shared.store
    }

    /// Starts `request` on the current tokio runtime.
    ///
    /// Any operation already in flight for the same artifact is superseded and
    /// its task aborted. A pending or failed result for the artifact is
    /// dropped.
    pub fn start_operation(&self, request: GenerationRequest) -> OperationHandle {
        let identity = request.identity().clone();
        let operation = OperationId::new_random();
        let token = self.begin(&identity, request.kind());

        let span = tracing::info_span!(
            "coordinator.operation",
            identity = %identity,
            kind = %request.kind(),
            operation = %operation,
            token = token.as_u64(),
        );
        let this = self.clone();
        let task_identity = identity.clone();
        let task = tokio::spawn(
            async move {
                let outcome = this.shared.orchestrator.generate(&request).await;
                this.finish(&task_identity, token, outcome)
            }
            .instrument(span),
        );

        // The task may already be done; only attach the handle if it is not.
        if let Some(Slot::InFlight {
            token: current,
            abort,
            ..
        }) = self.shared.slots.lock().by_identity.get_mut(&identity)
        {
            if *current == token {
                *abort = Some(task.abort_handle());
            }
        }

        OperationHandle {
            identity,
            operation,
            token,
            task,
        }
    }

    /// Marks `identity` in flight and returns the new token.
    ///
    /// [`Self::start_operation`] calls this; it is public for callers that run
    /// the orchestrator themselves and report back through [`Self::finish`].
    pub fn begin(&self, identity: &ArtifactIdentity, kind: OperationKind) -> GenerationToken {
        let mut slots = self.shared.slots.lock();
        slots.last_token += 1;
        let token = GenerationToken(slots.last_token);

        let previous = slots.by_identity.insert(
            identity.clone(),
            Slot::InFlight {
                token,
                kind,
                abort: None,
            },
        );
        match previous {
            Some(Slot::InFlight {
                token: old, abort, ..
            }) => {
                if let Some(handle) = abort {
                    handle.abort();
                }
                tracing::debug!(identity = %identity, superseded = old.as_u64(), "operation superseded");
            }
            Some(Slot::PendingApply(_)) => {
                tracing::debug!(identity = %identity, "pending update dropped by new operation");
            }
            _ => {}
        }
        token
    }

    /// Records the outcome of the operation holding `token`.
    ///
    /// Results whose token is no longer current are discarded without any
    /// state change.
    pub fn finish(
        &self,
        identity: &ArtifactIdentity,
        token: GenerationToken,
        outcome: Result<ParsedResult, GenerationError>,
    ) -> Completion {
        let mut slots = self.shared.slots.lock();

        let kind = match slots.by_identity.get(identity) {
            Some(Slot::InFlight {
                token: current,
                kind,
                ..
            }) if *current == token => *kind,
            _ => {
                tracing::debug!(identity = %identity, token = token.as_u64(), "stale result discarded");
                return Completion::Discarded;
            }
        };

        let (slot, completion) = match outcome {
            Ok(result) if kind == OperationKind::Create => {
                let record = AppRecord::from_result(identity.clone(), result);
                self.shared.store.save(record.clone());
                tracing::info!(identity = %identity, "created app saved");
                (Slot::Idle, Completion::Applied { record })
            }
            Ok(result) => {
                let pending = PendingUpdate {
                    identity: identity.clone(),
                    result,
                    staged_at: Timestamp::now(),
                };
                tracing::info!(identity = %identity, kind = %kind, "update staged");
                (
                    Slot::PendingApply(pending.clone()),
                    Completion::Staged { pending },
                )
            }
            Err(error) => {
                tracing::warn!(identity = %identity, kind = %kind, error = %error, "operation failed");
                (Slot::Failed(error.clone()), Completion::Failed { error })
            }
        };
        slots.by_identity.insert(identity.clone(), slot);
        completion
    }

    /// Commits the staged update for `identity`.
    ///
    /// Only the focused artifact can be applied. The stored name and icon
    /// survive a rewrite. Returns `None` when nothing was applied.
    pub fn apply_pending(&self, identity: &ArtifactIdentity) -> Option<AppRecord> {
        let mut slots = self.shared.slots.lock();
        if slots.focus.as_ref() != Some(identity) {
            tracing::debug!(identity = %identity, "apply refused, artifact not focused");
            return None;
        }

        let pending = match slots.by_identity.remove(identity) {
            Some(Slot::PendingApply(pending)) => pending,
            Some(other) => {
                slots.by_identity.insert(identity.clone(), other);
                return None;
            }
            None => return None,
        };

        let existing = self.shared.store.load(identity);
        let mut record = AppRecord::from_result(identity.clone(), pending.result);
        if let Some(existing) = existing {
            record.name = record.name.or(existing.name);
            record.icon = record.icon.or(existing.icon);
        }
        self.shared.store.save(record.clone());
        slots.by_identity.insert(identity.clone(), Slot::Idle);

        tracing::info!(identity = %identity, "pending update applied");
        Some(record)
    }

    /// Drops a staged update or a recorded failure. Returns true if there was
    /// one.
    pub fn discard_pending(&self, identity: &ArtifactIdentity) -> bool {
        let mut slots = self.shared.slots.lock();
        match slots.by_identity.get(identity) {
            Some(Slot::PendingApply(_) | Slot::Failed(_)) => {
                slots.by_identity.insert(identity.clone(), Slot::Idle);
                true
            }
            _ => false,
        }
    }

    pub fn current_state(&self, identity: &ArtifactIdentity) -> CoordinatorState {
        self.shared
            .slots
            .lock()
            .by_identity
            .get(identity)
            .map_or(CoordinatorState::Idle, Slot::state)
    }

    /// The staged update for `identity`, if any.
    pub fn pending(&self, identity: &ArtifactIdentity) -> Option<PendingUpdate> {
        match self.shared.slots.lock().by_identity.get(identity) {
            Some(Slot::PendingApply(pending)) => Some(pending.clone()),
            _ => None,
        }
    }

    /// The recorded failure for `identity`, if any.
    pub fn failure(&self, identity: &ArtifactIdentity) -> Option<GenerationError> {
        match self.shared.slots.lock().by_identity.get(identity) {
            Some(Slot::Failed(error)) => Some(error.clone()),
            _ => None,
        }
    }

    /// Makes `identity` the artifact the user is looking at.
    ///
    /// Leaving an artifact supersedes its in-flight rewrite; an in-flight
    /// create is allowed to finish.
    pub fn focus(&self, identity: &ArtifactIdentity) {
        let mut slots = self.shared.slots.lock();
        let previous = slots.focus.replace(identity.clone());
        if let Some(previous) = previous.filter(|p| p != identity) {
            supersede_rewrite(&mut slots, &previous);
        }
    }

    /// Clears focus, superseding the in-flight rewrite of the old focus.
    pub fn clear_focus(&self) {
        let mut slots = self.shared.slots.lock();
        if let Some(previous) = slots.focus.take() {
            supersede_rewrite(&mut slots, &previous);
        }
    }

    pub fn focused(&self) -> Option<ArtifactIdentity> {
        self.shared.slots.lock().focus.clone()
    }
}

fn supersede_rewrite(slots: &mut Slots, identity: &ArtifactIdentity) {
    let superseded = matches!(
        slots.by_identity.get(identity),
        Some(Slot::InFlight { kind, .. }) if kind.modifies_existing()
    );
    if !superseded {
        return;
    }
    if let Some(Slot::InFlight {
        abort: Some(handle),
        ..
    }) = slots.by_identity.insert(identity.clone(), Slot::Idle)
    {
        handle.abort();
    }
    tracing::debug!(identity = %identity, "in-flight rewrite superseded by navigation");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{document, rewrite_output, GatedGenerator, ScriptedGenerator};
    use crate::InMemoryAppStore;
    use applet::{OperationInputs, ProviderError, RawGeneratorResponse};

    fn id(name: &str) -> ArtifactIdentity {
        ArtifactIdentity::new(name).unwrap()
    }

    fn rewrite(kind: OperationKind, identity: &str) -> GenerationRequest {
        GenerationRequest::new(
            kind,
            id(identity),
            OperationInputs::Modify {
                current_artifact: "<html><body>old</body></html>".into(),
                command: Some("make it blue".into()),
            },
        )
        .unwrap()
    }

    fn parsed(marker: &str) -> ParsedResult {
        ParsedResult {
            description: format!("{marker} description"),
            artifact: document(marker),
            name: None,
            icon: None,
        }
    }

    fn coordinator(generator: Arc<dyn applet::Generator>) -> (UpdateCoordinator, Arc<InMemoryAppStore>) {
        let store = Arc::new(InMemoryAppStore::new());
        let coordinator =
            UpdateCoordinator::new(Arc::new(Orchestrator::new(generator)), store.clone());
        (coordinator, store)
    }

    fn seed(store: &InMemoryAppStore, identity: &str) {
        store.save(AppRecord {
            identity: id(identity),
            artifact: document("original"),
            description: "original".into(),
            name: Some("Notes".into()),
            icon: Some("📝".into()),
        });
    }

    #[test]
    fn stale_token_result_is_discarded() {
        let (coordinator, _) = coordinator(ScriptedGenerator::with(vec![]));
        let notes = id("notes");
        coordinator.focus(&notes);

        let first = coordinator.begin(&notes, OperationKind::Enhance);
        let second = coordinator.begin(&notes, OperationKind::Enhance);
        assert!(second > first);

        let fresh = coordinator.finish(&notes, second, Ok(parsed("second")));
        assert!(matches!(fresh, Completion::Staged { .. }));

        let stale = coordinator.finish(&notes, first, Ok(parsed("first")));
        assert_eq!(stale, Completion::Discarded);
        assert_eq!(
            coordinator.pending(&notes).unwrap().result.artifact,
            document("second")
        );
    }

    #[test]
    fn failure_leaves_stored_app_untouched() {
        let (coordinator, store) = coordinator(ScriptedGenerator::with(vec![]));
        seed(&store, "notes");
        let notes = id("notes");

        let token = coordinator.begin(&notes, OperationKind::Fix);
        let completion = coordinator.finish(&notes, token, Err(GenerationError::Truncated));

        assert!(matches!(completion, Completion::Failed { .. }));
        assert_eq!(coordinator.current_state(&notes), CoordinatorState::Failed);
        assert_eq!(coordinator.failure(&notes), Some(GenerationError::Truncated));
        assert_eq!(store.load(&notes).unwrap().artifact, document("original"));

        assert!(coordinator.discard_pending(&notes));
        assert_eq!(coordinator.current_state(&notes), CoordinatorState::Idle);
    }

    #[test]
    fn create_is_saved_without_apply() {
        let (coordinator, store) = coordinator(ScriptedGenerator::with(vec![]));
        let clock = id("Clock");

        let token = coordinator.begin(&clock, OperationKind::Create);
        let completion = coordinator.finish(&clock, token, Ok(parsed("clock")));

        assert!(matches!(completion, Completion::Applied { .. }));
        assert_eq!(coordinator.current_state(&clock), CoordinatorState::Idle);
        assert_eq!(store.load(&clock).unwrap().artifact, document("clock"));
    }

    #[test]
    fn apply_requires_focus_and_keeps_identity() {
        let (coordinator, store) = coordinator(ScriptedGenerator::with(vec![]));
        seed(&store, "notes");
        let notes = id("notes");

        let token = coordinator.begin(&notes, OperationKind::Customize);
        coordinator.finish(&notes, token, Ok(parsed("blue")));

        assert_eq!(coordinator.apply_pending(&notes), None);
        assert_eq!(coordinator.current_state(&notes), CoordinatorState::PendingApply);

        coordinator.focus(&notes);
        let record = coordinator.apply_pending(&notes).unwrap();
        assert_eq!(record.artifact, document("blue"));
        assert_eq!(record.name.as_deref(), Some("Notes"));
        assert_eq!(record.icon.as_deref(), Some("📝"));
        assert_eq!(store.load(&notes).unwrap(), record);
        assert_eq!(coordinator.current_state(&notes), CoordinatorState::Idle);

        assert_eq!(coordinator.apply_pending(&notes), None);
        assert!(!coordinator.discard_pending(&notes));
    }

    #[test]
    fn leaving_an_artifact_supersedes_its_rewrite_but_not_create() {
        let (coordinator, _) = coordinator(ScriptedGenerator::with(vec![]));
        let notes = id("notes");
        let clock = id("Clock");

        coordinator.focus(&notes);
        let rewrite_token = coordinator.begin(&notes, OperationKind::Enhance);
        coordinator.focus(&clock);
        assert_eq!(coordinator.current_state(&notes), CoordinatorState::Idle);
        assert_eq!(
            coordinator.finish(&notes, rewrite_token, Ok(parsed("late"))),
            Completion::Discarded
        );

        let create_token = coordinator.begin(&clock, OperationKind::Create);
        coordinator.clear_focus();
        assert_eq!(coordinator.current_state(&clock), CoordinatorState::InFlight);
        assert!(matches!(
            coordinator.finish(&clock, create_token, Ok(parsed("clock"))),
            Completion::Applied { .. }
        ));
    }

    #[test]
    fn new_operation_drops_pending_update() {
        let (coordinator, _) = coordinator(ScriptedGenerator::with(vec![]));
        let notes = id("notes");

        let token = coordinator.begin(&notes, OperationKind::Enhance);
        coordinator.finish(&notes, token, Ok(parsed("one")));
        assert!(coordinator.pending(&notes).is_some());

        coordinator.begin(&notes, OperationKind::Fix);
        assert_eq!(coordinator.pending(&notes), None);
        assert_eq!(coordinator.current_state(&notes), CoordinatorState::InFlight);
    }

    #[tokio::test]
    async fn started_operation_is_aborted_when_superseded() {
        let generator = GatedGenerator::new();
        let (coordinator, _) = coordinator(generator.clone());
        let notes = id("notes");
        coordinator.focus(&notes);

        let first = coordinator.start_operation(rewrite(OperationKind::Enhance, "notes"));
        generator.wait_for_calls(1).await;
        let second = coordinator.start_operation(rewrite(OperationKind::Customize, "notes"));
        generator.wait_for_calls(2).await;

        assert!(generator.release(1, Ok(rewrite_output("second"))));
        let completion = second.join().await;
        assert!(matches!(completion, Completion::Staged { .. }));

        assert_eq!(first.join().await, Completion::Discarded);
        assert!(!generator.release(0, Ok(rewrite_output("first"))));
        assert_eq!(
            coordinator.pending(&notes).unwrap().result.artifact,
            document("second")
        );
    }

    #[tokio::test]
    async fn started_create_lands_in_store() {
        let generator = ScriptedGenerator::with(vec![Ok(RawGeneratorResponse::complete(
            document("clock"),
        ))]);
        let (coordinator, store) = coordinator(generator);
        let request = GenerationRequest::new(
            OperationKind::Create,
            id("Clock"),
            OperationInputs::Catalog,
        )
        .unwrap();

        let completion = coordinator.start_operation(request).join().await;

        let record = match completion {
            Completion::Applied { record } => record,
            other => panic!("expected applied, got {other:?}"),
        };
        assert_eq!(record.icon.as_deref(), Some("⏰"));
        assert_eq!(store.load(&id("Clock")), Some(record));
    }

    #[tokio::test]
    async fn provider_failure_is_recorded() {
        let generator = ScriptedGenerator::with(vec![Err(ProviderError::Unauthorized)]);
        let (coordinator, _) = coordinator(generator);
        let notes = id("notes");

        let completion = coordinator
            .start_operation(rewrite(OperationKind::Fix, "notes"))
            .join()
            .await;

        assert!(matches!(completion, Completion::Failed { .. }));
        assert_eq!(
            coordinator.failure(&notes),
            Some(GenerationError::Provider(ProviderError::Unauthorized))
        );
    }
}
