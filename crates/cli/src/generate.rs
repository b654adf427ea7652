//! `appforge generate`: one operation, run through the update coordinator.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use applet::{AppRecord, AppStore, OperationKind, OperationRequest};
use clap::Args;
use orchestration::{Completion, InMemoryAppStore, Orchestrator, UpdateCoordinator};

#[derive(Args)]
pub struct GenerateArgs {
    /// Operation to run: create, enhance, fix or customize.
    #[arg(long)]
    kind: OperationKind,

    /// Name of the app the operation targets.
    #[arg(long)]
    identity: String,

    /// Free-text description for a create. Omit it to build the catalog app.
    #[arg(long)]
    description: Option<String>,

    #[arg(long)]
    suggested_name: Option<String>,

    /// Current app document, required by rewrites.
    #[arg(long)]
    artifact_file: Option<PathBuf>,

    /// Instruction for a customize.
    #[arg(long)]
    command: Option<String>,

    #[arg(long)]
    model: Option<String>,

    /// Layout hint such as `16:9`.
    #[arg(long)]
    aspect_ratio: Option<String>,

    /// Apply a staged rewrite instead of printing it as pending.
    #[arg(long)]
    apply: bool,
}

pub async fn run(args: GenerateArgs, orchestrator: Arc<Orchestrator>) -> anyhow::Result<()> {
    let current_artifact = match &args.artifact_file {
        Some(path) => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?,
        ),
        None => None,
    };

    let request = OperationRequest {
        operation_kind: Some(args.kind),
        artifact_identity: Some(args.identity),
        description: args.description,
        suggested_name: args.suggested_name,
        current_artifact: current_artifact.clone(),
        command: args.command,
        model: args.model,
        aspect_ratio: args.aspect_ratio,
    }
    .into_generation_request(None)?;
    let identity = request.identity().clone();

    let store = Arc::new(InMemoryAppStore::new());
    if let Some(artifact) = current_artifact {
        store.save(AppRecord {
            identity: identity.clone(),
            artifact,
            description: String::new(),
            name: None,
            icon: None,
        });
    }

    let coordinator = UpdateCoordinator::new(orchestrator, store);
    coordinator.focus(&identity);

    let completion = match coordinator.start_operation(request).join().await {
        Completion::Staged { .. } if args.apply => {
            let record = coordinator
                .apply_pending(&identity)
                .context("staged update could not be applied")?;
            Completion::Applied { record }
        }
        Completion::Failed { error } => return Err(error.into()),
        other => other,
    };

    println!("{}", serde_json::to_string_pretty(&completion)?);
    Ok(())
}
