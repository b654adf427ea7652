//! AppForge CLI entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Parse configuration**: `clap` flags with environment fallbacks
//!    (`OPENROUTER_API_KEY`, `APPFORGE_LISTEN`, proxy limits, timeouts).
//! 2. **Wire observability**: `tracing-subscriber` with a JSON or pretty layer
//!    and an OpenTelemetry OTLP exporter. All spans and structured events
//!    emitted by every crate in the workspace flow through it.
//! 3. **Construct infrastructure**: the `OpenRouterProvider`, the
//!    `ReqwestFetcher`, and the in-memory app store, injected into the
//!    orchestrator, gateway and update coordinator.
//! 4. **Run the selected command**:
//!    - `serve`: the HTTP edge until Ctrl-C.
//!    - `generate`: one operation through the update coordinator, printed as
//!      JSON.

use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use llm::{OpenRouterConfig, OpenRouterProvider};
use orchestration::Orchestrator;

mod generate;
mod serve;
mod telemetry;

use telemetry::LogFormat;

#[derive(Parser)]
#[command(name = "appforge")]
#[command(version)]
#[command(about = "Generate and evolve single-file mini-apps with an LLM")]
struct Cli {
    /// Log output format.
    #[arg(long, value_enum, env = "APPFORGE_LOG_FORMAT", default_value = "pretty")]
    log_format: LogFormat,

    #[command(flatten)]
    provider: ProviderArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the operation and proxy endpoints.
    Serve(serve::ServeArgs),
    /// Run a single operation and print the result.
    Generate(generate::GenerateArgs),
}

#[derive(Args)]
struct ProviderArgs {
    /// OpenRouter API key.
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Chat-completions API root.
    #[arg(long, env = "OPENROUTER_BASE_URL", default_value = llm::DEFAULT_BASE_URL)]
    provider_url: String,

    /// Deadline for one generator call, in seconds.
    #[arg(long, env = "APPFORGE_GENERATION_TIMEOUT_SECS", default_value_t = 120)]
    generation_timeout_secs: u64,
}

impl ProviderArgs {
    fn orchestrator(&self) -> anyhow::Result<Orchestrator> {
        let provider = OpenRouterProvider::new(
            OpenRouterConfig::new(self.api_key.clone()).with_base_url(self.provider_url.clone()),
        )?;
        Ok(Orchestrator::new(Arc::new(provider))
            .with_timeout(Duration::from_secs(self.generation_timeout_secs)))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _telemetry = telemetry::init(cli.log_format)?;

    let orchestrator = Arc::new(cli.provider.orchestrator()?);
    match cli.command {
        Command::Serve(args) => serve::run(args, orchestrator).await,
        Command::Generate(args) => generate::run(args, orchestrator).await,
    }
}
