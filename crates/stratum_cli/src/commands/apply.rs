//! Apply command - Provision every resource a stack declares.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use tracing::{info, warn};

use stratum_core::{CoreError, Orchestrator, PartialFailure, ResourceGraph, DEFAULT_CONCURRENCY};
use stratum_provider::MockProvider;
use stratum_stack::StackBuilder;

use super::validate::load_checked;

#[derive(Args)]
pub struct ApplyArgs {
    /// Path to the stack file
    #[arg(short, long, default_value = "stack.yaml")]
    pub config: PathBuf,

    /// Directory for run reports
    #[arg(long, default_value = ".stratum", env = "STRATUM_STATE_DIR")]
    pub state_dir: PathBuf,

    /// Maximum provider calls in flight
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Region reported by the simulated provider
    #[arg(long, default_value = "us-east-1", env = "STRATUM_REGION")]
    pub region: String,

    /// Make the simulated provider reject the named resource (repeatable)
    #[arg(long = "fail-on", value_name = "NAME")]
    pub fail_on: Vec<String>,
}

pub async fn execute(args: ApplyArgs) -> Result<()> {
    info!("Applying stack: {}", args.config.display());

    let document = load_checked(&args.config)?;
    let mut graph = ResourceGraph::new();
    let stack = StackBuilder::from_document(&document).build(&mut graph)?;

    let mut provider = MockProvider::new().with_region(&args.region);
    for name in &args.fail_on {
        provider = provider.fail_on(name, "rejected by --fail-on");
    }

    let orchestrator = Orchestrator::new(Arc::new(provider))
        .with_concurrency(args.concurrency)
        .with_state_dir(&args.state_dir);

    let token = orchestrator.cancel_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight resources");
            token.cancel();
        }
    });

    println!("🚀 Provisioning {} resources...", graph.len());
    let result = orchestrator.realize(&graph).await;
    interrupt.abort();

    match result {
        Ok(report) => {
            let outputs = stack.exports.resolve().await?;
            println!("   ✅ Created {} resources (run {})", report.completed.len(), report.run_id);
            println!();
            println!("{}", serde_json::to_string_pretty(&outputs)?);
            Ok(())
        }
        Err(CoreError::PartialFailure(failure)) => {
            print_partial_failure(&failure);
            let available = stack.exports.resolved();
            if !available.is_empty() {
                println!();
                println!("📤 Outputs available before the failure:");
                println!("{}", serde_json::to_string_pretty(&available)?);
            }
            Err(CoreError::PartialFailure(failure).into())
        }
        Err(CoreError::Cancelled {
            completed,
            not_started,
        }) => {
            println!("   ⚠️  Cancelled: {} created, {} not started", completed.len(), not_started.len());
            Err(CoreError::Cancelled {
                completed,
                not_started,
            }
            .into())
        }
        Err(e) => Err(e.into()),
    }
}

fn print_partial_failure(failure: &PartialFailure) {
    println!("   ❌ {} failed: {}", failure.failed, failure.cause);
    for (node, cause) in &failure.additional_failures {
        println!("   ❌ {} failed: {}", node, cause);
    }
    if !failure.completed.is_empty() {
        println!("   Created:");
        for node in &failure.completed {
            println!("      ✅ {}", node);
        }
    }
    if !failure.unresolved.is_empty() {
        println!("   Blocked by the failure:");
        for node in &failure.unresolved {
            println!("      - {}", node);
        }
    }
    if !failure.not_started.is_empty() {
        println!("   Not started:");
        for node in &failure.not_started {
            println!("      - {}", node);
        }
    }
}
