//! Plan command - Show the resource graph a stack declares.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tracing::info;

use stratum_core::{ResourceGraph, ShapeEdge};
use stratum_provider::ResourceKind;
use stratum_stack::StackBuilder;

use super::validate::load_checked;

#[derive(Args)]
pub struct PlanArgs {
    /// Path to the stack file
    #[arg(short, long, default_value = "stack.yaml")]
    pub config: PathBuf,

    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
pub struct PlanStep {
    pub name: String,
    pub kind: ResourceKind,
    pub operation: &'static str,
    pub depends_on: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
    pub edges: Vec<ShapeEdge>,
    pub exports: Vec<String>,
}

/// Creation order of a declared graph with each node's dependencies.
pub fn build_plan(graph: &ResourceGraph, exports: Vec<String>) -> Result<Plan> {
    let mut steps = Vec::with_capacity(graph.len());
    for id in graph.topological_order()? {
        let node = graph.node(id)?;
        let mut depends_on = Vec::new();
        for dependency in node.dependencies() {
            depends_on.push(graph.node(dependency)?.name().to_string());
        }
        steps.push(PlanStep {
            name: node.name().to_string(),
            kind: node.kind(),
            operation: node.kind().operation(),
            depends_on,
        });
    }

    Ok(Plan {
        steps,
        edges: graph.shape().edges,
        exports,
    })
}

pub async fn execute(args: PlanArgs) -> Result<()> {
    info!("Planning stack: {}", args.config.display());

    let document = load_checked(&args.config)?;
    let mut graph = ResourceGraph::new();
    let stack = StackBuilder::from_document(&document).build(&mut graph)?;
    let plan = build_plan(&graph, stack.exports.keys().map(str::to_string).collect())?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!("📋 Plan for {} ({} resources)", args.config.display(), plan.steps.len());
    for (position, step) in plan.steps.iter().enumerate() {
        if step.depends_on.is_empty() {
            println!("   {:>2}. {} {}", position + 1, step.operation, step.name);
        } else {
            println!(
                "   {:>2}. {} {} ← {}",
                position + 1,
                step.operation,
                step.name,
                step.depends_on.join(", ")
            );
        }
    }
    println!();
    println!("📤 Exports: {}", plan.exports.join(", "));
    Ok(())
}
