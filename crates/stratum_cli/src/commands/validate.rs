//! Validate command - Check a stack file without provisioning anything.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use stratum_core::ResourceGraph;
use stratum_spec::{SpecError, SpecReader, StackDocument, StackValidator};
use stratum_stack::StackBuilder;

#[derive(Args)]
pub struct ValidateArgs {
    /// Path to the stack file
    #[arg(short, long, default_value = "stack.yaml")]
    pub config: PathBuf,

    /// Treat warnings as errors
    #[arg(long)]
    pub strict: bool,
}

pub async fn execute(args: ValidateArgs) -> Result<()> {
    info!("Validating stack: {}", args.config.display());

    let document = SpecReader::load(&args.config)
        .with_context(|| format!("Failed to load stack {}", args.config.display()))?;

    println!("📋 Validating {}...", args.config.display());
    let result = StackValidator::validate(&document.spec);

    for warning in &result.warnings {
        println!("   ⚠️  {}", warning);
    }

    if !result.valid {
        println!("   ❌ Validation failed:");
        for error in &result.errors {
            println!("      - {}", error);
        }
        return Err(SpecError::ValidationFailed(result.errors.join("; ")).into());
    }

    if args.strict && !result.warnings.is_empty() {
        println!("   ❌ Strict mode: {} warning(s)", result.warnings.len());
        return Err(SpecError::ValidationFailed(result.warnings.join("; ")).into());
    }

    // Declaring catches what field checks cannot, such as a cycle or a
    // placement with nowhere to go.
    let mut graph = ResourceGraph::new();
    StackBuilder::from_document(&document).build(&mut graph)?;
    graph.topological_order()?;

    println!("   ✅ Stack is valid ({} resources)", graph.len());
    Ok(())
}

/// Load a stack and reject it if validation reports errors.
pub fn load_checked(config: &Path) -> Result<StackDocument> {
    let document = SpecReader::load(config)
        .with_context(|| format!("Failed to load stack {}", config.display()))?;
    let result = StackValidator::ensure_valid(&document.spec)?;
    for warning in &result.warnings {
        warn!("{}", warning);
    }
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const STACK: &str = r#"
network:
  vpc:
    name: main-vpc
    cidr_block: 10.0.0.0/16
  subnets:
    - cidr_block: 10.0.1.0/24
      az: us-east-1a
      public: true
load_balancer:
  port: 80
  allowed_cidrs: [0.0.0.0/0]
scaling:
  name: web-asg
  ami_id: ami-0c55b159cbfafe1f0
  instance_type: t3.micro
  min_size: 1
  max_size: 2
  desired_capacity: 1
  ports: [80]
"#;

    fn write_stack(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("stack.yaml");
        fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn test_validate_accepts_valid_stack() {
        let dir = TempDir::new().unwrap();
        let config = write_stack(&dir, STACK);
        execute(ValidateArgs { config, strict: false }).await.unwrap();
    }

    #[tokio::test]
    async fn test_validate_rejects_bad_bounds() {
        let dir = TempDir::new().unwrap();
        let config = write_stack(&dir, &STACK.replace("max_size: 2", "max_size: 0"));
        let err = execute(ValidateArgs { config, strict: false }).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SpecError>(),
            Some(SpecError::ValidationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_validate_missing_file() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("absent.yaml");
        let err = execute(ValidateArgs { config, strict: false }).await.unwrap_err();
        assert!(err.chain().any(|cause| matches!(
            cause.downcast_ref::<SpecError>(),
            Some(SpecError::NotFound(_))
        )));
    }
}
