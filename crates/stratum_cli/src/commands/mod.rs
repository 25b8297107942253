//! CLI command definitions.
//!
//! Each subcommand maps to one stage of working with a stack file:
//! checking it, previewing the resource graph, and provisioning it.

use clap::{Parser, Subcommand, ValueEnum};

pub mod apply;
pub mod plan;
pub mod validate;

/// Stratum - multi-tier network provisioning engine
#[derive(Parser)]
#[command(name = "stratum")]
#[command(version, about = "Stratum - multi-tier network provisioning engine")]
#[command(long_about = r#"
Stratum declares a VPC with public and private subnets, an application load
balancer and an auto scaling group from one YAML stack file, then creates the
resources in dependency order.

COMMANDS:
  validate  → Check the stack file and its user-data script
  plan      → Show the resource graph in creation order
  apply     → Create every resource and print the exported outputs

EXIT CODES:
  0   - Success
  1   - General error
  2   - Invalid arguments
  3   - Validation failure
  4   - Provisioning failure
  130 - Cancelled
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log line format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text, env = "STRATUM_LOG_FORMAT")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a stack file
    Validate(validate::ValidateArgs),

    /// Show the resources a stack declares, in creation order
    Plan(plan::PlanArgs),

    /// Provision a stack
    Apply(apply::ApplyArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_apply_defaults() {
        let cli = Cli::try_parse_from(["stratum", "apply"]).unwrap();
        assert!(!cli.verbose);
        assert_eq!(cli.log_format, LogFormat::Text);
        match cli.command {
            Commands::Apply(args) => {
                assert_eq!(args.config, PathBuf::from("stack.yaml"));
                assert_eq!(args.state_dir, PathBuf::from(".stratum"));
                assert_eq!(args.concurrency, stratum_core::DEFAULT_CONCURRENCY);
                assert!(args.fail_on.is_empty());
            }
            _ => panic!("expected apply"),
        }
    }

    #[test]
    fn test_parse_apply_options() {
        let cli = Cli::try_parse_from([
            "stratum",
            "-v",
            "--log-format",
            "json",
            "apply",
            "-c",
            "demo.yaml",
            "--concurrency",
            "2",
            "--fail-on",
            "web-asg",
            "--fail-on",
            "main-vpc",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.log_format, LogFormat::Json);
        match cli.command {
            Commands::Apply(args) => {
                assert_eq!(args.config, PathBuf::from("demo.yaml"));
                assert_eq!(args.concurrency, 2);
                assert_eq!(args.fail_on, vec!["web-asg", "main-vpc"]);
            }
            _ => panic!("expected apply"),
        }
    }

    #[test]
    fn test_parse_plan_json() {
        let cli = Cli::try_parse_from(["stratum", "plan", "--json"]).unwrap();
        match cli.command {
            Commands::Plan(args) => assert!(args.json),
            _ => panic!("expected plan"),
        }
    }

    #[test]
    fn test_rejects_unknown_log_format() {
        assert!(Cli::try_parse_from(["stratum", "--log-format", "xml", "validate"]).is_err());
    }
}
