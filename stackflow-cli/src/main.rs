//! Stackflow CLI - deploys the certificate → website → pipeline chain.
//!
//! Stacks are applied against the in-process simulated provider, one
//! simulated client per region the plan touches.

use anyhow::{Context, Result};
use clap::Parser;
use stackflow::config::{DeployConfig, StackConfig};
use stackflow::core::{Outputs, Region};
use stackflow::events::LoggingEventSink;
use stackflow::orchestrator::{DeploymentOrchestrator, PlanResult};
use stackflow::plan::{DeploymentPlan, TemplateSet};
use stackflow::provider::{ProviderRegistry, SimulatedCloud};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "stackflow")]
#[command(about = "Deploy the certificate, website and pipeline stacks in order")]
#[command(version)]
struct Args {
    /// Region for the website and pipeline stacks (the certificate stack always uses us-east-1)
    #[arg(long, env = "STACKFLOW_REGION")]
    region: Option<Region>,

    /// JSON deployment config; unset fields keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding the three template files
    #[arg(long, default_value = ".")]
    templates: PathBuf,

    /// Seconds between status polls
    #[arg(long)]
    poll_interval_secs: Option<u64>,

    /// Maximum status polls per wait
    #[arg(long)]
    max_poll_attempts: Option<u32>,

    /// Polls the simulated provider reports in progress before settling
    #[arg(long, default_value = "1")]
    settle_polls: u32,

    /// Print the run result as JSON
    #[arg(long)]
    json: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_tracing(args.verbose, args.log_json);

    let config = load_config(&args)?;
    let templates = TemplateSet::load_dir(&args.templates, &config)
        .with_context(|| format!("loading templates from {}", args.templates.display()))?;
    let plan = DeploymentPlan::standard_chain(&config, &templates)?;

    let orchestrator =
        DeploymentOrchestrator::from_config(simulated_providers(&config, &plan, args.settle_polls), &config)
            .with_events(Arc::new(LoggingEventSink::debug()));

    let cancel = orchestrator.cancellation().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current poll");
            cancel.cancel("interrupted by operator");
        }
    });

    let result = orchestrator.run(&plan).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result);
    }

    Ok(ExitCode::from(u8::try_from(result.exit_code()).unwrap_or(1)))
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    if json {
        fmt().json().with_env_filter(filter).init();
    } else {
        fmt().with_env_filter(filter).with_target(false).init();
    }
}

fn load_config(args: &Args) -> Result<DeployConfig> {
    let mut config = match &args.config {
        Some(path) => DeployConfig::from_json_file(path)?,
        None => DeployConfig::default(),
    };

    if let Some(region) = &args.region {
        config.primary_region = region.clone();
    }
    if let Some(secs) = args.poll_interval_secs {
        config.poll.interval_ms = secs.saturating_mul(1000);
    }
    if let Some(attempts) = args.max_poll_attempts {
        config.poll.max_attempts = attempts;
    }

    config.validate()?;
    info!(
        primary_region = %config.primary_region,
        certificate_region = %config.certificate_stack_region(),
        "Configuration loaded"
    );
    Ok(config)
}

/// One simulated client per region, each exposing the outputs the config
/// declares for the stacks deployed there.
fn simulated_providers(config: &DeployConfig, plan: &DeploymentPlan, settle_polls: u32) -> ProviderRegistry {
    let stacks = [
        (&config.certificate, config.certificate_stack_region()),
        (&config.primary, config.primary_stack_region()),
        (&config.pipeline, config.pipeline_stack_region()),
    ];

    plan.regions()
        .into_iter()
        .fold(ProviderRegistry::new(), |registry, region| {
            let cloud = stacks
                .iter()
                .filter(|(_, r)| r == region)
                .fold(SimulatedCloud::new().with_settle_after(settle_polls), |cloud, (stack, r)| {
                    cloud.with_exports(stack.name.clone(), simulated_outputs(stack, r))
                });
            registry.with_client(region.clone(), Arc::new(cloud))
        })
}

fn simulated_outputs(stack: &StackConfig, region: &Region) -> Outputs {
    stack
        .exports
        .iter()
        .map(|key| (key.clone(), format!("sim:{region}:{}:{key}", stack.name)))
        .collect()
}

fn print_summary(result: &PlanResult) {
    println!("Run {} ({:.0} ms)", result.run_id, result.duration_ms);
    for report in &result.completed {
        println!(
            "  {:<28} {:<14} {}",
            report.stack,
            report.region.as_str(),
            report.outcome
        );
    }
    match &result.aborted_at {
        Some(abort) => println!("Aborted at '{}' (entry {}): {}", abort.stack, abort.index + 1, abort.reason),
        None => println!("All stacks deployed."),
    }
}
