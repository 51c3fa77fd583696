//! # Fanout Configuration Validator
//!
//! Command-line tool for validating fanout configuration across environments
//! before a run is started.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fanout_core::config::{ConfigManager, FanoutConfig};
use std::path::PathBuf;
use std::process;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "config-validator")]
#[command(about = "Validate fanout configuration files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Environment overlay to apply (development, test, production, ...)
    #[arg(short, long)]
    environment: Option<String>,

    /// Configuration directory path (default: config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format (table, json)
    #[arg(long, default_value = "table")]
    format: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate all configuration sections
    All,

    /// Validate and print a single section
    Component {
        /// Section name (discovery, dispatch, retry, worker)
        name: String,
    },

    /// Print the retry delay before every attempt
    Backoff,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let _subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init();

    let result = load(&cli).and_then(|manager| match &cli.command {
        Some(Commands::All) | None => validate_all(&cli, &manager),
        Some(Commands::Component { name }) => validate_component(&cli, manager.config(), name),
        Some(Commands::Backoff) => show_backoff(manager.config()),
    });

    match result {
        Ok(()) => {
            info!("Configuration validation completed successfully");
            process::exit(0);
        }
        Err(e) => {
            error!("Configuration validation failed: {e:#}");
            eprintln!("❌ {e:#}");
            process::exit(1);
        }
    }
}

fn load(cli: &Cli) -> Result<std::sync::Arc<ConfigManager>> {
    let environment = cli
        .environment
        .clone()
        .unwrap_or_else(ConfigManager::detect_environment);

    ConfigManager::load_from_directory_with_env(cli.config_dir.clone(), &environment)
        .with_context(|| format!("loading configuration for environment '{environment}'"))
}

fn validate_all(cli: &Cli, manager: &ConfigManager) -> Result<()> {
    if cli.format == "json" {
        println!("{}", serde_json::to_string_pretty(&manager.debug_config())?);
        return Ok(());
    }

    let config = manager.config();
    println!("🔧 Validating Fanout Configuration");
    println!("Environment: {}", manager.environment());
    println!("Config Directory: {}", manager.config_directory().display());
    for file in manager.loaded_files() {
        println!("  loaded {}", file.display());
    }
    println!();

    for section in ["discovery", "dispatch", "retry", "worker"] {
        print_section(config, section)?;
    }

    println!("\n🎉 All configuration validation checks passed!");
    Ok(())
}

fn validate_component(cli: &Cli, config: &FanoutConfig, name: &str) -> Result<()> {
    let name = name.to_lowercase();
    if cli.format == "json" {
        let value = serde_json::to_value(config)?;
        let Some(section) = value.get(&name) else {
            bail!("Unknown component: {name}");
        };
        println!("{}", serde_json::to_string_pretty(section)?);
        return Ok(());
    }

    print_section(config, &name)?;
    println!("✅ Component '{name}' validation passed!");
    Ok(())
}

fn print_section(config: &FanoutConfig, name: &str) -> Result<()> {
    match name {
        "discovery" => {
            println!("📋 discovery");
            println!("  seed_location: {}", config.discovery.seed_location);
            println!("  max_pages: {}", config.discovery.max_pages);
        }
        "dispatch" => {
            println!("📋 dispatch");
            println!("  definition_name: {}", config.dispatch.definition_name);
            println!("  concurrency_cap: {}", config.dispatch.concurrency_cap);
            println!("  batch_count: {}", config.dispatch.batch_count);
            println!("  deadline_ms: {:?}", config.dispatch.deadline_ms);
        }
        "retry" => {
            println!("📋 retry");
            println!("  base_interval_ms: {}", config.retry.base_interval_ms);
            println!("  backoff_rate: {}", config.retry.backoff_rate);
            println!("  max_attempts: {}", config.retry.max_attempts);
            let kinds: Vec<String> = config
                .retry
                .retryable_errors
                .iter()
                .map(ToString::to_string)
                .collect();
            println!("  retryable_errors: [{}]", kinds.join(", "));
            println!("  attempt_timeout_ms: {:?}", config.retry.attempt_timeout_ms);
        }
        "worker" => {
            println!("📋 worker");
            println!("  function_name: {}", config.worker.function_name);
            println!("  reserved_concurrency: {:?}", config.worker.reserved_concurrency);
        }
        other => bail!("Unknown component: {other}"),
    }
    Ok(())
}

fn show_backoff(config: &FanoutConfig) -> Result<()> {
    let policy = config.retry_policy()?;
    let calculator = policy.backoff_calculator();

    println!("⏱  Backoff schedule ({} attempts)", policy.max_attempts());
    println!("  attempt 1: immediate");
    for (attempt, delay) in (2..).zip(calculator.schedule(policy.max_attempts())) {
        println!("  attempt {attempt}: after {delay:?}");
    }
    println!(
        "  worst-case backoff total: {:?}",
        calculator.total_backoff(policy.max_attempts())
    );
    Ok(())
}
