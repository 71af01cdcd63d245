//! Harvest CLI
//!
//! Command-line simulator for the Harvest reward farm.

mod scenario;

use anyhow::Context;
use clap::{Parser, Subcommand};
use harvest_farm::{FarmConfig, PoolConfig};
use scenario::{Scenario, Simulation};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "harvest")]
#[command(author = "Harvest Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Harvest - multi-pool block-indexed reward farm simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy a farm and replay a scenario against in-memory tokens
    Simulate {
        /// Farm configuration file
        #[arg(short, long, default_value = "harvest.toml")]
        config: PathBuf,

        /// Scenario file
        #[arg(short, long)]
        scenario: PathBuf,

        /// Write the JSON report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the emission schedule a configuration deploys
    Schedule {
        /// Farm configuration file
        #[arg(short, long, default_value = "harvest.toml")]
        config: PathBuf,
    },

    /// Write a sample configuration
    Init {
        /// Output file
        #[arg(short, long, default_value = "harvest.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn sample_config() -> FarmConfig {
    let mut config = FarmConfig::default();
    config.farm.fund = 5_000_000;
    config.pools = vec![PoolConfig {
        symbol: "MLP".to_string(),
        name: "Mock LP Token".to_string(),
        decimals: 18,
        alloc_point: 15,
        withdrawal_fee: 50,
        claim_fee: 60,
        transfer_tax: 0,
        mint_per_account: 1_000,
    }];
    config
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Simulate {
            config,
            scenario,
            output,
        } => {
            let farm_config = FarmConfig::load(&config)?;
            let scenario = Scenario::load(&scenario)?;
            tracing::info!(config = ?config, steps = scenario.steps.len(), "simulating");

            let mut sim = Simulation::deploy(&farm_config)?;
            sim.run(&scenario)?;
            let report = serde_json::to_string_pretty(&sim.report()?)?;

            match output {
                Some(path) => {
                    std::fs::write(&path, report)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    tracing::info!(output = ?path, "report written");
                }
                None => println!("{}", report),
            }
        }

        Commands::Schedule { config } => {
            let farm_config = FarmConfig::load(&config)?;
            let sim = Simulation::deploy(&farm_config)?;
            let farm = sim.farm();
            let unit = farm_config.reward_unit()?;
            let symbol = &farm_config.reward.symbol;

            println!("Reward token:      {}", symbol);
            println!("Reward per block:  {} {}", farm.reward_per_block() / unit, symbol);
            println!("Funded:            {} {}", farm.total_funded() / unit, symbol);
            println!("Start block:       {}", farm.start_block());
            println!("End block:         {}", farm.end_block());
            println!(
                "Duration:          {} blocks",
                farm.end_block().saturating_sub(farm.start_block())
            );
            println!("Admin wallet:      {} ({})", farm_config.farm.admin_wallet, farm.admin_wallet());
            println!();
            println!("Pools:");
            let total = farm.total_alloc_point().max(1) as u128;
            for (index, pool) in farm_config.pools.iter().enumerate() {
                let info = farm.pool_info(index)?;
                println!(
                    "  [{}] {:<8} weight {:>4}  {} {}/block  fees {}/{} per-mille  tax {}%",
                    index,
                    pool.symbol,
                    info.alloc_point,
                    farm.reward_per_block() * info.alloc_point as u128 / total / unit,
                    symbol,
                    info.withdrawal_fee,
                    info.claim_fee,
                    pool.transfer_tax
                );
            }
        }

        Commands::Init { output, force } => {
            if output.exists() && !force {
                anyhow::bail!("{} already exists (use --force to overwrite)", output.display());
            }
            let content = toml::to_string_pretty(&sample_config())?;
            std::fs::write(&output, content)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!("Configuration written to {}", output.display());
        }
    }

    Ok(())
}
