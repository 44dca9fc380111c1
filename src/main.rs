use std::path::PathBuf;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};

use tribunal::cache::{BoundedCache, FileStore};
use tribunal::config::Config;
use tribunal::providers::{FixtureProvider, HealthRegistry, OfflineProvider, ToolProvider};
use tribunal::workflow::{GraphBuilder, ResearchDepth};
use tribunal::{AnalysisRequest, Orchestrator, Result};

/// Tribunal - multi-analyst trading research pipeline
#[derive(Parser, Debug)]
#[command(name = "tribunal")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    TRIBUNAL_DEBUG=1     Enable debug logging (alternative to --debug)\n    TRIBUNAL_LOG=<filter> Explicit log filter, e.g. tribunal=trace")]
pub struct Cli {
    /// Enable debug logging (writes to ~/.tribunal/tribunal.log)
    #[arg(short = 'd', long)]
    pub debug: bool,

    /// Config file (defaults to ~/.tribunal/tribunal.toml)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Analyze a subject and print the decision as JSON
    Run {
        /// Instrument or company to analyze
        #[arg(short = 's', long)]
        subject: String,

        /// Trade date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        as_of: Option<NaiveDate>,

        /// Comma-separated analyst ids (market, social, news, fundamentals)
        #[arg(short = 'a', long, value_delimiter = ',')]
        analysts: Vec<String>,

        /// Research depth: quick, basic, standard, deep, comprehensive (or 1-5)
        #[arg(long, default_value = "standard")]
        depth: ResearchDepth,

        /// JSON file of canned tool responses
        #[arg(long)]
        fixtures: Option<PathBuf>,

        /// Skip the result cache for this run
        #[arg(long)]
        no_cache: bool,
    },

    /// Print the execution graph for a selection without running it
    Graph {
        #[arg(short = 'a', long, value_delimiter = ',')]
        analysts: Vec<String>,

        #[arg(long, default_value = "standard")]
        depth: ResearchDepth,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Write the defaults to the config file if it does not exist
        #[arg(long)]
        init: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = tribunal::log::init_with_debug(cli.debug);

    let config_path = match cli.config {
        Some(path) => path,
        None => Config::config_path()?,
    };
    let config = Config::load_from(&config_path)?;

    match cli.command {
        Command::Run {
            subject,
            as_of,
            analysts,
            depth,
            fixtures,
            no_cache,
        } => {
            let request = AnalysisRequest::new(&subject, as_of.unwrap_or_else(|| Utc::now().date_naive()))
                .with_analysts(analysts)
                .with_depth(depth);
            run_request(&config, request, fixtures, no_cache)
        }
        Command::Graph { analysts, depth } => print_graph(&config, &analysts, depth),
        Command::Config { init } => {
            if init && !config_path.exists() {
                config.save_to(&config_path)?;
                eprintln!("Wrote {}", config_path.display());
            }
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn run_request(
    config: &Config,
    request: AnalysisRequest,
    fixtures: Option<PathBuf>,
    no_cache: bool,
) -> Result<()> {
    tracing::info!(subject = %request.subject, depth = %request.depth, "run command");

    let provider: Arc<dyn ToolProvider> = match fixtures {
        Some(path) => Arc::new(FixtureProvider::load(&path)?),
        None => {
            tracing::warn!("no tool provider configured, every tool call will fail");
            Arc::new(OfflineProvider)
        }
    };
    let health = Arc::new(HealthRegistry::with_unhealthy(config.sources.unhealthy.iter()));

    let mut orchestrator = Orchestrator::new(config, provider, health);
    if config.cache.enabled && !no_cache {
        let store = FileStore::new(config.cache.cache_dir()?);
        orchestrator = orchestrator.with_cache(
            BoundedCache::new(Arc::new(store)).with_default_ttl(config.cache.default_ttl()),
        );
    }

    let rt = tokio::runtime::Runtime::new()?;
    let decision = rt.block_on(orchestrator.run(request))?;

    println!("{}", serde_json::to_string_pretty(&decision)?);
    Ok(())
}

fn print_graph(config: &Config, analysts: &[String], depth: ResearchDepth) -> Result<()> {
    let instance = GraphBuilder::with_catalog(config.catalog()).build(analysts, depth)?;

    println!(
        "depth {} ({} tasks, {} edges)",
        depth,
        instance.graph().task_count(),
        instance.graph().dependency_count()
    );
    for (phase, tasks) in instance.layers() {
        let ids: Vec<String> = tasks.iter().map(|t| t.id.to_string()).collect();
        println!("  {:<18} {}", phase.to_string(), ids.join(", "));
    }
    for warning in instance.warnings() {
        eprintln!("warning: {}", warning);
    }
    Ok(())
}
