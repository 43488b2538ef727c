//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::Result;
use conftrack_core::pipeline::{Pipeline, ProgressReporter, RunOptions, RunSummary};
use conftrack_core::{CommandAgent, TierOptions, TierReport};
use conftrack_fetcher::{FetchPolicy, HttpFetcher};
use conftrack_search::{CachedSearch, HttpSearchProvider};
use conftrack_shared::{AppConfig, init_config, load_config, load_config_from};
use conftrack_storage::{CatalogStore, LookupCache, OutputLayout};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// conftrack: keep a conference catalog complete and current.
#[derive(Parser, Debug)]
#[command(
    name = "conftrack",
    version,
    about = "Aggregate conference listings into one catalog and fill in missing dates, deadlines and locations.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Catalog file (overrides `defaults.catalog_path`).
    #[arg(long, global = true, env = "CONFTRACK_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// Output directory for raw scrapes, queue and audit files.
    #[arg(long, global = true)]
    pub out: Option<PathBuf>,

    /// Config file (defaults to ~/.conftrack/conftrack.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Scrape, merge, clean and enrich, then save.
    Run(RunArgs),

    /// Scrape and merge only.
    Scrape {
        /// Compute everything, write nothing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Enrich the existing catalog without scraping.
    Enrich(EnrichArgs),

    /// Assign prestige tiers.
    Tiers {
        /// Re-assign tiers that are already set.
        #[arg(long)]
        all: bool,

        /// Reference table only, no agent.
        #[arg(long)]
        no_api: bool,

        #[arg(long)]
        dry_run: bool,
    },

    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args, Debug, Default)]
pub(crate) struct RunArgs {
    /// Skip scraping, work on the stored catalog.
    #[arg(long)]
    pub no_scrape: bool,

    /// Also assign tiers at the end.
    #[arg(long)]
    pub tiers: bool,

    #[command(flatten)]
    pub enrich: EnrichArgs,
}

#[derive(Args, Debug, Default)]
pub(crate) struct EnrichArgs {
    /// Compute everything, write nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Only look for submission deadlines.
    #[arg(long)]
    pub deadlines_only: bool,

    /// Also revisit events that already took place.
    #[arg(long)]
    pub include_past: bool,

    /// Skip the web-search pass.
    #[arg(long)]
    pub no_search: bool,

    /// Skip the agent pass.
    #[arg(long)]
    pub no_agent: bool,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "conftrack=info",
        1 => "conftrack=debug",
        _ => "conftrack=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let Cli {
        catalog,
        out,
        config,
        command,
        ..
    } = cli;

    if let Command::Config { action } = &command {
        return match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config.as_deref()),
        };
    }

    let env = Env::resolve(config.as_deref(), catalog, out)?;
    match command {
        Command::Run(args) => cmd_run(&env, &args).await,
        Command::Scrape { dry_run } => {
            let mut options = env.options();
            options.dry_run = dry_run;
            options.enrich = false;
            execute(&env, &options, true, true).await
        }
        Command::Enrich(args) => {
            let run = RunArgs {
                no_scrape: true,
                tiers: false,
                enrich: args,
            };
            cmd_run(&env, &run).await
        }
        Command::Tiers {
            all,
            no_api,
            dry_run,
        } => cmd_tiers(&env, TierOptions { all, no_agent: no_api }, dry_run).await,
        Command::Config { .. } => Ok(()),
    }
}

/// Resolved config plus where the catalog and outputs live.
struct Env {
    config: AppConfig,
    store: CatalogStore,
    layout: OutputLayout,
}

impl Env {
    fn resolve(config: Option<&std::path::Path>, catalog: Option<PathBuf>, out: Option<PathBuf>) -> Result<Self> {
        let config = match config {
            Some(path) => load_config_from(path)?,
            None => load_config()?,
        };
        let store = CatalogStore::new(catalog.unwrap_or_else(|| PathBuf::from(&config.defaults.catalog_path)));
        let layout = OutputLayout::new(out.unwrap_or_else(|| PathBuf::from(&config.defaults.output_dir)));
        Ok(Self { config, store, layout })
    }

    fn options(&self) -> RunOptions {
        RunOptions::new(chrono::Local::now().date_naive())
    }

    /// Search provider behind the lookup cache, when a key is configured.
    async fn search(&self) -> Result<Option<CachedSearch<HttpSearchProvider>>> {
        let Some(provider) = HttpSearchProvider::from_config(&self.config.search)? else {
            return Ok(None);
        };
        let cache_path = self.layout.root().join("cache.db");
        match LookupCache::open(&cache_path).await {
            Ok(cache) => {
                let ttl = chrono::Duration::hours(self.config.search.cache_ttl_hours);
                let search = CachedSearch::new(provider, cache, ttl);
                if let Err(e) = search.purge_expired().await {
                    warn!(error = %e, "could not purge search cache");
                }
                Ok(Some(search))
            }
            Err(e) => {
                warn!(path = %cache_path.display(), error = %e, "search cache unavailable, search disabled");
                Ok(None)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(env: &Env, args: &RunArgs) -> Result<()> {
    let mut options = env.options();
    options.dry_run = args.enrich.dry_run;
    options.scrape = !args.no_scrape;
    options.tiers = args.tiers;
    options.deadlines_only = args.enrich.deadlines_only;
    options.include_past = args.enrich.include_past;
    execute(env, &options, args.enrich.no_search, args.enrich.no_agent).await
}

async fn execute(env: &Env, options: &RunOptions, no_search: bool, no_agent: bool) -> Result<()> {
    let fetcher = HttpFetcher::new(FetchPolicy::default())?;
    let search = if no_search || !options.enrich {
        None
    } else {
        env.search().await?
    };
    let agent = (!no_agent).then(|| CommandAgent::from_config(&env.config.agent));

    info!(
        catalog = %env.store.path().display(),
        out = %env.layout.root().display(),
        search = search.is_some(),
        agent = agent.is_some(),
        "starting"
    );

    let reporter = CliProgress::new();
    let summary = Pipeline::new(&env.config, &env.store, &env.layout, &fetcher)
        .with_search(search.as_ref())
        .with_agent(agent.as_ref())
        .run(options, &reporter)
        .await?;

    print_summary(&summary);
    Ok(())
}

async fn cmd_tiers(env: &Env, options: TierOptions, dry_run: bool) -> Result<()> {
    let fetcher = HttpFetcher::new(FetchPolicy::default())?;
    let agent = (!options.no_agent).then(|| CommandAgent::from_config(&env.config.agent));

    let report = Pipeline::<_, CachedSearch<HttpSearchProvider>, _>::new(
        &env.config,
        &env.store,
        &env.layout,
        &fetcher,
    )
    .with_agent(agent.as_ref())
    .run_tiers(options, dry_run)
    .await?;

    println!();
    print_tiers(&report);
    if dry_run {
        println!("  (dry run, catalog not written)");
    }
    println!();
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&std::path::Path>) -> Result<()> {
    let config: AppConfig = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

fn print_summary(s: &RunSummary) {
    println!();
    println!("  Run {}", s.run_id);
    if s.sources_ok + s.sources_failed > 0 {
        println!("  Sources:     {} ok, {} failed", s.sources_ok, s.sources_failed);
        println!("  Candidates:  {}", s.candidates);
        println!(
            "  Merge:       {} new, {} updated, {} unchanged, {} skipped",
            s.merge.created, s.merge.updated, s.merge.unchanged, s.merge.skipped
        );
    }
    println!("  Junk:        {} removed", s.junk_removed);
    println!(
        "  Enrichment:  {} filled, {} rejected, {} escalated",
        s.fields_filled, s.suggestions_rejected, s.needs_agent
    );
    if s.agent_removed > 0 {
        println!("  Agent:       {} removed as non-conferences", s.agent_removed);
    }
    if s.agent_aborted {
        println!("  Agent:       reply unusable, see agent_reply.txt");
    }
    if let Some(tiers) = &s.tiers {
        print_tiers(tiers);
    }
    println!("  Records:     {}", s.records);
    if !s.saved {
        println!("  (dry run, nothing written)");
    }
    println!("  Time:        {:.1}s", s.elapsed.as_secs_f64());
    println!();
}

fn print_tiers(r: &TierReport) {
    println!(
        "  Tiers:       {} considered, {} reference, {} agent, {} defaulted, {} unassigned",
        r.considered, r.from_reference, r.from_agent, r.defaulted, r.unassigned
    );
    for (tier, count) in &r.counts {
        println!("    tier {tier}: {count}");
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using indicatif spinners.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn record_progress(&self, current: usize, total: usize, detail: &str) {
        self.spinner.set_message(format!("[{current}/{total}] {detail}"));
    }

    fn done(&self, _summary: &RunSummary) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "conftrack",
            "--catalog",
            "c.json",
            "run",
            "--no-scrape",
            "--deadlines-only",
            "--no-agent",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.catalog, Some(PathBuf::from("c.json")));
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(args.no_scrape);
        assert!(args.enrich.deadlines_only);
        assert!(args.enrich.no_agent);
        assert!(!args.enrich.no_search);
    }

    #[test]
    fn tiers_flags_parse() {
        let cli = Cli::try_parse_from(["conftrack", "tiers", "--all", "--no-api"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Tiers {
                all: true,
                no_api: true,
                dry_run: false
            }
        ));
    }

    #[test]
    fn unknown_log_format_is_rejected() {
        assert!(Cli::try_parse_from(["conftrack", "--log-format", "xml", "scrape"]).is_err());
    }
}
