use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use robodaily::config::{find_config_file, load_config, Config};
use robodaily::llm::client_from_config;
use robodaily::notify::{compose_digest, notifier_from_config};
use robodaily::pipeline::{AddOutcome, Pipeline, RegenTarget};
use robodaily::print_status;
use robodaily::sources::arxiv::ArxivEndpoints;
use robodaily::sources::ArxivSource;
use robodaily::store::load_strict;
use robodaily::ui::{records_table, ProgressReporter, Status};
use robodaily::utils::HttpClient;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// robodaily - daily robotics paper digest
#[derive(Parser, Debug)]
#[command(name = "robodaily")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Scrape, filter, summarize and relay daily robotics papers", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (-v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch today's listing, filter it and enrich new papers
    Run {
        /// Override the maximum number of listing rows considered
        #[arg(long)]
        max_items: Option<usize>,
    },

    /// Add a single paper by identifier or URL
    Add {
        /// arXiv identifier, abstract, PDF or HTML URL
        #[arg(env = "ROBODAILY_ADD_ID")]
        reference: String,

        /// Add even if previously rejected, and regenerate if already enriched
        #[arg(long, env = "ROBODAILY_FORCE")]
        force: bool,
    },

    /// Regenerate fallback and no-preview summaries
    Regen {
        /// Records handled in this invocation
        #[arg(long, env = "ROBODAILY_BATCH_SIZE")]
        batch_size: Option<usize>,

        /// Regenerate every record, not only degraded ones
        #[arg(long)]
        all: bool,
    },

    /// Enrich records missing summaries or images
    Backfill {
        /// Records handled in this invocation
        #[arg(long, env = "ROBODAILY_BATCH_SIZE")]
        batch_size: Option<usize>,
    },

    /// Send a digest of the newest papers
    Notify {
        /// Papers included in the digest
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Print the messages instead of sending them
        #[arg(long)]
        dry_run: bool,
    },

    /// Check that the messaging relay is reachable
    RelayHealth,

    /// Show the stored dataset
    List {
        /// Maximum rows shown
        #[arg(long, default_value_t = 50)]
        limit: usize,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(cli: &Cli) {
    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = if cli.quiet { "error" } else { log_level };
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("robodaily={}", env_filter)),
    );

    let registry = tracing_subscriber::registry().with(filter);
    if cli.log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn read_config(cli: &Cli) -> Result<Config> {
    let path = match &cli.config {
        Some(path) => Some(path.clone()),
        None => find_config_file(),
    };
    if let Some(path) = &path {
        tracing::info!("Using config file: {}", path.display());
    }
    load_config(path.as_deref()).context("Invalid configuration")
}

fn build_pipeline(config: Config, http: &HttpClient, quiet: bool) -> Result<Pipeline> {
    let source = ArxivSource::with_client(
        http.clone(),
        ArxivEndpoints::new(&config.arxiv.base_url),
        config.listing.url.clone(),
    );
    let llm = client_from_config(&config).context("Completion service setup")?;
    let progress = if quiet {
        ProgressReporter::hidden()
    } else {
        ProgressReporter::stderr()
    };
    Ok(Pipeline::new(config, Arc::new(source), llm).with_progress(progress))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let mut config = read_config(&cli)?;
    let http = HttpClient::new(&config.http).context("HTTP client setup")?;

    match cli.command {
        Commands::Run { max_items } => {
            if let Some(max_items) = max_items {
                config.pipeline.max_items = max_items;
            }
            if config.listing.url.is_none() {
                bail!("No listing URL configured (set listing.url or ROBODAILY_LISTING_URL)");
            }
            let mut pipeline = build_pipeline(config, &http, cli.quiet)?;
            let report = pipeline.run().await.context("Pipeline run failed")?;
            if !cli.quiet {
                print_status!(Status::Success, format!("Done: {}", report));
            }
        }

        Commands::Add { reference, force } => {
            let mut pipeline = build_pipeline(config, &http, cli.quiet)?;
            match pipeline.add(&reference, force).await? {
                AddOutcome::Added { identifier, kind } => {
                    print_status!(Status::Success, format!("Added {} ({:?})", identifier, kind));
                }
                AddOutcome::SkippedRejected { identifier } => {
                    print_status!(
                        Status::Warning,
                        format!("{} was rejected as off-topic; pass --force to add it anyway", identifier)
                    );
                }
                AddOutcome::SkippedEnriched { identifier } => {
                    print_status!(
                        Status::Info,
                        format!("{} is already summarized; pass --force to regenerate", identifier)
                    );
                }
            }
        }

        Commands::Regen { batch_size, all } => {
            let batch_size = batch_size.unwrap_or(config.pipeline.batch_size);
            let target = if all { RegenTarget::All } else { RegenTarget::Degraded };
            let mut pipeline = build_pipeline(config, &http, cli.quiet)?;
            let report = pipeline.regen(target, batch_size).await?;
            print_status!(Status::Success, format!("Regenerated: {}", report));
        }

        Commands::Backfill { batch_size } => {
            let batch_size = batch_size.unwrap_or(config.pipeline.batch_size);
            let mut pipeline = build_pipeline(config, &http, cli.quiet)?;
            let report = pipeline.backfill(batch_size).await?;
            print_status!(Status::Success, format!("Backfilled: {}", report));
        }

        Commands::Notify { limit, dry_run } => {
            let path = config.paths.dataset_path();
            let snapshot = load_strict(&path)
                .with_context(|| format!("Cannot read dataset {}", path.display()))?;
            let messages = compose_digest(
                &snapshot.items,
                config.relay.agent_id,
                &config.relay.to_user,
                limit,
            );
            if messages.is_empty() {
                print_status!(Status::Info, "Nothing to send");
                return Ok(());
            }

            if dry_run {
                for message in &messages {
                    println!("{}\n", message.markdown.content);
                }
                return Ok(());
            }

            let notifier = notifier_from_config(&config.relay, http.client().clone())?;
            let report = notifier.send(&messages).await?;
            for result in report.results.iter().filter(|r| !r.ok) {
                print_status!(
                    Status::Error,
                    format!(
                        "Message {} failed: {}",
                        result.index,
                        result.error.as_deref().unwrap_or("unknown error")
                    )
                );
            }
            print_status!(
                Status::Success,
                format!("Sent {} messages, {} failed", report.success, report.fail)
            );
            if report.fail > 0 {
                std::process::exit(1);
            }
        }

        Commands::RelayHealth => {
            let notifier = notifier_from_config(&config.relay, http.client().clone())?;
            notifier.health().await?;
            print_status!(Status::Success, "Relay is healthy");
        }

        Commands::List { limit, json } => {
            let path = config.paths.dataset_path();
            let snapshot = load_strict(&path)
                .with_context(|| format!("Cannot read dataset {}", path.display()))?;
            let items: Vec<_> = snapshot.items.iter().take(limit).collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else {
                println!("{}", records_table(items.iter().copied()));
                print_status!(
                    Status::Info,
                    format!("{} of {} papers shown", items.len(), snapshot.items.len())
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_add_with_force() {
        let cli = Cli::try_parse_from(["robodaily", "-v", "add", "2503.01078", "--force"]).unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Add { reference, force } => {
                assert_eq!(reference, "2503.01078");
                assert!(force);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_parses_regen_all() {
        let cli = Cli::try_parse_from(["robodaily", "regen", "--all", "--batch-size", "5"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Regen {
                batch_size: Some(5),
                all: true
            }
        ));
    }
}
