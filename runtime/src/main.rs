// Copyright 2026 Route Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use route_harvest::cli::{self, anchors_cmd, network_cmd::NetworkOptions, ReportArgs};
use route_harvest::extraction::HarvestMode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "harvest",
    about = "Harvest API, RSC, route, and anchor links from a web page into spreadsheet reports",
    version,
    after_help = "Run 'harvest <command> --help' for details on each command."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record API requests made while a page loads
    ApiRoutes {
        /// Page to load
        url: String,
        /// Primary navigation timeout in milliseconds
        #[arg(long)]
        timeout: Option<u64>,
        #[command(flatten)]
        report: ReportArgs,
    },
    /// Record React Server Component payload requests while browsing a page
    RscRoutes {
        /// Page to load
        url: String,
        /// Number of internal links to click
        #[arg(long, default_value = "5")]
        clicks: usize,
        /// Primary navigation timeout in milliseconds
        #[arg(long)]
        timeout: Option<u64>,
        #[command(flatten)]
        report: ReportArgs,
    },
    /// Collect same-host routes from a rendered page
    Routes {
        /// Base URL of the site
        url: String,
        /// Primary navigation timeout in milliseconds
        #[arg(long)]
        timeout: Option<u64>,
        #[command(flatten)]
        report: ReportArgs,
    },
    /// Collect anchors whose href starts with '#' from one or more pages
    HashLinks {
        /// Pages to fetch
        #[arg(required = true)]
        urls: Vec<String>,
        /// Per-request timeout in milliseconds
        #[arg(long, default_value_t = anchors_cmd::DEFAULT_FETCH_TIMEOUT_MS)]
        timeout: u64,
        #[command(flatten)]
        report: ReportArgs,
    },
    /// Collect anchors whose href is exactly '#'
    PlaceholderLinks {
        /// Page to fetch
        url: String,
        /// Request timeout in milliseconds
        #[arg(long, default_value_t = anchors_cmd::DEFAULT_FETCH_TIMEOUT_MS)]
        timeout: u64,
        #[command(flatten)]
        report: ReportArgs,
    },
    /// Check environment and diagnose issues
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

fn init_tracing(verbose: bool, quiet: bool) {
    let directive = if verbose {
        "route_harvest=debug"
    } else if quiet {
        "route_harvest=warn"
    } else {
        "route_harvest=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global flags via environment variables so all modules can check them
    if cli.json {
        std::env::set_var("HARVEST_JSON", "1");
    }
    if cli.quiet {
        std::env::set_var("HARVEST_QUIET", "1");
    }
    if cli.verbose {
        std::env::set_var("HARVEST_VERBOSE", "1");
    }
    if cli.no_color {
        std::env::set_var("HARVEST_NO_COLOR", "1");
    }
    init_tracing(cli.verbose, cli.quiet || cli.json);

    let result = match cli.command {
        Commands::ApiRoutes {
            url,
            timeout,
            report,
        } => {
            let options = NetworkOptions {
                timeout_ms: timeout,
                clicks: 0,
                report,
            };
            cli::network_cmd::run(HarvestMode::ApiRoutes, &url, &options).await
        }
        Commands::RscRoutes {
            url,
            clicks,
            timeout,
            report,
        } => {
            let options = NetworkOptions {
                timeout_ms: timeout,
                clicks,
                report,
            };
            cli::network_cmd::run(HarvestMode::RscRoutes, &url, &options).await
        }
        Commands::Routes {
            url,
            timeout,
            report,
        } => cli::routes_cmd::run(&url, timeout, &report).await,
        Commands::HashLinks {
            urls,
            timeout,
            report,
        } => anchors_cmd::run(HarvestMode::HashLinks, &urls, timeout, &report).await,
        Commands::PlaceholderLinks {
            url,
            timeout,
            report,
        } => {
            anchors_cmd::run(
                HarvestMode::PlaceholderLinks,
                std::slice::from_ref(&url),
                timeout,
                &report,
            )
            .await
        }
        Commands::Doctor => cli::doctor::run().await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "harvest", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if cli::output::is_json() {
            cli::output::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        } else if !cli::output::is_quiet() {
            eprintln!("  Error: {e:#}");
        }
        std::process::exit(1);
    }

    result
}
