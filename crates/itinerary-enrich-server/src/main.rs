//! itinerary-enrich command-line entry point.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tokio::io::AsyncReadExt;

use itinerary_enrich::EnrichConfig;
use itinerary_enrich_server::{
    client_from_settings, load_settings, plan_report, resolve_config_path, types::EnrichRequest,
    EnrichService, Settings, StdioTransport,
};

#[derive(Parser)]
#[command(
    name = "itinerary-enrich",
    about = "Enrich itinerary documents with place data, one lookup per unique query",
    version
)]
struct Cli {
    /// Path to a JSON settings file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enrich an itinerary file ("-" reads stdin).
    Enrich {
        input: String,

        /// Write output here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write run statistics here; the output then holds the document alone.
        #[arg(long)]
        stats: Option<PathBuf>,

        #[command(flatten)]
        client: ClientArgs,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Show the unique queries a run would look up, without looking them up.
    Plan { input: String },

    /// Serve newline-delimited enrichment requests over stdio.
    Serve {
        #[command(flatten)]
        client: ClientArgs,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Serve enrichment over HTTP.
    #[cfg(feature = "http")]
    ServeHttp {
        /// Listen address (host:port).
        #[arg(long, default_value = "127.0.0.1:3100")]
        addr: String,

        /// Bearer token for authentication.
        /// Also reads from ITINERARY_ENRICH_TOKEN env var.
        #[arg(long)]
        token: Option<String>,

        #[command(flatten)]
        client: ClientArgs,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   itinerary-enrich completions bash > ~/.local/share/bash-completion/completions/itinerary-enrich
    ///   itinerary-enrich completions zsh > ~/.zfunc/_itinerary-enrich
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[derive(Args)]
struct ClientArgs {
    /// Answer lookups from a JSON fixture file instead of the Places API.
    #[arg(long)]
    fixtures: Option<PathBuf>,

    /// Places API key. Also reads from PLACES_API_KEY env var.
    #[arg(long)]
    api_key: Option<String>,
}

#[derive(Args)]
struct RunArgs {
    /// Maximum lookups in flight at once.
    #[arg(long)]
    concurrency: Option<usize>,

    /// Retries per query for transient failures.
    #[arg(long)]
    retries: Option<u32>,

    /// Per-call timeout in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,
}

impl RunArgs {
    fn apply(&self, config: &mut EnrichConfig) {
        if let Some(limit) = self.concurrency {
            config.concurrency_limit = limit;
        }
        if let Some(retries) = self.retries {
            config.retry.max_retries = retries;
        }
        if let Some(ms) = self.timeout_ms {
            config.per_call_timeout = Duration::from_millis(ms);
        }
    }
}

fn build_service(
    config_path: Option<&str>,
    client: &ClientArgs,
    run: &RunArgs,
) -> anyhow::Result<EnrichService> {
    let path = resolve_config_path(config_path);
    let mut settings: Settings = load_settings(path.as_deref())?;
    run.apply(&mut settings.enrich);

    let lookup = client_from_settings(
        &settings,
        client.fixtures.as_deref(),
        client.api_key.as_deref(),
    )?;
    Ok(EnrichService::new(lookup, settings.enrich))
}

async fn read_input(input: &str) -> anyhow::Result<serde_json::Value> {
    let raw = if input == "-" {
        let mut buf = String::new();
        tokio::io::stdin().read_to_string(&mut buf).await?;
        buf
    } else {
        tokio::fs::read_to_string(input)
            .await
            .with_context(|| format!("reading {input}"))?
    };
    serde_json::from_str(&raw).with_context(|| format!("parsing {input} as JSON"))
}

async fn write_json<T: serde::Serialize>(value: &T, path: Option<&Path>) -> anyhow::Result<()> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    match path {
        Some(path) => tokio::fs::write(path, json)
            .await
            .with_context(|| format!("writing {}", path.display())),
        None => {
            print!("{json}");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Enrich {
            input,
            output,
            stats,
            client,
            run,
        } => {
            let service = build_service(cli.config.as_deref(), &client, &run)?;
            let document = read_input(&input).await?;
            let enriched = service
                .enrich(EnrichRequest {
                    document,
                    config: None,
                })
                .await?;

            for failure in enriched.stats.failures() {
                tracing::warn!("Not enriched: {:?} ({:?})", failure.query, failure.status);
            }

            match stats {
                Some(stats_path) => {
                    write_json(&enriched.document, output.as_deref()).await?;
                    write_json(&enriched.stats, Some(&stats_path)).await?;
                }
                None => write_json(&enriched, output.as_deref()).await?,
            }
        }

        Commands::Plan { input } => {
            let document = read_input(&input).await?;
            let report = plan_report(&document)?;
            write_json(&report, None).await?;
        }

        Commands::Serve { client, run } => {
            let service = build_service(cli.config.as_deref(), &client, &run)?;
            let transport = StdioTransport::new(service);
            transport.run().await?;
        }

        #[cfg(feature = "http")]
        Commands::ServeHttp {
            addr,
            token,
            client,
            run,
        } => {
            use itinerary_enrich_server::transport::HttpTransport;

            // Resolve token: CLI flag > env var
            let effective_token = token.or_else(|| std::env::var("ITINERARY_ENRICH_TOKEN").ok());

            let service = build_service(cli.config.as_deref(), &client, &run)?;
            tracing::info!("itinerary-enrich HTTP server ({})", service.client_name());
            if effective_token.is_some() {
                tracing::info!("Auth: bearer token required");
            }

            let transport = HttpTransport::new(service, effective_token);
            transport.run(&addr).await?;
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "itinerary-enrich", &mut std::io::stdout());
        }
    }

    Ok(())
}
