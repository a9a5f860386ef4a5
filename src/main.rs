//! git-ingest - turn a repository's history into commit and file records
//!
//! # Usage
//! ```bash
//! git-ingest ingest /path/to/repository          # Print records as JSON
//! git-ingest ingest https://host/org/repo.git    # Clone, ingest, clean up
//! git-ingest log . --author "Jane" --max-count 20
//! git-ingest exec . git log --oneline
//! git-ingest serve --port 3001                   # HTTP surface
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use git_ingest::git::CommandGitRunner;
use git_ingest::models::{LogFormat, LogQuery};
use git_ingest::{AppError, Config, IngestPipeline, routes};

/// Git history ingestion - commits, files, complexity and authors as JSON
#[derive(Parser)]
#[command(name = "git-ingest")]
#[command(about = "Ingest git history into structured records", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON configuration file overlaying the defaults
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log progress at info level
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a local repository path or an https URL
    Ingest {
        #[arg(value_name = "PATH_OR_URL")]
        target: String,

        /// Repository identifier echoed in the result
        #[arg(long)]
        id: Option<String>,
    },
    /// Run a filtered log query
    Log(LogArgs),
    /// Run a whitelisted read-only git command
    Exec {
        #[arg(value_name = "REPO_PATH")]
        path: String,

        #[arg(value_name = "COMMAND", trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        command: Vec<String>,
    },
    /// Serve the pipeline over HTTP
    Serve {
        #[arg(short, long, default_value = "3001")]
        port: u16,
    },
}

#[derive(Args)]
struct LogArgs {
    #[arg(value_name = "REPO_PATH")]
    path: String,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    format: LogFormat,

    #[arg(long)]
    stat: bool,

    #[arg(long)]
    numstat: bool,

    #[arg(long)]
    max_count: Option<usize>,

    #[arg(long)]
    since: Option<String>,

    #[arg(long)]
    until: Option<String>,

    #[arg(long)]
    author: Option<String>,

    #[arg(long)]
    grep: Option<String>,

    #[arg(long)]
    file: Option<String>,
}

impl From<LogArgs> for LogQuery {
    fn from(args: LogArgs) -> Self {
        LogQuery {
            format: args.format,
            stat: args.stat,
            numstat: args.numstat,
            max_count: args.max_count,
            since: args.since,
            until: args.until,
            author: args.author,
            grep: args.grep,
            file: args.file,
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn fail(err: AppError) -> ! {
    eprintln!("{}", err.to_payload());
    std::process::exit(1);
}

fn repository_id_for(target: &str) -> String {
    target
        .trim_end_matches('/')
        .trim_end_matches(".git")
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("repository")
        .to_string()
}

async fn serve(pipeline: IngestPipeline, port: u16) -> anyhow::Result<()> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(routes::create_router(pipeline))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = format!("127.0.0.1:{}", port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("✗ Failed to bind to port {}: {}", port, e);
            eprintln!("  Try a different port with --port <PORT>");
            std::process::exit(1);
        }
    };

    println!("  git-ingest listening on http://{}", addr);
    println!("  Press Ctrl+C to stop");

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
        }
        println!("\n  Shutting down...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load(cli.config.as_deref()).unwrap_or_else(|e| fail(e));
    let pipeline = IngestPipeline::new(Arc::new(config), Arc::new(CommandGitRunner::new()));

    match cli.command {
        Commands::Ingest { target, id } => {
            let id = id.unwrap_or_else(|| repository_id_for(&target));
            let result = if target.starts_with("https://") {
                pipeline.ingest_remote(&id, &target).await
            } else {
                pipeline.ingest(&id, &target).await
            };
            print_json(&result.unwrap_or_else(|e| fail(e)))?;
        }
        Commands::Log(args) => {
            let root = pipeline
                .resolve_repository(&args.path)
                .unwrap_or_else(|e| fail(e));
            let response = pipeline
                .gateway()
                .query_log(&root.path, &args.into())
                .await
                .unwrap_or_else(|e| fail(e));
            print_json(&response)?;
        }
        Commands::Exec { path, command } => {
            let root = pipeline.resolve_repository(&path).unwrap_or_else(|e| fail(e));
            let response = pipeline
                .gateway()
                .run_command(&root.path, &command.join(" "))
                .await
                .unwrap_or_else(|e| fail(e));
            print!("{}", response.output);
        }
        Commands::Serve { port } => serve(pipeline, port).await?,
    }

    Ok(())
}
