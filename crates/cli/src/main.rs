//! roadcache inspection tool.
//!
//! Reads the same configuration as the agent and works directly on its
//! SQLite store: list generations and entries, show one cached response, or
//! drop every generation but one.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use roadcache_client::canonicalize;
use roadcache_core::{AppConfig, CacheDb, Request};
use serde_json::json;
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "roadcache")]
#[command(about = "Inspect and maintain the roadcache offline store")]
#[command(version)]
struct Args {
    /// Database path (default: `db_path` from configuration)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// List generations, oldest first
    Generations,
    /// List the entries of a generation
    Entries { generation: String },
    /// Show one cached response
    Show {
        generation: String,
        /// Absolute URL, or a path relative to the configured origin
        url: String,
        /// Write the raw body to stdout instead of a summary
        #[arg(long)]
        body: bool,
    },
    /// Delete every generation except the one to keep
    Purge {
        #[arg(long)]
        keep: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = AppConfig::load().context("loading configuration")?;
    let path = args.db.unwrap_or_else(|| config.db_path.clone());
    tracing::debug!(db = %path.display(), "opening cache");

    let store = CacheDb::open(&path)
        .await
        .with_context(|| format!("opening cache at {}", path.display()))?;
    let origin = Url::parse(&config.origin).context("parsing configured origin")?;

    let mut stdout = std::io::stdout().lock();
    run(&store, &origin, args.command, args.json, &mut stdout).await
}

async fn run(store: &CacheDb, origin: &Url, command: Command, as_json: bool, out: &mut impl Write) -> Result<()> {
    match command {
        Command::Generations => {
            let generations = store.list_generations().await?;
            if as_json {
                writeln!(out, "{}", serde_json::to_string_pretty(&generations)?)?;
                return Ok(());
            }
            for generation in generations {
                let active = generation.activated_at.as_deref().map_or("-", |_| "active");
                writeln!(out, "{}\t{}\t{}", generation.name, generation.created_at, active)?;
            }
        }
        Command::Entries { generation } => {
            ensure_generation(store, &generation).await?;
            let entries = store.list_entries(&generation).await?;
            if as_json {
                writeln!(out, "{}", serde_json::to_string_pretty(&entries)?)?;
                return Ok(());
            }
            for entry in entries {
                writeln!(
                    out,
                    "{} {}\t{}\t{}\t{} bytes\t{}",
                    entry.method, entry.url, entry.status, entry.kind, entry.body_len, entry.stored_at
                )?;
            }
        }
        Command::Show { generation, url, body } => {
            ensure_generation(store, &generation).await?;
            let url = canonicalize(&url, origin).with_context(|| format!("invalid url {url}"))?;
            let Some(response) = store.get_entry(&generation, &Request::get(url.as_str())).await? else {
                bail!("{url} is not cached in {generation}");
            };

            if body {
                out.write_all(&response.body)?;
            } else if as_json {
                let value = json!({
                    "url": response.url,
                    "status": response.status,
                    "status_text": response.status_text,
                    "kind": response.kind,
                    "headers": response.headers,
                    "body_len": response.body.len(),
                    "stored_at": response.stored_at,
                });
                writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?;
            } else {
                writeln!(out, "{} {} ({})", response.status, response.status_text, response.kind)?;
                writeln!(out, "url: {}", response.url)?;
                if let Some(stored_at) = &response.stored_at {
                    writeln!(out, "stored: {stored_at}")?;
                }
                for (name, value) in &response.headers {
                    writeln!(out, "{name}: {value}")?;
                }
                writeln!(out, "body: {} bytes", response.body.len())?;
            }
        }
        Command::Purge { keep } => {
            ensure_generation(store, &keep).await?;
            let mut purged = Vec::new();
            for generation in store.list_generations().await? {
                if generation.name != keep && store.delete_generation(&generation.name).await? {
                    tracing::info!(generation = %generation.name, "purged");
                    purged.push(generation.name);
                }
            }
            if as_json {
                writeln!(out, "{}", json!({ "kept": keep, "purged": purged }))?;
            } else {
                writeln!(out, "kept {keep}, purged {}", purged.len())?;
                for name in purged {
                    writeln!(out, "  {name}")?;
                }
            }
        }
    }
    Ok(())
}

async fn ensure_generation(store: &CacheDb, name: &str) -> Result<()> {
    if !store.has_generation(name).await? {
        bail!("no generation named {name}");
    }
    Ok(())
}
