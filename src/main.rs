use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use tracing_subscriber::EnvFilter;

use workspace_resolver::config::{default_config_path, load_config, save_config};
use workspace_resolver::errors::ResolverError;
use workspace_resolver::types::*;
use workspace_resolver::workspace::Workspace;

/// Resolve workspace URLs, IDs, and names to canonical object IDs.
#[derive(Parser)]
#[command(name = "wsresolve", about = "Resolve workspace names, URLs and IDs")]
struct Cli {
    /// Path to a config file (default: user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a URL, ID, or name to a canonical ID
    Resolve {
        /// URL, ID, or name
        input: String,
        /// Object kind (database or page)
        #[arg(short, long, default_value = "database")]
        kind: String,
        /// Also match archived objects
        #[arg(long)]
        archived: bool,
        /// Do not sync on a stale cache or a miss
        #[arg(long)]
        no_sync: bool,
    },
    /// Refresh the workspace cache
    Sync {
        /// Sync even if the cache is still fresh
        #[arg(short, long)]
        force: bool,
    },
    /// List cached objects
    List {
        /// Only objects of this kind
        #[arg(short, long)]
        kind: Option<String>,
        /// Substring filter on titles and aliases
        #[arg(short, long)]
        filter: Option<String>,
        /// Include archived objects
        #[arg(long)]
        archived: bool,
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
    /// Reset the workspace cache
    Clear,
    /// Show cache statistics
    Stats {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
    /// Show the effective configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        print_hints(&e);
        process::exit(1);
    }
}

/// Logs go to stderr so stdout stays parseable. `WSRESOLVE_LOG` overrides
/// the default filter.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("WSRESOLVE_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> workspace_resolver::errors::Result<()> {
    if let Commands::Config { init } = cli.command {
        return show_config(cli.config, init).await;
    }

    let ws = Workspace::open(cli.config.as_deref())?;
    match cli.command {
        Commands::Resolve {
            input,
            kind,
            archived,
            no_sync,
        } => {
            let kind = parse_kind(&kind)?;
            let mut options = workspace_resolver::resolution::ResolveOptions::from_config(ws.config());
            options.include_archived = archived;
            if no_sync {
                options.auto_sync = false;
            }
            let resolved = ws.resolve_with(&input, kind, &options).await?;
            println!("{}", resolved.id);
        }
        Commands::Sync { force } => match ws.sync(force).await? {
            SyncOutcome::Completed(stats) => {
                println!(
                    "Sync complete: {} cached, {} failed, {} pages in {}ms",
                    stats.cached, stats.failed, stats.pages, stats.duration_ms
                );
                if stats.is_partial() {
                    println!("  Some objects could not be fetched; run `wsresolve stats` for details");
                }
            }
            SyncOutcome::Skipped(SkipReason::Fresh) => {
                println!("Cache is fresh; use --force to sync anyway");
            }
            SyncOutcome::Skipped(SkipReason::LockHeld) => {
                println!("Another sync is already running");
            }
        },
        Commands::List {
            kind,
            filter,
            archived,
            json,
        } => {
            let filter = CacheFilter {
                kind: kind.as_deref().map(parse_kind).transpose()?,
                query: filter,
                include_archived: archived,
            };
            let entries = ws.list_cached(&filter).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("No cached objects");
            } else {
                for e in &entries {
                    let archived = if e.archived { " [archived]" } else { "" };
                    println!("{}  {} ({}){}", e.id, e.title, e.kind, archived);
                }
            }
        }
        Commands::Clear => {
            ws.clear_cache().await?;
            println!("Cache cleared");
        }
        Commands::Stats { json } => {
            let stats = ws.cache_stats().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Workspace Cache");
                println!("  Path:    {}", ws.store().path().display());
                println!("  Entries: {}", stats.count);
                match stats.age_ms {
                    Some(age) => println!("  Age:     {}s", age / 1000),
                    None => println!("  Age:     never synced"),
                }
                println!("  Size:    {} bytes", stats.size_bytes);
                println!("  Recent sync errors: {}", stats.sync_errors);
            }
        }
        Commands::Config { .. } => {}
    }
    Ok(())
}

/// Prints the effective configuration, and with `init` persists it.
async fn show_config(path: Option<PathBuf>, init: bool) -> workspace_resolver::errors::Result<()> {
    let config = load_config(path.as_deref())?;
    if init {
        let target = path.or_else(default_config_path).ok_or_else(|| ResolverError::Config {
            message: "no config directory available; pass --config".to_string(),
        })?;
        save_config(&target, &config).await?;
        eprintln!("Wrote {}", target.display());
    }
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn parse_kind(s: &str) -> workspace_resolver::errors::Result<ObjectKind> {
    ObjectKind::from_str(s).ok_or_else(|| ResolverError::validation(s, "kind must be 'database' or 'page'"))
}

/// Prints remediation hints for errors that carry structured detail.
fn print_hints(e: &ResolverError) {
    match e {
        ResolverError::NotFound {
            suggestions,
            remote_error,
            ..
        } => {
            if !suggestions.is_empty() {
                eprintln!("  Did you mean: {}", suggestions.join(", "));
            }
            if let Some(err) = remote_error {
                eprintln!("  Remote search unavailable: {}", err);
            }
            eprintln!("  Try `wsresolve sync --force`, or pass the object's URL or ID");
        }
        ResolverError::Ambiguous { candidates, .. } => {
            for (id, title) in candidates {
                eprintln!("  {}  {}", id, title);
            }
            eprintln!("  Pass one of the IDs above instead of the name");
        }
        _ => {}
    }
}
