use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sifter::Sifter;
use sifter::index::stats::show_stats;
use sifter::utils::{PreparedHashes, SifterConfig};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sifter")]
#[command(about = "Bloom-filter candidate index for substring search over a file tree")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Hash functions per token (overrides config)
    #[arg(short, global = true)]
    k: Option<u32>,

    /// Bloom slots per file (overrides config)
    #[arg(short, global = true)]
    m: Option<usize>,

    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Prepared hash table produced by `sifter prepare`
    #[arg(long, global = true)]
    prepared: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build or rebuild the cache for a directory tree
    Build {
        /// Directory to index
        #[arg(default_value = ".")]
        base: PathBuf,

        /// Cache directory
        #[arg(short, long, default_value = "cache")]
        cache: PathBuf,
    },
    /// List files that may contain a pattern
    Find {
        /// Substring to look for
        pattern: String,

        /// Cache directory
        #[arg(short, long, default_value = "cache")]
        cache: PathBuf,

        /// Print one path per line
        #[arg(short = 'n', long)]
        newline: bool,
    },
    /// Precompute hashes for a token list (one token per line)
    Prepare {
        /// Token list
        input: PathBuf,

        /// Output JSON file
        #[arg(short, long, default_value = "prepared_hashes.json")]
        output: PathBuf,
    },
    /// Show cache statistics
    Stats {
        /// Cache directory
        #[arg(short, long, default_value = "cache")]
        cache: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    match cli.command {
        Commands::Build { base, cache } => {
            let sifter = Sifter::from_config(config)
                .context("Invalid configuration")?
                .with_progress(std::io::stderr().is_terminal());
            let stats = sifter
                .build(&base, &cache)
                .with_context(|| format!("Failed to build cache for {}", base.display()))?;

            println!(
                "Indexed {} files into {} ({} bitmaps, k={}, m={}) in {:.2}s",
                stats.files_indexed,
                cache.display(),
                stats.bitmaps_written,
                sifter.params().k,
                sifter.params().m,
                stats.elapsed.as_secs_f64()
            );
        }
        Commands::Find {
            pattern,
            cache,
            newline,
        } => {
            let sifter = Sifter::from_config(config).context("Invalid configuration")?;
            let paths = sifter
                .query(&pattern, &cache)
                .with_context(|| format!("Query failed against {}", cache.display()))?;

            if newline {
                for path in &paths {
                    println!("{}", path);
                }
            } else {
                println!("{}", paths.join(" "));
            }
        }
        Commands::Prepare { input, output } => {
            let prepared = PreparedHashes::prepare_from_file(config.k, &input)
                .with_context(|| format!("Failed to read tokens from {}", input.display()))?;
            prepared
                .save(&output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!(
                "Prepared {} tokens (k={}) into {}",
                prepared.len(),
                prepared.k(),
                output.display()
            );
        }
        Commands::Stats { cache } => {
            show_stats(&cache)?;
        }
    }

    Ok(())
}

/// Config file (or defaults) with command-line overrides applied
fn resolve_config(cli: &Cli) -> Result<SifterConfig> {
    let mut config = match cli.config {
        Some(ref path) => load_config(path)?,
        None => SifterConfig::default(),
    };

    if let Some(k) = cli.k {
        config.k = k;
    }
    if let Some(m) = cli.m {
        config.m = m;
    }
    if let Some(ref prepared) = cli.prepared {
        config.prepared_hashes = Some(prepared.clone());
    }
    Ok(config)
}

fn load_config(path: &Path) -> Result<SifterConfig> {
    SifterConfig::load(path).with_context(|| format!("Failed to load config {}", path.display()))
}
