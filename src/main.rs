mod badges;
mod certification;
mod config;
mod error;
mod fetcher;
mod pacing;
mod parser;
mod pipeline;
mod record;
mod table;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::warn;

use crate::badges::{ChromeRenderer, Renderer};
use crate::config::Settings;
use crate::pacing::TokioDelay;
use crate::pipeline::{Enricher, FailurePolicy, PassStats};
use crate::table::Table;

#[derive(Parser)]
#[command(name = "imdb_enricher", about = "Enrich a title watchlist CSV with catalog metadata")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enrich then certify; the enriched table is also kept as <out stem>_enriched.csv
    Run {
        #[command(flatten)]
        files: Files,
        #[command(flatten)]
        opts: Opts,
    },
    /// Add genre, languages, credits, cast, poster and streaming badges
    Enrich {
        #[command(flatten)]
        files: Files,
        #[command(flatten)]
        opts: Opts,
    },
    /// Add the Certification column
    Certify {
        #[command(flatten)]
        files: Files,
        #[command(flatten)]
        opts: Opts,
    },
    /// Enrich a single title and print it as JSON
    Title {
        /// Title identifier, e.g. tt0111161
        id: String,
        #[command(flatten)]
        opts: Opts,
    },
}

#[derive(Args)]
struct Files {
    /// Input CSV
    #[arg(short, long)]
    input: PathBuf,
    /// Output CSV
    #[arg(short, long)]
    output: PathBuf,
}

#[derive(Args)]
struct Opts {
    /// Column holding title identifiers (default: Const)
    #[arg(long)]
    id_column: Option<String>,
    /// Catalog base URL; title pages are <base>/<id>/
    #[arg(long)]
    base_url: Option<String>,
    /// Don't launch a browser for streaming badges
    #[arg(long)]
    skip_badges: bool,
    /// Run the browser without a window
    #[arg(long)]
    headless: bool,
    /// Stop at the first title whose page can't be fetched
    #[arg(long)]
    fail_fast: bool,
}

impl Opts {
    /// Flags win over file and environment values.
    fn apply(&self, settings: &mut Settings) {
        if let Some(col) = &self.id_column {
            settings.id_column = col.clone();
        }
        if let Some(url) = &self.base_url {
            settings.base_url = url.clone();
        }
        if self.headless {
            settings.headless = true;
        }
    }

    fn policy(&self) -> FailurePolicy {
        if self.fail_fast {
            FailurePolicy::Abort
        } else {
            FailurePolicy::Continue
        }
    }

    fn enricher(&self) -> anyhow::Result<Enricher> {
        let mut settings = Settings::load().context("loading settings")?;
        self.apply(&mut settings);

        let renderer: Option<Arc<dyn Renderer>> = if self.skip_badges {
            None
        } else {
            Some(Arc::new(ChromeRenderer::new(&settings)))
        };
        Ok(Enricher::new(&settings, renderer, Arc::new(TokioDelay), self.policy())?)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { files, opts } => {
            let enricher = opts.enricher()?;
            let table = read_input(&files.input)?;

            let t_enrich = Instant::now();
            println!("Pass 1: enriching {} titles...", table.len());
            let (table, stats) = enricher.enrich_table(table).await?;
            print_stats("Enriched", &stats, t_enrich);

            write_output(&table, &enriched_path(&files.output))?;

            let t_certify = Instant::now();
            println!("Pass 2: certifying {} titles...", table.len());
            let (table, stats) = enricher.certify_table(table).await?;
            print_stats("Certified", &stats, t_certify);

            write_output(&table, &files.output)?;
            Ok(())
        }
        Commands::Enrich { files, opts } => {
            let enricher = opts.enricher()?;
            let table = read_input(&files.input)?;
            let t_enrich = Instant::now();
            println!("Enriching {} titles...", table.len());
            let (table, stats) = enricher.enrich_table(table).await?;
            print_stats("Enriched", &stats, t_enrich);
            write_output(&table, &files.output)?;
            Ok(())
        }
        Commands::Certify { files, opts } => {
            let enricher = opts.enricher()?;
            let table = read_input(&files.input)?;
            let t_certify = Instant::now();
            println!("Certifying {} titles...", table.len());
            let (table, stats) = enricher.certify_table(table).await?;
            print_stats("Certified", &stats, t_certify);
            write_output(&table, &files.output)?;
            Ok(())
        }
        Commands::Title { id, opts } => {
            let enricher = opts.enricher()?;
            let record = enricher.enrich_title(id.trim()).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn read_input(path: &Path) -> anyhow::Result<Table> {
    let table = Table::read_csv(path).with_context(|| format!("reading {}", path.display()))?;
    if table.is_empty() {
        warn!("{} has no data rows", path.display());
    }
    Ok(table)
}

fn write_output(table: &Table, path: &Path) -> anyhow::Result<()> {
    table
        .write_csv(path)
        .with_context(|| format!("writing {}", path.display()))?;
    println!(
        "Wrote {} ({} rows, {} columns)",
        path.display(),
        table.len(),
        table.headers().len()
    );
    Ok(())
}

fn print_stats(verb: &str, stats: &PassStats, started: Instant) {
    println!(
        "{} {} titles ({} ok, {} errors) in {:.1}s",
        verb,
        stats.total,
        stats.ok,
        stats.errors,
        started.elapsed().as_secs_f64()
    );
}

/// `out/final.csv` -> `out/final_enriched.csv`
fn enriched_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    output.with_file_name(format!("{}_enriched.csv", stem))
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
