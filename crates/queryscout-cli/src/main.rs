//! QueryScout CLI
//!
//! Scans Java source roots for embedded query call sites, obtains
//! execution plans from the configured databases, and prints per-file
//! reports as JSON.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use queryscout_core::{AnalyzerConfig, FileFullReport, QueryScout, ScanConfig};

#[derive(Parser)]
#[command(name = "queryscout", version, about = "Find risky database queries in Java source")]
struct Cli {
    /// Source roots to scan for query call sites
    #[arg(required = true)]
    roots: Vec<PathBuf>,

    /// Extra dependency roots, used for entity resolution only
    #[arg(long = "deps")]
    dependency_roots: Vec<PathBuf>,

    /// JSON file with connection environments and thresholds
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config: AnalyzerConfig = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("failed to parse config {}", path.display()))?
        }
        None => AnalyzerConfig::default(),
    };

    if config.environments.is_empty() {
        log::warn!("no connection environments configured; every query will fail with a reason");
    }

    let scan = ScanConfig {
        source_roots: cli.roots,
        dependency_roots: cli.dependency_roots,
        ..Default::default()
    };

    let engine = QueryScout::new(config, scan);
    let reports = engine.analyze_project()?;

    let slow_threshold = engine.config().slow_query_threshold;
    for report in &reports {
        let slow = report.slow_queries(slow_threshold).count();
        log::info!(
            "{}: {} queries, {} slow, {} index suggestions, {} failed",
            report.file,
            report.query_scores.len(),
            slow,
            report.recommended_indexes.len(),
            report.index_report.failed_query_parse_list.len()
        );
    }

    let refs: Vec<&FileFullReport> = reports.iter().map(|r| r.as_ref()).collect();
    let json = if cli.pretty {
        serde_json::to_string_pretty(&refs)?
    } else {
        serde_json::to_string(&refs)?
    };
    println!("{}", json);

    Ok(())
}
