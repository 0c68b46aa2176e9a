//! Queryfilter CLI
//!
//! Command-line interface for extracting metric filters and grouping keys
//! from ClickHouse SQL and PromQL queries.
//!
//! # Usage
//!
//! ```bash
//! queryfilter --help
//! queryfilter extract --dialect promql --query 'sum by (pod) (rate(x[5m]))'
//! queryfilter extract --dialect clickhouse_sql --file query.sql
//! queryfilter resolve --file envelopes.json
//! queryfilter parse --query 'SELECT 1'
//! ```

#![deny(unsafe_code)]

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use queryfilter::promql::PromQLFilterExtractor;
use queryfilter::sql::{parse_statement, ClickHouseFilterExtractor};
use queryfilter::{CompositeResolver, ExtractorConfig, ExtractorKind, QueryEnvelope};
use std::io::Read;
use std::path::PathBuf;
use tracing::debug;

/// Queryfilter CLI - metric filter and group-by extraction
#[derive(Parser)]
#[command(name = "queryfilter")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Column holding the metric name in SQL queries
    #[arg(long, global = true)]
    metric_column: Option<String>,

    /// Label holding the metric name in PromQL queries
    #[arg(long, global = true)]
    metric_label: Option<String>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract metric names and grouping columns from one query
    Extract {
        /// Query dialect (promql or clickhouse_sql)
        #[arg(short, long)]
        dialect: ExtractorKind,

        #[command(flatten)]
        input: Input,
    },
    /// Resolve a JSON array of query envelopes
    Resolve {
        /// File containing the envelopes; stdin when omitted
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Print the parsed SQL syntax tree as JSON
    Parse {
        #[command(flatten)]
        input: Input,
    },
}

#[derive(Args)]
struct Input {
    /// Query text
    #[arg(short, long, conflicts_with = "file")]
    query: Option<String>,

    /// File containing the query text
    #[arg(short, long)]
    file: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let mut config = ExtractorConfig::from_env()?;
    if let Some(column) = cli.metric_column {
        config = config.with_metric_name_column(column);
    }
    if let Some(label) = cli.metric_label {
        config = config.with_metric_name_label(label);
    }
    debug!(?config, "Loaded extractor configuration");

    let output = match cli.command {
        Commands::Extract { dialect, input } => {
            let query = read_input(input.query, input.file.as_ref())?;
            let result = match dialect {
                ExtractorKind::ClickHouse => {
                    ClickHouseFilterExtractor::with_config(config).extract(&query)?
                }
                ExtractorKind::PromQL => PromQLFilterExtractor::with_config(config).extract(&query)?,
            };
            serde_json::to_string_pretty(&result)?
        }
        Commands::Resolve { file } => {
            let text = read_input(None, file.as_ref())?;
            let envelopes: Vec<QueryEnvelope> =
                serde_json::from_str(&text).context("Failed to parse query envelopes")?;
            let results = CompositeResolver::with_config(config).resolve(&envelopes)?;
            serde_json::to_string_pretty(&results)?
        }
        Commands::Parse { input } => {
            let query = read_input(input.query, input.file.as_ref())?;
            let statement = parse_statement(&query)?;
            serde_json::to_string_pretty(&statement)?
        }
    };

    println!("{output}");
    Ok(())
}

/// Logs go to stderr so stdout carries only the JSON result.
fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn read_input(query: Option<String>, file: Option<&PathBuf>) -> anyhow::Result<String> {
    if let Some(query) = query {
        return Ok(query);
    }
    if let Some(path) = file {
        return std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()));
    }
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("Failed to read query from stdin")?;
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_requires_command() {
        let cli = Cli::try_parse_from(["queryfilter"]);
        assert!(cli.is_err());
    }

    #[test]
    fn test_cli_extract_command() {
        let cli = Cli::try_parse_from([
            "queryfilter",
            "extract",
            "--dialect",
            "promql",
            "--query",
            "up",
        ])
        .unwrap();
        match cli.command {
            Commands::Extract { dialect, input } => {
                assert_eq!(dialect, ExtractorKind::PromQL);
                assert_eq!(input.query.as_deref(), Some("up"));
            }
            _ => panic!("expected extract command"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_dialect() {
        let cli = Cli::try_parse_from(["queryfilter", "extract", "--dialect", "influxql"]);
        assert!(cli.is_err());
    }

    #[test]
    fn test_cli_query_conflicts_with_file() {
        let cli = Cli::try_parse_from([
            "queryfilter",
            "parse",
            "--query",
            "SELECT 1",
            "--file",
            "q.sql",
        ]);
        assert!(cli.is_err());
    }

    #[test]
    fn test_cli_global_options() {
        let cli = Cli::try_parse_from([
            "queryfilter",
            "resolve",
            "--file",
            "envelopes.json",
            "--metric-column",
            "name",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.metric_column.as_deref(), Some("name"));
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(matches!(cli.command, Commands::Resolve { file: Some(_) }));
    }

    #[test]
    fn test_read_input_prefers_query() {
        let text = read_input(Some("up".to_string()), None).unwrap();
        assert_eq!(text, "up");
    }
}
