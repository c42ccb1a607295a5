//! Constrained analytics tools over a fixed marketing dataset.
//!
//! The library exposes the tool surface ([`tools::ToolBox`]) a conversational
//! agent calls instead of writing SQL, plus the `insights` command line used
//! to import the dataset and exercise each tool by hand.

pub mod analytics;
pub mod audit;
pub mod config;
pub mod model;
pub mod session;
pub mod storage;
pub mod tools;

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::analytics::types::{AnalyticsError, FilterRequestMap};
use crate::audit::UsageLog;
use crate::config::{AppConfig, ConfigError};
use crate::storage::SqliteStorage;
use crate::tools::{ToolBox, ToolReply};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "insights",
    version,
    about = "Ask constrained analytical questions of the marketing dataset"
)]
pub struct Cli {
    /// SQLite database holding `marketing_data` (overrides config and INSIGHTS_DB_PATH)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Directory for trend artifacts (overrides config and INSIGHTS_OUTPUT_DIR)
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Emit machine-readable JSON instead of plain text
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Single aggregate of a metric (aggregate_metric_simple_where)
    Scalar {
        metric: String,
        agg: String,
        /// Row filter without the WHERE keyword
        #[arg(long = "where", default_value = "")]
        where_clause: String,
    },
    /// Grouped, ordered aggregate (aggregate_with_grouping)
    Grouped {
        metric: String,
        agg: String,
        #[arg(long, default_value = "")]
        group_by: String,
        #[arg(long = "where", default_value = "")]
        where_clause: String,
        /// Sort ascending instead of descending
        #[arg(long)]
        asc: bool,
        /// Maximum rows; 0 or negative means unbounded
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        limit: i64,
    },
    /// Aggregate with exact-match filters (aggregate_metric_filtered)
    Filtered {
        metric: String,
        agg: String,
        /// Filter as COLUMN=VALUE; repeatable
        #[arg(long = "filter", value_name = "COLUMN=VALUE")]
        filters: Vec<String>,
    },
    /// Chronological trend saved as CSV and PNG (plot_trend)
    Trend {
        /// Comma-separated metrics
        metrics: String,
        time_dimension: String,
        #[arg(long = "where", default_value = "")]
        where_clause: String,
    },
    /// Scatter of two metrics (plot_relationship)
    Relationship {
        x: String,
        y: String,
        #[arg(long, default_value = "")]
        category: String,
        #[arg(long)]
        year: Option<i64>,
    },
    /// Dispatch a raw tool call: name plus JSON arguments
    Call {
        name: String,
        #[arg(default_value = "{}")]
        args: String,
    },
    /// Print the function-calling definitions of every tool as JSON
    Tools,
    /// Load a CSV extract into the database
    Import { csv: PathBuf },
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Exit code for a tool call the engine refused; the reply is already printed.
pub const EXIT_REJECTED: i32 = 4;

/// Failure reported by the binary, with a stable exit code and kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliError {
    pub code: i32,
    pub kind: &'static str,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    fn usage(message: impl Into<String>) -> Self {
        Self {
            code: 2,
            kind: "usage",
            message: message.into(),
            hint: None,
        }
    }

    /// JSON payload printed in `--json` mode.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "code": self.code,
                "kind": self.kind,
                "message": self.message,
                "hint": self.hint,
            }
        })
    }
}

impl From<AnalyticsError> for CliError {
    fn from(err: AnalyticsError) -> Self {
        let (kind, hint) = match &err {
            AnalyticsError::MissingTable(_) => (
                "missing_table",
                Some("import a CSV extract with `insights import <file>`".to_string()),
            ),
            AnalyticsError::Db(_) => ("db", None),
            AnalyticsError::Artifact { .. } => ("artifact", None),
            AnalyticsError::Csv(_) => ("csv", None),
            AnalyticsError::Render(_) => ("render", None),
        };
        Self {
            code: 1,
            kind,
            message: err.to_string(),
            hint,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self {
            code: 3,
            kind: "config",
            message: err.to_string(),
            hint: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Install the stderr subscriber. `RUST_LOG` wins over `-v`.
pub fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .ok();
}

// ---------------------------------------------------------------------------
// Running commands
// ---------------------------------------------------------------------------

fn parse_filters(raw: &[String]) -> Result<FilterRequestMap, CliError> {
    let mut map = FilterRequestMap::new();
    for item in raw {
        let (key, value) = item
            .split_once('=')
            .ok_or_else(|| CliError::usage(format!("filter `{item}` is not COLUMN=VALUE")))?;
        map.insert(
            key.trim().to_string(),
            serde_json::Value::String(value.trim().to_string()),
        );
    }
    Ok(map)
}

fn resolve_config(cli: &Cli) -> Result<AppConfig, CliError> {
    let mut config = AppConfig::load()?;
    if let Some(db) = &cli.db {
        config.database_path = db.clone();
    }
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    config.validate()?;
    debug!(
        db = %config.database_path.display(),
        output_dir = %config.output_dir.display(),
        "resolved configuration"
    );
    Ok(config)
}

fn emit_json(value: &impl serde::Serialize) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| CliError {
        code: 1,
        kind: "serialize",
        message: e.to_string(),
        hint: None,
    })?;
    println!("{text}");
    Ok(())
}

fn emit_reply(reply: &ToolReply, json: bool) -> Result<(), CliError> {
    if json {
        emit_json(reply)?;
    } else if reply.is_rejected() {
        println!("{}", reply.render().yellow());
    } else {
        println!("{}", reply.render());
    }
    if let ToolReply::Rejected { code, message } = reply {
        return Err(CliError {
            code: EXIT_REJECTED,
            kind: code,
            message: message.clone(),
            hint: None,
        });
    }
    Ok(())
}

fn import_csv(
    storage: &SqliteStorage,
    csv: &std::path::Path,
    json: bool,
) -> Result<(), CliError> {
    let rows = storage.import_csv(csv)?;
    if json {
        return emit_json(&serde_json::json!({
            "rows": rows,
            "database": storage.path(),
        }));
    }
    println!(
        "Imported {} rows into {}",
        rows.to_string().green(),
        storage.path().display()
    );
    Ok(())
}

/// Execute a parsed command line.
pub fn run(cli: Cli) -> Result<(), CliError> {
    let config = resolve_config(&cli)?;
    let storage = SqliteStorage::new(&config.database_path);
    let toolbox = ToolBox::new(storage, UsageLog::new(), &config.output_dir);

    let reply = match cli.command {
        Commands::Tools => return emit_json(&tools::definitions()),
        Commands::Import { csv } => return import_csv(toolbox.executor(), &csv, cli.json),
        Commands::Scalar {
            metric,
            agg,
            where_clause,
        } => toolbox.aggregate_metric_simple_where(&metric, &agg, &where_clause)?,
        Commands::Grouped {
            metric,
            agg,
            group_by,
            where_clause,
            asc,
            limit,
        } => toolbox.aggregate_with_grouping(&metric, &agg, &group_by, &where_clause, !asc, limit)?,
        Commands::Filtered {
            metric,
            agg,
            filters,
        } => toolbox.aggregate_metric_filtered(&metric, &agg, &parse_filters(&filters)?)?,
        Commands::Trend {
            metrics,
            time_dimension,
            where_clause,
        } => toolbox.plot_trend(&metrics, &time_dimension, &where_clause)?,
        Commands::Relationship {
            x,
            y,
            category,
            year,
        } => toolbox.plot_relationship(&x, &y, &category, year)?,
        Commands::Call { name, args } => {
            let args: serde_json::Value = serde_json::from_str(&args)
                .map_err(|e| CliError::usage(format!("arguments are not valid JSON: {e}")))?;
            toolbox.dispatch(&name, args)?
        }
    };
    emit_reply(&reply, cli.json)
}
