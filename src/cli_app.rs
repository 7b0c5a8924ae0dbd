//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use flux_activity::activity::engine::{ActivityEngine, ActivityRequest, ActivityResponse};
use flux_activity::activity::normalize::ActivityEvent;
use flux_activity::core::config::Config;
use flux_activity::core::errors::FxaError;
use flux_activity::filters::condition::{FilterCondition, FilterOperator, FilterValue, GlobalFilter};
use flux_activity::filters::decode::try_decode_filters;
use flux_activity::filters::expand::expand;
use flux_activity::store::sqlite::SqliteStore;

/// Flux activity feed: merged, filtered history across all pipeline stages.
#[derive(Debug, Parser)]
#[command(
    name = "fxa",
    author,
    version,
    about = "Flux activity feed aggregator",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Increase verbosity.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Print one page of the merged activity feed.
    Activity(ActivityArgs),
    /// Show how a global filter fans out per category.
    Expand(ExpandArgs),
    /// View configuration state.
    Config(ConfigArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args)]
struct ActivityArgs {
    /// Owner id, or `all`.
    #[arg(long, default_value = "all", value_name = "SCOPE")]
    scope: String,
    /// 1-based page number.
    #[arg(long, default_value_t = 1, value_name = "N")]
    page: u32,
    /// Events per page (defaults to engine.default_page_size).
    #[arg(long, value_name = "N")]
    page_size: Option<u32>,
    /// Filter condition as JSON; repeatable.
    #[arg(long = "filter", value_name = "JSON")]
    filters: Vec<String>,
    /// Transport-encoded filter list, as sent in the `filters` query parameter.
    #[arg(long, value_name = "STR")]
    filters_b64: Option<String>,
}

#[derive(Debug, Clone, Args)]
struct ExpandArgs {
    /// Global field name (for example `status` or `dateRange`).
    #[arg(long, value_name = "FIELD")]
    field: String,
    /// Filter operator.
    #[arg(long, default_value = "in", value_name = "OP")]
    operator: String,
    /// Filter value as JSON.
    #[arg(long, default_value = "null", value_name = "JSON")]
    value: String,
}

#[derive(Debug, Clone, Args, Default)]
struct ConfigArgs {
    /// Config operation to run.
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print resolved config file path.
    Path,
    /// Print effective merged configuration.
    Show,
    /// Validate configuration and exit.
    Validate,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Internal(_) | Self::Json(_) => 3,
        }
    }

    fn classify(error: &FxaError) -> Self {
        if error.is_user_error() || matches!(error, FxaError::MissingConfig { .. }) {
            Self::User(error.to_string())
        } else if matches!(error, FxaError::Serialization { .. }) {
            Self::Internal(error.to_string())
        } else {
            Self::Runtime(error.to_string())
        }
    }
}

impl From<FxaError> for CliError {
    fn from(error: FxaError) -> Self {
        Self::classify(&error)
    }
}

/// Install the stderr log subscriber.
///
/// `FXA_LOG` wins over `RUST_LOG`; with neither set, `-v`/`-q` pick the level.
pub fn init_tracing(cli: &Cli) {
    let fallback = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_env("FXA_LOG")
        .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_ansi(!cli.no_color && io::stderr().is_terminal())
        .init();
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Activity(args) => run_activity(cli, args),
        Command::Expand(args) => run_expand(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

// ──────────────────── activity ────────────────────

fn build_request(args: &ActivityArgs, default_page_size: u32) -> Result<ActivityRequest, CliError> {
    let mut filters = Vec::with_capacity(args.filters.len());
    for raw in &args.filters {
        let filter: FilterCondition = serde_json::from_str(raw)
            .map_err(|e| CliError::User(format!("invalid --filter {raw:?}: {e}")))?;
        filters.push(filter);
    }
    if let Some(encoded) = &args.filters_b64 {
        filters.extend(try_decode_filters(encoded)?);
    }
    Ok(ActivityRequest {
        scope_id: args.scope.clone(),
        page: args.page,
        page_size: args.page_size.unwrap_or(default_page_size),
        filters,
    })
}

fn run_activity(cli: &Cli, args: &ActivityArgs) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    let request = build_request(args, config.engine.default_page_size)?;
    let store = SqliteStore::from_config(&config.store)?;
    let engine = ActivityEngine::new(store, &config);

    let result = engine.get_activities(&request);
    let failure = result.as_ref().err().map(CliError::classify);
    let response = ActivityResponse::from_result(result);

    match output_mode(cli) {
        OutputMode::Json => write_json_line(&serde_json::to_value(&response)?)?,
        OutputMode::Human => print_activity_page(&request, &response),
    }
    failure.map_or(Ok(()), Err)
}

fn print_activity_page(request: &ActivityRequest, response: &ActivityResponse) {
    if let Some(error) = &response.error {
        eprintln!("{} {error}", "error:".red().bold());
        return;
    }
    if response.activities.is_empty() {
        println!("No activity (scope {}, page {}).", request.scope_id, request.page);
        return;
    }

    println!(
        "{:<24}  {:<13}  {:<22}  {:<10}  {}",
        "TIMESTAMP".bold(),
        "TYPE".bold(),
        "ID".bold(),
        "STATUS".bold(),
        "ERROR".bold()
    );
    for event in &response.activities {
        println!(
            "{:<24}  {:<13}  {:<22}  {:<10}  {}",
            event.data.get("timestamp").and_then(Value::as_str).unwrap_or("-"),
            event.kind.as_str(),
            event.id,
            status_label(event),
            event
                .data
                .get("errorMessage")
                .and_then(Value::as_str)
                .unwrap_or("")
                .dimmed()
        );
    }
    let more = if response.has_more { "yes" } else { "no" };
    println!();
    println!(
        "page {} · {} shown · more: {more} · total ≥ {}",
        request.page,
        response.activities.len(),
        response.total
    );
}

fn status_label(event: &ActivityEvent) -> String {
    let status = event
        .data
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or("-");
    match status.to_ascii_lowercase().as_str() {
        "failed" | "error" => status.red().to_string(),
        "success" | "completed" => status.green().to_string(),
        "running" | "pending" | "processing" => status.yellow().to_string(),
        _ => status.to_string(),
    }
}

// ──────────────────── expand ────────────────────

fn run_expand(cli: &Cli, args: &ExpandArgs) -> Result<(), CliError> {
    let value: FilterValue = serde_json::from_str(&args.value)
        .map_err(|e| CliError::User(format!("invalid --value {:?}: {e}", args.value)))?;
    let global = GlobalFilter {
        field: args.field.clone(),
        operator: FilterOperator::parse(&args.operator),
        value,
    };
    let expanded: Vec<FilterCondition> = expand(&global)
        .into_iter()
        .map(FilterCondition::Scoped)
        .collect();

    match output_mode(cli) {
        OutputMode::Json => {
            let payload = json!({
                "command": "expand",
                "field": args.field,
                "filters": serde_json::to_value(&expanded)?,
            });
            write_json_line(&payload)?;
        }
        OutputMode::Human => {
            if expanded.is_empty() {
                println!("Global field {:?} maps to no categories.", args.field);
            }
            for filter in &expanded {
                if let FilterCondition::Scoped(scoped) = filter {
                    let category = scoped.category.map_or("-", |c| c.as_str());
                    let reach = if scoped.category.and_then(|c| c.source()).is_some() {
                        ""
                    } else {
                        " (not an activity source)"
                    };
                    println!("{category:<14} {}{}", scoped.field, reach.dimmed());
                }
            }
        }
    }
    Ok(())
}

// ──────────────────── config ────────────────────

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match &args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let exists = path.exists();

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = Config::load(cli.config.as_deref())?;

            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Internal(format!("serialize config: {e}")))?;
                    println!("{toml_str}");
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config show",
                        "config": serde_json::to_value(&config)?,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => match Config::load(cli.config.as_deref()) {
            Ok(config) => {
                let hash = config.stable_hash()?;

                match output_mode(cli) {
                    OutputMode::Human => {
                        println!("Configuration is valid.");
                        println!("  Source: {}", config.paths.config_file.display());
                        println!("  Hash: {hash}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": true,
                            "path": config.paths.config_file.to_string_lossy(),
                            "hash": hash,
                        });
                        write_json_line(&payload)?;
                    }
                }
                Ok(())
            }
            Err(e) => {
                match output_mode(cli) {
                    OutputMode::Human => {
                        eprintln!("Configuration is INVALID: {e}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": false,
                            "code": e.code(),
                            "error": e.to_string(),
                        });
                        write_json_line(&payload)?;
                    }
                }
                Err(CliError::User(format!("invalid config: {e}")))
            }
        },
    }
}

// ──────────────────── output ────────────────────

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("FXA_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}
