use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Args, Parser, Subcommand, ValueEnum};
use seedbed_core::DatabaseSchema;
use seedbed_store::{CycleBreakPolicy, DialectKind, SeedStore, StoreOptions};
use uuid::Uuid;

use seedbed_cli::{
    CliError, CliResult, DryRunExecutor, Executor, PostgresExecutor, SeedbedConfig, init_logging,
    load_config, store_from_files,
};

#[derive(Parser, Debug)]
#[command(name = "seedbed", version, about = "Seedbed CLI")]
struct Cli {
    /// Path to seedbed.toml (defaults to ./seedbed.toml when present).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve rows and write the ordered SQL statements.
    Emit(EmitArgs),
    /// Validate rows and print the resolution report as JSON.
    Check(InputArgs),
    /// Resolve rows and execute the statements in one transaction.
    Apply(ApplyArgs),
    /// Print the JSON Schema of schema.json snapshots.
    JsonSchema(JsonSchemaArgs),
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Schema snapshot (schema.json).
    #[arg(long)]
    schema: PathBuf,
    /// Rows file (JSON).
    #[arg(long)]
    rows: PathBuf,
    /// Target dialect, overrides the config file.
    #[arg(long, value_enum)]
    dialect: Option<DialectArg>,
    /// Cycle tie-break policy, overrides the config file.
    #[arg(long, value_enum)]
    cycle_break: Option<CycleBreakArg>,
    /// Skip the unique constraint capacity check.
    #[arg(long, default_value_t = false)]
    no_capacity_check: bool,
}

#[derive(Args, Debug)]
struct EmitArgs {
    #[command(flatten)]
    input: InputArgs,
    /// Output path for the SQL script (stdout when omitted).
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ApplyArgs {
    #[command(flatten)]
    input: InputArgs,
    /// Database connection string.
    #[arg(long, value_name = "CONNECTION_STRING")]
    conn: Option<String>,
    /// Log the statements instead of executing them.
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[derive(Args, Debug)]
struct JsonSchemaArgs {
    /// Output path (stdout when omitted).
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum DialectArg {
    Postgres,
    Sqlite,
    Mysql,
}

impl From<DialectArg> for DialectKind {
    fn from(value: DialectArg) -> Self {
        match value {
            DialectArg::Postgres => DialectKind::Postgres,
            DialectArg::Sqlite => DialectKind::Sqlite,
            DialectArg::Mysql => DialectKind::Mysql,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CycleBreakArg {
    FewestRows,
    Declared,
}

impl From<CycleBreakArg> for CycleBreakPolicy {
    fn from(value: CycleBreakArg) -> Self {
        match value {
            CycleBreakArg::FewestRows => CycleBreakPolicy::FewestRows,
            CycleBreakArg::Declared => CycleBreakPolicy::Declared,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    init_logging(&config.logging)?;

    let run_id = Uuid::new_v4().to_string();
    let started_at = chrono::Utc::now();
    let timer = Instant::now();
    tracing::info!(event = "run_started", run_id = %run_id, started_at = %started_at.to_rfc3339());

    let result = match cli.command {
        Command::Emit(args) => run_emit(args, &config),
        Command::Check(args) => run_check(args, &config),
        Command::Apply(args) => run_apply(args, &config).await,
        Command::JsonSchema(args) => run_json_schema(args),
    };

    let duration_ms = timer.elapsed().as_millis() as u64;
    match &result {
        Ok(()) => tracing::info!(event = "run_finished", status = "success", run_id = %run_id, duration_ms),
        Err(err) => tracing::error!(event = "run_finished", status = "failed", run_id = %run_id, duration_ms, error = %err),
    }
    result
}

fn store_options(args: &InputArgs, config: &SeedbedConfig) -> StoreOptions {
    let mut options = config.store.clone();
    if let Some(dialect) = args.dialect {
        options.dialect = dialect.into();
    }
    if let Some(policy) = args.cycle_break {
        options.cycle_break = policy.into();
    }
    if args.no_capacity_check {
        options.check_capacity = false;
    }
    options
}

fn build_store(args: &InputArgs, config: &SeedbedConfig) -> CliResult<SeedStore> {
    let options = store_options(args, config);
    tracing::info!(
        event = "rows_loading",
        schema = %args.schema.display(),
        rows = %args.rows.display(),
        dialect = %options.dialect
    );
    let store = store_from_files(&args.schema, &args.rows, options)?;
    tracing::info!(event = "rows_loaded", rows = store.len());
    Ok(store)
}

fn run_emit(args: EmitArgs, config: &SeedbedConfig) -> CliResult<()> {
    let store = build_store(&args.input, config)?;
    let statements = store.to_sql()?;
    let script = render_script(&statements);

    write_output(args.out.as_deref(), &script)?;
    tracing::info!(event = "statements_written", statements = statements.len());
    Ok(())
}

fn run_check(args: InputArgs, config: &SeedbedConfig) -> CliResult<()> {
    let store = build_store(&args, config)?;
    let resolution = store.resolve()?;
    let report = serde_json::to_string_pretty(&resolution.report)?;
    write_output(None, &format!("{report}\n"))
}

async fn run_apply(args: ApplyArgs, config: &SeedbedConfig) -> CliResult<()> {
    let store = build_store(&args.input, config)?;
    let statements = store.to_sql()?;

    let executor: Box<dyn Executor> = if args.dry_run {
        Box::new(DryRunExecutor)
    } else {
        let conn = args
            .conn
            .or_else(|| config.apply.conn.clone())
            .ok_or_else(|| CliError::InvalidConfig("connection string is required".to_string()))?;
        let engine = detect_engine(&conn)?;
        if store.dialect().kind() != DialectKind::Postgres {
            return Err(CliError::InvalidConfig(format!(
                "dialect {} cannot be applied to {engine}",
                store.dialect().kind()
            )));
        }
        Box::new(PostgresExecutor::connect(&conn, &config.apply).await?)
    };
    tracing::info!(event = "executor_selected", engine = executor.engine());
    let summary = executor.execute(&statements).await?;

    let summary = serde_json::to_string_pretty(&summary)?;
    write_output(None, &format!("{summary}\n"))
}

fn run_json_schema(args: JsonSchemaArgs) -> CliResult<()> {
    let schema = schemars::schema_for!(DatabaseSchema);
    let json = serde_json::to_string_pretty(&schema)?;
    write_output(args.out.as_deref(), &format!("{json}\n"))
}

fn render_script(statements: &[String]) -> String {
    statements
        .iter()
        .map(|statement| format!("{statement};\n"))
        .collect()
}

fn write_output(path: Option<&Path>, content: &str) -> CliResult<()> {
    match path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(path, content)?;
        }
        None => print!("{content}"),
    }
    Ok(())
}

fn detect_engine(conn: &str) -> Result<&'static str, CliError> {
    if conn.starts_with("postgres://") || conn.starts_with("postgresql://") {
        Ok("postgres")
    } else {
        let scheme = conn.split("://").next().unwrap_or_default();
        Err(CliError::UnsupportedEngine(scheme.to_string()))
    }
}
