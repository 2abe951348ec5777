//! Outer surface of seedbed: configuration, logging, rows file loading and
//! statement execution. The `seedbed` binary wires these together.

pub mod config;
pub mod errors;
pub mod executor;
pub mod logging;
pub mod rows;

pub use config::{ApplyConfig, LogFormat, LoggingConfig, SeedbedConfig, load_config};
pub use errors::{CliError, CliResult};
pub use executor::{DryRunExecutor, ExecutionSummary, Executor, PostgresExecutor};
pub use logging::init_logging;
pub use rows::{RowSpec, load_rows, read_rows, read_schema, store_from_files};
