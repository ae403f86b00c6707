//! trustcache CLI - store inventory and watch mode.

pub mod args;
pub mod error;
pub mod report;
pub mod telemetry;

pub use args::CliArgs;
pub use error::{CliError, CliResult};
pub use report::Report;
