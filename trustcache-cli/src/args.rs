//! Command-line arguments.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{CliError, CliResult};

pub const USAGE: &str =
    "usage: trustcache [--config PATH] [--watch SECS] [--json] [--log-json]";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArgs {
    /// Registry config file; falls back to `TRUSTCACHE_CONFIG`.
    pub config: Option<PathBuf>,
    /// Re-scan every interval instead of exiting after one pass.
    pub watch: Option<Duration>,
    /// Print the inventory as JSON lines.
    pub json: bool,
    /// Emit logs as JSON.
    pub log_json: bool,
    pub help: bool,
}

impl CliArgs {
    pub fn parse<I>(args: I) -> CliResult<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut parsed = CliArgs::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    let path = args.next().ok_or_else(|| missing_value("--config"))?;
                    parsed.config = Some(PathBuf::from(path));
                }
                "--watch" => {
                    let secs = args.next().ok_or_else(|| missing_value("--watch"))?;
                    let secs: u64 = secs.parse().map_err(|_| {
                        CliError::Usage(format!("--watch expects whole seconds, got '{secs}'"))
                    })?;
                    if secs == 0 {
                        return Err(CliError::Usage("--watch must be at least 1".to_string()));
                    }
                    parsed.watch = Some(Duration::from_secs(secs));
                }
                "--json" => parsed.json = true,
                "--log-json" => parsed.log_json = true,
                "-h" | "--help" => parsed.help = true,
                other => {
                    return Err(CliError::Usage(format!("unknown argument '{other}'\n{USAGE}")));
                }
            }
        }
        Ok(parsed)
    }
}

fn missing_value(flag: &str) -> CliError {
    CliError::Usage(format!("{flag} requires a value\n{USAGE}"))
}
