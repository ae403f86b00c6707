//! trustcache entry point.

use std::process::ExitCode;
use std::thread;
use trustcache_cli::args::USAGE;
use trustcache_cli::telemetry::init_logging;
use trustcache_cli::{CliArgs, CliResult, Report};
use trustcache_core::RegistryConfig;
use trustcache_storage::StoreRegistry;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("trustcache: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let args = CliArgs::parse(std::env::args().skip(1))?;
    if args.help {
        println!("{USAGE}");
        return Ok(());
    }
    init_logging(args.log_json)?;

    let config = RegistryConfig::load(args.config.as_deref())?;
    let registry = StoreRegistry::new();
    let stores = config
        .stores
        .iter()
        .map(|c| registry.open(c).map(|s| (c.clone(), s)))
        .collect::<Result<Vec<_>, _>>()?;
    tracing::info!(stores = stores.len(), "registry ready");

    loop {
        let report = Report::collect(&stores);
        if args.json {
            println!("{}", serde_json::to_string(&report)?);
        } else {
            print!("{report}");
        }
        match args.watch {
            Some(interval) => thread::sleep(interval),
            None => return Ok(()),
        }
    }
}
