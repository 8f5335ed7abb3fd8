use std::sync::mpsc;
use std::{env, process, thread};

use anyhow::Context;
use parikshak::config::{print_usage, CliArgs, Config};
use parikshak::test_events::TestEvent;
use tracing::{debug, error, info, warn};

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {:#}", err);
        process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("parikshak");
    let cli = CliArgs::parse(args.get(1..).unwrap_or_default())?;
    if cli.help {
        print_usage(program);
        return Ok(());
    }

    let mut config = Config::load(&cli.config_path).context("Error loading configuration")?;
    config.apply_cli(&cli);

    // keep the guard alive so the log file is flushed on exit
    let _guard = parikshak::logging::init(&config.general)?;

    info!("Using configuration file: {}", cli.config_path.display());
    info!("Log Level: {}", config.general.log_level);
    info!("Output Directory: {}", config.general.output_dir.display());
    info!("Tracing Enabled: {}", config.general.enable_tracing);
    for pair in &cli.rejected_params {
        warn!("Invalid parameter format: '{}'. Expected key=value.", pair);
    }

    // Drain diagnostic events on a separate thread. The channel closes when
    // the run is over and the test context is dropped.
    let (tx, rx) = mpsc::channel::<TestEvent>();
    let tracing_enabled = config.general.enable_tracing;
    let listener = thread::spawn(move || {
        for event in rx {
            if tracing_enabled {
                debug!("TRACE: Type={}, Details={:?}", event.kind(), event);
            }
        }
    });

    let options = config.run_options(&cli);
    let result = parikshak::exec(&config, &options, Some(tx));
    if listener.join().is_err() {
        error!("Event listener thread panicked");
    }

    match result {
        Ok(_) => {
            info!("Script execution finished.");
            Ok(())
        }
        Err(e) => {
            error!("Test runner initialization failed: {}", e);
            Err(e.into())
        }
    }
}
