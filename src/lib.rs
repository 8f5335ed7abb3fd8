pub mod config;
pub mod document;
pub mod error;
pub mod http_client;
pub mod logging;
pub mod report;
pub mod test_case;
pub mod test_context;
pub mod test_events;
pub mod test_suite;
pub mod validation;

#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::error::ConfigError;
use crate::report::{ConsoleReporter, JsonReporter, Reporters};
use crate::test_context::TestCtx;
use crate::test_events::TestEvent;
use crate::test_suite::{RunOptions, RunReport, TestSuite};
use std::sync::mpsc::Sender;

/// Runs every configured test case against the configured endpoint and
/// publishes the results to the console and to `<output_dir>/test_report.json`.
pub fn exec(
    config: &Config,
    options: &RunOptions,
    events: Option<Sender<TestEvent>>,
) -> Result<RunReport, ConfigError> {
    let mut ctx = TestCtx::from_config(&config.endpoints)?.with_progress(options.workers <= 1);
    if let Some(tx) = events {
        ctx = ctx.with_events(tx);
    }

    let mut sinks = Reporters::new()
        .with(Box::new(ConsoleReporter::stdout()))
        .with(Box::new(JsonReporter::new(&config.general.output_dir)));

    let mut test_suite = TestSuite::new(config.tests.clone());
    Ok(test_suite.run(&ctx, options, &mut sinks))
}
