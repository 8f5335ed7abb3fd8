use crate::error::ReportError;
use crate::test_case::{TestResult, TestStatus};
use crate::test_suite::RunReport;
use colored::Colorize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub const REPORT_FILE_NAME: &str = "test_report.json";

/// Receives every result as it is appended, then the final summary.
pub trait ResultsSink {
    fn record(&mut self, _result: &TestResult) {}

    fn finish(&mut self, report: &RunReport) -> Result<(), ReportError>;
}

/// Prints one coloured line per result and the summary block.
pub struct ConsoleReporter<W: Write = io::Stdout> {
    out: W,
}

impl ConsoleReporter {
    pub fn stdout() -> Self {
        ConsoleReporter { out: io::stdout() }
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        ConsoleReporter { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_result(&mut self, result: &TestResult) -> io::Result<()> {
        let label = match result.status {
            TestStatus::Pass => "✅ PASSED".green(),
            TestStatus::Fail => "❌ FAILED".red(),
            TestStatus::Skip => "⚠️ SKIPPED".yellow(),
            TestStatus::Error => "💥 ERROR".red().bold(),
        };
        write!(self.out, "{:<15}: {}", result.test_name, label)?;
        if let Some(ms) = result.response_time_ms {
            write!(self.out, " ({:.2} ms)", ms)?;
        }
        if let Some(message) = &result.error_message {
            write!(self.out, " - {}", message)?;
        }
        writeln!(self.out)
    }

    fn write_summary(&mut self, report: &RunReport) -> io::Result<()> {
        let stats = &report.stats;
        writeln!(self.out, "\n--- Test Summary ---")?;
        writeln!(self.out, "{:<16}: {}", "Total Tests Run", stats.total_tests)?;
        writeln!(self.out, "{:<16}: {}", "Passed", stats.passed_tests)?;
        writeln!(self.out, "{:<16}: {}", "Failed", stats.failed_tests)?;
        writeln!(self.out, "{:<16}: {}", "Skipped", stats.skipped_tests)?;
        writeln!(self.out, "{:<16}: {}", "Pass Rate", format_pass_rate(stats.pass_rate()))?;
        writeln!(self.out, "--------------------")?;
        self.out.flush()
    }
}

impl<W: Write> ResultsSink for ConsoleReporter<W> {
    fn record(&mut self, result: &TestResult) {
        // a closed stdout is not worth aborting the run for
        let _ = self.write_result(result);
    }

    fn finish(&mut self, report: &RunReport) -> Result<(), ReportError> {
        self.write_summary(report).map_err(|source| ReportError::Io {
            path: PathBuf::from("<stdout>"),
            source,
        })
    }
}

pub fn format_pass_rate(rate: Option<f64>) -> String {
    match rate {
        Some(rate) => format!("{:.2}%", rate * 100.0),
        None => "N/A".to_string(),
    }
}

/// Writes the full report as pretty-printed JSON into the output directory.
pub struct JsonReporter {
    path: PathBuf,
}

impl JsonReporter {
    pub fn new(output_dir: &Path) -> Self {
        JsonReporter {
            path: output_dir.join(REPORT_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultsSink for JsonReporter {
    fn finish(&mut self, report: &RunReport) -> Result<(), ReportError> {
        let io_err = |source| ReportError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(report)?;
        fs::write(&self.path, json).map_err(io_err)?;
        info!("Test report generated successfully: {}", self.path.display());
        Ok(())
    }
}

/// Fans every call out to several sinks. All sinks are finished even if one fails;
/// the first error is returned.
#[derive(Default)]
pub struct Reporters {
    sinks: Vec<Box<dyn ResultsSink>>,
}

impl Reporters {
    pub fn new() -> Self {
        Reporters::default()
    }

    pub fn with(mut self, sink: Box<dyn ResultsSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl ResultsSink for Reporters {
    fn record(&mut self, result: &TestResult) {
        for sink in &mut self.sinks {
            sink.record(result);
        }
    }

    fn finish(&mut self, report: &RunReport) -> Result<(), ReportError> {
        let mut first_err = None;
        for sink in &mut self.sinks {
            if let Err(e) = sink.finish(report) {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
