use crate::report::ResultsSink;
use crate::test_case::{Params, TestCase, TestCaseData, TestResult, TestStatus, NOT_IN_RUN_LIST};
use crate::test_context::TestCtx;
use crate::test_events::{TestEvent, TestSuiteBegin, TestSuiteEnd};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::Serialize;
use std::time::Instant;
use tracing::{error, info, warn};

/// Per-run selection and overrides.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub include: Option<Vec<String>>, // names to run, everything else is skipped
    pub overrides: Params,            // win over each test case's own params
    pub workers: usize,               // more than one runs cases on a thread pool
}

impl RunOptions {
    fn selects(&self, name: &str) -> bool {
        match &self.include {
            Some(names) if !names.is_empty() => names.iter().any(|n| n == name),
            _ => true,
        }
    }
}

/// Running counters. `ERROR` counts as failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub total_tests: usize,
    pub passed_tests: usize,
    pub failed_tests: usize,
    pub skipped_tests: usize,
}

impl RunStats {
    pub fn record(&mut self, status: TestStatus) {
        self.total_tests += 1;
        match status {
            TestStatus::Pass => self.passed_tests += 1,
            TestStatus::Fail | TestStatus::Error => self.failed_tests += 1,
            TestStatus::Skip => self.skipped_tests += 1,
        }
    }

    /// Fraction of passed tests, `None` for an empty run.
    pub fn pass_rate(&self) -> Option<f64> {
        if self.total_tests == 0 {
            None
        } else {
            Some(self.passed_tests as f64 / self.total_tests as f64)
        }
    }
}

/// Summary emitted once per run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    #[serde(flatten)]
    pub stats: RunStats,
    pub test_results: Vec<TestResult>,
}

pub struct TestSuite {
    test_cases: Vec<TestCase>,
    results: Vec<TestResult>,
    stats: RunStats,
}

impl TestSuite {
    pub fn new(definitions: Vec<TestCaseData>) -> Self {
        TestSuite {
            test_cases: definitions.into_iter().map(TestCase::new).collect(),
            results: Vec::new(),
            stats: RunStats::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.test_cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.test_cases.is_empty()
    }

    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Runs every test case once, in definition order, and hands each result to `sink`.
    ///
    /// With `workers > 1` the cases run on a thread pool; results are still
    /// appended and reported in definition order once all of them are done.
    pub fn run(
        &mut self,
        ctx: &TestCtx,
        options: &RunOptions,
        sink: &mut dyn ResultsSink,
    ) -> RunReport {
        let started = Instant::now();
        self.results.clear();
        self.stats = RunStats::default();

        ctx.fire(TestEvent::EvtTestSuiteBegin(TestSuiteBegin {
            timestamp: started,
            run_id: ctx.run_id.clone(),
            total: self.test_cases.len(),
        }));

        if self.test_cases.is_empty() {
            warn!("No tests defined in the configuration.");
        } else {
            info!("Starting test run for {} test case(s)", self.test_cases.len());
        }

        let pool = if options.workers > 1 {
            match ThreadPoolBuilder::new().num_threads(options.workers).build() {
                Ok(pool) => Some(pool),
                Err(e) => {
                    warn!("Could not start {} workers ({}), running sequentially", options.workers, e);
                    None
                }
            }
        } else {
            None
        };

        let TestSuite {
            test_cases,
            results,
            stats,
        } = &mut *self;
        let mut append = |result: TestResult| {
            stats.record(result.status);
            sink.record(&result);
            results.push(result);
        };

        match pool {
            Some(pool) => {
                let finished: Vec<TestResult> = pool.install(|| {
                    test_cases
                        .par_iter()
                        .map(|tc| execute_one(tc, ctx, options, true))
                        .collect()
                });
                finished.into_iter().for_each(&mut append);
            }
            None => {
                for tc in test_cases.iter() {
                    append(execute_one(tc, ctx, options, false));
                }
            }
        }

        let report = RunReport {
            stats: self.stats,
            test_results: self.results.clone(),
        };

        ctx.fire(TestEvent::EvtTestSuiteEnd(TestSuiteEnd {
            timestamp: Instant::now(),
            exec_duration: started.elapsed(),
            run_id: ctx.run_id.clone(),
            passed: report.stats.passed_tests,
            failed: report.stats.failed_tests,
            skipped: report.stats.skipped_tests,
        }));
        info!(
            "Test run finished: {} passed, {} failed, {} skipped",
            report.stats.passed_tests, report.stats.failed_tests, report.stats.skipped_tests
        );

        if let Err(e) = sink.finish(&report) {
            error!("{}", e);
        }
        report
    }
}

fn execute_one(tc: &TestCase, ctx: &TestCtx, options: &RunOptions, pooled: bool) -> TestResult {
    if !options.selects(tc.name()) {
        return tc.skip(ctx, NOT_IN_RUN_LIST);
    }
    if pooled {
        tc.run_unattended(ctx, &options.overrides)
    } else {
        tc.run(ctx, &options.overrides)
    }
}
