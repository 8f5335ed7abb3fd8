pub mod data;
pub mod placeholders;
pub mod progress;

pub use data::*;
pub use placeholders::*;
pub use progress::*;

use crate::document::DocumentParser;
use crate::error::DefinitionError;
use crate::http_client::{RequestBody, RequestOutcome};
use crate::test_context::TestCtx;
use crate::test_events::{RequestComplete, TestCaseBegin, TestCaseEnd, TestEvent};
use crate::validation::{validate_content_regex, validate_structure};
use reqwest::Method;
use serde_yaml::Value;
use std::time::Instant;
use tracing::{debug, error, info};

/// Message recorded for test cases filtered out by the inclusion list.
pub const NOT_IN_RUN_LIST: &str = "Test not in run list.";
const PARSE_FAILURE: &str = "Could not parse XML response.";

/// A test case definition, checked once for problems that make it unrunnable.
#[derive(Debug, Clone)]
pub struct TestCase {
    pub data: TestCaseData,
    pub errors: Vec<DefinitionError>,
    method: Method,
}

impl TestCase {
    pub fn new(data: TestCaseData) -> Self {
        let mut errors = Vec::new();
        if data.path.is_none() {
            errors.push(DefinitionError::MissingPath);
        }
        let method = match Method::from_bytes(data.method.trim().to_uppercase().as_bytes()) {
            Ok(m) => m,
            Err(_) => {
                errors.push(DefinitionError::InvalidMethod(data.method.clone()));
                Method::GET
            }
        };
        TestCase {
            data,
            errors,
            method,
        }
    }

    pub fn name(&self) -> &str {
        &self.data.name
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Records the test case as skipped without touching the network.
    pub fn skip(&self, ctx: &TestCtx, reason: &str) -> TestResult {
        info!("Skipping test '{}': {}", self.name(), reason);
        let result = TestResult::new(self.name(), TestStatus::Skip).with_message(reason);
        self.fire_end_evt(ctx, &result, Instant::now());
        result
    }

    /// Executes the test case and classifies the outcome.
    ///
    /// Definition errors end in `ERROR` before anything is sent. Otherwise the
    /// request is dispatched and the response checked in a fixed order:
    /// transport, status code, parseability, structural query, regex.
    pub fn run(&self, ctx: &TestCtx, overrides: &Params) -> TestResult {
        self.run_with_progress(ctx, overrides, ctx.show_progress())
    }

    /// Same as [`TestCase::run`] without the spinner, for runs on a worker pool.
    pub fn run_unattended(&self, ctx: &TestCtx, overrides: &Params) -> TestResult {
        self.run_with_progress(ctx, overrides, false)
    }

    fn run_with_progress(&self, ctx: &TestCtx, overrides: &Params, progress: bool) -> TestResult {
        let started = Instant::now();
        info!("Running test: '{}'", self.name());
        self.fire_start_evt(ctx);

        let result = self.execute(ctx, overrides, progress);

        match &result.response_time_ms {
            Some(ms) => info!(
                "Test '{}' finished with status: {} ({:.2} ms)",
                self.name(),
                result.status,
                ms
            ),
            None => info!("Test '{}' finished with status: {}", self.name(), result.status),
        }
        self.fire_end_evt(ctx, &result, started);
        result
    }

    fn execute(&self, ctx: &TestCtx, overrides: &Params, progress: bool) -> TestResult {
        if !self.errors.is_empty() {
            let message = self
                .errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            error!("Test '{}' cannot run: {}", self.name(), message);
            return TestResult::new(self.name(), TestStatus::Error).with_message(message);
        }

        let state = self.resolve(overrides);
        let url = ctx.dispatcher.build_url(&state.effective_path);
        debug!("Requesting: {} {}", self.method, url);
        debug!("Request Body: {:?}", state.effective_body);
        debug!("Request Headers: {:?}", state.effective_headers);

        let spinner = ProgressDisplay::start(&url, progress);
        let outcome = ctx.dispatcher.dispatch(
            &self.method,
            &state.effective_path,
            &state.effective_headers,
            request_body(state.effective_body.as_ref()),
            query_params(&state.effective_params),
        );
        spinner.stop();

        ctx.fire(TestEvent::EvtRequestComplete(RequestComplete {
            timestamp: Instant::now(),
            run_id: ctx.run_id.clone(),
            testcase_name: self.name().to_string(),
            url,
            method: self.method.to_string(),
            status_code: outcome.status_code,
            response_time_ms: outcome.elapsed_ms,
            success: outcome.success,
            error: outcome.error.as_ref().map(|e| e.to_string()),
        }));

        let result = self.evaluate(&outcome, ctx.parser.as_ref());
        if result.status == TestStatus::Fail {
            info!("Response Content:\n{}", outcome.body);
        }
        result
    }

    /// Merges parameters (overrides win) and substitutes them into path, body and headers.
    pub fn resolve(&self, overrides: &Params) -> ExecutionState {
        let resolver = PlaceholderResolver;
        let params = merge_params(&self.data.params, overrides);
        let path = self.data.path.as_deref().unwrap_or_default();

        ExecutionState {
            effective_path: resolver.substitute_placeholders(path, &params),
            effective_body: self
                .data
                .body
                .as_ref()
                .map(|body| resolver.substitute_value(body, &params)),
            effective_headers: self
                .data
                .headers
                .iter()
                .map(|(key, value)| {
                    (key.clone(), stringify(&resolver.substitute_value(value, &params)))
                })
                .collect(),
            effective_params: params,
        }
    }

    /// Classifies a request outcome against this test case's expectations.
    pub fn evaluate(&self, outcome: &RequestOutcome, parser: &dyn DocumentParser) -> TestResult {
        let name = self.name();
        let mut details = ResultDetails {
            status_code: outcome.status_code,
            response_time_ms: outcome.elapsed_ms,
            response_success: outcome.success,
            validation_results: ValidationResults::default(),
        };

        if !outcome.success {
            let reason = outcome
                .error
                .as_ref()
                .map_or_else(|| "Unknown Error".to_string(), |e| e.to_string());
            let message = format!("HTTP Request failed: {}", reason);
            error!("Test '{}' failed HTTP request: {}", name, message);
            return TestResult::new(name, TestStatus::Fail)
                .with_details(details)
                .with_message(message);
        }

        if let Some(expected) = self.data.expected_status {
            if outcome.status_code != Some(expected) {
                let actual = outcome
                    .status_code
                    .map_or_else(|| "none".to_string(), |s| s.to_string());
                let message = format!("Status check failed: expected {}, got {}", expected, actual);
                error!("Test '{}' failed status check: {}", name, message);
                return TestResult::new(name, TestStatus::Fail)
                    .with_details(details)
                    .with_message(message);
            }
        }

        let doc = parser.parse(&outcome.body);
        if doc.is_none() && !outcome.body.is_empty() {
            details.validation_results.xml_parseable = Some(false);
            error!("Test '{}': {}", name, PARSE_FAILURE);
            return TestResult::new(name, TestStatus::Fail)
                .with_details(details)
                .with_message(PARSE_FAILURE);
        }
        details.validation_results.xml_parseable = Some(true);

        // Both checks always run so the details are complete.
        let mut failures = Vec::new();
        if let Some(query) = &self.data.structural_query {
            let passed = validate_structure(doc.as_ref(), query);
            details.validation_results.xpath_validation = Some(passed);
            if passed {
                info!("Test '{}': XPath validation passed for '{}'", name, query);
            } else {
                error!("Test '{}': XPath validation failed for '{}'", name, query);
                failures.push(format!("XPath validation failed for '{}'", query));
            }
        }
        if let Some(pattern) = &self.data.regex_pattern {
            let passed = validate_content_regex(doc.as_ref(), pattern);
            details.validation_results.regex_validation = Some(passed);
            if passed {
                info!("Test '{}': Regex validation passed for '{}'", name, pattern);
            } else {
                error!("Test '{}': Regex validation failed for '{}'", name, pattern);
                failures.push(format!("Regex validation failed for '{}'", pattern));
            }
        }

        if failures.is_empty() {
            TestResult::new(name, TestStatus::Pass).with_details(details)
        } else {
            TestResult::new(name, TestStatus::Fail)
                .with_details(details)
                .with_message(failures.join("; "))
        }
    }

    fn fire_start_evt(&self, ctx: &TestCtx) {
        ctx.fire(TestEvent::EvtTestCaseBegin(TestCaseBegin {
            timestamp: Instant::now(),
            run_id: ctx.run_id.clone(),
            testcase_name: self.name().to_string(),
            method: self.method.to_string(),
            path: self.data.path.clone(),
        }));
    }

    fn fire_end_evt(&self, ctx: &TestCtx, result: &TestResult, started: Instant) {
        ctx.fire(TestEvent::EvtTestCaseEnd(TestCaseEnd {
            timestamp: Instant::now(),
            run_id: ctx.run_id.clone(),
            testcase_name: self.name().to_string(),
            status: result.status,
            exec_duration: started.elapsed(),
        }));
    }
}

/// Strings are sent verbatim, mappings form-encoded, other scalars as text.
fn request_body(body: Option<&Value>) -> Option<RequestBody> {
    match body? {
        Value::Null => None,
        Value::String(text) => Some(RequestBody::Text(text.clone())),
        Value::Mapping(map) => Some(RequestBody::Form(
            map.iter()
                .map(|(key, value)| (stringify(key), stringify(value)))
                .collect(),
        )),
        other => Some(RequestBody::Text(stringify(other))),
    }
}

// Every merged parameter also travels in the query string.
fn query_params(params: &Params) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(key, value)| (key.clone(), stringify(value)))
        .collect()
}
