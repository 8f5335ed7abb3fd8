// Whole-run scenarios against a scripted transport.

use crate::error::{ReportError, TransportError};
use crate::http_client::{Dispatcher, HttpRequest, HttpResponse, RequestBody, Transport};
use crate::report::ResultsSink;
use crate::test_case::{Params, TestCaseData, TestResult, TestStatus};
use crate::test_context::TestCtx;
use crate::test_suite::{RunOptions, RunReport, TestSuite};
use indexmap::IndexMap;
use serde_yaml::Value;
use std::sync::{mpsc, Arc, Mutex};

const BASE_URL: &str = "http://svc";

/// Answers by URL, remembers everything it was asked.
#[derive(Default)]
struct ScriptedTransport {
    replies: IndexMap<String, Result<HttpResponse, TransportError>>,
    seen: Arc<Mutex<Vec<HttpRequest>>>,
}

impl ScriptedTransport {
    fn reply(mut self, path: &str, status: u16, body: &str) -> Self {
        self.replies.insert(
            format!("{}{}", BASE_URL, path),
            Ok(HttpResponse {
                status,
                headers: IndexMap::new(),
                body: body.to_string(),
            }),
        );
        self
    }

    fn fail(mut self, path: &str, error: TransportError) -> Self {
        self.replies.insert(format!("{}{}", BASE_URL, path), Err(error));
        self
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.seen.lock().unwrap().push(request.clone());
        self.replies
            .get(&request.url)
            .cloned()
            .unwrap_or(Err(TransportError::ConnectionError))
    }
}

#[derive(Default)]
struct Collect {
    recorded: Vec<TestResult>,
    finished: Option<RunReport>,
}

impl ResultsSink for Collect {
    fn record(&mut self, result: &TestResult) {
        self.recorded.push(result.clone());
    }

    fn finish(&mut self, report: &RunReport) -> Result<(), ReportError> {
        self.finished = Some(report.clone());
        Ok(())
    }
}

fn context(transport: ScriptedTransport) -> (TestCtx, Arc<Mutex<Vec<HttpRequest>>>) {
    let seen = transport.seen.clone();
    let headers: IndexMap<String, String> =
        [("Accept".to_string(), "application/xml".to_string())].into_iter().collect();
    let dispatcher = Dispatcher::new(BASE_URL, headers, Box::new(transport));
    (TestCtx::new(dispatcher), seen)
}

fn definitions(yaml: &str) -> Vec<TestCaseData> {
    serde_yaml::from_str(yaml).unwrap()
}

fn run(yaml: &str, transport: ScriptedTransport, options: &RunOptions) -> (RunReport, Collect) {
    let (ctx, _) = context(transport);
    let mut sink = Collect::default();
    let report = TestSuite::new(definitions(yaml)).run(&ctx, options, &mut sink);
    (report, sink)
}

const WIDGET: &str = "<product><id>1</id><name>Widget</name></product>";

#[test]
fn test_status_and_structure_pass() {
    let yaml = r#"
- name: GetProduct
  path: /products/1
  expected_status: 200
  validation_xpath: name
"#;
    let transport = ScriptedTransport::default().reply("/products/1", 200, WIDGET);
    let (report, _) = run(yaml, transport, &RunOptions::default());

    let result = &report.test_results[0];
    assert_eq!(result.status, TestStatus::Pass);
    assert_eq!(result.error_message, None);
    let details = result.details.as_ref().unwrap();
    assert_eq!(details.status_code, Some(200));
    assert_eq!(details.validation_results.xml_parseable, Some(true));
    assert_eq!(details.validation_results.xpath_validation, Some(true));
    assert_eq!(details.validation_results.regex_validation, None);
}

#[test]
fn test_status_mismatch_skips_validation() {
    let yaml = r#"
- name: SubmitOrder
  path: /orders
  method: POST
  body: <order/>
  expected_status: 201
  validation_xpath: order
"#;
    let transport = ScriptedTransport::default().reply("/orders", 400, "<error/>");
    let (report, _) = run(yaml, transport, &RunOptions::default());

    let result = &report.test_results[0];
    assert_eq!(result.status, TestStatus::Fail);
    assert!(result
        .error_message
        .as_deref()
        .unwrap()
        .contains("expected 201, got 400"));
    let validation = &result.details.as_ref().unwrap().validation_results;
    assert_eq!(validation.xml_parseable, None);
    assert_eq!(validation.xpath_validation, None);
}

#[test]
fn test_unparseable_body_fails() {
    let yaml = r#"
- name: Broken
  path: /broken
"#;
    let transport = ScriptedTransport::default().reply("/broken", 200, "<a><b></a>");
    let (report, _) = run(yaml, transport, &RunOptions::default());

    let result = &report.test_results[0];
    assert_eq!(result.status, TestStatus::Fail);
    assert_eq!(
        result.details.as_ref().unwrap().validation_results.xml_parseable,
        Some(false)
    );
}

#[test]
fn test_deeply_nested_body_fails_without_aborting() {
    let yaml = r#"
- name: Deep
  path: /deep
  validation_xpath: a/b
- name: After
  path: /ok
"#;
    let depth = 200_000;
    let body = format!("{}{}", "<a>".repeat(depth), "</a>".repeat(depth));
    let transport = ScriptedTransport::default()
        .reply("/deep", 200, &body)
        .reply("/ok", 200, "<ok/>");
    let (report, _) = run(yaml, transport, &RunOptions::default());

    assert_eq!(report.test_results.len(), 2);
    let deep = &report.test_results[0];
    assert_eq!(deep.status, TestStatus::Fail);
    assert_eq!(deep.error_message.as_deref(), Some("Could not parse XML response."));
    assert_eq!(
        deep.details.as_ref().unwrap().validation_results.xml_parseable,
        Some(false)
    );
    assert_eq!(report.test_results[1].status, TestStatus::Pass);
}

#[test]
fn test_inclusion_list_skips_others() {
    let yaml = r#"
- name: A
  path: /a
- name: B
  path: /b
"#;
    let transport = ScriptedTransport::default()
        .reply("/a", 200, "<ok/>")
        .reply("/b", 200, "<ok/>");
    let (ctx, seen) = context(transport);
    let options = RunOptions {
        include: Some(vec!["A".to_string()]),
        ..RunOptions::default()
    };
    let mut sink = Collect::default();
    let report = TestSuite::new(definitions(yaml)).run(&ctx, &options, &mut sink);

    assert_eq!(report.test_results[0].status, TestStatus::Pass);
    assert_eq!(report.test_results[1].status, TestStatus::Skip);
    assert_eq!(
        report.test_results[1].error_message.as_deref(),
        Some("Test not in run list.")
    );
    assert!(report.test_results[1].details.is_none());

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].url, "http://svc/a");
}

#[test]
fn test_timeout_fails_without_status() {
    let yaml = r#"
- name: Slow
  path: /slow
  expected_status: 200
"#;
    let transport = ScriptedTransport::default().fail("/slow", TransportError::Timeout);
    let (report, _) = run(yaml, transport, &RunOptions::default());

    let result = &report.test_results[0];
    assert_eq!(result.status, TestStatus::Fail);
    assert!(result.error_message.as_deref().unwrap().contains("Timeout"));
    let details = result.details.as_ref().unwrap();
    assert_eq!(details.status_code, None);
    assert!(!details.response_success);
}

#[test]
fn test_missing_path_is_error_and_sends_nothing() {
    let yaml = r#"
- name: NoPath
  method: GET
"#;
    let (ctx, seen) = context(ScriptedTransport::default());
    let mut sink = Collect::default();
    let report = TestSuite::new(definitions(yaml)).run(&ctx, &RunOptions::default(), &mut sink);

    let result = &report.test_results[0];
    assert_eq!(result.status, TestStatus::Error);
    assert_eq!(result.error_message.as_deref(), Some("missing path"));
    assert_eq!(report.stats.failed_tests, 1);
    assert!(seen.lock().unwrap().is_empty());
}

#[test]
fn test_overrides_reach_request() {
    let yaml = r#"
- name: Templated
  path: /products/{product_id}
  method: post
  body:
    id: "{product_id}"
    qty: 2
  headers:
    X-Lang: "{lang}"
  params:
    product_id: 1
    lang: en
"#;
    let transport = ScriptedTransport::default().reply("/products/42", 200, WIDGET);
    let (ctx, seen) = context(transport);
    let overrides: Params = [("product_id".to_string(), Value::from("42"))]
        .into_iter()
        .collect();
    let options = RunOptions {
        overrides,
        ..RunOptions::default()
    };
    let mut sink = Collect::default();
    let report = TestSuite::new(definitions(yaml)).run(&ctx, &options, &mut sink);
    assert_eq!(report.test_results[0].status, TestStatus::Pass);

    let seen = seen.lock().unwrap();
    let request = &seen[0];
    assert_eq!(request.method, reqwest::Method::POST);
    assert_eq!(request.url, "http://svc/products/42");
    assert_eq!(request.headers["Accept"], "application/xml");
    assert_eq!(request.headers["X-Lang"], "en");
    assert_eq!(
        request.query,
        vec![
            ("product_id".to_string(), "42".to_string()),
            ("lang".to_string(), "en".to_string())
        ]
    );
    assert_eq!(
        request.body,
        Some(RequestBody::Form(vec![
            ("id".to_string(), "42".to_string()),
            ("qty".to_string(), "2".to_string())
        ]))
    );
}

#[test]
fn test_sink_sees_every_result_in_order() {
    let yaml = r#"
- name: First
  path: /a
- name: NoPath
- name: Third
  path: /missing
  expected_status: 200
- name: Fourth
  path: /a
  validation_regex: "<ok\\s*/>"
"#;
    let transport = ScriptedTransport::default().reply("/a", 200, "<ok/>");
    let (report, sink) = run(yaml, transport, &RunOptions::default());

    let statuses: Vec<TestStatus> = sink.recorded.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            TestStatus::Pass,
            TestStatus::Error,
            TestStatus::Fail,
            TestStatus::Pass
        ]
    );
    assert_eq!(sink.recorded, report.test_results);

    let finished = sink.finished.unwrap();
    assert_eq!(finished.stats, report.stats);
    let stats = report.stats;
    assert_eq!(stats.total_tests, 4);
    assert_eq!(stats.passed_tests, 2);
    assert_eq!(stats.failed_tests, 2);
    assert_eq!(
        stats.total_tests,
        stats.passed_tests + stats.failed_tests + stats.skipped_tests
    );
}

#[test]
fn test_duplicate_names_run_independently() {
    let yaml = r#"
- name: Same
  path: /a
- name: Same
  path: /b
"#;
    let transport = ScriptedTransport::default().reply("/a", 200, "<ok/>");
    let (report, _) = run(yaml, transport, &RunOptions::default());
    assert_eq!(report.test_results.len(), 2);
    assert_eq!(report.test_results[0].status, TestStatus::Pass);
    assert_eq!(report.test_results[1].status, TestStatus::Fail);
}

#[test]
fn test_parallel_run_keeps_definition_order() {
    let yaml = r#"
- { name: c0, path: /0, validation_xpath: ok }
- { name: c1, path: /1, validation_xpath: ok }
- { name: c2, path: /2, validation_xpath: ok }
- { name: c3, path: /3, validation_xpath: ok }
- { name: c4, path: /4, validation_xpath: ok }
- { name: c5, path: /5, validation_xpath: ok }
"#;
    let scripted = || {
        ScriptedTransport::default()
            .reply("/0", 200, "<ok/>")
            .reply("/1", 200, "<no/>")
            .reply("/2", 200, "<ok/>")
            .fail("/3", TransportError::Timeout)
            .reply("/4", 200, "<ok/>")
            .reply("/5", 500, "<ok/>")
    };

    let (sequential, _) = run(yaml, scripted(), &RunOptions::default());
    let parallel_options = RunOptions {
        workers: 3,
        include: Some(vec![
            "c0".to_string(),
            "c1".to_string(),
            "c2".to_string(),
            "c3".to_string(),
            "c4".to_string(),
            "c5".to_string(),
        ]),
        ..RunOptions::default()
    };
    let (parallel, sink) = run(yaml, scripted(), &parallel_options);

    let names: Vec<&str> = parallel
        .test_results
        .iter()
        .map(|r| r.test_name.as_str())
        .collect();
    assert_eq!(names, vec!["c0", "c1", "c2", "c3", "c4", "c5"]);

    let shape = |report: &RunReport| -> Vec<TestStatus> {
        report.test_results.iter().map(|r| r.status).collect()
    };
    assert_eq!(shape(&parallel), shape(&sequential));
    assert_eq!(parallel.stats, sequential.stats);
    assert_eq!(sink.recorded.len(), 6);
}

#[test]
fn test_empty_suite_still_reports() {
    let (report, sink) = run("[]", ScriptedTransport::default(), &RunOptions::default());
    assert!(report.test_results.is_empty());
    assert_eq!(report.stats.total_tests, 0);
    assert_eq!(report.stats.pass_rate(), None);
    assert!(sink.finished.is_some());
}

#[test]
fn test_events_follow_the_run() {
    let yaml = r#"
- name: A
  path: /a
- name: B
  path: /b
"#;
    let (tx, rx) = mpsc::channel();
    let (ctx, _) = context(ScriptedTransport::default().reply("/a", 200, "<ok/>"));
    let ctx = ctx.with_events(tx);
    let options = RunOptions {
        include: Some(vec!["A".to_string()]),
        ..RunOptions::default()
    };
    let mut sink = Collect::default();
    TestSuite::new(definitions(yaml)).run(&ctx, &options, &mut sink);
    drop(ctx);

    let kinds: Vec<&'static str> = rx.iter().map(|event| event.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            "SUITE_START",
            "TEST_START",
            "REQUEST_COMPLETE",
            "TEST_END",
            "TEST_END",
            "SUITE_END"
        ]
    );
}
