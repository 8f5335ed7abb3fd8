//
// Define test events.  Test events are fired by the test framework
// whenever certain actions occur.  For example, when a suite starts,
// when a request completes, and when a test case reaches its final
// status.  Listeners receive them over an mpsc channel.
//
use crate::test_case::TestStatus;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct TestSuiteBegin {
    pub timestamp: Instant,
    pub run_id: String,
    pub total: usize,
}

#[derive(Debug)]
pub struct TestSuiteEnd {
    pub timestamp: Instant,
    pub exec_duration: Duration,
    pub run_id: String,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug)]
pub struct TestCaseBegin {
    pub timestamp: Instant,
    pub run_id: String,
    pub testcase_name: String,
    pub method: String,
    pub path: Option<String>,
}

#[derive(Debug)]
pub struct RequestComplete {
    pub timestamp: Instant,
    pub run_id: String,
    pub testcase_name: String,
    pub url: String,
    pub method: String,
    pub status_code: Option<u16>,
    pub response_time_ms: f64,
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct TestCaseEnd {
    pub timestamp: Instant,
    pub run_id: String,
    pub testcase_name: String,
    pub status: TestStatus,
    pub exec_duration: Duration,
}

#[derive(Debug)]
pub enum TestEvent {
    EvtTestSuiteBegin(TestSuiteBegin),
    EvtTestSuiteEnd(TestSuiteEnd),
    EvtTestCaseBegin(TestCaseBegin),
    EvtRequestComplete(RequestComplete),
    EvtTestCaseEnd(TestCaseEnd),
}

impl TestEvent {
    /// Short upper-case label, as written to the trace log.
    pub fn kind(&self) -> &'static str {
        match self {
            TestEvent::EvtTestSuiteBegin(_) => "SUITE_START",
            TestEvent::EvtTestSuiteEnd(_) => "SUITE_END",
            TestEvent::EvtTestCaseBegin(_) => "TEST_START",
            TestEvent::EvtRequestComplete(_) => "REQUEST_COMPLETE",
            TestEvent::EvtTestCaseEnd(_) => "TEST_END",
        }
    }
}
