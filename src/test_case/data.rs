use chrono::{DateTime, Local};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value;
use std::fmt;

/// Named template parameters, in declaration order.
pub type Params = IndexMap<String, Value>;

/// Terminal status of a test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestStatus {
    Pass,
    Fail,
    Skip,
    Error,
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TestStatus::Pass => "PASS",
            TestStatus::Fail => "FAIL",
            TestStatus::Skip => "SKIP",
            TestStatus::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// One test case as declared in the configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct TestCaseData {
    #[serde(default = "default_name")]
    pub name: String, // human readable name, duplicates are allowed.
    #[serde(default = "default_method")]
    pub method: String, // http method, any case.
    #[serde(default, deserialize_with = "non_empty")]
    pub path: Option<String>, // path template, appended to the base url.
    #[serde(default)]
    pub body: Option<Value>, // body template, only strings are templated.
    #[serde(default)]
    pub headers: IndexMap<String, Value>, // header templates.
    #[serde(default)]
    pub params: Params, // default parameters for the templates.
    #[serde(default)]
    pub expected_status: Option<u16>,
    #[serde(default, rename = "validation_xpath", deserialize_with = "non_empty")]
    pub structural_query: Option<String>,
    #[serde(default, rename = "validation_regex", deserialize_with = "non_empty")]
    pub regex_pattern: Option<String>,
}

impl TestCaseData {
    /// A GET test case with only a name and a path, handy for building suites in code.
    pub fn new(name: &str, path: &str) -> Self {
        TestCaseData {
            name: name.to_string(),
            method: default_method(),
            path: Some(path.to_string()),
            body: None,
            headers: IndexMap::new(),
            params: Params::new(),
            expected_status: None,
            structural_query: None,
            regex_pattern: None,
        }
    }
}

/// Request fields after placeholder substitution.
#[derive(Debug, Clone, Default)]
pub struct ExecutionState {
    pub effective_path: String,
    pub effective_body: Option<Value>,
    pub effective_headers: IndexMap<String, String>,
    pub effective_params: Params,
}

/// Per-validator outcomes. Absent fields mean the check was not declared.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationResults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xml_parseable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xpath_validation: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regex_validation: Option<bool>,
}

/// Everything recorded about the exchange with the server.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultDetails {
    pub status_code: Option<u16>,
    pub response_time_ms: f64,
    pub response_success: bool,
    pub validation_results: ValidationResults,
}

/// The single, final record of one test case.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestResult {
    pub test_name: String,
    pub status: TestStatus,
    pub timestamp: DateTime<Local>,
    pub response_time_ms: Option<f64>,
    pub details: Option<ResultDetails>,
    pub error_message: Option<String>,
}

impl TestResult {
    pub fn new(test_name: &str, status: TestStatus) -> Self {
        TestResult {
            test_name: test_name.to_string(),
            status,
            timestamp: Local::now(),
            response_time_ms: None,
            details: None,
            error_message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_details(mut self, details: ResultDetails) -> Self {
        self.response_time_ms = Some(details.response_time_ms);
        self.details = Some(details);
        self
    }
}

// Default value functions for serde
fn default_name() -> String {
    "Unnamed Test".to_string()
}

fn default_method() -> String {
    "GET".to_string()
}

// Empty strings in the YAML mean "not declared".
fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}
