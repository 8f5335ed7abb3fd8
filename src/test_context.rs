use crate::config::EndpointConfig;
use crate::document::{DocumentParser, XmlParser};
use crate::error::ConfigError;
use crate::http_client::{Dispatcher, ReqwestTransport};
use crate::test_case::placeholders::stringify;
use crate::test_events::TestEvent;
use indexmap::IndexMap;
use std::sync::mpsc::Sender;
use std::time::Duration;
use uuid::Uuid;

// A convenient struct for packing the arguments for TestCase::run.
// Everything a test case needs from the outside world lives here, so that
// the executor itself stays free of globals.
pub struct TestCtx {
    pub dispatcher: Dispatcher,
    pub parser: Box<dyn DocumentParser>,
    pub run_id: String,
    events: Option<Sender<TestEvent>>,
    show_progress: bool,
}

impl TestCtx {
    pub fn new(dispatcher: Dispatcher) -> Self {
        TestCtx {
            dispatcher,
            parser: Box::new(XmlParser),
            run_id: Uuid::new_v4().to_string(),
            events: None,
            show_progress: false,
        }
    }

    /// Builds the production context: a `reqwest` transport against the configured endpoint.
    ///
    /// Fails if no base URL is configured, before anything is sent.
    pub fn from_config(endpoints: &EndpointConfig) -> Result<Self, ConfigError> {
        let base_url = endpoints
            .base_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or(ConfigError::MissingBaseUrl)?;

        if !endpoints.timeout.is_finite() || endpoints.timeout <= 0.0 {
            return Err(ConfigError::InvalidTimeout(endpoints.timeout));
        }
        let transport = ReqwestTransport::new(Duration::from_secs_f64(endpoints.timeout))?;

        let default_headers: IndexMap<String, String> = endpoints
            .headers
            .iter()
            .map(|(key, value)| (key.clone(), stringify(value)))
            .collect();

        let dispatcher = Dispatcher::new(base_url, default_headers, Box::new(transport));
        Ok(TestCtx::new(dispatcher))
    }

    /// Attach a listener for diagnostic [`TestEvent`]s.
    pub fn with_events(mut self, tx: Sender<TestEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn with_parser(mut self, parser: Box<dyn DocumentParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn show_progress(&self) -> bool {
        self.show_progress
    }

    /// Sends an event if anyone is listening. A listener that went away is not an error.
    pub fn fire(&self, event: TestEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}
