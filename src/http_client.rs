use crate::error::{ConfigError, TransportError};
use indexmap::IndexMap;
use reqwest::Method;
use std::time::{Duration, Instant};

/// Body of an outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Text(String),
    Form(Vec<(String, String)>),
}

/// A fully resolved request, ready for the wire.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: IndexMap<String, String>,
    pub query: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: IndexMap<String, String>,
    pub body: String,
}

/// Sends requests over the network. Failures are returned as classified data.
pub trait Transport: Send + Sync {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// [`Transport`] backed by a blocking `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    /// Every request sent through this transport is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, ConfigError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(ReqwestTransport { client })
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url);
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        builder = match &request.body {
            Some(RequestBody::Text(text)) => builder.body(text.clone()),
            Some(RequestBody::Form(pairs)) => builder.form(pairs),
            None => builder,
        };

        let response = builder.send().map_err(|e| classify(&e))?;
        let status = response.status().as_u16();
        let mut headers: IndexMap<String, String> = IndexMap::new();
        for (name, value) in response.headers() {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            headers
                .entry(name.as_str().to_string())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(&value);
                })
                .or_insert(value);
        }
        let body = response.text().map_err(|e| classify(&e))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

// Timeout first: a connect that times out is still a timeout.
fn classify(err: &reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::ConnectionError
    } else {
        TransportError::Other(err.to_string())
    }
}

/// The normalized result of one request attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOutcome {
    pub status_code: Option<u16>,
    pub headers: IndexMap<String, String>,
    pub body: String,
    pub elapsed_ms: f64,
    pub success: bool,
    pub error: Option<TransportError>,
}

impl RequestOutcome {
    pub fn received(response: HttpResponse, elapsed: Duration) -> Self {
        RequestOutcome {
            status_code: Some(response.status),
            headers: response.headers,
            body: response.body,
            elapsed_ms: millis(elapsed),
            success: true,
            error: None,
        }
    }

    pub fn failed(error: TransportError, elapsed: Duration) -> Self {
        RequestOutcome {
            status_code: None,
            headers: IndexMap::new(),
            body: error.diagnostic(),
            elapsed_ms: millis(elapsed),
            success: false,
            error: Some(error),
        }
    }
}

fn millis(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}

/// Builds requests against a base URL and turns every attempt into a [`RequestOutcome`].
pub struct Dispatcher {
    base_url: String,
    default_headers: IndexMap<String, String>,
    transport: Box<dyn Transport>,
}

impl Dispatcher {
    pub fn new(
        base_url: &str,
        default_headers: IndexMap<String, String>,
        transport: Box<dyn Transport>,
    ) -> Self {
        Dispatcher {
            base_url: base_url.to_string(),
            default_headers,
            transport,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Base URL and path are concatenated as-is.
    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn dispatch(
        &self,
        method: &Method,
        path: &str,
        headers: &IndexMap<String, String>,
        body: Option<RequestBody>,
        query: Vec<(String, String)>,
    ) -> RequestOutcome {
        let mut combined = self.default_headers.clone();
        for (key, value) in headers {
            combined.insert(key.clone(), value.clone());
        }
        let request = HttpRequest {
            method: method.clone(),
            url: self.build_url(path),
            headers: combined,
            query,
            body,
        };

        let start = Instant::now();
        let result = self.transport.send(&request);
        let elapsed = start.elapsed();
        match result {
            Ok(response) => RequestOutcome::received(response, elapsed),
            Err(error) => RequestOutcome::failed(error, elapsed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::Mutex;
    use std::thread;

    /// Records the last request and answers with a fixed result.
    struct Recorder {
        seen: Mutex<Option<HttpRequest>>,
        reply: Result<HttpResponse, TransportError>,
    }

    impl Transport for Recorder {
        fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            *self.seen.lock().unwrap() = Some(request.clone());
            self.reply.clone()
        }
    }

    fn headers(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_url_and_header_merge() {
        let recorder = std::sync::Arc::new(Recorder {
            seen: Mutex::new(None),
            reply: Ok(HttpResponse {
                status: 404,
                headers: headers(&[("content-type", "text/plain")]),
                body: "nope".to_string(),
            }),
        });

        struct Shared(std::sync::Arc<Recorder>);
        impl Transport for Shared {
            fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
                self.0.send(request)
            }
        }

        let dispatcher = Dispatcher::new(
            "http://host/",
            headers(&[("Accept", "application/xml"), ("User-Agent", "default")]),
            Box::new(Shared(recorder.clone())),
        );
        let outcome = dispatcher.dispatch(
            &Method::POST,
            "/items",
            &headers(&[("User-Agent", "custom")]),
            Some(RequestBody::Text("<a/>".to_string())),
            vec![("id".to_string(), "7".to_string())],
        );

        let seen = recorder.seen.lock().unwrap().clone().unwrap();
        // no slash normalization
        assert_eq!(seen.url, "http://host//items");
        assert_eq!(seen.method, Method::POST);
        assert_eq!(seen.headers["Accept"], "application/xml");
        assert_eq!(seen.headers["User-Agent"], "custom");
        assert_eq!(seen.query, vec![("id".to_string(), "7".to_string())]);
        assert_eq!(seen.body, Some(RequestBody::Text("<a/>".to_string())));

        // non-2xx is still a successful exchange
        assert!(outcome.success);
        assert_eq!(outcome.status_code, Some(404));
        assert_eq!(outcome.body, "nope");
        assert_eq!(outcome.error, None);
        assert!(outcome.elapsed_ms >= 0.0);
    }

    #[test]
    fn test_failed_outcome_shape() {
        let dispatcher = Dispatcher::new(
            "http://host",
            IndexMap::new(),
            Box::new(Recorder {
                seen: Mutex::new(None),
                reply: Err(TransportError::Timeout),
            }),
        );
        let outcome = dispatcher.dispatch(&Method::GET, "/", &IndexMap::new(), None, vec![]);
        assert!(!outcome.success);
        assert_eq!(outcome.status_code, None);
        assert!(outcome.headers.is_empty());
        assert_eq!(outcome.body, "Request Timed Out");
        assert_eq!(outcome.error, Some(TransportError::Timeout));
    }

    fn get(transport: &ReqwestTransport, url: String) -> Result<HttpResponse, TransportError> {
        transport.send(&HttpRequest {
            method: Method::GET,
            url,
            headers: IndexMap::new(),
            query: vec![("q".to_string(), "1".to_string())],
            body: None,
        })
    }

    #[test]
    fn test_reqwest_transport_reads_response() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4096];
            let n = stream.read(&mut buf).unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();
            let body = "<ok/>";
            let response = format!(
                "HTTP/1.1 201 Created\r\nContent-Type: application/xml\r\nX-Dup: a\r\nX-Dup: b\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).unwrap();
            request
        });

        let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();
        let response = get(&transport, format!("http://{}/path", addr)).unwrap();
        let request = server.join().unwrap();

        assert!(request.starts_with("GET /path?q=1 HTTP/1.1"));
        assert_eq!(response.status, 201);
        assert_eq!(response.body, "<ok/>");
        assert_eq!(response.headers["content-type"], "application/xml");
        assert_eq!(response.headers["x-dup"], "a, b");
    }

    #[test]
    fn test_reqwest_transport_timeout() {
        // the kernel completes the handshake, nobody ever answers
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let transport = ReqwestTransport::new(Duration::from_millis(200)).unwrap();
        let result = get(&transport, format!("http://{}/slow", addr));
        assert_eq!(result, Err(TransportError::Timeout));
        drop(listener);
    }

    #[test]
    fn test_reqwest_transport_connection_refused() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };

        let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();
        let result = get(&transport, format!("http://{}/", addr));
        assert_eq!(result, Err(TransportError::ConnectionError));
    }

    #[test]
    fn test_reqwest_transport_other_error() {
        let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();
        let result = get(&transport, "not a url".to_string());
        assert!(matches!(result, Err(TransportError::Other(_))));
    }
}
