use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};

use crate::error::{ScrapeError, transient_status};

/// A completed fetch. Bodies are always text (HTML or JSON).
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

/// Stateless fetch capability the pipeline consumes. No cookies, no session
/// affinity between calls; implementations must treat rate-limit responses
/// as transient failures.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        params: &[(String, String)],
    ) -> Result<Response, ScrapeError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:125.0) Gecko/20100101 Firefox/125.0",
];

impl HttpTransport {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        // Deliberately no cookie store: every call is session-free.
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self { client })
    }

    fn random_user_agent() -> &'static str {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        USER_AGENTS[rng.gen_range(0..USER_AGENTS.len())]
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(
        &self,
        url: &str,
        params: &[(String, String)],
    ) -> Result<Response, ScrapeError> {
        let resp = self
            .client
            .get(url)
            .query(params)
            .header(USER_AGENT, Self::random_user_agent())
            .send()
            .await
            .map_err(|e| {
                let reason = if e.is_timeout() { "timeout" } else { "connection error" };
                ScrapeError::transient(url, format!("{reason}: {e}"))
            })?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| ScrapeError::transient(url, format!("body read failed: {e}")))?;

        if (200..300).contains(&status) {
            Ok(Response { status, body })
        } else if transient_status(status) {
            Err(ScrapeError::transient(url, format!("status {status}")))
        } else {
            Err(ScrapeError::Permanent { url: url.to_string(), status })
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    type Responder =
        dyn Fn(&str, &[(String, String)]) -> Result<Response, ScrapeError> + Send + Sync;

    /// Scripted transport for tests: a responder closure plus a call log and
    /// an optional artificial latency per call.
    pub struct MockTransport {
        responder: Box<Responder>,
        delay: Option<Duration>,
        calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
    }

    impl MockTransport {
        pub fn new<F>(responder: F) -> Self
        where
            F: Fn(&str, &[(String, String)]) -> Result<Response, ScrapeError>
                + Send
                + Sync
                + 'static,
        {
            Self {
                responder: Box::new(responder),
                delay: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub fn calls(&self) -> Vec<(String, Vec<(String, String)>)> {
            self.calls.lock().unwrap().clone()
        }

        pub fn ok(body: &str) -> Result<Response, ScrapeError> {
            Ok(Response { status: 200, body: body.to_string() })
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn fetch(
            &self,
            url: &str,
            params: &[(String, String)],
        ) -> Result<Response, ScrapeError> {
            self.calls
                .lock()
                .unwrap()
                .push((url.to_string(), params.to_vec()));
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            (self.responder)(url, params)
        }
    }
}
