#![forbid(unsafe_code)]

//! Blocking HTTP access for feeds and scraped pages.

use std::io;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: Box<ureq::Transport>,
    },
    #[error("reading response body from {url} failed: {source}")]
    Body {
        url: String,
        #[source]
        source: io::Error,
    },
}

/// Anything that can turn a URL into a response body. Implemented by
/// [`HttpClient`] and by in-memory fakes in tests.
pub trait Fetch {
    fn fetch_text(&self, url: &str) -> Result<String, FetchError>;
}

/// Unauthenticated GET client. Requests are never retried.
#[derive(Clone)]
pub struct HttpClient {
    agent: ureq::Agent,
}

impl HttpClient {
    pub fn new(timeout: Duration, user_agent: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(user_agent)
            .build();
        Self { agent }
    }
}

impl Fetch for HttpClient {
    fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        debug!(url, "GET");
        let response = self.agent.get(url).call().map_err(|err| match err {
            ureq::Error::Status(status, _) => FetchError::Status {
                url: url.to_string(),
                status,
            },
            ureq::Error::Transport(transport) => FetchError::Transport {
                url: url.to_string(),
                source: Box::new(transport),
            },
        })?;
        response.into_string().map_err(|source| FetchError::Body {
            url: url.to_string(),
            source,
        })
    }
}
