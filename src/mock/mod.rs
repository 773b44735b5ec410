//! Mock HTTP transport
//!
//! An in-process [`HttpTransport`] for tests. Replies are queued up front and
//! handed out in order; every request sent is recorded so tests can assert on
//! method, URL, headers and body.
//!
//! ```
//! use discloud_deploy::mock::MockTransport;
//!
//! let transport = MockTransport::new();
//! transport.respond(200, r#"{"status":"ok","message":"started"}"#);
//! assert_eq!(transport.pending(), 1);
//! ```

use std::collections::VecDeque;
use std::sync::Mutex;

use serde_json::Value;

use crate::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};

/// A queued outcome: a response, or a transport failure message
type Reply = Result<HttpResponse, String>;

/// Mock transport for testing
#[derive(Debug, Default)]
pub struct MockTransport {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response with a raw body
    pub fn respond(&self, status: u16, body: impl Into<Vec<u8>>) -> &Self {
        self.push(Ok(HttpResponse::new(status, body)));
        self
    }

    /// Queue a response with a JSON body
    pub fn respond_json(&self, status: u16, body: Value) -> &Self {
        self.respond(status, body.to_string())
    }

    /// Queue a transport failure
    pub fn fail(&self, message: impl Into<String>) -> &Self {
        self.push(Err(message.into()));
        self
    }

    /// Replies not yet consumed
    pub fn pending(&self) -> usize {
        self.replies.lock().map(|q| q.len()).unwrap_or(0)
    }

    /// Every request sent so far, oldest first
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn last_request(&self) -> Option<HttpRequest> {
        self.requests().pop()
    }

    fn push(&self, reply: Reply) {
        if let Ok(mut queue) = self.replies.lock() {
            queue.push_back(reply);
        }
    }
}

impl HttpTransport for MockTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let reply = self
            .replies
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front());

        match reply {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(TransportError::ConnectionFailed(message)),
            None => Err(TransportError::ConnectionFailed(format!(
                "no mock response queued for {} {}",
                request.method, request.url
            ))),
        }
    }
}
