//! In-memory transport for tests: records every request, answers from a closure.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{HttpRequest, RawResponse, Transport};
use crate::error::{Result, SdkError};

type Handler = Box<dyn Fn(&HttpRequest) -> Result<RawResponse> + Send + Sync>;

pub(crate) struct MockTransport {
    handler: Handler,
    calls: Mutex<Vec<HttpRequest>>,
    delay: Option<Duration>,
}

impl MockTransport {
    pub(crate) fn new(
        handler: impl Fn(&HttpRequest) -> Result<RawResponse> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
            delay: None,
        })
    }

    /// Like [`MockTransport::new`] but every response is delayed, so concurrent
    /// callers overlap.
    pub(crate) fn delayed(
        delay: Duration,
        handler: impl Fn(&HttpRequest) -> Result<RawResponse> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
            delay: Some(delay),
        })
    }

    /// Answers with the given outcomes in order; the last one repeats.
    pub(crate) fn sequence(outcomes: Vec<Result<RawResponse>>) -> Arc<Self> {
        let queue = Mutex::new(VecDeque::from(outcomes));
        Self::new(move |_| {
            let mut queue = queue.lock().expect("mock queue poisoned");
            let next = if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().map(clone_outcome)
            };
            next.unwrap_or_else(|| Err(SdkError::network("mock sequence exhausted")))
        })
    }

    pub(crate) fn json(status: u16, body: Value) -> RawResponse {
        RawResponse {
            status,
            body: body.to_string(),
        }
    }

    pub(crate) fn calls(&self) -> Vec<HttpRequest> {
        self.calls.lock().expect("mock calls poisoned").clone()
    }

    pub(crate) fn calls_to(&self, url_suffix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.url.ends_with(url_suffix))
            .count()
    }
}

fn clone_outcome(outcome: &Result<RawResponse>) -> Result<RawResponse> {
    match outcome {
        Ok(response) => Ok(response.clone()),
        Err(err) => Err(SdkError::network(err.to_string())),
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: &HttpRequest) -> Result<RawResponse> {
        self.calls
            .lock()
            .expect("mock calls poisoned")
            .push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.handler)(request)
    }
}
