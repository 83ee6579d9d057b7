//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use tern_entities::{EntityError, Request, Response, Transport};

type Handler = dyn Fn(&Request) -> Result<Response, EntityError> + Send + Sync;

/// Scripted transport that records every request it receives.
#[derive(Clone)]
pub struct MockTransport {
    handler: Arc<Handler>,
    calls: Arc<Mutex<Vec<Request>>>,
    delay: Duration,
}

impl MockTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&Request) -> Result<Response, EntityError> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            calls: Arc::new(Mutex::new(Vec::new())),
            delay: Duration::ZERO,
        }
    }

    /// Respond to everything with the same payload.
    pub fn always(data: Value) -> Self {
        Self::new(move |_| Ok(Response::new(data.clone())))
    }

    /// Fail everything with the given HTTP status.
    pub fn failing(status: u16) -> Self {
        Self::new(move |_| {
            Err(EntityError::Status {
                status,
                body: String::new(),
            })
        })
    }

    /// Hold every response for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<Request> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(&self, request: Request) -> Result<Response, EntityError> {
        self.calls.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.handler)(&request)
    }
}

pub fn account(id: &str) -> Value {
    json!({"id": id, "username": format!("user{id}")})
}

pub fn accounts(ids: &[&str]) -> Value {
    Value::Array(ids.iter().map(|id| account(id)).collect())
}
