// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Scripted transport standing in for the registry.

use async_trait::async_trait;
use registry_submission_limiter::{Transport, TransportError, TransportRequest};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// How the mock answers every request.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Return this body
    Body(String),
    /// Fail at the transport level
    Fail(TransportError),
    /// Panic mid-exchange
    Panic,
}

/// A request as the mock saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub request: TransportRequest,
    pub at: Instant,
}

impl Recorded {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.request.body).expect("request body is JSON")
    }
}

#[derive(Debug)]
pub struct MockTransport {
    reply: Reply,
    delay: Duration,
    calls: AtomicUsize,
    recorded: Mutex<Vec<Recorded>>,
}

impl MockTransport {
    pub fn new(reply: Reply) -> Self {
        Self {
            reply,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            recorded: Mutex::new(Vec::new()),
        }
    }

    /// Registry accepts everything with the given id.
    pub fn accepting(id: &str) -> Self {
        Self::new(Reply::Body(format!(r#"{{"value":"{id}"}}"#)))
    }

    pub fn replying(body: &str) -> Self {
        Self::new(Reply::Body(body.to_string()))
    }

    pub fn failing(err: TransportError) -> Self {
        Self::new(Reply::Fail(err))
    }

    /// Hold every exchange open for `delay` after recording it.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        self.recorded.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: TransportRequest) -> Result<Vec<u8>, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.recorded.lock().unwrap().push(Recorded {
            request,
            at: Instant::now(),
        });

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match &self.reply {
            Reply::Body(body) => Ok(body.clone().into_bytes()),
            Reply::Fail(err) => Err(err.clone()),
            Reply::Panic => panic!("transport blew up"),
        }
    }
}
