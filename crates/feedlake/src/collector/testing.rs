//! Scripted in-memory source for unit tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;

use super::item::CollectionRequest;
use super::source::{has_fields, Source};
use crate::error::SourceError;

pub struct ScriptedSource {
    name: String,
    items: Vec<Value>,
    failures_left: AtomicU32,
    delay: Duration,
    panic: bool,
    calls: Arc<Mutex<Vec<Instant>>>,
}

impl ScriptedSource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            items: Vec::new(),
            failures_left: AtomicU32::new(0),
            delay: Duration::ZERO,
            panic: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_items(mut self, items: Vec<Value>) -> Self {
        self.items = items;
        self
    }

    pub fn failing_times(self, n: u32) -> Self {
        self.failures_left.store(n, Ordering::SeqCst);
        self
    }

    pub fn failing_always(self) -> Self {
        self.failing_times(u32::MAX)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panic = true;
        self
    }

    pub fn call_times(&self) -> Arc<Mutex<Vec<Instant>>> {
        self.calls.clone()
    }
}

#[async_trait]
impl Source for ScriptedSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn collect(&self, request: &CollectionRequest) -> Result<Vec<Value>, SourceError> {
        self.calls.lock().unwrap().push(Instant::now());
        if self.panic {
            panic!("scripted panic in {}", self.name);
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let remaining = self.failures_left.load(Ordering::SeqCst);
        if remaining > 0 {
            if remaining != u32::MAX {
                self.failures_left.store(remaining - 1, Ordering::SeqCst);
            }
            return Err(SourceError::Other(format!("{} unavailable", self.name)));
        }
        Ok(self.items.iter().take(request.limit).cloned().collect())
    }

    fn validate_item(&self, raw: &Value) -> bool {
        has_fields(raw, &["id"])
    }

    fn transform_item(&self, mut raw: Value) -> Value {
        if let Some(fields) = raw.as_object_mut() {
            fields.insert("transformed".to_string(), Value::Bool(true));
        }
        raw
    }
}
