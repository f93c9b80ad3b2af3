#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use classify_worker::clients::{LlmClient, LlmError};
use classify_worker::pipeline::CoordinatorSettings;
use classify_worker::util::retry::RetryPolicy;
use serde_json::json;

/// LLM stub that never answers transcripts containing `hang_marker`.
pub struct StubLlm {
    hang_marker: Option<String>,
    calls: Mutex<HashMap<String, usize>>,
}

impl StubLlm {
    pub fn new() -> Self {
        Self {
            hang_marker: None,
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn hanging_on(marker: &str) -> Self {
        Self {
            hang_marker: Some(marker.to_string()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn calls_for(&self, text: &str) -> usize {
        self.calls
            .lock()
            .expect("calls mutex")
            .get(text)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().expect("calls mutex").values().sum()
    }
}

#[async_trait]
impl LlmClient for StubLlm {
    async fn classify(&self, text: &str) -> Result<String, LlmError> {
        *self
            .calls
            .lock()
            .expect("calls mutex")
            .entry(text.to_string())
            .or_default() += 1;

        if self
            .hang_marker
            .as_deref()
            .is_some_and(|marker| text.contains(marker))
        {
            std::future::pending::<()>().await;
        }

        // simulated provider latency
        tokio::time::sleep(Duration::from_millis(200)).await;
        let body = json!({
            "summary": format!("classified: {text}"),
            "deal_stage": "discovery",
            "fit_score": "65%",
            "confidence": 0.8
        });
        Ok(format!("```json\n{body}\n```"))
    }

    async fn health_check(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

pub fn settings(concurrency: usize) -> CoordinatorSettings {
    CoordinatorSettings {
        concurrency,
        default_limit: 10,
        max_limit: 100,
        retry: RetryPolicy::new(2, Duration::from_millis(500), Some(Duration::from_secs(30))),
    }
}

pub fn transcripts(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("transcript #{i}")).collect()
}
