//! Mock backend for testing
//!
//! Returns a canned menu and records every prompt it receives.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::AIBackend;

/// Menu text returned by the mock backend
pub const MOCK_MENU: &str = "\
**Appetizers**
- Burrata with Stone Fruit: creamy burrata, grilled peaches, basil oil - $18.00 (serves 2-3)
- Crispy Brussels Sprouts: fish sauce caramel, mint - $14.00 (serves 2-3)

**Entrees**
- Cavatelli alla Norcina: house sausage, black truffle, grana padano - $32.00 (individual portion)

Cost Breakdown:
- Subtotal: $64.00
- Sales Tax (9.5%): $6.08
- Tip (18%): $11.52
- Total: $81.60
";

/// Mock AI backend for testing
#[derive(Clone)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
    failure: Option<String>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create a new mock backend (healthy by default)
    pub fn new() -> Self {
        Self {
            healthy: true,
            failure: None,
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::new()
        }
    }

    /// A backend whose generation always fails with `message`
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::new()
        }
    }

    /// Number of generate calls so far
    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// The most recent prompt received
    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().ok().and_then(|p| p.last().cloned())
    }
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        match self.failure {
            Some(ref message) => Err(Error::Generation(format!("API Error: {}", message))),
            None => Ok(MOCK_MENU.to_string()),
        }
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_records_prompts() {
        let backend = MockBackend::new();
        let content = backend.generate("first").await.unwrap();
        backend.generate("second").await.unwrap();

        assert_eq!(content, MOCK_MENU);
        assert_eq!(backend.calls(), 2);
        assert_eq!(backend.last_prompt().as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_failing_mock() {
        let backend = MockBackend::failing("Rate limit reached");
        let err = backend.generate("prompt").await.unwrap_err();
        assert!(err.to_string().ends_with("API Error: Rate limit reached"));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_unhealthy_mock() {
        assert!(!MockBackend::unhealthy().health_check().await);
    }
}
