use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out sequential numeric request ids, starting at 1.
pub struct IdGenerator {
    counter: AtomicU64,
}

impl IdGenerator {
    /// Create a new ID generator starting at 1
    pub fn new() -> Self {
        Self::with_start_value(1)
    }

    /// Create a new ID generator with a specific starting value
    pub fn with_start_value(start_value: u64) -> Self {
        Self {
            counter: AtomicU64::new(start_value),
        }
    }

    /// Get the next ID
    pub fn next_id(&self) -> Value {
        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        Value::Number(id.into())
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
