// Log sink that keeps messages in memory

use parking_lot::Mutex;
use snail_log::LogSink;

/// Captures `(category, message)` pairs for later inspection.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<(String, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(String, String)> {
        self.entries.lock().clone()
    }

    /// Messages logged under `category`, oldest first.
    pub fn in_category(&self, category: &str) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|(c, _)| c == category)
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl LogSink for MemorySink {
    fn log(&self, message: &str, category: &str) {
        self.entries
            .lock()
            .push((category.to_string(), message.to_string()));
    }
}
