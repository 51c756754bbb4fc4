// Mock services and controllers

use async_trait::async_trait;
use parking_lot::Mutex;
use snail_core::{ActionContext, ActionOutput, Controller, Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Mock service that records calls and hands back a canned value.
#[derive(Clone)]
pub struct MockService<T> {
    calls: Arc<Mutex<Vec<String>>>,
    return_value: Arc<Mutex<Option<T>>>,
}

impl<T> MockService<T> {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            return_value: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_return(self, value: T) -> Self {
        *self.return_value.lock() = Some(value);
        self
    }

    pub fn record_call(&self, method: &str) {
        self.calls.lock().push(method.to_string());
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn was_called(&self, method: &str) -> bool {
        self.calls.lock().iter().any(|call| call == method)
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn get_return(&self) -> Option<T>
    where
        T: Clone,
    {
        self.return_value.lock().clone()
    }
}

impl<T> Default for MockService<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// One recorded action call: the action name and its positional arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub action: String,
    pub args: Vec<String>,
}

type CallLog = Arc<Mutex<Vec<RecordedCall>>>;

/// Controller with scripted actions.
///
/// Clones share the call log, so a test can keep one handle and bind another
/// into the container.
#[derive(Clone, Default)]
pub struct MockController {
    actions: Arc<Mutex<HashMap<String, ActionOutput>>>,
    calls: CallLog,
}

impl MockController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `action` callable, answering with `output`.
    pub fn with_action(self, action: &str, output: impl Into<ActionOutput>) -> Self {
        self.actions.lock().insert(action.to_string(), output.into());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn was_called(&self, action: &str) -> bool {
        self.calls.lock().iter().any(|call| call.action == action)
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }
}

#[async_trait]
impl Controller for MockController {
    fn has_action(&self, action: &str) -> bool {
        self.actions.lock().contains_key(action)
    }

    async fn call(&self, action: &str, ctx: ActionContext) -> Result<ActionOutput> {
        self.calls.lock().push(RecordedCall {
            action: action.to_string(),
            args: ctx.params.positional().to_vec(),
        });
        self.actions
            .lock()
            .get(action)
            .cloned()
            .ok_or_else(|| Error::HandlerNotFound(format!("Action not found: {}", action)))
    }
}
