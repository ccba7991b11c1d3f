//! Shared fixtures: an in-memory transport with scripted responses.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;

use serde_json::Value;

use ql_core::transport::{Transport, TransportError};

#[derive(Debug, Clone)]
pub enum Scripted {
    Text(String),
    Json(Value),
    Status(u16),
}

/// Answers by `(function, symbol)`; symbol is `""` for calls without one.
/// Unscripted calls fail with HTTP 404.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: HashMap<(String, String), Scripted>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, function: &str, symbol: &str, response: Scripted) -> Self {
        self.responses
            .insert((function.to_string(), symbol.to_string()), response);
        self
    }

    /// Calls made so far, as `FUNCTION:SYMBOL`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn answer(&self, function: &str, symbol: &str) -> Result<Scripted, TransportError> {
        self.calls.borrow_mut().push(format!("{}:{}", function, symbol));
        match self.responses.get(&(function.to_string(), symbol.to_string())) {
            Some(Scripted::Status(status)) => Err(TransportError::Status {
                function: function.to_string(),
                status: *status,
            }),
            Some(other) => Ok(other.clone()),
            None => Err(TransportError::Status {
                function: function.to_string(),
                status: 404,
            }),
        }
    }
}

impl Transport for ScriptedTransport {
    fn fetch_tabular(
        &self,
        function: &str,
        symbol: &str,
        _output_size: &str,
    ) -> Result<String, TransportError> {
        match self.answer(function, symbol)? {
            Scripted::Text(text) => Ok(text),
            Scripted::Json(value) => Ok(value.to_string()),
            Scripted::Status(_) => unreachable!("status answers are errors"),
        }
    }

    fn fetch_structured(
        &self,
        function: &str,
        params: &[(String, String)],
    ) -> Result<Value, TransportError> {
        let symbol = params
            .iter()
            .find(|(k, _)| k == "symbol" || k == "keywords")
            .map(|(_, v)| v.as_str())
            .unwrap_or("");
        match self.answer(function, symbol)? {
            Scripted::Json(value) => Ok(value),
            Scripted::Text(text) => Ok(Value::String(text)),
            Scripted::Status(_) => unreachable!("status answers are errors"),
        }
    }
}
