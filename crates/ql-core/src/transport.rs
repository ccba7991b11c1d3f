//! Provider transport.
//!
//! The orchestrator and triage only see [`Transport`]; [`RestTransport`] is
//! the HTTP implementation against the provider's query endpoint.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use ql_config::{ApiKey, ProviderConfig};

/// Provider query endpoint used in suggested remediation URLs.
pub const DEFAULT_QUERY_URL: &str = "https://www.alphavantage.co/query";

/// Transport failure. The unit that hit it is abandoned for this run.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP {status} from {function}")]
    Status { function: String, status: u16 },

    #[error("request for {function} failed: {message}")]
    Request { function: String, message: String },

    #[error("reading {function} response: {source}")]
    Body {
        function: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{function} returned a body that is not JSON: {message}")]
    Decode { function: String, message: String },
}

impl From<TransportError> for ql_common::Error {
    fn from(err: TransportError) -> Self {
        ql_common::Error::Transport(err.to_string())
    }
}

/// Source of raw provider responses.
pub trait Transport {
    /// Tabular (CSV) text for one symbol.
    fn fetch_tabular(
        &self,
        function: &str,
        symbol: &str,
        output_size: &str,
    ) -> Result<String, TransportError>;

    /// Deserialized structured payload.
    fn fetch_structured(
        &self,
        function: &str,
        params: &[(String, String)],
    ) -> Result<Value, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn fetch_tabular(
        &self,
        function: &str,
        symbol: &str,
        output_size: &str,
    ) -> Result<String, TransportError> {
        (**self).fetch_tabular(function, symbol, output_size)
    }

    fn fetch_structured(
        &self,
        function: &str,
        params: &[(String, String)],
    ) -> Result<Value, TransportError> {
        (**self).fetch_structured(function, params)
    }
}

/// Blocking REST client for the provider query URL.
pub struct RestTransport {
    agent: ureq::Agent,
    base_url: String,
    api_key: ApiKey,
}

impl RestTransport {
    pub fn new(provider: &ProviderConfig, api_key: ApiKey) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(provider.timeout_secs))
            .user_agent(concat!("quantlab/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            agent,
            base_url: provider.base_url.clone(),
            api_key,
        }
    }

    fn get(&self, function: &str, params: &[(&str, &str)]) -> Result<ureq::Response, TransportError> {
        debug!(function, base_url = %self.base_url, "provider request");
        let mut request = self
            .agent
            .get(&self.base_url)
            .query("function", function)
            .query("apikey", self.api_key.expose());
        for (k, v) in params {
            request = request.query(k, v);
        }
        request.call().map_err(|err| match err {
            ureq::Error::Status(status, _) => TransportError::Status {
                function: function.to_string(),
                status,
            },
            ureq::Error::Transport(t) => TransportError::Request {
                function: function.to_string(),
                message: t.to_string(),
            },
        })
    }
}

impl Transport for RestTransport {
    fn fetch_tabular(
        &self,
        function: &str,
        symbol: &str,
        output_size: &str,
    ) -> Result<String, TransportError> {
        let response = self.get(
            function,
            &[("symbol", symbol), ("datatype", "csv"), ("outputsize", output_size)],
        )?;
        response.into_string().map_err(|source| TransportError::Body {
            function: function.to_string(),
            source,
        })
    }

    fn fetch_structured(
        &self,
        function: &str,
        params: &[(String, String)],
    ) -> Result<Value, TransportError> {
        let borrowed: Vec<(&str, &str)> = params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let body = self
            .get(function, &borrowed)?
            .into_string()
            .map_err(|source| TransportError::Body {
                function: function.to_string(),
                source,
            })?;
        serde_json::from_str(&body).map_err(|e| TransportError::Decode {
            function: function.to_string(),
            message: e.to_string(),
        })
    }
}

/// Suggested remediation URL for a failed call. The key is a placeholder.
pub fn suggested_url(base_url: &str, function: &str, symbol: &str) -> String {
    format!(
        "{}?function={}&symbol={}&apikey=YOUR_KEY",
        base_url, function, symbol
    )
}
