//! Semantic validation of a parsed configuration.

use thiserror::Error;

use crate::config::PipelineConfig;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid date window: start {start} is after end {end}")]
    InvertedWindow { start: String, end: String },
    #[error("ingest.pause_secs must be a non-negative number, got {0}")]
    NegativePause(f64),
    #[error("provider.timeout_secs must be positive")]
    ZeroTimeout,
    #[error("invalid endpoint list: {0}")]
    Endpoints(String),
    #[error("ingest.tickers is set but contains no usable ticker")]
    EmptyTickerOverride,
}

impl From<ValidationError> for ql_common::Error {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::InvertedWindow { start, end } => {
                ql_common::Error::InvalidDateWindow { start, end }
            }
            other => ql_common::Error::Config(other.to_string()),
        }
    }
}

pub type ValidationResult = Result<(), ValidationError>;

/// Check cross-field constraints that serde cannot express.
///
/// An unset window is accepted here; commands that need it call
/// [`crate::WindowConfig::bounds`].
pub fn validate(config: &PipelineConfig) -> ValidationResult {
    if let (Some(start), Some(end)) = (config.window.start, config.window.end) {
        if start > end {
            return Err(ValidationError::InvertedWindow {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
    }

    let pause = config.ingest.pause_secs;
    if !pause.is_finite() || pause < 0.0 {
        return Err(ValidationError::NegativePause(pause));
    }

    if config.provider.timeout_secs == 0 {
        return Err(ValidationError::ZeroTimeout);
    }

    config
        .endpoints
        .plan()
        .map_err(|e| ValidationError::Endpoints(e.to_string()))?;

    if let Some(tickers) = &config.ingest.tickers {
        if tickers.iter().all(|t| t.trim().is_empty()) {
            return Err(ValidationError::EmptyTickerOverride);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn default_config_is_valid() {
        assert!(validate(&PipelineConfig::default()).is_ok());
    }

    #[test]
    fn inverted_window_rejected() {
        let mut cfg = PipelineConfig::default();
        cfg.window.start = NaiveDate::from_ymd_opt(2024, 6, 1);
        cfg.window.end = NaiveDate::from_ymd_opt(2024, 1, 1);
        let err = validate(&cfg).unwrap_err();
        assert!(matches!(err, ValidationError::InvertedWindow { .. }));
        let common: ql_common::Error = err.into();
        assert_eq!(common.code(), 13);
    }

    #[test]
    fn negative_pause_rejected() {
        let mut cfg = PipelineConfig::default();
        cfg.ingest.pause_secs = -0.1;
        assert!(matches!(
            validate(&cfg),
            Err(ValidationError::NegativePause(_))
        ));
    }

    #[test]
    fn misplaced_endpoint_rejected() {
        let mut cfg = PipelineConfig::default();
        cfg.endpoints.time_series.push("CPI".to_string());
        assert!(matches!(validate(&cfg), Err(ValidationError::Endpoints(_))));
    }

    #[test]
    fn blank_ticker_override_rejected() {
        let mut cfg = PipelineConfig::default();
        cfg.ingest.tickers = Some(vec!["  ".to_string()]);
        assert!(matches!(
            validate(&cfg),
            Err(ValidationError::EmptyTickerOverride)
        ));
    }
}
