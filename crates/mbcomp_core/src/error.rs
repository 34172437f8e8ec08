//! Engine Error Types

use thiserror::Error;

/// Errors that can occur outside the per-block processing path
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("Parameter {name} is a {found} parameter, not {expected}")]
    ParameterKindMismatch {
        name: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Invalid parameter state: {0}")]
    InvalidState(String),

    #[error("Processor used before prepare()")]
    NotPrepared,

    #[error("Failed to spawn thread: {0}")]
    ThreadSpawnError(String),

    #[error("Channel send error - receiver dropped")]
    ChannelSendError,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DSP error: {0}")]
    Dsp(#[from] mbcomp_dsp::DspError),
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::UnknownParameter("Knee_Low_Band".into());
        assert!(err.to_string().contains("Knee_Low_Band"));

        let err = EngineError::ParameterKindMismatch {
            name: "Solo_Mid_Band",
            expected: "float",
            found: "bool",
        };
        assert_eq!(err.to_string(), "Parameter Solo_Mid_Band is a bool parameter, not float");
    }

    #[test]
    fn test_error_from_dsp() {
        let dsp_err = mbcomp_dsp::DspError::InvalidChannelCount(0);
        let engine_err: EngineError = dsp_err.into();
        assert!(matches!(engine_err, EngineError::Dsp(_)));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let engine_err: EngineError = json_err.into();
        assert!(matches!(engine_err, EngineError::Serialization(_)));
    }
}
