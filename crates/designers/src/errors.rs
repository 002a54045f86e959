use thiserror::Error;

/// A result type for designer errors
pub type Result<T> = std::result::Result<T, BboError>;

/// An error raised while configuring or running a designer
#[derive(Error, Debug)]
pub enum BboError {
    /// When configuration is invalid: unknown option or inconsistent combination
    #[error("Invalid configuration: {0}")]
    InvalidConfigError(String),
    /// When a search space parameter cannot be handled by the model-based path
    #[error("Unsupported parameter type: {0}")]
    UnsupportedSpecType(String),
    /// When the objective cannot be handled by the model-based path
    #[error("Unsupported objective: {0}")]
    UnsupportedObjective(String),
    /// When an invalid value is encountered
    #[error("Value error: {0}")]
    InvalidValue(String),
    /// When surrogate building or fitting fails
    #[error("GP error")]
    GpError(#[from] bbo_gp::GpError),
    /// When (de)serialization fails
    #[error("Json error")]
    JsonError(#[from] serde_json::Error),
    /// When IO fails
    #[error("IO error")]
    IoError(#[from] std::io::Error),
}

impl BboError {
    /// Invalid enumerated option or inconsistent option combination
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            BboError::InvalidConfigError(_)
                | BboError::GpError(bbo_gp::GpError::InvalidModuleError(_))
        )
    }

    /// Non continuous parameter or multi-objective labels met by the model-based path
    pub fn is_unsupported_domain(&self) -> bool {
        matches!(
            self,
            BboError::UnsupportedSpecType(_) | BboError::UnsupportedObjective(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_taxonomy() {
        assert!(BboError::InvalidConfigError("q".to_string()).is_configuration_error());
        assert!(!BboError::InvalidValue("x".to_string()).is_configuration_error());
        assert!(BboError::UnsupportedSpecType("x".to_string()).is_unsupported_domain());
        assert!(BboError::UnsupportedObjective("y".to_string()).is_unsupported_domain());
        let gp_err: BboError = bbo_gp::GpError::InvalidModuleError("rbf".to_string()).into();
        assert!(gp_err.is_configuration_error());
    }
}
