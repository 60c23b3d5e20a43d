use thiserror::Error;

/// Why a circumsphere could not be solved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegenerateKind {
    /// The three points lie on a line.
    Collinear,
    /// The bisector/plane system has no unique solution.
    Singular,
}

impl std::fmt::Display for DegenerateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DegenerateKind::Collinear => f.write_str("collinear points"),
            DegenerateKind::Singular => f.write_str("singular system"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PocketForgeError {
    #[error("Degenerate geometry: {0}")]
    GeometryDegenerate(DegenerateKind),

    #[error("Noise schedule needs at least 2 timesteps, got {0}")]
    InvalidScheduleLength(usize),

    #[error("No valid reference molecules for target {0}")]
    EmptyReferenceSet(String),

    #[error("Parse error in {input:?}: {reason}")]
    Parse { input: String, reason: String },

    #[error("Resource limit reached: {limit} items")]
    ResourceExhausted { limit: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PocketForgeError {
    pub fn parse(input: impl Into<String>, reason: impl Into<String>) -> Self {
        PocketForgeError::Parse {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Errors that the pipeline recovers from by skipping a single record.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PocketForgeError::GeometryDegenerate(_)
                | PocketForgeError::Parse { .. }
                | PocketForgeError::ResourceExhausted { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PocketForgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_errors() {
        assert!(PocketForgeError::GeometryDegenerate(DegenerateKind::Singular).is_recoverable());
        assert!(PocketForgeError::parse("C(C", "unclosed branch").is_recoverable());
        assert!(PocketForgeError::ResourceExhausted { limit: 10 }.is_recoverable());

        assert!(!PocketForgeError::InvalidScheduleLength(1).is_recoverable());
        assert!(!PocketForgeError::EmptyReferenceSet("T".into()).is_recoverable());
        assert!(!PocketForgeError::Config("bad".into()).is_recoverable());
    }

    #[test]
    fn test_parse_error_message() {
        let err = PocketForgeError::parse("C(C", "unclosed branch");
        assert_eq!(err.to_string(), "Parse error in \"C(C\": unclosed branch");
    }
}
