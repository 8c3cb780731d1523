//! Error types for the haruko turn engine.

/// Top-level error type for the assistant.
///
/// Turn-level failures never surface through this type: the turn
/// controller converts them into text. It covers setup and facade
/// operations (configuration, provider construction, I/O).
#[derive(Debug, thiserror::Error)]
pub enum HarukoError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Provider construction or invocation error.
    #[error("provider error: {0}")]
    Provider(#[from] crate::provider::ProviderError),

    /// Every provider in the chain failed.
    #[error(transparent)]
    Chain(#[from] crate::provider::ChainError),

    /// Collaborator (home, memory, camera, ...) error.
    #[error("collaborator error: {0}")]
    Collaborator(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, HarukoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = HarukoError::Config("buffer threshold must be positive".into());
        assert_eq!(
            err.to_string(),
            "config error: buffer threshold must be positive"
        );
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: HarukoError = io.into();
        assert!(matches!(err, HarukoError::Io(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn chain_error_is_transparent() {
        let err: HarukoError = crate::provider::ChainError::Exhausted { attempts: 3 }.into();
        assert_eq!(
            err.to_string(),
            crate::provider::ChainError::Exhausted { attempts: 3 }.to_string()
        );
    }
}
