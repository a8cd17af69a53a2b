use thiserror::Error;

/// Typed failure kinds surfaced by the generation pipeline. Template
/// validation failures are reported separately as
/// [validator::ValidationErrors] (with field paths); everything else that
/// can abort a run lives here.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// The host signalled cancellation. Surfaced unchanged (never wrapped
    /// with stage context) so hosts can match on it; no partial continent
    /// data is exposed.
    #[error("generation cancelled by host")]
    Cancelled,

    /// The seed input could not be interpreted as a 32-bit unsigned value.
    #[error("invalid seed: {0}")]
    InvalidSeed(String),

    /// Previously generated data was paired with a different template.
    #[error("continent data was generated from template {expected:?}, not {actual:?}")]
    TemplateMismatch { expected: String, actual: String },
}

/// Failure at the host storage boundary. The pure generation core never
/// produces this; it only appears on the save/load paths of a
/// [crate::host::ContinentStore] implementation.
#[derive(Debug, Error)]
#[error("storage error: {0}")]
pub struct StorageError(pub String);

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self(err.to_string())
    }
}
