use std::path::PathBuf;

/// Failures at the input edge. The rule pipeline itself never fails.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("at JSON path {path} → {message}")]
    Decode { path: String, message: String },

    #[error("JSON pointer `{pointer}` selects nothing in {}", .origin.display())]
    MissingPointer { pointer: String, origin: PathBuf },

    #[error("jq: {0}")]
    Jq(String),

    #[error("failed to read {}: {error}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    #[error("invalid input pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error(transparent)]
    Glob(#[from] glob::GlobError),

    #[error("glob pattern matched no files: {0}")]
    NoMatch(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
