use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("search index error: {0}")]
    Index(#[from] tantivy::TantivyError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{stage}: cannot read {what}: {path}: {source}")]
    FatalInput {
        stage: &'static str,
        what: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("score lists have mismatched lengths: {left} vs {right}")]
    ShapeMismatch { left: usize, right: usize },

    #[error("unsupported fusion method: {0}")]
    UnsupportedMethod(String),

    #[error("{provider} provider failed: {message}")]
    Provider {
        provider: &'static str,
        message: String,
    },
}
