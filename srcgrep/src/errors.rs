use std::path::Path;

/// Errors that abort a whole search run.
///
/// Per-file problems (unreadable, binary, truncated read) never surface here;
/// they degrade to "no matches" so a recursive scan always completes.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("thread pool no longer accepting tasks")]
    PoolClosed,
    #[error("failed writing matches to the output stream")]
    SinkWrite,
}

pub type SearchResult<T> = std::result::Result<T, SearchError>;

impl SearchError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        SearchError::Config(msg.into())
    }

    pub fn bad_root(root: &Path) -> Self {
        SearchError::Config(format!("search root '{}' does not exist", root.display()))
    }
}
